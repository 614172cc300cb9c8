use sqlx::{SqliteConnection, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Discriminator, LecturerId, NewScheduleEntry, ScheduleEntry, ScheduleKind, ScheduleRow,
};

const LEADING_COLUMNS: [&str; 6] = [
    "id",
    "semester_id",
    "date",
    "start_time",
    "end_time",
    "room_id",
];
const TRAILING_COLUMNS: [&str; 4] = ["lecturer_id", "lecturer_chain", "status", "created_at"];

/// Select list shared by every schedule table. Discriminators the table does
/// not carry are projected as NULL so all kinds decode into `ScheduleRow`.
fn select_columns(kind: ScheduleKind) -> String {
    let spec = kind.spec();
    let mut columns: Vec<String> = LEADING_COLUMNS.iter().map(|c| c.to_string()).collect();
    for d in Discriminator::ALL {
        if spec.has(d) {
            columns.push(d.column().to_string());
        } else {
            columns.push(format!("NULL AS {}", d.column()));
        }
    }
    columns.extend(TRAILING_COLUMNS.iter().map(|c| c.to_string()));
    columns.join(", ")
}

/// Decode the stored chain. JSON `null` and SQL NULL are both "absent".
pub fn decode_chain(id: &str, raw: Option<&str>) -> Result<Option<Vec<LecturerId>>, AppError> {
    match raw {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) => serde_json::from_str::<Option<Vec<LecturerId>>>(text).map_err(|source| {
            AppError::MalformedChain {
                id: id.to_string(),
                source,
            }
        }),
    }
}

pub fn encode_chain(id: &str, chain: &[LecturerId]) -> Result<String, AppError> {
    serde_json::to_string(chain).map_err(|source| AppError::MalformedChain {
        id: id.to_string(),
        source,
    })
}

fn into_entry(row: ScheduleRow) -> ScheduleEntry {
    let chain = match decode_chain(&row.id, row.lecturer_chain.as_deref()) {
        Ok(chain) => chain,
        Err(e) => {
            warn!("{}; treating chain as absent", e);
            None
        }
    };
    row.into_entry(chain)
}

/// All rows of one schedule table in retrieval (rowid) order, optionally
/// restricted to a semester.
pub async fn fetch_entries(
    db: &SqlitePool,
    kind: ScheduleKind,
    semester_id: Option<&str>,
) -> Result<Vec<ScheduleEntry>, AppError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE (?1 IS NULL OR semester_id = ?1) ORDER BY rowid",
        select_columns(kind),
        kind.table()
    );

    let rows = sqlx::query_as::<_, ScheduleRow>(&sql)
        .bind(semester_id)
        .fetch_all(db)
        .await?;

    Ok(rows.into_iter().map(into_entry).collect())
}

/// Re-read specific rows, keeping rowid order. Missing ids are simply absent
/// from the result.
pub async fn fetch_entries_by_ids(
    conn: &mut SqliteConnection,
    kind: ScheduleKind,
    ids: &[String],
) -> Result<Vec<ScheduleEntry>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM {} WHERE id IN ({}) ORDER BY rowid",
        select_columns(kind),
        kind.table(),
        placeholders
    );

    let mut query = sqlx::query_as::<_, ScheduleRow>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    Ok(rows.into_iter().map(into_entry).collect())
}

pub async fn find_entry_by_id(
    db: &SqlitePool,
    kind: ScheduleKind,
    id: &str,
) -> Result<Option<ScheduleEntry>, AppError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?",
        select_columns(kind),
        kind.table()
    );

    let row = sqlx::query_as::<_, ScheduleRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;

    Ok(row.map(into_entry))
}

pub async fn update_lecturers(
    conn: &mut SqliteConnection,
    kind: ScheduleKind,
    id: &str,
    chain: &[LecturerId],
    lecturer_id: &str,
) -> Result<bool, AppError> {
    let encoded = encode_chain(id, chain)?;
    let sql = format!(
        "UPDATE {} SET lecturer_chain = ?, lecturer_id = ? WHERE id = ?",
        kind.table()
    );

    let result = sqlx::query(&sql)
        .bind(encoded)
        .bind(lecturer_id)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn delete_entry(
    conn: &mut SqliteConnection,
    kind: ScheduleKind,
    id: &str,
) -> Result<bool, AppError> {
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());

    let result = sqlx::query(&sql)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}

/// Insert a row the way the scheduling write path does. Discriminators the
/// table does not carry are dropped.
pub async fn insert_entry(
    db: &SqlitePool,
    kind: ScheduleKind,
    req: NewScheduleEntry,
) -> Result<ScheduleEntry, AppError> {
    let id = Uuid::new_v4().to_string();
    let spec = kind.spec();

    let keep_i64 = |d: Discriminator, v: Option<i64>| if spec.has(d) { v } else { None };
    let module_id = keep_i64(Discriminator::Module, req.module_id);
    let category_id = keep_i64(Discriminator::Category, req.category_id);
    let small_group_id = keep_i64(Discriminator::SmallGroup, req.small_group_id);
    let course_code = if spec.has(Discriminator::CourseCode) {
        req.course_code
    } else {
        None
    };

    let chain = match &req.lecturer_chain {
        Some(chain) => Some(encode_chain(&id, chain)?),
        None => None,
    };

    let mut columns: Vec<&str> = LEADING_COLUMNS.to_vec();
    columns.extend(
        Discriminator::ALL
            .into_iter()
            .filter(|d| spec.has(*d))
            .map(|d| d.column()),
    );
    columns.extend(TRAILING_COLUMNS);
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        kind.table(),
        columns.join(", "),
        placeholders
    );

    let mut query = sqlx::query(&sql)
        .bind(&id)
        .bind(&req.semester_id)
        .bind(&req.date)
        .bind(&req.start_time)
        .bind(&req.end_time)
        .bind(req.room_id);
    for d in Discriminator::ALL.into_iter().filter(|d| spec.has(*d)) {
        query = match d {
            Discriminator::Module => query.bind(module_id),
            Discriminator::CourseCode => query.bind(course_code.clone()),
            Discriminator::Category => query.bind(category_id),
            Discriminator::SmallGroup => query.bind(small_group_id),
        };
    }
    query
        .bind(&req.lecturer_id)
        .bind(&chain)
        .bind(req.status)
        .bind(req.created_at)
        .execute(db)
        .await?;

    Ok(ScheduleEntry {
        id,
        semester_id: req.semester_id,
        date: req.date,
        start_time: req.start_time,
        end_time: req.end_time,
        room_id: req.room_id,
        module_id,
        course_code,
        category_id,
        small_group_id,
        lecturer_id: req.lecturer_id,
        lecturer_chain: req.lecturer_chain,
        status: req.status,
        created_at: req.created_at,
    })
}
