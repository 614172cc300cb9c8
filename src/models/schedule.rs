use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type LecturerId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Pending,
    Accepted,
    Declined,
}

/// One timetabled session, as stored in any of the schedule tables.
///
/// Discriminator columns a table does not carry are always `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub id: String,
    pub semester_id: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub room_id: i64,
    pub module_id: Option<i64>,
    pub course_code: Option<String>,
    pub category_id: Option<i64>,
    pub small_group_id: Option<i64>,
    pub lecturer_id: LecturerId,
    /// `None` on legacy rows that never had a chain.
    pub lecturer_chain: Option<Vec<LecturerId>>,
    pub status: ConfirmationStatus,
    pub created_at: DateTime<Utc>,
}

/// Raw row; the chain column is still JSON text here.
#[derive(Debug, Clone, FromRow)]
pub struct ScheduleRow {
    pub id: String,
    pub semester_id: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub room_id: i64,
    pub module_id: Option<i64>,
    pub course_code: Option<String>,
    pub category_id: Option<i64>,
    pub small_group_id: Option<i64>,
    pub lecturer_id: String,
    pub lecturer_chain: Option<String>,
    pub status: ConfirmationStatus,
    pub created_at: DateTime<Utc>,
}

impl ScheduleRow {
    pub fn into_entry(self, lecturer_chain: Option<Vec<LecturerId>>) -> ScheduleEntry {
        ScheduleEntry {
            id: self.id,
            semester_id: self.semester_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            room_id: self.room_id,
            module_id: self.module_id,
            course_code: self.course_code,
            category_id: self.category_id,
            small_group_id: self.small_group_id,
            lecturer_id: self.lecturer_id,
            lecturer_chain,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScheduleEntry {
    pub semester_id: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub room_id: i64,
    pub module_id: Option<i64>,
    pub course_code: Option<String>,
    pub category_id: Option<i64>,
    pub small_group_id: Option<i64>,
    pub lecturer_id: LecturerId,
    pub lecturer_chain: Option<Vec<LecturerId>>,
    pub status: ConfirmationStatus,
    pub created_at: DateTime<Utc>,
}
