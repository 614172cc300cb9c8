use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::db::repository;
use crate::error::AppError;
use crate::models::ScheduleKind;
use crate::services::grouping::{self, DuplicateGroup};
use crate::services::merge::{self, GroupPlan, MergeDecision};
use crate::services::natural_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    DryRun,
    Apply,
}

/// What a run is allowed to look at. Passed explicitly into every query.
#[derive(Debug, Clone)]
pub struct ReconcileScope {
    pub semester_id: Option<String>,
    pub kinds: Vec<ScheduleKind>,
}

impl Default for ReconcileScope {
    fn default() -> Self {
        Self {
            semester_id: None,
            kinds: ScheduleKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSummary {
    #[serde(rename = "type")]
    pub kind: ScheduleKind,
    pub label: &'static str,
    pub table: &'static str,
    pub groups: usize,
    pub merged_count: usize,
    pub skipped_count: usize,
    pub unkeyed_count: usize,
    pub stale_groups: usize,
    pub audit_lines: Vec<String>,
    pub merges: Vec<MergeDecision>,
    pub error: Option<String>,
}

impl TypeSummary {
    fn new(kind: ScheduleKind) -> Self {
        Self {
            kind,
            label: kind.label(),
            table: kind.table(),
            groups: 0,
            merged_count: 0,
            skipped_count: 0,
            unkeyed_count: 0,
            stale_groups: 0,
            audit_lines: Vec::new(),
            merges: Vec::new(),
            error: None,
        }
    }

    fn record(&mut self, plan: GroupPlan) {
        self.skipped_count += plan.skipped.len();
        self.merged_count += plan.merges.len();
        for decision in plan.merges {
            self.audit_lines.push(decision.audit_line());
            self.merges.push(decision);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub mode: RunMode,
    pub types: Vec<TypeSummary>,
    pub total_merged: usize,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.types.iter().any(|t| t.error.is_some())
    }
}

pub struct ReconcileService {
    db: SqlitePool,
    mode: RunMode,
    scope: ReconcileScope,
}

impl ReconcileService {
    pub fn new(db: SqlitePool, mode: RunMode, scope: ReconcileScope) -> Self {
        Self { db, mode, scope }
    }

    /// Reconcile every schedule kind in scope. A failing kind is recorded in
    /// its summary and does not stop the others.
    pub async fn reconcile_all(&self) -> RunSummary {
        info!("Starting duplicate cleanup ({:?})...", self.mode);
        let mut types = Vec::with_capacity(self.scope.kinds.len());

        for &kind in &self.scope.kinds {
            types.push(self.reconcile_kind(kind).await);
        }

        let total_merged = types.iter().map(|t| t.merged_count).sum();
        info!("Duplicate cleanup finished: {} merged", total_merged);

        RunSummary {
            mode: self.mode,
            types,
            total_merged,
        }
    }

    pub async fn reconcile_kind(&self, kind: ScheduleKind) -> TypeSummary {
        info!("Cleaning up {} duplicates...", kind);
        let mut summary = TypeSummary::new(kind);

        match self.run_kind(kind, &mut summary).await {
            Ok(()) => info!(
                "{}: {} merged, {} left unresolved",
                kind, summary.merged_count, summary.skipped_count
            ),
            Err(e) => {
                error!(
                    "{} cleanup aborted after {} merges: {}",
                    kind, summary.merged_count, e
                );
                summary.error = Some(e.to_string());
            }
        }

        summary
    }

    async fn run_kind(
        &self,
        kind: ScheduleKind,
        summary: &mut TypeSummary,
    ) -> Result<(), AppError> {
        let entries =
            repository::fetch_entries(&self.db, kind, self.scope.semester_id.as_deref()).await?;
        debug!("{}: scanned {} rows", kind, entries.len());

        let grouping = grouping::group_duplicates(kind, entries);
        summary.groups = grouping.groups.len();
        summary.unkeyed_count = grouping.unkeyed.len();

        for group in grouping.groups {
            debug!("{}: {} rows share {}", kind, group.members.len(), group.key);
            let plan = match self.mode {
                RunMode::DryRun => merge::plan_group(group.members),
                RunMode::Apply => self.apply_group(kind, &group, summary).await?,
            };
            if let Some(plan) = plan {
                debug!(
                    "{}: canonical {} (assigned to {}), {} merged, {} skipped",
                    kind,
                    plan.canonical_id,
                    plan.original_lecturer_id,
                    plan.merges.len(),
                    plan.skipped.len()
                );
                summary.record(plan);
            }
        }

        Ok(())
    }

    /// Re-read the group inside one transaction, re-plan from the fresh rows,
    /// then update the canonical row and delete every merged candidate. An
    /// early return drops the transaction, which rolls it back.
    async fn apply_group(
        &self,
        kind: ScheduleKind,
        group: &DuplicateGroup,
        summary: &mut TypeSummary,
    ) -> Result<Option<GroupPlan>, AppError> {
        let ids: Vec<String> = group.members.iter().map(|e| e.id.clone()).collect();
        let mut tx = self.db.begin().await?;

        let fresh: Vec<_> = repository::fetch_entries_by_ids(&mut tx, kind, &ids)
            .await?
            .into_iter()
            .filter(|e| natural_key::extract(kind, e).as_ref() == Ok(&group.key))
            .collect();

        if fresh != group.members {
            warn!(
                "{}: group {} changed since the scan ({} of {} rows still match), re-planning",
                kind,
                group.key,
                fresh.len(),
                ids.len()
            );
            summary.stale_groups += 1;
        }

        if fresh.len() < 2 {
            return Ok(None);
        }

        let Some(plan) = merge::plan_group(fresh) else {
            return Ok(None);
        };
        if plan.merges.is_empty() {
            return Ok(Some(plan));
        }

        if let Some((chain, lecturer_id)) = plan.final_state() {
            repository::update_lecturers(&mut tx, kind, &plan.canonical_id, chain, lecturer_id)
                .await?;
        }
        for decision in &plan.merges {
            repository::delete_entry(&mut tx, kind, &decision.candidate_id).await?;
        }
        tx.commit().await?;

        for decision in &plan.merges {
            info!("{}: {}", kind, decision.audit_line());
        }

        Ok(Some(plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, migrate};
    use crate::models::{ConfirmationStatus, NewScheduleEntry, ScheduleEntry};
    use chrono::{TimeZone, Utc};

    const KIND: ScheduleKind = ScheduleKind::Practicum;

    async fn setup_test_db() -> SqlitePool {
        let pool = connect_in_memory().await.expect("Failed to create test db");
        migrate(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert(
        pool: &SqlitePool,
        lecturer: &str,
        status: ConfirmationStatus,
        minute: u32,
    ) -> ScheduleEntry {
        let req = NewScheduleEntry {
            semester_id: Some("2025-even".to_string()),
            date: "2025-03-10".to_string(),
            start_time: "08:00".to_string(),
            end_time: "10:00".to_string(),
            room_id: 5,
            module_id: None,
            course_code: Some("MKA001".to_string()),
            category_id: None,
            small_group_id: Some(2),
            lecturer_id: lecturer.to_string(),
            lecturer_chain: None,
            status,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, minute, 0).unwrap(),
        };
        repository::insert_entry(pool, KIND, req)
            .await
            .expect("Failed to insert entry")
    }

    /// Three rows sharing one slot, scanned into a single group.
    async fn scanned_group(pool: &SqlitePool) -> (Vec<ScheduleEntry>, DuplicateGroup) {
        let a = insert(pool, "L1", ConfirmationStatus::Accepted, 0).await;
        let b = insert(pool, "L2", ConfirmationStatus::Declined, 1).await;
        let c = insert(pool, "L3", ConfirmationStatus::Pending, 2).await;

        let entries = repository::fetch_entries(pool, KIND, None)
            .await
            .expect("Failed to fetch entries");
        let mut grouping = grouping::group_duplicates(KIND, entries);
        assert_eq!(grouping.groups.len(), 1);

        (vec![a, b, c], grouping.groups.remove(0))
    }

    fn apply_service(pool: &SqlitePool) -> ReconcileService {
        ReconcileService::new(pool.clone(), RunMode::Apply, ReconcileScope::default())
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_vanished_member_is_left_out_of_the_plan() {
        let pool = setup_test_db().await;
        let (rows, group) = scanned_group(&pool).await;
        let (a, b, c) = (&rows[0], &rows[1], &rows[2]);

        // someone deletes B between the scan and the write
        sqlx::query("DELETE FROM practicum_schedules WHERE id = ?")
            .bind(&b.id)
            .execute(&pool)
            .await
            .expect("Failed to delete row");

        let service = apply_service(&pool);
        let mut summary = TypeSummary::new(KIND);
        let plan = service
            .apply_group(KIND, &group, &mut summary)
            .await
            .expect("Failed to apply group")
            .expect("two rows still share the slot");

        assert_eq!(summary.stale_groups, 1);
        assert_eq!(plan.canonical_id, a.id);
        let merged: Vec<&str> = plan.merges.iter().map(|m| m.candidate_id.as_str()).collect();
        assert_eq!(merged, vec![c.id.as_str()]);
        assert_eq!(plan.final_state(), Some((ids(&["L1", "L3"]).as_slice(), "L3")));

        let left = repository::fetch_entries(&pool, KIND, None)
            .await
            .expect("Failed to fetch entries");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, a.id);
        assert_eq!(left[0].lecturer_id, "L3");
        assert_eq!(left[0].lecturer_chain, Some(ids(&["L1", "L3"])));
    }

    #[tokio::test]
    async fn test_rekeyed_member_is_left_out_of_the_plan() {
        let pool = setup_test_db().await;
        let (rows, group) = scanned_group(&pool).await;
        let (a, b, c) = (&rows[0], &rows[1], &rows[2]);

        // C moves to another room, so it no longer shares the slot
        sqlx::query("UPDATE practicum_schedules SET room_id = 6 WHERE id = ?")
            .bind(&c.id)
            .execute(&pool)
            .await
            .expect("Failed to move row");

        let service = apply_service(&pool);
        let mut summary = TypeSummary::new(KIND);
        let plan = service
            .apply_group(KIND, &group, &mut summary)
            .await
            .expect("Failed to apply group")
            .expect("two rows still share the slot");

        assert_eq!(summary.stale_groups, 1);
        let merged: Vec<&str> = plan.merges.iter().map(|m| m.candidate_id.as_str()).collect();
        assert_eq!(merged, vec![b.id.as_str()]);
        assert_eq!(plan.final_state(), Some((ids(&["L1", "L2"]).as_slice(), "L2")));

        let moved = repository::find_entry_by_id(&pool, KIND, &c.id)
            .await
            .expect("Failed to fetch entry")
            .expect("moved row survives");
        assert_eq!(moved.lecturer_id, "L3");
        assert_eq!(moved.room_id, 6);
        let kept = repository::find_entry_by_id(&pool, KIND, &a.id)
            .await
            .expect("Failed to fetch entry")
            .expect("canonical row survives");
        assert_eq!(kept.lecturer_id, "L2");
    }

    #[tokio::test]
    async fn test_group_with_one_survivor_is_not_written() {
        let pool = setup_test_db().await;
        let (rows, group) = scanned_group(&pool).await;

        sqlx::query("DELETE FROM practicum_schedules WHERE id IN (?, ?)")
            .bind(&rows[1].id)
            .bind(&rows[2].id)
            .execute(&pool)
            .await
            .expect("Failed to delete rows");

        let service = apply_service(&pool);
        let mut summary = TypeSummary::new(KIND);
        let plan = service
            .apply_group(KIND, &group, &mut summary)
            .await
            .expect("Failed to apply group");

        assert!(plan.is_none());
        assert_eq!(summary.stale_groups, 1);
        let kept = repository::find_entry_by_id(&pool, KIND, &rows[0].id)
            .await
            .expect("Failed to fetch entry")
            .expect("canonical row survives");
        assert_eq!(kept.lecturer_id, "L1");
        assert_eq!(kept.lecturer_chain, None);
    }

    #[tokio::test]
    async fn test_unchanged_group_is_not_stale() {
        let pool = setup_test_db().await;
        let (_, group) = scanned_group(&pool).await;

        let service = apply_service(&pool);
        let mut summary = TypeSummary::new(KIND);
        let plan = service
            .apply_group(KIND, &group, &mut summary)
            .await
            .expect("Failed to apply group")
            .expect("group still has duplicates");

        assert_eq!(summary.stale_groups, 0);
        assert_eq!(plan.merges.len(), 2);
        assert_eq!(plan.final_state(), Some((ids(&["L1", "L2", "L3"]).as_slice(), "L3")));
    }
}
