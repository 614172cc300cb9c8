use std::collections::HashSet;

use serde::Serialize;

use crate::models::{ConfirmationStatus, LecturerId, ScheduleEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeReason {
    Declined,
    Newer,
}

/// Chain and primary lecturer of the canonical row after one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainMerge {
    pub chain: Vec<LecturerId>,
    pub lecturer_id: LecturerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeDecision {
    pub candidate_id: String,
    pub canonical_id: String,
    pub candidate_lecturer_id: LecturerId,
    pub reason: MergeReason,
    pub chain: Vec<LecturerId>,
    pub lecturer_id: LecturerId,
}

impl MergeDecision {
    pub fn audit_line(&self) -> String {
        format!(
            "duplicate {} merged into {}",
            self.candidate_id, self.canonical_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    pub canonical_id: String,
    pub original_lecturer_id: LecturerId,
    /// In merge order; each carries the canonical state right after it.
    pub merges: Vec<MergeDecision>,
    /// Candidates that did not qualify and stay in the table.
    pub skipped: Vec<String>,
}

impl GroupPlan {
    /// State to persist on the canonical row, if anything merged.
    pub fn final_state(&self) -> Option<(&[LecturerId], &str)> {
        self.merges
            .last()
            .map(|m| (m.chain.as_slice(), m.lecturer_id.as_str()))
    }
}

/// Order members by creation time and split off the earliest as canonical.
/// The sort is stable, so equal timestamps keep their retrieval order.
pub fn select_canonical(
    mut members: Vec<ScheduleEntry>,
) -> Option<(ScheduleEntry, Vec<ScheduleEntry>)> {
    if members.is_empty() {
        return None;
    }
    members.sort_by_key(|e| e.created_at);
    let canonical = members.remove(0);
    Some((canonical, members))
}

/// A candidate is a substitution record if it was declined, or, for rows
/// older than the status column, if it was created after the canonical row.
pub fn qualifies(canonical: &ScheduleEntry, candidate: &ScheduleEntry) -> Option<MergeReason> {
    if candidate.status == ConfirmationStatus::Declined {
        Some(MergeReason::Declined)
    } else if candidate.created_at > canonical.created_at {
        Some(MergeReason::Newer)
    } else {
        None
    }
}

/// Fold one substitute into a lecturer chain.
///
/// `anchor` is the canonical row's originally assigned lecturer and always
/// ends up at position 0; `incoming` is appended unless already present. An
/// absent or empty chain starts as `[anchor]`. Repeated ids are collapsed to
/// their first occurrence.
pub fn merge_chain(current: Option<&[LecturerId]>, anchor: &str, incoming: &str) -> ChainMerge {
    let mut chain: Vec<LecturerId> = match current {
        Some(c) if !c.is_empty() => c.to_vec(),
        _ => vec![anchor.to_string()],
    };

    chain.retain(|l| l != anchor);
    chain.insert(0, anchor.to_string());

    let mut seen = HashSet::new();
    chain.retain(|l| seen.insert(l.clone()));

    if !chain.iter().any(|l| l == incoming) {
        chain.push(incoming.to_string());
    }

    let lecturer_id = chain
        .last()
        .cloned()
        .unwrap_or_else(|| anchor.to_string());

    ChainMerge { chain, lecturer_id }
}

/// Decide every merge for one duplicate group without touching storage.
pub fn plan_group(members: Vec<ScheduleEntry>) -> Option<GroupPlan> {
    let (canonical, candidates) = select_canonical(members)?;

    let anchor = canonical.lecturer_id.clone();
    let mut chain = canonical.lecturer_chain.clone();
    let mut merges = Vec::new();
    let mut skipped = Vec::new();

    for candidate in candidates {
        let Some(reason) = qualifies(&canonical, &candidate) else {
            skipped.push(candidate.id);
            continue;
        };

        let merged = merge_chain(chain.as_deref(), &anchor, &candidate.lecturer_id);
        chain = Some(merged.chain.clone());
        merges.push(MergeDecision {
            candidate_id: candidate.id,
            canonical_id: canonical.id.clone(),
            candidate_lecturer_id: candidate.lecturer_id,
            reason,
            chain: merged.chain,
            lecturer_id: merged.lecturer_id,
        });
    }

    Some(GroupPlan {
        canonical_id: canonical.id,
        original_lecturer_id: anchor,
        merges,
        skipped,
    })
}
