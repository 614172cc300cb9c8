use std::collections::HashMap;

use tracing::warn;

use crate::models::{ScheduleEntry, ScheduleKind};
use crate::services::natural_key::{self, NaturalKey};

#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub key: NaturalKey,
    /// Retrieval order.
    pub members: Vec<ScheduleEntry>,
}

#[derive(Debug, Default)]
pub struct Grouping {
    pub groups: Vec<DuplicateGroup>,
    /// Rows skipped because a required key column is NULL.
    pub unkeyed: Vec<String>,
}

/// Partition `entries` by natural key in a single pass and keep only keys
/// shared by two or more rows. Groups come out in order of their first
/// member's position in `entries`.
pub fn group_duplicates(kind: ScheduleKind, entries: Vec<ScheduleEntry>) -> Grouping {
    let mut index: HashMap<NaturalKey, usize> = HashMap::new();
    let mut buckets: Vec<DuplicateGroup> = Vec::new();
    let mut unkeyed = Vec::new();

    for entry in entries {
        let key = match natural_key::extract(kind, &entry) {
            Ok(key) => key,
            Err(missing) => {
                warn!(
                    "Skipping {} schedule {}: {} is NULL",
                    kind,
                    entry.id,
                    missing.column()
                );
                unkeyed.push(entry.id);
                continue;
            }
        };

        match index.get(&key).copied() {
            Some(slot) => buckets[slot].members.push(entry),
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push(DuplicateGroup {
                    key,
                    members: vec![entry],
                });
            }
        }
    }

    Grouping {
        groups: buckets.into_iter().filter(|g| g.members.len() > 1).collect(),
        unkeyed,
    }
}
