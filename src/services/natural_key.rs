use std::fmt;

use crate::models::{Discriminator, ScheduleEntry, ScheduleKind};

/// Composite identity of a schedule slot. Discriminators the kind does not key
/// on are always `None`; for the ones it does, `None` is a real value that
/// only matches another `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub room_id: i64,
    pub module_id: Option<i64>,
    pub course_code: Option<String>,
    pub category_id: Option<i64>,
    pub small_group_id: Option<i64>,
}

fn is_set(entry: &ScheduleEntry, d: Discriminator) -> bool {
    match d {
        Discriminator::Module => entry.module_id.is_some(),
        Discriminator::CourseCode => entry.course_code.is_some(),
        Discriminator::Category => entry.category_id.is_some(),
        Discriminator::SmallGroup => entry.small_group_id.is_some(),
    }
}

/// Build the key for `entry`. Fails with the first required discriminator that
/// is NULL on the row; such a row cannot be matched against anything.
pub fn extract(kind: ScheduleKind, entry: &ScheduleEntry) -> Result<NaturalKey, Discriminator> {
    let spec = kind.spec();

    if let Some(missing) = spec
        .discriminators
        .iter()
        .copied()
        .find(|d| !spec.is_nullable(*d) && !is_set(entry, *d))
    {
        return Err(missing);
    }

    Ok(NaturalKey {
        date: entry.date.clone(),
        start_time: entry.start_time.clone(),
        end_time: entry.end_time.clone(),
        room_id: entry.room_id,
        module_id: entry.module_id.filter(|_| spec.has(Discriminator::Module)),
        course_code: entry
            .course_code
            .clone()
            .filter(|_| spec.has(Discriminator::CourseCode)),
        category_id: entry.category_id.filter(|_| spec.has(Discriminator::Category)),
        small_group_id: entry
            .small_group_id
            .filter(|_| spec.has(Discriminator::SmallGroup)),
    })
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{} room {}",
            self.date, self.start_time, self.end_time, self.room_id
        )?;
        if let Some(m) = self.module_id {
            write!(f, " module {}", m)?;
        }
        if let Some(c) = &self.course_code {
            write!(f, " course {}", c)?;
        }
        if let Some(c) = self.category_id {
            write!(f, " category {}", c)?;
        }
        if let Some(g) = self.small_group_id {
            write!(f, " group {}", g)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConfirmationStatus;
    use chrono::{TimeZone, Utc};

    fn entry(group: Option<i64>) -> ScheduleEntry {
        ScheduleEntry {
            id: "a".to_string(),
            semester_id: None,
            date: "2025-03-10".to_string(),
            start_time: "08:00".to_string(),
            end_time: "10:00".to_string(),
            room_id: 5,
            module_id: Some(7),
            course_code: Some("MKA001".to_string()),
            category_id: Some(2),
            small_group_id: group,
            lecturer_id: "L1".to_string(),
            lecturer_chain: None,
            status: ConfirmationStatus::Accepted,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn null_group_matches_only_null_group() {
        for kind in ScheduleKind::ALL {
            if !kind.spec().is_nullable(Discriminator::SmallGroup) {
                continue;
            }
            let without_a = extract(kind, &entry(None)).unwrap();
            let without_b = extract(kind, &entry(None)).unwrap();
            let with = extract(kind, &entry(Some(3))).unwrap();
            assert_eq!(without_a, without_b, "{}", kind);
            assert_ne!(without_a, with, "{}", kind);
        }
    }

    #[test]
    fn unused_columns_do_not_split_keys() {
        let mut a = entry(Some(1));
        let mut b = entry(Some(2));
        a.module_id = Some(1);
        b.module_id = Some(2);
        // large lectures key on course code only
        assert_eq!(
            extract(ScheduleKind::LargeLecture, &a),
            extract(ScheduleKind::LargeLecture, &b)
        );
        assert_ne!(
            extract(ScheduleKind::SmallGroupTutorial, &a),
            extract(ScheduleKind::SmallGroupTutorial, &b)
        );
    }

    #[test]
    fn missing_required_discriminator_has_no_key() {
        let mut e = entry(None);
        e.course_code = None;
        assert_eq!(
            extract(ScheduleKind::LargeLecture, &e),
            Err(Discriminator::CourseCode)
        );
        // tutorials do not key on course code
        assert!(extract(ScheduleKind::SmallGroupTutorial, &e).is_ok());
    }

    #[test]
    fn slot_fields_always_participate() {
        let a = entry(None);
        let mut b = entry(None);
        b.room_id = 6;
        assert_ne!(
            extract(ScheduleKind::Practicum, &a),
            extract(ScheduleKind::Practicum, &b)
        );
    }
}
