use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Optional natural-key columns that distinguish two sessions sharing a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discriminator {
    Module,
    CourseCode,
    Category,
    SmallGroup,
}

impl Discriminator {
    pub const ALL: [Discriminator; 4] = [
        Discriminator::Module,
        Discriminator::CourseCode,
        Discriminator::Category,
        Discriminator::SmallGroup,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Discriminator::Module => "module_id",
            Discriminator::CourseCode => "course_code",
            Discriminator::Category => "category_id",
            Discriminator::SmallGroup => "small_group_id",
        }
    }
}

/// Per-kind wiring for the generic reconciliation pass.
#[derive(Debug)]
pub struct TableSpec {
    pub table: &'static str,
    pub label: &'static str,
    pub discriminators: &'static [Discriminator],
    /// Subset of `discriminators` where NULL is a legitimate key value.
    pub nullable: &'static [Discriminator],
}

impl TableSpec {
    pub fn has(&self, d: Discriminator) -> bool {
        self.discriminators.contains(&d)
    }

    pub fn is_nullable(&self, d: Discriminator) -> bool {
        self.nullable.contains(&d)
    }
}

const LARGE_LECTURE: TableSpec = TableSpec {
    table: "large_lecture_schedules",
    label: "Large lecture",
    discriminators: &[Discriminator::CourseCode],
    nullable: &[],
};

const PRACTICUM: TableSpec = TableSpec {
    table: "practicum_schedules",
    label: "Practicum",
    discriminators: &[Discriminator::CourseCode, Discriminator::SmallGroup],
    nullable: &[Discriminator::SmallGroup],
};

const TUTORIAL: TableSpec = TableSpec {
    table: "tutorial_schedules",
    label: "Small-group tutorial",
    discriminators: &[Discriminator::Module, Discriminator::SmallGroup],
    nullable: &[Discriminator::SmallGroup],
};

const SKILLS_LAB: TableSpec = TableSpec {
    table: "skills_lab_schedules",
    label: "Skills lab",
    discriminators: &[Discriminator::Category, Discriminator::SmallGroup],
    nullable: &[Discriminator::SmallGroup],
};

const JOURNAL_READING: TableSpec = TableSpec {
    table: "journal_reading_schedules",
    label: "Journal reading",
    discriminators: &[Discriminator::CourseCode, Discriminator::SmallGroup],
    nullable: &[Discriminator::SmallGroup],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleKind {
    LargeLecture,
    Practicum,
    SmallGroupTutorial,
    SkillsLab,
    JournalReading,
}

impl ScheduleKind {
    pub const ALL: [ScheduleKind; 5] = [
        ScheduleKind::LargeLecture,
        ScheduleKind::Practicum,
        ScheduleKind::SmallGroupTutorial,
        ScheduleKind::SkillsLab,
        ScheduleKind::JournalReading,
    ];

    pub fn spec(self) -> &'static TableSpec {
        match self {
            ScheduleKind::LargeLecture => &LARGE_LECTURE,
            ScheduleKind::Practicum => &PRACTICUM,
            ScheduleKind::SmallGroupTutorial => &TUTORIAL,
            ScheduleKind::SkillsLab => &SKILLS_LAB,
            ScheduleKind::JournalReading => &JOURNAL_READING,
        }
    }

    pub fn table(self) -> &'static str {
        self.spec().table
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn slug(self) -> &'static str {
        match self {
            ScheduleKind::LargeLecture => "large-lecture",
            ScheduleKind::Practicum => "practicum",
            ScheduleKind::SmallGroupTutorial => "tutorial",
            ScheduleKind::SkillsLab => "skills-lab",
            ScheduleKind::JournalReading => "journal-reading",
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ScheduleKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = ScheduleKind::ALL.iter().map(|k| k.slug()).collect();
                format!("unknown schedule type '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_columns_are_discriminators() {
        for kind in ScheduleKind::ALL {
            let spec = kind.spec();
            for d in spec.nullable {
                assert!(spec.has(*d), "{} lists {:?} as nullable but not as a key", kind, d);
            }
        }
    }

    #[test]
    fn parses_slugs() {
        assert_eq!("skills-lab".parse::<ScheduleKind>(), Ok(ScheduleKind::SkillsLab));
        assert_eq!(" Tutorial ".parse::<ScheduleKind>(), Ok(ScheduleKind::SmallGroupTutorial));
        assert!("wipe".parse::<ScheduleKind>().is_err());
    }
}
