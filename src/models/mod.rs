pub mod kind;
pub mod schedule;

pub use kind::{Discriminator, ScheduleKind, TableSpec};
pub use schedule::{ConfirmationStatus, LecturerId, NewScheduleEntry, ScheduleEntry, ScheduleRow};
