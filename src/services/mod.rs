//! Services Layer
//!
//! Behaviour on top of the repositories. Every service receives its stores
//! (and clock) at construction.

pub mod backup;
pub mod checkins;
pub mod clock;
pub mod focus;
pub mod insights;
pub mod maintenance;
pub mod ranking;
pub mod task_tree;

pub use backup::{Backup, BackupService, ImportSummary, BACKUP_VERSION};
pub use checkins::CheckInJournal;
pub use clock::{Clock, ManualClock, SystemClock};
pub use focus::{Countdown, FocusTimer, PreSessionCheck, SessionEnd, StopOutcome, Tick, TimerStatus};
pub use insights::Insights;
pub use maintenance::{ClearSummary, Maintenance};
pub use ranking::{RankReport, RankingMode, TimeWindow};
pub use task_tree::TaskTreeEngine;
