//! cadence: schedule interchange & generation engine.
//!
//! The engine behind the project-management service: it decodes and encodes
//! the two legacy interchange formats used by third-party scheduling tools
//! (a tab-delimited record-block format and a nested XML business-object
//! format), and computes fully dated schedules from unordered skeletons via
//! a forward date-propagation sweep over a working-day calendar.
//!
//! Everything is synchronous and value-to-value: callers hand in bytes or
//! model values and get new values back. Identity, authorization, storage,
//! and prompt handling live in the surrounding collaborators.

pub mod calendar;
pub mod codec;
pub mod config;
pub mod encoding;
pub mod error;
pub mod log;
pub mod model;
pub mod scheduler;

pub use calendar::{WeekdayCalendar, WorkCalendar};
pub use codec::{FileHeader, ParseMeta, ParsedSchedule, SourceFormat};
pub use config::{EngineConfig, ExportConfig};
pub use error::{Error, Result};
pub use model::{
    Activity, ActivityId, ActivityKind, ActivityRef, IdRemap, Predecessor, RelationType, Resource,
    ResourceAssignment, Schedule, ScheduleId, WbsId, WbsNode,
};
pub use scheduler::{Skeleton, SkeletonActivity, SkeletonIssue, SkeletonWbs};
