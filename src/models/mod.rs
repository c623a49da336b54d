pub mod application;
pub mod group;
pub mod limit;
pub mod schedule;

pub use application::{AppKey, TrackedApplication};
pub use group::ApplicationGroup;
pub use limit::{LimitKind, LimitRule, QuotaTarget};
pub use schedule::{TimeWindow, WeeklySchedule};
