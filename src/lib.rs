// taskdeck - Task tracker client: remote task API sync, derived views, reminders and digest

pub mod adapter;
pub mod config;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod models;
pub mod notify;
pub mod prefs;
pub mod schedule;
pub mod store;
pub mod transfer;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use config::Config;
pub use error::{Result, TaskError, ValidationErrors};
pub use filter::{PriorityFilter, SortKey, StatusFilter, TimeFrame, ViewParams};
pub use gateway::{Gateway, HttpGateway};
pub use models::{Priority, Status, Task, TaskDraft};
pub use prefs::Prefs;
pub use schedule::{Clock, DailyAt, Scheduler, SystemClock};
pub use store::TaskStore;
pub use view::{Aggregates, Page, ViewState};
