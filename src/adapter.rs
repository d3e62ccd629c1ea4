// Conversion between the task API's wire form and the display form

use chrono::{DateTime, Utc};

use crate::models::{Priority, Status, Task, TaskDraft, WireDraft, WirePatch, WireTask};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";

pub fn priority_to_wire(priority: Priority) -> i64 {
    match priority {
        Priority::High => 3,
        Priority::Medium => 2,
        Priority::Low => 1,
    }
}

/// Ordinals above 3 read as High; zero, negatives and missing values read as Low
pub fn priority_from_wire(ordinal: Option<i64>) -> Priority {
    match ordinal {
        Some(n) if n >= 3 => Priority::High,
        Some(2) => Priority::Medium,
        _ => Priority::Low,
    }
}

pub fn status_to_wire(status: Status) -> &'static str {
    match status {
        Status::Complete => STATUS_COMPLETED,
        Status::InProgress => STATUS_IN_PROGRESS,
        Status::Incomplete => STATUS_PENDING,
    }
}

pub fn status_from_wire(status: Option<&str>) -> Status {
    match status {
        Some(STATUS_COMPLETED) => Status::Complete,
        Some(STATUS_IN_PROGRESS) => Status::InProgress,
        _ => Status::Incomplete,
    }
}

/// Create-request body for a draft
pub fn to_wire(draft: &TaskDraft) -> WireDraft {
    let draft = draft.normalized();
    WireDraft {
        description: (!draft.description.is_empty()).then(|| draft.description.clone()),
        priority: priority_to_wire(draft.priority),
        status: status_to_wire(draft.status).to_string(),
        due_date: draft.due_date,
        title: draft.title,
    }
}

/// Update-request body carrying every editable field of a draft
pub fn to_wire_patch(draft: &TaskDraft) -> WirePatch {
    let wire = to_wire(draft);
    WirePatch {
        title: Some(wire.title),
        description: Some(wire.description.unwrap_or_default()),
        priority: Some(wire.priority),
        status: Some(wire.status),
        due_date: Some(wire.due_date),
    }
}

/// Update-request body that only marks a task completed
pub fn completion_patch() -> WirePatch {
    WirePatch {
        status: Some(STATUS_COMPLETED.to_string()),
        ..Default::default()
    }
}

/// Convert a wire task to display form. Never fails.
///
/// `completed_at` comes from the wire `completed_at` when the server sends
/// one, else from `updated_at`, and only for tasks whose status is completed.
pub fn from_wire(wire: WireTask) -> Task {
    let status = status_from_wire(wire.status.as_deref());
    let completed_at = match status {
        Status::Complete => wire.completed_at.or(wire.updated_at),
        _ => None,
    };

    Task {
        id: wire.id,
        title: wire.title,
        description: wire.description.unwrap_or_default(),
        priority: priority_from_wire(wire.priority),
        status,
        created_at: wire.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        completed_at,
        due_date: wire.due_date,
    }
}
