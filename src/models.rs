// Data models for taskdeck: display form, wire form, and drafts

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Field, ValidationErrors};

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Task priority as shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "1" => Ok(Priority::Low),
            "medium" | "2" => Ok(Priority::Medium),
            "high" | "3" => Ok(Priority::High),
            other => Err(format!("unknown priority: {} (expected low, medium or high)", other)),
        }
    }
}

/// Task status as shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Incomplete,
    #[serde(rename = "In Progress")]
    InProgress,
    Complete,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Incomplete, Status::InProgress, Status::Complete];

    pub fn label(self) -> &'static str {
        match self {
            Status::Incomplete => "Incomplete",
            Status::InProgress => "In Progress",
            Status::Complete => "Complete",
        }
    }

    pub fn is_pending(self) -> bool {
        !matches!(self, Status::Complete)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "incomplete" | "pending" | "todo" => Ok(Status::Incomplete),
            "in progress" | "inprogress" | "doing" => Ok(Status::InProgress),
            "complete" | "completed" | "done" => Ok(Status::Complete),
            other => Err(format!(
                "unknown status: {} (expected incomplete, in-progress or complete)",
                other
            )),
        }
    }
}

/// Task in display form, owned by the task store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: Status,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl Task {
    /// Move to a new status, keeping `completed_at` set exactly while Complete.
    ///
    /// An existing completion time survives repeated completion.
    pub fn set_status(&mut self, status: Status, now: DateTime<Utc>) {
        self.status = status;
        self.completed_at = match status {
            Status::Complete => self.completed_at.or(Some(now)),
            _ => None,
        };
    }

    pub fn is_complete(&self) -> bool {
        self.status == Status::Complete
    }

    /// Editable fields of this task
    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            status: self.status,
            due_date: self.due_date,
        }
    }
}

/// User-supplied task payload, before an id or server timestamps exist
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Copy with surrounding whitespace removed from text fields
    pub fn normalized(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            ..self.clone()
        }
    }

    /// Check field limits on the normalized draft
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let draft = self.normalized();
        let mut errors = ValidationErrors::new();

        if draft.title.is_empty() {
            errors.push(Field::Title, "Task Title is required");
        } else if draft.title.chars().count() > TITLE_MAX_CHARS {
            errors.push(Field::Title, "Task Title cannot exceed 100 characters");
        }

        if draft.description.chars().count() > DESCRIPTION_MAX_CHARS {
            errors.push(Field::Description, "Description cannot exceed 500 characters");
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Task as exchanged with the remote task API
///
/// Every field except `id` may be absent; the adapter fills defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireTask {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_ordinal")]
    pub priority: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Body of a create request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: i64,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
}

/// Body of an update request; absent fields are left untouched by the server
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WirePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// `Some(None)` sends an explicit null, clearing the due date
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present_or_null")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Parse the timestamp shapes task APIs commonly emit.
///
/// Accepts RFC 3339, naive date-times (taken as UTC), bare dates (midnight
/// UTC), and integer milliseconds since the epoch.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid task id: {}", other))),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_ordinal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Distinguishes a field sent as `null` (`Some(None)`) from an absent one (`None`)
fn present_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error> {
    Ok(Some(Option::<DateTime<Utc>>::deserialize(deserializer)?))
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&Status::InProgress).unwrap(), "\"In Progress\"");
        assert_eq!(serde_json::to_string(&Status::Complete).unwrap(), "\"Complete\"");
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"High\"");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("in-progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("In Progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("done".parse::<Status>().unwrap(), Status::Complete);
        assert_eq!("pending".parse::<Status>().unwrap(), Status::Incomplete);
        assert!("later".parse::<Status>().is_err());
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("2".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_draft_defaults() {
        let draft = TaskDraft::new("Write report");
        assert_eq!(draft.priority, Priority::Medium);
        assert_eq!(draft.status, Status::Incomplete);
        assert!(draft.description.is_empty());
        assert!(draft.due_date.is_none());
    }

    #[test]
    fn test_draft_validation() {
        assert!(TaskDraft::new("Ok").validate().is_ok());

        let errors = TaskDraft::new("   ").validate().unwrap_err();
        assert_eq!(errors.get(Field::Title), Some("Task Title is required"));

        let errors = TaskDraft::new("x".repeat(101)).validate().unwrap_err();
        assert_eq!(errors.get(Field::Title), Some("Task Title cannot exceed 100 characters"));

        // Surrounding whitespace does not count toward the limit
        assert!(TaskDraft::new(format!("  {}  ", "x".repeat(100))).validate().is_ok());

        let errors = TaskDraft::new("Ok")
            .with_description("d".repeat(501))
            .validate()
            .unwrap_err();
        assert_eq!(errors.get(Field::Title), None);
        assert_eq!(
            errors.get(Field::Description),
            Some("Description cannot exceed 500 characters")
        );
    }

    #[test]
    fn test_set_status_completed_at() {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let first = Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 1, 3, 9, 0, 0).unwrap();
        let mut task = Task {
            id: "1".to_string(),
            title: "Task".to_string(),
            description: String::new(),
            priority: Priority::Low,
            status: Status::Incomplete,
            created_at: created,
            completed_at: None,
            due_date: None,
        };

        task.set_status(Status::Complete, first);
        assert_eq!(task.completed_at, Some(first));

        task.set_status(Status::Complete, later);
        assert_eq!(task.completed_at, Some(first));

        task.set_status(Status::InProgress, later);
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn test_wire_task_lenient_decode() {
        let wire: WireTask = serde_json::from_str(
            r#"{"id":42,"title":"Pay rent","priority":"3","status":"completed",
                "due_date":"2025-11-20","created_at":"2025-11-10T08:30:00.000Z",
                "updated_at":1731234567000,"extra":"ignored"}"#,
        )
        .unwrap();

        assert_eq!(wire.id, "42");
        assert_eq!(wire.priority, Some(3));
        assert_eq!(wire.status.as_deref(), Some("completed"));
        assert_eq!(wire.due_date, Some(Utc.with_ymd_and_hms(2025, 11, 20, 0, 0, 0).unwrap()));
        assert_eq!(
            wire.created_at,
            Some(Utc.with_ymd_and_hms(2025, 11, 10, 8, 30, 0).unwrap())
        );
        assert_eq!(wire.updated_at, DateTime::from_timestamp_millis(1_731_234_567_000));
        assert!(wire.description.is_none());
    }

    #[test]
    fn test_wire_task_garbage_fields_degrade() {
        let wire: WireTask =
            serde_json::from_str(r#"{"id":"a","priority":{"x":1},"status":null,"created_at":"yesterday"}"#)
                .unwrap();
        assert_eq!(wire.title, "");
        assert_eq!(wire.priority, None);
        assert_eq!(wire.status, None);
        assert_eq!(wire.created_at, None);
    }

    #[test]
    fn test_wire_patch_skips_absent_fields() {
        let patch = WirePatch {
            status: Some("completed".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"status":"completed"}"#);
    }

    #[test]
    fn test_task_display_serialization_is_camel_case() {
        let task = Task {
            id: "1".to_string(),
            title: "T".to_string(),
            description: String::new(),
            priority: Priority::High,
            status: Status::InProgress,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            completed_at: None,
            due_date: None,
        };
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"completedAt\":null"));
        assert!(json.contains("\"status\":\"In Progress\""));
    }
}
