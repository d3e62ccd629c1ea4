// Backup export and bulk import of tasks

use chrono::NaiveDate;
use fs2::FileExt;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter;
use crate::error::{Result, TaskError};
use crate::gateway::Gateway;
use crate::models::{Priority, Status, Task, TaskDraft, parse_timestamp};
use crate::store::TaskStore;

/// Serialization used for a backup file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Pretty-printed JSON array
    Json,
    /// One task per line
    JsonLines,
}

impl Format {
    /// JSON Lines for `.jsonl` paths, JSON otherwise
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("jsonl") => Format::JsonLines,
            _ => Format::Json,
        }
    }
}

/// `tasks-backup-YYYY-MM-DD.json`
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("tasks-backup-{}.json", date.format("%Y-%m-%d"))
}

pub fn export_json(tasks: &[Task]) -> Result<String> {
    Ok(serde_json::to_string_pretty(tasks)?)
}

pub fn export_jsonl(tasks: &[Task]) -> Result<String> {
    let mut out = String::new();
    for task in tasks {
        out.push_str(&serde_json::to_string(task)?);
        out.push('\n');
    }
    Ok(out)
}

/// Write a backup of `tasks`.
///
/// When `path` is a directory the file is named after `today`. Returns the
/// path written.
pub fn write_export(path: &Path, tasks: &[Task], today: NaiveDate) -> Result<PathBuf> {
    let target = if path.is_dir() {
        path.join(backup_file_name(today))
    } else {
        path.to_path_buf()
    };

    let content = match Format::for_path(&target) {
        Format::Json => export_json(tasks)?,
        Format::JsonLines => export_jsonl(tasks)?,
    };

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&target)?;
    file.lock_exclusive()?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    info!(path = %target.display(), count = tasks.len(), "Exported tasks");
    Ok(target)
}

/// Draft from one imported element; absent or unreadable fields default
pub fn draft_from_value(value: &Value) -> TaskDraft {
    let text = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

    let priority = match value.get("priority") {
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        Some(Value::Number(n)) => adapter::priority_from_wire(n.as_i64()),
        _ => Priority::default(),
    };
    let status = match value.get("status") {
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        _ => Status::default(),
    };
    let due_date = value
        .get("dueDate")
        .or_else(|| value.get("due_date"))
        .and_then(parse_timestamp);

    TaskDraft {
        title: text("title"),
        description: text("description"),
        priority,
        status,
        due_date,
    }
}

/// Drafts from a JSON array; anything other than an array is rejected whole
pub fn parse_import(text: &str) -> Result<Vec<TaskDraft>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| TaskError::MalformedImport(format!("not valid JSON: {}", e)))?;

    match value {
        Value::Array(items) => Ok(items.iter().map(draft_from_value).collect()),
        _ => Err(TaskError::MalformedImport(
            "expected a JSON array of tasks".to_string(),
        )),
    }
}

/// Drafts from JSON Lines; unreadable lines are skipped with a warning
pub fn parse_import_jsonl(text: &str) -> Result<Vec<TaskDraft>> {
    let mut drafts = Vec::new();
    let mut skipped = 0;

    for (line_num, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => drafts.push(draft_from_value(&value)),
            Err(e) => {
                skipped += 1;
                warn!(line = line_num + 1, error = ?e, "Failed to parse JSON, skipping");
            }
        }
    }

    if drafts.is_empty() && skipped > 0 {
        return Err(TaskError::MalformedImport(format!("no readable lines ({} skipped)", skipped)));
    }
    Ok(drafts)
}

/// Outcome of an import batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Correlates the batch's log lines
    pub batch: Uuid,
    pub attempted: usize,
    pub created: usize,
    pub failed: usize,
}

/// Create each draft in order; failures are logged and skipped
pub async fn import_drafts<G: Gateway>(store: &TaskStore<G>, drafts: Vec<TaskDraft>) -> ImportReport {
    let batch = Uuid::now_v7();
    let mut report = ImportReport {
        batch,
        attempted: drafts.len(),
        created: 0,
        failed: 0,
    };
    info!(%batch, count = drafts.len(), "Importing tasks");

    for (index, draft) in drafts.iter().enumerate() {
        match store.create(draft).await {
            Ok(task) => {
                report.created += 1;
                debug!(%batch, index, id = %task.id, "Imported task");
            }
            Err(e) => {
                report.failed += 1;
                warn!(%batch, index, title = %draft.title, error = %e.user_message(), "Failed to import task");
            }
        }
    }

    info!(%batch, created = report.created, failed = report.failed, "Import finished");
    report
}

/// Read a backup file and import its tasks
pub async fn import_file<G: Gateway>(store: &TaskStore<G>, path: &Path) -> Result<ImportReport> {
    let text = fs::read_to_string(path)?;
    let drafts = match Format::for_path(path) {
        Format::Json => parse_import(&text)?,
        Format::JsonLines => parse_import_jsonl(&text)?,
    };
    Ok(import_drafts(store, drafts).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryGateway;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn task(id: &str, title: &str, priority: Priority, status: Status) -> Task {
        let created = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{} details", title),
            priority,
            status,
            created_at: created,
            completed_at: (status == Status::Complete).then_some(created),
            due_date: None,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task("1", "Draft plan", Priority::High, Status::InProgress),
            task("2", "Send invoice", Priority::Low, Status::Complete),
        ]
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    #[test]
    fn test_backup_file_name() {
        assert_eq!(backup_file_name(date()), "tasks-backup-2025-06-02.json");
    }

    #[test]
    fn test_export_to_directory_uses_backup_name() {
        let temp = TempDir::new().unwrap();
        let written = write_export(temp.path(), &sample(), date()).unwrap();

        assert_eq!(written, temp.path().join("tasks-backup-2025-06-02.json"));
        let content = fs::read_to_string(&written).unwrap();
        assert!(content.contains("\n  {"), "export should be pretty-printed");

        let parsed: Vec<Task> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_export_jsonl_by_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out").join("tasks.jsonl");
        write_export(&path, &sample(), date()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"title\":\"Draft plan\""));
        assert!(lines[1].contains("\"status\":\"Complete\""));
    }

    #[test]
    fn test_export_overwrites_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("backup.json");
        fs::write(&path, "x".repeat(10_000)).unwrap();

        write_export(&path, &[], date()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_draft_defaults() {
        let draft = draft_from_value(&serde_json::json!({ "title": "Only a title" }));
        assert_eq!(draft.title, "Only a title");
        assert_eq!(draft.description, "");
        assert_eq!(draft.priority, Priority::Medium);
        assert_eq!(draft.status, Status::Incomplete);
        assert_eq!(draft.due_date, None);
    }

    #[test]
    fn test_draft_accepts_labels_and_ordinals() {
        let draft = draft_from_value(&serde_json::json!({
            "title": "Mixed",
            "priority": 3,
            "status": "In Progress",
            "dueDate": "2025-07-01T00:00:00Z"
        }));
        assert_eq!(draft.priority, Priority::High);
        assert_eq!(draft.status, Status::InProgress);
        assert_eq!(draft.due_date, Some(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()));

        let draft = draft_from_value(&serde_json::json!({ "title": "x", "priority": "urgent", "status": 5 }));
        assert_eq!(draft.priority, Priority::Medium);
        assert_eq!(draft.status, Status::Incomplete);
    }

    #[test]
    fn test_parse_import_requires_array() {
        assert!(matches!(
            parse_import(r#"{"title":"single"}"#),
            Err(TaskError::MalformedImport(_))
        ));
        assert!(matches!(parse_import("not json"), Err(TaskError::MalformedImport(_))));
        assert_eq!(parse_import("[]").unwrap(), Vec::new());
    }

    #[test]
    fn test_parse_import_jsonl_skips_bad_lines() {
        let drafts = parse_import_jsonl("{\"title\":\"A\"}\n{broken}\n\n{\"title\":\"B\"}\n").unwrap();
        let titles: Vec<&str> = drafts.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);

        assert!(matches!(
            parse_import_jsonl("{broken}\nalso broken\n"),
            Err(TaskError::MalformedImport(_))
        ));
    }

    #[tokio::test]
    async fn test_import_counts_failures_and_continues() {
        let gateway = MemoryGateway::new();
        gateway.reject_title("Rejected").await;
        let store = TaskStore::new(gateway);

        let drafts = parse_import(
            r#"[
                {"title": "First"},
                {"title": ""},
                {"title": "Rejected"},
                {"title": "Last", "priority": "High"}
            ]"#,
        )
        .unwrap();
        let report = import_drafts(&store, drafts).await;

        assert_eq!(report.attempted, 4);
        assert_eq!(report.created, 2);
        assert_eq!(report.failed, 2);

        let titles: Vec<String> = store.snapshot().await.into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["Last", "First"]);
    }

    #[tokio::test]
    async fn test_backup_restores_into_empty_store() {
        let temp = TempDir::new().unwrap();
        let written = write_export(temp.path(), &sample(), date()).unwrap();

        let store = TaskStore::new(MemoryGateway::new());
        let report = import_file(&store, &written).await.unwrap();
        assert_eq!(report.created, 2);

        let restored = store.snapshot().await;
        let done = restored.iter().find(|t| t.title == "Send invoice").unwrap();
        assert_eq!(done.status, Status::Complete);
        assert_eq!(done.priority, Priority::Low);
        assert_eq!(done.description, "Send invoice details");
    }

    #[tokio::test]
    async fn test_import_malformed_file_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        fs::write(&path, r#"{"tasks": []}"#).unwrap();

        let store = TaskStore::new(MemoryGateway::new());
        let err = import_file(&store, &path).await.unwrap_err();
        assert!(matches!(err, TaskError::MalformedImport(_)));
        assert_eq!(store.gateway().call_count(), 0);
    }
}
