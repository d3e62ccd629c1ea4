// In-memory gateway used by unit tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::error::{Result, TaskError};
use crate::gateway::Gateway;
use crate::models::{WireDraft, WirePatch, WireTask};

/// Gateway holding tasks in memory, with switchable failures
#[derive(Default)]
pub(crate) struct MemoryGateway {
    tasks: Mutex<Vec<WireTask>>,
    next_id: AtomicUsize,
    fail_with: Mutex<Option<(u16, String)>>,
    /// Titles rejected by `create`, for per-item failure tests
    reject_titles: Mutex<Vec<String>>,
    calls: AtomicUsize,
    clock: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<WireTask>) -> Self {
        let gw = Self::new();
        gw.next_id.store(tasks.len(), Ordering::SeqCst);
        *gw.tasks.try_lock().unwrap() = tasks;
        gw
    }

    /// Every following call fails with this status and server message
    pub async fn fail(&self, status: u16, message: &str) {
        *self.fail_with.lock().await = Some((status, message.to_string()));
    }

    pub async fn recover(&self) {
        *self.fail_with.lock().await = None;
    }

    pub async fn reject_title(&self, title: &str) {
        self.reject_titles.lock().await.push(title.to_string());
    }

    /// Server time used for timestamps instead of the real clock
    pub async fn set_now(&self, now: DateTime<Utc>) {
        *self.clock.lock().await = Some(now);
    }

    pub async fn server_tasks(&self) -> Vec<WireTask> {
        self.tasks.lock().await.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<DateTime<Utc>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if let Some((status, message)) = self.fail_with.lock().await.clone() {
            return Err(TaskError::Gateway { status, message });
        }
        Ok(self.clock.lock().await.unwrap_or_else(Utc::now))
    }

    fn not_found(id: &str) -> TaskError {
        TaskError::Gateway {
            status: 404,
            message: format!("Task {} not found", id),
        }
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn list(&self) -> Result<Vec<WireTask>> {
        self.enter().await?;
        Ok(self.tasks.lock().await.clone())
    }

    async fn list_today(&self) -> Result<Vec<WireTask>> {
        let now = self.enter().await?;
        let today = now.date_naive();
        Ok(self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.created_at.map(|c| c.date_naive()) == Some(today))
            .cloned()
            .collect())
    }

    async fn list_by_status(&self, status: &str) -> Result<Vec<WireTask>> {
        self.enter().await?;
        Ok(self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.status.as_deref() == Some(status))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<WireTask> {
        self.enter().await?;
        self.tasks
            .lock()
            .await
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn create(&self, body: &WireDraft) -> Result<WireTask> {
        let now = self.enter().await?;
        if self.reject_titles.lock().await.contains(&body.title) {
            return Err(TaskError::Gateway {
                status: 422,
                message: format!("Rejected title: {}", body.title),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let task = WireTask {
            id: id.to_string(),
            title: body.title.clone(),
            description: body.description.clone(),
            priority: Some(body.priority),
            status: Some(body.status.clone()),
            due_date: body.due_date,
            created_at: Some(now),
            updated_at: Some(now),
            completed_at: None,
        };
        self.tasks.lock().await.insert(0, task.clone());
        Ok(task)
    }

    async fn update(&self, id: &str, patch: &WirePatch) -> Result<WireTask> {
        let now = self.enter().await?;
        let mut tasks = self.tasks.lock().await;
        let task = tasks.iter_mut().find(|t| t.id == id).ok_or_else(|| Self::not_found(id))?;

        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = Some(description.clone());
        }
        if let Some(priority) = patch.priority {
            task.priority = Some(priority);
        }
        if let Some(status) = &patch.status {
            task.status = Some(status.clone());
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        task.updated_at = Some(now);
        Ok(task.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.enter().await?;
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}
