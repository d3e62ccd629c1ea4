// Task store: the canonical task collection, kept in step with the task API

use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::adapter::{self, from_wire};
use crate::error::{Result, TaskError};
use crate::gateway::Gateway;
use crate::models::{Status, Task, TaskDraft, WirePatch};

/// Owner of the in-memory task collection.
///
/// Every mutation goes through the gateway and is applied only once the
/// server has answered, so the collection always holds confirmed records.
/// Operations take `&self` and may overlap when the store is shared through
/// an `Arc`; no lock is held while a request is in flight.
pub struct TaskStore<G: Gateway> {
    gateway: G,
    state: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: Vec<Task>,
    in_flight: usize,
    last_error: Option<String>,
}

impl StoreState {
    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Finish one operation, recording its failure if any
    fn settle<T>(&mut self, action: &str, result: &Result<T>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if let Err(err) = result {
            let message = err.user_message();
            warn!(action, error = %message, "Task operation failed");
            self.last_error = Some(message);
        }
    }

    /// Insert a new record at the front, or replace one already known by id
    fn upsert_front(&mut self, task: Task) -> Task {
        match self.position(&task.id) {
            Some(idx) => {
                let task = reconcile(task, Some(&self.tasks[idx]));
                self.tasks[idx] = task.clone();
                task
            }
            None => {
                let task = reconcile(task, None);
                self.tasks.insert(0, task.clone());
                task
            }
        }
    }
}

/// Keep a known completion time and enforce `completed_at` iff Complete
fn reconcile(mut task: Task, previous: Option<&Task>) -> Task {
    let known = previous.filter(|p| p.is_complete()).and_then(|p| p.completed_at);
    if task.is_complete() && known.is_some() {
        task.completed_at = known;
    }
    let status = task.status;
    task.set_status(status, Utc::now());
    task
}

impl<G: Gateway> TaskStore<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // ========================================================================
    // Read access
    // ========================================================================

    /// Copy of the current collection
    pub async fn snapshot(&self) -> Vec<Task> {
        self.state.read().await.tasks.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        let state = self.state.read().await;
        state.position(id).map(|idx| state.tasks[idx].clone())
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// True while any operation awaits the gateway
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.in_flight > 0
    }

    /// Message of the most recent failed operation
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub async fn clear_error(&self) {
        self.state.write().await.last_error = None;
    }

    async fn begin(&self) {
        let mut state = self.state.write().await;
        state.in_flight += 1;
        state.last_error = None;
    }

    // ========================================================================
    // Synchronization
    // ========================================================================

    /// Replace the collection with the server's full task list.
    ///
    /// Returns the number of tasks loaded. On failure the collection is
    /// left as it was.
    pub async fn refresh(&self) -> Result<usize> {
        self.begin().await;
        let result = self.gateway.list().await;

        let mut state = self.state.write().await;
        state.settle("refresh", &result);
        let wire = result?;

        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(wire.len());
        for task in wire.into_iter().map(from_wire) {
            if !seen.insert(task.id.clone()) {
                warn!(id = %task.id, "Duplicate task id from server, keeping first");
                continue;
            }
            let previous = state.position(&task.id).map(|idx| &state.tasks[idx]);
            tasks.push(reconcile(task, previous));
        }

        state.tasks = tasks;
        info!(count = state.tasks.len(), "Loaded tasks");
        Ok(state.tasks.len())
    }

    /// Fetch one task from the server and store it
    pub async fn reload(&self, id: &str) -> Result<Task> {
        self.begin().await;
        let result = self.gateway.get(id).await;

        let mut state = self.state.write().await;
        state.settle("reload", &result);
        Ok(state.upsert_front(from_wire(result?)))
    }

    /// Tasks the server lists for today; the collection is not touched
    pub async fn fetch_today(&self) -> Result<Vec<Task>> {
        self.begin().await;
        let result = self.gateway.list_today().await;
        self.state.write().await.settle("fetch_today", &result);
        Ok(result?.into_iter().map(from_wire).collect())
    }

    /// Tasks the server lists with a status; the collection is not touched
    pub async fn fetch_by_status(&self, status: Status) -> Result<Vec<Task>> {
        self.begin().await;
        let result = self.gateway.list_by_status(adapter::status_to_wire(status)).await;
        self.state.write().await.settle("fetch_by_status", &result);
        Ok(result?.into_iter().map(from_wire).collect())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a task and put the server's record first in the collection
    pub async fn create(&self, draft: &TaskDraft) -> Result<Task> {
        draft.validate()?;
        let body = adapter::to_wire(draft);

        self.begin().await;
        let result = self.gateway.create(&body).await;

        let mut state = self.state.write().await;
        state.settle("create", &result);
        let task = state.upsert_front(from_wire(result?));
        info!(id = %task.id, title = %task.title, "Task created");
        Ok(task)
    }

    /// Replace a task's editable fields
    ///
    /// Unknown ids fail with `NotFound` without contacting the server.
    pub async fn update(&self, id: &str, draft: &TaskDraft) -> Result<Task> {
        draft.validate()?;
        self.require(id).await?;
        self.submit_update("update", id, &adapter::to_wire_patch(draft))
            .await
    }

    /// Mark a task completed, leaving its other fields as they are
    pub async fn complete(&self, id: &str) -> Result<Task> {
        self.require(id).await?;
        self.submit_update("complete", id, &adapter::completion_patch())
            .await
    }

    /// Delete a task; the local entry goes only after the server confirms
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.begin().await;
        let result = self.gateway.delete(id).await;

        let mut state = self.state.write().await;
        state.settle("delete", &result);
        result?;

        state.tasks.retain(|t| t.id != id);
        info!(id, "Task deleted");
        Ok(())
    }

    async fn require(&self, id: &str) -> Result<()> {
        match self.state.read().await.position(id) {
            Some(_) => Ok(()),
            None => Err(TaskError::NotFound(id.to_string())),
        }
    }

    async fn submit_update(&self, action: &str, id: &str, patch: &WirePatch) -> Result<Task> {
        self.begin().await;
        let result = self.gateway.update(id, patch).await;

        let mut state = self.state.write().await;
        state.settle(action, &result);
        let task = from_wire(result?);

        match state.position(id) {
            Some(idx) => {
                let task = reconcile(task, Some(&state.tasks[idx]));
                state.tasks[idx] = task.clone();
                debug!(action, id, status = %task.status, "Task replaced");
                Ok(task)
            }
            None => {
                // Deleted while the request was in flight
                warn!(action, id, "Task no longer in collection, response dropped");
                Ok(reconcile(task, None))
            }
        }
    }
}
