// Reminders and the daily digest email

use async_trait::async_trait;
use chrono::NaiveDate;
use colored::Colorize;
use reqwest::{Client, Url};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{EmailConfig, ReminderConfig};
use crate::error::{Result, TaskError};
use crate::gateway::Gateway;
use crate::models::Task;
use crate::schedule::{Clock, Job};
use crate::store::TaskStore;
use crate::view::created_on;

/// Delivers a local reminder to the user
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Writes reminders to the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        info!(title, "Reminder");
        println!("{} {}", title.yellow().bold(), body);
        Ok(())
    }
}

/// Scheduled job showing one fixed reminder
pub struct ReminderJob {
    name: String,
    title: String,
    body: String,
    notifier: Arc<dyn Notifier>,
}

impl ReminderJob {
    pub fn new(title: impl Into<String>, body: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        let title = title.into();
        Self {
            name: format!("reminder: {}", title),
            title,
            body: body.into(),
            notifier,
        }
    }

    pub fn from_config(config: &ReminderConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(config.title.clone(), config.body.clone(), notifier)
    }
}

#[async_trait]
impl Job for ReminderJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) {
        if let Err(e) = self.notifier.notify(&self.title, &self.body).await {
            warn!(job = %self.name, error = %e, "Reminder delivery failed");
        }
    }
}

/// Summary of the tasks created on one day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub date: NaiveDate,
    pub completed: Vec<String>,
    pub pending: Vec<String>,
}

impl Digest {
    pub fn total(&self) -> usize {
        self.completed.len() + self.pending.len()
    }

    /// Plain-text body sent as the email message
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn titles(f: &mut fmt::Formatter<'_>, titles: &[String]) -> fmt::Result {
            if titles.is_empty() {
                return writeln!(f, "None");
            }
            for title in titles {
                writeln!(f, "- {}", title)?;
            }
            Ok(())
        }

        writeln!(f, "Daily Productivity Tracker Summary")?;
        writeln!(f)?;
        writeln!(f, "Date: {}", self.date.format("%Y-%m-%d"))?;
        writeln!(f, "Total tasks created today: {}", self.total())?;
        writeln!(f, "Completed tasks: {}", self.completed.len())?;
        writeln!(f, "Pending tasks: {}", self.pending.len())?;
        writeln!(f)?;
        writeln!(f, "Completed Tasks:")?;
        titles(f, &self.completed)?;
        writeln!(f)?;
        writeln!(f, "Pending Tasks:")?;
        titles(f, &self.pending)
    }
}

/// Digest of the tasks created on `today`, or `None` when there were none
pub fn build_digest(tasks: &[Task], today: NaiveDate) -> Option<Digest> {
    let todays = created_on(tasks, today);
    if todays.is_empty() {
        return None;
    }

    let (completed, pending): (Vec<&Task>, Vec<&Task>) = todays.into_iter().partition(|t| t.is_complete());
    let titles = |tasks: Vec<&Task>| -> Vec<String> { tasks.into_iter().map(|t| t.title.clone()).collect() };

    Some(Digest {
        date: today,
        completed: titles(completed),
        pending: titles(pending),
    })
}

/// Sends a text message to an email address
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, to: &str, message: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct EmailJsRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams<'a>,
}

#[derive(Debug, Serialize)]
struct TemplateParams<'a> {
    to_email: &'a str,
    message: &'a str,
}

/// Mailer posting to the EmailJS REST endpoint
#[derive(Debug, Clone)]
pub struct EmailJsMailer {
    client: Client,
    api_url: Url,
    service_id: String,
    template_id: String,
    public_key: String,
}

impl EmailJsMailer {
    /// Build from config; fails when any identifier is missing
    pub fn from_config(config: &EmailConfig, timeout: Duration) -> Result<Self> {
        let (service_id, template_id, public_key) = config.credentials().ok_or_else(|| {
            TaskError::Config("Email service id, template id and public key must all be set".to_string())
        })?;
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| TaskError::Config(format!("Invalid email API URL {}: {}", config.api_url, e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TaskError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url,
            service_id: service_id.to_string(),
            template_id: template_id.to_string(),
            public_key: public_key.to_string(),
        })
    }

    fn request<'a>(&'a self, to: &'a str, message: &'a str) -> EmailJsRequest<'a> {
        EmailJsRequest {
            service_id: &self.service_id,
            template_id: &self.template_id,
            user_id: &self.public_key,
            template_params: TemplateParams { to_email: to, message },
        }
    }
}

#[async_trait]
impl Mailer for EmailJsMailer {
    async fn send(&self, to: &str, message: &str) -> Result<()> {
        let response = self
            .client
            .post(self.api_url.clone())
            .json(&self.request(to, message))
            .send()
            .await?;

        let status = response.status();
        debug!(%status, "Email API response");
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = match body.trim() {
            "" => format!("Request failed with status code {}", status.as_u16()),
            text => text.to_string(),
        };
        Err(TaskError::Gateway {
            status: status.as_u16(),
            message,
        })
    }
}

/// Scheduled job mailing the daily digest.
///
/// Summarizes the store's current snapshot and makes no gateway call unless
/// built `with_refresh(true)`.
pub struct DigestJob<G: Gateway> {
    store: Arc<TaskStore<G>>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    to: String,
    refresh: bool,
}

impl<G: Gateway> DigestJob<G> {
    pub fn new(store: Arc<TaskStore<G>>, mailer: Arc<dyn Mailer>, clock: Arc<dyn Clock>, to: impl Into<String>) -> Self {
        Self {
            store,
            mailer,
            clock,
            to: to.into(),
            refresh: false,
        }
    }

    /// Whether to reload the collection from the server before summarizing
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Digest for the clock's current day, without sending it
    pub async fn preview(&self) -> Result<Option<Digest>> {
        if self.refresh {
            self.store.refresh().await?;
        }
        let today = self.clock.now().date();
        Ok(build_digest(&self.store.snapshot().await, today))
    }

    /// Build and mail the digest; returns `None` when nothing was created today
    pub async fn send_now(&self) -> Result<Option<Digest>> {
        let Some(digest) = self.preview().await? else {
            info!("No tasks created today, digest skipped");
            return Ok(None);
        };

        self.mailer.send(&self.to, &digest.message()).await?;
        info!(
            to = %self.to,
            total = digest.total(),
            completed = digest.completed.len(),
            "Daily digest sent"
        );
        Ok(Some(digest))
    }
}

#[async_trait]
impl<G: Gateway> Job for DigestJob<G> {
    fn name(&self) -> &str {
        "daily digest"
    }

    async fn run(&self) {
        if let Err(e) = self.send_now().await {
            warn!(error = %e.user_message(), "Failed to send daily digest");
        }
    }
}
