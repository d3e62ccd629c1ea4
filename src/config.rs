// Configuration: YAML file plus environment overrides

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, TaskError};
use crate::schedule::DailyAt;

pub const ENV_API_URL: &str = "TASKDECK_API_URL";
pub const ENV_EMAIL_SERVICE_ID: &str = "TASKDECK_EMAIL_SERVICE_ID";
pub const ENV_EMAIL_TEMPLATE_ID: &str = "TASKDECK_EMAIL_TEMPLATE_ID";
pub const ENV_EMAIL_PUBLIC_KEY: &str = "TASKDECK_EMAIL_PUBLIC_KEY";
pub const ENV_DIGEST_TO: &str = "TASKDECK_DIGEST_TO";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub email: EmailConfig,
    pub schedule: ScheduleConfig,
    /// SQLite file holding remembered preferences
    pub prefs_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Identifiers for the digest email service, passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub api_url: String,
    pub service_id: Option<String>,
    pub template_id: Option<String>,
    pub public_key: Option<String>,
    /// Digest recipient
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub reminders: Vec<ReminderConfig>,
    pub digest_at: DailyAt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderConfig {
    pub at: DailyAt,
    pub title: String,
    pub body: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            email: EmailConfig::default(),
            schedule: ScheduleConfig::default(),
            prefs_path: default_data_dir().join("prefs.db"),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.emailjs.com/api/v1.0/email/send".to_string(),
            service_id: None,
            template_id: None,
            public_key: None,
            to: None,
        }
    }
}

impl EmailConfig {
    /// Service, template and key, when all three are set
    pub fn credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.service_id, &self.template_id, &self.public_key) {
            (Some(service), Some(template), Some(key)) => Some((service, template, key)),
            _ => None,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let reminder = |hour, minute, title: &str, body: &str| ReminderConfig {
            at: DailyAt::hm(hour, minute),
            title: title.to_string(),
            body: body.to_string(),
        };

        Self {
            reminders: vec![
                reminder(11, 30, "Track your Task", "Time to review your tasks!"),
                reminder(15, 0, "Update your Tasks", "Don't forget to update your task progress!"),
                reminder(19, 30, "Complete your task status", "Please mark completed tasks."),
            ],
            digest_at: DailyAt::hm(20, 30),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskdeck")
}

/// Location of the config file when none is given explicitly
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskdeck").join("taskdeck.yml"))
}

impl Config {
    /// Load configuration and apply environment overrides.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used if present, otherwise built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| TaskError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_yaml(&content)
            .map_err(|e| TaskError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Overlay values from a key lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            self.api.base_url = url;
        }
        if let Some(id) = get(ENV_EMAIL_SERVICE_ID) {
            self.email.service_id = Some(id);
        }
        if let Some(id) = get(ENV_EMAIL_TEMPLATE_ID) {
            self.email.template_id = Some(id);
        }
        if let Some(key) = get(ENV_EMAIL_PUBLIC_KEY) {
            self.email.public_key = Some(key);
        }
        if let Some(to) = get(ENV_DIGEST_TO) {
            self.email.to = Some(to);
        }
    }
}
