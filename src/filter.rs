// Filter and sort parameters for task views

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::models::{Priority, Status, Task};
use crate::view::local_day;

/// Priority filter: everything, or one priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

impl PriorityFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Only(p) => task.priority == p,
        }
    }
}

impl FromStr for PriorityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(PriorityFilter::All);
        }
        s.parse().map(PriorityFilter::Only)
    }
}

impl fmt::Display for PriorityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityFilter::All => write!(f, "All"),
            PriorityFilter::Only(p) => write!(f, "{}", p),
        }
    }
}

/// Status filter: everything, or one status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(s) => task.status == s,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse().map(StatusFilter::Only)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => write!(f, "All"),
            StatusFilter::Only(s) => write!(f, "{}", s),
        }
    }
}

/// Window on a task's creation day, relative to today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrame {
    Today,
    /// Created within the last 7 days, today included
    Week,
    /// Created within the last 30 days, today included
    Month,
    /// Created before today and not yet complete
    Overdue,
}

impl TimeFrame {
    pub fn matches(self, task: &Task, today: NaiveDate) -> bool {
        let day = local_day(task.created_at);
        let since = |days| today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);

        match self {
            TimeFrame::Today => day == today,
            TimeFrame::Week => day >= since(7) && day <= today,
            TimeFrame::Month => day >= since(30) && day <= today,
            TimeFrame::Overdue => day < today && !task.is_complete(),
        }
    }
}

impl FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(TimeFrame::Today),
            "week" => Ok(TimeFrame::Week),
            "month" => Ok(TimeFrame::Month),
            "overdue" => Ok(TimeFrame::Overdue),
            other => Err(format!(
                "unknown time frame: {} (expected today, week, month or overdue)",
                other
            )),
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimeFrame::Today => "today",
            TimeFrame::Week => "week",
            TimeFrame::Month => "month",
            TimeFrame::Overdue => "overdue",
        };
        write!(f, "{}", label)
    }
}

/// Ordering of a task view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    /// Newest first by creation time
    #[default]
    Newest,
    Oldest,
    TitleAsc,
    TitleDesc,
}

impl SortKey {
    pub fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortKey::Newest => b.created_at.cmp(&a.created_at),
            SortKey::Oldest => a.created_at.cmp(&b.created_at),
            SortKey::TitleAsc => compare_titles(&a.title, &b.title),
            SortKey::TitleDesc => compare_titles(&b.title, &a.title),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "newest" | "createdat" => Ok(SortKey::Newest),
            "oldest" | "createdatoldest" => Ok(SortKey::Oldest),
            "titleasc" | "title" => Ok(SortKey::TitleAsc),
            "titledesc" => Ok(SortKey::TitleDesc),
            _ => Err(format!(
                "unknown sort: {} (expected newest, oldest, title-asc or title-desc)",
                s
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortKey::Newest => "newest",
            SortKey::Oldest => "oldest",
            SortKey::TitleAsc => "title-asc",
            SortKey::TitleDesc => "title-desc",
        };
        write!(f, "{}", label)
    }
}

/// Human ordering for titles: letters compare without regard to case,
/// and on a case-only difference lowercase sorts first.
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));

    folded.then_with(|| {
        a.chars()
            .zip(b.chars())
            .map(|(x, y)| match (x.is_lowercase(), y.is_lowercase()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => x.cmp(&y),
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

/// Complete set of view parameters; all filters combine with AND
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParams {
    pub priority: PriorityFilter,
    pub status: StatusFilter,
    pub time_frame: Option<TimeFrame>,
    pub sort: SortKey,
    /// Only Incomplete and In Progress tasks
    pub pending_only: bool,
}

impl ViewParams {
    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        self.priority.matches(task)
            && self.status.matches(task)
            && self.time_frame.is_none_or(|tf| tf.matches(task, today))
            && (!self.pending_only || task.status.is_pending())
    }
}
