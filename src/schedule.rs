// Wall-clock daily jobs with explicit start/stop

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Source of local wall-clock time
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveDateTime;
}

/// Clock backed by the system's local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A time of day at which a job fires, e.g. `20:30`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DailyAt {
    time: NaiveTime,
}

impl DailyAt {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(|time| Self { time })
    }

    /// Time of day from hour and minute, wrapping past midnight
    pub fn hm(hour: u32, minute: u32) -> Self {
        let minutes = i64::from(hour) * 60 + i64::from(minute);
        Self {
            time: NaiveTime::MIN + TimeDelta::minutes(minutes),
        }
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// First occurrence strictly after `now`
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let candidate = now.date().and_time(self.time);
        if candidate > now {
            candidate
        } else {
            candidate + Days::new(1)
        }
    }
}

impl FromStr for DailyAt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(|time| Self { time })
            .map_err(|_| format!("invalid time of day: {} (expected HH:MM)", s))
    }
}

impl TryFrom<String> for DailyAt {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DailyAt> for String {
    fn from(value: DailyAt) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DailyAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time.format("%H:%M"))
    }
}

/// Work run by the scheduler at each occurrence
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn run(&self);
}

/// Runs registered jobs once a day at their configured times.
///
/// Jobs do nothing until `start` is called; `stop` (or dropping the
/// scheduler) cancels every pending occurrence. Requires a tokio runtime.
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    jobs: Vec<(DailyAt, Arc<dyn Job>)>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            jobs: Vec::new(),
            handles: Vec::new(),
        }
    }

    /// Register a job. Takes effect on the next `start`.
    pub fn add(&mut self, at: DailyAt, job: Arc<dyn Job>) {
        self.jobs.push((at, job));
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    pub fn start(&mut self) {
        if self.is_running() {
            debug!("Scheduler already running");
            return;
        }

        for (at, job) in &self.jobs {
            let clock = Arc::clone(&self.clock);
            let job = Arc::clone(job);
            let at = *at;
            self.handles.push(tokio::spawn(run_daily(clock, at, job)));
        }

        info!(jobs = self.jobs.len(), "Scheduler started");
    }

    pub fn stop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("Scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_daily(clock: Arc<dyn Clock>, at: DailyAt, job: Arc<dyn Job>) {
    let mut last_fired: Option<NaiveDateTime> = None;
    loop {
        // Wall clock may trail the timer; never re-arm for an occurrence already run
        let now = clock.now();
        let from = last_fired.map_or(now, |last| now.max(last));
        let next = at.next_after(from);
        let delay = (next - now).to_std().unwrap_or_default();
        debug!(job = job.name(), %next, delay_secs = delay.as_secs(), "Job armed");

        tokio::time::sleep(delay).await;

        debug!(job = job.name(), "Job firing");
        job.run().await;
        last_fired = Some(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    /// Clock that follows tokio's (pausable) time from a fixed starting point
    struct TokioClock {
        base: NaiveDateTime,
        started: tokio::time::Instant,
    }

    impl Clock for TokioClock {
        fn now(&self) -> NaiveDateTime {
            self.base + chrono::Duration::from_std(self.started.elapsed()).unwrap()
        }
    }

    /// Clock running slower than tokio's timer by a fixed ratio
    struct LaggingClock {
        base: NaiveDateTime,
        started: tokio::time::Instant,
        ratio: f64,
    }

    impl Clock for LaggingClock {
        fn now(&self) -> NaiveDateTime {
            let elapsed = self.started.elapsed().mul_f64(self.ratio);
            self.base + chrono::Duration::from_std(elapsed).unwrap()
        }
    }

    struct CountingJob {
        fired: AtomicUsize,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_next_after_later_today() {
        let daily = DailyAt::new(20, 30).unwrap();
        assert_eq!(daily.next_after(at(2025, 6, 1, 9, 0)), at(2025, 6, 1, 20, 30));
    }

    #[test]
    fn test_next_after_rolls_to_tomorrow() {
        let daily = DailyAt::new(11, 30).unwrap();
        assert_eq!(daily.next_after(at(2025, 6, 1, 12, 0)), at(2025, 6, 2, 11, 30));
        // Exactly on time counts as already fired
        assert_eq!(daily.next_after(at(2025, 6, 1, 11, 30)), at(2025, 6, 2, 11, 30));
        // Month boundary
        assert_eq!(daily.next_after(at(2025, 6, 30, 23, 0)), at(2025, 7, 1, 11, 30));
    }

    #[test]
    fn test_daily_at_parse_and_display() {
        let daily: DailyAt = "19:30".parse().unwrap();
        assert_eq!(daily, DailyAt::new(19, 30).unwrap());
        assert_eq!(daily.to_string(), "19:30");
        assert!("25:00".parse::<DailyAt>().is_err());
        assert!("noon".parse::<DailyAt>().is_err());
        assert_eq!(DailyAt::hm(24, 15).to_string(), "00:15");
    }

    #[test]
    fn test_daily_at_serde() {
        let daily: DailyAt = serde_json::from_str("\"07:05\"").unwrap();
        assert_eq!(daily, DailyAt::new(7, 5).unwrap());
        assert_eq!(serde_json::to_string(&daily).unwrap(), "\"07:05\"");
        assert!(serde_json::from_str::<DailyAt>("\"7pm\"").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_fires_and_rearms_daily() {
        let clock = Arc::new(TokioClock {
            base: at(2025, 6, 1, 11, 0),
            started: tokio::time::Instant::now(),
        });
        let job = Arc::new(CountingJob {
            fired: AtomicUsize::new(0),
        });

        let mut scheduler = Scheduler::new(clock);
        scheduler.add(DailyAt::new(11, 30).unwrap(), job.clone());
        assert!(!scheduler.is_running());

        // Nothing fires before start
        tokio::time::sleep(Duration::from_secs(45 * 60)).await;
        assert_eq!(job.fired.load(Ordering::SeqCst), 0);

        // Now 11:45; next occurrence is tomorrow 11:30
        scheduler.start();
        assert!(scheduler.is_running());
        tokio::time::sleep(Duration::from_secs(23 * 3600 + 46 * 60)).await;
        assert_eq!(job.fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        assert_eq!(job.fired.load(Ordering::SeqCst), 2);

        scheduler.stop();
        assert!(!scheduler.is_running());
        tokio::time::sleep(Duration::from_secs(72 * 3600)).await;
        assert_eq!(job.fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_start_is_idempotent() {
        let clock = Arc::new(TokioClock {
            base: at(2025, 6, 1, 8, 0),
            started: tokio::time::Instant::now(),
        });
        let job = Arc::new(CountingJob {
            fired: AtomicUsize::new(0),
        });

        let mut scheduler = Scheduler::new(clock);
        scheduler.add(DailyAt::new(9, 0).unwrap(), job.clone());
        scheduler.start();
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(61 * 60)).await;
        assert_eq!(job.fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_wall_clock_fires_once_per_day() {
        // 20 ppm slow: about 1.5 s behind the timer by 20:30
        let clock = Arc::new(LaggingClock {
            base: at(2025, 6, 1, 0, 0),
            started: tokio::time::Instant::now(),
            ratio: 1.0 - 20e-6,
        });
        let job = Arc::new(CountingJob {
            fired: AtomicUsize::new(0),
        });

        let mut scheduler = Scheduler::new(clock);
        scheduler.add(DailyAt::new(20, 30).unwrap(), job.clone());
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(20 * 3600 + 40 * 60)).await;
        assert_eq!(job.fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        assert_eq!(job.fired.load(Ordering::SeqCst), 2);
    }
}
