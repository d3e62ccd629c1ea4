use chrono::{DateTime, Local, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::{ColoredString, Colorize};
use eyre::{Context, Result, bail};
use std::path::PathBuf;
use std::sync::Arc;
use taskdeck::models::parse_timestamp_str;
use taskdeck::notify::{ConsoleNotifier, DigestJob, EmailJsMailer, Notifier, ReminderJob, build_digest};
use taskdeck::view::{self, Aggregates, ViewState};
use taskdeck::{
    Config, HttpGateway, Prefs, Priority, PriorityFilter, Scheduler, SortKey, Status, StatusFilter, SystemClock, Task,
    TaskDraft, TaskStore, TimeFrame, ViewParams, transfer,
};
use tracing::{Level, warn};

const PREFS_NAMESPACE: &str = "taskdeck";
const VIEW_KEY: &str = "view";

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "Task tracker client for a remote task API")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Config file (default: ~/.config/taskdeck/taskdeck.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Task API base URL, overriding config and environment
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tasks with filters, sorting and pagination
    List(ListArgs),

    /// Show one task
    Show { id: String },

    /// Create a task
    Add(AddArgs),

    /// Change fields of a task
    Edit(EditArgs),

    /// Mark a task completed
    Complete { id: String },

    /// Delete a task
    Delete { id: String },

    /// Tasks the server lists for today
    Today,

    /// Tasks the server lists with a status
    ByStatus { status: Status },

    /// Completion metrics and per-day chart
    Stats,

    /// Write a backup of all tasks
    Export {
        /// File or directory (directories get tasks-backup-YYYY-MM-DD.json)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Create tasks from a backup file
    Import { path: PathBuf },

    /// Print today's digest, or mail it with --send
    Digest {
        #[arg(long)]
        send: bool,

        /// Recipient, overriding config
        #[arg(long)]
        to: Option<String>,
    },

    /// Run reminders and the daily digest until interrupted
    Run,
}

#[derive(Args)]
struct ListArgs {
    /// all, low, medium or high
    #[arg(short, long)]
    priority: Option<PriorityFilter>,

    /// all, incomplete, in-progress or complete
    #[arg(short, long)]
    status: Option<StatusFilter>,

    /// today, week, month or overdue
    #[arg(short, long)]
    time: Option<TimeFrame>,

    /// Drop any saved time frame
    #[arg(long, conflicts_with = "time")]
    any_time: bool,

    /// newest, oldest, title-asc or title-desc
    #[arg(long)]
    sort: Option<SortKey>,

    /// Only incomplete and in-progress tasks
    #[arg(long)]
    pending: bool,

    /// Show completed tasks too, dropping a saved pending-only setting
    #[arg(long, conflicts_with = "pending")]
    no_pending: bool,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Remember these view settings
    #[arg(long)]
    save: bool,

    /// Ignore remembered view settings
    #[arg(long)]
    reset: bool,
}

impl ListArgs {
    fn apply(&self, base: ViewParams) -> ViewParams {
        ViewParams {
            priority: self.priority.unwrap_or(base.priority),
            status: self.status.unwrap_or(base.status),
            time_frame: match (self.time, self.any_time) {
                (Some(tf), _) => Some(tf),
                (None, true) => None,
                (None, false) => base.time_frame,
            },
            sort: self.sort.unwrap_or(base.sort),
            pending_only: !self.no_pending && (self.pending || base.pending_only),
        }
    }
}

#[derive(Args)]
struct AddArgs {
    title: String,

    #[arg(short, long, default_value = "")]
    description: String,

    #[arg(short, long, default_value_t = Priority::Medium)]
    priority: Priority,

    #[arg(short, long, default_value_t = Status::Incomplete)]
    status: Status,

    /// Due date (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_due)]
    due: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct EditArgs {
    id: String,

    #[arg(long)]
    title: Option<String>,

    #[arg(short, long)]
    description: Option<String>,

    #[arg(short, long)]
    priority: Option<Priority>,

    #[arg(short, long)]
    status: Option<Status>,

    #[arg(long, value_parser = parse_due)]
    due: Option<DateTime<Utc>>,

    /// Remove the due date
    #[arg(long, conflicts_with = "due")]
    no_due: bool,
}

fn parse_due(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_timestamp_str(s).ok_or_else(|| format!("invalid date: {}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }

    let gateway = HttpGateway::from_config(&config.api)?;
    let store = Arc::new(TaskStore::new(gateway));

    match cli.command {
        Commands::List(args) => list(&store, &config, &args).await?,
        Commands::Show { id } => {
            let task = store.reload(&id).await?;
            print_detail(&task);
        }
        Commands::Add(args) => {
            let mut draft = TaskDraft::new(args.title)
                .with_description(args.description)
                .with_priority(args.priority)
                .with_status(args.status);
            draft.due_date = args.due;
            let task = store.create(&draft).await?;
            println!("{} {}", "Created".green(), task.id);
        }
        Commands::Edit(args) => {
            let existing = store.reload(&args.id).await?;
            let mut draft = existing.to_draft();
            if let Some(title) = args.title {
                draft.title = title;
            }
            if let Some(description) = args.description {
                draft.description = description;
            }
            if let Some(priority) = args.priority {
                draft.priority = priority;
            }
            if let Some(status) = args.status {
                draft.status = status;
            }
            if args.due.is_some() || args.no_due {
                draft.due_date = args.due;
            }
            let task = store.update(&args.id, &draft).await?;
            println!("{} {}", "Updated".green(), task.id);
        }
        Commands::Complete { id } => {
            store.reload(&id).await?;
            let task = store.complete(&id).await?;
            println!("{} {}", "Completed".green(), task.title);
        }
        Commands::Delete { id } => {
            store.delete(&id).await?;
            println!("{} {}", "Deleted".green(), id);
        }
        Commands::Today => {
            print_rows(&store.fetch_today().await?);
        }
        Commands::ByStatus { status } => {
            print_rows(&store.fetch_by_status(status).await?);
        }
        Commands::Stats => {
            store.refresh().await?;
            print_stats(&store.snapshot().await);
        }
        Commands::Export { path } => {
            store.refresh().await?;
            let tasks = store.snapshot().await;
            let written = transfer::write_export(&path, &tasks, Local::now().date_naive())
                .with_context(|| format!("Failed to export to {}", path.display()))?;
            println!("Exported {} tasks to {}", tasks.len(), written.display());
        }
        Commands::Import { path } => {
            let report = transfer::import_file(&store, &path)
                .await
                .with_context(|| format!("Failed to import {}", path.display()))?;
            println!(
                "Imported {} of {} tasks ({} failed)",
                report.created, report.attempted, report.failed
            );
        }
        Commands::Digest { send, to } => digest(store, &config, send, to).await?,
        Commands::Run => run(store, &config).await?,
    }

    Ok(())
}

async fn list(store: &TaskStore<HttpGateway>, config: &Config, args: &ListArgs) -> Result<()> {
    let prefs = match Prefs::open(&config.prefs_path, PREFS_NAMESPACE) {
        Ok(prefs) => Some(prefs),
        Err(e) => {
            warn!(error = %e, "Preferences unavailable");
            None
        }
    };

    let base = match (&prefs, args.reset) {
        (Some(prefs), false) => prefs.get(VIEW_KEY, ViewParams::default()),
        _ => ViewParams::default(),
    };
    let params = args.apply(base);

    if args.save {
        match &prefs {
            Some(prefs) => prefs.set(VIEW_KEY, &params).context("Failed to save view settings")?,
            None => bail!("Cannot save view settings: preferences unavailable"),
        }
    }

    store.refresh().await?;
    let tasks = store.snapshot().await;
    let today = Local::now().date_naive();

    let mut state = ViewState::new(params);
    let visible = view::derive(&tasks, state.params(), today).len();
    state.goto_page(args.page.saturating_sub(1), visible);
    let page = state.render(&tasks, today);

    print_rows(page.items.iter().copied());
    println!();
    println!(
        "{}  (page {} of {})",
        page.showing(),
        if page.total_pages == 0 { 0 } else { page.index + 1 },
        page.total_pages
    );
    Ok(())
}

async fn digest(store: Arc<TaskStore<HttpGateway>>, config: &Config, send: bool, to: Option<String>) -> Result<()> {
    if !send {
        store.refresh().await?;
        match build_digest(&store.snapshot().await, Local::now().date_naive()) {
            Some(digest) => print!("{}", digest),
            None => println!("No tasks created today"),
        }
        return Ok(());
    }

    let Some(to) = to.or_else(|| config.email.to.clone()) else {
        bail!("No digest recipient: pass --to or set email.to");
    };
    let mailer = EmailJsMailer::from_config(&config.email, config.api.timeout())?;
    store.refresh().await?;
    let job = DigestJob::new(store, Arc::new(mailer), Arc::new(SystemClock), to.clone());

    match job.send_now().await.context("Failed to send daily digest")? {
        Some(_) => println!("{} digest to {}", "Sent".green(), to),
        None => println!("No tasks created today, nothing sent"),
    }
    Ok(())
}

async fn run(store: Arc<TaskStore<HttpGateway>>, config: &Config) -> Result<()> {
    if let Err(e) = store.refresh().await {
        warn!(error = %e.user_message(), "Initial load failed");
    }

    let clock = Arc::new(SystemClock);
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);
    let mut scheduler = Scheduler::new(clock.clone());

    for reminder in &config.schedule.reminders {
        let job = ReminderJob::from_config(reminder, Arc::clone(&notifier));
        scheduler.add(reminder.at, Arc::new(job));
    }

    match (&config.email.to, EmailJsMailer::from_config(&config.email, config.api.timeout())) {
        (Some(to), Ok(mailer)) => {
            // The daemon issues no other store operations
            let job = DigestJob::new(Arc::clone(&store), Arc::new(mailer), clock, to.clone()).with_refresh(true);
            scheduler.add(config.schedule.digest_at, Arc::new(job));
        }
        (None, _) => warn!("No digest recipient configured, daily digest disabled"),
        (_, Err(e)) => warn!(error = %e, "Daily digest disabled"),
    }

    scheduler.start();
    println!(
        "Running {} scheduled jobs, press Ctrl-C to stop",
        scheduler.job_count().to_string().bold()
    );

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    scheduler.stop();
    Ok(())
}

fn priority_label(priority: Priority) -> ColoredString {
    match priority {
        Priority::High => priority.label().red(),
        Priority::Medium => priority.label().yellow(),
        Priority::Low => priority.label().blue(),
    }
}

fn status_label(status: Status) -> ColoredString {
    match status {
        Status::Complete => status.label().green(),
        Status::InProgress => status.label().yellow(),
        Status::Incomplete => status.label().normal(),
    }
}

fn print_rows<'a>(tasks: impl IntoIterator<Item = &'a Task>) {
    let tasks: Vec<&Task> = tasks.into_iter().collect();
    if tasks.is_empty() {
        println!("{}", "No tasks".dimmed());
        return;
    }
    for task in tasks {
        println!(
            "{:>6}  {:<11}  {:<6}  {}  {}",
            task.id,
            status_label(task.status),
            priority_label(task.priority),
            view::local_day(task.created_at),
            task.title
        );
    }
}

fn print_detail(task: &Task) {
    println!("{}", task.title.bold());
    println!("  id:        {}", task.id);
    println!("  status:    {}", status_label(task.status));
    println!("  priority:  {}", priority_label(task.priority));
    println!("  created:   {}", task.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    if let Some(done) = task.completed_at {
        println!("  completed: {}", done.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    }
    if let Some(due) = task.due_date {
        println!("  due:       {}", due.with_timezone(&Local).format("%Y-%m-%d"));
    }
    if !task.description.is_empty() {
        println!();
        println!("{}", task.description);
    }
}

fn print_stats(tasks: &[Task]) {
    let agg = Aggregates::compute(tasks);
    println!("Total tasks:  {}", agg.total);
    println!("Completed:    {}", agg.completed.to_string().green());
    println!("In progress:  {}", agg.in_progress.to_string().yellow());
    println!("Completion:   {}%", agg.completion_percent);

    let series = view::completion_series(tasks);
    if series.is_empty() {
        return;
    }
    println!();
    println!("{}", "Completed per creation day".bold());
    for (day, count) in series {
        println!("  {}  {:>3} {}", day, count, "#".repeat(count).green());
    }
}
