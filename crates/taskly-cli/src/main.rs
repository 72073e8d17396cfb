// ============================================================================
// taskly - command-line front end for Taskly
// ============================================================================
// Usage:
//   taskly user new --name Ada              Create a user and print its id
//   taskly --user ID task add "Title"       Create a task (persona auto-assigned)
//   taskly --user ID task done TASK_ID      Complete a task and collect XP
//   taskly --user ID dashboard              Show the home summary
//   taskly --user ID chat "Hi" --model gpt4o
//   taskly info                             Show database statistics
// ============================================================================

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use taskly_core::assist::TaskSuggestion;
use taskly_core::gamification::{BadgeRecord, CompletionOutcome, BADGE_DEFINITIONS};
use taskly_core::persona::all_personas;
use taskly_core::{
    classify, AiModel, BadgeType, NewTask, SubtaskDraft, Task, TaskFilter, TaskUpdate, Taskly,
    TasklyConfig,
};
use tracing_subscriber::EnvFilter;

/// Gamified task manager
#[derive(Parser)]
#[command(name = "taskly", version, about = "Gamified tasks with personas, XP and badges")]
struct Cli {
    /// Path to the database file (default: ~/.taskly/taskly.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// User to act as
    #[arg(long, global = true, env = "TASKLY_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage user profiles
    #[command(subcommand)]
    User(UserCommand),

    /// Create, list and complete tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Show which persona a title would get
    Classify {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// List every persona
    Personas,

    /// XP, level, streak and weekly activity
    Stats,

    /// Earned and locked badges
    Badges,

    /// In-app notifications
    #[command(subcommand)]
    Notifications(NotificationCommand),

    /// Home screen summary
    Dashboard,

    /// AI suggestion for a task title
    Suggest { title: String },

    /// AI subtask breakdown for a task title
    Breakdown { title: String },

    /// Chat with the assistant
    Chat {
        message: String,
        /// claude, gpt4o or gemini
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },

    /// Show stored chat messages
    History {
        #[arg(long)]
        session: Option<String>,
    },

    /// Ask the task's persona for coaching
    Coach {
        task_id: String,
        message: String,
        #[arg(long)]
        session: Option<String>,
    },

    /// Developer tools for exercising gamification
    #[command(subcommand)]
    Dev(DevCommand),

    /// Export one user's data
    Export {
        /// Output format (currently only json is supported)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Show database statistics
    Info,
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a named user
    New {
        #[arg(long, default_value = "Friend")]
        name: String,
    },
    /// Create a guest user
    Guest,
    /// Show the current user
    Show,
    /// List every user
    List,
    /// Change the mascot used for notifications
    SetMascot { mascot: String },
    /// Change the display name
    Rename { name: String },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Create a task
    Add {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// high, medium or low
        #[arg(long)]
        priority: Option<String>,
        /// RFC 3339 timestamp or YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        /// Minutes
        #[arg(long)]
        estimate: Option<u32>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        emoji: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
        /// Fill emoji, priority, estimate, category and tags from the assistant
        #[arg(long)]
        suggest: bool,
        /// Generate subtasks with the assistant
        #[arg(long)]
        breakdown: bool,
    },
    /// List tasks
    List {
        /// all, today, week, completed or active
        #[arg(long, default_value = "all")]
        filter: String,
    },
    /// Show one task
    Show { task_id: String },
    /// Mark a task complete
    Done { task_id: String },
    /// Mark a completed task incomplete again
    Reopen { task_id: String },
    /// Edit task fields
    Edit {
        task_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        estimate: Option<u32>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        emoji: Option<String>,
    },
    /// Toggle a subtask
    Subtask { task_id: String, subtask_id: String },
    /// Delete a task
    Delete { task_id: String },
}

#[derive(Subcommand)]
enum NotificationCommand {
    /// Newest notifications first
    List {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Mark one notification read
    Read { notification_id: String },
    /// Mark every notification read
    ReadAll,
}

#[derive(Subcommand)]
enum DevCommand {
    /// Extend the streak as if a day passed
    SimulateDay,
    /// Zero the streak
    ResetStreak,
    /// Grant XP directly
    AddXp {
        #[arg(default_value = "50")]
        amount: u64,
    },
    /// Grant a badge by id, e.g. early_bird
    TriggerBadge { badge: String },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,taskly=info,taskly_core=info")),
        )
        .init();
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ts))
}

fn require_user(user: Option<&str>) -> Result<&str> {
    user.context("No user selected. Pass --user or set TASKLY_USER (create one with `taskly user new`).")
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: could not load .env: {}", e);
        }
    }
    init_logging();

    let cli = Cli::parse();
    let mut config = TasklyConfig::from_env();
    if cli.db_path.is_some() {
        config.db_path = cli.db_path.clone();
    }
    let app = Taskly::open(config)?;
    let user = cli.user.as_deref();

    match cli.command {
        Commands::User(cmd) => cmd_user(&app, user, cmd).await,
        Commands::Task(cmd) => cmd_task(&app, require_user(user)?, cmd).await,
        Commands::Classify { title, description } => cmd_classify(&title, &description),
        Commands::Personas => cmd_personas(),
        Commands::Stats => cmd_stats(&app, require_user(user)?).await,
        Commands::Badges => cmd_badges(&app, require_user(user)?),
        Commands::Notifications(cmd) => cmd_notifications(&app, require_user(user)?, cmd),
        Commands::Dashboard => cmd_dashboard(&app, require_user(user)?).await,
        Commands::Suggest { title } => {
            print_suggestion(&app.assist.suggest(&title).await);
            Ok(())
        }
        Commands::Breakdown { title } => cmd_breakdown(&app, &title).await,
        Commands::Chat {
            message,
            model,
            session,
        } => cmd_chat(&app, require_user(user)?, &message, model.as_deref(), session).await,
        Commands::History { session } => {
            cmd_history(&app, require_user(user)?, session.as_deref()).await
        }
        Commands::Coach {
            task_id,
            message,
            session,
        } => cmd_coach(&app, require_user(user)?, &task_id, &message, session).await,
        Commands::Dev(cmd) => cmd_dev(&app, require_user(user)?, cmd).await,
        Commands::Export { format } => cmd_export(&app, require_user(user)?, &format),
        Commands::Info => cmd_info(&app),
    }
}

// ============================================================================
// Users
// ============================================================================

async fn cmd_user(app: &Taskly, user: Option<&str>, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::New { name } => {
            let record = app.db.create_user(&name)?;
            println!("Created user {} ({})", record.name, record.user_id);
            println!("Use it with: --user {}", record.user_id);
        }
        UserCommand::Guest => {
            let record = app.db.create_guest()?;
            println!("Created guest {} ({})", record.name, record.user_id);
        }
        UserCommand::Show => {
            let record = app.db.require_user(require_user(user)?)?;
            println!("{} ({}){}", record.name, record.user_id, if record.is_guest { " [guest]" } else { "" });
            println!("Joined:  {}", format_timestamp(record.created_at));
            println!(
                "Level {} {} | {} XP | {} day streak",
                record.state.level,
                record.state.level_title(),
                record.state.xp,
                record.state.streak
            );
            println!("Badges:  {}", record.state.badges.len());
            println!("Mascot:  {}", record.state.mascot);
        }
        UserCommand::List => {
            let users = app.db.list_users()?;
            if users.is_empty() {
                println!("No users found.");
                return Ok(());
            }
            println!("{:<20}  {:<16}  {:>6}  {:>5}", "USER ID", "NAME", "XP", "LEVEL");
            println!("{}", "-".repeat(54));
            for u in &users {
                println!(
                    "{:<20}  {:<16}  {:>6}  {:>5}",
                    u.user_id, u.name, u.state.xp, u.state.level
                );
            }
        }
        UserCommand::SetMascot { mascot } => {
            let record = app
                .db
                .update_profile(require_user(user)?, None, Some(&mascot))?;
            println!("Mascot set to {}", record.state.mascot);
        }
        UserCommand::Rename { name } => {
            let record = app.db.update_profile(require_user(user)?, Some(&name), None)?;
            println!("Name set to {}", record.name);
        }
    }
    Ok(())
}

// ============================================================================
// Tasks
// ============================================================================

async fn cmd_task(app: &Taskly, user_id: &str, cmd: TaskCommand) -> Result<()> {
    match cmd {
        TaskCommand::Add {
            title,
            description,
            priority,
            due,
            estimate,
            category,
            emoji,
            tags,
            subtasks,
            suggest,
            breakdown,
        } => {
            app.db.require_user(user_id)?;
            let mut input = NewTask {
                title,
                description,
                emoji,
                priority,
                due_date: due,
                estimated_time: estimate,
                category,
                tags,
                subtasks: subtasks
                    .into_iter()
                    .map(|s| SubtaskDraft::new(s, 15))
                    .collect(),
            };

            if suggest {
                let s = app.assist.suggest(&input.title).await;
                input.emoji.get_or_insert(s.emoji);
                input.priority.get_or_insert(s.priority);
                input.estimated_time.get_or_insert(s.estimated_time);
                input.category.get_or_insert(s.category);
                if input.tags.is_empty() {
                    input.tags = s.tags;
                }
            }
            if breakdown && input.subtasks.is_empty() {
                input.subtasks = app.assist.breakdown(&input.title).await;
            }

            let task = app.tasks.create_task(user_id, input).await?;
            println!(
                "Created {} {} {}",
                task.task_id, task.emoji, task.title
            );
            println!(
                "Persona: {} {}",
                task.persona.persona_emoji, task.persona.persona_name
            );
        }
        TaskCommand::List { filter } => {
            let filter: TaskFilter = filter.parse()?;
            let tasks = app.tasks.list_tasks(user_id, filter).await?;
            if tasks.is_empty() {
                println!("No tasks found.");
                return Ok(());
            }
            println!(
                "{:<18}  {:<4}  {:<6}  {:<18}  {}",
                "TASK ID", "DONE", "PRIO", "PERSONA", "TITLE"
            );
            println!("{}", "-".repeat(80));
            for task in &tasks {
                println!(
                    "{:<18}  {:<4}  {:<6}  {:<18}  {} {}",
                    task.task_id,
                    if task.completed { "x" } else { "" },
                    task.priority.as_str(),
                    task.persona.persona_name,
                    task.emoji,
                    task.title
                );
            }
            println!("\nTotal: {} tasks", tasks.len());
        }
        TaskCommand::Show { task_id } => {
            let task = app.tasks.get_task(user_id, &task_id).await?;
            print_task(&task);
        }
        TaskCommand::Done { task_id } => {
            let outcome = app.tasks.complete_task(user_id, &task_id).await?;
            match outcome.completion {
                Some(completion) => print_completion(&outcome.task, &completion),
                None => println!(
                    "{} is complete (already earned {} XP).",
                    outcome.task.title, outcome.task.xp_earned
                ),
            }
        }
        TaskCommand::Reopen { task_id } => {
            let outcome = app.tasks.reopen_task(user_id, &task_id).await?;
            println!("Reopened {}", outcome.task.title);
        }
        TaskCommand::Edit {
            task_id,
            title,
            description,
            priority,
            due,
            estimate,
            category,
            emoji,
        } => {
            let update = TaskUpdate {
                title,
                description,
                emoji,
                priority,
                due_date: due,
                estimated_time: estimate,
                category,
                ..Default::default()
            };
            let outcome = app.tasks.update_task(user_id, &task_id, update).await?;
            print_task(&outcome.task);
        }
        TaskCommand::Subtask {
            task_id,
            subtask_id,
        } => {
            let task = app
                .tasks
                .toggle_subtask(user_id, &task_id, &subtask_id)
                .await?;
            print_task(&task);
        }
        TaskCommand::Delete { task_id } => {
            app.tasks.delete_task(user_id, &task_id).await?;
            println!("Deleted {}", task_id);
        }
    }
    Ok(())
}

fn print_task(task: &Task) {
    println!("{} {}  [{}]", task.emoji, task.title, task.task_id);
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
    println!(
        "  Priority: {} | Estimate: {} min | Category: {}",
        task.priority, task.estimated_time, task.category
    );
    println!(
        "  Persona:  {} {}",
        task.persona.persona_emoji, task.persona.persona_name
    );
    if let Some(due) = &task.due_date {
        println!("  Due:      {}", due);
    }
    if !task.tags.is_empty() {
        println!("  Tags:     {}", task.tags.join(", "));
    }
    println!("  Created:  {}", format_timestamp(task.created_at));
    if let Some(at) = task.completed_at {
        println!("  Done:     {} (+{} XP)", format_timestamp(at), task.xp_earned);
    }
    for sub in &task.subtasks {
        println!(
            "  [{}] {} ({} min)  {}",
            if sub.completed { "x" } else { " " },
            sub.title,
            sub.estimated_time,
            sub.subtask_id
        );
    }
}

fn print_completion(task: &Task, completion: &CompletionOutcome) {
    println!("Completed {} {}", task.emoji, task.title);
    println!(
        "+{} XP  (total {}, level {}{})",
        completion.xp.amount,
        completion.xp.total_xp,
        completion.xp.level,
        if completion.xp.leveled_up { ", level up!" } else { "" }
    );
    println!("Streak: {} day(s)", completion.streak);
    print_badges(&completion.new_badges);
}

fn print_badges(badges: &[BadgeRecord]) {
    for badge in badges {
        println!("Badge unlocked: {} {} - {}", badge.icon, badge.name, badge.description);
    }
}

// ============================================================================
// Personas, Stats, Badges
// ============================================================================

fn cmd_classify(title: &str, description: &str) -> Result<()> {
    let id = classify(title, description);
    let persona = taskly_core::persona::persona(id);
    println!("{} {} ({})", persona.emoji, persona.name, id);
    Ok(())
}

fn cmd_personas() -> Result<()> {
    for p in all_personas() {
        println!("{} {:<18} {:<10} {}", p.emoji, p.name, p.id.as_str(), p.description);
    }
    Ok(())
}

async fn cmd_stats(app: &Taskly, user_id: &str) -> Result<()> {
    let stats = app.tasks.stats(user_id).await?;

    println!("Level {} {}  |  {} XP", stats.level, stats.level_title, stats.xp);
    println!("Streak:          {} day(s)", stats.streak);
    println!("Completed today: {}", stats.completed_today);
    println!("Completed:       {} of {}", stats.total_completed, stats.total_tasks);
    println!("Badges:          {} of {}", stats.badges.len(), stats.all_badges.len());
    println!();
    for day in &stats.weekly_activity {
        println!("  {} {}  {}", day.day, day.date, "#".repeat(day.count));
    }
    Ok(())
}

fn cmd_badges(app: &Taskly, user_id: &str) -> Result<()> {
    let user = app.db.require_user(user_id)?;
    for def in BADGE_DEFINITIONS.iter() {
        let earned = user
            .state
            .badges
            .iter()
            .find(|b| b.badge_type == def.badge_type);
        match earned {
            Some(b) => println!(
                "{} {:<16} earned {}",
                def.icon,
                def.name,
                format_timestamp(b.earned_at)
            ),
            None => println!("   {:<16} locked: {}", def.name, def.description),
        }
    }
    Ok(())
}

// ============================================================================
// Notifications, Dashboard
// ============================================================================

fn cmd_notifications(app: &Taskly, user_id: &str, cmd: NotificationCommand) -> Result<()> {
    match cmd {
        NotificationCommand::List { limit } => {
            let notifications = app.db.list_notifications(user_id, limit)?;
            if notifications.is_empty() {
                println!("No notifications.");
                return Ok(());
            }
            for n in &notifications {
                println!(
                    "{} {}  {}  [{}]",
                    if n.read { " " } else { "*" },
                    format_timestamp(n.created_at),
                    n.title,
                    n.notification_id
                );
                println!("    {}", n.message);
            }
            println!(
                "\nUnread: {}",
                app.db.unread_notification_count(user_id)?
            );
        }
        NotificationCommand::Read { notification_id } => {
            if app.db.mark_notification_read(user_id, &notification_id)? {
                println!("Marked {} read", notification_id);
            } else {
                println!("No unread notification {}", notification_id);
            }
        }
        NotificationCommand::ReadAll => {
            let count = app.db.mark_all_notifications_read(user_id)?;
            println!("Marked {} notifications read", count);
        }
    }
    Ok(())
}

async fn cmd_dashboard(app: &Taskly, user_id: &str) -> Result<()> {
    let dash = app.dashboard.load(user_id).await?;

    println!("{}, {}!", dash.greeting, dash.name);
    println!(
        "Level {} | {} XP | {} day streak | {} unread",
        dash.level, dash.xp, dash.streak, dash.unread_notifications
    );
    println!(
        "Done today: {} | Pending: {}",
        dash.completed_today, dash.total_pending
    );
    println!();
    for task in &dash.today_tasks {
        println!("  {:<6} {} {}", task.priority.as_str(), task.emoji, task.title);
    }
    println!("\n\"{}\"", dash.quote);
    Ok(())
}

// ============================================================================
// Assist
// ============================================================================

fn print_suggestion(s: &TaskSuggestion) {
    if s.timeout {
        println!("(assistant timed out, showing defaults)");
    }
    println!("Emoji:     {}", s.emoji);
    println!("Priority:  {}", s.priority);
    println!("Estimate:  {} min", s.estimated_time);
    println!("Category:  {}", s.category);
    println!("Tags:      {}", s.tags.join(", "));
}

async fn cmd_breakdown(app: &Taskly, title: &str) -> Result<()> {
    let subtasks = app.assist.breakdown(title).await;
    for (i, sub) in subtasks.iter().enumerate() {
        println!(
            "{}. {} ({} min)",
            i + 1,
            sub.title,
            sub.estimated_time.unwrap_or(15)
        );
    }
    Ok(())
}

async fn cmd_chat(
    app: &Taskly,
    user_id: &str,
    message: &str,
    model: Option<&str>,
    session: Option<String>,
) -> Result<()> {
    let model = model
        .map(AiModel::parse_lenient)
        .unwrap_or_else(|| app.assist.default_model());
    let reply = app.assist.chat(user_id, message, model, session).await?;

    println!("[{}] {}", reply.ai_model.display_name(), reply.response);
    println!("\n(session: {})", reply.session_id);
    Ok(())
}

async fn cmd_history(app: &Taskly, user_id: &str, session: Option<&str>) -> Result<()> {
    let messages = app.assist.chat_history(user_id, session).await?;
    if messages.is_empty() {
        println!("No messages.");
        return Ok(());
    }
    for m in &messages {
        println!(
            "{} [{:?}] {}",
            format_timestamp(m.created_at),
            m.role,
            m.content
        );
    }
    Ok(())
}

async fn cmd_coach(
    app: &Taskly,
    user_id: &str,
    task_id: &str,
    message: &str,
    session: Option<String>,
) -> Result<()> {
    let reply = app.assist.coach(user_id, task_id, message, session).await?;
    println!("{} {}: {}", reply.persona_emoji, reply.persona_name, reply.response);
    Ok(())
}

// ============================================================================
// Developer Tools
// ============================================================================

async fn cmd_dev(app: &Taskly, user_id: &str, cmd: DevCommand) -> Result<()> {
    app.db.require_user(user_id)?;
    let engine = app.tasks.engine();
    let guard = engine.lock_user(user_id).await;
    let now = Utc::now();

    match cmd {
        DevCommand::SimulateDay => {
            let (state, badges) = engine.simulate_day(&guard, now).await?;
            println!("Streak is now {} day(s)", state.streak);
            print_badges(&badges);
        }
        DevCommand::ResetStreak => {
            engine.reset_streak(&guard).await?;
            println!("Streak reset");
        }
        DevCommand::AddXp { amount } => {
            let (award, badges) = engine.add_xp(&guard, amount, now).await?;
            println!(
                "+{} XP (total {}, level {})",
                award.amount, award.total_xp, award.level
            );
            print_badges(&badges);
        }
        DevCommand::TriggerBadge { badge } => {
            let badge_type: BadgeType = badge.parse()?;
            match engine.trigger_badge(&guard, badge_type, now).await? {
                Some(record) => print_badges(std::slice::from_ref(&record)),
                None => println!("{} already earned", badge_type),
            }
        }
    }
    Ok(())
}

// ============================================================================
// Export, Info
// ============================================================================

fn cmd_export(app: &Taskly, user_id: &str, format: &str) -> Result<()> {
    if format != "json" {
        anyhow::bail!("Unsupported format '{}'. Only 'json' is supported.", format);
    }

    let export = app.db.export_user(user_id)?;
    let out = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "data": export,
    });

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_info(app: &Taskly) -> Result<()> {
    let stats = app.db.stats()?;

    println!("=== Taskly Database Stats ===");
    println!("Database: {}", app.db.path().display());
    println!();
    println!("Users:         {}", stats.total_users);
    println!("Tasks:         {} ({} completed)", stats.total_tasks, stats.completed_tasks);
    println!(
        "Notifications: {} ({} unread)",
        stats.total_notifications, stats.unread_notifications
    );
    println!("Chat messages: {}", stats.total_chat_messages);
    Ok(())
}
