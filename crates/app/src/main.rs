use std::fmt;

use guide_core::model::{RecentlyViewedItem, SectionId, UserId, ViewedKind};
use services::{
    AppServices, AppServicesError, Clock, GuideSession, GuidanceError, GuidanceService,
    RecentlyViewedError, RecentlyViewedService,
};
use storage::catalog::seed_default_catalog;
use storage::repository::{Storage, StorageError};
use storage::sqlite::SqliteInitError;
use thiserror::Error;
use tracing::info;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidUserId { raw: String },
    InvalidNumber { name: &'static str, raw: String },
    InvalidToggle { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing argument: <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid user id: {raw}"),
            ArgsError::InvalidNumber { name, raw } => write!(f, "invalid <{name}> value: {raw}"),
            ArgsError::InvalidToggle { raw } => write!(f, "expected on|off, got: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Args(#[from] ArgsError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Services(#[from] AppServicesError),
    #[error(transparent)]
    Guidance(#[from] GuidanceError),
    #[error(transparent)]
    RecentlyViewed(#[from] RecentlyViewedError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Seed,
    Status,
    Walk { steps: u32 },
    Visit { section: u32, step: u32 },
    Toggle { section: u32, completed: bool },
    Recent,
}

impl Command {
    fn parse(name: &str, positional: &[String]) -> Result<Self, ArgsError> {
        let arg = |index: usize, name: &'static str| {
            positional
                .get(index)
                .ok_or(ArgsError::MissingArgument { name })
        };
        let number = |index: usize, name: &'static str| -> Result<u32, ArgsError> {
            let raw = arg(index, name)?;
            raw.parse().map_err(|_| ArgsError::InvalidNumber {
                name,
                raw: raw.clone(),
            })
        };

        let (command, arity) = match name {
            "seed" => (Self::Seed, 0),
            "status" => (Self::Status, 0),
            "recent" => (Self::Recent, 0),
            "walk" => {
                let steps = if positional.is_empty() {
                    1
                } else {
                    number(0, "n")?
                };
                (Self::Walk { steps }, 1)
            }
            "visit" => (
                Self::Visit {
                    section: number(0, "section")?,
                    step: number(1, "step")?,
                },
                2,
            ),
            "toggle" => {
                let section = number(0, "section")?;
                let completed = match arg(1, "on|off")?.as_str() {
                    "on" => true,
                    "off" => false,
                    other => {
                        return Err(ArgsError::InvalidToggle {
                            raw: other.to_owned(),
                        });
                    }
                };
                (Self::Toggle { section, completed }, 2)
            }
            other => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };

        if let Some(extra) = positional.get(arity) {
            return Err(ArgsError::UnknownArg(extra.clone()));
        }
        Ok(command)
    }
}

struct Args {
    db_url: String,
    user: Option<UserId>,
    command: Command,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- <command> [--db <sqlite_url>] [--user <uuid>]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  seed                      load the default guidance catalog");
    eprintln!("  status                    show progress per section (default)");
    eprintln!("  walk [n]                  visit the next n unvisited steps in guide order");
    eprintln!("  visit <section> <step>    visit a step by position");
    eprintln!("  toggle <section> on|off   mark a section (by id) complete or incomplete");
    eprintln!("  recent                    list recently viewed steps");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  BIZZY_DB_URL (default sqlite://guide.sqlite3), BIZZY_USER_ID, RUST_LOG");
}

fn parse_user(raw: String) -> Result<UserId, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidUserId { raw })
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("BIZZY_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://guide.sqlite3".into(), normalize_sqlite_url);
        let mut user = match std::env::var("BIZZY_USER_ID") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_user(raw)?),
            _ => None,
        };

        let mut positional = Vec::new();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    user = Some(parse_user(require_value(&mut args, "--user")?)?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let command = match positional.split_first() {
            None => Command::Status,
            Some((name, rest)) => Command::parse(name, rest)?,
        };

        Ok(Self {
            db_url,
            user,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), AppError> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let invalid = || ArgsError::InvalidDbUrl {
        raw: db_url.to_string(),
    };
    let path = db_url.strip_prefix("sqlite://").ok_or_else(invalid)?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(invalid().into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::prelude::*;

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        );
    if let Err(err) = registry.try_init() {
        eprintln!("tracing already initialised: {err}");
    }
}

async fn print_status(
    guidance: &GuidanceService,
    session: &mut GuideSession,
) -> Result<(), AppError> {
    let overview = guidance.overview(session).await?;
    for (section, progress) in session.sections().iter().zip(&overview) {
        let mark = if progress.completed { "done" } else { "" };
        println!(
            "{:>2}. {:<28} {:>3}% ({}/{}) {mark}",
            section.order_number(),
            section.title(),
            progress.percentage,
            progress.visited,
            progress.total,
        );
    }
    println!(
        "overall {}%, at step {}",
        guidance.overall_percentage(session).await?,
        session.cursor()
    );

    let wins = guidance.quick_wins(session, 3).await?;
    if !wins.is_empty() {
        println!("quick wins:");
        for step in wins {
            println!("  - {}", step.title());
        }
    }
    Ok(())
}

/// Moves the cursor to the first unvisited step and visits it. Returns `false`
/// when every step has been visited.
async fn resume(
    guidance: &GuidanceService,
    session: &mut GuideSession,
) -> Result<bool, AppError> {
    // Loads every section's steps.
    guidance.overview(session).await?;

    let mut target = None;
    for (position, section) in (1_u32..).zip(session.sections()) {
        let unvisited = session
            .loaded_steps(section.id())
            .unwrap_or_default()
            .iter()
            .find(|step| !session.is_visited(step.id()));
        if let Some(step) = unvisited {
            target = Some((position, step.order_number()));
            break;
        }
    }

    let Some((section, step)) = target else {
        return Ok(false);
    };
    guidance.go_to(session, section, step).await?;
    Ok(true)
}

async fn remember_current(
    recent: &RecentlyViewedService,
    session: &GuideSession,
    clock: Clock,
) -> Result<(), AppError> {
    let Some(step) = session.current_step() else {
        return Ok(());
    };
    recent
        .record(RecentlyViewedItem {
            id: step.id().to_string(),
            kind: ViewedKind::Step,
            title: step.title().to_owned(),
            path: format!("/guidance?section={}&step={}", step.section_id(), step.id()),
            viewed_at: clock.now(),
        })
        .await?;
    Ok(())
}

fn print_current(session: &GuideSession) {
    match (session.current_section(), session.current_step()) {
        (Some(section), Some(step)) => {
            println!("{} {}: {}", session.cursor(), section.title(), step.title());
        }
        (Some(section), None) => println!("{} {}: no steps", session.cursor(), section.title()),
        _ => {}
    }
}

async fn run() -> Result<(), AppError> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    init_tracing();

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let clock = Clock::default();

    if args.command == Command::Seed {
        let storage = Storage::sqlite(&args.db_url).await?;
        let (sections, steps) = seed_catalog(&storage).await?;
        info!(db = %args.db_url, "catalog ready");
        println!("seeded {sections} sections and {steps} steps");
        return Ok(());
    }

    let app = AppServices::new_sqlite(&args.db_url, clock).await?;
    if args.user.is_none() && args.command != Command::Recent {
        info!("no user id given, progress will not be saved");
    }
    execute(&app, args.user, args.command, clock).await
}

/// Writes the default catalog. Safe to run on an already seeded database.
async fn seed_catalog(storage: &Storage) -> Result<(usize, usize), AppError> {
    Ok(seed_default_catalog(storage.guidance.as_ref()).await?)
}

/// Runs every command except `seed`. Only `walk` and `visit` record visits.
async fn execute(
    app: &AppServices,
    user: Option<UserId>,
    command: Command,
    clock: Clock,
) -> Result<(), AppError> {
    let guidance = app.guidance();
    let recent = app.recently_viewed();

    match command {
        Command::Seed => {}
        Command::Status => {
            let mut session = guidance.load(user).await?;
            print_status(&guidance, &mut session).await?;
        }
        Command::Walk { steps } => {
            let mut session = guidance.load(user).await?;
            let mut walked = 0;
            while walked < steps && resume(&guidance, &mut session).await? {
                print_current(&session);
                remember_current(&recent, &session, clock).await?;
                walked += 1;
            }
            if walked == 0 {
                println!("every step has been visited");
            }
            print_status(&guidance, &mut session).await?;
        }
        Command::Visit { section, step } => {
            let mut session = guidance.load(user).await?;
            guidance.go_to(&mut session, section, step).await?;
            print_current(&session);
            remember_current(&recent, &session, clock).await?;
            print_status(&guidance, &mut session).await?;
        }
        Command::Toggle { section, completed } => {
            let mut session = guidance.load(user).await?;
            let section_id = SectionId::new(u64::from(section));
            guidance
                .toggle_section(&mut session, section_id, completed)
                .await?;
            print_status(&guidance, &mut session).await?;
        }
        Command::Recent => {
            for item in recent.list().await? {
                println!(
                    "{}  {}  {}",
                    item.viewed_at.format("%Y-%m-%d %H:%M"),
                    item.title,
                    item.path
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
