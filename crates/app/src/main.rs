use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use services::{AppServices, Clock, NextStep, StudyEvent, StudySession, WordDraft};
use voca_core::model::{AccessToken, AssignmentId, StudentId};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingToken,
    MissingAssignment,
    MissingStudent,
    InvalidToken { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidGoal { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingToken => write!(f, "--token is required (or set VOCA_TOKEN)"),
            ArgsError::MissingAssignment => {
                write!(f, "--assignment is required (or set VOCA_ASSIGNMENT_ID)")
            }
            ArgsError::MissingStudent => write!(f, "--student is required"),
            ArgsError::InvalidToken { raw } => write!(f, "invalid --token value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidGoal { raw } => write!(f, "invalid --goal value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id(flag: &'static str, value: &str) -> Result<u64, ArgsError> {
    value.parse().map_err(|_| ArgsError::InvalidId {
        flag,
        raw: value.to_owned(),
    })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- study    [--db <sqlite_url>] --token <uuid> --assignment <id>");
    eprintln!("  cargo run -p app -- seed     [--db <sqlite_url>] [--name <student>] [--goal <n>]");
    eprintln!("  cargo run -p app -- overview [--db <sqlite_url>] --student <id>");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:voca.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  VOCA_DB_URL, VOCA_TOKEN, VOCA_ASSIGNMENT_ID");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Study,
    Seed,
    Overview,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "study" => Some(Self::Study),
            "seed" => Some(Self::Seed),
            "overview" => Some(Self::Overview),
            _ => None,
        }
    }
}

fn db_url_default() -> String {
    std::env::var("VOCA_DB_URL")
        .ok()
        .map_or_else(|| normalize_sqlite_url("sqlite:voca.sqlite3".into()), normalize_sqlite_url)
}

struct StudyArgs {
    db_url: String,
    token: AccessToken,
    assignment_id: AssignmentId,
}

impl StudyArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = db_url_default();
        let mut token = std::env::var("VOCA_TOKEN")
            .ok()
            .map(|raw| {
                AccessToken::from_str(&raw).map_err(|_| ArgsError::InvalidToken { raw })
            })
            .transpose()?;
        let mut assignment_id = std::env::var("VOCA_ASSIGNMENT_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(AssignmentId::new);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--token" => {
                    let value = require_value(args, "--token")?;
                    token = Some(
                        AccessToken::from_str(&value)
                            .map_err(|_| ArgsError::InvalidToken { raw: value })?,
                    );
                }
                "--assignment" => {
                    let value = require_value(args, "--assignment")?;
                    assignment_id = Some(AssignmentId::new(parse_id("--assignment", &value)?));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            token: token.ok_or(ArgsError::MissingToken)?,
            assignment_id: assignment_id.ok_or(ArgsError::MissingAssignment)?,
        })
    }
}

struct SeedArgs {
    db_url: String,
    name: String,
    goal: u32,
}

impl SeedArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = db_url_default();
        let mut name = "Student".to_owned();
        let mut goal = 10;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--name" => name = require_value(args, "--name")?,
                "--goal" => {
                    let value = require_value(args, "--goal")?;
                    goal = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidGoal { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, name, goal })
    }
}

struct OverviewArgs {
    db_url: String,
    student_id: StudentId,
}

impl OverviewArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = db_url_default();
        let mut student_id = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--student" => {
                    let value = require_value(args, "--student")?;
                    student_id = Some(StudentId::new(parse_id("--student", &value)?));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            student_id: student_id.ok_or(ArgsError::MissingStudent)?,
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

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
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
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn report_events(events: &[StudyEvent]) {
    for event in events {
        match event {
            StudyEvent::PassAdvanced { pass } => {
                println!("  (all remaining words were skipped; starting pass {pass})");
            }
            StudyEvent::SessionFrozen { session_number, .. } => {
                println!("  (session {session_number} saved)");
            }
            StudyEvent::GenerationCompleted { perfect: true } => {
                println!("  (list finished with no skipped words, well done)");
            }
            StudyEvent::GenerationCompleted { perfect: false } => {
                println!("  (list finished; skipped words go to a review list)");
            }
            StudyEvent::ReviewAssignmentCreated {
                assignment_id,
                pool_size,
            } => {
                println!(
                    "  (review assignment {} created with {pool_size} word(s))",
                    assignment_id.value()
                );
            }
            _ => {}
        }
    }
}

fn print_counts(session: &StudySession) {
    let counts = session.resolve().counts;
    println!(
        "today {}/{} · overall {}/{}",
        counts.today_completed, counts.today_goal, counts.total_completed, counts.total_words
    );
}

async fn run_study(args: StudyArgs) -> Result<(), Box<dyn std::error::Error>> {
    prepare_sqlite_file(&args.db_url)?;
    let services = AppServices::new_sqlite(&args.db_url, Clock::default_clock()).await?;
    let study = services.study();

    let mut session = study.open_session(&args.token, args.assignment_id).await?;
    println!(
        "Studying assignment {} as {} (pass {})",
        args.assignment_id.value(),
        session.student().name(),
        session.assignment().current_pass()
    );
    print_counts(&session);
    println!("Commands: k = known, u = don't know, r = undo last known, q = quit");

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        let resolution = session.resolve();
        let word_id = match resolution.next {
            NextStep::Word(id) => id,
            NextStep::GoalReached => {
                println!("Daily goal reached. See you tomorrow.");
                break;
            }
            NextStep::Exhausted => {
                println!("Every word in this list is completed.");
                break;
            }
        };
        let Some(word) = session.word(word_id) else {
            break;
        };

        print!("[{}] {} > ", resolution.counts.today_completed + 1, word.text());
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match line.trim() {
            "k" => {
                let outcome = study.mark_known(&mut session, word_id).await?;
                report_events(&outcome.events);
            }
            "u" => {
                let meaning = session
                    .word(word_id)
                    .map(|w| w.meaning().to_owned())
                    .unwrap_or_default();
                let outcome = study.mark_unknown(&mut session, word_id).await?;
                println!("  {meaning}");
                report_events(&outcome.events);
            }
            "r" => {
                if let Some(&last) = session.known_draft().last() {
                    let outcome = study.revert_to_skipped(&mut session, last).await?;
                    println!("  (reverted)");
                    report_events(&outcome.events);
                } else {
                    println!("  nothing to revert today");
                }
            }
            "q" => break,
            _ => println!("  k = known, u = don't know, r = undo last known, q = quit"),
        }
    }

    print_counts(&session);
    Ok(())
}

const DEMO_WORDS: &[(&str, &str)] = &[
    ("serendipity", "finding something good without looking for it"),
    ("ephemeral", "lasting for a very short time"),
    ("ubiquitous", "present or found everywhere"),
    ("laconic", "using very few words"),
    ("candor", "honest and direct speech"),
    ("zenith", "the highest point"),
    ("austere", "severe or strict in appearance"),
    ("placate", "to make someone less angry"),
    ("tenacity", "determination; persistence"),
    ("lucid", "clear and easy to understand"),
];

async fn run_seed(args: SeedArgs) -> Result<(), Box<dyn std::error::Error>> {
    prepare_sqlite_file(&args.db_url)?;
    let services = AppServices::new_sqlite(&args.db_url, Clock::default_clock()).await?;

    let student = services.students().create(&args.name, args.goal).await?;
    let drafts = DEMO_WORDS
        .iter()
        .map(|(text, meaning)| WordDraft {
            text: (*text).to_owned(),
            meaning: (*meaning).to_owned(),
            example: None,
            mnemonic: None,
            audio_url: None,
        })
        .collect();
    let wordlist = services.wordlists().create("Starter words", drafts).await?;
    let assignment = services
        .assignments()
        .assign(student.id(), wordlist.id(), None)
        .await?;

    println!("student      {} ({})", student.id().value(), student.name());
    println!("access token {}", student.token());
    println!("wordlist     {} ({} words)", wordlist.id().value(), wordlist.word_count());
    println!("assignment   {}", assignment.id().value());
    println!();
    println!(
        "Start studying with:\n  cargo run -p app -- study --token {} --assignment {}",
        student.token(),
        assignment.id().value()
    );
    Ok(())
}

async fn run_overview(args: OverviewArgs) -> Result<(), Box<dyn std::error::Error>> {
    prepare_sqlite_file(&args.db_url)?;
    let services = AppServices::new_sqlite(&args.db_url, Clock::default_clock()).await?;

    let overview = services.overview().student_overview(args.student_id).await?;
    println!(
        "{} (daily goal {})",
        overview.student.name(),
        overview.student.daily_goal()
    );
    for row in &overview.assignments {
        println!(
            "  [{}] {} gen {} · {}/{} completed · {} unknown · {} session(s) · {} test(s)",
            row.assignment.id().value(),
            row.wordlist_name,
            row.assignment.generation(),
            row.completed_words,
            row.total_words,
            row.unknown_words,
            row.sessions.len(),
            row.tests.len(),
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            io::Error::new(io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    argv.remove(0);

    let mut iter = argv.into_iter();
    let report = |e: ArgsError| {
        eprintln!("{e}");
        print_usage();
        e
    };

    match cmd {
        Command::Study => run_study(StudyArgs::parse(&mut iter).map_err(report)?).await,
        Command::Seed => run_seed(SeedArgs::parse(&mut iter).map_err(report)?).await,
        Command::Overview => run_overview(OverviewArgs::parse(&mut iter).map_err(report)?).await,
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
