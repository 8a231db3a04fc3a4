use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info, warn};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use lesson_core::model::LessonConfig;
use services::{
    Clock, EngineOptions, FeedbackView, LessonEvent, LessonHandle, LessonRunner,
    PlaybackControl, PlaybackError, Presenter, QuestionView, SessionMode,
};
use storage::repository::Storage;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    EphemeralDb { raw: String },
    EmptySessionId,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::EphemeralDb { raw } => write!(
                f,
                "--db {raw} would not outlive this run; omit --db for preview mode"
            ),
            ArgsError::EmptySessionId => write!(f, "--session cannot be empty"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  cargo run -p app -- [--config <lesson.json>] [--db <sqlite_path>] [--session <id>] [--events <script.jsonl>]"
    );
    eprintln!();
    eprintln!("Without --db the lesson runs in preview mode and nothing is recorded.");
    eprintln!("Without --events, events are read from stdin, one JSON object per line:");
    eprintln!(r#"  {{"event":"position_advanced","position":10.2}}"#);
    eprintln!(r#"  {{"event":"submit_answer","choice":1}}"#);
    eprintln!(r#"  {{"wait_ms":600}}"#);
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --config lesson.json");
    eprintln!("  --session local");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LESSON_CONFIG, LESSON_DB_URL, LESSON_SESSION_ID, RUST_LOG");
}

struct Args {
    config_path: String,
    db: Option<SessionDb>,
    session_id: String,
    events_path: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut config_path =
            std::env::var("LESSON_CONFIG").unwrap_or_else(|_| "lesson.json".into());
        let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut db = std::env::var("LESSON_DB_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| SessionDb::parse(&value, &base))
            .transpose()?;
        let mut session_id =
            std::env::var("LESSON_SESSION_ID").unwrap_or_else(|_| "local".into());
        let mut events_path = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => config_path = require_value(args, "--config")?,
                "--db" => {
                    let value = require_value(args, "--db")?;
                    db = Some(SessionDb::parse(&value, &base)?);
                }
                "--session" => session_id = require_value(args, "--session")?,
                "--events" => events_path = Some(require_value(args, "--events")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if session_id.trim().is_empty() {
            return Err(ArgsError::EmptySessionId);
        }

        Ok(Self {
            config_path,
            db,
            session_id,
            events_path,
        })
    }
}

/// SQLite file that keeps one learner's session values between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionDb {
    path: PathBuf,
}

impl SessionDb {
    /// Accepts `sqlite://<path>`, `sqlite:<path>` or a bare path; relative paths
    /// resolve against `base`. In-memory databases are refused because the
    /// session would be gone when the process exits.
    fn parse(raw: &str, base: &Path) -> Result<Self, ArgsError> {
        let trimmed = raw.trim();
        let location = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);
        let (location, query) = location.split_once('?').unwrap_or((location, ""));

        if location.is_empty() {
            return Err(ArgsError::InvalidDbUrl {
                raw: raw.to_owned(),
            });
        }
        if location == ":memory:" || query.contains("mode=memory") {
            return Err(ArgsError::EphemeralDb {
                raw: raw.to_owned(),
            });
        }

        let path = Path::new(location);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        };
        Ok(Self { path })
    }

    fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    /// Create the file (and its directories) so the pool can open it.
    fn ensure_file(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map(drop)
    }
}

/// A missing or invalid lesson file leaves the engine disabled rather than aborting.
async fn load_config(path: &str) -> Option<LessonConfig> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) => {
            error!("could not read lesson config `{path}`: {err}");
            return None;
        }
    };
    match LessonConfig::from_json(&raw) {
        Ok(config) => {
            for skipped in config.skipped() {
                warn!("interaction `{}` skipped: {}", skipped.id, skipped.reason);
            }
            Some(config)
        }
        Err(err) => {
            error!("invalid lesson config `{path}`: {err}");
            None
        }
    }
}

//
// ─── HEADLESS HOST ─────────────────────────────────────────────────────────────
//

/// Playback stand-in that only logs what the lesson asks of the player.
struct LoggingPlayback;

impl PlaybackControl for LoggingPlayback {
    fn pause(&mut self) {
        info!("[player] pause");
    }

    fn resume(&mut self) {
        info!("[player] resume");
    }

    fn force_position(&mut self, position: f64) -> Result<(), PlaybackError> {
        info!("[player] seek to {position:.2}");
        Ok(())
    }
}

struct LoggingPresenter;

impl Presenter for LoggingPresenter {
    fn render_title(&mut self, title: &str) {
        info!("[ui] {title}");
    }

    fn render_session_mode(&mut self, mode: SessionMode) {
        match mode {
            SessionMode::Connected => info!("[ui] connected to session"),
            SessionMode::Preview => info!("[ui] preview mode (no session)"),
        }
    }

    fn render_question(&mut self, view: &QuestionView<'_>) {
        info!("[ui] Question {} of {}: {}", view.ordinal, view.total, view.prompt);
        for (index, choice) in view.choices.iter().enumerate() {
            info!("[ui]   {index}) {choice}");
        }
    }

    fn render_feedback(&mut self, view: &FeedbackView<'_>) {
        let verdict = match (view.correct, view.timed_out) {
            (true, _) => "Correct.",
            (false, true) => "Time is up.",
            (false, false) => "Not quite.",
        };
        match view.explanation {
            Some(explanation) => info!("[ui] {verdict} {explanation}"),
            None => info!("[ui] {verdict}"),
        }
    }

    fn set_choices_enabled(&mut self, enabled: bool) {
        info!("[ui] choices {}", if enabled { "enabled" } else { "disabled" });
    }

    fn set_continue_visible(&mut self, visible: bool) {
        if visible {
            info!("[ui] continue offered");
        }
    }

    fn show_countdown(&mut self, remaining_secs: u32) {
        info!("[ui] {remaining_secs}s left");
    }

    fn hide_countdown(&mut self) {}

    fn hide_question(&mut self) {
        info!("[ui] question closed");
    }

    fn render_score(&mut self, score: u32, total: usize) {
        info!("[ui] score {score}/{total}");
    }
}

/// One line of an event script: a pause in real time or an event for the lesson.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptLine {
    Wait { wait_ms: u64 },
    Event(LessonEvent),
}

async fn replay<R>(
    reader: R,
    handle: &LessonHandle,
) -> Result<(), Box<dyn std::error::Error>>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut number = 0_usize;
    while let Some(line) = lines.next_line().await? {
        number += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<ScriptLine>(line) {
            Ok(ScriptLine::Wait { wait_ms }) => {
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            }
            Ok(ScriptLine::Event(event)) => handle.send(event)?,
            Err(err) => warn!("line {number}: unreadable event ({err}); skipped"),
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let config = load_config(&args.config_path).await;

    // Open + migrate SQLite in the binary glue so core/services stay pure.
    let storage = match &args.db {
        Some(db) => {
            db.ensure_file()?;
            Storage::sqlite(&db.url(), &args.session_id).await?
        }
        None => Storage::preview(),
    };

    let (runner, handle) = LessonRunner::new(
        config,
        Box::new(LoggingPlayback),
        Box::new(LoggingPresenter),
        storage.session,
        Clock::default_clock(),
        EngineOptions::default(),
    );
    let lesson = tokio::spawn(runner.run());

    match &args.events_path {
        Some(path) => replay(tokio::fs::File::open(path).await?, &handle).await?,
        None => replay(tokio::io::stdin(), &handle).await?,
    }
    handle.shutdown()?;

    let mut engine = lesson.await?;
    let snapshot = engine.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_db_accepts_url_and_bare_path_forms() {
        let base = Path::new("/work");
        let expected = SessionDb {
            path: PathBuf::from("/work/data/lesson.sqlite3"),
        };

        assert_eq!(
            SessionDb::parse("data/lesson.sqlite3", base).unwrap(),
            expected
        );
        assert_eq!(
            SessionDb::parse("sqlite:data/lesson.sqlite3", base).unwrap(),
            expected
        );
        assert_eq!(
            SessionDb::parse("sqlite:///work/data/lesson.sqlite3?mode=rwc", base).unwrap(),
            expected
        );
        assert_eq!(expected.url(), "sqlite:///work/data/lesson.sqlite3");
    }

    #[test]
    fn session_db_refuses_memory_and_empty_targets() {
        let base = Path::new("/work");
        assert!(matches!(
            SessionDb::parse("sqlite::memory:", base),
            Err(ArgsError::EphemeralDb { .. })
        ));
        assert!(matches!(
            SessionDb::parse("sqlite:file:lesson?mode=memory&cache=shared", base),
            Err(ArgsError::EphemeralDb { .. })
        ));
        assert!(matches!(
            SessionDb::parse("  ", base),
            Err(ArgsError::InvalidDbUrl { .. })
        ));
    }

    #[test]
    fn session_db_creates_missing_directories() {
        let dir = std::env::temp_dir().join(format!("lesson-app-{}", std::process::id()));
        let db = SessionDb::parse("nested/session.sqlite3", &dir).unwrap();

        db.ensure_file().unwrap();
        assert!(db.path.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
