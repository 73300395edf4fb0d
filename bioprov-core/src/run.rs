//! Execution records for programs

use crate::env::{current_user, EnvSnapshot};
use crate::error::Result;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Stdout longer than this many characters is dropped from serialized runs
pub const DEFAULT_SUPPRESS_THRESHOLD: usize = 5000;

/// Column at which logged commands are wrapped
const LOG_WRAP_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Finished,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Pending => f.write_str("Pending"),
            RunStatus::Finished => f.write_str("Finished"),
        }
    }
}

/// A single execution of a program.
///
/// The program and sample are referenced by name only. A run moves from
/// `Pending` to `Finished` once its process exits, whatever the exit code;
/// `exit_code` is kept for inspection but does not affect the status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RunDoc", from = "RunDoc")]
pub struct Run {
    pub program: String,
    pub sample: Option<String>,
    pub cmd: String,
    pub pid: Option<u32>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed wall-clock seconds
    pub duration: Option<f64>,
    pub started: bool,
    pub finished: bool,
    pub user: Option<String>,
    /// Hash of the environment the process ran in
    pub env: Option<String>,
    pub auto_suppress_stdout: bool,
    pub suppress_threshold: usize,
}

impl Run {
    pub fn new<P: Into<String>, C: Into<String>>(program: P, cmd: C, sample: Option<&str>) -> Self {
        Self {
            program: program.into(),
            sample: sample.map(str::to_string),
            cmd: cmd.into(),
            pid: None,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            start_time: None,
            end_time: None,
            duration: None,
            started: false,
            finished: false,
            user: None,
            env: None,
            auto_suppress_stdout: true,
            suppress_threshold: DEFAULT_SUPPRESS_THRESHOLD,
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.finished {
            RunStatus::Finished
        } else {
            RunStatus::Pending
        }
    }

    /// Execute the command through `sh -c`, blocking until it exits.
    ///
    /// There is no timeout: a process that never exits blocks the caller.
    /// Only reachable through [`Program::run`](crate::Program::run), which
    /// refuses binaries that were not found.
    pub(crate) fn run(&mut self) -> Result<()> {
        log::info!("Running {}:\n    {}", self.program, wrap_command(&self.cmd));

        self.user = Some(current_user());
        self.env = Some(EnvSnapshot::capture().env_hash);
        self.start_time = Some(Utc::now());
        self.started = true;
        let clock = Instant::now();

        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.cmd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        self.pid = Some(child.id());
        let output = child.wait_with_output()?;

        self.end_time = Some(Utc::now());
        self.duration = Some(clock.elapsed().as_secs_f64());
        self.stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        self.stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        self.exit_code = output.status.code();
        self.finished = true;

        if !output.status.success() {
            log::warn!(
                "{} exited with status {}",
                self.program,
                self.exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
        }
        log::debug!(
            "{} finished in {:.2}s",
            self.program,
            self.duration.unwrap_or_default()
        );
        Ok(())
    }

    fn stdout_suppressed(&self) -> bool {
        self.auto_suppress_stdout && self.stdout.chars().count() > self.suppress_threshold
    }
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Run of '{}' ({}): {}", self.program, self.status(), self.cmd)
    }
}

/// Break a long command into continuation lines for the log
fn wrap_command(cmd: &str) -> String {
    if cmd.len() <= LOG_WRAP_WIDTH {
        return cmd.to_string();
    }
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for token in cmd.split_whitespace() {
        if !current.is_empty() && current.len() + token.len() + 1 > LOG_WRAP_WIDTH {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(token);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join(" \\\n    ")
}

/// Persisted shape of a run. Older documents omit `program`, write times as
/// `%c` local-time strings and durations as `H:MM:SS.ffffff`; all are accepted.
#[derive(Serialize, Deserialize)]
struct RunDoc {
    #[serde(default)]
    program: String,
    #[serde(default)]
    sample: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    cmd: String,
    #[serde(default)]
    pid: Option<u32>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    stderr: String,
    #[serde(default)]
    exit_code: Option<i32>,
    #[serde(default, deserialize_with = "lenient_time")]
    start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_time")]
    end_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_duration")]
    duration: Option<f64>,
    #[serde(default)]
    started: bool,
    #[serde(default)]
    finished: bool,
    #[serde(default)]
    status: Option<RunStatus>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    env: Option<String>,
    #[serde(default = "default_true", alias = "_auto_suppress_stdout")]
    auto_suppress_stdout: bool,
    #[serde(default = "default_threshold")]
    suppress_threshold: usize,
}

/// Format of timestamps written by `strftime("%c")`
const LEGACY_TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_time<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|text| {
        let parsed = parse_time(&text);
        if parsed.is_none() {
            log::debug!("Ignoring unreadable run timestamp '{}'", text);
        }
        parsed
    }))
}

/// RFC 3339, or a `%c` timestamp in local time
fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, LEGACY_TIME_FORMAT)
        .ok()?
        .and_local_timezone(Local)
        .single()
        .map(|time| time.with_timezone(&Utc))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(f64),
    Text(String),
}

fn lenient_duration<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawDuration> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawDuration::Seconds(seconds)) => Some(seconds),
        Some(RawDuration::Text(text)) => {
            let parsed = parse_clock_duration(&text);
            if parsed.is_none() {
                log::debug!("Ignoring unreadable run duration '{}'", text);
            }
            parsed
        }
        None => None,
    })
}

/// Seconds in `[D day[s], ]H:MM:SS[.ffffff]`
fn parse_clock_duration(text: &str) -> Option<f64> {
    let (days, clock) = match text.trim().split_once(", ") {
        Some((days, clock)) => (days.split_whitespace().next()?.parse::<f64>().ok()?, clock),
        None => (0.0, text.trim()),
    };
    let mut fields = clock.split(':').map(|f| f.parse::<f64>());
    let (hours, minutes, seconds) = match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(Ok(h)), Some(Ok(m)), Some(Ok(s)), None) => (h, m, s),
        _ => return None,
    };
    Some(days * 86_400.0 + hours * 3_600.0 + minutes * 60.0 + seconds)
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> usize {
    DEFAULT_SUPPRESS_THRESHOLD
}

impl From<Run> for RunDoc {
    fn from(run: Run) -> Self {
        let stdout = if run.stdout_suppressed() {
            None
        } else {
            Some(run.stdout.clone())
        };
        let status = Some(run.status());
        Self {
            program: run.program,
            sample: run.sample,
            cmd: run.cmd,
            pid: run.pid,
            stdout,
            stderr: run.stderr,
            exit_code: run.exit_code,
            start_time: run.start_time,
            end_time: run.end_time,
            duration: run.duration,
            started: run.started,
            finished: run.finished,
            status,
            user: run.user,
            env: run.env,
            auto_suppress_stdout: run.auto_suppress_stdout,
            suppress_threshold: run.suppress_threshold,
        }
    }
}

impl From<RunDoc> for Run {
    fn from(doc: RunDoc) -> Self {
        // status is derived from `finished`; the stored value is ignored
        Self {
            program: doc.program,
            sample: doc.sample,
            cmd: doc.cmd,
            pid: doc.pid,
            stdout: doc.stdout.unwrap_or_default(),
            stderr: doc.stderr,
            exit_code: doc.exit_code,
            start_time: doc.start_time,
            end_time: doc.end_time,
            duration: doc.duration,
            started: doc.started,
            finished: doc.finished,
            user: doc.user,
            env: doc.env,
            auto_suppress_stdout: doc.auto_suppress_stdout,
            suppress_threshold: doc.suppress_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let mut run = Run::new("echo", "echo hello", Some("s1"));
        assert_eq!(run.status(), RunStatus::Pending);
        assert_eq!(run.status().to_string(), "Pending");

        run.run().unwrap();
        assert_eq!(run.status(), RunStatus::Finished);
        assert_eq!(run.stdout.trim(), "hello");
        assert_eq!(run.exit_code, Some(0));
        assert!(run.pid.is_some());
        assert!(run.start_time.unwrap() <= run.end_time.unwrap());
        assert!(run.duration.unwrap() >= 0.0);
    }

    #[test]
    fn test_failed_command_still_finishes() {
        let mut run = Run::new("sh", "echo oops >&2; exit 3", None);
        run.run().unwrap();
        assert_eq!(run.status(), RunStatus::Finished);
        assert_eq!(run.exit_code, Some(3));
        assert_eq!(run.stderr.trim(), "oops");
    }

    #[test]
    fn test_large_stdout_is_elided_on_serialize() {
        let mut run = Run::new("printf", "printf big", None);
        run.stdout = "x".repeat(DEFAULT_SUPPRESS_THRESHOLD + 1);
        run.finished = true;

        let value = serde_json::to_value(&run).unwrap();
        assert!(value["stdout"].is_null());
        assert_eq!(value["status"], "Finished");
        assert_eq!(run.stdout.len(), DEFAULT_SUPPRESS_THRESHOLD + 1);

        run.auto_suppress_stdout = false;
        let value = serde_json::to_value(&run).unwrap();
        assert!(value["stdout"].is_string());
    }

    #[test]
    fn test_status_derived_on_load() {
        let run: Run = serde_json::from_str(
            r#"{"program": "prodigal", "cmd": "prodigal -i a.fna", "finished": false, "status": "Finished"}"#,
        )
        .unwrap();
        assert_eq!(run.status(), RunStatus::Pending);
        assert_eq!(run.suppress_threshold, DEFAULT_SUPPRESS_THRESHOLD);
    }

    #[test]
    fn test_clock_durations() {
        assert_eq!(parse_clock_duration("0:00:01.500000"), Some(1.5));
        assert_eq!(parse_clock_duration("1:02:03"), Some(3723.0));
        assert_eq!(parse_clock_duration("2 days, 0:00:10"), Some(172_810.0));
        assert_eq!(parse_clock_duration("soon"), None);
        assert_eq!(parse_clock_duration("1:2:3:4"), None);
    }

    #[test]
    fn test_legacy_run_fields() {
        let run: Run = serde_json::from_str(
            r#"{
                "cmd": "prodigal -i a.fna",
                "process": "<Popen: returncode: 0 args: 'prodigal -i a.fna'>",
                "stdin": null,
                "stdout": "done",
                "stderr": null,
                "_auto_suppress_stdout": false,
                "start_time": "Tue Aug  4 10:15:30 2020",
                "end_time": "not a time",
                "duration": "0:00:02.250000",
                "started": true,
                "finished": true,
                "status": "Finished",
                "user": "vini",
                "env": "abc123"
            }"#,
        )
        .unwrap();
        assert_eq!(run.program, "");
        assert_eq!(run.stderr, "");
        assert!(!run.auto_suppress_stdout);
        assert_eq!(run.duration, Some(2.25));
        assert_eq!(run.end_time, None);
        let start = run.start_time.unwrap().with_timezone(&Local).naive_local();
        assert_eq!(start.to_string(), "2020-08-04 10:15:30");
        assert_eq!(run.status(), RunStatus::Finished);

        let numeric: Run =
            serde_json::from_str(r#"{"program": "p", "duration": 3, "start_time": null}"#).unwrap();
        assert_eq!(numeric.duration, Some(3.0));
        assert_eq!(numeric.start_time, None);
    }

    #[test]
    fn test_wrap_command() {
        let short = "prodigal -i a.fna";
        assert_eq!(wrap_command(short), short);

        let long = format!("blastn {}", "-flag value ".repeat(12));
        let wrapped = wrap_command(&long);
        assert!(wrapped.contains(" \\\n    "));
        assert!(wrapped.lines().all(|l| l.trim_end_matches(" \\").len() <= LOG_WRAP_WIDTH + 4));
    }
}
