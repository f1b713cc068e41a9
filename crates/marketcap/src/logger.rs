use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
            LogLevel::Debug => log::Level::Debug,
        }
    }
}

/// Append-only progress log: one `<timestamp> : <message>` line per entry.
///
/// Entries are also forwarded to the `log` facade at the matching level. The
/// file line carries no level so existing logs keep a single format.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::log!(log::Level::from(level), "{}", message);

        if let Err(e) = self.append(Local::now().naive_local(), message) {
            log::warn!("Failed to write to {}: {}", self.path.display(), e);
        }
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message)
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message)
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message)
    }

    fn append(&self, timestamp: NaiveDateTime, message: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format_line(timestamp, message).as_bytes())?;
        file.flush()
    }
}

fn format_line(timestamp: NaiveDateTime, message: &str) -> String {
    format!("{} : {}\n", timestamp.format("%Y-%m-%dT%H:%M:%S"), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;

    #[test]
    fn test_format_line() {
        let timestamp = NaiveDate::from_ymd_opt(2023, 9, 8)
            .unwrap()
            .and_hms_milli_opt(9, 16, 35, 512)
            .unwrap();

        assert_eq!(
            format_line(timestamp, "Data saved to CSV file"),
            "2023-09-08T09:16:35 : Data saved to CSV file\n"
        );
    }

    #[test]
    fn test_log_appends_one_line_per_call() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("code_log.txt");
        fs::write(&path, "existing line\n").expect("Failed to seed log");

        let log = ProgressLog::new(&path);
        log.debug("first");
        log.error("second");

        let contents = fs::read_to_string(&path).expect("Failed to read log");
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "existing line");
        assert!(lines[1].ends_with(" : first"));
        assert!(lines[2].ends_with(" : second"));
        assert!(!lines[2].contains("ERROR"));
    }

    #[test]
    fn test_log_to_unwritable_path_does_not_panic() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let log = ProgressLog::new(dir.path().join("missing").join("code_log.txt"));
        log.info("nowhere to go");
        assert!(!log.path().exists());
    }
}
