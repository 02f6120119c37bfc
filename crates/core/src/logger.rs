use std::any::Any;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::panic::Location;
use std::path::Path;
use std::sync::{mpsc, Mutex, MutexGuard, OnceLock};

use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Destination for formatted log lines.
pub trait LogSink: Send {
    fn write(&mut self, line: &str);
}

/// Appends lines to a log file.
pub struct FileSink {
    file: File,
}

impl FileSink {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl LogSink for FileSink {
    fn write(&mut self, line: &str) {
        writeln!(self.file, "{}", line).ok();
    }
}

/// Forwards lines to the presentation thread.
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

impl LogSink for ChannelSink {
    fn write(&mut self, line: &str) {
        self.tx.send(line.to_string()).ok();
    }
}

/// Writes to stderr. Only useful while no TUI owns the terminal.
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write(&mut self, line: &str) {
        eprintln!("{}", line);
    }
}

struct Logger {
    sinks: Vec<(String, Box<dyn LogSink>)>,
}

fn lock() -> Option<MutexGuard<'static, Logger>> {
    LOGGER
        .get()
        .map(|l| l.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
}

/// Initialize the global logger with a file sink at `<log_dir>/btnsprite.log`.
/// The logger is usable with other sinks even when the file cannot be opened.
pub fn init(log_dir: &Path) -> io::Result<()> {
    LOGGER
        .set(Mutex::new(Logger { sinks: Vec::new() }))
        .ok();
    let file = FileSink::open(&log_dir.join("btnsprite.log"))?;
    add_sink("file", Box::new(file));
    Ok(())
}

/// Attach a named sink. A sink with the same name is replaced.
pub fn add_sink(name: &str, sink: Box<dyn LogSink>) {
    if let Some(mut l) = lock() {
        l.sinks.retain(|(n, _)| n != name);
        l.sinks.push((name.to_string(), sink));
    }
}

pub fn remove_sink(name: &str) {
    if let Some(mut l) = lock() {
        l.sinks.retain(|(n, _)| n != name);
    }
}

pub fn format_line(timestamp: &str, level: &str, msg: &str) -> String {
    format!("{} - {} - {}", timestamp, level, msg)
}

/// Split a formatted line back into (timestamp, level, message).
pub fn parse_line(line: &str) -> Option<(&str, &str, &str)> {
    let mut parts = line.splitn(3, " - ");
    let ts = parts.next()?;
    let level = parts.next()?;
    let msg = parts.next()?;
    Some((ts, level, msg))
}

fn write_log(level: &str, msg: &str) {
    let ts = Local::now().format(TIMESTAMP_FORMAT).to_string();
    let line = format_line(&ts, level, msg);

    if let Some(mut l) = lock() {
        for (_, sink) in l.sinks.iter_mut() {
            sink.write(&line);
        }
    }
}

pub fn info(msg: &str) {
    write_log("INFO", msg);
}

pub fn warn(msg: &str) {
    write_log("WARNING", msg);
}

pub fn error(msg: &str) {
    write_log("ERROR", msg);
}

/// Text carried by a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

pub fn format_panic(payload: &(dyn Any + Send), location: Option<&Location<'_>>) -> String {
    match location {
        Some(at) => format!("panic at {}:{}: {}", at.file(), at.line(), panic_message(payload)),
        None => format!("panic: {}", panic_message(payload)),
    }
}

/// Log a panic as an error. Meant for a panic hook installed while a
/// terminal UI owns stderr.
pub fn log_panic(payload: &(dyn Any + Send), location: Option<&Location<'_>>) {
    error(&format_panic(payload, location));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_roundtrips_through_parser() {
        let line = format_line("2024-05-01 09:30:00", "WARNING", "notifier not configured - skipping");
        assert_eq!(line, "2024-05-01 09:30:00 - WARNING - notifier not configured - skipping");
        let (ts, level, msg) = parse_line(&line).unwrap();
        assert_eq!(ts, "2024-05-01 09:30:00");
        assert_eq!(level, "WARNING");
        assert_eq!(msg, "notifier not configured - skipping");
    }

    #[test]
    fn unstructured_line_is_rejected() {
        assert!(parse_line("plain text").is_none());
    }

    #[test]
    fn file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("app.log");
        {
            let mut sink = FileSink::open(&path).unwrap();
            sink.write("first");
        }
        let mut sink = FileSink::open(&path).unwrap();
        sink.write("second");
        drop(sink);
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn panic_payloads_are_formatted() {
        let at = Location::caller();
        let line = format_panic(&"capture backend crashed", Some(at));
        assert_eq!(line, format!("panic at {}:{}: capture backend crashed", at.file(), at.line()));

        let owned: Box<dyn Any + Send> = Box::new(String::from("index out of bounds"));
        assert_eq!(format_panic(&*owned, None), "panic: index out of bounds");

        let opaque: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*opaque), "panic");
    }

    #[test]
    fn caught_panic_goes_to_the_log_sinks() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path()).ok();
        let (tx, rx) = mpsc::channel();
        add_sink("panic-test", Box::new(ChannelSink::new(tx)));

        let payload = std::panic::catch_unwind(|| panic!("ui thread crashed")).unwrap_err();
        log_panic(&*payload, None);
        remove_sink("panic-test");

        let lines: Vec<String> = rx.try_iter().collect();
        assert!(lines.iter().any(|l| l.ends_with(" - ERROR - panic: ui thread crashed")));
    }
}
