//! Custom assertions for E2E tests

use crate::log_parser::LogParser;
use ember_logging::CapturedConsole;
use ember_process_management::LoggerHint;
use regex::Regex;
use std::path::Path;

/// Regex every bootstrap line written under `hint` matches.
pub fn bootstrap_line_regex(hint: LoggerHint) -> Regex {
    let pattern = match hint {
        LoggerHint::Default => {
            r"^\d{2}:\d{2}:\d{2},\d{3} (TRACE|DEBUG|INFO|WARN|ERROR)\s+\[[^\]]+\] \(.*\) .*$"
        }
        LoggerHint::Compact => r"^(TRACE|DEBUG|INFO|WARN|ERROR)\s+[\w.\-]+: .*$",
        LoggerHint::Json => r#"^\{"timestamp":"[^"]+","level":"[A-Z]+",.*\}$"#,
    };
    Regex::new(pattern).unwrap_or_else(|e| panic!("bad bootstrap regex: {}", e))
}

/// Assert that a log file exists, is non-empty and every line matches `regex`
pub fn assert_every_line_matches(path: &Path, regex: &Regex) -> Result<(), String> {
    let parser = LogParser::from_file(path)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;

    if parser.is_empty() {
        return Err(format!("{} is empty", path.display()));
    }

    match parser.first_mismatch(regex) {
        None => Ok(()),
        Some((number, line)) => Err(format!(
            "{} line {} does not match {}: {:?}",
            path.display(),
            number,
            regex.as_str(),
            line
        )),
    }
}

/// Assert that some line starts with `prefix` and ends with `message`
pub fn assert_prefixed_message(path: &Path, prefix: &str, message: &str) -> Result<(), String> {
    let parser = LogParser::from_file(path)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;

    if parser.has_prefixed_line(prefix, message) {
        Ok(())
    } else {
        Err(format!(
            "No line in {} starts with {:?} and ends with {:?}. Lines:\n{:#?}",
            path.display(),
            prefix,
            message,
            parser.all_lines()
        ))
    }
}

/// Assert that a message does not appear in a log file
pub fn assert_message_absent(path: &Path, message: &str) -> Result<(), String> {
    let parser = LogParser::from_file(path)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    match parser.count_occurrences(message) {
        0 => Ok(()),
        n => Err(format!(
            "{:?} appears {} time(s) in {}",
            message,
            n,
            path.display()
        )),
    }
}

/// Assert that nothing was written to the captured console
pub fn assert_console_silent(console: &CapturedConsole) -> Result<(), String> {
    if console.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "Console not empty.\nstdout: {:?}\nstderr: {:?}",
            console.stdout(),
            console.stderr()
        ))
    }
}
