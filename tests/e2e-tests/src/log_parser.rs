use regex::Regex;
use std::io;
use std::path::Path;

/// Utilities for parsing and analyzing log files
pub struct LogParser {
    lines: Vec<String>,
}

impl LogParser {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Read every line of a log file
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(content.lines().map(str::to_string).collect()))
    }

    /// Count occurrences of a pattern
    pub fn count_occurrences(&self, pattern: &str) -> usize {
        self.lines.iter().filter(|line| line.contains(pattern)).count()
    }

    /// Check if some line starts with `prefix` and ends with `message`
    pub fn has_prefixed_line(&self, prefix: &str, message: &str) -> bool {
        self.lines
            .iter()
            .any(|line| line.starts_with(prefix) && line.ends_with(message))
    }

    /// First line that does not match `regex`, with its 1-based number
    pub fn first_mismatch(&self, regex: &Regex) -> Option<(usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .find(|(_, line)| !regex.is_match(line))
            .map(|(i, line)| (i + 1, line.as_str()))
    }

    pub fn all_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prefixed_line() {
        let logs = vec![
            "12:00:00,000 INFO  [test] (main) Test message".to_string(),
            "[test-prefix] 12:00:00,001 INFO  [test] (main) Test message".to_string(),
            "[test-prefix] 12:00:00,002 INFO  [test] (main) Other".to_string(),
        ];
        let parser = LogParser::new(logs);

        assert!(parser.has_prefixed_line("[test-prefix] ", "Test message"));
        assert!(!parser.has_prefixed_line("[test-prefix] ", "Missing"));
        assert!(!parser.has_prefixed_line("[other] ", "Test message"));
    }

    #[test]
    fn test_count_occurrences() {
        let logs = vec![
            "Error: something".to_string(),
            "Info: ok".to_string(),
            "Error: another".to_string(),
        ];
        let parser = LogParser::new(logs);

        assert_eq!(parser.count_occurrences("Error"), 2);
        assert_eq!(parser.count_occurrences("Info"), 1);
    }

    #[test]
    fn test_first_mismatch_numbers_lines() {
        let parser = LogParser::new(vec![
            "INFO a".to_string(),
            "INFO b".to_string(),
            "garbage".to_string(),
        ]);
        let regex = Regex::new(r"^INFO ").unwrap();
        assert_eq!(parser.first_mismatch(&regex), Some((3, "garbage")));
    }

    #[test]
    fn test_from_file_splits_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.log");
        std::fs::write(&path, "first\r\nsecond\n").unwrap();

        let parser = LogParser::from_file(&path).unwrap();
        assert_eq!(parser.all_lines(), ["first", "second"]);
    }

    #[test]
    fn test_empty_and_missing_files() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.log");
        std::fs::write(&empty, "").unwrap();

        let parser = LogParser::from_file(&empty).unwrap();
        assert!(parser.is_empty());
        assert!(parser.first_mismatch(&Regex::new("x").unwrap()).is_none());

        assert!(LogParser::from_file(dir.path().join("missing.log")).is_err());
    }
}
