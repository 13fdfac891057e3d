//! Record formatters.
//!
//! [`PatternFormatter`] understands a small, fixed set of conversions:
//!
//! | conversion | output |
//! |---|---|
//! | `%d` / `%d{HH:mm:ss,SSS}` | timestamp (`yyyy MM dd HH mm ss SSS` tokens) |
//! | `%p` | level |
//! | `%c` | logger category |
//! | `%t` | thread name |
//! | `%s`, `%m` | message |
//! | `%e` | attached error, preceded by a space, or nothing |
//! | `%n` | newline |
//! | `%%` | a literal `%` |
//!
//! Any conversion may carry a width, `%-5p` pads on the right and `%5p` on the
//! left.

use crate::types::LogRecord;
use ember_common::{LoggingError, LoggingResult};
use serde::Serialize;
use std::fmt;
use tracing::warn;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Pattern of the bootstrap `FILE` handler.
pub const DEFAULT_PATTERN: &str = "%d{HH:mm:ss,SSS} %-5p [%c] (%t) %s%e%n";

/// Shorter bootstrap pattern without timestamp or thread.
pub const COMPACT_PATTERN: &str = "%-5p %c: %s%e%n";

/// Turns a record into the exact text a handler writes.
pub trait Formatter: Send + Sync + fmt::Debug {
    fn format(&self, record: &LogRecord) -> String;
}

/// Formatter selection as carried by handler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatterSpec {
    Pattern(String),
    Json,
}

impl FormatterSpec {
    pub fn build(&self) -> LoggingResult<Box<dyn Formatter>> {
        match self {
            FormatterSpec::Pattern(pattern) => Ok(Box::new(PatternFormatter::parse(pattern)?)),
            FormatterSpec::Json => Ok(Box::new(JsonFormatter)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Level,
    Category,
    Thread,
    Message,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Padding {
    left_align: bool,
    width: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Date { format: String, padding: Padding },
    Field { conversion: Conversion, padding: Padding },
}

/// Formatter driven by a `%`-conversion pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternFormatter {
    pattern: String,
    segments: Vec<Segment>,
}

impl PatternFormatter {
    pub fn parse(pattern: &str) -> LoggingResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            let mut padding = Padding::default();
            if chars.peek() == Some(&'-') {
                padding.left_align = true;
                chars.next();
            }
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            if !digits.is_empty() {
                let width = digits.parse::<usize>().map_err(|e| {
                    LoggingError::invalid_pattern(pattern, format!("bad width: {}", e))
                })?;
                padding.width = Some(width);
            }

            let conversion = chars
                .next()
                .ok_or_else(|| LoggingError::invalid_pattern(pattern, "dangling '%'"))?;
            let segment = match conversion {
                '%' => {
                    literal.push('%');
                    continue;
                }
                'n' => {
                    literal.push('\n');
                    continue;
                }
                'd' => {
                    let format = if chars.peek() == Some(&'{') {
                        chars.next();
                        let mut date = String::new();
                        loop {
                            match chars.next() {
                                Some('}') => break,
                                Some(ch) => date.push(ch),
                                None => {
                                    return Err(LoggingError::invalid_pattern(
                                        pattern,
                                        "unterminated date format",
                                    ))
                                }
                            }
                        }
                        translate_date_format(&date)
                    } else {
                        DEFAULT_DATE_FORMAT.to_string()
                    };
                    Segment::Date { format, padding }
                }
                'p' => Segment::Field {
                    conversion: Conversion::Level,
                    padding,
                },
                'c' => Segment::Field {
                    conversion: Conversion::Category,
                    padding,
                },
                't' => Segment::Field {
                    conversion: Conversion::Thread,
                    padding,
                },
                's' | 'm' => Segment::Field {
                    conversion: Conversion::Message,
                    padding,
                },
                'e' => Segment::Field {
                    conversion: Conversion::Error,
                    padding,
                },
                other => {
                    return Err(LoggingError::invalid_pattern(
                        pattern,
                        format!("unknown conversion '%{}'", other),
                    ))
                }
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Constant text every formatted line starts with.
    pub fn literal_prefix(&self) -> &str {
        match self.segments.first() {
            Some(Segment::Literal(text)) => text,
            _ => "",
        }
    }
}

impl Formatter for PatternFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let mut out = String::with_capacity(self.pattern.len() + record.message.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Date { format, padding } => {
                    let stamp = record.timestamp.format(format).to_string();
                    push_padded(&mut out, &stamp, *padding);
                }
                Segment::Field {
                    conversion,
                    padding,
                } => {
                    let value = match conversion {
                        Conversion::Level => record.level.as_str(),
                        Conversion::Category => record.category.as_str(),
                        Conversion::Thread => record.thread.as_str(),
                        Conversion::Message => record.message.as_str(),
                        Conversion::Error => match &record.error {
                            Some(error) => {
                                out.push(' ');
                                error.as_str()
                            }
                            None => "",
                        },
                    };
                    push_padded(&mut out, value, *padding);
                }
            }
        }
        out
    }
}

fn push_padded(out: &mut String, value: &str, padding: Padding) {
    let width = padding.width.unwrap_or(0);
    let fill = width.saturating_sub(value.chars().count());
    if !padding.left_align {
        out.extend(std::iter::repeat(' ').take(fill));
    }
    out.push_str(value);
    if padding.left_align {
        out.extend(std::iter::repeat(' ').take(fill));
    }
}

/// Map `yyyy MM dd HH mm ss SSS` tokens onto chrono's strftime syntax.
fn translate_date_format(date: &str) -> String {
    const TOKENS: [(&str, &str); 7] = [
        ("yyyy", "%Y"),
        ("SSS", "%3f"),
        ("MM", "%m"),
        ("dd", "%d"),
        ("HH", "%H"),
        ("mm", "%M"),
        ("ss", "%S"),
    ];

    let mut out = String::new();
    let mut rest = date;
    'scan: while !rest.is_empty() {
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }
    out
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    level: &'a str,
    #[serde(rename = "loggerName")]
    category: &'a str,
    #[serde(rename = "threadName")]
    thread: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// One JSON object per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let line = JsonLine {
            timestamp: record
                .timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, false),
            level: record.level.as_str(),
            category: &record.category,
            thread: &record.thread,
            message: &record.message,
            error: record.error.as_deref(),
        };
        match serde_json::to_string(&line) {
            Ok(mut json) => {
                json.push('\n');
                json
            }
            Err(e) => {
                warn!("Failed to serialize log record: {}", e);
                String::new()
            }
        }
    }
}
