//! Structured error extraction
//!
//! Turns raw command output into the diagnostics stored on a run record.
//! Extraction is best-effort enrichment: callers tolerate both an error and
//! `None`.

use crate::cache::record::Diagnostic;
use crate::error::{VibeError, VibeResult};
use regex::Regex;

/// Diagnostics kept on a single record
pub const MAX_STORED_ERRORS: usize = 10;

/// Lines of output kept when nothing recognisable was found
pub const SUMMARY_TAIL_LINES: usize = 20;

/// Result of analysing raw output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub summary: String,
    pub total_errors: usize,
    /// At most [`MAX_STORED_ERRORS`] entries
    pub errors: Vec<Diagnostic>,
}

/// Anything that can pull diagnostics out of command output
pub trait ErrorExtractor: Send + Sync {
    /// Analyse combined stdout and stderr
    ///
    /// Returns `Ok(None)` when the output contains nothing recognisable.
    fn extract(&self, raw: &str) -> VibeResult<Option<Extraction>>;
}

/// Last lines of `raw`, used as a summary when extraction finds nothing
pub fn output_tail(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(SUMMARY_TAIL_LINES);
    lines[start..].join("\n")
}

/// Line-oriented extractor for compiler, linter and test runner output
///
/// Recognises `path:line[:col]: message` and `path(line,col): message`
/// locations, plus any other line containing the word `error`.
pub struct LineExtractor {
    location: Regex,
    error_word: Regex,
    code: Regex,
}

impl LineExtractor {
    pub fn new() -> VibeResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| VibeError::Internal(format!("bad pattern: {}", e)))
        };

        Ok(Self {
            location: compile(
                r"^\s*(?:-->\s*)?(?P<file>[^\s:()]+\.[A-Za-z0-9]+)(?::(?P<line>\d+)(?::(?P<col>\d+))?|\((?P<pline>\d+),(?P<pcol>\d+)\))\s*(?::\s*|-\s+)(?P<msg>.+)$",
            )?,
            error_word: compile(r"(?i)\berror\b")?,
            code: compile(r"\b(?:error|warning)\s*\[?(?P<code>[A-Z]+[0-9]{2,})\]?")?,
        })
    }

    fn parse_line(&self, line: &str) -> Option<Diagnostic> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(caps) = self.location.captures(trimmed) {
            let number = |a: &str, b: &str| {
                caps.name(a)
                    .or_else(|| caps.name(b))
                    .and_then(|m| m.as_str().parse::<u32>().ok())
            };
            let message = caps.name("msg").map(|m| m.as_str().trim()).unwrap_or("");
            return Some(Diagnostic {
                file: caps.name("file").map(|m| m.as_str().to_string()),
                line: number("line", "pline"),
                column: number("col", "pcol"),
                message: message.to_string(),
                code: self.code_of(message),
            });
        }

        if self.error_word.is_match(trimmed) {
            return Some(Diagnostic {
                message: trimmed.to_string(),
                code: self.code_of(trimmed),
                ..Diagnostic::default()
            });
        }

        None
    }

    fn code_of(&self, message: &str) -> Option<String> {
        self.code
            .captures(message)
            .and_then(|caps| caps.name("code"))
            .map(|m| m.as_str().to_string())
    }
}

impl ErrorExtractor for LineExtractor {
    fn extract(&self, raw: &str) -> VibeResult<Option<Extraction>> {
        let mut errors = Vec::new();
        let mut total = 0usize;

        for line in raw.lines() {
            if let Some(diagnostic) = self.parse_line(line) {
                total += 1;
                if errors.len() < MAX_STORED_ERRORS {
                    errors.push(diagnostic);
                }
            }
        }

        if total == 0 {
            return Ok(None);
        }

        let noun = if total == 1 { "error" } else { "errors" };
        Ok(Some(Extraction {
            summary: format!("{} {} found", total, noun),
            total_errors: total,
            errors,
        }))
    }
}
