use crate::ci_checks::{CombinedRefCheck, RefCheck};
use crate::types::{CheckConclusion, CheckStatus};
use std::{borrow::Cow, fmt};
use unicode_segmentation::UnicodeSegmentation;

macro_rules! write_col {
    ($w:expr, $len:expr, $txt:expr) => {
        write!($w, "{:len$}", ellipsize($txt, $len as _), len = $len as _)
    };
    (, $w:expr, $len:expr, $txt:expr) => {
        write!($w, " | {:len$}", ellipsize($txt, $len as _), len = $len as _)
    };
}

const CHECK_NAME_LEN: u8 = 40;
const CHECK_DESC_LEN: u8 = 30;
const APP_NAME_LEN: u8 = 20;

/// Cuts `text` down to at most `threshold` graphemes, marking the cut with an
/// ellipsis. Newlines are flattened into spaces.
pub fn ellipsize(text: &str, threshold: usize) -> Cow<'_, str> {
    debug_assert!(threshold > 1);
    let count = text.graphemes(true).count();
    if count <= threshold && !text.contains('\n') {
        return text.into();
    }
    if count <= threshold {
        return text.graphemes(true).map(flatten).collect::<String>().into();
    }
    let head: String = text.graphemes(true).take(threshold - 1).map(flatten).collect();
    format!("{}…", head.trim_end()).into()
}

fn flatten(grapheme: &str) -> &str {
    if grapheme.contains('\n') {
        " "
    } else {
        grapheme
    }
}

/// Formats milliseconds as `1d 2h 3m 4s`, leaving out leading zero units.
/// Seconds are always present. Negative durations are formatted by their
/// magnitude.
pub fn format_precise_duration(milliseconds: i64) -> String {
    let secs = milliseconds.unsigned_abs() / 1000;
    let units = [
        (secs / 86_400, "d"),
        (secs / 3_600 % 24, "h"),
        (secs / 60 % 60, "m"),
        (secs % 60, "s"),
    ];
    units
        .iter()
        .skip_while(|(value, unit)| *value == 0 && *unit != "s")
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn status_symbol(status: CheckStatus, conclusion: Option<CheckConclusion>) -> &'static str {
    use CheckConclusion::*;
    match (status, conclusion) {
        (CheckStatus::Completed, Some(Success)) => "✓",
        (CheckStatus::Completed, Some(Neutral | Skipped)) => "-",
        (CheckStatus::Completed, Some(Failure | ActionRequired)) => "✗",
        (CheckStatus::Completed, Some(Canceled | TimedOut | Stale)) => "!",
        (CheckStatus::Completed, None) => "?",
        (CheckStatus::Queued | CheckStatus::InProgress, _) => "•",
    }
}

impl fmt::Display for RefCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", status_symbol(self.status, self.conclusion))?;
        write_col!(f, CHECK_NAME_LEN, &self.name)?;
        write_col!(, f, CHECK_DESC_LEN, &self.description)?;
        write_col!(, f, APP_NAME_LEN, &self.app_name)?;
        Ok(())
    }
}

impl fmt::Display for CombinedRefCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = status_symbol(self.status, self.conclusion);
        let state = match self.conclusion {
            Some(conclusion) => conclusion.to_string(),
            None => self.status.to_string(),
        };
        let checks = if self.checks.len() == 1 { "check" } else { "checks" };
        write!(f, "{symbol} {state} ({} {checks})", self.checks.len())
    }
}
