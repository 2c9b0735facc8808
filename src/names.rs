//! Participant name lists: loading and cleaning

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Leading list numbering such as `1. ` or `12) `
static LIST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+[.)]\s+").expect("valid regex"));

/// Characters that cannot appear in file names, plus control characters
/// other than whitespace (tabs separate words and are collapsed instead)
static ILLEGAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[[\\/:*?"<>|\p{Cc}]&&[^\s]]"#).expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Counts reported by a cleaning pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanReport {
    /// Non-blank input lines
    pub total: usize,
    /// Lines kept but changed by cleaning
    pub altered: usize,
    /// Lines that cleaned down to nothing
    pub dropped: usize,
}

/// Read names from a UTF-8 text file, one per line
///
/// Lines are trimmed and blank lines ignored. With `clean` set, each name
/// also goes through [`clean_name`].
pub fn load_names(path: &Path, clean: bool) -> Result<Vec<String>> {
    let content = read_names_file(path)?;
    let lines: Vec<&str> = content.lines().collect();

    let names = if clean {
        let (names, report) = clean_names(&lines);
        info!(
            "Cleaned {} name(s): {} altered, {} dropped",
            report.total, report.altered, report.dropped
        );
        names
    } else {
        lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    };

    if names.is_empty() {
        return Err(Error::NoNames(path.to_path_buf()));
    }

    debug!("Loaded {} name(s) from {}", names.len(), path.display());
    Ok(names)
}

fn read_names_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| Error::NamesUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(content.trim_start_matches('\u{feff}').to_string())
}

/// Clean a single name
///
/// Removes list numbering and filename-illegal characters, collapses
/// whitespace and fixes the casing of all-lowercase or all-uppercase words.
/// Returns `None` if nothing is left. Cleaning a cleaned name changes nothing.
pub fn clean_name(raw: &str) -> Option<String> {
    let legal = ILLEGAL_CHARS.replace_all(raw, "");
    let mut name = WHITESPACE.replace_all(legal.trim(), " ").into_owned();

    // "1. 2. Bob" carries more than one number
    while let Some(end) = LIST_NUMBER.find(&name).map(|m| m.end()) {
        name.replace_range(..end, "");
    }

    if name.is_empty() {
        return None;
    }

    let cased: Vec<String> = name.split(' ').map(fix_word_case).collect();
    Some(cased.join(" "))
}

/// Title-case a word whose letters are all one case; leave mixed case alone
///
/// Characters whose case mapping is not a single character (`ß` becomes
/// `SS`) are kept as they are, so a second pass sees the same word.
fn fix_word_case(word: &str) -> String {
    let has_lower = word.chars().any(char::is_lowercase);
    let has_upper = word.chars().any(char::is_uppercase);
    if has_lower && has_upper {
        return word.to_string();
    }

    let mut result = String::with_capacity(word.len());
    let mut start_of_part = true;
    for c in word.chars() {
        let mapped = if start_of_part {
            single_char(c.to_uppercase())
        } else {
            single_char(c.to_lowercase())
        };
        result.push(mapped.unwrap_or(c));
        start_of_part = c == '-' || c == '\'' || c == '\u{2019}';
    }
    result
}

fn single_char(mut mapping: impl Iterator<Item = char>) -> Option<char> {
    let first = mapping.next()?;
    mapping.next().is_none().then_some(first)
}

/// Clean a list of raw lines, dropping the ones that end up empty
pub fn clean_names<S: AsRef<str>>(lines: &[S]) -> (Vec<String>, CleanReport) {
    let mut report = CleanReport::default();
    let mut names = Vec::new();

    for line in lines {
        let raw = line.as_ref().trim();
        if raw.is_empty() {
            continue;
        }
        report.total += 1;

        match clean_name(raw) {
            Some(cleaned) => {
                if cleaned != raw {
                    report.altered += 1;
                }
                names.push(cleaned);
            }
            None => report.dropped += 1,
        }
    }

    (names, report)
}

/// Order names shortest first; names of equal length keep their order
pub fn sort_by_length(names: &mut [String]) {
    names.sort_by_key(|name| name.chars().count());
}

/// Clean a names file and write the result to `output`
///
/// Nothing is written when no name survives cleaning.
pub fn clean_names_file(input: &Path, output: &Path, sort: bool) -> Result<CleanReport> {
    let content = read_names_file(input)?;
    let lines: Vec<&str> = content.lines().collect();
    let (mut names, report) = clean_names(&lines);

    if names.is_empty() {
        return Err(Error::NoNames(input.to_path_buf()));
    }

    if sort {
        sort_by_length(&mut names);
    }

    let mut text = names.join("\n");
    text.push('\n');
    std::fs::write(output, text)?;

    Ok(report)
}
