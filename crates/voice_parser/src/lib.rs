//! Rule-based reading of free-text floor reports.
//!
//! Matching is case-insensitive substring search over two ordered keyword
//! tables (actions and stations). Each category stops at the first table entry
//! that matches; overlapping keywords are not ranked by length or confidence.
//! Batch tokens and `<n> kg` quantities are pulled out with regular expressions.

use std::sync::LazyLock;

use regex::Regex;
use shared::domain::{CommandAction, Intent, StationId};

const ACTION_KEYWORDS: &[(&str, CommandAction)] = &[
    ("starting", CommandAction::Starting),
    ("start", CommandAction::Starting),
    ("begin", CommandAction::Starting),
    ("initiated", CommandAction::Starting),
    ("completed", CommandAction::Completed),
    ("complete", CommandAction::Completed),
    ("finished", CommandAction::Completed),
    ("done", CommandAction::Completed),
    ("received", CommandAction::Received),
    ("moving", CommandAction::Moving),
    ("transferring", CommandAction::Moving),
    ("sending", CommandAction::Moving),
    ("machine stopped", CommandAction::MachineStopped),
    ("machine issue", CommandAction::MachineStopped),
    ("breakdown", CommandAction::MachineStopped),
    ("quality check", CommandAction::QualityCheck),
    ("qc passed", CommandAction::QualityCheck),
    ("qc failed", CommandAction::QualityCheck),
];

const STATION_KEYWORDS: &[(&str, StationId)] = &[
    ("receiving", StationId::Station1),
    ("storage", StationId::Station1),
    ("washing", StationId::Station2),
    ("peeling", StationId::Station2),
    ("blanching", StationId::Station3),
    ("slicing", StationId::Station4),
    ("drying", StationId::Station5),
    ("grinding", StationId::Station6),
    ("sieving", StationId::Station6),
    ("packaging", StationId::Station7),
    ("mixing", StationId::Station7),
    ("quality check", StationId::Station8),
    ("qc", StationId::Station8),
    ("dispatch", StationId::Station8),
];

const NUMBER_WORDS: &[(&str, &str)] = &[
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("ten", "10"),
];

static BATCH_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbatch\s+(\w+)").expect("valid batch pattern"));

static QUANTITY_KG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*kg").expect("valid quantity pattern"));

/// Reads a raw report. Never fails; unrecognised parts stay `None`.
pub fn parse(raw_command: &str) -> Intent {
    let lowered = raw_command.trim().to_lowercase();

    let action = first_match(&lowered, ACTION_KEYWORDS).map(|(_, action)| action);
    let (entity, station) = match first_match(&lowered, STATION_KEYWORDS) {
        Some((keyword, station)) => (Some(keyword.to_string()), Some(station)),
        None => (None, None),
    };

    Intent {
        action,
        entity,
        station,
        batch_number: batch_token(raw_command),
        quantity_kg: quantity_kg(raw_command),
    }
}

fn first_match<T: Copy>(haystack: &str, table: &[(&'static str, T)]) -> Option<(&'static str, T)> {
    table
        .iter()
        .find(|(keyword, _)| haystack.contains(keyword))
        .copied()
}

/// Token following the word "batch". Number words one..ten become digits;
/// any other token keeps its original spelling.
fn batch_token(raw_command: &str) -> Option<String> {
    let token = BATCH_TOKEN.captures(raw_command)?.get(1)?.as_str();
    let lowered = token.to_lowercase();
    let normalized = NUMBER_WORDS
        .iter()
        .find(|(word, _)| *word == lowered)
        .map(|(_, digits)| (*digits).to_string())
        .unwrap_or_else(|| token.to_string());
    Some(normalized)
}

fn quantity_kg(raw_command: &str) -> Option<f64> {
    QUANTITY_KG
        .captures(raw_command)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
