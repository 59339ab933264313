//! Pattern and proximity matching of catalog parameters over recognized text.
//!
//! Every parameter is an independent fold over the candidates in the
//! order they were produced. The fold state only moves forward when a
//! reading scores strictly higher than the one held, so the earlier
//! candidate wins ties and the result never depends on how the
//! candidates were computed, only on their order.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::catalog::ParameterSpec;
use crate::consts::{
    ACCEPTANCE_THRESHOLD, CONTEXT_CONFIDENCE, PATTERN_CONFIDENCE, PROXIMITY_CUTOFF,
    PROXIMITY_LOOKAHEAD,
};
use crate::error::RecoverableError;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static LAKH_GROUPING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d),(\d{2}),(\d{3})\b").unwrap());
static THOUSANDS_GROUPING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d),(\d{3})\b").unwrap());
static DECIMAL_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d),(\d)").unwrap());
static HORIZONTAL_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ConfidenceTier {
    ContextMatch,
    PatternMatch,
}

impl ConfidenceTier {
    pub fn score(self) -> f64 {
        match self {
            ConfidenceTier::ContextMatch => CONTEXT_CONFIDENCE,
            ConfidenceTier::PatternMatch => PATTERN_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub tier: ConfidenceTier,
    /// Index of the candidate the reading came from.
    pub candidate: usize,
}

impl Reading {
    pub fn confidence(&self) -> f64 {
        self.tier.score()
    }
}

/// State of one parameter's fold over the candidates.
///
/// `Unmatched` and `Candidate` are the running states; `finish` moves to
/// one of the terminal states `Accepted` or `Rejected`, which ignore any
/// further offers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchState {
    Unmatched,
    Candidate(Reading),
    Accepted(Reading),
    Rejected,
}

impl MatchState {
    pub fn confidence(&self) -> f64 {
        match self {
            MatchState::Unmatched | MatchState::Rejected => 0.0,
            MatchState::Candidate(reading) | MatchState::Accepted(reading) => reading.confidence(),
        }
    }

    /// Keeps the held reading unless `reading` scores strictly higher.
    pub fn offer(self, reading: Reading) -> Self {
        match self {
            MatchState::Accepted(_) | MatchState::Rejected => self,
            _ if reading.confidence() > self.confidence() => MatchState::Candidate(reading),
            _ => self,
        }
    }

    /// Accepts a held reading scoring above the acceptance threshold and
    /// rejects everything else.
    pub fn finish(self) -> Self {
        match self {
            MatchState::Candidate(reading) if reading.confidence() > ACCEPTANCE_THRESHOLD => {
                MatchState::Accepted(reading)
            }
            MatchState::Accepted(_) => self,
            _ => MatchState::Rejected,
        }
    }

    pub fn accepted(self) -> Option<Reading> {
        match self {
            MatchState::Accepted(reading) => Some(reading),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterMatch {
    pub reading: Option<Reading>,
    pub patterns_attempted: usize,
}

#[derive(Debug, Clone)]
pub struct MatchOutcome<'a> {
    /// Accepted readings, in catalog order.
    pub readings: Vec<(&'a ParameterSpec, Reading)>,
    pub patterns_attempted: usize,
}

/// Rewrites frequent recognition confusions so that numbers and labels
/// can be matched. Line breaks survive; the proximity strategy needs them.
pub fn normalize_text(raw: &str) -> String {
    let text: String = raw
        .chars()
        .filter(|&c| c != '\r')
        .map(|c| match c {
            '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
            ';' => ':',
            '\u{00B7}' => '.',
            c => c,
        })
        .collect();

    let text = fix_digit_lookalikes(&text);
    let text = replace_until_stable(&LAKH_GROUPING, text, "${1}${2}${3}");
    let text = replace_until_stable(&THOUSANDS_GROUPING, text, "${1}${2}");
    let text = replace_until_stable(&DECIMAL_COMMA, text, "${1}.${2}");
    HORIZONTAL_SPACE.replace_all(&text, " ").into_owned()
}

// O/o next to a digit is a zero, l/I/| next to a digit is a one.
// "24.O" counts as next to a digit.
fn fix_digit_lookalikes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut fixed: Vec<char> = Vec::with_capacity(chars.len());

    for (i, &c) in chars.iter().enumerate() {
        let prev_digit = match fixed.as_slice() {
            [.., p] if p.is_ascii_digit() => true,
            [.., d, '.'] => d.is_ascii_digit(),
            _ => false,
        };
        let next_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        let c = match c {
            'O' | 'o' if prev_digit || next_digit => '0',
            'l' | 'I' | '|' if prev_digit || next_digit => '1',
            c => c,
        };
        fixed.push(c);
    }

    fixed.into_iter().collect()
}

fn replace_until_stable(regex: &Regex, mut text: String, replacement: &str) -> String {
    while regex.is_match(&text) {
        let next = regex.replace_all(&text, replacement).into_owned();
        if next == text {
            break;
        }
        text = next;
    }
    text
}

fn parse_plausible(spec: &ParameterSpec, token: &str) -> Option<f64> {
    match token.parse::<f64>() {
        Ok(value) if spec.plausible.contains(value) => Some(value),
        Ok(value) => {
            debug!("{}: {} outside plausible range, ignored", spec.name, value);
            None
        }
        Err(source) => {
            debug!(
                "{}",
                RecoverableError::NumericParse {
                    parameter: spec.name,
                    token: token.to_string(),
                    source,
                }
            );
            None
        }
    }
}

// Text between the start of the line containing `at` and `at`.
fn line_before(text: &str, at: usize) -> &str {
    let start = text[..at].rfind('\n').map_or(0, |i| i + 1);
    &text[start..at]
}

/// First pattern, in priority order, whose first match yields a plausible
/// value. Matches preceded on their line by one of the parameter's
/// exclusion words are skipped. Also returns how many patterns were
/// evaluated.
fn pattern_reading(spec: &ParameterSpec, text: &str, candidate: usize) -> (Option<Reading>, usize) {
    let mut attempted = 0;
    for pattern in &spec.patterns {
        attempted += 1;
        let token = pattern
            .captures_iter(text)
            .filter(|caps| {
                let start = caps.get(0).map_or(0, |m| m.start());
                !spec.excluded(line_before(text, start))
            })
            .find_map(|caps| caps.get(1));
        let Some(token) = token else {
            continue;
        };
        if let Some(value) = parse_plausible(spec, token.as_str()) {
            let reading = Reading {
                value,
                tier: ConfidenceTier::PatternMatch,
                candidate,
            };
            return (Some(reading), attempted);
        }
    }
    (None, attempted)
}

/// First plausible number on, or shortly after, a line naming the parameter.
fn proximity_reading(spec: &ParameterSpec, text: &str, candidate: usize) -> Option<Reading> {
    let lines: Vec<&str> = text.lines().collect();

    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            let lower = line.to_lowercase();
            spec.aliases.iter().any(|alias| lower.contains(alias)) && !spec.excluded(&lower)
        })
        .find_map(|(i, _)| {
            let end = (i + 1 + PROXIMITY_LOOKAHEAD).min(lines.len());
            lines[i..end]
                .iter()
                .flat_map(|line| NUMBER.find_iter(line))
                .find_map(|token| parse_plausible(spec, token.as_str()))
        })
        .map(|value| Reading {
            value,
            tier: ConfidenceTier::ContextMatch,
            candidate,
        })
}

/// Folds one parameter over already-normalized candidates.
pub fn match_parameter<S: AsRef<str>>(spec: &ParameterSpec, normalized: &[S]) -> ParameterMatch {
    let (state, patterns_attempted) = normalized.iter().map(AsRef::as_ref).enumerate().fold(
        (MatchState::Unmatched, 0),
        |(state, attempted), (index, text)| {
            let (found, tried) = pattern_reading(spec, text, index);
            let state = found.map_or(state, |reading| state.offer(reading));

            let state = if state.confidence() < PROXIMITY_CUTOFF {
                proximity_reading(spec, text, index).map_or(state, |reading| state.offer(reading))
            } else {
                state
            };

            (state, attempted + tried)
        },
    );

    ParameterMatch {
        reading: state.finish().accepted(),
        patterns_attempted,
    }
}

/// Normalizes every candidate once, then matches every catalog entry.
pub fn match_catalog<'a, S: AsRef<str>>(
    catalog: &'a [ParameterSpec],
    candidates: &[S],
) -> MatchOutcome<'a> {
    let normalized: Vec<String> = candidates
        .iter()
        .map(|candidate| normalize_text(candidate.as_ref()))
        .collect();

    let mut outcome = MatchOutcome {
        readings: Vec::new(),
        patterns_attempted: 0,
    };

    for spec in catalog {
        let matched = match_parameter(spec, &normalized);
        outcome.patterns_attempted += matched.patterns_attempted;

        match matched.reading {
            Some(reading) => {
                debug!(
                    "{} = {} ({:?}, candidate #{})",
                    spec.name, reading.value, reading.tier, reading.candidate
                );
                outcome.readings.push((spec, reading));
            }
            None => debug!("{} not found", spec.name),
        }
    }

    outcome
}
