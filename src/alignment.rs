//! Overlap-aware merging of value sequences.
//!
//! Two reports of the same metric usually share some periods: last year's filing shows
//! `[10, 20, 30]`, this year's `[20, 30, 40]`. Alignment finds where the incoming
//! sequence starts inside the existing one so shared periods collapse and new periods
//! extend the tail. Where an aligned position disagrees, the existing token keeps its
//! history and the incoming value becomes a restatement.

use crate::config::AlignmentConfig;
use crate::schema::ValueToken;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentKind {
    /// The tail of the existing sequence equals the head of the incoming one.
    SuffixPrefix,
    /// The incoming head matched a run inside the existing sequence.
    Contained,
    /// No acceptable overlap; the incoming sequence goes after the existing one.
    Appended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    /// Position in the existing sequence where the incoming sequence starts.
    pub offset: usize,
    pub kind: AlignmentKind,
}

fn run_length(existing: &[ValueToken], incoming: &[ValueToken], offset: usize) -> usize {
    existing[offset..]
        .iter()
        .zip(incoming)
        .take_while(|(e, n)| e.same_effective(n))
        .count()
}

/// Finds the offset at which `incoming` lines up with `existing`.
///
/// The smallest offset whose suffix equals the incoming prefix wins. Failing that, the
/// longest run of equal values anchored at the incoming head is accepted if it covers
/// `min_fallback_coverage` of the incoming sequence. Otherwise the incoming values are
/// appended.
pub fn align(
    existing: &[ValueToken],
    incoming: &[ValueToken],
    config: &AlignmentConfig,
) -> Alignment {
    let appended = Alignment {
        offset: existing.len(),
        kind: AlignmentKind::Appended,
    };
    if existing.is_empty() || incoming.is_empty() {
        return appended;
    }

    for offset in 0..existing.len() {
        let overlap = existing.len() - offset;
        if overlap <= incoming.len() && run_length(existing, incoming, offset) == overlap {
            return Alignment {
                offset,
                kind: AlignmentKind::SuffixPrefix,
            };
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for offset in 0..existing.len() {
        let run = run_length(existing, incoming, offset);
        if run > 0 && best.map(|(_, b)| run > b).unwrap_or(true) {
            best = Some((offset, run));
        }
    }

    match best {
        Some((offset, run))
            if run as f64 + f64::EPSILON
                >= config.min_fallback_coverage * incoming.len() as f64 =>
        {
            Alignment {
                offset,
                kind: AlignmentKind::Contained,
            }
        }
        _ => appended,
    }
}

/// Overlays `incoming` onto `existing` starting at `offset`.
///
/// Positions past the end of `existing` are appended; positions present in both keep the
/// existing token and record the incoming chain as restatements when the effective
/// values differ. `offset` is clamped to `existing.len()`.
pub fn merge_at(existing: &[ValueToken], incoming: &[ValueToken], offset: usize) -> Vec<ValueToken> {
    let offset = offset.min(existing.len());
    let mut merged = existing.to_vec();

    for (i, token) in incoming.iter().enumerate() {
        match merged.get_mut(offset + i) {
            Some(current) => current.restate_with(token),
            None => merged.push(token.clone()),
        }
    }

    merged
}

/// Aligns then merges. Merging a sequence with itself returns it unchanged.
pub fn merge(
    existing: &[ValueToken],
    incoming: &[ValueToken],
    config: &AlignmentConfig,
) -> Vec<ValueToken> {
    let alignment = align(existing, incoming, config);
    merge_at(existing, incoming, alignment.offset)
}
