// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Frequency-based number estimates.
//!
//! This is historical counting, not prediction: each number's score is how
//! often it was drawn in the corpus.
//!
//! Ranking is by descending count with ties broken by ascending number, which
//! gives a total order. Quadra, quina and sena are the top 4, 5 and 6 of that
//! ranking, each re-sorted ascending for presentation. Because they are
//! prefixes of one ranking, quadra ⊆ quina ⊆ sena.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::draw::{HistoricalCorpus, MAX_NUMBER, MIN_NUMBER};

/// Occurrence count per number across a corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    /// Index 0 unused; 1..=60 hold counts
    counts: [u32; MAX_NUMBER as usize + 1],
    draws: usize,
}

impl FrequencyTable {
    pub fn from_corpus(corpus: &HistoricalCorpus) -> Self {
        let mut counts = [0u32; MAX_NUMBER as usize + 1];
        for record in corpus.iter() {
            for n in record.numbers.iter() {
                counts[usize::from(n)] += 1;
            }
        }
        Self { counts, draws: corpus.len() }
    }

    /// Times `number` was drawn (0 outside 1..=60)
    #[must_use]
    pub fn count(&self, number: u8) -> u32 {
        if (MIN_NUMBER..=MAX_NUMBER).contains(&number) {
            self.counts[usize::from(number)]
        } else {
            0
        }
    }

    /// Sum of all counts; always `6 × draws`
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Number of draws the table was built from
    #[must_use]
    pub fn draws(&self) -> usize {
        self.draws
    }

    /// Share of all occurrences held by `number` (0.0 for an empty table)
    #[must_use]
    pub fn share(&self, number: u8) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.count(number)) / total as f64
    }

    /// Every number 1..=60, most frequent first, ties by ascending number
    #[must_use]
    pub fn ranked(&self) -> Vec<(u8, u32)> {
        let mut ranked: Vec<(u8, u32)> = (MIN_NUMBER..=MAX_NUMBER)
            .map(|n| (n, self.counts[usize::from(n)]))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    /// The `k` top-ranked numbers, ascending
    #[must_use]
    pub fn top(&self, k: usize) -> Vec<u8> {
        let mut picked: Vec<u8> = self.ranked().into_iter().take(k).map(|(n, _)| n).collect();
        picked.sort_unstable();
        picked
    }
}

/// Estimate sets, each ascending and duplicate-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateResult {
    pub quadra: Vec<u8>,
    pub quina: Vec<u8>,
    pub sena: Vec<u8>,
    pub generated_at: DateTime<Utc>,
    /// Draws the estimate was computed from
    pub corpus_size: usize,
}

impl EstimateResult {
    /// Valid but empty: built from an empty corpus
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.sena.is_empty()
    }
}

/// Compute quadra/quina/sena from a corpus.
///
/// An empty corpus yields three empty sets rather than an error.
///
/// ```
/// use sena_engine::{estimate, HistoricalCorpus};
///
/// let result = estimate(&HistoricalCorpus::empty());
/// assert!(result.is_degraded());
/// assert!(result.quadra.is_empty() && result.quina.is_empty() && result.sena.is_empty());
/// ```
#[must_use]
pub fn estimate(corpus: &HistoricalCorpus) -> EstimateResult {
    let generated_at = Utc::now();
    if corpus.is_empty() {
        return EstimateResult {
            quadra: Vec::new(),
            quina: Vec::new(),
            sena: Vec::new(),
            generated_at,
            corpus_size: 0,
        };
    }

    let table = FrequencyTable::from_corpus(corpus);
    EstimateResult {
        quadra: table.top(4),
        quina: table.top(5),
        sena: table.top(6),
        generated_at,
        corpus_size: corpus.len(),
    }
}
