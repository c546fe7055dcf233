// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Draw data structures.
//!
//! A [`DrawRecord`] is the unit that flows from the upstream API through the
//! cache and into the estimator. Its numbers are validated on construction,
//! so every record held anywhere in the engine has exactly six distinct
//! values in `1..=60`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numbers drawn per contest
pub const NUMBERS_PER_DRAW: usize = 6;
/// Smallest valid number
pub const MIN_NUMBER: u8 = 1;
/// Largest valid number
pub const MAX_NUMBER: u8 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawNumbersError {
    #[error("expected 6 numbers, got {0}")]
    WrongCount(usize),
    #[error("number {0} outside 1..=60")]
    OutOfRange(u32),
    #[error("number {0} drawn twice")]
    Duplicate(u8),
}

/// Six distinct numbers in `1..=60`, stored ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct DrawNumbers([u8; NUMBERS_PER_DRAW]);

impl DrawNumbers {
    /// Validate and normalize a drawn set.
    ///
    /// ```
    /// use sena_engine::DrawNumbers;
    ///
    /// let numbers = DrawNumbers::new([60u8, 5, 23, 12, 58, 45]).unwrap();
    /// assert_eq!(numbers.as_slice(), &[5, 12, 23, 45, 58, 60]);
    ///
    /// assert!(DrawNumbers::new([1u8, 1, 2, 3, 4, 5]).is_err());
    /// assert!(DrawNumbers::new([0u8, 1, 2, 3, 4, 5]).is_err());
    /// ```
    pub fn new<I>(numbers: I) -> Result<Self, DrawNumbersError>
    where
        I: IntoIterator,
        I::Item: Into<u32>,
    {
        let raw: Vec<u32> = numbers.into_iter().map(Into::into).collect();
        if raw.len() != NUMBERS_PER_DRAW {
            return Err(DrawNumbersError::WrongCount(raw.len()));
        }

        let mut seen = HashSet::with_capacity(NUMBERS_PER_DRAW);
        let mut out = [0u8; NUMBERS_PER_DRAW];
        for (slot, n) in out.iter_mut().zip(raw) {
            if n < u32::from(MIN_NUMBER) || n > u32::from(MAX_NUMBER) {
                return Err(DrawNumbersError::OutOfRange(n));
            }
            let n = n as u8;
            if !seen.insert(n) {
                return Err(DrawNumbersError::Duplicate(n));
            }
            *slot = n;
        }
        out.sort_unstable();
        Ok(Self(out))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn contains(&self, n: u8) -> bool {
        self.0.binary_search(&n).is_ok()
    }
}

impl TryFrom<Vec<u32>> for DrawNumbers {
    type Error = DrawNumbersError;

    fn try_from(value: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DrawNumbers> for Vec<u32> {
    fn from(value: DrawNumbers) -> Self {
        value.0.iter().map(|&n| u32::from(n)).collect()
    }
}

/// A single contest result. Immutable once retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    /// Contest number (identity)
    pub contest: u32,
    /// Calendar date of the draw
    pub date: NaiveDate,
    /// Drawn numbers, ascending
    pub numbers: DrawNumbers,
}

impl DrawRecord {
    pub fn new(contest: u32, date: NaiveDate, numbers: DrawNumbers) -> Self {
        Self { contest, date, numbers }
    }
}

/// The rolling window of recent draws used for estimation.
///
/// Cheap to clone (shared slice). Built once per refresh and never patched:
/// a refresh produces a new corpus that replaces the old one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoricalCorpus {
    records: Arc<[DrawRecord]>,
}

impl HistoricalCorpus {
    /// Build a corpus ordered by contest, dropping duplicate contests and
    /// duplicate dates (first contest for a date wins).
    pub fn new(mut records: Vec<DrawRecord>) -> Self {
        records.sort_by_key(|r| r.contest);
        records.dedup_by_key(|r| r.contest);
        let mut dates = HashSet::with_capacity(records.len());
        records.retain(|r| dates.insert(r.date));
        Self { records: records.into() }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[DrawRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawRecord> {
        self.records.iter()
    }

    /// Find the draw held for a given date
    #[must_use]
    pub fn find_by_date(&self, date: NaiveDate) -> Option<&DrawRecord> {
        self.records.iter().find(|r| r.date == date)
    }
}
