// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Upstream JSON → [`DrawRecord`].
//!
//! The lottery API has shipped several shapes over time, so each field is
//! looked up under all of its known names (first present wins):
//!
//! | field   | accepted keys                                  |
//! |---------|------------------------------------------------|
//! | contest | `numero`, `numeroConcurso`, `concurso`         |
//! | date    | `dataApuracao`, `data`, `dataApuracaoStr`      |
//! | numbers | `listaDezenas`, `dezenas`, `numeros`           |
//!
//! Anything that does not produce a fully valid record is rejected as
//! [`FetchError::Malformed`]; loosely-typed data never leaves this module.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::FetchError;
use crate::draw::{DrawNumbers, DrawRecord};

const CONTEST_KEYS: &[&str] = &["numero", "numeroConcurso", "concurso"];
const DATE_KEYS: &[&str] = &["dataApuracao", "data", "dataApuracaoStr"];
const NUMBER_KEYS: &[&str] = &["listaDezenas", "dezenas", "numeros"];

/// Parse one draw body.
pub fn parse_draw(body: &Value) -> Result<DrawRecord, FetchError> {
    let obj = body
        .as_object()
        .ok_or_else(|| FetchError::Malformed("draw body is not a JSON object".into()))?;

    let contest = first_field(obj, CONTEST_KEYS)
        .ok_or_else(|| FetchError::Malformed("missing contest number".into()))
        .and_then(parse_contest)?;

    let date = first_field(obj, DATE_KEYS)
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::Malformed(format!("contest {}: missing draw date", contest)))
        .and_then(|raw| {
            parse_date(raw).ok_or_else(|| {
                FetchError::Malformed(format!("contest {}: unparsable date '{}'", contest, raw))
            })
        })?;

    let numbers = first_field(obj, NUMBER_KEYS)
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Malformed(format!("contest {}: missing numbers", contest)))?
        .iter()
        .map(parse_number)
        .collect::<Option<Vec<u32>>>()
        .ok_or_else(|| FetchError::Malformed(format!("contest {}: non-numeric entry", contest)))?;

    let numbers = DrawNumbers::new(numbers)
        .map_err(|e| FetchError::Malformed(format!("contest {}: {}", contest, e)))?;

    Ok(DrawRecord::new(contest, date, numbers))
}

/// Accepts `DD/MM/YYYY` (upstream) and `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

fn first_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn parse_contest(value: &Value) -> Result<u32, FetchError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed
        .filter(|&n| n > 0)
        .ok_or_else(|| FetchError::Malformed(format!("invalid contest number {}", value)))
}

fn parse_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
