//! Value list parsing: CSV tokens, range shorthands and permutations
//!
//! Numeric tokens accept two shorthands besides plain literals:
//! `start-end(step)` for an inclusive arithmetic sequence and
//! `start-end[count]` for `count` evenly spaced samples.

use super::registry::ModelCatalog;
use super::{AxisInfo, AxisOption, AxisSpec, AxisValue, ValueKind};
use crate::error::{Result, SweepError};
use crate::pipeline::GenerationConfig;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?\s*\d+)\s*-\s*([+-]?\s*\d+)(?:\s*\(\s*([+-]?\s*\d+)\s*\))?\s*$")
        .expect("valid integer range pattern")
});
static RE_RANGE_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*([+-]?\s*\d+(?:\.\d*)?)\s*-\s*([+-]?\s*\d+(?:\.\d*)?)(?:\s*\(\s*([+-]?\s*\d+(?:\.\d*)?)\s*\))?\s*$",
    )
    .expect("valid float range pattern")
});
static RE_RANGE_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?\s*\d+)\s*-\s*([+-]?\s*\d+)(?:\s*\[\s*(\d+)\s*\])?\s*$")
        .expect("valid integer count pattern")
});
static RE_RANGE_COUNT_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?\s*\d+(?:\.\d*)?)\s*-\s*([+-]?\s*\d+(?:\.\d*)?)(?:\s*\[\s*(\d+)\s*\])?\s*$")
        .expect("valid float count pattern")
});

/// Split CSV text into stripped tokens; quoted fields may contain commas.
pub fn csv_to_list(text: &str) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut tokens = Vec::new();
    for record in reader.records() {
        let record = record?;
        tokens.extend(record.iter().map(|field| field.trim().to_string()));
    }
    Ok(tokens)
}

/// Join values into one CSV line, quoting only where needed.
pub fn list_to_csv<S: AsRef<str>>(items: &[S]) -> Result<String> {
    if items.is_empty() {
        return Ok(String::new());
    }
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(items.iter().map(|s| s.as_ref()))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| SweepError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).trim().to_string())
}

/// CSV form of resolved scalar values, suitable for parsing back.
pub fn values_to_csv(values: &[AxisValue]) -> Result<String> {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    list_to_csv(&items)
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_int(text: &str, token: &str) -> Result<i64> {
    compact(text)
        .parse()
        .map_err(|_| SweepError::InvalidRange(token.to_string(), format!("bad integer {:?}", text)))
}

fn parse_float(text: &str, token: &str) -> Result<f64> {
    compact(text)
        .parse()
        .map_err(|_| SweepError::InvalidRange(token.to_string(), format!("bad number {:?}", text)))
}

fn parse_count(text: Option<regex::Match<'_>>, token: &str) -> Result<usize> {
    match text {
        Some(m) => m
            .as_str()
            .parse()
            .map_err(|_| SweepError::InvalidRange(token.to_string(), "bad count".to_string())),
        None => Ok(1),
    }
}

/// Inclusive integer sequence from `start` to `end` moving by `step`.
pub fn int_range(start: i64, end: i64, step: i64) -> Vec<i64> {
    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current <= end) || (step < 0 && current >= end) {
        values.push(current);
        current += step;
    }
    values
}

/// Inclusive float sequence; the end is kept when it lies on the step grid
/// up to rounding error.
pub fn float_range(start: f64, end: f64, step: f64) -> Vec<f64> {
    let span = (end - start) / step;
    if span < -1e-9 {
        return Vec::new();
    }
    let count = (span + 1e-9).floor() as usize + 1;
    (0..count).map(|i| start + i as f64 * step).collect()
}

/// `count` evenly spaced samples from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let delta = (end - start) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|i| start + i as f64 * delta).collect();
            values[count - 1] = end;
            values
        }
    }
}

/// Expand an integer range token, or `None` if it is not a range.
pub fn expand_int_token(token: &str) -> Result<Option<Vec<i64>>> {
    if let Some(caps) = RE_RANGE.captures(token) {
        let start = parse_int(&caps[1], token)?;
        let end = parse_int(&caps[2], token)?;
        let step = match caps.get(3) {
            Some(m) => parse_int(m.as_str(), token)?,
            None => 1,
        };
        if step == 0 {
            return Err(SweepError::InvalidRange(token.to_string(), "step must not be zero".into()));
        }
        return Ok(Some(int_range(start, end, step)));
    }
    if let Some(caps) = RE_RANGE_COUNT.captures(token) {
        let start = parse_int(&caps[1], token)?;
        let end = parse_int(&caps[2], token)?;
        let count = parse_count(caps.get(3), token)?;
        let values = linspace(start as f64, end as f64, count)
            .into_iter()
            .map(|v| v.trunc() as i64)
            .collect();
        return Ok(Some(values));
    }
    Ok(None)
}

/// Expand a float range token, or `None` if it is not a range.
pub fn expand_float_token(token: &str) -> Result<Option<Vec<f64>>> {
    if let Some(caps) = RE_RANGE_FLOAT.captures(token) {
        let start = parse_float(&caps[1], token)?;
        let end = parse_float(&caps[2], token)?;
        let step = match caps.get(3) {
            Some(m) => parse_float(m.as_str(), token)?,
            None => 1.0,
        };
        if step == 0.0 {
            return Err(SweepError::InvalidRange(token.to_string(), "step must not be zero".into()));
        }
        return Ok(Some(float_range(start, end, step)));
    }
    if let Some(caps) = RE_RANGE_COUNT_FLOAT.captures(token) {
        let start = parse_float(&caps[1], token)?;
        let end = parse_float(&caps[2], token)?;
        let count = parse_count(caps.get(3), token)?;
        return Ok(Some(linspace(start, end, count)));
    }
    Ok(None)
}

/// Every ordering of `items`, in index-lexicographic order.
pub fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn walk<T: Clone>(rest: &mut Vec<T>, current: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if rest.is_empty() {
            out.push(current.clone());
            return;
        }
        for i in 0..rest.len() {
            let item = rest.remove(i);
            current.push(item.clone());
            walk(rest, current, out);
            current.pop();
            rest.insert(i, item);
        }
    }

    let mut out = Vec::new();
    walk(&mut items.to_vec(), &mut Vec::with_capacity(items.len()), &mut out);
    out
}

fn invalid(option: &AxisOption, token: &str) -> SweepError {
    SweepError::InvalidValue {
        label: option.label.to_string(),
        kind: option.kind.name(),
        value: token.to_string(),
    }
}

/// Turn raw tokens into typed values for `option`, expanding shorthands.
pub fn parse_tokens(option: &AxisOption, tokens: &[String]) -> Result<Vec<AxisValue>> {
    if option.is_nothing() {
        return Ok(vec![AxisValue::Nothing]);
    }

    let mut values = Vec::new();
    match option.kind {
        ValueKind::Int => {
            for token in tokens.iter().filter(|t| !t.trim().is_empty()) {
                match expand_int_token(token)? {
                    Some(expanded) => values.extend(expanded.into_iter().map(AxisValue::Int)),
                    None => {
                        let v = token.trim().parse().map_err(|_| invalid(option, token))?;
                        values.push(AxisValue::Int(v));
                    }
                }
            }
        }
        ValueKind::Float => {
            for token in tokens.iter().filter(|t| !t.trim().is_empty()) {
                match expand_float_token(token)? {
                    Some(expanded) => values.extend(expanded.into_iter().map(AxisValue::Float)),
                    None => {
                        let v = token.trim().parse().map_err(|_| invalid(option, token))?;
                        values.push(AxisValue::Float(v));
                    }
                }
            }
        }
        ValueKind::Str => values.extend(tokens.iter().cloned().map(AxisValue::Str)),
        ValueKind::Permutation => {
            values.extend(permutations(tokens).into_iter().map(AxisValue::Tokens));
        }
    }
    Ok(values)
}

/// Resolve one axis for a run: pick the token source (choice list or
/// free text), expand, then run the option's validator on the whole list.
///
/// The "Nothing" axis always yields one placeholder value.
pub fn resolve_axis(
    option: &AxisOption,
    spec: &AxisSpec,
    csv_mode: bool,
    config: &GenerationConfig,
    catalog: &dyn ModelCatalog,
) -> Result<AxisInfo> {
    let choice_mode = option.choices.is_some() && !csv_mode;
    let (tokens, raw) = if choice_mode {
        (spec.selected.clone(), list_to_csv(&spec.selected)?)
    } else {
        (csv_to_list(&spec.values)?, spec.values.clone())
    };

    let values = parse_tokens(option, &tokens)?;
    if !option.is_nothing() {
        option.validate(config, &values, catalog)?;
    }
    debug!("Axis {:?} resolved to {} value(s)", option.label, values.len());

    Ok(AxisInfo { option: *option, values, raw })
}
