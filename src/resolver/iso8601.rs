// src/resolver/iso8601.rs
//! ISO-8601 durations (`PT4M13S`, `P1DT2H`, `PT1.5S`) → whole seconds.

use anyhow::{anyhow, bail, Result};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const MONTH: u64 = 30 * DAY;
const YEAR: u64 = 365 * DAY;

/// Parse a duration and truncate fractional seconds.
pub fn to_seconds(input: &str) -> Result<u64> {
    let s = input.trim();
    let rest = s
        .strip_prefix('P')
        .ok_or_else(|| anyhow!("duration must start with 'P': {input:?}"))?;
    if rest.is_empty() {
        bail!("empty duration: {input:?}");
    }

    let mut total: f64 = 0.0;
    let mut in_time = false;
    let mut num = String::new();
    // Designators must appear in Y M W D T H M S order, each at most once
    let mut last_rank: Option<u8> = None;
    let mut time_components = 0usize;

    for ch in rest.chars() {
        match ch {
            'T' if !in_time && num.is_empty() => in_time = true,
            '0'..='9' | '.' | ',' => num.push(if ch == ',' { '.' } else { ch }),
            unit => {
                if num.is_empty() {
                    bail!("unit {unit:?} without a value in {input:?}");
                }
                let value: f64 = num
                    .parse()
                    .map_err(|_| anyhow!("bad number {num:?} in {input:?}"))?;
                let (rank, scale) = match (in_time, unit) {
                    (false, 'Y') => (0, YEAR),
                    (false, 'M') => (1, MONTH),
                    (false, 'W') => (2, WEEK),
                    (false, 'D') => (3, DAY),
                    (true, 'H') => (4, HOUR),
                    (true, 'M') => (5, MINUTE),
                    (true, 'S') => (6, 1),
                    _ => bail!("unexpected {unit:?} in {input:?}"),
                };
                if last_rank.is_some_and(|prev| rank <= prev) {
                    bail!("{unit:?} repeated or out of order in {input:?}");
                }
                last_rank = Some(rank);
                if in_time {
                    time_components += 1;
                }
                total += value * scale as f64;
                num.clear();
            }
        }
    }

    if !num.is_empty() || last_rank.is_none() {
        bail!("incomplete duration: {input:?}");
    }
    if in_time && time_components == 0 {
        bail!("'T' without a time part in {input:?}");
    }
    Ok(total.floor() as u64)
}
