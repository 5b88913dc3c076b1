// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Backward balance reconstruction.
//!
//! There is no stored balance-per-day log; the series is anchored at the
//! account's authoritative current balance and walks daily net deltas
//! backward, so the chart can never desynchronize from the balance it is
//! anchored to.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Iteration cap guarding against malformed dates producing unbounded walks.
pub const MAX_REPLAY_DAYS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalancePoint {
    pub date: NaiveDate,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    All,
}

impl TimeRange {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(TimeRange::OneMonth),
            "3m" => Ok(TimeRange::ThreeMonths),
            "6m" => Ok(TimeRange::SixMonths),
            "1y" => Ok(TimeRange::OneYear),
            "all" => Ok(TimeRange::All),
            other => Err(anyhow!("Unknown range '{}', expected 1m|3m|6m|1y|all", other)),
        }
    }

    pub fn cutoff(self, today: NaiveDate) -> Option<NaiveDate> {
        let months = |n: u32| today.checked_sub_months(chrono::Months::new(n));
        match self {
            TimeRange::OneMonth => months(1),
            TimeRange::ThreeMonths => months(3),
            TimeRange::SixMonths => months(6),
            TimeRange::OneYear => months(12),
            TimeRange::All => None,
        }
    }
}

/// Accumulate one event's signed contribution into its calendar-day bucket.
/// Order within a day is irrelevant; only the net matters.
pub fn add_daily_delta(daily: &mut BTreeMap<NaiveDate, Decimal>, date: NaiveDate, delta: Decimal) {
    *daily.entry(date).or_insert(Decimal::ZERO) += delta;
}

/// Window start for a range: the cutoff, clamped forward to the earliest
/// event so empty lead-in days are not emitted.
pub fn window_start(
    daily: &BTreeMap<NaiveDate, Decimal>,
    today: NaiveDate,
    range: TimeRange,
) -> NaiveDate {
    let earliest = daily.keys().next().copied().unwrap_or(today);
    let earliest = earliest.min(today);
    match range.cutoff(today) {
        Some(cut) => cut.max(earliest),
        None => earliest,
    }
}

/// Walk backward from the current balance, emitting one end-of-day point per
/// calendar day from `today` down to `start`, then reverse to chronological
/// order. Days without events continue flat.
pub fn balance_series(
    current_balance: Decimal,
    daily: &BTreeMap<NaiveDate, Decimal>,
    start: NaiveDate,
    today: NaiveDate,
) -> Vec<BalancePoint> {
    let mut points = Vec::new();
    let mut running = current_balance;
    let mut day = today;
    let mut guard = 0usize;

    while day >= start && guard < MAX_REPLAY_DAYS {
        points.push(BalancePoint { date: day, balance: running });
        if let Some(delta) = daily.get(&day) {
            running -= *delta;
        }
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
        guard += 1;
    }

    points.reverse();
    points
}
