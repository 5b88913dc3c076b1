// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use chronicle::commands::accounts::history_series;
use chronicle::commands::transactions::{self, NewTransaction};
use chronicle::commands::transfers;
use chronicle::ledger::replay::{balance_series, window_start, TimeRange};
use chronicle::models::TxType;
use chronicle::utils::account_by_name;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    chronicle::db::init_schema(&mut conn).unwrap();
    conn
}

fn add_account(conn: &Connection, name: &str, typ: &str, balance: &str) -> i64 {
    conn.execute(
        "INSERT INTO accounts(name, type, subtype, balance) VALUES (?1, ?2, 'other', ?3)",
        rusqlite::params![name, typ, balance],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn tx(conn: &mut Connection, day: &str, amount: &str, typ: TxType, account_id: i64) {
    transactions::add(
        conn,
        NewTransaction {
            date: date(day),
            description: "evt".into(),
            amount: dec(amount),
            r#type: typ,
            category: Some("misc".into()),
            account_id: Some(account_id),
            tags: vec![],
            is_recurring: false,
            splits: vec![],
        },
    )
    .unwrap();
}

#[test]
fn series_walks_known_deltas_backward() {
    let mut daily = BTreeMap::new();
    daily.insert(date("2025-08-03"), dec("10.00"));
    daily.insert(date("2025-08-05"), dec("-40.00"));

    let points = balance_series(dec("100.00"), &daily, date("2025-08-01"), date("2025-08-06"));
    assert_eq!(points.len(), 6);

    // Chronological: flat until the first event, stepping at each delta.
    assert_eq!(points[0].date, date("2025-08-01"));
    assert_eq!(points[0].balance, dec("130.00"));
    assert_eq!(points[1].balance, dec("130.00"));
    assert_eq!(points[2].balance, dec("140.00")); // end of Aug 3
    assert_eq!(points[3].balance, dec("140.00"));
    assert_eq!(points[4].balance, dec("100.00")); // end of Aug 5
    assert_eq!(points[5].balance, dec("100.00"));
}

#[test]
fn last_point_equals_current_balance() {
    let mut conn = setup();
    let id = add_account(&conn, "Checking", "asset", "1000.00");
    tx(&mut conn, "2025-08-01", "40.00", TxType::Expense, id);
    tx(&mut conn, "2025-08-03", "15.50", TxType::Income, id);
    tx(&mut conn, "2025-08-03", "4.50", TxType::Expense, id);

    let account = account_by_name(&conn, "Checking").unwrap();
    let points = history_series(&conn, &account, TimeRange::All, date("2025-08-10")).unwrap();

    let last = points.last().unwrap();
    assert_eq!(last.date, date("2025-08-10"));
    assert_eq!(last.balance, account.balance);
}

#[test]
fn same_day_events_net_into_one_bucket() {
    let mut conn = setup();
    let id = add_account(&conn, "Checking", "asset", "500.00");
    tx(&mut conn, "2025-08-02", "30.00", TxType::Expense, id);
    tx(&mut conn, "2025-08-02", "10.00", TxType::Income, id);

    let account = account_by_name(&conn, "Checking").unwrap();
    let points = history_series(&conn, &account, TimeRange::All, date("2025-08-03")).unwrap();

    // Before Aug 2 the balance was 500 - (-30 + 10) = 520... walked backward
    // from the current 480.
    let by_date: BTreeMap<_, _> = points.iter().map(|p| (p.date, p.balance)).collect();
    assert_eq!(by_date[&date("2025-08-03")], dec("480.00"));
    assert_eq!(by_date[&date("2025-08-02")], dec("480.00"));
}

#[test]
fn transfers_count_by_direction() {
    let mut conn = setup();
    let checking = add_account(&conn, "Checking", "asset", "1000.00");
    add_account(&conn, "Savings", "asset", "0.00");
    transfers::execute(
        &mut conn,
        "Checking",
        "Savings",
        dec("100.00"),
        date("2025-08-02"),
        "stash",
    )
    .unwrap();

    let account = account_by_name(&conn, "Checking").unwrap();
    assert_eq!(account.balance, dec("900.00"));
    let points = history_series(&conn, &account, TimeRange::All, date("2025-08-03")).unwrap();
    let first = points.first().unwrap();
    // Start of window is the transfer day; the day before it ended at 1000.
    assert_eq!(first.date, date("2025-08-02"));
    assert_eq!(first.balance, dec("900.00"));

    let savings = account_by_name(&conn, "Savings").unwrap();
    let points = history_series(&conn, &savings, TimeRange::All, date("2025-08-03")).unwrap();
    assert_eq!(points.last().unwrap().balance, dec("100.00"));
}

#[test]
fn no_activity_falls_back_to_snapshots() {
    let mut conn = setup();
    let id = add_account(&conn, "Legacy", "asset", "750.00");
    conn.execute(
        "INSERT INTO history(date, account_balances, total_assets, total_liabilities, net_worth)
         VALUES ('2025-07-01', ?1, '700', '0', '700')",
        [format!("{{\"{}\":700}}", id)],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO history(date, account_balances, total_assets, total_liabilities, net_worth)
         VALUES ('2025-07-15', ?1, '750', '0', '750')",
        [format!("{{\"{}\":750}}", id)],
    )
    .unwrap();

    let account = account_by_name(&conn, "Legacy").unwrap();
    let points = history_series(&conn, &account, TimeRange::All, date("2025-08-01")).unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].balance, dec("700"));
    assert_eq!(points[1].balance, dec("750"));
}

#[test]
fn window_start_clamps_to_earliest_event() {
    let mut daily = BTreeMap::new();
    daily.insert(date("2025-08-01"), dec("5"));
    let today = date("2025-08-10");

    // A one-year range has no business starting before the first event.
    assert_eq!(window_start(&daily, today, TimeRange::OneYear), date("2025-08-01"));
    assert_eq!(window_start(&daily, today, TimeRange::All), date("2025-08-01"));

    // Events older than the cutoff stay outside the window.
    daily.insert(date("2020-01-01"), dec("1"));
    let start = window_start(&daily, today, TimeRange::OneMonth);
    assert_eq!(start, date("2025-07-10"));
}
