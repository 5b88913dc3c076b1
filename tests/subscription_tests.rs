// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

use chronicle::commands::subscriptions::process_due;
use chronicle::commands::transactions::{self, NewTransaction};
use chronicle::models::TxType;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    chronicle::db::init_schema(&mut conn).unwrap();
    conn
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn add_sub(conn: &Connection, name: &str, day: u32, last_processed: Option<&str>) {
    conn.execute(
        "INSERT INTO subscriptions(name, amount, day_of_month, category, tags, last_processed)
         VALUES (?1, '15.99', ?2, 'entertainment', '[]', ?3)",
        rusqlite::params![name, day, last_processed],
    )
    .unwrap();
}

fn posted(conn: &Connection) -> Vec<(String, String)> {
    let mut stmt = conn
        .prepare("SELECT description, date FROM transactions ORDER BY id")
        .unwrap();
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))
        .unwrap();
    rows.map(|r| r.unwrap()).collect()
}

#[test]
fn due_subscription_posts_once_per_month() {
    let mut conn = setup();
    add_sub(&conn, "Netflix", 5, None);

    let count = process_due(&mut conn, date("2025-08-10")).unwrap();
    assert_eq!(count, 1);
    assert_eq!(posted(&conn), vec![("Netflix".to_string(), "2025-08-05".to_string())]);

    // Idempotent for the rest of the month.
    let count = process_due(&mut conn, date("2025-08-20")).unwrap();
    assert_eq!(count, 0);
    assert_eq!(posted(&conn).len(), 1);
}

#[test]
fn not_yet_due_is_skipped() {
    let mut conn = setup();
    add_sub(&conn, "Gym", 20, None);

    let count = process_due(&mut conn, date("2025-08-10")).unwrap();
    assert_eq!(count, 0);
    assert!(posted(&conn).is_empty());
}

#[test]
fn new_month_posts_again() {
    let mut conn = setup();
    add_sub(&conn, "Netflix", 5, Some("2025-07-05"));

    let count = process_due(&mut conn, date("2025-08-06")).unwrap();
    assert_eq!(count, 1);
    assert_eq!(posted(&conn), vec![("Netflix".to_string(), "2025-08-05".to_string())]);

    let last: Option<String> = conn
        .query_row("SELECT last_processed FROM subscriptions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(last.as_deref(), Some("2025-08-05"));
}

#[test]
fn day_31_clamps_to_short_month_end() {
    let mut conn = setup();
    add_sub(&conn, "Rent", 31, None);

    let count = process_due(&mut conn, date("2025-02-28")).unwrap();
    assert_eq!(count, 1);
    assert_eq!(posted(&conn), vec![("Rent".to_string(), "2025-02-28".to_string())]);
}

#[test]
fn posted_transaction_carries_subscription_defaults() {
    let mut conn = setup();
    add_sub(&conn, "Netflix", 1, None);
    process_due(&mut conn, date("2025-08-10")).unwrap();

    let (typ, tags, recurring): (String, String, i64) = conn
        .query_row(
            "SELECT type, tags, is_recurring FROM transactions",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    assert_eq!(typ, "expense");
    assert!(tags.contains("subscription"));
    assert_eq!(recurring, 1);
}

#[test]
fn processing_locks_the_month_budget_snapshot() {
    let mut conn = setup();
    add_sub(&conn, "Netflix", 1, None);
    process_due(&mut conn, date("2025-08-10")).unwrap();

    // Default categories were copied into the month's snapshot.
    let locked: i64 = conn
        .query_row("SELECT COUNT(*) FROM budgets WHERE month='2025-08'", [], |r| r.get(0))
        .unwrap();
    assert!(locked > 0);
}

#[test]
fn recurring_transaction_registers_subscription() {
    let mut conn = setup();
    transactions::add(
        &mut conn,
        NewTransaction {
            date: date("2025-08-12"),
            description: "Spotify".into(),
            amount: dec("9.99"),
            r#type: TxType::Expense,
            category: Some("entertainment".into()),
            account_id: None,
            tags: vec![],
            is_recurring: true,
            splits: vec![],
        },
    )
    .unwrap();

    let (day, last): (u32, Option<String>) = conn
        .query_row(
            "SELECT day_of_month, last_processed FROM subscriptions WHERE name='Spotify'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(day, 12);
    // Pinned to the creating transaction's date so this month never
    // double-posts.
    assert_eq!(last.as_deref(), Some("2025-08-12"));

    let count = process_due(&mut conn, date("2025-08-20")).unwrap();
    assert_eq!(count, 0);
}
