// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

use chronicle::commands::transfers;

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

fn balance_of(conn: &Connection, id: i64) -> Decimal {
    let s: String = conn
        .query_row("SELECT balance FROM accounts WHERE id=?1", [id], |r| r.get(0))
        .unwrap();
    s.parse().unwrap()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn asset_to_asset_conserves_total() {
    let mut conn = setup();
    let p = add_account(&conn, "P", "asset", "1000.00");
    let q = add_account(&conn, "Q", "asset", "200.00");

    transfers::execute(&mut conn, "P", "Q", dec("150.00"), date("2025-08-01"), "move").unwrap();

    assert_eq!(balance_of(&conn, p), dec("850.00"));
    assert_eq!(balance_of(&conn, q), dec("350.00"));
    assert_eq!(balance_of(&conn, p) + balance_of(&conn, q), dec("1200.00"));
}

#[test]
fn asset_to_liability_pays_debt_down() {
    let mut conn = setup();
    let checking = add_account(&conn, "Checking", "asset", "1000.00");
    let card = add_account(&conn, "Card", "liability", "500.00");

    transfers::execute(&mut conn, "Checking", "Card", dec("200.00"), date("2025-08-01"), "payment")
        .unwrap();

    assert_eq!(balance_of(&conn, checking), dec("800.00"));
    assert_eq!(balance_of(&conn, card), dec("300.00"));
}

#[test]
fn liability_funding_increases_what_is_owed() {
    let mut conn = setup();
    let card = add_account(&conn, "Card", "liability", "100.00");
    let checking = add_account(&conn, "Checking", "asset", "50.00");

    transfers::execute(&mut conn, "Card", "Checking", dec("75.00"), date("2025-08-01"), "advance")
        .unwrap();

    assert_eq!(balance_of(&conn, card), dec("175.00"));
    assert_eq!(balance_of(&conn, checking), dec("125.00"));
}

#[test]
fn same_account_rejected() {
    let mut conn = setup();
    add_account(&conn, "P", "asset", "1000.00");

    let err = transfers::execute(&mut conn, "P", "P", dec("10.00"), date("2025-08-01"), "x");
    assert!(err.is_err());
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM transfers", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn non_positive_amount_rejected() {
    let mut conn = setup();
    add_account(&conn, "P", "asset", "1000.00");
    add_account(&conn, "Q", "asset", "0.00");

    assert!(transfers::execute(&mut conn, "P", "Q", dec("0"), date("2025-08-01"), "x").is_err());
    assert!(transfers::execute(&mut conn, "P", "Q", dec("-5"), date("2025-08-01"), "x").is_err());
}

#[test]
fn transfer_writes_record_and_snapshot_atomically() {
    let mut conn = setup();
    add_account(&conn, "P", "asset", "1000.00");
    add_account(&conn, "Q", "asset", "0.00");

    transfers::execute(&mut conn, "P", "Q", dec("10.00"), date("2025-08-01"), "desc").unwrap();

    let (from_name, to_name, amount): (String, String, String) = conn
        .query_row(
            "SELECT from_name, to_name, amount FROM transfers",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    assert_eq!(from_name, "P");
    assert_eq!(to_name, "Q");
    assert_eq!(amount.parse::<Decimal>().unwrap(), dec("10.00"));

    let snapshots: i64 = conn
        .query_row("SELECT COUNT(*) FROM history", [], |r| r.get(0))
        .unwrap();
    assert_eq!(snapshots, 1);
}
