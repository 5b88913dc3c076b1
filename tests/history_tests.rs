// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

use chronicle::commands::history::{
    load_snapshots, record_snapshot, remove_entry, set_entry,
};

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

#[test]
fn snapshot_captures_totals_by_account_type() {
    let conn = setup();
    let checking = add_account(&conn, "Checking", "asset", "1000.00");
    let card = add_account(&conn, "Card", "liability", "300.00");

    let id = record_snapshot(&conn, date("2025-08-05")).unwrap();
    let snaps = load_snapshots(&conn).unwrap();
    assert_eq!(snaps.len(), 1);
    let snap = &snaps[0];
    assert_eq!(snap.id, id);
    assert_eq!(snap.total_assets, dec("1000.00"));
    assert_eq!(snap.total_liabilities, dec("300.00"));
    assert_eq!(snap.net_worth, dec("700.00"));
    assert_eq!(snap.account_balances[&checking], dec("1000.00"));
    assert_eq!(snap.account_balances[&card], dec("300.00"));
}

#[test]
fn edit_entry_recomputes_net_worth() {
    let conn = setup();
    let checking = add_account(&conn, "Checking", "asset", "1000.00");
    add_account(&conn, "Card", "liability", "300.00");
    let id = record_snapshot(&conn, date("2025-08-05")).unwrap();

    set_entry(&conn, id, checking, dec("1200.00")).unwrap();

    let snap = &load_snapshots(&conn).unwrap()[0];
    assert_eq!(snap.account_balances[&checking], dec("1200.00"));
    assert_eq!(snap.total_assets, dec("1200.00"));
    assert_eq!(snap.net_worth, dec("900.00"));
}

#[test]
fn removing_last_entry_deletes_the_point() {
    let conn = setup();
    let checking = add_account(&conn, "Checking", "asset", "1000.00");
    let card = add_account(&conn, "Card", "liability", "300.00");
    let id = record_snapshot(&conn, date("2025-08-05")).unwrap();

    assert!(!remove_entry(&conn, id, card).unwrap());
    let snap = &load_snapshots(&conn).unwrap()[0];
    assert!(!snap.account_balances.contains_key(&card));
    assert_eq!(snap.total_liabilities, Decimal::ZERO);

    // Dropping the final entry removes the whole point.
    assert!(remove_entry(&conn, id, checking).unwrap());
    assert!(load_snapshots(&conn).unwrap().is_empty());
}
