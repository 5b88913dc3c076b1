// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::Connection;
use rust_decimal::Decimal;

use chronicle::commands::budgets::{effective_budget, lock_month, set_budget};
use chronicle::utils::month_key;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    chronicle::db::init_schema(&mut conn).unwrap();
    conn
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[test]
fn unlocked_month_falls_back_to_category_default() {
    let conn = setup();
    // groceries seeds with a 400 default.
    assert_eq!(effective_budget(&conn, "groceries", "2025-03").unwrap(), dec("400"));
    assert_eq!(effective_budget(&conn, "nonexistent", "2025-03").unwrap(), Decimal::ZERO);
}

#[test]
fn locked_month_survives_default_edits() {
    let conn = setup();
    lock_month(&conn, "2025-03").unwrap();
    assert_eq!(effective_budget(&conn, "groceries", "2025-03").unwrap(), dec("400"));

    // Retroactive default change must not rewrite the locked month.
    conn.execute("UPDATE categories SET budget='999' WHERE id='groceries'", [])
        .unwrap();
    assert_eq!(effective_budget(&conn, "groceries", "2025-03").unwrap(), dec("400"));
    // Unlocked months see the new default.
    assert_eq!(effective_budget(&conn, "groceries", "2025-04").unwrap(), dec("999"));
}

#[test]
fn lock_month_is_first_write_wins() {
    let conn = setup();
    lock_month(&conn, "2025-03").unwrap();
    conn.execute("UPDATE categories SET budget='999' WHERE id='groceries'", [])
        .unwrap();
    // Relocking an already-locked month changes nothing.
    lock_month(&conn, "2025-03").unwrap();
    assert_eq!(effective_budget(&conn, "groceries", "2025-03").unwrap(), dec("400"));
}

#[test]
fn set_budget_past_month_pins_only_that_month() {
    let mut conn = setup();
    set_budget(&mut conn, "groceries", "2020-01", dec("123")).unwrap();

    assert_eq!(effective_budget(&conn, "groceries", "2020-01").unwrap(), dec("123"));
    // The default is untouched for a past-month edit.
    let default: String = conn
        .query_row("SELECT budget FROM categories WHERE id='groceries'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(default.parse::<Decimal>().unwrap(), dec("400"));
}

#[test]
fn set_budget_current_month_moves_default_and_backfills_history() {
    let mut conn = setup();
    let current = month_key(chronicle::utils::today());

    // A past month with activity but no locked snapshot yet.
    conn.execute(
        "INSERT INTO transactions(date, description, amount, type, category, tags)
         VALUES ('2020-05-10', 'old spend', '10', 'expense', 'groceries', '[]')",
        [],
    )
    .unwrap();

    set_budget(&mut conn, "groceries", &current, dec("777")).unwrap();

    // Default moved for the future.
    let default: String = conn
        .query_row("SELECT budget FROM categories WHERE id='groceries'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(default.parse::<Decimal>().unwrap(), dec("777"));

    // The past month with transactions got pinned at the pre-edit default.
    assert_eq!(effective_budget(&conn, "groceries", "2020-05").unwrap(), dec("400"));
}
