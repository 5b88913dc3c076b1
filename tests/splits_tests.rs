// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

use chronicle::commands::debts;
use chronicle::commands::transactions::{self, NewTransaction};
use chronicle::ledger::splits::{validate_split_total, SplitInput};
use chronicle::models::{SplitStatus, TxType};

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

fn split(amount: &str, category: &str, target: Option<&str>) -> SplitInput {
    SplitInput {
        amount: dec(amount),
        category: category.into(),
        r#type: TxType::Expense,
        target: target.map(|t| t.to_string()),
        note: None,
    }
}

fn split_tx(amount: &str, splits: Vec<SplitInput>) -> NewTransaction {
    NewTransaction {
        date: date("2025-08-05"),
        description: "Group dinner".into(),
        amount: dec(amount),
        r#type: TxType::Expense,
        category: Some("split".into()),
        account_id: None,
        tags: vec![],
        is_recurring: false,
        splits,
    }
}

#[test]
fn split_total_tolerance_sweep() {
    // Cent offsets within +/-2 accepted, beyond rejected.
    for offset_cents in -5i64..=5 {
        let total = dec("100.00") + Decimal::new(offset_cents, 2);
        let splits = vec![SplitInput {
            amount: total,
            category: "food".into(),
            r#type: TxType::Expense,
            target: None,
            note: None,
        }];
        let result = validate_split_total(dec("100.00"), &splits);
        if offset_cents.abs() <= 2 {
            assert!(result.is_ok(), "offset {} should be tolerated", offset_cents);
        } else {
            assert!(result.is_err(), "offset {} should be rejected", offset_cents);
        }
    }
}

#[test]
fn mismatched_split_sum_rejects_whole_save() {
    let mut conn = setup();
    let t = split_tx("100.00", vec![split("60.00", "food", None), split("30.00", "misc", None)]);
    assert!(transactions::add(&mut conn, t).is_err());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn debt_split_defaults_target_and_status() {
    let mut conn = setup();
    let t = split_tx(
        "90.00",
        vec![
            split("50.00", "food", None),
            split("25.00", "receivable", Some("Alice")),
            split("15.00", "payable", None), // blank target
        ],
    );
    let id = transactions::add(&mut conn, t).unwrap();

    let rows = transactions::splits_for(&conn, id).unwrap();
    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0].status, None);
    assert_eq!(rows[0].target, None);

    assert_eq!(rows[1].status, Some(SplitStatus::Open));
    assert_eq!(rows[1].target.as_deref(), Some("Alice"));

    assert_eq!(rows[2].status, Some(SplitStatus::Open));
    assert_eq!(rows[2].target.as_deref(), Some("Unassigned"));
}

#[test]
fn board_flattens_and_partitions_debts() {
    let mut conn = setup();
    transactions::add(
        &mut conn,
        split_tx(
            "100.00",
            vec![
                split("40.00", "food", None),
                split("35.00", "receivable", Some("Alice")),
                split("25.00", "payable", Some("Bob")),
            ],
        ),
    )
    .unwrap();

    let items = debts::board(&conn).unwrap();
    assert_eq!(items.len(), 2);

    let m = debts::metrics(&items);
    assert_eq!(m.total_outstanding, dec("35.00"));
    assert_eq!(m.total_debt, dec("25.00"));
    assert_eq!(m.count_open, 2);
    assert_eq!(m.total_repaid, Decimal::ZERO);
    assert_eq!(m.total_forgiven, Decimal::ZERO);
}

#[test]
fn splits_deleted_with_their_transaction() {
    let mut conn = setup();
    let id = transactions::add(
        &mut conn,
        split_tx("10.00", vec![split("10.00", "receivable", Some("Cara"))]),
    )
    .unwrap();

    transactions::remove(&mut conn, id).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM splits", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 0);
}
