// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::commands::transactions;
use crate::ledger::splits;
use crate::utils::pretty_table;

pub fn handle(conn: &Connection) -> Result<()> {
    let mut rows = Vec::new();

    // 1) Split sums drifting beyond tolerance from their transaction amount
    let mut stmt = conn.prepare(
        "SELECT DISTINCT transaction_id FROM splits ORDER BY transaction_id",
    )?;
    let ids = stmt.query_map([], |r| r.get::<_, i64>(0))?;
    for id in ids {
        let id = id?;
        let tx = transactions::get(conn, id)?;
        let parts = transactions::splits_for(conn, id)?;
        let total: Decimal = parts.iter().map(|s| s.amount).sum();
        if (total - tx.amount).abs() > Decimal::new(2, 2) {
            rows.push(vec![
                "split_sum_mismatch".into(),
                format!("tx {} amount {} splits {}", id, tx.amount, total),
            ]);
        }
    }

    // 2) Debt splits missing a target or a status
    let mut stmt2 = conn.prepare(
        "SELECT id, target, status FROM splits WHERE category IN ('receivable','payable')",
    )?;
    let mut cur = stmt2.query([])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        let target: Option<String> = r.get(1)?;
        let status: Option<String> = r.get(2)?;
        if target.as_deref().map(str::trim).filter(|t| !t.is_empty()).is_none() {
            rows.push(vec!["debt_missing_target".into(), format!("split {}", id)]);
        }
        if status.is_none() {
            rows.push(vec!["debt_missing_status".into(), format!("split {}", id)]);
        }
    }

    // 3) Transfers referencing accounts that no longer exist
    let mut stmt3 = conn.prepare(
        "SELECT t.id, t.from_id, t.to_id FROM transfers t
         WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id=t.from_id)
            OR NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id=t.to_id)",
    )?;
    let mut cur3 = stmt3.query([])?;
    while let Some(r) = cur3.next()? {
        let id: i64 = r.get(0)?;
        rows.push(vec!["transfer_missing_account".into(), format!("transfer {}", id)]);
    }

    // 4) Transactions pointing at accounts that no longer exist
    let mut stmt3b = conn.prepare(
        "SELECT id FROM transactions t
         WHERE t.account_id IS NOT NULL
           AND NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id=t.account_id)",
    )?;
    let mut cur3b = stmt3b.query([])?;
    while let Some(r) = cur3b.next()? {
        let id: i64 = r.get(0)?;
        rows.push(vec!["tx_missing_account".into(), format!("tx {}", id)]);
    }

    // 5) Ordinary splits carrying a debt status
    let mut stmt4 = conn.prepare("SELECT id, category, status FROM splits WHERE status IS NOT NULL")?;
    let mut cur4 = stmt4.query([])?;
    while let Some(r) = cur4.next()? {
        let id: i64 = r.get(0)?;
        let category: String = r.get(1)?;
        if !splits::is_debt_category(&category) {
            rows.push(vec![
                "status_on_ordinary_split".into(),
                format!("split {} ({})", id, category),
            ]);
        }
    }

    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
