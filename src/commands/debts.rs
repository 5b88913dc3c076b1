// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The bounty board: receivables and payables flattened out of split
//! transactions, with their open -> repaid/forgiven lifecycle.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{history, transactions};
use crate::ledger::splits::{self, Resolution};
use crate::ledger::delta;
use crate::models::SplitStatus;
use crate::utils::{
    self, account_by_name, fmt_money, maybe_print_json, parse_date, parse_decimal, pretty_table,
};

#[derive(Debug, Clone, Serialize)]
pub struct DebtItem {
    pub split_id: i64,
    pub transaction_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    pub target: String,
    pub amount: Decimal,
    pub note: Option<String>,
    pub status: SplitStatus,
}

#[derive(Debug, Default, Serialize)]
pub struct DebtMetrics {
    pub total_outstanding: Decimal,
    pub total_debt: Decimal,
    pub total_repaid: Decimal,
    pub total_forgiven: Decimal,
    pub count_open: usize,
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(conn, sub)?,
        Some(("repay", sub)) => {
            let split_id: i64 = *sub.get_one::<i64>("split").unwrap();
            let account = sub.get_one::<String>("account").cloned();
            let tx_id = resolve(conn, split_id, Resolution::Repaid, account.as_deref())?;
            println!("Repayment recorded (tx {})", tx_id);
        }
        Some(("forgive", sub)) => {
            let split_id: i64 = *sub.get_one::<i64>("split").unwrap();
            let tx_id = resolve(conn, split_id, Resolution::Forgiven, None)?;
            println!("Debt forgiven (tx {})", tx_id);
        }
        _ => {}
    }
    Ok(())
}

/// Every receivable/payable split across all transactions.
pub fn board(conn: &Connection) -> Result<Vec<DebtItem>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.transaction_id, t.date, t.description, s.category, s.target, s.amount,
                s.note, s.status
         FROM splits s JOIN transactions t ON s.transaction_id=t.id
         WHERE s.category IN ('receivable','payable')
         ORDER BY t.date DESC, s.id DESC",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, Option<String>>(5)?,
            r.get::<_, String>(6)?,
            r.get::<_, Option<String>>(7)?,
            r.get::<_, Option<String>>(8)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (split_id, transaction_id, date, description, category, target, amount, note, status) =
            row?;
        out.push(DebtItem {
            split_id,
            transaction_id,
            date: parse_date(&date)?,
            description,
            category,
            target: target.unwrap_or_else(|| splits::UNASSIGNED_TARGET.to_string()),
            amount: parse_decimal(&amount)?,
            note,
            // Legacy rows without a status are treated as still open.
            status: status
                .as_deref()
                .map(SplitStatus::parse)
                .transpose()?
                .unwrap_or(SplitStatus::Open),
        });
    }
    Ok(out)
}

pub fn metrics(items: &[DebtItem]) -> DebtMetrics {
    let mut m = DebtMetrics::default();
    for item in items {
        match item.status {
            SplitStatus::Open => {
                m.count_open += 1;
                if item.category == splits::RECEIVABLE {
                    m.total_outstanding += item.amount;
                } else {
                    m.total_debt += item.amount;
                }
            }
            SplitStatus::Repaid => m.total_repaid += item.amount,
            SplitStatus::Forgiven => m.total_forgiven += item.amount,
        }
    }
    m
}

/// Settle an open debt split. The status flip and the settlement transaction
/// (plus any balance effect) are one write set; no state where one exists
/// without the other is observable.
pub fn resolve(
    conn: &mut Connection,
    split_id: i64,
    resolution: Resolution,
    target_account: Option<&str>,
) -> Result<i64> {
    let raw = conn
        .query_row(
            "SELECT s.category, s.target, s.amount, s.status, s.note
             FROM splits s WHERE s.id=?1",
            params![split_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<String>>(3)?,
                    r.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| anyhow!("Split {} not found", split_id))?;
    let (category, target, amount, status, _note) = raw;

    if !splits::is_debt_category(&category) {
        return Err(crate::ledger::LedgerError::NotADebt.into());
    }
    let current = status.as_deref().map(SplitStatus::parse).transpose()?;
    // Legacy debt rows saved without a status count as open.
    splits::check_transition(current.or(Some(SplitStatus::Open)), resolution)?;

    let amount = parse_decimal(&amount)
        .with_context(|| format!("Invalid amount on split {}", split_id))?;
    let target = target.unwrap_or_else(|| splits::UNASSIGNED_TARGET.to_string());
    let settlement = splits::settlement(resolution, &category, &target);

    let account = match target_account {
        Some(name) => Some(account_by_name(conn, name)?),
        None => None,
    };

    let today = utils::today();
    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE splits SET status=?1 WHERE id=?2",
        params![resolution.status().as_str(), split_id],
    )?;
    let settlement_tx = transactions::insert_rows(
        &tx,
        &transactions::NewTransaction {
            date: today,
            description: settlement.description,
            amount,
            r#type: settlement.r#type,
            category: Some(settlement.category),
            account_id: account.as_ref().map(|a| a.id),
            tags: settlement.tags,
            is_recurring: false,
            splits: Vec::new(),
        },
    )?;
    if settlement.touches_account {
        if let Some(acc) = &account {
            let new_balance = delta::apply(acc.balance, amount, settlement.r#type, acc.r#type);
            transactions::write_balance(&tx, acc.id, new_balance)?;
            history::record_snapshot(&tx, today)?;
        }
    }
    tx.commit()?;
    Ok(settlement_tx)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let status_filter = sub
        .get_one::<String>("status")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "open".to_string());

    let all = board(conn)?;
    let m = metrics(&all);
    let shown: Vec<&DebtItem> = all
        .iter()
        .filter(|i| status_filter == "all" || i.status.as_str() == status_filter)
        .collect();

    if !maybe_print_json(json_flag, jsonl_flag, &shown)? {
        let rows: Vec<Vec<String>> = shown
            .iter()
            .map(|i| {
                vec![
                    i.split_id.to_string(),
                    i.date.to_string(),
                    if i.category == splits::RECEIVABLE { "bounty" } else { "debt" }.to_string(),
                    i.target.clone(),
                    fmt_money(&i.amount),
                    i.description.clone(),
                    i.status.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Split", "Date", "Kind", "Target", "Amount", "Description", "Status"],
                rows
            )
        );
        println!(
            "Owed to you: {}  You owe: {}  Repaid: {}  Forgiven: {}  Open: {}",
            fmt_money(&m.total_outstanding),
            fmt_money(&m.total_debt),
            fmt_money(&m.total_repaid),
            fmt_money(&m.total_forgiven),
            m.count_open
        );
    }
    Ok(())
}
