// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::models::{AccountType, HistorySnapshot};
use crate::utils::{
    self, account_by_name, all_accounts, fmt_money, maybe_print_json, parse_decimal, pretty_table,
};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("record", _)) => {
            let id = record_snapshot(conn, utils::today())?;
            println!("History point {} recorded", id);
        }
        Some(("list", sub)) => list(conn, sub)?,
        Some(("set", sub)) => {
            let id: i64 = *sub.get_one::<i64>("id").unwrap();
            let account = account_by_name(conn, sub.get_one::<String>("account").unwrap())?;
            let balance = parse_decimal(sub.get_one::<String>("balance").unwrap())?;
            set_entry(conn, id, account.id, balance)?;
            println!("History point {} updated", id);
        }
        Some(("rm", sub)) => {
            let id: i64 = *sub.get_one::<i64>("id").unwrap();
            match sub.get_one::<String>("account") {
                Some(name) => {
                    let account = account_by_name(conn, name)?;
                    let deleted = remove_entry(conn, id, account.id)?;
                    if deleted {
                        println!("History point {} deleted (no balances left)", id);
                    } else {
                        println!("Removed '{}' from history point {}", account.name, id);
                    }
                }
                None => {
                    conn.execute("DELETE FROM history WHERE id=?1", params![id])?;
                    println!("History point {} deleted", id);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Capture every account's current balance as an immutable point-in-time
/// record. Callers invoke this inside the same write set as the balance
/// change it snapshots.
pub fn record_snapshot(conn: &Connection, date: NaiveDate) -> Result<i64> {
    let accounts = all_accounts(conn)?;
    let mut balances: BTreeMap<i64, Decimal> = BTreeMap::new();
    let mut assets = Decimal::ZERO;
    let mut liabilities = Decimal::ZERO;
    for a in &accounts {
        balances.insert(a.id, a.balance);
        match a.r#type {
            AccountType::Asset => assets += a.balance,
            AccountType::Liability => liabilities += a.balance,
        }
    }
    conn.execute(
        "INSERT INTO history(date, account_balances, total_assets, total_liabilities, net_worth)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            date.to_string(),
            serde_json::to_string(&balances)?,
            assets.to_string(),
            liabilities.to_string(),
            (assets - liabilities).to_string(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn load_snapshots(conn: &Connection) -> Result<Vec<HistorySnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, account_balances, total_assets, total_liabilities, net_worth
         FROM history ORDER BY date ASC, id ASC",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, date, balances, assets, liabilities, net) = row?;
        out.push(HistorySnapshot {
            id,
            date: utils::parse_date(&date)
                .with_context(|| format!("Invalid date on history point {}", id))?,
            account_balances: serde_json::from_str(&balances)
                .with_context(|| format!("Invalid balances on history point {}", id))?,
            total_assets: parse_decimal(&assets)?,
            total_liabilities: parse_decimal(&liabilities)?,
            net_worth: parse_decimal(&net)?,
        });
    }
    Ok(out)
}

fn get_snapshot(conn: &Connection, id: i64) -> Result<HistorySnapshot> {
    load_snapshots(conn)?
        .into_iter()
        .find(|h| h.id == id)
        .ok_or_else(|| anyhow!("History point {} not found", id))
}

fn write_snapshot(conn: &Connection, snap: &HistorySnapshot) -> Result<()> {
    conn.execute(
        "UPDATE history SET account_balances=?1, total_assets=?2, total_liabilities=?3, net_worth=?4
         WHERE id=?5",
        params![
            serde_json::to_string(&snap.account_balances)?,
            snap.total_assets.to_string(),
            snap.total_liabilities.to_string(),
            snap.net_worth.to_string(),
            snap.id,
        ],
    )?;
    Ok(())
}

/// Totals recomputed from a snapshot's balances using current account types;
/// balances for accounts that no longer exist count as assets.
fn recompute_totals(conn: &Connection, snap: &mut HistorySnapshot) -> Result<()> {
    let mut assets = Decimal::ZERO;
    let mut liabilities = Decimal::ZERO;
    for (acc_id, balance) in &snap.account_balances {
        let kind: Option<String> = conn
            .query_row("SELECT type FROM accounts WHERE id=?1", params![acc_id], |r| r.get(0))
            .optional()?;
        match kind.as_deref() {
            Some("liability") => liabilities += *balance,
            _ => assets += *balance,
        }
    }
    snap.total_assets = assets;
    snap.total_liabilities = liabilities;
    snap.net_worth = assets - liabilities;
    Ok(())
}

/// Correct one account's balance inside a recorded snapshot.
pub fn set_entry(conn: &Connection, id: i64, account_id: i64, balance: Decimal) -> Result<()> {
    let mut snap = get_snapshot(conn, id)?;
    snap.account_balances.insert(account_id, balance);
    recompute_totals(conn, &mut snap)?;
    write_snapshot(conn, &snap)
}

/// Drop one account's entry from a snapshot; the snapshot itself is deleted
/// once its last entry goes. Returns whether the whole point was deleted.
pub fn remove_entry(conn: &Connection, id: i64, account_id: i64) -> Result<bool> {
    let mut snap = get_snapshot(conn, id)?;
    snap.account_balances.remove(&account_id);
    if snap.account_balances.is_empty() {
        conn.execute("DELETE FROM history WHERE id=?1", params![id])?;
        return Ok(true);
    }
    recompute_totals(conn, &mut snap)?;
    write_snapshot(conn, &snap)?;
    Ok(false)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let data = load_snapshots(conn)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|h| {
                vec![
                    h.id.to_string(),
                    h.date.to_string(),
                    h.account_balances.len().to_string(),
                    fmt_money(&h.total_assets),
                    fmt_money(&h.total_liabilities),
                    fmt_money(&h.net_worth),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Date", "Accounts", "Assets", "Liabilities", "Net Worth"],
                rows
            )
        );
    }
    Ok(())
}
