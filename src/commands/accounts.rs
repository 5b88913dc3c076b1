// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::commands::{history, transactions};
use crate::ledger::replay::{self, BalancePoint, TimeRange};
use crate::ledger::{delta, reconcile};
use crate::models::{Account, AccountType, TxType};
use crate::utils::{
    self, account_by_name, all_accounts, fmt_money, maybe_print_json, parse_decimal, pretty_table,
};

pub const DEFAULT_ACCOUNT_SETTING: &str = "default_account";

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("update", sub)) => update(conn, sub)?,
        Some(("rm", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let acc = account_by_name(conn, name)?;
            let tx = conn.transaction()?;
            // Transactions survive as cash/other entries.
            tx.execute(
                "UPDATE transactions SET account_id=NULL WHERE account_id=?1",
                params![acc.id],
            )?;
            tx.execute("DELETE FROM accounts WHERE id=?1", params![acc.id])?;
            tx.commit()?;
            println!("Removed account '{}'", acc.name);
        }
        Some(("set-default", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let acc = account_by_name(conn, name)?;
            utils::set_setting(conn, DEFAULT_ACCOUNT_SETTING, &acc.name)?;
            println!("Default account set to '{}'", acc.name);
        }
        Some(("reconcile", sub)) => reconcile_cmd(conn, sub)?,
        Some(("history", sub)) => history_cmd(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn add(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let name = sub.get_one::<String>("name").unwrap().trim().to_string();
    let r#type = AccountType::parse(sub.get_one::<String>("type").unwrap())?;
    let subtype = sub
        .get_one::<String>("subtype")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "other".to_string());
    let balance = match sub.get_one::<String>("balance") {
        Some(b) => parse_decimal(b)?,
        None => Decimal::ZERO,
    };

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO accounts(name, type, subtype, balance) VALUES (?1, ?2, ?3, ?4)",
        params![name, r#type.as_str(), subtype, balance.to_string()],
    )?;
    history::record_snapshot(&tx, utils::today())?;
    tx.commit()?;
    println!("Added account '{}' ({}, {})", name, r#type, subtype);
    Ok(())
}

fn update(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let acc = account_by_name(conn, sub.get_one::<String>("name").unwrap())?;
    let name = sub
        .get_one::<String>("new-name")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| acc.name.clone());
    let r#type = match sub.get_one::<String>("type") {
        Some(t) => AccountType::parse(t)?,
        None => acc.r#type,
    };
    let subtype = sub
        .get_one::<String>("subtype")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| acc.subtype.clone());
    let balance = match sub.get_one::<String>("balance") {
        Some(b) => parse_decimal(b)?,
        None => acc.balance,
    };

    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE accounts SET name=?1, type=?2, subtype=?3, balance=?4 WHERE id=?5",
        params![name, r#type.as_str(), subtype, balance.to_string(), acc.id],
    )?;
    history::record_snapshot(&tx, utils::today())?;
    tx.commit()?;
    println!("Account '{}' updated", name);
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let accounts = all_accounts(conn)?;
    if !maybe_print_json(json_flag, jsonl_flag, &accounts)? {
        let mut assets = Decimal::ZERO;
        let mut liabilities = Decimal::ZERO;
        let rows: Vec<Vec<String>> = accounts
            .iter()
            .map(|a| {
                match a.r#type {
                    AccountType::Asset => assets += a.balance,
                    AccountType::Liability => liabilities += a.balance,
                }
                vec![
                    a.name.clone(),
                    a.r#type.to_string(),
                    a.subtype.clone(),
                    fmt_money(&a.balance),
                ]
            })
            .collect();
        println!("{}", pretty_table(&["Name", "Type", "Subtype", "Balance"], rows));
        println!(
            "Assets: {}  Liabilities: {}  Net worth: {}",
            fmt_money(&assets),
            fmt_money(&liabilities),
            fmt_money(&(assets - liabilities))
        );
    }
    Ok(())
}

/// Correct drift against an externally verified balance by posting one
/// adjustment transaction and setting the stored balance to the asserted
/// value, in a single write set.
pub fn reconcile_account(
    conn: &mut Connection,
    account: &Account,
    actual: Decimal,
    today: NaiveDate,
) -> Result<Option<TxType>> {
    let adjustment = match reconcile::adjustment(account.r#type, account.balance, actual) {
        Some(adj) => adj,
        None => return Ok(None),
    };

    let tx = conn.transaction()?;
    transactions::insert_rows(
        &tx,
        &transactions::NewTransaction {
            date: today,
            description: "Balance Reconciliation".to_string(),
            amount: adjustment.amount,
            r#type: adjustment.r#type,
            category: Some("misc".to_string()),
            account_id: Some(account.id),
            tags: vec!["reconciliation".to_string()],
            is_recurring: false,
            splits: Vec::new(),
        },
    )?;
    // The adjustment's delta equals the gap by construction; the balance is
    // set directly rather than routed through the delta engine.
    transactions::write_balance(&tx, account.id, actual)?;
    history::record_snapshot(&tx, today)?;
    tx.commit()?;
    Ok(Some(adjustment.r#type))
}

fn reconcile_cmd(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let account = account_by_name(conn, sub.get_one::<String>("name").unwrap())?;
    let actual = parse_decimal(sub.get_one::<String>("actual").unwrap())?;
    match reconcile_account(conn, &account, actual, utils::today())? {
        Some(t) => println!(
            "Reconciled '{}': posted {} adjustment, balance now {}",
            account.name,
            t,
            fmt_money(&actual)
        ),
        None => println!("Account '{}' is already balanced.", account.name),
    }
    Ok(())
}

/// Day-by-day balance series for one account, anchored at its current stored
/// balance and replayed backward. Accounts with no ledger activity at all
/// fall back to recorded history snapshots.
pub fn history_series(
    conn: &Connection,
    account: &Account,
    range: TimeRange,
    today: NaiveDate,
) -> Result<Vec<BalancePoint>> {
    let mut daily: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();

    let mut stmt = conn.prepare(
        "SELECT date, amount, type FROM transactions WHERE account_id=?1",
    )?;
    let rows = stmt.query_map(params![account.id], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?))
    })?;
    for row in rows {
        let (date, amount, typ) = row?;
        let date = utils::parse_date(&date)?;
        let amount = parse_decimal(&amount)
            .with_context(|| format!("Invalid amount on transaction dated {}", date))?;
        let t = TxType::parse(&typ)?;
        replay::add_daily_delta(&mut daily, date, delta::effective_delta(amount, t, account.r#type));
    }

    let mut stmt = conn.prepare(
        "SELECT date, amount, from_id, to_id FROM transfers WHERE from_id=?1 OR to_id=?1",
    )?;
    let rows = stmt.query_map(params![account.id], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, i64>(2)?,
            r.get::<_, i64>(3)?,
        ))
    })?;
    for row in rows {
        let (date, amount, from_id, to_id) = row?;
        let date = utils::parse_date(&date)?;
        let amount = parse_decimal(&amount)?;
        if from_id == account.id {
            replay::add_daily_delta(&mut daily, date, -amount * delta::polarity(account.r#type));
        }
        if to_id == account.id {
            replay::add_daily_delta(&mut daily, date, amount * delta::polarity(account.r#type));
        }
    }

    if daily.is_empty() {
        let cutoff = range.cutoff(today);
        let points = history::load_snapshots(conn)?
            .into_iter()
            .filter(|h| h.account_balances.contains_key(&account.id))
            .filter(|h| cutoff.map(|c| h.date >= c).unwrap_or(true))
            .map(|h| BalancePoint { date: h.date, balance: h.account_balances[&account.id] })
            .collect();
        return Ok(points);
    }

    let start = replay::window_start(&daily, today, range);
    Ok(replay::balance_series(account.balance, &daily, start, today))
}

fn history_cmd(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let account = account_by_name(conn, sub.get_one::<String>("name").unwrap())?;
    let range = match sub.get_one::<String>("range") {
        Some(r) => TimeRange::parse(r)?,
        None => TimeRange::All,
    };
    let points = history_series(conn, &account, range, utils::today())?;
    if points.is_empty() {
        println!("Not enough data to graph '{}'", account.name);
        return Ok(());
    }
    if !maybe_print_json(json_flag, jsonl_flag, &points)? {
        let rows: Vec<Vec<String>> = points
            .iter()
            .map(|p| vec![p.date.to_string(), fmt_money(&p.balance)])
            .collect();
        println!("{}", pretty_table(&["Date", "Balance"], rows));
    }
    Ok(())
}
