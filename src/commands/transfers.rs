// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::commands::history;
use crate::ledger::{delta, LedgerError};
use crate::models::Transfer;
use crate::utils::{
    self, account_by_name, fmt_money, maybe_print_json, norm, parse_date, parse_decimal,
    pretty_table,
};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

/// Move money between two accounts atomically: both balance legs and the
/// transfer record land in one write set.
pub fn execute(
    conn: &mut Connection,
    from_name: &str,
    to_name: &str,
    amount: Decimal,
    date: NaiveDate,
    description: &str,
) -> Result<i64> {
    if norm(from_name) == norm(to_name) {
        return Err(LedgerError::SameAccountTransfer.into());
    }
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveTransfer.into());
    }
    let from = account_by_name(conn, from_name)?;
    let to = account_by_name(conn, to_name)?;
    if from.id == to.id {
        return Err(LedgerError::SameAccountTransfer.into());
    }

    let (from_delta, to_delta) = delta::transfer_deltas(from.r#type, to.r#type, amount);

    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE accounts SET balance=?1 WHERE id=?2",
        params![(from.balance + from_delta).to_string(), from.id],
    )?;
    tx.execute(
        "UPDATE accounts SET balance=?1 WHERE id=?2",
        params![(to.balance + to_delta).to_string(), to.id],
    )?;
    tx.execute(
        "INSERT INTO transfers(from_id, to_id, from_name, to_name, amount, date, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            from.id,
            to.id,
            from.name,
            to.name,
            amount.to_string(),
            date.to_string(),
            description,
        ],
    )?;
    let id = tx.last_insert_rowid();
    history::record_snapshot(&tx, date)?;
    tx.commit()?;
    Ok(id)
}

fn add(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let from = sub.get_one::<String>("from").unwrap();
    let to = sub.get_one::<String>("to").unwrap();
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let date = match sub.get_one::<String>("date") {
        Some(d) => parse_date(d)?,
        None => utils::today(),
    };
    let description = sub
        .get_one::<String>("description")
        .cloned()
        .unwrap_or_else(|| "Fund Transfer".to_string());
    execute(conn, from, to, amount, date, &description)?;
    println!("Transferred {} from '{}' to '{}'", fmt_money(&amount), from, to);
    Ok(())
}

pub fn load_transfers(conn: &Connection, limit: Option<usize>) -> Result<Vec<Transfer>> {
    let mut sql = String::from(
        "SELECT id, from_id, to_id, from_name, to_name, amount, date, description
         FROM transfers ORDER BY date DESC, id DESC",
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, i64>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, String>(6)?,
            r.get::<_, String>(7)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, from_id, to_id, from_name, to_name, amount, date, description) = row?;
        out.push(Transfer {
            id,
            from_id,
            to_id,
            from_name,
            to_name,
            amount: parse_decimal(&amount)?,
            date: parse_date(&date)?,
            description,
        });
    }
    Ok(out)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let limit = sub.get_one::<usize>("limit").copied();
    let data = load_transfers(conn, limit)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|t| {
                vec![
                    t.date.to_string(),
                    t.from_name.clone(),
                    t.to_name.clone(),
                    fmt_money(&t.amount),
                    t.description.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Date", "From", "To", "Amount", "Description"], rows)
        );
    }
    Ok(())
}
