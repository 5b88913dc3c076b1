// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::commands::transactions;
use crate::utils::{
    self, fmt_money, maybe_print_json, month_key, parse_decimal, parse_month, pretty_table,
};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set_cmd(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("report", sub)) => report(conn, sub)?,
        _ => {}
    }
    Ok(())
}

/// Snapshot every category's default budget into a month the first time the
/// month is touched. Once locked, retroactive edits to category defaults do
/// not alter that month's reporting.
pub fn lock_month(conn: &Connection, month: &str) -> Result<()> {
    let locked: i64 =
        conn.query_row("SELECT COUNT(*) FROM budgets WHERE month=?1", params![month], |r| {
            r.get(0)
        })?;
    if locked > 0 {
        return Ok(());
    }
    backfill_missing(conn, month)
}

fn backfill_missing(conn: &Connection, month: &str) -> Result<()> {
    let mut stmt = conn.prepare("SELECT id, budget FROM categories")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    for row in rows {
        let (cat, budget) = row?;
        conn.execute(
            "INSERT OR IGNORE INTO budgets(month, category, amount) VALUES (?1, ?2, ?3)",
            params![month, cat, budget],
        )?;
    }
    Ok(())
}

/// The month's locked amount when one exists, else the category default.
pub fn effective_budget(conn: &Connection, category: &str, month: &str) -> Result<Decimal> {
    let locked: Option<String> = conn
        .query_row(
            "SELECT amount FROM budgets WHERE month=?1 AND category=?2",
            params![month, category],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(s) = locked {
        return parse_decimal(&s)
            .with_context(|| format!("Invalid budget amount '{}' for {}", s, month));
    }
    let default: Option<String> = conn
        .query_row("SELECT budget FROM categories WHERE id=?1", params![category], |r| r.get(0))
        .optional()?;
    match default {
        Some(s) => parse_decimal(&s)
            .with_context(|| format!("Invalid default budget '{}' for {}", s, category)),
        None => Ok(Decimal::ZERO),
    }
}

/// Write a month's budget for a category. For the current or a future month
/// the category default moves too, and past months that have transactions but
/// never locked get their snapshot backfilled from the pre-edit defaults.
pub fn set_budget(conn: &mut Connection, category: &str, month: &str, amount: Decimal) -> Result<()> {
    let current_month = month_key(utils::today());

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO budgets(month, category, amount) VALUES (?1, ?2, ?3)
         ON CONFLICT(month, category) DO UPDATE SET amount=excluded.amount",
        params![month, category, amount.to_string()],
    )?;

    if month >= current_month.as_str() {
        let mut months = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT DISTINCT substr(date,1,7) FROM transactions WHERE substr(date,1,7) < ?1",
            )?;
            let rows = stmt.query_map(params![current_month], |r| r.get::<_, String>(0))?;
            for row in rows {
                months.push(row?);
            }
        }
        // Merge, not lock: months that partially locked still get their
        // missing categories pinned to the pre-edit defaults.
        for past in months {
            backfill_missing(&tx, &past)?;
        }
        tx.execute(
            "UPDATE categories SET budget=?1 WHERE id=?2",
            params![amount.to_string(), category],
        )?;
    }

    tx.commit()?;
    Ok(())
}

fn set_cmd(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let category = sub.get_one::<String>("category").unwrap().trim().to_string();
    if !utils::category_exists(conn, &category)? {
        return Err(anyhow::anyhow!("Category '{}' not found", category));
    }
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    set_budget(conn, &category, &month, amount)?;
    println!("Budget set for {} / {} = {}", month, category, fmt_money(&amount));
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut sql = String::from(
        "SELECT b.month, c.name, b.amount FROM budgets b JOIN categories c ON b.category=c.id",
    );
    let mut params_vec: Vec<String> = Vec::new();
    if let Some(month) = sub.get_one::<String>("month") {
        sql.push_str(" WHERE b.month=? ORDER BY c.name");
        params_vec.push(month.clone());
    } else {
        sql.push_str(" ORDER BY b.month DESC, c.name");
    }
    let mut stmt = conn.prepare(&sql)?;
    let refs: Vec<&dyn rusqlite::ToSql> =
        params_vec.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
    let rows = stmt.query_map(rusqlite::params_from_iter(refs), |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?))
    })?;
    let mut data = Vec::new();
    for row in rows {
        let (m, c, a) = row?;
        data.push(vec![m, c, a]);
    }
    println!("{}", pretty_table(&["Month", "Category", "Budget"], data));
    Ok(())
}

fn report(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;

    let spent = transactions::spent_by_category(conn, &month)?;

    let mut cats_stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
    let cats = cats_stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;

    let mut data = Vec::new();
    for c in cats {
        let (cid, cname) = c?;
        let budget = effective_budget(conn, &cid, &month)?;
        let used = spent.get(&cid).copied().unwrap_or(Decimal::ZERO);
        let remaining = budget - used;
        data.push(vec![cname, fmt_money(&budget), fmt_money(&used), fmt_money(&remaining)]);
    }

    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        println!(
            "{}",
            pretty_table(&["Category", "Budget", "Spent", "Remaining"], data)
        );
    }
    Ok(())
}
