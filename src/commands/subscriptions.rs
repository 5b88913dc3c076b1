// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection};

use crate::commands::budgets;
use crate::models::Subscription;
use crate::utils::{
    self, fmt_money, maybe_print_json, month_end, month_key, parse_date, parse_decimal,
    pretty_table, tags_from_json, tags_to_json,
};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => {
            let id: i64 = *sub.get_one::<i64>("id").unwrap();
            let changed = conn.execute("DELETE FROM subscriptions WHERE id=?1", params![id])?;
            if changed == 0 {
                return Err(anyhow::anyhow!("Subscription {} not found", id));
            }
            println!("Subscription {} removed", id);
        }
        Some(("process", sub)) => {
            let today = match sub.get_one::<String>("date") {
                Some(d) => parse_date(d)?,
                None => utils::today(),
            };
            let count = process_due(conn, today)?;
            if count > 0 {
                println!("Auto-recorded {} subscription(s)", count);
            } else {
                println!("No subscriptions due");
            }
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let name = sub.get_one::<String>("name").unwrap().trim().to_string();
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let day: u32 = *sub.get_one::<u32>("day").unwrap();
    let category = sub.get_one::<String>("category").map(|s| s.trim().to_string());
    let tags: Vec<String> = sub
        .get_many::<String>("tag")
        .map(|v| v.map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();
    conn.execute(
        "INSERT INTO subscriptions(name, amount, day_of_month, category, tags, last_processed)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
        params![name, amount.to_string(), day, category, tags_to_json(&tags)?],
    )?;
    println!("Subscription '{}' saved ({} on day {})", name, fmt_money(&amount), day);
    Ok(())
}

pub fn load_subscriptions(conn: &Connection) -> Result<Vec<Subscription>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, amount, day_of_month, category, tags, last_processed
         FROM subscriptions ORDER BY day_of_month, name",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, u32>(3)?,
            r.get::<_, Option<String>>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, Option<String>>(6)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, name, amount, day_of_month, category, tags, last_processed) = row?;
        out.push(Subscription {
            id,
            name,
            amount: parse_decimal(&amount)
                .with_context(|| format!("Invalid amount on subscription {}", id))?,
            day_of_month,
            category,
            tags: tags_from_json(&tags),
            last_processed: last_processed.as_deref().map(parse_date).transpose()?,
        });
    }
    Ok(out)
}

/// Materialize a transaction for every subscription whose day has arrived
/// this month and that has not yet posted this month. Idempotent per
/// calendar month: re-running after a successful post is a no-op.
pub fn process_due(conn: &mut Connection, today: NaiveDate) -> Result<usize> {
    let subs = load_subscriptions(conn)?;
    if subs.is_empty() {
        return Ok(0);
    }
    let month = month_key(today);
    // Day 29-31 subscriptions post on the last day of shorter months.
    let last_day = month_end(&month)?.day();

    let tx = conn.transaction()?;
    budgets::lock_month(&tx, &month)?;

    let mut posted = 0usize;
    for s in subs {
        if today.day() < s.day_of_month.min(last_day) {
            continue;
        }
        let done_this_month = s
            .last_processed
            .map(|d| d.year() == today.year() && d.month() == today.month())
            .unwrap_or(false);
        if done_this_month {
            continue;
        }
        let tx_date = NaiveDate::from_ymd_opt(
            today.year(),
            today.month(),
            s.day_of_month.min(last_day),
        )
        .with_context(|| format!("Invalid posting date for subscription {}", s.id))?;

        let tags = if s.tags.is_empty() { vec!["subscription".to_string()] } else { s.tags.clone() };
        tx.execute(
            "INSERT INTO transactions(date, description, amount, type, category, account_id, tags, is_recurring)
             VALUES (?1, ?2, ?3, 'expense', ?4, NULL, ?5, 1)",
            params![
                tx_date.to_string(),
                s.name,
                s.amount.to_string(),
                s.category,
                tags_to_json(&tags)?,
            ],
        )?;
        tx.execute(
            "UPDATE subscriptions SET last_processed=?1 WHERE id=?2",
            params![tx_date.to_string(), s.id],
        )?;
        posted += 1;
    }

    tx.commit()?;
    Ok(posted)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let data = load_subscriptions(conn)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|s| {
                vec![
                    s.id.to_string(),
                    s.name.clone(),
                    fmt_money(&s.amount),
                    s.day_of_month.to_string(),
                    s.category.clone().unwrap_or_default(),
                    s.tags.join(","),
                    s.last_processed.map(|d| d.to_string()).unwrap_or_default(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Name", "Amount", "Day", "Category", "Tags", "Last Processed"],
                rows
            )
        );
    }
    Ok(())
}
