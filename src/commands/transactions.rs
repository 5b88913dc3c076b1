// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::ledger::splits::{self, SplitInput};
use crate::ledger::{delta, LedgerError};
use crate::models::{Split, SplitStatus, Transaction, TxType};
use crate::utils::{
    self, account_by_id, account_by_name, maybe_print_json, parse_date, parse_decimal,
    pretty_table, tags_from_json, tags_to_json,
};

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub r#type: TxType,
    pub category: Option<String>,
    pub account_id: Option<i64>,
    pub tags: Vec<String>,
    pub is_recurring: bool,
    pub splits: Vec<SplitInput>,
}

impl NewTransaction {
    fn validate(&self) -> Result<()> {
        if self.amount < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount.into());
        }
        if !self.splits.is_empty() {
            splits::validate_split_total(self.amount, &self.splits)?;
        }
        Ok(())
    }
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add_cmd(conn, sub)?,
        Some(("edit", sub)) => edit_cmd(conn, sub)?,
        Some(("rm", sub)) => rm_cmd(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

/// Insert the transaction row and its splits. Balance handling is the
/// caller's job; this only records.
pub(crate) fn insert_rows(conn: &Connection, t: &NewTransaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions(date, description, amount, type, category, account_id, tags, is_recurring)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            t.date.to_string(),
            t.description,
            t.amount.to_string(),
            t.r#type.as_str(),
            t.category,
            t.account_id,
            tags_to_json(&t.tags)?,
            t.is_recurring as i64,
        ],
    )?;
    let tx_id = conn.last_insert_rowid();
    insert_splits(conn, tx_id, &t.splits)?;
    Ok(tx_id)
}

fn insert_splits(conn: &Connection, tx_id: i64, rows: &[SplitInput]) -> Result<()> {
    for (position, s) in rows.iter().enumerate() {
        conn.execute(
            "INSERT INTO splits(transaction_id, position, amount, category, type, target, note, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                tx_id,
                position as i64,
                s.amount.to_string(),
                s.category,
                s.r#type.as_str(),
                splits::normalized_target(&s.category, s.target.as_deref()),
                s.note,
                splits::initial_status(&s.category).map(|st| st.as_str()),
            ],
        )?;
    }
    Ok(())
}

pub(crate) fn write_balance(conn: &Connection, account_id: i64, balance: Decimal) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET balance=?1 WHERE id=?2",
        params![balance.to_string(), account_id],
    )?;
    Ok(())
}

/// Record a transaction, applying its balance effect to the linked account
/// in the same write set. A `--recurring` creation also registers the
/// subscription, with last_processed pinned to this date so only strictly
/// future months auto-post.
pub fn add(conn: &mut Connection, mut t: NewTransaction) -> Result<i64> {
    t.validate()?;
    if t.is_recurring && !t.tags.iter().any(|tag| tag == "subscription") {
        t.tags.push("subscription".to_string());
    }

    let tx = conn.transaction()?;
    let tx_id = insert_rows(&tx, &t)?;

    if let Some(acc_id) = t.account_id {
        if let Some(acc) = account_by_id(&tx, acc_id)? {
            let new_balance = delta::apply(acc.balance, t.amount, t.r#type, acc.r#type);
            write_balance(&tx, acc_id, new_balance)?;
        }
    }

    if t.is_recurring {
        tx.execute(
            "INSERT INTO subscriptions(name, amount, day_of_month, category, tags, last_processed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                t.description,
                t.amount.to_string(),
                t.date.day(),
                t.category,
                tags_to_json(&t.tags)?,
                t.date.to_string(),
            ],
        )?;
    }

    tx.commit()?;
    Ok(tx_id)
}

/// Replace a transaction, reverting its old balance effect and applying the
/// new one. When the account is unchanged the two deltas are netted against
/// one read of the stored balance; applying them as two independent writes
/// against the same stale value would lose the first one.
pub fn update(conn: &mut Connection, id: i64, t: NewTransaction) -> Result<()> {
    t.validate()?;
    let old = get(conn, id)?;

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM splits WHERE transaction_id=?1", params![id])?;
    tx.execute(
        "UPDATE transactions SET date=?1, description=?2, amount=?3, type=?4, category=?5,
         account_id=?6, tags=?7, is_recurring=?8 WHERE id=?9",
        params![
            t.date.to_string(),
            t.description,
            t.amount.to_string(),
            t.r#type.as_str(),
            t.category,
            t.account_id,
            tags_to_json(&t.tags)?,
            t.is_recurring as i64,
            id,
        ],
    )?;
    insert_splits(&tx, id, &t.splits)?;

    match (old.account_id, t.account_id) {
        (Some(old_id), Some(new_id)) if old_id == new_id => {
            if let Some(acc) = account_by_id(&tx, old_id)? {
                let net = delta::edit_net_delta(
                    Some((old.amount, old.r#type)),
                    Some((t.amount, t.r#type)),
                    acc.r#type,
                );
                write_balance(&tx, old_id, acc.balance + net)?;
            }
        }
        (old_id, new_id) => {
            if let Some(old_id) = old_id {
                if let Some(acc) = account_by_id(&tx, old_id)? {
                    let reverted = delta::revert(acc.balance, old.amount, old.r#type, acc.r#type);
                    write_balance(&tx, old_id, reverted)?;
                }
            }
            if let Some(new_id) = new_id {
                if let Some(acc) = account_by_id(&tx, new_id)? {
                    let applied = delta::apply(acc.balance, t.amount, t.r#type, acc.r#type);
                    write_balance(&tx, new_id, applied)?;
                }
            }
        }
    }

    tx.commit()?;
    Ok(())
}

/// Delete a transaction, reverting its balance effect. Splits cascade.
pub fn remove(conn: &mut Connection, id: i64) -> Result<()> {
    let old = get(conn, id)?;

    let tx = conn.transaction()?;
    if let Some(acc_id) = old.account_id {
        if let Some(acc) = account_by_id(&tx, acc_id)? {
            let reverted = delta::revert(acc.balance, old.amount, old.r#type, acc.r#type);
            write_balance(&tx, acc_id, reverted)?;
        }
    }
    tx.execute("DELETE FROM transactions WHERE id=?1", params![id])?;
    tx.commit()?;
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Transaction> {
    let raw = conn
        .query_row(
            "SELECT id, date, description, amount, type, category, account_id, tags, is_recurring
             FROM transactions WHERE id=?1",
            params![id],
            raw_from_row,
        )
        .optional()?
        .ok_or_else(|| anyhow!("Transaction {} not found", id))?;
    tx_from_raw(raw)
}

type RawTx = (i64, String, String, String, String, Option<String>, Option<i64>, String, i64);

fn raw_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawTx> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
        r.get(8)?,
    ))
}

fn tx_from_raw(raw: RawTx) -> Result<Transaction> {
    let (id, date, description, amount, typ, category, account_id, tags, is_recurring) = raw;
    Ok(Transaction {
        id,
        date: parse_date(&date)?,
        description,
        amount: parse_decimal(&amount)
            .with_context(|| format!("Invalid amount stored on transaction {}", id))?,
        r#type: TxType::parse(&typ)?,
        category,
        account_id,
        tags: tags_from_json(&tags),
        is_recurring: is_recurring != 0,
    })
}

pub fn splits_for(conn: &Connection, tx_id: i64) -> Result<Vec<Split>> {
    let mut stmt = conn.prepare(
        "SELECT id, transaction_id, position, amount, category, type, target, note, status
         FROM splits WHERE transaction_id=?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![tx_id], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, i64>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, Option<String>>(6)?,
            r.get::<_, Option<String>>(7)?,
            r.get::<_, Option<String>>(8)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, transaction_id, position, amount, category, typ, target, note, status) = row?;
        out.push(Split {
            id,
            transaction_id,
            position,
            amount: parse_decimal(&amount)?,
            category,
            r#type: TxType::parse(&typ)?,
            target,
            note,
            status: status.as_deref().map(SplitStatus::parse).transpose()?,
        });
    }
    Ok(out)
}

#[derive(Debug, Default, Clone)]
pub struct TxFilter {
    pub month: Option<String>,
    pub account: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

pub fn load_filtered(conn: &Connection, f: &TxFilter) -> Result<Vec<Transaction>> {
    let mut sql = String::from(
        "SELECT t.id, t.date, t.description, t.amount, t.type, t.category, t.account_id, t.tags, t.is_recurring
         FROM transactions t LEFT JOIN accounts a ON t.account_id=a.id WHERE 1=1",
    );
    let mut params_vec: Vec<String> = Vec::new();

    if let Some(month) = &f.month {
        sql.push_str(" AND substr(t.date,1,7)=?");
        params_vec.push(month.clone());
    }
    if let Some(acct) = &f.account {
        sql.push_str(" AND lower(a.name)=lower(?)");
        params_vec.push(acct.clone());
    }
    if let Some(cat) = &f.category {
        sql.push_str(" AND t.category=?");
        params_vec.push(cat.clone());
    }
    if let Some(tag) = &f.tag {
        sql.push_str(" AND t.tags LIKE ?");
        params_vec.push(format!("%\"{}\"%", tag));
    }
    if let Some(term) = &f.search {
        sql.push_str(" AND lower(t.description) LIKE ?");
        params_vec.push(format!("%{}%", term.to_lowercase()));
    }
    sql.push_str(" ORDER BY t.date DESC, t.id DESC");
    if let Some(limit) = f.limit {
        sql.push_str(" LIMIT ?");
        params_vec.push(limit.to_string());
    }

    let mut stmt = conn.prepare(&sql)?;
    let refs: Vec<&dyn rusqlite::ToSql> =
        params_vec.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
    let rows = stmt.query_map(rusqlite::params_from_iter(refs), raw_from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(tx_from_raw(row?)?);
    }
    Ok(out)
}

#[derive(Debug, Serialize, Default)]
pub struct Totals {
    pub income: Decimal,
    pub expense: Decimal,
    pub repayments: Decimal,
    pub savings: Decimal,
    pub savings_rate: Option<Decimal>,
}

/// Aggregate income/expense over a transaction set. Split transactions count
/// by split category with debt splits excluded; repayments move money but
/// belong to neither total.
pub fn compute_totals(rows: &[(Transaction, Vec<Split>)]) -> Totals {
    let mut t = Totals::default();
    for (tx, tx_splits) in rows {
        match tx.r#type {
            TxType::Income => t.income += tx.amount,
            TxType::Repayment => t.repayments += tx.amount,
            TxType::Expense => {
                if tx_splits.is_empty() {
                    t.expense += tx.amount;
                    if tx.category.as_deref() == Some("savings") {
                        t.savings += tx.amount;
                    }
                } else {
                    for s in tx_splits {
                        if splits::is_debt_category(&s.category) {
                            continue;
                        }
                        t.expense += s.amount;
                        if s.category == "savings" {
                            t.savings += s.amount;
                        }
                    }
                }
            }
        }
    }
    if t.income > Decimal::ZERO {
        let non_savings = t.expense - t.savings;
        t.savings_rate = Some((t.income - non_savings) / t.income * Decimal::new(100, 0));
    }
    t
}

/// Expense totals per category for one month, split-aware: splits count under
/// their own category, debt splits are excluded.
pub fn spent_by_category(
    conn: &Connection,
    month: &str,
) -> Result<std::collections::BTreeMap<String, Decimal>> {
    let filter = TxFilter { month: Some(month.to_string()), ..Default::default() };
    let mut out = std::collections::BTreeMap::new();
    for tx in load_filtered(conn, &filter)? {
        if tx.r#type != TxType::Expense {
            continue;
        }
        let tx_splits = splits_for(conn, tx.id)?;
        if tx_splits.is_empty() {
            let cat = tx.category.clone().unwrap_or_else(|| "misc".to_string());
            *out.entry(cat).or_insert(Decimal::ZERO) += tx.amount;
        } else {
            for s in tx_splits {
                if splits::is_debt_category(&s.category) {
                    continue;
                }
                *out.entry(s.category).or_insert(Decimal::ZERO) += s.amount;
            }
        }
    }
    Ok(out)
}

fn parse_split_spec(spec: &str) -> Result<SplitInput> {
    let parts: Vec<&str> = spec.splitn(4, ':').collect();
    if parts.len() < 2 {
        return Err(anyhow!(
            "Invalid split '{}', expected amount:category[:target[:note]]",
            spec
        ));
    }
    Ok(SplitInput {
        amount: parse_decimal(parts[0])?,
        category: parts[1].trim().to_string(),
        r#type: TxType::Expense,
        target: parts.get(2).map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        note: parts.get(3).map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
    })
}

fn new_from_args(conn: &Connection, sub: &clap::ArgMatches) -> Result<NewTransaction> {
    let date = match sub.get_one::<String>("date") {
        Some(d) => parse_date(d)?,
        None => utils::today(),
    };
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let description = sub.get_one::<String>("description").unwrap().clone();
    let r#type = match sub.get_one::<String>("type") {
        Some(t) => TxType::parse(t)?,
        None => TxType::Expense,
    };
    let category = sub.get_one::<String>("category").map(|s| s.trim().to_string());
    let account_id = match sub.get_one::<String>("account") {
        Some(name) => Some(account_by_name(conn, name)?.id),
        None => None,
    };
    let tags: Vec<String> = sub
        .get_many::<String>("tag")
        .map(|v| v.map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();
    let tx_splits: Vec<SplitInput> = match sub.get_many::<String>("split") {
        Some(specs) => specs.map(|s| parse_split_spec(s)).collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    Ok(NewTransaction {
        date,
        description,
        amount,
        r#type,
        category,
        account_id,
        tags,
        is_recurring: sub.get_flag("recurring"),
        splits: tx_splits,
    })
}

fn add_cmd(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let t = new_from_args(conn, sub)?;
    let desc = t.description.clone();
    let amount = t.amount;
    let recurring = t.is_recurring;
    let id = add(conn, t)?;
    println!(
        "Recorded '{}' for {} (tx {}){}",
        desc,
        amount,
        id,
        if recurring { " & subscription created" } else { "" }
    );
    Ok(())
}

fn edit_cmd(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id: i64 = *sub.get_one::<i64>("id").unwrap();
    let old = get(conn, id)?;
    let old_splits = splits_for(conn, id)?;

    let date = match sub.get_one::<String>("date") {
        Some(d) => parse_date(d)?,
        None => old.date,
    };
    let amount = match sub.get_one::<String>("amount") {
        Some(a) => parse_decimal(a)?,
        None => old.amount,
    };
    let description = sub
        .get_one::<String>("description")
        .cloned()
        .unwrap_or_else(|| old.description.clone());
    let r#type = match sub.get_one::<String>("type") {
        Some(t) => TxType::parse(t)?,
        None => old.r#type,
    };
    let category = sub
        .get_one::<String>("category")
        .map(|s| s.trim().to_string())
        .or_else(|| old.category.clone());
    let account_id = if sub.get_flag("detach-account") {
        None
    } else {
        match sub.get_one::<String>("account") {
            Some(name) => Some(account_by_name(conn, name)?.id),
            None => old.account_id,
        }
    };
    let tags: Vec<String> = match sub.get_many::<String>("tag") {
        Some(v) => v.map(|s| s.trim().to_string()).collect(),
        None => old.tags.clone(),
    };
    let new_splits: Vec<SplitInput> = if sub.get_flag("clear-splits") {
        Vec::new()
    } else {
        match sub.get_many::<String>("split") {
            Some(specs) => specs.map(|s| parse_split_spec(s)).collect::<Result<Vec<_>>>()?,
            None => old_splits
                .iter()
                .map(|s| SplitInput {
                    amount: s.amount,
                    category: s.category.clone(),
                    r#type: s.r#type,
                    target: s.target.clone(),
                    note: s.note.clone(),
                })
                .collect(),
        }
    };

    update(
        conn,
        id,
        NewTransaction {
            date,
            description,
            amount,
            r#type,
            category,
            account_id,
            tags,
            is_recurring: old.is_recurring,
            splits: new_splits,
        },
    )?;
    println!("Transaction {} updated", id);
    Ok(())
}

fn rm_cmd(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id: i64 = *sub.get_one::<i64>("id").unwrap();
    remove(conn, id)?;
    println!("Transaction {} deleted", id);
    Ok(())
}

#[derive(Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub date: String,
    pub description: String,
    pub r#type: String,
    pub category: String,
    pub amount: String,
    pub account: String,
    pub tags: String,
    pub splits: usize,
}

pub fn query_rows(conn: &Connection, f: &TxFilter) -> Result<Vec<TransactionRow>> {
    let mut out = Vec::new();
    for tx in load_filtered(conn, f)? {
        let account = match tx.account_id {
            Some(id) => account_by_id(conn, id)?.map(|a| a.name).unwrap_or_default(),
            None => String::new(),
        };
        let split_count = splits_for(conn, tx.id)?.len();
        out.push(TransactionRow {
            id: tx.id,
            date: tx.date.to_string(),
            description: tx.description,
            r#type: tx.r#type.as_str().to_string(),
            category: tx.category.unwrap_or_default(),
            amount: utils::fmt_money(&tx.amount),
            account,
            tags: tx.tags.join(","),
            splits: split_count,
        });
    }
    Ok(out)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let f = TxFilter {
        month: sub.get_one::<String>("month").cloned(),
        account: sub.get_one::<String>("account").cloned(),
        category: sub.get_one::<String>("category").cloned(),
        tag: sub.get_one::<String>("tag").cloned(),
        search: sub.get_one::<String>("search").cloned(),
        limit: sub.get_one::<usize>("limit").copied(),
    };
    let data = query_rows(conn, &f)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.date.clone(),
                    r.description.clone(),
                    r.r#type.clone(),
                    r.category.clone(),
                    r.amount.clone(),
                    r.account.clone(),
                    r.tags.clone(),
                    if r.splits > 0 { r.splits.to_string() } else { String::new() },
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Id", "Date", "Description", "Type", "Category", "Amount", "Account", "Tags", "Splits"],
                rows,
            )
        );
    }

    if sub.get_flag("totals") {
        let mut with_splits = Vec::new();
        for tx in load_filtered(conn, &f)? {
            let s = splits_for(conn, tx.id)?;
            with_splits.push((tx, s));
        }
        let totals = compute_totals(&with_splits);
        if !maybe_print_json(json_flag, jsonl_flag, &totals)? {
            let rate = totals
                .savings_rate
                .map(|r| format!("{:.1}%", r))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{}",
                pretty_table(
                    &["Income", "Expense", "Repayments", "Savings", "Savings Rate"],
                    vec![vec![
                        utils::fmt_money(&totals.income),
                        utils::fmt_money(&totals.expense),
                        utils::fmt_money(&totals.repayments),
                        utils::fmt_money(&totals.savings),
                        rate,
                    ]],
                )
            );
        }
    }
    Ok(())
}
