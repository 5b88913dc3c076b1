// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

use crate::commands::accounts::DEFAULT_ACCOUNT_SETTING;
use crate::commands::{budgets, history, transactions};
use crate::ledger::splits::{self, SplitInput};
use crate::ledger::{delta, LedgerError};
use crate::models::{Account, AccountType, TxType};
use crate::scribe::{self, ScribeAction};
use crate::utils::{
    self, all_accounts, all_categories, http_client, month_key, norm, pretty_table, slugify,
};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("ask", sub)) => ask(conn, sub)?,
        Some(("drain", _)) => drain(conn)?,
        Some(("queue", _)) => queue(conn)?,
        Some(("set-key", sub)) => {
            let key = sub.get_one::<String>("key").unwrap();
            utils::set_setting(conn, scribe::API_KEY_SETTING, key.trim())?;
            // A new key may unlock different models; rediscover next call.
            utils::set_setting(conn, scribe::MODEL_SETTING, "")?;
            println!("Scribe key saved");
        }
        Some(("test", _)) => test(conn)?,
        _ => {}
    }
    Ok(())
}

fn run_request(conn: &mut Connection, text: &str) -> Result<usize> {
    let key = scribe::api_key(conn)?;
    let client = http_client()?;
    let model = scribe::resolve_model(conn, &client, &key)?;

    let today = utils::today();
    let categories = all_categories(conn)?;
    let accounts = all_accounts(conn)?;
    let default_account = utils::get_setting(conn, DEFAULT_ACCOUNT_SETTING)?;
    let prompt = scribe::build_prompt(today, &categories, &accounts, default_account.as_deref())?;

    let raw = scribe::generate(&client, &key, &model, &format!("{}\nUser Input: {}", prompt, text))?;
    let actions = scribe::parse_actions(&raw)?;
    apply_actions(conn, &actions, today)
}

fn ask(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let text = sub.get_one::<String>("text").unwrap().trim().to_string();
    if text.is_empty() {
        return Err(anyhow!("Nothing to transcribe"));
    }
    if sub.get_flag("queue") {
        scribe::enqueue(conn, &text)?;
        println!("Offline: request queued");
        return Ok(());
    }
    let count = run_request(conn, &text).with_context(|| {
        format!(
            "The Scribe was unable to process your request. \
             Your input is preserved; retry or queue it with: chronicle scribe ask --queue \"{}\"",
            text
        )
    })?;
    println!("Scribe wrote {} entries.", count);
    Ok(())
}

/// Replay queued requests in order. Each item is removed only after its
/// request succeeds, so an interrupted drain resumes exactly where it
/// stopped. Delivery is at-least-once; duplicates are not deduplicated.
fn drain(conn: &mut Connection) -> Result<()> {
    let mut processed = 0usize;
    while let Some((id, text)) = scribe::peek_front(conn)? {
        run_request(conn, &text)
            .with_context(|| format!("Queue item {} failed; it remains queued", id))?;
        scribe::remove(conn, id)?;
        processed += 1;
    }
    if processed > 0 {
        println!("Offline queue processed ({} request(s))", processed);
    } else {
        println!("Queue is empty");
    }
    Ok(())
}

fn queue(conn: &Connection) -> Result<()> {
    let items = scribe::pending(conn)?;
    if items.is_empty() {
        println!("Queue is empty");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = items
        .into_iter()
        .map(|(id, text, created_at)| vec![id.to_string(), created_at, text])
        .collect();
    println!("{}", pretty_table(&["Id", "Queued At", "Text"], rows));
    Ok(())
}

fn test(conn: &Connection) -> Result<()> {
    let key = scribe::api_key(conn)?;
    let client = http_client()?;
    let models = scribe::list_generate_models(&client, &key)
        .context("Model listing failed; check the key and that the API is enabled")?;
    if models.is_empty() {
        return Err(anyhow!("No models support content generation for this key"));
    }
    let best = models
        .iter()
        .find(|m| m.contains("flash"))
        .unwrap_or(&models[0]);
    utils::set_setting(conn, scribe::MODEL_SETTING, best)?;
    println!("Found {} model(s); using '{}'", models.len(), best);
    Ok(())
}

/// Apply a parsed action batch as one write set. Balances staged by earlier
/// actions are tracked in an overlay so later actions in the same batch see
/// them; reading back the stored row mid-batch would hand out stale values.
pub fn apply_actions(
    conn: &mut Connection,
    actions: &[ScribeAction],
    today: NaiveDate,
) -> Result<usize> {
    let tx = conn.transaction()?;

    let mut overlay: BTreeMap<i64, Account> = BTreeMap::new();
    for a in all_accounts(&tx)? {
        overlay.insert(a.id, a);
    }
    let initial: BTreeMap<i64, Decimal> =
        overlay.iter().map(|(id, a)| (*id, a.balance)).collect();

    let mut months_to_lock: BTreeSet<String> = BTreeSet::new();
    let mut count = 0usize;

    for action in actions {
        match action {
            ScribeAction::Transaction {
                description,
                amount,
                r#type,
                category,
                date,
                tags,
                is_recurring,
                account,
            } => {
                if *amount < Decimal::ZERO {
                    return Err(LedgerError::NegativeAmount.into());
                }
                let date = scribe::parse_flex_date(date.as_deref(), today);
                months_to_lock.insert(month_key(date));
                let account_id = match account.as_deref().filter(|a| !a.trim().is_empty()) {
                    Some(name) => Some(find_account(&overlay, name)?.id),
                    None => None,
                };
                let r#type = r#type.unwrap_or(TxType::Expense);
                transactions::insert_rows(
                    &tx,
                    &transactions::NewTransaction {
                        date,
                        description: description
                            .clone()
                            .unwrap_or_else(|| "Imported Transaction".to_string()),
                        amount: *amount,
                        r#type,
                        category: Some(
                            category.clone().unwrap_or_else(|| "misc".to_string()),
                        ),
                        account_id,
                        tags: tags.clone(),
                        is_recurring: *is_recurring,
                        splits: Vec::new(),
                    },
                )?;
                if let Some(id) = account_id {
                    if let Some(acc) = overlay.get_mut(&id) {
                        acc.balance = delta::apply(acc.balance, *amount, r#type, acc.r#type);
                    }
                }
                count += 1;
            }
            ScribeAction::AddAccount { name, r#type, subtype, balance } => {
                let balance = balance.unwrap_or(Decimal::ZERO);
                let kind = r#type.unwrap_or(AccountType::Asset);
                tx.execute(
                    "INSERT INTO accounts(name, type, subtype, balance) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        name.trim(),
                        kind.as_str(),
                        subtype.clone().unwrap_or_else(|| "other".to_string()),
                        balance.to_string(),
                    ],
                )?;
                let id = tx.last_insert_rowid();
                overlay.insert(
                    id,
                    Account {
                        id,
                        name: name.trim().to_string(),
                        r#type: kind,
                        subtype: subtype.clone().unwrap_or_else(|| "other".to_string()),
                        balance,
                    },
                );
                count += 1;
            }
            ScribeAction::UpdateAccountBalance { name, balance } => {
                let id = find_account(&overlay, name)?.id;
                if let Some(acc) = overlay.get_mut(&id) {
                    acc.balance = *balance;
                }
                count += 1;
            }
            ScribeAction::AddSubscription { name, amount, day_of_month, category } => {
                tx.execute(
                    "INSERT INTO subscriptions(name, amount, day_of_month, category, tags, last_processed)
                     VALUES (?1, ?2, ?3, ?4, '[]', NULL)",
                    params![
                        name.trim(),
                        amount.to_string(),
                        day_of_month.unwrap_or(1).clamp(1, 31),
                        category.clone().unwrap_or_else(|| "misc".to_string()),
                    ],
                )?;
                count += 1;
            }
            ScribeAction::Transfer { from_account, to_account, amount, date, description } => {
                if *amount <= Decimal::ZERO {
                    return Err(LedgerError::NonPositiveTransfer.into());
                }
                let from = find_account(&overlay, from_account)?.clone();
                let to = find_account(&overlay, to_account)?.clone();
                if from.id == to.id {
                    return Err(LedgerError::SameAccountTransfer.into());
                }
                let date = scribe::parse_flex_date(date.as_deref(), today);
                let (from_delta, to_delta) =
                    delta::transfer_deltas(from.r#type, to.r#type, *amount);
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
                        description.clone().unwrap_or_else(|| "Transfer".to_string()),
                    ],
                )?;
                if let Some(acc) = overlay.get_mut(&from.id) {
                    acc.balance += from_delta;
                }
                if let Some(acc) = overlay.get_mut(&to.id) {
                    acc.balance += to_delta;
                }
                count += 1;
            }
            ScribeAction::AddCategory { name, budget } => {
                tx.execute(
                    "INSERT OR REPLACE INTO categories(id, name, budget) VALUES (?1, ?2, ?3)",
                    params![
                        slugify(name),
                        name.trim(),
                        budget.unwrap_or(Decimal::ZERO).to_string(),
                    ],
                )?;
                count += 1;
            }
            ScribeAction::UpdateCategoryBudget { name, budget } => {
                let changed = tx.execute(
                    "UPDATE categories SET budget=?1 WHERE lower(name)=lower(?2) OR id=?3",
                    params![budget.to_string(), name.trim(), slugify(name)],
                )?;
                if changed == 0 {
                    return Err(anyhow!("Category '{}' not found", name));
                }
                count += 1;
            }
            ScribeAction::RecordHistoryPoint { date, balances } => {
                let date = scribe::parse_flex_date(date.as_deref(), today);
                let mut point: BTreeMap<i64, Decimal> = BTreeMap::new();
                let mut assets = Decimal::ZERO;
                let mut liabilities = Decimal::ZERO;
                for b in balances {
                    let acc = match find_account(&overlay, &b.name) {
                        Ok(acc) => acc,
                        Err(_) => continue,
                    };
                    point.insert(acc.id, b.balance);
                    match acc.r#type {
                        AccountType::Asset => assets += b.balance,
                        AccountType::Liability => liabilities += b.balance,
                    }
                }
                if !point.is_empty() {
                    tx.execute(
                        "INSERT INTO history(date, account_balances, total_assets, total_liabilities, net_worth)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            date.to_string(),
                            serde_json::to_string(&point)?,
                            assets.to_string(),
                            liabilities.to_string(),
                            (assets - liabilities).to_string(),
                        ],
                    )?;
                    count += 1;
                }
            }
            ScribeAction::AddPayable { target, amount, description } => {
                if *amount < Decimal::ZERO {
                    return Err(LedgerError::NegativeAmount.into());
                }
                let description = description
                    .clone()
                    .unwrap_or_else(|| format!("IOU to {}", target));
                months_to_lock.insert(month_key(today));
                transactions::insert_rows(
                    &tx,
                    &transactions::NewTransaction {
                        date: today,
                        description: description.clone(),
                        amount: *amount,
                        r#type: TxType::Expense,
                        category: Some("split".to_string()),
                        account_id: None,
                        tags: Vec::new(),
                        is_recurring: false,
                        splits: vec![SplitInput {
                            amount: *amount,
                            category: splits::PAYABLE.to_string(),
                            r#type: TxType::Expense,
                            target: Some(target.clone()),
                            note: Some(description),
                        }],
                    },
                )?;
                count += 1;
            }
        }
    }

    for month in &months_to_lock {
        budgets::lock_month(&tx, month)?;
    }

    let mut accounts_changed = false;
    for (id, acc) in &overlay {
        let changed = match initial.get(id) {
            Some(was) => *was != acc.balance,
            None => true,
        };
        if changed {
            accounts_changed = true;
            tx.execute(
                "UPDATE accounts SET balance=?1 WHERE id=?2",
                params![acc.balance.to_string(), id],
            )?;
        }
    }
    if accounts_changed {
        history::record_snapshot(&tx, today)?;
    }

    tx.commit()?;
    Ok(count)
}

fn find_account<'a>(overlay: &'a BTreeMap<i64, Account>, name: &str) -> Result<&'a Account> {
    overlay
        .values()
        .find(|a| norm(&a.name) == norm(name))
        .ok_or_else(|| anyhow!("Account '{}' not found", name))
}
