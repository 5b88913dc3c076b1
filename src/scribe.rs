// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Natural-language entry: free text goes to a hosted generative-language
//! API with an action catalog, and a JSON array of actions comes back.
//! Model output is never assumed to be clean JSON.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Account, AccountType, Category, TxType};
use crate::utils;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const FALLBACK_MODEL: &str = "gemini-2.5-flash";

pub const API_KEY_SETTING: &str = "gemini_api_key";
pub const MODEL_SETTING: &str = "gemini_model";
pub const API_KEY_ENV: &str = "CHRONICLE_GEMINI_KEY";

/// One structured action transcribed by the scribe. The `action` tag is
/// exhaustive: an unknown kind is a parse error, never a silent skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScribeAction {
    Transaction {
        description: Option<String>,
        amount: Decimal,
        r#type: Option<TxType>,
        category: Option<String>,
        date: Option<String>,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default, rename = "isRecurring")]
        is_recurring: bool,
        account: Option<String>,
    },
    AddAccount {
        name: String,
        r#type: Option<AccountType>,
        subtype: Option<String>,
        balance: Option<Decimal>,
    },
    UpdateAccountBalance {
        name: String,
        balance: Decimal,
    },
    AddSubscription {
        name: String,
        amount: Decimal,
        #[serde(rename = "dayOfMonth")]
        day_of_month: Option<u32>,
        category: Option<String>,
    },
    Transfer {
        #[serde(rename = "fromAccount")]
        from_account: String,
        #[serde(rename = "toAccount")]
        to_account: String,
        amount: Decimal,
        date: Option<String>,
        description: Option<String>,
    },
    AddCategory {
        name: String,
        budget: Option<Decimal>,
    },
    UpdateCategoryBudget {
        name: String,
        budget: Decimal,
    },
    RecordHistoryPoint {
        date: Option<String>,
        #[serde(default)]
        balances: Vec<ScribeBalance>,
    },
    AddPayable {
        target: String,
        amount: Decimal,
        description: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScribeBalance {
    pub name: String,
    pub balance: Decimal,
}

/// Parse a model response into actions: strip markdown code fences, parse as
/// JSON, and as a last resort extract the first bracketed array. A lone
/// object is promoted to a one-element array. Anything else is a recoverable
/// error carrying enough context to show the user.
pub fn parse_actions(raw: &str) -> Result<Vec<ScribeAction>> {
    let clean = raw.replace("```json", "").replace("```", "");
    let clean = clean.trim();

    let value: serde_json::Value = match serde_json::from_str(clean) {
        Ok(v) => v,
        Err(_) => {
            let re = Regex::new(r"\[[\s\S]*\]").context("Array pattern failed to compile")?;
            let m = re
                .find(clean)
                .ok_or_else(|| anyhow!("No valid JSON array found in scribe response"))?;
            serde_json::from_str(m.as_str())
                .context("Scribe response contained malformed JSON")?
        }
    };

    let items = match value {
        serde_json::Value::Array(items) => items,
        single => vec![single],
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<ScribeAction>(item.clone()).with_context(|| {
                let kind = item
                    .get("action")
                    .and_then(|a| a.as_str())
                    .unwrap_or("<missing>");
                format!("Unsupported or malformed scribe action '{}'", kind)
            })
        })
        .collect()
}

/// Dates from the model arrive as full ISO timestamps or bare days; take the
/// date part and fall back to today.
pub fn parse_flex_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    raw.and_then(|s| {
        let day = s.trim();
        let day = day.get(..10).unwrap_or(day);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    })
    .unwrap_or(today)
}

pub fn build_prompt(
    today: NaiveDate,
    categories: &[Category],
    accounts: &[Account],
    default_account: Option<&str>,
) -> Result<String> {
    let category_list: Vec<serde_json::Value> = categories
        .iter()
        .map(|c| serde_json::json!({ "id": c.id, "name": c.name }))
        .collect();
    let account_list: Vec<serde_json::Value> = accounts
        .iter()
        .map(|a| serde_json::json!({ "name": a.name, "type": a.r#type.as_str() }))
        .collect();
    let default_account = default_account.unwrap_or("none");

    Ok(format!(
        r#"You are "The Royal Scribe" of Chronicle, a personal finance assistant.
Your role is to listen to the user's financial tales and transcribe them into structured records.

Current Context:
- Today's Date: {today}
- Existing Categories: {categories}
- Existing Accounts: {accounts}
- Default Account: {default_account}

You must output a raw JSON array (and ONLY a JSON array, no markdown formatting) compatible with the app's importer.

Supported Actions & Schemas:
1. Transaction: {{ "action": "transaction", "description": "string", "amount": number, "type": "income"|"expense", "category": "category_id", "date": "YYYY-MM-DD", "tags": ["tag1"], "isRecurring": boolean, "account": "account_name" }}
2. Add Account: {{ "action": "add_account", "name": "string", "type": "asset"|"liability", "subtype": "checking"|"savings"|"investment"|"other", "balance": number }}
3. Update Balance: {{ "action": "update_account_balance", "name": "Exact Account Name", "balance": number }}
4. Add Subscription: {{ "action": "add_subscription", "name": "string", "amount": number, "dayOfMonth": number, "category": "category_id" }}
5. Transfer: {{ "action": "transfer", "fromAccount": "account_name", "toAccount": "account_name", "amount": number, "date": "YYYY-MM-DD" }}
6. Add Category: {{ "action": "add_category", "name": "string", "budget": number }}
7. Update Category Budget: {{ "action": "update_category_budget", "name": "category_name", "budget": number }}
8. Record History: {{ "action": "record_history_point", "date": "YYYY-MM-DD", "balances": [{{ "name": "account_name", "balance": number }}] }}
9. Add Payable (Debt/IOU): {{ "action": "add_payable", "target": "person_name", "amount": number, "description": "reason" }}

Rules:
- Infer the best category ID from the list provided. If unknown, use 'misc'.
- Infer dates from "yesterday", "last friday", etc., relative to today.
- If the user mentions a new account, use "add_account".
- If the user implies spending money, use "transaction" with type "expense".
- If the user earned money, use "transaction" with type "income".
- If the user says "transfer", use "transfer".
- If the user says "I owe [Person]", use "add_payable".
- If the user specifies an account (e.g. "from Savings"), use that account's name in "account".
- If NO account is specified, use the Default Account: '{default_account}'. If that is none, leave "account" null.

CRITICAL INSTRUCTION:
- You MUST accurately and consistently tag transactions. Tags are crucial for the user's organization.
- Infer tags based on the description and category (e.g., "groceries" -> ["food", "groceries"], "netflix" -> ["subscription", "entertainment"]).
- Always include at least one relevant tag if possible.
"#,
        today = today,
        categories = serde_json::to_string(&category_list)?,
        accounts = serde_json::to_string(&account_list)?,
        default_account = default_account,
    ))
}

pub fn api_key(conn: &Connection) -> Result<String> {
    if let Some(key) = utils::get_setting(conn, API_KEY_SETTING)? {
        if !key.trim().is_empty() {
            return Ok(key.trim().to_string());
        }
    }
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(anyhow!(
            "No scribe API key configured; run 'chronicle scribe set-key' or set {}",
            API_KEY_ENV
        )),
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
    #[serde(default, rename = "supportedGenerationMethods")]
    supported_generation_methods: Vec<String>,
}

/// Discover usable models for this key and pick a flash-tier one.
pub fn list_generate_models(
    client: &reqwest::blocking::Client,
    key: &str,
) -> Result<Vec<String>> {
    let url = format!("{}/models?key={}", API_BASE, key);
    let resp = client.get(url).send()?.error_for_status()?;
    let list: ModelList = resp.json()?;
    Ok(list
        .models
        .into_iter()
        .filter(|m| {
            m.supported_generation_methods
                .iter()
                .any(|g| g == "generateContent")
        })
        .map(|m| m.name.trim_start_matches("models/").to_string())
        .collect())
}

/// Working model: the cached choice, else the first flash-capable model from
/// the listing (cached for next time), else the fallback.
pub fn resolve_model(
    conn: &Connection,
    client: &reqwest::blocking::Client,
    key: &str,
) -> Result<String> {
    if let Some(saved) = utils::get_setting(conn, MODEL_SETTING)? {
        if !saved.trim().is_empty() {
            return Ok(saved);
        }
    }
    match list_generate_models(client, key) {
        Ok(models) => {
            let best = models
                .iter()
                .find(|m| m.contains("flash"))
                .or_else(|| models.first())
                .cloned();
            if let Some(best) = best {
                utils::set_setting(conn, MODEL_SETTING, &best)?;
                return Ok(best);
            }
            Ok(FALLBACK_MODEL.to_string())
        }
        Err(_) => Ok(FALLBACK_MODEL.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

pub fn generate(
    client: &reqwest::blocking::Client,
    key: &str,
    model: &str,
    prompt: &str,
) -> Result<String> {
    let url = format!("{}/models/{}:generateContent?key={}", API_BASE, model, key);
    let body = serde_json::json!({
        "contents": [ { "parts": [ { "text": prompt } ] } ]
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .context("Scribe request failed")?
        .error_for_status()
        .context("Scribe request rejected")?;
    let parsed: GenerateResponse = resp.json().context("Scribe response was not JSON")?;
    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or_else(|| anyhow!("Scribe response contained no candidates"))?;
    Ok(text)
}

// Offline queue: durable FIFO, popped from the front, removed only after a
// successful replay. At-least-once; duplicates are possible and accepted.

pub fn enqueue(conn: &Connection, text: &str) -> Result<i64> {
    conn.execute("INSERT INTO scribe_queue(text) VALUES (?1)", params![text])?;
    Ok(conn.last_insert_rowid())
}

pub fn peek_front(conn: &Connection) -> Result<Option<(i64, String)>> {
    let row = conn
        .query_row(
            "SELECT id, text FROM scribe_queue ORDER BY id ASC LIMIT 1",
            [],
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)),
        )
        .optional()?;
    Ok(row)
}

pub fn remove(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM scribe_queue WHERE id=?1", params![id])?;
    Ok(())
}

pub fn pending(conn: &Connection) -> Result<Vec<(i64, String, String)>> {
    let mut stmt =
        conn.prepare("SELECT id, text, created_at FROM scribe_queue ORDER BY id ASC")?;
    let rows = stmt.query_map([], |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
