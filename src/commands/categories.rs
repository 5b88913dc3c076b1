// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};

use crate::utils::{maybe_print_json, parse_decimal, pretty_table, slugify};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap().trim().to_string();
            if name.is_empty() {
                return Err(anyhow!("Category name must not be empty"));
            }
            let budget = match sub.get_one::<String>("budget") {
                Some(b) => parse_decimal(b)?,
                None => rust_decimal::Decimal::ZERO,
            };
            let id = slugify(&name);
            conn.execute(
                "INSERT INTO categories(id, name, budget) VALUES (?1, ?2, ?3)",
                params![id, name, budget.to_string()],
            )?;
            println!("Added category '{}' ({})", name, id);
        }
        Some(("list", sub)) => {
            let json_flag = sub.get_flag("json");
            let jsonl_flag = sub.get_flag("jsonl");
            let mut stmt =
                conn.prepare("SELECT id, name, budget FROM categories ORDER BY name")?;
            let rows = stmt.query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?;
            let mut data = Vec::new();
            for row in rows {
                let (id, name, budget) = row?;
                data.push(vec![id, name, budget]);
            }
            if !maybe_print_json(json_flag, jsonl_flag, &data)? {
                println!("{}", pretty_table(&["Id", "Name", "Default Budget"], data));
            }
        }
        Some(("rename", sub)) => {
            let id = sub.get_one::<String>("id").unwrap();
            let name = sub.get_one::<String>("name").unwrap().trim().to_string();
            if name.is_empty() {
                return Err(anyhow!("Category name must not be empty"));
            }
            let changed =
                conn.execute("UPDATE categories SET name=?1 WHERE id=?2", params![name, id])?;
            if changed == 0 {
                return Err(anyhow!("Category '{}' not found", id));
            }
            println!("Category '{}' renamed to '{}'", id, name);
        }
        Some(("rm", sub)) => {
            let id = sub.get_one::<String>("id").unwrap();
            let changed = conn.execute("DELETE FROM categories WHERE id=?1", params![id])?;
            if changed == 0 {
                return Err(anyhow!("Category '{}' not found", id));
            }
            println!("Category '{}' deleted", id);
        }
        _ => {}
    }
    Ok(())
}
