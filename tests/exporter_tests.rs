// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::Connection;

use chronicle::cli;
use chronicle::commands::exporter;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    chronicle::db::init_schema(&mut conn).unwrap();
    conn.execute(
        "INSERT INTO accounts(id, name, type, subtype, balance) VALUES (1, 'Checking', 'asset', 'other', '0')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO transactions(date, description, amount, type, category, account_id, tags)
         VALUES ('2025-08-01', 'Coffee', '4.50', 'expense', 'food', 1, '[\"morning\"]')",
        [],
    )
    .unwrap();
    conn
}

fn run_export(conn: &Connection, format: &str, out: &str) {
    let matches = cli::build_cli().get_matches_from([
        "chronicle",
        "export",
        "transactions",
        "--format",
        format,
        "--out",
        out,
    ]);
    if let Some(("export", m)) = matches.subcommand() {
        exporter::handle(conn, m).unwrap();
    } else {
        panic!("no export subcommand");
    }
}

#[test]
fn csv_export_includes_header_and_rows() {
    let conn = setup();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");
    run_export(&conn, "csv", path.to_str().unwrap());

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next().unwrap(),
        "date,description,type,category,amount,account,tags"
    );
    let row = lines.next().unwrap();
    assert!(row.contains("Coffee"));
    assert!(row.contains("Checking"));
    assert!(row.contains("morning"));
}

#[test]
fn json_export_round_trips() {
    let conn = setup();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    run_export(&conn, "json", path.to_str().unwrap());

    let content = std::fs::read_to_string(&path).unwrap();
    let items: serde_json::Value = serde_json::from_str(&content).unwrap();
    let arr = items.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["description"], "Coffee");
    assert_eq!(arr[0]["tags"][0], "morning");
}
