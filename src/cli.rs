// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{value_parser, Arg, ArgAction, Command};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .help("Print as JSON lines"),
    )
}

pub fn build_cli() -> Command {
    Command::new("chronicle")
        .about("Personal finance ledger: accounts, budgets, debts, and a natural-language scribe")
        .version(clap::crate_version!())
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(
            Command::new("account")
                .about("Manage accounts")
                .subcommand(
                    Command::new("add")
                        .about("Add an account")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .required(true)
                                .help("asset|liability"),
                        )
                        .arg(Arg::new("subtype").long("subtype").help(
                            "checking|savings|investment|tangible|credit_card|loan|cash|other",
                        ))
                        .arg(Arg::new("balance").long("balance").help("Opening balance")),
                )
                .subcommand(json_flags(Command::new("list").about("List accounts")))
                .subcommand(
                    Command::new("update")
                        .about("Update an account")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("new-name").long("new-name"))
                        .arg(Arg::new("type").long("type"))
                        .arg(Arg::new("subtype").long("subtype"))
                        .arg(Arg::new("balance").long("balance")),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Remove an account")
                        .arg(Arg::new("name").long("name").required(true)),
                )
                .subcommand(
                    Command::new("set-default")
                        .about("Set the default account used by the scribe")
                        .arg(Arg::new("name").long("name").required(true)),
                )
                .subcommand(
                    Command::new("reconcile")
                        .about("Post an adjustment so the recorded balance matches reality")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(
                            Arg::new("actual")
                                .long("actual")
                                .required(true)
                                .help("The externally verified balance"),
                        ),
                )
                .subcommand(json_flags(
                    Command::new("history")
                        .about("Reconstructed day-by-day balance series")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("range").long("range").help("1m|3m|6m|1y|all")),
                )),
        )
        .subcommand(
            Command::new("category")
                .about("Manage categories")
                .subcommand(
                    Command::new("add")
                        .about("Add a category")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("budget").long("budget").help("Default monthly budget")),
                )
                .subcommand(json_flags(Command::new("list").about("List categories")))
                .subcommand(
                    Command::new("rename")
                        .about("Rename a category")
                        .arg(Arg::new("id").long("id").required(true))
                        .arg(Arg::new("name").long("name").required(true)),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Delete a category")
                        .arg(Arg::new("id").long("id").required(true)),
                ),
        )
        .subcommand(
            Command::new("tx")
                .about("Manage transactions")
                .subcommand(
                    Command::new("add")
                        .about("Record a transaction")
                        .arg(Arg::new("date").long("date").help("YYYY-MM-DD, default today"))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("description").long("description").required(true))
                        .arg(Arg::new("type").long("type").help("income|expense|repayment"))
                        .arg(Arg::new("category").long("category"))
                        .arg(Arg::new("account").long("account").help("Account name; omit for cash/other"))
                        .arg(Arg::new("tag").long("tag").action(ArgAction::Append))
                        .arg(
                            Arg::new("recurring")
                                .long("recurring")
                                .action(ArgAction::SetTrue)
                                .help("Also create a monthly subscription"),
                        )
                        .arg(
                            Arg::new("split")
                                .long("split")
                                .action(ArgAction::Append)
                                .help("amount:category[:target[:note]]; repeatable"),
                        ),
                )
                .subcommand(
                    Command::new("edit")
                        .about("Edit a transaction")
                        .arg(
                            Arg::new("id")
                                .long("id")
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(Arg::new("date").long("date"))
                        .arg(Arg::new("amount").long("amount"))
                        .arg(Arg::new("description").long("description"))
                        .arg(Arg::new("type").long("type"))
                        .arg(Arg::new("category").long("category"))
                        .arg(Arg::new("account").long("account"))
                        .arg(
                            Arg::new("detach-account")
                                .long("detach-account")
                                .action(ArgAction::SetTrue)
                                .help("Unlink from its account (cash/other)"),
                        )
                        .arg(Arg::new("tag").long("tag").action(ArgAction::Append))
                        .arg(Arg::new("split").long("split").action(ArgAction::Append))
                        .arg(
                            Arg::new("clear-splits")
                                .long("clear-splits")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Delete a transaction, reverting its balance effect")
                        .arg(
                            Arg::new("id")
                                .long("id")
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        ),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List transactions")
                        .arg(Arg::new("month").long("month").help("YYYY-MM"))
                        .arg(Arg::new("account").long("account"))
                        .arg(Arg::new("category").long("category"))
                        .arg(Arg::new("tag").long("tag"))
                        .arg(Arg::new("search").long("search"))
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        )
                        .arg(
                            Arg::new("totals")
                                .long("totals")
                                .action(ArgAction::SetTrue)
                                .help("Also print income/expense totals"),
                        ),
                )),
        )
        .subcommand(
            Command::new("transfer")
                .about("Move money between accounts")
                .subcommand(
                    Command::new("add")
                        .about("Execute a transfer")
                        .arg(Arg::new("from").long("from").required(true))
                        .arg(Arg::new("to").long("to").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("date").long("date"))
                        .arg(Arg::new("description").long("description")),
                )
                .subcommand(json_flags(
                    Command::new("list").about("List transfers").arg(
                        Arg::new("limit")
                            .long("limit")
                            .value_parser(value_parser!(usize)),
                    ),
                )),
        )
        .subcommand(
            Command::new("budget")
                .about("Monthly category budgets")
                .subcommand(
                    Command::new("set")
                        .about("Set a month's budget for a category")
                        .arg(Arg::new("month").long("month").required(true).help("YYYY-MM"))
                        .arg(Arg::new("category").long("category").required(true))
                        .arg(Arg::new("amount").long("amount").required(true)),
                )
                .subcommand(
                    Command::new("list")
                        .about("List locked month budgets")
                        .arg(Arg::new("month").long("month")),
                )
                .subcommand(json_flags(
                    Command::new("report")
                        .about("Budget vs spent per category")
                        .arg(Arg::new("month").long("month").required(true)),
                )),
        )
        .subcommand(
            Command::new("sub")
                .about("Subscriptions")
                .subcommand(
                    Command::new("add")
                        .about("Add a subscription")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(
                            Arg::new("day")
                                .long("day")
                                .required(true)
                                .value_parser(value_parser!(u32).range(1..=31)),
                        )
                        .arg(Arg::new("category").long("category"))
                        .arg(Arg::new("tag").long("tag").action(ArgAction::Append)),
                )
                .subcommand(json_flags(Command::new("list").about("List subscriptions")))
                .subcommand(
                    Command::new("rm").about("Remove a subscription").arg(
                        Arg::new("id")
                            .long("id")
                            .required(true)
                            .value_parser(value_parser!(i64)),
                    ),
                )
                .subcommand(
                    Command::new("process")
                        .about("Post any subscriptions due this month")
                        .arg(Arg::new("date").long("date").help("Override today (YYYY-MM-DD)")),
                ),
        )
        .subcommand(
            Command::new("debts")
                .about("Bounty board: receivables and payables")
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List debts")
                        .arg(Arg::new("status").long("status").help("open|repaid|forgiven|all")),
                ))
                .subcommand(
                    Command::new("repay")
                        .about("Mark a debt repaid and record the settlement")
                        .arg(
                            Arg::new("split")
                                .long("split")
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(
                            Arg::new("account")
                                .long("account")
                                .help("Account the money moved through; omit for cash/other"),
                        ),
                )
                .subcommand(
                    Command::new("forgive")
                        .about("Write a debt off without moving money")
                        .arg(
                            Arg::new("split")
                                .long("split")
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        ),
                ),
        )
        .subcommand(
            Command::new("history")
                .about("Net-worth history points")
                .subcommand(Command::new("record").about("Record a snapshot of all balances"))
                .subcommand(json_flags(Command::new("list").about("List history points")))
                .subcommand(
                    Command::new("set")
                        .about("Correct one account's balance in a history point")
                        .arg(
                            Arg::new("id")
                                .long("id")
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(Arg::new("account").long("account").required(true))
                        .arg(Arg::new("balance").long("balance").required(true)),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Delete a history point, or one account's entry in it")
                        .arg(
                            Arg::new("id")
                                .long("id")
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(Arg::new("account").long("account")),
                ),
        )
        .subcommand(
            Command::new("scribe")
                .about("Transcribe free text into ledger entries via the hosted model")
                .subcommand(
                    Command::new("ask")
                        .about("Send a request to the scribe")
                        .arg(Arg::new("text").required(true))
                        .arg(
                            Arg::new("queue")
                                .long("queue")
                                .action(ArgAction::SetTrue)
                                .help("Queue for later instead of sending now"),
                        ),
                )
                .subcommand(Command::new("drain").about("Replay queued requests in order"))
                .subcommand(Command::new("queue").about("Show queued requests"))
                .subcommand(
                    Command::new("set-key")
                        .about("Store the generative-language API key")
                        .arg(Arg::new("key").long("key").required(true)),
                )
                .subcommand(Command::new("test").about("Check the key and pick a working model")),
        )
        .subcommand(
            Command::new("export").about("Export data").subcommand(
                Command::new("transactions")
                    .about("Export transactions")
                    .arg(Arg::new("format").long("format").required(true).help("csv|json"))
                    .arg(Arg::new("out").long("out").required(true)),
            ),
        )
        .subcommand(Command::new("doctor").about("Integrity checks"))
}
