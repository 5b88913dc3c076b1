// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Split expansion and the receivable/payable lifecycle.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use super::LedgerError;
use crate::models::{SplitStatus, TxType};

pub const RECEIVABLE: &str = "receivable";
pub const PAYABLE: &str = "payable";
pub const UNASSIGNED_TARGET: &str = "Unassigned";

/// Rounding slack tolerated between a transaction amount and its split sum.
static SPLIT_TOLERANCE: Lazy<Decimal> = Lazy::new(|| Decimal::new(2, 2));

/// A split as entered, before persistence fills in defaults.
#[derive(Debug, Clone)]
pub struct SplitInput {
    pub amount: Decimal,
    pub category: String,
    pub r#type: TxType,
    pub target: Option<String>,
    pub note: Option<String>,
}

pub fn is_debt_category(category: &str) -> bool {
    category == RECEIVABLE || category == PAYABLE
}

/// Reject split sets whose total drifts from the transaction amount by more
/// than the tolerance. Never truncates or pads.
pub fn validate_split_total(amount: Decimal, splits: &[SplitInput]) -> Result<(), LedgerError> {
    let total: Decimal = splits.iter().map(|s| s.amount).sum();
    if (total - amount).abs() > *SPLIT_TOLERANCE {
        return Err(LedgerError::SplitMismatch { total, amount });
    }
    Ok(())
}

/// Defaults applied on save: debt splits get an open status and a target
/// ("Unassigned" when blank); ordinary splits carry no status.
pub fn normalized_target(category: &str, target: Option<&str>) -> Option<String> {
    if is_debt_category(category) {
        let t = target.map(str::trim).filter(|t| !t.is_empty());
        Some(t.unwrap_or(UNASSIGNED_TARGET).to_string())
    } else {
        target.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
    }
}

pub fn initial_status(category: &str) -> Option<SplitStatus> {
    if is_debt_category(category) {
        Some(SplitStatus::Open)
    } else {
        None
    }
}

/// Resolution of an open debt split. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Repaid,
    Forgiven,
}

impl Resolution {
    pub fn status(self) -> SplitStatus {
        match self {
            Resolution::Repaid => SplitStatus::Repaid,
            Resolution::Forgiven => SplitStatus::Forgiven,
        }
    }
}

/// Only `open -> repaid` and `open -> forgiven` are legal.
pub fn check_transition(
    current: Option<SplitStatus>,
    _next: Resolution,
) -> Result<(), LedgerError> {
    match current {
        Some(SplitStatus::Open) => Ok(()),
        Some(settled) => Err(LedgerError::DebtSettled(settled)),
        None => Err(LedgerError::NotADebt),
    }
}

/// The settlement transaction posted alongside a resolution.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub description: String,
    pub r#type: TxType,
    pub category: String,
    pub tags: Vec<String>,
    /// Whether the settlement moves money against a chosen account.
    pub touches_account: bool,
}

/// Derive the settlement for a debt split. Forgiving moves no money: a
/// forgiven payable is debt relief (income), a forgiven receivable is a bad
/// debt write-off (expense). Repaying a payable is cash out (expense);
/// collecting a receivable is a reimbursement (repayment, excluded from
/// income/expense totals).
pub fn settlement(resolution: Resolution, category: &str, target: &str) -> Settlement {
    let payable = category == PAYABLE;
    match resolution {
        Resolution::Forgiven => Settlement {
            description: if payable {
                format!("Debt Forgiven by {}", target)
            } else {
                format!("Forgiven Debt: {}", target)
            },
            r#type: if payable { TxType::Income } else { TxType::Expense },
            category: "misc".to_string(),
            tags: if payable {
                vec!["debt_relief".into(), "income".into()]
            } else {
                vec!["bad_debt".into(), "forgiven".into()]
            },
            touches_account: false,
        },
        Resolution::Repaid => Settlement {
            description: if payable {
                format!("Repayment to {}", target)
            } else {
                format!("Repayment from {}", target)
            },
            r#type: if payable { TxType::Expense } else { TxType::Repayment },
            category: if payable { "misc".to_string() } else { "income".to_string() },
            tags: vec!["repayment".into(), "bounty_board".into()],
            touches_account: true,
        },
    }
}
