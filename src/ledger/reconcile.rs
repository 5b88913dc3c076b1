// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Drift correction between recorded and externally-verified balances.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use crate::models::{AccountType, TxType};

/// Differences under a cent are treated as already balanced.
static RECONCILE_EPSILON: Lazy<Decimal> = Lazy::new(|| Decimal::new(1, 2));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub r#type: TxType,
    pub amount: Decimal,
}

/// Derive the adjustment transaction that closes the gap between recorded
/// and actual. This is the inverse framing of the delta engine's sign rule:
/// an asset that grew found money (income), a liability that grew charged
/// more debt (expense). Returns None when the gap is under the epsilon.
pub fn adjustment(
    account_type: AccountType,
    recorded: Decimal,
    actual: Decimal,
) -> Option<Adjustment> {
    let diff = actual - recorded;
    if diff.abs() < *RECONCILE_EPSILON {
        return None;
    }
    let grew = diff > Decimal::ZERO;
    let r#type = match account_type {
        AccountType::Asset => {
            if grew {
                TxType::Income
            } else {
                TxType::Expense
            }
        }
        AccountType::Liability => {
            if grew {
                TxType::Expense
            } else {
                TxType::Income
            }
        }
    };
    Some(Adjustment { r#type, amount: diff.abs() })
}
