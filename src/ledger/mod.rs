// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::SplitStatus;

pub mod delta;
pub mod reconcile;
pub mod replay;
pub mod splits;

/// Validation failures rejected before any write reaches the store.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Split total ({total:.2}) does not match transaction amount ({amount:.2})")]
    SplitMismatch { total: Decimal, amount: Decimal },
    #[error("Transaction amount must not be negative")]
    NegativeAmount,
    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,
    #[error("Transfer amount must be positive")]
    NonPositiveTransfer,
    #[error("Debt is already {0}")]
    DebtSettled(SplitStatus),
    #[error("Split is not a receivable or payable")]
    NotADebt,
}
