// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Signed balance effect of one ledger event on one account.
//!
//! The sign convention: income carries +1, expense -1, and an asset account
//! carries polarity +1 while a liability carries -1 (income against a credit
//! card pays debt down, an expense charges it up). Repayments move money in,
//! so they share income's sign while staying out of income/expense totals.

use rust_decimal::Decimal;

use crate::models::{AccountType, TxType};

pub fn type_sign(t: TxType) -> Decimal {
    match t {
        TxType::Income | TxType::Repayment => Decimal::ONE,
        TxType::Expense => -Decimal::ONE,
    }
}

pub fn polarity(a: AccountType) -> Decimal {
    match a {
        AccountType::Asset => Decimal::ONE,
        AccountType::Liability => -Decimal::ONE,
    }
}

/// `amount * sign(type) * polarity(accountType)`.
pub fn effective_delta(amount: Decimal, t: TxType, a: AccountType) -> Decimal {
    amount * type_sign(t) * polarity(a)
}

pub fn apply(balance: Decimal, amount: Decimal, t: TxType, a: AccountType) -> Decimal {
    balance + effective_delta(amount, t, a)
}

pub fn revert(balance: Decimal, amount: Decimal, t: TxType, a: AccountType) -> Decimal {
    balance - effective_delta(amount, t, a)
}

/// Per-leg deltas of a transfer. A transfer has no income/expense type;
/// direction alone determines sign. Funding a transfer out of a liability
/// account increases what is owed, receiving into one pays it down.
pub fn transfer_deltas(
    from: AccountType,
    to: AccountType,
    amount: Decimal,
) -> (Decimal, Decimal) {
    (-amount * polarity(from), amount * polarity(to))
}

/// Net balance change of editing a transaction on a single account.
///
/// `old` is the effect being reverted, `new` the one being applied; either
/// side is None when that version of the transaction was unlinked. Netting
/// algebraically against one read of the stored balance is what keeps two
/// queued writes in the same batch from clobbering each other.
pub fn edit_net_delta(
    old: Option<(Decimal, TxType)>,
    new: Option<(Decimal, TxType)>,
    account_type: AccountType,
) -> Decimal {
    let reverted = old
        .map(|(amount, t)| -effective_delta(amount, t, account_type))
        .unwrap_or(Decimal::ZERO);
    let applied = new
        .map(|(amount, t)| effective_delta(amount, t, account_type))
        .unwrap_or(Decimal::ZERO);
    reverted + applied
}
