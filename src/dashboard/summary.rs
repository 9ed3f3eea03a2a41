//! Aggregates derived from the transaction collection. These are recomputed from scratch every
//! time they are needed.

use crate::model::{Amount, Category, Transaction};
use serde::Serialize;

/// The three summary figures.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Sum of the positive amounts.
    pub income: Amount,
    /// Sum of the negative amounts, so this is never positive.
    pub expenses: Amount,
    /// `income + expenses`
    pub balance: Amount,
}

pub fn totals(transactions: &[Transaction]) -> Totals {
    let income: Amount = transactions
        .iter()
        .map(Transaction::amount)
        .filter(Amount::is_positive)
        .sum();
    let expenses: Amount = transactions
        .iter()
        .map(Transaction::amount)
        .filter(Amount::is_negative)
        .sum();
    Totals {
        income,
        expenses,
        balance: income + expenses,
    }
}

/// One category's share of the expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategorySlice {
    pub name: Category,
    /// The sum of the magnitudes of this category's expenses.
    pub value: Amount,
}

/// Groups the expenses by category, in the order each category first appears in
/// `transactions`. Income is left out.
pub fn category_breakdown(transactions: &[Transaction]) -> Vec<CategorySlice> {
    let mut slices: Vec<CategorySlice> = Vec::new();
    for t in transactions.iter().filter(|t| t.amount().is_negative()) {
        let value = t.amount().abs();
        match slices.iter_mut().find(|s| s.name == t.category()) {
            Some(slice) => slice.value = slice.value + value,
            None => slices.push(CategorySlice {
                name: t.category(),
                value,
            }),
        }
    }
    slices
}
