use crate::model::{Amount, Category};
use crate::Result;
use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The format of dates on the wire and in user input.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single income or expense record owned by one user.
///
/// The sign of `amount` encodes direction: positive for `Category::Salary`, negative for all other
/// categories. Use `signed_amount` to compute the stored value from user input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireTransaction")]
pub struct Transaction {
    pub(crate) id: String,
    pub(crate) amount: Amount,
    pub(crate) category: Category,
    pub(crate) date: NaiveDate,
    /// The category name the server sent when it is not one we know. `category` is `Other` then.
    #[serde(skip)]
    pub(crate) unknown_category: Option<String>,
}

/// A transaction as the server sends it. The category may be missing, empty or unknown.
#[derive(Deserialize)]
struct WireTransaction {
    id: String,
    amount: Amount,
    #[serde(default)]
    category: Option<String>,
    date: NaiveDate,
}

impl From<WireTransaction> for Transaction {
    fn from(wire: WireTransaction) -> Self {
        let name = wire.category.unwrap_or_default();
        let (category, unknown_category) = if name.trim().is_empty() {
            (Category::Other, None)
        } else {
            match Category::from_str(&name) {
                Ok(category) => (category, None),
                Err(_) => (Category::Other, Some(name)),
            }
        };
        Self {
            id: wire.id,
            amount: wire.amount,
            category,
            date: wire.date,
            unknown_category,
        }
    }
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        amount: impl Into<Amount>,
        category: Category,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            amount: amount.into(),
            category,
            date,
            unknown_category: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// The server's category name when it could not be read as a `Category`.
    pub fn unknown_category(&self) -> Option<&str> {
        self.unknown_category.as_deref()
    }

    /// The body of a create or update request for this transaction.
    pub fn payload(&self, email: &str) -> TransactionPayload {
        TransactionPayload {
            id: self.id.clone(),
            amount: self.amount,
            category: self.category,
            date: self.date,
            email: email.to_string(),
        }
    }
}

/// The body of `POST /transactions` and `PATCH /transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub id: String,
    pub amount: Amount,
    pub category: Category,
    pub date: NaiveDate,
    pub email: String,
}

impl TransactionPayload {
    /// The transaction without the owner's email address.
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.id.clone(), self.amount, self.category, self.date)
    }
}

/// The body of `DELETE /transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePayload {
    pub id: String,
    pub email: String,
}

/// The in-progress values of the add/edit form, exactly as the user typed them.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub amount: String,
    pub category: String,
    pub date: String,
}

impl Draft {
    pub fn new(
        amount: impl Into<String>,
        category: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            amount: amount.into(),
            category: category.into(),
            date: date.into(),
        }
    }

    /// Fills the form from an existing transaction. The amount is shown as a magnitude. An unknown
    /// server category is kept as it was sent, so saving fails until a known one is chosen.
    pub fn from_transaction(t: &Transaction) -> Self {
        Self {
            amount: t.amount.abs().value().normalize().to_string(),
            category: match &t.unknown_category {
                Some(name) => name.clone(),
                None => t.category.to_string(),
            },
            date: t.date.format(DATE_FORMAT).to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.amount.is_empty() && self.category.is_empty() && self.date.is_empty()
    }

    /// Validates the draft and produces a transaction with the sign of its amount derived from its
    /// category.
    pub fn to_transaction(&self, id: impl Into<String>) -> Result<Transaction> {
        if self.amount.trim().is_empty() {
            bail!("An amount is required");
        }
        if self.category.trim().is_empty() {
            bail!("A category is required");
        }
        let typed = Amount::from_str(&self.amount)?;
        check_entry(typed)?;
        let category = Category::from_str(&self.category)?;
        let date = parse_date(&self.date)?;
        Ok(Transaction::new(
            id,
            signed_amount(typed, category),
            category,
            date,
        ))
    }
}

/// The magnitude must be a positive number of cents no larger than `max_entry()`.
fn check_entry(typed: Amount) -> Result<()> {
    let magnitude = typed.abs().value();
    if magnitude.is_zero() {
        bail!("The amount must be greater than zero");
    }
    if magnitude.normalize().scale() > 2 {
        bail!("'{}' has more than two decimal places", typed.value());
    }
    if magnitude > max_entry() {
        bail!("The amount can be at most {}", Amount::new(max_entry()));
    }
    Ok(())
}

/// The largest magnitude accepted from the form, 999,999,999,999.99.
fn max_entry() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

/// Applies the sign convention: the magnitude of `typed` is kept, and it is positive for income
/// and negative for everything else, regardless of the sign the user typed.
pub fn signed_amount(typed: Amount, category: Category) -> Amount {
    let magnitude = typed.abs();
    if category.is_income() {
        magnitude
    } else {
        -magnitude
    }
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        bail!("A date is required");
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .with_context(|| format!("'{s}' is not a valid date, expected YYYY-MM-DD"))
}

/// Sorts by date, newest first. The sort is stable, so entries with the same date keep their
/// relative order.
pub fn sort_by_date_desc(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Generates an id for a transaction created on this client: the current Unix time in
/// milliseconds, incremented until it does not collide with any id in `existing`.
pub fn generate_id(existing: &[Transaction]) -> String {
    let mut candidate = Utc::now().timestamp_millis();
    loop {
        let id = candidate.to_string();
        if !existing.iter().any(|t| t.id == id) {
            return id;
        }
        candidate += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_expense_is_negative() {
        let draft = Draft::new("30", "Food", "2024-02-01");
        let t = draft.to_transaction("1").unwrap();
        assert_eq!(t.amount(), Amount::from(-30));
        assert_eq!(t.category(), Category::Food);
        assert_eq!(t.date(), date("2024-02-01"));
    }

    #[test]
    fn test_salary_is_positive() {
        let draft = Draft::new("1500", "Salary", "2024-02-01");
        let t = draft.to_transaction("1").unwrap();
        assert_eq!(t.amount(), Amount::from(1500));
    }

    #[test]
    fn test_typed_sign_is_ignored() {
        let t = Draft::new("-1500", "Salary", "2024-02-01")
            .to_transaction("1")
            .unwrap();
        assert_eq!(t.amount(), Amount::from(1500));
        let t = Draft::new("-30", "Rent", "2024-02-01")
            .to_transaction("2")
            .unwrap();
        assert_eq!(t.amount(), Amount::from(-30));
    }

    #[test]
    fn test_missing_amount_or_category() {
        let err = Draft::new("", "Food", "2024-02-01")
            .to_transaction("1")
            .unwrap_err();
        assert!(err.to_string().contains("amount is required"));
        let err = Draft::new("10", " ", "2024-02-01")
            .to_transaction("1")
            .unwrap_err();
        assert!(err.to_string().contains("category is required"));
    }

    #[test]
    fn test_amount_bounds() {
        for (typed, message) in [
            ("0", "greater than zero"),
            ("-0.00", "greater than zero"),
            ("0.001", "more than two decimal places"),
            ("12.345", "more than two decimal places"),
            ("79228162514264337593543950335", "at most"),
            ("1000000000000", "at most"),
        ] {
            let err = Draft::new(typed, "Salary", "2024-02-01")
                .to_transaction("1")
                .unwrap_err();
            assert!(err.to_string().contains(message), "{typed}: {err}");
        }
        let t = Draft::new("0.01", "Food", "2024-02-01")
            .to_transaction("1")
            .unwrap();
        assert_eq!(t.amount().value(), Decimal::new(-1, 2));
        let t = Draft::new("12.50", "Food", "2024-02-01")
            .to_transaction("2")
            .unwrap();
        assert_eq!(t.amount().value(), Decimal::new(-125, 1));
        assert!(Draft::new("999999999999.99", "Salary", "2024-02-01")
            .to_transaction("3")
            .is_ok());
    }

    #[test]
    fn test_bad_date() {
        let err = Draft::new("10", "Food", "02/01/2024")
            .to_transaction("1")
            .unwrap_err();
        assert!(err.to_string().contains("not a valid date"));
    }

    #[test]
    fn test_draft_from_transaction() {
        let t = Transaction::new("9", -45, Category::Travel, date("2024-03-09"));
        let draft = Draft::from_transaction(&t);
        assert_eq!(draft, Draft::new("45", "Travel", "2024-03-09"));
    }

    #[test]
    fn test_sort_by_date_desc() {
        let mut list = vec![
            Transaction::new("a", -1, Category::Food, date("2024-01-01")),
            Transaction::new("b", -2, Category::Food, date("2024-03-01")),
            Transaction::new("c", -3, Category::Food, date("2024-02-01")),
            Transaction::new("d", -4, Category::Food, date("2024-03-01")),
        ];
        sort_by_date_desc(&mut list);
        let ids: Vec<&str> = list.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["b", "d", "c", "a"]);
    }

    #[test]
    fn test_generate_id_avoids_collisions() {
        let first = generate_id(&[]);
        let existing = vec![Transaction::new(
            first.clone(),
            -1,
            Category::Food,
            date("2024-01-01"),
        )];
        let second = generate_id(&existing);
        assert_ne!(first, second);
        assert!(second.parse::<i64>().is_ok());
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{"id":"17","amount":-12.5,"category":"Health","date":"2024-05-06"}"#;
        let t: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(t.category(), Category::Health);
        let payload = serde_json::to_value(t.payload("a@example.com")).unwrap();
        assert_eq!(payload["email"], "a@example.com");
        assert_eq!(payload["date"], "2024-05-06");
        assert_eq!(payload["amount"], -12.5);
    }

    #[test]
    fn test_missing_category_is_other() {
        let json = r#"{"id":"17","amount":-3,"date":"2024-05-06"}"#;
        let t: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(t.category(), Category::Other);
        assert_eq!(t.unknown_category(), None);
        let json = r#"{"id":"18","amount":-3,"category":"","date":"2024-05-06"}"#;
        let t: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(t.category(), Category::Other);
        assert_eq!(t.unknown_category(), None);
    }

    #[test]
    fn test_wire_category_ignores_case() {
        let json = r#"{"id":"17","amount":900,"category":"salary","date":"2024-05-06"}"#;
        let t: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(t.category(), Category::Salary);
        assert_eq!(t.unknown_category(), None);
    }

    #[test]
    fn test_unknown_category_is_not_rewritten() {
        let json = r#"{"id":"17","amount":-3,"category":"Groceries","date":"2024-05-06"}"#;
        let t: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(t.category(), Category::Other);
        assert_eq!(t.unknown_category(), Some("Groceries"));

        let mut draft = Draft::from_transaction(&t);
        assert_eq!(draft.category, "Groceries");
        draft.amount = "4".to_string();
        let err = draft.to_transaction("17").unwrap_err();
        assert!(err.to_string().contains("Unknown category 'Groceries'"));

        draft.category = "Food".to_string();
        assert_eq!(
            draft.to_transaction("17").unwrap().category(),
            Category::Food
        );
    }
}
