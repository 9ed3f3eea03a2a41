use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The label on a transaction. `Salary` is the only category that represents income, every other
/// category is an expense.
#[derive(
    Default, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub enum Category {
    Food,
    Rent,
    Utilities,
    Entertainment,
    Travel,
    Shopping,
    Health,
    Salary,
    /// Also the value for any category name the server sends that we do not know about.
    #[default]
    #[serde(other)]
    Other,
}

serde_plain::derive_display_from_serialize!(Category);

impl Category {
    /// Every category, in the order they are offered to the user.
    pub const ALL: [Category; 9] = [
        Category::Food,
        Category::Rent,
        Category::Utilities,
        Category::Entertainment,
        Category::Travel,
        Category::Shopping,
        Category::Health,
        Category::Salary,
        Category::Other,
    ];

    /// Returns `true` for the income category.
    pub fn is_income(&self) -> bool {
        matches!(self, Category::Salary)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Rent => "Rent",
            Category::Utilities => "Utilities",
            Category::Entertainment => "Entertainment",
            Category::Travel => "Travel",
            Category::Shopping => "Shopping",
            Category::Health => "Health",
            Category::Salary => "Salary",
            Category::Other => "Other",
        }
    }
}

/// Parses user input. Unlike deserialization, an unknown name is an error here.
impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match Category::ALL
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
        {
            Some(category) => Ok(*category),
            None => {
                let names: Vec<&str> = Category::ALL.iter().map(|c| c.name()).collect();
                bail!(
                    "Unknown category '{s}', expected one of: {}",
                    names.join(", ")
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_wire_name() {
        for category in Category::ALL {
            assert_eq!(category.to_string(), category.name());
        }
    }

    #[test]
    fn test_parse_ignores_case() {
        assert_eq!(Category::from_str("salary").unwrap(), Category::Salary);
        assert_eq!(Category::from_str(" FOOD ").unwrap(), Category::Food);
    }

    #[test]
    fn test_parse_unknown() {
        let err = Category::from_str("Groceries").unwrap_err();
        assert!(err.to_string().contains("Unknown category 'Groceries'"));
    }

    #[test]
    fn test_deserialize_unknown_is_other() {
        let c: Category = serde_json::from_str("\"Groceries\"").unwrap();
        assert_eq!(c, Category::Other);
        let c: Category = serde_json::from_str("\"\"").unwrap();
        assert_eq!(c, Category::Other);
        let c: Category = serde_json::from_str("\"Travel\"").unwrap();
        assert_eq!(c, Category::Travel);
    }

    #[test]
    fn test_serialize() {
        assert_eq!(
            serde_json::to_string(&Category::Entertainment).unwrap(),
            "\"Entertainment\""
        );
    }

    #[test]
    fn test_only_salary_is_income() {
        let income: Vec<Category> = Category::ALL
            .into_iter()
            .filter(|c| c.is_income())
            .collect();
        assert_eq!(income, vec![Category::Salary]);
    }
}
