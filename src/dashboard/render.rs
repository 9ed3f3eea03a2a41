//! Plain-text presentation of a `View`: summary cards, the expense breakdown chart, the table and
//! the pagination controls.

use crate::dashboard::{CategorySlice, Page, Totals, View};
use crate::model::{Amount, Category, DATE_FORMAT};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// The width of a full bar in the breakdown chart.
const BAR_WIDTH: usize = 20;

/// Renders the whole dashboard. `user` is shown in the header when given.
pub fn render(view: &View, user: Option<&str>) -> String {
    let mut out = String::from("Dashboard\n");
    if let Some(user) = user {
        out.push_str(&format!("Signed in as {user}\n"));
    }
    if let Some(error) = &view.error {
        out.push_str(&format!("\n{error}\n"));
    }
    if let Some(id) = &view.editing {
        out.push_str(&format!("Editing transaction {id}\n"));
    }

    out.push('\n');
    out.push_str(&summary_cards(&view.totals));

    let chart = breakdown_chart(&view.breakdown);
    if !chart.is_empty() {
        out.push('\n');
        out.push_str(&chart);
    }

    out.push('\n');
    out.push_str(&table(&view.page, view.filter));
    out.push_str(&pagination(&view.page));
    out
}

/// Income, expenses (as a magnitude) and balance.
pub fn summary_cards(totals: &Totals) -> String {
    format!(
        "Income:   {}\nExpenses: {}\nBalance:  {}\n",
        totals.income,
        totals.expenses.abs(),
        totals.balance
    )
}

/// One bar per category with its share of the expenses as a whole percentage. Empty when there
/// are no expenses.
pub fn breakdown_chart(slices: &[CategorySlice]) -> String {
    if slices.is_empty() {
        return String::new();
    }
    let total: Amount = slices.iter().map(|s| s.value).sum();
    let mut out = String::from("Expense Breakdown\n");
    for slice in slices {
        let percent = percent(slice.value, total);
        let filled = (percent * Decimal::from(BAR_WIDTH) / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_usize()
            .unwrap_or_default()
            .min(BAR_WIDTH);
        out.push_str(&format!(
            "  {:<14}{}{} {:>4}%  {}\n",
            slice.name.name(),
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            percent,
            slice.value
        ));
    }
    out
}

/// `value` as a whole-number percentage of `total`.
fn percent(value: Amount, total: Amount) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    // value <= total, so dividing first keeps the product in range.
    (value.value() / total.value() * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// The rows of one page.
pub fn table(page: &Page, filter: Option<Category>) -> String {
    let heading = match filter {
        Some(category) => format!("Recent Transactions ({category})\n"),
        None => "Recent Transactions (all categories)\n".to_string(),
    };
    let mut out = heading;
    if page.items.is_empty() {
        out.push_str("  No transactions.\n");
        return out;
    }
    out.push_str(&format!(
        "  {:<15} {:<14} {:>12}  {}\n",
        "ID", "Category", "Amount", "Date"
    ));
    for t in &page.items {
        out.push_str(&format!(
            "  {:<15} {:<14} {:>12}  {}\n",
            t.id(),
            t.category().name(),
            t.amount().to_string(),
            t.date().format(DATE_FORMAT)
        ));
    }
    out
}

/// `Page n of m` plus whether Prev and Next are available and how to get there.
pub fn pagination(page: &Page) -> String {
    let prev = if page.has_prev {
        format!("--page {}", page.page - 1)
    } else {
        "disabled".to_string()
    };
    let next = if page.has_next {
        format!("--page {}", page.page + 1)
    } else {
        "disabled".to_string()
    };
    format!(
        "Page {} of {}  [Prev: {prev}]  [Next: {next}]\n",
        page.page,
        page.page_count()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{category_breakdown, page_of, totals};
    use crate::model::{parse_date, Transaction};

    fn scenario() -> Vec<Transaction> {
        vec![
            Transaction::new(
                "2",
                2000,
                Category::Salary,
                parse_date("2024-01-05").unwrap(),
            ),
            Transaction::new("1", -50, Category::Food, parse_date("2024-01-01").unwrap()),
        ]
    }

    #[test]
    fn test_summary_cards() {
        let text = summary_cards(&totals(&scenario()));
        assert_eq!(
            text,
            "Income:   $2,000.00\nExpenses: $50.00\nBalance:  $1,950.00\n"
        );
    }

    #[test]
    fn test_breakdown_chart() {
        let list = vec![
            Transaction::new("1", -75, Category::Food, parse_date("2024-01-01").unwrap()),
            Transaction::new("2", -25, Category::Rent, parse_date("2024-01-02").unwrap()),
        ];
        let chart = breakdown_chart(&category_breakdown(&list));
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines[0], "Expense Breakdown");
        assert!(lines[1].contains("Food"));
        assert!(lines[1].contains(&format!("{}{}", "#".repeat(15), "-".repeat(5))));
        assert!(lines[1].contains("75%"));
        assert!(lines[2].contains("Rent"));
        assert!(lines[2].contains("25%"));
        assert!(lines[2].contains("$25.00"));
    }

    #[test]
    fn test_no_chart_without_expenses() {
        assert!(breakdown_chart(&[]).is_empty());
    }

    #[test]
    fn test_percent_rounds_half_up() {
        assert_eq!(percent(Amount::from(1), Amount::from(8)), Decimal::from(13));
        assert_eq!(percent(Amount::from(1), Amount::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_chart_with_huge_amounts() {
        let max = Amount::new(Decimal::MAX);
        let slices = [
            CategorySlice {
                name: Category::Rent,
                value: max,
            },
            CategorySlice {
                name: Category::Food,
                value: Amount::from(1),
            },
        ];
        let chart = breakdown_chart(&slices);
        assert!(chart.lines().nth(1).unwrap().contains("100%"));
        assert!(chart.lines().nth(2).unwrap().contains(" 0%"));
    }

    #[test]
    fn test_table() {
        let page = page_of(&scenario(), None, 1);
        let text = table(&page, None);
        assert!(text.starts_with("Recent Transactions (all categories)\n"));
        assert!(text.contains("Salary"));
        assert!(text.contains("$2,000.00"));
        assert!(text.contains("-$50.00"));
        assert!(text.contains("2024-01-01"));

        let empty = table(&page_of(&scenario(), Some(Category::Travel), 1), Some(Category::Travel));
        assert_eq!(empty, "Recent Transactions (Travel)\n  No transactions.\n");
    }

    #[test]
    fn test_pagination() {
        let list: Vec<Transaction> = (0..7)
            .map(|i| {
                Transaction::new(
                    i.to_string(),
                    -1,
                    Category::Food,
                    parse_date("2024-01-01").unwrap(),
                )
            })
            .collect();
        assert_eq!(
            pagination(&page_of(&list, None, 1)),
            "Page 1 of 2  [Prev: disabled]  [Next: --page 2]\n"
        );
        assert_eq!(
            pagination(&page_of(&list, None, 2)),
            "Page 2 of 2  [Prev: --page 1]  [Next: disabled]\n"
        );
    }

    #[test]
    fn test_render() {
        let list = scenario();
        let view = View {
            totals: totals(&list),
            breakdown: category_breakdown(&list),
            page: page_of(&list, None, 1),
            filter: None,
            editing: None,
            error: Some("Failed to load transactions. Please try again later.".to_string()),
        };
        let text = render(&view, Some("me@example.com"));
        assert!(text.starts_with("Dashboard\nSigned in as me@example.com\n"));
        assert!(text.contains("Failed to load transactions. Please try again later."));
        assert!(text.contains("Balance:  $1,950.00"));
        assert!(text.contains("Expense Breakdown"));
        assert!(text.contains("100%"));
        assert!(text.ends_with("Page 1 of 1  [Prev: disabled]  [Next: disabled]\n"));
    }
}
