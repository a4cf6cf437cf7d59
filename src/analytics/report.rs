//! Assembles the analytics report from the aggregated totals.

use serde::Serialize;

use crate::{
    Error,
    auth::UserID,
    money::Money,
    transaction::{CategorizedTransaction, TransactionOrder, TransactionQueryFilter},
};

use super::{
    aggregation::{Totals, aggregate},
    color::ColorAssigner,
    period::{AnalyticsQuery, resolve_period},
};

/// The share of total expenses spent in one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    /// The category name.
    pub name: String,
    /// The sum of the expenses in the category.
    pub amount: Money,
    /// The chart color of the category.
    pub color: String,
    /// The category's percentage of total expenses, rounded to one decimal place.
    pub value: f64,
}

/// A summary of a user's income and spending over a period.
///
/// Reports are computed on request from the stored transactions and never saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    /// The year the report covers.
    pub year: i32,
    /// The month as the client wrote it, or `None` for the whole year.
    pub month: Option<String>,
    /// The total income.
    pub income: Money,
    /// The expenses per category, in the order each category was first seen.
    pub expenses: Vec<CategoryBreakdown>,
    /// The total expenses.
    pub total_expenses: Money,
    /// Income minus expenses. Negative when more was spent than earned.
    pub net_savings: Money,
    /// Net savings as a whole-number percentage of income, or zero if there was no income.
    pub savings_rate: i64,
}

/// Divide `numerator` by the positive `denominator`, rounding half away from zero.
fn div_round(numerator: i128, denominator: i128) -> i128 {
    // Integer division truncates towards zero, so pushing the doubled numerator half a
    // denominator further from zero rounds ties away from zero.
    (2 * numerator + numerator.signum() * denominator) / (2 * denominator)
}

/// `part` as a percentage of `total` in tenths of a percent, e.g. 667 for 66.7%.
fn percentage_tenths(part: Money, total: Money) -> i64 {
    if total.cents() <= 0 {
        return 0;
    }

    div_round(i128::from(part.cents()) * 1000, i128::from(total.cents())) as i64
}

/// Net savings as a whole percentage of income.
fn savings_rate(net_savings: Money, income: Money) -> i64 {
    if income.cents() <= 0 {
        return 0;
    }

    div_round(i128::from(net_savings.cents()) * 100, i128::from(income.cents())) as i64
}

/// Create the report for `year` and `month` from the aggregated `totals`.
///
/// `month` should be the month as the client sent it.
pub fn build_report(year: i32, month: Option<String>, totals: Totals) -> AnalyticsReport {
    let Totals {
        income,
        expenses: total_expenses,
        expenses_by_category,
    } = totals;

    let expenses = expenses_by_category
        .into_iter()
        .map(|category| CategoryBreakdown {
            value: percentage_tenths(category.amount, total_expenses) as f64 / 10.0,
            name: category.name,
            amount: category.amount,
            color: category.color,
        })
        .collect();

    let net_savings = income - total_expenses;

    AnalyticsReport {
        year,
        month,
        income,
        expenses,
        total_expenses,
        net_savings,
        savings_rate: savings_rate(net_savings, income),
    }
}

/// Compute the analytics report requested by `query` for the user `user_id`.
///
/// `fetch` is called once with the filter selecting the user's transactions in the requested
/// period, and should return the matching transactions in the order the filter asks for.
/// Expense categories appear in the report in the order the transactions were recorded.
///
/// # Errors
///
/// This function will return an error if the query is invalid (see
/// [resolve_period](super::resolve_period)), or the error from `fetch` if it fails.
pub fn generate_report<F>(
    user_id: UserID,
    query: &AnalyticsQuery,
    colors: &ColorAssigner,
    fetch: F,
) -> Result<AnalyticsReport, Error>
where
    F: FnOnce(&TransactionQueryFilter) -> Result<Vec<CategorizedTransaction>, Error>,
{
    let period = resolve_period(query.year.as_deref(), query.month.as_deref())?;
    let filter = TransactionQueryFilter::new(user_id)
        .date_range(period.date_range()?)
        .order(TransactionOrder::Recorded);

    let transactions = fetch(&filter)?;
    let totals = aggregate(&transactions, colors);

    let month = query
        .month
        .clone()
        .filter(|month| !month.trim().is_empty());

    Ok(build_report(period.year, month, totals))
}

#[cfg(test)]
mod report_tests {
    use serde_json::json;
    use time::{Date, macros::date};

    use crate::{
        Error,
        analytics::{AnalyticsQuery, ColorAssigner, DateRange},
        auth::UserID,
        category::{CategoryName, TransactionType},
        money::Money,
        transaction::{CategorizedTransaction, CategorySummary, TransactionOrder},
    };

    use super::{div_round, generate_report};

    fn transaction(
        kind: TransactionType,
        category_name: &str,
        amount: i64,
        date: Date,
    ) -> CategorizedTransaction {
        CategorizedTransaction {
            id: 1,
            user_id: UserID::new(1),
            kind,
            category: Some(CategorySummary {
                id: 1,
                name: CategoryName::new_unchecked(category_name),
                kind,
            }),
            amount: Money::from_cents(amount * 100),
            description: None,
            date,
        }
    }

    fn query(year: &str, month: Option<&str>) -> AnalyticsQuery {
        AnalyticsQuery {
            year: Some(year.to_owned()),
            month: month.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(div_round(5, 10), 1);
        assert_eq!(div_round(4, 10), 0);
        assert_eq!(div_round(-5, 10), -1);
        assert_eq!(div_round(-4, 10), 0);
        assert_eq!(div_round(3, 2), 2);
        assert_eq!(div_round(-3, 2), -2);
        assert_eq!(div_round(2, 3), 1);
        assert_eq!(div_round(1, 3), 0);
        assert_eq!(div_round(-2, 3), -1);
        assert_eq!(div_round(0, 7), 0);
    }

    #[test]
    fn yearly_report() {
        let transactions = vec![
            transaction(TransactionType::Income, "Salary", 5000, date!(2024 - 01 - 15)),
            transaction(TransactionType::Expense, "Rent", 1500, date!(2024 - 02 - 01)),
            transaction(TransactionType::Expense, "Food", 1000, date!(2024 - 02 - 10)),
            transaction(TransactionType::Expense, "Rent", 500, date!(2024 - 03 - 01)),
        ];

        let report = generate_report(
            UserID::new(1),
            &query("2024", None),
            &ColorAssigner::default(),
            |_| Ok(transactions),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "year": 2024,
                "month": null,
                "income": 5000,
                "expenses": [
                    { "name": "Rent", "amount": 2000, "color": "#14B8A6", "value": 66.7 },
                    { "name": "Food", "amount": 1000, "color": "#8B5CF6", "value": 33.3 },
                ],
                "totalExpenses": 3000,
                "netSavings": 2000,
                "savingsRate": 40,
            })
        );
    }

    #[test]
    fn empty_report() {
        let report = generate_report(
            UserID::new(1),
            &query("2024", None),
            &ColorAssigner::default(),
            |_| Ok(Vec::new()),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "year": 2024,
                "month": null,
                "income": 0,
                "expenses": [],
                "totalExpenses": 0,
                "netSavings": 0,
                "savingsRate": 0,
            })
        );
    }

    #[test]
    fn fetches_with_users_monthly_range() {
        let mut seen_filter = None;

        let report = generate_report(
            UserID::new(7),
            &query("2024", Some("December")),
            &ColorAssigner::default(),
            |filter| {
                seen_filter = Some(filter.clone());
                Ok(Vec::new())
            },
        )
        .unwrap();

        let filter = seen_filter.expect("fetch should be called");
        assert_eq!(filter.owner_id, UserID::new(7));
        assert_eq!(
            filter.date_range,
            Some(DateRange {
                start: date!(2024 - 12 - 01),
                end: Some(date!(2025 - 01 - 01)),
            })
        );
        assert_eq!(filter.kind, None);
        assert_eq!(filter.category_id, None);
        assert_eq!(filter.order, TransactionOrder::Recorded);
        assert_eq!(report.month.as_deref(), Some("December"));
    }

    #[test]
    fn month_is_echoed_as_given() {
        let report = generate_report(
            UserID::new(1),
            &query("2024", Some("mar")),
            &ColorAssigner::default(),
            |_| Ok(Vec::new()),
        )
        .unwrap();

        assert_eq!(report.month.as_deref(), Some("mar"));
    }

    #[test]
    fn overspending_gives_negative_savings() {
        let transactions = vec![
            transaction(TransactionType::Income, "Salary", 1000, date!(2024 - 01 - 15)),
            transaction(TransactionType::Expense, "Rent", 1500, date!(2024 - 01 - 16)),
        ];

        let report = generate_report(
            UserID::new(1),
            &query("2024", None),
            &ColorAssigner::default(),
            |_| Ok(transactions),
        )
        .unwrap();

        assert_eq!(report.net_savings, Money::from_cents(-50_000));
        assert_eq!(report.savings_rate, -50);
    }

    #[test]
    fn savings_rate_is_zero_without_income() {
        let transactions = vec![transaction(
            TransactionType::Expense,
            "Rent",
            1500,
            date!(2024 - 01 - 16),
        )];

        let report = generate_report(
            UserID::new(1),
            &query("2024", None),
            &ColorAssigner::default(),
            |_| Ok(transactions),
        )
        .unwrap();

        assert_eq!(report.income, Money::ZERO);
        assert_eq!(report.net_savings, Money::from_cents(-150_000));
        assert_eq!(report.savings_rate, 0);
        assert_eq!(report.expenses[0].value, 100.0);
    }

    #[test]
    fn percentages_add_up_to_about_one_hundred() {
        let transactions = vec![
            transaction(TransactionType::Expense, "Rent", 1, date!(2024 - 01 - 01)),
            transaction(TransactionType::Expense, "Food", 1, date!(2024 - 01 - 02)),
            transaction(TransactionType::Expense, "Transport", 1, date!(2024 - 01 - 03)),
        ];

        let report = generate_report(
            UserID::new(1),
            &query("2024", None),
            &ColorAssigner::default(),
            |_| Ok(transactions),
        )
        .unwrap();

        let values: Vec<f64> = report.expenses.iter().map(|category| category.value).collect();
        assert_eq!(values, vec![33.3, 33.3, 33.3]);
        let total: f64 = values.iter().sum();
        assert!((total - 100.0).abs() <= 0.1 * values.len() as f64);
    }

    #[test]
    fn invalid_query_does_not_fetch() {
        let mut fetched = false;

        let result = generate_report(
            UserID::new(1),
            &query("2024", Some("Marchy")),
            &ColorAssigner::default(),
            |_| {
                fetched = true;
                Ok(Vec::new())
            },
        );

        assert_eq!(result, Err(Error::InvalidMonth("Marchy".to_owned())));
        assert!(!fetched);
    }

    #[test]
    fn missing_year_is_an_error() {
        let result = generate_report(
            UserID::new(1),
            &AnalyticsQuery::default(),
            &ColorAssigner::default(),
            |_| Ok(Vec::new()),
        );

        assert_eq!(result, Err(Error::MissingYear));
    }

    #[test]
    fn fetch_errors_are_passed_on() {
        let result = generate_report(
            UserID::new(1),
            &query("2024", None),
            &ColorAssigner::default(),
            |_| Err(Error::DatabaseLockError),
        );

        assert_eq!(result, Err(Error::DatabaseLockError));
    }
}
