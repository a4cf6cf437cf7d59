//! Folds a set of transactions into income and expense totals.

use std::collections::HashMap;

use crate::{category::TransactionType, money::Money, transaction::CategorizedTransaction};

use super::color::{ColorAssigner, UNCATEGORIZED_LABEL};

/// The running total of the expenses in one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    /// The category name, or [UNCATEGORIZED_LABEL].
    pub name: String,
    /// The sum of the expenses in the category.
    pub amount: Money,
    /// The chart color of the category.
    pub color: String,
}

/// Income and expense totals for a set of transactions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Totals {
    /// The sum of all income.
    pub income: Money,
    /// The sum of all expenses.
    pub expenses: Money,
    /// The expenses per category, in the order each category was first seen.
    pub expenses_by_category: Vec<CategoryTotal>,
}

/// Sum the income and expenses in `transactions`.
///
/// Expenses are also summed per category. Expenses without a category are counted under
/// [UNCATEGORIZED_LABEL]. Amounts are summed as given, without checking their sign.
pub fn aggregate(transactions: &[CategorizedTransaction], colors: &ColorAssigner) -> Totals {
    let mut totals = Totals::default();
    let mut category_indices: HashMap<String, usize> = HashMap::new();

    for transaction in transactions {
        match transaction.kind {
            TransactionType::Income => totals.income += transaction.amount,
            TransactionType::Expense => {
                totals.expenses += transaction.amount;

                let name = transaction
                    .category
                    .as_ref()
                    .map(|category| category.name.as_ref())
                    .filter(|name| !name.is_empty())
                    .unwrap_or(UNCATEGORIZED_LABEL);

                let index = *category_indices.entry(name.to_owned()).or_insert_with(|| {
                    totals.expenses_by_category.push(CategoryTotal {
                        name: name.to_owned(),
                        amount: Money::ZERO,
                        color: colors.color_for(name).to_owned(),
                    });

                    totals.expenses_by_category.len() - 1
                });

                totals.expenses_by_category[index].amount += transaction.amount;
            }
        }
    }

    totals
}
