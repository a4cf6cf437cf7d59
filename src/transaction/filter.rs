//! Selecting a user's transactions together with their categories.

use rusqlite::{Connection, Row, named_params};
use serde::Serialize;
use time::Date;

use crate::{
    Error,
    analytics::DateRange,
    auth::UserID,
    category::{CategoryName, TransactionType},
    database_id::{CategoryId, TransactionId},
    money::Money,
};

use super::core::date_format;

/// The order in which selected transactions are returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionOrder {
    /// Latest date first, ties broken by the most recently recorded.
    #[default]
    NewestFirst,
    /// The order the transactions were recorded in, regardless of their dates.
    Recorded,
}

impl TransactionOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            TransactionOrder::NewestFirst => "t.date DESC, t.id DESC",
            TransactionOrder::Recorded => "t.id ASC",
        }
    }
}

/// Which transactions to fetch from the store.
///
/// Only the owner is required; every other condition is optional and narrows the selection.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQueryFilter {
    /// Only transactions recorded by this user are selected.
    pub owner_id: UserID,
    /// Only select transactions dated in this range.
    pub date_range: Option<DateRange>,
    /// Only select income or only select expenses.
    pub kind: Option<TransactionType>,
    /// Only select transactions in this category.
    pub category_id: Option<CategoryId>,
    /// The order of the selected transactions.
    pub order: TransactionOrder,
}

impl TransactionQueryFilter {
    /// Select all of the transactions recorded by `owner_id`.
    pub fn new(owner_id: UserID) -> Self {
        Self {
            owner_id,
            date_range: None,
            kind: None,
            category_id: None,
            order: TransactionOrder::default(),
        }
    }

    /// Only select transactions dated in the half-open `date_range`.
    pub fn date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = Some(date_range);
        self
    }

    /// Only select transactions dated from `start` up to and including `end`.
    pub fn between_inclusive(mut self, start: Date, end: Date) -> Self {
        self.date_range = Some(DateRange::inclusive(start, end));
        self
    }

    /// Only select transactions of type `kind`.
    pub fn kind(mut self, kind: Option<TransactionType>) -> Self {
        self.kind = kind;
        self
    }

    /// Only select transactions in the category `category_id`.
    pub fn category(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Return the selected transactions in `order`.
    pub fn order(mut self, order: TransactionOrder) -> Self {
        self.order = order;
        self
    }
}

/// The name and type of the category a transaction is recorded against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    /// The ID of the category.
    pub id: CategoryId,
    /// The name of the category.
    pub name: CategoryName,
    /// Whether the category is for income or expenses.
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

/// A transaction with its category looked up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedTransaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that recorded the transaction.
    #[serde(rename = "user")]
    pub user_id: UserID,
    /// Whether money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// The transaction's category, or `None` if it no longer exists.
    pub category: Option<CategorySummary>,
    /// The amount of money earned or spent.
    pub amount: Money,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// When the transaction happened.
    #[serde(with = "date_format")]
    pub date: Date,
}

/// Get the transactions selected by `filter`, in the order given by [TransactionQueryFilter::order].
///
/// # Errors
/// Returns [Error::SqlError] if:
/// - SQL query preparation or execution fails
/// - Transaction row mapping fails
pub fn query_transactions(
    filter: &TransactionQueryFilter,
    connection: &Connection,
) -> Result<Vec<CategorizedTransaction>, Error> {
    let (start, end) = match &filter.date_range {
        Some(range) => (Some(range.start), range.end),
        None => (None, None),
    };

    let query = format!(
        "SELECT t.id, t.user_id, t.type, t.amount, t.description, t.date,
                    category.id, category.name, category.type
             FROM \"transaction\" t
             LEFT JOIN category ON t.category_id = category.id
             WHERE t.user_id = :owner_id
               AND (:start IS NULL OR t.date >= :start)
               AND (:end IS NULL OR t.date < :end)
               AND (:type IS NULL OR t.type = :type)
               AND (:category_id IS NULL OR t.category_id = :category_id)
             ORDER BY {}",
        filter.order.as_sql()
    );

    connection
        .prepare(&query)?
        .query_map(
            named_params! {
                ":owner_id": filter.owner_id.as_i64(),
                ":start": start,
                ":end": end,
                ":type": filter.kind,
                ":category_id": filter.category_id,
            },
            map_categorized_row,
        )?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect()
}

fn map_categorized_row(row: &Row) -> Result<CategorizedTransaction, rusqlite::Error> {
    let category = match row.get::<usize, Option<CategoryId>>(6)? {
        Some(id) => Some(CategorySummary {
            id,
            name: CategoryName::new_unchecked(&row.get::<usize, String>(7)?),
            kind: row.get(8)?,
        }),
        None => None,
    };

    Ok(CategorizedTransaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        kind: row.get(2)?,
        category,
        amount: row.get(3)?,
        description: row.get(4)?,
        date: row.get(5)?,
    })
}

#[cfg(test)]
mod query_tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        analytics::DateRange,
        auth::{NewUser, PasswordHash, UserID, create_user},
        category::{Category, CategoryName, NewCategory, TransactionType, create_category},
        db::initialize,
        money::Money,
        transaction::{Transaction, create_transaction},
    };

    use super::{TransactionOrder, TransactionQueryFilter, query_transactions};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn insert_user(email: &str, conn: &Connection) -> UserID {
        create_user(
            NewUser {
                username: "test".to_owned(),
                email: email.to_owned(),
                password_hash: PasswordHash::new_unchecked("hunter2"),
                profile_image: None,
            },
            conn,
        )
        .unwrap()
        .id
    }

    fn insert_category(name: &str, kind: TransactionType, conn: &Connection) -> Category {
        create_category(
            NewCategory {
                name: CategoryName::new_unchecked(name),
                kind,
                description: None,
            },
            conn,
        )
        .unwrap()
    }

    fn insert_transaction(
        user_id: UserID,
        category: &Category,
        cents: i64,
        date: time::Date,
        conn: &Connection,
    ) -> Transaction {
        create_transaction(
            Transaction::build(
                user_id,
                category.kind,
                category.id,
                Money::from_cents(cents),
                date,
            ),
            conn,
        )
        .unwrap()
    }

    #[test]
    fn selects_only_owners_transactions() {
        let conn = get_test_connection();
        let alice = insert_user("alice@example.com", &conn);
        let bob = insert_user("bob@example.com", &conn);
        let rent = insert_category("Rent", TransactionType::Expense, &conn);
        let alices = insert_transaction(alice, &rent, 100, date!(2024 - 03 - 01), &conn);
        insert_transaction(bob, &rent, 200, date!(2024 - 03 - 01), &conn);

        let got = query_transactions(&TransactionQueryFilter::new(alice), &conn).unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, alices.id);
        assert_eq!(got[0].user_id, alice);
    }

    #[test]
    fn joins_category_name_and_type() {
        let conn = get_test_connection();
        let alice = insert_user("alice@example.com", &conn);
        let rent = insert_category("Rent", TransactionType::Expense, &conn);
        insert_transaction(alice, &rent, 100, date!(2024 - 03 - 01), &conn);

        let got = query_transactions(&TransactionQueryFilter::new(alice), &conn).unwrap();

        let category = got[0].category.as_ref().expect("category should be joined");
        assert_eq!(category.id, rent.id);
        assert_eq!(category.name.as_ref(), "Rent");
        assert_eq!(category.kind, TransactionType::Expense);
    }

    #[test]
    fn missing_category_is_none() {
        let conn = get_test_connection();
        let alice = insert_user("alice@example.com", &conn);
        let rent = insert_category("Rent", TransactionType::Expense, &conn);
        insert_transaction(alice, &rent, 100, date!(2024 - 03 - 01), &conn);
        conn.execute("DELETE FROM category WHERE id = ?1", (rent.id,))
            .unwrap();

        let got = query_transactions(&TransactionQueryFilter::new(alice), &conn).unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].category, None);
    }

    #[test]
    fn half_open_range_excludes_end_date() {
        let conn = get_test_connection();
        let alice = insert_user("alice@example.com", &conn);
        let rent = insert_category("Rent", TransactionType::Expense, &conn);
        insert_transaction(alice, &rent, 100, date!(2023 - 12 - 31), &conn);
        let first = insert_transaction(alice, &rent, 200, date!(2024 - 01 - 01), &conn);
        let last = insert_transaction(alice, &rent, 300, date!(2024 - 12 - 31), &conn);
        insert_transaction(alice, &rent, 400, date!(2025 - 01 - 01), &conn);

        let filter = TransactionQueryFilter::new(alice).date_range(DateRange {
            start: date!(2024 - 01 - 01),
            end: Some(date!(2025 - 01 - 01)),
        });
        let got = query_transactions(&filter, &conn).unwrap();

        let got_ids: Vec<_> = got.iter().map(|transaction| transaction.id).collect();
        assert_eq!(got_ids, vec![last.id, first.id]);
    }

    #[test]
    fn inclusive_range_includes_end_date() {
        let conn = get_test_connection();
        let alice = insert_user("alice@example.com", &conn);
        let rent = insert_category("Rent", TransactionType::Expense, &conn);
        let start = insert_transaction(alice, &rent, 100, date!(2024 - 03 - 01), &conn);
        let end = insert_transaction(alice, &rent, 200, date!(2024 - 03 - 31), &conn);
        insert_transaction(alice, &rent, 300, date!(2024 - 04 - 01), &conn);

        let filter = TransactionQueryFilter::new(alice)
            .between_inclusive(date!(2024 - 03 - 01), date!(2024 - 03 - 31));
        let got = query_transactions(&filter, &conn).unwrap();

        let got_ids: Vec<_> = got.iter().map(|transaction| transaction.id).collect();
        assert_eq!(got_ids, vec![end.id, start.id]);
    }

    #[test]
    fn filters_by_type_and_category() {
        let conn = get_test_connection();
        let alice = insert_user("alice@example.com", &conn);
        let rent = insert_category("Rent", TransactionType::Expense, &conn);
        let food = insert_category("Food", TransactionType::Expense, &conn);
        let wages = insert_category("Wages", TransactionType::Income, &conn);
        insert_transaction(alice, &rent, 100, date!(2024 - 03 - 01), &conn);
        let groceries = insert_transaction(alice, &food, 200, date!(2024 - 03 - 02), &conn);
        let pay = insert_transaction(alice, &wages, 300, date!(2024 - 03 - 03), &conn);

        let incomes = query_transactions(
            &TransactionQueryFilter::new(alice).kind(Some(TransactionType::Income)),
            &conn,
        )
        .unwrap();
        let food_only = query_transactions(
            &TransactionQueryFilter::new(alice).category(Some(food.id)),
            &conn,
        )
        .unwrap();

        assert_eq!(incomes.len(), 1);
        assert_eq!(incomes[0].id, pay.id);
        assert_eq!(food_only.len(), 1);
        assert_eq!(food_only[0].id, groceries.id);
    }

    #[test]
    fn orders_by_date_then_id_descending() {
        let conn = get_test_connection();
        let alice = insert_user("alice@example.com", &conn);
        let rent = insert_category("Rent", TransactionType::Expense, &conn);
        let older = insert_transaction(alice, &rent, 100, date!(2024 - 03 - 01), &conn);
        let first_same_day = insert_transaction(alice, &rent, 200, date!(2024 - 03 - 02), &conn);
        let second_same_day = insert_transaction(alice, &rent, 300, date!(2024 - 03 - 02), &conn);

        let got = query_transactions(&TransactionQueryFilter::new(alice), &conn).unwrap();

        let got_ids: Vec<_> = got.iter().map(|transaction| transaction.id).collect();
        assert_eq!(
            got_ids,
            vec![second_same_day.id, first_same_day.id, older.id]
        );
    }

    #[test]
    fn recorded_order_ignores_dates() {
        let conn = get_test_connection();
        let alice = insert_user("alice@example.com", &conn);
        let rent = insert_category("Rent", TransactionType::Expense, &conn);
        let food = insert_category("Food", TransactionType::Expense, &conn);
        let rent_payment = insert_transaction(alice, &rent, 150_000, date!(2024 - 02 - 01), &conn);
        let groceries = insert_transaction(alice, &food, 100_000, date!(2024 - 02 - 10), &conn);
        let backdated = insert_transaction(alice, &food, 5_000, date!(2024 - 01 - 05), &conn);

        let recorded = query_transactions(
            &TransactionQueryFilter::new(alice).order(TransactionOrder::Recorded),
            &conn,
        )
        .unwrap();
        let newest_first = query_transactions(&TransactionQueryFilter::new(alice), &conn).unwrap();

        let recorded_ids: Vec<_> = recorded.iter().map(|transaction| transaction.id).collect();
        let newest_first_ids: Vec<_> = newest_first
            .iter()
            .map(|transaction| transaction.id)
            .collect();
        assert_eq!(
            recorded_ids,
            vec![rent_payment.id, groceries.id, backdated.id]
        );
        assert_eq!(
            newest_first_ids,
            vec![groceries.id, rent_payment.id, backdated.id]
        );
    }
}
