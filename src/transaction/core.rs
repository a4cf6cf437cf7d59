//! Defines the core data models and database queries for transactions.

use rusqlite::{Connection, Row, named_params};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    auth::UserID,
    category::{TransactionType, get_category},
    database_id::{CategoryId, TransactionId},
    money::Money,
};

// Dates are written as plain ISO 8601 calendar dates, e.g. "2024-03-09".
time::serde::format_description!(pub(crate) date_format, Date, "[year]-[month]-[day]");

// ============================================================================
// MODELS
// ============================================================================

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that recorded the transaction.
    #[serde(rename = "user")]
    pub user_id: UserID,
    /// Whether money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// The ID of the category the transaction belongs to.
    ///
    /// This is `None` if the category was deleted after the transaction was recorded.
    #[serde(rename = "category")]
    pub category_id: Option<CategoryId>,
    /// The amount of money earned or spent. Never negative.
    pub amount: Money,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// When the transaction happened.
    #[serde(with = "date_format")]
    pub date: Date,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        user_id: UserID,
        kind: TransactionType,
        category_id: CategoryId,
        amount: Money,
        date: Date,
    ) -> TransactionBuilder {
        TransactionBuilder {
            user_id,
            kind,
            category_id,
            amount,
            date,
            description: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// # Examples
///
/// ```ignore
/// use time::macros::date;
///
/// let transaction = Transaction::build(
///         user_id,
///         TransactionType::Expense,
///         rent.id,
///         Money::from_cents(150_000),
///         date!(2024 - 03 - 01),
///     )
///     .description(Some("March rent".to_owned()));
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The user recording the transaction.
    pub user_id: UserID,

    /// Whether money was earned or spent. Must match the type of the category.
    pub kind: TransactionType,

    /// The category the transaction belongs to.
    pub category_id: CategoryId,

    /// The amount of money that changed hands.
    ///
    /// Amounts are never negative, the direction of the money is given by `kind`.
    pub amount: Money,

    /// The date when the transaction occurred.
    pub date: Date,

    /// A human-readable description of the transaction.
    pub description: Option<String>,
}

impl TransactionBuilder {
    /// Set the description for the transaction.
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// Changes to apply to an existing transaction.
///
/// Fields that are `None` keep their current value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransactionUpdate {
    /// The new transaction type.
    pub kind: Option<TransactionType>,
    /// The new category.
    pub category_id: Option<CategoryId>,
    /// The new amount.
    pub amount: Option<Money>,
    /// The new description.
    pub description: Option<String>,
    /// The new date.
    pub date: Option<Date>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Check that a transaction of type `kind` may be recorded against `category_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::CategoryNotFound] if `category_id` does not refer to a category,
/// - [Error::CategoryTypeMismatch] if the category is not of type `kind`,
/// - or [Error::SqlError] if there is some other SQL error.
fn check_category(
    kind: TransactionType,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    let category = get_category(category_id, connection)?;

    if category.kind != kind {
        return Err(Error::CategoryTypeMismatch);
    }

    Ok(())
}

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::NegativeAmount] if the amount is less than zero,
/// - [Error::CategoryNotFound] if the category ID does not refer to a real category,
/// - [Error::CategoryTypeMismatch] if the category is not the same type as the transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if builder.amount.is_negative() {
        return Err(Error::NegativeAmount);
    }

    check_category(builder.kind, builder.category_id, connection)?;

    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (user_id, type, category_id, amount, description, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id, user_id, type, category_id, amount, description, date",
        )?
        .query_row(
            (
                builder.user_id.as_i64(),
                builder.kind,
                builder.category_id,
                builder.amount,
                builder.description,
                builder.date,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve the transaction with `id` recorded by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "SELECT id, user_id, type, category_id, amount, description, date
             FROM \"transaction\" WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(
            named_params! { ":id": id, ":user_id": user_id.as_i64() },
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TransactionNotFound,
            error => error.into(),
        })
}

/// Apply `update` to the transaction with `id` recorded by `user_id`.
///
/// The type and category that the transaction ends up with are checked against each other,
/// using the current values for whichever of the two is not being changed.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - [Error::NegativeAmount] if the new amount is less than zero,
/// - [Error::CategoryNotFound] if the new category does not exist,
/// - [Error::CategoryTypeMismatch] if the resulting type and category do not match,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    user_id: UserID,
    update: TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let current = get_transaction(id, user_id, connection)?;

    let amount = update.amount.unwrap_or(current.amount);
    if amount.is_negative() {
        return Err(Error::NegativeAmount);
    }

    let kind = update.kind.unwrap_or(current.kind);
    let category_id = update.category_id.or(current.category_id);

    if update.kind.is_some() || update.category_id.is_some() {
        match category_id {
            Some(category_id) => check_category(kind, category_id, connection)?,
            // The old category was deleted and no replacement was given.
            None => return Err(Error::CategoryNotFound),
        }
    }

    let transaction = connection
        .prepare(
            "UPDATE \"transaction\"
             SET type = ?1, category_id = ?2, amount = ?3, description = ?4, date = ?5
             WHERE id = ?6 AND user_id = ?7
             RETURNING id, user_id, type, category_id, amount, description, date",
        )?
        .query_row(
            (
                kind,
                category_id,
                amount,
                update.description.or(current.description),
                update.date.unwrap_or(current.date),
                id,
                user_id.as_i64(),
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TransactionNotFound,
            error => error.into(),
        })?;

    Ok(transaction)
}

/// Delete the transaction with `id` recorded by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::TransactionNotFound);
    }

    Ok(())
}

/// Create the transaction table in the database.
///
/// The user and category tables must already exist.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                category_id INTEGER,
                amount INTEGER NOT NULL CHECK (amount >= 0),
                description TEXT,
                date TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    // Every query is scoped to a user and most to a date range.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = UserID::new(row.get(1)?);
    let kind = row.get(2)?;
    let category_id = row.get(3)?;
    let amount = row.get(4)?;
    let description = row.get(5)?;
    let date = row.get(6)?;

    Ok(Transaction {
        id,
        user_id,
        kind,
        category_id,
        amount,
        description,
        date,
    })
}

// ============================================================================
// TESTS
// ============================================================================
