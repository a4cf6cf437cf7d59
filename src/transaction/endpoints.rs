//! Route handlers for creating, listing, updating and deleting transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    AppState, Error,
    analytics::{MAX_YEAR, MIN_YEAR},
    auth::UserID,
    category::TransactionType,
    database_id::{CategoryId, TransactionId},
    endpoints::{self, format_endpoint},
    money::Money,
};

use super::{
    core::{
        Transaction, TransactionUpdate, create_transaction, delete_transaction,
        update_transaction,
    },
    filter::{TransactionQueryFilter, query_transactions},
};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// The state needed for the transaction endpoints.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating or updating a transaction.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionData {
    /// Whether money was earned or spent.
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    /// The ID of the category for the transaction.
    pub category: Option<CategoryId>,
    /// The amount of money as a decimal number, e.g. 12.34.
    pub amount: Option<f64>,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// The date of the transaction in the format YYYY-MM-DD.
    pub date: Option<String>,
}

fn parse_date(text: &str) -> Result<Date, Error> {
    Date::parse(text.trim(), DATE_FORMAT).map_err(|_| Error::InvalidDate(text.to_owned()))
}

/// Parse the date of a transaction being recorded or changed.
///
/// Dates must fall in a year that an analytics report can cover.
fn parse_transaction_date(text: &str) -> Result<Date, Error> {
    let date = parse_date(text)?;

    if (MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        Ok(date)
    } else {
        Err(Error::DateOutOfRange(text.to_owned()))
    }
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|description| description.trim().to_owned())
        .filter(|description| !description.is_empty())
}

/// A route handler for creating a new transaction.
///
/// The date defaults to today (UTC) when it is not given.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<TransactionData>,
) -> Result<Response, Error> {
    let (Some(kind), Some(category_id), Some(amount)) = (data.kind, data.category, data.amount)
    else {
        return Err(Error::MissingFields("type, category and amount are required"));
    };

    // A zero amount is treated the same as a missing one.
    if amount == 0.0 {
        return Err(Error::MissingFields("type, category and amount are required"));
    }

    let amount = Money::from_decimal(amount)?;
    let date = match data.date.as_deref() {
        Some(date) => parse_transaction_date(date)?,
        None => OffsetDateTime::now_utc().date(),
    };

    let builder = Transaction::build(user_id, kind, category_id, amount, date)
        .description(clean_description(data.description));

    let transaction = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        create_transaction(builder, &connection)?
    };

    tracing::debug!("User {user_id} created transaction {}", transaction.id);

    Ok((
        StatusCode::CREATED,
        [(
            LOCATION,
            format_endpoint(endpoints::TRANSACTION, transaction.id),
        )],
        Json(json!({
            "message": "Transaction created successfully",
            "transaction": transaction,
        })),
    )
        .into_response())
}

/// The query parameters for listing transactions.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionListQuery {
    /// Only list income or only list expenses.
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    /// Only list transactions in this category.
    pub category: Option<CategoryId>,
    /// The first date to include, YYYY-MM-DD. Only used together with `end`.
    pub start: Option<String>,
    /// The last date to include, YYYY-MM-DD. Only used together with `start`.
    pub end: Option<String>,
}

/// A route handler for listing the current user's transactions, newest first.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Response, Error> {
    let mut filter = TransactionQueryFilter::new(user_id)
        .kind(query.kind)
        .category(query.category);

    if let (Some(start), Some(end)) = (query.start.as_deref(), query.end.as_deref()) {
        filter = filter.between_inclusive(parse_date(start)?, parse_date(end)?);
    }

    let transactions = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        query_transactions(&filter, &connection)?
    };

    Ok(Json(json!({
        "message": "Transactions fetched successfully",
        "transactions": transactions,
    }))
    .into_response())
}

/// A route handler for changing some or all of the fields of a transaction.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
    Json(data): Json<TransactionData>,
) -> Result<Response, Error> {
    let update = TransactionUpdate {
        kind: data.kind,
        category_id: data.category,
        amount: data.amount.map(Money::from_decimal).transpose()?,
        description: clean_description(data.description),
        date: data.date.as_deref().map(parse_transaction_date).transpose()?,
    };

    let transaction = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        update_transaction(transaction_id, user_id, update, &connection)?
    };

    Ok(Json(json!({
        "message": "Transaction updated successfully",
        "transaction": transaction,
    }))
    .into_response())
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Response, Error> {
    {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        delete_transaction(transaction_id, user_id, &connection)?;
    }

    tracing::debug!("User {user_id} deleted transaction {transaction_id}");

    Ok(Json(json!({ "message": "Transaction deleted successfully" })).into_response())
}
