//! Spendwise is a JSON API for tracking personal income and expenses.
//!
//! Users record transactions against income and expense categories and ask
//! for an analytics report for a year, or a single month of a year. The
//! report is always recomputed from the stored transactions: totals, a
//! per-category breakdown of expenses with stable chart colors, net savings
//! and the savings rate.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod analytics;
mod app_state;
mod auth;
mod category;
mod database_id;
mod db;
mod endpoints;
mod logging;
mod money;
mod routing;
mod transaction;

pub use analytics::{
    AnalyticsQuery, AnalyticsReport, CategoryBreakdown, CategoryTotal, ColorAssigner,
    DEFAULT_PALETTE, DateRange, MAX_YEAR, MIN_YEAR, Period, Totals, UNCATEGORIZED_LABEL,
    aggregate, build_report, generate_report, resolve_period,
};
pub use app_state::{AppState, create_cookie_key};
pub use auth::{
    NewUser, PasswordHash, User, UserID, create_user, get_user_by_email, get_user_by_id,
};
pub use category::{
    Category, CategoryName, NewCategory, TransactionType, create_category, get_categories,
    get_category,
};
pub use database_id::{CategoryId, DatabaseId, TransactionId};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use money::Money;
pub use routing::build_router;
pub use transaction::{
    CategorizedTransaction, CategorySummary, Transaction, TransactionBuilder, TransactionOrder,
    TransactionQueryFilter, TransactionUpdate, create_transaction, delete_transaction,
    get_transaction, query_transactions, update_transaction,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The analytics query did not include a year.
    #[error("Year is required")]
    MissingYear,

    /// The year in the analytics query is not an integer, or is outside the
    /// range of supported dates.
    #[error("\"{0}\" is not a valid year")]
    InvalidYear(String),

    /// The month in the analytics query is not the name of a month.
    #[error("\"{0}\" is not a valid month name")]
    InvalidMonth(String),

    /// One or more required fields were missing from a request.
    ///
    /// The string lists the required fields for the client.
    #[error("{0}")]
    MissingFields(&'static str),

    /// A monetary amount could not be represented, e.g. `NaN` or a number
    /// with too many digits.
    #[error("{0} is not a valid amount")]
    InvalidAmount(String),

    /// Transaction amounts record how much money moved and must not be negative.
    #[error("amount must not be negative")]
    NegativeAmount,

    /// A date in a request could not be parsed.
    ///
    /// Callers should pass in the date string that caused the error.
    #[error("\"{0}\" is not a valid date, expected the format YYYY-MM-DD")]
    InvalidDate(String),

    /// A transaction date lies outside the years that reports can cover.
    #[error("\"{0}\" is outside the supported range of dates")]
    DateOutOfRange(String),

    /// An empty string was used to create a category name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// A category with the same name already exists.
    #[error("Category already exists")]
    DuplicateCategory,

    /// The category ID used for a transaction did not match a category.
    #[error("Category not found")]
    CategoryNotFound,

    /// The type of a transaction does not match the type of its category.
    #[error("Category type mismatch with transaction type")]
    CategoryTypeMismatch,

    /// The transaction does not exist or does not belong to the current user.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// The email address has already been used to register a user.
    #[error("Email already registered")]
    DuplicateEmail,

    /// The email and password did not match a registered user.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The request did not carry a valid session.
    #[error("Not authorized")]
    Unauthorized,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The multipart form could not be read.
    #[error("File upload error: {0}")]
    MultipartError(String),

    /// An uploaded file could not be written to disk.
    #[error("could not save uploaded file: {0}")]
    UploadError(String),

    /// The session expiry could not be computed or formatted.
    #[error("could not create the session token: {0}")]
    SessionError(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("category.name") =>
            {
                Error::DuplicateCategory
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::MissingYear
            | Error::InvalidYear(_)
            | Error::InvalidMonth(_)
            | Error::MissingFields(_)
            | Error::InvalidAmount(_)
            | Error::NegativeAmount
            | Error::InvalidDate(_)
            | Error::DateOutOfRange(_)
            | Error::EmptyCategoryName
            | Error::CategoryTypeMismatch
            | Error::MultipartError(_) => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::CategoryNotFound | Error::TransactionNotFound | Error::NotFound => {
                StatusCode::NOT_FOUND
            }
            Error::DuplicateCategory | Error::DuplicateEmail => StatusCode::CONFLICT,
            Error::HashingError(_)
            | Error::UploadError(_)
            | Error::SessionError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match self {
            Error::MultipartError(error) => json!({
                "message": "File upload error",
                "error": error,
            }),
            error if status.is_server_error() => {
                tracing::error!("An unexpected error occurred: {}", error);
                json!({
                    "message": "Server error",
                    "error": error.to_string(),
                })
            }
            error => json!({ "message": error.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
