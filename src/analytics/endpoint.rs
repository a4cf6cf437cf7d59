//! The route handler for the analytics report.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{AppState, Error, auth::UserID, transaction::query_transactions};

use super::{color::ColorAssigner, period::AnalyticsQuery, report::generate_report};

/// The state needed for the analytics report.
#[derive(Debug, Clone)]
pub struct AnalyticsState {
    /// Picks the chart color for each expense category.
    pub colors: ColorAssigner,
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AnalyticsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            colors: state.colors.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for the current user's analytics report.
///
/// Expects the query parameters `year` and, optionally, `month`.
pub async fn get_analytics_endpoint(
    State(state): State<AnalyticsState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Response, Error> {
    let report = generate_report(user_id, &query, &state.colors, |filter| {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        query_transactions(filter, &connection)
    })?;

    Ok(Json(json!({
        "message": "Analytics fetched successfully",
        "analytics": report,
    }))
    .into_response())
}
