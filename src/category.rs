//! Categories group transactions by what the money was earned or spent on,
//! e.g. 'Wages', 'Rent', 'Groceries'.
//!
//! Every category is either an income or an expense category, and a
//! transaction must have the same type as its category.

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{AppState, Error, database_id::CategoryId};

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money that was earned.
    Income,
    /// Money that was spent.
    Expense,
}

impl TransactionType {
    fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(FromSqlError::Other(
                format!("unknown transaction type \"{other}\"").into(),
            )),
        }
    }
}

/// The name of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name with surrounding whitespace removed.
    ///
    /// # Errors
    ///
    /// This function will return an error if `name` is empty or only whitespace.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_owned()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category for expenses or income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The unique name of the category.
    pub name: CategoryName,
    /// Whether the category is for income or expenses.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// An optional note about what belongs in the category.
    pub description: Option<String>,
}

/// The data needed to create a [Category].
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    /// The unique name of the category.
    pub name: CategoryName,
    /// Whether the category is for income or expenses.
    pub kind: TransactionType,
    /// An optional note about what belongs in the category.
    pub description: Option<String>,
}

/// Create the category table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                description TEXT
            );",
        (),
    )?;

    Ok(())
}

/// Create a category in the database.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateCategory] if a category with the same name exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(category: NewCategory, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare(
            "INSERT INTO category (name, type, description) VALUES (?1, ?2, ?3)
             RETURNING id, name, type, description",
        )?
        .query_row(
            (
                category.name.as_ref(),
                category.kind,
                category.description.as_deref(),
            ),
            map_category_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve the category with `category_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::CategoryNotFound] if there is no category with `category_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_category(category_id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name, type, description FROM category WHERE id = :id;")?
        .query_row(&[(":id", &category_id)], map_category_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::CategoryNotFound,
            error => error.into(),
        })
}

/// Retrieve all categories sorted by name, optionally only those of `kind`.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_categories(
    kind: Option<TransactionType>,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, name, type, description FROM category
             WHERE (?1 IS NULL OR type = ?1)
             ORDER BY name ASC;",
        )?
        .query_map((kind,), map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_name: String = row.get(1)?;

    Ok(Category {
        id: row.get(0)?,
        name: CategoryName::new_unchecked(&raw_name),
        kind: row.get(2)?,
        description: row.get(3)?,
    })
}

/// The state needed for the category endpoints.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection for managing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating a category.
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryData {
    /// The name of the new category.
    pub name: Option<String>,
    /// Whether the category is for income or expenses.
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    /// An optional note about what belongs in the category.
    pub description: Option<String>,
}

/// A route handler for creating a new category.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Json(data): Json<CategoryData>,
) -> Result<Response, Error> {
    const REQUIRED: &str = "name and type are required";

    let (Some(name), Some(kind)) = (data.name, data.kind) else {
        return Err(Error::MissingFields(REQUIRED));
    };
    let name = CategoryName::new(&name).map_err(|_| Error::MissingFields(REQUIRED))?;
    let description = data
        .description
        .map(|description| description.trim().to_owned())
        .filter(|description| !description.is_empty());

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let category = create_category(
        NewCategory {
            name,
            kind,
            description,
        },
        &connection,
    )?;

    tracing::debug!("Created category {} ({})", category.name, category.kind);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Category created successfully",
            "category": category,
        })),
    )
        .into_response())
}

/// The query parameters for listing categories.
#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    /// Only list categories of this type.
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
}

/// A route handler for listing categories.
pub async fn get_categories_endpoint(
    State(state): State<CategoryState>,
    Query(query): Query<CategoryQuery>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let categories = get_categories(query.kind, &connection)?;

    Ok(Json(json!({
        "message": "Categories fetched successfully",
        "categories": categories,
    }))
    .into_response())
}

#[cfg(test)]
mod category_name_tests {
    use crate::{Error, category::CategoryName};

    #[test]
    fn new_fails_on_empty_string() {
        assert_eq!(CategoryName::new(""), Err(Error::EmptyCategoryName));
        assert_eq!(CategoryName::new("   "), Err(Error::EmptyCategoryName));
    }

    #[test]
    fn new_trims_whitespace() {
        let name = CategoryName::new("  Groceries ").unwrap();

        assert_eq!(name.as_ref(), "Groceries");
    }

    #[test]
    fn new_succeeds_on_non_empty_string() {
        assert!(CategoryName::new("🔥").is_ok())
    }
}
