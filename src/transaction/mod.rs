//! Transaction management for the finance tracker.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, querying, and managing transactions
//! - Route handlers for the transaction API

mod core;
mod endpoints;
mod filter;

pub use self::core::{
    Transaction, TransactionBuilder, TransactionUpdate, create_transaction,
    create_transaction_table, delete_transaction, get_transaction, update_transaction,
};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transactions_endpoint,
    update_transaction_endpoint,
};
pub use filter::{
    CategorizedTransaction, CategorySummary, TransactionOrder, TransactionQueryFilter,
    query_transactions,
};
