//! Database repositories for pocket-ledger.
//!
//! This module provides data access for:
//! - Expense records, partitioned by user scope

pub mod expense;

pub use expense::PgExpenseStore;
