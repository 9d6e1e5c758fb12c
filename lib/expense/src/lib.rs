//! Expense records for pocket-ledger.
//!
//! This crate provides:
//!
//! - **Expense**: the validated record type and its field rules
//! - **ExpenseStore**: the scoped append/list interface to the storage collaborator
//! - **DateRange**: inclusive local filtering over listed records

pub mod error;
pub mod expense;
pub mod store;

pub use error::{ExpenseError, StoreError};
pub use expense::{Category, Expense, ExpenseKey, amount_from_input, keyed, parse_date};
pub use store::{DateRange, ExpenseStore, InMemoryExpenseStore};
