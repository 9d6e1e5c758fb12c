//! Storage interface for expense records.

use crate::error::{ExpenseError, StoreError};
use crate::expense::{Expense, ExpenseKey, keyed};
use async_trait::async_trait;
use chrono::NaiveDate;
use pocket_ledger_core::UserScope;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::instrument;

/// Scoped append/list interface to the storage collaborator.
///
/// Each call is atomic on its own; calls for the same scope from concurrent
/// requests are not ordered relative to each other.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Appends one record under `scope`.
    async fn record(&self, scope: &UserScope, expense: Expense) -> Result<(), StoreError>;

    /// Returns every record under `scope`.
    async fn list(&self, scope: &UserScope) -> Result<BTreeMap<ExpenseKey, Expense>, StoreError>;
}

/// Inclusive date range used to filter listed records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// Earliest date to include.
    pub start: Option<NaiveDate>,
    /// Latest date to include.
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Creates a range, rejecting a start after the end.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, ExpenseError> {
        match (start, end) {
            (Some(s), Some(e)) if s > e => Err(ExpenseError::InvertedRange {
                start: s.to_string(),
                end: e.to_string(),
            }),
            _ => Ok(Self { start, end }),
        }
    }

    /// Returns true if neither bound is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Returns true if `date` lies within the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| s <= date) && self.end.is_none_or(|e| date <= e)
    }

    /// Keeps the records dated within the range.
    #[must_use]
    pub fn filter(
        &self,
        expenses: BTreeMap<ExpenseKey, Expense>,
    ) -> BTreeMap<ExpenseKey, Expense> {
        if self.is_unbounded() {
            return expenses;
        }
        expenses
            .into_iter()
            .filter(|(_, e)| self.contains(e.date))
            .collect()
    }
}

/// Process-local store, used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct InMemoryExpenseStore {
    scopes: RwLock<HashMap<UserScope, Vec<Expense>>>,
}

impl InMemoryExpenseStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable {
            reason: "in-memory store lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl ExpenseStore for InMemoryExpenseStore {
    #[instrument(skip_all, fields(scope = %scope))]
    async fn record(&self, scope: &UserScope, expense: Expense) -> Result<(), StoreError> {
        let mut scopes = self.scopes.write().map_err(|_| Self::poisoned())?;
        scopes.entry(scope.clone()).or_default().push(expense);
        Ok(())
    }

    #[instrument(skip_all, fields(scope = %scope))]
    async fn list(&self, scope: &UserScope) -> Result<BTreeMap<ExpenseKey, Expense>, StoreError> {
        let scopes = self.scopes.read().map_err(|_| Self::poisoned())?;
        Ok(scopes
            .get(scope)
            .map(|records| keyed(records.iter().cloned()))
            .unwrap_or_default())
    }
}
