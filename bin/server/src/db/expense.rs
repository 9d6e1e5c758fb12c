//! Postgres-backed expense store.

use async_trait::async_trait;
use chrono::NaiveDate;
use pocket_ledger_core::UserScope;
use pocket_ledger_expense::{Category, Expense, ExpenseKey, ExpenseStore, StoreError, keyed};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use tracing::instrument;

/// Row type for expense queries.
#[derive(Debug, FromRow)]
struct ExpenseRow {
    name: String,
    date: NaiveDate,
    amount: i64,
    category: String,
}

impl ExpenseRow {
    fn try_into_expense(self) -> Result<Expense, StoreError> {
        let category: Category = self.category.parse().map_err(|e| StoreError::Corrupt {
            reason: format!("expense '{}': {e}", self.name),
        })?;
        Expense::new(self.name, self.date, self.amount, category).map_err(|e| StoreError::Corrupt {
            reason: e.to_string(),
        })
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable {
        reason: e.to_string(),
    }
}

/// Expense store over the `expenses` table.
///
/// Rows are append-only; listing returns them in insertion order so record
/// keys are assigned the same way as in the in-memory store.
#[derive(Debug, Clone)]
pub struct PgExpenseStore {
    pool: PgPool,
}

impl PgExpenseStore {
    /// Creates a new store.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExpenseStore for PgExpenseStore {
    #[instrument(skip_all, fields(scope = %scope))]
    async fn record(&self, scope: &UserScope, expense: Expense) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO expenses (scope, name, date, amount, category)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(scope.as_str())
        .bind(&expense.name)
        .bind(expense.date)
        .bind(expense.amount)
        .bind(expense.category.as_str())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    #[instrument(skip_all, fields(scope = %scope))]
    async fn list(&self, scope: &UserScope) -> Result<BTreeMap<ExpenseKey, Expense>, StoreError> {
        let rows: Vec<ExpenseRow> = sqlx::query_as(
            r#"
            SELECT name, date, amount, category
            FROM expenses
            WHERE scope = $1
            ORDER BY id ASC
            "#,
        )
        .bind(scope.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let expenses = rows
            .into_iter()
            .map(ExpenseRow::try_into_expense)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keyed(expenses))
    }
}
