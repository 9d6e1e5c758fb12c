//! Tool handlers and the dispatch table.
//!
//! Every catalog tool is bound to exactly one handler when the registry is
//! built, so an incomplete table fails at startup rather than mid-conversation.

use crate::error::{RegistryError, ToolError};
use crate::tool::{LIST_ALL_EXPENSE, RECORD_EXPENSE, ToolCatalog, ToolInvocation};
use async_trait::async_trait;
use pocket_ledger_ai::RetryPolicy;
use pocket_ledger_core::UserScope;
use pocket_ledger_expense::{
    Category, DateRange, Expense, ExpenseStore, StoreError, amount_from_input,
};
use rootcause::prelude::Report;
use serde_json::{Map as JsonMap, Value as JsonValue, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Executes one declared tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the invocation for `scope` and returns the result for the model.
    async fn call(
        &self,
        scope: &UserScope,
        invocation: &ToolInvocation,
    ) -> Result<JsonValue, ToolError>;
}

/// Name to handler table, validated against a catalog.
#[derive(Clone)]
pub struct ToolRegistry {
    catalog: Arc<ToolCatalog>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tools: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        tools.sort_unstable();
        f.debug_struct("ToolRegistry").field("tools", &tools).finish()
    }
}

impl ToolRegistry {
    /// Starts a registry for `catalog`.
    #[must_use]
    pub fn builder(catalog: Arc<ToolCatalog>) -> ToolRegistryBuilder {
        ToolRegistryBuilder {
            catalog,
            handlers: HashMap::new(),
        }
    }

    /// The expense catalog bound to handlers over `store`.
    pub fn for_expenses(
        catalog: Arc<ToolCatalog>,
        store: Arc<dyn ExpenseStore>,
        retry: RetryPolicy,
    ) -> Result<Self, Report<RegistryError>> {
        Self::builder(catalog)
            .register(
                RECORD_EXPENSE,
                Arc::new(RecordExpenseHandler::new(Arc::clone(&store), retry)),
            )?
            .register(
                LIST_ALL_EXPENSE,
                Arc::new(ListExpensesHandler::new(store, retry)),
            )?
            .build()
    }

    /// The catalog this registry serves.
    #[must_use]
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Returns true if the model may call `name`.
    #[must_use]
    pub fn is_declared(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Routes an invocation to its handler.
    ///
    /// Undeclared names are rejected before any handler runs.
    pub async fn dispatch(
        &self,
        scope: &UserScope,
        invocation: &ToolInvocation,
    ) -> Result<JsonValue, ToolError> {
        let handler =
            self.handlers
                .get(&invocation.name)
                .ok_or_else(|| ToolError::UndeclaredTool {
                    name: invocation.name.clone(),
                })?;
        handler.call(scope, invocation).await
    }
}

/// Collects handlers and checks them against the catalog.
pub struct ToolRegistryBuilder {
    catalog: Arc<ToolCatalog>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl std::fmt::Debug for ToolRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistryBuilder")
            .field("declared", &self.catalog.len())
            .field("bound", &self.handlers.len())
            .finish()
    }
}

impl ToolRegistryBuilder {
    /// Binds `handler` to the declared tool `name`.
    pub fn register(
        mut self,
        name: &str,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self, Report<RegistryError>> {
        if !self.catalog.contains(name) {
            return Err(RegistryError::UnknownTool {
                name: name.to_string(),
            }
            .into());
        }
        if self.handlers.insert(name.to_string(), handler).is_some() {
            return Err(RegistryError::DuplicateHandler {
                name: name.to_string(),
            }
            .into());
        }
        Ok(self)
    }

    /// Finishes the registry, failing if any declared tool is unbound.
    pub fn build(self) -> Result<ToolRegistry, Report<RegistryError>> {
        if let Some(missing) = self
            .catalog
            .all()
            .find(|tool| !self.handlers.contains_key(&tool.name))
        {
            return Err(RegistryError::MissingHandler {
                name: missing.name.clone(),
            }
            .into());
        }
        Ok(ToolRegistry {
            catalog: self.catalog,
            handlers: self.handlers,
        })
    }
}

fn expense_json(expense: &Expense) -> JsonValue {
    json!({
        "name": expense.name,
        "date": expense.date.to_string(),
        "amount": expense.amount,
        "category": expense.category.as_str(),
    })
}

/// Appends one expense.
pub struct RecordExpenseHandler {
    store: Arc<dyn ExpenseStore>,
    retry: RetryPolicy,
}

impl RecordExpenseHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(store: Arc<dyn ExpenseStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    fn parse(invocation: &ToolInvocation) -> Result<Expense, ToolError> {
        let args = invocation.arguments();
        let invalid = |source| ToolError::InvalidExpense {
            tool: invocation.name.clone(),
            source,
        };

        let name = args.required_str("name")?;
        let date = args.required_date("date")?;
        let amount = amount_from_input(args.required_number("amount")?).map_err(invalid)?;
        let category: Category = args.required_str("category")?.parse().map_err(invalid)?;
        Expense::new(name, date, amount, category).map_err(invalid)
    }
}

#[async_trait]
impl ToolHandler for RecordExpenseHandler {
    #[instrument(skip_all, fields(scope = %scope, tool = %invocation.name))]
    async fn call(
        &self,
        scope: &UserScope,
        invocation: &ToolInvocation,
    ) -> Result<JsonValue, ToolError> {
        let expense = Self::parse(invocation)?;

        let stored = self
            .retry
            .run("expense_store.record", StoreError::is_transient, || {
                self.store.record(scope, expense.clone())
            })
            .await;

        let mut result = expense_json(&expense);
        match stored {
            Ok(()) => {
                info!(name = %expense.name, date = %expense.date, amount = expense.amount, "expense recorded");
                result["status"] = json!("Success");
            }
            Err(e) => {
                error!(
                    reconciliation = true,
                    scope = %scope,
                    name = %expense.name,
                    date = %expense.date,
                    amount = expense.amount,
                    category = %expense.category,
                    error = %e,
                    "expense accepted but not stored"
                );
                result["status"] = json!("Accepted");
            }
        }
        Ok(result)
    }
}

/// Lists expenses in an optional inclusive date range.
pub struct ListExpensesHandler {
    store: Arc<dyn ExpenseStore>,
    retry: RetryPolicy,
}

impl ListExpensesHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(store: Arc<dyn ExpenseStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }
}

#[async_trait]
impl ToolHandler for ListExpensesHandler {
    #[instrument(skip_all, fields(scope = %scope, tool = %invocation.name))]
    async fn call(
        &self,
        scope: &UserScope,
        invocation: &ToolInvocation,
    ) -> Result<JsonValue, ToolError> {
        let args = invocation.arguments();
        let range = DateRange::new(
            args.optional_date("startDate")?,
            args.optional_date("endDate")?,
        )
        .map_err(|source| ToolError::InvalidRange {
            tool: invocation.name.clone(),
            source,
        })?;

        let all = self
            .retry
            .run("expense_store.list", StoreError::is_transient, || {
                self.store.list(scope)
            })
            .await
            .map_err(|e| ToolError::StoreUnavailable {
                tool: invocation.name.clone(),
                reason: e.to_string(),
            })?;

        let selected = range.filter(all);
        let total: i64 = selected.values().map(|e| e.amount).sum();
        let expenses: JsonMap<String, JsonValue> = selected
            .iter()
            .map(|(key, expense)| (key.to_string(), expense_json(expense)))
            .collect();

        Ok(json!({
            "count": selected.len(),
            "total": total,
            "expenses": expenses,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolDefinition;
    use pocket_ledger_core::PlatformUserId;
    use pocket_ledger_expense::{ExpenseKey, InMemoryExpenseStore};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn scope(user: &str) -> UserScope {
        UserScope::for_user("accounting", &PlatformUserId::new(user).unwrap())
    }

    fn invocation(name: &str, args: JsonValue) -> ToolInvocation {
        let JsonValue::Object(map) = args else {
            panic!("arguments must be an object");
        };
        ToolInvocation::new(name, map)
    }

    fn registry(store: Arc<dyn ExpenseStore>) -> ToolRegistry {
        ToolRegistry::for_expenses(
            Arc::new(ToolCatalog::expense_tools()),
            store,
            RetryPolicy::once(Duration::ZERO),
        )
        .unwrap()
    }

    /// Fails every call and counts attempts.
    #[derive(Default)]
    struct DownStore {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ExpenseStore for DownStore {
        async fn record(&self, _: &UserScope, _: Expense) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable {
                reason: "connection refused".into(),
            })
        }

        async fn list(
            &self,
            _: &UserScope,
        ) -> Result<BTreeMap<ExpenseKey, Expense>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable {
                reason: "connection refused".into(),
            })
        }
    }

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, _: &UserScope, _: &ToolInvocation) -> Result<JsonValue, ToolError> {
            Ok(json!("echo"))
        }
    }

    #[test]
    fn registry_rejects_unknown_tool() {
        let err = ToolRegistry::builder(Arc::new(ToolCatalog::expense_tools()))
            .register("deleteExpense", Arc::new(Echo))
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            RegistryError::UnknownTool { .. }
        ));
    }

    #[test]
    fn registry_rejects_missing_handler() {
        let err = ToolRegistry::builder(Arc::new(ToolCatalog::expense_tools()))
            .register(RECORD_EXPENSE, Arc::new(Echo))
            .unwrap()
            .build()
            .unwrap_err();
        assert_eq!(
            err.current_context(),
            &RegistryError::MissingHandler {
                name: LIST_ALL_EXPENSE.to_string()
            }
        );
    }

    #[test]
    fn registry_rejects_duplicate_handler() {
        let catalog = Arc::new(ToolCatalog::new([ToolDefinition::new("ping", "Ping")]));
        let err = ToolRegistry::builder(catalog)
            .register("ping", Arc::new(Echo))
            .unwrap()
            .register("ping", Arc::new(Echo))
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            RegistryError::DuplicateHandler { .. }
        ));
    }

    #[tokio::test]
    async fn undeclared_tool_never_reaches_store() {
        let store = Arc::new(DownStore::default());
        let registry = registry(store.clone());

        let err = registry
            .dispatch(&scope("U1"), &invocation("dropAll", json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::UndeclaredTool { .. }));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn record_then_list_truncates_amount() {
        let store = Arc::new(InMemoryExpenseStore::new());
        let registry = registry(store);
        let scope = scope("U1");

        let recorded = registry
            .dispatch(
                &scope,
                &invocation(
                    RECORD_EXPENSE,
                    json!({"name": "lunch", "date": "2024-04-17", "amount": 50.7, "category": "食"}),
                ),
            )
            .await
            .unwrap();
        assert_eq!(recorded["status"], "Success");
        assert_eq!(recorded["amount"], 50);
        assert_eq!(recorded["category"], "food");

        let listed = registry
            .dispatch(&scope, &invocation(LIST_ALL_EXPENSE, json!({})))
            .await
            .unwrap();
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["total"], 50);
        assert_eq!(listed["expenses"]["2024-04-17_lunch"]["amount"], 50);
    }

    #[tokio::test]
    async fn list_filters_inclusive_range() {
        let store = Arc::new(InMemoryExpenseStore::new());
        let registry = registry(store);
        let scope = scope("U1");
        for (name, date) in [("rent", "2024-03-31"), ("bus", "2024-04-01"), ("taxi", "2024-04-30")] {
            registry
                .dispatch(
                    &scope,
                    &invocation(
                        RECORD_EXPENSE,
                        json!({"name": name, "date": date, "amount": 10, "category": "transport"}),
                    ),
                )
                .await
                .unwrap();
        }

        let listed = registry
            .dispatch(
                &scope,
                &invocation(
                    LIST_ALL_EXPENSE,
                    json!({"startDate": "2024-04-01", "endDate": "2024-04-30"}),
                ),
            )
            .await
            .unwrap();

        assert_eq!(listed["count"], 2);
        assert!(listed["expenses"].get("2024-03-31_rent").is_none());
        assert!(listed["expenses"].get("2024-04-30_taxi").is_some());
    }

    #[tokio::test]
    async fn inverted_range_names_the_range() {
        let store = Arc::new(InMemoryExpenseStore::new());
        let registry = registry(store);

        let err = registry
            .dispatch(
                &scope("U1"),
                &invocation(
                    LIST_ALL_EXPENSE,
                    json!({"startDate": "2024-05-01", "endDate": "2024-04-01"}),
                ),
            )
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(matches!(err, ToolError::InvalidRange { .. }));
        assert!(err.to_string().contains("date range"));
        assert!(!err.to_string().contains("startDate"));
    }

    #[tokio::test]
    async fn invalid_category_is_validation_error() {
        let store = Arc::new(InMemoryExpenseStore::new());
        let registry = registry(store.clone());

        let err = registry
            .dispatch(
                &scope("U1"),
                &invocation(
                    RECORD_EXPENSE,
                    json!({"name": "movie", "date": "2024-04-17", "amount": 12, "category": "fun"}),
                ),
            )
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(store.list(&scope("U1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_store_failure_is_accepted_after_one_retry() {
        let store = Arc::new(DownStore::default());
        let registry = registry(store.clone());

        let result = registry
            .dispatch(
                &scope("U1"),
                &invocation(
                    RECORD_EXPENSE,
                    json!({"name": "lunch", "date": "2024-04-17", "amount": 5, "category": "food"}),
                ),
            )
            .await
            .unwrap();

        assert_eq!(result["status"], "Accepted");
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn list_store_failure_is_reported() {
        let store = Arc::new(DownStore::default());
        let registry = registry(store.clone());

        let err = registry
            .dispatch(&scope("U1"), &invocation(LIST_ALL_EXPENSE, json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::StoreUnavailable { .. }));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
