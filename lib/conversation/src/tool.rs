//! Tool catalog for expense conversations.
//!
//! The catalog is the fixed set of functions the model may call. It is built
//! once at startup and shared read-only; the model sees it rendered as
//! function declarations.

use crate::error::ToolError;
use chrono::NaiveDate;
use pocket_ledger_ai::{FunctionCall, FunctionDeclaration};
use pocket_ledger_expense::parse_date;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue, json};

/// Name of the tool that appends an expense.
pub const RECORD_EXPENSE: &str = "recordExpense";

/// Name of the tool that lists expenses.
pub const LIST_ALL_EXPENSE: &str = "listAllExpense";

/// Type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// Free text.
    String,
    /// A JSON number.
    Number,
    /// A `YYYY-MM-DD` string.
    Date,
}

impl ParamType {
    fn schema_type(self) -> &'static str {
        match self {
            Self::String | Self::Date => "STRING",
            Self::Number => "NUMBER",
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Argument key.
    pub name: String,
    /// Expected type.
    pub param_type: ParamType,
    /// Description shown to the model.
    pub description: String,
    /// Whether the argument must be present.
    pub required: bool,
}

impl ParameterSpec {
    /// Creates a required parameter.
    #[must_use]
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
        }
    }

    /// Creates an optional parameter.
    #[must_use]
    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Definition of a tool available during conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared parameters in presentation order.
    pub parameters: Vec<ParameterSpec>,
}

impl ToolDefinition {
    /// Creates a tool with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Renders the model-facing declaration.
    #[must_use]
    pub fn to_declaration(&self) -> FunctionDeclaration {
        let properties: JsonMap<String, JsonValue> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({
                        "type": p.param_type.schema_type(),
                        "description": p.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        let mut parameters = json!({
            "type": "OBJECT",
            "properties": properties,
        });
        if !required.is_empty() {
            parameters["required"] = json!(required);
        }

        FunctionDeclaration {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters,
        }
    }
}

/// The static set of tools offered to the model.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDefinition>,
}

impl ToolCatalog {
    /// Creates a catalog from definitions. Later duplicates are ignored.
    #[must_use]
    pub fn new(definitions: impl IntoIterator<Item = ToolDefinition>) -> Self {
        let mut tools: Vec<ToolDefinition> = Vec::new();
        for definition in definitions {
            if !tools.iter().any(|t| t.name == definition.name) {
                tools.push(definition);
            }
        }
        Self { tools }
    }

    /// The expense assistant's catalog: `recordExpense` and `listAllExpense`.
    #[must_use]
    pub fn expense_tools() -> Self {
        Self::new([
            ToolDefinition::new(
                RECORD_EXPENSE,
                "Record an expense with name, date, amount, and category",
            )
            .with_parameter(ParameterSpec::required(
                "name",
                ParamType::String,
                "The name of the expense",
            ))
            .with_parameter(ParameterSpec::required(
                "date",
                ParamType::Date,
                "The date of the expense in YYYY-MM-DD format",
            ))
            .with_parameter(ParameterSpec::required(
                "amount",
                ParamType::Number,
                "The amount of the expense",
            ))
            .with_parameter(ParameterSpec::required(
                "category",
                ParamType::String,
                "The category of the expense, one of food (食), clothing (衣), housing (住), transport (行)",
            )),
            ToolDefinition::new(
                LIST_ALL_EXPENSE,
                "List all expenses within a specific date range, or all expenses if no dates are specified",
            )
            .with_parameter(ParameterSpec::optional(
                "startDate",
                ParamType::Date,
                "Start date of the period in YYYY-MM-DD format (optional)",
            ))
            .with_parameter(ParameterSpec::optional(
                "endDate",
                ParamType::Date,
                "End date of the period in YYYY-MM-DD format (optional)",
            )),
        ])
    }

    /// Gets a tool definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Returns true if a tool with this name is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns all tool definitions in declaration order.
    pub fn all(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    /// Returns the number of declared tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Converts definitions to model function declarations.
    #[must_use]
    pub fn function_declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools.iter().map(ToolDefinition::to_declaration).collect()
    }
}

/// A tool call proposed by the model. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Proposed tool name.
    pub name: String,
    /// Proposed arguments.
    pub arguments: JsonMap<String, JsonValue>,
}

impl ToolInvocation {
    /// Creates an invocation.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: JsonMap<String, JsonValue>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Typed access to the arguments.
    #[must_use]
    pub fn arguments(&self) -> ToolArguments<'_> {
        ToolArguments {
            tool: &self.name,
            args: &self.arguments,
        }
    }
}

impl From<&FunctionCall> for ToolInvocation {
    fn from(call: &FunctionCall) -> Self {
        Self::new(call.name.clone(), call.args.clone())
    }
}

/// Typed extraction over an invocation's arguments.
#[derive(Debug, Clone, Copy)]
pub struct ToolArguments<'a> {
    tool: &'a str,
    args: &'a JsonMap<String, JsonValue>,
}

impl ToolArguments<'_> {
    fn missing(&self, argument: &str) -> ToolError {
        ToolError::MissingArgument {
            tool: self.tool.to_string(),
            argument: argument.to_string(),
        }
    }

    fn invalid(&self, argument: &str, reason: impl Into<String>) -> ToolError {
        ToolError::InvalidArgument {
            tool: self.tool.to_string(),
            argument: argument.to_string(),
            reason: reason.into(),
        }
    }

    fn present(&self, argument: &str) -> Option<&JsonValue> {
        self.args.get(argument).filter(|v| !v.is_null())
    }

    /// A required string argument.
    pub fn required_str(&self, argument: &str) -> Result<&str, ToolError> {
        match self.present(argument) {
            None => Err(self.missing(argument)),
            Some(JsonValue::String(s)) => Ok(s.as_str()),
            Some(other) => Err(self.invalid(argument, format!("expected a string, got {other}"))),
        }
    }

    /// A required number. Numeric strings are accepted.
    pub fn required_number(&self, argument: &str) -> Result<f64, ToolError> {
        match self.present(argument) {
            None => Err(self.missing(argument)),
            Some(JsonValue::Number(n)) => n
                .as_f64()
                .ok_or_else(|| self.invalid(argument, format!("{n} is out of range"))),
            Some(JsonValue::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| self.invalid(argument, format!("'{s}' is not a number"))),
            Some(other) => Err(self.invalid(argument, format!("expected a number, got {other}"))),
        }
    }

    /// A required `YYYY-MM-DD` date.
    pub fn required_date(&self, argument: &str) -> Result<NaiveDate, ToolError> {
        let value = self.required_str(argument)?;
        parse_date(value).map_err(|e| self.invalid(argument, e.to_string()))
    }

    /// An optional date; absent, null and blank all mean `None`.
    pub fn optional_date(&self, argument: &str) -> Result<Option<NaiveDate>, ToolError> {
        match self.present(argument) {
            None => Ok(None),
            Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
            Some(JsonValue::String(s)) => parse_date(s)
                .map(Some)
                .map_err(|e| self.invalid(argument, e.to_string())),
            Some(other) => Err(self.invalid(argument, format!("expected a date string, got {other}"))),
        }
    }
}
