//! The expense record and its field rules.

use crate::error::ExpenseError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Canonical date format for expense dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Spending category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Meals and groceries.
    Food,
    /// Clothing and accessories.
    Clothing,
    /// Rent, utilities, furnishing.
    Housing,
    /// Commuting and travel.
    Transport,
}

impl Category {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Clothing => "clothing",
            Self::Housing => "housing",
            Self::Transport => "transport",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ExpenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "food" | "食" => Ok(Self::Food),
            "clothing" | "衣" => Ok(Self::Clothing),
            "housing" | "住" => Ok(Self::Housing),
            "transport" | "行" => Ok(Self::Transport),
            _ => Err(ExpenseError::UnknownCategory {
                value: s.to_string(),
            }),
        }
    }
}

/// One recorded transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    /// Free-text label.
    pub name: String,
    /// Calendar date of the transaction.
    pub date: NaiveDate,
    /// Amount in whole currency units.
    pub amount: i64,
    /// Spending category.
    pub category: Category,
}

impl Expense {
    /// Creates an expense, rejecting blank names.
    pub fn new(
        name: impl Into<String>,
        date: NaiveDate,
        amount: i64,
        category: Category,
    ) -> Result<Self, ExpenseError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ExpenseError::EmptyName);
        }
        if amount < 0 {
            return Err(ExpenseError::InvalidAmount {
                value: amount.to_string(),
            });
        }
        Ok(Self {
            name,
            date,
            amount,
            category,
        })
    }

    /// Returns the unsuffixed record key.
    #[must_use]
    pub fn base_key(&self) -> ExpenseKey {
        ExpenseKey(format!("{}_{}", self.date.format(DATE_FORMAT), self.name))
    }
}

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, ExpenseError> {
    let trimmed = value.trim();
    // chrono accepts unpadded fields, the canonical form does not
    if trimmed.len() != 10 {
        return Err(ExpenseError::InvalidDate {
            value: value.to_string(),
        });
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| ExpenseError::InvalidDate {
        value: value.to_string(),
    })
}

/// Converts a model-supplied amount to whole units.
///
/// The fractional part is truncated toward zero: `50.7` becomes `50`.
pub fn amount_from_input(value: f64) -> Result<i64, ExpenseError> {
    if !value.is_finite() || value < 0.0 || value >= i64::MAX as f64 {
        return Err(ExpenseError::InvalidAmount {
            value: value.to_string(),
        });
    }
    Ok(value.trunc() as i64)
}

/// Key of a record within a scope's listing.
///
/// Derived from date and name. Records sharing both get `#2`, `#3`, ... in
/// listing order, so a key is only stable for a given collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseKey(String);

impl ExpenseKey {
    /// Returns the key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExpenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keys a scope's records in append order without dropping duplicates.
#[must_use]
pub fn keyed(expenses: impl IntoIterator<Item = Expense>) -> BTreeMap<ExpenseKey, Expense> {
    let mut map = BTreeMap::new();
    for expense in expenses {
        let base = expense.base_key();
        let mut key = base.clone();
        let mut n = 1;
        while map.contains_key(&key) {
            n += 1;
            key = ExpenseKey(format!("{}#{n}", base.0));
        }
        map.insert(key, expense);
    }
    map
}
