use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Expense, NewExpense};

pub const EXPENSE_CATEGORIES: [&str; 11] = [
    "Office Supplies",
    "Equipment",
    "Travel",
    "Meals",
    "Utilities",
    "Maintenance",
    "Rent",
    "Insurance",
    "Software",
    "Marketing",
    "Other",
];

/// How many expenses the summary keeps on screen.
pub const RECENT_EXPENSES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseForm {
    pub category: String,
    pub amount: String,
    #[serde(default)]
    pub description: String,
}

impl ExpenseForm {
    pub fn validate(&self, employee_id: &str) -> Result<NewExpense> {
        let category = self.category.trim();
        let Some(category) = EXPENSE_CATEGORIES.iter().find(|c| **c == category) else {
            return Err(AppError::Validation("Please choose a category.".to_string()));
        };

        let amount = match self.amount.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => v,
            _ => {
                return Err(AppError::Validation(
                    "Amount must be greater than 0.".to_string(),
                ))
            }
        };

        Ok(NewExpense {
            employee_id: employee_id.to_string(),
            category: category.to_string(),
            amount,
            date: None,
            description: self.description.trim().to_string(),
        })
    }
}

/// Recent expenses plus the running total for one employee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSummary {
    pub recent: Vec<Expense>,
    pub total: f64,
}

impl ExpenseSummary {
    pub fn new(mut recent: Vec<Expense>, amounts: &[f64]) -> Self {
        recent.truncate(RECENT_EXPENSES);
        Self {
            recent,
            total: amounts.iter().sum(),
        }
    }

    /// Folds a freshly inserted row in without refetching.
    pub fn record(&mut self, expense: Expense) {
        self.total += expense.amount;
        self.recent.insert(0, expense);
        self.recent.truncate(RECENT_EXPENSES);
    }
}
