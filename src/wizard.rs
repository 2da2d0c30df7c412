//! Three-step order form shared by the Sales and Quote pages.
//!
//! `Select Items -> Customer Information -> Review`. The form only moves
//! forward when the current step is complete; leaving the last step is the
//! caller's cue to run the terminal action (persist a sale or render a quote).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calc::{self, LineAmounts, Totals};
use crate::models::{Item, NewSale, NewSaleItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowKind {
    Sale,
    Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    SelectItems,
    CustomerInfo,
    Review,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::SelectItems, Step::CustomerInfo, Step::Review];

    pub fn index(self) -> usize {
        match self {
            Step::SelectItems => 0,
            Step::CustomerInfo => 1,
            Step::Review => 2,
        }
    }

    pub fn next(self) -> Option<Step> {
        match self {
            Step::SelectItems => Some(Step::CustomerInfo),
            Step::CustomerInfo => Some(Step::Review),
            Step::Review => None,
        }
    }

    pub fn previous(self) -> Option<Step> {
        match self {
            Step::SelectItems => None,
            Step::CustomerInfo => Some(Step::SelectItems),
            Step::Review => Some(Step::CustomerInfo),
        }
    }

    pub fn label(self, kind: WorkflowKind) -> &'static str {
        match (self, kind) {
            (Step::SelectItems, _) => "Select Items",
            (Step::CustomerInfo, _) => "Customer Information",
            (Step::Review, WorkflowKind::Sale) => "Review & Submit",
            (Step::Review, WorkflowKind::Quote) => "Generate Quote",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label(WorkflowKind::Sale))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("Please complete \"{0}\" first.")]
    Incomplete(Step),

    #[error("Already at the first step.")]
    AtFirstStep,

    #[error("There is no line {}.", .0 + 1)]
    NoSuchLine(usize),

    #[error("Line {} has no item selected.", .0 + 1)]
    ItemNotSelected(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved(Step),
    /// The last step was confirmed; run the terminal action.
    Finish,
}

/// One editable line. Quantity and discount hold the raw form input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDraft {
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    pub price_at_sale: f64,
    pub quantity: String,
    pub discount: String,
}

impl Default for LineDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDraft {
    pub fn new() -> Self {
        Self {
            item_id: None,
            item_name: None,
            price_at_sale: 0.0,
            quantity: "0".to_string(),
            discount: "0".to_string(),
        }
    }

    /// Copies the item's current price and name. Later catalog changes do
    /// not reach this line.
    pub fn select_item(&mut self, item: &Item) {
        self.item_id = Some(item.id.clone());
        self.item_name = Some(item.name.clone());
        self.price_at_sale = item.price;
    }

    pub fn has_item(&self) -> bool {
        self.item_id
            .as_deref()
            .map(|id| !id.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn has_quantity(&self) -> bool {
        !self.quantity.trim().is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.has_item() && self.has_quantity()
    }

    pub fn quantity_value(&self) -> i64 {
        calc::parse_quantity(&self.quantity)
    }

    pub fn discount_value(&self) -> f64 {
        calc::parse_discount(&self.discount)
    }

    pub fn amounts(&self) -> LineAmounts {
        calc::line_amounts(self.price_at_sale, self.quantity_value(), self.discount_value())
    }

    /// Projection to the stored shape; drops the display name.
    pub fn to_record(&self, position: usize) -> Result<NewSaleItem, StepError> {
        let item_id = match self.item_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(StepError::ItemNotSelected(position)),
        };
        Ok(NewSaleItem {
            item_id,
            quantity: self.quantity_value(),
            price_at_sale: self.price_at_sale,
            discount: self.discount_value(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub kind: WorkflowKind,
    pub step: Step,
    pub lines: Vec<LineDraft>,
    pub customer: Customer,
    pub notes: String,
}

impl OrderDraft {
    pub fn new(kind: WorkflowKind) -> Self {
        Self {
            kind,
            step: Step::SelectItems,
            lines: Vec::new(),
            customer: Customer::default(),
            notes: String::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.kind);
    }

    pub fn add_line(&mut self) -> usize {
        self.lines.push(LineDraft::new());
        self.lines.len() - 1
    }

    pub fn remove_line(&mut self, index: usize) -> Result<LineDraft, StepError> {
        if index >= self.lines.len() {
            return Err(StepError::NoSuchLine(index));
        }
        Ok(self.lines.remove(index))
    }

    pub fn line_mut(&mut self, index: usize) -> Result<&mut LineDraft, StepError> {
        self.lines.get_mut(index).ok_or(StepError::NoSuchLine(index))
    }

    pub fn select_item(&mut self, index: usize, item: &Item) -> Result<(), StepError> {
        self.line_mut(index)?.select_item(item);
        Ok(())
    }

    pub fn set_quantity(&mut self, index: usize, raw: &str) -> Result<(), StepError> {
        self.line_mut(index)?.quantity = raw.to_string();
        Ok(())
    }

    pub fn set_discount(&mut self, index: usize, raw: &str) -> Result<(), StepError> {
        self.line_mut(index)?.discount = raw.to_string();
        Ok(())
    }

    pub fn set_customer_name(&mut self, name: &str) {
        self.customer.name = name.to_string();
    }

    pub fn set_customer_email(&mut self, email: &str) {
        self.customer.email = email.to_string();
    }

    pub fn set_customer_phone(&mut self, phone: &str) {
        self.customer.phone = phone.to_string();
    }

    pub fn set_notes(&mut self, notes: &str) {
        self.notes = notes.to_string();
    }

    pub fn step_complete(&self, step: Step) -> bool {
        match step {
            Step::SelectItems => {
                !self.lines.is_empty() && self.lines.iter().all(LineDraft::is_complete)
            }
            Step::CustomerInfo => !self.customer.name.trim().is_empty(),
            Step::Review => true,
        }
    }

    pub fn is_step_complete(&self) -> bool {
        self.step_complete(self.step)
    }

    /// Moves one step forward. From the last step this reports `Finish`
    /// only if every earlier step still holds, since lines and customer can be
    /// edited after the form has moved on.
    pub fn advance(&mut self) -> Result<Transition, StepError> {
        if !self.is_step_complete() {
            return Err(StepError::Incomplete(self.step));
        }
        match self.step.next() {
            Some(next) => {
                self.step = next;
                Ok(Transition::Moved(next))
            }
            None => {
                if let Some(step) = Step::ALL.into_iter().find(|s| !self.step_complete(*s)) {
                    return Err(StepError::Incomplete(step));
                }
                Ok(Transition::Finish)
            }
        }
    }

    pub fn back(&mut self) -> Result<Step, StepError> {
        let prev = self.step.previous().ok_or(StepError::AtFirstStep)?;
        self.step = prev;
        Ok(prev)
    }

    pub fn line_amounts(&self) -> Vec<LineAmounts> {
        self.lines.iter().map(LineDraft::amounts).collect()
    }

    pub fn totals(&self) -> Totals {
        calc::totals(&self.line_amounts())
    }

    pub fn sale_records(&self) -> Result<Vec<NewSaleItem>, StepError> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| line.to_record(i))
            .collect()
    }

    /// Sale header plus line records for `employee_id`. The stored total is
    /// the document total rounded to paise.
    pub fn to_new_sale(&self, employee_id: &str) -> Result<(NewSale, Vec<NewSaleItem>), StepError> {
        let items = self.sale_records()?;
        let sale = NewSale {
            employee_id: employee_id.to_string(),
            customer_name: self.customer.name.trim().to_string(),
            date: None,
            total_amount: calc::round_money(self.totals().net),
            discount: 0.0,
            notes: self.notes.trim().to_string(),
        };
        Ok((sale, items))
    }
}
