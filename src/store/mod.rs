//! Data access for items, sales and expenses.

mod memory;
mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Expense, Item, NewExpense, NewItem, NewSale, NewSaleItem, Sale, SaleItem, SaleWithItems};

pub const ITEMS: &str = "items";
pub const SALES: &str = "sales";
pub const SALE_ITEMS: &str = "sale_items";
pub const EXPENSES: &str = "expenses";
/// Server-side function that writes a sale and its lines in one transaction.
pub const CREATE_SALE_RPC: &str = "create_sale_with_items";

#[async_trait]
pub trait Store: Send + Sync {
    /// Whole catalog ordered by name.
    async fn list_items(&self) -> Result<Vec<Item>>;

    async fn insert_item(&self, item: &NewItem) -> Result<Item>;

    /// Newest first.
    async fn list_sales(&self, employee_id: &str, limit: Option<usize>) -> Result<Vec<Sale>>;

    /// In the order the lines were entered.
    async fn list_sale_items(&self, sale_id: &str) -> Result<Vec<SaleItem>>;

    /// Either the sale and every line persist, or nothing does.
    async fn create_sale(&self, sale: &NewSale, items: &[NewSaleItem]) -> Result<SaleWithItems>;

    /// Newest first.
    async fn list_expenses(&self, employee_id: &str, limit: Option<usize>) -> Result<Vec<Expense>>;

    /// Every amount recorded by the employee, for the running total.
    async fn expense_amounts(&self, employee_id: &str) -> Result<Vec<f64>>;

    async fn insert_expense(&self, expense: &NewExpense) -> Result<Expense>;
}
