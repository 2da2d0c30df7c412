//! Rows of the hosted store. Field names follow the table columns.

use serde::{Deserialize, Deserializer, Serialize};

/// Text columns may come back as `null`; the app treats that as empty.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub price: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub employee_id: String,
    pub customer_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    pub total_amount: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub discount: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSale {
    pub employee_id: String,
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub total_amount: f64,
    /// Sale-level discount. Discounts are applied per line, so this stays 0.
    pub discount: f64,
    pub notes: String,
}

/// A persisted line of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub price_at_sale: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub discount: f64,
    /// Zero-based entry order within the sale.
    #[serde(default)]
    pub position: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

/// Persistence record of a line; the sale id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSaleItem {
    pub item_id: String,
    pub quantity: i64,
    pub price_at_sale: f64,
    pub discount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub employee_id: String,
    pub category: String,
    pub amount: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub employee_id: String,
    pub category: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}
