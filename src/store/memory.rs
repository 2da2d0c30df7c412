use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::Store;
use crate::catalog::{sort_items, ItemSort};
use crate::error::{AppError, Result};
use crate::format::{now_iso, today_ymd};
use crate::models::{Expense, Item, NewExpense, NewItem, NewSale, NewSaleItem, Sale, SaleItem, SaleWithItems};

#[derive(Debug, Default)]
struct Tables {
    items: Vec<Item>,
    sales: Vec<Sale>,
    sale_items: Vec<SaleItem>,
    expenses: Vec<Expense>,
    fail_next: Option<&'static str>,
}

impl Tables {
    fn take_failure(&mut self, op: &'static str) -> Result<()> {
        match self.fail_next.take() {
            Some(target) if target == op || target == "*" => {
                Err(AppError::store(op, Some(503), "injected failure"))
            }
            other => {
                self.fail_next = other;
                Ok(())
            }
        }
    }
}

/// In-process [`Store`] with the same ordering and atomicity as the hosted
/// one. Rows are kept in insertion order, so newest first is a reverse walk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<Item>) -> Self {
        let store = Self::default();
        store.lock().items = items;
        store
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes the next call of `op` fail once. `"*"` matches any operation.
    pub fn fail_next(&self, op: &'static str) {
        self.lock().fail_next = Some(op);
    }

    pub fn sales(&self) -> Vec<Sale> {
        self.lock().sales.clone()
    }

    pub fn sale_items(&self) -> Vec<SaleItem> {
        self.lock().sale_items.clone()
    }

    pub fn expenses(&self) -> Vec<Expense> {
        self.lock().expenses.clone()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn newest_first<'a, T, I>(rows: I, limit: Option<usize>) -> Vec<T>
where
    T: Clone + 'a,
    I: DoubleEndedIterator<Item = &'a T>,
{
    rows.rev().take(limit.unwrap_or(usize::MAX)).cloned().collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_items(&self) -> Result<Vec<Item>> {
        let mut tables = self.lock();
        tables.take_failure("list_items")?;
        let mut items = tables.items.clone();
        sort_items(&mut items, ItemSort::Name);
        Ok(items)
    }

    async fn insert_item(&self, item: &NewItem) -> Result<Item> {
        let mut tables = self.lock();
        tables.take_failure("insert_item")?;
        let row = Item {
            id: new_id(),
            name: item.name.clone(),
            price: item.price,
            description: item.description.clone(),
            created_at: now_iso(),
        };
        tables.items.push(row.clone());
        Ok(row)
    }

    async fn list_sales(&self, employee_id: &str, limit: Option<usize>) -> Result<Vec<Sale>> {
        let mut tables = self.lock();
        tables.take_failure("list_sales")?;
        let rows = tables.sales.iter().filter(|s| s.employee_id == employee_id);
        Ok(newest_first(rows, limit))
    }

    async fn list_sale_items(&self, sale_id: &str) -> Result<Vec<SaleItem>> {
        let mut tables = self.lock();
        tables.take_failure("list_sale_items")?;
        let mut lines: Vec<SaleItem> = tables
            .sale_items
            .iter()
            .filter(|i| i.sale_id == sale_id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.position);
        Ok(lines)
    }

    async fn create_sale(&self, sale: &NewSale, items: &[NewSaleItem]) -> Result<SaleWithItems> {
        let mut tables = self.lock();
        tables.take_failure("create_sale")?;

        if let Some(missing) = items
            .iter()
            .find(|line| !tables.items.iter().any(|i| i.id == line.item_id))
        {
            return Err(AppError::store(
                "create_sale",
                Some(409),
                format!("item {} does not exist", missing.item_id),
            ));
        }

        let created_at = now_iso();
        let sale_row = Sale {
            id: new_id(),
            employee_id: sale.employee_id.clone(),
            customer_name: sale.customer_name.clone(),
            date: sale.date.clone().unwrap_or_else(today_ymd),
            total_amount: sale.total_amount,
            discount: sale.discount,
            notes: sale.notes.clone(),
            created_at: created_at.clone(),
        };
        let item_rows: Vec<SaleItem> = items
            .iter()
            .enumerate()
            .map(|(position, line)| SaleItem {
                id: new_id(),
                sale_id: sale_row.id.clone(),
                item_id: line.item_id.clone(),
                quantity: line.quantity,
                price_at_sale: line.price_at_sale,
                discount: line.discount,
                position: i32::try_from(position).unwrap_or(i32::MAX),
                created_at: created_at.clone(),
            })
            .collect();

        tables.sales.push(sale_row.clone());
        tables.sale_items.extend(item_rows.iter().cloned());

        Ok(SaleWithItems {
            sale: sale_row,
            items: item_rows,
        })
    }

    async fn list_expenses(&self, employee_id: &str, limit: Option<usize>) -> Result<Vec<Expense>> {
        let mut tables = self.lock();
        tables.take_failure("list_expenses")?;
        let rows = tables.expenses.iter().filter(|e| e.employee_id == employee_id);
        Ok(newest_first(rows, limit))
    }

    async fn expense_amounts(&self, employee_id: &str) -> Result<Vec<f64>> {
        let mut tables = self.lock();
        tables.take_failure("expense_amounts")?;
        Ok(tables
            .expenses
            .iter()
            .filter(|e| e.employee_id == employee_id)
            .map(|e| e.amount)
            .collect())
    }

    async fn insert_expense(&self, expense: &NewExpense) -> Result<Expense> {
        let mut tables = self.lock();
        tables.take_failure("insert_expense")?;
        let row = Expense {
            id: new_id(),
            employee_id: expense.employee_id.clone(),
            category: expense.category.clone(),
            amount: expense.amount,
            date: expense.date.clone().unwrap_or_else(today_ymd),
            description: expense.description.clone(),
            created_at: now_iso(),
        };
        tables.expenses.push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            price: 100.0,
            description: String::new(),
            created_at: String::new(),
        }
    }

    fn sale() -> NewSale {
        NewSale {
            employee_id: "emp".to_string(),
            customer_name: "Acme".to_string(),
            date: None,
            total_amount: 100.0,
            discount: 0.0,
            notes: String::new(),
        }
    }

    fn line(item_id: &str) -> NewSaleItem {
        NewSaleItem {
            item_id: item_id.to_string(),
            quantity: 1,
            price_at_sale: 100.0,
            discount: 0.0,
        }
    }

    #[tokio::test]
    async fn unknown_item_rejects_whole_sale() {
        let store = MemoryStore::with_items(vec![item("a", "A")]);
        let err = store
            .create_sale(&sale(), &[line("a"), line("missing")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store { op: "create_sale", .. }));
        assert!(store.sales().is_empty());
        assert!(store.sale_items().is_empty());
    }

    #[tokio::test]
    async fn sale_lines_keep_entry_order() {
        let store = MemoryStore::with_items(vec![item("a", "A"), item("b", "B"), item("c", "C")]);
        let created = store
            .create_sale(&sale(), &[line("c"), line("a"), line("b")])
            .await
            .unwrap();
        let positions: Vec<i32> = created.items.iter().map(|l| l.position).collect();
        assert_eq!(positions, [0, 1, 2]);

        let listed = store.list_sale_items(&created.sale.id).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|l| l.item_id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn items_are_listed_by_name_ignoring_case() {
        let store = MemoryStore::with_items(vec![item("1", "beta"), item("2", "Gamma"), item("3", "alpha")]);
        let names: Vec<String> = store.list_items().await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["alpha", "beta", "Gamma"]);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let store = MemoryStore::with_items(vec![item("b", "Beta"), item("a", "Alpha")]);
        store.fail_next("list_items");
        assert!(store.list_items().await.is_err());
        let names: Vec<String> = store.list_items().await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn failure_for_other_op_waits() {
        let store = MemoryStore::new();
        store.fail_next("insert_expense");
        assert!(store.list_items().await.is_ok());
        let expense = NewExpense {
            employee_id: "emp".to_string(),
            category: "Travel".to_string(),
            amount: 10.0,
            date: None,
            description: String::new(),
        };
        assert!(store.insert_expense(&expense).await.is_err());
        assert!(store.insert_expense(&expense).await.is_ok());
    }

    #[tokio::test]
    async fn expenses_newest_first_and_scoped() {
        let store = MemoryStore::new();
        for (who, amount) in [("emp", 1.0), ("other", 2.0), ("emp", 3.0)] {
            store
                .insert_expense(&NewExpense {
                    employee_id: who.to_string(),
                    category: "Meals".to_string(),
                    amount,
                    date: None,
                    description: String::new(),
                })
                .await
                .unwrap();
        }
        let recent = store.list_expenses("emp", Some(5)).await.unwrap();
        let amounts: Vec<f64> = recent.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, [3.0, 1.0]);
        assert_eq!(store.expense_amounts("emp").await.unwrap(), [1.0, 3.0]);
        assert_eq!(store.list_expenses("emp", Some(1)).await.unwrap().len(), 1);
    }
}
