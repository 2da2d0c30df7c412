use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use time::OffsetDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Store, CREATE_SALE_RPC, EXPENSES, ITEMS, SALES, SALE_ITEMS};
use crate::auth::{refresh_session, SessionStore};
use crate::config::StoreConfig;
use crate::error::{AppError, Result};
use crate::models::{Expense, Item, NewExpense, NewItem, NewSale, NewSaleItem, Sale, SaleItem, SaleWithItems};

/// PostgREST client for the hosted database. Every method is one round trip.
#[derive(Clone)]
pub struct RestStore {
    http: reqwest::Client,
    config: StoreConfig,
    sessions: Arc<SessionStore>,
}

#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

fn postgrest_message(body: &str) -> String {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let parts: Vec<&str> = [&parsed.message, &parsed.details, &parsed.hint]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if !parts.is_empty() {
        return parts.join(" / ");
    }
    let body = body.trim();
    if body.is_empty() {
        "empty response".to_string()
    } else {
        body.chars().take(300).collect()
    }
}

async fn read_json<T: DeserializeOwned>(op: &'static str, resp: Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = postgrest_message(&body);
        tracing::error!(op, status = status.as_u16(), %message, "store request failed");
        return Err(AppError::store(op, Some(status.as_u16()), message));
    }
    resp.json::<T>()
        .await
        .map_err(|e| AppError::store(op, Some(status.as_u16()), format!("unexpected response: {e}")))
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

impl RestStore {
    pub fn new(http: reqwest::Client, config: StoreConfig, sessions: Arc<SessionStore>) -> Self {
        Self {
            http,
            config,
            sessions,
        }
    }

    /// Signed-in requests carry the session token; otherwise the public key.
    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let token = self
            .sessions
            .access_token()
            .unwrap_or_else(|| self.config.anon_key.clone());
        req.header("apikey", &self.config.anon_key).bearer_auth(token)
    }

    /// Sends one request. A token close to expiry is refreshed first; a 401
    /// on a signed-in request refreshes once and retries. When the refresh is
    /// rejected the session is gone and the 401 is returned as is.
    async fn send<F>(&self, op: &'static str, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
    {
        if self.sessions.needs_refresh(OffsetDateTime::now_utc().unix_timestamp()) {
            if let Err(e) = refresh_session(&self.http, &self.config, &self.sessions).await {
                tracing::warn!(op, error = %e, "could not refresh expired session");
            }
        }

        let signed_in = self.sessions.access_token().is_some();
        let resp = self.authorize(build(&self.http)).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED || !signed_in {
            return Ok(resp);
        }

        tracing::info!(op, "access token rejected, refreshing session");
        if let Err(e) = refresh_session(&self.http, &self.config, &self.sessions).await {
            tracing::warn!(op, error = %e, "session refresh failed");
            return Ok(resp);
        }
        let retried = self.authorize(build(&self.http)).send().await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(op, "refreshed token rejected, signing out");
            self.sessions.clear();
        }
        Ok(retried)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        op: &'static str,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = self.config.rest_url(table);
        let resp = self.send(op, |http| http.get(&url).query(query)).await?;
        read_json(op, resp).await
    }

    /// Inserts one row and returns it as stored.
    async fn insert<B, T>(&self, op: &'static str, table: &str, row: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.rest_url(table);
        let resp = self
            .send(op, |http| {
                http.post(&url)
                    .header("Prefer", "return=representation")
                    .json(row)
            })
            .await?;
        let mut rows: Vec<T> = read_json(op, resp).await?;
        if rows.is_empty() {
            return Err(AppError::store(op, None, "insert returned no row"));
        }
        Ok(rows.swap_remove(0))
    }
}

fn limit_param(query: &mut Vec<(&str, String)>, limit: Option<usize>) {
    if let Some(n) = limit {
        query.push(("limit", n.to_string()));
    }
}

#[async_trait]
impl Store for RestStore {
    #[tracing::instrument(skip(self))]
    async fn list_items(&self) -> Result<Vec<Item>> {
        let query = [("select", "*".to_string()), ("order", "name.asc".to_string())];
        self.select("list_items", ITEMS, &query).await
    }

    #[tracing::instrument(skip(self, item), fields(name = %item.name))]
    async fn insert_item(&self, item: &NewItem) -> Result<Item> {
        let created: Item = self.insert("insert_item", ITEMS, item).await?;
        tracing::info!(item_id = %created.id, "item created");
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    async fn list_sales(&self, employee_id: &str, limit: Option<usize>) -> Result<Vec<Sale>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("employee_id", eq(employee_id)),
            ("order", "created_at.desc".to_string()),
        ];
        limit_param(&mut query, limit);
        self.select("list_sales", SALES, &query).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_sale_items(&self, sale_id: &str) -> Result<Vec<SaleItem>> {
        let query = [
            ("select", "*".to_string()),
            ("sale_id", eq(sale_id)),
            ("order", "position.asc".to_string()),
        ];
        self.select("list_sale_items", SALE_ITEMS, &query).await
    }

    #[tracing::instrument(skip(self, sale, items), fields(lines = items.len()))]
    async fn create_sale(&self, sale: &NewSale, items: &[NewSaleItem]) -> Result<SaleWithItems> {
        let body = serde_json::json!({ "p_sale": sale, "p_items": items });
        let url = self.config.rest_url(&format!("rpc/{CREATE_SALE_RPC}"));
        let resp = self.send("create_sale", |http| http.post(&url).json(&body)).await?;
        let created: SaleWithItems = read_json("create_sale", resp).await?;
        tracing::info!(sale_id = %created.sale.id, lines = created.items.len(), "sale recorded");
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    async fn list_expenses(&self, employee_id: &str, limit: Option<usize>) -> Result<Vec<Expense>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("employee_id", eq(employee_id)),
            ("order", "created_at.desc".to_string()),
        ];
        limit_param(&mut query, limit);
        self.select("list_expenses", EXPENSES, &query).await
    }

    #[tracing::instrument(skip(self))]
    async fn expense_amounts(&self, employee_id: &str) -> Result<Vec<f64>> {
        #[derive(Deserialize)]
        struct AmountRow {
            amount: f64,
        }

        let query = [("select", "amount".to_string()), ("employee_id", eq(employee_id))];
        let rows: Vec<AmountRow> = self.select("expense_amounts", EXPENSES, &query).await?;
        Ok(rows.into_iter().map(|r| r.amount).collect())
    }

    #[tracing::instrument(skip(self, expense), fields(category = %expense.category))]
    async fn insert_expense(&self, expense: &NewExpense) -> Result<Expense> {
        let created: Expense = self.insert("insert_expense", EXPENSES, expense).await?;
        tracing::info!(expense_id = %created.id, amount = created.amount, "expense recorded");
        Ok(created)
    }
}
