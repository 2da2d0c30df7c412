//! Tauri command surface. Every command locks one page, runs the workflow and
//! hands back a serializable view; errors cross as user-facing strings.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::auth::{AuthClient, SessionStore};
use crate::catalog::{ItemForm, ItemQuery};
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::expenses::ExpenseForm;
use crate::format;
use crate::models::{Item, User};
use crate::quote::QuoteExporter;
use crate::store::{RestStore, Store};
use crate::wizard::WorkflowKind;
use crate::workflows::{
    CustomerPatch, ExpensesPage, ExpensesView, ItemsPage, ItemsView, LinePatch, NextStep, OrderContext,
    OrderPage, OrderView,
};

pub struct AppState {
    store: Arc<dyn Store>,
    auth: AuthClient,
    exporter: QuoteExporter,
    sales: Mutex<OrderPage>,
    quote: Mutex<OrderPage>,
    items: Mutex<ItemsPage>,
    expenses: Mutex<ExpensesPage>,
}

impl AppState {
    pub async fn new(config: AppConfig, default_quote_dir: PathBuf) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("bizdesk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let sessions = Arc::new(SessionStore::new());
        let store = RestStore::new(http.clone(), config.store.clone(), Arc::clone(&sessions));
        let auth = AuthClient::new(http, config.store.clone(), sessions);
        let exporter = QuoteExporter::from_config(&config, default_quote_dir).await?;
        tracing::info!(
            store = %config.store.url,
            quote_dir = %exporter.output_dir().display(),
            "app state ready"
        );

        Ok(Self {
            store: Arc::new(store),
            auth,
            exporter,
            sales: Mutex::new(OrderPage::new(WorkflowKind::Sale)),
            quote: Mutex::new(OrderPage::new(WorkflowKind::Quote)),
            items: Mutex::new(ItemsPage::new()),
            expenses: Mutex::new(ExpensesPage::new()),
        })
    }

    fn order(&self, kind: WorkflowKind) -> &Mutex<OrderPage> {
        match kind {
            WorkflowKind::Sale => &self.sales,
            WorkflowKind::Quote => &self.quote,
        }
    }
}

fn to_ui(e: AppError) -> String {
    e.user_message()
}

#[tauri::command]
pub async fn sign_in(state: tauri::State<'_, AppState>, email: String, password: String) -> Result<User, String> {
    state.auth.sign_in(&email, &password).await.map_err(to_ui)
}

#[tauri::command]
pub async fn sign_out(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.auth.sign_out().await.map_err(to_ui)
}

#[tauri::command]
pub fn current_user(state: tauri::State<'_, AppState>) -> Option<User> {
    state.auth.current_user()
}

#[tauri::command]
pub async fn list_items(state: tauri::State<'_, AppState>) -> Result<Vec<Item>, String> {
    state.store.list_items().await.map_err(to_ui)
}

#[tauri::command]
pub async fn items_state(state: tauri::State<'_, AppState>, reload: Option<bool>) -> Result<ItemsView, String> {
    let mut page = state.items.lock().await;
    if reload.unwrap_or(false) {
        page.load(state.store.as_ref()).await.map_err(to_ui)?;
    }
    Ok(page.view())
}

#[tauri::command]
pub async fn items_set_query(state: tauri::State<'_, AppState>, query: ItemQuery) -> Result<ItemsView, String> {
    let mut page = state.items.lock().await;
    page.set_query(query);
    Ok(page.view())
}

#[tauri::command]
pub async fn create_item(state: tauri::State<'_, AppState>, form: ItemForm) -> Result<Item, String> {
    let user = state.auth.current_user();
    let created = state
        .items
        .lock()
        .await
        .add_item(state.store.as_ref(), user.as_ref(), &form)
        .await
        .map_err(to_ui)?;

    // New items become selectable in both order forms without a reload.
    for kind in [WorkflowKind::Sale, WorkflowKind::Quote] {
        state
            .order(kind)
            .lock()
            .await
            .refresh_catalog(state.store.as_ref())
            .await;
    }
    Ok(created)
}

#[tauri::command]
pub async fn order_state(state: tauri::State<'_, AppState>, kind: WorkflowKind) -> Result<OrderView, String> {
    Ok(state.order(kind).lock().await.view())
}

#[tauri::command]
pub async fn order_load_catalog(state: tauri::State<'_, AppState>, kind: WorkflowKind) -> Result<OrderView, String> {
    let mut page = state.order(kind).lock().await;
    page.load_catalog(state.store.as_ref()).await.map_err(to_ui)?;
    Ok(page.view())
}

#[tauri::command]
pub async fn order_add_line(state: tauri::State<'_, AppState>, kind: WorkflowKind) -> Result<OrderView, String> {
    let mut page = state.order(kind).lock().await;
    page.add_line();
    Ok(page.view())
}

#[tauri::command]
pub async fn order_remove_line(
    state: tauri::State<'_, AppState>,
    kind: WorkflowKind,
    index: usize,
) -> Result<OrderView, String> {
    let mut page = state.order(kind).lock().await;
    page.remove_line(index).map_err(to_ui)?;
    Ok(page.view())
}

#[tauri::command]
pub async fn order_update_line(
    state: tauri::State<'_, AppState>,
    kind: WorkflowKind,
    index: usize,
    patch: LinePatch,
) -> Result<OrderView, String> {
    let mut page = state.order(kind).lock().await;
    page.update_line(index, patch).map_err(to_ui)?;
    Ok(page.view())
}

#[tauri::command]
pub async fn order_set_customer(
    state: tauri::State<'_, AppState>,
    kind: WorkflowKind,
    patch: CustomerPatch,
) -> Result<OrderView, String> {
    let mut page = state.order(kind).lock().await;
    page.set_customer(patch);
    Ok(page.view())
}

/// Moves forward one step, or runs the sale/quote action from the last step.
/// The page lock is released while the action runs so `order_state` reports
/// it busy and a second submit fails fast. Outcome details land in the view's
/// notice.
#[tauri::command]
pub async fn order_next(state: tauri::State<'_, AppState>, kind: WorkflowKind) -> Result<OrderView, String> {
    let pending = {
        let mut page = state.order(kind).lock().await;
        match page.begin_next().map_err(to_ui)? {
            NextStep::Moved(_) => return Ok(page.view()),
            NextStep::Finish(pending) => pending,
        }
    };

    let ctx = OrderContext {
        store: state.store.as_ref(),
        user: state.auth.current_user(),
        exporter: &state.exporter,
    };
    let result = pending.run(&ctx).await;

    let mut page = state.order(kind).lock().await;
    page.complete(pending, result).map_err(to_ui)?;
    Ok(page.view())
}

#[tauri::command]
pub async fn order_back(state: tauri::State<'_, AppState>, kind: WorkflowKind) -> Result<OrderView, String> {
    let mut page = state.order(kind).lock().await;
    page.back().map_err(to_ui)?;
    Ok(page.view())
}

#[tauri::command]
pub async fn order_reset(state: tauri::State<'_, AppState>, kind: WorkflowKind) -> Result<OrderView, String> {
    let mut page = state.order(kind).lock().await;
    page.reset();
    Ok(page.view())
}

#[tauri::command]
pub async fn quote_preview_html(state: tauri::State<'_, AppState>) -> Result<String, String> {
    let page = state.quote.lock().await;
    page.preview_html(&state.exporter).map_err(to_ui)
}

#[tauri::command]
pub async fn expenses_state(state: tauri::State<'_, AppState>) -> Result<ExpensesView, String> {
    Ok(state.expenses.lock().await.view())
}

#[tauri::command]
pub async fn expenses_refresh(state: tauri::State<'_, AppState>) -> Result<ExpensesView, String> {
    let user = state.auth.sessions().require_user().map_err(to_ui)?;
    let mut page = state.expenses.lock().await;
    page.refresh(state.store.as_ref(), &user).await.map_err(to_ui)?;
    Ok(page.view())
}

#[tauri::command]
pub async fn create_expense(state: tauri::State<'_, AppState>, form: ExpenseForm) -> Result<ExpensesView, String> {
    let user = state.auth.current_user();
    let mut page = state.expenses.lock().await;
    page.submit(state.store.as_ref(), user.as_ref(), &form)
        .await
        .map_err(to_ui)?;
    Ok(page.view())
}

#[tauri::command]
pub fn format_currency(amount: f64) -> String {
    format::format_currency(amount)
}
