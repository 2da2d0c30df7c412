//! Page-level state for the Sales, Quote, Items and Expenses screens.
//!
//! Each page owns its data, a [`Notice`] for the last outcome and one or more
//! [`BusyFlag`]s. Remote failures are logged here and turned into the short
//! messages the pages show; the underlying [`AppError`] is still returned.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::calc::{LineAmounts, Totals};
use crate::catalog::{find_item, query_items, ItemForm, ItemPage, ItemQuery};
use crate::error::{AppError, Result};
use crate::expenses::{ExpenseForm, ExpenseSummary, EXPENSE_CATEGORIES, RECENT_EXPENSES};
use crate::format::{format_currency, format_date_str, format_date_time_str, format_relative_time, parse_timestamp};
use crate::models::{Expense, Item, SaleWithItems, User};
use crate::quote::QuoteExporter;
use crate::store::Store;
use crate::wizard::{Customer, LineDraft, OrderDraft, Step, Transition, WorkflowKind};

/// Set while a remote call or render is in flight.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

/// Clears its flag when dropped, whichever way the work ended.
#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn try_acquire(&self) -> Result<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::Busy)?;
        Ok(BusyGuard(Arc::clone(&self.0)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum Notice {
    Error(String),
    Success(String),
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Notice::Error(message.into())
    }

    pub fn success(message: impl Into<String>) -> Self {
        Notice::Success(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::Error(m) | Notice::Success(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

pub const MSG_LOAD_ITEMS_FAILED: &str = "Failed to load items";
pub const MSG_SALE_FAILED: &str = "Failed to create sale. Please try again.";
pub const MSG_SALE_RECORDED: &str = "Sale recorded successfully!";
pub const MSG_QUOTE_GENERATED: &str = "Quote PDF generated successfully!";
pub const MSG_EXPENSE_RECORDED: &str = "Expense recorded successfully";
pub const MSG_EXPENSE_FAILED: &str = "Failed to record expense";
pub const MSG_LOAD_EXPENSES_FAILED: &str = "Failed to load recent expenses";
pub const MSG_ITEM_ADDED: &str = "Item added successfully";
pub const MSG_ITEM_FAILED: &str = "Failed to add item";

/// Dependencies for the terminal step of an order form.
pub struct OrderContext<'a> {
    pub store: &'a dyn Store,
    pub user: Option<User>,
    pub exporter: &'a QuoteExporter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Moved(Step),
    SaleRecorded(SaleWithItems),
    QuoteExported(PathBuf),
}

pub enum NextStep {
    Moved(Step),
    Finish(PendingOrder),
}

/// The sale to record or quote to write, detached from its page. The page
/// stays busy until this is handed to [`OrderPage::complete`] or dropped.
#[derive(Debug)]
pub struct PendingOrder {
    draft: OrderDraft,
    catalog: Vec<Item>,
    _guard: BusyGuard,
}

impl PendingOrder {
    pub fn kind(&self) -> WorkflowKind {
        self.draft.kind
    }

    pub async fn run(&self, ctx: &OrderContext<'_>) -> Result<OrderOutcome> {
        match self.draft.kind {
            WorkflowKind::Sale => self.submit_sale(ctx).await,
            WorkflowKind::Quote => self.export_quote(ctx).await,
        }
    }

    async fn submit_sale(&self, ctx: &OrderContext<'_>) -> Result<OrderOutcome> {
        let user = ctx.user.as_ref().ok_or(AppError::NotSignedIn)?;
        let (sale, items) = self.draft.to_new_sale(&user.id)?;
        match ctx.store.create_sale(&sale, &items).await {
            Ok(created) => {
                tracing::info!(
                    sale_id = %created.sale.id,
                    total = created.sale.total_amount,
                    lines = created.items.len(),
                    "sale submitted"
                );
                Ok(OrderOutcome::SaleRecorded(created))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to create sale");
                Err(e)
            }
        }
    }

    async fn export_quote(&self, ctx: &OrderContext<'_>) -> Result<OrderOutcome> {
        let result = match ctx.exporter.document(&self.draft, &self.catalog) {
            Ok(doc) => ctx.exporter.export(&doc).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(path) => {
                tracing::info!(path = %path.display(), "quote exported");
                Ok(OrderOutcome::QuoteExported(path))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to generate quote pdf");
                Err(e)
            }
        }
    }
}

fn failure_message(kind: WorkflowKind, e: &AppError) -> String {
    match (kind, e) {
        (_, AppError::NotSignedIn) => e.user_message(),
        (WorkflowKind::Sale, _) => MSG_SALE_FAILED.to_owned(),
        (WorkflowKind::Quote, AppError::Render(m)) => format!("Failed to generate PDF: {m}"),
        (WorkflowKind::Quote, other) => format!("Failed to generate PDF: {}", other.user_message()),
    }
}

/// Partial edit of one line; absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinePatch {
    pub item_id: Option<String>,
    pub quantity: Option<String>,
    pub discount: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineView {
    pub line: LineDraft,
    pub amounts: LineAmounts,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub kind: WorkflowKind,
    pub step: Step,
    pub steps: Vec<&'static str>,
    pub step_complete: bool,
    pub lines: Vec<LineView>,
    pub customer: Customer,
    pub notes: String,
    pub totals: Totals,
    pub total_display: String,
    pub catalog: Vec<Item>,
    pub notice: Option<Notice>,
    pub busy: bool,
    pub loading: bool,
    pub last_export: Option<String>,
}

/// Sales and Quote pages: the three-step form plus its terminal action.
#[derive(Debug)]
pub struct OrderPage {
    draft: OrderDraft,
    catalog: Vec<Item>,
    notice: Option<Notice>,
    busy: BusyFlag,
    loading: BusyFlag,
    last_export: Option<PathBuf>,
}

impl OrderPage {
    pub fn new(kind: WorkflowKind) -> Self {
        Self {
            draft: OrderDraft::new(kind),
            catalog: Vec::new(),
            notice: None,
            busy: BusyFlag::new(),
            loading: BusyFlag::new(),
            last_export: None,
        }
    }

    pub fn kind(&self) -> WorkflowKind {
        self.draft.kind
    }

    pub fn draft(&self) -> &OrderDraft {
        &self.draft
    }

    pub fn catalog(&self) -> &[Item] {
        &self.catalog
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn busy(&self) -> &BusyFlag {
        &self.busy
    }

    pub fn last_export(&self) -> Option<&PathBuf> {
        self.last_export.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub async fn load_catalog(&mut self, store: &dyn Store) -> Result<()> {
        let _guard = self.loading.try_acquire()?;
        match store.list_items().await {
            Ok(items) => {
                tracing::debug!(kind = ?self.kind(), count = items.len(), "catalog loaded");
                self.catalog = items;
                Ok(())
            }
            Err(e) => {
                tracing::error!(kind = ?self.kind(), error = %e, "failed to load items");
                self.notice = Some(Notice::error(MSG_LOAD_ITEMS_FAILED));
                Err(e)
            }
        }
    }

    pub fn add_line(&mut self) -> usize {
        self.draft.add_line()
    }

    pub fn remove_line(&mut self, index: usize) -> Result<()> {
        self.draft.remove_line(index)?;
        Ok(())
    }

    /// Selecting an item copies its current catalog price into the line.
    pub fn update_line(&mut self, index: usize, patch: LinePatch) -> Result<()> {
        self.draft.line_mut(index)?;
        if let Some(item_id) = patch.item_id.as_deref() {
            let item = find_item(&self.catalog, item_id)
                .ok_or_else(|| AppError::Validation(format!("Unknown item {item_id}.")))?;
            self.draft.select_item(index, item)?;
        }
        if let Some(quantity) = patch.quantity.as_deref() {
            self.draft.set_quantity(index, quantity)?;
        }
        if let Some(discount) = patch.discount.as_deref() {
            self.draft.set_discount(index, discount)?;
        }
        Ok(())
    }

    pub fn set_customer(&mut self, patch: CustomerPatch) {
        if let Some(name) = patch.name.as_deref() {
            self.draft.set_customer_name(name);
        }
        if let Some(email) = patch.email.as_deref() {
            self.draft.set_customer_email(email);
        }
        if let Some(phone) = patch.phone.as_deref() {
            self.draft.set_customer_phone(phone);
        }
        if let Some(notes) = patch.notes.as_deref() {
            self.draft.set_notes(notes);
        }
    }

    pub fn back(&mut self) -> Result<Step> {
        Ok(self.draft.back()?)
    }

    pub fn reset(&mut self) {
        self.draft.reset();
        self.notice = None;
        self.last_export = None;
    }

    /// Advances the form, or on the last step records the sale / writes the
    /// quote. Holds `&mut self` across the remote call; callers sharing the
    /// page behind a lock use [`OrderPage::begin_next`] instead.
    pub async fn next(&mut self, ctx: &OrderContext<'_>) -> Result<OrderOutcome> {
        match self.begin_next()? {
            NextStep::Moved(step) => Ok(OrderOutcome::Moved(step)),
            NextStep::Finish(pending) => {
                let result = pending.run(ctx).await;
                self.complete(pending, result)
            }
        }
    }

    /// Advances the form. On the last step marks the page busy and hands back
    /// the terminal action, which runs without borrowing the page.
    pub fn begin_next(&mut self) -> Result<NextStep> {
        match self.draft.advance() {
            Ok(Transition::Moved(step)) => {
                self.notice = None;
                Ok(NextStep::Moved(step))
            }
            Ok(Transition::Finish) => {
                let guard = self.busy.try_acquire()?;
                self.notice = None;
                Ok(NextStep::Finish(PendingOrder {
                    draft: self.draft.clone(),
                    catalog: self.catalog.clone(),
                    _guard: guard,
                }))
            }
            Err(e) => {
                self.notice = None;
                Err(e.into())
            }
        }
    }

    /// Applies the outcome of a terminal action and clears the busy flag.
    pub fn complete(&mut self, pending: PendingOrder, result: Result<OrderOutcome>) -> Result<OrderOutcome> {
        match &result {
            Ok(OrderOutcome::SaleRecorded(_)) => {
                self.notice = Some(Notice::success(MSG_SALE_RECORDED));
                self.draft.reset();
            }
            Ok(OrderOutcome::QuoteExported(path)) => {
                self.notice = Some(Notice::success(MSG_QUOTE_GENERATED));
                self.last_export = Some(path.clone());
            }
            Ok(OrderOutcome::Moved(_)) => {}
            Err(e) => {
                self.notice = Some(Notice::error(failure_message(pending.kind(), e)));
            }
        }
        drop(pending);
        result
    }

    /// Reloads the catalog only if it was loaded before. Failures are logged
    /// and leave the previous catalog in place.
    pub async fn refresh_catalog(&mut self, store: &dyn Store) -> bool {
        if self.catalog.is_empty() {
            return false;
        }
        match self.load_catalog(store).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(kind = ?self.kind(), error = %e, "catalog refresh after item insert failed");
                false
            }
        }
    }

    pub fn preview_html(&self, exporter: &QuoteExporter) -> Result<String> {
        exporter.preview_html(&self.draft, &self.catalog)
    }

    pub fn view(&self) -> OrderView {
        let kind = self.draft.kind;
        let totals = self.draft.totals();
        OrderView {
            kind,
            step: self.draft.step,
            steps: Step::ALL.iter().map(|s| s.label(kind)).collect(),
            step_complete: self.draft.is_step_complete(),
            lines: self
                .draft
                .lines
                .iter()
                .map(|line| LineView {
                    line: line.clone(),
                    amounts: line.amounts(),
                    complete: line.is_complete(),
                })
                .collect(),
            customer: self.draft.customer.clone(),
            notes: self.draft.notes.clone(),
            totals,
            total_display: format_currency(totals.net),
            catalog: self.catalog.clone(),
            notice: self.notice.clone(),
            busy: self.busy.is_busy(),
            loading: self.loading.is_busy(),
            last_export: self.last_export.as_ref().map(|p| p.display().to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRow {
    #[serde(flatten)]
    pub item: Item,
    pub price_display: String,
    pub added_display: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsView {
    pub rows: Vec<ItemRow>,
    pub total: usize,
    pub query: ItemQuery,
    pub notice: Option<Notice>,
    pub loading: bool,
    pub saving: bool,
}

/// Inventory page: catalog listing plus the add-item form.
#[derive(Debug, Default)]
pub struct ItemsPage {
    items: Vec<Item>,
    query: ItemQuery,
    notice: Option<Notice>,
    loading: BusyFlag,
    saving: BusyFlag,
}

impl ItemsPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub async fn load(&mut self, store: &dyn Store) -> Result<()> {
        let _guard = self.loading.try_acquire()?;
        match store.list_items().await {
            Ok(items) => {
                self.items = items;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load items");
                self.notice = Some(Notice::error(MSG_LOAD_ITEMS_FAILED));
                Err(e)
            }
        }
    }

    pub fn set_query(&mut self, query: ItemQuery) {
        self.query = query;
    }

    pub fn visible(&self) -> ItemPage {
        query_items(&self.items, &self.query)
    }

    /// Validates, inserts and appends the stored row.
    pub async fn add_item(&mut self, store: &dyn Store, user: Option<&User>, form: &ItemForm) -> Result<Item> {
        self.notice = None;
        if user.is_none() {
            self.notice = Some(Notice::error(AppError::NotSignedIn.user_message()));
            return Err(AppError::NotSignedIn);
        }
        let new_item = form.validate().map_err(|e| {
            self.notice = Some(Notice::error(e.user_message()));
            e
        })?;

        let _guard = self.saving.try_acquire()?;
        match store.insert_item(&new_item).await {
            Ok(item) => {
                self.items.push(item.clone());
                self.notice = Some(Notice::success(MSG_ITEM_ADDED));
                Ok(item)
            }
            Err(e) => {
                tracing::error!(error = %e, name = %new_item.name, "failed to add item");
                self.notice = Some(Notice::error(MSG_ITEM_FAILED));
                Err(e)
            }
        }
    }

    pub fn view(&self) -> ItemsView {
        let page = self.visible();
        ItemsView {
            rows: page
                .items
                .into_iter()
                .map(|item| ItemRow {
                    price_display: format_currency(item.price),
                    added_display: format_date_str(&item.created_at),
                    item,
                })
                .collect(),
            total: page.total,
            query: self.query.clone(),
            notice: self.notice.clone(),
            loading: self.loading.is_busy(),
            saving: self.saving.is_busy(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRow {
    #[serde(flatten)]
    pub expense: Expense,
    pub amount_display: String,
    pub created_display: String,
    pub created_ago: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensesView {
    pub recent: Vec<ExpenseRow>,
    pub total: f64,
    pub total_display: String,
    pub categories: Vec<&'static str>,
    pub notice: Option<Notice>,
    pub busy: bool,
    pub loading: bool,
}

/// Expense entry form plus the recent list and running total.
#[derive(Debug, Default)]
pub struct ExpensesPage {
    summary: ExpenseSummary,
    notice: Option<Notice>,
    busy: BusyFlag,
    loading: BusyFlag,
}

impl ExpensesPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> &ExpenseSummary {
        &self.summary
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn busy(&self) -> &BusyFlag {
        &self.busy
    }

    pub async fn refresh(&mut self, store: &dyn Store, user: &User) -> Result<()> {
        let _guard = self.loading.try_acquire()?;
        let fetched = async {
            let recent = store.list_expenses(&user.id, Some(RECENT_EXPENSES)).await?;
            let amounts = store.expense_amounts(&user.id).await?;
            Ok::<_, AppError>(ExpenseSummary::new(recent, &amounts))
        }
        .await;

        match fetched {
            Ok(summary) => {
                self.summary = summary;
                Ok(())
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "failed to load expenses");
                self.notice = Some(Notice::error(MSG_LOAD_EXPENSES_FAILED));
                Err(e)
            }
        }
    }

    pub async fn submit(&mut self, store: &dyn Store, user: Option<&User>, form: &ExpenseForm) -> Result<Expense> {
        self.notice = None;
        let Some(user) = user else {
            self.notice = Some(Notice::error(AppError::NotSignedIn.user_message()));
            return Err(AppError::NotSignedIn);
        };
        let new_expense = form.validate(&user.id).map_err(|e| {
            self.notice = Some(Notice::error(e.user_message()));
            e
        })?;

        let _guard = self.busy.try_acquire()?;
        match store.insert_expense(&new_expense).await {
            Ok(expense) => {
                self.summary.record(expense.clone());
                self.notice = Some(Notice::success(MSG_EXPENSE_RECORDED));
                Ok(expense)
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "failed to record expense");
                self.notice = Some(Notice::error(MSG_EXPENSE_FAILED));
                Err(e)
            }
        }
    }

    pub fn view(&self) -> ExpensesView {
        self.view_at(OffsetDateTime::now_utc())
    }

    pub fn view_at(&self, now: OffsetDateTime) -> ExpensesView {
        ExpensesView {
            recent: self
                .summary
                .recent
                .iter()
                .map(|e| ExpenseRow {
                    amount_display: format_currency(e.amount),
                    created_display: format_date_time_str(&e.created_at),
                    created_ago: parse_timestamp(&e.created_at).map(|at| format_relative_time(at, now)),
                    expense: e.clone(),
                })
                .collect(),
            total: self.summary.total,
            total_display: format_currency(self.summary.total),
            categories: EXPENSE_CATEGORIES.to_vec(),
            notice: self.notice.clone(),
            busy: self.busy.is_busy(),
            loading: self.loading.is_busy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_flag_rejects_reentry_and_resets_on_drop() {
        let flag = BusyFlag::new();
        let guard = flag.try_acquire().unwrap();
        assert!(flag.is_busy());
        assert!(matches!(flag.try_acquire(), Err(AppError::Busy)));
        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_acquire().is_ok());
    }

    #[test]
    fn notice_serializes_with_kind() {
        let json = serde_json::to_value(Notice::success(MSG_SALE_RECORDED)).unwrap();
        assert_eq!(json["kind"], "success");
        assert_eq!(json["message"], "Sale recorded successfully!");
        assert!(Notice::error("x").is_error());
    }

    #[test]
    fn update_line_requires_known_item() {
        let mut page = OrderPage::new(WorkflowKind::Sale);
        let i = page.add_line();
        let patch = LinePatch {
            item_id: Some("nope".to_string()),
            ..LinePatch::default()
        };
        assert!(matches!(page.update_line(i, patch), Err(AppError::Validation(_))));
        assert!(matches!(
            page.update_line(7, LinePatch::default()),
            Err(AppError::Step(_))
        ));
    }
}
