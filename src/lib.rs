//! Sales, expenses, inventory and quotes for a small business, backed by a
//! hosted Postgres behind PostgREST.
//!
//! Everything except [`run`] builds without the desktop shell, so the
//! workflows can be driven from tests against [`store::MemoryStore`].

pub mod auth;
pub mod calc;
pub mod catalog;
pub mod config;
pub mod error;
pub mod expenses;
pub mod format;
pub mod models;
pub mod quote;
pub mod store;
pub mod telemetry;
pub mod wizard;
pub mod workflows;

#[cfg(feature = "desktop")]
mod commands;

pub use error::{AppError, Result};

#[cfg(feature = "desktop")]
pub fn run() {
    use tauri::Manager;

    telemetry::init();

    tauri::Builder::default()
        .setup(|app| {
            let config = config::AppConfig::from_env()?;
            let downloads = app
                .path()
                .download_dir()
                .unwrap_or_else(|_| std::env::temp_dir());
            let state = tauri::async_runtime::block_on(commands::AppState::new(config, downloads))?;
            app.manage(state);
            Ok(())
        })
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_opener::init())
        .invoke_handler(tauri::generate_handler![
            commands::sign_in,
            commands::sign_out,
            commands::current_user,
            commands::list_items,
            commands::items_state,
            commands::items_set_query,
            commands::create_item,
            commands::order_state,
            commands::order_load_catalog,
            commands::order_add_line,
            commands::order_remove_line,
            commands::order_update_line,
            commands::order_set_customer,
            commands::order_next,
            commands::order_back,
            commands::order_reset,
            commands::quote_preview_html,
            commands::expenses_state,
            commands::expenses_refresh,
            commands::create_expense,
            commands::format_currency
        ])
        .run(tauri::generate_context!())
        .unwrap_or_else(|e| tracing::error!(error = %e, "error while running tauri application"));
}
