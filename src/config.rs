//! Startup configuration, read once from the environment (and `.env`).

use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::quote::CompanyProfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Project base URL without a trailing slash.
    pub url: String,
    /// Public (anon) API key.
    pub anon_key: String,
}

impl StoreConfig {
    pub fn new(url: &str, anon_key: &str) -> Result<Self> {
        let url = url.trim().trim_end_matches('/').to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "store url must start with http:// or https://, got {url:?}"
            )));
        }
        let anon_key = anon_key.trim().to_string();
        if anon_key.is_empty() {
            return Err(AppError::Config("store public key is empty".to_string()));
        }
        Ok(Self { url, anon_key })
    }

    pub fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.url, path.trim_start_matches('/'))
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub company: CompanyProfile,
    /// TTF used for quotes; without it the built-in Helvetica is used.
    pub quote_font: Option<PathBuf>,
    /// Where quotes are written; the desktop shell defaults to Downloads.
    pub quote_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        let url = get(&["SUPABASE_URL", "VITE_SUPABASE_URL"])
            .ok_or_else(|| AppError::Config("SUPABASE_URL must be set".to_string()))?;
        let anon_key = get(&["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"])
            .ok_or_else(|| AppError::Config("SUPABASE_ANON_KEY must be set".to_string()))?;

        let defaults = CompanyProfile::default();
        let company = CompanyProfile {
            name: get(&["BIZDESK_COMPANY_NAME"]).unwrap_or(defaults.name),
            address: get(&["BIZDESK_COMPANY_ADDRESS"]),
            phone: get(&["BIZDESK_COMPANY_PHONE"]),
            email: get(&["BIZDESK_COMPANY_EMAIL"]),
            logo: get(&["BIZDESK_COMPANY_LOGO"]),
        };

        Ok(Self {
            store: StoreConfig::new(&url, &anon_key)?,
            company,
            quote_font: get(&["BIZDESK_QUOTE_FONT"]).map(PathBuf::from),
            quote_dir: get(&["BIZDESK_QUOTE_DIR"]).map(PathBuf::from),
        })
    }
}
