//! Quote documents: the model built from a finished order form, its HTML
//! preview and the PDF written to disk.

pub mod markup;
pub mod pdf;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::calc::Totals;
use crate::catalog::find_item;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::models::Item;
use crate::wizard::{Customer, OrderDraft, Step, StepError};

pub const UNKNOWN_ITEM: &str = "Unknown Item";

/// Letterhead printed on every quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// `data:` URL or a path to an image file.
    pub logo: Option<String>,
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            name: "Your Company".to_string(),
            address: None,
            phone: None,
            email: None,
            logo: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteLine {
    pub name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub discount_percent: f64,
    pub discount_amount: f64,
    pub line_total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteDocument {
    pub company: CompanyProfile,
    pub customer: Customer,
    pub notes: String,
    pub lines: Vec<QuoteLine>,
    pub totals: Totals,
    pub issued_at: OffsetDateTime,
}

impl QuoteDocument {
    /// Fails unless every step of the form is complete. Line names come from
    /// the selection, then the catalog, then [`UNKNOWN_ITEM`].
    pub fn from_draft(
        draft: &OrderDraft,
        catalog: &[Item],
        company: &CompanyProfile,
        issued_at: OffsetDateTime,
    ) -> std::result::Result<Self, StepError> {
        if let Some(step) = Step::ALL.into_iter().find(|s| !draft.step_complete(*s)) {
            return Err(StepError::Incomplete(step));
        }

        let lines = draft
            .lines
            .iter()
            .map(|line| {
                let amounts = line.amounts();
                let name = line
                    .item_name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .or_else(|| {
                        let id = line.item_id.as_deref()?;
                        find_item(catalog, id).map(|i| i.name.clone())
                    })
                    .unwrap_or_else(|| UNKNOWN_ITEM.to_string());
                QuoteLine {
                    name,
                    quantity: amounts.quantity,
                    unit_price: line.price_at_sale,
                    discount_percent: line.discount_value(),
                    discount_amount: amounts.discount_amount,
                    line_total: amounts.line_total,
                }
            })
            .collect();

        let customer = Customer {
            name: draft.customer.name.trim().to_string(),
            email: draft.customer.email.trim().to_string(),
            phone: draft.customer.phone.trim().to_string(),
        };

        Ok(Self {
            company: company.clone(),
            customer,
            notes: draft.notes.trim().to_string(),
            lines,
            totals: draft.totals(),
            issued_at,
        })
    }

    pub fn file_name(&self) -> String {
        let millis = (self.issued_at.unix_timestamp_nanos() / 1_000_000) as i64;
        quote_file_name(&self.customer.name, millis)
    }
}

fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let ok = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.';
        out.push(if ok { ch } else { '_' });
    }
    let trimmed = out.trim_matches('.').to_string();
    if trimmed.is_empty() {
        "quote.pdf".to_string()
    } else {
        trimmed
    }
}

/// `quote-{customer}-{millis}.pdf`, customer lowercased with whitespace runs
/// turned into `-`.
pub fn quote_file_name(customer: &str, millis: i64) -> String {
    let slug = customer
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    sanitize_filename(&format!("quote-{slug}-{millis}.pdf"))
}

/// Decodes `data:image/...;base64,...`. Anything else yields `None`.
pub fn decode_data_url(s: &str) -> Option<Vec<u8>> {
    let s = s.trim();
    if !s.to_ascii_lowercase().starts_with("data:") {
        return None;
    }
    let (meta, data) = s.split_once(',')?;
    if !meta.to_ascii_lowercase().contains(";base64") {
        return None;
    }
    base64::engine::general_purpose::STANDARD.decode(data.trim()).ok()
}

/// Binary inputs to the PDF renderer, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct RenderAssets {
    pub font: Option<Arc<Vec<u8>>>,
    pub logo: Option<Arc<Vec<u8>>>,
}

impl RenderAssets {
    pub async fn load(font_path: Option<&Path>, logo: Option<&str>) -> Result<Self> {
        let font = match font_path {
            Some(path) => {
                let bytes = tokio::fs::read(path).await?;
                ttf_parser::Face::parse(&bytes, 0).map_err(|e| {
                    AppError::Config(format!("{} is not a usable font: {e}", path.display()))
                })?;
                Some(Arc::new(bytes))
            }
            None => None,
        };

        let logo = match logo.map(str::trim).filter(|s| !s.is_empty()) {
            Some(src) if src.to_ascii_lowercase().starts_with("data:") => {
                let bytes = decode_data_url(src);
                if bytes.is_none() {
                    tracing::warn!("company logo is not a base64 data URL; ignoring it");
                }
                bytes.map(Arc::new)
            }
            Some(path) => match tokio::fs::read(path).await {
                Ok(bytes) => Some(Arc::new(bytes)),
                Err(e) => {
                    tracing::warn!(path, error = %e, "company logo could not be read; ignoring it");
                    None
                }
            },
            None => None,
        };

        Ok(Self { font, logo })
    }
}

/// Renders quotes and writes them into one directory.
#[derive(Debug, Clone)]
pub struct QuoteExporter {
    company: CompanyProfile,
    assets: RenderAssets,
    output_dir: PathBuf,
}

impl QuoteExporter {
    pub fn new(company: CompanyProfile, assets: RenderAssets, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            company,
            assets,
            output_dir: output_dir.into(),
        }
    }

    /// `BIZDESK_QUOTE_DIR` wins over `default_dir`.
    pub async fn from_config(config: &AppConfig, default_dir: PathBuf) -> Result<Self> {
        let assets =
            RenderAssets::load(config.quote_font.as_deref(), config.company.logo.as_deref()).await?;
        let dir = config.quote_dir.clone().unwrap_or(default_dir);
        Ok(Self::new(config.company.clone(), assets, dir))
    }

    pub fn company(&self) -> &CompanyProfile {
        &self.company
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn document(&self, draft: &OrderDraft, catalog: &[Item]) -> Result<QuoteDocument> {
        Ok(QuoteDocument::from_draft(
            draft,
            catalog,
            &self.company,
            OffsetDateTime::now_utc(),
        )?)
    }

    pub fn preview_html(&self, draft: &OrderDraft, catalog: &[Item]) -> Result<String> {
        Ok(markup::render_html(&self.document(draft, catalog)?))
    }

    /// Writes the PDF and returns its path. Bytes go to a `.part` file first
    /// and are renamed into place, so a failed export leaves no PDF behind.
    #[tracing::instrument(skip_all, fields(lines = doc.lines.len()))]
    pub async fn export(&self, doc: &QuoteDocument) -> Result<PathBuf> {
        let bytes = pdf::render_pdf(doc, &self.assets)?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(doc.file_name());
        let part = path.with_extension("pdf.part");

        if let Err(e) = write_then_rename(&part, &path, &bytes).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }

        tracing::info!(path = %path.display(), bytes = bytes.len(), "quote written");
        Ok(path)
    }
}

async fn write_then_rename(part: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(part, bytes).await?;
    tokio::fs::rename(part, path).await?;
    Ok(())
}
