use std::fmt::Write as _;

use super::QuoteDocument;
use crate::format::{format_currency, format_date};

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; margin: 0; padding: 0; color: #333; line-height: 1.4; }
.content-wrapper { padding: 5px 20px; max-width: 794px; margin: 0 auto; }
.logo { text-align: center; margin-bottom: 10px; }
.logo img { max-width: 120px; height: auto; }
.header { text-align: center; margin-bottom: 15px; border-bottom: 2px solid #2980b9; padding-bottom: 10px; }
.company-name { font-size: 24px; font-weight: bold; color: #2c3e50; margin-bottom: 5px; }
.company-details { font-size: 12px; color: #7f8c8d; margin-bottom: 15px; }
.quote-title { background-color: #e74c3c; color: white; padding: 8px 20px; display: inline-block; font-size: 16px; font-weight: bold; border-radius: 4px; }
.quote-date { font-size: 11px; color: #7f8c8d; margin-top: 8px; }
.customer-info { margin: 10px 0; background-color: #ecf0f1; padding: 15px; border-radius: 5px; }
.customer-info h4 { margin: 0 0 10px 0; color: #2c3e50; font-size: 14px; }
.customer-info p { margin: 5px 0; font-size: 12px; }
.items-table { width: 100%; border-collapse: collapse; margin: 20px 0; }
.items-table th { background-color: #e74c3c; color: white; padding: 12px 8px; text-align: center; font-size: 12px; }
.items-table td { padding: 10px 8px; text-align: center; border-bottom: 1px solid #ecf0f1; font-size: 11px; }
.items-table td:nth-child(2) { text-align: left; }
.items-table td:last-child { text-align: right; }
.items-table tr:nth-child(even) { background-color: #f8f9fa; }
.total-row { background-color: #2c3e50 !important; color: white; font-weight: bold; }
.summary-section { margin-top: 20px; display: flex; justify-content: flex-end; }
.summary-table { width: 300px; border-collapse: collapse; }
.summary-table td { padding: 8px 12px; border-bottom: 1px solid #ecf0f1; font-size: 12px; }
.summary-table td:first-child { text-align: left; font-weight: bold; }
.summary-table td:last-child { text-align: right; }
.total-amount { background-color: #2c3e50; color: white; font-weight: bold; font-size: 14px; }
.notes-section { margin-top: 30px; background-color: #f8f9fa; padding: 15px; border-radius: 5px; }
.notes-section h4 { margin: 0 0 10px 0; color: #2c3e50; }
.signature-section { margin-top: 50px; text-align: right; }
.signature-line { border-top: 1px solid #333; width: 200px; margin: 50px 0 10px auto; }
"#;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Multi-line text keeps its line breaks.
fn escape_multiline(input: &str) -> String {
    input
        .lines()
        .map(escape_html)
        .collect::<Vec<_>>()
        .join("<br>")
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Standalone HTML page for the quote preview.
pub fn render_html(doc: &QuoteDocument) -> String {
    let company = &doc.company;
    let mut html = String::with_capacity(8 * 1024);

    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Quote - {}</title><style>{}</style></head><body><div class=\"content-wrapper\">",
        escape_html(&doc.customer.name),
        STYLE
    );

    // Only inline logos can be shown; file paths are not reachable from the page.
    if let Some(logo) = non_empty(&company.logo).filter(|l| l.to_ascii_lowercase().starts_with("data:")) {
        let _ = write!(
            html,
            "<div class=\"logo\"><img src=\"{}\" alt=\"{} logo\"></div>",
            escape_html(logo),
            escape_html(&company.name)
        );
    }

    let mut details: Vec<String> = Vec::new();
    if let Some(address) = non_empty(&company.address) {
        details.push(escape_html(address));
    }
    if let Some(phone) = non_empty(&company.phone) {
        details.push(format!("Phone: {}", escape_html(phone)));
    }
    if let Some(email) = non_empty(&company.email) {
        details.push(format!("Email: {}", escape_html(email)));
    }
    let _ = write!(
        html,
        "<div class=\"header\"><div class=\"company-name\">{}</div><div class=\"company-details\">{}</div><div class=\"quote-title\">Quote</div><div class=\"quote-date\">Date: {}</div></div>",
        escape_html(&company.name),
        details.join("<br>"),
        format_date(doc.issued_at)
    );

    html.push_str("<div class=\"customer-info\"><h4>Billed To:</h4>");
    let _ = write!(html, "<p><strong>{}</strong></p>", escape_html(&doc.customer.name));
    if !doc.customer.email.trim().is_empty() {
        let _ = write!(html, "<p>Email: {}</p>", escape_html(&doc.customer.email));
    }
    if !doc.customer.phone.trim().is_empty() {
        let _ = write!(html, "<p>Phone: {}</p>", escape_html(&doc.customer.phone));
    }
    html.push_str("</div>");

    html.push_str(
        "<table class=\"items-table\"><thead><tr><th>#</th><th>Item Name</th><th>Quantity</th><th>Unit</th><th>Price/Unit</th><th>Discount</th><th>Amount</th></tr></thead><tbody>",
    );
    for (idx, line) in doc.lines.iter().enumerate() {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>Nos</td><td>{}</td><td>{} ({}%)</td><td>{}</td></tr>",
            idx + 1,
            escape_html(&line.name),
            line.quantity,
            format_currency(line.unit_price),
            format_currency(line.discount_amount),
            format_percent(line.discount_percent),
            format_currency(line.line_total)
        );
    }
    let _ = write!(
        html,
        "<tr class=\"total-row\"><td colspan=\"2\"><strong>Total</strong></td><td><strong>{}</strong></td><td colspan=\"3\"></td><td><strong>{}</strong></td></tr></tbody></table>",
        doc.totals.quantity,
        format_currency(doc.totals.net)
    );

    let _ = write!(
        html,
        "<div class=\"summary-section\"><table class=\"summary-table\"><tr><td>Sub Total:</td><td>{}</td></tr><tr><td>Discount:</td><td>{}</td></tr><tr class=\"total-amount\"><td>Total:</td><td>{}</td></tr></table></div>",
        format_currency(doc.totals.gross),
        format_currency(doc.totals.discount),
        format_currency(doc.totals.net)
    );

    if !doc.notes.trim().is_empty() {
        let _ = write!(
            html,
            "<div class=\"notes-section\"><h4>Terms and Conditions:</h4><p>{}</p></div>",
            escape_multiline(doc.notes.trim())
        );
    }

    let _ = write!(
        html,
        "<div class=\"signature-section\"><p>For {}</p><div class=\"signature-line\"></div><p style=\"margin: 5px 0; font-style: italic;\">Authorized Signatory</p><p style=\"font-size: 10px; font-style: italic;\">Thank you for your business!<br>Visit again!</p></div>",
        escape_html(&company.name)
    );

    html.push_str("</div></body></html>");
    html
}

/// `10` -> `10`, `12.5` -> `12.5`.
pub fn format_percent(v: f64) -> String {
    let s = format!("{:.2}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
