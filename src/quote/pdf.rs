//! Vector PDF for quotes.
//!
//! The quote is laid out once on a virtual canvas [`CANVAS_WIDTH`] px wide as
//! a stack of horizontal bands (header, customer, table header, one band per
//! line, totals, summary, notes, signature). [`paginate`] then maps the bands
//! onto A4 pages: short quotes are centered on a single page, longer ones flow
//! across pages without a band ever being split.

use std::io::{BufWriter, Cursor};

use printpdf::image_crate::DynamicImage;
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfLayerReference, Point, Rect, Rgb,
};

use super::{QuoteDocument, RenderAssets};
use crate::error::{AppError, Result};
use crate::format::{format_currency, format_date, RUPEE};

use super::markup::format_percent;

/// Off-screen width of the quote page: 794 px of A4 plus 20 px padding each side.
pub const CANVAS_WIDTH: f32 = 834.0;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const PAGE_MARGIN_Y: f32 = 10.0;
const PAD_X: f32 = 20.0;
const CONTENT_RIGHT: f32 = CANVAS_WIDTH - PAD_X;
const PT_PER_MM: f32 = 72.0 / 25.4;
const LOGO_DPI: f32 = 300.0;
const LOGO_MAX_W: f32 = 120.0;

const INK: u32 = 0x333333;
const NAVY: u32 = 0x2c3e50;
const MUTED: u32 = 0x7f8c8d;
const RED: u32 = 0xe74c3c;
const BLUE: u32 = 0x2980b9;
const CLOUD: u32 = 0xecf0f1;
const STRIPE: u32 = 0xf8f9fa;
const WHITE: u32 = 0xffffff;

/// Item table columns, left to right, as `(label, width)`.
const COLUMNS: [(&str, f32); 7] = [
    ("#", 40.0),
    ("Item Name", 254.0),
    ("Quantity", 80.0),
    ("Unit", 60.0),
    ("Price/Unit", 110.0),
    ("Discount", 130.0),
    ("Amount", 120.0),
];
const CELL_PAD_X: f32 = 8.0;

fn rgb(hex: u32) -> Color {
    let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
    Color::Rgb(Rgb::new(channel(16), channel(8), channel(0), None))
}

fn render_err(e: impl std::fmt::Display) -> AppError {
    AppError::Render(e.to_string())
}

/// Text measurement, either from the embedded TTF or a fixed estimate for
/// the built-in Helvetica.
enum Metrics<'a> {
    Ttf(ttf_parser::Face<'a>),
    Builtin,
}

impl Metrics<'_> {
    /// Width in the same unit as `size`.
    fn width(&self, text: &str, size: f32) -> f32 {
        match self {
            Metrics::Ttf(face) => {
                let units_per_em = face.units_per_em() as f32;
                if units_per_em <= 0.0 {
                    return 0.0;
                }
                let units: i32 = text
                    .chars()
                    .filter_map(|ch| face.glyph_index(ch))
                    .map(|gid| face.glyph_hor_advance(gid).unwrap_or(0) as i32)
                    .sum();
                units as f32 / units_per_em * size
            }
            Metrics::Builtin => text.chars().count() as f32 * size * 0.52,
        }
    }

    /// Built-in fonts only cover ASCII here; the rupee sign becomes `Rs.`.
    fn prepare(&self, text: &str) -> String {
        match self {
            Metrics::Ttf(_) => text.to_string(),
            Metrics::Builtin => text
                .replace(RUPEE, "Rs. ")
                .chars()
                .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
                .collect(),
        }
    }

    fn money(&self, v: f64) -> String {
        self.prepare(&format_currency(v))
    }

    fn wrap(&self, input: &str, size: f32, max_width: f32) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for raw in input.lines() {
            let s = raw.trim();
            if s.is_empty() {
                continue;
            }
            let mut current = String::new();
            for word in s.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{current} {word}")
                };
                if self.width(&candidate, size) <= max_width || current.is_empty() {
                    current = candidate;
                } else {
                    out.push(std::mem::replace(&mut current, word.to_string()));
                }
                // A single word wider than the column is cut by characters.
                while self.width(&current, size) > max_width && current.chars().count() > 1 {
                    let mut head = String::new();
                    for ch in current.chars() {
                        let next = format!("{head}{ch}");
                        if !head.is_empty() && self.width(&next, size) > max_width {
                            break;
                        }
                        head = next;
                    }
                    let rest = current[head.len()..].to_string();
                    out.push(head);
                    current = rest;
                }
            }
            if !current.is_empty() {
                out.push(current);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy)]
struct Style {
    size: f32,
    bold: bool,
    color: u32,
}

impl Style {
    const fn new(size: f32, bold: bool, color: u32) -> Self {
        Self { size, bold, color }
    }

    fn line_height(&self) -> f32 {
        self.size * 1.4
    }
}

/// One drawing instruction in canvas px, `y` growing downward from the top
/// of its band.
#[derive(Debug, Clone, PartialEq)]
enum Op {
    Text {
        x: f32,
        baseline: f32,
        size: f32,
        bold: bool,
        color: u32,
        text: String,
    },
    Fill {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: u32,
    },
    Rule {
        x1: f32,
        x2: f32,
        y: f32,
        width: f32,
        color: u32,
    },
    Logo {
        x: f32,
        y: f32,
        w: f32,
    },
}

#[derive(Debug, Clone, Default)]
struct Band {
    height: f32,
    ops: Vec<Op>,
}

impl Band {
    /// Places `text` between `left` and `right` with the given alignment.
    #[allow(clippy::too_many_arguments)]
    fn text(
        &mut self,
        m: &Metrics<'_>,
        text: &str,
        style: Style,
        left: f32,
        right: f32,
        align: Align,
        baseline: f32,
    ) {
        let text = m.prepare(text);
        let width = m.width(&text, style.size);
        let x = match align {
            Align::Left => left,
            Align::Center => left + ((right - left) - width) / 2.0,
            Align::Right => right - width,
        };
        self.ops.push(Op::Text {
            x: x.max(0.0),
            baseline,
            size: style.size,
            bold: style.bold,
            color: style.color,
            text,
        });
    }

    /// Writes one line at `*y` and moves `*y` below it.
    #[allow(clippy::too_many_arguments)]
    fn line(
        &mut self,
        m: &Metrics<'_>,
        y: &mut f32,
        text: &str,
        style: Style,
        left: f32,
        right: f32,
        align: Align,
    ) {
        self.text(m, text, style, left, right, align, *y + style.size * 1.05);
        *y += style.line_height();
    }

    fn fill(&mut self, x: f32, y: f32, w: f32, h: f32, color: u32) {
        self.ops.push(Op::Fill { x, y, w, h, color });
    }

    fn rule(&mut self, x1: f32, x2: f32, y: f32, width: f32, color: u32) {
        self.ops.push(Op::Rule {
            x1,
            x2,
            y,
            width,
            color,
        });
    }

    /// Baseline that centers a single line of `size` within `height`.
    fn middle(height: f32, size: f32) -> f32 {
        height / 2.0 + size * 0.35
    }
}

fn column_bounds() -> [(f32, f32); 7] {
    let mut out = [(0.0, 0.0); 7];
    let mut x = PAD_X;
    for (i, (_, w)) in COLUMNS.iter().enumerate() {
        out[i] = (x, x + w);
        x += w;
    }
    out
}

fn layout(doc: &QuoteDocument, m: &Metrics<'_>, logo: Option<(u32, u32)>) -> Vec<Band> {
    let mut bands = vec![header_band(doc, m, logo), customer_band(doc, m), table_header_band(m)];
    for (idx, line) in doc.lines.iter().enumerate() {
        bands.push(row_band(m, idx, line));
    }
    bands.push(total_row_band(doc, m));
    bands.push(summary_band(doc, m));
    if !doc.notes.trim().is_empty() {
        bands.push(notes_band(doc, m));
    }
    bands.push(signature_band(doc, m));
    bands
}

fn header_band(doc: &QuoteDocument, m: &Metrics<'_>, logo: Option<(u32, u32)>) -> Band {
    let mut b = Band::default();
    let mut y = 5.0;

    if let Some((px_w, px_h)) = logo {
        let w = LOGO_MAX_W.min(px_w.max(1) as f32);
        let h = w * px_h.max(1) as f32 / px_w.max(1) as f32;
        b.ops.push(Op::Logo {
            x: (CANVAS_WIDTH - w) / 2.0,
            y,
            w,
        });
        y += h + 10.0;
    }

    let company = &doc.company;
    b.line(m, &mut y, &company.name, Style::new(24.0, true, NAVY), PAD_X, CONTENT_RIGHT, Align::Center);
    y += 5.0;

    let details = [
        company.address.clone(),
        company.phone.as_ref().map(|p| format!("Phone: {p}")),
        company.email.as_ref().map(|e| format!("Email: {e}")),
    ];
    let detail_style = Style::new(12.0, false, MUTED);
    for detail in details.iter().flatten().filter(|d| !d.trim().is_empty()) {
        b.line(m, &mut y, detail.trim(), detail_style, PAD_X, CONTENT_RIGHT, Align::Center);
    }
    y += 15.0;

    let badge = Style::new(16.0, true, WHITE);
    let badge_w = m.width("Quote", badge.size) + 40.0;
    let badge_h = badge.line_height() + 16.0;
    let badge_x = (CANVAS_WIDTH - badge_w) / 2.0;
    b.fill(badge_x, y, badge_w, badge_h, RED);
    b.text(m, "Quote", badge, badge_x, badge_x + badge_w, Align::Center, y + Band::middle(badge_h, badge.size));
    y += badge_h + 8.0;

    let date = format!("Date: {}", format_date(doc.issued_at));
    b.line(m, &mut y, &date, Style::new(11.0, false, MUTED), PAD_X, CONTENT_RIGHT, Align::Center);

    y += 10.0;
    b.rule(PAD_X, CONTENT_RIGHT, y + 1.0, 2.0, BLUE);
    b.height = y + 2.0 + 15.0;
    b
}

fn customer_band(doc: &QuoteDocument, m: &Metrics<'_>) -> Band {
    let mut b = Band::default();
    let top = 10.0;
    let mut y = top + 15.0;
    let left = PAD_X + 15.0;
    let right = CONTENT_RIGHT - 15.0;

    let mut text = Band::default();
    text.line(m, &mut y, "Billed To:", Style::new(14.0, true, NAVY), left, right, Align::Left);
    y += 6.0;

    let para = Style::new(12.0, false, INK);
    let customer = &doc.customer;
    text.line(m, &mut y, &customer.name, Style { bold: true, ..para }, left, right, Align::Left);
    if !customer.email.trim().is_empty() {
        y += 5.0;
        text.line(m, &mut y, &format!("Email: {}", customer.email.trim()), para, left, right, Align::Left);
    }
    if !customer.phone.trim().is_empty() {
        y += 5.0;
        text.line(m, &mut y, &format!("Phone: {}", customer.phone.trim()), para, left, right, Align::Left);
    }
    y += 15.0;

    b.fill(PAD_X, top, CONTENT_RIGHT - PAD_X, y - top, CLOUD);
    b.ops.append(&mut text.ops);
    b.height = y + 10.0 + 20.0;
    b
}

fn table_header_band(m: &Metrics<'_>) -> Band {
    let height = 38.0;
    let style = Style::new(12.0, true, WHITE);
    let mut b = Band::default();
    b.fill(PAD_X, 0.0, CONTENT_RIGHT - PAD_X, height, RED);
    for ((label, _), (l, r)) in COLUMNS.iter().zip(column_bounds()) {
        b.text(m, label, style, l, r, Align::Center, Band::middle(height, style.size));
    }
    b.height = height;
    b
}

fn row_band(m: &Metrics<'_>, idx: usize, line: &super::QuoteLine) -> Band {
    let cols = column_bounds();
    let style = Style::new(11.0, false, INK);
    let (name_l, name_r) = cols[1];
    let name_lines = m.wrap(&line.name, style.size, name_r - name_l - 2.0 * CELL_PAD_X);
    let name_lines = if name_lines.is_empty() {
        vec![String::new()]
    } else {
        name_lines
    };
    let height = (20.0 + name_lines.len() as f32 * style.line_height()).max(34.0);

    let mut b = Band::default();
    if idx % 2 == 1 {
        b.fill(PAD_X, 0.0, CONTENT_RIGHT - PAD_X, height, STRIPE);
    }

    let mut y = 10.0;
    for text in &name_lines {
        b.line(m, &mut y, text, style, name_l + CELL_PAD_X, name_r - CELL_PAD_X, Align::Left);
    }

    let discount = format!(
        "{} ({}%)",
        m.money(line.discount_amount),
        format_percent(line.discount_percent)
    );
    let cells = [
        (0, (idx + 1).to_string(), Align::Center),
        (2, line.quantity.to_string(), Align::Center),
        (3, "Nos".to_string(), Align::Center),
        (4, m.money(line.unit_price), Align::Center),
        (5, discount, Align::Center),
        (6, m.money(line.line_total), Align::Right),
    ];
    let baseline = Band::middle(height, style.size);
    for (col, text, align) in cells {
        let (l, r) = cols[col];
        b.text(m, &text, style, l + CELL_PAD_X, r - CELL_PAD_X, align, baseline);
    }

    b.rule(PAD_X, CONTENT_RIGHT, height - 0.5, 1.0, CLOUD);
    b.height = height;
    b
}

fn total_row_band(doc: &QuoteDocument, m: &Metrics<'_>) -> Band {
    let cols = column_bounds();
    let height = 34.0;
    let style = Style::new(11.0, true, WHITE);
    let baseline = Band::middle(height, style.size);

    let mut b = Band::default();
    b.fill(PAD_X, 0.0, CONTENT_RIGHT - PAD_X, height, NAVY);
    b.text(m, "Total", style, cols[0].0 + CELL_PAD_X, cols[1].1, Align::Left, baseline);
    b.text(m, &doc.totals.quantity.to_string(), style, cols[2].0, cols[2].1, Align::Center, baseline);
    b.text(m, &m.money(doc.totals.net), style, cols[6].0, cols[6].1 - CELL_PAD_X, Align::Right, baseline);
    b.height = height + 20.0;
    b
}

fn summary_band(doc: &QuoteDocument, m: &Metrics<'_>) -> Band {
    let left = CONTENT_RIGHT - 300.0;
    let mut b = Band::default();
    let mut y = 20.0;

    let rows = [
        ("Sub Total:", doc.totals.gross, Style::new(12.0, false, INK), None),
        ("Discount:", doc.totals.discount, Style::new(12.0, false, INK), None),
        ("Total:", doc.totals.net, Style::new(14.0, true, WHITE), Some(NAVY)),
    ];
    for (label, amount, style, background) in rows {
        let h = style.line_height() + 16.0;
        if let Some(color) = background {
            b.fill(left, y, 300.0, h, color);
        }
        let baseline = y + Band::middle(h, style.size);
        b.text(m, label, Style { bold: true, ..style }, left + 12.0, CONTENT_RIGHT - 12.0, Align::Left, baseline);
        b.text(m, &m.money(amount), style, left + 12.0, CONTENT_RIGHT - 12.0, Align::Right, baseline);
        y += h;
        b.rule(left, CONTENT_RIGHT, y - 0.5, 1.0, CLOUD);
    }

    b.height = y;
    b
}

fn notes_band(doc: &QuoteDocument, m: &Metrics<'_>) -> Band {
    let top = 30.0;
    let left = PAD_X + 15.0;
    let right = CONTENT_RIGHT - 15.0;
    let para = Style::new(12.0, false, INK);

    let mut text = Band::default();
    let mut y = top + 15.0;
    text.line(m, &mut y, "Terms and Conditions:", Style::new(14.0, true, NAVY), left, right, Align::Left);
    y += 10.0;
    for line in m.wrap(doc.notes.trim(), para.size, right - left) {
        text.line(m, &mut y, &line, para, left, right, Align::Left);
    }
    y += 15.0;

    let mut b = Band::default();
    b.fill(PAD_X, top, CONTENT_RIGHT - PAD_X, y - top, STRIPE);
    b.ops.append(&mut text.ops);
    b.height = y;
    b
}

fn signature_band(doc: &QuoteDocument, m: &Metrics<'_>) -> Band {
    let mut b = Band::default();
    let mut y = 50.0;
    let para = Style::new(12.0, false, INK);

    b.line(m, &mut y, &format!("For {}", doc.company.name), para, PAD_X, CONTENT_RIGHT, Align::Right);
    y += 50.0;
    b.rule(CONTENT_RIGHT - 200.0, CONTENT_RIGHT, y, 1.0, INK);
    y += 10.0;
    b.line(m, &mut y, "Authorized Signatory", para, PAD_X, CONTENT_RIGHT, Align::Right);
    y += 8.0;
    let small = Style::new(10.0, false, INK);
    b.line(m, &mut y, "Thank you for your business!", small, PAD_X, CONTENT_RIGHT, Align::Right);
    b.line(m, &mut y, "Visit again!", small, PAD_X, CONTENT_RIGHT, Align::Right);

    b.height = y + 15.0;
    b
}

/// Where a band lands: page index and distance of its top edge from the top
/// of that page, in mm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub page: usize,
    pub top: f32,
}

/// Places bands of the given canvas heights, scaled by `scale` mm per px.
/// Content that fits one page is centered vertically; otherwise bands flow
/// top-down and a band that does not fit starts the next page.
pub fn paginate(heights: &[f32], scale: f32, page_height: f32, margin: f32) -> Vec<Placement> {
    let usable = page_height - 2.0 * margin;
    let total: f32 = heights.iter().map(|h| h * scale).sum();

    let mut out = Vec::with_capacity(heights.len());
    if total <= usable {
        let mut top = (page_height - total) / 2.0;
        for h in heights {
            out.push(Placement { page: 0, top });
            top += h * scale;
        }
        return out;
    }

    let mut page = 0;
    let mut top = margin;
    for h in heights {
        let h = h * scale;
        if top > margin && top + h > page_height - margin {
            page += 1;
            top = margin;
        }
        out.push(Placement { page, top });
        top += h;
    }
    out
}

fn push_line(layer: &PdfLayerReference, font: &IndirectFontRef, text: &str, size_pt: f32, x: f32, y: f32) {
    layer.use_text(text, size_pt, Mm(x), Mm(y), font);
}

fn draw_rule_with_thickness(layer: &PdfLayerReference, x1: f32, x2: f32, y: f32, thickness: f32, color: u32) {
    layer.set_outline_color(rgb(color));
    layer.set_outline_thickness(thickness);
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(x1), Mm(y)), false),
            (Point::new(Mm(x2), Mm(y)), false),
        ],
        is_closed: false,
    });
}

fn fill_rect(layer: &PdfLayerReference, x: f32, y_top: f32, w: f32, h: f32, color: u32) {
    layer.set_fill_color(rgb(color));
    // printpdf uses a bottom-left origin.
    let rect = Rect::new(Mm(x), Mm(y_top - h), Mm(x + w), Mm(y_top)).with_mode(PaintMode::Fill);
    layer.add_rect(rect);
    layer.set_fill_color(rgb(0x000000));
}

fn place_logo(layer: &PdfLayerReference, img: &DynamicImage, x: f32, y_bottom: f32, w_mm: f32) {
    let natural_w_mm = img.width().max(1) as f32 / LOGO_DPI * 25.4;
    let scale = (w_mm / natural_w_mm).max(0.01);
    Image::from_dynamic_image(img).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(y_bottom)),
            rotate: None,
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(LOGO_DPI),
        },
    );
}

/// Renders the quote to PDF bytes.
pub fn render_pdf(doc: &QuoteDocument, assets: &RenderAssets) -> Result<Vec<u8>> {
    let logo = assets
        .logo
        .as_deref()
        .and_then(|bytes| match printpdf::image_crate::load_from_memory(bytes) {
            Ok(img) => Some(img),
            Err(e) => {
                tracing::warn!(error = %e, "company logo could not be decoded; rendering without it");
                None
            }
        });

    let metrics = match assets.font.as_deref() {
        Some(bytes) => Metrics::Ttf(
            ttf_parser::Face::parse(bytes, 0).map_err(|e| render_err(format!("font: {e}")))?,
        ),
        None => Metrics::Builtin,
    };

    let bands = layout(doc, &metrics, logo.as_ref().map(|i| (i.width(), i.height())));
    let scale = PAGE_W / CANVAS_WIDTH;
    let heights: Vec<f32> = bands.iter().map(|b| b.height).collect();
    let placements = paginate(&heights, scale, PAGE_H, PAGE_MARGIN_Y);
    let page_count = placements.iter().map(|p| p.page + 1).max().unwrap_or(1);

    let title = format!("Quote - {}", doc.customer.name);
    let (pdf, page1, layer1) = PdfDocument::new(&title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let mut layers = vec![pdf.get_page(page1).get_layer(layer1)];
    for _ in 1..page_count {
        let (page, layer) = pdf.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        layers.push(pdf.get_page(page).get_layer(layer));
    }

    let (regular, bold) = match assets.font.as_deref() {
        Some(bytes) => {
            let font = pdf
                .add_external_font(Cursor::new(bytes.as_slice()))
                .map_err(render_err)?;
            (font.clone(), font)
        }
        None => (
            pdf.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)?,
            pdf.add_builtin_font(BuiltinFont::HelveticaBold).map_err(render_err)?,
        ),
    };

    for (band, place) in bands.iter().zip(&placements) {
        let layer = layers
            .get(place.page)
            .ok_or_else(|| render_err(format!("page {} was not created", place.page + 1)))?;
        let x_mm = |px: f32| px * scale;
        let y_mm = |px: f32| PAGE_H - (place.top + px * scale);

        for op in &band.ops {
            match op {
                Op::Fill { x, y, w, h, color } => {
                    fill_rect(layer, x_mm(*x), y_mm(*y), w * scale, h * scale, *color);
                }
                Op::Rule { x1, x2, y, width, color } => {
                    draw_rule_with_thickness(
                        layer,
                        x_mm(*x1),
                        x_mm(*x2),
                        y_mm(*y),
                        width * scale * PT_PER_MM,
                        *color,
                    );
                }
                Op::Text { x, baseline, size, bold: is_bold, color, text } => {
                    let font = if *is_bold { &bold } else { &regular };
                    layer.set_fill_color(rgb(*color));
                    push_line(layer, font, text, size * scale * PT_PER_MM, x_mm(*x), y_mm(*baseline));
                    layer.set_fill_color(rgb(0x000000));
                }
                Op::Logo { x, y, w } => {
                    if let Some(img) = &logo {
                        let h_px = w * img.height().max(1) as f32 / img.width().max(1) as f32;
                        place_logo(layer, img, x_mm(*x), y_mm(y + h_px), w * scale);
                    }
                }
            }
        }
    }

    let mut writer = BufWriter::new(Vec::<u8>::new());
    pdf.save(&mut writer).map_err(render_err)?;
    let bytes = writer.into_inner().map_err(render_err)?;
    tracing::debug!(pages = page_count, bytes = bytes.len(), "quote pdf rendered");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::Totals;
    use crate::quote::{CompanyProfile, QuoteLine};
    use crate::wizard::Customer;
    use time::macros::datetime;

    fn doc(lines: usize, notes: &str) -> QuoteDocument {
        QuoteDocument {
            company: CompanyProfile {
                name: "Survey & Co".to_string(),
                address: Some("149 LRS Palayam, Tenkasi".to_string()),
                phone: Some("9489837602".to_string()),
                email: Some("office@survey.test".to_string()),
                logo: None,
            },
            customer: Customer {
                name: "Acme".to_string(),
                email: String::new(),
                phone: "98765 43210".to_string(),
            },
            notes: notes.to_string(),
            lines: (0..lines)
                .map(|i| QuoteLine {
                    name: format!("Boundary survey {i}"),
                    quantity: 1,
                    unit_price: 1500.0,
                    discount_percent: 0.0,
                    discount_amount: 0.0,
                    line_total: 1500.0,
                })
                .collect(),
            totals: Totals {
                gross: 1500.0 * lines as f64,
                discount: 0.0,
                net: 1500.0 * lines as f64,
                quantity: lines as i64,
            },
            issued_at: datetime!(2024-05-01 10:00 UTC),
        }
    }

    fn texts(bands: &[Band]) -> Vec<String> {
        bands
            .iter()
            .flat_map(|b| b.ops.iter())
            .filter_map(|op| match op {
                Op::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn short_content_is_centered_on_one_page() {
        let placed = paginate(&[100.0, 100.0], 0.5, 297.0, 10.0);
        assert_eq!(
            placed,
            vec![
                Placement { page: 0, top: 98.5 },
                Placement { page: 0, top: 148.5 },
            ]
        );
    }

    #[test]
    fn long_content_flows_without_splitting_bands() {
        let placed = paginate(&[200.0; 5], 0.5, 297.0, 10.0);
        let pages: Vec<usize> = placed.iter().map(|p| p.page).collect();
        assert_eq!(pages, [0, 0, 1, 1, 2]);
        assert_eq!(placed[2].top, 10.0);
        for p in &placed {
            assert!(p.top + 100.0 <= 287.0);
        }
    }

    #[test]
    fn oversized_band_still_gets_a_page() {
        let placed = paginate(&[20.0, 600.0], 0.5, 297.0, 10.0);
        assert_eq!(placed[0], Placement { page: 0, top: 10.0 });
        assert_eq!(placed[1], Placement { page: 1, top: 10.0 });
    }

    #[test]
    fn one_band_per_line_plus_fixed_sections() {
        let bands = layout(&doc(3, ""), &Metrics::Builtin, None);
        // header, customer, table header, 3 rows, total, summary, signature
        assert_eq!(bands.len(), 9);
        let bands = layout(&doc(3, "Valid for 30 days"), &Metrics::Builtin, None);
        assert_eq!(bands.len(), 10);
        assert!(bands.iter().all(|b| b.height > 0.0));
    }

    #[test]
    fn builtin_font_writes_rupees_as_text() {
        let bands = layout(&doc(1, ""), &Metrics::Builtin, None);
        let all = texts(&bands);
        assert!(all.iter().any(|t| t == "Rs. 1,500.00"));
        assert!(all.iter().all(|t| t.is_ascii()));
        assert!(all.iter().any(|t| t == "Phone: 98765 43210"));
        assert!(all.iter().any(|t| t == "Date: 01/05/2024"));
    }

    #[test]
    fn long_names_wrap_inside_their_column() {
        let m = Metrics::Builtin;
        let lines = m.wrap("Topographic survey with contour plotting and boundary demarcation", 11.0, 238.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| m.width(l, 11.0) <= 238.0));

        let cut = m.wrap("Aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", 11.0, 60.0);
        assert!(cut.len() > 1);
        assert_eq!(cut.concat().len(), 52);
    }

    #[test]
    fn long_quotes_span_pages() {
        let bands = layout(&doc(60, "Valid for 30 days"), &Metrics::Builtin, None);
        let heights: Vec<f32> = bands.iter().map(|b| b.height).collect();
        let placed = paginate(&heights, PAGE_W / CANVAS_WIDTH, PAGE_H, PAGE_MARGIN_Y);
        assert!(placed.last().unwrap().page >= 1);
    }

    #[test]
    fn renders_a_pdf_with_builtin_fonts() {
        let bytes = render_pdf(&doc(2, "Advance 50%"), &RenderAssets::default()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn multi_page_pdf_renders() {
        let bytes = render_pdf(&doc(80, ""), &RenderAssets::default()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn bad_font_is_a_render_error() {
        let assets = RenderAssets {
            font: Some(std::sync::Arc::new(b"not a font".to_vec())),
            logo: None,
        };
        assert!(matches!(render_pdf(&doc(1, ""), &assets), Err(AppError::Render(_))));
    }
}
