#![allow(dead_code)]

use std::path::Path;

use bizdesk_lib::models::{Item, User};
use bizdesk_lib::quote::{CompanyProfile, QuoteExporter, RenderAssets};
use bizdesk_lib::store::MemoryStore;
use bizdesk_lib::workflows::{CustomerPatch, LinePatch, OrderPage};

pub const EMPLOYEE_ID: &str = "8c1f6a62-2d1e-4b8e-9f51-0c8a3a1f0e11";

pub fn item(id: &str, name: &str, price: f64) -> Item {
    Item {
        id: id.to_string(),
        name: name.to_string(),
        price,
        description: String::new(),
        created_at: "2024-05-01T10:00:00+00:00".to_string(),
    }
}

pub fn catalog() -> Vec<Item> {
    vec![item("item-a", "Survey Stakes", 100.0), item("item-b", "Field Visit", 50.0)]
}

pub fn store() -> MemoryStore {
    MemoryStore::with_items(catalog())
}

pub fn employee() -> User {
    User {
        id: EMPLOYEE_ID.to_string(),
        email: Some("staff@example.com".to_string()),
    }
}

pub fn exporter(dir: &Path) -> QuoteExporter {
    let company = CompanyProfile {
        name: "Dhishank Surveying".to_string(),
        phone: Some("9489837602".to_string()),
        ..CompanyProfile::default()
    };
    QuoteExporter::new(company, RenderAssets::default(), dir)
}

/// Two lines: 2 x 100 at 10% off and 1 x 50, for Acme. Net total 230.
pub fn fill_acme_order(page: &mut OrderPage) {
    let first = page.add_line();
    page.update_line(
        first,
        LinePatch {
            item_id: Some("item-a".to_string()),
            quantity: Some("2".to_string()),
            discount: Some("10".to_string()),
        },
    )
    .expect("first line");

    let second = page.add_line();
    page.update_line(
        second,
        LinePatch {
            item_id: Some("item-b".to_string()),
            quantity: Some("1".to_string()),
            discount: None,
        },
    )
    .expect("second line");

    page.set_customer(CustomerPatch {
        name: Some("Acme".to_string()),
        ..CustomerPatch::default()
    });
}
