//! Inventory page helpers: item search, sort, paging and the add-item form.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::format::parse_timestamp;
use crate::models::{Item, NewItem};

pub const DEFAULT_ROWS_PER_PAGE: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSort {
    #[default]
    Name,
    PriceAsc,
    PriceDesc,
    Newest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub sort: ItemSort,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: usize,
}

fn default_rows_per_page() -> usize {
    DEFAULT_ROWS_PER_PAGE
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort: ItemSort::Name,
            page: 0,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPage {
    pub items: Vec<Item>,
    /// Matches across all pages.
    pub total: usize,
    pub page: usize,
    pub rows_per_page: usize,
}

pub fn matches_search(item: &Item, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    item.name.to_lowercase().contains(&needle) || item.description.to_lowercase().contains(&needle)
}

pub fn sort_items(items: &mut [Item], sort: ItemSort) {
    match sort {
        ItemSort::Name => items.sort_by_key(|i| i.name.to_lowercase()),
        ItemSort::PriceAsc => items.sort_by(|a, b| cmp_price(a, b)),
        ItemSort::PriceDesc => items.sort_by(|a, b| cmp_price(b, a)),
        ItemSort::Newest => items.sort_by(|a, b| {
            let ta = parse_timestamp(&a.created_at);
            let tb = parse_timestamp(&b.created_at);
            tb.cmp(&ta)
        }),
    }
}

fn cmp_price(a: &Item, b: &Item) -> Ordering {
    a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal)
}

/// Filter, sort, then cut out the requested page. A page past the end is
/// empty rather than an error.
pub fn query_items(items: &[Item], query: &ItemQuery) -> ItemPage {
    let mut matched: Vec<Item> = items
        .iter()
        .filter(|i| matches_search(i, &query.search))
        .cloned()
        .collect();
    sort_items(&mut matched, query.sort);

    let rows = query.rows_per_page.max(1);
    let total = matched.len();
    let start = query.page.saturating_mul(rows).min(total);
    let end = start.saturating_add(rows).min(total);

    ItemPage {
        items: matched[start..end].to_vec(),
        total,
        page: query.page,
        rows_per_page: rows,
    }
}

pub fn find_item<'a>(items: &'a [Item], id: &str) -> Option<&'a Item> {
    items.iter().find(|i| i.id == id)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemForm {
    pub name: String,
    pub price: String,
    #[serde(default)]
    pub description: String,
}

impl ItemForm {
    pub fn validate(&self) -> Result<NewItem> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required.".to_string()));
        }
        let price = match self.price.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => v,
            _ => {
                return Err(AppError::Validation(
                    "Price must be a number of 0 or more.".to_string(),
                ))
            }
        };
        Ok(NewItem {
            name,
            price,
            description: self.description.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str, price: f64, description: &str, created_at: &str) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            price,
            description: description.to_string(),
            created_at: created_at.to_string(),
        }
    }

    fn catalog() -> Vec<Item> {
        vec![
            item("1", "total station", 900.0, "Survey instrument", "2024-01-03T00:00:00Z"),
            item("2", "Auto level", 300.0, "Levelling", "2024-01-01T00:00:00Z"),
            item("3", "Boundary survey", 1500.0, "Per acre, includes total station", "2024-01-02T00:00:00Z"),
        ]
    }

    fn ids(page: &ItemPage) -> Vec<&str> {
        page.items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn name_sort_ignores_case() {
        let page = query_items(&catalog(), &ItemQuery::default());
        assert_eq!(ids(&page), ["2", "3", "1"]);
    }

    #[test]
    fn search_matches_name_or_description() {
        let query = ItemQuery {
            search: "TOTAL".to_string(),
            ..ItemQuery::default()
        };
        let page = query_items(&catalog(), &query);
        assert_eq!(page.total, 2);
        assert_eq!(ids(&page), ["3", "1"]);
    }

    #[test]
    fn price_and_age_sorts() {
        let mut q = ItemQuery {
            sort: ItemSort::PriceDesc,
            ..ItemQuery::default()
        };
        assert_eq!(ids(&query_items(&catalog(), &q)), ["3", "1", "2"]);
        q.sort = ItemSort::PriceAsc;
        assert_eq!(ids(&query_items(&catalog(), &q)), ["2", "1", "3"]);
        q.sort = ItemSort::Newest;
        assert_eq!(ids(&query_items(&catalog(), &q)), ["1", "3", "2"]);
    }

    #[test]
    fn pages_are_cut_after_sorting() {
        let query = ItemQuery {
            page: 1,
            rows_per_page: 2,
            ..ItemQuery::default()
        };
        let page = query_items(&catalog(), &query);
        assert_eq!(page.total, 3);
        assert_eq!(ids(&page), ["1"]);

        let past_end = ItemQuery {
            page: 9,
            ..query
        };
        assert!(query_items(&catalog(), &past_end).items.is_empty());
    }

    #[test]
    fn item_form_validation() {
        let form = ItemForm {
            name: "  Auto level ".to_string(),
            price: "300".to_string(),
            description: " Levelling ".to_string(),
        };
        let new_item = form.validate().unwrap();
        assert_eq!(new_item.name, "Auto level");
        assert_eq!(new_item.description, "Levelling");

        let bad_price = ItemForm {
            price: "abc".to_string(),
            ..form.clone()
        };
        assert!(matches!(bad_price.validate(), Err(AppError::Validation(_))));

        let no_name = ItemForm {
            name: " ".to_string(),
            ..form
        };
        assert!(matches!(no_name.validate(), Err(AppError::Validation(_))));
    }
}
