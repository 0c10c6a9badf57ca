use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query parameters accepted by listing endpoints
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PageQuery {
    pub search_keyword: Option<String>,
    pub search_column: Option<String>,
    /// `true` sorts descending, `false` ascending; no sorting without `sort_column`
    pub sort: Option<bool>,
    pub sort_column: Option<String>,
    /// 1-based
    pub page_index: Option<usize>,
    /// 0 returns every row
    pub page_size: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page {
    pub total_result_details: usize,
    pub result_details: Vec<Value>,
}

fn contains_keyword(value: &Value, keyword: &str) -> bool {
    match value {
        Value::String(text) => text.to_lowercase().contains(keyword),
        Value::Number(number) => number.to_string().contains(keyword),
        Value::Bool(flag) => flag.to_string().contains(keyword),
        _ => false,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (a, b) => a.to_string().cmp(&b.to_string()),
    }
}

/// Absent or null values always sort last, whatever the direction.
fn compare_rows(a: &Value, b: &Value, column: &str, descending: bool) -> Ordering {
    let a = a.get(column).filter(|value| !value.is_null());
    let b = b.get(column).filter(|value| !value.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) if descending => compare_values(b, a),
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

/// Filter, sort and slice JSON object rows.
pub fn get_page(mut rows: Vec<Value>, query: &PageQuery) -> Page {
    if let Some(keyword) = query.search_keyword.as_deref().filter(|keyword| !keyword.is_empty()) {
        let keyword = keyword.to_lowercase();
        rows.retain(|row| match query.search_column.as_deref() {
            Some(column) => row.get(column).map_or(false, |value| contains_keyword(value, &keyword)),
            None => row
                .as_object()
                .map_or(false, |fields| fields.values().any(|value| contains_keyword(value, &keyword))),
        });
    }

    if let (Some(descending), Some(column)) = (query.sort, query.sort_column.as_deref()) {
        rows.sort_by(|a, b| compare_rows(a, b, column, descending));
    }

    let total_result_details = rows.len();
    let page_size = query.page_size.unwrap_or(0);
    let result_details = if page_size > 0 {
        let start = query.page_index.unwrap_or(1).max(1).saturating_sub(1).saturating_mul(page_size);
        rows.into_iter().skip(start).take(page_size).collect()
    } else {
        rows
    };

    Page {
        total_result_details,
        result_details,
    }
}
