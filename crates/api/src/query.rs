//! List-query intent (pagination, sorting, search, filters) parsed once per request.

use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Query, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::middleware::GuardRejection;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryOptions {
    pub page: u32,
    pub limit: u32,
    pub sort: Option<String>,
    pub order: SortOrder,
    pub search: Option<String>,
    pub filters: BTreeMap<String, String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            sort: None,
            order: SortOrder::Asc,
            search: None,
            filters: BTreeMap::new(),
        }
    }
}

impl QueryOptions {
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn from_pairs(mut pairs: HashMap<String, String>) -> Result<Self, String> {
        let mut opts = QueryOptions::default();

        if let Some(page) = pairs.remove("page") {
            opts.page = match page.parse::<u32>() {
                Ok(p) if p >= 1 => p,
                _ => return Err("page must be a positive integer".to_string()),
            };
        }
        if let Some(limit) = pairs.remove("limit") {
            opts.limit = match limit.parse::<u32>() {
                Ok(l) if (1..=MAX_PAGE_SIZE).contains(&l) => l,
                _ => return Err(format!("limit must be between 1 and {MAX_PAGE_SIZE}")),
            };
        }
        if let Some(sort) = pairs.remove("sort").filter(|s| !s.is_empty()) {
            if !sort.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err("sort must be a field name".to_string());
            }
            opts.sort = Some(sort);
        }
        if let Some(order) = pairs.remove("order") {
            opts.order = match order.to_ascii_lowercase().as_str() {
                "asc" => SortOrder::Asc,
                "desc" => SortOrder::Desc,
                _ => return Err("order must be 'asc' or 'desc'".to_string()),
            };
        }
        opts.search = pairs
            .remove("search")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        opts.filters = pairs.into_iter().collect();

        Ok(opts)
    }
}

/// Parse the query string into [`QueryOptions`] for downstream handlers.
pub async fn parse_query_options(mut req: Request, next: Next) -> Response {
    let pairs = match Query::<HashMap<String, String>>::try_from_uri(req.uri()) {
        Ok(Query(pairs)) => pairs,
        Err(_) => {
            return GuardRejection::InvalidQuery("malformed query string".to_string())
                .into_response();
        }
    };

    match QueryOptions::from_pairs(pairs) {
        Ok(opts) => {
            req.extensions_mut().insert(opts);
            next.run(req).await
        }
        Err(msg) => GuardRejection::InvalidQuery(msg).into_response(),
    }
}
