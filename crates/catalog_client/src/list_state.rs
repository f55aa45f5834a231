//! Page and sort state for a product listing, and the pure resolver that
//! turns them into a [`ListQuery`].

use serde::{Deserialize, Serialize};
use shared::domain::{CategoryId, SortKey};

use crate::error::ClientError;

/// Current page of a listing. Never below 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    page: u32,
}

impl Default for PageState {
    fn default() -> Self {
        Self { page: 1 }
    }
}

impl PageState {
    pub fn page(&self) -> u32 {
        self.page
    }

    /// No upper bound; an empty result set from the API is the only limit.
    pub fn increment(&mut self) {
        self.page = self.page.saturating_add(1);
    }

    pub fn decrement(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortState {
    key: SortKey,
}

impl SortState {
    pub fn sort_key(&self) -> SortKey {
        self.key
    }

    pub fn set_sort_key(&mut self, key: SortKey) {
        self.key = key;
    }

    /// Accepts the wire spelling of a sort key, as picked from a select box.
    pub fn set_sort_key_str(&mut self, raw: &str) -> Result<(), ClientError> {
        let key = raw
            .parse::<SortKey>()
            .map_err(|err| ClientError::validation("sort", err.to_string()))?;
        self.key = key;
        Ok(())
    }
}

/// Optional narrowing of a listing, usually taken from the current route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListScope {
    pub category: Option<CategoryId>,
    pub search: Option<String>,
}

impl ListScope {
    pub fn category(category: CategoryId) -> Self {
        Self {
            category: Some(category),
            search: None,
        }
    }

    pub fn search(text: impl Into<String>) -> Self {
        Self {
            category: None,
            search: Some(text.into()),
        }
    }
}

/// Query descriptor for one product listing request. Equal descriptors
/// always describe the same request, so they can key a cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: u32,
    pub sort: SortKey,
    pub scope: ListScope,
}

impl ListQuery {
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("sort", self.sort.as_str().to_string()),
        ];
        if let Some(category) = &self.scope.category {
            params.push(("category", category.to_string()));
        }
        if let Some(search) = &self.scope.search {
            params.push(("search", search.clone()));
        }
        params
    }
}

/// Pure: a zero page is lifted to 1 and blank search text is dropped.
pub fn resolve(page: u32, sort: SortKey, scope: &ListScope) -> ListQuery {
    let search = scope
        .search
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    let category = scope
        .category
        .as_ref()
        .filter(|category| !category.as_str().trim().is_empty())
        .cloned();

    ListQuery {
        page: page.max(1),
        sort,
        scope: ListScope { category, search },
    }
}

#[cfg(test)]
#[path = "tests/list_state_tests.rs"]
mod tests;
