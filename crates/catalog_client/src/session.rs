use std::sync::Arc;

use shared::{
    domain::SortKey,
    protocol::{Category, Product},
};
use tokio::sync::broadcast;

use crate::{
    editor::{ProductEditor, UserEditor},
    error::ClientError,
    list_state::{resolve, ListQuery, ListScope, PageState, SortState},
    product_list::ProductListView,
    CatalogApi, ClientEvent,
};

const EVENT_CAPACITY: usize = 256;

/// State owned by one storefront view session: listing position, ordering,
/// scope and the listing projection. Editors share its API handle and
/// notification channel.
pub struct StorefrontSession {
    api: Arc<dyn CatalogApi>,
    events: broadcast::Sender<ClientEvent>,
    pub page: PageState,
    pub sort: SortState,
    pub scope: ListScope,
    list: ProductListView,
}

impl StorefrontSession {
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let list = ProductListView::new(Arc::clone(&api), events.clone());
        Self {
            api,
            events,
            page: PageState::default(),
            sort: SortState::default(),
            scope: ListScope::default(),
            list,
        }
    }

    pub fn query(&self) -> ListQuery {
        resolve(self.page.page(), self.sort.sort_key(), &self.scope)
    }

    pub fn list_view(&self) -> &ProductListView {
        &self.list
    }

    pub async fn refresh(&self) -> Result<Option<Vec<Product>>, ClientError> {
        self.list.refresh(self.query()).await
    }

    pub fn next_page(&mut self) -> ListQuery {
        self.page.increment();
        self.query()
    }

    pub fn previous_page(&mut self) -> ListQuery {
        self.page.decrement();
        self.query()
    }

    pub fn set_sort(&mut self, key: SortKey) -> ListQuery {
        self.sort.set_sort_key(key);
        self.query()
    }

    /// The page is kept as is; it only resets with a new session.
    pub fn set_scope(&mut self, scope: ListScope) -> ListQuery {
        self.scope = scope;
        self.query()
    }

    /// Every product, unpaged, as shown on the home page.
    pub async fn all_products(&self) -> Result<Vec<Product>, ClientError> {
        self.api.list_all_products().await
    }

    pub async fn categories(&self) -> Result<Vec<Category>, ClientError> {
        self.api.list_categories().await
    }

    pub fn product_editor(&self) -> ProductEditor {
        ProductEditor::new(Arc::clone(&self.api), self.events.clone())
    }

    pub fn user_editor(&self) -> UserEditor {
        UserEditor::new(Arc::clone(&self.api), self.events.clone())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
