//! Product listing projection. Every refresh takes a new generation; a
//! response whose generation has been superseded is dropped instead of
//! overwriting newer results.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use shared::protocol::Product;
use tokio::{
    sync::{broadcast, RwLock},
    task::{AbortHandle, JoinHandle},
};
use tracing::{debug, warn};

use crate::{error::ClientError, list_state::ListQuery, CatalogApi, ClientEvent};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedList {
    pub generation: u64,
    pub query: ListQuery,
    pub products: Vec<Product>,
}

struct ListViewInner {
    api: Arc<dyn CatalogApi>,
    events: broadcast::Sender<ClientEvent>,
    generation: AtomicU64,
    rendered: RwLock<Option<RenderedList>>,
}

impl ListViewInner {
    async fn fetch_and_apply(
        &self,
        generation: u64,
        query: ListQuery,
    ) -> Result<Option<Vec<Product>>, ClientError> {
        let result = self.api.list_products(&query).await;

        let mut rendered = self.rendered.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "discarding superseded product listing");
            let _ = self
                .events
                .send(ClientEvent::StaleListingDiscarded { generation });
            return Ok(None);
        }

        match result {
            Ok(products) => {
                *rendered = Some(RenderedList {
                    generation,
                    query: query.clone(),
                    products: products.clone(),
                });
                let _ = self.events.send(ClientEvent::ProductsUpdated {
                    generation,
                    query,
                    products: products.clone(),
                });
                Ok(Some(products))
            }
            Err(err) => {
                warn!(generation, error = %err, "product listing failed");
                let _ = self.events.send(ClientEvent::Error(format!(
                    "failed to load products: {err}"
                )));
                Err(err)
            }
        }
    }
}

pub struct ProductListView {
    inner: Arc<ListViewInner>,
    inflight: Mutex<Option<AbortHandle>>,
}

impl ProductListView {
    pub fn new(api: Arc<dyn CatalogApi>, events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            inner: Arc::new(ListViewInner {
                api,
                events,
                generation: AtomicU64::new(0),
                rendered: RwLock::new(None),
            }),
            inflight: Mutex::new(None),
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Fetches `query` and renders it unless a newer refresh started
    /// meanwhile, in which case `Ok(None)` is returned.
    pub async fn refresh(&self, query: ListQuery) -> Result<Option<Vec<Product>>, ClientError> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.fetch_and_apply(generation, query).await
    }

    /// Like [`refresh`](Self::refresh) but runs in the background and aborts
    /// the previously spawned fetch, if it is still running.
    pub fn spawn_refresh(
        &self,
        query: ListQuery,
    ) -> JoinHandle<Result<Option<Vec<Product>>, ClientError>> {
        // Held across generation bump and spawn so the newest generation
        // always owns the stored abort handle.
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.fetch_and_apply(generation, query).await });

        if let Some(previous) = inflight.replace(handle.abort_handle()) {
            if !previous.is_finished() {
                debug!(generation, "cancelling superseded product listing fetch");
                previous.abort();
            }
        }
        handle
    }

    pub async fn snapshot(&self) -> Option<RenderedList> {
        self.inner.rendered.read().await.clone()
    }
}

#[cfg(test)]
#[path = "tests/product_list_tests.rs"]
mod tests;
