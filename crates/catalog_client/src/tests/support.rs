use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use shared::{
    domain::{CategoryId, ImageId, ProductId, SortKey},
    protocol::{Category, CreateUserRequest, Product, ProductImage},
};
use tokio::sync::{Mutex, Notify};

use crate::{error::ClientError, list_state::ListQuery, CatalogApi, FOREIGN_KEY_CONFLICT_MESSAGE};

pub(crate) const PAGE_SIZE: usize = 2;

pub(crate) fn sample_product(id: &str, title: &str, price: f64, category: &str) -> Product {
    Product {
        id: ProductId::new(id),
        title: title.to_string(),
        slug: shared::slug::slugify(title),
        price,
        manufacturer: "Acme".to_string(),
        description: format!("{title} description"),
        in_stock: true,
        category_id: CategoryId::new(category),
        main_image: format!("{id}.png"),
    }
}

/// In-memory catalog that records every call it receives.
#[derive(Default)]
pub(crate) struct FakeCatalog {
    pub products: Mutex<Vec<Product>>,
    pub images: HashMap<ProductId, Vec<ProductImage>>,
    pub categories: Vec<Category>,
    pub referenced: HashSet<ProductId>,
    pub gated_pages: HashMap<u32, Arc<Notify>>,
    pub failing_pages: HashSet<u32>,
    pub fail_updates: bool,
    pub fail_images: bool,
    pub calls: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<Product>>,
    pub created_users: Mutex<Vec<CreateUserRequest>>,
}

impl FakeCatalog {
    pub fn with_products(products: Vec<Product>) -> Self {
        let images = products
            .iter()
            .map(|product| {
                (
                    product.id.clone(),
                    vec![ProductImage {
                        image_id: ImageId::new(format!("{}-side", product.id)),
                        product_id: product.id.clone(),
                        image: format!("{}-side.jpg", product.id),
                    }],
                )
            })
            .collect();
        Self {
            products: Mutex::new(products),
            images,
            categories: vec![
                Category {
                    id: CategoryId::new("audio"),
                    name: "audio-gear".to_string(),
                },
                Category {
                    id: CategoryId::new("laptops"),
                    name: "laptops".to_string(),
                },
            ],
            ..Self::default()
        }
    }

    pub fn seeded() -> Self {
        Self::with_products(vec![
            sample_product("p-1", "Bluetooth Speaker X1", 49.0, "audio"),
            sample_product("p-2", "Studio Headphones", 129.0, "audio"),
            sample_product("p-3", "Ultrabook 14", 999.0, "laptops"),
            sample_product("p-4", "Aux Cable", 5.0, "audio"),
        ])
    }

    pub fn referencing(mut self, id: &str) -> Self {
        self.referenced.insert(ProductId::new(id));
        self
    }

    pub fn gate_page(mut self, page: u32) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gated_pages.insert(page, Arc::clone(&gate));
        (self, gate)
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: impl Into<String>) {
        self.calls.lock().await.push(call.into());
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn list_products(&self, query: &ListQuery) -> Result<Vec<Product>, ClientError> {
        self.record(format!("list_products page={} sort={}", query.page, query.sort))
            .await;
        if let Some(gate) = self.gated_pages.get(&query.page) {
            gate.notified().await;
        }
        if self.failing_pages.contains(&query.page) {
            return Err(ClientError::Remote {
                status: 503,
                message: "catalog unavailable".to_string(),
            });
        }

        let mut products: Vec<Product> = self
            .products
            .lock()
            .await
            .iter()
            .filter(|p| {
                query
                    .scope
                    .category
                    .as_ref()
                    .map_or(true, |category| &p.category_id == category)
            })
            .filter(|p| {
                query.scope.search.as_ref().map_or(true, |text| {
                    p.title.to_lowercase().contains(&text.to_lowercase())
                })
            })
            .cloned()
            .collect();
        match query.sort {
            SortKey::Default => {}
            SortKey::TitleAsc => products.sort_by(|a, b| a.title.cmp(&b.title)),
            SortKey::TitleDesc => products.sort_by(|a, b| b.title.cmp(&a.title)),
            SortKey::LowPrice => products.sort_by(|a, b| a.price.total_cmp(&b.price)),
            SortKey::HighPrice => products.sort_by(|a, b| b.price.total_cmp(&a.price)),
        }
        let start = (query.page as usize - 1) * PAGE_SIZE;
        Ok(products.into_iter().skip(start).take(PAGE_SIZE).collect())
    }

    async fn list_all_products(&self) -> Result<Vec<Product>, ClientError> {
        self.record("list_all_products").await;
        Ok(self.products.lock().await.clone())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product, ClientError> {
        self.record(format!("get_product {id}")).await;
        tokio::task::yield_now().await;
        self.products
            .lock()
            .await
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                resource: "product",
                id: id.to_string(),
            })
    }

    async fn update_product(&self, product: &Product) -> Result<(), ClientError> {
        self.record(format!("update_product {}", product.id)).await;
        if self.fail_updates {
            return Err(ClientError::Remote {
                status: 500,
                message: "database unavailable".to_string(),
            });
        }
        let mut products = self.products.lock().await;
        if let Some(existing) = products.iter_mut().find(|p| p.id == product.id) {
            *existing = product.clone();
        }
        self.updates.lock().await.push(product.clone());
        Ok(())
    }

    async fn delete_product(&self, id: &ProductId) -> Result<(), ClientError> {
        self.record(format!("delete_product {id}")).await;
        if self.referenced.contains(id) {
            return Err(ClientError::Conflict {
                message: FOREIGN_KEY_CONFLICT_MESSAGE.to_string(),
            });
        }
        let mut products = self.products.lock().await;
        let before = products.len();
        products.retain(|p| &p.id != id);
        if products.len() == before {
            return Err(ClientError::NotFound {
                resource: "product",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ClientError> {
        self.record("list_categories").await;
        Ok(self.categories.clone())
    }

    async fn list_product_images(&self, id: &ProductId) -> Result<Vec<ProductImage>, ClientError> {
        self.record(format!("list_product_images {id}")).await;
        if self.fail_images {
            return Err(ClientError::Remote {
                status: 500,
                message: "images down".to_string(),
            });
        }
        Ok(self.images.get(id).cloned().unwrap_or_default())
    }

    async fn upload_main_image(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ClientError> {
        self.record(format!("upload_main_image {filename} {}", bytes.len()))
            .await;
        Ok(format!("uploads/{filename}"))
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<(), ClientError> {
        self.record(format!("create_user {}", request.email)).await;
        self.created_users.lock().await.push(request.clone());
        Ok(())
    }
}
