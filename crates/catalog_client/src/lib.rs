use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response, StatusCode,
};
use shared::{
    domain::ProductId,
    error::{ApiError, ErrorCode},
    protocol::{Category, CreateUserRequest, MainImageUploadResponse, Product, ProductImage},
};
use tracing::{debug, info, warn};

pub mod config;
pub mod editor;
pub mod error;
pub mod list_state;
pub mod product_list;
pub mod session;

pub use config::{load_settings, ClientSettings};
pub use editor::{DraftState, ProductDraft, ProductEditor, ProductField, UserDraft, UserEditor, UserField};
pub use error::{ClientError, ValidationError};
pub use list_state::{resolve, ListQuery, ListScope, PageState, SortState};
pub use product_list::{ProductListView, RenderedList};
pub use session::StorefrontSession;

pub const FOREIGN_KEY_CONFLICT_MESSAGE: &str =
    "cannot delete product: it is still referenced by existing orders";

/// Notifications for the presentation layer. Errors here are transient and
/// never stop the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ProductsUpdated {
        generation: u64,
        query: ListQuery,
        products: Vec<Product>,
    },
    StaleListingDiscarded {
        generation: u64,
    },
    ProductLoaded(ProductId),
    ProductSaved(ProductId),
    ProductDeleted(ProductId),
    MainImageUploaded {
        filename: String,
    },
    UserCreated {
        email: String,
    },
    Error(String),
}

/// The remote catalog service. Everything behind it is opaque.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn list_products(&self, query: &ListQuery) -> Result<Vec<Product>, ClientError>;
    async fn list_all_products(&self) -> Result<Vec<Product>, ClientError>;
    async fn get_product(&self, id: &ProductId) -> Result<Product, ClientError>;
    async fn update_product(&self, product: &Product) -> Result<(), ClientError>;
    async fn delete_product(&self, id: &ProductId) -> Result<(), ClientError>;
    async fn list_categories(&self) -> Result<Vec<Category>, ClientError>;
    async fn list_product_images(&self, id: &ProductId) -> Result<Vec<ProductImage>, ClientError>;
    async fn upload_main_image(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ClientError>;
    async fn create_user(&self, request: &CreateUserRequest) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    Read,
    Write,
    Delete,
}

/// Maps a non-success response onto the client error taxonomy. Structured
/// `ApiError` bodies decide first; status codes are the fallback.
pub(crate) fn classify_failure(
    status: StatusCode,
    body: &[u8],
    kind: RequestKind,
    resource: &'static str,
    id: &str,
) -> ClientError {
    let structured = ApiError::from_body(body);

    if let Some(api_error) = &structured {
        match api_error.code {
            ErrorCode::ForeignKeyConstraint => {
                return ClientError::Conflict {
                    message: FOREIGN_KEY_CONFLICT_MESSAGE.to_string(),
                }
            }
            ErrorCode::NotFound | ErrorCode::NoRowsAffected => {
                return ClientError::NotFound {
                    resource,
                    id: id.to_string(),
                }
            }
            ErrorCode::Validation => {
                return ClientError::validation(resource, api_error.message.clone())
            }
            ErrorCode::Unauthorized | ErrorCode::Internal | ErrorCode::Unknown => {}
        }
    }

    if status == StatusCode::NOT_FOUND {
        return ClientError::NotFound {
            resource,
            id: id.to_string(),
        };
    }

    // Older backends answer a blocked delete with a bare 400.
    if status == StatusCode::BAD_REQUEST && kind == RequestKind::Delete && structured.is_none() {
        return ClientError::Conflict {
            message: FOREIGN_KEY_CONFLICT_MESSAGE.to_string(),
        };
    }

    let message = match structured {
        Some(api_error) if !api_error.message.is_empty() => api_error.message,
        _ => String::from_utf8_lossy(body).trim().to_string(),
    };
    ClientError::Remote {
        status: status.as_u16(),
        message: if message.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        } else {
            message
        },
    }
}

async fn ensure_success(
    response: Response,
    kind: RequestKind,
    resource: &'static str,
    id: &str,
) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            debug!(
                status = status.as_u16(),
                resource,
                id,
                error = %err,
                "failed to read error body"
            );
            Default::default()
        }
    };
    let err = classify_failure(status, &body, kind, resource, id);
    warn!(status = status.as_u16(), resource, id, error = %err, "catalog request failed");
    Err(err)
}

/// Some endpoints acknowledge with one specific status; any other success
/// code means the backend did something other than what was asked.
fn expect_status(
    response: &Response,
    expected: StatusCode,
    resource: &'static str,
) -> Result<(), ClientError> {
    let status = response.status();
    if status == expected {
        return Ok(());
    }
    warn!(
        status = status.as_u16(),
        expected = expected.as_u16(),
        resource,
        "unexpected success status"
    );
    Err(ClientError::Remote {
        status: status.as_u16(),
        message: format!("{resource} request was not acknowledged with {expected}"),
    })
}

/// `CatalogApi` over HTTP/JSON.
#[derive(Clone)]
pub struct HttpCatalogClient {
    http: Client,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ClientError> {
        let base_url = settings.normalized_base_url()?;
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn into_shared(self) -> Arc<dyn CatalogApi> {
        Arc::new(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogClient {
    async fn list_products(&self, query: &ListQuery) -> Result<Vec<Product>, ClientError> {
        debug!(page = query.page, sort = %query.sort, "listing products");
        let response = self
            .http
            .get(self.url("/products"))
            .query(&query.query_params())
            .send()
            .await?;
        let products = ensure_success(response, RequestKind::Read, "products", "")
            .await?
            .json()
            .await?;
        Ok(products)
    }

    async fn list_all_products(&self) -> Result<Vec<Product>, ClientError> {
        let response = self.http.get(self.url("/products")).send().await?;
        let products = ensure_success(response, RequestKind::Read, "products", "")
            .await?
            .json()
            .await?;
        Ok(products)
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/products/{id}")))
            .send()
            .await?;
        let product = ensure_success(response, RequestKind::Read, "product", id.as_str())
            .await?
            .json()
            .await?;
        Ok(product)
    }

    async fn update_product(&self, product: &Product) -> Result<(), ClientError> {
        let response = self
            .http
            .put(self.url(&format!("/products/{}", product.id)))
            .json(product)
            .send()
            .await?;
        let response =
            ensure_success(response, RequestKind::Write, "product", product.id.as_str()).await?;
        expect_status(&response, StatusCode::OK, "product update")?;
        info!(product_id = %product.id, "product updated");
        Ok(())
    }

    async fn delete_product(&self, id: &ProductId) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/products/{id}")))
            .send()
            .await?;
        ensure_success(response, RequestKind::Delete, "product", id.as_str()).await?;
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ClientError> {
        let response = self.http.get(self.url("/categories")).send().await?;
        let categories = ensure_success(response, RequestKind::Read, "categories", "")
            .await?
            .json()
            .await?;
        Ok(categories)
    }

    async fn list_product_images(&self, id: &ProductId) -> Result<Vec<ProductImage>, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/images/{id}")))
            .send()
            .await?;
        let images = ensure_success(response, RequestKind::Read, "product images", id.as_str())
            .await?
            .json()
            .await?;
        Ok(images)
    }

    async fn upload_main_image(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ClientError> {
        let part = Part::bytes(bytes).file_name(filename.to_string());
        let form = Form::new().part("uploadedFile", part);
        let response = self
            .http
            .post(self.url("/main-image"))
            .multipart(form)
            .send()
            .await?;
        let uploaded: MainImageUploadResponse =
            ensure_success(response, RequestKind::Write, "main image", filename)
                .await?
                .json()
                .await?;
        info!(filename = %uploaded.filename, "main image uploaded");
        Ok(uploaded.filename)
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url("/users"))
            .json(request)
            .send()
            .await?;
        let response = ensure_success(response, RequestKind::Write, "user", &request.email).await?;
        expect_status(&response, StatusCode::CREATED, "user creation")?;
        info!(email = %request.email, role = request.role.as_str(), "user created");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
