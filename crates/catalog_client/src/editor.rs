//! Admin editors that hold a local draft of one remote record.
//!
//! A draft only reaches the catalog API on `submit`; every `set_field` stays
//! local. Failed submits keep the edited data so the user can fix and retry.

use std::{fmt, sync::Arc, sync::OnceLock};

use regex::Regex;
use shared::{
    domain::{CategoryId, ProductId, Role},
    protocol::{Category, CreateUserRequest, Product, ProductImage},
    slug::slugify,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, ValidationError},
    CatalogApi, ClientEvent,
};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftState {
    #[default]
    Empty,
    Loaded,
    Dirty,
    Submitting,
    Saved,
    Failed,
}

fn email_shape() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"))
}

pub fn is_valid_email(email: &str) -> bool {
    email_shape().is_match(email)
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProductField {
    Title(String),
    Slug(String),
    Price(f64),
    Manufacturer(String),
    Description(String),
    InStock(bool),
    Category(CategoryId),
    MainImage(String),
}

impl ProductField {
    /// Builds a field update from a form field name and its raw text value.
    pub fn parse(name: &str, value: &str) -> Result<Self, ValidationError> {
        let field = match name {
            "title" => ProductField::Title(value.to_string()),
            "slug" => ProductField::Slug(value.to_string()),
            "price" => ProductField::Price(
                value
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ValidationError::new("price", format!("not a number: {value:?}")))?,
            ),
            "manufacturer" => ProductField::Manufacturer(value.to_string()),
            "description" => ProductField::Description(value.to_string()),
            "inStock" | "in_stock" => ProductField::InStock(match value.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ValidationError::new(
                        "inStock",
                        format!("expected 0 or 1, got {other:?}"),
                    ))
                }
            }),
            "categoryId" | "category" => ProductField::Category(CategoryId::new(value.trim())),
            "mainImage" | "main_image" => ProductField::MainImage(value.to_string()),
            other => return Err(ValidationError::new(other, "unknown product field")),
        };
        Ok(field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub product: Product,
    pub images: Vec<ProductImage>,
}

impl ProductDraft {
    fn apply(&mut self, field: ProductField) {
        let product = &mut self.product;
        match field {
            ProductField::Title(v) => product.title = v,
            ProductField::Slug(v) => product.slug = slugify(&v),
            ProductField::Price(v) => product.price = v,
            ProductField::Manufacturer(v) => product.manufacturer = v,
            ProductField::Description(v) => product.description = v,
            ProductField::InStock(v) => product.in_stock = v,
            ProductField::Category(v) => product.category_id = v,
            ProductField::MainImage(v) => product.main_image = v,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let product = &self.product;
        require_non_empty("title", &product.title)?;
        require_non_empty("slug", &product.slug)?;
        if !product.price.is_finite() || product.price < 0.0 {
            return Err(ValidationError::new(
                "price",
                "must be a non-negative number",
            ));
        }
        require_non_empty("manufacturer", &product.manufacturer)?;
        require_non_empty("description", &product.description)?;
        Ok(())
    }
}

pub struct ProductEditor {
    api: Arc<dyn CatalogApi>,
    events: broadcast::Sender<ClientEvent>,
    state: DraftState,
    draft: Option<ProductDraft>,
    categories: Vec<Category>,
}

impl ProductEditor {
    pub fn new(api: Arc<dyn CatalogApi>, events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            api,
            events,
            state: DraftState::Empty,
            draft: None,
            categories: Vec::new(),
        }
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    pub fn draft(&self) -> Option<&ProductDraft> {
        self.draft.as_ref()
    }

    /// Categories offered for the category selector, loaded with the product.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Only a failure to fetch the product itself is returned; the editor
    /// then keeps whatever it held before.
    pub async fn load(&mut self, id: &ProductId) -> Result<&ProductDraft, ClientError> {
        let product = match self.api.get_product(id).await {
            Ok(product) => product,
            Err(err) => {
                self.notify_error(&err);
                return Err(err);
            }
        };

        let images = match self.api.list_product_images(id).await {
            Ok(images) => images,
            Err(err) => {
                warn!(product_id = %id, error = %err, "additional images unavailable");
                Vec::new()
            }
        };

        match self.api.list_categories().await {
            Ok(categories) => self.categories = categories,
            Err(err) => warn!(product_id = %id, error = %err, "category list unavailable"),
        }

        debug!(product_id = %id, images = images.len(), "product draft loaded");
        self.state = DraftState::Loaded;
        let _ = self.events.send(ClientEvent::ProductLoaded(id.clone()));
        Ok(&*self.draft.insert(ProductDraft { product, images }))
    }

    pub fn set_field(&mut self, field: ProductField) -> Result<(), ClientError> {
        let draft = self
            .draft
            .as_mut()
            .ok_or_else(|| ClientError::validation("product", "no product loaded"))?;
        draft.apply(field);
        self.state = DraftState::Dirty;
        Ok(())
    }

    pub fn set_field_str(&mut self, name: &str, value: &str) -> Result<(), ClientError> {
        let field = ProductField::parse(name, value)?;
        self.set_field(field)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.draft {
            Some(draft) => draft.validate(),
            None => Err(ValidationError::new("product", "no product loaded")),
        }
    }

    /// Validates locally, then replaces the remote product with the draft.
    pub async fn submit(&mut self) -> Result<(), ClientError> {
        if let Err(err) = self.validate() {
            let err = ClientError::from(err);
            self.notify_error(&err);
            return Err(err);
        }
        let Some(draft) = self.draft.as_ref() else {
            return Err(ClientError::validation("product", "no product loaded"));
        };

        self.state = DraftState::Submitting;
        match self.api.update_product(&draft.product).await {
            Ok(()) => {
                self.state = DraftState::Saved;
                let _ = self
                    .events
                    .send(ClientEvent::ProductSaved(draft.product.id.clone()));
                Ok(())
            }
            Err(err) => {
                self.state = DraftState::Failed;
                self.notify_error(&err);
                Err(err)
            }
        }
    }

    /// Deletes the product remotely. Deleting the product held in the draft
    /// empties the editor; a conflict leaves everything untouched.
    pub async fn delete(&mut self, id: &ProductId) -> Result<(), ClientError> {
        if let Err(err) = self.api.delete_product(id).await {
            self.notify_error(&err);
            return Err(err);
        }

        if self
            .draft
            .as_ref()
            .is_some_and(|draft| &draft.product.id == id)
        {
            self.draft = None;
            self.state = DraftState::Empty;
        }
        let _ = self.events.send(ClientEvent::ProductDeleted(id.clone()));
        Ok(())
    }

    /// Uploads a new main image and points the draft at the stored file.
    pub async fn upload_main_image(
        &mut self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ClientError> {
        if self.draft.is_none() {
            return Err(ClientError::validation("mainImage", "no product loaded"));
        }
        let stored = match self.api.upload_main_image(filename, bytes).await {
            Ok(stored) => stored,
            Err(err) => {
                self.notify_error(&err);
                return Err(err);
            }
        };
        self.set_field(ProductField::MainImage(stored.clone()))?;
        let _ = self.events.send(ClientEvent::MainImageUploaded {
            filename: stored.clone(),
        });
        Ok(stored)
    }

    fn notify_error(&self, err: &ClientError) {
        let _ = self.events.send(ClientEvent::Error(err.to_string()));
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

impl Default for UserDraft {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            role: Some(Role::User),
        }
    }
}

impl fmt::Debug for UserDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDraft")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

impl UserDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.chars().count() <= 3 || self.role.is_none() || self.password.is_empty() {
            return Err(ValidationError::new(
                "user",
                "email, password and role are all required",
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::new("email", "not a valid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        Ok(())
    }

    fn to_request(&self) -> Option<CreateUserRequest> {
        Some(CreateUserRequest {
            email: self.email.clone(),
            password: self.password.clone(),
            role: self.role?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserField {
    Email(String),
    Password(String),
    Role(Option<Role>),
}

impl UserField {
    pub fn parse(name: &str, value: &str) -> Result<Self, ValidationError> {
        match name {
            "email" => Ok(UserField::Email(value.to_string())),
            "password" => Ok(UserField::Password(value.to_string())),
            "role" if value.trim().is_empty() => Ok(UserField::Role(None)),
            "role" => value
                .parse::<Role>()
                .map(|role| UserField::Role(Some(role)))
                .map_err(|err| ValidationError::new("role", err.to_string())),
            other => Err(ValidationError::new(other, "unknown user field")),
        }
    }
}

/// Create-only editor for admin user accounts.
pub struct UserEditor {
    api: Arc<dyn CatalogApi>,
    events: broadcast::Sender<ClientEvent>,
    state: DraftState,
    draft: UserDraft,
}

impl UserEditor {
    pub fn new(api: Arc<dyn CatalogApi>, events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            api,
            events,
            state: DraftState::Empty,
            draft: UserDraft::default(),
        }
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    pub fn draft(&self) -> &UserDraft {
        &self.draft
    }

    pub fn set_field(&mut self, field: UserField) {
        match field {
            UserField::Email(v) => self.draft.email = v,
            UserField::Password(v) => self.draft.password = v,
            UserField::Role(v) => self.draft.role = v,
        }
        self.state = DraftState::Dirty;
    }

    pub fn set_field_str(&mut self, name: &str, value: &str) -> Result<(), ClientError> {
        let field = UserField::parse(name, value)?;
        self.set_field(field);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.draft.validate()
    }

    /// Creates the user; on success the draft is cleared for the next entry.
    pub async fn submit(&mut self) -> Result<(), ClientError> {
        if let Err(err) = self.draft.validate() {
            let err = ClientError::from(err);
            let _ = self.events.send(ClientEvent::Error(err.to_string()));
            return Err(err);
        }
        let Some(request) = self.draft.to_request() else {
            return Err(ClientError::validation("role", "must be set"));
        };

        self.state = DraftState::Submitting;
        match self.api.create_user(&request).await {
            Ok(()) => {
                info!(email = %request.email, "admin created user");
                self.draft = UserDraft::default();
                self.state = DraftState::Saved;
                let _ = self.events.send(ClientEvent::UserCreated {
                    email: request.email,
                });
                Ok(())
            }
            Err(err) => {
                self.state = DraftState::Failed;
                let _ = self.events.send(ClientEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/editor_tests.rs"]
mod tests;
