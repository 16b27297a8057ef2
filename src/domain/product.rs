//! Product catalog entities.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::AppError;

/// Shop sections. Every product belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Cafe,
    Flowers,
    Books,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Cafe, Section::Flowers, Section::Books];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Cafe => "cafe",
            Section::Flowers => "flowers",
            Section::Books => "books",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cafe" => Ok(Section::Cafe),
            "flowers" => Ok(Section::Flowers),
            "books" => Ok(Section::Books),
            other => Err(AppError::validation(format!("Unknown section: {}", other))),
        }
    }
}

/// Product domain entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub section: Section,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub image_url: Option<String>,
    /// Object storage key of the current image
    pub image_key: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Active and not soft-deleted.
    pub fn is_purchasable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    pub fn has_stock_for(&self, quantity: i32) -> bool {
        self.stock >= quantity
    }
}

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

/// Build a URL slug from a product name ("Flat White (L)" -> "flat-white-l").
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Product creation payload
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateProduct {
    pub section: Section,
    #[schema(example = "Flat White")]
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "4.50")]
    pub price: Decimal,
    #[schema(example = 40)]
    pub stock: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Partial product update payload
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProduct {
    pub section: Option<Section>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, example = "5.00")]
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
}

/// Catalog listing filter
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ProductFilter {
    /// Restrict to one section
    pub section: Option<Section>,
    /// Case-insensitive name search
    pub q: Option<String>,
    /// Staff listings include inactive and deleted products
    #[serde(skip)]
    pub include_inactive: bool,
}

/// Product as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub section: Section,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "4.50")]
    pub price: Decimal,
    pub stock: i32,
    pub in_stock: bool,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            section: product.section,
            in_stock: product.stock > 0,
            name: product.name,
            slug: product.slug,
            description: product.description,
            price: product.price,
            stock: product.stock,
            image_url: product.image_url,
            is_active: product.is_active,
            created_at: product.created_at,
            updated_at: product.updated_at,
            deleted_at: product.deleted_at,
        }
    }
}
