//! Mock entity factories
//!
//! Each builder starts from fixed defaults and applies the caller's partial
//! overrides on top. Timestamps are taken at call time.

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserOverrides {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub price: f64,
    pub category: String,
    pub in_stock: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProductOverrides {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub in_stock: Option<bool>,
    pub description: Option<String>,
}

/// Standard response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
    pub status: u16,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default)]
pub struct EnvelopeOverrides {
    pub status: Option<u16>,
    pub message: Option<String>,
    pub timestamp: Option<String>,
}

pub fn create_mock_user(overrides: UserOverrides) -> User {
    let now = now_iso();
    User {
        id: overrides.id.unwrap_or(1),
        name: overrides.name.unwrap_or_else(|| "Test User".to_string()),
        email: overrides
            .email
            .unwrap_or_else(|| "test@example.com".to_string()),
        role: overrides.role.unwrap_or_default(),
        created_at: overrides.created_at.unwrap_or_else(|| now.clone()),
        updated_at: overrides.updated_at.unwrap_or(now),
    }
}

pub fn create_mock_product(overrides: ProductOverrides) -> Product {
    Product {
        id: overrides.id.unwrap_or(1),
        name: overrides.name.unwrap_or_else(|| "Test Product".to_string()),
        price: overrides.price.unwrap_or(99.99),
        category: overrides
            .category
            .unwrap_or_else(|| "electronics".to_string()),
        in_stock: overrides.in_stock.unwrap_or(true),
        description: overrides
            .description
            .unwrap_or_else(|| "A test product description".to_string()),
    }
}

pub fn create_mock_api_response<T>(data: T, overrides: EnvelopeOverrides) -> ApiEnvelope<T> {
    ApiEnvelope {
        data,
        status: overrides.status.unwrap_or(200),
        message: overrides.message.unwrap_or_else(|| "Success".to_string()),
        timestamp: overrides.timestamp.unwrap_or_else(now_iso),
    }
}

/// `count` users with ids `1..=count`
pub fn create_mock_users(count: usize) -> Vec<User> {
    (1..=count as u64)
        .map(|i| {
            create_mock_user(UserOverrides {
                id: Some(i),
                name: Some(format!("User {}", i)),
                email: Some(format!("user{}@example.com", i)),
                ..Default::default()
            })
        })
        .collect()
}

/// `count` products with ids `1..=count`, priced at `id * 10`
pub fn create_mock_products(count: usize) -> Vec<Product> {
    (1..=count as u64)
        .map(|i| {
            create_mock_product(ProductOverrides {
                id: Some(i),
                name: Some(format!("Product {}", i)),
                price: Some(i as f64 * 10.0),
                ..Default::default()
            })
        })
        .collect()
}
