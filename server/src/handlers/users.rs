//! Users resource handlers
//!
//! `GET /api/users`, `POST /api/users`, `GET /api/users/:id`,
//! `DELETE /api/users/:id`.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::ErrorEnvelope;
use crate::error::PatternError;
use crate::registry::{Handler, ResolverContext};
use crate::transport::Reply;

/// Id that always resolves to "not found"
pub const MISSING_USER_ID: u64 = 999;

/// Id assigned to every created user
pub const CREATED_USER_ID: u64 = 3;

/// A user as served by the base handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl UserRecord {
    pub fn new(id: u64, name: &str, email: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: email.to_string(),
        }
    }
}

/// The fixed user list served by `GET /api/users`
pub fn seed_users() -> Vec<UserRecord> {
    vec![
        UserRecord::new(1, "John Doe", "john@example.com"),
        UserRecord::new(2, "Jane Smith", "jane@example.com"),
    ]
}

pub fn handlers() -> Result<Vec<Handler>, PatternError> {
    Ok(vec![
        Handler::get("/api/users", list_users)?,
        Handler::post("/api/users", create_user)?,
        Handler::get("/api/users/:id", get_user)?,
        Handler::delete("/api/users/:id", delete_user)?,
    ])
}

/// GET /api/users
pub fn list_users(_ctx: &ResolverContext<'_>) -> Reply {
    Reply::json(&seed_users())
}

/// POST /api/users
///
/// Echoes every submitted field on top of the assigned id, so a submitted
/// `id` wins.
pub fn create_user(ctx: &ResolverContext<'_>) -> Reply {
    let Some(Value::Object(submitted)) = &ctx.request.body else {
        return Reply::json_with_status(
            &ErrorEnvelope::new("Bad Request", "Request body must be a JSON object"),
            StatusCode::BAD_REQUEST,
        );
    };

    let mut created = Map::new();
    created.insert("id".to_string(), Value::from(CREATED_USER_ID));
    for (key, value) in submitted {
        created.insert(key.clone(), value.clone());
    }
    Reply::json_with_status(&Value::Object(created), StatusCode::CREATED)
}

/// GET /api/users/:id
///
/// Any numeric id is accepted, including negative and fractional ones.
/// Name and email keep the id as written in the path.
pub fn get_user(ctx: &ResolverContext<'_>) -> Reply {
    let Some(raw_id) = ctx.params.get("id") else {
        return invalid_id();
    };
    let Ok(id) = raw_id.parse::<Number>() else {
        return invalid_id();
    };

    if id.as_f64() == Some(MISSING_USER_ID as f64) {
        return Reply::json_with_status(
            &ErrorEnvelope::new("Not Found", "User not found"),
            StatusCode::NOT_FOUND,
        );
    }

    Reply::json(&serde_json::json!({
        "id": id,
        "name": format!("User {}", raw_id),
        "email": format!("user{}@example.com", raw_id),
    }))
}

/// DELETE /api/users/:id
pub fn delete_user(ctx: &ResolverContext<'_>) -> Reply {
    let id = ctx.params.get("id").unwrap_or_default();
    Reply::json(&serde_json::json!({ "message": format!("User {} deleted", id) }))
}

fn invalid_id() -> Reply {
    Reply::json_with_status(
        &ErrorEnvelope::new("Bad Request", "Invalid user id"),
        StatusCode::BAD_REQUEST,
    )
}
