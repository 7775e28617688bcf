//! Database models for the tool registry.

use crate::api::models::tools::{ToolCreate, ToolUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tool identifier, assigned by the database
pub type ToolId = i64;

/// What kind of utility a tool is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Converter,
    Calculator,
    Formatter,
    Validator,
    Generator,
}

/// Database request for creating a new tool
#[derive(Debug, Clone)]
pub struct ToolCreateDBRequest {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub icon: String,
    pub endpoint: String,
    pub is_active: bool,
}

impl From<ToolCreate> for ToolCreateDBRequest {
    fn from(create: ToolCreate) -> Self {
        Self {
            name: create.name,
            description: create.description,
            category: create.category,
            icon: create.icon,
            endpoint: create.endpoint,
            is_active: create.is_active,
        }
    }
}

/// Database request for updating a tool. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ToolUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ToolCategory>,
    pub icon: Option<String>,
    pub endpoint: Option<String>,
    pub is_active: Option<bool>,
}

impl From<ToolUpdate> for ToolUpdateDBRequest {
    fn from(update: ToolUpdate) -> Self {
        Self {
            name: update.name,
            description: update.description,
            category: update.category,
            icon: update.icon,
            endpoint: update.endpoint,
            is_active: update.is_active,
        }
    }
}

/// Database response for a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDBResponse {
    pub id: ToolId,
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub icon: String,
    pub endpoint: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
