//! API request/response models for the tool registry.

use crate::db::models::tools::{ToolCategory, ToolDBResponse, ToolId};
use crate::errors::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Default number of tools returned per page.
pub const DEFAULT_LIMIT: i64 = 100;

/// Maximum number of tools that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

fn default_active_only() -> bool {
    true
}

/// Query parameters for listing tools
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListToolsQuery {
    /// Number of items to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    pub skip: Option<i64>,

    /// Maximum number of items to return (default: 100, max: 100)
    #[param(default = 100, minimum = 1, maximum = 100)]
    pub limit: Option<i64>,

    /// Only return tools in this category
    pub category: Option<ToolCategory>,

    /// Case-insensitive substring match on name or description
    pub search: Option<String>,

    /// Hide inactive tools (default: true)
    #[serde(default = "default_active_only")]
    #[param(default = true)]
    pub active_only: bool,
}

impl ListToolsQuery {
    /// Returns `(skip, limit)`, rejecting values outside the accepted ranges.
    pub fn page(&self) -> Result<(i64, i64), Error> {
        let skip = self.skip.unwrap_or(0);
        if skip < 0 {
            return Err(Error::BadRequest {
                message: "skip must be greater than or equal to 0".to_string(),
            });
        }

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(Error::BadRequest {
                message: format!("limit must be between 1 and {MAX_LIMIT}"),
            });
        }

        Ok((skip, limit))
    }
}

/// Request body for registering a new tool.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolCreate {
    /// Display name
    #[schema(example = "PDF to LaTeX")]
    pub name: String,
    /// What the tool does
    #[schema(example = "Convert a PDF document into LaTeX source")]
    pub description: String,
    pub category: ToolCategory,
    /// Icon identifier used by the frontend
    #[schema(example = "file-text")]
    pub icon: String,
    /// Route that runs the tool (must be unique)
    #[schema(example = "/pdf-tools/pdf-to-latex")]
    pub endpoint: String,
    /// Whether the tool is listed by default (default: true)
    #[serde(default = "default_active_only")]
    pub is_active: bool,
}

/// Request body for updating a tool. All fields are optional;
/// only provided fields will be updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ToolUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ToolCategory>,
    pub icon: Option<String>,
    pub endpoint: Option<String>,
    pub is_active: Option<bool>,
}

/// A registered tool.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolResponse {
    pub id: ToolId,
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub icon: String,
    pub endpoint: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Unset until the tool is first updated
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ToolDBResponse> for ToolResponse {
    fn from(db: ToolDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            category: db.category,
            icon: db.icon,
            endpoint: db.endpoint,
            is_active: db.is_active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
