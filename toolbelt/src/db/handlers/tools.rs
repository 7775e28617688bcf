//! Database repository for the tool registry.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::tools::{ToolCategory, ToolCreateDBRequest, ToolDBResponse, ToolId, ToolUpdateDBRequest},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, instrument};

/// Case folding applied to searchable text on write and to search terms on read.
fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Filter for listing tools
#[derive(Debug, Clone)]
pub struct ToolFilter {
    pub skip: i64,
    pub limit: i64,
    pub category: Option<ToolCategory>,
    pub search: Option<String>, // Case-insensitive substring search on name and description
    pub active_only: bool,
}

impl ToolFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            category: None,
            search: None,
            active_only: true,
        }
    }

    pub fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_search(mut self, search: String) -> Self {
        self.search = Some(search);
        self
    }

    pub fn include_inactive(mut self) -> Self {
        self.active_only = false;
        self
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Tool {
    pub id: ToolId,
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub icon: String,
    pub is_active: bool,
    pub endpoint: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Tool> for ToolDBResponse {
    fn from(tool: Tool) -> Self {
        Self {
            id: tool.id,
            name: tool.name,
            description: tool.description,
            category: tool.category,
            icon: tool.icon,
            endpoint: tool.endpoint,
            is_active: tool.is_active,
            created_at: tool.created_at,
            updated_at: tool.updated_at,
        }
    }
}

pub struct Tools<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Tools<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Tools<'c> {
    type CreateRequest = ToolCreateDBRequest;
    type UpdateRequest = ToolUpdateDBRequest;
    type Response = ToolDBResponse;
    type Id = ToolId;
    type Filter = ToolFilter;

    #[instrument(skip(self, request), fields(name = %request.name, endpoint = %request.endpoint), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let tool = sqlx::query_as::<_, Tool>(
            r#"
            INSERT INTO tools (name, description, category, icon, is_active, endpoint, created_at, name_folded, description_folded)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.category)
        .bind(&request.icon)
        .bind(request.is_active)
        .bind(&request.endpoint)
        .bind(Utc::now())
        .bind(fold_case(&request.name))
        .bind(fold_case(&request.description))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(ToolDBResponse::from(tool))
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let tool = sqlx::query_as::<_, Tool>("SELECT * FROM tools WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(tool.map(ToolDBResponse::from))
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tools WHERE id = ?").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Atomic update with conditional field updates
        let tool = sqlx::query_as::<_, Tool>(
            r#"
            UPDATE tools SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                category = COALESCE(?, category),
                icon = COALESCE(?, icon),
                endpoint = COALESCE(?, endpoint),
                is_active = COALESCE(?, is_active),
                name_folded = COALESCE(?, name_folded),
                description_folded = COALESCE(?, description_folded),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.category)
        .bind(&request.icon)
        .bind(&request.endpoint)
        .bind(request.is_active)
        .bind(request.name.as_deref().map(fold_case))
        .bind(request.description.as_deref().map(fold_case))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(ToolDBResponse::from(tool))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM tools WHERE 1=1");

        if let Some(category) = filter.category {
            query.push(" AND category = ");
            query.push_bind(category);
        }

        // Case-insensitive substring match on name or description
        if let Some(ref search) = filter.search {
            let search_pattern = format!("%{}%", fold_case(search));
            query.push(" AND (name_folded LIKE ");
            query.push_bind(search_pattern.clone());
            query.push(" OR description_folded LIKE ");
            query.push_bind(search_pattern);
            query.push(")");
        }

        if filter.active_only {
            query.push(" AND is_active = 1");
        }

        query.push(" ORDER BY id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let tools = query.build_query_as::<Tool>().fetch_all(&mut *self.db).await?;

        debug!("Retrieved {} tools", tools.len());

        Ok(tools.into_iter().map(ToolDBResponse::from).collect())
    }
}
