use crate::api::models::responses::ApiResponse;
use crate::api::models::tools::{ListToolsQuery, ToolCreate, ToolResponse, ToolUpdate};
use crate::db::handlers::{Repository, ToolFilter, Tools};
use crate::db::models::tools::{ToolCreateDBRequest, ToolId, ToolUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};

fn tool_not_found(id: ToolId) -> Error {
    Error::NotFound {
        resource: "Tool".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/tools",
    tag = "tools",
    summary = "List tools",
    description = "List registered tools with optional category, search and activity filters.",
    params(ListToolsQuery),
    responses(
        (status = 200, description = "List of tools", body = Vec<ToolResponse>),
        (status = 400, description = "Invalid query parameters", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_tools(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListToolsQuery>, QueryRejection>,
) -> Result<Json<Vec<ToolResponse>>> {
    let Query(query) = query?;
    let (skip, limit) = query.page()?;

    let mut filter = ToolFilter::new(skip, limit);
    if let Some(category) = query.category {
        filter = filter.with_category(category);
    }
    if let Some(search) = query.search.filter(|s| !s.is_empty()) {
        filter = filter.with_search(search);
    }
    if !query.active_only {
        filter = filter.include_inactive();
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tools = Tools::new(&mut conn).list(&filter).await?;

    Ok(Json(tools.into_iter().map(ToolResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/tools/{id}",
    tag = "tools",
    summary = "Get tool",
    params(("id" = i64, Path, description = "Tool ID")),
    responses(
        (status = 200, description = "Tool details", body = ToolResponse),
        (status = 404, description = "Tool not found", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_tool(
    State(state): State<AppState>,
    id: std::result::Result<Path<ToolId>, PathRejection>,
) -> Result<Json<ToolResponse>> {
    let Path(id) = id?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tool = Tools::new(&mut conn).get_by_id(id).await?.ok_or_else(|| tool_not_found(id))?;

    Ok(Json(ToolResponse::from(tool)))
}

#[utoipa::path(
    post,
    path = "/tools",
    tag = "tools",
    summary = "Create tool",
    request_body = ToolCreate,
    responses(
        (status = 201, description = "Tool created", body = ToolResponse),
        (status = 400, description = "Invalid request body", body = ApiResponse),
        (status = 409, description = "A tool with this endpoint already exists", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_tool(
    State(state): State<AppState>,
    body: std::result::Result<Json<ToolCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<ToolResponse>)> {
    let Json(create) = body?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let tool = Tools::new(&mut tx).create(&ToolCreateDBRequest::from(create)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(tool_id = tool.id, endpoint = %tool.endpoint, "Tool registered");

    Ok((StatusCode::CREATED, Json(ToolResponse::from(tool))))
}

#[utoipa::path(
    patch,
    path = "/tools/{id}",
    tag = "tools",
    summary = "Update tool",
    description = "Partially update a tool. Omitted fields keep their current value.",
    params(("id" = i64, Path, description = "Tool ID")),
    request_body = ToolUpdate,
    responses(
        (status = 200, description = "Tool updated", body = ToolResponse),
        (status = 400, description = "Invalid request body", body = ApiResponse),
        (status = 404, description = "Tool not found", body = ApiResponse),
        (status = 409, description = "A tool with this endpoint already exists", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_tool(
    State(state): State<AppState>,
    id: std::result::Result<Path<ToolId>, PathRejection>,
    body: std::result::Result<Json<ToolUpdate>, JsonRejection>,
) -> Result<Json<ToolResponse>> {
    let Path(id) = id?;
    let Json(update) = body?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let tool = match Tools::new(&mut tx).update(id, &ToolUpdateDBRequest::from(update)).await {
        Ok(tool) => tool,
        Err(crate::db::errors::DbError::NotFound) => return Err(tool_not_found(id)),
        Err(e) => return Err(e.into()),
    };
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ToolResponse::from(tool)))
}

#[utoipa::path(
    delete,
    path = "/tools/{id}",
    tag = "tools",
    summary = "Delete tool",
    params(("id" = i64, Path, description = "Tool ID")),
    responses(
        (status = 204, description = "Tool deleted"),
        (status = 404, description = "Tool not found", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_tool(
    State(state): State<AppState>,
    id: std::result::Result<Path<ToolId>, PathRejection>,
) -> Result<StatusCode> {
    let Path(id) = id?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let deleted = Tools::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    if !deleted {
        return Err(tool_not_found(id));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::responses::ApiResponse;
    use crate::api::models::tools::ToolResponse;
    use crate::test_utils::create_test_app;
    use axum::http::StatusCode;
    use serde_json::json;

    fn tool_body(name: &str, endpoint: &str, category: &str) -> serde_json::Value {
        json!({
            "name": name,
            "description": format!("{name} tool"),
            "category": category,
            "icon": "icon",
            "endpoint": endpoint
        })
    }

    #[tokio::test]
    async fn test_tools_crud_round_trip() {
        let (server, _dir) = create_test_app().await;

        let response = server
            .post("/api/v1/tools")
            .json(&tool_body("PDF to LaTeX", "/pdf-tools/pdf-to-latex", "converter"))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: ToolResponse = response.json();
        assert!(created.is_active);
        assert!(created.updated_at.is_none());

        let fetched: ToolResponse = server.get(&format!("/api/v1/tools/{}", created.id)).await.json();
        assert_eq!(fetched.name, "PDF to LaTeX");

        let response = server
            .patch(&format!("/api/v1/tools/{}", created.id))
            .json(&json!({ "icon": "latex" }))
            .await;
        response.assert_status_ok();
        let updated: ToolResponse = response.json();
        assert_eq!(updated.icon, "latex");
        assert_eq!(updated.name, "PDF to LaTeX");
        assert!(updated.updated_at.is_some());

        let listed: Vec<ToolResponse> = server.get("/api/v1/tools").await.json();
        assert_eq!(listed.len(), 1);

        server
            .delete(&format!("/api/v1/tools/{}", created.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let response = server.get(&format!("/api/v1/tools/{}", created.id)).await;
        response.assert_status_not_found();
        let body: ApiResponse = response.json();
        assert!(!body.success);
        assert_eq!(body.message, format!("Tool with id-{} not found.", created.id));
    }

    #[tokio::test]
    async fn test_list_tools_filters() {
        let (server, _dir) = create_test_app().await;

        server.post("/api/v1/tools").json(&tool_body("PDF to LaTeX", "/pdf", "converter")).await;
        server.post("/api/v1/tools").json(&tool_body("JSON Formatter", "/json", "formatter")).await;
        let hidden: ToolResponse = server
            .post("/api/v1/tools")
            .json(&tool_body("Old Calculator", "/calc", "calculator"))
            .await
            .json();
        server
            .patch(&format!("/api/v1/tools/{}", hidden.id))
            .json(&json!({ "is_active": false }))
            .await
            .assert_status_ok();

        let active: Vec<ToolResponse> = server.get("/api/v1/tools").await.json();
        assert_eq!(active.len(), 2);

        let all: Vec<ToolResponse> = server.get("/api/v1/tools").add_query_param("active_only", false).await.json();
        assert_eq!(all.len(), 3);

        let formatters: Vec<ToolResponse> = server
            .get("/api/v1/tools")
            .add_query_param("category", "formatter")
            .await
            .json();
        assert_eq!(formatters.len(), 1);
        assert_eq!(formatters[0].name, "JSON Formatter");

        let searched: Vec<ToolResponse> = server.get("/api/v1/tools").add_query_param("search", "LATEX").await.json();
        assert_eq!(searched.len(), 1);

        let paged: Vec<ToolResponse> = server
            .get("/api/v1/tools")
            .add_query_param("skip", 1)
            .add_query_param("limit", 1)
            .await
            .json();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].name, "JSON Formatter");
    }

    #[tokio::test]
    async fn test_list_tools_rejects_bad_pagination() {
        let (server, _dir) = create_test_app().await;

        let response = server.get("/api/v1/tools").add_query_param("limit", 0).await;
        response.assert_status_bad_request();
        let body: ApiResponse = response.json();
        assert!(!body.success);

        server
            .get("/api/v1/tools")
            .add_query_param("limit", 101)
            .await
            .assert_status_bad_request();
        server
            .get("/api/v1/tools")
            .add_query_param("skip", -1)
            .await
            .assert_status_bad_request();
        server
            .get("/api/v1/tools")
            .add_query_param("category", "teleporter")
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_duplicate_endpoint_conflicts() {
        let (server, _dir) = create_test_app().await;

        server
            .post("/api/v1/tools")
            .json(&tool_body("One", "/same", "converter"))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.post("/api/v1/tools").json(&tool_body("Two", "/same", "generator")).await;
        response.assert_status(StatusCode::CONFLICT);
        let body: ApiResponse = response.json();
        assert_eq!(body.message, "A tool with this endpoint already exists");
    }

    #[tokio::test]
    async fn test_missing_tool_responses() {
        let (server, _dir) = create_test_app().await;

        server.get("/api/v1/tools/999").await.assert_status_not_found();
        server
            .patch("/api/v1/tools/999")
            .json(&json!({ "name": "x" }))
            .await
            .assert_status_not_found();
        server.delete("/api/v1/tools/999").await.assert_status_not_found();

        let response = server.get("/api/v1/tools/not-a-number").await;
        response.assert_status_bad_request();
        let body: ApiResponse = response.json();
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_invalid_create_body() {
        let (server, _dir) = create_test_app().await;

        let response = server.post("/api/v1/tools").json(&json!({ "name": "incomplete" })).await;
        response.assert_status_bad_request();
        let body: ApiResponse = response.json();
        assert!(!body.success);
        assert!(body.error.is_some());
    }
}
