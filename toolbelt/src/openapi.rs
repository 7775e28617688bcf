//! OpenAPI documentation for the versioned API.

use utoipa::OpenApi;
use utoipa::openapi::server::Server;

use crate::api;
use crate::config::Config;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::tools::list_tools,
        api::handlers::tools::get_tool,
        api::handlers::tools::create_tool,
        api::handlers::tools::update_tool,
        api::handlers::tools::delete_tool,
        api::handlers::conversions::pdf_to_latex,
    ),
    components(
        schemas(
            api::models::tools::ToolCreate,
            api::models::tools::ToolUpdate,
            api::models::tools::ToolResponse,
            crate::db::models::tools::ToolCategory,
            api::models::responses::ApiResponse,
        )
    ),
    tags(
        (name = "tools", description = "Registry of the utility tools offered by the service."),
        (name = "pdf-tools", description = "Upload a PDF and convert it.

Uploaded files are stored only for the duration of the request and removed afterwards, whether the conversion succeeded or not."),
    ),
    info(
        title = "Toolbelt API",
        description = "Utility tools behind a single API.

## Errors

Failed requests return the standard envelope with `success: false`:

```json
{
  \"success\": false,
  \"message\": \"File type not allowed. Allowed types: .pdf\",
  \"data\": null,
  \"error\": \"File type not allowed. Allowed types: .pdf\"
}
```",
    ),
)]
pub struct ApiDoc;

/// The OpenAPI document with title, version and server prefix taken from `config`.
pub fn api_doc(config: &Config) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = config.project_name.clone();
    doc.info.version = config.version.clone();
    doc.servers = Some(vec![Server::new(config.api_prefix.clone())]);
    doc
}
