//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Versioned routes live under the configured API prefix (default `/api/v1`):
//!
//! - **Tools** (`/tools`, `/tools/{id}`): Tool registry management
//! - **PDF tools** (`/pdf-tools/pdf-to-latex`): PDF conversion uploads
//!
//! All endpoints are documented with `utoipa`; the rendered documentation is served at `/docs`.

pub mod handlers;
pub mod models;
