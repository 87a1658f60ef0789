//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Book Catalog API",
        version = "0.1.0",
        description = "Book catalog REST API"
    ),
    paths(
        books::list_books,
        books::get_book,
        books::create_book,
        books::replace_book,
        books::patch_book,
        books::delete_book,
        health::health_check,
        health::readiness_check,
    ),
    components(
        schemas(
            crate::models::book::Book,
            crate::models::book::BookPayload,
            health::HealthResponse,
            crate::error::ErrorResponse,
            crate::error::ValidationErrorResponse,
        )
    ),
    tags(
        (name = "books", description = "Book catalog management"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_book_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/books"));
        assert!(doc.paths.paths.contains_key("/api/books/{id}"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
