//! OpenAPI document and Swagger UI

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::core::errors::{ErrorDetail, ErrorResponse};
use crate::core::models::TranslationInput;
use crate::server::api;

/// OpenAPI description of the service
#[derive(OpenApi)]
#[openapi(
    info(
        title = "LangChain Server",
        version = "1.0",
        description = "A simple API server using LangChain's Runnable interfaces"
    ),
    paths(
        api::health_check,
        api::invoke,
        api::batch,
        api::stream_chain,
        api::input_schema,
        api::output_schema,
        api::config_schema
    ),
    components(schemas(
        TranslationInput,
        api::InvokeRequest,
        api::InvokeResponse,
        api::RunMetadata,
        api::BatchRequest,
        api::BatchResponse,
        api::BatchMetadata,
        api::HealthResponse,
        ErrorResponse,
        ErrorDetail
    )),
    tags((name = "chain", description = "Translation chain routes"))
)]
pub struct ApiDoc;

/// Swagger UI at `/docs`, backed by `/openapi.json`
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_chain_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for route in [
            "/chain/invoke",
            "/chain/batch",
            "/chain/stream",
            "/chain/input_schema",
            "/chain/config_schema",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == route), "missing {}", route);
        }
    }

    #[test]
    fn test_openapi_info() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "LangChain Server");
        assert_eq!(doc.info.version, "1.0");
        assert_eq!(
            doc.info.description.as_deref(),
            Some("A simple API server using LangChain's Runnable interfaces")
        );
    }
}
