use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Product Copy API",
        description = r#"
# Product Copy API

Product catalogue backend that writes marketing copy for its products.

## Features

- **Products**: create, list, fetch, update the description of, and delete products
- **Generated descriptions**: ask a hosted language model for a persuasive product description
  and store it on the product in one call

## Error Handling

Failing requests return a JSON body with the user-facing message:

```json
{
  "error": "Product not found",
  "request_id": "6f1c5a0e-3b4e-4f5e-9a43-7d0f2b3c1a9e",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

Generation failures carry the message reported by the generation service.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development")
    ),
    tags(
        (name = "Products", description = "Product catalogue and description generation")
    ),
    paths(
        crate::handlers::products::create_product,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::update_description,
        crate::handlers::products::delete_product,
        crate::handlers::products::generate_description,
    ),
    components(
        schemas(
            crate::handlers::products::ProductResponse,
            crate::handlers::products::CreateProductRequest,
            crate::handlers::products::UpdateDescriptionRequest,
            crate::handlers::products::DeleteResponse,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_product_routes() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Product Copy API"));
        assert!(json.contains("/api/products/{id}/generate-description"));
        assert!(json.contains("ProductResponse"));
    }
}
