use crate::entities::ProductModel;
use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::{errors::ApiError, errors::ServiceError, services::NewProduct, AppState};
use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

const REQUIRED_FIELDS_MESSAGE: &str = "Name and attributes are required";
const DELETED_MESSAGE: &str = "Product deleted successfully";

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .and_then(|v| if v.is_empty() { None } else { Some(v) })
}

/// Ids that are not integers cannot name a record
fn parse_product_id(raw: &str) -> Result<i32, ApiError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| map_service_error(ServiceError::NotFound("Product not found".to_string())))
}

/// Creates the router for product endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_description).delete(delete_product),
        )
        .route("/:id/generate-description", post(generate_description))
}

/// Request body for creating a product
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    #[schema(example = "Stussy 8-Ball Tee")]
    pub name: Option<String>,
    /// Comma-separated descriptive keywords
    #[schema(example = "Cotton, Black, Size L")]
    pub attributes: Option<String>,
}

/// Request body for setting a description; absent or null clears it
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateDescriptionRequest {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: i32,
    pub name: String,
    pub attributes: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ProductModel> for ProductResponse {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            attributes: model.attributes,
            description: model.description,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub message: String,
}

/// Create a new product
#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Missing or invalid fields", body = crate::errors::ErrorResponse),
        (status = 500, description = "Store failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    let payload = CreateProductRequest {
        name: normalize_optional_string(payload.name),
        attributes: normalize_optional_string(payload.attributes),
    };
    validate_input(&payload)?;

    let (Some(name), Some(attributes)) = (payload.name, payload.attributes) else {
        return Err(ApiError::ValidationError(REQUIRED_FIELDS_MESSAGE.to_string()));
    };

    let product = state
        .services
        .products
        .create_product(NewProduct { name, attributes })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ProductResponse::from(product)))
}

/// List all products, newest first
#[utoipa::path(
    get,
    path = "/api/products",
    responses(
        (status = 200, description = "Products ordered by id descending", body = [ProductResponse]),
        (status = 500, description = "Store failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .products
        .list_products()
        .await
        .map_err(map_service_error)?;

    let body: Vec<ProductResponse> = products.into_iter().map(Into::into).collect();
    Ok(success_response(body))
}

/// Get a product by id
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ProductResponse),
        (status = 404, description = "No such product", body = crate::errors::ErrorResponse),
        (status = 500, description = "Store failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_product_id(&id)?;
    let product = state
        .services
        .products
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductResponse::from(product)))
}

/// Set or clear a product's description
#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    request_body = UpdateDescriptionRequest,
    responses(
        (status = 200, description = "Updated product", body = ProductResponse),
        (status = 400, description = "Malformed body", body = crate::errors::ErrorResponse),
        (status = 404, description = "No such product", body = crate::errors::ErrorResponse),
        (status = 500, description = "Store failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn update_description(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateDescriptionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_product_id(&id)?;
    // no JSON body at all means no description
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(JsonRejection::MissingJsonContentType(_)) => UpdateDescriptionRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };

    let product = state
        .services
        .products
        .update_description(id, payload.description)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductResponse::from(product)))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted", body = DeleteResponse),
        (status = 404, description = "No such product", body = crate::errors::ErrorResponse),
        (status = 500, description = "Store failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_product_id(&id)?;
    state
        .services
        .products
        .delete_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(DeleteResponse {
        message: DELETED_MESSAGE.to_string(),
    }))
}

/// Generate a marketing description and store it on the product
#[utoipa::path(
    post,
    path = "/api/products/{id}/generate-description",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with the generated description", body = ProductResponse),
        (status = 404, description = "No such product", body = crate::errors::ErrorResponse),
        (status = 500, description = "Generation or store failure; the message comes from the generation service", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn generate_description(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_product_id(&id)?;
    let product = state
        .services
        .products
        .generate_description(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductResponse::from(product)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_strings_normalize_to_missing() {
        assert_eq!(normalize_optional_string(Some("   ".into())), None);
        assert_eq!(normalize_optional_string(None), None);
        assert_eq!(
            normalize_optional_string(Some("  Tee ".into())).as_deref(),
            Some("Tee")
        );
    }

    #[test]
    fn non_numeric_ids_are_not_found() {
        assert!(parse_product_id("42").is_ok());
        assert!(matches!(
            parse_product_id("abc"),
            Err(ApiError::ServiceError(ServiceError::NotFound(_)))
        ));
    }

    #[test]
    fn response_serialises_created_at_in_camel_case() {
        let response = ProductResponse {
            id: 1,
            name: "Tee".into(),
            attributes: "Cotton".into(),
            description: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("description").unwrap().is_null());
    }

    #[test]
    fn overlong_names_fail_validation() {
        let request = CreateProductRequest {
            name: Some("x".repeat(256)),
            attributes: Some("a".into()),
        };
        assert!(request.validate().is_err());

        let request = CreateProductRequest {
            name: Some("x".repeat(255)),
            attributes: Some("a".into()),
        };
        assert!(request.validate().is_ok());
    }
}
