use crate::{
    db::DatabaseAccess,
    entities::{Product, ProductActiveModel, ProductColumn, ProductModel},
    errors::ServiceError,
    generation::DescriptionGenerator,
    metrics::{
        MetricsRegistry, DESCRIPTIONS_GENERATED_TOTAL, DESCRIPTIONS_UPDATED_TOTAL,
        GENERATION_DURATION, GENERATION_FAILURES_TOTAL, PRODUCTS_CREATED_TOTAL,
        PRODUCTS_DELETED_TOTAL,
    },
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

const NOT_FOUND_MESSAGE: &str = "Product not found";

/// Fields required to create a product. Both are expected to be trimmed and non-empty.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub attributes: String,
}

/// Product lifecycle plus the generate-and-persist flow
#[derive(Clone)]
pub struct ProductService {
    db: DatabaseAccess,
    generator: Arc<dyn DescriptionGenerator>,
    metrics: Arc<MetricsRegistry>,
}

impl ProductService {
    pub fn new(
        db: DatabaseAccess,
        generator: Arc<dyn DescriptionGenerator>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            db,
            generator,
            metrics,
        }
    }

    /// Create a new product with no description
    #[instrument(skip(self), fields(name = %input.name))]
    pub async fn create_product(&self, input: NewProduct) -> Result<ProductModel, ServiceError> {
        let product = ProductActiveModel {
            name: Set(input.name),
            attributes: Set(input.attributes),
            description: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let created = self
            .db
            .execute("create_product", move |db| Box::pin(product.insert(db)))
            .await?;

        self.metrics.increment_counter(PRODUCTS_CREATED_TOTAL);
        info!(product_id = created.id, "Product created");
        Ok(created)
    }

    /// All products, newest first
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<ProductModel>, ServiceError> {
        self.db
            .execute("list_products", |db| {
                Box::pin(Product::find().order_by_desc(ProductColumn::Id).all(db))
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: i32) -> Result<ProductModel, ServiceError> {
        self.db
            .execute("get_product", move |db| {
                Box::pin(Product::find_by_id(id).one(db))
            })
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND_MESSAGE.to_string()))
    }

    /// Overwrites the description (`None` clears it) and returns the full record
    #[instrument(skip(self, description))]
    pub async fn update_description(
        &self,
        id: i32,
        description: Option<String>,
    ) -> Result<ProductModel, ServiceError> {
        let result = self
            .db
            .execute("update_description", move |db| {
                Box::pin(
                    Product::update_many()
                        .col_expr(ProductColumn::Description, Expr::value(description))
                        .filter(ProductColumn::Id.eq(id))
                        .exec(db),
                )
            })
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(NOT_FOUND_MESSAGE.to_string()));
        }

        self.metrics.increment_counter(DESCRIPTIONS_UPDATED_TOTAL);
        info!(product_id = id, "Product description updated");
        self.get_product(id).await
    }

    /// Hard delete
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i32) -> Result<(), ServiceError> {
        let result = self
            .db
            .execute("delete_product", move |db| {
                Box::pin(Product::delete_by_id(id).exec(db))
            })
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(NOT_FOUND_MESSAGE.to_string()));
        }

        self.metrics.increment_counter(PRODUCTS_DELETED_TOTAL);
        info!(product_id = id, "Product deleted");
        Ok(())
    }

    /// Fetch, generate, then persist. A failed generation leaves the stored record untouched.
    #[instrument(skip(self))]
    pub async fn generate_description(&self, id: i32) -> Result<ProductModel, ServiceError> {
        let product = self.get_product(id).await?;

        let start = Instant::now();
        let generated = self
            .generator
            .generate(&product.name, &product.attributes)
            .await;
        let outcome = if generated.is_ok() { "ok" } else { "error" };
        self.metrics
            .histogram_with_labels(GENERATION_DURATION, &[("outcome", outcome)])
            .observe_duration(start.elapsed());

        let text = generated.map_err(|err| {
            self.metrics.increment_counter(GENERATION_FAILURES_TOTAL);
            error!(product_id = id, error = %err, "Description generation failed");
            ServiceError::from(err)
        })?;

        let updated = self.update_description(id, Some(text)).await?;
        self.metrics.increment_counter(DESCRIPTIONS_GENERATED_TOTAL);
        Ok(updated)
    }
}
