use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum length of a product name, mirrored by the `name` column definition
pub const NAME_MAX_LEN: u64 = 255;

/// Product entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Auto-incrementing primary key, never reused
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Product name
    pub name: String,

    /// Comma-separated descriptive keywords, stored as given
    #[sea_orm(column_type = "Text")]
    pub attributes: String,

    /// Marketing copy; empty until set directly or generated
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Creation timestamp
    #[sea_orm(column_name = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
