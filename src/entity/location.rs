//! Location entity - the site/location tree
//!
//! Top-level nodes are sites (`is_site = true`, no parent). Every other
//! node hangs off a parent.
//! Table: md_location

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_location")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(200))")]
    pub name: String,

    pub parent_id: Option<i64>,

    pub customer_id: Option<i64>,

    pub is_site: bool,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    #[sea_orm(column_type = "Text")]
    pub address: String,

    pub is_active: bool,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Location tree node (API response)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocationTree {
    pub id: i64,
    pub name: String,
    pub is_site: bool,
    pub parent_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LocationTree>,
}

impl From<Model> for LocationTree {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            is_site: model.is_site,
            parent_id: model.parent_id,
            customer_id: model.customer_id,
            is_active: model.is_active,
            children: Vec::new(),
        }
    }
}
