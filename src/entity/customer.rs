//! Customer entity - owners of sites and locations

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_customer")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(200))", unique)]
    pub name: String,

    #[sea_orm(column_type = "String(Some(20))", unique)]
    pub code: String,

    #[sea_orm(column_type = "String(Some(254))")]
    pub contact_email: String,

    #[sea_orm(column_type = "String(Some(20))")]
    pub contact_phone: String,

    #[sea_orm(column_type = "Text")]
    pub address: String,

    pub is_active: bool,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Build a customer code from its name: uppercase, spaces to '_', at most 20 chars
pub fn code_from_name(name: &str) -> String {
    name.trim()
        .to_uppercase()
        .replace(' ', "_")
        .chars()
        .take(20)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_from_name() {
        assert_eq!(code_from_name("Acme Power"), "ACME_POWER");
        assert_eq!(
            code_from_name("Northern Regional Grid Operator"),
            "NORTHERN_REGIONAL_GR"
        );
        assert_eq!(code_from_name("  x  "), "X");
    }
}
