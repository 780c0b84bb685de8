//! Maintenance schedule - recurring generation rule per (equipment, activity type)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
    Custom,
}

impl Frequency {
    pub const ALL: [Frequency; 7] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Quarterly,
        Frequency::SemiAnnual,
        Frequency::Annual,
        Frequency::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::SemiAnnual => "semi_annual",
            Frequency::Annual => "annual",
            Frequency::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Interval in days; custom schedules fall back to a year when unset
    pub fn days(&self, custom_days: Option<i32>) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Monthly => 30,
            Frequency::Quarterly => 90,
            Frequency::SemiAnnual => 180,
            Frequency::Annual => 365,
            Frequency::Custom => custom_days.filter(|d| *d > 0).map(i64::from).unwrap_or(365),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_maintenance_schedule")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub equipment_id: i64,

    pub activity_type_id: i64,

    #[sea_orm(column_type = "String(Some(20))")]
    pub frequency: String,

    pub frequency_days: Option<i32>,

    pub start_date: Date,

    pub end_date: Option<Date>,

    pub last_generated: Option<Date>,

    pub auto_generate: bool,

    pub advance_notice_days: i32,

    pub is_active: bool,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn interval_days(&self) -> i64 {
        Frequency::parse(&self.frequency)
            .unwrap_or(Frequency::Annual)
            .days(self.frequency_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_days() {
        assert_eq!(Frequency::Daily.days(None), 1);
        assert_eq!(Frequency::Quarterly.days(Some(12)), 90);
        assert_eq!(Frequency::SemiAnnual.days(None), 180);
        assert_eq!(Frequency::Custom.days(Some(45)), 45);
        assert_eq!(Frequency::Custom.days(None), 365);
        assert_eq!(Frequency::parse("semi_annual"), Some(Frequency::SemiAnnual));
    }
}
