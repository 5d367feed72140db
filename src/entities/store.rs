use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant record. Every other row in the system is scoped to a store id.
///
/// The cost parameters are nullable on purpose: a freshly onboarded store has
/// no rates yet, and the pricing engine must refuse to quote until
/// `labor_cost_per_hour` and `indirect_monthly_costs` are filled in.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,

    pub labor_cost_per_hour: Option<Decimal>,
    pub machine_cost_per_hour: Option<Decimal>,
    pub indirect_monthly_costs: Option<Decimal>,
    pub default_margin_percent: Option<Decimal>,
    pub default_tax_percent: Option<Decimal>,
    pub monthly_productive_hours: Option<i32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::client::Entity")]
    Clients,
    #[sea_orm(has_many = "super::material::Entity")]
    Materials,
    #[sea_orm(has_many = "super::machine::Entity")]
    Machines,
    #[sea_orm(has_many = "super::labor_role::Entity")]
    LaborRoles,
    #[sea_orm(has_many = "super::quote::Entity")]
    Quotes,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clients.def()
    }
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Materials.def()
    }
}

impl Related<super::machine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Machines.def()
    }
}

impl Related<super::labor_role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LaborRoles.def()
    }
}

impl Related<super::quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quotes.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Ok(self)
    }
}
