use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{labor_role, machine, material, store};
use crate::errors::ServiceError;

/// Raw, nullable cost settings of a store, exactly as persisted.
/// Converted into calculation-ready parameters by
/// [`super::TenantCostParameters::from_settings`].
#[derive(Debug, Clone, Default)]
pub struct StoreCostSettings {
    pub labor_cost_per_hour: Option<Decimal>,
    pub machine_cost_per_hour: Option<Decimal>,
    pub indirect_monthly_costs: Option<Decimal>,
    pub default_margin_percent: Option<Decimal>,
    pub default_tax_percent: Option<Decimal>,
    pub monthly_productive_hours: Option<i32>,
}

impl From<store::Model> for StoreCostSettings {
    fn from(model: store::Model) -> Self {
        Self {
            labor_cost_per_hour: model.labor_cost_per_hour,
            machine_cost_per_hour: model.machine_cost_per_hour,
            indirect_monthly_costs: model.indirect_monthly_costs,
            default_margin_percent: model.default_margin_percent,
            default_tax_percent: model.default_tax_percent,
            monthly_productive_hours: model.monthly_productive_hours,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRecord {
    pub id: Uuid,
    pub name: String,
    pub unit_cost: Decimal,
    pub unit_of_measure: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MachineRecord {
    pub id: Uuid,
    pub name: String,
    pub machine_type: String,
    pub cost_per_hour: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaborRoleRecord {
    pub id: Uuid,
    pub name: String,
    pub cost_per_hour: Decimal,
    pub linked_machine_name: Option<String>,
}

/// Read-only lookups the pricing engine depends on.
///
/// Every batch fetch is scoped to the requesting store; returning fewer rows
/// than distinct requested ids is how callers detect missing or cross-tenant
/// references. Implementations must never return another store's rows.
#[async_trait]
pub trait PricingCatalog: Send + Sync {
    async fn store_cost_settings(
        &self,
        store_id: Uuid,
    ) -> Result<Option<StoreCostSettings>, ServiceError>;

    async fn materials_by_ids(
        &self,
        store_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<MaterialRecord>, ServiceError>;

    async fn machines_by_ids(
        &self,
        store_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<MachineRecord>, ServiceError>;

    async fn labor_roles_by_ids(
        &self,
        store_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<LaborRoleRecord>, ServiceError>;
}

/// Database-backed catalog used by the running service
#[derive(Clone)]
pub struct DbPricingCatalog {
    db: Arc<DatabaseConnection>,
}

impl DbPricingCatalog {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PricingCatalog for DbPricingCatalog {
    async fn store_cost_settings(
        &self,
        store_id: Uuid,
    ) -> Result<Option<StoreCostSettings>, ServiceError> {
        let record = store::Entity::find_by_id(store_id).one(&*self.db).await?;
        Ok(record.map(StoreCostSettings::from))
    }

    async fn materials_by_ids(
        &self,
        store_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<MaterialRecord>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = material::Entity::find()
            .filter(material::Column::StoreId.eq(store_id))
            .filter(material::Column::Id.is_in(ids.to_vec()))
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| MaterialRecord {
                id: row.id,
                name: row.name,
                unit_cost: row.unit_cost,
                unit_of_measure: row.unit_of_measure,
            })
            .collect())
    }

    async fn machines_by_ids(
        &self,
        store_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<MachineRecord>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = machine::Entity::find()
            .filter(machine::Column::StoreId.eq(store_id))
            .filter(machine::Column::Id.is_in(ids.to_vec()))
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| MachineRecord {
                id: row.id,
                name: row.name,
                machine_type: row.machine_type,
                cost_per_hour: row.cost_per_hour,
            })
            .collect())
    }

    async fn labor_roles_by_ids(
        &self,
        store_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<LaborRoleRecord>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = labor_role::Entity::find()
            .filter(labor_role::Column::StoreId.eq(store_id))
            .filter(labor_role::Column::Id.is_in(ids.to_vec()))
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| LaborRoleRecord {
                id: row.id,
                name: row.name,
                cost_per_hour: row.cost_per_hour,
                linked_machine_name: row.linked_machine_name,
            })
            .collect())
    }
}
