use crate::{
    entities::{client, quote, quote_item},
    errors::ServiceError,
    events::{Event, EventSender},
    pricing::{
        calculate_quote, CostBreakdown, LaborLineInput, MachineLineInput, MaterialLineInput,
        PricingCatalog, QuoteCalculationRequest,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Attempts before a numbering collision surfaces as `Conflict`
const MAX_NUMBERING_ATTEMPTS: u32 = 3;

/// `YYYYMM` prefix for quote numbers issued at `at`
pub fn quote_number_prefix(at: DateTime<Utc>) -> String {
    at.format("%Y%m").to_string()
}

/// Next number in a store's monthly sequence.
///
/// `last` is the lexicographically-largest existing number carrying `prefix`
/// (descending string order is sequence order because the format is
/// fixed-width). No match or an unparseable suffix restarts the sequence at
/// 1. Sequences past 9999 keep counting; the zero-padding simply widens.
pub fn next_quote_number(prefix: &str, last: Option<&str>) -> String {
    let next_seq = last
        .and_then(|number| number.strip_prefix(prefix))
        .and_then(|suffix| suffix.parse::<u32>().ok())
        .map(|seq| seq + 1)
        .unwrap_or(1);
    format!("{prefix}{next_seq:04}")
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update for a quote.
///
/// Every field distinguishes "absent" from "provided": the double-`Option`
/// fields deserialize JSON `null` as `Some(None)` (clear the value) and an
/// omitted key as `None` (leave it alone). That distinction is what lets a
/// margin or tax override of exactly 0 be honored instead of read as "use
/// the store default".
#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateQuoteRequest {
    pub service_name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub client_id: Option<Option<Uuid>>,

    pub production_hours: Option<Decimal>,

    #[validate(range(min = 1))]
    pub product_quantity: Option<i32>,

    /// Replaces the whole material-line set when present
    pub material_lines: Option<Vec<MaterialLineInput>>,

    pub machine_lines: Option<Vec<MachineLineInput>>,

    pub labor_lines: Option<Vec<LaborLineInput>>,

    /// `null` clears the override back to the store default
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Decimal>)]
    pub margin_override_percent: Option<Option<Decimal>>,

    /// `null` clears the override back to the store default
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Decimal>)]
    pub tax_override_percent: Option<Option<Decimal>>,
}

impl UpdateQuoteRequest {
    /// True when any field that feeds the cost formula is present; such an
    /// update recomputes the whole breakdown and replaces all line items.
    pub fn touches_costs(&self) -> bool {
        self.production_hours.is_some()
            || self.product_quantity.is_some()
            || self.material_lines.is_some()
            || self.machine_lines.is_some()
            || self.labor_lines.is_some()
            || self.margin_override_percent.is_some()
            || self.tax_override_percent.is_some()
    }

    pub fn validate_payload(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if let Some(name) = &self.service_name {
            if name.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "service_name must not be blank".to_string(),
                ));
            }
        }
        if let Some(hours) = self.production_hours {
            if hours <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "production_hours must be positive".to_string(),
                ));
            }
        }
        if let Some(Some(margin)) = self.margin_override_percent {
            if margin < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "margin_override_percent must not be negative".to_string(),
                ));
            }
        }
        if let Some(Some(tax)) = self.tax_override_percent {
            if tax < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "tax_override_percent must not be negative".to_string(),
                ));
            }
        }
        for line in self.material_lines.iter().flatten() {
            line.validate()?;
        }
        for line in self.machine_lines.iter().flatten() {
            line.validate()?;
        }
        for line in self.labor_lines.iter().flatten() {
            line.validate()?;
        }
        Ok(())
    }
}

/// A quote joined with its material line items, in stored position order
#[derive(Debug, Clone)]
pub struct QuoteWithItems {
    pub quote: quote::Model,
    pub items: Vec<quote_item::Model>,
}

#[derive(Debug, Clone)]
pub struct QuoteListPage {
    pub quotes: Vec<quote::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Orchestration over the pricing engine: persisting engine output as quotes
/// and keeping the stored snapshot in lockstep with what the engine would
/// compute for the current inputs.
#[derive(Clone)]
pub struct QuoteService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<dyn PricingCatalog>,
    event_sender: Option<Arc<EventSender>>,
}

impl QuoteService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: Arc<dyn PricingCatalog>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            catalog,
            event_sender,
        }
    }

    /// Runs the pricing engine without persisting anything
    pub async fn calculate(
        &self,
        store_id: Uuid,
        request: &QuoteCalculationRequest,
    ) -> Result<CostBreakdown, ServiceError> {
        calculate_quote(self.catalog.as_ref(), store_id, request).await
    }

    /// Computes a breakdown, allocates a number and persists the quote with
    /// its line items in one transaction.
    #[instrument(skip(self, request), fields(store_id = %store_id, service_name = %request.service_name))]
    pub async fn create_quote(
        &self,
        store_id: Uuid,
        request: QuoteCalculationRequest,
    ) -> Result<QuoteWithItems, ServiceError> {
        let breakdown = self.calculate(store_id, &request).await?;
        if let Some(client_id) = request.client_id {
            self.ensure_client_owned(store_id, client_id).await?;
        }

        // The unique (store_id, quote_number) index closes the race between
        // reading the last number and inserting; a collision from a
        // concurrent creation shows up as a unique violation and is retried
        // with a freshly generated number.
        let mut attempt = 0;
        let created = loop {
            attempt += 1;
            let prefix = quote_number_prefix(Utc::now());
            let quote_number = self.next_number_for(store_id, &prefix).await?;

            match self
                .insert_quote(store_id, &quote_number, request.client_id, &breakdown)
                .await
            {
                Ok(created) => break created,
                Err(err) if is_unique_violation(&err) => {
                    if attempt >= MAX_NUMBERING_ATTEMPTS {
                        return Err(ServiceError::Conflict(format!(
                            "could not allocate a unique quote number after {MAX_NUMBERING_ATTEMPTS} attempts"
                        )));
                    }
                    warn!(
                        store_id = %store_id,
                        quote_number = %quote_number,
                        attempt,
                        "Quote number already taken, regenerating"
                    );
                }
                Err(err) => return Err(err),
            }
        };

        info!(
            quote_id = %created.quote.id,
            quote_number = %created.quote.quote_number,
            "Quote created"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::QuoteCreated(created.quote.id)).await {
                warn!(error = %e, quote_id = %created.quote.id, "Failed to send quote created event");
            }
        }

        Ok(created)
    }

    /// Fetches a quote with its items; a quote of another store reads as
    /// absent, never as forbidden.
    #[instrument(skip(self), fields(store_id = %store_id, quote_id = %id))]
    pub async fn get_quote(&self, store_id: Uuid, id: Uuid) -> Result<QuoteWithItems, ServiceError> {
        let stored = self.find_owned(store_id, id).await?;
        let items = self.items_of(id).await?;
        Ok(QuoteWithItems {
            quote: stored,
            items,
        })
    }

    /// Store-scoped listing, newest first, optionally filtered by service name
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn list_quotes(
        &self,
        store_id: Uuid,
        page: u64,
        per_page: u64,
        search: Option<&str>,
    ) -> Result<QuoteListPage, ServiceError> {
        let mut query = quote::Entity::find().filter(quote::Column::StoreId.eq(store_id));
        if let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) {
            query = query.filter(quote::Column::ServiceName.contains(term));
        }

        let paginator = query
            .order_by_desc(quote::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let quotes = paginator.fetch_page(page.max(1) - 1).await?;

        Ok(QuoteListPage {
            quotes,
            total,
            page,
            per_page,
        })
    }

    /// Applies an update. Cost-affecting fields trigger a full recomputation
    /// and a wholesale line-item replacement; otherwise only metadata is
    /// patched and the stored breakdown stays untouched.
    #[instrument(skip(self, update), fields(store_id = %store_id, quote_id = %id))]
    pub async fn update_quote(
        &self,
        store_id: Uuid,
        id: Uuid,
        update: UpdateQuoteRequest,
    ) -> Result<QuoteWithItems, ServiceError> {
        update.validate_payload()?;
        let stored = self.find_owned(store_id, id).await?;

        if let Some(Some(client_id)) = update.client_id {
            self.ensure_client_owned(store_id, client_id).await?;
        }

        let updated = if update.touches_costs() {
            self.recompute_and_replace(store_id, stored, &update).await?
        } else {
            self.apply_metadata_patch(stored, update).await?
        };

        info!(quote_id = %updated.quote.id, "Quote updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::QuoteUpdated(updated.quote.id)).await {
                warn!(error = %e, quote_id = %updated.quote.id, "Failed to send quote updated event");
            }
        }

        Ok(updated)
    }

    /// Removes a quote and its line items
    #[instrument(skip(self), fields(store_id = %store_id, quote_id = %id))]
    pub async fn delete_quote(&self, store_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let stored = self.find_owned(store_id, id).await?;

        let txn = self.db.begin().await?;
        quote_item::Entity::delete_many()
            .filter(quote_item::Column::QuoteId.eq(stored.id))
            .exec(&txn)
            .await?;
        quote::Entity::delete_by_id(stored.id).exec(&txn).await?;
        txn.commit().await?;

        info!(quote_id = %id, "Quote deleted");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::QuoteDeleted(id)).await {
                warn!(error = %e, quote_id = %id, "Failed to send quote deleted event");
            }
        }

        Ok(())
    }

    async fn find_owned(&self, store_id: Uuid, id: Uuid) -> Result<quote::Model, ServiceError> {
        quote::Entity::find_by_id(id)
            .filter(quote::Column::StoreId.eq(store_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote {id} not found")))
    }

    async fn items_of(&self, quote_id: Uuid) -> Result<Vec<quote_item::Model>, ServiceError> {
        Ok(quote_item::Entity::find()
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .order_by_asc(quote_item::Column::Position)
            .all(&*self.db)
            .await?)
    }

    async fn ensure_client_owned(
        &self,
        store_id: Uuid,
        client_id: Uuid,
    ) -> Result<(), ServiceError> {
        let found = client::Entity::find_by_id(client_id)
            .filter(client::Column::StoreId.eq(store_id))
            .one(&*self.db)
            .await?;
        if found.is_some() {
            Ok(())
        } else {
            Err(ServiceError::InvalidInput(format!(
                "unknown client reference for this store: {client_id}"
            )))
        }
    }

    async fn next_number_for(&self, store_id: Uuid, prefix: &str) -> Result<String, ServiceError> {
        let last = quote::Entity::find()
            .filter(quote::Column::StoreId.eq(store_id))
            .filter(quote::Column::QuoteNumber.starts_with(prefix))
            .order_by_desc(quote::Column::QuoteNumber)
            .one(&*self.db)
            .await?;
        Ok(next_quote_number(
            prefix,
            last.as_ref().map(|model| model.quote_number.as_str()),
        ))
    }

    async fn insert_quote(
        &self,
        store_id: Uuid,
        quote_number: &str,
        client_id: Option<Uuid>,
        breakdown: &CostBreakdown,
    ) -> Result<QuoteWithItems, ServiceError> {
        let now = Utc::now();
        let quote_id = Uuid::new_v4();
        let items = item_models_from_breakdown(quote_id, breakdown, now);

        let txn = self.db.begin().await?;

        let quote_model = quote::ActiveModel {
            id: Set(quote_id),
            quote_number: Set(quote_number.to_string()),
            store_id: Set(store_id),
            client_id: Set(client_id),
            service_name: Set(breakdown.service_name.clone()),
            description: Set(breakdown.description.clone()),
            production_hours: Set(breakdown.production_hours),
            product_quantity: Set(breakdown.product_quantity),
            material_cost: Set(breakdown.material_cost),
            labor_cost: Set(breakdown.labor_cost),
            indirect_cost: Set(breakdown.indirect_cost),
            total_production_cost: Set(breakdown.total_production_cost),
            margin_percent: Set(breakdown.margin_percent),
            margin_value: Set(breakdown.margin_value),
            subtotal_with_margin: Set(breakdown.subtotal_with_margin),
            tax_percent: Set(breakdown.tax_percent),
            tax_value: Set(breakdown.tax_value),
            final_price: Set(breakdown.final_price),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        if !items.is_empty() {
            quote_item::Entity::insert_many(
                items.iter().cloned().map(IntoActiveModel::into_active_model),
            )
            .exec(&txn)
            .await?;
        }

        txn.commit().await?;

        Ok(QuoteWithItems {
            quote: quote_model,
            items,
        })
    }

    async fn recompute_and_replace(
        &self,
        store_id: Uuid,
        stored: quote::Model,
        update: &UpdateQuoteRequest,
    ) -> Result<QuoteWithItems, ServiceError> {
        // Stored items stand in for absent material lines so a partial
        // update recomputes against the full current line set
        let material_lines = match &update.material_lines {
            Some(lines) => lines.clone(),
            None => self
                .items_of(stored.id)
                .await?
                .iter()
                .map(|item| MaterialLineInput {
                    material_id: item.material_id,
                    quantity: item.quantity,
                })
                .collect(),
        };

        let client_id = match update.client_id {
            Some(value) => value,
            None => stored.client_id,
        };

        let request = QuoteCalculationRequest {
            service_name: update
                .service_name
                .clone()
                .unwrap_or_else(|| stored.service_name.clone()),
            description: match &update.description {
                Some(value) => value.clone(),
                None => stored.description.clone(),
            },
            production_hours: update.production_hours.unwrap_or(stored.production_hours),
            product_quantity: Some(update.product_quantity.unwrap_or(stored.product_quantity)),
            material_lines,
            machine_lines: update.machine_lines.clone().unwrap_or_default(),
            labor_lines: update.labor_lines.clone().unwrap_or_default(),
            client_id,
            // The stored percent snapshot stands in as the override unless
            // the update sets a new value or clears it back to the default
            margin_override_percent: match update.margin_override_percent {
                Some(value) => value,
                None => Some(stored.margin_percent),
            },
            tax_override_percent: match update.tax_override_percent {
                Some(value) => value,
                None => Some(stored.tax_percent),
            },
        };

        let breakdown = self.calculate(store_id, &request).await?;

        let now = Utc::now();
        let quote_id = stored.id;
        let items = item_models_from_breakdown(quote_id, &breakdown, now);

        let txn = self.db.begin().await?;

        let mut active: quote::ActiveModel = stored.into();
        active.service_name = Set(breakdown.service_name.clone());
        active.description = Set(breakdown.description.clone());
        active.client_id = Set(client_id);
        active.production_hours = Set(breakdown.production_hours);
        active.product_quantity = Set(breakdown.product_quantity);
        active.material_cost = Set(breakdown.material_cost);
        active.labor_cost = Set(breakdown.labor_cost);
        active.indirect_cost = Set(breakdown.indirect_cost);
        active.total_production_cost = Set(breakdown.total_production_cost);
        active.margin_percent = Set(breakdown.margin_percent);
        active.margin_value = Set(breakdown.margin_value);
        active.subtotal_with_margin = Set(breakdown.subtotal_with_margin);
        active.tax_percent = Set(breakdown.tax_percent);
        active.tax_value = Set(breakdown.tax_value);
        active.final_price = Set(breakdown.final_price);
        active.updated_at = Set(Some(now));
        let updated = active.update(&txn).await?;

        // Wholesale replacement; line items are never patched in place
        quote_item::Entity::delete_many()
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .exec(&txn)
            .await?;
        if !items.is_empty() {
            quote_item::Entity::insert_many(
                items.iter().cloned().map(IntoActiveModel::into_active_model),
            )
            .exec(&txn)
            .await?;
        }

        txn.commit().await?;

        Ok(QuoteWithItems {
            quote: updated,
            items,
        })
    }

    async fn apply_metadata_patch(
        &self,
        stored: quote::Model,
        update: UpdateQuoteRequest,
    ) -> Result<QuoteWithItems, ServiceError> {
        let quote_id = stored.id;
        let mut active: quote::ActiveModel = stored.into();
        if let Some(name) = update.service_name {
            active.service_name = Set(name);
        }
        if let Some(description) = update.description {
            active.description = Set(description);
        }
        if let Some(client_id) = update.client_id {
            active.client_id = Set(client_id);
        }
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        let items = self.items_of(quote_id).await?;
        Ok(QuoteWithItems {
            quote: updated,
            items,
        })
    }
}

fn is_unique_violation(err: &ServiceError) -> bool {
    matches!(
        err,
        ServiceError::DatabaseError(db_err)
            if matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
    )
}

fn item_models_from_breakdown(
    quote_id: Uuid,
    breakdown: &CostBreakdown,
    now: DateTime<Utc>,
) -> Vec<quote_item::Model> {
    breakdown
        .material_lines
        .iter()
        .enumerate()
        .map(|(position, line)| quote_item::Model {
            id: Uuid::new_v4(),
            quote_id,
            material_id: line.material_id,
            position: position as i32,
            name: line.name.clone(),
            quantity: line.quantity,
            unit_cost: line.unit_cost,
            line_total: line.line_total,
            unit_of_measure: line.unit_of_measure.clone(),
            created_at: now,
        })
        .collect()
}
