use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;

use super::lookups::{LaborRoleRecord, MachineRecord, MaterialRecord, PricingCatalog};
use super::{
    AppliedRates, CostBreakdown, LaborLineBreakdown, MachineLineBreakdown, MaterialLineBreakdown,
    QuoteCalculationRequest, TenantCostParameters,
};

/// Computes the full cost breakdown for a calculation request.
///
/// Fail-fast: the request is validated, the store's cost parameters are
/// resolved (missing store is `NotFound`, incomplete settings are
/// `InvalidConfiguration`), and every referenced material, machine and labor
/// role must resolve within the requesting store, else `InvalidInput`; a
/// missing row and another store's row are indistinguishable on purpose.
/// No partial breakdown is ever produced.
///
/// The computation itself is synchronous, side-effect-free and idempotent;
/// callers may retry freely.
#[instrument(skip(catalog, request), fields(store_id = %store_id, service_name = %request.service_name))]
pub async fn calculate_quote(
    catalog: &dyn PricingCatalog,
    store_id: Uuid,
    request: &QuoteCalculationRequest,
) -> Result<CostBreakdown, ServiceError> {
    request.validate()?;

    let settings = catalog
        .store_cost_settings(store_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Store {store_id} not found")))?;
    let params = TenantCostParameters::from_settings(&settings)?;

    let material_ids = distinct_ids(request.material_lines.iter().map(|line| line.material_id));
    let materials = index_by_id(
        catalog.materials_by_ids(store_id, &material_ids).await?,
        |record: &MaterialRecord| record.id,
    );
    ensure_all_resolved("material", &material_ids, materials.keys())?;

    let machine_ids = distinct_ids(request.machine_lines.iter().map(|line| line.machine_id));
    let machines = index_by_id(
        catalog.machines_by_ids(store_id, &machine_ids).await?,
        |record: &MachineRecord| record.id,
    );
    ensure_all_resolved("machine", &machine_ids, machines.keys())?;

    let role_ids = distinct_ids(request.labor_lines.iter().map(|line| line.role_id));
    let labor_roles = index_by_id(
        catalog.labor_roles_by_ids(store_id, &role_ids).await?,
        |record: &LaborRoleRecord| record.id,
    );
    ensure_all_resolved("labor role", &role_ids, labor_roles.keys())?;

    compute_breakdown(&params, request, &materials, &machines, &labor_roles)
}

/// The pure cost-allocation chain. Step order matters: later steps consume
/// earlier totals, not raw inputs.
///
/// 1. indirect rate = indirect monthly costs / monthly productive hours
/// 2. material cost = sum of unit cost x quantity, itemized in input order
/// 3. direct labor = production hours x labor rate
/// 4. machine = production hours x store machine rate; reported merged with
///    direct labor as `labor_cost` (itemized machine/labor lines stay
///    display-only and do not fold into the bucket)
/// 5. indirect = production hours x indirect rate
/// 6. total production cost = material + labor bucket + indirect
/// 7-8. margin (override-or-default) applied on the total
/// 9-10. tax (override-or-default) applied on the margin-inclusive subtotal
pub fn compute_breakdown(
    params: &TenantCostParameters,
    request: &QuoteCalculationRequest,
    materials: &HashMap<Uuid, MaterialRecord>,
    machines: &HashMap<Uuid, MachineRecord>,
    labor_roles: &HashMap<Uuid, LaborRoleRecord>,
) -> Result<CostBreakdown, ServiceError> {
    let productive_hours = Decimal::from(params.monthly_productive_hours);
    let indirect_cost_per_hour = params.indirect_monthly_costs / productive_hours;

    let mut material_lines = Vec::with_capacity(request.material_lines.len());
    let mut material_cost = Decimal::ZERO;
    for line in &request.material_lines {
        let record = materials.get(&line.material_id).ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "unknown material reference for this store: {}",
                line.material_id
            ))
        })?;
        let line_total = record.unit_cost * line.quantity;
        material_cost += line_total;
        material_lines.push(MaterialLineBreakdown {
            material_id: record.id,
            name: record.name.clone(),
            quantity: line.quantity,
            unit_cost: record.unit_cost,
            line_total,
            unit_of_measure: record.unit_of_measure.clone(),
        });
    }

    let mut machine_lines = Vec::with_capacity(request.machine_lines.len());
    for line in &request.machine_lines {
        let record = machines.get(&line.machine_id).ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "unknown machine reference for this store: {}",
                line.machine_id
            ))
        })?;
        machine_lines.push(MachineLineBreakdown {
            machine_id: record.id,
            name: record.name.clone(),
            machine_type: record.machine_type.clone(),
            hours_used: line.hours_used,
            cost_per_hour: record.cost_per_hour,
            line_total: record.cost_per_hour * line.hours_used,
        });
    }

    let mut labor_lines = Vec::with_capacity(request.labor_lines.len());
    for line in &request.labor_lines {
        let record = labor_roles.get(&line.role_id).ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "unknown labor role reference for this store: {}",
                line.role_id
            ))
        })?;
        labor_lines.push(LaborLineBreakdown {
            role_id: record.id,
            name: record.name.clone(),
            hours_worked: line.hours_worked,
            cost_per_hour: record.cost_per_hour,
            line_total: record.cost_per_hour * line.hours_worked,
            linked_machine_name: record.linked_machine_name.clone(),
        });
    }

    let direct_labor_cost = request.production_hours * params.labor_cost_per_hour;
    let machine_cost = request.production_hours * params.machine_cost_per_hour;
    // Direct labor and the store-level machine rate report as one bucket
    let labor_cost = direct_labor_cost + machine_cost;
    let indirect_cost = request.production_hours * indirect_cost_per_hour;
    let total_production_cost = material_cost + labor_cost + indirect_cost;

    let margin_percent = request
        .margin_override_percent
        .unwrap_or(params.default_margin_percent);
    let margin_value = total_production_cost * margin_percent / Decimal::ONE_HUNDRED;
    let subtotal_with_margin = total_production_cost + margin_value;

    let tax_percent = request
        .tax_override_percent
        .unwrap_or(params.default_tax_percent);
    let tax_value = subtotal_with_margin * tax_percent / Decimal::ONE_HUNDRED;
    let final_price = subtotal_with_margin + tax_value;

    Ok(CostBreakdown {
        service_name: request.service_name.clone(),
        description: request.description.clone(),
        production_hours: request.production_hours,
        product_quantity: request.product_quantity.unwrap_or(1),
        material_lines,
        machine_lines,
        labor_lines,
        material_cost,
        labor_cost,
        indirect_cost,
        total_production_cost,
        margin_percent,
        margin_value,
        subtotal_with_margin,
        tax_percent,
        tax_value,
        final_price,
        applied_rates: AppliedRates {
            labor_cost_per_hour: params.labor_cost_per_hour,
            machine_cost_per_hour: params.machine_cost_per_hour,
            indirect_cost_per_hour,
            margin_percent,
            tax_percent,
            monthly_productive_hours: params.monthly_productive_hours,
        },
    })
}

/// Distinct ids in first-seen order. Line lists are short enough that a
/// linear scan beats hashing.
fn distinct_ids<I: Iterator<Item = Uuid>>(ids: I) -> Vec<Uuid> {
    let mut distinct = Vec::new();
    for id in ids {
        if !distinct.contains(&id) {
            distinct.push(id);
        }
    }
    distinct
}

fn index_by_id<T, F: Fn(&T) -> Uuid>(records: Vec<T>, id_of: F) -> HashMap<Uuid, T> {
    records
        .into_iter()
        .map(|record| (id_of(&record), record))
        .collect()
}

/// Tenant-isolation guarantee: the resolved set must cover every distinct
/// requested id, otherwise a reference is missing or belongs to another
/// store and the whole calculation is rejected.
fn ensure_all_resolved<'a, K: Iterator<Item = &'a Uuid>>(
    kind: &str,
    requested: &[Uuid],
    resolved: K,
) -> Result<(), ServiceError> {
    let resolved: Vec<&Uuid> = resolved.collect();
    let missing: Vec<String> = requested
        .iter()
        .filter(|id| !resolved.contains(id))
        .map(|id| id.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(format!(
            "unknown {kind} reference(s) for this store: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::super::lookups::StoreCostSettings;
    use super::super::{MachineLineInput, MaterialLineInput};
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn params() -> TenantCostParameters {
        TenantCostParameters {
            labor_cost_per_hour: dec!(50),
            machine_cost_per_hour: dec!(0),
            indirect_monthly_costs: dec!(3520),
            default_margin_percent: dec!(100),
            default_tax_percent: dec!(10),
            monthly_productive_hours: 352,
        }
    }

    fn request(material_lines: Vec<MaterialLineInput>) -> QuoteCalculationRequest {
        QuoteCalculationRequest {
            service_name: "Fachada em lona".to_string(),
            description: None,
            production_hours: dec!(1),
            product_quantity: None,
            material_lines,
            machine_lines: vec![],
            labor_lines: vec![],
            client_id: None,
            margin_override_percent: None,
            tax_override_percent: None,
        }
    }

    fn material(id: Uuid, unit_cost: Decimal) -> MaterialRecord {
        MaterialRecord {
            id,
            name: "Lona 440g".to_string(),
            unit_cost,
            unit_of_measure: "m2".to_string(),
        }
    }

    fn materials_map(entries: &[(Uuid, Decimal)]) -> HashMap<Uuid, MaterialRecord> {
        entries
            .iter()
            .map(|(id, cost)| (*id, material(*id, *cost)))
            .collect()
    }

    #[test]
    fn indirect_rate_is_monthly_costs_over_productive_hours() {
        let mut request = request(vec![]);
        request.production_hours = dec!(2);

        let breakdown = compute_breakdown(
            &params(),
            &request,
            &HashMap::new(),
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap();

        // 3520 / 352 = 10 per hour; 2 hours allocate 20
        assert_eq!(breakdown.applied_rates.indirect_cost_per_hour, dec!(10));
        assert_eq!(breakdown.indirect_cost, dec!(20));
    }

    #[test]
    fn worked_example_exact_chain() {
        // One material line 5.00 x 3, one production hour, labor 50/h,
        // machine rate 0, margin 100%, tax 10%.
        let material_id = Uuid::new_v4();
        let request = request(vec![MaterialLineInput {
            material_id,
            quantity: dec!(3),
        }]);
        let materials = materials_map(&[(material_id, dec!(5.00))]);

        let breakdown = compute_breakdown(
            &params(),
            &request,
            &materials,
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap();

        assert_eq!(breakdown.material_cost, dec!(15.00));
        assert_eq!(breakdown.labor_cost, dec!(50));
        assert_eq!(breakdown.indirect_cost, dec!(10));
        assert_eq!(breakdown.total_production_cost, dec!(75.00));
        assert_eq!(breakdown.margin_percent, dec!(100));
        assert_eq!(breakdown.margin_value, dec!(75.00));
        assert_eq!(breakdown.subtotal_with_margin, dec!(150.00));
        assert_eq!(breakdown.tax_percent, dec!(10));
        assert_eq!(breakdown.tax_value, dec!(15.000));
        assert_eq!(breakdown.final_price, dec!(165.000));

        let line = &breakdown.material_lines[0];
        assert_eq!(line.unit_cost, dec!(5.00));
        assert_eq!(line.quantity, dec!(3));
        assert_eq!(line.line_total, dec!(15.00));
        assert_eq!(line.unit_of_measure, "m2");
    }

    #[test]
    fn final_price_matches_chained_percentage_identity() {
        let material_id = Uuid::new_v4();
        let mut request = request(vec![MaterialLineInput {
            material_id,
            quantity: dec!(7.5),
        }]);
        request.production_hours = dec!(3.25);
        request.margin_override_percent = Some(dec!(37.5));
        request.tax_override_percent = Some(dec!(8.25));
        let materials = materials_map(&[(material_id, dec!(12.34))]);

        let breakdown = compute_breakdown(
            &params(),
            &request,
            &materials,
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap();

        let expected = breakdown.total_production_cost
            * (Decimal::ONE + dec!(37.5) / Decimal::ONE_HUNDRED)
            * (Decimal::ONE + dec!(8.25) / Decimal::ONE_HUNDRED);
        assert_eq!(breakdown.final_price, expected);
    }

    #[test]
    fn material_cost_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let materials = materials_map(&[(a, dec!(1.11)), (b, dec!(2.22)), (c, dec!(3.33))]);

        let forward = request(vec![
            MaterialLineInput {
                material_id: a,
                quantity: dec!(2),
            },
            MaterialLineInput {
                material_id: b,
                quantity: dec!(5),
            },
            MaterialLineInput {
                material_id: c,
                quantity: dec!(0.5),
            },
        ]);
        let mut reversed = forward.clone();
        reversed.material_lines.reverse();

        let lhs = compute_breakdown(
            &params(),
            &forward,
            &materials,
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap();
        let rhs = compute_breakdown(
            &params(),
            &reversed,
            &materials,
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap();

        assert_eq!(lhs.material_cost, rhs.material_cost);
        assert_eq!(lhs.final_price, rhs.final_price);
        // Itemization still preserves the input order of each request
        assert_eq!(lhs.material_lines[0].material_id, a);
        assert_eq!(rhs.material_lines[0].material_id, c);
    }

    #[test]
    fn empty_material_lines_yield_zero_material_cost() {
        let breakdown = compute_breakdown(
            &params(),
            &request(vec![]),
            &HashMap::new(),
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(breakdown.material_cost, Decimal::ZERO);
        assert!(breakdown.material_lines.is_empty());
        // Labor + indirect still price the job
        assert_eq!(breakdown.total_production_cost, dec!(60));
    }

    #[test]
    fn store_machine_rate_merges_into_labor_bucket() {
        let mut p = params();
        p.machine_cost_per_hour = dec!(20);
        let mut req = request(vec![]);
        req.production_hours = dec!(2);

        let breakdown =
            compute_breakdown(&p, &req, &HashMap::new(), &HashMap::new(), &HashMap::new())
                .unwrap();

        // 2h x (50 labor + 20 machine) in one bucket
        assert_eq!(breakdown.labor_cost, dec!(140));
    }

    #[test]
    fn itemized_machine_lines_do_not_fold_into_buckets() {
        let machine_id = Uuid::new_v4();
        let mut req = request(vec![]);
        req.machine_lines = vec![MachineLineInput {
            machine_id,
            hours_used: dec!(4),
        }];
        let machines: HashMap<Uuid, MachineRecord> = [(
            machine_id,
            MachineRecord {
                id: machine_id,
                name: "Plotter HP Latex".to_string(),
                machine_type: "plotter".to_string(),
                cost_per_hour: dec!(35),
            },
        )]
        .into_iter()
        .collect();

        let breakdown =
            compute_breakdown(&params(), &req, &HashMap::new(), &machines, &HashMap::new())
                .unwrap();

        // The line is itemized at 4 x 35 = 140 for display...
        assert_eq!(breakdown.machine_lines[0].line_total, dec!(140));
        // ...but the bucket only carries production hours x store rates
        assert_eq!(breakdown.labor_cost, dec!(50));
        assert_eq!(breakdown.total_production_cost, dec!(60));
    }

    #[test]
    fn overrides_win_even_when_zero() {
        let mut req = request(vec![]);
        req.margin_override_percent = Some(Decimal::ZERO);
        req.tax_override_percent = Some(Decimal::ZERO);

        let breakdown = compute_breakdown(
            &params(),
            &req,
            &HashMap::new(),
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap();

        assert_eq!(breakdown.margin_percent, Decimal::ZERO);
        assert_eq!(breakdown.margin_value, Decimal::ZERO);
        assert_eq!(breakdown.tax_percent, Decimal::ZERO);
        assert_eq!(breakdown.tax_value, Decimal::ZERO);
        assert_eq!(breakdown.final_price, breakdown.total_production_cost);
    }

    #[test]
    fn omitted_overrides_use_store_defaults_verbatim() {
        let breakdown = compute_breakdown(
            &params(),
            &request(vec![]),
            &HashMap::new(),
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(breakdown.margin_percent, dec!(100));
        assert_eq!(breakdown.tax_percent, dec!(10));
    }

    #[test]
    fn applied_rates_echo_the_inputs() {
        let breakdown = compute_breakdown(
            &params(),
            &request(vec![]),
            &HashMap::new(),
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap();
        let rates = &breakdown.applied_rates;
        assert_eq!(rates.labor_cost_per_hour, dec!(50));
        assert_eq!(rates.machine_cost_per_hour, dec!(0));
        assert_eq!(rates.indirect_cost_per_hour, dec!(10));
        assert_eq!(rates.monthly_productive_hours, 352);
    }

    #[test]
    fn unresolved_material_fails_the_whole_computation() {
        let known = Uuid::new_v4();
        let unknown = Uuid::new_v4();
        let req = request(vec![
            MaterialLineInput {
                material_id: known,
                quantity: dec!(1),
            },
            MaterialLineInput {
                material_id: unknown,
                quantity: dec!(1),
            },
        ]);
        let materials = materials_map(&[(known, dec!(5))]);

        let err = compute_breakdown(
            &params(),
            &req,
            &materials,
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput(_));
    }

    #[test]
    fn distinct_ids_preserves_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(distinct_ids([a, b, a, b, a].into_iter()), vec![a, b]);
    }

    #[test]
    fn ensure_all_resolved_reports_every_missing_id() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let resolved: HashMap<Uuid, ()> = HashMap::new();
        let err = ensure_all_resolved("material", &[a, b], resolved.keys()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&a.to_string()));
        assert!(message.contains(&b.to_string()));
    }

    #[tokio::test]
    async fn calculate_quote_requires_complete_store_settings() {
        // A catalog whose store exists but has not finished onboarding
        struct UnconfiguredCatalog;

        #[async_trait::async_trait]
        impl PricingCatalog for UnconfiguredCatalog {
            async fn store_cost_settings(
                &self,
                _store_id: Uuid,
            ) -> Result<Option<StoreCostSettings>, ServiceError> {
                Ok(Some(StoreCostSettings {
                    labor_cost_per_hour: None,
                    indirect_monthly_costs: Some(dec!(1000)),
                    ..Default::default()
                }))
            }

            async fn materials_by_ids(
                &self,
                _store_id: Uuid,
                _ids: &[Uuid],
            ) -> Result<Vec<MaterialRecord>, ServiceError> {
                Ok(Vec::new())
            }

            async fn machines_by_ids(
                &self,
                _store_id: Uuid,
                _ids: &[Uuid],
            ) -> Result<Vec<MachineRecord>, ServiceError> {
                Ok(Vec::new())
            }

            async fn labor_roles_by_ids(
                &self,
                _store_id: Uuid,
                _ids: &[Uuid],
            ) -> Result<Vec<LaborRoleRecord>, ServiceError> {
                Ok(Vec::new())
            }
        }

        let err = calculate_quote(&UnconfiguredCatalog, Uuid::new_v4(), &request(vec![]))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidConfiguration(_));
    }
}
