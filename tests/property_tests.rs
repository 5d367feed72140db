//! Property-based tests for the pricing engine and quote numbering.
//!
//! These use proptest to verify invariants across a wide range of inputs,
//! catching edge cases that example-based tests might miss.

use std::collections::HashMap;

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use comunikapp_api::pricing::{
    compute_breakdown, MaterialLineInput, MaterialRecord, QuoteCalculationRequest,
    TenantCostParameters,
};
use comunikapp_api::services::quotes::next_quote_number;

// Strategies for generating test data

/// Money amounts as exact cents, up to 100k
fn money_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strictly positive quantities with up to 3 decimal places
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000).prop_map(|thousandths| Decimal::new(thousandths, 3))
}

/// Percentages between 0.00 and 300.00
fn percent_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..30_000).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

fn params(margin: Decimal, tax: Decimal) -> TenantCostParameters {
    TenantCostParameters {
        labor_cost_per_hour: Decimal::new(5000, 2),
        machine_cost_per_hour: Decimal::new(1500, 2),
        indirect_monthly_costs: Decimal::new(352_000, 2),
        default_margin_percent: margin,
        default_tax_percent: tax,
        monthly_productive_hours: 352,
    }
}

fn request_with_lines(lines: Vec<MaterialLineInput>) -> QuoteCalculationRequest {
    QuoteCalculationRequest {
        service_name: "Letreiro luminoso".to_string(),
        description: None,
        production_hours: Decimal::ONE,
        product_quantity: None,
        material_lines: lines,
        machine_lines: vec![],
        labor_lines: vec![],
        client_id: None,
        margin_override_percent: None,
        tax_override_percent: None,
    }
}

fn catalog_for(lines: &[(Uuid, Decimal)]) -> HashMap<Uuid, MaterialRecord> {
    lines
        .iter()
        .map(|(id, unit_cost)| {
            (
                *id,
                MaterialRecord {
                    id: *id,
                    name: format!("material-{id}"),
                    unit_cost: *unit_cost,
                    unit_of_measure: "un".to_string(),
                },
            )
        })
        .collect()
}

fn empty<T>() -> HashMap<Uuid, T> {
    HashMap::new()
}

// Property: the final price always equals
// total x (1 + margin/100) x (1 + tax/100), exactly.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn final_price_identity(margin in percent_strategy(), tax in percent_strategy()) {
        let breakdown = compute_breakdown(
            &params(margin, tax),
            &request_with_lines(vec![]),
            &empty(),
            &empty(),
            &empty(),
        )
        .unwrap();

        let expected = breakdown.total_production_cost
            * (Decimal::ONE + margin / Decimal::ONE_HUNDRED)
            * (Decimal::ONE + tax / Decimal::ONE_HUNDRED);
        prop_assert_eq!(breakdown.final_price, expected);
    }
}

// Property: material cost is the sum of unit cost x quantity, and is
// invariant under reordering of the lines.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(250))]

    #[test]
    fn material_cost_sums_and_commutes(
        costs in prop::collection::vec((money_strategy(), quantity_strategy()), 1..8)
    ) {
        let lines: Vec<(Uuid, Decimal, Decimal)> = costs
            .into_iter()
            .map(|(unit_cost, quantity)| (Uuid::new_v4(), unit_cost, quantity))
            .collect();
        let materials = catalog_for(
            &lines.iter().map(|(id, cost, _)| (*id, *cost)).collect::<Vec<_>>(),
        );

        let inputs: Vec<MaterialLineInput> = lines
            .iter()
            .map(|(id, _, quantity)| MaterialLineInput {
                material_id: *id,
                quantity: *quantity,
            })
            .collect();
        let mut reversed_inputs = inputs.clone();
        reversed_inputs.reverse();

        let p = params(Decimal::ZERO, Decimal::ZERO);
        let forward = compute_breakdown(
            &p,
            &request_with_lines(inputs),
            &materials,
            &empty(),
            &empty(),
        )
        .unwrap();
        let reversed = compute_breakdown(
            &p,
            &request_with_lines(reversed_inputs),
            &materials,
            &empty(),
            &empty(),
        )
        .unwrap();

        let expected: Decimal = lines
            .iter()
            .map(|(_, unit_cost, quantity)| *unit_cost * *quantity)
            .sum();
        prop_assert_eq!(forward.material_cost, expected);
        prop_assert_eq!(reversed.material_cost, expected);
        prop_assert_eq!(forward.final_price, reversed.final_price);
    }
}

// Property: an override of exactly 0 is honored, never treated as "unset".
proptest! {
    #![proptest_config(ProptestConfig::with_cases(250))]

    #[test]
    fn zero_overrides_are_honored(default_margin in percent_strategy(), default_tax in percent_strategy()) {
        let mut request = request_with_lines(vec![]);
        request.margin_override_percent = Some(Decimal::ZERO);
        request.tax_override_percent = Some(Decimal::ZERO);

        let breakdown = compute_breakdown(
            &params(default_margin, default_tax),
            &request,
            &empty(),
            &empty(),
            &empty(),
        )
        .unwrap();

        prop_assert_eq!(breakdown.margin_value, Decimal::ZERO);
        prop_assert_eq!(breakdown.tax_value, Decimal::ZERO);
        prop_assert_eq!(breakdown.final_price, breakdown.total_production_cost);
    }
}

// Property: quote numbers keep their prefix and strictly increase.
proptest! {
    #[test]
    fn quote_numbers_increment_and_keep_prefix(seq in 1u32..9998) {
        let last = format!("202608{seq:04}");
        let next = next_quote_number("202608", Some(&last));

        prop_assert!(next.starts_with("202608"));
        let next_seq: u32 = next[6..].parse().unwrap();
        prop_assert_eq!(next_seq, seq + 1);
        prop_assert_eq!(next.len(), 10);
    }

    #[test]
    fn foreign_prefixes_restart_the_sequence(seq in 1u32..9999) {
        let last = format!("202512{seq:04}");
        prop_assert_eq!(next_quote_number("202601", Some(&last)), "2026010001");
    }
}
