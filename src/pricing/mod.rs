//! Quote pricing engine.
//!
//! The calculation itself is pure: given a store's cost parameters and a
//! calculation request whose references have been resolved against that
//! store's catalogs, it derives a fully itemized [`CostBreakdown`] through a
//! fixed cost-allocation chain (materials, labor, machine, allocated
//! overhead, margin, taxes). All arithmetic is `Decimal` at full precision;
//! rounding to money display precision happens only at the HTTP boundary.

pub mod calculator;
pub mod lookups;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::errors::ServiceError;

pub use calculator::{calculate_quote, compute_breakdown};
pub use lookups::{
    DbPricingCatalog, LaborRoleRecord, MachineRecord, MaterialRecord, PricingCatalog,
    StoreCostSettings,
};

/// Fallback productive hours per month (22 working days x 16h of two shifts)
pub const DEFAULT_MONTHLY_PRODUCTIVE_HOURS: i32 = 352;

fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_positive"))
    }
}

fn validate_non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("must_not_be_negative"))
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("must_not_be_blank"))
    } else {
        Ok(())
    }
}

/// A store's cost parameters with every required field present.
///
/// Built from the raw (nullable) store settings via [`TenantCostParameters::from_settings`];
/// that conversion is the single place an incomplete onboarding surfaces as
/// `InvalidConfiguration`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TenantCostParameters {
    pub labor_cost_per_hour: Decimal,
    pub machine_cost_per_hour: Decimal,
    pub indirect_monthly_costs: Decimal,
    pub default_margin_percent: Decimal,
    pub default_tax_percent: Decimal,
    pub monthly_productive_hours: i32,
}

impl TenantCostParameters {
    /// Projects nullable store settings into calculation-ready parameters.
    ///
    /// `labor_cost_per_hour` and `indirect_monthly_costs` must be set; their
    /// absence means the store has not finished configuring its costs and is
    /// an error, never an implicit zero. The remaining fields have safe
    /// defaults: machine rate 0, margin 0, tax 0, productive hours 352.
    pub fn from_settings(settings: &StoreCostSettings) -> Result<Self, ServiceError> {
        let labor_cost_per_hour = settings.labor_cost_per_hour.ok_or_else(|| {
            ServiceError::InvalidConfiguration(
                "labor cost per hour is not set; complete the store cost settings before quoting"
                    .to_string(),
            )
        })?;
        let indirect_monthly_costs = settings.indirect_monthly_costs.ok_or_else(|| {
            ServiceError::InvalidConfiguration(
                "indirect monthly costs are not set; complete the store cost settings before quoting"
                    .to_string(),
            )
        })?;

        Ok(Self {
            labor_cost_per_hour,
            machine_cost_per_hour: settings.machine_cost_per_hour.unwrap_or(Decimal::ZERO),
            indirect_monthly_costs,
            default_margin_percent: settings.default_margin_percent.unwrap_or(Decimal::ZERO),
            default_tax_percent: settings.default_tax_percent.unwrap_or(Decimal::ZERO),
            monthly_productive_hours: settings
                .monthly_productive_hours
                .unwrap_or(DEFAULT_MONTHLY_PRODUCTIVE_HOURS),
        })
    }
}

/// One requested material usage line
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MaterialLineInput {
    pub material_id: Uuid,
    #[validate(custom = "validate_positive_decimal")]
    pub quantity: Decimal,
}

/// One requested machine usage line
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MachineLineInput {
    pub machine_id: Uuid,
    #[validate(custom = "validate_positive_decimal")]
    pub hours_used: Decimal,
}

/// One requested labor usage line
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LaborLineInput {
    pub role_id: Uuid,
    #[validate(custom = "validate_positive_decimal")]
    pub hours_worked: Decimal,
}

/// Input to the pricing engine. Also the payload for quote creation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct QuoteCalculationRequest {
    #[validate(custom = "validate_not_blank")]
    pub service_name: String,

    pub description: Option<String>,

    #[validate(custom = "validate_positive_decimal")]
    pub production_hours: Decimal,

    /// Informational batch size; does not enter the cost formula
    #[validate(range(min = 1))]
    pub product_quantity: Option<i32>,

    /// An empty list is valid and yields zero material cost
    #[serde(default)]
    #[validate]
    pub material_lines: Vec<MaterialLineInput>,

    #[serde(default)]
    #[validate]
    pub machine_lines: Vec<MachineLineInput>,

    #[serde(default)]
    #[validate]
    pub labor_lines: Vec<LaborLineInput>,

    pub client_id: Option<Uuid>,

    /// Strictly overrides the store default when provided, including 0
    #[validate(custom = "validate_non_negative_decimal")]
    pub margin_override_percent: Option<Decimal>,

    /// Strictly overrides the store default when provided, including 0
    #[validate(custom = "validate_non_negative_decimal")]
    pub tax_override_percent: Option<Decimal>,
}

/// Itemized material line of a computed breakdown, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MaterialLineBreakdown {
    pub material_id: Uuid,
    pub name: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub line_total: Decimal,
    pub unit_of_measure: String,
}

/// Itemized machine line. Display-only: machine line totals are not folded
/// into the top-level cost buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MachineLineBreakdown {
    pub machine_id: Uuid,
    pub name: String,
    pub machine_type: String,
    pub hours_used: Decimal,
    pub cost_per_hour: Decimal,
    pub line_total: Decimal,
}

/// Itemized labor line. Display-only, like machine lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LaborLineBreakdown {
    pub role_id: Uuid,
    pub name: String,
    pub hours_worked: Decimal,
    pub cost_per_hour: Decimal,
    pub line_total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_machine_name: Option<String>,
}

/// Echo of the parameters a breakdown was computed with, for auditability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AppliedRates {
    pub labor_cost_per_hour: Decimal,
    pub machine_cost_per_hour: Decimal,
    pub indirect_cost_per_hour: Decimal,
    pub margin_percent: Decimal,
    pub tax_percent: Decimal,
    pub monthly_productive_hours: i32,
}

/// Fully itemized result of one pricing-engine run. Immutable once computed.
///
/// `labor_cost` is the merged bucket: direct labor (production hours x store
/// labor rate) plus store-level machine cost (production hours x store
/// machine rate). The itemized `machine_lines`/`labor_lines` are reported for
/// display and do not necessarily sum back to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CostBreakdown {
    pub service_name: String,
    pub description: Option<String>,
    pub production_hours: Decimal,
    pub product_quantity: i32,

    pub material_lines: Vec<MaterialLineBreakdown>,
    pub machine_lines: Vec<MachineLineBreakdown>,
    pub labor_lines: Vec<LaborLineBreakdown>,

    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub indirect_cost: Decimal,
    pub total_production_cost: Decimal,

    pub margin_percent: Decimal,
    pub margin_value: Decimal,
    pub subtotal_with_margin: Decimal,
    pub tax_percent: Decimal,
    pub tax_value: Decimal,
    pub final_price: Decimal,

    pub applied_rates: AppliedRates,
}

impl CostBreakdown {
    /// Copy with money fields rounded to 2 decimal places for presentation.
    ///
    /// Percentages and the applied-rates echo keep full precision: they are
    /// audit inputs, not money amounts. Intermediate totals are never rounded
    /// during computation, so chained percentages do not compound rounding
    /// error; this is strictly a display concern.
    pub fn rounded(&self) -> Self {
        let mut out = self.clone();
        for line in &mut out.material_lines {
            line.unit_cost = line.unit_cost.round_dp(2);
            line.line_total = line.line_total.round_dp(2);
        }
        for line in &mut out.machine_lines {
            line.cost_per_hour = line.cost_per_hour.round_dp(2);
            line.line_total = line.line_total.round_dp(2);
        }
        for line in &mut out.labor_lines {
            line.cost_per_hour = line.cost_per_hour.round_dp(2);
            line.line_total = line.line_total.round_dp(2);
        }
        out.material_cost = out.material_cost.round_dp(2);
        out.labor_cost = out.labor_cost.round_dp(2);
        out.indirect_cost = out.indirect_cost.round_dp(2);
        out.total_production_cost = out.total_production_cost.round_dp(2);
        out.margin_value = out.margin_value.round_dp(2);
        out.subtotal_with_margin = out.subtotal_with_margin.round_dp(2);
        out.tax_value = out.tax_value.round_dp(2);
        out.final_price = out.final_price.round_dp(2);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn complete_settings() -> StoreCostSettings {
        StoreCostSettings {
            labor_cost_per_hour: Some(dec!(50)),
            machine_cost_per_hour: Some(dec!(20)),
            indirect_monthly_costs: Some(dec!(3520)),
            default_margin_percent: Some(dec!(100)),
            default_tax_percent: Some(dec!(10)),
            monthly_productive_hours: Some(352),
        }
    }

    #[test]
    fn complete_settings_project_verbatim() {
        let params = TenantCostParameters::from_settings(&complete_settings()).unwrap();
        assert_eq!(params.labor_cost_per_hour, dec!(50));
        assert_eq!(params.machine_cost_per_hour, dec!(20));
        assert_eq!(params.indirect_monthly_costs, dec!(3520));
        assert_eq!(params.default_margin_percent, dec!(100));
        assert_eq!(params.default_tax_percent, dec!(10));
        assert_eq!(params.monthly_productive_hours, 352);
    }

    #[test]
    fn optional_settings_fall_back_to_defaults() {
        let settings = StoreCostSettings {
            labor_cost_per_hour: Some(dec!(50)),
            machine_cost_per_hour: None,
            indirect_monthly_costs: Some(dec!(3520)),
            default_margin_percent: None,
            default_tax_percent: None,
            monthly_productive_hours: None,
        };
        let params = TenantCostParameters::from_settings(&settings).unwrap();
        assert_eq!(params.machine_cost_per_hour, Decimal::ZERO);
        assert_eq!(params.default_margin_percent, Decimal::ZERO);
        assert_eq!(params.default_tax_percent, Decimal::ZERO);
        assert_eq!(
            params.monthly_productive_hours,
            DEFAULT_MONTHLY_PRODUCTIVE_HOURS
        );
    }

    // InvalidConfiguration is raised if and only if labor cost or indirect
    // costs are missing, regardless of the other fields.
    #[rstest]
    #[case(None, Some(dec!(3520)))]
    #[case(Some(dec!(50)), None)]
    #[case(None, None)]
    fn missing_required_settings_fail(
        #[case] labor: Option<Decimal>,
        #[case] indirect: Option<Decimal>,
    ) {
        let settings = StoreCostSettings {
            labor_cost_per_hour: labor,
            indirect_monthly_costs: indirect,
            ..complete_settings()
        };
        assert_matches!(
            TenantCostParameters::from_settings(&settings),
            Err(ServiceError::InvalidConfiguration(_))
        );
    }

    #[test]
    fn zero_required_settings_are_valid() {
        // Zero is a legitimate configured value; only null means unconfigured
        let settings = StoreCostSettings {
            labor_cost_per_hour: Some(Decimal::ZERO),
            indirect_monthly_costs: Some(Decimal::ZERO),
            ..complete_settings()
        };
        assert!(TenantCostParameters::from_settings(&settings).is_ok());
    }

    #[test]
    fn request_validation_rejects_blank_name_and_non_positive_amounts() {
        let request = QuoteCalculationRequest {
            service_name: "   ".to_string(),
            description: None,
            production_hours: dec!(0),
            product_quantity: Some(0),
            material_lines: vec![MaterialLineInput {
                material_id: Uuid::new_v4(),
                quantity: dec!(-1),
            }],
            machine_lines: vec![],
            labor_lines: vec![],
            client_id: None,
            margin_override_percent: Some(dec!(-5)),
            tax_override_percent: None,
        };
        let errors = request.validate().unwrap_err().to_string();
        assert!(errors.contains("must_not_be_blank"));
        assert!(errors.contains("must_be_positive"));
        assert!(errors.contains("must_not_be_negative"));
    }

    #[test]
    fn rounding_is_presentation_only() {
        let settings = complete_settings();
        let params = TenantCostParameters::from_settings(&settings).unwrap();
        let request = QuoteCalculationRequest {
            service_name: "Banner".to_string(),
            description: None,
            production_hours: dec!(1),
            product_quantity: None,
            material_lines: vec![],
            machine_lines: vec![],
            labor_lines: vec![],
            client_id: None,
            margin_override_percent: Some(dec!(33.333)),
            tax_override_percent: None,
        };
        let breakdown = compute_breakdown(
            &params,
            &request,
            &Default::default(),
            &Default::default(),
            &Default::default(),
        )
        .unwrap();

        let rounded = breakdown.rounded();
        assert_eq!(rounded.final_price, breakdown.final_price.round_dp(2));
        // The original keeps full precision
        assert_eq!(breakdown.margin_percent, dec!(33.333));
        assert!(breakdown.final_price.scale() >= rounded.final_price.scale());
    }
}
