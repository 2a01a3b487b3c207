//! Demand flexibility: curtail now, pay back later.
//!
//! Each bus may shed up to `fraction` of its hourly demand. Curtailed energy
//! is owed: it accumulates in a running balance that is repaid by serving
//! extra demand in later hours. The balance is carried across intervals, so
//! under-delivery in one interval constrains later ones.
//!
//! Limits:
//! - per hour: `curtail[b,h] <= fraction[b] * demand[b,h]` (payback likewise)
//! - per interval: `sum_h curtail[b,h] <= interval_cap`
//! - optional `balance_cap` on the owed balance
//! - optional settlement (`balance = 0`) at the end of the scenario horizon

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CaseError, CaseResult};
use crate::{BusId, Case};

fn default_cap() -> f64 {
    f64::INFINITY
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandFlexibility {
    /// Gates whether flexibility variables are built at all
    #[serde(default)]
    pub enabled: bool,
    /// Flexible fraction of hourly demand per bus; absent buses are inflexible
    #[serde(default)]
    pub fraction: BTreeMap<BusId, f64>,
    /// Maximum energy curtailed per bus within one interval (MWh)
    #[serde(default = "default_cap")]
    pub interval_cap: f64,
    /// Maximum owed balance per bus (MWh)
    #[serde(default)]
    pub balance_cap: Option<f64>,
    /// Owed balance per bus at scenario start (MWh)
    #[serde(default)]
    pub initial_balance: BTreeMap<BusId, f64>,
    /// Require the owed balance to be fully repaid by the last interval
    #[serde(default = "default_true")]
    pub settle_at_horizon_end: bool,
    /// Penalty per curtailed MWh
    #[serde(default)]
    pub cost_per_mwh: f64,
}

impl Default for DemandFlexibility {
    fn default() -> Self {
        Self {
            enabled: false,
            fraction: BTreeMap::new(),
            interval_cap: f64::INFINITY,
            balance_cap: None,
            initial_balance: BTreeMap::new(),
            settle_at_horizon_end: true,
            cost_per_mwh: 0.0,
        }
    }
}

impl DemandFlexibility {
    /// Flexible fraction for every bus, in case bus order.
    pub fn fractions(&self, case: &Case) -> Vec<f64> {
        case.buses()
            .iter()
            .map(|b| self.fraction.get(&b.id).copied().unwrap_or(0.0))
            .collect()
    }

    /// Initial owed balance for every bus, in case bus order.
    pub fn initial_balances(&self, case: &Case) -> Vec<f64> {
        case.buses()
            .iter()
            .map(|b| self.initial_balance.get(&b.id).copied().unwrap_or(0.0))
            .collect()
    }

    /// Check bus references and ranges against `case`.
    pub fn validate(&self, case: &Case) -> CaseResult<()> {
        for (bus, fraction) in &self.fraction {
            if !case.has_bus(*bus) {
                return Err(CaseError::DanglingBus {
                    element: "demand flexibility".into(),
                    bus: bus.value(),
                });
            }
            if !(0.0..=1.0).contains(fraction) {
                return Err(CaseError::invalid(
                    bus,
                    "fraction",
                    format!("{fraction} must lie in [0, 1]"),
                ));
            }
        }
        for (bus, balance) in &self.initial_balance {
            if !case.has_bus(*bus) {
                return Err(CaseError::DanglingBus {
                    element: "demand flexibility balance".into(),
                    bus: bus.value(),
                });
            }
            if !balance.is_finite() || *balance < 0.0 {
                return Err(CaseError::invalid(
                    bus,
                    "initial_balance",
                    format!("{balance} must be finite and non-negative"),
                ));
            }
            if *balance > 0.0 && self.fraction.get(bus).map_or(true, |f| *f <= 0.0) {
                return Err(CaseError::invalid(
                    bus,
                    "initial_balance",
                    "bus has no flexible fraction to repay it",
                ));
            }
            if let Some(cap) = self.balance_cap {
                if *balance > cap {
                    return Err(CaseError::invalid(
                        bus,
                        "initial_balance",
                        format!("{balance} exceeds balance cap {cap}"),
                    ));
                }
            }
        }
        if self.interval_cap.is_nan() || self.interval_cap < 0.0 {
            return Err(CaseError::invalid(
                "demand flexibility",
                "interval_cap",
                "must be non-negative",
            ));
        }
        if !self.cost_per_mwh.is_finite() || self.cost_per_mwh < 0.0 {
            return Err(CaseError::invalid(
                "demand flexibility",
                "cost_per_mwh",
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::three_bus_data;

    #[test]
    fn test_fractions_default_to_zero() {
        let case = Case::from_data(three_bus_data()).unwrap();
        let flex = DemandFlexibility {
            enabled: true,
            fraction: BTreeMap::from([(BusId::new(3), 0.2)]),
            ..Default::default()
        };
        assert!(flex.validate(&case).is_ok());
        assert_eq!(flex.fractions(&case), vec![0.0, 0.0, 0.2]);
        assert_eq!(flex.initial_balances(&case), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fraction_out_of_range() {
        let case = Case::from_data(three_bus_data()).unwrap();
        let flex = DemandFlexibility {
            fraction: BTreeMap::from([(BusId::new(3), 1.5)]),
            ..Default::default()
        };
        assert!(matches!(
            flex.validate(&case),
            Err(CaseError::InvalidValue { field: "fraction", .. })
        ));
    }

    #[test]
    fn test_unknown_bus_rejected() {
        let case = Case::from_data(three_bus_data()).unwrap();
        let flex = DemandFlexibility {
            fraction: BTreeMap::from([(BusId::new(8), 0.1)]),
            ..Default::default()
        };
        assert!(matches!(
            flex.validate(&case),
            Err(CaseError::DanglingBus { bus: 8, .. })
        ));
    }

    #[test]
    fn test_balance_needs_flexible_bus() {
        let case = Case::from_data(three_bus_data()).unwrap();
        let flex = DemandFlexibility {
            fraction: BTreeMap::from([(BusId::new(3), 0.1)]),
            initial_balance: BTreeMap::from([(BusId::new(2), 5.0)]),
            ..Default::default()
        };
        assert!(matches!(
            flex.validate(&case),
            Err(CaseError::InvalidValue { field: "initial_balance", .. })
        ));
    }

    #[test]
    fn test_deserialize_defaults() {
        let flex: DemandFlexibility =
            serde_json::from_str(r#"{"enabled": true, "fraction": {"3": 0.1}}"#).unwrap();
        assert!(flex.enabled);
        assert!(flex.interval_cap.is_infinite());
        assert!(flex.settle_at_horizon_end);
        assert_eq!(flex.fraction.get(&BusId::new(3)), Some(&0.1));
    }
}
