//! Storage units attached to buses.
//!
//! A unit charges and discharges within its power limits and keeps its state
//! of charge within `[0, capacity]`. The initial state of charge is supplied
//! once per scenario; afterwards each interval's terminal state seeds the next.

use serde::{Deserialize, Serialize};

use crate::error::{CaseError, CaseResult};
use crate::{BusId, Case};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageUnit {
    pub bus: BusId,
    /// Energy capacity (MWh)
    pub capacity: f64,
    /// Charging power limit (MW)
    pub max_charge: f64,
    /// Discharging power limit (MW)
    pub max_discharge: f64,
    /// Applied once on the way in and once on the way out
    pub efficiency: f64,
    /// State of charge at scenario start (MWh)
    pub initial_soc: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub units: Vec<StorageUnit>,
}

impl Storage {
    pub fn new(units: Vec<StorageUnit>) -> Self {
        Self { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Initial state of charge of every unit, in unit order.
    pub fn initial_soc(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.initial_soc).collect()
    }

    /// Check bus references and physical ranges against `case`.
    pub fn validate(&self, case: &Case) -> CaseResult<()> {
        for (i, unit) in self.units.iter().enumerate() {
            let label = format!("storage {i}");
            if !case.has_bus(unit.bus) {
                return Err(CaseError::DanglingBus {
                    element: label,
                    bus: unit.bus.value(),
                });
            }
            for (field, value) in [
                ("capacity", unit.capacity),
                ("max_charge", unit.max_charge),
                ("max_discharge", unit.max_discharge),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(CaseError::invalid(
                        &label,
                        field,
                        format!("{value} must be finite and non-negative"),
                    ));
                }
            }
            if !(unit.efficiency > 0.0 && unit.efficiency <= 1.0) {
                return Err(CaseError::invalid(
                    &label,
                    "efficiency",
                    format!("{} must lie in (0, 1]", unit.efficiency),
                ));
            }
            if !(0.0..=unit.capacity).contains(&unit.initial_soc) {
                return Err(CaseError::invalid(
                    &label,
                    "initial_soc",
                    format!("{} outside [0, {}]", unit.initial_soc, unit.capacity),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::three_bus_data;

    fn unit(bus: u64) -> StorageUnit {
        StorageUnit {
            bus: BusId::new(bus),
            capacity: 100.0,
            max_charge: 20.0,
            max_discharge: 20.0,
            efficiency: 0.9,
            initial_soc: 50.0,
        }
    }

    #[test]
    fn test_storage_validates() {
        let case = Case::from_data(three_bus_data()).unwrap();
        let storage = Storage::new(vec![unit(1), unit(3)]);
        assert!(storage.validate(&case).is_ok());
        assert_eq!(storage.initial_soc(), vec![50.0, 50.0]);
    }

    #[test]
    fn test_storage_dangling_bus() {
        let case = Case::from_data(three_bus_data()).unwrap();
        let storage = Storage::new(vec![unit(9)]);
        assert!(matches!(
            storage.validate(&case),
            Err(CaseError::DanglingBus { bus: 9, .. })
        ));
    }

    #[test]
    fn test_storage_rejects_bad_efficiency_and_soc() {
        let case = Case::from_data(three_bus_data()).unwrap();

        let mut bad = unit(1);
        bad.efficiency = 0.0;
        assert!(Storage::new(vec![bad]).validate(&case).is_err());

        let mut bad = unit(1);
        bad.initial_soc = 150.0;
        assert!(matches!(
            Storage::new(vec![bad]).validate(&case),
            Err(CaseError::InvalidValue { field: "initial_soc", .. })
        ));
    }
}
