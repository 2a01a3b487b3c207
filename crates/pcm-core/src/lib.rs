//! # pcm-core: Production-Cost Case Model
//!
//! Strongly typed records for a production-cost simulation scenario and the
//! topology derived from them.
//!
//! ## Design Philosophy
//!
//! Raw input (whatever a loader produced) is converted into a [`Case`] exactly
//! once, at the boundary. Every cross reference is checked there, so model
//! builders downstream never meet a dangling bus id.
//!
//! - [`Case`] - buses, AC branches, DC lines, generators (immutable per scenario)
//! - [`Storage`] - optional storage units
//! - [`DemandFlexibility`] - optional curtail-and-payback demand resource
//! - [`Topology`] - dense index maps, sparse incidence matrices, fuel subsets
//!
//! ## Quick Start
//!
//! ```rust
//! use pcm_core::*;
//!
//! let data = CaseData {
//!     buses: vec![
//!         BusData { id: 1, demand: 0.0, zone: 1 },
//!         BusData { id: 2, demand: 40.0, zone: 1 },
//!     ],
//!     branches: vec![BranchData { id: 1, from_bus: 1, to_bus: 2, reactance: 0.1, rating: 100.0 }],
//!     dc_lines: vec![],
//!     gens: vec![GenData {
//!         id: 1,
//!         bus: 1,
//!         fuel: Fuel::Ng,
//!         pmin: 0.0,
//!         pmax: 100.0,
//!         ramp30: 0.0,
//!         c0: 0.0,
//!         c1: 20.0,
//!         c2: 0.0,
//!         pg0: 0.0,
//!     }],
//! };
//!
//! let case = Case::from_data(data).unwrap();
//! let topology = Topology::build(&case).unwrap();
//! assert_eq!(topology.n_bus(), 2);
//! assert_eq!(topology.gen_to_bus().nnz(), 1);
//! ```
//!
//! ## ID System
//!
//! Every element carries a newtype id ([`BusId`], [`GenId`], [`BranchId`],
//! [`ZoneId`]) so bus ids cannot be confused with generator ids. Dense matrix
//! indices are a separate concept owned by [`Topology`].

use serde::{Deserialize, Serialize};

pub mod case;
pub mod diagnostics;
pub mod error;
pub mod flexibility;
pub mod storage;
pub mod topology;

pub use case::{
    Branch, BranchData, Bus, BusData, Case, CaseData, DcLine, DcLineData, Fuel, Gen, GenData,
    LinearCost,
};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{CaseError, CaseResult};
pub use flexibility::DemandFlexibility;
pub use storage::{Storage, StorageUnit};
pub use topology::Topology;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[inline]
            pub fn new(value: u64) -> Self {
                $name(value)
            }
            #[inline]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, " {}"), self.0)
            }
        }
    };
}

id_newtype!(
    /// Bus identifier as it appears in the source data.
    BusId,
    "bus"
);
id_newtype!(
    /// Generator identifier.
    GenId,
    "gen"
);
id_newtype!(
    /// Branch identifier, shared by AC branches and DC lines.
    BranchId,
    "branch"
);
id_newtype!(
    /// Load zone identifier.
    ZoneId,
    "zone"
);

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Three buses in a line, one generator per bus, demand at bus 3.
    pub fn three_bus_data() -> CaseData {
        let gen = |id: u64, bus: u64, c1: f64| GenData {
            id,
            bus,
            fuel: Fuel::Ng,
            pmin: 0.0,
            pmax: 100.0,
            ramp30: 0.0,
            c0: 0.0,
            c1,
            c2: 0.0,
            pg0: 0.0,
        };
        CaseData {
            buses: vec![
                BusData { id: 1, demand: 0.0, zone: 1 },
                BusData { id: 2, demand: 0.0, zone: 1 },
                BusData { id: 3, demand: 60.0, zone: 1 },
            ],
            branches: vec![
                BranchData { id: 1, from_bus: 1, to_bus: 2, reactance: 0.1, rating: 50.0 },
                BranchData { id: 2, from_bus: 2, to_bus: 3, reactance: 0.1, rating: 50.0 },
            ],
            dc_lines: vec![],
            gens: vec![gen(1, 1, 10.0), gen(2, 2, 10.0), gen(3, 3, 10.0)],
        }
    }
}
