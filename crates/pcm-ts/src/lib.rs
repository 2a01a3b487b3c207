//! Hourly profile tables and interval slicing for production-cost runs.
//!
//! - [`HourlyTable`] holds one hour per row and one element id per column.
//! - [`IntervalWindow`] names the hours one interval covers (1-based).
//! - [`ProfileAllocator`] slices demand and hydro/solar/wind tables to a
//!   window and spreads zonal demand over buses by static share.

pub mod allocator;
pub mod error;
pub mod table;
pub mod window;

pub use allocator::{IntervalProfiles, ProfileAllocator, Profiles};
pub use error::{ProfileError, ProfileResult};
pub use table::HourlyTable;
pub use window::IntervalWindow;
