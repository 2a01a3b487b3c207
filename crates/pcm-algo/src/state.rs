use serde::{Deserialize, Serialize};

/// Domain state handed from one interval to the next.
///
/// Owned by the rolling-horizon loop. Model building reads it; the results
/// extractor produces the successor from an interval's last hour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarryState {
    /// Generator output in the hour before the interval, in topology order.
    /// `None` leaves the first hour free of ramp limits.
    #[serde(default)]
    pub dispatch: Option<Vec<f64>>,
    /// State of charge per storage unit (MWh)
    #[serde(default)]
    pub soc: Vec<f64>,
    /// Curtailed demand still owed, per bus (MWh)
    #[serde(default)]
    pub flex_balance: Vec<f64>,
}
