use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// Displayed state of an alarm control panel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PanelState {
    ArmedAway,
    Disarmed,
    ArmedHome,
}

/// State of an alarm panel entity as tracked by the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlarmPanelState {
    /// Current panel state, or `None` when the backing device is missing
    /// from the latest snapshot and the state is unknown.
    pub state: Option<PanelState>,
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub panels: HashMap<String, AlarmPanelState>,
}
