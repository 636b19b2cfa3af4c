/// Entity abstraction for inimd
///
/// All entities (alarm panels today, other platforms later) implement the
/// Entity trait.
///
/// Base trait that all entities must implement
pub trait Entity: Send + Sync {
    /// Serialize current state to JSON for the status API
    fn state_json(&self) -> serde_json::Value;

    /// Return the platform type of this entity (e.g. "alarm_control_panel")
    fn platform(&self) -> &'static str;
}
