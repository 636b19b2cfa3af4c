use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::warn;

use super::client::CloudApi;
use super::coordinator::Coordinator;
use super::models::DeviceSnapshot;
use super::models::Scenario;
use super::models::ScenarioId;
use crate::engine::AlarmCommand;
use crate::engine::Entity;
use crate::engine::PanelState;

/// Semantic action a scenario can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Disarm,
    ArmHome,
    ArmAway,
}

impl From<AlarmCommand> for Role {
    fn from(command: AlarmCommand) -> Self {
        match command {
            AlarmCommand::Disarm => Role::Disarm,
            AlarmCommand::ArmHome => Role::ArmHome,
            AlarmCommand::ArmAway => Role::ArmAway,
        }
    }
}

/// Scenario-name vocabulary, matched case-insensitively and exactly.
const SCENARIO_ROLE_VOCAB: [(&str, Role); 7] = [
    ("arm", Role::ArmAway),
    ("away", Role::ArmAway),
    ("stay", Role::ArmHome),
    ("home", Role::ArmHome),
    ("partial", Role::ArmHome),
    ("disarm", Role::Disarm),
    ("off", Role::Disarm),
];

/// Active-scenario identifiers the cloud reports, keyed by their stringified
/// form. Scenario ids outside this table have no displayed state of their
/// own and fall back to disarmed.
const SCENARIO_STATE_TABLE: [(&str, PanelState); 3] = [
    ("0", PanelState::ArmedAway),
    ("1", PanelState::Disarmed),
    ("2", PanelState::ArmedHome),
];

/// Classify a scenario name into a semantic role, if it matches the
/// vocabulary.
pub fn classify_scenario(name: &str) -> Option<Role> {
    let name = name.to_lowercase();
    SCENARIO_ROLE_VOCAB
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, role)| *role)
}

/// Look up the panel state for a stringified active-scenario identifier.
pub fn panel_state_for_key(key: &str) -> Option<PanelState> {
    SCENARIO_STATE_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, state)| *state)
}

/// Compute the displayed panel state for a device snapshot.
///
/// An active scenario outside the state table (or none at all) reads as
/// disarmed rather than unknown: an armed system is expected to report
/// itself, so omission is treated as disarmed.
pub fn panel_state(device: &DeviceSnapshot) -> PanelState {
    let key = device.active_scenario.as_ref().map(|id| id.key());

    match key.as_deref().and_then(panel_state_for_key) {
        Some(state) => {
            debug!(
                "Device {} scenario id {:?} mapped to state '{}'",
                device.id, key, state
            );
            state
        }
        None => {
            warn!(
                "No state mapping found for scenario id {:?} on device {}, defaulting to disarmed",
                key, device.id
            );
            PanelState::Disarmed
        }
    }
}

/// Role to scenario-id mapping derived from one device's scenario list.
///
/// Computed once when the panel entity is constructed; a later poll that
/// renames or reorders the device's scenarios does not change it. Any role
/// may be unmapped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleMapping {
    disarm: Option<ScenarioId>,
    arm_home: Option<ScenarioId>,
    arm_away: Option<ScenarioId>,
}

impl RoleMapping {
    /// Build the mapping by scanning the scenario list in order.
    ///
    /// Each match overwrites unconditionally, so when several scenarios
    /// claim the same role the last one in list order wins.
    pub fn from_scenarios(scenarios: &[Scenario]) -> Self {
        let mut mapping = Self::default();
        for scenario in scenarios {
            let Some(role) = classify_scenario(&scenario.name) else {
                continue;
            };
            debug!("Mapped '{}' to {} with id {}", scenario.name, role, scenario.id);
            *mapping.slot_mut(role) = Some(scenario.id.clone());
        }
        mapping
    }

    pub fn scenario_for(&self, role: Role) -> Option<&ScenarioId> {
        match role {
            Role::Disarm => self.disarm.as_ref(),
            Role::ArmHome => self.arm_home.as_ref(),
            Role::ArmAway => self.arm_away.as_ref(),
        }
    }

    fn slot_mut(&mut self, role: Role) -> &mut Option<ScenarioId> {
        match role {
            Role::Disarm => &mut self.disarm,
            Role::ArmHome => &mut self.arm_home,
            Role::ArmAway => &mut self.arm_away,
        }
    }
}

/// One alarm control panel entity per cloud device.
///
/// Holds no mutable state: the displayed state is always derived from the
/// coordinator's latest snapshot, never updated optimistically.
pub struct AlarmPanel {
    entity_id: String,
    device_id: String,
    name: String,
    roles: RoleMapping,
    coordinator: Arc<Coordinator>,
    api: Arc<dyn CloudApi>,
}

impl AlarmPanel {
    pub fn new(
        coordinator: Arc<Coordinator>,
        api: Arc<dyn CloudApi>,
        device: &DeviceSnapshot,
    ) -> Self {
        Self {
            entity_id: format!("alarm_control_panel.{}", device.id),
            device_id: device.id.clone(),
            name: device.name.clone(),
            roles: RoleMapping::from_scenarios(&device.scenarios),
            coordinator,
            api,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Current panel state, or `None` when the device is missing from the
    /// latest snapshot.
    pub fn alarm_state(&self) -> Option<PanelState> {
        let Some(device) = self.coordinator.find_device(&self.device_id) else {
            warn!(
                "Device {} not found in latest snapshot",
                self.device_id
            );
            return None;
        };

        Some(panel_state(&device))
    }

    /// Dispatch a user-issued command against the cloud.
    ///
    /// The access code is accepted for interface compatibility and ignored;
    /// this panel requires none. Errors never escape: an unmapped role is a
    /// logged no-op, and a failed activation is logged and followed by the
    /// same refresh a successful one gets, so the displayed state is always
    /// pulled fresh rather than assumed.
    pub async fn handle_command(&self, command: AlarmCommand, _code: Option<&str>) {
        debug!("Handling {} for device {}", command, self.device_id);

        let role = Role::from(command);
        let Some(scenario_id) = self.roles.scenario_for(role) else {
            error!(
                "Cannot {} - no {} scenario found for device {}",
                command, role, self.device_id
            );
            return;
        };

        if let Err(e) = self
            .api
            .activate_scenario(&self.device_id, scenario_id)
            .await
        {
            error!(
                "Error sending {} to device {}: {}",
                command, self.device_id, e
            );
        }

        self.coordinator.request_refresh().await;
    }
}

impl Entity for AlarmPanel {
    fn state_json(&self) -> serde_json::Value {
        serde_json::json!({
            "entity_id": self.entity_id,
            "name": self.name,
            "platform": "alarm_control_panel",
            "device_id": self.device_id,
            "state": self.alarm_state(),
            "code_arm_required": false,
        })
    }

    fn platform(&self) -> &'static str {
        "alarm_control_panel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::inim::client::MockCloudApi;

    fn scenario(id: serde_json::Value, name: &str) -> Scenario {
        Scenario {
            id: ScenarioId::from(id),
            name: name.to_string(),
        }
    }

    fn device_json(json: serde_json::Value) -> DeviceSnapshot {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_classify_is_case_insensitive_and_exact() {
        assert_eq!(classify_scenario("Arm"), Some(Role::ArmAway));
        assert_eq!(classify_scenario("away"), Some(Role::ArmAway));
        assert_eq!(classify_scenario("Partial"), Some(Role::ArmHome));
        assert_eq!(classify_scenario("STAY"), Some(Role::ArmHome));
        assert_eq!(classify_scenario("home"), Some(Role::ArmHome));
        assert_eq!(classify_scenario("OFF"), Some(Role::Disarm));
        assert_eq!(classify_scenario("disarm"), Some(Role::Disarm));

        // Exact match only: no substring or prefix classification
        assert_eq!(classify_scenario("armed"), None);
        assert_eq!(classify_scenario("go away"), None);
        assert_eq!(classify_scenario("garden"), None);
    }

    #[test]
    fn test_role_mapping_last_match_wins() {
        let mapping = RoleMapping::from_scenarios(&[
            scenario(serde_json::json!(0), "Away"),
            scenario(serde_json::json!(3), "Arm"),
            scenario(serde_json::json!(1), "Disarm"),
        ]);

        assert_eq!(
            mapping.scenario_for(Role::ArmAway).unwrap().key(),
            "3",
            "the later 'Arm' scenario overwrites the earlier 'Away' one"
        );
        assert_eq!(mapping.scenario_for(Role::Disarm).unwrap().key(), "1");
        assert_eq!(mapping.scenario_for(Role::ArmHome), None);
    }

    #[test]
    fn test_role_mapping_ignores_unrecognized_names() {
        let mapping = RoleMapping::from_scenarios(&[
            scenario(serde_json::json!(7), "Garden"),
            scenario(serde_json::json!(8), "Night shift"),
        ]);

        assert_eq!(mapping, RoleMapping::default());
    }

    #[test]
    fn test_panel_state_literal_table() {
        assert_eq!(panel_state_for_key("0"), Some(PanelState::ArmedAway));
        assert_eq!(panel_state_for_key("1"), Some(PanelState::Disarmed));
        assert_eq!(panel_state_for_key("2"), Some(PanelState::ArmedHome));
        assert_eq!(panel_state_for_key("3"), None);
        assert_eq!(panel_state_for_key(""), None);
    }

    #[test]
    fn test_panel_state_defaults_to_disarmed() {
        let unmapped = device_json(serde_json::json!({
            "id": "1", "name": "Casa", "active_scenario": 7
        }));
        assert_eq!(panel_state(&unmapped), PanelState::Disarmed);

        let missing = device_json(serde_json::json!({ "id": "1", "name": "Casa" }));
        assert_eq!(panel_state(&missing), PanelState::Disarmed);
    }

    #[test]
    fn test_panel_state_accepts_numeric_and_string_ids() {
        let numeric = device_json(serde_json::json!({
            "id": "1", "name": "Casa", "active_scenario": 0
        }));
        assert_eq!(panel_state(&numeric), PanelState::ArmedAway);

        let string = device_json(serde_json::json!({
            "id": "1", "name": "Casa", "active_scenario": "2"
        }));
        assert_eq!(panel_state(&string), PanelState::ArmedHome);
    }

    fn test_device() -> DeviceSnapshot {
        device_json(serde_json::json!({
            "id": "dev1",
            "name": "Casa",
            "scenarios": [
                { "id": 0, "name": "Away" },
                { "id": 1, "name": "Disarm" },
                { "id": 2, "name": "Stay" },
            ],
            "active_scenario": 1,
        }))
    }

    async fn panel_with(
        devices: Vec<DeviceSnapshot>,
        panel_device: &DeviceSnapshot,
    ) -> (Arc<MockCloudApi>, Arc<Coordinator>, AlarmPanel) {
        let api = Arc::new(MockCloudApi::with_devices(devices));
        let coordinator = Arc::new(Coordinator::new(api.clone()));
        coordinator.refresh().await.unwrap();
        let panel = AlarmPanel::new(coordinator.clone(), api.clone(), panel_device);
        (api, coordinator, panel)
    }

    #[tokio::test]
    async fn test_alarm_state_reads_latest_snapshot() {
        let device = test_device();
        let (api, coordinator, panel) = panel_with(vec![device.clone()], &device).await;

        assert_eq!(panel.alarm_state(), Some(PanelState::Disarmed));

        // The next poll reports a different active scenario
        let mut armed = device.clone();
        armed.active_scenario = Some(ScenarioId::from(serde_json::json!(0)));
        api.set_devices(vec![armed]);
        coordinator.refresh().await.unwrap();

        assert_eq!(panel.alarm_state(), Some(PanelState::ArmedAway));
    }

    #[tokio::test]
    async fn test_alarm_state_unknown_when_device_disappears() {
        let device = test_device();
        let (api, coordinator, panel) = panel_with(vec![device.clone()], &device).await;

        api.set_devices(vec![]);
        coordinator.refresh().await.unwrap();

        assert_eq!(panel.alarm_state(), None);
    }

    #[tokio::test]
    async fn test_command_activates_mapped_scenario_and_refreshes() {
        let device = test_device();
        let (api, _coordinator, panel) = panel_with(vec![device.clone()], &device).await;

        let before = api.fetches();
        panel.handle_command(AlarmCommand::ArmAway, None).await;

        let activations = api.activations.lock().unwrap().clone();
        assert_eq!(activations, vec![("dev1".to_string(), "0".to_string())]);
        assert_eq!(api.fetches(), before + 1, "exactly one refresh per attempt");
    }

    #[tokio::test]
    async fn test_command_ignores_access_code() {
        let device = test_device();
        let (api, _coordinator, panel) = panel_with(vec![device.clone()], &device).await;

        panel
            .handle_command(AlarmCommand::Disarm, Some("1234"))
            .await;

        let activations = api.activations.lock().unwrap().clone();
        assert_eq!(activations, vec![("dev1".to_string(), "1".to_string())]);
    }

    #[tokio::test]
    async fn test_unmapped_role_is_a_silent_no_op() {
        // No scenario named for arm-home
        let device = device_json(serde_json::json!({
            "id": "dev1",
            "name": "Casa",
            "scenarios": [
                { "id": 0, "name": "Away" },
                { "id": 1, "name": "Disarm" },
            ],
        }));
        let (api, _coordinator, panel) = panel_with(vec![device.clone()], &device).await;

        let before = api.fetches();
        panel.handle_command(AlarmCommand::ArmHome, None).await;

        assert!(api.activations.lock().unwrap().is_empty());
        assert_eq!(api.fetches(), before, "no-op path does not refresh");
    }

    #[tokio::test]
    async fn test_failed_command_still_refreshes() {
        let device = test_device();
        let (api, _coordinator, panel) = panel_with(vec![device.clone()], &device).await;

        api.fail_activate
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let before = api.fetches();
        panel.handle_command(AlarmCommand::ArmAway, None).await;

        assert_eq!(api.activations.lock().unwrap().len(), 1);
        assert_eq!(
            api.fetches(),
            before + 1,
            "a failed activation still triggers a refresh"
        );
    }

    #[tokio::test]
    async fn test_state_json_reflects_current_state() {
        let device = test_device();
        let (_api, _coordinator, panel) = panel_with(vec![device.clone()], &device).await;

        let json = panel.state_json();
        assert_eq!(json["entity_id"], "alarm_control_panel.dev1");
        assert_eq!(json["platform"], "alarm_control_panel");
        assert_eq!(json["state"], "disarmed");
        assert_eq!(json["code_arm_required"], false);
    }
}
