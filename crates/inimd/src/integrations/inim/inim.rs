use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use super::InimConfig;
use super::client::CloudApi;
use super::coordinator::Coordinator;
use super::panel::AlarmPanel;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::PanelState;
use crate::engine::ToIntegrationMessage;

/// Type alias for the shared panels map
type PanelsMap = Arc<Mutex<HashMap<String, Arc<AlarmPanel>>>>;

/// Inim Cloud integration for inimd
///
/// Exposes each alarm device on the account as one alarm control panel
/// entity. State is pulled from the cloud on a fixed interval; commands are
/// dispatched as scenario activations.
pub struct InimIntegration<C: CloudApi> {
    api: Arc<C>,
    config: InimConfig,
    coordinator: Arc<Coordinator>,
    panels: PanelsMap,
    to_engine: Option<FromIntegrationSender>,
    /// Handle to the background polling task
    _poll_task: Option<JoinHandle<()>>,
}

impl<C: CloudApi + 'static> InimIntegration<C> {
    /// Create a new Inim Cloud integration
    pub fn new(api: C, config: &InimConfig) -> Self {
        let api = Arc::new(api);
        let coordinator = Arc::new(Coordinator::new(api.clone() as Arc<dyn CloudApi>));
        Self {
            api,
            config: config.clone(),
            coordinator,
            panels: Arc::new(Mutex::new(HashMap::new())) as PanelsMap,
            to_engine: None,
            _poll_task: None,
        }
    }
}

/// Register an entity with the engine
async fn register_entity(
    entity_id: &str,
    panel: Arc<AlarmPanel>,
    to_engine: &FromIntegrationSender,
) {
    let msg = FromIntegrationMessage::EntityDiscovered {
        entity_id: entity_id.to_string(),
        entity: panel as Arc<dyn crate::engine::Entity>,
        integration_name: "inim".to_string(),
    };
    if let Err(e) = to_engine.send(msg).await {
        warn!("Failed to send EntityDiscovered message: {}", e);
    } else {
        info!("Registered entity: {}", entity_id);
    }
}

/// Report a panel state to the engine
async fn report_state(
    entity_id: &str,
    state: Option<PanelState>,
    to_engine: &FromIntegrationSender,
) {
    let msg = FromIntegrationMessage::PanelStateChanged {
        entity_id: entity_id.to_string(),
        state,
    };
    if let Err(e) = to_engine.send(msg).await {
        warn!("Failed to send PanelStateChanged message: {}", e);
    }
}

/// Poll the cloud on a fixed interval and report state changes.
///
/// The panel set is fixed at setup time; a device that appears in a later
/// poll gets no entity until the integration is set up again, and a device
/// that disappears reads as unknown.
async fn poll_task(
    coordinator: Arc<Coordinator>,
    panels: PanelsMap,
    period: Duration,
    to_engine: FromIntegrationSender,
) {
    let mut last: HashMap<String, Option<PanelState>> = HashMap::new();
    {
        let panels_guard = panels.lock().await;
        for (entity_id, panel) in panels_guard.iter() {
            last.insert(entity_id.clone(), panel.alarm_state());
        }
    }

    // Initial states were already reported during setup, so wait a full
    // period before the first poll.
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        ticker.tick().await;
        coordinator.request_refresh().await;

        let panels_snapshot: Vec<(String, Arc<AlarmPanel>)> = {
            let panels_guard = panels.lock().await;
            panels_guard
                .iter()
                .map(|(entity_id, panel)| (entity_id.clone(), panel.clone()))
                .collect()
        };

        for (entity_id, panel) in panels_snapshot {
            let state = panel.alarm_state();
            if last.get(&entity_id) != Some(&state) {
                last.insert(entity_id.clone(), state);
                report_state(&entity_id, state, &to_engine).await;
            }
        }
    }
}

#[async_trait]
impl<C: CloudApi + 'static> Integration for InimIntegration<C> {
    fn name(&self) -> &str {
        "inim"
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        // Store sender for sending events to engine
        self.to_engine = Some(tx.clone());

        info!("Fetching initial device snapshot from Inim Cloud");
        if let Err(e) = self.coordinator.refresh().await {
            warn!("Initial device refresh failed: {}", e);
        }

        let devices = self.coordinator.snapshot();
        for device in devices.iter() {
            info!("Adding alarm control panel for device: {}", device.name);

            let api = self.api.clone() as Arc<dyn CloudApi>;
            let panel = Arc::new(AlarmPanel::new(self.coordinator.clone(), api, device));
            let entity_id = panel.entity_id().to_string();

            {
                let mut panels_guard = self.panels.lock().await;
                panels_guard.insert(entity_id.clone(), panel.clone());
            }

            register_entity(&entity_id, panel.clone(), &tx).await;
            report_state(&entity_id, panel.alarm_state(), &tx).await;
        }

        if !devices.is_empty() {
            info!("Added {} alarm control panel entities", devices.len());
        }

        // Spawn background task to poll the cloud for state changes
        let coordinator = self.coordinator.clone();
        let panels = self.panels.clone();
        let period = Duration::from_secs(self.config.poll_interval_secs);
        let task = tokio::spawn(async move {
            poll_task(coordinator, panels, period, tx).await;
        });
        self._poll_task = Some(task);

        info!("Inim Cloud integration ready to handle commands");
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::AlarmCommand {
                entity_id,
                command,
                code,
            } => {
                info!("Handling {} command for {}", command, entity_id);

                let panel = {
                    let panels_guard = self.panels.lock().await;
                    panels_guard.get(&entity_id).cloned()
                };

                let Some(panel) = panel else {
                    return Err(Box::new(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("Alarm panel not found: {}", entity_id),
                    )));
                };

                panel.handle_command(command, code.as_deref()).await;
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("Inim Cloud integration shutting down");

        if let Some(task) = self._poll_task.take() {
            task.abort();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AlarmCommand;
    use crate::integrations::inim::client::MockCloudApi;
    use crate::integrations::inim::models::DeviceSnapshot;

    fn test_config() -> InimConfig {
        InimConfig {
            enabled: true,
            base_url: "http://localhost".to_string(),
            token: "token".to_string(),
            // Long enough that the poll task never fires during a test
            poll_interval_secs: 3600,
        }
    }

    fn device(json: serde_json::Value) -> DeviceSnapshot {
        serde_json::from_value(json).unwrap()
    }

    fn test_devices() -> Vec<DeviceSnapshot> {
        vec![
            device(serde_json::json!({
                "id": "dev1",
                "name": "Casa",
                "scenarios": [
                    { "id": 0, "name": "Away" },
                    { "id": 1, "name": "Disarm" },
                ],
                "active_scenario": 1,
            })),
            device(serde_json::json!({
                "id": "dev2",
                "name": "Ufficio",
                "scenarios": [{ "id": 2, "name": "Stay" }],
                "active_scenario": 2,
            })),
        ]
    }

    #[tokio::test]
    async fn test_setup_registers_one_entity_per_device() {
        let mut integration =
            InimIntegration::new(MockCloudApi::with_devices(test_devices()), &test_config());
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);

        integration.setup(tx).await.unwrap();

        let mut discovered = Vec::new();
        let mut states = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            match msg {
                FromIntegrationMessage::EntityDiscovered { entity_id, .. } => {
                    discovered.push(entity_id)
                }
                FromIntegrationMessage::PanelStateChanged { entity_id, state } => {
                    states.push((entity_id, state))
                }
            }
        }

        assert_eq!(
            discovered,
            vec![
                "alarm_control_panel.dev1".to_string(),
                "alarm_control_panel.dev2".to_string()
            ]
        );
        assert_eq!(
            states,
            vec![
                (
                    "alarm_control_panel.dev1".to_string(),
                    Some(PanelState::Disarmed)
                ),
                (
                    "alarm_control_panel.dev2".to_string(),
                    Some(PanelState::ArmedHome)
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_setup_with_no_devices_registers_nothing() {
        let mut integration =
            InimIntegration::new(MockCloudApi::default(), &test_config());
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);

        integration.setup(tx).await.unwrap();

        assert!(rx.try_recv().is_err());
        assert!(integration.panels.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_setup_survives_a_failed_initial_refresh() {
        let api = MockCloudApi::with_devices(test_devices());
        api.fail_fetch
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let mut integration = InimIntegration::new(api, &test_config());
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);

        integration.setup(tx).await.unwrap();

        // Empty snapshot: no entities, no messages
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_command_routed_to_the_right_panel() {
        let mut integration =
            InimIntegration::new(MockCloudApi::with_devices(test_devices()), &test_config());
        let (tx, _rx) = tokio::sync::mpsc::channel(16);
        integration.setup(tx).await.unwrap();

        integration
            .handle_message(ToIntegrationMessage::AlarmCommand {
                entity_id: "alarm_control_panel.dev1".to_string(),
                command: AlarmCommand::ArmAway,
                code: None,
            })
            .await
            .unwrap();

        let activations = integration.api.activations.lock().unwrap().clone();
        assert_eq!(activations, vec![("dev1".to_string(), "0".to_string())]);
    }

    #[tokio::test]
    async fn test_command_for_unknown_entity_is_an_error() {
        let mut integration =
            InimIntegration::new(MockCloudApi::with_devices(test_devices()), &test_config());
        let (tx, _rx) = tokio::sync::mpsc::channel(16);
        integration.setup(tx).await.unwrap();

        let result = integration
            .handle_message(ToIntegrationMessage::AlarmCommand {
                entity_id: "alarm_control_panel.nope".to_string(),
                command: AlarmCommand::Disarm,
                code: None,
            })
            .await;

        assert!(result.is_err());
        assert!(integration.api.activations.lock().unwrap().is_empty());
    }
}
