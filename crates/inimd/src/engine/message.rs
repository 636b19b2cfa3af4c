//! Type-safe message system for inimd
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use serde::Deserialize;
use serde::Serialize;

use super::state::PanelState;

/// A user-issued alarm panel action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlarmCommand {
    Disarm,
    ArmHome,
    ArmAway,
}

/// Messages FROM integrations TO the engine (events/state updates)
pub enum FromIntegrationMessage {
    /// An entity was discovered and registered
    EntityDiscovered {
        entity_id: String,
        entity: std::sync::Arc<dyn super::Entity>,
        integration_name: String,
    },

    /// An alarm panel's displayed state changed (`None` = unknown)
    PanelStateChanged {
        entity_id: String,
        state: Option<PanelState>,
    },
}

impl std::fmt::Debug for FromIntegrationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                integration_name,
                ..
            } => f
                .debug_struct("EntityDiscovered")
                .field("entity_id", entity_id)
                .field("integration_name", integration_name)
                .field("entity", &"<entity>")
                .finish(),
            FromIntegrationMessage::PanelStateChanged { entity_id, state } => f
                .debug_struct("PanelStateChanged")
                .field("entity_id", entity_id)
                .field("state", state)
                .finish(),
        }
    }
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone)]
pub enum ToIntegrationMessage {
    /// Command to change an alarm panel's arming mode. The access code is
    /// carried for interface compatibility; panels that require no code
    /// ignore it.
    AlarmCommand {
        entity_id: String,
        command: AlarmCommand,
        code: Option<String>,
    },
}
