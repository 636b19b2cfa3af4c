use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Deserialize a device identifier that can be either a string or an integer.
///
/// The cloud reports device ids as integers for older installations and as
/// strings for newer ones. This helper accepts both types and converts
/// integers to strings.
fn deserialize_string_or_int<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct StringOrInt;

    impl<'de> de::Visitor<'de> for StringOrInt {
        type Value = String;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("string or integer")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(StringOrInt)
}

/// Opaque scenario identifier as reported by the cloud.
///
/// The cloud is not consistent about the JSON type of scenario identifiers
/// (numbers and strings are both seen in the wild), so the raw value is kept
/// as-is and echoed back verbatim when activating a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioId(serde_json::Value);

impl ScenarioId {
    /// Canonical string form, used as the key in lookup tables.
    pub fn key(&self) -> String {
        match &self.0 {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<serde_json::Value> for ScenarioId {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// A named arming preset stored on the alarm device. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: String,
}

/// Read-only snapshot of one alarm device, replaced wholesale on every
/// refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    #[serde(deserialize_with = "deserialize_string_or_int")]
    pub id: String,

    pub name: String,

    /// Arming scenarios available on this device, in cloud order
    #[serde(default)]
    pub scenarios: Vec<Scenario>,

    /// Identifier of the scenario currently in effect, if any
    #[serde(default)]
    pub active_scenario: Option<ScenarioId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_id_key_passes_strings_through() {
        let id = ScenarioId::from(serde_json::json!("2"));
        assert_eq!(id.key(), "2");
    }

    #[test]
    fn test_scenario_id_key_stringifies_numbers() {
        let id = ScenarioId::from(serde_json::json!(0));
        assert_eq!(id.key(), "0");
    }

    #[test]
    fn test_device_with_integer_id() {
        let device: DeviceSnapshot = serde_json::from_str(
            r#"{"id": 42, "name": "Casa", "scenarios": [{"id": 1, "name": "Disarm"}], "active_scenario": 1}"#,
        )
        .unwrap();

        assert_eq!(device.id, "42");
        assert_eq!(device.name, "Casa");
        assert_eq!(device.scenarios.len(), 1);
        assert_eq!(device.scenarios[0].name, "Disarm");
        assert_eq!(device.active_scenario.as_ref().unwrap().key(), "1");
    }

    #[test]
    fn test_device_with_string_id_and_missing_fields() {
        let device: DeviceSnapshot =
            serde_json::from_str(r#"{"id": "abc", "name": "Ufficio"}"#).unwrap();

        assert_eq!(device.id, "abc");
        assert!(device.scenarios.is_empty());
        assert!(device.active_scenario.is_none());
    }

    #[test]
    fn test_null_active_scenario_is_none() {
        let device: DeviceSnapshot = serde_json::from_str(
            r#"{"id": "1", "name": "Casa", "active_scenario": null}"#,
        )
        .unwrap();

        assert!(device.active_scenario.is_none());
    }
}
