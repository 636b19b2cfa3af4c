use async_trait::async_trait;
use reqwest::StatusCode;

use super::models::DeviceSnapshot;
use super::models::ScenarioId;

/// Errors surfaced at the cloud client boundary.
///
/// Callers are expected to treat every kind the same way (log and carry on);
/// the distinction exists so logs say what actually went wrong.
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication rejected by the cloud")]
    Auth,

    #[error("cloud returned status {status}")]
    Status { status: StatusCode },
}

/// Trait for Inim Cloud API operations
///
/// This trait allows for mocking the cloud client for testing purposes
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Fetch the current snapshot of all devices on the account
    async fn fetch_devices(&self) -> Result<Vec<DeviceSnapshot>, CloudError>;

    /// Activate a scenario on a device
    async fn activate_scenario(
        &self,
        device_id: &str,
        scenario_id: &ScenarioId,
    ) -> Result<(), CloudError>;
}

/// Real cloud client implementation using reqwest
pub struct InimRestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl InimRestClient {
    /// Create a new InimRestClient from configuration
    pub fn new(config: &super::InimConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, CloudError> {
    match resp.status() {
        status if status.is_success() => Ok(resp),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CloudError::Auth),
        status => Err(CloudError::Status { status }),
    }
}

#[async_trait]
impl CloudApi for InimRestClient {
    async fn fetch_devices(&self) -> Result<Vec<DeviceSnapshot>, CloudError> {
        let resp = self
            .http
            .get(self.url("/devices"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let resp = check_status(resp)?;
        Ok(resp.json().await?)
    }

    async fn activate_scenario(
        &self,
        device_id: &str,
        scenario_id: &ScenarioId,
    ) -> Result<(), CloudError> {
        let resp = self
            .http
            .post(self.url(&format!(
                "/devices/{}/scenarios/{}/activate",
                device_id,
                scenario_id.key()
            )))
            .bearer_auth(&self.token)
            .send()
            .await?;

        check_status(resp)?;
        Ok(())
    }
}

/// Mock cloud client for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockCloudApi {
    /// Devices returned by `fetch_devices`
    pub devices: std::sync::Mutex<Vec<DeviceSnapshot>>,

    /// Recorded `(device_id, scenario_key)` activation attempts
    pub activations: std::sync::Mutex<Vec<(String, String)>>,

    /// Number of `fetch_devices` calls so far
    pub fetch_count: std::sync::atomic::AtomicUsize,

    /// Make `fetch_devices` fail
    pub fail_fetch: std::sync::atomic::AtomicBool,

    /// Make `activate_scenario` fail (the attempt is still recorded)
    pub fail_activate: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MockCloudApi {
    pub fn with_devices(devices: Vec<DeviceSnapshot>) -> Self {
        Self {
            devices: std::sync::Mutex::new(devices),
            ..Self::default()
        }
    }

    pub fn set_devices(&self, devices: Vec<DeviceSnapshot>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl CloudApi for MockCloudApi {
    async fn fetch_devices(&self) -> Result<Vec<DeviceSnapshot>, CloudError> {
        self.fetch_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail_fetch.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CloudError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn activate_scenario(
        &self,
        device_id: &str,
        scenario_id: &ScenarioId,
    ) -> Result<(), CloudError> {
        self.activations
            .lock()
            .unwrap()
            .push((device_id.to_string(), scenario_id.key()));
        if self.fail_activate.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CloudError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        Ok(())
    }
}
