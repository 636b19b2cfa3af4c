mod client;
mod config;
mod coordinator;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod inim;
mod models;
mod panel;

use anyhow::Context;
pub use config::Config as InimConfig;
pub use inim::InimIntegration;
use linkme::distributed_slice;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_inim(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let inim_config = if let Some(c) = &ctx.config.integrations.inim {
        c
    } else {
        return Ok(None);
    };

    if !inim_config.enabled {
        return Ok(None);
    }

    let client =
        client::InimRestClient::new(inim_config).context("Failed to create Inim Cloud client")?;
    Ok(Some(Box::new(InimIntegration::new(client, inim_config))))
}
