#[cfg(feature = "integration_inim")]
pub mod inim;
