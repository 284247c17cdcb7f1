//! Provisioning entry point
//!
//! Usage:
//!   BOOTSTRAP_STACK=dev cargo run --bin provision
//!
//! Resolves (or creates) the stack's SSH key pair in the working directory,
//! reads the cloud-init payload, and prints the provisioning request for the
//! orchestration engine as JSON on stdout. Nothing is printed on failure.

use anyhow::{Context, Result};
use bootstrap_config::{BootstrapConfig, LogFormat};
use bootstrap_keys::{init_key_store, ssh_key_spec};
use bootstrap_logging::{init_console_logging, init_logging};
use bootstrap_types::ProvisionRequest;
use std::path::Path;
use tracing::info;

const SERVICE_NAME: &str = "provision";

#[tokio::main]
async fn main() -> Result<()> {
    let config = BootstrapConfig::from_env().context("Failed to load configuration")?;

    match config.log_format {
        LogFormat::Json => init_logging(SERVICE_NAME, config.log_level()),
        LogFormat::Console => init_console_logging(SERVICE_NAME, config.log_level()),
    }

    info!(
        stack = %config.stack,
        user_data = %config.user_data_path.display(),
        "Starting provisioning run"
    );

    let user_data = read_user_data(&config.user_data_path).await?;

    let key_store = init_key_store(config.lock_mode, config.partial_pair_policy);
    let stack = config.stack.clone();
    let ssh_key = tokio::task::spawn_blocking(move || ssh_key_spec(&key_store, &stack))
        .await
        .context("Key resolution task failed")?
        .with_context(|| format!("Failed to resolve SSH key for stack '{}'", config.stack))?;

    let request = ProvisionRequest::new(
        config.stack.as_str(),
        ssh_key,
        config.droplet.image.as_str(),
        config.droplet.region.as_str(),
        config.droplet.size.as_str(),
        user_data,
    );
    request
        .validate()
        .context("Refusing to emit an invalid provisioning request")?;

    println!("{}", request.to_json()?);

    info!(
        stack = %request.stack,
        droplet = %request.droplet.name,
        ssh_key = %request.ssh_key.name,
        "Provisioning request emitted"
    );

    Ok(())
}

/// Read the cloud-init payload; it is forwarded without interpretation
async fn read_user_data(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    String::from_utf8(bytes)
        .with_context(|| format!("{} is not valid UTF-8", path.display()))
}
