//! Isolated docker networks, one per run.

use tracing::info;
use uuid::Uuid;

use super::DockerCli;
use crate::error::DockerError;

/// Prefix of generated network names.
pub const NETWORK_PREFIX: &str = "verify";

/// Generates a fresh run identifier such as `verify-3f2a9c01be4d`.
///
/// Used as the isolated network name so concurrent runs never share one.
pub fn generate_run_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", NETWORK_PREFIX, &id[..12])
}

/// Creates the network `name`.
pub async fn create_network(cli: &DockerCli, name: &str) -> Result<(), DockerError> {
    info!(network = name, "Creating network");
    cli.docker(&["network", "create", name]).await?;
    Ok(())
}

/// Removes the network `name`.
pub async fn remove_network(cli: &DockerCli, name: &str) -> Result<(), DockerError> {
    info!(network = name, "Removing network");
    cli.docker(&["network", "rm", name]).await?;
    Ok(())
}
