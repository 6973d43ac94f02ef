use anyhow::{Context, Result};
use log::{info, warn};

use crate::manage::naming::{self, DATA_DIR, ENGINE_PORT};
use crate::manage::process::{CommandError, CommandRunner, Invocation};
use crate::manage::ManagementConfig;

/// Stderr fragment `start` prints when the container was never created.
/// Docker capitalises it and podman does not, so it is compared lowercased.
pub const NO_SUCH_CONTAINER: &str = "no such container";
/// Forwarded to `docker run` from its environment rather than argv.
const MYSQL_ROOT_PASSWORD: &str = "MYSQL_ROOT_PASSWORD";

/// Everything derived from a version identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlContainerConfig {
    pub version: String,
    pub name: String,
    pub port: String,
    pub image: String,
}

impl MysqlContainerConfig {
    pub fn new(config: &ManagementConfig, version: &str) -> MysqlContainerConfig {
        MysqlContainerConfig {
            version: version.to_string(),
            name: naming::container_name(version),
            port: naming::host_port(version),
            image: naming::image(&config.image, version),
        }
    }

    /// `mysql://` URL reaching the published port on localhost.
    pub fn url(&self, user: &str, password: &str, database: Option<&str>) -> String {
        format!(
            "mysql://{}:{}@127.0.0.1:{}/{}",
            user,
            password,
            &self.port,
            database.unwrap_or("")
        )
    }
}

fn is_missing(stderr: &str) -> bool {
    stderr.to_lowercase().contains(NO_SUCH_CONTAINER)
}

/// Starts, stops and removes containers through the runtime CLI.
pub struct ContainerManager<'a> {
    config: &'a ManagementConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> ContainerManager<'a> {
    pub fn new(
        config: &'a ManagementConfig,
        runner: &'a dyn CommandRunner,
    ) -> ContainerManager<'a> {
        ContainerManager { config, runner }
    }

    fn docker(&self) -> Invocation {
        Invocation::new(self.config.docker.as_str())
    }

    /// Resumes the container if it exists, otherwise creates it along with
    /// its volume.
    pub async fn up(&self, container: &MysqlContainerConfig) -> Result<()> {
        let start = self.docker().args(["start", container.name.as_str()]);
        match self.runner.run(&start).await {
            Ok(_) => {
                info!("Started existing container {}", &container.name);
                return Ok(());
            }
            Err(CommandError::ExecutionFailed { ref stderr, .. }) if is_missing(stderr) => {
                info!("Container {} does not exist yet", &container.name);
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Couldn't start container {}", &container.name));
            }
        }
        let run = self
            .docker()
            .args(["run", "-d", "--name", container.name.as_str()])
            .arg("-e")
            .arg(MYSQL_ROOT_PASSWORD)
            .env(MYSQL_ROOT_PASSWORD, self.config.admin_password.as_str())
            .arg("-p")
            .arg(format!("{}:{}", &container.port, ENGINE_PORT))
            .arg("-v")
            .arg(format!("{}:{}", &container.name, DATA_DIR))
            .arg(container.image.as_str());
        self.runner
            .run(&run)
            .await
            .with_context(|| format!("Couldn't create container {}", &container.name))?;
        info!(
            "Created container {} from {} on port {}",
            &container.name, &container.image, &container.port
        );
        Ok(())
    }

    pub async fn stop(&self, container: &MysqlContainerConfig) -> Result<()> {
        let stop = self.docker().args(["stop", container.name.as_str()]);
        self.runner
            .run(&stop)
            .await
            .with_context(|| format!("Couldn't stop container {}", &container.name))?;
        info!("Stopped container {}", &container.name);
        Ok(())
    }

    /// Force-removes the container, and its volume when `remove_volume` is
    /// set. Removing the volume deletes the data for good.
    pub async fn down(&self, container: &MysqlContainerConfig, remove_volume: bool) -> Result<()> {
        let rm = self.docker().args(["rm", "-f", container.name.as_str()]);
        self.runner
            .run(&rm)
            .await
            .with_context(|| format!("Couldn't remove container {}", &container.name))?;
        info!("Removed container {}", &container.name);
        if remove_volume {
            warn!("Removing volume {} and all of its data", &container.name);
            let rm_volume = self.docker().args(["volume", "rm", "-f", container.name.as_str()]);
            self.runner
                .run(&rm_volume)
                .await
                .with_context(|| format!("Couldn't remove volume {}", &container.name))?;
        }
        Ok(())
    }
}
