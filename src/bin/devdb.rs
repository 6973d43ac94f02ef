use anyhow::Result;
use clap::Parser;

use devdb::manage::cli::{devdb, DevdbArgs};
use devdb::manage::process::ProcessRunner;
use devdb::manage::ManagementConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = DevdbArgs::parse();
    let config = ManagementConfig::from_env()?;
    let runner = ProcessRunner::new();
    devdb(&args, &config, &runner).await
}
