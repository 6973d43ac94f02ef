use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use super::container::{ContainerManager, MysqlContainerConfig};
use super::mysql::{self, Credentials, MysqlManager};
use super::process::CommandRunner;
use super::ManagementConfig;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about=None)]
pub struct DevdbArgs {
    #[command(subcommand)]
    pub command: DevdbCommand,
}

#[derive(Debug, Subcommand, PartialEq)]
pub enum DevdbCommand {
    /// Start (or create) the container and create a database, plus an
    /// optional user with full privileges on it
    Prepare {
        /// MySQL image tag, e.g. 8.0, 5.7 or latest
        version: String,
        database_name: String,
        #[arg(short = 'u', long = "userName")]
        user_name: Option<String>,
        #[arg(short = 'p', long = "password")]
        password: Option<String>,
    },
    /// Run a SQL command inside the container, streaming its output
    Exec {
        version: String,
        /// SQL words, joined with spaces. Options may come before or after;
        /// put `--` first when the SQL itself starts with a hyphen.
        #[arg(required = true)]
        command: Vec<String>,
        #[arg(short = 'd', long = "databaseName")]
        database_name: Option<String>,
        #[arg(short = 'u', long = "userName")]
        user_name: Option<String>,
        #[arg(short = 'p', long = "password")]
        password: Option<String>,
    },
    /// Stop the container without removing it
    Stop {
        version: String,
    },
    /// Drop a database, ignoring failures
    Rm {
        version: String,
        database_name: String,
        #[arg(short = 'u', long = "userName")]
        user_name: Option<String>,
        #[arg(short = 'p', long = "password")]
        password: Option<String>,
    },
    /// Force-remove the container
    Down {
        version: String,
        /// Also remove the data volume. The data is lost for good.
        #[arg(short = 'v', long = "volume")]
        volume: bool,
    },
    /// Print the container name, port, image and admin URL for a version
    Info {
        version: String,
    },
}

pub async fn devdb(
    args: &DevdbArgs,
    config: &ManagementConfig,
    runner: &dyn CommandRunner,
) -> Result<()> {
    match &args.command {
        DevdbCommand::Prepare { version, database_name, user_name, password } => {
            let container = MysqlContainerConfig::new(config, version);
            let user = Credentials::from_pair(user_name.clone(), password.clone());
            info!("Preparing {} on {}", database_name, &container.name);
            let port =
                mysql::prepare(config, runner, &container, database_name, user.as_ref()).await?;
            let url = match &user {
                Some(user) => container.url(&user.user, &user.password, Some(database_name)),
                None => {
                    container.url(&config.admin_user, &config.admin_password, Some(database_name))
                }
            };
            println!("{} is ready on port {}", &container.name, port);
            println!("{}", url);
        }
        DevdbCommand::Exec { version, command, database_name, user_name, password } => {
            let container = MysqlContainerConfig::new(config, version);
            let manager = MysqlManager::new(config, runner, &container);
            let credentials = Credentials::from_pair(user_name.clone(), password.clone())
                .unwrap_or_else(|| manager.admin());
            let sql = command.join(" ");
            manager.exec_streaming(&sql, database_name.as_deref(), &credentials).await?;
        }
        DevdbCommand::Stop { version } => {
            let container = MysqlContainerConfig::new(config, version);
            ContainerManager::new(config, runner).stop(&container).await?;
        }
        DevdbCommand::Rm { version, database_name, user_name, password } => {
            let container = MysqlContainerConfig::new(config, version);
            let manager = MysqlManager::new(config, runner, &container);
            let credentials = Credentials::from_pair(user_name.clone(), password.clone())
                .unwrap_or_else(|| manager.admin());
            manager.drop_database(database_name, &credentials).await;
        }
        DevdbCommand::Down { version, volume } => {
            let container = MysqlContainerConfig::new(config, version);
            ContainerManager::new(config, runner).down(&container, *volume).await?;
        }
        DevdbCommand::Info { version } => {
            let container = MysqlContainerConfig::new(config, version);
            println!("container: {}", &container.name);
            println!("volume:    {}", &container.name);
            println!("image:     {}", &container.image);
            println!("port:      {}", &container.port);
            println!(
                "url:       {}",
                container.url(&config.admin_user, &config.admin_password, None)
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> DevdbCommand {
        DevdbArgs::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn parses_prepare_with_user() {
        let command = parse(&["devdb", "prepare", "8.0", "shop", "-u", "app", "--password", "pw"]);
        assert_eq!(
            command,
            DevdbCommand::Prepare {
                version: "8.0".into(),
                database_name: "shop".into(),
                user_name: Some("app".into()),
                password: Some("pw".into()),
            }
        );
    }

    #[test]
    fn parses_exec_command_words() {
        let command = parse(&[
            "devdb", "exec", "-d", "shop", "5.7", "SELECT", "*", "FROM", "orders",
        ]);
        assert_eq!(
            command,
            DevdbCommand::Exec {
                version: "5.7".into(),
                command: vec!["SELECT".into(), "*".into(), "FROM".into(), "orders".into()],
                database_name: Some("shop".into()),
                user_name: None,
                password: None,
            }
        );
    }

    #[test]
    fn parses_exec_options_after_command() {
        let command = parse(&[
            "devdb", "exec", "8.0", "SHOW TABLES", "-d", "shop", "-u", "app", "-p", "pw",
        ]);
        assert_eq!(
            command,
            DevdbCommand::Exec {
                version: "8.0".into(),
                command: vec!["SHOW TABLES".into()],
                database_name: Some("shop".into()),
                user_name: Some("app".into()),
                password: Some("pw".into()),
            }
        );
    }

    #[test]
    fn exec_accepts_hyphenated_sql_after_separator() {
        let command = parse(&[
            "devdb", "exec", "-d", "shop", "8.0", "--", "-- comment", "SELECT", "1",
        ]);
        assert!(matches!(
            command,
            DevdbCommand::Exec { command, .. } if command == vec!["-- comment", "SELECT", "1"]
        ));
    }

    #[test]
    fn parses_long_option_names() {
        let command = parse(&["devdb", "rm", "8.0", "shop", "--userName", "app", "-p", "pw"]);
        assert!(matches!(command, DevdbCommand::Rm { user_name: Some(_), password: Some(_), .. }));
        let command = parse(&["devdb", "down", "latest", "--volume"]);
        assert_eq!(command, DevdbCommand::Down { version: "latest".into(), volume: true });
    }

    #[test]
    fn exec_requires_a_command() {
        assert!(DevdbArgs::try_parse_from(["devdb", "exec", "8.0"]).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        DevdbArgs::command().debug_assert();
    }
}
