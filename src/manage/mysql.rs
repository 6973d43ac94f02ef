use std::fmt;

use anyhow::{Context, Result};
use log::{info, trace, warn};

use crate::manage::container::{ContainerManager, MysqlContainerConfig};
use crate::manage::process::{CommandError, CommandRunner, Invocation};
use crate::manage::retry::{retry_until_ready, Outcome};
use crate::manage::ManagementConfig;

/// `ERROR 1007`: the database being created is already there.
pub const DATABASE_EXISTS: &str = "database exists";
/// `ERROR 1396`: CREATE USER for an account that already exists.
pub const DUPLICATE_USER: &str = "ERROR 1396";
const MYSQL_PWD: &str = "MYSQL_PWD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new<S1: Into<String>, S2: Into<String>>(user: S1, password: S2) -> Credentials {
        Credentials { user: user.into(), password: password.into() }
    }

    /// Only a complete pair counts; a lone user or password is ignored.
    pub fn from_pair(user: Option<String>, password: Option<String>) -> Option<Credentials> {
        match (user, password) {
            (Some(user), Some(password)) => Some(Credentials { user, password }),
            _ => None,
        }
    }
}

/// Runs administrative SQL through the `mysql` client inside a container.
pub struct MysqlManager<'a> {
    config: &'a ManagementConfig,
    runner: &'a dyn CommandRunner,
    container: &'a MysqlContainerConfig,
}

impl<'a> fmt::Display for MysqlManager<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (127.0.0.1:{})", &self.container.name, &self.container.port)
    }
}

impl<'a> MysqlManager<'a> {
    pub fn new(
        config: &'a ManagementConfig,
        runner: &'a dyn CommandRunner,
        container: &'a MysqlContainerConfig,
    ) -> MysqlManager<'a> {
        MysqlManager { config, runner, container }
    }

    pub fn admin(&self) -> Credentials {
        Credentials::new(self.config.admin_user.as_str(), self.config.admin_password.as_str())
    }

    /// `docker exec -e MYSQL_PWD <name> mysql -u<user> [db] -e <sql>`.
    /// `-e MYSQL_PWD` without a value makes docker forward it from its own
    /// environment, so the password never shows up in an argument list.
    pub fn sql_invocation(
        &self,
        sql: &str,
        database: Option<&str>,
        credentials: &Credentials,
    ) -> Invocation {
        let invocation = Invocation::new(self.config.docker.as_str())
            .arg("exec")
            .arg("-e")
            .arg(MYSQL_PWD)
            .env(MYSQL_PWD, credentials.password.as_str())
            .arg(self.container.name.as_str())
            .arg("mysql")
            .arg(format!("-u{}", &credentials.user));
        let invocation = match database {
            Some(database) => invocation.arg(database),
            None => invocation,
        };
        invocation.arg("-e").arg(sql)
    }

    pub async fn exec_sql(
        &self,
        sql: &str,
        database: Option<&str>,
        credentials: &Credentials,
    ) -> Result<String, CommandError> {
        let output = self.runner.run(&self.sql_invocation(sql, database, credentials)).await?;
        trace!("{}: {}", sql, output.trim());
        Ok(output)
    }

    /// Same as [`exec_sql`](Self::exec_sql) but streams the client's output
    /// to our terminal.
    pub async fn exec_streaming(
        &self,
        sql: &str,
        database: Option<&str>,
        credentials: &Credentials,
    ) -> Result<()> {
        let invocation = self.sql_invocation(sql, database, credentials).inherit();
        self.runner
            .run(&invocation)
            .await
            .with_context(|| format!("Command failed on {}", self))?;
        Ok(())
    }

    /// Runs `sql` as admin until the server inside the container answers.
    async fn exec_when_ready(
        &self,
        sql: &str,
        acceptable: Option<&str>,
    ) -> Result<Outcome<String>> {
        let admin = &self.admin();
        let outcome = retry_until_ready(&self.config.retry, acceptable, move || {
            self.exec_sql(sql, None, admin)
        })
        .await
        .with_context(|| format!("Gave up waiting for {}", self))?;
        Ok(outcome)
    }

    pub async fn create_database(&self, database: &str) -> Result<()> {
        let sql = format!("CREATE DATABASE `{}`", database);
        match self.exec_when_ready(&sql, Some(DATABASE_EXISTS)).await? {
            Outcome::Done(_) => info!("Created database {} on {}", database, self),
            Outcome::AlreadyDone => info!("Database {} already exists on {}", database, self),
        }
        Ok(())
    }

    pub async fn create_user(&self, credentials: &Credentials) -> Result<()> {
        let sql = format!(
            "CREATE USER '{}'@'%' IDENTIFIED BY '{}'",
            &credentials.user, &credentials.password
        );
        match self.exec_when_ready(&sql, Some(DUPLICATE_USER)).await? {
            Outcome::Done(_) => info!("Created user {} on {}", &credentials.user, self),
            Outcome::AlreadyDone => info!("User {} already exists on {}", &credentials.user, self),
        }
        Ok(())
    }

    /// A repeated grant succeeds on its own, so no failure is acceptable here.
    pub async fn grant_all(&self, database: &str, user: &str) -> Result<()> {
        let sql = format!("GRANT ALL PRIVILEGES ON `{}`.* TO '{}'@'%'", database, user);
        self.exec_when_ready(&sql, None).await?;
        info!("Granted {} all privileges on {}", user, database);
        Ok(())
    }

    /// Best effort: a failed drop is logged and otherwise ignored.
    pub async fn drop_database(&self, database: &str, credentials: &Credentials) {
        let sql = format!("DROP DATABASE `{}`", database);
        match self.exec_sql(&sql, None, credentials).await {
            Ok(_) => info!("Dropped database {} on {}", database, self),
            Err(err) => warn!("Couldn't drop database {} on {}: {}", database, self, err),
        }
    }
}

/// Brings up the container, then creates `database`, then (given a full
/// credential pair) creates the user and grants it the database. Returns the
/// host port the container publishes.
pub async fn prepare(
    config: &ManagementConfig,
    runner: &dyn CommandRunner,
    container: &MysqlContainerConfig,
    database: &str,
    user: Option<&Credentials>,
) -> Result<String> {
    ContainerManager::new(config, runner).up(container).await?;
    let manager = MysqlManager::new(config, runner, container);
    info!("Waiting for {} to accept commands ...", &manager);
    manager.create_database(database).await?;
    if let Some(credentials) = user {
        manager.create_user(credentials).await?;
        manager.grant_all(database, &credentials.user).await?;
    }
    Ok(container.port.clone())
}
