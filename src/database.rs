use serde::Deserialize;
use snafu::{Location, ResultExt as _, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth;
use surrealdb::Surreal;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::instrument;
use url::Url;

pub type Database = Surreal<Any>;

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseError {
    #[snafu(display("cannot connect to the database `{url}` at {location}: {source}"))]
    DatabaseConnection {
        url: Url,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("cannot sign in to the database `{url}` at {location}: {source}"))]
    DatabaseSignin {
        url: Url,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("cannot select namespace `{namespace}` and database `{database}` at {location}: {source}"))]
    SelectDatabase {
        namespace: String,
        database: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

fn default_namespace() -> String {
    "listings".to_string()
}

fn default_database() -> String {
    "views".to_string()
}

fn default_connect_retries() -> usize {
    5
}

/// Which kind of SurrealDB user `SURREAL_USER` names.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthLevel {
    /// A user made with `surreal start --user`.
    #[default]
    Root,
    Namespace,
    Database,
}

/// Read from the `SURREAL_` prefixed variables.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Url,
    #[serde(rename = "ns", default = "default_namespace")]
    pub namespace: String,
    #[serde(rename = "db", default = "default_database")]
    pub database: String,
    #[serde(rename = "user", default)]
    pub username: Option<String>,
    #[serde(rename = "pass", default)]
    pub password: Option<String>,
    #[serde(rename = "auth", default)]
    pub auth_level: AuthLevel,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: usize,
}

impl DatabaseConfig {
    /// Sign in at the configured level, or stay anonymous when no user is set.
    async fn signin(&self, database: &Database) -> surrealdb::Result<()> {
        let Some(username) = self.username.as_deref() else {
            return Ok(());
        };
        let password = self.password.as_deref().unwrap_or_default();

        match self.auth_level {
            AuthLevel::Root => database.signin(auth::Root { username, password }).await?,
            AuthLevel::Namespace => {
                database
                    .signin(auth::Namespace {
                        namespace: &self.namespace,
                        username,
                        password,
                    })
                    .await?
            }
            AuthLevel::Database => {
                database
                    .signin(auth::Database {
                        namespace: &self.namespace,
                        database: &self.database,
                        username,
                        password,
                    })
                    .await?
            }
        };

        tracing::debug!(level = ?self.auth_level, "signed in to the database");
        Ok(())
    }
}

/// Connect to the configured SurrealDB endpoint, retrying with backoff while the server comes up.
#[instrument(skip(config), fields(url = %config.url))]
pub async fn connect(config: &DatabaseConfig) -> Result<Database> {
    let address = config.url.as_str();
    let strategy = ExponentialBackoff::from_millis(100)
        .max_delay(std::time::Duration::from_secs(5))
        .map(jitter)
        .take(config.connect_retries);

    let database = Retry::spawn(strategy, || async move {
        surrealdb::engine::any::connect(address).await.map_err(|error| {
            tracing::warn!(%error, "could not reach the database, retrying");
            error
        })
    })
    .await
    .context(DatabaseConnectionSnafu {
        url: config.url.clone(),
    })?;

    config
        .signin(&database)
        .await
        .context(DatabaseSigninSnafu {
            url: config.url.clone(),
        })?;

    database
        .use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .context(SelectDatabaseSnafu {
            namespace: config.namespace.clone(),
            database: config.database.clone(),
        })?;

    tracing::info!(namespace = %config.namespace, database = %config.database, "connected to the database");

    Ok(database)
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// A fresh in-memory database, isolated per call.
    pub async fn memory() -> Database {
        let config = DatabaseConfig {
            url: Url::parse("mem://").unwrap(),
            namespace: "test".to_string(),
            database: "test".to_string(),
            username: None,
            password: None,
            auth_level: AuthLevel::default(),
            connect_retries: 0,
        };

        connect(&config).await.unwrap()
    }

    /// Keep the connection busy with a `SLEEP` so queries sent after it queue up.
    pub async fn stall(database: &Database, period: &str) {
        let database = database.clone();
        let statement = format!("SLEEP {period};");

        tokio::spawn(async move { database.query(statement).await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
