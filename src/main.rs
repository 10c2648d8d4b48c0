use std::{env, sync::Arc};

use colored::Colorize;
use log::{error, info, warn};
use onair_collab::{Collab, Database, DatabaseError, EngineCredentials, MemoryDatabase, PgDatabase};
use onair_core::Config;
use onair_server::DEFAULT_PORT;
use thiserror::Error;
use tokio::runtime::{self, Runtime};

mod logging;

/// Everything read from the environment at startup
struct Settings {
    port: u16,
    database_url: Option<String>,
    credentials: Option<EngineCredentials>,
}

pub struct Onair {
    collab: Collab,
    port: u16,
    runtime: Runtime,
}

#[derive(Debug, Error)]
enum OnairError {
    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Settings {
    fn from_env() -> Result<Self, OnairError> {
        let port = match env::var("ONAIR_SERVER_PORT") {
            Ok(port) => port
                .parse::<u16>()
                .map_err(|_| OnairError::Config("ONAIR_SERVER_PORT must be a number".into()))?,
            Err(_) => DEFAULT_PORT,
        };

        let credentials = engine_credentials(
            env::var("ZEGO_APP_ID").ok(),
            env::var("ZEGO_SERVER_SECRET").ok(),
        )?;

        Ok(Self {
            port,
            database_url: env::var("DATABASE_URL").ok(),
            credentials,
        })
    }
}

/// Empty values and an app id of 0 count as not configured
fn engine_credentials(
    app_id: Option<String>,
    server_secret: Option<String>,
) -> Result<Option<EngineCredentials>, OnairError> {
    let (Some(app_id), Some(server_secret)) = (app_id, server_secret) else {
        return Ok(None);
    };

    if app_id.trim().is_empty() || server_secret.is_empty() {
        return Ok(None);
    }

    let app_id: u32 = app_id
        .trim()
        .parse()
        .map_err(|_| OnairError::Config("ZEGO_APP_ID must be a number".into()))?;

    if app_id == 0 {
        return Ok(None);
    }

    Ok(Some(EngineCredentials {
        app_id,
        server_secret,
    }))
}

impl Onair {
    fn new() -> Result<Self, OnairError> {
        let settings = Settings::from_env()?;

        info!("Building async runtime...");
        let main_runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("onair-async")
            .build()
            .map_err(|e| OnairError::Fatal(e.to_string()))?;

        let database: Arc<dyn Database> = match &settings.database_url {
            Some(url) => {
                info!("Connecting to database...");

                let database = main_runtime.block_on(async {
                    let database = PgDatabase::new(url).await?;
                    database.migrate().await?;

                    Ok::<_, DatabaseError>(database)
                })?;

                Arc::new(database)
            }
            None => {
                warn!("DATABASE_URL is not set, rooms are kept in memory and lost on restart");
                Arc::new(MemoryDatabase::new())
            }
        };

        if settings.credentials.is_none() {
            warn!("ZEGO_APP_ID or ZEGO_SERVER_SECRET is not set, engine tokens cannot be minted");
        }

        Ok(Self {
            collab: Collab::new(database, Config::default(), settings.credentials),
            port: settings.port,
            runtime: main_runtime,
        })
    }

    fn run(self) -> Result<(), OnairError> {
        let Self {
            collab,
            port,
            runtime,
        } = self;

        runtime
            .block_on(onair_server::run_server(collab, port))
            .map_err(|e| OnairError::Fatal(e.to_string()))
    }
}

impl OnairError {
    fn hint(&self) -> String {
        match self {
            OnairError::Database(_) => "This is a database error. Make sure DATABASE_URL points to a running PostgreSQL instance, then try again.".to_string(),
            OnairError::Config(_) => "Check the environment variables, or the .env file if you use one.".to_string(),
            OnairError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn main() {
    // A missing .env file is fine, the environment may be set directly
    let _ = dotenvy::dotenv();
    logging::init_logger();

    let result = Onair::new().and_then(|onair| {
        info!("Initialized successfully.");
        onair.run()
    });

    if let Err(error) = result {
        error!("{} Read the error below to troubleshoot the issue.", "onair failed to start!".bold().red());
        error!("{}", error);
        error!(
            "{}",
            format!("Hint: {}", error.hint())
                .dimmed()
                .italic()
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_blank_engine_credentials_are_missing() {
        let secret = "0123456789abcdef0123456789abcdef";

        assert!(engine_credentials(None, some(secret)).unwrap().is_none());
        assert!(engine_credentials(some("0"), some(secret)).unwrap().is_none());
        assert!(engine_credentials(some("42"), some("")).unwrap().is_none());
        assert!(engine_credentials(some(""), some(secret)).unwrap().is_none());

        let credentials = engine_credentials(some("42"), some(secret)).unwrap().unwrap();
        assert_eq!(credentials.app_id, 42);

        assert!(matches!(
            engine_credentials(some("abc"), some(secret)),
            Err(OnairError::Config(_))
        ));
    }
}
