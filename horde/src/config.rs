//! Configuration from the environment.

use crate::{
    ConnectOptions, DEFAULT_DATABASE_NAME, Model, Result,
    connection::{self, open_client},
    store::{Client, Database},
};
use std::{env, process};

pub const DEFAULT_URI_VAR: &str = "HORDE_URI";

pub const DATABASE_NAME_VAR: &str = "HORDE_DATABASE";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub uri: Option<String>,
    pub database_name: Option<String>,
}

impl Settings {
    /// Reads `HORDE_URI` and `HORDE_DATABASE`.
    pub fn from_env() -> Self {
        Self::from_env_var(DEFAULT_URI_VAR)
    }

    /// Reads the connection string from `var` instead of `HORDE_URI`.
    pub fn from_env_var(var: &str) -> Self {
        Self {
            uri: env::var(var).ok(),
            database_name: env::var(DATABASE_NAME_VAR).ok(),
        }
    }

    pub fn connect_options(&self) -> Option<ConnectOptions> {
        let options = ConnectOptions::new(self.uri.clone()?);

        Some(match &self.database_name {
            Some(database_name) => options.database_name(database_name),
            None => options,
        })
    }

    /// [`connect_with`](crate::connect_with) when a connection string is configured.
    pub async fn connect(&self) -> Result<Option<Client>> {
        match self.connect_options() {
            Some(options) => connection::connect_with(options).await.map(Some),
            None => Ok(None),
        }
    }
}

/// Binds the database named by the connection string in `var` to `M`.
///
/// When `var` is not set, the process exits with a message if `exit_if_missing` is set,
/// and nothing is bound otherwise.
pub async fn bind_database_from_env<M: Model>(
    var: &str,
    exit_if_missing: bool,
) -> Result<Option<Database>> {
    let Ok(uri) = env::var(var) else {
        if exit_if_missing {
            eprintln!("Missing ${var} environment variable");
            process::exit(1);
        }

        tracing::warn!(model = M::NAME, var, "environment variable is not set");

        return Ok(None);
    };

    let client = open_client(&uri).await?;

    let database = client
        .default_database()
        .unwrap_or_else(|| client.database(DEFAULT_DATABASE_NAME));

    M::bind_database(database.clone());

    Ok(Some(database))
}
