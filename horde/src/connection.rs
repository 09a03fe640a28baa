use crate::{
    Result,
    registry::{self, Defaults},
    store::{Client, memory, mongo},
};

/// The database used when neither the connection string nor the caller names one.
pub const DEFAULT_DATABASE_NAME: &str = "test";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectOptions {
    pub uri: String,
    /// Overrides the database named by the connection string.
    pub database_name: Option<String>,
}

impl ConnectOptions {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database_name: None,
        }
    }

    pub fn database_name(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = Some(database_name.into());
        self
    }
}

/// Opens a client without binding it anywhere. `memory://` URIs get the in-process
/// backend, everything else goes to the driver.
pub async fn open_client(uri: &str) -> Result<Client> {
    if uri.starts_with(memory::SCHEME) {
        memory::client_from_uri(uri)
    } else {
        mongo::connect(uri).await
    }
}

/// Connects to `uri` and makes the client the default of every model type.
pub async fn connect(uri: &str) -> Result<Client> {
    connect_with(ConnectOptions::new(uri)).await
}

pub async fn connect_with(options: ConnectOptions) -> Result<Client> {
    let client = open_client(&options.uri).await?;

    let database_name = options
        .database_name
        .or_else(|| client.default_database_name())
        .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_owned());

    tracing::info!(database = %database_name, "connected");

    registry::set_defaults(Defaults {
        client: Some(client.clone()),
        database_name: Some(database_name),
    });

    Ok(client)
}

/// Forgets the default client and shuts it down. Bindings made on individual types are
/// kept.
pub async fn disconnect() -> Result<()> {
    let previous = registry::set_defaults(Defaults::default());

    if let Some(client) = previous.client {
        client.shutdown().await?;

        tracing::info!("disconnected");
    }

    Ok(())
}
