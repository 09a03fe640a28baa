//! Resolution of a model type to its client, database and collection.
//!
//! Bindings made on the type win over the process defaults set by
//! [`connect`](crate::connect). Results are cached per type until the type is rebound or
//! the process defaults change.

use crate::{
    Model,
    error::{Error, Result, Undefined},
    registry::{self, Defaults},
    store::{Client, Collection, Database},
};

struct Bindings {
    table_name: String,
    client: Option<Client>,
    database: Option<Database>,
    database_name: Option<String>,
    collection: Option<Collection>,
    defaults: Defaults,
}

fn bindings<M: Model>() -> Bindings {
    let defaults = registry::defaults();

    registry::with::<M, _>(|config| Bindings {
        table_name: config
            .table_name
            .clone()
            .unwrap_or_else(|| default_table_name::<M>()),
        client: config.client.clone(),
        database: config.database.clone(),
        database_name: config.database_name.clone(),
        collection: config.collection.clone(),
        defaults,
    })
}

fn default_table_name<M: Model>() -> String {
    M::TABLE_NAME.map_or_else(|| M::NAME.to_lowercase(), str::to_owned)
}

/// The collection name of `M`, used verbatim as the key into its database.
pub fn table_name<M: Model>() -> String {
    registry::with::<M, _>(|config| config.table_name.clone())
        .unwrap_or_else(default_table_name::<M>)
}

impl Bindings {
    fn client(&self) -> Result<Client> {
        self.client
            .clone()
            .or_else(|| self.database.as_ref().map(|database| database.client().clone()))
            .or_else(|| {
                self.collection
                    .as_ref()
                    .map(|collection| collection.client().clone())
            })
            .or_else(|| self.defaults.client.clone())
            .ok_or(Error::Configuration(Undefined::Client))
    }

    fn database(&self) -> Result<Database> {
        if let Some(database) = &self.database {
            return Ok(database.clone());
        }

        if let Some(collection) = &self.collection {
            return Ok(collection.database().clone());
        }

        let Ok(client) = self.client() else {
            return Err(Error::Configuration(Undefined::Database));
        };

        let name = self
            .database_name
            .clone()
            .or_else(|| self.defaults.database_name.clone())
            .or_else(|| client.default_database_name());

        name.map(|name| client.database(&name))
            .ok_or(Error::Configuration(Undefined::Database))
    }

    fn collection(&self) -> Result<Collection> {
        if let Some(collection) = &self.collection {
            return Ok(collection.clone());
        }

        let database = self.database()?;

        if self.table_name.is_empty() {
            return Err(Error::Configuration(Undefined::Collection));
        }

        Ok(database.collection(&self.table_name))
    }
}

pub fn resolve_client<M: Model>() -> Result<Client> {
    if let Some(client) = registry::with::<M, _>(|config| config.resolved.client.clone()) {
        return Ok(client);
    }

    let client = bindings::<M>().client()?;

    tracing::debug!(model = M::NAME, ?client, "resolved client");

    registry::with::<M, _>(|config| config.resolved.client = Some(client.clone()));

    Ok(client)
}

pub fn resolve_database<M: Model>() -> Result<Database> {
    if let Some(database) = registry::with::<M, _>(|config| config.resolved.database.clone()) {
        return Ok(database);
    }

    let database = bindings::<M>().database()?;

    tracing::debug!(model = M::NAME, database = database.name(), "resolved database");

    registry::with::<M, _>(|config| config.resolved.database = Some(database.clone()));

    Ok(database)
}

pub fn resolve_collection<M: Model>() -> Result<Collection> {
    if let Some(collection) = registry::with::<M, _>(|config| config.resolved.collection.clone())
    {
        return Ok(collection);
    }

    let collection = bindings::<M>().collection()?;

    tracing::debug!(
        model = M::NAME,
        namespace = %collection.namespace(),
        "resolved collection"
    );

    registry::with::<M, _>(|config| config.resolved.collection = Some(collection.clone()));

    Ok(collection)
}
