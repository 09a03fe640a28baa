//! The store boundary.
//!
//! Horde never talks to a database directly. Every backend implements the three
//! capability traits [`ClientBackend`], [`DatabaseBackend`] and [`CollectionBackend`],
//! and the rest of the crate only sees the [`Client`], [`Database`] and [`Collection`]
//! handles built on top of them. Handles carry backreferences: a collection knows its
//! database, and a database knows its client. The resolver relies on these links.
//!
//! Two backends ship with the crate:
//! - [`mongo`] wraps the `mongodb` driver,
//! - [`memory`] keeps everything in process, which is what the test-suite runs against.

use crate::Result;
use futures_util::{future::BoxFuture, stream::BoxStream};
use mongodb::bson::{Bson, Document, doc};
use std::{fmt, sync::Arc};

pub mod cursor;
pub mod memory;
pub mod mongo;

pub use cursor::NativeCursor;

pub type DocumentStream = BoxStream<'static, Result<Document>>;

pub trait ClientBackend: Send + Sync + 'static {
    fn database(&self, name: &str) -> Arc<dyn DatabaseBackend>;

    /// The database named by the connection string, if any.
    fn default_database_name(&self) -> Option<String>;

    fn shutdown(&self) -> BoxFuture<'_, Result<()>>;
}

pub trait DatabaseBackend: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn collection(&self, name: &str) -> Arc<dyn CollectionBackend>;

    fn list_collection_names(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    fn drop(&self) -> BoxFuture<'_, Result<()>>;
}

pub trait CollectionBackend: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn find(&self, query: FindQuery) -> BoxFuture<'_, Result<DocumentStream>>;

    fn explain(&self, query: FindQuery) -> BoxFuture<'_, Result<Document>>;

    fn count_documents(&self, query: CountQuery) -> BoxFuture<'_, Result<u64>>;

    fn distinct(&self, field: String, filter: Document) -> BoxFuture<'_, Result<Vec<Bson>>>;

    /// Returns the identity of the inserted document.
    fn insert_one(&self, document: Document) -> BoxFuture<'_, Result<Bson>>;

    fn insert_many(&self, documents: Vec<Document>) -> BoxFuture<'_, Result<Vec<Bson>>>;

    fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
        upsert: bool,
    ) -> BoxFuture<'_, Result<UpdateOutcome>>;

    fn update_one(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> BoxFuture<'_, Result<UpdateOutcome>>;

    fn update_many(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> BoxFuture<'_, Result<UpdateOutcome>>;

    fn delete_one(&self, filter: Document) -> BoxFuture<'_, Result<u64>>;

    fn delete_many(&self, filter: Document) -> BoxFuture<'_, Result<u64>>;

    fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        options: FindAndModify,
    ) -> BoxFuture<'_, Result<Option<Document>>>;

    fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: FindAndModify,
    ) -> BoxFuture<'_, Result<Option<Document>>>;

    /// Returns the name of the created index.
    fn create_index(&self, index: IndexSpec) -> BoxFuture<'_, Result<String>>;

    fn list_index_names(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    fn drop(&self) -> BoxFuture<'_, Result<()>>;
}

/// A pending find operation. Nothing reaches the store until the query is executed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl FindQuery {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CountQuery {
    pub filter: Document,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReturnDocument {
    Before,
    #[default]
    After,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FindAndModify {
    pub return_document: ReturnDocument,
    pub upsert: bool,
}

/// A secondary index definition.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexSpec {
    pub keys: Document,
    pub name: Option<String>,
    pub unique: bool,
    pub sparse: bool,
    pub background: bool,
}

impl IndexSpec {
    /// An index over `keys`, built in the background unless told otherwise.
    pub fn new(keys: Document) -> Self {
        Self {
            keys,
            name: None,
            unique: false,
            sparse: false,
            background: true,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// The server's naming convention: `field_direction` pairs joined by `_`.
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, direction)| match direction {
                Bson::Int32(n) => format!("{field}_{n}"),
                Bson::Int64(n) => format!("{field}_{n}"),
                Bson::Double(n) => format!("{field}_{n}"),
                Bson::String(kind) => format!("{field}_{kind}"),
                other => format!("{field}_{other}"),
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn resolved_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.default_name())
    }
}

#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn ClientBackend>,
}

impl Client {
    pub fn from_backend(backend: impl ClientBackend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn database(&self, name: &str) -> Database {
        Database {
            client: self.clone(),
            backend: self.backend.database(name),
        }
    }

    pub fn default_database_name(&self) -> Option<String> {
        self.backend.default_database_name()
    }

    /// The database named by the connection string.
    pub fn default_database(&self) -> Option<Database> {
        self.default_database_name()
            .map(|name| self.database(&name))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.backend.shutdown().await
    }
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.backend), Arc::as_ptr(&other.backend))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("default_database", &self.default_database_name())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct Database {
    client: Client,
    backend: Arc<dyn DatabaseBackend>,
}

impl Database {
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn collection(&self, name: &str) -> Collection {
        Collection {
            database: self.clone(),
            backend: self.backend.collection(name),
        }
    }

    pub async fn list_collection_names(&self) -> Result<Vec<String>> {
        self.backend.list_collection_names().await
    }

    pub async fn drop(&self) -> Result<()> {
        DatabaseBackend::drop(&*self.backend).await
    }
}

impl PartialEq for Database {
    fn eq(&self, other: &Self) -> bool {
        self.client == other.client && self.name() == other.name()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct Collection {
    database: Database,
    backend: Arc<dyn CollectionBackend>,
}

impl Collection {
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn client(&self) -> &Client {
        self.database.client()
    }

    /// `database.collection`, the way the server spells it in error messages.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database.name(), self.name())
    }

    /// A lazy cursor over documents matching `filter`.
    pub fn find(&self, filter: Document) -> NativeCursor {
        NativeCursor::new(self.clone(), FindQuery::new(filter))
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        self.find(filter).first().await
    }

    pub(crate) async fn execute(&self, query: FindQuery) -> Result<DocumentStream> {
        self.backend.find(query).await
    }

    pub(crate) async fn explain(&self, query: FindQuery) -> Result<Document> {
        self.backend.explain(query).await
    }

    pub async fn count_documents(&self, filter: Document) -> Result<u64> {
        self.count(CountQuery {
            filter,
            ..Default::default()
        })
        .await
    }

    pub async fn count(&self, query: CountQuery) -> Result<u64> {
        self.backend.count_documents(query).await
    }

    /// Whether at least one document matches, without counting them all.
    pub async fn exists(&self, filter: Document) -> Result<bool> {
        let count = self
            .count(CountQuery {
                filter,
                skip: None,
                limit: Some(1),
            })
            .await?;

        Ok(count > 0)
    }

    pub async fn distinct(&self, field: &str, filter: Document) -> Result<Vec<Bson>> {
        self.backend.distinct(field.to_owned(), filter).await
    }

    pub async fn insert_one(&self, document: Document) -> Result<Bson> {
        self.backend.insert_one(document).await
    }

    pub async fn insert_many(&self, documents: Vec<Document>) -> Result<Vec<Bson>> {
        self.backend.insert_many(documents).await
    }

    pub async fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome> {
        self.backend.replace_one(filter, replacement, upsert).await
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome> {
        self.backend.update_one(filter, update, upsert).await
    }

    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome> {
        self.backend.update_many(filter, update, upsert).await
    }

    pub async fn delete_one(&self, filter: Document) -> Result<u64> {
        self.backend.delete_one(filter).await
    }

    pub async fn delete_many(&self, filter: Document) -> Result<u64> {
        self.backend.delete_many(filter).await
    }

    pub async fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        options: FindAndModify,
    ) -> Result<Option<Document>> {
        self.backend
            .find_one_and_replace(filter, replacement, options)
            .await
    }

    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: FindAndModify,
    ) -> Result<Option<Document>> {
        self.backend
            .find_one_and_update(filter, update, options)
            .await
    }

    pub async fn create_index(&self, index: IndexSpec) -> Result<String> {
        self.backend.create_index(index).await
    }

    pub async fn list_index_names(&self) -> Result<Vec<String>> {
        self.backend.list_index_names().await
    }

    /// Removes every document, keeping the collection and its indexes.
    pub async fn clear(&self) -> Result<u64> {
        self.delete_many(doc! {}).await
    }

    pub async fn drop(&self) -> Result<()> {
        CollectionBackend::drop(&*self.backend).await
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.database == other.database && self.name() == other.name()
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("namespace", &self.namespace())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_names_follow_server_convention() {
        let index = IndexSpec::new(doc! { "document_id": -1, "document_type": -1 });

        assert_eq!(index.default_name(), "document_id_-1_document_type_-1");
        assert_eq!(index.resolved_name(), "document_id_-1_document_type_-1");
        assert!(index.background);
        assert_eq!(index.named("custom").resolved_name(), "custom");
    }

    #[test]
    fn handles_keep_backreferences() {
        let client = memory::client();
        let database = client.database("horde");
        let collection = database.collection("foo");

        assert_eq!(collection.database(), &database);
        assert_eq!(collection.client(), &client);
        assert_eq!(collection.namespace(), "horde.foo");
        assert_ne!(memory::client(), client);
    }
}
