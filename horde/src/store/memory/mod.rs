//! An in-process store.
//!
//! Keeps every database in memory and honours the subset of the query language horde
//! itself emits, plus the common comparison, logical and update operators. Unique
//! indexes (including the implicit one on `_id`) are enforced and report
//! [`Error::DuplicateKey`] like the server reports `E11000`.
//!
//! ```
//! let client = horde::store::memory::client_with_default("app");
//! let database = client.default_database().unwrap();
//! assert_eq!(database.name(), "app");
//! ```

use super::{
    Client, ClientBackend, CollectionBackend, CountQuery, DatabaseBackend, DocumentStream,
    FindAndModify, FindQuery, IndexSpec, ReturnDocument, UpdateOutcome,
};
use crate::{Error, Result};
use dashmap::DashMap;
use futures_util::{
    FutureExt, StreamExt,
    future::{BoxFuture, ready},
    stream,
};
use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use parking_lot::Mutex;
use std::sync::Arc;

pub mod query;
pub mod update;

pub const SCHEME: &str = "memory://";

/// A fresh, empty in-memory client without a default database.
pub fn client() -> Client {
    Client::from_backend(MemoryClient::new(None))
}

/// A fresh, empty in-memory client whose default database is `name`.
pub fn client_with_default(name: impl Into<String>) -> Client {
    Client::from_backend(MemoryClient::new(Some(name.into())))
}

/// Parses `memory://[host][/database]`.
pub fn client_from_uri(uri: &str) -> Result<Client> {
    let rest = uri
        .strip_prefix(SCHEME)
        .ok_or_else(|| Error::InvalidUri(uri.to_owned()))?;
    let path = rest.split_once('/').map_or("", |(_, path)| path);
    let name = path.split(['?', '/']).next().unwrap_or_default();

    Ok(if name.is_empty() {
        client()
    } else {
        client_with_default(name)
    })
}

pub struct MemoryClient {
    default_database: Option<String>,
    databases: DashMap<String, Arc<MemoryDatabase>>,
}

impl MemoryClient {
    pub fn new(default_database: Option<String>) -> Self {
        Self {
            default_database,
            databases: DashMap::new(),
        }
    }
}

impl ClientBackend for MemoryClient {
    fn database(&self, name: &str) -> Arc<dyn DatabaseBackend> {
        self.databases
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(MemoryDatabase::new(name)))
            .clone()
    }

    fn default_database_name(&self) -> Option<String> {
        self.default_database.clone()
    }

    fn shutdown(&self) -> BoxFuture<'_, Result<()>> {
        self.databases.clear();
        ready(Ok(())).boxed()
    }
}

pub struct MemoryDatabase {
    name: String,
    collections: DashMap<String, Arc<MemoryCollection>>,
}

impl MemoryDatabase {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            collections: DashMap::new(),
        }
    }
}

impl DatabaseBackend for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> Arc<dyn CollectionBackend> {
        self.collections
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(MemoryCollection::new(&self.name, name)))
            .clone()
    }

    fn list_collection_names(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        let mut names = self
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        names.sort();
        ready(Ok(names)).boxed()
    }

    fn drop(&self) -> BoxFuture<'_, Result<()>> {
        self.collections.clear();
        ready(Ok(())).boxed()
    }
}

fn prepend_id(id: Bson, document: Document) -> Document {
    let mut with_id = doc! { "_id": id };
    for (field, value) in document {
        with_id.insert(field, value);
    }
    with_id
}

#[derive(Default)]
struct State {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

pub struct MemoryCollection {
    name: String,
    namespace: String,
    state: Mutex<State>,
}

impl MemoryCollection {
    fn new(database: &str, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            namespace: format!("{database}.{name}"),
            state: Mutex::new(State::default()),
        }
    }

    fn select(&self, find: &FindQuery) -> Result<Vec<Document>> {
        let state = self.state.lock();

        let mut selected = Vec::new();
        for document in &state.documents {
            if query::matches(document, &find.filter)? {
                selected.push(document.clone());
            }
        }
        drop(state);

        if let Some(order) = &find.sort {
            query::sort(&mut selected, order);
        }

        let skip = usize::try_from(find.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = match find.limit {
            Some(limit) if limit != 0 => usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX),
            _ => usize::MAX,
        };

        Ok(selected
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| match &find.projection {
                Some(projection) => query::project(document, projection),
                None => document,
            })
            .collect())
    }

    fn key_of(index: &IndexSpec, document: &Document) -> Option<Vec<Bson>> {
        let values = index
            .keys
            .keys()
            .map(|path| query::lookup(document, path).cloned())
            .collect::<Vec<_>>();

        if index.sparse && values.iter().all(Option::is_none) {
            return None;
        }

        Some(
            values
                .into_iter()
                .map(|value| value.unwrap_or(Bson::Null))
                .collect(),
        )
    }

    /// Checks `candidate` against every unique index, ignoring the document at `skip`.
    fn check_unique(&self, state: &State, candidate: &Document, skip: Option<usize>) -> Result<()> {
        let id_index = IndexSpec::new(doc! { "_id": 1 }).unique(true);

        for index in std::iter::once(&id_index).chain(state.indexes.iter()) {
            if !index.unique {
                continue;
            }
            let Some(key) = Self::key_of(index, candidate) else {
                continue;
            };

            let collides = state.documents.iter().enumerate().any(|(position, other)| {
                Some(position) != skip
                    && Self::key_of(index, other).is_some_and(|other_key| {
                        other_key
                            .iter()
                            .zip(key.iter())
                            .all(|(a, b)| query::same(a, b))
                    })
            });

            if collides {
                let rendered = index
                    .keys
                    .keys()
                    .zip(key.iter())
                    .map(|(field, value)| format!("{field}: {value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(Error::DuplicateKey {
                    collection: self.namespace.clone(),
                    key: format!("{{ {rendered} }}"),
                });
            }
        }

        Ok(())
    }

    fn with_id(mut document: Document) -> (Bson, Document) {
        if let Some(id) = document.get("_id") {
            return (id.clone(), document);
        }

        let id = Bson::ObjectId(ObjectId::new());
        document = prepend_id(id.clone(), document);
        (id, document)
    }

    fn insert(&self, state: &mut State, document: Document) -> Result<Bson> {
        let (id, document) = Self::with_id(document);
        self.check_unique(state, &document, None)?;
        state.documents.push(document);
        Ok(id)
    }

    fn positions(state: &State, filter: &Document, many: bool) -> Result<Vec<usize>> {
        let mut positions = Vec::new();
        for (position, document) in state.documents.iter().enumerate() {
            if query::matches(document, filter)? {
                positions.push(position);
                if !many {
                    break;
                }
            }
        }
        Ok(positions)
    }

    /// Produces the new version of `current` for a replacement or an operator update.
    fn rewrite(current: &Document, change: &Document, inserting: bool) -> Result<Document> {
        if update::is_operator_update(change) {
            let mut document = current.clone();
            update::apply(&mut document, change, inserting)?;
            Ok(document)
        } else {
            let mut document = change.clone();
            if let Some(id) = current.get("_id") {
                document.remove("_id");
                document = prepend_id(id.clone(), document);
            }
            Ok(document)
        }
    }

    fn modify(
        &self,
        filter: &Document,
        change: &Document,
        upsert: bool,
        many: bool,
    ) -> Result<(UpdateOutcome, Option<(Document, Document)>)> {
        let mut state = self.state.lock();
        let positions = Self::positions(&state, filter, many)?;

        if positions.is_empty() {
            if !upsert {
                return Ok((UpdateOutcome::default(), None));
            }
            let seed = update::seed_from_filter(filter);
            let (id, document) = Self::with_id(Self::rewrite(&seed, change, true)?);
            self.check_unique(&state, &document, None)?;
            state.documents.push(document.clone());

            return Ok((
                UpdateOutcome {
                    matched_count: 0,
                    modified_count: 0,
                    upserted_id: Some(id),
                },
                Some((Document::new(), document)),
            ));
        }

        let mut outcome = UpdateOutcome {
            matched_count: positions.len() as u64,
            ..Default::default()
        };
        let mut last = None;

        for position in positions {
            let before = state.documents[position].clone();
            let after = Self::rewrite(&before, change, false)?;
            self.check_unique(&state, &after, Some(position))?;
            if after != before {
                outcome.modified_count += 1;
            }
            state.documents[position] = after.clone();
            last = Some((before, after));
        }

        Ok((outcome, last))
    }

    fn remove(&self, filter: &Document, many: bool) -> Result<u64> {
        let mut state = self.state.lock();
        let positions = Self::positions(&state, filter, many)?;

        for position in positions.iter().rev() {
            state.documents.remove(*position);
        }

        Ok(positions.len() as u64)
    }

    fn find_and_modify(
        &self,
        filter: &Document,
        change: &Document,
        options: FindAndModify,
    ) -> Result<Option<Document>> {
        let (outcome, versions) = self.modify(filter, change, options.upsert, false)?;

        Ok(versions.and_then(|(before, after)| match options.return_document {
            ReturnDocument::After => Some(after),
            ReturnDocument::Before if outcome.upserted_id.is_some() => None,
            ReturnDocument::Before => Some(before),
        }))
    }
}

impl CollectionBackend for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, query: FindQuery) -> BoxFuture<'_, Result<DocumentStream>> {
        let documents = self.select(&query);

        ready(documents.map(|documents| stream::iter(documents.into_iter().map(Ok)).boxed()))
            .boxed()
    }

    fn explain(&self, query: FindQuery) -> BoxFuture<'_, Result<Document>> {
        let mut parsed = doc! { "filter": query.filter };
        if let Some(sort) = query.sort {
            parsed.insert("sort", sort);
        }
        if let Some(skip) = query.skip {
            parsed.insert("skip", i64::try_from(skip).unwrap_or(i64::MAX));
        }
        if let Some(limit) = query.limit {
            parsed.insert("limit", limit);
        }

        ready(Ok(doc! {
            "queryPlanner": {
                "namespace": self.namespace.clone(),
                "parsedQuery": parsed,
                "winningPlan": { "stage": "COLLSCAN" },
            },
        }))
        .boxed()
    }

    fn count_documents(&self, query: CountQuery) -> BoxFuture<'_, Result<u64>> {
        let find = FindQuery {
            filter: query.filter,
            skip: query.skip,
            limit: query
                .limit
                .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX)),
            ..Default::default()
        };

        ready(self.select(&find).map(|documents| documents.len() as u64)).boxed()
    }

    fn distinct(&self, field: String, filter: Document) -> BoxFuture<'_, Result<Vec<Bson>>> {
        let result = self.select(&FindQuery::new(filter)).map(|documents| {
            let mut values: Vec<Bson> = Vec::new();
            for document in &documents {
                let found = match query::lookup(document, &field) {
                    Some(Bson::Array(items)) => items.clone(),
                    Some(value) => vec![value.clone()],
                    None => continue,
                };
                for value in found {
                    if !values.iter().any(|seen| query::same(seen, &value)) {
                        values.push(value);
                    }
                }
            }
            values
        });

        ready(result).boxed()
    }

    fn insert_one(&self, document: Document) -> BoxFuture<'_, Result<Bson>> {
        let result = self.insert(&mut self.state.lock(), document);

        ready(result).boxed()
    }

    fn insert_many(&self, documents: Vec<Document>) -> BoxFuture<'_, Result<Vec<Bson>>> {
        let mut state = self.state.lock();
        let result = documents
            .into_iter()
            .map(|document| self.insert(&mut state, document))
            .collect();
        drop(state);

        ready(result).boxed()
    }

    fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
        upsert: bool,
    ) -> BoxFuture<'_, Result<UpdateOutcome>> {
        let result = if update::is_operator_update(&replacement) {
            Err(Error::UnsupportedOperator(
                "replacement document must not contain update operators".into(),
            ))
        } else {
            self.modify(&filter, &replacement, upsert, false)
                .map(|(outcome, _)| outcome)
        };

        ready(result).boxed()
    }

    fn update_one(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> BoxFuture<'_, Result<UpdateOutcome>> {
        let result = self
            .modify(&filter, &update, upsert, false)
            .map(|(outcome, _)| outcome);

        ready(result).boxed()
    }

    fn update_many(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> BoxFuture<'_, Result<UpdateOutcome>> {
        let result = self
            .modify(&filter, &update, upsert, true)
            .map(|(outcome, _)| outcome);

        ready(result).boxed()
    }

    fn delete_one(&self, filter: Document) -> BoxFuture<'_, Result<u64>> {
        ready(self.remove(&filter, false)).boxed()
    }

    fn delete_many(&self, filter: Document) -> BoxFuture<'_, Result<u64>> {
        ready(self.remove(&filter, true)).boxed()
    }

    fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        options: FindAndModify,
    ) -> BoxFuture<'_, Result<Option<Document>>> {
        ready(self.find_and_modify(&filter, &replacement, options)).boxed()
    }

    fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: FindAndModify,
    ) -> BoxFuture<'_, Result<Option<Document>>> {
        ready(self.find_and_modify(&filter, &update, options)).boxed()
    }

    fn create_index(&self, index: IndexSpec) -> BoxFuture<'_, Result<String>> {
        let mut state = self.state.lock();
        let name = index.resolved_name();

        let result = if state
            .indexes
            .iter()
            .any(|existing| existing.resolved_name() == name)
        {
            Ok(name)
        } else {
            let mut check = State {
                documents: Vec::new(),
                indexes: vec![index.clone()],
            };
            let mut outcome = Ok(());
            for document in &state.documents {
                outcome = self.check_unique(&check, document, None);
                if outcome.is_err() {
                    break;
                }
                check.documents.push(document.clone());
            }
            outcome.map(|()| {
                state.indexes.push(index);
                name
            })
        };
        drop(state);

        ready(result).boxed()
    }

    fn list_index_names(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        let names = std::iter::once("_id_".to_owned())
            .chain(self.state.lock().indexes.iter().map(IndexSpec::resolved_name))
            .collect();

        ready(Ok(names)).boxed()
    }

    fn drop(&self) -> BoxFuture<'_, Result<()>> {
        *self.state.lock() = State::default();
        ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enforces_identity_uniqueness() {
        let collection = client().database("db").collection("foo");

        collection.insert_one(doc! { "_id": 1, "a": 1 }).await.unwrap();
        let error = collection
            .insert_one(doc! { "_id": 1, "a": 2 })
            .await
            .unwrap_err();

        assert!(error.is_duplicate_key());
        assert_eq!(collection.count_documents(doc! {}).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn generates_identity_first() {
        let collection = client().database("db").collection("foo");

        let id = collection.insert_one(doc! { "a": 1 }).await.unwrap();
        let stored = collection.find_one(doc! {}).await.unwrap().unwrap();

        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(stored.keys().next().map(String::as_str), Some("_id"));
        assert_eq!(stored.get("_id"), Some(&id));
    }

    #[tokio::test]
    async fn upsert_takes_identity_from_filter() {
        let collection = client().database("db").collection("foo");

        let outcome = collection
            .replace_one(doc! { "_id": "x" }, doc! { "a": 1 }, true)
            .await
            .unwrap();

        assert_eq!(outcome.upserted_id, Some(Bson::String("x".into())));
        assert_eq!(
            collection.find_one(doc! {}).await.unwrap(),
            Some(doc! { "_id": "x", "a": 1 })
        );
    }

    #[tokio::test]
    async fn unique_indexes_reject_collisions() {
        let collection = client().database("db").collection("foo");
        collection
            .create_index(IndexSpec::new(doc! { "email": 1 }).unique(true))
            .await
            .unwrap();

        collection.insert_one(doc! { "email": "a" }).await.unwrap();
        let error = collection
            .insert_one(doc! { "email": "a" })
            .await
            .unwrap_err();

        assert!(error.is_duplicate_key());
        assert_eq!(
            collection.list_index_names().await.unwrap(),
            vec!["_id_".to_owned(), "email_1".to_owned()]
        );
    }

    #[test]
    fn parses_memory_uris() {
        assert_eq!(
            client_from_uri("memory:///horde_tests")
                .unwrap()
                .default_database_name(),
            Some("horde_tests".into())
        );
        assert_eq!(
            client_from_uri("memory://localhost")
                .unwrap()
                .default_database_name(),
            None
        );
        assert!(client_from_uri("mongodb://localhost").is_err());
    }
}
