//! The `mongodb` driver backend.

use super::{
    Client, ClientBackend, CollectionBackend, CountQuery, DatabaseBackend, DocumentStream,
    FindAndModify, FindQuery, IndexSpec, ReturnDocument, UpdateOutcome,
};
use crate::{Error, Result};
use futures_util::{FutureExt, StreamExt, TryStreamExt, future::BoxFuture};
use mongodb::{
    IndexModel,
    bson::{Bson, Document, doc},
    options::{self, IndexOptions},
};
use std::sync::Arc;

/// Opens a driver client for `uri`. The driver connects lazily, on the first operation.
pub async fn connect(uri: &str) -> Result<Client> {
    let client = mongodb::Client::with_uri_str(uri).await?;

    Ok(MongoClient::wrap(client))
}

pub struct MongoClient {
    client: mongodb::Client,
}

impl MongoClient {
    pub fn wrap(client: mongodb::Client) -> Client {
        Client::from_backend(Self { client })
    }
}

impl ClientBackend for MongoClient {
    fn database(&self, name: &str) -> Arc<dyn DatabaseBackend> {
        Arc::new(MongoDatabase {
            database: self.client.database(name),
        })
    }

    fn default_database_name(&self) -> Option<String> {
        self.client
            .default_database()
            .map(|database| database.name().to_owned())
    }

    fn shutdown(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            self.client.clone().shutdown().await;

            Ok(())
        }
        .boxed()
    }
}

pub struct MongoDatabase {
    database: mongodb::Database,
}

impl DatabaseBackend for MongoDatabase {
    fn name(&self) -> &str {
        self.database.name()
    }

    fn collection(&self, name: &str) -> Arc<dyn CollectionBackend> {
        Arc::new(MongoCollection {
            database: self.database.clone(),
            collection: self.database.collection(name),
        })
    }

    fn list_collection_names(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        async move { Ok(self.database.list_collection_names().await?) }.boxed()
    }

    fn drop(&self) -> BoxFuture<'_, Result<()>> {
        async move { Ok(self.database.drop().await?) }.boxed()
    }
}

pub struct MongoCollection {
    database: mongodb::Database,
    collection: mongodb::Collection<Document>,
}

fn into_index_model(index: IndexSpec) -> IndexModel {
    let options = IndexOptions::builder()
        .name(index.name)
        .unique(index.unique.then_some(true))
        .sparse(index.sparse.then_some(true))
        .background(Some(index.background))
        .build();

    IndexModel::builder()
        .keys(index.keys)
        .options(options)
        .build()
}

fn into_return_document(return_document: ReturnDocument) -> options::ReturnDocument {
    match return_document {
        ReturnDocument::Before => options::ReturnDocument::Before,
        ReturnDocument::After => options::ReturnDocument::After,
    }
}

fn into_outcome(result: mongodb::results::UpdateResult) -> UpdateOutcome {
    UpdateOutcome {
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        upserted_id: result.upserted_id,
    }
}

impl CollectionBackend for MongoCollection {
    fn name(&self) -> &str {
        self.collection.name()
    }

    fn find(&self, query: FindQuery) -> BoxFuture<'_, Result<DocumentStream>> {
        async move {
            let mut find = self.collection.find(query.filter);

            if let Some(projection) = query.projection {
                find = find.projection(projection);
            }

            if let Some(sort) = query.sort {
                find = find.sort(sort);
            }

            if let Some(skip) = query.skip {
                find = find.skip(skip);
            }

            if let Some(limit) = query.limit {
                find = find.limit(limit);
            }

            let cursor = find.await?;

            Ok(cursor.map_err(Error::from).boxed())
        }
        .boxed()
    }

    fn explain(&self, query: FindQuery) -> BoxFuture<'_, Result<Document>> {
        async move {
            let mut find = doc! {
                "find": self.collection.name(),
                "filter": query.filter,
            };

            if let Some(projection) = query.projection {
                find.insert("projection", projection);
            }

            if let Some(sort) = query.sort {
                find.insert("sort", sort);
            }

            if let Some(skip) = query.skip {
                find.insert("skip", i64::try_from(skip).unwrap_or(i64::MAX));
            }

            if let Some(limit) = query.limit {
                find.insert("limit", limit);
            }

            let explanation = self
                .database
                .run_command(doc! { "explain": find })
                .await?;

            Ok(explanation)
        }
        .boxed()
    }

    fn count_documents(&self, query: CountQuery) -> BoxFuture<'_, Result<u64>> {
        async move {
            let mut count = self.collection.count_documents(query.filter);

            if let Some(skip) = query.skip {
                count = count.skip(skip);
            }

            if let Some(limit) = query.limit {
                count = count.limit(limit);
            }

            Ok(count.await?)
        }
        .boxed()
    }

    fn distinct(&self, field: String, filter: Document) -> BoxFuture<'_, Result<Vec<Bson>>> {
        async move { Ok(self.collection.distinct(field, filter).await?) }.boxed()
    }

    fn insert_one(&self, document: Document) -> BoxFuture<'_, Result<Bson>> {
        async move {
            let result = self.collection.insert_one(document).await?;

            Ok(result.inserted_id)
        }
        .boxed()
    }

    fn insert_many(&self, documents: Vec<Document>) -> BoxFuture<'_, Result<Vec<Bson>>> {
        async move {
            let result = self.collection.insert_many(documents).await?;

            let mut inserted = result.inserted_ids.into_iter().collect::<Vec<_>>();
            inserted.sort_by_key(|(position, _)| *position);

            Ok(inserted.into_iter().map(|(_, id)| id).collect())
        }
        .boxed()
    }

    fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
        upsert: bool,
    ) -> BoxFuture<'_, Result<UpdateOutcome>> {
        async move {
            let result = self
                .collection
                .replace_one(filter, replacement)
                .upsert(upsert)
                .await?;

            Ok(into_outcome(result))
        }
        .boxed()
    }

    fn update_one(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> BoxFuture<'_, Result<UpdateOutcome>> {
        async move {
            let result = self
                .collection
                .update_one(filter, update)
                .upsert(upsert)
                .await?;

            Ok(into_outcome(result))
        }
        .boxed()
    }

    fn update_many(
        &self,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> BoxFuture<'_, Result<UpdateOutcome>> {
        async move {
            let result = self
                .collection
                .update_many(filter, update)
                .upsert(upsert)
                .await?;

            Ok(into_outcome(result))
        }
        .boxed()
    }

    fn delete_one(&self, filter: Document) -> BoxFuture<'_, Result<u64>> {
        async move { Ok(self.collection.delete_one(filter).await?.deleted_count) }.boxed()
    }

    fn delete_many(&self, filter: Document) -> BoxFuture<'_, Result<u64>> {
        async move { Ok(self.collection.delete_many(filter).await?.deleted_count) }.boxed()
    }

    fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        options: FindAndModify,
    ) -> BoxFuture<'_, Result<Option<Document>>> {
        async move {
            let document = self
                .collection
                .find_one_and_replace(filter, replacement)
                .return_document(into_return_document(options.return_document))
                .upsert(options.upsert)
                .await?;

            Ok(document)
        }
        .boxed()
    }

    fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: FindAndModify,
    ) -> BoxFuture<'_, Result<Option<Document>>> {
        async move {
            let document = self
                .collection
                .find_one_and_update(filter, update)
                .return_document(into_return_document(options.return_document))
                .upsert(options.upsert)
                .await?;

            Ok(document)
        }
        .boxed()
    }

    fn create_index(&self, index: IndexSpec) -> BoxFuture<'_, Result<String>> {
        async move {
            let result = self
                .collection
                .create_index(into_index_model(index))
                .await?;

            Ok(result.index_name)
        }
        .boxed()
    }

    fn list_index_names(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        async move { Ok(self.collection.list_index_names().await?) }.boxed()
    }

    fn drop(&self) -> BoxFuture<'_, Result<()>> {
        async move { Ok(self.collection.drop().await?) }.boxed()
    }
}
