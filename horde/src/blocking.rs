//! Blocking counterparts of the async API.
//!
//! Every call drives the corresponding future to completion on a process-wide
//! multi-threaded runtime, so the contracts are the same. Methods are prefixed with
//! `blocking_` to stay distinguishable from their async siblings when both traits are in
//! scope.
//!
//! Blocking calls must not be made from inside an async context.

use crate::{
    Cursor, Error, Filter, Model, Result, Results, SaveOptions,
    revision::{Revision, RevisionCursor, Versioned},
    store::{IndexSpec, UpdateOutcome},
};
use mongodb::bson::{Bson, Document};
use std::sync::OnceLock;
use tokio::runtime::{Builder, Runtime};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// The runtime blocking calls run on, started on first use.
pub fn runtime() -> Result<&'static Runtime> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .thread_name("horde-blocking")
        .build()
        .map_err(Error::Runtime)?;

    Ok(RUNTIME.get_or_init(|| runtime))
}

pub fn block_on<F: Future<Output = Result<T>>, T>(future: F) -> Result<T> {
    runtime()?.block_on(future)
}

pub trait BlockingModel: Model {
    fn blocking_find(filter: impl Filter) -> Result<BlockingCursor<Self>> {
        Self::find(filter).map(BlockingCursor::from)
    }

    fn blocking_find_view(filter: impl Filter, view: &str) -> Result<BlockingCursor<Document>> {
        Self::find_view(filter, view).map(BlockingCursor::from)
    }

    fn blocking_find_one_view(filter: impl Filter, view: &str) -> Result<Option<Document>> {
        block_on(Self::find_one_view(filter, view))
    }

    fn blocking_find_one(filter: impl Filter) -> Result<Option<Self>> {
        block_on(Self::find_one(filter))
    }

    fn blocking_find_one_and_replace(
        filter: impl Filter,
        replacement: Document,
    ) -> Result<Option<Self>> {
        block_on(Self::find_one_and_replace(filter, replacement))
    }

    fn blocking_find_one_and_update(filter: impl Filter, update: Document) -> Result<Option<Self>> {
        block_on(Self::find_one_and_update(filter, update))
    }

    fn blocking_count_documents(filter: impl Filter) -> Result<u64> {
        block_on(Self::count_documents(filter))
    }

    fn blocking_distinct(field: &str, filter: impl Filter) -> Result<Vec<Bson>> {
        block_on(Self::distinct(field, filter))
    }

    fn blocking_insert_one(document: Document) -> Result<Bson> {
        block_on(Self::insert_one(document))
    }

    fn blocking_insert_many(documents: Vec<Document>) -> Result<Vec<Bson>> {
        block_on(Self::insert_many(documents))
    }

    fn blocking_replace_one(
        filter: impl Filter,
        replacement: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome> {
        block_on(Self::replace_one(filter, replacement, upsert))
    }

    fn blocking_update_one(filter: impl Filter, update: Document) -> Result<UpdateOutcome> {
        block_on(Self::update_one(filter, update))
    }

    fn blocking_update_many(filter: impl Filter, update: Document) -> Result<UpdateOutcome> {
        block_on(Self::update_many(filter, update))
    }

    fn blocking_delete_one(filter: impl Filter) -> Result<u64> {
        block_on(Self::delete_one(filter))
    }

    fn blocking_delete_many(filter: impl Filter) -> Result<u64> {
        block_on(Self::delete_many(filter))
    }

    fn blocking_save(&mut self) -> Result<()> {
        block_on(self.save())
    }

    fn blocking_save_with(&mut self, options: SaveOptions) -> Result<()> {
        block_on(self.save_with(options))
    }

    fn blocking_delete(&self) -> Result<()> {
        block_on(self.delete())
    }

    fn blocking_create_index(spec: IndexSpec) -> Result<String> {
        block_on(Self::create_index(spec))
    }

    fn blocking_create_indexes() -> Result<()> {
        block_on(Self::create_indexes())
    }
}

impl<M: Model> BlockingModel for M {}

pub trait BlockingVersioned: Versioned {
    fn blocking_revisions(&self) -> Result<BlockingRevisionCursor> {
        self.get_revisions().map(BlockingRevisionCursor)
    }

    fn blocking_version_count(&self) -> Result<u64> {
        block_on(self.version_count())
    }

    fn blocking_is_versioned(&self) -> Result<bool> {
        block_on(self.is_versioned())
    }

    fn blocking_revert(&mut self) -> Result<()> {
        block_on(self.revert())
    }
}

impl<M: Versioned> BlockingVersioned for M {}

/// A [`Cursor`] driven to completion on every call. Iterating yields bound items.
#[derive(Debug)]
pub struct BlockingCursor<T>(Cursor<T>);

impl<T> Clone for BlockingCursor<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> From<Cursor<T>> for BlockingCursor<T> {
    fn from(cursor: Cursor<T>) -> Self {
        Self(cursor)
    }
}

impl<T: Send + 'static> BlockingCursor<T> {
    pub fn into_async(self) -> Cursor<T> {
        self.0
    }

    pub fn limit(self, limit: i64) -> Result<Self> {
        self.0.limit(limit).map(Self)
    }

    pub fn skip(self, skip: u64) -> Result<Self> {
        self.0.skip(skip).map(Self)
    }

    pub fn sort(self, sort: Document) -> Result<Self> {
        self.0.sort(sort).map(Self)
    }

    pub fn get(&self, index: i64) -> Result<T> {
        block_on(self.0.get(index))
    }

    pub fn first(&self) -> Result<Option<T>> {
        block_on(self.0.first())
    }

    /// Named apart from [`Iterator::count`], which would drain the cursor.
    pub fn count_documents(&self) -> Result<u64> {
        block_on(self.0.count())
    }

    pub fn distinct(&self, field: &str) -> Result<Vec<Bson>> {
        block_on(self.0.distinct(field))
    }

    pub fn explain(&self) -> Result<Document> {
        block_on(self.0.explain())
    }

    pub fn delete(&self) -> Result<u64> {
        block_on(self.0.delete())
    }

    pub fn to_list(&mut self, length: Option<usize>) -> Result<Results<T>> {
        block_on(self.0.to_list(length))
    }
}

impl<M: Model> BlockingCursor<M> {
    pub fn view(self, name: &str) -> Result<BlockingCursor<Document>> {
        self.0.view(name).map(BlockingCursor)
    }
}

impl<T: Send + 'static> Iterator for BlockingCursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        block_on(self.0.next()).transpose()
    }
}

#[derive(Debug)]
pub struct BlockingRevisionCursor(RevisionCursor);

impl BlockingRevisionCursor {
    /// A negative `index` counts from the latest revision.
    pub fn get(&self, index: i64) -> Result<Revision> {
        block_on(self.0.get(index))
    }

    pub fn count_documents(&self) -> Result<u64> {
        block_on(self.0.count())
    }

    pub fn to_list(&mut self) -> Result<Results<Revision>> {
        block_on(self.0.to_list(None))
    }
}

impl Iterator for BlockingRevisionCursor {
    type Item = Result<Revision>;

    fn next(&mut self) -> Option<Self::Item> {
        block_on(self.0.next()).transpose()
    }
}
