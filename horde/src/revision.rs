//! Append-only revision history.
//!
//! When a type's [`RevisionPolicy`] is enabled, every save appends a [`Revision`] holding
//! a snapshot of the stored document, and every delete appends one without a snapshot.
//! Revisions are keyed by `(document_id, document_type)` and never modified.

use crate::{
    Cursor, Error, Model, ModelConfig, Result, SaveOptions,
    model,
    resolver,
    store::{Collection, IndexSpec},
};
use chrono::{DateTime, Utc};
use futures_util::{FutureExt, future::BoxFuture};
use mongodb::bson::{self, Bson, Document, doc};
use std::{
    fmt,
    ops::{Deref, DerefMut},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(operation: &str) -> Option<Self> {
        match operation {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a type records revisions, and where.
#[derive(Clone, Copy, Debug)]
pub struct RevisionPolicy {
    pub enabled: bool,
    /// The collection revisions are appended to.
    pub store: fn() -> Result<Collection>,
}

impl RevisionPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            store: resolver::resolve_collection::<Revision>,
        }
    }

    /// Records into the collection of [`Revision`].
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::disabled()
        }
    }

    /// Records into the collection of `R`.
    pub fn stored_in<R: Model>() -> Self {
        Self {
            enabled: true,
            store: resolver::resolve_collection::<R>,
        }
    }
}

impl Default for RevisionPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// One entry of a document's history.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Revision(Document);

impl Revision {
    pub fn new(
        document_id: Bson,
        document_type: &str,
        operation: Operation,
        document: Option<Document>,
        author: Option<String>,
    ) -> Self {
        let mut revision = doc! {
            "document_id": document_id,
            "document_type": document_type,
            "operation": operation.as_str(),
        };

        if let Some(document) = document {
            revision.insert("document", document);
        }

        if let Some(author) = author {
            revision.insert("author", author);
        }

        let mut revision = Self(revision);
        revision.stamp();
        revision
    }

    fn stamp(&mut self) {
        self.0.insert(
            "creation_date",
            bson::DateTime::from_millis(Utc::now().timestamp_millis()),
        );
    }

    pub fn document_id(&self) -> Option<&Bson> {
        self.0.get("document_id")
    }

    pub fn document_type(&self) -> Option<&str> {
        self.0.get_str("document_type").ok()
    }

    pub fn operation(&self) -> Option<Operation> {
        self.0.get_str("operation").ok().and_then(Operation::parse)
    }

    /// The stored document. Delete revisions have none.
    pub fn snapshot(&self) -> Option<&Document> {
        self.0.get_document("document").ok()
    }

    pub fn author(&self) -> Option<&str> {
        self.0.get_str("author").ok()
    }

    pub fn creation_date(&self) -> Option<DateTime<Utc>> {
        let date = self.0.get_datetime("creation_date").ok()?;

        DateTime::from_timestamp_millis(date.timestamp_millis())
    }
}

impl Model for Revision {
    const NAME: &'static str = "Revision";

    fn from_document(document: Document) -> Self {
        Self(document)
    }

    fn document(&self) -> &Document {
        &self.0
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.0
    }

    fn into_document(self) -> Document {
        self.0
    }

    fn declare(config: &mut ModelConfig) {
        config.index(IndexSpec::new(doc! { "document_id": -1, "document_type": -1 }));
    }

    /// Stamps `creation_date`, then saves.
    fn save_with(&mut self, options: SaveOptions) -> BoxFuture<'_, Result<()>> {
        self.stamp();

        model::persist(self, options).boxed()
    }
}

crate::__register_model!(Revision);

fn history_filter<M: Model>(model: &M) -> Document {
    doc! {
        "document_id": model.id().cloned().unwrap_or(Bson::Null),
        "document_type": M::NAME,
    }
}

pub(crate) async fn record_save<M: Model>(
    model: &M,
    operation: Option<Operation>,
    author: Option<String>,
) -> Result<()> {
    let policy = M::revision_policy();

    let Some(id) = model.id().cloned().filter(|_| policy.enabled) else {
        return Ok(());
    };

    let store = (policy.store)()?;

    let operation = if store.exists(history_filter(model)).await? {
        operation.unwrap_or(Operation::Update)
    } else {
        Operation::Create
    };

    let revision = Revision::new(id, M::NAME, operation, Some(model.encode()), author);

    store.insert_one(revision.into_document()).await?;

    tracing::debug!(model = M::NAME, %operation, "recorded revision");

    Ok(())
}

pub(crate) async fn record_delete<M: Model>(model: &M) -> Result<()> {
    let policy = M::revision_policy();

    let Some(id) = model.id().cloned().filter(|_| policy.enabled) else {
        return Ok(());
    };

    let store = (policy.store)()?;

    let revision = Revision::new(id, M::NAME, Operation::Delete, None, None);

    store.insert_one(revision.into_document()).await?;

    tracing::debug!(model = M::NAME, operation = %Operation::Delete, "recorded revision");

    Ok(())
}

/// A cursor over one document's revisions, oldest first.
///
/// Negative indices count from the end: `get(-1)` is the latest revision.
pub struct RevisionCursor {
    cursor: Cursor<Revision>,
}

impl RevisionCursor {
    /// Resolves a negative `index` against the current number of revisions.
    pub fn get(
        &self,
        index: i64,
    ) -> impl Future<Output = Result<Revision>> + Send + use<> {
        let count = self.cursor.count();
        let cursor = self.cursor.clone();

        async move {
            let index = if index < 0 {
                let count = i64::try_from(count.await?).unwrap_or(i64::MAX);

                let translated = count + index;
                if translated < 0 {
                    return Err(Error::IndexOutOfRange(index));
                }

                translated
            } else {
                index
            };

            cursor.get(index).await
        }
    }

    pub fn into_inner(self) -> Cursor<Revision> {
        self.cursor
    }
}

impl Deref for RevisionCursor {
    type Target = Cursor<Revision>;

    fn deref(&self) -> &Self::Target {
        &self.cursor
    }
}

impl DerefMut for RevisionCursor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.cursor
    }
}

impl fmt::Debug for RevisionCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RevisionCursor").field(&self.cursor).finish()
    }
}

/// History access for any model. Only meaningful when the type records revisions.
pub trait Versioned: Model {
    /// Revisions of this document, oldest first.
    fn get_revisions(&self) -> Result<RevisionCursor> {
        let store = (Self::revision_policy().store)()?;

        let cursor = Cursor::new(store.find(history_filter(self))).sort(doc! { "_id": 1 })?;

        Ok(RevisionCursor { cursor })
    }

    fn revisions(&self) -> Result<RevisionCursor> {
        self.get_revisions()
    }

    /// `0` for a document without identity.
    fn version_count(&self) -> BoxFuture<'_, Result<u64>> {
        async move {
            if self.id().is_none() {
                return Ok(0);
            }

            let store = (Self::revision_policy().store)()?;

            store.count_documents(history_filter(self)).await
        }
        .boxed()
    }

    /// Whether any revision exists, checked without counting them all.
    fn is_versioned(&self) -> BoxFuture<'_, Result<bool>> {
        async move {
            if self.id().is_none() {
                return Ok(false);
            }

            let store = (Self::revision_policy().store)()?;

            store.exists(history_filter(self)).await
        }
        .boxed()
    }

    #[deprecated(note = "use `version_count`")]
    fn version(&self) -> BoxFuture<'_, Result<u64>> {
        tracing::warn!(model = Self::NAME, "`version` is deprecated, use `version_count`");

        self.version_count()
    }

    #[deprecated(note = "use `is_versioned`")]
    fn versioned(&self) -> BoxFuture<'_, Result<bool>> {
        tracing::warn!(model = Self::NAME, "`versioned` is deprecated, use `is_versioned`");

        self.is_versioned()
    }

    /// Steps back one revision and saves.
    ///
    /// With fewer than two revisions the document is reset to its identity alone,
    /// otherwise to the snapshot of the second most recent revision. The save records a
    /// revision of its own, so a second revert undoes the first. A document without
    /// identity is left untouched.
    fn revert(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            let Some(id) = self.id().cloned() else {
                return Ok(());
            };

            let store = (Self::revision_policy().store)()?;

            let mut cursor = Cursor::<Revision>::new(store.find(history_filter(&*self)))
                .sort(doc! { "_id": -1 })?
                .limit(2)?;
            let latest = cursor.to_list(Some(2)).await?;

            let snapshot = match &*latest {
                [_, previous] => previous
                    .snapshot()
                    .cloned()
                    .map(|document| Self::CODEC.decode(document)),
                _ => None,
            };

            let document = snapshot.unwrap_or_else(|| {
                let field = if self.document().contains_key("id") {
                    "id"
                } else {
                    "_id"
                };

                doc! { field: id }
            });

            *self.document_mut() = document;

            self.save().await
        }
        .boxed()
    }
}

impl<M: Model> Versioned for M {}
