//! The entity base and the CRUD façade.

use crate::{
    Cursor, Filter, ModelConfig, Result,
    codec::FieldCodec,
    registry, resolver,
    revision::{self, Operation, RevisionPolicy},
    store::{Client, Collection, Database, FindAndModify, IndexSpec, UpdateOutcome},
    view::View,
};
use futures_util::{FutureExt, future::BoxFuture};
use mongodb::bson::{self, Bson, Document, doc};
use serde::{Serialize, de::DeserializeOwned};

/// Options of [`Model::save_with`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Insert even when the entity has an identity. A taken identity fails with a
    /// duplicate key error.
    pub force_insert: bool,
    /// Re-read the stored document after writing it.
    pub refresh: bool,
    /// Recorded on the revision, when the type is versioned.
    pub author: Option<String>,
    /// Recorded on the revision instead of `update`. The first revision is always `create`.
    pub operation: Option<Operation>,
}

/// A document type.
///
/// Usually derived on a newtype over [`Document`]:
///
/// ```ignore
/// #[derive(Model)]
/// #[model(table = "people", views(public(name, email)))]
/// struct Person(Document);
/// ```
///
/// Everything that talks to the store resolves the type's collection first, see
/// [`resolver`](crate::resolver).
pub trait Model: Sized + Send + Sync + 'static {
    /// The type name, recorded on revisions and lowercased into the default table name.
    const NAME: &'static str;

    const TABLE_NAME: Option<&'static str> = None;

    const CODEC: FieldCodec = FieldCodec::Identity;

    /// Whether saves and deletes append revisions. Can be changed with
    /// [`Model::set_revision_policy`].
    const VERSIONED: bool = false;

    /// Views known at compile time, as `(name, included fields)`.
    const VIEWS: &'static [(&'static str, &'static [&'static str])] = &[];

    fn from_document(document: Document) -> Self;

    fn document(&self) -> &Document;

    fn document_mut(&mut self) -> &mut Document;

    fn into_document(self) -> Document;

    /// Adjusts the configuration of the type before its first use.
    fn declare(_config: &mut ModelConfig) {}

    /// An entity from a document in its stored form.
    fn decode(document: Document) -> Self {
        Self::from_document(Self::CODEC.decode(document))
    }

    /// The document in its stored form.
    fn encode(&self) -> Document {
        Self::CODEC.encode(self.document().clone())
    }

    /// A literal `id` field wins over `_id`.
    fn id(&self) -> Option<&Bson> {
        let document = self.document();

        document.get("id").or_else(|| document.get("_id"))
    }

    /// Writes `id` to the identity field in use, `_id` unless a literal `id` is present.
    fn set_id(&mut self, id: impl Into<Bson>) {
        let field = if self.document().contains_key("id") {
            "id"
        } else {
            "_id"
        };

        self.document_mut().insert(field, id.into());
    }

    fn get(&self, field: &str) -> Option<&Bson> {
        self.document().get(field)
    }

    fn set(&mut self, field: impl Into<String>, value: impl Into<Bson>) {
        self.document_mut().insert(field.into(), value.into());
    }

    fn unset(&mut self, field: &str) -> Option<Bson> {
        self.document_mut().remove(field)
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(bson::from_document(self.document().clone())?)
    }

    fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::from_document(bson::to_document(value)?))
    }

    fn view(&self, name: &str) -> Result<Document> {
        let view = registry::view::<Self>(name)?;

        Ok(view.project(self.document()))
    }

    fn get_client() -> Result<Client> {
        resolver::resolve_client::<Self>()
    }

    fn get_database() -> Result<Database> {
        resolver::resolve_database::<Self>()
    }

    fn get_collection() -> Result<Collection> {
        resolver::resolve_collection::<Self>()
    }

    fn table_name() -> String {
        resolver::table_name::<Self>()
    }

    fn bind_client(client: Client) {
        registry::rebind::<Self, _>(|config| config.client = Some(client));
    }

    fn bind_database(database: Database) {
        registry::rebind::<Self, _>(|config| config.database = Some(database));
    }

    fn bind_collection(collection: Collection) {
        registry::rebind::<Self, _>(|config| config.collection = Some(collection));
    }

    fn set_database_name(name: impl Into<String>) {
        registry::rebind::<Self, _>(|config| config.database_name = Some(name.into()));
    }

    fn set_table_name(name: impl Into<String>) {
        registry::rebind::<Self, _>(|config| config.table_name = Some(name.into()));
    }

    fn add_view(name: impl Into<String>, view: View) {
        registry::with::<Self, _>(|config| config.views.insert(name.into(), view));
    }

    fn set_revision_policy(policy: RevisionPolicy) {
        registry::with::<Self, _>(|config| config.revisions = policy);
    }

    fn revision_policy() -> RevisionPolicy {
        registry::with::<Self, _>(|config| config.revisions)
    }

    fn find(filter: impl Filter) -> Result<Cursor<Self>> {
        let collection = Self::get_collection()?;

        Ok(Cursor::new(collection.find(filter.to_document())))
    }

    fn find_view(filter: impl Filter, view: &str) -> Result<Cursor<Document>> {
        Self::find(filter)?.view(view)
    }

    /// The first matching document, projected through the view registered as `view`.
    fn find_one_view(
        filter: impl Filter,
        view: &str,
    ) -> BoxFuture<'static, Result<Option<Document>>> {
        let cursor = Self::find_view(filter, view);

        async move { cursor?.first().await }.boxed()
    }

    fn find_one<'a>(filter: impl Filter + 'a) -> BoxFuture<'a, Result<Option<Self>>> {
        async move {
            let collection = Self::get_collection()?;

            let document = collection.find_one(filter.to_document()).await?;

            Ok(document.map(Self::decode))
        }
        .boxed()
    }

    fn find_one_and_replace<'a>(
        filter: impl Filter + 'a,
        replacement: Document,
    ) -> BoxFuture<'a, Result<Option<Self>>> {
        async move {
            let collection = Self::get_collection()?;

            let document = collection
                .find_one_and_replace(
                    filter.to_document(),
                    replacement,
                    FindAndModify::default(),
                )
                .await?;

            Ok(document.map(Self::decode))
        }
        .boxed()
    }

    fn find_one_and_update<'a>(
        filter: impl Filter + 'a,
        update: Document,
    ) -> BoxFuture<'a, Result<Option<Self>>> {
        async move {
            let collection = Self::get_collection()?;

            let document = collection
                .find_one_and_update(filter.to_document(), update, FindAndModify::default())
                .await?;

            Ok(document.map(Self::decode))
        }
        .boxed()
    }

    fn count_documents<'a>(filter: impl Filter + 'a) -> BoxFuture<'a, Result<u64>> {
        async move {
            let collection = Self::get_collection()?;

            collection.count_documents(filter.to_document()).await
        }
        .boxed()
    }

    #[deprecated(note = "use `count_documents`")]
    fn count<'a>(filter: impl Filter + 'a) -> BoxFuture<'a, Result<u64>> {
        tracing::warn!(model = Self::NAME, "`count` is deprecated, use `count_documents`");

        Self::count_documents(filter)
    }

    fn distinct<'a>(field: &'a str, filter: impl Filter + 'a) -> BoxFuture<'a, Result<Vec<Bson>>> {
        async move {
            let collection = Self::get_collection()?;

            collection.distinct(field, filter.to_document()).await
        }
        .boxed()
    }

    /// Returns the identity of the inserted document.
    fn insert_one(document: Document) -> BoxFuture<'static, Result<Bson>> {
        async move {
            let collection = Self::get_collection()?;

            collection.insert_one(document).await
        }
        .boxed()
    }

    fn insert_many(documents: Vec<Document>) -> BoxFuture<'static, Result<Vec<Bson>>> {
        async move {
            let collection = Self::get_collection()?;

            collection.insert_many(documents).await
        }
        .boxed()
    }

    fn replace_one<'a>(
        filter: impl Filter + 'a,
        replacement: Document,
        upsert: bool,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        async move {
            let collection = Self::get_collection()?;

            collection
                .replace_one(filter.to_document(), replacement, upsert)
                .await
        }
        .boxed()
    }

    fn update_one<'a>(
        filter: impl Filter + 'a,
        update: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        async move {
            let collection = Self::get_collection()?;

            collection
                .update_one(filter.to_document(), update, false)
                .await
        }
        .boxed()
    }

    fn update_many<'a>(
        filter: impl Filter + 'a,
        update: Document,
    ) -> BoxFuture<'a, Result<UpdateOutcome>> {
        async move {
            let collection = Self::get_collection()?;

            collection
                .update_many(filter.to_document(), update, false)
                .await
        }
        .boxed()
    }

    fn delete_one<'a>(filter: impl Filter + 'a) -> BoxFuture<'a, Result<u64>> {
        async move {
            let collection = Self::get_collection()?;

            collection.delete_one(filter.to_document()).await
        }
        .boxed()
    }

    fn delete_many<'a>(filter: impl Filter + 'a) -> BoxFuture<'a, Result<u64>> {
        async move {
            let collection = Self::get_collection()?;

            collection.delete_many(filter.to_document()).await
        }
        .boxed()
    }

    fn save(&mut self) -> BoxFuture<'_, Result<()>> {
        self.save_with(SaveOptions::default())
    }

    /// Upserts by identity, or inserts when there is none (or `force_insert` is set).
    /// An identity generated by the store is written back.
    fn save_with(&mut self, options: SaveOptions) -> BoxFuture<'_, Result<()>> {
        persist(self, options).boxed()
    }

    /// Deletes the stored document. Deleting twice, or deleting an entity that was never
    /// saved, is not an error.
    fn delete(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            let Some(id) = self.id().cloned() else {
                return Ok(());
            };

            let collection = Self::get_collection()?;

            collection.delete_one(doc! { "_id": id }).await?;

            revision::record_delete(self).await
        }
        .boxed()
    }

    /// Registers an index for [`create_indexes`](Model::create_indexes).
    fn add_index(spec: IndexSpec) {
        registry::with::<Self, _>(|config| {
            config.index(spec);
        });
    }

    /// Registers an index and creates it right away.
    fn create_index(spec: IndexSpec) -> BoxFuture<'static, Result<String>> {
        async move {
            let collection = Self::get_collection()?;

            let name = collection.create_index(spec.clone()).await?;

            registry::with::<Self, _>(|config| {
                config.index(spec);
                mark_created(config, &name);
            });

            Ok(name)
        }
        .boxed()
    }

    /// Creates the registered indexes that were not created yet.
    fn create_indexes() -> BoxFuture<'static, Result<()>> {
        async move {
            let pending = registry::with::<Self, _>(|config| {
                config
                    .indexes
                    .iter()
                    .filter(|index| !index.created)
                    .map(|index| index.spec.clone())
                    .collect::<Vec<_>>()
            });

            if pending.is_empty() {
                return Ok(());
            }

            let collection = Self::get_collection()?;

            for spec in pending {
                let name = collection.create_index(spec).await?;

                tracing::debug!(
                    model = Self::NAME,
                    namespace = %collection.namespace(),
                    index = %name,
                    "created index"
                );

                registry::with::<Self, _>(|config| mark_created(config, &name));
            }

            Ok(())
        }
        .boxed()
    }
}

pub(crate) async fn persist<M: Model>(model: &mut M, options: SaveOptions) -> Result<()> {
    let collection = M::get_collection()?;
    let document = model.encode();

    match model.id().cloned() {
        Some(id) if !options.force_insert => {
            collection
                .replace_one(doc! { "_id": id }, document, true)
                .await?;
        }
        _ => {
            let id = collection.insert_one(document).await?;

            if !model.document().contains_key("_id") {
                model.document_mut().insert("_id", id);
            }
        }
    }

    if options.refresh {
        let stored_id = model.document().get("_id").or_else(|| model.id()).cloned();
        if let Some(id) = stored_id {
            if let Some(stored) = collection.find_one(doc! { "_id": id }).await? {
                *model.document_mut() = M::CODEC.decode(stored);
            }
        }
    }

    revision::record_save(&*model, options.operation, options.author).await
}

fn mark_created(config: &mut ModelConfig, name: &str) {
    for index in &mut config.indexes {
        if index.spec.resolved_name() == name {
            index.created = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory;

    struct Thing(Document);

    impl Model for Thing {
        const NAME: &'static str = "Thing";

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
    }

    #[test]
    fn identity_prefers_literal_id() {
        let mut thing = Thing::from_document(doc! { "_id": 1 });
        assert_eq!(thing.id(), Some(&Bson::Int32(1)));

        thing.set_id(2);
        assert_eq!(thing.document(), &doc! { "_id": 2 });

        let mut thing = Thing::from_document(doc! { "id": "a", "_id": "b" });
        assert_eq!(thing.id(), Some(&Bson::from("a")));

        thing.set_id("c");
        assert_eq!(thing.document(), &doc! { "id": "c", "_id": "b" });

        let mut thing = Thing::from_document(doc! {});
        assert_eq!(thing.id(), None);

        thing.set_id("d");
        assert_eq!(thing.document(), &doc! { "_id": "d" });
    }

    #[tokio::test]
    async fn save_inserts_then_upserts() {
        Thing::bind_database(memory::client().database("model"));

        let mut thing = Thing::from_document(doc! { "bar": "baz" });
        thing.save().await.unwrap();

        let id = thing.id().cloned().unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));

        thing.set("bar", "qux");
        thing.save().await.unwrap();

        assert_eq!(Thing::count_documents(()).await.unwrap(), 1);

        let stored = Thing::find_one(id).await.unwrap().unwrap();
        assert_eq!(stored.get("bar"), Some(&Bson::from("qux")));

        let error = thing
            .save_with(SaveOptions {
                force_insert: true,
                ..SaveOptions::default()
            })
            .await
            .unwrap_err();
        assert!(error.is_duplicate_key());

        thing.delete().await.unwrap();
        thing.delete().await.unwrap();
        assert_eq!(Thing::count_documents(()).await.unwrap(), 0);
    }
}
