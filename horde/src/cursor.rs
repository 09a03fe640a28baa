use crate::{
    Error, Model, Result, Results,
    registry,
    store::NativeCursor,
    view::View,
};
use futures_util::{
    StreamExt,
    stream::{self, BoxStream},
};
use mongodb::bson::{Bson, Document, doc};
use std::{fmt, sync::Arc};

type Binder<T> = Arc<dyn Fn(Document) -> Result<T> + Send + Sync>;

/// A lazy query whose items are bound before they are handed out.
///
/// A `Cursor<M>` yields entities of `M`, a `Cursor<Document>` yields either raw stored
/// documents ([`Cursor::raw`]) or view projections ([`Cursor::view`]). Shaping methods
/// consume and return the cursor; they fail with [`Error::CursorUsed`] once iteration
/// started.
pub struct Cursor<T> {
    native: NativeCursor,
    binder: Binder<T>,
}

impl Cursor<Document> {
    /// Yields stored documents as they are.
    pub fn raw(native: NativeCursor) -> Self {
        Self::with_binder(native, Ok)
    }
}

impl<M: Model> Cursor<M> {
    pub fn new(native: NativeCursor) -> Self {
        Self::with_binder(native, |document| Ok(M::decode(document)))
    }

    /// Projects every entity through the view registered under `name`.
    pub fn view(self, name: &str) -> Result<Cursor<Document>> {
        let view = registry::view::<M>(name)?;

        Ok(self.with_view(view))
    }

    pub fn with_view(self, view: View) -> Cursor<Document> {
        let binder = self.binder;

        Cursor::with_binder(self.native, move |document| {
            let entity = binder(document)?;

            Ok(view.project(entity.document()))
        })
    }
}

impl<T: Send + 'static> Cursor<T> {
    pub fn with_binder(
        native: NativeCursor,
        binder: impl Fn(Document) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            native,
            binder: Arc::new(binder),
        }
    }

    pub fn native(&self) -> &NativeCursor {
        &self.native
    }

    pub fn into_native(self) -> NativeCursor {
        self.native
    }

    pub fn bind(&self, document: Document) -> Result<T> {
        (self.binder)(document)
    }

    pub fn limit(mut self, limit: i64) -> Result<Self> {
        self.native.limit(limit)?;
        Ok(self)
    }

    pub fn skip(mut self, skip: u64) -> Result<Self> {
        self.native.skip(skip)?;
        Ok(self)
    }

    pub fn sort(mut self, sort: Document) -> Result<Self> {
        self.native.sort(sort)?;
        Ok(self)
    }

    pub async fn next(&mut self) -> Result<Option<T>> {
        let document = self.native.next().await?;

        document.map(|document| self.bind(document)).transpose()
    }

    /// The item at `index`, fetched through a clone of this cursor.
    ///
    /// Fails with [`Error::IndexOutOfRange`] for negative indices and for indices past the
    /// last item.
    pub fn get(&self, index: i64) -> impl Future<Output = Result<T>> + Send + use<T> {
        let binder = self.binder.clone();
        let fetch = u64::try_from(index)
            .map_err(|_| Error::IndexOutOfRange(index))
            .map(|index| self.native.get(index));

        async move {
            let document = fetch?.await?.ok_or(Error::IndexOutOfRange(index))?;

            binder(document)
        }
    }

    /// At most one item, leaving this cursor untouched.
    pub fn first(&self) -> impl Future<Output = Result<Option<T>>> + Send + use<T> {
        let binder = self.binder.clone();
        let fetch = self.native.first();

        async move {
            let document = fetch.await?;

            document.map(|document| binder(document)).transpose()
        }
    }

    /// The number of documents this cursor would yield.
    pub fn count(&self) -> impl Future<Output = Result<u64>> + Send + use<T> {
        self.native.count()
    }

    /// Distinct stored values of `field` among the documents matching the filter.
    pub fn distinct(&self, field: &str) -> impl Future<Output = Result<Vec<Bson>>> + Send + use<T> {
        self.native.distinct(field)
    }

    pub fn explain(&self) -> impl Future<Output = Result<Document>> + Send + use<T> {
        self.native.explain()
    }

    /// Deletes every document matching the filter, ignoring skip and limit.
    pub fn delete(&self) -> impl Future<Output = Result<u64>> + Send + use<T> {
        let collection = self.native.collection().clone();
        let ids = self.native.distinct("_id");

        async move {
            let ids = ids.await?;

            collection
                .delete_many(doc! { "_id": { "$in": ids } })
                .await
        }
    }

    /// Up to `length` remaining items, or all of them.
    pub async fn to_list(&mut self, length: Option<usize>) -> Result<Results<T>> {
        let mut items = vec![];

        while length.is_none_or(|length| items.len() < length) {
            let Some(item) = self.next().await? else {
                break;
            };

            items.push(item);
        }

        Ok(Results::from(items))
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<T>> {
        stream::try_unfold(self, |mut cursor| async move {
            let item = cursor.next().await?;

            Ok(item.map(|item| (item, cursor)))
        })
        .boxed()
    }
}

impl<T> Clone for Cursor<T> {
    fn clone(&self) -> Self {
        Self {
            native: self.native.clone(),
            binder: self.binder.clone(),
        }
    }
}

impl<T> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("native", &self.native)
            .finish_non_exhaustive()
    }
}
