use super::{Collection, CountQuery, DocumentStream, FindQuery};
use crate::{Error, Result};
use futures_util::TryStreamExt;
use mongodb::bson::{Bson, Document};

enum State {
    Pending,
    Live(DocumentStream),
    Exhausted,
}

/// A lazy query over one collection.
///
/// Shaping operations only edit the pending query; the store is contacted on the
/// first call to [`next`](Self::next). Once iteration started, the query can no longer
/// be shaped and [`Error::CursorUsed`] is returned instead.
pub struct NativeCursor {
    collection: Collection,
    query: FindQuery,
    state: State,
}

impl NativeCursor {
    pub fn new(collection: Collection, query: FindQuery) -> Self {
        Self {
            collection,
            query,
            state: State::Pending,
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn query(&self) -> &FindQuery {
        &self.query
    }

    pub fn filter(&self) -> &Document {
        &self.query.filter
    }

    pub fn started(&self) -> bool {
        !matches!(self.state, State::Pending)
    }

    fn check_okay_to_chain(&self) -> Result<()> {
        if self.started() {
            return Err(Error::CursorUsed);
        }

        Ok(())
    }

    /// A negative limit behaves like its absolute value.
    pub fn limit(&mut self, limit: i64) -> Result<()> {
        self.check_okay_to_chain()?;
        self.query.limit = Some(limit);
        Ok(())
    }

    pub fn skip(&mut self, skip: u64) -> Result<()> {
        self.check_okay_to_chain()?;
        self.query.skip = Some(skip);
        Ok(())
    }

    pub fn sort(&mut self, sort: Document) -> Result<()> {
        self.check_okay_to_chain()?;
        self.query.sort = Some(sort);
        Ok(())
    }

    pub fn projection(&mut self, projection: Document) -> Result<()> {
        self.check_okay_to_chain()?;
        self.query.projection = Some(projection);
        Ok(())
    }

    pub async fn next(&mut self) -> Result<Option<Document>> {
        loop {
            match &mut self.state {
                State::Pending => {
                    let stream = self.collection.execute(self.query.clone()).await?;
                    self.state = State::Live(stream);
                }
                State::Live(stream) => {
                    let document = stream.try_next().await?;
                    if document.is_none() {
                        self.state = State::Exhausted;
                    }
                    return Ok(document);
                }
                State::Exhausted => return Ok(None),
            }
        }
    }

    /// An unevaluated copy of this cursor's query.
    pub fn rewind_clone(&self) -> Self {
        Self::new(self.collection.clone(), self.query.clone())
    }

    /// A one-item clone positioned at `index`, or `None` when `index` is past the limit.
    fn clone_at(&self, index: u64) -> Option<Self> {
        let mut clone = self.rewind_clone();
        if let Some(limit) = clone.query.limit.filter(|limit| *limit != 0) {
            if index >= limit.unsigned_abs() {
                return None;
            }
        }
        clone.query.skip = Some(clone.query.skip.unwrap_or(0) + index);
        clone.query.limit = Some(1);
        Some(clone)
    }

    /// The document at `index` among this cursor's results, fetched through a clone.
    pub fn get(
        &self,
        index: u64,
    ) -> impl Future<Output = Result<Option<Document>>> + Send + use<> {
        let clone = self.check_okay_to_chain().map(|()| self.clone_at(index));

        async move {
            match clone? {
                Some(mut clone) => clone.next().await,
                None => Ok(None),
            }
        }
    }

    /// At most one document, leaving this cursor untouched.
    pub fn first(&self) -> impl Future<Output = Result<Option<Document>>> + Send + use<> {
        self.get(0)
    }

    pub fn count(&self) -> impl Future<Output = Result<u64>> + Send + use<> {
        let collection = self.collection.clone();
        let query = CountQuery {
            filter: self.query.filter.clone(),
            skip: self.query.skip,
            limit: self
                .query
                .limit
                .filter(|limit| *limit != 0)
                .map(i64::unsigned_abs),
        };

        async move { collection.count(query).await }
    }

    pub fn distinct(
        &self,
        field: &str,
    ) -> impl Future<Output = Result<Vec<Bson>>> + Send + use<> {
        let collection = self.collection.clone();
        let field = field.to_owned();
        let filter = self.query.filter.clone();

        async move { collection.distinct(&field, filter).await }
    }

    pub fn explain(&self) -> impl Future<Output = Result<Document>> + Send + use<> {
        let collection = self.collection.clone();
        let query = self.query.clone();

        async move { collection.explain(query).await }
    }
}

impl Clone for NativeCursor {
    fn clone(&self) -> Self {
        self.rewind_clone()
    }
}

impl std::fmt::Debug for NativeCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeCursor")
            .field("collection", &self.collection)
            .field("query", &self.query)
            .field("started", &self.started())
            .finish()
    }
}
