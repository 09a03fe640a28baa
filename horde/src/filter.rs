//! Conversions of query arguments into filter documents.
//!
//! Everything that is not already a document is treated as an identity and rewritten to
//! `{ _id: value }`, so `Model::find_one(id)` works as well as
//! `Model::find_one(doc! { "name": "kit" })`.

use mongodb::bson::{Bson, Document, doc, oid::ObjectId};

pub trait Filter: Send {
    fn to_document(&self) -> Document;
}

fn by_identity(id: impl Into<Bson>) -> Document {
    doc! { "_id": id.into() }
}

impl Filter for Document {
    fn to_document(&self) -> Document {
        self.clone()
    }
}

impl Filter for Bson {
    fn to_document(&self) -> Document {
        match self {
            Bson::Document(document) => document.clone(),
            Bson::Null => Document::new(),
            id => by_identity(id.clone()),
        }
    }
}

impl Filter for ObjectId {
    fn to_document(&self) -> Document {
        by_identity(*self)
    }
}

impl Filter for &str {
    fn to_document(&self) -> Document {
        by_identity(*self)
    }
}

impl Filter for String {
    fn to_document(&self) -> Document {
        by_identity(self.as_str())
    }
}

impl Filter for i32 {
    fn to_document(&self) -> Document {
        by_identity(*self)
    }
}

impl Filter for i64 {
    fn to_document(&self) -> Document {
        by_identity(*self)
    }
}

/// `None` matches everything.
impl<F: Filter> Filter for Option<F> {
    fn to_document(&self) -> Document {
        self.as_ref().map(Filter::to_document).unwrap_or_default()
    }
}

/// Matches everything.
impl Filter for () {
    fn to_document(&self) -> Document {
        Document::new()
    }
}

impl<F: Filter + Sync> Filter for &F {
    fn to_document(&self) -> Document {
        (**self).to_document()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterById(Bson);

pub fn by_id(id: impl Into<Bson>) -> FilterById {
    FilterById(id.into())
}

impl Filter for FilterById {
    fn to_document(&self) -> Document {
        by_identity(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_documents_become_identity_filters() {
        let id = ObjectId::new();

        assert_eq!(id.to_document(), doc! { "_id": id });
        assert_eq!("foo".to_document(), doc! { "_id": "foo" });
        assert_eq!(42_i64.to_document(), doc! { "_id": 42_i64 });
        assert_eq!(by_id(7).to_document(), doc! { "_id": 7 });
        assert_eq!(Bson::from("bar").to_document(), doc! { "_id": "bar" });
    }

    #[test]
    fn documents_pass_through() {
        let filter = doc! { "name": "kit" };

        assert_eq!(filter.to_document(), filter);
        assert_eq!(Bson::Document(filter.clone()).to_document(), filter);
        assert_eq!(Some(filter.clone()).to_document(), filter);
        assert_eq!(None::<Document>.to_document(), doc! {});
        assert_eq!(().to_document(), doc! {});
    }
}
