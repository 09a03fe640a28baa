use crate::{Error, Model, Result, registry, view::DEFAULT_VIEW};
use mongodb::bson::{Bson, Document};
use std::{borrow::Cow, ops::Deref};

/// Something [`Results`] can read fields from and project through views.
pub trait Projectable {
    /// The fields `distinct` looks at.
    fn projection(&self) -> Cow<'_, Document>;

    fn project(&self, view: &str) -> Result<Document>;
}

/// Raw documents have no views.
impl Projectable for Document {
    fn projection(&self) -> Cow<'_, Document> {
        Cow::Borrowed(self)
    }

    fn project(&self, _view: &str) -> Result<Document> {
        Err(Error::NotViewable)
    }
}

impl<M: Model> Projectable for M {
    fn projection(&self) -> Cow<'_, Document> {
        match registry::view::<M>(DEFAULT_VIEW) {
            Ok(view) => Cow::Owned(view.project(self.document())),
            Err(_) => Cow::Borrowed(self.document()),
        }
    }

    fn project(&self, view: &str) -> Result<Document> {
        self.view(view)
    }
}

/// An ordered list of bound items.
#[derive(Clone, Debug, PartialEq)]
pub struct Results<T>(Vec<T>);

impl<T> Results<T> {
    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

impl<T: Projectable> Results<T> {
    /// The values of `field` over every item, in first-seen order without duplicates.
    ///
    /// Array values contribute their elements (one level deep). A missing field counts as
    /// `null`.
    pub fn distinct(&self, field: &str) -> Vec<Bson> {
        let mut values = vec![];

        let mut push = |value: Bson| {
            if !values.contains(&value) {
                values.push(value);
            }
        };

        for item in &self.0 {
            match item.projection().get(field).cloned().unwrap_or(Bson::Null) {
                Bson::Array(elements) => elements.into_iter().for_each(&mut push),
                value => push(value),
            }
        }

        values
    }

    /// Every item projected through the view registered under `name`.
    pub fn view(&self, name: &str) -> Result<Results<Document>> {
        self.0.iter().map(|item| item.project(name)).collect()
    }
}

impl<T> Deref for Results<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> From<Vec<T>> for Results<T> {
    fn from(items: Vec<T>) -> Self {
        Self(items)
    }
}

impl<T> FromIterator<T> for Results<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for Results<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Results<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn distinct_flattens_one_level() {
        let results = Results::from(vec![
            doc! { "tags": ["a", "b"] },
            doc! { "tags": "b" },
            doc! { "tags": [["c"], "a"] },
            doc! {},
            doc! { "tags": null },
        ]);

        assert_eq!(
            results.distinct("tags"),
            vec![
                Bson::from("a"),
                Bson::from("b"),
                Bson::Array(vec![Bson::from("c")]),
                Bson::Null,
            ]
        );
    }

    #[test]
    fn raw_documents_are_not_viewable() {
        let results = Results::from(vec![doc! { "a": 1 }]);

        assert!(matches!(results.view("defaults"), Err(Error::NotViewable)));
    }
}
