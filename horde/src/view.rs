use mongodb::bson::{Bson, Document};

/// The name [`Cursor::view`](crate::Cursor::view) and
/// [`Results::distinct`](crate::Results::distinct) fall back to.
pub const DEFAULT_VIEW: &str = "defaults";

/// A named projection of an entity's document.
///
/// A view starts either from every field of the document (`defaults`) or from none,
/// then adds the `include` fields (a missing field projects to `null`) and finally drops
/// the `exclude` fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct View {
    defaults: bool,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl View {
    /// Every field of the document.
    pub fn defaults() -> Self {
        Self {
            defaults: true,
            ..Self::default()
        }
    }

    /// Only the listed fields.
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            defaults: false,
            include: fields.into_iter().map(Into::into).collect(),
            exclude: vec![],
        }
    }

    pub fn and_include(mut self, field: impl Into<String>) -> Self {
        self.include.push(field.into());
        self
    }

    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.exclude.push(field.into());
        self
    }

    pub fn project(&self, document: &Document) -> Document {
        let mut projected = if self.defaults {
            document.clone()
        } else {
            Document::new()
        };

        for field in &self.include {
            let value = document.get(field).cloned().unwrap_or(Bson::Null);
            projected.insert(field.clone(), value);
        }

        for field in &self.exclude {
            projected.remove(field);
        }

        projected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn projects_fields() {
        let document = doc! { "_id": 1, "name": "kit", "password": "hunter2" };

        assert_eq!(View::defaults().project(&document), document);
        assert_eq!(
            View::defaults().exclude("password").project(&document),
            doc! { "_id": 1, "name": "kit" }
        );
        assert_eq!(
            View::include(["name", "email"]).project(&document),
            doc! { "name": "kit", "email": null }
        );
        assert_eq!(
            View::include(["name"]).and_include("_id").project(&document),
            doc! { "name": "kit", "_id": 1 }
        );
    }
}
