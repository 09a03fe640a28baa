//! Field-name translation at the serialization boundary.
//!
//! Entities keep their fields under Rust-side names. A [`FieldCodec`] rewrites the
//! top-level keys when a document is sent to the store ([`FieldCodec::encode`]) and when
//! a stored document is bound back to an entity ([`FieldCodec::decode`]). Filters and
//! update documents are passed through untouched and must use stored names.

use mongodb::bson::Document;
use std::borrow::Cow;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FieldCodec {
    #[default]
    Identity,
    /// `snake_case` in memory, `camelCase` in the store.
    ///
    /// Only a non-leading `_` followed by a letter starts a new word, so `foo_1` and `_id`
    /// are kept as is. This is not `heck`'s word splitting.
    CamelCase,
}

impl FieldCodec {
    pub fn encode_key(self, key: &str) -> Cow<'_, str> {
        match self {
            Self::Identity => Cow::Borrowed(key),
            Self::CamelCase => Cow::Owned(camelize(key)),
        }
    }

    pub fn decode_key(self, key: &str) -> Cow<'_, str> {
        match self {
            Self::Identity => Cow::Borrowed(key),
            Self::CamelCase => Cow::Owned(uncamelize(key)),
        }
    }

    pub fn encode(self, document: Document) -> Document {
        self.rename(document, Self::encode_key)
    }

    pub fn decode(self, document: Document) -> Document {
        self.rename(document, Self::decode_key)
    }

    fn rename(self, document: Document, key: fn(Self, &str) -> Cow<'_, str>) -> Document {
        if self == Self::Identity {
            return document;
        }

        document
            .into_iter()
            .map(|(field, value)| (key(self, &field).into_owned(), value))
            .collect()
    }
}

/// `foo_bar` → `fooBar`. Keys starting with a double underscore are left alone.
pub fn camelize(key: &str) -> String {
    if key.starts_with("__") {
        return key.to_owned();
    }

    let mut camelized = String::with_capacity(key.len());
    let mut chars = key.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match chars.peek() {
            Some((_, next)) if c == '_' && position > 0 && next.is_ascii_alphabetic() => {
                camelized.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => camelized.push(c),
        }
    }

    camelized
}

/// `fooBar` → `foo_bar`. Runs of capitals are treated as one word: `fooBAR` → `foo_bar`.
pub fn uncamelize(key: &str) -> String {
    if key.starts_with("__") {
        return key.to_owned();
    }

    let mut uncamelized = String::with_capacity(key.len() + 4);
    let mut previous: Option<char> = None;

    for c in key.chars() {
        if c.is_ascii_uppercase() && previous.is_some_and(|previous| !previous.is_ascii_uppercase())
        {
            uncamelized.push('_');
        }
        uncamelized.push(c.to_ascii_lowercase());
        previous = Some(c);
    }

    uncamelized
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn camelizes() {
        assert_eq!(camelize("_id"), "_id");
        assert_eq!(camelize("__dict__"), "__dict__");
        assert_eq!(camelize("foo"), "foo");
        assert_eq!(camelize("foo_bar"), "fooBar");
        assert_eq!(camelize("foo_bar_baz"), "fooBarBaz");
        assert_eq!(camelize("fooBar"), "fooBar");
    }

    #[test]
    fn uncamelizes() {
        assert_eq!(uncamelize("_id"), "_id");
        assert_eq!(uncamelize("__dict__"), "__dict__");
        assert_eq!(uncamelize("foo"), "foo");
        assert_eq!(uncamelize("fooBar"), "foo_bar");
        assert_eq!(uncamelize("fooBAR"), "foo_bar");
        assert_eq!(uncamelize("fooBarBaz"), "foo_bar_baz");
        assert_eq!(uncamelize("foo_bar"), "foo_bar");
    }

    #[test]
    fn codec_rewrites_top_level_keys_only() {
        let document = doc! { "_id": 1, "created_at": { "inner_key": 1 } };

        let encoded = FieldCodec::CamelCase.encode(document.clone());

        assert_eq!(encoded, doc! { "_id": 1, "createdAt": { "inner_key": 1 } });
        assert_eq!(FieldCodec::CamelCase.decode(encoded), document);
        assert_eq!(FieldCodec::Identity.encode(document.clone()), document);
    }
}
