//! Update operators for the in-memory backend.

use super::query;
use crate::{Error, Result};
use mongodb::bson::{Bson, Document};

pub fn is_operator_update(update: &Document) -> bool {
    update.keys().next().is_some_and(|key| key.starts_with('$'))
}

/// Applies `$`-operators to `document`. Returns whether anything changed.
pub fn apply(document: &mut Document, update: &Document, inserting: bool) -> Result<bool> {
    let before = document.clone();

    for (operator, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(Error::UnsupportedOperator(format!(
                "{operator} without a document"
            )));
        };

        match operator.as_str() {
            "$set" => {
                for (path, value) in fields {
                    set_path(document, path, value.clone());
                }
            }
            "$setOnInsert" => {
                if inserting {
                    for (path, value) in fields {
                        set_path(document, path, value.clone());
                    }
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    remove_path(document, path);
                }
            }
            "$inc" => {
                for (path, amount) in fields {
                    let current = query::lookup(document, path).cloned();
                    set_path(document, path, increment(current.as_ref(), amount)?);
                }
            }
            "$push" => {
                for (path, value) in fields {
                    let items = match value {
                        Bson::Document(modifiers) if modifiers.contains_key("$each") => {
                            match modifiers.get("$each") {
                                Some(Bson::Array(items)) => items.clone(),
                                _ => {
                                    return Err(Error::UnsupportedOperator(
                                        "$each without an array".into(),
                                    ));
                                }
                            }
                        }
                        value => vec![value.clone()],
                    };
                    let mut array = match query::lookup(document, path) {
                        Some(Bson::Array(existing)) => existing.clone(),
                        None => vec![],
                        Some(_) => {
                            return Err(Error::UnsupportedOperator(format!(
                                "$push to non-array field `{path}`"
                            )));
                        }
                    };
                    array.extend(items);
                    set_path(document, path, Bson::Array(array));
                }
            }
            other => return Err(Error::UnsupportedOperator(other.to_owned())),
        }
    }

    Ok(*document != before)
}

fn increment(current: Option<&Bson>, amount: &Bson) -> Result<Bson> {
    let value = match (current.unwrap_or(&Bson::Int32(0)), amount) {
        (Bson::Int32(a), Bson::Int32(b)) => Bson::Int32(a + b),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(i64::from(*a) + b),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a + i64::from(*b)),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a + b),
        (Bson::Double(a), Bson::Double(b)) => Bson::Double(a + b),
        (Bson::Double(a), Bson::Int32(b)) => Bson::Double(a + f64::from(*b)),
        (Bson::Int32(a), Bson::Double(b)) => Bson::Double(f64::from(*a) + b),
        _ => return Err(Error::UnsupportedOperator("$inc on a non-numeric value".into())),
    };

    Ok(value)
}

pub fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

pub fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

/// The document an upsert starts from: plain equality clauses of the filter.
pub fn seed_from_filter(filter: &Document) -> Document {
    let mut seed = Document::new();

    for (path, condition) in filter {
        if path.starts_with('$') {
            continue;
        }
        match condition {
            Bson::Document(inner) if inner.keys().any(|key| key.starts_with('$')) => {
                if let Some(value) = inner.get("$eq") {
                    set_path(&mut seed, path, value.clone());
                }
            }
            value => set_path(&mut seed, path, value.clone()),
        }
    }

    seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn applies_operators() {
        let mut document = doc! { "a": 1, "tags": ["x"], "gone": true };

        let changed = apply(
            &mut document,
            &doc! {
                "$set": { "b.c": "d" },
                "$inc": { "a": 2 },
                "$push": { "tags": { "$each": ["y", "z"] } },
                "$unset": { "gone": "" },
            },
            false,
        )
        .unwrap();

        assert!(changed);
        assert_eq!(
            document,
            doc! { "a": 3, "tags": ["x", "y", "z"], "b": { "c": "d" } }
        );
    }

    #[test]
    fn set_on_insert_only_applies_when_inserting() {
        let mut document = doc! {};
        apply(&mut document, &doc! { "$setOnInsert": { "a": 1 } }, false).unwrap();
        assert_eq!(document, doc! {});

        apply(&mut document, &doc! { "$setOnInsert": { "a": 1 } }, true).unwrap();
        assert_eq!(document, doc! { "a": 1 });
    }

    #[test]
    fn upsert_seed_keeps_equality_clauses() {
        let seed = seed_from_filter(&doc! { "_id": 1, "n": { "$gt": 2 }, "m": { "$eq": 3 } });

        assert_eq!(seed, doc! { "_id": 1, "m": 3 });
    }
}
