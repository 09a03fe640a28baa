//! Filter matching, ordering and projection over in-memory documents.

use crate::{Error, Result};
use mongodb::bson::{Bson, Document};
use std::cmp::Ordering;

/// Looks a dotted path up inside `document`.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

pub fn matches(document: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    all &= matches(document, clause)?;
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    any |= matches(document, clause)?;
                }
                any
            }
            "$nor" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    any |= matches(document, clause)?;
                }
                !any
            }
            operator if operator.starts_with('$') => {
                return Err(Error::UnsupportedOperator(operator.to_owned()));
            }
            path => field_matches(lookup(document, path), condition)?,
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn clauses<'a>(operator: &str, condition: &'a Bson) -> Result<Vec<&'a Document>> {
    let Bson::Array(items) = condition else {
        return Err(Error::UnsupportedOperator(format!("{operator} without an array")));
    };

    items
        .iter()
        .map(|item| match item {
            Bson::Document(clause) => Ok(clause),
            _ => Err(Error::UnsupportedOperator(format!(
                "{operator} with a non-document clause"
            ))),
        })
        .collect()
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(document)
            if document.keys().next().is_some_and(|key| key.starts_with('$')) =>
        {
            Some(document)
        }
        _ => None,
    }
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> Result<bool> {
    let Some(operators) = is_operator_document(condition) else {
        return Ok(equals(value, condition));
    };

    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$gt" => compares(value, operand, |ordering| ordering.is_gt()),
            "$gte" => compares(value, operand, |ordering| ordering.is_ge()),
            "$lt" => compares(value, operand, |ordering| ordering.is_lt()),
            "$lte" => compares(value, operand, |ordering| ordering.is_le()),
            "$in" => in_array(value, operand)?,
            "$nin" => !in_array(value, operand)?,
            "$exists" => value.is_some() == truthy(operand),
            other => return Err(Error::UnsupportedOperator(other.to_owned())),
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Equality with the server's array semantics: an array field matches when any element does.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(value) if same(value, expected) => true,
        Some(Bson::Array(items)) => items.iter().any(|item| same(item, expected)),
        Some(_) => false,
    }
}

fn compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let candidates: Vec<&Bson> = match value {
        None => return false,
        Some(Bson::Array(items)) => items.iter().collect(),
        Some(value) => vec![value],
    };

    candidates.into_iter().any(|candidate| {
        type_rank(candidate) == type_rank(operand) && accept(compare(candidate, operand))
    })
}

fn in_array(value: Option<&Bson>, operand: &Bson) -> Result<bool> {
    let Bson::Array(options) = operand else {
        return Err(Error::UnsupportedOperator("$in without an array".into()));
    };

    Ok(options.iter().any(|option| equals(value, option)))
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// Value equality where numbers compare across their representations.
pub fn same(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

/// A total order over values following the server's cross-type ordering.
pub fn compare(a: &Bson, b: &Bson) -> Ordering {
    let by_rank = type_rank(a).cmp(&type_rank(b));
    if by_rank.is_ne() {
        return by_rank;
    }

    match (a, b) {
        _ if as_number(a).is_some() && as_number(b).is_some() => as_number(a)
            .zip(as_number(b))
            .map_or(Ordering::Equal, |(a, b)| a.total_cmp(&b)),
        (Bson::String(a), Bson::String(b)) => a.cmp(b),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => a.cmp(b),
        (Bson::Boolean(a), Bson::Boolean(b)) => a.cmp(b),
        (Bson::DateTime(a), Bson::DateTime(b)) => a.cmp(b),
        (Bson::Timestamp(a), Bson::Timestamp(b)) => (a.time, a.increment).cmp(&(b.time, b.increment)),
        (Bson::Array(a), Bson::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(a, b)| compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Bson::Document(a), Bson::Document(b)) => a
            .iter()
            .zip(b.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| compare(va, vb)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

pub fn sort(documents: &mut [Document], order: &Document) {
    documents.sort_by(|a, b| {
        order
            .iter()
            .map(|(path, direction)| {
                let ordering = compare(
                    lookup(a, path).unwrap_or(&Bson::Null),
                    lookup(b, path).unwrap_or(&Bson::Null),
                );
                if as_number(direction).is_some_and(|direction| direction < 0.0) {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

/// Applies a top-level inclusion or exclusion projection. `_id` is kept unless excluded.
pub fn project(document: Document, projection: &Document) -> Document {
    let including = projection
        .iter()
        .any(|(field, flag)| field != "_id" && truthy(flag));

    if including {
        let keep_id = projection.get("_id").is_none_or(truthy);
        document
            .into_iter()
            .filter(|(field, _)| {
                if field == "_id" {
                    keep_id
                } else {
                    projection.get(field).is_some_and(truthy)
                }
            })
            .collect()
    } else {
        document
            .into_iter()
            .filter(|(field, _)| projection.get(field).is_none_or(truthy))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn equality_matches_array_elements() {
        let document = doc! { "tags": ["a", "b"], "n": 1 };

        assert!(matches(&document, &doc! { "tags": "a" }).unwrap());
        assert!(matches(&document, &doc! { "n": 1_i64 }).unwrap());
        assert!(!matches(&document, &doc! { "tags": "c" }).unwrap());
        assert!(matches(&document, &doc! { "missing": null }).unwrap());
    }

    #[test]
    fn operators_and_logical_clauses() {
        let document = doc! { "n": 5, "nested": { "name": "kit" } };

        assert!(matches(&document, &doc! { "n": { "$gt": 1, "$lte": 5 } }).unwrap());
        assert!(matches(&document, &doc! { "nested.name": { "$in": ["kit", "bob"] } }).unwrap());
        assert!(matches(&document, &doc! { "$or": [{ "n": 1 }, { "n": 5 }] }).unwrap());
        assert!(!matches(&document, &doc! { "n": { "$exists": false } }).unwrap());
        assert!(matches(&document, &doc! { "$nor": [{ "n": 1 }] }).unwrap());
        assert!(matches!(
            matches(&document, &doc! { "n": { "$where": "1" } }),
            Err(Error::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn sorts_by_several_keys() {
        let mut documents = vec![
            doc! { "a": 1, "b": 2 },
            doc! { "a": 2, "b": 1 },
            doc! { "a": 1, "b": 3 },
        ];

        sort(&mut documents, &doc! { "a": 1, "b": -1 });

        assert_eq!(
            documents,
            vec![
                doc! { "a": 1, "b": 3 },
                doc! { "a": 1, "b": 2 },
                doc! { "a": 2, "b": 1 },
            ]
        );
    }

    #[test]
    fn projection_keeps_id_by_default() {
        let document = doc! { "_id": 1, "a": 1, "b": 2 };

        assert_eq!(project(document.clone(), &doc! { "a": 1 }), doc! { "_id": 1, "a": 1 });
        assert_eq!(project(document.clone(), &doc! { "a": 0 }), doc! { "_id": 1, "b": 2 });
        assert_eq!(project(document, &doc! { "a": 1, "_id": 0 }), doc! { "a": 1 });
    }
}
