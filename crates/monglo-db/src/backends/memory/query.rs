//! Sort, projection and update application for the in-memory backend

use bson::{Bson, Document};

use super::filter::{sort_key, truthy};
use crate::error::{DbError, Result};
use crate::value::{as_f64, compare_bson, get_path, remove_path, set_path};

/// Stable multi-key sort following the key order of `sort`.
pub fn sort_documents(docs: &mut [Document], sort: &Document) {
	if sort.is_empty() {
		return;
	}
	let keys: Vec<(&str, bool)> = sort
		.iter()
		.map(|(field, direction)| (field.as_str(), as_f64(direction).is_some_and(|d| d < 0.0)))
		.collect();
	docs.sort_by(|a, b| {
		for (field, descending) in &keys {
			let ordering = compare_bson(sort_key(a, field), sort_key(b, field));
			let ordering = if *descending { ordering.reverse() } else { ordering };
			if ordering.is_ne() {
				return ordering;
			}
		}
		std::cmp::Ordering::Equal
	});
}

/// Applies an inclusion or exclusion projection.
///
/// `_id` is kept unless explicitly excluded. Mixing inclusion and exclusion
/// of fields other than `_id` is rejected.
pub fn apply_projection(doc: &Document, projection: &Document) -> Result<Document> {
	let inclusion: Vec<&str> = projection
		.iter()
		.filter(|(field, flag)| field.as_str() != "_id" && truthy(flag))
		.map(|(field, _)| field.as_str())
		.collect();
	let exclusion: Vec<&str> = projection
		.iter()
		.filter(|(field, flag)| field.as_str() != "_id" && !truthy(flag))
		.map(|(field, _)| field.as_str())
		.collect();
	let keep_id = projection.get("_id").is_none_or(truthy);

	if !inclusion.is_empty() && !exclusion.is_empty() {
		return Err(DbError::InvalidOperation(
			"projection cannot mix inclusion and exclusion".to_string(),
		));
	}

	if inclusion.is_empty() {
		let mut projected = doc.clone();
		for field in exclusion {
			remove_path(&mut projected, field);
		}
		if !keep_id {
			projected.remove("_id");
		}
		return Ok(projected);
	}

	let mut projected = Document::new();
	if keep_id && let Some(id) = doc.get("_id") {
		projected.insert("_id", id.clone());
	}
	for field in inclusion {
		if let Some(value) = get_path(doc, field) {
			set_path(&mut projected, field, value.clone());
		}
	}
	Ok(projected)
}

/// Applies an operator update (`$set`, `$unset`, `$inc`, `$push`).
///
/// Returns whether the document changed.
pub fn apply_update(doc: &mut Document, update: &Document) -> Result<bool> {
	if update.is_empty() || update.keys().any(|k| !k.starts_with('$')) {
		return Err(DbError::InvalidOperation(
			"update document must only contain update operators".to_string(),
		));
	}
	let before = doc.clone();
	for (operator, fields) in update {
		let Bson::Document(fields) = fields else {
			return Err(DbError::InvalidOperation(format!(
				"{operator} expects a document"
			)));
		};
		for (path, value) in fields {
			if path == "_id" && operator != "$set" {
				return Err(DbError::InvalidOperation("_id is immutable".to_string()));
			}
			match operator.as_str() {
				"$set" => {
					if path == "_id" && doc.get("_id") != Some(value) {
						return Err(DbError::InvalidOperation("_id is immutable".to_string()));
					}
					set_path(doc, path, value.clone());
				}
				"$unset" => {
					remove_path(doc, path);
				}
				"$inc" => {
					let current = get_path(doc, path).cloned().unwrap_or(Bson::Int32(0));
					let incremented = add_numbers(&current, value).ok_or_else(|| {
						DbError::InvalidOperation(format!("cannot $inc non-numeric field {path}"))
					})?;
					set_path(doc, path, incremented);
				}
				"$push" => {
					let mut items = match get_path(doc, path) {
						Some(Bson::Array(items)) => items.clone(),
						None => Vec::new(),
						Some(_) => {
							return Err(DbError::InvalidOperation(format!(
								"cannot $push to non-array field {path}"
							)));
						}
					};
					items.push(value.clone());
					set_path(doc, path, Bson::Array(items));
				}
				other => {
					return Err(DbError::Unsupported(format!(
						"update operator {other} is not supported by the memory backend"
					)));
				}
			}
		}
	}
	Ok(*doc != before)
}

/// Replaces the body of `doc`, keeping its `_id` first.
pub fn apply_replacement(doc: &mut Document, replacement: &Document) -> Result<bool> {
	if replacement.keys().any(|k| k.starts_with('$')) {
		return Err(DbError::InvalidOperation(
			"replacement document must not contain update operators".to_string(),
		));
	}
	let id = doc.get("_id").cloned();
	if let (Some(existing), Some(requested)) = (&id, replacement.get("_id"))
		&& existing != requested
	{
		return Err(DbError::InvalidOperation("_id is immutable".to_string()));
	}
	let mut replaced = Document::new();
	if let Some(id) = id {
		replaced.insert("_id", id);
	}
	for (key, value) in replacement {
		if key != "_id" {
			replaced.insert(key.clone(), value.clone());
		}
	}
	let changed = replaced != *doc;
	*doc = replaced;
	Ok(changed)
}

fn add_numbers(a: &Bson, b: &Bson) -> Option<Bson> {
	match (a, b) {
		(Bson::Int32(x), Bson::Int32(y)) => Some(
			x.checked_add(*y)
				.map(Bson::Int32)
				.unwrap_or(Bson::Int64(i64::from(*x) + i64::from(*y))),
		),
		(Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
			Some(Bson::Int64(as_i64(a)? + as_i64(b)?))
		}
		_ => Some(Bson::Double(as_f64(a)? + as_f64(b)?)),
	}
}

fn as_i64(value: &Bson) -> Option<i64> {
	match value {
		Bson::Int32(v) => Some(i64::from(*v)),
		Bson::Int64(v) => Some(*v),
		_ => None,
	}
}
