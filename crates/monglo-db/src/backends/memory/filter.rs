//! Query document evaluation for the in-memory backend
//!
//! Supports the operator subset the administrative layer emits: implicit
//! equality, comparison operators, set membership, `$regex`/`$options`,
//! `$exists`, `$size`, `$not` and the `$and`/`$or`/`$nor` combinators.

use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};

use crate::error::{DbError, Result};
use crate::value::{bson_eq, compare_bson, get_path, is_dbref, same_type_class, values_at_path};

/// Returns whether `doc` satisfies `filter`.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool> {
	for (key, condition) in filter {
		let satisfied = match key.as_str() {
			"$and" => {
				let mut all = true;
				for clause in clauses(key, condition)? {
					if !matches(doc, clause)? {
						all = false;
						break;
					}
				}
				all
			}
			"$or" => {
				let mut any = false;
				for clause in clauses(key, condition)? {
					if matches(doc, clause)? {
						any = true;
						break;
					}
				}
				any
			}
			"$nor" => {
				let mut none = true;
				for clause in clauses(key, condition)? {
					if matches(doc, clause)? {
						none = false;
						break;
					}
				}
				none
			}
			other if other.starts_with('$') => {
				return Err(DbError::Unsupported(format!(
					"top-level operator {other} is not supported by the memory backend"
				)));
			}
			path => matches_field(doc, path, condition)?,
		};
		if !satisfied {
			return Ok(false);
		}
	}
	Ok(true)
}

fn clauses<'a>(operator: &str, value: &'a Bson) -> Result<Vec<&'a Document>> {
	let Bson::Array(items) = value else {
		return Err(DbError::InvalidOperation(format!("{operator} expects an array")));
	};
	items
		.iter()
		.map(|item| match item {
			Bson::Document(clause) => Ok(clause),
			_ => Err(DbError::InvalidOperation(format!(
				"{operator} entries must be documents"
			))),
		})
		.collect()
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
	match condition {
		Bson::Document(inner)
			if !is_dbref(inner) && inner.keys().next().is_some_and(|k| k.starts_with('$')) =>
		{
			Some(inner)
		}
		_ => None,
	}
}

fn matches_field(doc: &Document, path: &str, condition: &Bson) -> Result<bool> {
	let candidates = values_at_path(doc, path);
	match is_operator_document(condition) {
		Some(operators) => evaluate_operators(doc, path, &candidates, operators),
		None => Ok(equals_any(&candidates, condition)),
	}
}

fn evaluate_operators(
	doc: &Document,
	path: &str,
	candidates: &[&Bson],
	operators: &Document,
) -> Result<bool> {
	for (operator, argument) in operators {
		let satisfied = match operator.as_str() {
			"$eq" => equals_any(candidates, argument),
			"$ne" => !equals_any(candidates, argument),
			"$gt" => compares(candidates, argument, |o| o == Ordering::Greater),
			"$gte" => compares(candidates, argument, |o| o != Ordering::Less),
			"$lt" => compares(candidates, argument, |o| o == Ordering::Less),
			"$lte" => compares(candidates, argument, |o| o != Ordering::Greater),
			"$in" => member_of(candidates, operator, argument)?,
			"$nin" => !member_of(candidates, operator, argument)?,
			"$exists" => truthy(argument) != candidates.is_empty(),
			"$size" => {
				let expected = crate::value::as_f64(argument).ok_or_else(|| {
					DbError::InvalidOperation("$size expects a number".to_string())
				})?;
				candidates
					.iter()
					.any(|c| matches!(c, Bson::Array(items) if items.len() as f64 == expected))
			}
			"$regex" => {
				let options = operators.get_str("$options").unwrap_or("");
				let regex = compile_regex(argument, options)?;
				strings_of(candidates).any(|s| regex.is_match(s))
			}
			"$options" => true,
			"$not" => match is_operator_document(argument) {
				Some(inner) => !evaluate_operators(doc, path, candidates, inner)?,
				None => {
					return Err(DbError::InvalidOperation(
						"$not expects an operator document".to_string(),
					));
				}
			},
			other => {
				return Err(DbError::Unsupported(format!(
					"operator {other} on field {path} is not supported by the memory backend"
				)));
			}
		};
		if !satisfied {
			return Ok(false);
		}
	}
	Ok(true)
}

/// Implicit equality: a `null` target also matches a missing field, array
/// candidates match when any element is equal.
fn equals_any(candidates: &[&Bson], target: &Bson) -> bool {
	if matches!(target, Bson::Null) && candidates.is_empty() {
		return true;
	}
	candidates.iter().any(|candidate| {
		bson_eq(candidate, target)
			|| matches!(candidate, Bson::Array(items) if items.iter().any(|item| bson_eq(item, target)))
	})
}

fn compares(candidates: &[&Bson], target: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
	flatten(candidates)
		.any(|value| same_type_class(value, target) && accept(compare_bson(value, target)))
}

fn member_of(candidates: &[&Bson], operator: &str, argument: &Bson) -> Result<bool> {
	let Bson::Array(options) = argument else {
		return Err(DbError::InvalidOperation(format!("{operator} expects an array")));
	};
	Ok(options.iter().any(|option| equals_any(candidates, option)))
}

fn flatten<'a>(candidates: &'a [&'a Bson]) -> impl Iterator<Item = &'a Bson> + 'a {
	candidates.iter().flat_map(|candidate| match candidate {
		Bson::Array(items) => items.iter().collect::<Vec<_>>(),
		other => vec![*other],
	})
}

fn strings_of<'a>(candidates: &'a [&'a Bson]) -> impl Iterator<Item = &'a str> + 'a {
	flatten(candidates).filter_map(|value| match value {
		Bson::String(s) => Some(s.as_str()),
		_ => None,
	})
}

pub(crate) fn truthy(value: &Bson) -> bool {
	match value {
		Bson::Boolean(b) => *b,
		Bson::Null => false,
		other => crate::value::as_f64(other).is_none_or(|n| n != 0.0),
	}
}

/// Compiles a `$regex` argument honoring the `i`, `m`, `s` and `x` options.
pub(crate) fn compile_regex(pattern: &Bson, options: &str) -> Result<Regex> {
	let Bson::String(pattern) = pattern else {
		return Err(DbError::InvalidOperation(
			"$regex expects a string pattern".to_string(),
		));
	};
	RegexBuilder::new(pattern)
		.case_insensitive(options.contains('i'))
		.multi_line(options.contains('m'))
		.dot_matches_new_line(options.contains('s'))
		.ignore_whitespace(options.contains('x'))
		.build()
		.map_err(|e| DbError::InvalidOperation(format!("invalid regex {pattern:?}: {e}")))
}

/// Field value used for sorting, `null` when missing.
pub(crate) fn sort_key<'a>(doc: &'a Document, path: &str) -> &'a Bson {
	const NULL: &Bson = &Bson::Null;
	get_path(doc, path).unwrap_or(NULL)
}
