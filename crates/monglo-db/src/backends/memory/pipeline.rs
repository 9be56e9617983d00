//! Aggregation pipeline subset for the in-memory backend
//!
//! Stages: `$match`, `$group`, `$sort`, `$skip`, `$limit`, `$project`,
//! `$unwind` and `$count`. Expressions: field paths (`"$field"`), literals,
//! object literals and `$dateToString`.

use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::filter::{matches, truthy};
use super::query::sort_documents;
use crate::error::{DbError, Result};
use crate::value::{as_f64, compare_bson, get_path, set_path};

/// Runs `pipeline` over `docs`.
pub fn run_pipeline(mut docs: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>> {
	for stage in pipeline {
		let mut entries = stage.iter();
		let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
			return Err(DbError::InvalidOperation(
				"each pipeline stage must contain exactly one operator".to_string(),
			));
		};
		docs = match (name.as_str(), spec) {
			("$match", Bson::Document(filter)) => {
				let mut kept = Vec::with_capacity(docs.len());
				for doc in docs {
					if matches(&doc, filter)? {
						kept.push(doc);
					}
				}
				kept
			}
			("$sort", Bson::Document(sort)) => {
				sort_documents(&mut docs, sort);
				docs
			}
			("$skip", value) => {
				let n = count_argument(name, value)?;
				docs.into_iter().skip(n).collect()
			}
			("$limit", value) => {
				let n = count_argument(name, value)?;
				docs.into_iter().take(n).collect()
			}
			("$count", Bson::String(field)) => {
				let mut out = Document::new();
				if !docs.is_empty() {
					out.insert(field.clone(), Bson::Int32(docs.len() as i32));
					vec![out]
				} else {
					Vec::new()
				}
			}
			("$project", Bson::Document(spec)) => docs
				.iter()
				.map(|doc| project(doc, spec))
				.collect::<Result<Vec<_>>>()?,
			("$unwind", value) => unwind(docs, value)?,
			("$group", Bson::Document(spec)) => group(&docs, spec)?,
			(other, _) => {
				return Err(DbError::Unsupported(format!(
					"pipeline stage {other} is not supported by the memory backend"
				)));
			}
		};
	}
	Ok(docs)
}

fn count_argument(stage: &str, value: &Bson) -> Result<usize> {
	as_f64(value)
		.filter(|n| *n >= 0.0)
		.map(|n| n as usize)
		.ok_or_else(|| DbError::InvalidOperation(format!("{stage} expects a non-negative number")))
}

/// Evaluates an aggregation expression against a document.
pub fn evaluate(doc: &Document, expression: &Bson) -> Result<Bson> {
	match expression {
		Bson::String(path) if path.starts_with('$') => {
			Ok(get_path(doc, &path[1..]).cloned().unwrap_or(Bson::Null))
		}
		Bson::Document(inner) => match inner.iter().next() {
			Some((operator, argument)) if operator == "$dateToString" => {
				date_to_string(doc, argument)
			}
			Some((operator, _)) if operator.starts_with('$') => Err(DbError::Unsupported(format!(
				"expression {operator} is not supported by the memory backend"
			))),
			_ => {
				let mut out = Document::new();
				for (key, value) in inner {
					out.insert(key.clone(), evaluate(doc, value)?);
				}
				Ok(Bson::Document(out))
			}
		},
		literal => Ok(literal.clone()),
	}
}

fn date_to_string(doc: &Document, argument: &Bson) -> Result<Bson> {
	let Bson::Document(spec) = argument else {
		return Err(DbError::InvalidOperation(
			"$dateToString expects a document".to_string(),
		));
	};
	let format = spec.get_str("format").unwrap_or("%Y-%m-%dT%H:%M:%S.%LZ");
	let date = evaluate(doc, spec.get("date").unwrap_or(&Bson::Null))?;
	match date {
		Bson::DateTime(dt) => {
			let chrono_dt: DateTime<Utc> = DateTime::from_timestamp_millis(dt.timestamp_millis())
				.ok_or_else(|| DbError::InvalidOperation("date out of range".to_string()))?;
			// %L (milliseconds) has no chrono equivalent
			let format = format.replace("%L", "%3f");
			Ok(Bson::String(chrono_dt.format(&format).to_string()))
		}
		Bson::Null => Ok(Bson::Null),
		other => Err(DbError::InvalidOperation(format!(
			"$dateToString requires a date, got {other}"
		))),
	}
}

fn project(doc: &Document, spec: &Document) -> Result<Document> {
	let exclusion_only = spec.iter().all(|(_, value)| is_flag(value) && !truthy(value));
	if exclusion_only {
		return super::query::apply_projection(doc, spec);
	}

	let mut out = Document::new();
	if !spec.contains_key("_id")
		&& let Some(id) = doc.get("_id")
	{
		out.insert("_id", id.clone());
	}
	for (field, value) in spec {
		if is_flag(value) {
			if truthy(value)
				&& let Some(existing) = get_path(doc, field)
			{
				set_path(&mut out, field, existing.clone());
			}
		} else {
			set_path(&mut out, field, evaluate(doc, value)?);
		}
	}
	Ok(out)
}

fn is_flag(value: &Bson) -> bool {
	matches!(value, Bson::Boolean(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn unwind(docs: Vec<Document>, spec: &Bson) -> Result<Vec<Document>> {
	let path = match spec {
		Bson::String(path) => path.as_str(),
		Bson::Document(options) => options
			.get_str("path")
			.map_err(|_| DbError::InvalidOperation("$unwind requires a path".to_string()))?,
		_ => {
			return Err(DbError::InvalidOperation(
				"$unwind expects a field path".to_string(),
			));
		}
	};
	let field = path.strip_prefix('$').ok_or_else(|| {
		DbError::InvalidOperation("$unwind path must start with '$'".to_string())
	})?;
	let mut out = Vec::new();
	for doc in docs {
		match get_path(&doc, field) {
			Some(Bson::Array(items)) => {
				for item in items.clone() {
					let mut copy = doc.clone();
					set_path(&mut copy, field, item);
					out.push(copy);
				}
			}
			Some(Bson::Null) | None => {}
			Some(_) => out.push(doc),
		}
	}
	Ok(out)
}

enum Accumulator {
	Sum { total: f64, integral: bool },
	Avg { total: f64, count: u64 },
	Min(Option<Bson>),
	Max(Option<Bson>),
	First(Option<Bson>),
	Push(Vec<Bson>),
}

impl Accumulator {
	fn new(operator: &str) -> Result<Self> {
		Ok(match operator {
			"$sum" => Accumulator::Sum {
				total: 0.0,
				integral: true,
			},
			"$avg" => Accumulator::Avg { total: 0.0, count: 0 },
			"$min" => Accumulator::Min(None),
			"$max" => Accumulator::Max(None),
			"$first" => Accumulator::First(None),
			"$push" => Accumulator::Push(Vec::new()),
			other => {
				return Err(DbError::Unsupported(format!(
					"accumulator {other} is not supported by the memory backend"
				)));
			}
		})
	}

	fn add(&mut self, value: Bson) {
		match self {
			Accumulator::Sum { total, integral } => {
				if let Some(n) = as_f64(&value) {
					*total += n;
					*integral &= !matches!(value, Bson::Double(_));
				}
			}
			Accumulator::Avg { total, count } => {
				if let Some(n) = as_f64(&value) {
					*total += n;
					*count += 1;
				}
			}
			Accumulator::Min(current) => {
				if !matches!(value, Bson::Null)
					&& current
						.as_ref()
						.is_none_or(|c| compare_bson(&value, c).is_lt())
				{
					*current = Some(value);
				}
			}
			Accumulator::Max(current) => {
				if !matches!(value, Bson::Null)
					&& current
						.as_ref()
						.is_none_or(|c| compare_bson(&value, c).is_gt())
				{
					*current = Some(value);
				}
			}
			Accumulator::First(current) => {
				if current.is_none() {
					*current = Some(value);
				}
			}
			Accumulator::Push(items) => items.push(value),
		}
	}

	fn finish(self) -> Bson {
		match self {
			Accumulator::Sum { total, integral } if integral => {
				if total >= f64::from(i32::MIN) && total <= f64::from(i32::MAX) {
					Bson::Int32(total as i32)
				} else {
					Bson::Int64(total as i64)
				}
			}
			Accumulator::Sum { total, .. } => Bson::Double(total),
			Accumulator::Avg { count: 0, .. } => Bson::Null,
			Accumulator::Avg { total, count } => Bson::Double(total / count as f64),
			Accumulator::Min(value) | Accumulator::Max(value) | Accumulator::First(value) => {
				value.unwrap_or(Bson::Null)
			}
			Accumulator::Push(items) => Bson::Array(items),
		}
	}
}

fn group(docs: &[Document], spec: &Document) -> Result<Vec<Document>> {
	let key_expression = spec
		.get("_id")
		.ok_or_else(|| DbError::InvalidOperation("$group requires an _id".to_string()))?;

	let mut fields = Vec::new();
	for (name, accumulator) in spec.iter().filter(|(name, _)| name.as_str() != "_id") {
		let Bson::Document(accumulator) = accumulator else {
			return Err(DbError::InvalidOperation(format!(
				"$group field {name} must be an accumulator document"
			)));
		};
		let Some((operator, expression)) = accumulator.iter().next() else {
			return Err(DbError::InvalidOperation(format!(
				"$group field {name} has an empty accumulator"
			)));
		};
		fields.push((name.clone(), operator.clone(), expression.clone()));
	}

	// Keyed by the debug rendering of the group key; BSON values are not hashable.
	let mut groups: IndexMap<String, (Bson, Vec<Accumulator>)> = IndexMap::new();
	for doc in docs {
		let key = evaluate(doc, key_expression)?;
		let slot = match groups.entry(format!("{key:?}")) {
			indexmap::map::Entry::Occupied(entry) => entry.into_mut(),
			indexmap::map::Entry::Vacant(entry) => {
				let accumulators = fields
					.iter()
					.map(|(_, operator, _)| Accumulator::new(operator))
					.collect::<Result<Vec<_>>>()?;
				entry.insert((key, accumulators))
			}
		};
		for ((_, _, expression), accumulator) in fields.iter().zip(slot.1.iter_mut()) {
			accumulator.add(evaluate(doc, expression)?);
		}
	}

	Ok(groups
		.into_values()
		.map(|(key, accumulators)| {
			let mut out = Document::new();
			out.insert("_id", key);
			for ((name, _, _), accumulator) in fields.iter().zip(accumulators) {
				out.insert(name.clone(), accumulator.finish());
			}
			out
		})
		.collect())
}
