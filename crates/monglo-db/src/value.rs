//! BSON value helpers: dotted path lookup, equality and cross-type ordering

use std::cmp::Ordering;

use bson::{Bson, Document};

/// Resolves a dot-notation path against a document.
///
/// Numeric segments index into arrays; a non-numeric segment applied to an
/// array is not followed (see [`values_at_path`] for fan-out semantics).
///
/// # Example
///
/// ```rust
/// use monglo_db::value::get_path;
/// use bson::{doc, Bson};
///
/// let doc = doc! { "address": { "city": "Lyon" } };
/// assert_eq!(get_path(&doc, "address.city"), Some(&Bson::String("Lyon".into())));
/// ```
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
	let mut segments = path.split('.');
	let mut current = doc.get(segments.next()?)?;
	for segment in segments {
		current = match current {
			Bson::Document(inner) => inner.get(segment)?,
			Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
			_ => return None,
		};
	}
	Some(current)
}

/// Every value reachable through `path`, fanning out over arrays of
/// sub-documents the way the query language does.
pub fn values_at_path<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
	let segments: Vec<&str> = path.split('.').collect();
	let mut out = Vec::new();
	collect_path(doc, &segments, &mut out);
	out
}

fn collect_path<'a>(doc: &'a Document, segments: &[&str], out: &mut Vec<&'a Bson>) {
	let Some((head, rest)) = segments.split_first() else {
		return;
	};
	let Some(value) = doc.get(*head) else {
		return;
	};
	descend(value, rest, out);
}

fn descend<'a>(value: &'a Bson, rest: &[&str], out: &mut Vec<&'a Bson>) {
	if rest.is_empty() {
		out.push(value);
		return;
	}
	match value {
		Bson::Document(inner) => collect_path(inner, rest, out),
		Bson::Array(items) => {
			if let Ok(index) = rest[0].parse::<usize>() {
				if let Some(item) = items.get(index) {
					descend(item, &rest[1..], out);
				}
			} else {
				for item in items {
					if let Bson::Document(inner) = item {
						collect_path(inner, rest, out);
					}
				}
			}
		}
		_ => {}
	}
}

/// Sets a dot-notation path, creating intermediate documents as needed.
pub fn set_path(doc: &mut Document, path: &str, value: Bson) {
	match path.split_once('.') {
		None => {
			doc.insert(path, value);
		}
		Some((head, rest)) => {
			if !matches!(doc.get(head), Some(Bson::Document(_))) {
				doc.insert(head, Document::new());
			}
			if let Some(Bson::Document(inner)) = doc.get_mut(head) {
				set_path(inner, rest, value);
			}
		}
	}
}

/// Removes a dot-notation path, returning whether anything was removed.
pub fn remove_path(doc: &mut Document, path: &str) -> bool {
	match path.split_once('.') {
		None => doc.remove(path).is_some(),
		Some((head, rest)) => match doc.get_mut(head) {
			Some(Bson::Document(inner)) => remove_path(inner, rest),
			_ => false,
		},
	}
}

/// Numeric view of a BSON value
pub fn as_f64(value: &Bson) -> Option<f64> {
	match value {
		Bson::Int32(v) => Some(f64::from(*v)),
		Bson::Int64(v) => Some(*v as f64),
		Bson::Double(v) => Some(*v),
		_ => None,
	}
}

/// Canonical type rank used when comparing values of different types.
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

/// Whether two values belong to the same comparison class (numbers compare
/// with numbers regardless of width).
pub fn same_type_class(a: &Bson, b: &Bson) -> bool {
	type_rank(a) == type_rank(b)
}

/// Total ordering over BSON values.
///
/// Values of different types order by type class; within a class they order
/// naturally. Documents and arrays compare element-wise.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
	let (rank_a, rank_b) = (type_rank(a), type_rank(b));
	if rank_a != rank_b {
		return rank_a.cmp(&rank_b);
	}
	match (a, b) {
		(Bson::String(x), Bson::String(y)) => x.cmp(y),
		(Bson::Symbol(x), Bson::Symbol(y)) => x.cmp(y),
		(Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
		(Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
		(Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
		(Bson::Timestamp(x), Bson::Timestamp(y)) => (x.time, x.increment).cmp(&(y.time, y.increment)),
		(Bson::Binary(x), Bson::Binary(y)) => x.bytes.cmp(&y.bytes),
		(Bson::Array(x), Bson::Array(y)) => compare_sequences(x.iter(), y.iter(), x.len(), y.len()),
		(Bson::Document(x), Bson::Document(y)) => {
			for ((ka, va), (kb, vb)) in x.iter().zip(y.iter()) {
				let ordering = ka.cmp(kb).then_with(|| compare_bson(va, vb));
				if ordering != Ordering::Equal {
					return ordering;
				}
			}
			x.len().cmp(&y.len())
		}
		_ => match (as_f64(a), as_f64(b)) {
			(Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
			_ => Ordering::Equal,
		},
	}
}

fn compare_sequences<'a>(
	left: impl Iterator<Item = &'a Bson>,
	right: impl Iterator<Item = &'a Bson>,
	left_len: usize,
	right_len: usize,
) -> Ordering {
	for (x, y) in left.zip(right) {
		let ordering = compare_bson(x, y);
		if ordering != Ordering::Equal {
			return ordering;
		}
	}
	left_len.cmp(&right_len)
}

/// Equality with numeric widening (`Int32(1) == Double(1.0)`).
pub fn bson_eq(a: &Bson, b: &Bson) -> bool {
	match (as_f64(a), as_f64(b)) {
		(Some(x), Some(y)) => x == y,
		_ => a == b,
	}
}

/// Whether a document has the shape of a database reference (`$ref` + `$id`).
pub fn is_dbref(doc: &Document) -> bool {
	doc.contains_key("$ref") && doc.contains_key("$id")
}
