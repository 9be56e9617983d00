//! Naming heuristics for collection guesses

/// Pluralizes an English noun the simple way collection names are usually
/// formed.
///
/// ```rust
/// use monglo_core::relationships::pluralize;
///
/// assert_eq!(pluralize("category"), "categories");
/// assert_eq!(pluralize("box"), "boxes");
/// assert_eq!(pluralize("user"), "users");
/// ```
pub fn pluralize(word: &str) -> String {
	let mut chars = word.chars().rev();
	if let (Some('y'), Some(before)) = (chars.next(), chars.next())
		&& !"aeiou".contains(before)
	{
		return format!("{}ies", &word[..word.len() - 1]);
	}

	if ["s", "x", "z", "ch", "sh"]
		.iter()
		.any(|suffix| word.ends_with(suffix))
	{
		return format!("{word}es");
	}

	format!("{word}s")
}

/// Guesses the referenced collection from a field name.
///
/// `tag_ids` → `tags`, `user_id` → `users`, `author` → `authors`.
pub fn guess_collection_from_field(field: &str) -> String {
	let base = field
		.strip_suffix("_ids")
		.or_else(|| field.strip_suffix("_id"))
		.unwrap_or(field);
	pluralize(base)
}
