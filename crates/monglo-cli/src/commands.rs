//! Subcommand implementations over an initialized engine

use std::sync::Arc;

use anyhow::{Context, Result};
use monglo_core::engine::EngineStats;
use monglo_core::index_analyzer::IndexAnalyzer;
use monglo_core::MongloEngine;
use monglo_ops::EngineOpsExt;
use monglo_ops::export::{ExportFormat, ExportOptions, ExportResult};
use monglo_views::views::RelationshipView;

const HEADERS: [&str; 4] = ["NAME", "DISPLAY NAME", "DOCUMENTS", "RELATIONSHIPS"];

/// Fixed-width table of registered collections
pub fn collections_table(stats: &EngineStats) -> String {
	let rows: Vec<[String; 4]> = stats
		.collections
		.iter()
		.map(|c| {
			[
				c.name.clone(),
				c.display_name.clone(),
				c.document_count.to_string(),
				c.relationship_count.to_string(),
			]
		})
		.collect();
	let mut widths = HEADERS.map(str::len);
	for row in &rows {
		for (width, cell) in widths.iter_mut().zip(row) {
			*width = (*width).max(cell.chars().count());
		}
	}

	let line = |cells: [&str; 4]| -> String {
		cells
			.iter()
			.zip(widths)
			.map(|(cell, width)| format!("{cell:<width$}"))
			.collect::<Vec<_>>()
			.join("  ")
			.trim_end()
			.to_string()
	};
	let mut out = line(HEADERS);
	out.push('\n');
	for row in &rows {
		out.push_str(&line([&row[0], &row[1], &row[2], &row[3]]));
		out.push('\n');
	}
	out
}

pub async fn collections(engine: &MongloEngine) -> Result<String> {
	let stats = engine.get_collection_stats().await?;
	Ok(collections_table(&stats))
}

/// Registered schema of `name` as pretty JSON
pub fn schema(engine: &MongloEngine, name: &str) -> Result<String> {
	let admin = engine.collection(name)?;
	let schema = admin.schema().cloned().unwrap_or_default();
	serde_json::to_string_pretty(&schema).context("failed to render schema")
}

/// Relationship graph of one collection, or of every registered one
pub fn relationships(engine: &MongloEngine, name: Option<&str>) -> Result<String> {
	let graph = match name {
		Some(name) => RelationshipView::new(engine.collection(name)?).render_config(),
		None => RelationshipView::render_full_graph(&engine.registry()),
	};
	serde_json::to_string_pretty(&graph).context("failed to render relationship graph")
}

pub async fn export(
	engine: &MongloEngine,
	name: &str,
	format: ExportFormat,
	fields: Option<Vec<String>>,
	limit: Option<i64>,
) -> Result<ExportResult> {
	let options = ExportOptions {
		fields,
		limit,
		..Default::default()
	};
	let result = engine
		.ops(name)?
		.exporter()
		.export_collection(format, options)
		.await?;
	Ok(result)
}

/// Index analysis of `name` as pretty JSON
pub async fn indexes(engine: &MongloEngine, name: &str, sample_size: usize) -> Result<String> {
	// Fails early with NotRegistered for unknown collections
	engine.collection(name)?;
	let analysis = IndexAnalyzer::new(Arc::clone(engine.database()))
		.analyze(name, sample_size)
		.await?;
	serde_json::to_string_pretty(&analysis).context("failed to render index analysis")
}
