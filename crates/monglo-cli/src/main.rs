//! Monglo CLI
//!
//! Inspects a MongoDB database the way the admin layer sees it.
//!
//! ## Usage
//!
//! ```bash
//! monglo collections
//! monglo schema users
//! monglo relationships --collection orders
//! monglo export orders --format csv --fields number,status --output orders.csv
//! monglo indexes orders --sample-size 500
//! ```
//!
//! Connection and engine settings come from `--config <file>` (TOML or
//! JSON) or from `MONGLO_*` environment variables.

mod commands;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use monglo_core::{EngineOptions, MongloEngine, MongloSettings};
use monglo_db::DocumentBackend;
use monglo_db::backends::MongoDBBackend;
use monglo_ops::export::ExportFormat;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "monglo")]
#[command(about = "Schema-less MongoDB administration utility", long_about = None)]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Settings file; `MONGLO_*` environment variables are used otherwise
	#[arg(short, long, value_name = "FILE", global = true)]
	config: Option<PathBuf>,

	/// Verbosity level (can be repeated)
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbosity: u8,
}

#[derive(Subcommand)]
enum Commands {
	/// List registered collections with document and relationship counts
	Collections,

	/// Print the inferred schema of a collection
	Schema {
		#[arg(value_name = "COLLECTION")]
		collection: String,
	},

	/// Print the relationship graph
	Relationships {
		/// Only this collection's relationships
		#[arg(long, value_name = "COLLECTION")]
		collection: Option<String>,
	},

	/// Export a collection
	Export {
		#[arg(value_name = "COLLECTION")]
		collection: String,

		/// json, csv or ndjson
		#[arg(short, long, default_value = "json")]
		format: ExportFormat,

		/// Comma-separated fields to include
		#[arg(long, value_delimiter = ',')]
		fields: Option<Vec<String>>,

		#[arg(long)]
		limit: Option<i64>,

		/// Write to this file instead of stdout
		#[arg(short, long, value_name = "PATH")]
		output: Option<PathBuf>,
	},

	/// Analyze indexes and recommend new ones
	Indexes {
		#[arg(value_name = "COLLECTION")]
		collection: String,

		#[arg(long, default_value_t = 100)]
		sample_size: usize,
	},
}

/// `RUST_LOG` wins over the configured level; each `-v` raises it one step
fn init_logging(level: &str, verbosity: u8) {
	let level = match verbosity {
		0 => level,
		1 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.try_init();
}

fn load_settings(path: Option<PathBuf>) -> Result<MongloSettings> {
	let settings = match path {
		Some(path) => MongloSettings::from_file(path)?,
		None => MongloSettings::from_env()?,
	};
	settings.validate()?;
	Ok(settings)
}

async fn connect(settings: &MongloSettings) -> Result<MongloEngine> {
	let database = &settings.database;
	let mut builder = MongoDBBackend::builder()
		.url(&database.url)
		.database(&database.name);
	if let Some(size) = database.max_pool_size {
		builder = builder.max_pool_size(size);
	}
	if let Some(size) = database.min_pool_size {
		builder = builder.min_pool_size(size);
	}
	let backend = builder.build().await?;
	backend.health_check().await?;
	info!(database = %database.name, "Connected");

	let engine = MongloEngine::new(Arc::new(backend), EngineOptions::from_settings(settings));
	engine.initialize().await?;
	Ok(engine)
}

async fn run(cli: Cli) -> Result<()> {
	let settings = load_settings(cli.config)?;
	init_logging(&settings.logging.level, cli.verbosity);
	let engine = connect(&settings).await?;

	match cli.command {
		Commands::Collections => print!("{}", commands::collections(&engine).await?),
		Commands::Schema { collection } => println!("{}", commands::schema(&engine, &collection)?),
		Commands::Relationships { collection } => {
			println!("{}", commands::relationships(&engine, collection.as_deref())?)
		}
		Commands::Export {
			collection,
			format,
			fields,
			limit,
			output,
		} => {
			let result = commands::export(&engine, &collection, format, fields, limit).await?;
			match output {
				Some(path) => {
					tokio::fs::write(&path, &result.content).await?;
					eprintln!(
						"{} {} documents to {}",
						"Exported".green(),
						result.document_count,
						path.display()
					);
				}
				None => print!("{}", result.content),
			}
		}
		Commands::Indexes {
			collection,
			sample_size,
		} => println!("{}", commands::indexes(&engine, &collection, sample_size).await?),
	}
	Ok(())
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();

	if let Err(e) = run(cli).await {
		eprintln!("{} {:#}", "Error:".red(), e);
		process::exit(1);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::*;
	use std::io::Write;

	#[rstest]
	fn test_export_arguments() {
		let cli = Cli::try_parse_from([
			"monglo", "-vv", "export", "orders", "--format", "csv", "--fields", "number,status",
		])
		.expect("arguments should parse");

		assert_eq!(cli.verbosity, 2);
		match cli.command {
			Commands::Export {
				collection,
				format,
				fields,
				limit,
				output,
			} => {
				assert_eq!(collection, "orders");
				assert_eq!(format, ExportFormat::Csv);
				assert_eq!(fields, Some(vec!["number".to_string(), "status".to_string()]));
				assert!(limit.is_none());
				assert!(output.is_none());
			}
			_ => panic!("expected the export subcommand"),
		}
	}

	#[rstest]
	fn test_unknown_export_format_is_rejected() {
		let parsed = Cli::try_parse_from(["monglo", "export", "orders", "--format", "xml"]);

		assert!(parsed.is_err());
	}

	#[rstest]
	fn test_settings_file_is_validated() {
		// Arrange
		let mut valid = tempfile::Builder::new().suffix(".toml").tempfile().expect("temp file");
		writeln!(valid, "[database]\nurl = \"mongodb://db:27017\"\nname = \"shop\"").expect("write");
		let mut invalid = tempfile::Builder::new().suffix(".toml").tempfile().expect("temp file");
		writeln!(invalid, "[pagination]\nper_page = 500\nmax_per_page = 100").expect("write");

		// Act
		let settings = load_settings(Some(valid.path().to_path_buf()));
		let rejected = load_settings(Some(invalid.path().to_path_buf()));

		// Assert
		let settings = settings.expect("valid settings should load");
		assert_eq!(settings.database.name, "shop");
		assert_eq!(settings.logging.level, "info");
		assert!(rejected.is_err());
	}
}
