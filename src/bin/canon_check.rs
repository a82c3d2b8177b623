//! canon-check - validate a registry, pack or manifest file
//!
//! Usage:
//!   canon-check registry.yaml
//!   canon-check --config engine.yaml --format json registry.json
//!   canon-check --kind manifest manifest.json

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use canon_registry::loader::parse_registry_document;
use canon_registry::{load_registry, CanonEngine, CanonError, EngineConfig, TaxonomyCounts};
use clap::{Parser, ValueEnum};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "canon-check")]
#[command(version)]
#[command(about = "Validate canonical taxonomy registries, packs and manifests")]
#[command(long_about = None)]
struct Cli {
    /// File to validate (JSON, or YAML by extension)
    file: PathBuf,

    /// Engine configuration (YAML)
    #[arg(long, short, env = "CANON_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// What the file contains
    #[arg(long, short, default_value = "registry", value_enum)]
    kind: InputKind,

    /// Output format
    #[arg(long, short = 'o', default_value = "text", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputKind {
    Registry,
    Pack,
    Manifest,
    ManifestDefinition,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(report) => {
            print_report(&report, cli.format);
            ExitCode::SUCCESS
        }
        Err(e) => {
            match cli.format {
                OutputFormat::Json => {
                    let mut out = json!({ "success": false, "kind": e.kind(), "message": e.to_string() });
                    if let Some(details) = e.details() {
                        out["details"] = details.to_json();
                    }
                    println!("{out:#}");
                }
                OutputFormat::Text => {
                    eprintln!("error [{}]: {e}", e.kind());
                    for v in e.violations() {
                        eprintln!("  - {v}");
                    }
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Value, CanonError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let engine = CanonEngine::new(config)?;

    match cli.kind {
        InputKind::Registry => {
            let loaded = load_registry(&cli.file, &engine)?;
            Ok(json!({
                "success": true,
                "kind": "registry",
                "snapshot_id": loaded.snapshot_id(),
                "counts": loaded.counts(),
            }))
        }
        InputKind::Pack => {
            let pack = engine.validate_pack(&read_document(&cli.file)?)?;
            Ok(json!({
                "success": true,
                "kind": "pack",
                "id": pack.id,
                "version": pack.version,
                "counts": TaxonomyCounts {
                    concepts: pack.concepts.len(),
                    value_sets: pack.value_sets.len(),
                    values: pack.values.len(),
                },
            }))
        }
        InputKind::Manifest => {
            let manifest = engine.validate_manifest(&read_document(&cli.file)?)?;
            Ok(json!({
                "success": true,
                "kind": "manifest",
                "id": manifest.id,
                "layer": manifest.layer,
                "name": manifest.definition.name,
                "allowlist": manifest.definition.allowlist.len(),
            }))
        }
        InputKind::ManifestDefinition => {
            let definition = engine.validate_manifest_definition(&read_document(&cli.file)?)?;
            Ok(json!({
                "success": true,
                "kind": "manifest_definition",
                "name": definition.name,
                "allowlist": definition.allowlist.len(),
            }))
        }
    }
}

fn read_document(path: &Path) -> Result<Value, CanonError> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_registry_document(path, &content)
}

fn print_report(report: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{report:#}"),
        OutputFormat::Text => {
            let kind = report["kind"].as_str().unwrap_or("input");
            println!("OK {kind}");
            if let Some(obj) = report.as_object() {
                for (key, value) in obj.iter().filter(|(k, _)| !matches!(k.as_str(), "success" | "kind")) {
                    match value {
                        Value::String(s) => println!("  {key}: {s}"),
                        other => println!("  {key}: {other}"),
                    }
                }
            }
        }
    }
}
