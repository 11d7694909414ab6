// SPDX-License-Identifier: MIT OR Apache-2.0
//! `ordoplay_script` - batch tools for `OrdoPlay` script documents.
//!
//! Upgrades documents to the current format, re-saves whole directories
//! and reports integrity problems without opening the editor.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ordoplay_editor_script::{
    ElementKind, FileStore, ScriptConfig, ScriptDocument, ScriptEnv, ScriptRegistry, CONFIG_FILE_NAME,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "ordoplay_script", version)]
#[command(about = "Upgrade, re-save and validate OrdoPlay script documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Script configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load every document under a directory and save it back
    SaveAll {
        /// Directory to scan
        dir: PathBuf,

        /// Only write documents that changed while loading
        #[arg(long)]
        modified_only: bool,
    },
    /// Upgrade documents to the current format version in place
    Upgrade {
        /// Documents to upgrade
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Check documents for integrity problems
    Validate {
        /// Documents to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print a summary of a document
    Info {
        /// Document to inspect
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let config = ScriptConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to read {}", cli.config.display()))?;

    match cli.command {
        Commands::SaveAll { dir, modified_only } => cmd_save_all(config, &dir, modified_only),
        Commands::Upgrade { files } => cmd_upgrade(config, &files),
        Commands::Validate { files } => cmd_validate(config, &files),
        Commands::Info { file } => cmd_info(config, &file),
    }
}

fn init_logging() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("ordoplay_editor_script=info".parse()?);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn open_registry(config: ScriptConfig) -> ScriptRegistry {
    let store = FileStore::new(config.format);
    ScriptRegistry::new(Arc::new(ScriptEnv::new(config)), store)
}

/// Document files under `dir`, sorted
fn collect_documents(dir: &Path, config: &ScriptConfig) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("Skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && config.is_document_path(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    paths.sort();
    paths
}

fn cmd_save_all(config: ScriptConfig, dir: &Path, modified_only: bool) -> Result<()> {
    let paths = collect_documents(dir, &config);
    let mut registry = open_registry(config);
    let mut load_failures = 0;
    for path in &paths {
        if let Err(err) = registry.load_document(path) {
            eprintln!("{}: {err}", path.display());
            load_failures += 1;
        }
    }

    let summary = registry.save_all(!modified_only);
    println!(
        "Saved {} documents, skipped {}, failed {}",
        summary.saved,
        summary.skipped,
        summary.failed.len() + load_failures
    );
    for (path, err) in &summary.failed {
        eprintln!("{}: {err}", path.display());
    }
    if load_failures > 0 || !summary.is_ok() {
        bail!("{} documents could not be saved", summary.failed.len() + load_failures);
    }
    Ok(())
}

fn cmd_upgrade(config: ScriptConfig, files: &[PathBuf]) -> Result<()> {
    let mut registry = open_registry(config);
    for path in files {
        let guid = registry
            .load_document(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        let modified = registry.document(guid).is_some_and(ScriptDocument::is_modified);
        if modified {
            registry
                .save_document(guid)
                .with_context(|| format!("Failed to save {}", path.display()))?;
            println!("Upgraded {}", path.display());
        } else {
            println!("Up to date {}", path.display());
        }
    }
    Ok(())
}

fn cmd_validate(config: ScriptConfig, files: &[PathBuf]) -> Result<()> {
    let mut registry = open_registry(config);
    let mut failed = 0;
    for path in files {
        let guid = match registry.load_document(path) {
            Ok(guid) => guid,
            Err(err) => {
                println!("{}: {err}", path.display());
                failed += 1;
                continue;
            }
        };
        let Some(document) = registry.document(guid) else {
            continue;
        };
        let diagnostics = document.validate();
        for diagnostic in diagnostics.entries() {
            println!("{}: {diagnostic}", path.display());
        }
        if diagnostics.has_errors() {
            failed += 1;
        }
        println!(
            "{}: {} errors, {} warnings",
            path.display(),
            diagnostics.error_count(),
            diagnostics.warning_count()
        );
    }
    if failed > 0 {
        bail!("{failed} of {} documents failed validation", files.len());
    }
    Ok(())
}

fn cmd_info(config: ScriptConfig, file: &Path) -> Result<()> {
    let mut registry = open_registry(config);
    let guid = registry
        .load_document(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    let Some(document) = registry.document(guid) else {
        bail!("Document {guid} vanished after loading");
    };

    println!("Document:      {}", document.guid());
    println!("Path:          {}", document.path().display());
    println!("Build version: {}", document.build_version());
    println!("Elements:      {}", document.tree().len());
    for kind in ElementKind::PERSISTED {
        let count = document.tree().elements().filter(|e| e.kind() == kind).count();
        if count > 0 {
            println!("  {:<36} {count}", kind.type_name());
        }
    }
    for element in document.tree().elements() {
        if let Some(graph) = element.as_graph() {
            println!(
                "Graph '{}' ({:?}): {} nodes, {} links",
                element.name(),
                graph.kind,
                graph.graph().node_count(),
                graph.graph().link_count()
            );
        }
    }
    let diagnostics = document.validate();
    println!(
        "Diagnostics:   {} errors, {} warnings",
        diagnostics.error_count(),
        diagnostics.warning_count()
    );
    Ok(())
}
