use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use pagecraft_document::to_json;
use pagecraft_editor::{
    FileStore, InvalidationStatus, LogInvalidator, PageKey, PublishError, PublishPipeline,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use super::{load_document, repair_summary, resolve};

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Page document to publish
    pub file: PathBuf,

    /// Store that owns the page
    #[arg(short, long)]
    pub store: String,

    /// Page slug
    #[arg(long, default_value = "home")]
    pub slug: String,

    /// Version the document was loaded from (defaults to the file's version)
    #[arg(short, long)]
    pub expected_version: Option<u64>,

    /// Store directory (overrides `storeRoot`)
    #[arg(long)]
    pub root: Option<PathBuf>,
}

pub fn publish(args: PublishArgs, cwd: &str) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(args, cwd))
}

async fn run(args: PublishArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let registry = Arc::new(config.registry(cwd)?);
    let path = resolve(cwd, &args.file);
    let loaded = load_document(&path, &registry, config.editor.repair)?;
    let mut document = loaded.document;

    let page = PageKey::new(args.store, args.slug)?;
    let root = match &args.root {
        Some(root) => resolve(cwd, root),
        None => config.get_store_root(cwd),
    };
    let expected = args.expected_version.unwrap_or_else(|| document.version());

    println!(
        "🚀 {} {} as {}",
        "Publishing".green().bold(),
        args.file.display(),
        page.to_string().bright_white()
    );
    println!("   Store:    {}", root.display());
    println!("   Expected: v{}", expected);
    if !loaded.repairs.is_empty() {
        println!(
            "   {} Publishing a repaired document ({} change(s)):",
            "⚠".yellow(),
            loaded.repairs.len()
        );
        for line in repair_summary(&loaded.repairs) {
            println!("{line}");
        }
    }

    let store = Arc::new(FileStore::new(&root));
    let pipeline =
        PublishPipeline::new(store, Arc::new(LogInvalidator), registry).with_config(&config.editor);

    let receipt = match pipeline.publish(&page, &document, expected).await {
        Ok(receipt) => receipt,
        Err(PublishError::Validation { problems }) => {
            for problem in &problems {
                println!("   {} {}", "✗".red(), problem);
            }
            return Err(anyhow!(
                "{} cannot be published until {} problem(s) are fixed",
                args.file.display(),
                problems.len()
            ));
        }
        Err(err @ PublishError::Conflict { .. }) => {
            println!(
                "   {} Another session published first; reload the latest version",
                "⚠".yellow()
            );
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    // Keep the local file in step so the next publish expects this version.
    document.mark_published(receipt.version);
    fs::write(&path, to_json(&document)?)?;

    println!();
    println!("✨ {} v{} (etag {})", "Published".green().bold(), receipt.version, receipt.etag);
    match receipt.invalidation {
        InvalidationStatus::Delivered => println!("   {} Cache invalidated", "✓".green()),
        InvalidationStatus::Failed { error, retry } => {
            println!("   {} Cache invalidation failed: {}; retrying", "⚠".yellow(), error);
            match retry.await? {
                Ok(attempts) => {
                    println!("   {} Cache invalidated after {} retries", "✓".green(), attempts)
                }
                Err(e) => println!("   {} {}", "✗".red(), e),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{init, InitArgs};
    use crate::config::DEFAULT_CONFIG_NAME;

    fn args(expected_version: Option<u64>) -> PublishArgs {
        PublishArgs {
            file: "page.json".into(),
            store: "shop-1".into(),
            slug: "home".into(),
            expected_version,
            root: None,
        }
    }

    #[test]
    fn test_publish_in_repair_mode_writes_repaired_document() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();
        fs::write(
            dir.path().join(DEFAULT_CONFIG_NAME),
            r#"{ "editor": { "repair": "repair" } }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("page.json"),
            r#"{
                "version": 0,
                "root": "r",
                "nodes": {
                    "r": { "type": "Container", "parentId": null, "childIds": ["ghost"], "canvas": true },
                    "t": { "type": "Text", "parentId": "r", "childIds": [] }
                }
            }"#,
        )
        .unwrap();

        publish(args(None), &cwd).unwrap();

        let published = fs::read_to_string(dir.path().join("page.json")).unwrap();
        assert!(published.contains("\"version\": 1"));
        assert!(!published.contains("ghost"));
    }

    #[test]
    fn test_publish_then_republish() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();
        init(InitArgs { file: "page.json".into(), force: false }, &cwd).unwrap();

        publish(args(None), &cwd).unwrap();
        assert!(dir.path().join(".pagecraft/shop-1/home.json").exists());

        // The file now records v1, so a second publish expects it.
        publish(args(None), &cwd).unwrap();

        let err = publish(args(Some(0)), &cwd).unwrap_err();
        assert!(err.to_string().contains("Version conflict"));
    }
}
