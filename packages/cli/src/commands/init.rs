use crate::config::{Config, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use pagecraft_document::{to_json, Breakpoint, ComponentRegistry, Document, Props};
use serde_json::json;
use std::fs;
use std::path::PathBuf;

use super::resolve;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Page document to create
    #[arg(default_value = "page.json")]
    pub file: PathBuf,

    /// Force overwrite an existing document
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let path = resolve(cwd, &args.file);

    if path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            args.file.display().to_string().bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing Pagecraft page...".bright_blue().bold());

    let config = Config::load(cwd)?;
    let registry = config.registry(cwd)?;
    let document = starter_document(&registry)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, to_json(&document)?)?;
    println!("  {} Created {}", "✓".green(), args.file.display());

    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);
    if !config_path.exists() {
        fs::write(&config_path, serde_json::to_string_pretty(&Config::default())?)?;
        println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    }

    println!();
    println!("{}", "✨ Page initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {}", args.file.display());
    println!(
        "  2. Run {} to check it",
        format!("pagecraft validate {}", args.file.display()).bright_white()
    );
    println!("  3. Run {} to publish", "pagecraft publish --store <id>".bright_white());

    Ok(())
}

/// Hero section with a heading and a call to action
fn starter_document(registry: &ComponentRegistry) -> Result<Document> {
    let mut document = Document::new(registry, "Container", &Props::new())?;
    let root = document.tree().root_id().to_string();

    let hero_props: Props = [("padding".to_string(), json!("p-8"))].into_iter().collect();
    let hero = document.create_node(registry, "Container", &hero_props, &root, 0)?.value;

    let heading_props: Props = [
        ("text".to_string(), json!("Welcome to our store")),
        ("fontSize".to_string(), json!("text-3xl")),
        ("textAlign".to_string(), json!("text-center")),
    ]
    .into_iter()
    .collect();
    let heading = document.create_node(registry, "Text", &heading_props, &hero, 0)?.value;
    let mobile: Props = [("fontSize".to_string(), json!("text-xl"))].into_iter().collect();
    document.update_props(registry, &heading, Breakpoint::Mobile, &mobile)?;

    let button_props: Props = [("children".to_string(), json!("Shop now"))].into_iter().collect();
    document.create_node(registry, "Button", &button_props, &hero, 1)?;

    Ok(document)
}
