mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{init, publish, render, validate, InitArgs, PublishArgs, RenderArgs, ValidateArgs};
use tracing_subscriber::EnvFilter;

/// Pagecraft CLI - storefront page documents from the terminal
#[derive(Parser, Debug)]
#[command(name = "pagecraft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a starter page document
    Init(InitArgs),

    /// Check a page document for structural problems
    Validate(ValidateArgs),

    /// Print the render instructions for a breakpoint
    Render(RenderArgs),

    /// Publish a page document to the file store
    Publish(PublishArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| {
            let cwd = cwd.display().to_string();
            match cli.command {
                Command::Init(args) => init(args, &cwd),
                Command::Validate(args) => validate(args, &cwd),
                Command::Render(args) => render(args, &cwd),
                Command::Publish(args) => publish(args, &cwd),
            }
        });

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
