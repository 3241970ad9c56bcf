pub mod init;
pub mod publish;
pub mod render;
pub mod validate;

pub use init::{init, InitArgs};
pub use publish::{publish, PublishArgs};
pub use render::{render, RenderArgs};
pub use validate::{validate, ValidateArgs};

use anyhow::{Context, Result};
use colored::Colorize;
use pagecraft_document::{from_json, ComponentRegistry, Loaded, Repair, RepairMode};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve `file` against the working directory
pub(crate) fn resolve(cwd: &str, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        PathBuf::from(cwd).join(file)
    }
}

pub(crate) fn load_document(
    path: &Path,
    registry: &ComponentRegistry,
    mode: RepairMode,
) -> Result<Loaded> {
    let json = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    from_json(&json, registry, mode).with_context(|| format!("Cannot load {}", path.display()))
}

/// Lines describing what a repair-mode load changed
pub(crate) fn repair_summary(repairs: &[Repair]) -> Vec<String> {
    repairs
        .iter()
        .map(|repair| format!("   {} {}", "repaired".yellow(), repair))
        .collect()
}
