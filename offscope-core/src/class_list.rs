//! Loader for the newline-separated class-name allow-list.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use tracing::{debug, info};

use crate::errors::Result;

/// Read an allow-list file: one class name per line, surrounding whitespace
/// trimmed, blank lines ignored. Duplicates collapse into the set.
pub fn read_class_list(path: &Path) -> Result<HashSet<String>> {
    info!("reading class list {}", path.display());
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot open class list {}", path.display()))?;

    let mut names = HashSet::new();
    for line in text.lines() {
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        debug!("- {name}");
        names.insert(name.to_string());
    }
    Ok(names)
}
