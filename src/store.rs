use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::parser::GrammarEntry;

pub const DEFAULT_PAGES_DIR: &str = "grammar_pages";
pub const DEFAULT_OUTPUT_FILE: &str = "grammar_data.json";

/// A saved fragment on disk, keyed by its numeric filename stem.
#[derive(Debug, Clone)]
pub struct PageFile {
    pub stem: String,
    pub number: u64,
    pub path: PathBuf,
}

/// `17` → `0017.html`. Ids above 9999 keep their natural width.
pub fn fragment_name(id: u32) -> String {
    format!("{id:04}.html")
}

/// Write one fetched fragment. Single complete write, never mutated after.
pub fn save_fragment(dir: &Path, id: u32, html: &str) -> Result<PathBuf> {
    let path = dir.join(fragment_name(id));
    fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// All `.html` files with a numeric stem, ascending by numeric value
/// ("10" sorts after "2", unlike a lexical listing of unpadded names).
pub fn list_fragments(dir: &Path) -> Result<Vec<PageFile>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    let mut pages = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Ok(number) = stem.parse::<u64>() else {
            continue;
        };
        pages.push(PageFile {
            stem: stem.to_string(),
            number,
            path,
        });
    }
    pages.sort_by_key(|p| p.number);
    Ok(pages)
}

/// Serialize the full entry list as one pretty-printed JSON array. Non-ASCII
/// text stays literal, and the file lands in a single all-or-nothing write.
pub fn write_entries(path: &Path, entries: &[GrammarEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(entries).context("failed to serialize entries")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
