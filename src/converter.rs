use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::parser::extract::ExtractError;
use crate::parser::{self, FragmentError};
use crate::store;

/// Conversion tallies reported after the batch completes.
pub struct ConvertStats {
    pub scanned: usize,
    pub converted: usize,
    pub skipped: usize,
}

/// Transform every saved fragment under `input_dir` into one JSON array at
/// `output_file`, ascending by numeric page id. The output is written once,
/// after the whole batch: an interrupted run leaves no partial file.
pub fn convert(input_dir: &Path, output_file: &Path) -> Result<ConvertStats> {
    let pages = store::list_fragments(input_dir)?;
    let scanned = pages.len();

    let pb = ProgressBar::new(scanned as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut entries = Vec::with_capacity(scanned);
    let mut skipped = 0usize;

    for page in &pages {
        let html = fs::read_to_string(&page.path)
            .with_context(|| format!("failed to read {}", page.path.display()))?;

        match parser::process_fragment(&page.stem, page.number, &html) {
            Ok(entry) => entries.push(entry),
            Err(FragmentError::Extract(ExtractError::ContainerMissing)) => {
                // fetch only saves pages with a container; a stray file is
                // not worth a warning
                debug!("{}: no content container, skipping", page.stem);
                skipped += 1;
            }
            Err(e) => {
                warn!("{}: {}, skipping", page.stem, e);
                skipped += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let converted = entries.len();
    store::write_entries(output_file, &entries)?;
    info!(
        "Converted {} fragments ({} skipped) to {}",
        converted,
        skipped,
        output_file.display()
    );

    Ok(ConvertStats {
        scanned,
        converted,
        skipped,
    })
}
