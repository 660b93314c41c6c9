pub mod extract;
pub mod level;
pub mod markdown;

use scraper::Html;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use extract::ExtractError;
use level::Level;

/// One lesson in the output document. `child` is always empty for now and
/// exists for future nesting of related lessons.
#[derive(Debug, Serialize, Deserialize)]
pub struct GrammarEntry {
    pub id: String,
    pub uuid: String,
    pub title: String,
    pub content: String,
    pub level: Level,
    pub child: Vec<GrammarEntry>,
}

#[derive(Debug, Error)]
pub enum FragmentError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("markdown conversion failed: {0}")]
    Markdown(#[from] std::io::Error),
}

/// Fragment HTML → grammar entry: extract title and body, convert the body
/// to markdown, classify by page number. The uuid is freshly generated, so
/// reconverting the same input yields a new one.
pub fn process_fragment(
    stem: &str,
    number: u64,
    html: &str,
) -> Result<GrammarEntry, FragmentError> {
    let doc = Html::parse_document(html);
    let parts = extract::fragment_parts(&doc)?;
    let content = markdown::convert(&parts.body_html)?;

    Ok(GrammarEntry {
        id: stem.to_string(),
        uuid: Uuid::new_v4().to_string(),
        title: parts.title,
        content,
        level: Level::from_page_number(number),
        child: Vec::new(),
    })
}
