use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

static CONTENT_ROOT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.grammar-content").unwrap());
static GRAMMAR_MARKER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.grammar").unwrap());

/// Why a fragment yielded no entry. `ContainerMissing` is the not-found case;
/// the rest are violations of the expected heading/title structure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("grammar-content container not found")]
    ContainerMissing,
    #[error("grammar marker span not found in container")]
    MarkerMissing,
    #[error("no heading ancestor above the grammar marker")]
    HeadingMissing,
    #[error("no title paragraph after the heading")]
    TitleMissing,
}

/// Title and body pulled out of one fragment.
#[derive(Debug)]
pub struct FragmentParts {
    pub title: String,
    pub body_html: String,
}

/// Locate the `div.grammar-content` content root in a parsed page.
pub fn content_root(doc: &Html) -> Option<ElementRef<'_>> {
    doc.select(&CONTENT_ROOT).next()
}

/// Pull title and body out of a fragment.
///
/// The title is the text of the first `p` following the `h1` that wraps the
/// `span.grammar` marker; the body is the container's children serialized in
/// document order.
pub fn fragment_parts(doc: &Html) -> Result<FragmentParts, ExtractError> {
    let root = content_root(doc).ok_or(ExtractError::ContainerMissing)?;
    let marker = root
        .select(&GRAMMAR_MARKER)
        .next()
        .ok_or(ExtractError::MarkerMissing)?;
    let heading = marker
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "h1")
        .ok_or(ExtractError::HeadingMissing)?;
    let title = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "p")
        .ok_or(ExtractError::TitleMissing)?
        .text()
        .collect::<String>()
        .trim()
        .to_string();

    Ok(FragmentParts {
        title,
        body_html: root.inner_html(),
    })
}
