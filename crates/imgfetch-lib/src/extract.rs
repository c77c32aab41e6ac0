use crate::reference::ImageReference;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

// Quoted `src` values only. CSS backgrounds and script-inserted images are not
// covered.
static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img.*?src=["'](?P<image_link>[^'"]+)"#).expect("image src pattern is valid")
});

/// Extracts the `src` of every `<img>` tag in document order, keeping
/// duplicates.
pub fn extract_image_references(page_text: &str) -> Vec<ImageReference> {
    let references: Vec<ImageReference> = IMG_SRC
        .captures_iter(page_text)
        .filter_map(|captures| captures.name("image_link"))
        .map(|link| ImageReference::parse(link.as_str()))
        .collect();
    tracing::info!("Got {} image URIs", references.len());
    references
}

pub fn dedup_references(
    references: impl IntoIterator<Item = ImageReference>,
) -> BTreeSet<ImageReference> {
    let unique: BTreeSet<ImageReference> = references.into_iter().collect();
    tracing::debug!("{} distinct image URIs after deduplication", unique.len());
    unique
}
