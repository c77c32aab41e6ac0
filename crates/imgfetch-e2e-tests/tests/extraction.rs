use imgfetch_e2e_tests::{GALLERY_PAGE, SIMPLE_PAGE};
use imgfetch_lib::ImageReference;
use imgfetch_lib::extract::{dedup_references, extract_image_references};
use imgfetch_lib::resolve::resolve;

#[test]
fn test_simple_page_yields_single_reference() {
    let references = extract_image_references(SIMPLE_PAGE);

    assert_eq!(references, vec![ImageReference::parse("cat.png")]);
    assert_eq!(
        resolve("http://example.com", &references[0]).as_str(),
        "http://example.com/cat.png"
    );
}

#[test]
fn test_gallery_page_yields_all_image_tags() {
    let references = extract_image_references(GALLERY_PAGE);

    assert_eq!(references.len(), 21);
    assert_eq!(dedup_references(references).len(), 21);
}

#[test]
fn test_gallery_page_ignores_scripts_and_stylesheets() {
    let references = extract_image_references(GALLERY_PAGE);

    assert!(
        references
            .iter()
            .all(|reference| !reference.path().ends_with(".js") && !reference.path().ends_with(".css"))
    );
}
