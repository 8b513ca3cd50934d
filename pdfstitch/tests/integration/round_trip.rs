//! The engine without any fetching: load, append, serialize, reload.

use crate::common::{compressed_donor, donor, expected_texts, lopdf_page_texts, page_texts};
use pdfstitch::merge::append_document;
use pdfstitch::pdf::{Document, WriteOptions, XrefFormat, clone_pages, serialize};
use proptest::prelude::*;
use rstest::rstest;

fn merge_bytes(donors: &[Vec<u8>], format: XrefFormat) -> Vec<u8> {
    let mut merged = Document::new();
    for bytes in donors {
        let mut source = Document::load(bytes.clone()).unwrap();
        append_document(&mut merged, &mut source).unwrap();
    }
    serialize(&mut merged, &WriteOptions { xref_format: format }).unwrap()
}

#[rstest]
#[case::table(XrefFormat::Table)]
#[case::stream(XrefFormat::Stream)]
fn test_reload_matches(#[case] format: XrefFormat) {
    let bytes = merge_bytes(&[donor("A", 2), compressed_donor("B", 2)], format);

    let reloaded = Document::load(bytes.clone()).unwrap();
    assert_eq!(reloaded.page_count(), 4);
    assert_eq!(
        page_texts(&bytes),
        expected_texts(&[("A", 2), ("B", 2)])
    );
}

#[test]
fn test_reserialize_is_stable() {
    let once = merge_bytes(&[donor("A", 3)], XrefFormat::Table);
    let twice = merge_bytes(&[once.clone()], XrefFormat::Table);

    assert_eq!(page_texts(&once), page_texts(&twice));
    assert_eq!(
        Document::load(once).unwrap().page_count(),
        Document::load(twice).unwrap().page_count()
    );
}

#[test]
fn test_selected_pages_in_requested_order() {
    let mut source = Document::load(donor("S", 4)).unwrap();
    let mut merged = Document::new();

    for page in clone_pages(&mut source, &[3, 0], &mut merged).unwrap() {
        merged.append_page(page).unwrap();
    }
    let bytes = serialize(&mut merged, &WriteOptions::default()).unwrap();

    assert_eq!(
        page_texts(&bytes),
        vec![
            crate::common::page_text("S", 3),
            crate::common::page_text("S", 0)
        ]
    );
}

#[test]
fn test_empty_document_serializes() {
    let mut merged = Document::new();
    let bytes = serialize(&mut merged, &WriteOptions::default()).unwrap();

    assert!(bytes.starts_with(b"%PDF-"));
    assert_eq!(Document::load(bytes).unwrap().page_count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_pages_concatenate_in_order(
        counts in prop::collection::vec(0usize..4, 1..5),
        packed in any::<bool>(),
        stream_xref in any::<bool>(),
    ) {
        let labels: Vec<String> = (0..counts.len()).map(|i| format!("D{i}")).collect();
        let donors: Vec<Vec<u8>> = labels
            .iter()
            .zip(&counts)
            .map(|(label, pages)| {
                if packed {
                    compressed_donor(label, *pages)
                } else {
                    donor(label, *pages)
                }
            })
            .collect();
        let format = if stream_xref { XrefFormat::Stream } else { XrefFormat::Table };

        let bytes = merge_bytes(&donors, format);

        let plan: Vec<(&str, usize)> = labels
            .iter()
            .map(String::as_str)
            .zip(counts.iter().copied())
            .collect();
        let expected = expected_texts(&plan);

        prop_assert_eq!(
            Document::load(bytes.clone()).unwrap().page_count(),
            counts.iter().sum::<usize>()
        );
        prop_assert_eq!(page_texts(&bytes), expected.clone());
        prop_assert_eq!(lopdf_page_texts(&bytes), expected);
    }
}
