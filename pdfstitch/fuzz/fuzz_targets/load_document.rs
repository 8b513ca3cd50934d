#![no_main]

use libfuzzer_sys::fuzz_target;
use pdfstitch::merge::append_document;
use pdfstitch::pdf::{Document, WriteOptions, XrefFormat, serialize};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the parser; errors are fine.
    let Ok(mut donor) = Document::load(data.to_vec()) else {
        return;
    };

    let mut merged = Document::new();
    if append_document(&mut merged, &mut donor).is_err() {
        return;
    }

    let options = WriteOptions {
        xref_format: XrefFormat::Stream,
    };
    let bytes = serialize(&mut merged, &options).expect("cloned pages always serialize");
    let reloaded = Document::load(bytes).expect("own output always parses");
    assert_eq!(reloaded.page_count(), merged.page_count());
});
