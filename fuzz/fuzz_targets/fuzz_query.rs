#![no_main]
use libfuzzer_sys::fuzz_target;
use xq::query::{Document, Expression};
use xq::serial::write_matches;

fuzz_target!(|data: &[u8]| {
    if let Ok(expr) = std::str::from_utf8(data) {
        // Evaluate against a small document that binds a prefix
        if let Ok(doc) = Document::parse_str(
            "<root xmlns:p=\"urn:p\"><child attr=\"val\">text</child><p:item/></root>",
        ) {
            if let Ok(expr) = Expression::compile(expr) {
                // Neither evaluation nor serialization should ever panic
                if let Ok(matches) = doc.evaluate(&expr) {
                    let _ = write_matches(&mut std::io::sink(), doc.prolog(), &matches);
                }
            }
        }
    }
});
