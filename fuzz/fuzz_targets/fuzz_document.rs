#![no_main]
use libfuzzer_sys::fuzz_target;
use xq::query::{Document, Expression};
use xq::serial::write_matches;
use xq::source::InputStream;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes go through decoding, parsing and root serialization
    let input = InputStream::new("fuzz", std::io::Cursor::new(data.to_vec()));
    if let Ok(doc) = Document::parse(input) {
        if let Ok(expr) = Expression::compile("/") {
            if let Ok(matches) = doc.evaluate(&expr) {
                let _ = write_matches(&mut std::io::sink(), doc.prolog(), &matches);
            }
        }
    }
});
