#![no_main]

use std::io::Cursor;
use std::path::Path;

use libfuzzer_sys::fuzz_target;
use widx::FileCorpus;

fuzz_target!(|data: &[u8]| {
    // Arbitrary header bytes must error cleanly, never panic.
    let _ = FileCorpus::from_header(Path::new("."), &mut Cursor::new(data));
});
