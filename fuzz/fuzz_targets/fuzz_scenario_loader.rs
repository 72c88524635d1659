#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use scenarist::config::ScenarioLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Errors are fine; panics are not
        let _ = ScenarioLoader::with_defaults().load_str(text, Path::new("fuzz.yaml"));
    }
});
