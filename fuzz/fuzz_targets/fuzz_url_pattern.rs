#![no_main]

use libfuzzer_sys::fuzz_target;
use scenarist::config::schema::UrlPattern;
use scenarist::dynamic::url::UrlMatcher;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // First line is the pattern, the rest is the request URL
    let (pattern, url) = text.split_once('\n').unwrap_or((text, "/"));
    if let Ok(matcher) = UrlMatcher::compile(&UrlPattern::Template(pattern.to_string())) {
        let _ = matcher.match_url(url);
    }
});
