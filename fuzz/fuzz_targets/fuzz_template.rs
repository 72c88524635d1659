#![no_main]

use libfuzzer_sys::fuzz_target;
use scenarist::dynamic::context::TemplateContext;
use scenarist::dynamic::template::apply_templates;
use serde_json::{Map, Value, json};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let state = match json!({"user": {"tier": "gold", "roles": ["a", "b"]}, "count": 3}) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let mut params = Map::new();
    params.insert("id".into(), Value::String("42".into()));

    let ctx = TemplateContext::new(&state, &params);
    let _ = apply_templates(&Value::String(text.to_string()), &ctx);
});
