//! Shared integration-test helpers.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::Output;

use serde_json::Value;

use scenarist::config::ScenarioLoader;
use scenarist::config::schema::ScenaristConfig;
use scenarist::{InterceptedRequest, Resolution, Scenarist};

/// Header carrying the test id in every fixture.
pub const TEST_ID_HEADER: &str = "x-scenarist-test-id";

/// Absolute path of a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Runs the `scenarist` binary to completion.
#[allow(clippy::missing_panics_doc)]
pub fn spawn_command(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_scenarist"))
        .args(args)
        .env_remove("SCENARIST_LOG_LEVEL")
        .output()
        .expect("failed to run scenarist")
}

/// A started engine with every scenario from `fixture` registered.
#[allow(clippy::missing_panics_doc)]
pub fn engine(fixture: &str, config: ScenaristConfig) -> Scenarist {
    let scenarist = Scenarist::new(config);
    let loaded = ScenarioLoader::with_defaults()
        .load(&fixture_path(fixture))
        .expect("fixture loads");
    for definition in loaded.scenarios {
        scenarist
            .manager()
            .register_scenario(definition)
            .expect("fixture registers");
    }
    scenarist.start();
    scenarist
}

/// A request tagged with `test_id`.
pub fn request(test_id: &str, method: &str, url: &str) -> InterceptedRequest {
    InterceptedRequest::new(method, url).with_header(TEST_ID_HEADER, test_id)
}

/// Status and JSON body of a mocked resolution.
#[allow(clippy::missing_panics_doc)]
pub fn mocked(resolution: Resolution) -> (u16, Value) {
    match resolution {
        Resolution::Respond(response) => (response.status, response.body.unwrap_or(Value::Null)),
        Resolution::Passthrough => panic!("expected a mocked response, got pass-through"),
    }
}
