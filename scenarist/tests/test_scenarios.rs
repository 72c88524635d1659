mod common;

use serde_json::json;

use common::{engine, mocked, request};
use scenarist::config::schema::{ErrorBehavior, ErrorBehaviors, ScenaristConfig};
use scenarist::{Resolution, ScenarioError};

#[test]
fn premium_header_match_with_default_fallback() {
    let scenarist = engine("shop.yaml", ScenaristConfig::default());
    scenarist.manager().switch_scenario("t1", "premium", None).unwrap();

    let premium = request("t1", "GET", "http://app.test/api/user").with_header("X-Tier", "premium");
    assert_eq!(
        mocked(scenarist.dispatch(&premium).unwrap()),
        (200, json!({"tier": "premium"}))
    );

    let plain = request("t1", "GET", "http://app.test/api/user");
    assert_eq!(
        mocked(scenarist.dispatch(&plain).unwrap()),
        (200, json!({"tier": "standard"}))
    );
}

#[test]
fn path_params_reach_templates() {
    let scenarist = engine("shop.yaml", ScenaristConfig::default());
    let resolution = scenarist
        .dispatch(&request("t1", "GET", "/api/users/42"))
        .unwrap();
    assert_eq!(
        mocked(resolution).1,
        json!({"id": "42", "label": "user 42"})
    );
}

#[test]
fn sequence_without_repeat_runs_out() {
    let config = ScenaristConfig {
        error_behaviors: ErrorBehaviors {
            on_no_mock_found: ErrorBehavior::Throw,
            on_sequence_exhausted: ErrorBehavior::Throw,
            ..ErrorBehaviors::default()
        },
        ..ScenaristConfig::default()
    };
    let scenarist = engine("shop.yaml", config);
    scenarist.manager().switch_scenario("t1", "polling", None).unwrap();

    let poll = request("t1", "GET", "/api/jobs/7");
    assert_eq!(mocked(scenarist.dispatch(&poll).unwrap()).1["status"], "pending");
    assert_eq!(mocked(scenarist.dispatch(&poll).unwrap()).1["status"], "done");
    let err = scenarist.dispatch(&poll).unwrap_err();
    assert_eq!(err.code(), "SEQUENCE_EXHAUSTED");
}

#[test]
fn exhausted_sequence_passes_through_by_default() {
    let scenarist = engine("shop.yaml", ScenaristConfig::default());
    scenarist.manager().switch_scenario("t1", "polling", None).unwrap();
    let poll = request("t1", "GET", "/api/jobs/7");
    scenarist.dispatch(&poll).unwrap();
    scenarist.dispatch(&poll).unwrap();
    assert_eq!(scenarist.dispatch(&poll).unwrap(), Resolution::Passthrough);
}

#[test]
fn state_response_follows_after_response() {
    let scenarist = engine("shop.yaml", ScenaristConfig::default());
    scenarist.manager().switch_scenario("t1", "checkout", None).unwrap();

    let order = request("t1", "POST", "/api/orders");
    assert_eq!(mocked(scenarist.dispatch(&order).unwrap()).1, json!({"state": "new"}));
    assert_eq!(
        mocked(scenarist.dispatch(&order).unwrap()).1,
        json!({"state": "processing"})
    );
}

#[test]
fn captured_state_is_echoed_and_accumulates() {
    let scenarist = engine("shop.yaml", ScenaristConfig::default());
    scenarist.manager().switch_scenario("t1", "checkout", None).unwrap();

    let add = |sku: &str| {
        request("t1", "POST", "/api/cart")
            .with_header("X-User", "ada")
            .with_json(&json!({"sku": sku}))
    };
    let (status, body) = mocked(scenarist.dispatch(&add("a")).unwrap());
    assert_eq!(status, 201);
    assert_eq!(body, json!({"owner": "ada", "count": 1}));
    let (_, body) = mocked(scenarist.dispatch(&add("b")).unwrap());
    assert_eq!(body["count"], 2);

    let (_, cart) = mocked(scenarist.dispatch(&request("t1", "GET", "/api/cart")).unwrap());
    assert_eq!(cart, json!({"items": ["a", "b"], "missing": null}));
}

#[test]
fn test_ids_are_isolated() {
    let scenarist = engine("shop.yaml", ScenaristConfig::default());
    let manager = scenarist.manager();
    manager.switch_scenario("a", "checkout", None).unwrap();
    manager.switch_scenario("b", "checkout", None).unwrap();

    let add = request("a", "POST", "/api/cart").with_json(&json!({"sku": "x"}));
    scenarist.dispatch(&add).unwrap();

    let (_, cart_b) = mocked(scenarist.dispatch(&request("b", "GET", "/api/cart")).unwrap());
    assert_eq!(cart_b["items"], json!(null));
    assert!(manager.state().get_all("b").is_empty());

    // Test "c" never switched and sees only the default scenario.
    let (_, user) = mocked(scenarist.dispatch(&request("c", "GET", "/api/user")).unwrap());
    assert_eq!(user, json!({"tier": "standard"}));
    assert!(manager.get_active_scenario("c").is_none());
}

#[test]
fn switching_resets_progress() {
    let scenarist = engine("shop.yaml", ScenaristConfig::default());
    let manager = scenarist.manager();
    manager.switch_scenario("t1", "polling", None).unwrap();
    let poll = request("t1", "GET", "/api/jobs/1");
    scenarist.dispatch(&poll).unwrap();

    manager.switch_scenario("t1", "polling", None).unwrap();
    assert_eq!(mocked(scenarist.dispatch(&poll).unwrap()).1["status"], "pending");
}

#[test]
fn unknown_scenario_is_a_typed_error() {
    let scenarist = engine("shop.yaml", ScenaristConfig::default());
    let err = scenarist
        .manager()
        .switch_scenario("t1", "checkot", None)
        .unwrap_err();
    assert_eq!(
        err,
        ScenarioError::NotFound {
            id: "checkot".into(),
            suggestion: Some("checkout".into()),
        }
    );
}

#[test]
fn json_fixture_with_regex_url() {
    let scenarist = engine("single.json", ScenaristConfig {
        default_scenario_id: "json-only".into(),
        ..ScenaristConfig::default()
    });
    let resolution = scenarist
        .dispatch(&request("t1", "GET", "https://svc.internal/status/HEALTH"))
        .unwrap();
    assert_eq!(mocked(resolution).1, json!("ok"));
}
