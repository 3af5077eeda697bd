//! HTTP-surface integration tests (scenarios S1, S2, S5 and the 404/400
//! edge cases), exercised against an in-process `actix_web::test` service
//! backed by `MockEngine` so these run without the vendored Lua tree.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{test, web, App};
use serde_json::json;

use ascent_engine::codec;
use ascent_engine::config::Config;
use ascent_engine::gate::RequestGate;
use ascent_engine::http::{self, AppState};
use ascent_engine::oracle::{EngineAdapter, MockEngine};
use ascent_engine::session::SessionRegistry;
use ascent_engine::tree::{NodeId, PassiveTreeGraph};

fn sample_pob_code(nodes: &[u32]) -> String {
    let allocated: BTreeSet<NodeId> = nodes.iter().copied().map(NodeId).collect();
    let nodes_csv = nodes.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
    let raw_xml = format!(
        r#"<PathOfBuilding><Build level="50" className="Warrior" ascendClassName="None"></Build><Tree><Spec treeVersion="3_24" nodes="{nodes_csv}"></Spec></Tree></PathOfBuilding>"#
    );
    codec::encode_build_code(&raw_xml, &allocated).unwrap()
}

async fn test_state() -> web::Data<AppState> {
    let mut engine = MockEngine::new();
    engine.initialize().unwrap();
    let gate = RequestGate::new(Box::new(engine));
    let tree = PassiveTreeGraph::load(Path::new("data/tree.json")).expect("load sample tree fixture");
    let registry = Arc::new(SessionRegistry::new(gate, Arc::new(tree), Duration::from_millis(500)));
    web::Data::new(AppState { registry, config: Config::default() })
}

#[actix_web::test]
async fn optimize_returns_a_pending_session_immediately() {
    let state = test_state().await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(http::configure)).await;

    let body = json!({
        "pob_code": sample_pob_code(&[1]),
        "metric": "dps",
        "unallocated_points": 5,
        "respec_points": 0,
    });
    let req = test::TestRequest::post().uri("/optimize").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "pending");
    assert!(body["session_id"].is_string());
}

#[actix_web::test]
async fn result_transitions_to_completed_for_a_tiny_budget() {
    let state = test_state().await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(http::configure)).await;

    let body = json!({
        "pob_code": sample_pob_code(&[1]),
        "metric": "dps",
        "unallocated_points": 3,
        "respec_points": 0,
    });
    let req = test::TestRequest::post().uri("/optimize").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    let submitted: serde_json::Value = test::read_body_json(resp).await;
    let session_id = submitted["session_id"].as_str().unwrap();

    let mut status = String::new();
    for _ in 0..50 {
        let req = test::TestRequest::get().uri(&format!("/result/{session_id}")).to_request();
        let resp = test::call_service(&app, req).await;
        let polled: serde_json::Value = test::read_body_json(resp).await;
        status = polled["status"].as_str().unwrap().to_string();
        if status == "completed" || status == "failed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, "completed");
}

#[actix_web::test]
async fn oversized_build_code_is_rejected_with_validation_error() {
    let state = test_state().await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(http::configure)).await;

    let body = json!({
        "pob_code": "A".repeat(110 * 1024),
        "metric": "dps",
        "unallocated_points": 0,
        "respec_points": 0,
    });
    let req = test::TestRequest::post().uri("/optimize").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error_type"], "ValidationError");
    assert!(body["action"].is_string());
}

#[actix_web::test]
async fn unknown_session_id_returns_404() {
    let state = test_state().await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(http::configure)).await;

    let req = test::TestRequest::get().uri("/result/00000000-0000-0000-0000-000000000000").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn cancel_is_idempotent_on_a_known_session() {
    let state = test_state().await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(http::configure)).await;

    let body = json!({
        "pob_code": sample_pob_code(&[1]),
        "metric": "dps",
        "unallocated_points": 0,
        "respec_points": 0,
    });
    let req = test::TestRequest::post().uri("/optimize").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    let submitted: serde_json::Value = test::read_body_json(resp).await;
    let session_id = submitted["session_id"].as_str().unwrap();

    for _ in 0..2 {
        let req = test::TestRequest::post().uri(&format!("/cancel/{session_id}")).to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
    }
}

#[actix_web::test]
async fn export_after_completion_returns_a_decodable_build_code() {
    let state = test_state().await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(http::configure)).await;

    let body = json!({
        "pob_code": sample_pob_code(&[1]),
        "metric": "dps",
        "unallocated_points": 3,
        "respec_points": 0,
    });
    let req = test::TestRequest::post().uri("/optimize").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    let submitted: serde_json::Value = test::read_body_json(resp).await;
    let session_id = submitted["session_id"].as_str().unwrap();

    let mut status = String::new();
    for _ in 0..50 {
        let req = test::TestRequest::get().uri(&format!("/result/{session_id}")).to_request();
        let resp = test::call_service(&app, req).await;
        let polled: serde_json::Value = test::read_body_json(resp).await;
        status = polled["status"].as_str().unwrap().to_string();
        if status == "completed" || status == "failed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, "completed");

    let req = test::TestRequest::get().uri(&format!("/export/{session_id}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let exported: serde_json::Value = test::read_body_json(resp).await;
    let decoded = codec::decode_build_code(exported["pob_code"].as_str().unwrap()).unwrap();
    assert!(decoded.build.allocated.contains(&NodeId(1)));
}
