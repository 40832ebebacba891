//! Integration tests for the HTTP endpoints.
//!
//! Requests go through the Axum `Router` via `tower::ServiceExt` without
//! binding a socket.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeDelta, Utc};
use madness_core::clock::ManualClock;
use madness_core::notifier::RecordingNotifier;
use madness_core::storage::MemoryStorage;
use madness_core::{AggregationEngine, EngineOptions};
use madness_observer::router::build_router;
use madness_observer::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "madnessboundary";

struct TestApp {
    router: Router,
    engine: Arc<AggregationEngine>,
    notifier: Arc<RecordingNotifier>,
}

fn app() -> TestApp {
    let clock = Arc::new(ManualClock::new(
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(1000),
    ));
    let notifier = Arc::new(RecordingNotifier::new());
    let storage = Arc::new(MemoryStorage::new());
    let engine = Arc::new(AggregationEngine::new(
        EngineOptions::default(),
        clock,
        notifier.clone(),
        storage,
    ));
    TestApp {
        router: build_router(Arc::new(AppState::new(engine.clone()))),
        engine,
        notifier,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn text_request(line: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/dink")
        .header("content-type", "text/plain")
        .body(Body::from(line.to_owned()))
        .unwrap()
}

fn multipart_request(field: &str, payload: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{payload}\r\n--{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/dink")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn clan_chat(message: &str) -> String {
    json!({
        "type": "CHAT",
        "playerName": "Scout",
        "extra": { "type": "CLAN_CHAT", "message": message }
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_answers_pong() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/ping")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app.router, request).await, (StatusCode::OK, "pong".to_owned()));
}

#[tokio::test]
async fn dink_multipart_loot_then_duplicate() {
    let app = app();
    let payload = clan_chat("Foo has defeated Bar and received (1,234,567 coins)");

    let first = send(&app.router, multipart_request("payload_json", &payload)).await;
    assert_eq!(first, (StatusCode::OK, "ok".to_owned()));

    let second = send(&app.router, multipart_request("payload_json", &payload)).await;
    assert_eq!(second, (StatusCode::OK, "dup".to_owned()));

    assert_eq!(app.engine.total_gp().await, 1_234_567);
    app.engine.flush().await;
    assert_eq!(app.notifier.kinds(), vec!["loot_detected"]);
}

#[tokio::test]
async fn dink_multipart_without_payload_is_bad_request() {
    let app = app();
    let (status, _) = send(&app.router, multipart_request("file", "{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dink_bad_json_is_bad_request() {
    let app = app();
    let (status, body) = send(&app.router, multipart_request("payload_json", "{ nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn dink_non_combat_chat_is_no_content() {
    let app = app();
    let (status, _) = send(
        &app.router,
        multipart_request("payload_json", &clan_chat("anyone for barrows?")),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app.router,
        json_request("POST", "/dink", &json!({ "type": "LEVEL", "extra": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn dink_plain_text_line() {
    let app = app();
    let (status, body) = send(
        &app.router,
        text_request("Foo has defeated Bar and received (5k coins) worth of loot!"),
    )
    .await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "ok"));
    assert_eq!(app.engine.total_gp().await, 5_000);
}

#[tokio::test]
async fn dink_structured_kill_and_loot() {
    let app = app();
    let kill = json!({
        "type": "PLAYER_KILL",
        "playerName": "Foo",
        "extra": { "victimName": "Bar" }
    });
    let (status, _) = send(&app.router, json_request("POST", "/dink", &kill)).await;
    assert_eq!(status, StatusCode::OK);

    let loot = json!({ "killer": "Foo", "victim": "Baz", "gp": "2m" });
    let (status, _) = send(&app.router, json_request("POST", "/dink", &loot)).await;
    assert_eq!(status, StatusCode::OK);

    let round = app.engine.current_round().await;
    assert_eq!(round.total_gp(), 2_000_000);
}

#[tokio::test]
async fn dink_zero_gp_is_invalid() {
    let app = app();
    let loot = json!({ "killer": "Foo", "victim": "Bar", "gp": 0 });
    let (status, body) = send(&app.router, json_request("POST", "/dink", &loot)).await;
    assert_eq!((status, body.as_str()), (StatusCode::BAD_REQUEST, "invalid"));
}

#[tokio::test]
async fn dink_gp_of_wrong_type_is_bad_request() {
    let app = app();
    for gp in [json!(-5), json!(1.5), json!(true)] {
        let loot = json!({ "killer": "Foo", "victim": "Bar", "gp": gp });
        let (status, body) = send(&app.router, json_request("POST", "/dink", &loot)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "gp {gp}");
        assert!(body.contains("not a GP amount"), "gp {gp}: {body}");
    }
    assert_eq!(app.engine.total_gp().await, 0);
}

#[tokio::test]
async fn dink_non_clan_is_no_content_in_clan_only_mode() {
    let app = app();
    app.engine.set_clan_only(true).await;
    app.engine.register(["foo"]).await;

    let (status, _) = send(
        &app.router,
        text_request("Foo has defeated Stranger and received (1,000 coins)"),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.engine.total_gp().await, 0);
}

#[tokio::test]
async fn dink_unknown_content_type_is_bad_request() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/dink")
        .header("content-type", "application/octet-stream")
        .body(Body::from("x"))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("no payload_json"));
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn event_lifecycle() {
    let app = app();
    let (status, body) = send(
        &app.router,
        json_request("POST", "/api/events", &json!({ "name": " Comp1 " })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["name"], "comp1");

    let (status, _) = send(
        &app.router,
        json_request("POST", "/api/events", &json!({ "name": "comp1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app.router, get("/api/events")).await;
    let events: Value = serde_json::from_str(&body).unwrap();
    assert!(
        events
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e["name"] == "comp1" && e["current"] == true)
    );

    let request = Request::builder()
        .method("POST")
        .uri("/api/events/finish")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    let finished: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(finished["name"], "comp1");
    assert!(
        finished["snapshot_ref"]
            .as_str()
            .unwrap()
            .starts_with("comp1-")
    );
}

#[tokio::test]
async fn roster_and_clan_only() {
    let app = app();
    let (_, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/roster/register",
            &json!({ "names": ["Foo", " bar ", ""] }),
        ),
    )
    .await;
    let added: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(added["added"], json!(["foo", "bar"]));

    let (_, body) = send(
        &app.router,
        json_request("PUT", "/api/clan-only", &json!({ "enabled": true })),
    )
    .await;
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap()["previous"],
        false
    );

    let (_, body) = send(&app.router, get("/api/roster")).await;
    let roster: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(roster["clanOnly"], true);
    assert_eq!(roster["members"], json!(["bar", "foo"]));
}

#[tokio::test]
async fn leaderboards_and_total() {
    let app = app();
    for line in [
        "Foo has defeated Bar and received (3,000 coins)",
        "Baz has defeated Bar and received (1,000 coins)",
        "Foo has defeated Qux and received (500 coins)",
    ] {
        send(&app.router, text_request(line)).await;
    }

    let (_, body) = send(&app.router, get("/api/hiscores?period=weekly")).await;
    let rows: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(rows[0]["player"], "foo");
    assert_eq!(rows[0]["value"], 2);

    let (_, body) = send(&app.router, get("/api/lootboard?name=BAZ")).await;
    let rows: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(rows, json!([{ "player": "baz", "value": 1000 }]));

    let (status, _) = send(&app.router, get("/api/hiscores?period=fortnight")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app.router, get("/api/total-gp")).await;
    let total: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(total, json!({ "event": "default", "gp": 4500 }));

    app.engine.create_event("Comp1").await.unwrap();
    send(&app.router, text_request("Qux has defeated Foo and received (250 coins)")).await;
    let (_, body) = send(&app.router, get("/api/total-gp")).await;
    let total: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(total, json!({ "event": "comp1", "gp": 250 }));
}

#[tokio::test]
async fn bounty_flow_pays_out_on_kill() {
    let app = app();
    for (poster, amount) in [("u1", json!("5m")), ("u2", json!(2_000_000))] {
        let (status, _) = send(
            &app.router,
            json_request(
                "POST",
                "/api/bounties",
                &json!({ "kind": "once", "target": "EvilGuy", "amount": amount, "poster": poster }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(&app.router, get("/api/bounties")).await;
    let listing: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(listing["once"][0]["target"], "evilguy");
    assert_eq!(listing["once"][0]["pool"]["total"], 7_000_000);

    let (status, _) = send(
        &app.router,
        text_request("Hero has defeated EvilGuy and received (10 coins)"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app.router, get("/api/bounties")).await;
    let listing: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(listing["once"], json!([]));

    app.engine.flush().await;
    assert!(app.notifier.kinds().contains(&"bounty_claimed"));
}

#[tokio::test]
async fn bounty_remove_clamps_and_rejects_bad_amounts() {
    let app = app();
    send(
        &app.router,
        json_request(
            "POST",
            "/api/bounties",
            &json!({ "kind": "persistent", "target": "x", "amount": 100, "poster": "u1" }),
        ),
    )
    .await;

    let (_, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/bounties/remove",
            &json!({ "kind": "persistent", "target": "x", "amount": 500, "poster": "u1" }),
        ),
    )
    .await;
    let withdrawal: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(withdrawal["withdrawn"], 100);
    assert_eq!(withdrawal["clamped"], true);

    for amount in [json!(0), json!("lots"), json!(-5)] {
        let (status, _) = send(
            &app.router,
            json_request(
                "POST",
                "/api/bounties",
                &json!({ "kind": "once", "target": "x", "amount": amount, "poster": "u1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn raglist_add_list_remove() {
    let app = app();
    let (_, body) = send(
        &app.router,
        json_request("POST", "/api/raglist", &json!({ "names": ["EvilGuy", "evilguy"] })),
    )
    .await;
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap()["added"],
        json!(["evilguy"])
    );

    let (_, body) = send(&app.router, get("/api/raglist")).await;
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!(["evilguy"]));

    let (_, body) = send(
        &app.router,
        json_request("POST", "/api/raglist/remove", &json!({ "names": ["EVILGUY"] })),
    )
    .await;
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap()["removed"],
        json!(["evilguy"])
    );
}
