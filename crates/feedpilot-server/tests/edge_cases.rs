//! Edge case integration tests for feedpilot-server.
//!
//! Drives the JSON-RPC handler, the line transport and session persistence
//! against temp state files.

use std::sync::Arc;

use serde_json::{json, Value};

use feedpilot_server::config::engine_settings;
use feedpilot_server::protocol::ProtocolHandler;
use feedpilot_server::session::PilotSession;
use feedpilot_server::transport::{framing, StdioTransport};
use feedpilot_server::types::*;

// ─────────────────────── helpers ───────────────────────

fn state_path(dir: &tempfile::TempDir) -> String {
    dir.path().join("state.json").to_str().unwrap().to_string()
}

/// Open a session on a temp state file with a long pacing interval.
fn temp_session(dir: &tempfile::TempDir) -> Arc<PilotSession> {
    let settings = engine_settings(Some(60_000), Some(500), Some(7));
    Arc::new(PilotSession::open(&state_path(dir), settings).unwrap())
}

fn rpc_request(id: i64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

async fn send(handler: &ProtocolHandler, msg: Value) -> Option<Value> {
    let parsed: JsonRpcMessage = serde_json::from_value(msg).unwrap();
    handler.handle_message(parsed).await
}

async fn send_unwrap(handler: &ProtocolHandler, msg: Value) -> Value {
    send(handler, msg).await.expect("expected response")
}

fn error_code(resp: &Value) -> i64 {
    resp["error"]["code"].as_i64().unwrap_or_default()
}

fn rule_doc() -> Value {
    json!({
        "primaryAction": [
            { "pattern": "button.react", "successCount": 4, "failureCount": 1,
              "firstSeen": 1_700_000_000_000i64, "lastUsed": 1_700_000_500_000i64 }
        ],
        "alreadyActedIndicator": [],
        "repostIndicator": [],
        "secondaryAction": []
    })
}

// ═══════════════════════════════════════════════════════
// PROTOCOL
// ═══════════════════════════════════════════════════════

/// Test 1: malformed input is a parse error
#[tokio::test]
async fn test_01_malformed_json() {
    let err = framing::parse_message(r#"{"broken":"#).unwrap_err();
    assert_eq!(err.code(), -32700);
    assert!(framing::parse_message("").is_err());
    assert!(framing::parse_message(r#"{"jsonrpc":"2.0","id":1,"method":"#).is_err());

    println!("TEST 01 — Malformed JSON: PASS");
}

/// Test 2: unknown method
#[tokio::test]
async fn test_02_unknown_method() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ProtocolHandler::new(temp_session(&dir));

    let resp = send_unwrap(&handler, rpc_request(1, "like_everything", json!({}))).await;
    assert_eq!(error_code(&resp), -32601);
    assert_eq!(resp["id"], 1);

    println!("TEST 02 — Unknown Method: PASS");
}

/// Test 3: wrong protocol version
#[tokio::test]
async fn test_03_wrong_version() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ProtocolHandler::new(temp_session(&dir));

    let msg = json!({ "jsonrpc": "1.0", "id": 3, "method": "ping" });
    let resp = send_unwrap(&handler, msg).await;
    assert_eq!(error_code(&resp), -32600);

    println!("TEST 03 — Wrong Version: PASS");
}

/// Test 4: analyze without params, then with
#[tokio::test]
async fn test_04_analyze_params() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ProtocolHandler::new(temp_session(&dir));

    let missing = json!({ "jsonrpc": "2.0", "id": 4, "method": "analyze" });
    let resp = send_unwrap(&handler, missing).await;
    assert_eq!(error_code(&resp), -32602);

    let resp = send_unwrap(
        &handler,
        rpc_request(
            5,
            "analyze",
            json!({ "text": "Great news, I love this! Congrats team.", "author": "Dana" }),
        ),
    )
    .await;
    let result = &resp["result"];
    assert_eq!(result["label"], "positive");
    assert_eq!(result["toxic"], false);
    assert_eq!(result["shouldAct"], true);

    println!("TEST 04 — Analyze Params: PASS");
}

/// Test 5: notifications get no response
#[tokio::test]
async fn test_05_notification_silent() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ProtocolHandler::new(temp_session(&dir));

    let notif = json!({ "jsonrpc": "2.0", "method": "ping" });
    assert!(send(&handler, notif).await.is_none());

    println!("TEST 05 — Notification: PASS");
}

// ═══════════════════════════════════════════════════════
// ENGINE OPERATIONS
// ═══════════════════════════════════════════════════════

/// Test 6: an invalid import leaves the rules untouched
#[tokio::test]
async fn test_06_invalid_import_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let session = temp_session(&dir);
    let handler = ProtocolHandler::new(Arc::clone(&session));

    let ok = send_unwrap(&handler, rpc_request(1, "import_rules", rule_doc())).await;
    assert_eq!(ok["result"]["success"], true);

    let bad = json!({ "primaryAction": "button.react" });
    let resp = send_unwrap(&handler, rpc_request(2, "import_rules", bad)).await;
    assert_eq!(error_code(&resp), -32010);

    let no_roles = json!({ "somethingElse": [] });
    let resp = send_unwrap(&handler, rpc_request(3, "import_rules", no_roles)).await;
    assert_eq!(error_code(&resp), -32010);

    let exported = send_unwrap(&handler, rpc_request(4, "export_rules", json!({}))).await;
    let rules = exported["result"]["primaryAction"].as_array().unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0]["pattern"], "button.react");
    assert_eq!(rules[0]["successCount"], 4);

    println!("TEST 06 — Invalid Import: PASS");
}

/// Test 7: wrapped import document and idempotent re-import
#[tokio::test]
async fn test_07_import_wrapped_and_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ProtocolHandler::new(temp_session(&dir));

    let wrapped = json!({ "rules": rule_doc() });
    send_unwrap(&handler, rpc_request(1, "import_rules", wrapped)).await;
    let first = send_unwrap(&handler, rpc_request(2, "export_rules", json!({}))).await;

    let resp = send_unwrap(&handler, rpc_request(3, "import_rules", first["result"].clone())).await;
    assert_eq!(resp["result"]["success"], true);
    let second = send_unwrap(&handler, rpc_request(4, "export_rules", json!({}))).await;
    assert_eq!(first["result"], second["result"]);

    println!("TEST 07 — Idempotent Import: PASS");
}

/// Test 8: history survives reopening the state file
#[tokio::test]
async fn test_08_history_persists() {
    let dir = tempfile::tempdir().unwrap();
    {
        let handler = ProtocolHandler::new(temp_session(&dir));
        let resp = send_unwrap(
            &handler,
            rpc_request(
                1,
                "record_action",
                json!({ "author": "  Sam  ", "text": "Shipped the new release today", "sentiment": "positive", "score": 0.8 }),
            ),
        )
        .await;
        assert_eq!(resp["result"]["success"], true);
        assert!(resp["result"]["id"].as_str().is_some());
    }

    let handler = ProtocolHandler::new(temp_session(&dir));
    let resp = send_unwrap(&handler, rpc_request(2, "get_history", json!({}))).await;
    let posts = resp["result"]["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["author"], "Sam");
    assert_eq!(posts[0]["label"], "positive");

    send_unwrap(&handler, rpc_request(3, "clear_history", json!({}))).await;
    let resp = send_unwrap(&handler, rpc_request(4, "get_history", json!({}))).await;
    assert!(resp["result"]["posts"].as_array().unwrap().is_empty());

    println!("TEST 08 — History Persists: PASS");
}

/// Test 9: the pacing slot is granted once per interval
#[tokio::test]
async fn test_09_can_act_paced() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ProtocolHandler::new(temp_session(&dir));

    let first = send_unwrap(&handler, rpc_request(1, "can_act", json!({}))).await;
    let second = send_unwrap(&handler, rpc_request(2, "can_act", json!({}))).await;
    assert_eq!(first["result"]["ok"], true);
    assert_eq!(second["result"]["ok"], false);

    println!("TEST 09 — Paced can_act: PASS");
}

/// Test 10: the stop switch is persisted
#[tokio::test]
async fn test_10_stop_persists() {
    let dir = tempfile::tempdir().unwrap();
    {
        let session = temp_session(&dir);
        let handler = ProtocolHandler::new(Arc::clone(&session));
        let resp = send_unwrap(&handler, rpc_request(1, "stop", json!({}))).await;
        assert_eq!(resp["result"]["stopped"], true);
        assert!(session.engine().is_stopped());
    }

    let session = temp_session(&dir);
    assert!(session.engine().is_stopped());
    let handler = ProtocolHandler::new(Arc::clone(&session));
    let resp = send_unwrap(&handler, rpc_request(2, "start", json!({}))).await;
    assert_eq!(resp["result"]["stopped"], false);
    assert!(!session.engine().is_stopped());

    println!("TEST 10 — Stop Persists: PASS");
}

/// Test 11: partial config updates keep the other field
#[tokio::test]
async fn test_11_set_config_partial() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ProtocolHandler::new(temp_session(&dir));

    let defaults = send_unwrap(&handler, rpc_request(1, "get_config", json!({}))).await;
    assert_eq!(defaults["result"]["autoActEnabled"], true);

    send_unwrap(
        &handler,
        rpc_request(2, "set_config", json!({ "scoringEndpoint": "http://127.0.0.1:9" })),
    )
    .await;
    let resp = send_unwrap(
        &handler,
        rpc_request(3, "set_config", json!({ "autoActEnabled": false })),
    )
    .await;
    assert_eq!(resp["result"]["autoActEnabled"], false);
    assert_eq!(resp["result"]["scoringEndpoint"], "http://127.0.0.1:9");

    println!("TEST 11 — Partial Config: PASS");
}

/// Test 12: learning stats follow import and clear
#[tokio::test]
async fn test_12_learning_stats() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ProtocolHandler::new(temp_session(&dir));

    send_unwrap(&handler, rpc_request(1, "import_rules", rule_doc())).await;
    let stats = send_unwrap(&handler, rpc_request(2, "learning_stats", json!({}))).await;
    assert_eq!(stats["result"]["primaryAction"], 1);
    assert_eq!(stats["result"]["secondaryAction"], 0);

    send_unwrap(&handler, rpc_request(3, "clear_rules", json!({}))).await;
    let stats = send_unwrap(&handler, rpc_request(4, "learning_stats", json!({}))).await;
    assert_eq!(stats["result"]["primaryAction"], 0);

    println!("TEST 12 — Learning Stats: PASS");
}

// ═══════════════════════════════════════════════════════
// TRANSPORT
// ═══════════════════════════════════════════════════════

/// Test 13: one line per response, garbage answered with a parse error
#[tokio::test]
async fn test_13_transport_lines() {
    let dir = tempfile::tempdir().unwrap();
    let transport = StdioTransport::new(ProtocolHandler::new(temp_session(&dir)));

    let input = [
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        "",
        "{not json",
        r#"{"jsonrpc":"2.0","method":"ping"}"#,
        r#"{"jsonrpc":"2.0","id":2,"method":"learning_stats"}"#,
    ]
    .join("\n");

    let mut out = Vec::new();
    transport
        .serve(tokio::io::BufReader::new(input.as_bytes()), &mut out)
        .await
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(error_code(&lines[1]), -32700);
    assert_eq!(lines[2]["id"], 2);

    println!("TEST 13 — Transport Lines: PASS");
}

/// Test 14: shutdown saves and ends the loop
#[tokio::test]
async fn test_14_shutdown_ends_serve() {
    let dir = tempfile::tempdir().unwrap();
    let transport = StdioTransport::new(ProtocolHandler::new(temp_session(&dir)));

    let input = [
        r#"{"jsonrpc":"2.0","id":1,"method":"stop"}"#,
        r#"{"jsonrpc":"2.0","id":2,"method":"shutdown"}"#,
        r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
    ]
    .join("\n");

    let mut out = Vec::new();
    transport
        .serve(tokio::io::BufReader::new(input.as_bytes()), &mut out)
        .await
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 2);

    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(state_path(&dir)).unwrap()).unwrap();
    assert_eq!(saved["stopped"], true);

    println!("TEST 14 — Shutdown: PASS");
}

// ═══════════════════════════════════════════════════════
// PERSISTENCE
// ═══════════════════════════════════════════════════════

/// Test 15: read-only use of a missing state file creates nothing
#[tokio::test]
async fn test_15_read_only_open_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let parent = dir.path().join("missing");
    let path = parent.join("state.json");

    {
        let settings = engine_settings(None, Some(500), Some(1));
        let session = Arc::new(PilotSession::open(path.to_str().unwrap(), settings).unwrap());
        let _ = session.engine().learning_stats();
        let _ = session.engine().export_rules();

        let handler = ProtocolHandler::new(Arc::clone(&session));
        for (i, method) in ["get_history", "export_rules", "learning_stats", "get_config", "ping"]
            .into_iter()
            .enumerate()
        {
            let resp = send_unwrap(&handler, rpc_request(i as i64, method, json!({}))).await;
            assert!(resp.get("result").is_some(), "{method}: {resp}");
        }
        assert!(!session.is_dirty());
    }

    assert!(!path.exists());
    assert!(!parent.exists());

    println!("TEST 15 — Read-only Open: PASS");
}

/// Test 16: mutating requests mark the session dirty and save clears it
#[tokio::test]
async fn test_16_mutation_marks_dirty() {
    let dir = tempfile::tempdir().unwrap();
    let session = temp_session(&dir);
    let handler = ProtocolHandler::new(Arc::clone(&session));

    send_unwrap(&handler, rpc_request(1, "learning_stats", json!({}))).await;
    assert!(!session.is_dirty());

    let bad = json!({ "primaryAction": 7 });
    send_unwrap(&handler, rpc_request(2, "import_rules", bad)).await;
    assert!(!session.is_dirty());

    send_unwrap(&handler, rpc_request(3, "set_config", json!({ "autoActEnabled": false }))).await;
    assert!(session.is_dirty());

    session.save().unwrap();
    assert!(!session.is_dirty());
    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(state_path(&dir)).unwrap()).unwrap();
    assert_eq!(saved["config"]["autoActEnabled"], false);

    println!("TEST 16 — Dirty Tracking: PASS");
}
