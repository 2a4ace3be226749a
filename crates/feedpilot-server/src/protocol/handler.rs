//! Request dispatcher: receives JSON-RPC messages and routes them to the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use feedpilot::PilotConfig;

use crate::session::PilotSession;
use crate::types::*;

use super::validator::{require_params, validate_request};

pub struct ProtocolHandler {
    session: Arc<PilotSession>,
    shutdown: AtomicBool,
}

impl ProtocolHandler {
    pub fn new(session: Arc<PilotSession>) -> Self {
        Self {
            session,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Set once a `shutdown` request has been answered.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub async fn handle_message(&self, msg: JsonRpcMessage) -> Option<Value> {
        match msg {
            JsonRpcMessage::Request(req) => Some(self.handle_request(req).await),
            JsonRpcMessage::Notification(notif) => {
                tracing::debug!("Ignoring notification: {}", notif.method);
                None
            }
            JsonRpcMessage::Response(resp) => {
                tracing::warn!("Dropping unsolicited response {} from host", resp.id);
                None
            }
            JsonRpcMessage::Error(err) => {
                tracing::warn!(
                    "Dropping error {} from host: {}",
                    err.error.code,
                    err.error.message
                );
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Value {
        if let Err(e) = validate_request(&request) {
            return serde_json::to_value(e.to_json_rpc_error(request.id)).unwrap_or_default();
        }

        let id = request.id.clone();
        let mutating = mutates_state(&request.method);
        match self.dispatch_request(request).await {
            Ok(value) => {
                if mutating {
                    self.session.mark_dirty();
                }
                serde_json::to_value(JsonRpcResponse::new(id, value)).unwrap_or_default()
            }
            Err(e) => {
                tracing::debug!("Request {id} failed: {e}");
                serde_json::to_value(e.to_json_rpc_error(id)).unwrap_or_default()
            }
        }
    }

    async fn dispatch_request(&self, request: JsonRpcRequest) -> ServerResult<Value> {
        let engine = self.session.engine();
        let params = request.params;

        match request.method.as_str() {
            "analyze" => {
                let p: AnalyzeParams = require_params(params, "analyze")?;
                let result = engine.analyze(&p.text, &p.author).await;
                to_value(&result)
            }
            "can_act" => Ok(json!({ "ok": engine.can_act() })),
            "record_action" => {
                let p: RecordActionParams = require_params(params, "record_action")?;
                let record = engine.record_action(&p.author, &p.text, p.label, p.score);
                Ok(json!({ "success": true, "id": record.id }))
            }
            "get_history" => Ok(json!({ "posts": engine.history() })),
            "clear_history" => {
                engine.clear_history();
                Ok(json!({ "success": true }))
            }
            "import_rules" => {
                let doc = params
                    .ok_or_else(|| ServerError::InvalidParams("import_rules params required".into()))?;
                // Accept either the document itself or `{ "rules": document }`.
                let doc = match doc.get("rules") {
                    Some(inner) => inner.clone(),
                    None => doc,
                };
                let merged = engine.import_rules(&doc)?;
                Ok(json!({ "success": true, "rules": merged }))
            }
            "export_rules" => to_value(&engine.export_rules()),
            "stop" => {
                engine.stop();
                Ok(json!({ "stopped": true }))
            }
            "start" => {
                engine.start();
                Ok(json!({ "stopped": false }))
            }
            "get_config" => to_value(&engine.config()),
            "set_config" => {
                let p: SetConfigParams = require_params(params, "set_config")?;
                let current = engine.config();
                let updated = PilotConfig {
                    auto_act_enabled: p.auto_act_enabled.unwrap_or(current.auto_act_enabled),
                    scoring_endpoint: p.scoring_endpoint.unwrap_or(current.scoring_endpoint),
                };
                engine.update_config(updated.clone());
                to_value(&updated)
            }
            "learning_stats" => to_value(&engine.learning_stats()),
            "clear_rules" => {
                engine.clear_rules();
                Ok(json!({ "success": true }))
            }
            "ping" => Ok(Value::Object(serde_json::Map::new())),
            "shutdown" => {
                tracing::info!("Shutdown requested");
                self.session.save()?;
                self.shutdown.store(true, Ordering::SeqCst);
                Ok(Value::Object(serde_json::Map::new()))
            }
            other => Err(ServerError::MethodNotFound(other.to_string())),
        }
    }
}

/// Methods whose success changes what the state file should hold.
fn mutates_state(method: &str) -> bool {
    matches!(
        method,
        "record_action"
            | "clear_history"
            | "import_rules"
            | "stop"
            | "start"
            | "set_config"
            | "clear_rules"
    )
}

fn to_value<T: serde::Serialize>(value: &T) -> ServerResult<Value> {
    serde_json::to_value(value).map_err(|e| ServerError::InternalError(e.to_string()))
}
