//! In-memory `BotApi` for tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::{
    cursor::SEED_OFFSET,
    errors::Error,
    messaging::port::{ApiRequest, BotApi},
    Result,
};

/// Scripted `getUpdates` responses plus a log of every request.
///
/// Once the script runs dry the fake cancels `shutdown` and answers with an
/// empty batch, which lets a polling loop under test wind down on its own.
#[derive(Default)]
pub(crate) struct FakeApi {
    seed: Mutex<Vec<Value>>,
    script: Mutex<VecDeque<Result<Vec<Value>>>>,
    rejections: Mutex<HashMap<&'static str, Value>>,
    calls: Mutex<Vec<ApiRequest>>,
    next_message_id: Mutex<i32>,
    shutdown: CancellationToken,
}

impl FakeApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Result of the startup `offset=-1` fetch.
    pub(crate) fn seed_with(&self, updates: Vec<Value>) {
        *self.seed.lock().unwrap() = updates;
    }

    pub(crate) fn push_updates(&self, updates: Vec<Value>) {
        self.script.lock().unwrap().push_back(Ok(updates));
    }

    pub(crate) fn push_transport_error(&self) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(Error::Transport("connection reset by peer".into())));
    }

    /// Answer the next call to `method` with `raw` instead of a success.
    pub(crate) fn reject_next(&self, method: &'static str, raw: Value) {
        self.rejections.lock().unwrap().insert(method, raw);
    }

    pub(crate) fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, method: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    pub(crate) fn last_call(&self, method: &str) -> Option<ApiRequest> {
        self.calls_to(method).pop()
    }

    /// Offsets of every non-seed `getUpdates` call, in order.
    pub(crate) fn polled_offsets(&self) -> Vec<i64> {
        self.calls_to("getUpdates")
            .iter()
            .filter_map(|c| c.param_value("offset")?.parse().ok())
            .filter(|o| *o != SEED_OFFSET)
            .collect()
    }

    fn message_result(&self, req: &ApiRequest) -> Value {
        let chat_id: i64 = req
            .param_value("chat_id")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let message_id: i32 = match req.param_value("message_id").and_then(|v| v.parse().ok()) {
            Some(id) => id,
            None => {
                let mut next = self.next_message_id.lock().unwrap();
                *next += 1;
                *next
            }
        };
        let mut msg = json!({
            "message_id": message_id,
            "date": 1700000000,
            "chat": {"id": chat_id, "type": "private"},
        });
        if let Some(text) = req.param_value("text").or(req.param_value("caption")) {
            msg["text"] = json!(text);
        }
        msg
    }
}

#[async_trait]
impl BotApi for FakeApi {
    async fn execute(&self, req: ApiRequest) -> Result<Value> {
        self.calls.lock().unwrap().push(req.clone());

        if let Some(raw) = self.rejections.lock().unwrap().remove(req.method) {
            return Ok(raw);
        }

        let result = match req.method {
            "getUpdates" => {
                if req.param_value("offset") == Some("-1") {
                    json!(self.seed.lock().unwrap().clone())
                } else {
                    let next = self.script.lock().unwrap().pop_front();
                    match next {
                        Some(Ok(updates)) => json!(updates),
                        Some(Err(e)) => return Err(e),
                        None => {
                            self.shutdown.cancel();
                            json!([])
                        }
                    }
                }
            }
            "sendMessage" | "editMessageText" | "editMessageReplyMarkup" | "sendPhoto" => {
                self.message_result(&req)
            }
            "getChat" => json!({"id": req.param_value("chat_id").and_then(|v| v.parse::<i64>().ok()).unwrap_or(0), "first_name": "Test"}),
            _ => json!(true),
        };

        Ok(json!({"ok": true, "result": result}))
    }
}

/// A text message update.
pub(crate) fn text_update(update_id: i64, chat_id: i64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1700000000,
            "text": text,
            "from": {"id": chat_id, "is_bot": false, "first_name": "Tester"},
            "chat": {"id": chat_id, "type": "private"}
        }
    })
}

/// A `/command` message update.
pub(crate) fn command_update(update_id: i64, chat_id: i64, text: &str) -> Value {
    let mut v = text_update(update_id, chat_id, text);
    v["message"]["entities"] = json!([{"type": "bot_command", "offset": 0, "length": text.len()}]);
    v
}

/// A callback query update carrying `data`.
pub(crate) fn callback_update(update_id: i64, chat_id: i64, data: &str) -> Value {
    json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb{update_id}"),
            "from": {"id": chat_id, "is_bot": false, "first_name": "Tester"},
            "message": {
                "message_id": 1,
                "date": 1700000000,
                "text": "Vote?",
                "chat": {"id": chat_id, "type": "private"}
            },
            "data": data
        }
    })
}
