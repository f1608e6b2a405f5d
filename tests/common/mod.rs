#![allow(dead_code)]

use std::time::Duration;

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use frameoxide::conn::ChannelTransport;
use frameoxide::{Browser, HandlerConfig, Page};

pub const PAGE_TARGET: &str = "T1";
pub const PAGE_SESSION: &str = "S1";

/// Run with `RUST_LOG=frameoxide=trace` to see the protocol traffic
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A command the client sent
#[derive(Debug, Clone)]
pub struct Request {
    pub id: u64,
    pub session_id: Option<String>,
    pub method: String,
    pub params: Value,
}

impl Request {
    pub fn context_id(&self) -> Option<i64> {
        self.params
            .get("executionContextId")
            .or_else(|| self.params.get("contextId"))
            .and_then(Value::as_i64)
    }

    /// The script of an evaluate or call
    pub fn script(&self) -> &str {
        self.params
            .get("expression")
            .or_else(|| self.params.get("functionDeclaration"))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Plays the browser side of the protocol over an in process transport
pub struct MockBrowser {
    to_client: UnboundedSender<String>,
    from_client: UnboundedReceiver<String>,
}

/// Spawns the handler of a browser that talks to the returned mock
pub fn connect(config: HandlerConfig) -> (Browser, MockBrowser) {
    init_tracing();
    let (to_client, incoming) = unbounded();
    let (outgoing, from_client) = unbounded();
    let (browser, mut handler) =
        Browser::with_transport(ChannelTransport::new(incoming, outgoing), config);
    tokio::spawn(async move {
        while let Some(res) = handler.next().await {
            if let Err(err) = res {
                tracing::error!("handler failed: {}", err);
            }
        }
    });
    (
        browser,
        MockBrowser {
            to_client,
            from_client,
        },
    )
}

impl MockBrowser {
    /// The next command of the client, the browser wide setup commands are
    /// answered right away
    pub async fn recv(&mut self) -> Request {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), self.from_client.next())
                .await
                .expect("timed out waiting for a request")
                .expect("client closed the transport");
            let msg: Value = serde_json::from_str(&msg).unwrap();
            let req = Request {
                id: msg["id"].as_u64().unwrap(),
                session_id: msg
                    .get("sessionId")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                method: msg["method"].as_str().unwrap().to_string(),
                params: msg.get("params").cloned().unwrap_or(Value::Null),
            };
            if req.session_id.is_none()
                && matches!(
                    req.method.as_str(),
                    "Target.setDiscoverTargets" | "Target.setAutoAttach"
                )
            {
                self.respond(&req, json!({}));
                continue;
            }
            return req;
        }
    }

    /// Receives the next command and checks its method
    pub async fn expect(&mut self, method: &str) -> Request {
        let req = self.recv().await;
        assert_eq!(req.method, method, "unexpected request {req:?}");
        req
    }

    /// Whether the client sent nothing that is not answered yet
    pub fn is_idle(&mut self) -> bool {
        self.from_client.try_next().is_err()
    }

    /// Closes the browser side of the transport, as if the websocket went down
    pub fn disconnect(&self) {
        self.to_client.close_channel();
    }

    fn send(&self, msg: Value) {
        self.to_client.unbounded_send(msg.to_string()).unwrap();
    }

    pub fn respond(&self, req: &Request, result: Value) {
        let mut msg = json!({ "id": req.id, "result": result });
        if let Some(ref session) = req.session_id {
            msg["sessionId"] = json!(session);
        }
        self.send(msg);
    }

    pub fn fail(&self, req: &Request, message: &str) {
        let mut msg = json!({
            "id": req.id,
            "error": { "code": -32000, "message": message }
        });
        if let Some(ref session) = req.session_id {
            msg["sessionId"] = json!(session);
        }
        self.send(msg);
    }

    pub fn event(&self, session: Option<&str>, method: &str, params: Value) {
        let mut msg = json!({ "method": method, "params": params });
        if let Some(session) = session {
            msg["sessionId"] = json!(session);
        }
        self.send(msg);
    }

    /// Creates a page with the given frame tree
    pub async fn new_page(&mut self, browser: &Browser, tree: Value) -> Page {
        let browser = browser.clone();
        let page = tokio::spawn(async move { browser.new_page("about:blank").await });

        let create = self.expect("Target.createTarget").await;
        self.respond(&create, json!({ "targetId": PAGE_TARGET }));
        self.event(
            None,
            "Target.attachedToTarget",
            json!({
                "sessionId": PAGE_SESSION,
                "targetInfo": {
                    "targetId": PAGE_TARGET,
                    "type": "page",
                    "title": "",
                    "url": "about:blank",
                    "attached": true
                },
                "waitingForDebugger": false
            }),
        );
        self.handshake(PAGE_SESSION, tree).await;
        page.await.unwrap().unwrap()
    }

    /// Attaches the out of process frame `frame_id` below the page
    pub async fn attach_oopif(&mut self, session: &str, tree: Value) {
        let frame_id = tree["frame"]["id"].as_str().unwrap().to_string();
        self.event(
            Some(PAGE_SESSION),
            "Target.attachedToTarget",
            json!({
                "sessionId": session,
                "targetInfo": {
                    "targetId": frame_id,
                    "type": "iframe",
                    "title": "",
                    "url": "about:blank",
                    "attached": true
                },
                "waitingForDebugger": true
            }),
        );
        self.handshake(session, tree).await;
    }

    /// Answers the initialization commands of `session`
    pub async fn handshake(&mut self, session: &str, tree: Value) {
        let mut next_world = 1000;
        loop {
            let req = self.recv().await;
            assert_eq!(req.session_id.as_deref(), Some(session), "{req:?}");
            match req.method.as_str() {
                "Page.getFrameTree" => self.respond(&req, json!({ "frameTree": tree })),
                "Page.addScriptToEvaluateOnNewDocument" => {
                    self.respond(&req, json!({ "identifier": "1" }))
                }
                "Page.createIsolatedWorld" => {
                    next_world += 1;
                    self.respond(&req, json!({ "executionContextId": next_world }))
                }
                "Runtime.runIfWaitingForDebugger" => {
                    self.respond(&req, json!({}));
                    return;
                }
                _ => self.respond(&req, json!({})),
            }
        }
    }

    pub fn context_created(&self, session: &str, id: i64, frame_id: &str, is_default: bool, name: &str) {
        self.event(
            Some(session),
            "Runtime.executionContextCreated",
            json!({
                "context": {
                    "id": id,
                    "origin": "",
                    "name": name,
                    "auxData": {
                        "isDefault": is_default,
                        "type": if is_default { "default" } else { "isolated" },
                        "frameId": frame_id
                    }
                }
            }),
        );
    }

    pub fn context_destroyed(&self, session: &str, id: i64) {
        self.event(
            Some(session),
            "Runtime.executionContextDestroyed",
            json!({ "executionContextId": id }),
        );
    }

    /// Answers the injection of the utility script into context `id`
    pub async fn inject_utility(&mut self, id: i64) {
        let req = self.expect("Runtime.evaluate").await;
        assert_eq!(req.context_id(), Some(id), "{req:?}");
        self.respond(
            &req,
            json!({ "result": { "type": "object", "objectId": utility_id(id) } }),
        );
    }

    /// Creates the default context `id` for `frame_id` and injects the
    /// utility script
    pub async fn ready_context(&mut self, session: &str, id: i64, frame_id: &str) {
        self.context_created(session, id, frame_id, true, "");
        self.inject_utility(id).await;
    }
}

pub fn utility_id(context: i64) -> String {
    format!("utility-{context}")
}

pub fn frame(id: &str, parent: Option<&str>) -> Value {
    let mut frame = json!({
        "id": id,
        "loaderId": format!("loader-{id}"),
        "url": format!("https://example.com/{id}"),
        "securityOrigin": "https://example.com",
        "mimeType": "text/html"
    });
    if let Some(parent) = parent {
        frame["parentId"] = json!(parent);
    }
    frame
}

pub fn tree(frame: Value, children: Vec<Value>) -> Value {
    if children.is_empty() {
        json!({ "frame": frame })
    } else {
        json!({ "frame": frame, "childFrames": children })
    }
}

/// A remote object that is truthy
pub fn object(id: &str) -> Value {
    json!({ "result": { "type": "object", "className": "Object", "objectId": id } })
}

pub fn node(id: &str) -> Value {
    json!({
        "result": {
            "type": "object",
            "subtype": "node",
            "className": "HTMLDivElement",
            "objectId": id
        }
    })
}

pub fn value(value: Value) -> Value {
    let r#type = match value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        _ => "object",
    };
    json!({ "result": { "type": r#type, "value": value } })
}
