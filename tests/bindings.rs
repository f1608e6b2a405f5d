use std::time::Duration;

use serde_json::json;

use frameoxide::{Binding, HandlerConfig, WaitForFunctionOptions};

mod common;
use common::{frame, tree, PAGE_SESSION};

fn add() -> Binding {
    Binding::new("add", |args| {
        let sum: i64 = args.iter().filter_map(|v| v.as_i64()).sum();
        Ok(json!(sum))
    })
}

fn payload(name: &str, seq: u64, args: serde_json::Value) -> String {
    json!({ "type": "internal", "name": name, "seq": seq, "args": args }).to_string()
}

#[tokio::test]
async fn concurrent_waits_add_the_binding_once() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    let main = page.main_frame().await.unwrap();

    let mut waits = Vec::new();
    for _ in 0..2 {
        let main = main.clone();
        waits.push(tokio::spawn(async move {
            main.wait_for_function(
                "async () => (await add(1, 2)) === 3",
                WaitForFunctionOptions::new().binding(add()),
            )
            .await
        }));
    }
    page.frames().await.unwrap();
    mock.ready_context(PAGE_SESSION, 1, "F0").await;

    let mut added = 0;
    let mut polls = 0;
    while polls < 2 {
        let req = mock.recv().await;
        match req.method.as_str() {
            "Runtime.addBinding" => {
                added += 1;
                assert_eq!(req.params["name"], "add");
                assert_eq!(req.params["executionContextId"], 1);
                mock.respond(&req, json!({}));
            }
            "Runtime.evaluate" => {
                assert!(req.script().contains("addPageBinding"), "{req:?}");
                assert!(req.script().contains(r#"("internal","add")"#));
                mock.respond(&req, json!({ "result": { "type": "undefined" } }));
            }
            "Runtime.callFunctionOn" => {
                polls += 1;
                mock.respond(&req, common::value(json!(true)));
            }
            other => panic!("unexpected {other}"),
        }
    }
    assert_eq!(added, 1);
    for wait in waits {
        assert!(wait.await.unwrap().unwrap().is_truthy());
    }
}

#[tokio::test]
async fn binding_calls_are_answered() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;

    let fail = Binding::new("fail", |_| Err("no way".to_string()));
    let wait = tokio::spawn({
        let page = page.clone();
        async move {
            page.wait_for_function(
                "async () => (await add(1, 2)) === 3",
                WaitForFunctionOptions::new().binding(add()).binding(fail),
            )
            .await
        }
    });

    // wire both bindings
    let mut poll = None;
    while poll.is_none() {
        let req = mock.recv().await;
        match req.method.as_str() {
            "Runtime.addBinding" => mock.respond(&req, json!({})),
            "Runtime.evaluate" => mock.respond(&req, json!({ "result": { "type": "undefined" } })),
            "Runtime.callFunctionOn" => poll = Some(req),
            other => panic!("unexpected {other}"),
        }
    }

    // calls that are not meant for a binding are ignored
    mock.event(
        Some(PAGE_SESSION),
        "Runtime.bindingCalled",
        json!({
            "name": "add",
            "payload": json!({ "type": "exposedFun", "name": "add", "seq": 1, "args": [] }).to_string(),
            "executionContextId": 1
        }),
    );
    mock.event(
        Some(PAGE_SESSION),
        "Runtime.bindingCalled",
        json!({ "name": "add", "payload": payload("add", 1, json!([1, 2])), "executionContextId": 1 }),
    );
    let deliver = mock.expect("Runtime.evaluate").await;
    assert_eq!(deliver.context_id(), Some(1));
    assert!(deliver.script().contains("deliverResult"));
    assert!(deliver.script().contains(r#"("add",1,3)"#), "{}", deliver.script());
    mock.respond(&deliver, json!({ "result": { "type": "undefined" } }));

    mock.event(
        Some(PAGE_SESSION),
        "Runtime.bindingCalled",
        json!({ "name": "fail", "payload": payload("fail", 2, json!([])), "executionContextId": 1 }),
    );
    let deliver = mock.expect("Runtime.evaluate").await;
    assert!(deliver.script().contains("deliverError"));
    assert!(deliver.script().contains(r#"("fail",2,"no way""#));
    // a failed delivery does not affect anyone
    mock.fail(&deliver, "Cannot find context with specified id");

    let poll = poll.unwrap();
    mock.respond(&poll, common::object("result"));
    assert!(wait.await.unwrap().is_ok());
}

fn not_a_function(name: &str) -> serde_json::Value {
    json!({
        "result": { "type": "object", "subtype": "error" },
        "exceptionDetails": {
            "exceptionId": 1,
            "text": "Uncaught",
            "lineNumber": 0,
            "columnNumber": 0,
            "exception": {
                "type": "object",
                "subtype": "error",
                "description": format!("TypeError: {name} is not a function")
            }
        }
    })
}

#[tokio::test]
async fn failed_binding_setup_waits_for_the_next_context() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;

    let wait = tokio::spawn({
        let page = page.clone();
        async move {
            page.wait_for_function(
                "async () => (await add(1, 2)) === 3",
                WaitForFunctionOptions::new()
                    .binding(add())
                    .timeout(Duration::ZERO),
            )
            .await
        }
    });

    // the first run and a single retry, both without the binding
    for _ in 0..2 {
        let add_binding = mock.expect("Runtime.addBinding").await;
        assert_eq!(add_binding.context_id(), Some(1));
        mock.fail(&add_binding, "Cannot find context with specified id");
        let poll = mock.expect("Runtime.callFunctionOn").await;
        mock.respond(&poll, not_a_function("add"));
    }
    assert!(
        tokio::time::timeout(Duration::from_millis(200), mock.recv())
            .await
            .is_err(),
        "the binding setup must not be repeated in the same context"
    );

    mock.context_destroyed(PAGE_SESSION, 1);
    mock.ready_context(PAGE_SESSION, 2, "F0").await;
    let add_binding = mock.expect("Runtime.addBinding").await;
    assert_eq!(add_binding.context_id(), Some(2));
    mock.respond(&add_binding, json!({}));
    let init = mock.expect("Runtime.evaluate").await;
    mock.respond(&init, json!({ "result": { "type": "undefined" } }));
    let poll = mock.expect("Runtime.callFunctionOn").await;
    assert_eq!(poll.context_id(), Some(2));
    mock.respond(&poll, common::value(json!(true)));

    assert!(wait.await.unwrap().unwrap().is_truthy());
    assert!(mock.is_idle());
}
