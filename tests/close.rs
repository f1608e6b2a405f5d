use std::time::Duration;

use futures::StreamExt;
use serde_json::json;

use frameoxide::{BrowserEvent, HandlerConfig};

mod common;
use common::{frame, tree, PAGE_SESSION, PAGE_TARGET};

#[tokio::test]
async fn connection_drop_rejects_pending_commands() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;
    let mut events = browser.event_listener().await.unwrap();
    browser.pages().await.unwrap();

    let eval = tokio::spawn({
        let page = page.clone();
        async move { page.evaluate("1 + 2").await }
    });
    let _pending = mock.expect("Runtime.evaluate").await;
    mock.disconnect();

    let err = eval.await.unwrap().unwrap_err();
    assert!(err.is_target_closed(), "{err}");
    assert_eq!(
        err.to_string(),
        "Protocol error (Runtime.evaluate): Target closed."
    );

    // the handler is gone once the stream of events ends
    let mut disconnected = 0;
    let mut detached = Vec::new();
    while let Some(event) = events.next().await {
        match event {
            BrowserEvent::Disconnected => disconnected += 1,
            BrowserEvent::TargetDetached(id) => detached.push(id),
            _ => {}
        }
    }
    assert_eq!(disconnected, 1);
    assert_eq!(detached.len(), 1);
    assert_eq!(detached[0].as_ref(), PAGE_TARGET);
    assert!(browser.pages().await.is_err());
}

#[tokio::test]
async fn session_detach_rejects_its_commands() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock
        .new_page(
            &browser,
            tree(frame("F0", None), vec![tree(frame("F1", Some("F0")), vec![])]),
        )
        .await;
    mock.event(
        Some(PAGE_SESSION),
        "Page.frameDetached",
        json!({ "frameId": "F1", "reason": "swap" }),
    );
    mock.attach_oopif("S2", tree(frame("F1", Some("F0")), vec![]))
        .await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;
    mock.ready_context("S2", 2, "F1").await;
    let child = page.frame("F1").await.unwrap().unwrap();

    let eval = tokio::spawn({
        let child = child.clone();
        async move { child.evaluate("1 + 2").await }
    });
    let pending = mock.expect("Runtime.evaluate").await;
    assert_eq!(pending.session_id.as_deref(), Some("S2"));

    mock.event(
        Some(PAGE_SESSION),
        "Target.detachedFromTarget",
        json!({ "sessionId": "S2", "targetId": "F1" }),
    );
    let err = eval.await.unwrap().unwrap_err();
    assert!(err.is_target_closed(), "{err}");

    // the frame went down with its session, the page stays
    assert!(child.is_detached().await.unwrap());
    assert_eq!(page.frame("F1").await.unwrap(), None);
    assert_eq!(page.frames().await.unwrap().len(), 1);

    // a late answer for the rejected command is ignored
    mock.respond(&pending, common::value(json!(3)));
    let eval = tokio::spawn({
        let page = page.clone();
        async move { page.evaluate("4").await }
    });
    let req = mock.expect("Runtime.evaluate").await;
    assert_eq!(req.session_id.as_deref(), Some(PAGE_SESSION));
    mock.respond(&req, common::value(json!(4)));
    let four: i64 = eval.await.unwrap().unwrap().into_value().unwrap();
    assert_eq!(four, 4);
}

#[tokio::test]
async fn unanswered_commands_time_out() {
    let config = HandlerConfig::builder()
        .request_timeout(Duration::from_millis(100))
        .build();
    let (browser, mut mock) = common::connect(config);
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;

    let eval = tokio::spawn({
        let page = page.clone();
        async move { page.evaluate("1 + 2").await }
    });
    // the browser never answers
    let _pending = mock.expect("Runtime.evaluate").await;

    let err = tokio::time::timeout(Duration::from_secs(2), eval)
        .await
        .expect("the request was not evicted")
        .unwrap()
        .unwrap_err();
    assert!(err.is_timeout(), "{err}");
    assert_eq!(
        err.to_string(),
        "Request Runtime.evaluate timed out after 100ms"
    );

    // the handler keeps serving other commands
    let eval = tokio::spawn({
        let page = page.clone();
        async move { page.evaluate("2").await }
    });
    let req = mock.expect("Runtime.evaluate").await;
    mock.respond(&req, common::value(json!(2)));
    assert!(eval.await.unwrap().is_ok());
}
