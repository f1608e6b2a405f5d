use std::time::{Duration, Instant};

use serde_json::json;

use frameoxide::{CdpError, HandlerConfig, Polling, WaitForFunctionOptions, WaitForSelectorOptions};

mod common;
use common::{frame, tree, utility_id, PAGE_SESSION};

#[tokio::test]
async fn wait_task_is_rearmed_in_the_next_context() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    let main = page.main_frame().await.unwrap();

    let mut wait = tokio::spawn({
        let main = main.clone();
        async move {
            main.wait_for_function("window.ready", WaitForFunctionOptions::new())
                .await
        }
    });

    mock.ready_context(PAGE_SESSION, 1, "F0").await;
    let poll = mock.expect("Runtime.callFunctionOn").await;
    assert_eq!(poll.context_id(), Some(1));
    assert_eq!(poll.params["arguments"][0]["objectId"], utility_id(1));
    assert_eq!(poll.params["arguments"][1]["value"], "raf");

    // navigation: the pending poll dies with its context
    mock.context_destroyed(PAGE_SESSION, 1);
    mock.fail(&poll, "Execution context was destroyed.");
    assert!(
        tokio::time::timeout(Duration::from_millis(100), &mut wait)
            .await
            .is_err(),
        "the wait task must outlive its context"
    );

    mock.ready_context(PAGE_SESSION, 2, "F0").await;
    let poll = mock.expect("Runtime.callFunctionOn").await;
    assert_eq!(poll.context_id(), Some(2));
    assert_eq!(poll.params["arguments"][0]["objectId"], utility_id(2));
    mock.respond(&poll, common::object("result"));

    let handle = wait.await.unwrap().unwrap();
    assert_eq!(handle.execution_context().id().inner(), 2);
    assert!(handle.is_truthy());
}

#[tokio::test]
async fn interval_polling_times_out() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;

    let start = Instant::now();
    let mut wait = tokio::spawn({
        let page = page.clone();
        async move {
            page.wait_for_function(
                "() => false",
                WaitForFunctionOptions::new()
                    .polling(Polling::Interval(Duration::from_millis(50)))
                    .timeout(Duration::from_millis(200)),
            )
            .await
        }
    });

    let mut polls = 0;
    let res = loop {
        tokio::select! {
            res = &mut wait => break res.unwrap(),
            req = mock.recv() => {
                assert_eq!(req.method, "Runtime.callFunctionOn");
                polls += 1;
                mock.respond(&req, common::value(json!(false)));
            }
        }
    };
    let elapsed = start.elapsed();

    let err = res.unwrap_err();
    assert!(err.is_timeout(), "{err}");
    assert_eq!(
        err.to_string(),
        "waiting for function failed: timeout 200ms exceeded"
    );
    assert!(polls >= 3, "only {polls} polls");
    assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;

    let err = page
        .wait_for_function(
            "() => true",
            WaitForFunctionOptions::new().polling(Polling::Interval(Duration::ZERO)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot poll with non-positive interval");
    assert!(mock.is_idle());
}

#[tokio::test]
async fn detaching_terminates_waits() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock
        .new_page(
            &browser,
            tree(frame("F0", None), vec![tree(frame("F1", Some("F0")), vec![])]),
        )
        .await;
    let child = page.frame("F1").await.unwrap().unwrap();

    let wait = tokio::spawn(async move {
        child
            .wait_for_function(
                "() => true",
                WaitForFunctionOptions::new().timeout(Duration::ZERO),
            )
            .await
    });
    page.frames().await.unwrap();

    mock.event(
        Some(PAGE_SESSION),
        "Page.frameDetached",
        json!({ "frameId": "F1", "reason": "remove" }),
    );
    let err = wait.await.unwrap().unwrap_err();
    assert!(matches!(err, CdpError::FrameDetached), "{err}");
}

#[tokio::test]
async fn selector_found() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;

    let wait = tokio::spawn({
        let page = page.clone();
        async move {
            page.wait_for_selector(".item", WaitForSelectorOptions::new())
                .await
        }
    });
    let poll = mock.expect("Runtime.callFunctionOn").await;
    let args = &poll.params["arguments"];
    assert_eq!(args[1]["value"], "mutation");
    assert_eq!(args[5]["value"], true);
    assert_eq!(args[6]["value"], ".item");
    mock.respond(&poll, common::node("node-1"));

    let element = wait.await.unwrap().unwrap().unwrap();
    assert_eq!(
        element.handle().object().object_id.as_ref().unwrap().as_ref(),
        "node-1"
    );
}

#[tokio::test]
async fn hidden_selector_without_match_is_none() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;

    let wait = tokio::spawn({
        let page = page.clone();
        async move {
            page.wait_for_selector("#spinner", WaitForSelectorOptions::new().hidden())
                .await
        }
    });
    let poll = mock.expect("Runtime.callFunctionOn").await;
    assert_eq!(poll.params["arguments"][1]["value"], "raf");
    mock.respond(&poll, common::value(json!(true)));

    assert!(wait.await.unwrap().unwrap().is_none());
}

#[tokio::test]
async fn selector_errors_name_the_selector() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;

    let wait = tokio::spawn({
        let page = page.clone();
        async move {
            page.wait_for_selector("div[", WaitForSelectorOptions::new())
                .await
        }
    });
    let poll = mock.expect("Runtime.callFunctionOn").await;
    mock.respond(
        &poll,
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
                    "description": "SyntaxError: 'div[' is not a valid selector"
                }
            }
        }),
    );

    let err = wait.await.unwrap().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Waiting for selector `div[` failed: Evaluation failed: SyntaxError: 'div[' is not a valid selector"
    );
}

#[tokio::test]
async fn selector_timeout_names_the_selector() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;

    let wait = tokio::spawn({
        let page = page.clone();
        async move {
            page.wait_for_selector(
                "#missing",
                WaitForSelectorOptions::new()
                    .visible()
                    .timeout(Duration::from_millis(100)),
            )
            .await
        }
    });
    // the in page poll never settles
    let _poll = mock.expect("Runtime.callFunctionOn").await;

    let err = wait.await.unwrap().unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(
        err.to_string(),
        "waiting for selector `#missing` to be visible failed: timeout 100ms exceeded"
    );
}

#[tokio::test]
async fn evaluate_by_value() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;

    let eval = tokio::spawn({
        let page = page.clone();
        async move { page.evaluate("1 + 2").await }
    });
    let req = mock.expect("Runtime.evaluate").await;
    assert_eq!(req.context_id(), Some(1));
    assert_eq!(req.params["returnByValue"], true);
    assert!(req.script().starts_with("1 + 2\n//# sourceURL="));
    mock.respond(&req, common::value(json!(3)));

    let sum: i64 = eval.await.unwrap().unwrap().into_value().unwrap();
    assert_eq!(sum, 3);
}

#[tokio::test]
async fn evaluate_in_destroyed_context() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.ready_context(PAGE_SESSION, 1, "F0").await;

    let eval = tokio::spawn({
        let page = page.clone();
        async move { page.evaluate("() => document.title").await }
    });
    let req = mock.expect("Runtime.callFunctionOn").await;
    mock.fail(&req, "Cannot find context with specified id");

    let err = eval.await.unwrap().unwrap_err();
    assert!(matches!(err, CdpError::ContextDestroyed), "{err}");
}

#[tokio::test]
async fn content_is_read_from_the_utility_world() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F0", None), vec![])).await;
    mock.context_created(PAGE_SESSION, 7, "F0", false, "__frameoxide_utility_world__");
    mock.inject_utility(7).await;

    let content = tokio::spawn({
        let page = page.clone();
        async move { page.content().await }
    });
    let req = mock.expect("Runtime.callFunctionOn").await;
    assert_eq!(req.context_id(), Some(7));
    mock.respond(&req, common::value(json!("<html></html>")));
    assert_eq!(content.await.unwrap().unwrap(), "<html></html>");
}
