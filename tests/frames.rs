use std::time::Duration;

use futures::StreamExt;
use serde_json::json;

use frameoxide::{CdpError, HandlerConfig, PageEvent};

mod common;
use common::{frame, tree, PAGE_SESSION};

#[tokio::test]
async fn frame_tree_of_a_new_page() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock
        .new_page(
            &browser,
            tree(frame("F0", None), vec![tree(frame("F1", Some("F0")), vec![])]),
        )
        .await;

    let main = page.main_frame().await.unwrap();
    assert_eq!(main.id().await.unwrap().as_ref(), "F0");
    assert_eq!(main.url().await.unwrap(), "https://example.com/F0");

    let children = main.child_frames().await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id().await.unwrap().as_ref(), "F1");
    assert_eq!(children[0].parent_frame().await.unwrap(), Some(main.clone()));
    assert_eq!(page.frame("F1").await.unwrap(), Some(children[0].clone()));
    assert_eq!(page.frames().await.unwrap().len(), 2);

    let info = children[0].info().await.unwrap();
    assert_eq!(info.parent_id.unwrap().as_ref(), "F0");
    assert!(!info.is_oop);

    assert_eq!(browser.pages().await.unwrap().len(), 1);
}

#[tokio::test]
async fn main_frame_survives_id_change() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock.new_page(&browser, tree(frame("F1", None), vec![])).await;
    let main = page.main_frame().await.unwrap();
    let mut events = page.event_listener().await.unwrap();
    // the listener is registered once a later request was answered
    page.frames().await.unwrap();

    mock.event(
        Some(PAGE_SESSION),
        "Page.frameNavigated",
        json!({ "frame": frame("F2", None), "type": "Navigation" }),
    );
    loop {
        if let Some(PageEvent::FrameNavigated(navigated)) = events.next().await {
            assert_eq!(navigated, main);
            break;
        }
    }

    assert_eq!(main.id().await.unwrap().as_ref(), "F2");
    assert_eq!(page.frame("F2").await.unwrap(), Some(main.clone()));
    assert_eq!(page.frame("F1").await.unwrap(), None);
    assert_eq!(page.main_frame().await.unwrap(), main);
}

#[tokio::test]
async fn detaching_removes_descendants_first() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock
        .new_page(
            &browser,
            tree(
                frame("F0", None),
                vec![tree(
                    frame("X", Some("F0")),
                    vec![
                        tree(frame("A", Some("X")), vec![tree(frame("A1", Some("A")), vec![])]),
                        tree(frame("B", Some("X")), vec![tree(frame("B1", Some("B")), vec![])]),
                    ],
                )],
            ),
        )
        .await;

    let mut expected = Vec::new();
    for id in ["A1", "A", "B1", "B", "X"] {
        expected.push(page.frame(id).await.unwrap().unwrap());
    }
    let mut events = page.event_listener().await.unwrap();
    page.frames().await.unwrap();

    mock.event(
        Some(PAGE_SESSION),
        "Page.frameDetached",
        json!({ "frameId": "X", "reason": "remove" }),
    );

    let mut detached = Vec::new();
    while detached.len() < 5 {
        if let Some(PageEvent::FrameDetached(frame)) = events.next().await {
            detached.push(frame);
        }
    }
    assert_eq!(detached, expected);
    assert!(detached[0].is_detached().await.unwrap());
    assert!(matches!(detached[0].url().await, Err(CdpError::FrameDetached)));
    assert_eq!(page.frames().await.unwrap().len(), 1);
}

#[tokio::test]
async fn cleared_contexts_stay_in_their_session() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock
        .new_page(
            &browser,
            tree(frame("F0", None), vec![tree(frame("F1", Some("F0")), vec![])]),
        )
        .await;

    // F1 moves into its own process
    mock.event(
        Some(PAGE_SESSION),
        "Page.frameDetached",
        json!({ "frameId": "F1", "reason": "swap" }),
    );
    mock.attach_oopif("S2", tree(frame("F1", Some("F0")), vec![]))
        .await;

    let main = page.main_frame().await.unwrap();
    let child = page.frame("F1").await.unwrap().unwrap();
    assert!(child.info().await.unwrap().is_oop);
    assert_eq!(child.info().await.unwrap().session_id.as_ref(), "S2");

    // both sessions use the same context id
    mock.ready_context(PAGE_SESSION, 1, "F0").await;
    mock.ready_context("S2", 1, "F1").await;

    let mut events = page.event_listener().await.unwrap();
    page.frames().await.unwrap();
    mock.event(Some("S2"), "Runtime.executionContextsCleared", json!({}));

    loop {
        if let Some(PageEvent::ExecutionContextDestroyed(ev)) = events.next().await {
            assert_eq!(ev.session_id.as_ref(), "S2");
            assert_eq!(ev.frame.as_ref(), Some(&child));
            break;
        }
    }

    let context = main.execution_context().await.unwrap();
    assert_eq!(context.session_id().as_ref(), PAGE_SESSION);
    assert_eq!(context.id().inner(), 1);
    assert!(
        tokio::time::timeout(Duration::from_millis(100), child.execution_context())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn closing_the_page_detaches_all_frames() {
    let (browser, mut mock) = common::connect(HandlerConfig::default());
    let page = mock
        .new_page(
            &browser,
            tree(frame("F0", None), vec![tree(frame("F1", Some("F0")), vec![])]),
        )
        .await;
    let child = page.frame("F1").await.unwrap().unwrap();
    let mut browser_events = browser.event_listener().await.unwrap();
    browser.pages().await.unwrap();

    mock.event(
        None,
        "Target.detachedFromTarget",
        json!({ "sessionId": PAGE_SESSION, "targetId": common::PAGE_TARGET }),
    );
    loop {
        if let Some(frameoxide::BrowserEvent::TargetDetached(id)) = browser_events.next().await {
            assert_eq!(id.as_ref(), common::PAGE_TARGET);
            break;
        }
    }
    assert!(browser.pages().await.unwrap().is_empty());
    assert!(child.execution_context().await.is_err());
}
