use std::time::Duration;

use futures::StreamExt;

use frameoxide::{Browser, PageEvent, SetContentOptions, WaitForSelectorOptions};

/// Connect to a running chrome, started with `--remote-debugging-port=9222`,
/// and pass the `webSocketDebuggerUrl` of `http://127.0.0.1:9222/json/version`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let ws_url = std::env::args()
        .nth(1)
        .ok_or("usage: frames <websocket debugger url>")?;
    let (browser, mut handler) = Browser::connect(ws_url).await?;

    let handle = tokio::spawn(async move {
        while let Some(res) = handler.next().await {
            if let Err(err) = res {
                eprintln!("handler error: {err}");
            }
        }
    });

    let page = browser.new_page("about:blank").await?;
    let mut events = page.event_listener().await?;
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if let PageEvent::FrameAttached(frame) = event {
                println!("attached {:?}", frame.url().await);
            }
        }
    });

    page.set_content(
        r#"<h1>frames</h1><iframe srcdoc="<p id='inner'>inner</p>"></iframe>"#,
        SetContentOptions::default(),
    )
    .await?;

    for frame in page.frames().await? {
        println!("{} {}", frame.id().await?, frame.url().await?);
    }

    let main = page.main_frame().await?;
    let child = main.child_frames().await?.remove(0);
    let inner = child
        .wait_for_selector(
            "#inner",
            WaitForSelectorOptions::new().timeout(Duration::from_secs(5)),
        )
        .await?;
    println!("found inner: {}", inner.is_some());
    println!("title: {:?}", page.title().await?);

    drop(browser);
    handle.abort();
    Ok(())
}
