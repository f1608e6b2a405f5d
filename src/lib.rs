//! Frame tree bookkeeping, isolated worlds and wait tasks on top of the
//! [chrome devtools protocol](https://chromedevtools.github.io/devtools-protocol/).
//!
//! A [`Browser`] only sends messages to its [`Handler`], which owns the
//! connection and must be polled continuously, for example in a spawned task:
//!
//! ```no_run
//! use futures::StreamExt;
//! use frameoxide::Browser;
//!
//! # async fn demo() -> frameoxide::Result<()> {
//! let (browser, mut handler) = Browser::connect("ws://127.0.0.1:9222/devtools/browser/id").await?;
//! tokio::spawn(async move {
//!     while let Some(res) = handler.next().await {
//!         if res.is_err() {
//!             break;
//!         }
//!     }
//! });
//! let page = browser.new_page("about:blank").await?;
//! let title = page.title().await?;
//! # Ok(())
//! # }
//! ```

pub use crate::browser::{Browser, BrowserEvent};
pub use crate::context::ExecutionContext;
pub use crate::element::ElementHandle;
pub use crate::error::{CdpError, Result};
pub use crate::frame::Frame;
pub use crate::handle::JsHandle;
pub use crate::handler::domworld::DOMWorldKind;
pub use crate::handler::frame::{FrameInfo, FrameKey};
pub use crate::handler::{Handler, HandlerConfig, HandlerConfigBuilder};
pub use crate::js::{Evaluation, EvaluationResult, JsArg, JsFunction};
pub use crate::page::{ExecutionContextEvent, Page, PageEvent};
pub use crate::waittask::{
    Polling, SetContentOptions, WaitForFunctionOptions, WaitForSelectorOptions,
};
pub use crate::world::{Binding, IsolatedWorld};
pub use frameoxide_types as types;

pub mod browser;
pub mod cdp;
pub(crate) mod cmd;
pub mod conn;
pub mod context;
pub mod element;
pub mod error;
pub mod frame;
pub mod handle;
pub mod handler;
pub mod js;
pub mod page;
pub mod subscribe;
pub(crate) mod utils;
pub mod waittask;
pub mod world;
