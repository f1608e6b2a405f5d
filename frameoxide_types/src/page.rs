use serde::{Deserialize, Serialize};

use crate::runtime::ExecutionContextId;
use crate::{protocol_command, protocol_event};

#[doc = "Unique frame identifier.\n[FrameId](https://chromedevtools.github.io/devtools-protocol/tot/Page/#type-FrameId)"]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(String);

impl FrameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn inner(&self) -> &String {
        &self.0
    }
}

impl AsRef<str> for FrameId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for FrameId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FrameId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[doc = "Unique loader identifier.\n[LoaderId](https://chromedevtools.github.io/devtools-protocol/tot/Network/#type-LoaderId)"]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoaderId(String);

impl LoaderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl AsRef<str> for LoaderId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

#[doc = "Information about the Frame on the page.\n[Frame](https://chromedevtools.github.io/devtools-protocol/tot/Page/#type-Frame)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[doc = "Frame unique identifier."]
    pub id: FrameId,
    #[doc = "Parent frame identifier."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<FrameId>,
    #[doc = "Identifier of the loader associated with this frame."]
    pub loader_id: LoaderId,
    #[doc = "Frame's name as specified in the tag."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[doc = "Frame document's URL without fragment."]
    pub url: String,
    #[doc = "Frame document's URL fragment including the '#'."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_fragment: Option<String>,
    #[serde(default)]
    pub security_origin: String,
    #[serde(default)]
    pub mime_type: String,
}

impl Frame {
    pub fn new(id: impl Into<FrameId>, loader_id: LoaderId, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            loader_id,
            name: None,
            url: url.into(),
            url_fragment: None,
            security_origin: Default::default(),
            mime_type: Default::default(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<FrameId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }
}

#[doc = "Information about the Frame hierarchy.\n[FrameTree](https://chromedevtools.github.io/devtools-protocol/tot/Page/#type-FrameTree)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameTree {
    #[doc = "Frame information for this tree item."]
    pub frame: Frame,
    #[doc = "Child frames."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_frames: Option<Vec<FrameTree>>,
}

impl FrameTree {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            child_frames: None,
        }
    }
}

#[doc = "Enables page domain notifications.\n[enable](https://chromedevtools.github.io/devtools-protocol/tot/Page/#method-enable)"]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnableParams {}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnableReturns {}

protocol_command!(EnableParams => EnableReturns, "Page.enable");

#[doc = "Returns present frame tree structure.\n[getFrameTree](https://chromedevtools.github.io/devtools-protocol/tot/Page/#method-getFrameTree)"]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GetFrameTreeParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFrameTreeReturns {
    pub frame_tree: FrameTree,
}

protocol_command!(GetFrameTreeParams => GetFrameTreeReturns, "Page.getFrameTree");

#[doc = "Controls whether page will emit lifecycle events.\n[setLifecycleEventsEnabled](https://chromedevtools.github.io/devtools-protocol/tot/Page/#method-setLifecycleEventsEnabled)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetLifecycleEventsEnabledParams {
    pub enabled: bool,
}

impl SetLifecycleEventsEnabledParams {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SetLifecycleEventsEnabledReturns {}

protocol_command!(SetLifecycleEventsEnabledParams => SetLifecycleEventsEnabledReturns, "Page.setLifecycleEventsEnabled");

#[doc = "Evaluates given script in every frame upon creation (before loading frame's scripts).\n[addScriptToEvaluateOnNewDocument](https://chromedevtools.github.io/devtools-protocol/tot/Page/#method-addScriptToEvaluateOnNewDocument)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddScriptToEvaluateOnNewDocumentParams {
    pub source: String,
    #[doc = "If specified, creates an isolated world with the given name and evaluates given script in it."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddScriptToEvaluateOnNewDocumentReturns {
    pub identifier: String,
}

protocol_command!(AddScriptToEvaluateOnNewDocumentParams => AddScriptToEvaluateOnNewDocumentReturns, "Page.addScriptToEvaluateOnNewDocument");

#[doc = "Creates an isolated world for the given frame.\n[createIsolatedWorld](https://chromedevtools.github.io/devtools-protocol/tot/Page/#method-createIsolatedWorld)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIsolatedWorldParams {
    pub frame_id: FrameId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_name: Option<String>,
    #[doc = "Whether or not universal access should be granted to the isolated world. This is a powerful\noption, use with caution."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_univeral_access: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIsolatedWorldReturns {
    pub execution_context_id: ExecutionContextId,
}

protocol_command!(CreateIsolatedWorldParams => CreateIsolatedWorldReturns, "Page.createIsolatedWorld");

#[doc = "Fired when frame has been attached to its parent.\n[frameAttached](https://chromedevtools.github.io/devtools-protocol/tot/Page/#event-frameAttached)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrameAttached {
    pub frame_id: FrameId,
    pub parent_frame_id: FrameId,
}

protocol_event!(EventFrameAttached, "Page.frameAttached");

#[doc = "Fired once navigation of the frame has completed. Frame is now associated with the new loader.\n[frameNavigated](https://chromedevtools.github.io/devtools-protocol/tot/Page/#event-frameNavigated)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrameNavigated {
    pub frame: Frame,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

protocol_event!(EventFrameNavigated, "Page.frameNavigated");

#[doc = "Fired when same-document navigation happens, e.g. due to history API usage or anchor navigation.\n[navigatedWithinDocument](https://chromedevtools.github.io/devtools-protocol/tot/Page/#event-navigatedWithinDocument)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNavigatedWithinDocument {
    pub frame_id: FrameId,
    pub url: String,
}

protocol_event!(EventNavigatedWithinDocument, "Page.navigatedWithinDocument");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameDetachedReason {
    Remove,
    Swap,
}

#[doc = "Fired when frame has been detached from its parent.\n[frameDetached](https://chromedevtools.github.io/devtools-protocol/tot/Page/#event-frameDetached)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrameDetached {
    pub frame_id: FrameId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FrameDetachedReason>,
}

protocol_event!(EventFrameDetached, "Page.frameDetached");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrameStartedLoading {
    pub frame_id: FrameId,
}

protocol_event!(EventFrameStartedLoading, "Page.frameStartedLoading");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrameStoppedLoading {
    pub frame_id: FrameId,
}

protocol_event!(EventFrameStoppedLoading, "Page.frameStoppedLoading");

#[doc = "Fired for top level page lifecycle events such as navigation, load, paint, etc.\n[lifecycleEvent](https://chromedevtools.github.io/devtools-protocol/tot/Page/#event-lifecycleEvent)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLifecycleEvent {
    pub frame_id: FrameId,
    pub loader_id: LoaderId,
    pub name: String,
    #[serde(default)]
    pub timestamp: f64,
}

protocol_event!(EventLifecycleEvent, "Page.lifecycleEvent");
