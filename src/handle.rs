use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use frameoxide_types::runtime::{
    GetPropertiesParams, ReleaseObjectParams, RemoteObject, RemoteObjectSubtype, RemoteObjectType,
};

use crate::context::ExecutionContext;
use crate::element::ElementHandle;
use crate::error::{CdpError, Result};
use crate::js::{is_truthy, EvaluationResult, HandleArg, JsArg};

/// A reference to an object in the page.
///
/// The handle is tied to the context it was created in and can only be used
/// as an argument for evaluations in that context. Clones share the disposed
/// state.
#[derive(Debug, Clone)]
pub struct JsHandle {
    context: ExecutionContext,
    object: RemoteObject,
    disposed: Arc<AtomicBool>,
}

impl JsHandle {
    pub(crate) fn new(context: ExecutionContext, object: RemoteObject) -> Self {
        Self {
            context,
            object,
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn object(&self) -> &RemoteObject {
        &self.object
    }

    pub fn execution_context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Whether the referenced value is truthy
    pub fn is_truthy(&self) -> bool {
        is_truthy(&self.object)
    }

    /// Whether the handle references `null` or `undefined`
    pub fn is_nullish(&self) -> bool {
        self.object.r#type == RemoteObjectType::Undefined
            || self.object.subtype == Some(RemoteObjectSubtype::Null)
    }

    /// The element this handle references, if it is a DOM node
    pub fn as_element(&self) -> Option<ElementHandle> {
        (self.object.subtype == Some(RemoteObjectSubtype::Node))
            .then(|| ElementHandle::new(self.clone()))
    }

    /// Releases the remote object, a second call is a no-op
    pub async fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(ref object_id) = self.object.object_id {
            let release = ReleaseObjectParams {
                object_id: object_id.clone(),
            };
            if let Err(err) = self
                .context
                .page()
                .execute_in(release, Some(self.context.session_id().clone()))
                .await
            {
                // the object is gone with its context already
                tracing::debug!("Failed to release object {:?}: {}", object_id, err);
            }
        }
        Ok(())
    }

    /// The json value of the referenced object
    pub async fn json_value<T: DeserializeOwned>(&self) -> Result<T> {
        let object = if self.object.object_id.is_some() {
            self.context
                .call_function("(object) => object", vec![self.to_arg()], true)
                .await?
        } else {
            self.object.clone()
        };
        Ok(EvaluationResult::new(object).into_value()?)
    }

    /// The property `name` of the referenced object
    pub async fn get_property(&self, name: impl Into<String>) -> Result<JsHandle> {
        let object = self
            .context
            .call_function(
                "(object, name) => object[name]",
                vec![self.to_arg(), JsArg::from(name.into())],
                false,
            )
            .await?;
        Ok(self.context.handle(object))
    }

    /// All enumerable own properties of the referenced object
    pub async fn get_properties(&self) -> Result<Vec<(String, JsHandle)>> {
        if self.is_disposed() {
            return Err(CdpError::msg("JSHandle is disposed!"));
        }
        let Some(ref object_id) = self.object.object_id else {
            return Ok(Vec::new());
        };
        let params = GetPropertiesParams {
            object_id: object_id.clone(),
            own_properties: Some(true),
        };
        let resp = self
            .context
            .page()
            .execute_in(params, Some(self.context.session_id().clone()))
            .await?;
        Ok(resp
            .result
            .result
            .into_iter()
            .filter(|prop| prop.enumerable)
            .filter_map(|prop| {
                let value = prop.value?;
                Some((prop.name, self.context.handle(value)))
            })
            .collect())
    }

    pub(crate) fn to_arg(&self) -> JsArg {
        JsArg::Handle(HandleArg {
            session_id: self.context.session_id().clone(),
            context_id: self.context.id(),
            object: self.object.clone(),
            disposed: self.is_disposed(),
        })
    }
}

impl From<&JsHandle> for JsArg {
    fn from(handle: &JsHandle) -> Self {
        handle.to_arg()
    }
}

impl From<JsHandle> for JsArg {
    fn from(handle: JsHandle) -> Self {
        handle.to_arg()
    }
}
