use std::fmt;

use serde::de::DeserializeOwned;

use frameoxide_types::runtime::{
    CallArgument, ExecutionContextId, RemoteObject, RemoteObjectId, RemoteObjectSubtype,
    RemoteObjectType,
};
use frameoxide_types::SessionId;

use crate::error::{CdpError, Result};
use crate::utils::is_likely_js_function;

/// Script evaluated in every fresh context, its result is kept as the
/// utility handle of the world.
pub(crate) const UTILITY_SCRIPT: &str = r#"(() => {
  const createdFunctions = new Map();
  const createFunction = (functionValue) => {
    let fn = createdFunctions.get(functionValue);
    if (fn) {
      return fn;
    }
    fn = new Function(`return ${functionValue}`)();
    createdFunctions.set(functionValue, fn);
    return fn;
  };
  const waitForPredicate = (polling, root, timeout, run) => {
    let timedOut = false;
    if (timeout) {
      setTimeout(() => (timedOut = true), timeout);
    }
    if (polling === 'raf') {
      return pollRaf();
    }
    return pollMutation();

    async function pollMutation() {
      const success = await run();
      if (success) {
        return success;
      }
      let fulfill;
      const result = new Promise((x) => (fulfill = x));
      const observer = new MutationObserver(async () => {
        if (timedOut) {
          observer.disconnect();
          fulfill();
        }
        const success = await run();
        if (success) {
          observer.disconnect();
          fulfill(success);
        }
      });
      observer.observe(root || document, {childList: true, subtree: true, attributes: true});
      return result;
    }

    async function pollRaf() {
      let fulfill;
      const result = new Promise((x) => (fulfill = x));
      await onRaf();
      return result;

      async function onRaf() {
        if (timedOut) {
          fulfill();
          return;
        }
        const success = await run();
        if (success) {
          fulfill(success);
        } else {
          requestAnimationFrame(onRaf);
        }
      }
    }
  };
  return {createFunction, waitForPredicate};
})()"#;

/// Evaluates the predicate once, used for interval polling.
pub(crate) const POLL_PREDICATE: &str = r#"async (utility, root, predicateBody, acceptsRoot, ...args) => {
  const predicate = utility.createFunction(predicateBody);
  return acceptsRoot ? await predicate(root || document, ...args) : await predicate(...args);
}"#;

/// Polls the predicate inside the page on every animation frame or mutation.
pub(crate) const WAIT_FOR_PREDICATE: &str = r#"async (utility, polling, timeout, root, predicateBody, acceptsRoot, ...args) => {
  const predicate = utility.createFunction(predicateBody);
  const run = () => (acceptsRoot ? predicate(root || document, ...args) : predicate(...args));
  return await utility.waitForPredicate(polling, root, timeout, run);
}"#;

/// Resolves to the matching node once the visibility requirement holds.
pub(crate) const SELECTOR_PREDICATE: &str = r#"(root, selector, waitForVisible, waitForHidden) => {
  const node = root.querySelector(selector);
  if (!node) {
    return waitForHidden;
  }
  if (!waitForVisible && !waitForHidden) {
    return node;
  }
  const element = node.nodeType === Node.TEXT_NODE ? node.parentElement : node;
  const style = window.getComputedStyle(element);
  const rect = element.getBoundingClientRect();
  const isVisible = !!style && style.visibility !== 'hidden' && !!(rect.top || rect.bottom || rect.width || rect.height);
  const success = waitForVisible === isVisible || waitForHidden === !isVisible;
  return success ? node : null;
}"#;

/// Same as [`SELECTOR_PREDICATE`] for xpath expressions.
pub(crate) const XPATH_PREDICATE: &str = r#"(root, selector, waitForVisible, waitForHidden) => {
  const node = document.evaluate(selector, root, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
  if (!node) {
    return waitForHidden;
  }
  if (!waitForVisible && !waitForHidden) {
    return node;
  }
  const element = node.nodeType === Node.TEXT_NODE ? node.parentElement : node;
  const style = window.getComputedStyle(element);
  const rect = element.getBoundingClientRect();
  const isVisible = !!style && style.visibility !== 'hidden' && !!(rect.top || rect.bottom || rect.width || rect.height);
  const success = waitForVisible === isVisible || waitForHidden === !isVisible;
  return success ? node : null;
}"#;

/// Installs the page side of a binding: calls are forwarded as json payloads
/// and answered through the `callbacks` map keyed by `seq`.
pub(crate) const BINDING_INIT: &str = r#"function addPageBinding(type, name) {
  const callCdp = globalThis[name];
  Object.assign(globalThis, {
    [name](...args) {
      const callback = globalThis[name];
      callback.callbacks ??= new Map();
      const seq = (callback.lastSeq ?? 0) + 1;
      callback.lastSeq = seq;
      callCdp(JSON.stringify({type, name, seq, args}));
      return new Promise((resolve, reject) => callback.callbacks.set(seq, {resolve, reject}));
    },
  });
}"#;

pub(crate) const DELIVER_RESULT: &str = r#"function deliverResult(name, seq, result) {
  globalThis[name].callbacks.get(seq).resolve(result);
  globalThis[name].callbacks.delete(seq);
}"#;

pub(crate) const DELIVER_ERROR: &str = r#"function deliverError(name, seq, message, stack) {
  const error = new Error(message);
  error.stack = stack;
  globalThis[name].callbacks.get(seq).reject(error);
  globalThis[name].callbacks.delete(seq);
}"#;

pub(crate) const CONTENT: &str = r#"() => {
  let retVal = '';
  if (document.doctype) {
    retVal = new XMLSerializer().serializeToString(document.doctype);
  }
  if (document.documentElement) {
    retVal += document.documentElement.outerHTML;
  }
  return retVal;
}"#;

pub(crate) const SET_CONTENT: &str = r#"(html) => {
  document.open();
  document.write(html);
  document.close();
}"#;

pub(crate) const TITLE: &str = "() => document.title";

#[derive(Debug, Clone)]
pub struct EvaluationResult {
    /// Mirror object referencing original JavaScript object
    inner: RemoteObject,
}

impl EvaluationResult {
    pub fn new(inner: RemoteObject) -> Self {
        Self { inner }
    }

    pub fn object(&self) -> &RemoteObject {
        &self.inner
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        self.inner.value.as_ref()
    }

    /// Attempts to deserialize the value into the given type
    pub fn into_value<T: DeserializeOwned>(self) -> serde_json::Result<T> {
        let value = match self.inner.value {
            Some(value) => value,
            None if self.inner.r#type == RemoteObjectType::Undefined => serde_json::Value::Null,
            None => return Err(serde::de::Error::custom("No value found")),
        };
        serde_json::from_value(value)
    }
}

/// A function declaration together with the arguments it is called with
#[derive(Debug, Clone)]
pub struct JsFunction {
    declaration: String,
    args: Vec<JsArg>,
}

impl JsFunction {
    pub fn new(declaration: impl Into<String>) -> Self {
        Self {
            declaration: declaration.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<JsArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<JsArg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn declaration(&self) -> &str {
        &self.declaration
    }

    pub(crate) fn into_parts(self) -> (String, Vec<JsArg>) {
        (self.declaration, self.args)
    }
}

impl fmt::Display for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.declaration)
    }
}

/// What to evaluate: a plain expression or a function called with arguments
#[derive(Debug, Clone)]
pub enum Evaluation {
    Expression(String),
    Function(JsFunction),
}

impl From<&str> for Evaluation {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}

impl From<String> for Evaluation {
    fn from(s: String) -> Self {
        if is_likely_js_function(&s) {
            Evaluation::Function(JsFunction::new(s))
        } else {
            Evaluation::Expression(s)
        }
    }
}

impl From<JsFunction> for Evaluation {
    fn from(f: JsFunction) -> Self {
        Evaluation::Function(f)
    }
}

/// An argument for a function evaluated in the page
#[derive(Debug, Clone)]
pub enum JsArg {
    /// Any json value
    Value(serde_json::Value),
    /// A number, `-0`, `NaN` and the infinities are passed unserialized
    Number(f64),
    /// A big integer literal without the trailing `n`
    BigInt(String),
    Undefined,
    /// A reference to a handle, only valid in the context it was created in
    Handle(HandleArg),
    /// A raw reference to a remote object
    ObjectId(RemoteObjectId),
}

/// The parts of a handle needed to pass it as an argument
#[derive(Debug, Clone)]
pub struct HandleArg {
    pub(crate) session_id: SessionId,
    pub(crate) context_id: ExecutionContextId,
    pub(crate) object: RemoteObject,
    pub(crate) disposed: bool,
}

impl JsArg {
    /// Encodes the argument for a call in the context `context_id` of
    /// `session_id`
    pub(crate) fn into_call_argument(
        self,
        session_id: &SessionId,
        context_id: ExecutionContextId,
    ) -> Result<CallArgument> {
        let arg = match self {
            JsArg::Value(value) => CallArgument {
                value: Some(value),
                ..Default::default()
            },
            JsArg::Number(n) => number_argument(n),
            JsArg::BigInt(s) => CallArgument {
                unserializable_value: Some(format!("{s}n")),
                ..Default::default()
            },
            JsArg::Undefined => CallArgument::default(),
            JsArg::ObjectId(id) => CallArgument {
                object_id: Some(id),
                ..Default::default()
            },
            JsArg::Handle(handle) => {
                if &handle.session_id != session_id || handle.context_id != context_id {
                    return Err(CdpError::msg(
                        "JSHandles can be evaluated only in the context they were created!",
                    ));
                }
                if handle.disposed {
                    return Err(CdpError::msg("JSHandle is disposed!"));
                }
                let object = handle.object;
                if let Some(object_id) = object.object_id {
                    CallArgument {
                        object_id: Some(object_id),
                        ..Default::default()
                    }
                } else if let Some(unserializable) = object.unserializable_value {
                    CallArgument {
                        unserializable_value: Some(unserializable),
                        ..Default::default()
                    }
                } else {
                    CallArgument {
                        value: object.value,
                        ..Default::default()
                    }
                }
            }
        };
        Ok(arg)
    }
}

fn number_argument(n: f64) -> CallArgument {
    let unserializable = if n.is_nan() {
        Some("NaN")
    } else if n == f64::INFINITY {
        Some("Infinity")
    } else if n == f64::NEG_INFINITY {
        Some("-Infinity")
    } else if n == 0.0 && n.is_sign_negative() {
        Some("-0")
    } else {
        None
    };
    match unserializable {
        Some(s) => CallArgument {
            unserializable_value: Some(s.to_string()),
            ..Default::default()
        },
        None => CallArgument {
            value: Some(serde_json::json!(n)),
            ..Default::default()
        },
    }
}

impl From<serde_json::Value> for JsArg {
    fn from(value: serde_json::Value) -> Self {
        JsArg::Value(value)
    }
}

impl From<&str> for JsArg {
    fn from(s: &str) -> Self {
        JsArg::Value(s.into())
    }
}

impl From<String> for JsArg {
    fn from(s: String) -> Self {
        JsArg::Value(s.into())
    }
}

impl From<bool> for JsArg {
    fn from(b: bool) -> Self {
        JsArg::Value(b.into())
    }
}

impl From<i64> for JsArg {
    fn from(n: i64) -> Self {
        JsArg::Value(n.into())
    }
}

impl From<f64> for JsArg {
    fn from(n: f64) -> Self {
        JsArg::Number(n)
    }
}

/// Whether the remote value is truthy in javascript terms
pub(crate) fn is_truthy(object: &RemoteObject) -> bool {
    match object.r#type {
        RemoteObjectType::Undefined => false,
        RemoteObjectType::Object => object.subtype != Some(RemoteObjectSubtype::Null),
        RemoteObjectType::Boolean => object.value.as_ref().and_then(|v| v.as_bool()) == Some(true),
        RemoteObjectType::String => object
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .map(|s| !s.is_empty())
            .unwrap_or(false),
        RemoteObjectType::Number => {
            if let Some(unserializable) = object.unserializable_value.as_deref() {
                return !matches!(unserializable, "NaN" | "-0");
            }
            object.value.as_ref().and_then(|v| v.as_f64()).unwrap_or(0.0) != 0.0
        }
        RemoteObjectType::Bigint => !matches!(
            object.unserializable_value.as_deref(),
            Some("0n") | Some("-0n") | None
        ),
        RemoteObjectType::Function | RemoteObjectType::Symbol | RemoteObjectType::Wasm => true,
    }
}
