use serde::{Deserialize, Serialize};

use crate::{protocol_command, protocol_event};

#[doc = "Id of an execution context.\n[ExecutionContextId](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-ExecutionContextId)"]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionContextId(i64);

impl ExecutionContextId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ExecutionContextId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ExecutionContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[doc = "Unique object identifier.\n[RemoteObjectId](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-RemoteObjectId)"]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteObjectId(String);

impl RemoteObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl AsRef<str> for RemoteObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[doc = "Object type."]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteObjectType {
    Object,
    Function,
    Undefined,
    String,
    Number,
    Boolean,
    Symbol,
    Bigint,
    Wasm,
}

#[doc = "Object subtype hint. Specified for `object` or `wasm` type values only."]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteObjectSubtype {
    Array,
    Null,
    Node,
    Regexp,
    Date,
    Map,
    Set,
    Error,
    Proxy,
    Promise,
    Typedarray,
    #[serde(other)]
    Other,
}

#[doc = "Mirror object referencing original JavaScript object.\n[RemoteObject](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-RemoteObject)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[doc = "Object type."]
    pub r#type: RemoteObjectType,
    #[doc = "Object subtype hint. Specified for `object` or `wasm` type values only."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<RemoteObjectSubtype>,
    #[doc = "Object class (constructor) name. Specified for `object` type values only."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[doc = "Remote object value in case of primitive values or JSON values (if it was requested)."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[doc = "Primitive value which can not be JSON-stringified does not have `value`, but gets this\nproperty."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[doc = "String representation of the object."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[doc = "Unique object identifier (for non-primitive values)."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<RemoteObjectId>,
}

impl RemoteObject {
    pub fn new(r#type: RemoteObjectType) -> RemoteObject {
        Self {
            r#type,
            subtype: Default::default(),
            class_name: Default::default(),
            value: Default::default(),
            unserializable_value: Default::default(),
            description: Default::default(),
            object_id: Default::default(),
        }
    }

    /// The `undefined` value
    pub fn undefined() -> Self {
        Self::new(RemoteObjectType::Undefined)
    }
}

#[doc = "Description of an isolated world.\n[ExecutionContextDescription](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-ExecutionContextDescription)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContextDescription {
    #[doc = "Unique id of the execution context. It can be used to specify in which execution context\nscript evaluation should be performed."]
    pub id: ExecutionContextId,
    #[serde(default)]
    pub origin: String,
    #[doc = "Human readable name describing given context."]
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    #[doc = "Embedder-specific auxiliary data likely matching {isDefault: boolean, type: 'default'|'isolated'|'worker', frameId: string}"]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_data: Option<serde_json::Value>,
}

impl ExecutionContextDescription {
    /// The frame this context was created for, if any
    pub fn frame_id(&self) -> Option<&str> {
        self.aux_data.as_ref()?.get("frameId")?.as_str()
    }

    /// Whether this is the default context of its frame
    pub fn is_default(&self) -> bool {
        self.aux_data
            .as_ref()
            .and_then(|aux| aux.get("isDefault"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[doc = "Represents function call argument. Either remote object id `objectId`, primitive `value`,\nunserializable primitive value or neither of (for undefined) them should be specified.\n[CallArgument](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-CallArgument)"]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArgument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<RemoteObjectId>,
}

#[doc = "Stack entry for runtime errors and assertions.\n[CallFrame](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-CallFrame)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub script_id: String,
    #[serde(default)]
    pub url: String,
    #[doc = "JavaScript script line number (0-based)."]
    pub line_number: i64,
    #[doc = "JavaScript script column number (0-based)."]
    pub column_number: i64,
}

#[doc = "Call frames for assertions or error messages.\n[StackTrace](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-StackTrace)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub call_frames: Vec<CallFrame>,
}

#[doc = "Detailed information about exception (or error) that was thrown during script compilation or\nexecution.\n[ExceptionDetails](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-ExceptionDetails)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub exception_id: i64,
    #[doc = "Exception text, which should be used together with exception object when available."]
    pub text: String,
    pub line_number: i64,
    pub column_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<StackTrace>,
    #[doc = "Exception object if available."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<RemoteObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context_id: Option<ExecutionContextId>,
}

#[doc = "Evaluates expression on global object.\n[evaluate](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#method-evaluate)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    #[doc = "Expression to evaluate."]
    pub expression: String,
    #[doc = "Specifies in which execution context to perform evaluation. If the parameter is omitted the\nevaluation will be performed in the context of the inspected page."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<ExecutionContextId>,
    #[doc = "Whether the result is expected to be a JSON object that should be sent by value."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    #[doc = "Whether execution should `await` for resulting value and return once awaited promise is\nresolved."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
    #[doc = "Whether execution should be treated as initiated by user in the UI."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_gesture: Option<bool>,
}

impl EvaluateParams {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            context_id: None,
            return_by_value: None,
            await_promise: None,
            user_gesture: None,
        }
    }

    pub fn context_id(mut self, id: ExecutionContextId) -> Self {
        self.context_id = Some(id);
        self
    }

    pub fn return_by_value(mut self, by_value: bool) -> Self {
        self.return_by_value = Some(by_value);
        self
    }

    pub fn await_promise(mut self, await_promise: bool) -> Self {
        self.await_promise = Some(await_promise);
        self
    }

    pub fn user_gesture(mut self, user_gesture: bool) -> Self {
        self.user_gesture = Some(user_gesture);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateReturns {
    #[doc = "Evaluation result."]
    pub result: RemoteObject,
    #[doc = "Exception details."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_details: Option<ExceptionDetails>,
}

protocol_command!(EvaluateParams => EvaluateReturns, "Runtime.evaluate");

#[doc = "Calls function with given declaration on the given object. Object group of the result is\ninherited from the target object.\n[callFunctionOn](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#method-callFunctionOn)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionOnParams {
    #[doc = "Declaration of the function to call."]
    pub function_declaration: String,
    #[doc = "Identifier of the object to call function on. Either objectId or executionContextId should\nbe specified."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<RemoteObjectId>,
    #[doc = "Call arguments. All call arguments must belong to the same JavaScript world as the target\nobject."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<CallArgument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_gesture: Option<bool>,
    #[doc = "Specifies execution context which global object will be used to call function on. Either\nexecutionContextId or objectId should be specified."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context_id: Option<ExecutionContextId>,
}

impl CallFunctionOnParams {
    pub fn new(function_declaration: impl Into<String>) -> Self {
        Self {
            function_declaration: function_declaration.into(),
            object_id: None,
            arguments: None,
            return_by_value: None,
            await_promise: None,
            user_gesture: None,
            execution_context_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionOnReturns {
    #[doc = "Call result."]
    pub result: RemoteObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_details: Option<ExceptionDetails>,
}

protocol_command!(CallFunctionOnParams => CallFunctionOnReturns, "Runtime.callFunctionOn");

#[doc = "If executionContextId is empty, adds binding with the given name on the\nglobal objects of all inspected contexts.\n[addBinding](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#method-addBinding)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBindingParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context_id: Option<ExecutionContextId>,
    #[doc = "If specified, the binding is exposed to the executionContext with\nmatching name, even for contexts created after the binding is added."]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AddBindingReturns {}

protocol_command!(AddBindingParams => AddBindingReturns, "Runtime.addBinding");

#[doc = "Releases remote object with given id.\n[releaseObject](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#method-releaseObject)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseObjectParams {
    pub object_id: RemoteObjectId,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReleaseObjectReturns {}

protocol_command!(ReleaseObjectParams => ReleaseObjectReturns, "Runtime.releaseObject");

#[doc = "Returns properties of a given object.\n[getProperties](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#method-getProperties)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertiesParams {
    pub object_id: RemoteObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_properties: Option<bool>,
}

#[doc = "Object property descriptor.\n[PropertyDescriptor](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-PropertyDescriptor)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<RemoteObject>,
    #[serde(default)]
    pub enumerable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertiesReturns {
    pub result: Vec<PropertyDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_details: Option<ExceptionDetails>,
}

protocol_command!(GetPropertiesParams => GetPropertiesReturns, "Runtime.getProperties");

#[doc = "Enables reporting of execution contexts creation by means of `executionContextCreated` event.\n[enable](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#method-enable)"]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnableParams {}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnableReturns {}

protocol_command!(EnableParams => EnableReturns, "Runtime.enable");

#[doc = "Tells inspected instance to run if it was waiting for debugger to attach.\n[runIfWaitingForDebugger](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#method-runIfWaitingForDebugger)"]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunIfWaitingForDebuggerParams {}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunIfWaitingForDebuggerReturns {}

protocol_command!(RunIfWaitingForDebuggerParams => RunIfWaitingForDebuggerReturns, "Runtime.runIfWaitingForDebugger");

#[doc = "Issued when new execution context is created.\n[executionContextCreated](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#event-executionContextCreated)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventExecutionContextCreated {
    #[doc = "A newly created execution context."]
    pub context: ExecutionContextDescription,
}

protocol_event!(EventExecutionContextCreated, "Runtime.executionContextCreated");

#[doc = "Issued when execution context is destroyed.\n[executionContextDestroyed](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#event-executionContextDestroyed)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventExecutionContextDestroyed {
    #[doc = "Id of the destroyed context"]
    pub execution_context_id: ExecutionContextId,
}

protocol_event!(EventExecutionContextDestroyed, "Runtime.executionContextDestroyed");

#[doc = "Issued when all executionContexts were cleared in browser\n[executionContextsCleared](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#event-executionContextsCleared)"]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventExecutionContextsCleared {}

protocol_event!(EventExecutionContextsCleared, "Runtime.executionContextsCleared");

#[doc = "Notification is issued every time when binding is called.\n[bindingCalled](https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#event-bindingCalled)"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBindingCalled {
    pub name: String,
    pub payload: String,
    #[doc = "Identifier of the context where the call was made."]
    pub execution_context_id: ExecutionContextId,
}

protocol_event!(EventBindingCalled, "Runtime.bindingCalled");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_subtype_is_tolerated() {
        let obj: RemoteObject = serde_json::from_str(
            r#"{"type":"object","subtype":"weakref","className":"WeakRef","objectId":"1.2.3"}"#,
        )
        .unwrap();
        assert_eq!(obj.subtype, Some(RemoteObjectSubtype::Other));
        assert_eq!(obj.object_id, Some(RemoteObjectId::new("1.2.3")));
    }

    #[test]
    fn context_aux_data() {
        let desc: ExecutionContextDescription = serde_json::from_str(
            r#"{"id":4,"origin":"","name":"","auxData":{"isDefault":true,"type":"default","frameId":"F0"}}"#,
        )
        .unwrap();
        assert!(desc.is_default());
        assert_eq!(desc.frame_id(), Some("F0"));
        assert_eq!(desc.id, ExecutionContextId::new(4));
    }
}
