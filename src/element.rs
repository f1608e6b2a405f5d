use crate::context::ExecutionContext;
use crate::error::Result;
use crate::handle::JsHandle;
use crate::js::JsArg;

const QUERY_SELECTOR: &str = "(element, selector) => element.querySelector(selector)";

const QUERY_SELECTOR_ALL: &str =
    "(element, selector) => Array.from(element.querySelectorAll(selector))";

const XPATH: &str = r#"(element, expression) => {
  const document = element.ownerDocument || element;
  const iterator = document.evaluate(expression, element, null, XPathResult.ORDERED_NODE_ITERATOR_TYPE);
  const array = [];
  let item;
  while ((item = iterator.iterateNext())) {
    array.push(item);
  }
  return array;
}"#;

const FOCUS: &str = "(element) => element.focus()";

const SELECT: &str = r#"(element, values) => {
  if (element.nodeName.toLowerCase() !== 'select') {
    throw new Error('Element is not a <select> element.');
  }
  const options = Array.from(element.options);
  element.value = undefined;
  for (const option of options) {
    option.selected = values.includes(option.value);
    if (option.selected && !element.multiple) {
      break;
    }
  }
  element.dispatchEvent(new Event('input', {bubbles: true}));
  element.dispatchEvent(new Event('change', {bubbles: true}));
  return options.filter((option) => option.selected).map((option) => option.value);
}"#;

/// A handle to a [DOM Element](https://developer.mozilla.org/en-US/docs/Web/API/Element).
#[derive(Debug, Clone)]
pub struct ElementHandle {
    handle: JsHandle,
}

impl ElementHandle {
    pub(crate) fn new(handle: JsHandle) -> Self {
        Self { handle }
    }

    /// The underlying js handle
    pub fn handle(&self) -> &JsHandle {
        &self.handle
    }

    pub fn into_handle(self) -> JsHandle {
        self.handle
    }

    pub fn execution_context(&self) -> &ExecutionContext {
        self.handle.execution_context()
    }

    async fn call(&self, declaration: &str, arg: impl Into<JsArg>) -> Result<JsHandle> {
        let context = self.execution_context();
        let object = context
            .call_function(declaration, vec![self.handle.to_arg(), arg.into()], false)
            .await?;
        Ok(context.handle(object))
    }

    /// Returns the first descendant that matches the css selector
    pub async fn query_selector(&self, selector: impl Into<String>) -> Result<Option<ElementHandle>> {
        let handle = self.call(QUERY_SELECTOR, selector.into()).await?;
        let element = handle.as_element();
        if element.is_none() {
            handle.dispose().await?;
        }
        Ok(element)
    }

    /// Returns all descendants that match the css selector
    pub async fn query_selector_all(&self, selector: impl Into<String>) -> Result<Vec<ElementHandle>> {
        let array = self.call(QUERY_SELECTOR_ALL, selector.into()).await?;
        elements_of(array).await
    }

    /// Returns all nodes the xpath expression evaluates to, relative to this
    /// element
    pub async fn xpath(&self, expression: impl Into<String>) -> Result<Vec<ElementHandle>> {
        let array = self.call(XPATH, expression.into()).await?;
        elements_of(array).await
    }

    pub async fn focus(&self) -> Result<()> {
        self.execution_context()
            .call_function(FOCUS, vec![self.handle.to_arg()], true)
            .await?;
        Ok(())
    }

    /// Selects the options with the given values of a `<select>` element,
    /// returns the values that are selected afterwards
    pub async fn select<I, S>(&self, values: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let selected = self
            .execution_context()
            .call_function(
                SELECT,
                vec![self.handle.to_arg(), JsArg::Value(values.into())],
                true,
            )
            .await?;
        Ok(crate::js::EvaluationResult::new(selected).into_value()?)
    }

    pub async fn dispose(&self) -> Result<()> {
        self.handle.dispose().await
    }
}

/// Collects the element properties of a remote array and releases the array
async fn elements_of(array: JsHandle) -> Result<Vec<ElementHandle>> {
    let properties = array.get_properties().await?;
    array.dispose().await?;
    Ok(properties
        .into_iter()
        .filter_map(|(_, handle)| handle.as_element())
        .collect())
}
