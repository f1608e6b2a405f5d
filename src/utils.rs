use frameoxide_types::runtime::ExceptionDetails;

/// The url every evaluated script is attributed to in stack traces
pub(crate) const EVALUATION_SCRIPT_URL: &str = "__frameoxide_evaluation_script__";

/// Appends the `sourceURL` comment unless the script already names its source
pub(crate) fn with_source_url(script: impl Into<String>) -> String {
    let mut script = script.into();
    let has_source_url = script.lines().any(|line| {
        let line = line.trim_start_matches([' ', '\t']);
        line.starts_with("//# sourceURL=") || line.starts_with("//@ sourceURL=")
    });
    if !has_source_url {
        script.push_str("\n//# sourceURL=");
        script.push_str(EVALUATION_SCRIPT_URL);
    }
    script
}

/// Creates a javascript function string as `(<function>)(<param 1>, <param
/// 2>)` where every param is inserted as json
pub fn evaluation_string(function: impl AsRef<str>, params: &[serde_json::Value]) -> String {
    let params = params
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("({})({})", function.as_ref(), params)
}

/// Renders the message of a thrown exception followed by its call stack.
pub(crate) fn exception_message(details: &ExceptionDetails) -> String {
    let mut message = details
        .exception
        .as_ref()
        .and_then(|exception| {
            exception.description.clone().or_else(|| {
                exception.value.as_ref().map(|value| match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            })
        })
        .unwrap_or_else(|| details.text.clone());

    if let Some(ref stack) = details.stack_trace {
        for frame in &stack.call_frames {
            let name = if frame.function_name.is_empty() {
                "<anonymous>"
            } else {
                frame.function_name.as_str()
            };
            message.push_str(&format!(
                "\n    at {} ({}:{}:{})",
                name, frame.url, frame.line_number, frame.column_number
            ));
        }
    }
    message
}

/// Tries to identify whether this a javascript function
pub fn is_likely_js_function(function: impl AsRef<str>) -> bool {
    let mut fun = function.as_ref().trim_start();
    if fun.is_empty() {
        return false;
    }
    let mut offset = 0;

    if fun.starts_with("async ") {
        offset = "async ".len() - 1
    }

    if fun[offset..].trim_start().starts_with("function") {
        return true;
    } else if skip_args(&mut fun) {
        // attempt to detect arrow functions by stripping the leading arguments and
        // looking for the arrow
        if fun.trim_start().starts_with("=>") {
            return true;
        }
    } else if let Some(arrow) = fun.find("=>") {
        // single identifier arrow function `x => x`
        let param = fun[offset..arrow].trim();
        return !param.is_empty()
            && param
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    }
    false
}

/// This attempts to strip any leading pair of parentheses from the input
///
/// `()=>` -> `=>`
/// `(abc, def)=>` -> `=>`
fn skip_args(input: &mut &str) -> bool {
    if !input.starts_with('(') {
        return false;
    }
    let mut open = 1;
    let mut closed = 0;
    *input = &input[1..];
    while !input.is_empty() && open != closed {
        if let Some(idx) = input.find(&['(', ')'] as &[_]) {
            if &input[idx..=idx] == ")" {
                closed += 1;
            } else {
                open += 1;
            }
            *input = &input[idx + 1..];
        } else {
            break;
        }
    }

    open == closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use frameoxide_types::runtime::{
        CallFrame, RemoteObject, RemoteObjectType, StackTrace,
    };

    #[test]
    fn is_js_function() {
        assert!(is_likely_js_function("function abc() {}"));
        assert!(is_likely_js_function("async function abc() {}"));
        assert!(is_likely_js_function("() => {}"));
        assert!(is_likely_js_function("(abc, def) => {}"));
        assert!(is_likely_js_function("((abc), (def)) => {}"));
        assert!(is_likely_js_function("() => Promise.resolve(100 / 25)"));
        assert!(is_likely_js_function("el => el.textContent"));
        assert!(!is_likely_js_function("document.title"));
        assert!(!is_likely_js_function("(1 + 2) * 3"));
        assert!(!is_likely_js_function("window.ready === true"));
    }

    #[test]
    fn source_url_appended_once() {
        let script = with_source_url("1 + 1");
        assert_eq!(
            script,
            "1 + 1\n//# sourceURL=__frameoxide_evaluation_script__"
        );
        assert_eq!(with_source_url(script.clone()), script);
    }

    #[test]
    fn evaluation_string_json_params() {
        let s = evaluation_string(
            "function deliverResult(name, seq, result) {}",
            &[serde_json::json!("hook"), serde_json::json!(3), serde_json::json!({"a": 1})],
        );
        assert_eq!(
            s,
            r#"(function deliverResult(name, seq, result) {})("hook",3,{"a":1})"#
        );
    }

    #[test]
    fn formats_exception_with_stack() {
        let mut exception = RemoteObject::new(RemoteObjectType::Object);
        exception.description = Some("Error: boom".to_string());
        let details = ExceptionDetails {
            exception_id: 1,
            text: "Uncaught".to_string(),
            line_number: 0,
            column_number: 6,
            url: None,
            stack_trace: Some(StackTrace {
                description: None,
                call_frames: vec![
                    CallFrame {
                        function_name: "explode".to_string(),
                        script_id: "12".to_string(),
                        url: EVALUATION_SCRIPT_URL.to_string(),
                        line_number: 1,
                        column_number: 14,
                    },
                    CallFrame {
                        function_name: String::new(),
                        script_id: "12".to_string(),
                        url: EVALUATION_SCRIPT_URL.to_string(),
                        line_number: 3,
                        column_number: 0,
                    },
                ],
            }),
            exception: Some(exception),
            execution_context_id: None,
        };
        assert_eq!(
            exception_message(&details),
            "Error: boom\n    at explode (__frameoxide_evaluation_script__:1:14)\n    at <anonymous> (__frameoxide_evaluation_script__:3:0)"
        );

        let details = ExceptionDetails {
            stack_trace: None,
            exception: None,
            ..details
        };
        assert_eq!(exception_message(&details), "Uncaught");
    }
}
