//! Client-side script calls emitted into the markup tree.
//!
//! A [`ScriptCall`] is a javascript template with `{0}`, `{1}`, ...
//! placeholders. On render, boolean and numeric arguments are substituted
//! as script-safe literals, nulls as `null`, and everything else as JSON,
//! so the resulting text is always a valid expression fragment.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ScriptCall {
    template: String,
    args: Vec<Value>,
}

impl ScriptCall {
    pub fn new(template: impl Into<String>) -> Self {
        ScriptCall {
            template: template.into(),
            args: Vec::new(),
        }
    }

    /// Append a positional argument. Serialization failures degrade to
    /// `null` rather than poisoning the render pass.
    pub fn arg(mut self, value: impl Serialize) -> Self {
        self.args
            .push(serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }

    /// Substitute arguments into the template.
    pub fn render(&self) -> String {
        let mut out = self.template.clone();
        for (i, arg) in self.args.iter().enumerate() {
            let literal = match arg {
                Value::Null => "null".to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => serde_json::to_string(other).unwrap_or_else(|_| "null".to_string()),
            };
            out = out.replace(&format!("{{{}}}", i), &literal);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_are_substituted_positionally() {
        let call = ScriptCall::new("move({0}, {1}, {2})")
            .arg(3)
            .arg(true)
            .arg(Option::<i32>::None);
        assert_eq!(call.render(), "move(3, true, null)");
    }

    #[test]
    fn strings_and_objects_render_as_json() {
        let call = ScriptCall::new("notify({0}, {1})")
            .arg("hello \"world\"")
            .arg(serde_json::json!({"level": 2}));
        assert_eq!(call.render(), r#"notify("hello \"world\"", {"level":2})"#);
    }

    #[test]
    fn template_without_args_passes_through() {
        assert_eq!(ScriptCall::new("refresh()").render(), "refresh()");
    }
}
