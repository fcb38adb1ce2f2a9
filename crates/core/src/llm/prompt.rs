use anyhow::{bail, Context};
use serde_json::Value;

/// A named prompt with `{{field}}` and `{{json field}}` placeholders.
///
/// Placeholders resolve against the serialized prompt input. Dotted paths
/// (`{{region.state}}`) walk nested objects.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub system: &'static str,
    pub body: &'static str,
}

impl PromptTemplate {
    pub fn render(&self, vars: &Value) -> anyhow::Result<String> {
        render(self.body, vars).with_context(|| format!("failed to render prompt '{}'", self.name))
    }
}

pub fn render(template: &str, vars: &Value) -> anyhow::Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            bail!("unterminated placeholder near: {}", &rest[start..]);
        };
        let expr = after[..end].trim();
        out.push_str(&expand(expr, vars)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn expand(expr: &str, vars: &Value) -> anyhow::Result<String> {
    let (as_json, path) = match expr.strip_prefix("json ") {
        Some(path) => (true, path.trim()),
        None => (false, expr),
    };

    let value = lookup(vars, path).with_context(|| format!("missing prompt variable '{path}'"))?;

    if as_json {
        return serde_json::to_string_pretty(value).context("failed to encode prompt variable");
    }

    Ok(match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lookup<'a>(vars: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(vars, |v, key| v.as_object().and_then(|o| o.get(key)))
}
