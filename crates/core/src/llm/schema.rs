use schemars::JsonSchema;
use serde_json::{Map, Value};
use std::marker::PhantomData;

/// JSON schema for a typed generation output, derived from `T`.
///
/// The schema is sent to the provider; the returned value is checked by
/// decoding it into `T`.
#[derive(Debug)]
pub struct OutputSchema<T> {
    pub name: &'static str,
    pub description: &'static str,
    pub json: Value,
    _marker: PhantomData<fn() -> T>,
}

impl<T: JsonSchema> OutputSchema<T> {
    pub fn derive(name: &'static str, description: &'static str) -> Self {
        let mut json = schemars::schema_for!(T).to_value();
        if let Some(obj) = json.as_object_mut() {
            obj.remove("$schema");
        }
        Self {
            name,
            description,
            json,
            _marker: PhantomData,
        }
    }
}

/// Rewrites a JSON schema into the OpenAPI subset Gemini's `responseSchema` accepts:
/// upper-case type names, no `additionalProperties` and no `title`.
pub fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => {
            let mut out = Map::new();
            for (k, v) in obj {
                match k.as_str() {
                    "additionalProperties" | "title" => {}
                    "type" => {
                        let ty = match v {
                            Value::String(s) => Value::String(s.to_ascii_uppercase()),
                            other => other.clone(),
                        };
                        out.insert(k.clone(), ty);
                    }
                    "properties" => {
                        let props = v
                            .as_object()
                            .map(|p| {
                                p.iter()
                                    .map(|(name, s)| (name.clone(), to_gemini_schema(s)))
                                    .collect::<Map<_, _>>()
                            })
                            .unwrap_or_default();
                        out.insert(k.clone(), Value::Object(props));
                    }
                    "items" => {
                        out.insert(k.clone(), to_gemini_schema(v));
                    }
                    _ => {
                        out.insert(k.clone(), v.clone());
                    }
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
