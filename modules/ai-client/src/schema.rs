use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types that can be extracted via forced tool use.
///
/// Automatically implemented for any type that implements
/// `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate a tool-input JSON schema for this type.
    ///
    /// Structured extraction requires:
    /// 1. `additionalProperties: false` on every object schema
    /// 2. every property listed in `required`, nullable ones included
    /// 3. a fully inlined schema (no `$ref` references)
    fn tool_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        tighten_objects(&mut value);
        inline_refs(&mut value);

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// Set `additionalProperties: false` and mark every property required,
/// recursively.
fn tighten_objects(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );

                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<serde_json::Value> = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".to_string(), serde_json::Value::Array(all_keys));
                }
            }

            for (_, v) in map.iter_mut() {
                tighten_objects(v);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                tighten_objects(item);
            }
        }
        _ => {}
    }
}

fn inline_refs(value: &mut serde_json::Value) {
    let definitions = if let serde_json::Value::Object(map) = value {
        map.get("definitions").cloned()
    } else {
        None
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut serde_json::Value, definitions: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if ref_path.starts_with("#/definitions/") {
                    let type_name = ref_path.trim_start_matches("#/definitions/");
                    if let Some(def) = definitions.get(type_name) {
                        *value = def.clone();
                        inline_refs_recursive(value, definitions);
                        return;
                    }
                }
            }

            // schemars wraps single-variant references in allOf
            if let Some(serde_json::Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    *value = all_of.into_iter().next().unwrap();
                    inline_refs_recursive(value, definitions);
                    return;
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct Analysis {
        topic: String,
        keywords: Vec<String>,
        question: Option<String>,
    }

    #[test]
    fn schema_is_an_object() {
        let schema = Analysis::tool_schema();
        assert!(schema.is_object());
        assert!(!schema.as_object().unwrap().contains_key("$schema"));
    }

    #[test]
    fn nullable_properties_are_still_required() {
        let schema = Analysis::tool_schema();
        let required = schema
            .get("required")
            .expect("required array")
            .as_array()
            .unwrap();
        let names: Vec<&str> = required.iter().filter_map(|v| v.as_str()).collect();

        assert!(names.contains(&"topic"));
        assert!(names.contains(&"keywords"));
        assert!(names.contains(&"question"));
        assert_eq!(
            schema.get("additionalProperties"),
            Some(&serde_json::Value::Bool(false))
        );
    }

    #[test]
    fn nested_types_are_inlined() {
        #[derive(Deserialize, JsonSchema)]
        struct Inner {
            #[allow(dead_code)]
            label: String,
        }

        #[derive(Deserialize, JsonSchema)]
        struct Outer {
            #[allow(dead_code)]
            inner: Inner,
        }

        let schema = Outer::tool_schema();
        let schema_obj = schema.as_object().unwrap();
        assert!(!schema_obj.contains_key("definitions"));

        let inner = schema_obj
            .get("properties")
            .and_then(|p| p.get("inner"))
            .and_then(|v| v.as_object())
            .expect("inner property");
        assert!(!inner.contains_key("$ref"));
        assert_eq!(
            inner.get("type"),
            Some(&serde_json::Value::String("object".to_string()))
        );
    }
}
