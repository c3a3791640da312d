// Metadata → JSON Schema transcription.
//
// Named types become `$ref`s into `components.schemas`; constraint tags
// map onto their JSON-Schema keywords.

use serde_json::{json, Map, Value};
use ts::LiteralValue;
use tsnest_compiler::{ConstraintTag, FrozenRegistry, Metadata, Primitive};

pub fn reference(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{}", name) })
}

fn literal_to_value(v: &LiteralValue) -> Value {
    match v {
        LiteralValue::String(s) => Value::String(s.clone()),
        LiteralValue::Number(n) => json!(n),
        LiteralValue::Boolean(b) => Value::Bool(*b),
    }
}

fn apply_tags(schema: &mut Map<String, Value>, tags: &[&ConstraintTag]) {
    for tag in tags {
        match tag {
            ConstraintTag::Minimum(n) => {
                schema.insert("minimum".into(), json!(n));
            }
            ConstraintTag::Maximum(n) => {
                schema.insert("maximum".into(), json!(n));
            }
            ConstraintTag::ExclusiveMinimum(n) => {
                schema.insert("exclusiveMinimum".into(), json!(n));
            }
            ConstraintTag::ExclusiveMaximum(n) => {
                schema.insert("exclusiveMaximum".into(), json!(n));
            }
            ConstraintTag::MultipleOf(n) => {
                schema.insert("multipleOf".into(), json!(n));
            }
            ConstraintTag::Integer => {
                schema.insert("type".into(), json!("integer"));
            }
            ConstraintTag::MinLength(n) => {
                schema.insert("minLength".into(), json!(n));
            }
            ConstraintTag::MaxLength(n) => {
                schema.insert("maxLength".into(), json!(n));
            }
            ConstraintTag::Pattern(p) => {
                schema.insert("pattern".into(), json!(p));
            }
            ConstraintTag::StartsWith(s) => {
                schema.insert("pattern".into(), json!(format!("^{}", regex_escape(s))));
            }
            ConstraintTag::EndsWith(s) => {
                schema.insert("pattern".into(), json!(format!("{}$", regex_escape(s))));
            }
            ConstraintTag::Includes(s) => {
                schema.insert("pattern".into(), json!(regex_escape(s)));
            }
            ConstraintTag::Format(f) => {
                schema.insert("format".into(), json!(f.keyword()));
            }
            ConstraintTag::MinItems(n) => {
                schema.insert("minItems".into(), json!(n));
            }
            ConstraintTag::MaxItems(n) => {
                schema.insert("maxItems".into(), json!(n));
            }
            ConstraintTag::UniqueItems => {
                schema.insert("uniqueItems".into(), json!(true));
            }
            ConstraintTag::Default(text) => {
                let value = serde_json::from_str::<Value>(text)
                    .unwrap_or_else(|_| Value::String(text.clone()));
                schema.insert("default".into(), value);
            }
            ConstraintTag::Transform(_) => {}
        }
    }
}

fn regex_escape(s: &str) -> String {
    regex::escape(s)
}

/// Schema for a metadata value, with extra property-level tags folded in.
pub fn schema_with_tags(
    meta: &Metadata,
    extra_tags: &[ConstraintTag],
    registry: &FrozenRegistry,
) -> Value {
    let mut value = schema_for(meta, registry);
    if let Value::Object(obj) = &mut value {
        let own: Vec<&ConstraintTag> = extra_tags.iter().collect();
        apply_tags(obj, &own);
    }
    value
}

pub fn schema_for(meta: &Metadata, registry: &FrozenRegistry) -> Value {
    match meta {
        Metadata::Primitive { primitive, tags } => {
            let mut obj = Map::new();
            match primitive {
                Primitive::String => {
                    obj.insert("type".into(), json!("string"));
                }
                Primitive::Number => {
                    obj.insert("type".into(), json!("number"));
                }
                Primitive::Boolean => {
                    obj.insert("type".into(), json!("boolean"));
                }
                Primitive::Null => {
                    obj.insert("type".into(), json!("null"));
                }
                Primitive::Undefined | Primitive::Never => {
                    obj.insert("not".into(), json!({}));
                }
                Primitive::BigInt => {
                    obj.insert("type".into(), json!("integer"));
                    obj.insert("format".into(), json!("int64"));
                }
                Primitive::Any | Primitive::Unknown => {}
            }
            let tag_refs: Vec<&ConstraintTag> = tags.iter().collect();
            apply_tags(&mut obj, &tag_refs);
            Value::Object(obj)
        }
        Metadata::Literal { value } => json!({ "const": literal_to_value(value) }),
        Metadata::Object(o) => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for p in &o.properties {
                let mut prop_schema = schema_with_tags(&p.meta, &p.tags, registry);
                if p.readonly {
                    if let Value::Object(obj) = &mut prop_schema {
                        obj.insert("readOnly".into(), json!(true));
                    }
                }
                properties.insert(p.name.clone(), prop_schema);
                if !p.optional {
                    required.push(Value::String(p.name.clone()));
                }
            }
            let mut obj = Map::new();
            obj.insert("type".into(), json!("object"));
            obj.insert("properties".into(), Value::Object(properties));
            if !required.is_empty() {
                obj.insert("required".into(), Value::Array(required));
            }
            Value::Object(obj)
        }
        Metadata::Array { element, tags } => {
            let mut obj = Map::new();
            obj.insert("type".into(), json!("array"));
            obj.insert("items".into(), schema_for(element, registry));
            let tag_refs: Vec<&ConstraintTag> = tags.iter().collect();
            apply_tags(&mut obj, &tag_refs);
            Value::Object(obj)
        }
        Metadata::Tuple { elements, rest } => {
            let prefix: Vec<Value> = elements.iter().map(|e| schema_for(e, registry)).collect();
            let mut obj = Map::new();
            obj.insert("type".into(), json!("array"));
            obj.insert("prefixItems".into(), Value::Array(prefix));
            match rest {
                Some(r) => {
                    obj.insert("items".into(), schema_for(r, registry));
                }
                None => {
                    obj.insert("items".into(), json!(false));
                }
            }
            Value::Object(obj)
        }
        Metadata::Union(u) => {
            if let Some(values) = u.as_string_enum() {
                let mut obj = Map::new();
                obj.insert("type".into(), json!("string"));
                obj.insert(
                    "enum".into(),
                    Value::Array(values.iter().map(|s| json!(s)).collect()),
                );
                if u.nullable {
                    return json!({ "oneOf": [Value::Object(obj), { "type": "null" }] });
                }
                return Value::Object(obj);
            }
            let mut variants: Vec<Value> =
                u.variants.iter().map(|v| schema_for(v, registry)).collect();
            if u.nullable {
                variants.push(json!({ "type": "null" }));
            }
            if variants.len() == 1 {
                variants.pop().unwrap_or_default()
            } else {
                json!({ "oneOf": variants })
            }
        }
        Metadata::Intersection { members } => {
            let all: Vec<Value> = members.iter().map(|m| schema_for(m, registry)).collect();
            json!({ "allOf": all })
        }
        Metadata::Reference { name } => reference(name),
        Metadata::Enum(e) => {
            let values: Vec<Value> = e.members.iter().map(|m| literal_to_value(&m.value)).collect();
            json!({ "enum": values })
        }
        Metadata::Record { key: _, value } => {
            json!({ "type": "object", "additionalProperties": schema_for(value, registry) })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use smallvec::smallvec;
    use tsnest_compiler::{MetadataRegistry, ObjectMeta, Property, StringFormat, Tags};

    #[test]
    fn primitive_tags_become_keywords() {
        let registry = MetadataRegistry::new().freeze();
        let meta = Metadata::Primitive {
            primitive: Primitive::Number,
            tags: smallvec![
                ConstraintTag::Minimum(0.0),
                ConstraintTag::Maximum(150.0),
                ConstraintTag::Integer
            ],
        };
        let schema = schema_for(&meta, &registry);
        assert_eq!(schema["type"], "integer");
        assert_eq!(schema["minimum"], 0.0);
        assert_eq!(schema["maximum"], 150.0);
    }

    #[test]
    fn object_lists_required_and_refs() {
        let registry = MetadataRegistry::new().freeze();
        let meta = Metadata::Object(ObjectMeta {
            name: Some("Dto".to_string()),
            properties: vec![
                Property {
                    name: "email".to_string(),
                    meta: Metadata::Primitive {
                        primitive: Primitive::String,
                        tags: smallvec![ConstraintTag::Format(StringFormat::Email)],
                    },
                    optional: false,
                    readonly: false,
                    tags: Tags::new(),
                },
                Property {
                    name: "friend".to_string(),
                    meta: Metadata::reference("Friend"),
                    optional: true,
                    readonly: false,
                    tags: Tags::new(),
                },
            ],
            coerce: false,
        });
        let schema = schema_for(&meta, &registry);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["email"]["format"], "email");
        assert_eq!(
            schema["properties"]["friend"]["$ref"],
            "#/components/schemas/Friend"
        );
        assert_eq!(schema["required"], json!(["email"]));
    }

    #[test]
    fn string_literal_union_is_an_enum() {
        let registry = MetadataRegistry::new().freeze();
        let meta = Metadata::Union(tsnest_compiler::UnionMeta {
            variants: vec![
                Metadata::Literal {
                    value: LiteralValue::String("asc".to_string()),
                },
                Metadata::Literal {
                    value: LiteralValue::String("desc".to_string()),
                },
            ],
            nullable: false,
            discriminant: None,
        });
        let schema = schema_for(&meta, &registry);
        assert_eq!(schema["enum"], json!(["asc", "desc"]));
    }
}
