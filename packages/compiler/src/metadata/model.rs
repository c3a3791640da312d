use super::tags::Tags;
use serde::Serialize;
use ts::LiteralValue;

fn tags_empty(tags: &Tags) -> bool {
    tags.is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Primitive {
    String,
    Number,
    Boolean,
    Null,
    Undefined,
    BigInt,
    Any,
    Unknown,
    Never,
}

impl Primitive {
    /// The `expected` label used in validation errors and warnings.
    pub fn label(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::Null => "null",
            Primitive::Undefined => "undefined",
            Primitive::BigInt => "bigint",
            Primitive::Any => "any",
            Primitive::Unknown => "unknown",
            Primitive::Never => "never",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub name: String,
    pub meta: Metadata,
    pub optional: bool,
    pub readonly: bool,
    #[serde(skip_serializing_if = "tags_empty")]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectMeta {
    /// Declared name, present when the type was walked as a named
    /// declaration.
    pub name: Option<String>,
    pub properties: Vec<Property>,
    /// Opts the object's scalar fields into string coercion (query/path/
    /// header sources, or an explicit `Coerce` brand).
    pub coerce: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionMeta {
    pub variants: Vec<Metadata>,
    /// True when `null` was one of the variants.
    pub nullable: bool,
    /// Property shared by every object variant with pairwise-distinct
    /// literal values.
    pub discriminant: Option<String>,
}

impl UnionMeta {
    /// When every variant is a string literal, the union is enum-like.
    pub fn as_string_enum(&self) -> Option<Vec<&str>> {
        let mut out = Vec::with_capacity(self.variants.len());
        for v in &self.variants {
            match v {
                Metadata::Literal {
                    value: LiteralValue::String(s),
                } => out.push(s.as_str()),
                _ => return None,
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumMember {
    pub name: String,
    pub value: LiteralValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumMeta {
    pub name: Option<String>,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKey {
    String,
    Number,
}

/// Discriminated descriptor for one resolved type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Metadata {
    Primitive {
        primitive: Primitive,
        #[serde(skip_serializing_if = "tags_empty")]
        tags: Tags,
    },
    Literal {
        value: LiteralValue,
    },
    Object(ObjectMeta),
    Array {
        element: Box<Metadata>,
        #[serde(skip_serializing_if = "tags_empty")]
        tags: Tags,
    },
    Tuple {
        elements: Vec<Metadata>,
        rest: Option<Box<Metadata>>,
    },
    Union(UnionMeta),
    Intersection {
        members: Vec<Metadata>,
    },
    Reference {
        name: String,
    },
    Enum(EnumMeta),
    Record {
        key: RecordKey,
        value: Box<Metadata>,
    },
}

impl Metadata {
    pub fn primitive(primitive: Primitive) -> Self {
        Metadata::Primitive {
            primitive,
            tags: Tags::new(),
        }
    }

    pub fn any() -> Self {
        Self::primitive(Primitive::Any)
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Metadata::Reference { name: name.into() }
    }

    pub fn as_object(&self) -> Option<&ObjectMeta> {
        match self {
            Metadata::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_primitive(&self, p: Primitive) -> bool {
        matches!(self, Metadata::Primitive { primitive, .. } if *primitive == p)
    }

    /// The `expected` label for this metadata in validation errors.
    pub fn label(&self) -> String {
        match self {
            Metadata::Primitive { primitive, .. } => primitive.label().to_string(),
            Metadata::Literal { value } => match value {
                LiteralValue::String(s) => format!("\"{}\"", s),
                LiteralValue::Number(n) => n.to_string(),
                LiteralValue::Boolean(b) => b.to_string(),
            },
            Metadata::Object(o) => o.name.clone().unwrap_or_else(|| "object".to_string()),
            Metadata::Array { .. } => "array".to_string(),
            Metadata::Tuple { .. } => "tuple".to_string(),
            Metadata::Union(_) => "union".to_string(),
            Metadata::Intersection { .. } => "intersection".to_string(),
            Metadata::Reference { name } => name.clone(),
            Metadata::Enum(e) => e.name.clone().unwrap_or_else(|| "enum".to_string()),
            Metadata::Record { .. } => "record".to_string(),
        }
    }

    /// Collects every `Reference` name reachable from this metadata.
    pub fn references(&self, out: &mut Vec<String>) {
        match self {
            Metadata::Reference { name } => out.push(name.clone()),
            Metadata::Object(o) => {
                for p in &o.properties {
                    p.meta.references(out);
                }
            }
            Metadata::Array { element, .. } => element.references(out),
            Metadata::Tuple { elements, rest } => {
                for e in elements {
                    e.references(out);
                }
                if let Some(r) = rest {
                    r.references(out);
                }
            }
            Metadata::Union(u) => {
                for v in &u.variants {
                    v.references(out);
                }
            }
            Metadata::Intersection { members } => {
                for m in members {
                    m.references(out);
                }
            }
            Metadata::Record { value, .. } => value.references(out),
            _ => {}
        }
    }
}
