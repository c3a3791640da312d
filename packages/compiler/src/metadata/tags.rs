//! The closed constraint-tag vocabulary.
//!
//! Tags come from two sources with identical semantics: JSDoc annotations on
//! a declaration, and branded intersection operands recognized by name.
//! Either way they end up as both a generated runtime check and an OpenAPI
//! keyword.

use serde::Serialize;
use smallvec::SmallVec;
use ts::{AliasInfo, JsDocTag, LiteralValue, TypeChecker};

pub type Tags = SmallVec<[ConstraintTag; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StringFormat {
    Email,
    Uuid,
    Url,
    DateTime,
    Date,
    Time,
    Ipv4,
    Ipv6,
    Jwt,
    Ulid,
    Cuid,
    Nanoid,
    HexColor,
    Base64,
    Semver,
    Phone,
    Lowercase,
    Uppercase,
}

impl StringFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "email" => Self::Email,
            "uuid" => Self::Uuid,
            "url" | "uri" => Self::Url,
            "date-time" | "datetime" => Self::DateTime,
            "date" => Self::Date,
            "time" => Self::Time,
            "ipv4" => Self::Ipv4,
            "ipv6" => Self::Ipv6,
            "jwt" => Self::Jwt,
            "ulid" => Self::Ulid,
            "cuid" => Self::Cuid,
            "nanoid" => Self::Nanoid,
            "hex-color" | "color" => Self::HexColor,
            "base64" => Self::Base64,
            "semver" => Self::Semver,
            "phone" => Self::Phone,
            "lowercase" => Self::Lowercase,
            "uppercase" => Self::Uppercase,
            _ => return None,
        })
    }

    /// The OpenAPI / JSON-Schema `format` keyword value.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Uuid => "uuid",
            Self::Url => "url",
            Self::DateTime => "date-time",
            Self::Date => "date",
            Self::Time => "time",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Jwt => "jwt",
            Self::Ulid => "ulid",
            Self::Cuid => "cuid",
            Self::Nanoid => "nanoid",
            Self::HexColor => "hex-color",
            Self::Base64 => "base64",
            Self::Semver => "semver",
            Self::Phone => "phone",
            Self::Lowercase => "lowercase",
            Self::Uppercase => "uppercase",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformKind {
    Trim,
    Lowercase,
    Uppercase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintTag {
    Minimum(f64),
    Maximum(f64),
    ExclusiveMinimum(f64),
    ExclusiveMaximum(f64),
    MultipleOf(f64),
    Integer,
    MinLength(u64),
    MaxLength(u64),
    Pattern(String),
    StartsWith(String),
    EndsWith(String),
    Includes(String),
    Format(StringFormat),
    MinItems(u64),
    MaxItems(u64),
    UniqueItems,
    Transform(TransformKind),
    Default(String),
}

/// JSDoc tags that are part of ordinary documentation and never warned
/// about.
const NEUTRAL_TAGS: &[&str] = &[
    "param",
    "returns",
    "return",
    "description",
    "summary",
    "remarks",
    "example",
    "deprecated",
    "see",
    "internal",
    "ignore",
    "in",
    "author",
    "since",
    "throws",
    "todo",
];

fn parse_num(tag: &JsDocTag, warnings: &mut Vec<String>, context: &str) -> Option<f64> {
    match tag.text.trim().parse::<f64>() {
        Ok(n) => Some(n),
        Err(_) => {
            warnings.push(format!(
                "invalid numeric value `{}` for @{} on {}",
                tag.text.trim(),
                tag.name,
                context
            ));
            None
        }
    }
}

fn parse_len(tag: &JsDocTag, warnings: &mut Vec<String>, context: &str) -> Option<u64> {
    parse_num(tag, warnings, context).map(|n| n.max(0.0) as u64)
}

/// Translates the JSDoc tags of a declaration into constraint tags,
/// preserving tag order. Unrecognized constraint-looking tags produce a
/// warning; neutral documentation tags are skipped silently.
pub fn tags_from_js_doc(doc: &[JsDocTag], warnings: &mut Vec<String>, context: &str) -> Tags {
    let mut tags = Tags::new();
    for tag in doc {
        match tag.name.as_str() {
            "minimum" => {
                if let Some(n) = parse_num(tag, warnings, context) {
                    tags.push(ConstraintTag::Minimum(n));
                }
            }
            "maximum" => {
                if let Some(n) = parse_num(tag, warnings, context) {
                    tags.push(ConstraintTag::Maximum(n));
                }
            }
            "exclusiveMinimum" => {
                if let Some(n) = parse_num(tag, warnings, context) {
                    tags.push(ConstraintTag::ExclusiveMinimum(n));
                }
            }
            "exclusiveMaximum" => {
                if let Some(n) = parse_num(tag, warnings, context) {
                    tags.push(ConstraintTag::ExclusiveMaximum(n));
                }
            }
            "multipleOf" => {
                if let Some(n) = parse_num(tag, warnings, context) {
                    tags.push(ConstraintTag::MultipleOf(n));
                }
            }
            "type" => {
                let t = tag.text.trim().trim_matches('"');
                if t == "int" || t == "integer" {
                    tags.push(ConstraintTag::Integer);
                }
            }
            "minLength" => {
                if let Some(n) = parse_len(tag, warnings, context) {
                    tags.push(ConstraintTag::MinLength(n));
                }
            }
            "maxLength" => {
                if let Some(n) = parse_len(tag, warnings, context) {
                    tags.push(ConstraintTag::MaxLength(n));
                }
            }
            "pattern" => tags.push(ConstraintTag::Pattern(tag.text.trim().to_string())),
            "format" => match StringFormat::from_name(tag.text.trim()) {
                Some(f) => tags.push(ConstraintTag::Format(f)),
                None => warnings.push(format!(
                    "unknown format `{}` for @format on {}",
                    tag.text.trim(),
                    context
                )),
            },
            "minItems" => {
                if let Some(n) = parse_len(tag, warnings, context) {
                    tags.push(ConstraintTag::MinItems(n));
                }
            }
            "maxItems" => {
                if let Some(n) = parse_len(tag, warnings, context) {
                    tags.push(ConstraintTag::MaxItems(n));
                }
            }
            "uniqueItems" => tags.push(ConstraintTag::UniqueItems),
            "transform" => match tag.text.trim() {
                "trim" => tags.push(ConstraintTag::Transform(TransformKind::Trim)),
                "lowercase" => tags.push(ConstraintTag::Transform(TransformKind::Lowercase)),
                "uppercase" => tags.push(ConstraintTag::Transform(TransformKind::Uppercase)),
                other => warnings.push(format!(
                    "unknown transform `{}` for @transform on {}",
                    other, context
                )),
            },
            "default" => tags.push(ConstraintTag::Default(tag.text.trim().to_string())),
            name if NEUTRAL_TAGS.contains(&name) => {}
            name => warnings.push(format!("unknown JSDoc tag @{} on {}", name, context)),
        }
    }
    tags
}

/// What a branded intersection operand turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum BrandOutcome {
    Tag(ConstraintTag),
    /// The `Coerce` brand: flips the coercion flag on the base object.
    Coerce,
    /// Not part of the brand vocabulary; the operand is a base type.
    NotABrand,
}

fn num_arg(alias: &AliasInfo, checker: &dyn TypeChecker) -> Option<f64> {
    match alias
        .type_args
        .first()
        .and_then(|t| checker.literal_value(*t))
    {
        Some(LiteralValue::Number(n)) => Some(n),
        _ => None,
    }
}

fn str_arg(alias: &AliasInfo, checker: &dyn TypeChecker) -> Option<String> {
    match alias
        .type_args
        .first()
        .and_then(|t| checker.literal_value(*t))
    {
        Some(LiteralValue::String(s)) => Some(s),
        _ => None,
    }
}

/// Recognizes a branded intersection operand by its alias name. The fixed
/// vocabulary mirrors the runtime types package companions interoperate
/// with.
pub fn brand_outcome(alias: &AliasInfo, checker: &dyn TypeChecker) -> BrandOutcome {
    use BrandOutcome::{Coerce, NotABrand, Tag};
    match alias.name.as_str() {
        "Minimum" => num_arg(alias, checker).map_or(NotABrand, |n| Tag(ConstraintTag::Minimum(n))),
        "Maximum" => num_arg(alias, checker).map_or(NotABrand, |n| Tag(ConstraintTag::Maximum(n))),
        "ExclusiveMinimum" => {
            num_arg(alias, checker).map_or(NotABrand, |n| Tag(ConstraintTag::ExclusiveMinimum(n)))
        }
        "ExclusiveMaximum" => {
            num_arg(alias, checker).map_or(NotABrand, |n| Tag(ConstraintTag::ExclusiveMaximum(n)))
        }
        "MultipleOf" => {
            num_arg(alias, checker).map_or(NotABrand, |n| Tag(ConstraintTag::MultipleOf(n)))
        }
        "Int" | "Integer" => Tag(ConstraintTag::Integer),
        "MinLength" => {
            num_arg(alias, checker).map_or(NotABrand, |n| Tag(ConstraintTag::MinLength(n as u64)))
        }
        "MaxLength" => {
            num_arg(alias, checker).map_or(NotABrand, |n| Tag(ConstraintTag::MaxLength(n as u64)))
        }
        "Pattern" => str_arg(alias, checker).map_or(NotABrand, |s| Tag(ConstraintTag::Pattern(s))),
        "StartsWith" => {
            str_arg(alias, checker).map_or(NotABrand, |s| Tag(ConstraintTag::StartsWith(s)))
        }
        "EndsWith" => {
            str_arg(alias, checker).map_or(NotABrand, |s| Tag(ConstraintTag::EndsWith(s)))
        }
        "Includes" => {
            str_arg(alias, checker).map_or(NotABrand, |s| Tag(ConstraintTag::Includes(s)))
        }
        "Format" => str_arg(alias, checker)
            .and_then(|s| StringFormat::from_name(&s))
            .map_or(NotABrand, |f| Tag(ConstraintTag::Format(f))),
        "Email" => Tag(ConstraintTag::Format(StringFormat::Email)),
        "Uuid" => Tag(ConstraintTag::Format(StringFormat::Uuid)),
        "Url" => Tag(ConstraintTag::Format(StringFormat::Url)),
        "DateTime" => Tag(ConstraintTag::Format(StringFormat::DateTime)),
        "Ipv4" => Tag(ConstraintTag::Format(StringFormat::Ipv4)),
        "Ipv6" => Tag(ConstraintTag::Format(StringFormat::Ipv6)),
        "Jwt" => Tag(ConstraintTag::Format(StringFormat::Jwt)),
        "Ulid" => Tag(ConstraintTag::Format(StringFormat::Ulid)),
        "Cuid" => Tag(ConstraintTag::Format(StringFormat::Cuid)),
        "Nanoid" => Tag(ConstraintTag::Format(StringFormat::Nanoid)),
        "HexColor" => Tag(ConstraintTag::Format(StringFormat::HexColor)),
        "Base64" => Tag(ConstraintTag::Format(StringFormat::Base64)),
        "Semver" => Tag(ConstraintTag::Format(StringFormat::Semver)),
        "Phone" => Tag(ConstraintTag::Format(StringFormat::Phone)),
        "Lowercase" => Tag(ConstraintTag::Format(StringFormat::Lowercase)),
        "Uppercase" => Tag(ConstraintTag::Format(StringFormat::Uppercase)),
        "MinItems" => {
            num_arg(alias, checker).map_or(NotABrand, |n| Tag(ConstraintTag::MinItems(n as u64)))
        }
        "MaxItems" => {
            num_arg(alias, checker).map_or(NotABrand, |n| Tag(ConstraintTag::MaxItems(n as u64)))
        }
        "UniqueItems" => Tag(ConstraintTag::UniqueItems),
        "Trim" => Tag(ConstraintTag::Transform(TransformKind::Trim)),
        "ToLowerCase" => Tag(ConstraintTag::Transform(TransformKind::Lowercase)),
        "ToUpperCase" => Tag(ConstraintTag::Transform(TransformKind::Uppercase)),
        "Default" => str_arg(alias, checker)
            .map(|s| Tag(ConstraintTag::Default(s)))
            .or_else(|| num_arg(alias, checker).map(|n| Tag(ConstraintTag::Default(n.to_string()))))
            .unwrap_or(NotABrand),
        "Coerce" => Coerce,
        _ => NotABrand,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_numeric_bounds() {
        let doc = vec![
            JsDocTag::new("minimum", "0"),
            JsDocTag::new("maximum", "150"),
        ];
        let mut warnings = Vec::new();
        let tags = tags_from_js_doc(&doc, &mut warnings, "age");
        assert_eq!(
            tags.as_slice(),
            &[ConstraintTag::Minimum(0.0), ConstraintTag::Maximum(150.0)]
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn warns_on_unknown_tag_but_not_on_documentation() {
        let doc = vec![
            JsDocTag::new("description", "a user"),
            JsDocTag::new("minLenght", "3"),
        ];
        let mut warnings = Vec::new();
        let tags = tags_from_js_doc(&doc, &mut warnings, "name");
        assert!(tags.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("@minLenght"));
    }

    #[test]
    fn bad_numeric_value_warns_and_is_dropped() {
        let doc = vec![JsDocTag::new("minimum", "zero")];
        let mut warnings = Vec::new();
        let tags = tags_from_js_doc(&doc, &mut warnings, "age");
        assert!(tags.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn integer_via_type_tag() {
        let doc = vec![JsDocTag::new("type", "int")];
        let mut warnings = Vec::new();
        let tags = tags_from_js_doc(&doc, &mut warnings, "count");
        assert_eq!(tags.as_slice(), &[ConstraintTag::Integer]);
    }
}
