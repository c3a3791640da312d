use crate::node::JsDocTag;
use serde::Serialize;

/// Stable identity handle for a resolved type, as assigned by the host
/// compiler. Two handles compare equal exactly when the host considers the
/// types identical, which makes this the key for cycle-breaking interning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeFlags(pub u32);

impl TypeFlags {
    pub const NONE: Self = Self(0);
    pub const ANY: Self = Self(1);
    pub const UNKNOWN: Self = Self(2);
    pub const STRING: Self = Self(4);
    pub const NUMBER: Self = Self(8);
    pub const BOOLEAN: Self = Self(16);
    pub const ENUM: Self = Self(32);
    pub const BIGINT: Self = Self(64);
    pub const STRING_LITERAL: Self = Self(128);
    pub const NUMBER_LITERAL: Self = Self(256);
    pub const BOOLEAN_LITERAL: Self = Self(512);
    pub const VOID: Self = Self(16384);
    pub const UNDEFINED: Self = Self(32768);
    pub const NULL: Self = Self(65536);
    pub const NEVER: Self = Self(131072);
    pub const OBJECT: Self = Self(524288);
    pub const UNION: Self = Self(1048576);
    pub const INTERSECTION: Self = Self(2097152);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn intersects(&self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }
}

/// A literal type's value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

/// One property of an object type, in declaration order, together with the
/// JSDoc tags found on its declaration.
#[derive(Debug, Clone)]
pub struct PropertySite {
    pub name: String,
    pub ty: TypeRef,
    pub optional: bool,
    pub readonly: bool,
    pub js_doc: Vec<JsDocTag>,
}

/// Alias information for a type that was written through a named generic
/// alias, e.g. `Minimum<0>` or `Promise<UserResponse>`.
#[derive(Debug, Clone)]
pub struct AliasInfo {
    pub name: String,
    pub type_args: Vec<TypeRef>,
}

#[derive(Debug, Clone)]
pub struct EnumMemberInfo {
    pub name: String,
    pub value: LiteralValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKeyKind {
    String,
    Number,
}

/// An index signature, i.e. a record/map shape.
#[derive(Debug, Clone)]
pub struct IndexSignature {
    pub key: IndexKeyKind,
    pub value: TypeRef,
}

#[derive(Debug, Clone)]
pub struct TupleInfo {
    pub elements: Vec<TypeRef>,
    pub rest: Option<TypeRef>,
}

/// Handle-based interrogation of resolved types.
///
/// All methods take a [`TypeRef`] previously obtained from the host; the
/// driver holds no type structure of its own beyond these queries.
pub trait TypeChecker {
    fn type_flags(&self, ty: TypeRef) -> TypeFlags;

    /// Declared name of the type's symbol, when the type is nameable
    /// (interface, class, enum, named alias instantiation).
    fn type_name(&self, ty: TypeRef) -> Option<String>;

    /// File containing the type's declaration, when known.
    fn declaring_file(&self, ty: TypeRef) -> Option<String>;

    /// Alias through which the type was referenced, with its type arguments.
    fn alias_info(&self, ty: TypeRef) -> Option<AliasInfo>;

    /// Type arguments of a generic instantiation (`Promise<T>` → `[T]`).
    fn type_arguments(&self, ty: TypeRef) -> Vec<TypeRef>;

    fn literal_value(&self, ty: TypeRef) -> Option<LiteralValue>;

    fn union_members(&self, ty: TypeRef) -> Vec<TypeRef>;

    fn intersection_members(&self, ty: TypeRef) -> Vec<TypeRef>;

    /// Properties in declaration order. Empty for non-object types.
    fn properties(&self, ty: TypeRef) -> Vec<PropertySite>;

    /// Element type when the type is an array.
    fn element_type(&self, ty: TypeRef) -> Option<TypeRef>;

    fn tuple_info(&self, ty: TypeRef) -> Option<TupleInfo>;

    fn enum_members(&self, ty: TypeRef) -> Vec<EnumMemberInfo>;

    fn index_signature(&self, ty: TypeRef) -> Option<IndexSignature>;

    /// Human-readable rendering, for diagnostics only.
    fn string_repr(&self, ty: TypeRef) -> String;
}
