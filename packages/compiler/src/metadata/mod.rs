//! Language-neutral type metadata.
//!
//! The walker translates host-compiler types into this model; the code
//! generator and the OpenAPI synthesizer consume it. Records are immutable
//! once produced, except for the coercion marking applied between analysis
//! and freezing.

mod model;
mod registry;
mod tags;

pub use model::{
    EnumMember, EnumMeta, Metadata, ObjectMeta, Primitive, Property, RecordKey, UnionMeta,
};
pub use registry::{FrozenRegistry, MetadataRegistry};
pub use tags::{
    brand_outcome, tags_from_js_doc, BrandOutcome, ConstraintTag, StringFormat, Tags,
    TransformKind,
};
