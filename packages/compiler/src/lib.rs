//! Build-time core of the tsnest driver.
//!
//! Everything that is independent of build orchestration lives here: the
//! language-neutral type metadata model and registry, the walker that
//! translates host-compiler types into that model, the constraint-tag
//! vocabulary, and the companion code generator.

pub mod codegen;
pub mod metadata;
pub mod walker;

pub use metadata::{
    ConstraintTag, FrozenRegistry, Metadata, MetadataRegistry, ObjectMeta, Primitive, Property,
    StringFormat, Tags, TransformKind, UnionMeta,
};
pub use walker::TypeWalker;
