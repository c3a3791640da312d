//! OpenAPI 3.1 synthesis from the controller model and the metadata
//! registry.

mod document;
mod schema;
mod synth;

pub use document::{
    Components, Info, MediaType, OpenApiDocument, Operation, ParameterObject, RequestBody,
    ResponseObject,
};
pub use schema::schema_for;
pub use synth::synthesize;
