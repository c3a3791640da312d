//! Static controller analysis.
//!
//! Controllers are discovered by scanning top-level class declarations of
//! the included source files. Decorators are read syntactically and never
//! evaluated; anything non-literal disqualifies the route or controller
//! with a warning.

mod analyzer;
mod decorators;
mod model;
mod paths;

pub use analyzer::{analyze_program, AnalyzerOutput};
pub use decorators::{classify_param_decorator, verb_for_decorator};
pub use model::{
    route_map, Controller, HttpVerb, ParamCategory, ParamLocation, Route, RouteParameter,
};
pub use paths::compose_path;
