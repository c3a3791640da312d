// Decorator vocabulary
//
// The closed set of decorator names the analyzer recognizes, keyed by
// identifier. Anything else on a parameter is treated as a custom
// decorator.

use super::model::{HttpVerb, ParamCategory};

pub const CONTROLLER: &str = "Controller";
pub const HTTP_CODE: &str = "HttpCode";
pub const VERSION: &str = "Version";
pub const RETURNS: &str = "Returns";
pub const SSE: &str = "Sse";
pub const TAGS: &str = "Tags";
pub const PUBLIC: &str = "Public";
pub const SECURITY: &str = "Security";

/// JSDoc tag suppressing the raw-response warning on a method.
pub const IGNORE_DIRECTIVE: &str = "ignore";

pub fn verb_for_decorator(name: &str) -> Option<HttpVerb> {
    Some(match name {
        "Get" => HttpVerb::Get,
        "Post" => HttpVerb::Post,
        "Put" => HttpVerb::Put,
        "Delete" => HttpVerb::Delete,
        "Patch" => HttpVerb::Patch,
        "Options" => HttpVerb::Options,
        "Head" => HttpVerb::Head,
        "All" => HttpVerb::All,
        _ => return None,
    })
}

/// Category of a recognized parameter decorator; `None` for unknown names
/// (which become custom parameters).
pub fn classify_param_decorator(name: &str) -> Option<ParamCategory> {
    Some(match name {
        "Body" => ParamCategory::Body,
        "Query" => ParamCategory::Query,
        "Param" => ParamCategory::Param,
        "Headers" => ParamCategory::Headers,
        "Res" | "Response" => ParamCategory::RawResponse,
        _ => return None,
    })
}
