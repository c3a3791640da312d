use indexmap::IndexMap;
use ts::TypeRef;
use tsnest_compiler::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    All,
}

impl HttpVerb {
    pub fn lowercase(&self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Post => "post",
            HttpVerb::Put => "put",
            HttpVerb::Delete => "delete",
            HttpVerb::Patch => "patch",
            HttpVerb::Options => "options",
            HttpVerb::Head => "head",
            HttpVerb::All => "all",
        }
    }

    /// Default success status when no override is present.
    pub fn default_status(&self) -> u16 {
        match self {
            HttpVerb::Post => 201,
            _ => 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamCategory {
    Body,
    Query,
    Param,
    Headers,
    RawResponse,
    Custom,
}

/// OpenAPI parameter location for custom decorators, read from an `@in`
/// JSDoc tag on the decorator declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParamLocation {
    pub fn keyword(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        Some(match s {
            "path" => Self::Path,
            "query" => Self::Query,
            "header" => Self::Header,
            "cookie" => Self::Cookie,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RouteParameter {
    pub category: ParamCategory,
    /// Key named by the decorator argument; empty means the whole object.
    pub key: String,
    /// Identifier of the parameter in the method signature.
    pub var_name: String,
    pub ty: Option<TypeRef>,
    /// Name of the parameter's type when nameable.
    pub type_name: Option<String>,
    pub meta: Option<Metadata>,
    pub required: bool,
    pub location: Option<ParamLocation>,
}

impl RouteParameter {
    pub fn is_whole_object(&self) -> bool {
        self.key.is_empty()
            && matches!(
                self.category,
                ParamCategory::Body
                    | ParamCategory::Query
                    | ParamCategory::Param
                    | ParamCategory::Headers
            )
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub verb: HttpVerb,
    /// Path suffix from the verb decorator.
    pub suffix: String,
    /// Effective path after prefix/version/base composition.
    pub full_path: String,
    pub method_name: String,
    pub is_async: bool,
    /// `Controller.method`, unique within a document.
    pub operation_id: String,
    pub params: Vec<RouteParameter>,
    pub return_meta: Option<Metadata>,
    pub return_type_name: Option<String>,
    /// Host handle of the (unwrapped) return type, when one was declared.
    pub return_ty: Option<TypeRef>,
    pub returns_array: bool,
    pub status: u16,
    pub content_type: String,
    pub response_description: Option<String>,
    pub tags: Vec<String>,
    /// Security scheme names required by the route; `None` inherits the
    /// document default.
    pub security: Option<Vec<String>>,
    pub public: bool,
    pub deprecated: bool,
    pub uses_raw_response: bool,
    pub sse: bool,
    /// `(event name, data type name)` pairs for SSE streams.
    pub sse_events: Vec<(String, String)>,
    pub version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Controller {
    pub name: String,
    pub file: String,
    pub base_path: String,
    pub versions: Vec<String>,
    pub routes: Vec<Route>,
}

/// `Controller.method` → `(return type name, is array)` for routes with a
/// nameable response type. Consumed by the rewriter and OpenAPI synthesis.
pub fn route_map(controllers: &[Controller]) -> IndexMap<String, (String, bool)> {
    let mut map = IndexMap::new();
    for c in controllers {
        for r in &c.routes {
            if let Some(name) = &r.return_type_name {
                map.insert(r.operation_id.clone(), (name.clone(), r.returns_array));
            }
        }
    }
    map
}
