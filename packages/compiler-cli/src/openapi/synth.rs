use super::document::{
    Components, Info, MediaType, OpenApiDocument, Operation, ParameterObject, RequestBody,
    ResponseObject,
};
use super::schema::{reference, schema_for, schema_with_tags};
use crate::config::OpenApiConfig;
use crate::controllers::{Controller, ParamCategory, ParamLocation, Route};
use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Value};
use tsnest_compiler::{FrozenRegistry, Metadata};

/// Express-style `:id` segments become OpenAPI `{id}` templates.
fn openapi_path(path: &str) -> String {
    path.split('/')
        .map(|seg| match seg.strip_prefix(':') {
            Some(name) => format!("{{{}}}", name),
            None => seg.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Controller tag: the class name with a trailing "Controller" stripped.
fn controller_tag(name: &str) -> String {
    name.strip_suffix("Controller")
        .filter(|s| !s.is_empty())
        .unwrap_or(name)
        .to_string()
}

/// Named types reachable from any route, in registry (walk) order.
fn reachable_schemas(
    controllers: &[Controller],
    registry: &FrozenRegistry,
) -> IndexMap<String, Value> {
    let mut seeds: IndexSet<String> = IndexSet::new();
    for c in controllers {
        for r in &c.routes {
            if let Some(n) = &r.return_type_name {
                seeds.insert(n.clone());
            }
            for p in &r.params {
                if let Some(n) = &p.type_name {
                    if p.is_whole_object() {
                        seeds.insert(n.clone());
                    }
                }
            }
            for (_, data_ty) in &r.sse_events {
                seeds.insert(data_ty.clone());
            }
        }
    }
    // Close over references.
    let mut queue: Vec<String> = seeds.iter().cloned().collect();
    while let Some(name) = queue.pop() {
        if let Some(meta) = registry.get(&name) {
            let mut refs = Vec::new();
            meta.references(&mut refs);
            for r in refs {
                if seeds.insert(r.clone()) {
                    queue.push(r);
                }
            }
        }
    }
    registry
        .iter()
        .filter(|(name, _)| seeds.contains(*name))
        .map(|(name, meta)| (name.to_string(), schema_for(meta, registry)))
        .collect()
}

fn location_for(category: ParamCategory) -> Option<&'static str> {
    match category {
        ParamCategory::Query => Some("query"),
        ParamCategory::Param => Some("path"),
        ParamCategory::Headers => Some("header"),
        _ => None,
    }
}

fn operation_parameters(route: &Route, registry: &FrozenRegistry) -> Vec<ParameterObject> {
    let mut out = Vec::new();
    for p in &route.params {
        match p.category {
            ParamCategory::Body | ParamCategory::RawResponse => continue,
            ParamCategory::Custom => {
                let Some(location) = p.location else { continue };
                let name = if p.key.is_empty() {
                    p.var_name.clone()
                } else {
                    p.key.clone()
                };
                let schema = p
                    .meta
                    .as_ref()
                    .map(|m| schema_for(m, registry))
                    .unwrap_or_else(|| json!({}));
                out.push(ParameterObject {
                    name,
                    location: location.keyword().to_string(),
                    required: p.required && location != ParamLocation::Query,
                    schema,
                });
            }
            category => {
                let Some(location) = location_for(category) else {
                    continue;
                };
                if p.key.is_empty() {
                    // Whole-object parameters expand into one parameter per
                    // property.
                    let resolved = p
                        .type_name
                        .as_deref()
                        .and_then(|n| registry.get(n))
                        .or(p.meta.as_ref());
                    let Some(Metadata::Object(obj)) = resolved else {
                        continue;
                    };
                    for prop in &obj.properties {
                        out.push(ParameterObject {
                            name: prop.name.clone(),
                            location: location.to_string(),
                            required: category == ParamCategory::Param || !prop.optional,
                            schema: schema_with_tags(&prop.meta, &prop.tags, registry),
                        });
                    }
                } else {
                    let schema = p
                        .meta
                        .as_ref()
                        .map(|m| schema_for(m, registry))
                        .unwrap_or_else(|| json!({}));
                    out.push(ParameterObject {
                        name: p.key.clone(),
                        location: location.to_string(),
                        required: category == ParamCategory::Param || p.required,
                        schema,
                    });
                }
            }
        }
    }
    out
}

fn request_body(route: &Route, registry: &FrozenRegistry) -> Option<RequestBody> {
    let body = route
        .params
        .iter()
        .find(|p| p.category == ParamCategory::Body)?;
    let schema = match (&body.type_name, &body.meta) {
        (Some(name), _) => reference(name),
        (None, Some(meta)) => schema_for(meta, registry),
        (None, None) => json!({}),
    };
    let mut content = IndexMap::new();
    content.insert("application/json".to_string(), MediaType { schema });
    Some(RequestBody {
        required: body.required,
        content,
    })
}

fn responses(route: &Route, registry: &FrozenRegistry) -> IndexMap<String, ResponseObject> {
    let mut content = IndexMap::new();
    if route.sse {
        content.insert(
            route.content_type.clone(),
            MediaType {
                schema: json!({ "type": "string" }),
            },
        );
    } else if let Some(name) = &route.return_type_name {
        let schema = if route.returns_array {
            json!({ "type": "array", "items": reference(name) })
        } else {
            reference(name)
        };
        content.insert(route.content_type.clone(), MediaType { schema });
    } else if let Some(meta) = &route.return_meta {
        content.insert(
            route.content_type.clone(),
            MediaType {
                schema: schema_for(meta, registry),
            },
        );
    }
    let mut map = IndexMap::new();
    map.insert(
        route.status.to_string(),
        ResponseObject {
            description: route.response_description.clone().unwrap_or_default(),
            content,
        },
    );
    map
}

pub fn synthesize(
    controllers: &[Controller],
    registry: &FrozenRegistry,
    config: &OpenApiConfig,
) -> OpenApiDocument {
    let mut paths: IndexMap<String, IndexMap<String, Operation>> = IndexMap::new();
    let mut used_operation_ids: IndexSet<String> = IndexSet::new();
    let mut tag_names: IndexSet<String> = IndexSet::new();

    for c in controllers {
        let default_tag = controller_tag(&c.name);
        for route in &c.routes {
            let mut operation_id = route.operation_id.clone();
            let mut n = 2;
            while !used_operation_ids.insert(operation_id.clone()) {
                operation_id = format!("{}_{}", route.operation_id, n);
                n += 1;
            }
            let tags = if route.tags.is_empty() {
                vec![default_tag.clone()]
            } else {
                route.tags.clone()
            };
            for t in &tags {
                tag_names.insert(t.clone());
            }
            let security = if route.public {
                Some(Vec::new())
            } else {
                route.security.as_ref().map(|schemes| {
                    schemes
                        .iter()
                        .map(|s| {
                            let mut requirement = serde_json::Map::new();
                            requirement.insert(s.clone(), json!([]));
                            Value::Object(requirement)
                        })
                        .collect::<Vec<Value>>()
                })
            };
            let operation = Operation {
                operation_id,
                tags,
                deprecated: route.deprecated,
                parameters: operation_parameters(route, registry),
                request_body: request_body(route, registry),
                responses: responses(route, registry),
                security,
            };
            paths
                .entry(openapi_path(&route.full_path))
                .or_default()
                .insert(route.verb.lowercase().to_string(), operation);
        }
    }

    // Tags: controller-derived names first, then configured overrides merged
    // by name.
    let mut tags: IndexMap<String, Value> = tag_names
        .iter()
        .map(|name| (name.clone(), json!({ "name": name })))
        .collect();
    for entry in &config.tags {
        if let Some(name) = entry.get("name").and_then(|v| v.as_str()) {
            tags.insert(name.to_string(), entry.clone());
        }
    }

    let schemas = reachable_schemas(controllers, registry);
    let components = if schemas.is_empty() && config.security_schemes.is_empty() {
        None
    } else {
        Some(Components {
            schemas,
            security_schemes: config.security_schemes.clone(),
        })
    };

    OpenApiDocument {
        openapi: "3.1.0".to_string(),
        info: Info {
            title: config.title.clone().unwrap_or_else(|| "API".to_string()),
            version: config.version.clone().unwrap_or_else(|| "1.0.0".to_string()),
            description: config.description.clone(),
            contact: config.contact.clone(),
            license: config.license.clone(),
        },
        servers: config.servers.clone(),
        tags: tags.into_values().collect(),
        paths,
        components,
        security: config.security.clone(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::controllers::HttpVerb;
    use crate::controllers::RouteParameter;
    use tsnest_compiler::{MetadataRegistry, ObjectMeta, Primitive, Property, Tags};

    fn prop(name: &str, meta: Metadata, optional: bool) -> Property {
        Property {
            name: name.to_string(),
            meta,
            optional,
            readonly: false,
            tags: Tags::new(),
        }
    }

    fn registry() -> FrozenRegistry {
        let mut reg = MetadataRegistry::new();
        reg.insert(
            "CreateUserDto",
            Metadata::Object(ObjectMeta {
                name: Some("CreateUserDto".to_string()),
                properties: vec![prop("name", Metadata::primitive(Primitive::String), false)],
                coerce: false,
            }),
        );
        reg.insert(
            "UserResponse",
            Metadata::Object(ObjectMeta {
                name: Some("UserResponse".to_string()),
                properties: vec![prop("id", Metadata::primitive(Primitive::Number), false)],
                coerce: false,
            }),
        );
        reg.freeze()
    }

    fn base_route(verb: HttpVerb, path: &str, method: &str) -> Route {
        Route {
            verb,
            suffix: String::new(),
            full_path: path.to_string(),
            method_name: method.to_string(),
            is_async: true,
            operation_id: format!("UserController.{}", method),
            params: vec![],
            return_meta: None,
            return_type_name: None,
            return_ty: None,
            returns_array: false,
            status: verb.default_status(),
            content_type: "application/json".to_string(),
            response_description: None,
            tags: vec![],
            security: None,
            public: false,
            deprecated: false,
            uses_raw_response: false,
            sse: false,
            sse_events: vec![],
            version: None,
        }
    }

    fn user_controller() -> Controller {
        let mut find_all = base_route(HttpVerb::Get, "/users", "findAll");
        find_all.return_type_name = Some("UserResponse".to_string());
        find_all.returns_array = true;
        let mut create = base_route(HttpVerb::Post, "/users", "create");
        create.return_type_name = Some("UserResponse".to_string());
        create.params.push(RouteParameter {
            category: ParamCategory::Body,
            key: String::new(),
            var_name: "body".to_string(),
            ty: None,
            type_name: Some("CreateUserDto".to_string()),
            meta: Some(Metadata::reference("CreateUserDto")),
            required: true,
            location: None,
        });
        Controller {
            name: "UserController".to_string(),
            file: "/src/user.controller.ts".to_string(),
            base_path: "users".to_string(),
            versions: vec![],
            routes: vec![find_all, create],
        }
    }

    #[test]
    fn paths_schemas_and_refs_line_up() {
        let doc = synthesize(&[user_controller()], &registry(), &Default::default());
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["openapi"], "3.1.0");
        assert!(json["paths"]["/users"]["get"].is_object());
        assert_eq!(
            json["paths"]["/users"]["post"]["requestBody"]["content"]["application/json"]
                ["schema"]["$ref"],
            "#/components/schemas/CreateUserDto"
        );
        assert_eq!(
            json["paths"]["/users"]["get"]["responses"]["200"]["content"]["application/json"]
                ["schema"]["items"]["$ref"],
            "#/components/schemas/UserResponse"
        );
        assert_eq!(
            json["paths"]["/users"]["post"]["responses"]["201"]["content"]["application/json"]
                ["schema"]["$ref"],
            "#/components/schemas/UserResponse"
        );
        assert!(json["components"]["schemas"]["CreateUserDto"].is_object());
        assert_eq!(json["tags"][0]["name"], "User");
    }

    #[test]
    fn operation_ids_stay_unique() {
        let mut c = user_controller();
        c.routes[1].operation_id = c.routes[0].operation_id.clone();
        let doc = synthesize(&[c], &registry(), &Default::default());
        let mut ids: Vec<String> = Vec::new();
        for ops in doc.paths.values() {
            for op in ops.values() {
                ids.push(op.operation_id.clone());
            }
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn raw_response_route_has_empty_content() {
        let mut route = base_route(HttpVerb::Get, "/files/:id", "getFile");
        route.uses_raw_response = true;
        let c = Controller {
            name: "FileController".to_string(),
            file: "/src/file.controller.ts".to_string(),
            base_path: "files".to_string(),
            versions: vec![],
            routes: vec![route],
        };
        let doc = synthesize(&[c], &registry(), &Default::default());
        let json = serde_json::to_value(&doc).unwrap();
        let response = &json["paths"]["/files/{id}"]["get"]["responses"]["200"];
        assert!(response.get("content").is_none());
    }

    #[test]
    fn public_route_serializes_empty_security() {
        let mut route = base_route(HttpVerb::Get, "/health", "health");
        route.public = true;
        let c = Controller {
            name: "HealthController".to_string(),
            file: "/src/health.controller.ts".to_string(),
            base_path: "health".to_string(),
            versions: vec![],
            routes: vec![route],
        };
        let doc = synthesize(&[c], &registry(), &Default::default());
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["paths"]["/health"]["get"]["security"], json!([]));
    }

    #[test]
    fn whole_object_query_expands_into_parameters() {
        let mut reg = MetadataRegistry::new();
        reg.insert(
            "ListQuery",
            Metadata::Object(ObjectMeta {
                name: Some("ListQuery".to_string()),
                properties: vec![
                    prop("page", Metadata::primitive(Primitive::Number), true),
                    prop("limit", Metadata::primitive(Primitive::Number), true),
                ],
                coerce: true,
            }),
        );
        let registry = reg.freeze();
        let mut route = base_route(HttpVerb::Get, "/items", "list");
        route.params.push(RouteParameter {
            category: ParamCategory::Query,
            key: String::new(),
            var_name: "q".to_string(),
            ty: None,
            type_name: Some("ListQuery".to_string()),
            meta: Some(Metadata::reference("ListQuery")),
            required: true,
            location: None,
        });
        let c = Controller {
            name: "ItemController".to_string(),
            file: "/src/item.controller.ts".to_string(),
            base_path: "items".to_string(),
            versions: vec![],
            routes: vec![route],
        };
        let doc = synthesize(&[c], &registry, &Default::default());
        let json = serde_json::to_value(&doc).unwrap();
        let params = json["paths"]["/items"]["get"]["parameters"].as_array().unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0]["name"], "page");
        assert_eq!(params[0]["in"], "query");
    }
}
