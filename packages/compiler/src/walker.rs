//! Translation of resolved host-compiler types into metadata.
//!
//! Depth-first, keyed by the host's stable type identity. The walker never
//! fails: unknown constructs degrade to `any` with a recorded warning.

use crate::metadata::{
    brand_outcome, tags_from_js_doc, BrandOutcome, EnumMember, EnumMeta, Metadata,
    MetadataRegistry, ObjectMeta, Primitive, Property, RecordKey, Tags, UnionMeta,
};
use ts::{IndexKeyKind, PropertySite, TypeChecker, TypeFlags, TypeRef};

const MAX_DEPTH: usize = 64;

pub struct TypeWalker<'a> {
    checker: &'a dyn TypeChecker,
    registry: &'a mut MetadataRegistry,
    exact_optional: bool,
    warnings: Vec<String>,
    depth: usize,
}

impl<'a> TypeWalker<'a> {
    pub fn new(checker: &'a dyn TypeChecker, registry: &'a mut MetadataRegistry) -> Self {
        Self {
            checker,
            registry,
            exact_optional: false,
            warnings: Vec::new(),
            depth: 0,
        }
    }

    /// Honor `exactOptionalPropertyTypes`: a property is then optional only
    /// when its declaration says so, not when its type includes undefined.
    pub fn with_exact_optional(mut self, exact: bool) -> Self {
        self.exact_optional = exact;
        self
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Read access to the registry being populated, for callers that need
    /// to resolve references mid-analysis.
    pub fn registry(&self) -> &MetadataRegistry {
        self.registry
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Walks a type and records it in the registry under `name`. Later
    /// encounters of the same identity resolve to a reference, which is
    /// what terminates recursive types.
    pub fn walk_named(&mut self, name: &str, ty: TypeRef) -> Metadata {
        if let Some(existing) = self.registry.get(name) {
            return existing.clone();
        }
        self.registry.intern(ty, name);
        let meta = self.classify(ty, Some(name));
        self.registry.insert(name, meta.clone());
        meta
    }

    pub fn walk(&mut self, ty: TypeRef) -> Metadata {
        self.walk_inner(ty)
    }

    fn walk_inner(&mut self, ty: TypeRef) -> Metadata {
        if let Some(name) = self.registry.name_for(ty) {
            return Metadata::reference(name.to_string());
        }
        self.classify(ty, None)
    }

    fn classify(&mut self, ty: TypeRef, declared: Option<&str>) -> Metadata {
        if self.depth >= MAX_DEPTH {
            self.warnings.push(format!(
                "type nesting exceeds {} levels at {}, treating as any",
                MAX_DEPTH,
                self.checker.string_repr(ty)
            ));
            return Metadata::any();
        }
        self.depth += 1;
        let meta = self.classify_impl(ty, declared);
        self.depth -= 1;
        meta
    }

    fn classify_impl(&mut self, ty: TypeRef, declared: Option<&str>) -> Metadata {
        if let Some(value) = self.checker.literal_value(ty) {
            return Metadata::Literal { value };
        }

        let flags = self.checker.type_flags(ty);
        for (flag, prim) in [
            (TypeFlags::ANY, Primitive::Any),
            (TypeFlags::UNKNOWN, Primitive::Unknown),
            (TypeFlags::NEVER, Primitive::Never),
            (TypeFlags::VOID, Primitive::Undefined),
            (TypeFlags::UNDEFINED, Primitive::Undefined),
            (TypeFlags::NULL, Primitive::Null),
            (TypeFlags::STRING, Primitive::String),
            (TypeFlags::NUMBER, Primitive::Number),
            (TypeFlags::BOOLEAN, Primitive::Boolean),
            (TypeFlags::BIGINT, Primitive::BigInt),
        ] {
            if flags.intersects(flag) {
                return Metadata::primitive(prim);
            }
        }

        if flags.intersects(TypeFlags::ENUM) {
            let members = self.checker.enum_members(ty);
            if !members.is_empty() {
                return Metadata::Enum(EnumMeta {
                    name: declared
                        .map(str::to_string)
                        .or_else(|| self.checker.type_name(ty)),
                    members: members
                        .into_iter()
                        .map(|m| EnumMember {
                            name: m.name,
                            value: m.value,
                        })
                        .collect(),
                });
            }
        }

        if flags.intersects(TypeFlags::UNION) {
            let members = self.checker.union_members(ty);
            return self.walk_union(members);
        }

        if flags.intersects(TypeFlags::INTERSECTION) {
            let members = self.checker.intersection_members(ty);
            return self.walk_intersection(&members, declared);
        }

        if let Some(sig) = self.checker.index_signature(ty) {
            return Metadata::Record {
                key: match sig.key {
                    IndexKeyKind::String => RecordKey::String,
                    IndexKeyKind::Number => RecordKey::Number,
                },
                value: Box::new(self.walk_inner(sig.value)),
            };
        }

        if let Some(element) = self.checker.element_type(ty) {
            return Metadata::Array {
                element: Box::new(self.walk_inner(element)),
                tags: Tags::new(),
            };
        }

        if let Some(tuple) = self.checker.tuple_info(ty) {
            return Metadata::Tuple {
                elements: tuple
                    .elements
                    .iter()
                    .map(|e| self.walk_inner(*e))
                    .collect(),
                rest: tuple.rest.map(|r| Box::new(self.walk_inner(r))),
            };
        }

        let props = self.checker.properties(ty);
        let is_plain_object =
            !props.is_empty() || (flags.intersects(TypeFlags::OBJECT) && self.checker.alias_info(ty).is_none());
        if is_plain_object {
            // A named object met mid-walk registers itself and collapses to
            // a reference; names are otherwise assigned only by walk_named.
            if declared.is_none() {
                if let Some(name) = self.checker.type_name(ty) {
                    if self.registry.contains(&name) {
                        return Metadata::reference(name);
                    }
                    self.registry.intern(ty, &name);
                    let meta = self.object_meta(&props, Some(&name));
                    self.registry.insert(&name, meta);
                    return Metadata::reference(name);
                }
            }
            return self.object_meta(&props, declared);
        }

        self.warnings.push(format!(
            "unsupported type construct {}, treating as any",
            self.checker.string_repr(ty)
        ));
        Metadata::any()
    }

    fn object_meta(&mut self, props: &[PropertySite], name: Option<&str>) -> Metadata {
        let properties = props.iter().map(|p| self.walk_property(p)).collect();
        Metadata::Object(ObjectMeta {
            name: name.map(str::to_string),
            properties,
            coerce: false,
        })
    }

    fn walk_property(&mut self, site: &PropertySite) -> Property {
        let mut optional = site.optional;
        let members = self.checker.union_members(site.ty);
        let meta = if !members.is_empty() && !self.exact_optional {
            let (undef, rest): (Vec<TypeRef>, Vec<TypeRef>) = members.into_iter().partition(|m| {
                self.checker
                    .type_flags(*m)
                    .intersects(TypeFlags::UNDEFINED)
                    || self.checker.type_flags(*m).intersects(TypeFlags::VOID)
            });
            if !undef.is_empty() {
                optional = true;
            }
            match rest.len() {
                0 => Metadata::primitive(Primitive::Undefined),
                1 => self.walk_inner(rest[0]),
                _ => self.walk_union(rest),
            }
        } else {
            self.walk_inner(site.ty)
        };
        let tags = tags_from_js_doc(
            &site.js_doc,
            &mut self.warnings,
            &format!("property `{}`", site.name),
        );
        Property {
            name: site.name.clone(),
            meta,
            optional,
            readonly: site.readonly,
            tags,
        }
    }

    fn walk_union(&mut self, members: Vec<TypeRef>) -> Metadata {
        let (nulls, rest): (Vec<TypeRef>, Vec<TypeRef>) = members
            .into_iter()
            .partition(|m| self.checker.type_flags(*m).intersects(TypeFlags::NULL));
        let nullable = !nulls.is_empty();
        let variants: Vec<Metadata> = rest.iter().map(|m| self.walk_inner(*m)).collect();

        if variants.is_empty() {
            return if nullable {
                Metadata::primitive(Primitive::Null)
            } else {
                Metadata::primitive(Primitive::Never)
            };
        }
        if variants.len() == 1 && !nullable {
            return variants.into_iter().next().unwrap();
        }
        let discriminant = self.find_discriminant(&variants);
        Metadata::Union(UnionMeta {
            variants,
            nullable,
            discriminant,
        })
    }

    fn walk_intersection(&mut self, members: &[TypeRef], declared: Option<&str>) -> Metadata {
        let mut tags = Tags::new();
        let mut coerce = false;
        let mut bases: Vec<TypeRef> = Vec::new();
        for m in members {
            let outcome = match self.checker.alias_info(*m) {
                Some(alias) => brand_outcome(&alias, self.checker),
                None => BrandOutcome::NotABrand,
            };
            match outcome {
                BrandOutcome::Tag(tag) => tags.push(tag),
                BrandOutcome::Coerce => coerce = true,
                BrandOutcome::NotABrand => bases.push(*m),
            }
        }

        match bases.len() {
            0 => {
                self.warnings
                    .push("intersection has no base type after tag extraction".to_string());
                Metadata::any()
            }
            1 => {
                let mut base = self.classify(bases[0], declared);
                self.attach_tags(&mut base, tags, coerce);
                base
            }
            _ => {
                if !tags.is_empty() {
                    self.warnings.push(
                        "constraint tags on a multi-operand intersection are ignored".to_string(),
                    );
                }
                let walked = bases.iter().map(|b| self.walk_inner(*b)).collect();
                Metadata::Intersection { members: walked }
            }
        }
    }

    fn attach_tags(&mut self, base: &mut Metadata, tags: Tags, coerce: bool) {
        match base {
            Metadata::Primitive { tags: t, .. } | Metadata::Array { tags: t, .. } => {
                t.extend(tags);
            }
            Metadata::Object(o) => {
                if coerce {
                    o.coerce = true;
                }
                if !tags.is_empty() {
                    self.warnings
                        .push("constraint tags on an object base type are ignored".to_string());
                }
                return;
            }
            Metadata::Reference { name } => {
                if coerce {
                    self.registry.mark_coercive(&name.clone());
                }
                if !tags.is_empty() {
                    self.warnings
                        .push("constraint tags on a named base type are ignored".to_string());
                }
                return;
            }
            _ => {
                if !tags.is_empty() {
                    self.warnings.push(format!(
                        "constraint tags cannot attach to {}",
                        base.label()
                    ));
                }
            }
        }
        if coerce {
            self.warnings
                .push("Coerce brand on a non-object base type is ignored".to_string());
        }
    }

    /// A union of object variants is discriminated when some property is
    /// present on every variant as a literal with pairwise-distinct values.
    fn find_discriminant(&self, variants: &[Metadata]) -> Option<String> {
        let mut objects = Vec::with_capacity(variants.len());
        for v in variants {
            let resolved = match v {
                Metadata::Reference { name } => self.registry.get(name)?,
                other => other,
            };
            objects.push(resolved.as_object()?);
        }
        if objects.len() < 2 {
            return None;
        }
        'candidates: for cand in &objects[0].properties {
            if !matches!(cand.meta, Metadata::Literal { .. }) {
                continue;
            }
            let mut seen = Vec::with_capacity(objects.len());
            for obj in &objects {
                let Some(p) = obj.properties.iter().find(|p| p.name == cand.name) else {
                    continue 'candidates;
                };
                let Metadata::Literal { value } = &p.meta else {
                    continue 'candidates;
                };
                if seen.contains(&value) {
                    continue 'candidates;
                }
                seen.push(value);
            }
            return Some(cand.name.clone());
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ts::testing::FixtureHost;
    use ts::{JsDocTag, LiteralValue};

    #[test]
    fn walks_simple_object_with_doc_tags() {
        let mut host = FixtureHost::new();
        let string = host.string();
        let number = host.number();
        let mut name_prop = FixtureHost::prop("name", string);
        name_prop.js_doc = vec![JsDocTag::new("minLength", "1")];
        let dto = host.object_in(
            "CreateUserDto",
            "/src/dto.ts",
            vec![name_prop, FixtureHost::prop("age", number)],
        );

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(&host, &mut registry);
        let meta = walker.walk_named("CreateUserDto", dto);

        let obj = meta.as_object().expect("object metadata");
        assert_eq!(obj.name.as_deref(), Some("CreateUserDto"));
        assert_eq!(obj.properties.len(), 2);
        assert_eq!(
            obj.properties[0].tags.as_slice(),
            &[crate::metadata::ConstraintTag::MinLength(1)]
        );
        assert!(walker.warnings().is_empty());
    }

    #[test]
    fn walking_twice_is_idempotent() {
        let mut host = FixtureHost::new();
        let string = host.string();
        let dto = host.object_in("Dto", "/src/dto.ts", vec![FixtureHost::prop("s", string)]);

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(&host, &mut registry);
        let first = walker.walk_named("Dto", dto);
        let second = walker.walk_named("Dto", dto);
        assert_eq!(first, second);
        drop(walker);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn recursive_type_collapses_to_reference() {
        let mut host = FixtureHost::new();
        let number = host.number();
        // interface Category { id: number; children: Category[] }
        // The array's element handle is the category handle itself.
        let placeholder = host.object(Some("Category"), vec![]);
        let children = host.array(placeholder);
        let category = placeholder;
        // Rebuild the object in place with its real properties.
        let props = vec![
            FixtureHost::prop("id", number),
            FixtureHost::prop("children", children),
        ];
        host.replace_object_props(category, props);

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(&host, &mut registry);
        walker.walk_named("Category", category);
        drop(walker);

        let meta = registry.get("Category").unwrap();
        let obj = meta.as_object().unwrap();
        match &obj.properties[1].meta {
            Metadata::Array { element, .. } => {
                assert_eq!(**element, Metadata::reference("Category"));
            }
            other => panic!("expected array, got {:?}", other),
        }
        assert!(registry.verify_closure().is_ok());
    }

    #[test]
    fn property_union_with_undefined_becomes_optional() {
        let mut host = FixtureHost::new();
        let number = host.number();
        let undef = host.undefined_t();
        let page_ty = host.union(vec![number, undef]);
        let q = host.object_in("Query", "/src/q.ts", vec![FixtureHost::prop("page", page_ty)]);

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(&host, &mut registry);
        let meta = walker.walk_named("Query", q);
        let obj = meta.as_object().unwrap();
        assert!(obj.properties[0].optional);
        assert!(obj.properties[0].meta.is_primitive(Primitive::Number));
    }

    #[test]
    fn null_union_becomes_nullable() {
        let mut host = FixtureHost::new();
        let string = host.string();
        let null = host.null_t();
        let u = host.union(vec![string, null]);

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(&host, &mut registry);
        match walker.walk(u) {
            Metadata::Union(u) => {
                assert!(u.nullable);
                assert_eq!(u.variants.len(), 1);
            }
            other => panic!("expected union, got {:?}", other),
        }
    }

    #[test]
    fn string_literal_union_is_enum_like() {
        let mut host = FixtureHost::new();
        let a = host.string_lit("asc");
        let d = host.string_lit("desc");
        let u = host.union(vec![a, d]);

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(&host, &mut registry);
        match walker.walk(u) {
            Metadata::Union(u) => {
                assert_eq!(u.as_string_enum().unwrap(), vec!["asc", "desc"]);
            }
            other => panic!("expected union, got {:?}", other),
        }
    }

    #[test]
    fn branded_intersection_folds_into_tags() {
        let mut host = FixtureHost::new();
        let string = host.string();
        let min = host.brand_num("MinLength", 1.0);
        let max = host.brand_num("MaxLength", 255.0);
        let branded = host.intersection(vec![string, min, max]);

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(&host, &mut registry);
        match walker.walk(branded) {
            Metadata::Primitive { primitive, tags } => {
                assert_eq!(primitive, Primitive::String);
                assert_eq!(
                    tags.as_slice(),
                    &[
                        crate::metadata::ConstraintTag::MinLength(1),
                        crate::metadata::ConstraintTag::MaxLength(255),
                    ]
                );
            }
            other => panic!("expected primitive, got {:?}", other),
        }
        assert!(walker.warnings().is_empty());
    }

    #[test]
    fn unknown_construct_degrades_to_any_with_warning() {
        let mut host = FixtureHost::new();
        let t = host.generic("WeakRef", vec![]);
        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(&host, &mut registry);
        assert_eq!(walker.walk(t), Metadata::any());
        assert_eq!(walker.warnings().len(), 1);
    }

    #[test]
    fn discriminated_union_preserves_variant_order_and_discriminant() {
        let mut host = FixtureHost::new();
        let kind_a = host.string_lit("a");
        let kind_b = host.string_lit("b");
        let number = host.number();
        let va = host.object(None, vec![FixtureHost::prop("kind", kind_a), FixtureHost::prop("x", number)]);
        let vb = host.object(None, vec![FixtureHost::prop("kind", kind_b)]);
        let u = host.union(vec![va, vb]);

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(&host, &mut registry);
        match walker.walk(u) {
            Metadata::Union(u) => {
                assert_eq!(u.discriminant.as_deref(), Some("kind"));
                assert_eq!(u.variants.len(), 2);
            }
            other => panic!("expected union, got {:?}", other),
        }
    }

    #[test]
    fn nested_named_object_registers_and_references() {
        let mut host = FixtureHost::new();
        let number = host.number();
        let inner = host.object_in("Inner", "/src/t.ts", vec![FixtureHost::prop("n", number)]);
        let outer = host.object_in("Outer", "/src/t.ts", vec![FixtureHost::prop("inner", inner)]);

        let mut registry = MetadataRegistry::new();
        let mut walker = TypeWalker::new(&host, &mut registry);
        walker.walk_named("Outer", outer);
        drop(walker);

        assert!(registry.contains("Inner"));
        let outer_meta = registry.get("Outer").unwrap().as_object().unwrap().clone();
        assert_eq!(outer_meta.properties[0].meta, Metadata::reference("Inner"));
        assert!(registry.verify_closure().is_ok());
    }
}
