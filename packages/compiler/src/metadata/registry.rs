use super::model::Metadata;
use indexmap::IndexMap;
use std::collections::HashMap;
use ts::TypeRef;

/// The mapping from type name to canonical metadata, populated by the
/// walker on first encounter.
///
/// A parallel mapping from host type identity to name supports cycle
/// breaking: a type seen once is walked fully; subsequent encounters
/// resolve to a reference by name.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    entries: IndexMap<String, Metadata>,
    interned: HashMap<TypeRef, String>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the identity mapping before the type's body is walked, so
    /// self-recursion resolves to a reference.
    pub fn intern(&mut self, ty: TypeRef, name: &str) {
        self.interned.insert(ty, name.to_string());
    }

    pub fn name_for(&self, ty: TypeRef) -> Option<&str> {
        self.interned.get(&ty).map(String::as_str)
    }

    /// Reverse lookup: the identity handle a name was interned under.
    pub fn handle_for(&self, name: &str) -> Option<TypeRef> {
        self.interned
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(ty, _)| *ty)
    }

    pub fn insert(&mut self, name: &str, meta: Metadata) {
        self.entries.insert(name.to_string(), meta);
    }

    pub fn get(&self, name: &str) -> Option<&Metadata> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flips the coercion flag on a named object entry. Returns false when
    /// the entry is missing or not an object.
    pub fn mark_coercive(&mut self, name: &str) -> bool {
        match self.entries.get_mut(name) {
            Some(Metadata::Object(o)) => {
                o.coerce = true;
                true
            }
            _ => false,
        }
    }

    /// Checks that every reference reachable from any entry resolves within
    /// the registry. Returns the unresolved names otherwise.
    pub fn verify_closure(&self) -> Result<(), Vec<String>> {
        let mut missing = Vec::new();
        for meta in self.entries.values() {
            let mut refs = Vec::new();
            meta.references(&mut refs);
            for r in refs {
                if !self.entries.contains_key(&r) && !missing.contains(&r) {
                    missing.push(r);
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Freezes the registry for the read-only phases (code generation,
    /// rewriting, OpenAPI). The identity map is dropped; only names remain.
    pub fn freeze(self) -> FrozenRegistry {
        FrozenRegistry {
            entries: self.entries,
        }
    }
}

/// Read-only registry handle shared by the post-analysis phases.
#[derive(Debug, Clone, Default)]
pub struct FrozenRegistry {
    entries: IndexMap<String, Metadata>,
}

impl FrozenRegistry {
    pub fn get(&self, name: &str) -> Option<&Metadata> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metadata)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty JSON dump of every entry, for `--dump-metadata`.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".to_string())
    }

    /// Resolves one level of `Reference` indirection.
    pub fn resolve<'a>(&'a self, meta: &'a Metadata) -> &'a Metadata {
        match meta {
            Metadata::Reference { name } => self.get(name).unwrap_or(meta),
            _ => meta,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metadata::{ObjectMeta, Primitive, Property, Tags};

    fn obj(name: &str, prop_ref: Option<&str>) -> Metadata {
        let mut properties = vec![Property {
            name: "id".to_string(),
            meta: Metadata::primitive(Primitive::Number),
            optional: false,
            readonly: false,
            tags: Tags::new(),
        }];
        if let Some(r) = prop_ref {
            properties.push(Property {
                name: "next".to_string(),
                meta: Metadata::reference(r),
                optional: true,
                readonly: false,
                tags: Tags::new(),
            });
        }
        Metadata::Object(ObjectMeta {
            name: Some(name.to_string()),
            properties,
            coerce: false,
        })
    }

    #[test]
    fn closure_holds_for_self_reference() {
        let mut reg = MetadataRegistry::new();
        reg.insert("Node", obj("Node", Some("Node")));
        assert!(reg.verify_closure().is_ok());
    }

    #[test]
    fn closure_reports_missing_reference() {
        let mut reg = MetadataRegistry::new();
        reg.insert("Node", obj("Node", Some("Missing")));
        let missing = reg.verify_closure().unwrap_err();
        assert_eq!(missing, vec!["Missing".to_string()]);
    }

    #[test]
    fn mark_coercive_only_touches_objects() {
        let mut reg = MetadataRegistry::new();
        reg.insert("Query", obj("Query", None));
        reg.insert("Plain", Metadata::primitive(Primitive::String));
        assert!(reg.mark_coercive("Query"));
        assert!(!reg.mark_coercive("Plain"));
        assert!(!reg.mark_coercive("Absent"));
        match reg.get("Query").unwrap() {
            Metadata::Object(o) => assert!(o.coerce),
            _ => unreachable!(),
        }
    }
}
