//! Member search over in-set classes and the external hierarchy

use std::collections::HashSet;

use strata_core::element::ClassRef;
use strata_core::{ClassId, ElementStore, ExternalHierarchy, MemberKind, MemberSignature};

/// Depth-first member search: own members, then the supertype chain, then
/// interfaces in declaration order. Out-of-set ancestors are answered by the
/// external hierarchy and never walked locally.
pub struct MemberLookup<'a> {
    store: &'a ElementStore,
    external: &'a dyn ExternalHierarchy,
}

impl<'a> MemberLookup<'a> {
    pub fn new(store: &'a ElementStore, external: &'a dyn ExternalHierarchy) -> Self {
        Self { store, external }
    }

    /// Member declared on `class` itself or inherited from an ancestor
    pub fn find(&self, class: &ClassRef, name: &str, kind: MemberKind) -> Option<MemberSignature> {
        self.search(class, name, kind, &mut HashSet::new())
    }

    /// Nearest ancestor member that a member of `class` named `name` overrides
    pub fn overridden(&self, class: ClassId, name: &str, kind: MemberKind) -> Option<MemberSignature> {
        let node = self.store.class(class)?;
        let mut visited = HashSet::new();
        visited.insert(ClassRef::InSet(class));
        node.ancestors()
            .find_map(|ancestor| self.search(ancestor, name, kind, &mut visited))
    }

    /// Reference for a class mentioned by name in a type
    pub fn class_ref(&self, name: &str) -> ClassRef {
        match self.store.class_by_name(name) {
            Some(id) => ClassRef::InSet(id),
            None => ClassRef::External(name.to_string()),
        }
    }

    fn search(
        &self,
        class: &ClassRef,
        name: &str,
        kind: MemberKind,
        visited: &mut HashSet<ClassRef>,
    ) -> Option<MemberSignature> {
        if !visited.insert(class.clone()) {
            return None;
        }
        match class {
            ClassRef::External(external) => self.external.lookup_member(external, name, kind),
            ClassRef::InSet(id) => {
                if let Some(member) = self.store.own_member(*id, name, kind) {
                    return Some(member);
                }
                let node = self.store.class(*id)?;
                node.ancestors()
                    .find_map(|ancestor| self.search(ancestor, name, kind, visited))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::hierarchy::ExternalClass;
    use strata_core::{ElementStore, StaticHierarchy, Type};
    use strata_test_fixtures::{cycle, unit, SyntaxBuilder};

    #[test]
    fn test_overridden_skips_own_member() {
        let s = SyntaxBuilder::new();
        let lib = cycle(vec![unit(
            "lib/a.dart",
            vec![
                s.class("Base").getter("x", Some("num"), None).build(),
                s.class("Derived")
                    .extends("Base")
                    .getter("x", Some("int"), None)
                    .build(),
            ],
        )]);
        let store = ElementStore::build(&lib).unwrap();
        let hierarchy = StaticHierarchy::new();
        let lookup = MemberLookup::new(&store, &hierarchy);
        let derived = store.class_by_name("Derived").unwrap();

        let own = lookup
            .find(&ClassRef::InSet(derived), "x", MemberKind::Getter)
            .unwrap();
        assert_eq!(own.return_type, Type::Int);

        let overridden = lookup.overridden(derived, "x", MemberKind::Getter).unwrap();
        assert_eq!(overridden.owner, "Base");
        assert_eq!(overridden.return_type, Type::Num);
    }

    #[test]
    fn test_external_ancestor_is_delegated() {
        let s = SyntaxBuilder::new();
        let lib = cycle(vec![unit(
            "lib/a.dart",
            vec![s.class("Circle").extends("Shape").field("area", None).build()],
        )]);
        let store = ElementStore::build(&lib).unwrap();
        let hierarchy = StaticHierarchy::new()
            .with_class(ExternalClass::new("Shape").getter("area", Type::Double));
        let lookup = MemberLookup::new(&store, &hierarchy);
        let circle = store.class_by_name("Circle").unwrap();

        let area = lookup.overridden(circle, "area", MemberKind::Getter).unwrap();
        assert_eq!(area.owner, "Shape");
        assert_eq!(area.return_type, Type::Double);

        // Object members come through the implicit root
        let hash = lookup.overridden(circle, "hashCode", MemberKind::Getter).unwrap();
        assert_eq!(hash.return_type, Type::Int);
        assert!(lookup.overridden(circle, "missing", MemberKind::Getter).is_none());
    }
}
