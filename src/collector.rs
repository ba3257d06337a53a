use tracing::trace;

use crate::scope::{IdentHandle, Reference, ReferenceVisitor, ScopeId, ScopeTree};
use crate::unit::{Tag, UnitData};

/// A free use of a tracked global, found during the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub handle: IdentHandle,
    pub scope: ScopeId,
}

/// The occurrences of one tracked name within one unit, in source order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteEntry {
    pub occurrences: Vec<Occurrence>,
}

/// Tracked name paired with the tag its rewrite entry is stored under.
pub struct TrackedName<'a> {
    pub name: &'a str,
    pub tag: &'a Tag<RewriteEntry>,
}

/// Records free references to tracked names into the unit's rewrite table.
/// Nothing is renamed here; every use in the unit has to be known before a
/// substitute name can be picked.
pub struct FreeReferenceCollector<'a> {
    tracked: Vec<TrackedName<'a>>,
    data: &'a mut UnitData,
}

impl<'a> FreeReferenceCollector<'a> {
    pub fn new(tracked: Vec<TrackedName<'a>>, data: &'a mut UnitData) -> Self {
        Self { tracked, data }
    }
}

impl ReferenceVisitor for FreeReferenceCollector<'_> {
    fn visit_referenced_ident(&mut self, reference: &Reference, scopes: &ScopeTree) {
        let name: &str = &reference.sym;
        let Some(target) = self.tracked.iter().find(|t| t.name == name) else {
            return;
        };
        if scopes.has_binding(reference.scope, name) {
            return;
        }
        trace!(global = name, handle = reference.handle.0, "free reference");
        self.data
            .get_or_default(target.tag)
            .occurrences
            .push(Occurrence {
                handle: reference.handle,
                scope: reference.scope,
            });
    }
}
