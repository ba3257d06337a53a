use std::collections::HashMap;

use swc_core::{
    common::SyntaxContext,
    ecma::{
        ast::*,
        atoms::Atom,
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::scope::IdentHandle;

/// Renames identifiers by handle. Must run over the same tree that was
/// analysed, before anything is inserted into it.
pub struct OccurrenceRenamer {
    renames: HashMap<IdentHandle, Atom>,
    ctxt: SyntaxContext,
    next_ident: u32,
}

impl OccurrenceRenamer {
    pub fn new(renames: HashMap<IdentHandle, Atom>, ctxt: SyntaxContext) -> Self {
        Self {
            renames,
            ctxt,
            next_ident: 0,
        }
    }
}

impl VisitMut for OccurrenceRenamer {
    fn visit_mut_ident(&mut self, ident: &mut Ident) {
        let handle = IdentHandle(self.next_ident);
        self.next_ident += 1;
        if let Some(name) = self.renames.get(&handle) {
            ident.sym = name.clone();
            ident.ctxt = self.ctxt;
        }
    }

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        let Prop::Shorthand(ident) = prop else {
            prop.visit_mut_children_with(self);
            return;
        };
        let original = ident.sym.clone();
        ident.visit_mut_with(self);
        if ident.sym != original {
            // `{ Buffer }` -> `{ Buffer: _Buffer_x }`
            let value = ident.clone();
            *prop = Prop::KeyValue(KeyValueProp {
                key: PropName::Ident(IdentName::new(original, value.span)),
                value: Box::new(Expr::Ident(value)),
            });
        }
    }

    fn visit_mut_export_named_specifier(&mut self, spec: &mut ExportNamedSpecifier) {
        let original = match &spec.orig {
            ModuleExportName::Ident(ident) => ident.sym.clone(),
            _ => {
                spec.visit_mut_children_with(self);
                return;
            }
        };
        spec.visit_mut_children_with(self);
        if let ModuleExportName::Ident(local) = &spec.orig {
            if local.sym != original && spec.exported.is_none() {
                // Keep the exported name: `export { _Buffer_x as Buffer }`.
                spec.exported = Some(ModuleExportName::Ident(Ident::new(
                    original,
                    local.span,
                    SyntaxContext::empty(),
                )));
            }
        }
    }
}
