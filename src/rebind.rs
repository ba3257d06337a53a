use std::collections::HashMap;

use swc_core::{
    common::SyntaxContext,
    ecma::{ast::Program, atoms::Atom, visit::VisitMutWith},
};
use tracing::debug;

use crate::collector::{FreeReferenceCollector, RewriteEntry, TrackedName};
use crate::error::RebindError;
use crate::initializer::{install_initializers, Initializer};
use crate::namer::SyntheticNamer;
use crate::registry::TargetRegistry;
use crate::rename::OccurrenceRenamer;
use crate::scope::analyze;
use crate::unit::{Tag, UnitData};

/// One rewritten global within a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub target: String,
    pub synthetic: String,
    pub occurrences: usize,
}

/// What `rebind_unit` changed, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebindReport {
    pub rewrites: Vec<Rewrite>,
}

impl RebindReport {
    pub fn is_empty(&self) -> bool {
        self.rewrites.is_empty()
    }

    pub fn synthetic_for(&self, target: &str) -> Option<&str> {
        self.rewrites
            .iter()
            .find(|r| r.target == target)
            .map(|r| r.synthetic.as_str())
    }
}

struct Target {
    initializer: Initializer,
    tag: Tag<RewriteEntry>,
}

/// Rebinds free references to tracked globals onto local, lazily-initialized
/// substitutes.
pub struct GlobalsRebinder {
    targets: Vec<Target>,
    namer: SyntheticNamer,
    ctxt: SyntaxContext,
}

impl GlobalsRebinder {
    /// Parses every template up front; a broken registry fails here rather
    /// than on the first unit that happens to use the name.
    pub fn new(registry: &TargetRegistry, namer: SyntheticNamer) -> Result<Self, RebindError> {
        let targets = registry
            .iter()
            .map(|t| {
                Ok(Target {
                    initializer: Initializer::parse(&t.name, &t.template)?,
                    tag: Tag::issue("node-globals/rewrite"),
                })
            })
            .collect::<Result<Vec<_>, RebindError>>()?;
        Ok(Self {
            targets,
            namer,
            ctxt: SyntaxContext::empty(),
        })
    }

    /// Context given to the synthesized declarations and every renamed
    /// reference, so later hygiene passes see a single binding.
    pub fn with_binding_context(mut self, ctxt: SyntaxContext) -> Self {
        self.ctxt = ctxt;
        self
    }

    pub fn namer_mut(&mut self) -> &mut SyntheticNamer {
        &mut self.namer
    }

    pub fn rebind_unit(
        &mut self,
        program: &mut Program,
        data: &mut UnitData,
    ) -> Result<RebindReport, RebindError> {
        let analysis = analyze(program);
        {
            let tracked = self
                .targets
                .iter()
                .map(|t| TrackedName {
                    name: t.initializer.target(),
                    tag: &t.tag,
                })
                .collect();
            let mut collector = FreeReferenceCollector::new(tracked, data);
            analysis.dispatch(&mut collector);
        }

        let mut report = RebindReport::default();
        let mut renames = HashMap::new();
        let mut initializers = vec![];
        for target in &self.targets {
            let Some(entry) = data.take(&target.tag) else {
                continue;
            };
            if entry.occurrences.is_empty() {
                continue;
            }
            let name = target.initializer.target();
            let synthetic =
                self.namer
                    .choose(name, &entry.occurrences, &analysis.scopes)?;
            debug!(
                global = name,
                synthetic = %synthetic,
                occurrences = entry.occurrences.len(),
                "rebinding free references"
            );
            let sym: Atom = synthetic.as_str().into();
            for occurrence in &entry.occurrences {
                renames.insert(occurrence.handle, sym.clone());
            }
            initializers.push(target.initializer.instantiate(&synthetic, self.ctxt));
            report.rewrites.push(Rewrite {
                target: name.to_string(),
                synthetic,
                occurrences: entry.occurrences.len(),
            });
        }

        if renames.is_empty() {
            return Ok(report);
        }
        // Handles are positions in the analysed tree: rename before inserting.
        program.visit_mut_with(&mut OccurrenceRenamer::new(renames, self.ctxt));
        install_initializers(program, initializers);
        Ok(report)
    }
}
