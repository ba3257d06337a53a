//! Tags JSX opening elements with a generated `__uuid` attribute so rendered
//! nodes can be traced back to their element in source.
//!
//! Independent of the globals rebinder; it only shares the per-unit store.

use std::collections::HashSet;

use swc_core::{
    common::DUMMY_SP,
    ecma::{
        ast::*,
        visit::{VisitMut, VisitMutWith},
    },
};
use tracing::debug;

use crate::error::RebindError;
use crate::namer::{entropy_suffix, EntropySource, DEFAULT_MAX_ATTEMPTS};
use crate::unit::{Tag, UnitData};

pub const TRACE_ID_ATTR: &str = "__uuid";

/// Trace ids already handed out in the current unit.
#[derive(Debug, Default)]
pub struct IssuedTraceIds {
    pub ids: HashSet<String>,
}

pub struct TraceIdTransform<'a> {
    entropy: &'a mut dyn EntropySource,
    data: &'a mut UnitData,
    tag: &'a Tag<IssuedTraceIds>,
    max_attempts: u32,
    error: Option<RebindError>,
}

impl<'a> TraceIdTransform<'a> {
    pub fn new(
        entropy: &'a mut dyn EntropySource,
        data: &'a mut UnitData,
        tag: &'a Tag<IssuedTraceIds>,
    ) -> Self {
        Self {
            entropy,
            data,
            tag,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            error: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Tags every element in `program`, stopping at the first failure.
    pub fn run(mut self, program: &mut Program) -> Result<usize, RebindError> {
        program.visit_mut_with(&mut self);
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data.get(self.tag).map_or(0, |issued| issued.ids.len())),
        }
    }

    fn has_trace_attr(attrs: &[JSXAttrOrSpread]) -> bool {
        attrs.iter().any(|attr| {
            if let JSXAttrOrSpread::JSXAttr(jsx_attr) = attr {
                if let JSXAttrName::Ident(ident) = &jsx_attr.name {
                    return ident.sym.as_ref() == TRACE_ID_ATTR;
                }
            }
            false
        })
    }

    fn fresh_id(&mut self) -> Result<String, RebindError> {
        for _ in 0..self.max_attempts {
            let id = entropy_suffix(&mut *self.entropy);
            if self.data.get_or_default(self.tag).ids.insert(id.clone()) {
                return Ok(id);
            }
            debug!(id = %id, "trace id already issued in this unit, retrying");
        }
        Err(RebindError::TraceIdExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl VisitMut for TraceIdTransform<'_> {
    fn visit_mut_jsx_opening_element(&mut self, node: &mut JSXOpeningElement) {
        node.visit_mut_children_with(self);
        if self.error.is_some() {
            return;
        }
        // Generated elements carry no location to trace back to.
        if node.span.is_dummy() || Self::has_trace_attr(&node.attrs) {
            return;
        }
        match self.fresh_id() {
            Ok(id) => node.attrs.insert(
                0,
                JSXAttrOrSpread::JSXAttr(JSXAttr {
                    span: DUMMY_SP,
                    name: JSXAttrName::Ident(IdentName::new(TRACE_ID_ATTR.into(), DUMMY_SP)),
                    value: Some(JSXAttrValue::Lit(Lit::Str(Str {
                        span: DUMMY_SP,
                        value: id.into(),
                        raw: None,
                    }))),
                }),
            ),
            Err(err) => self.error = Some(err),
        }
    }
}
