//! SWC plugin that rebinds free references to Node globals (`Buffer`,
//! `SlowBuffer`, `process` and the timer functions) onto unit-local
//! substitutes, each initialized once at the top of the unit.
//!
//! ```js
//! Buffer.from('a');
//! ```
//!
//! becomes
//!
//! ```js
//! var _Buffer_kx3a09fz = typeof Buffer === 'undefined' ? require('buffer/').Buffer : Buffer;
//! _Buffer_kx3a09fz.from('a');
//! ```
//!
//! References that resolve to a local declaration are left alone, and a unit
//! that never mentions a tracked global is returned untouched.

pub mod collector;
pub mod config;
pub mod error;
pub mod initializer;
pub mod namer;
pub mod rebind;
pub mod registry;
pub mod rename;
pub mod scope;
pub mod trace_id;
pub mod unit;

use swc_core::{
    common::{errors::HANDLER, Mark, SyntaxContext},
    ecma::ast::Program,
    plugin::{plugin_transform, proxies::TransformPluginProgramMetadata},
};
use tracing::debug;

pub use config::{GlobalEntry, PluginConfig};
pub use error::RebindError;
pub use namer::{EntropySource, SeededEntropy, SyntheticNamer, SystemEntropy};
pub use rebind::{GlobalsRebinder, RebindReport, Rewrite};
pub use registry::{TargetName, TargetRegistry};
pub use trace_id::{IssuedTraceIds, TraceIdTransform, TRACE_ID_ATTR};
pub use unit::{Tag, UnitData};

// -----------------------------------------------------------------------------
// Driver
// -----------------------------------------------------------------------------

/// Runs every configured pass over one unit.
///
/// On error the unit may be partially rewritten by the passes that ran before
/// the failure; callers that report and carry on should use the returned
/// program only when this succeeds.
pub fn transform_unit(
    program: &mut Program,
    config: &PluginConfig,
    ctxt: SyntaxContext,
) -> Result<RebindReport, RebindError> {
    let registry = config.registry()?;
    let mut rebinder = GlobalsRebinder::new(&registry, config.namer())?.with_binding_context(ctxt);
    let mut data = UnitData::new();

    let report = rebinder.rebind_unit(program, &mut data)?;

    if config.trace_ids {
        let tag = Tag::<IssuedTraceIds>::issue("node-globals/trace-ids");
        let mut transform =
            TraceIdTransform::new(rebinder.namer_mut().entropy(), &mut data, &tag);
        if let Some(max) = config.max_name_attempts {
            transform = transform.with_max_attempts(max);
        }
        let issued = transform.run(program)?;
        debug!(issued, "tagged jsx elements");
    }
    Ok(report)
}

// -----------------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------------

#[plugin_transform]
pub fn process_transform(program: Program, metadata: TransformPluginProgramMetadata) -> Program {
    let raw = metadata.get_transform_plugin_config();
    let config = match PluginConfig::from_json(raw.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            emit_error(&err);
            return program;
        }
    };

    let ctxt = SyntaxContext::empty().apply_mark(Mark::new());
    let mut rewritten = program.clone();
    match transform_unit(&mut rewritten, &config, ctxt) {
        Ok(report) => {
            debug!(rewrites = report.rewrites.len(), "unit done");
            rewritten
        }
        Err(err) => {
            emit_error(&err);
            program
        }
    }
}

fn emit_error(err: &RebindError) {
    HANDLER.with(|handler| handler.err(&format!("node-globals: {err}")));
}
