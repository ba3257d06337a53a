use swc_core::{
    common::{sync::Lrc, FileName, SourceMap, Span, SyntaxContext, DUMMY_SP},
    ecma::{
        ast::*,
        parser::{parse_file_as_script, Syntax},
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::error::RebindError;

/// A parsed initializer template: a single declaration whose one binding is
/// renamed per unit.
#[derive(Debug, Clone)]
pub struct Initializer {
    target: String,
    decl: VarDecl,
}

impl Initializer {
    pub fn parse(target: &str, template: &str) -> Result<Self, RebindError> {
        let cm: Lrc<SourceMap> = Default::default();
        let fm = cm.new_source_file(
            FileName::Custom(format!("<{target} initializer>")).into(),
            template.to_string(),
        );
        let parse_error = |message: String| RebindError::TemplateParse {
            name: target.to_string(),
            message,
        };

        let mut recovered = vec![];
        let script = parse_file_as_script(
            &fm,
            Syntax::Es(Default::default()),
            EsVersion::EsNext,
            None,
            &mut recovered,
        )
        .map_err(|e| parse_error(format!("{:?}", e.kind())))?;
        if let Some(e) = recovered.first() {
            return Err(parse_error(format!("{:?}", e.kind())));
        }

        let shape_error = |found: &str| RebindError::TemplateShape {
            name: target.to_string(),
            found: found.to_string(),
        };
        let mut body = script.body;
        if body.len() != 1 {
            return Err(shape_error(&format!("{} statements", body.len())));
        }
        let mut decl = match body.remove(0) {
            Stmt::Decl(Decl::Var(decl)) => *decl,
            _ => return Err(shape_error("a statement that is not a variable declaration")),
        };
        if decl.decls.len() != 1 {
            return Err(shape_error(&format!("{} declarators", decl.decls.len())));
        }
        if !decl.decls[0].name.is_ident() {
            return Err(shape_error("a destructuring pattern"));
        }

        decl.visit_mut_with(&mut StripSpans);
        Ok(Self {
            target: target.to_string(),
            decl,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The template's declaration with its binding renamed to `synthetic`.
    /// The rest of the template is left alone, so its references to the native
    /// global stay free.
    pub fn instantiate(&self, synthetic: &str, ctxt: SyntaxContext) -> Stmt {
        let mut decl = self.decl.clone();
        if let Some(binding) = decl.decls[0].name.as_mut_ident() {
            binding.id.sym = synthetic.into();
            binding.id.ctxt = ctxt;
        }
        Stmt::Decl(Decl::Var(Box::new(decl)))
    }
}

struct StripSpans;

impl VisitMut for StripSpans {
    fn visit_mut_span(&mut self, span: &mut Span) {
        *span = DUMMY_SP;
    }
}

// -----------------------------------------------------------------------------
// Installation
// -----------------------------------------------------------------------------

fn is_directive(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Expr(ExprStmt { expr, .. }) if matches!(&**expr, Expr::Lit(Lit::Str(_))))
}

/// Inserts `stmts` as the first statements of the unit, keeping their order.
/// A directive prologue (`"use strict"`) stays in front.
pub fn install_initializers(program: &mut Program, stmts: Vec<Stmt>) {
    if stmts.is_empty() {
        return;
    }
    match program {
        Program::Module(m) => {
            let at = m
                .body
                .iter()
                .take_while(|item| matches!(item, ModuleItem::Stmt(s) if is_directive(s)))
                .count();
            m.body.splice(at..at, stmts.into_iter().map(ModuleItem::Stmt));
        }
        Program::Script(s) => {
            let at = s.body.iter().take_while(|stmt| is_directive(stmt)).count();
            s.body.splice(at..at, stmts);
        }
    }
}
