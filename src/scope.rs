//! Lexical scope analysis for one unit.
//!
//! swc hands plugins a bare AST, so the binding structure the rebinder needs
//! (which scope declares what, which identifiers are reads) is rebuilt here in
//! a single `Visit` pass. The pass is complete before any reference is
//! reported, so hoisted `var`s and function declarations that appear after a
//! use still shadow it.
//!
//! Identifiers are addressed by [`IdentHandle`]: the pre-order position of the
//! `Ident` node in the unit. Any walk over the same unmodified tree, `Visit` or
//! `VisitMut`, reaches `Ident` nodes in the same order.

use std::collections::HashSet;

use swc_core::ecma::{
    ast::*,
    atoms::Atom,
    visit::{Visit, VisitWith},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The unit itself.
    Unit,
    /// Functions, arrows, constructors, accessors and static blocks. `var`
    /// declarations stop here.
    Function,
    Block,
    Catch,
    Class,
}

impl ScopeKind {
    fn hoists_var(self) -> bool {
        matches!(self, ScopeKind::Unit | ScopeKind::Function)
    }
}

#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    bindings: HashSet<String>,
}

#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    fn new() -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                kind: ScopeKind::Unit,
                bindings: HashSet::new(),
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    fn push(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            kind,
            bindings: HashSet::new(),
        });
        id
    }

    fn declare(&mut self, scope: ScopeId, name: String) {
        self.scopes[scope.0 as usize].bindings.insert(name);
    }

    /// `scope` followed by each of its ancestors up to the unit root.
    pub fn chain(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), move |id| self.get(*id).parent)
    }

    pub fn has_own_binding(&self, scope: ScopeId, name: &str) -> bool {
        self.get(scope).bindings.contains(name)
    }

    /// Whether `scope` or any ancestor declares `name`.
    pub fn has_binding(&self, scope: ScopeId, name: &str) -> bool {
        self.chain(scope).any(|id| self.has_own_binding(id, name))
    }

    /// The scope on the chain from `scope` that declares `name`, if any.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        self.chain(scope).find(|id| self.has_own_binding(*id, name))
    }

    fn var_scope(&self, scope: ScopeId) -> ScopeId {
        self.chain(scope)
            .find(|id| self.get(*id).kind.hoists_var())
            .unwrap_or_else(|| self.root())
    }
}

/// An identifier in read position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub sym: Atom,
    pub handle: IdentHandle,
    pub scope: ScopeId,
}

/// Receives each identifier in read position, in source order.
pub trait ReferenceVisitor {
    fn visit_referenced_ident(&mut self, reference: &Reference, scopes: &ScopeTree);
}

#[derive(Debug)]
pub struct Analysis {
    pub scopes: ScopeTree,
    pub references: Vec<Reference>,
    /// Number of `Ident` nodes in the unit; handles are `0..ident_count`.
    pub ident_count: u32,
}

impl Analysis {
    pub fn dispatch<V: ReferenceVisitor>(&self, visitor: &mut V) {
        for reference in &self.references {
            visitor.visit_referenced_ident(reference, &self.scopes);
        }
    }
}

pub fn analyze(program: &Program) -> Analysis {
    let mut builder = ScopeBuilder {
        scopes: ScopeTree::new(),
        references: vec![],
        stack: vec![],
        mode: Mode::Reference,
        next_ident: 0,
    };
    builder.stack.push(builder.scopes.root());
    program.visit_with(&mut builder);
    Analysis {
        scopes: builder.scopes,
        references: builder.references,
        ident_count: builder.next_ident,
    }
}

// -----------------------------------------------------------------------------
// Builder
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Reference,
    Declare(ScopeId),
    /// Assignment targets. Not reads, and they bind nothing; nested defaults
    /// and computed keys still go back to reads.
    Write,
    /// Names that are neither reads nor bindings: labels, JSX tags, export
    /// aliases, TypeScript types. Sticky: nested expressions stay ignored.
    Ignore,
}

struct ScopeBuilder {
    scopes: ScopeTree,
    references: Vec<Reference>,
    stack: Vec<ScopeId>,
    mode: Mode,
    next_ident: u32,
}

impl ScopeBuilder {
    fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or_else(|| self.scopes.root())
    }

    fn with_mode(&mut self, mode: Mode, f: impl FnOnce(&mut Self)) {
        let saved = self.mode;
        self.mode = match saved {
            Mode::Ignore => Mode::Ignore,
            _ => mode,
        };
        f(self);
        self.mode = saved;
    }

    fn in_scope(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self, ScopeId)) {
        let id = self.scopes.push(self.current(), kind);
        self.stack.push(id);
        f(self, id);
        self.stack.pop();
    }

    /// Expressions and statements go back to reads, which covers initializers,
    /// default values and computed keys nested in binding patterns.
    fn reading(&mut self, f: impl FnOnce(&mut Self)) {
        self.with_mode(Mode::Reference, f)
    }
}

impl Visit for ScopeBuilder {
    fn visit_ident(&mut self, ident: &Ident) {
        let handle = IdentHandle(self.next_ident);
        self.next_ident += 1;
        match self.mode {
            Mode::Reference => self.references.push(Reference {
                sym: ident.sym.clone(),
                handle,
                scope: self.current(),
            }),
            Mode::Declare(scope) => self.scopes.declare(scope, ident.sym.to_string()),
            Mode::Write | Mode::Ignore => {}
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        self.reading(|v| expr.visit_children_with(v));
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        self.reading(|v| stmt.visit_children_with(v));
    }

    // ---------- scopes ----------

    fn visit_block_stmt(&mut self, block: &BlockStmt) {
        self.in_scope(ScopeKind::Block, |v, _| block.visit_children_with(v));
    }

    fn visit_function(&mut self, function: &Function) {
        self.in_scope(ScopeKind::Function, |v, _| {
            v.reading(|v| function.visit_children_with(v))
        });
    }

    fn visit_arrow_expr(&mut self, arrow: &ArrowExpr) {
        self.reading(|v| {
            v.in_scope(ScopeKind::Function, |v, scope| {
                // Params are the only direct `Pat`s; the body resets to reads.
                v.with_mode(Mode::Declare(scope), |v| arrow.visit_children_with(v))
            })
        });
    }

    fn visit_constructor(&mut self, ctor: &Constructor) {
        self.in_scope(ScopeKind::Function, |v, _| v.reading(|v| ctor.visit_children_with(v)));
    }

    fn visit_getter_prop(&mut self, prop: &GetterProp) {
        self.in_scope(ScopeKind::Function, |v, _| v.reading(|v| prop.visit_children_with(v)));
    }

    fn visit_setter_prop(&mut self, prop: &SetterProp) {
        self.in_scope(ScopeKind::Function, |v, scope| {
            v.with_mode(Mode::Declare(scope), |v| prop.visit_children_with(v))
        });
    }

    fn visit_static_block(&mut self, block: &StaticBlock) {
        self.in_scope(ScopeKind::Function, |v, _| block.visit_children_with(v));
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause) {
        self.in_scope(ScopeKind::Catch, |v, scope| {
            v.with_mode(Mode::Declare(scope), |v| clause.visit_children_with(v))
        });
    }

    fn visit_for_stmt(&mut self, stmt: &ForStmt) {
        self.in_scope(ScopeKind::Block, |v, _| stmt.visit_children_with(v));
    }

    fn visit_for_in_stmt(&mut self, stmt: &ForInStmt) {
        self.in_scope(ScopeKind::Block, |v, _| stmt.visit_children_with(v));
    }

    fn visit_for_of_stmt(&mut self, stmt: &ForOfStmt) {
        self.in_scope(ScopeKind::Block, |v, _| stmt.visit_children_with(v));
    }

    fn visit_for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::Pat(pat) => self.with_mode(Mode::Write, |v| pat.visit_with(v)),
            _ => head.visit_children_with(self),
        }
    }

    fn visit_switch_stmt(&mut self, stmt: &SwitchStmt) {
        self.in_scope(ScopeKind::Block, |v, _| stmt.visit_children_with(v));
    }

    fn visit_class(&mut self, class: &Class) {
        self.in_scope(ScopeKind::Class, |v, _| v.reading(|v| class.visit_children_with(v)));
    }

    fn visit_assign_expr(&mut self, expr: &AssignExpr) {
        self.with_mode(Mode::Write, |v| expr.left.visit_with(v));
        expr.right.visit_with(self);
    }

    // ---------- declarations ----------

    fn visit_var_decl(&mut self, decl: &VarDecl) {
        let target = match decl.kind {
            VarDeclKind::Var => self.scopes.var_scope(self.current()),
            _ => self.current(),
        };
        // Initializers are expressions and switch back to reads on their own.
        self.with_mode(Mode::Declare(target), |v| decl.visit_children_with(v));
    }

    fn visit_using_decl(&mut self, decl: &UsingDecl) {
        let scope = self.current();
        self.with_mode(Mode::Declare(scope), |v| decl.visit_children_with(v));
    }

    fn visit_param(&mut self, param: &Param) {
        let scope = self.current();
        self.with_mode(Mode::Declare(scope), |v| param.visit_children_with(v));
    }

    fn visit_ts_param_prop(&mut self, param: &TsParamProp) {
        let scope = self.current();
        self.with_mode(Mode::Declare(scope), |v| param.visit_children_with(v));
    }

    fn visit_fn_decl(&mut self, decl: &FnDecl) {
        let scope = self.current();
        self.with_mode(Mode::Declare(scope), |v| decl.visit_children_with(v));
    }

    fn visit_class_decl(&mut self, decl: &ClassDecl) {
        let scope = self.current();
        self.with_mode(Mode::Declare(scope), |v| decl.visit_children_with(v));
    }

    fn visit_fn_expr(&mut self, expr: &FnExpr) {
        // The name of a function expression is visible only inside it.
        self.reading(|v| {
            v.in_scope(ScopeKind::Function, |v, scope| {
                v.with_mode(Mode::Declare(scope), |v| expr.ident.visit_with(v));
                (*expr.function).visit_children_with(v);
            })
        });
    }

    fn visit_class_expr(&mut self, expr: &ClassExpr) {
        self.reading(|v| {
            v.in_scope(ScopeKind::Class, |v, scope| {
                v.with_mode(Mode::Declare(scope), |v| expr.ident.visit_with(v));
                (*expr.class).visit_children_with(v);
            })
        });
    }

    // ---------- modules ----------

    fn visit_export_default_decl(&mut self, decl: &ExportDefaultDecl) {
        // `export default function f() {}` also binds `f` in the unit.
        let name = match &decl.decl {
            DefaultDecl::Fn(f) => f.ident.as_ref(),
            DefaultDecl::Class(c) => c.ident.as_ref(),
            DefaultDecl::TsInterfaceDecl(_) => None,
        };
        if let Some(name) = name {
            let root = self.scopes.root();
            self.scopes.declare(root, name.sym.to_string());
        }
        decl.visit_children_with(self);
    }

    fn visit_import_named_specifier(&mut self, spec: &ImportNamedSpecifier) {
        let root = self.scopes.root();
        self.with_mode(Mode::Declare(root), |v| spec.local.visit_with(v));
        self.with_mode(Mode::Ignore, |v| spec.imported.visit_with(v));
    }

    fn visit_import_default_specifier(&mut self, spec: &ImportDefaultSpecifier) {
        let root = self.scopes.root();
        self.with_mode(Mode::Declare(root), |v| spec.visit_children_with(v));
    }

    fn visit_import_star_as_specifier(&mut self, spec: &ImportStarAsSpecifier) {
        let root = self.scopes.root();
        self.with_mode(Mode::Declare(root), |v| spec.visit_children_with(v));
    }

    fn visit_named_export(&mut self, export: &NamedExport) {
        if export.src.is_some() {
            // `export { a } from "x"` never touches a local binding.
            self.with_mode(Mode::Ignore, |v| export.visit_children_with(v));
        } else {
            self.reading(|v| export.visit_children_with(v));
        }
    }

    fn visit_export_named_specifier(&mut self, spec: &ExportNamedSpecifier) {
        spec.orig.visit_with(self);
        self.with_mode(Mode::Ignore, |v| spec.exported.visit_with(v));
    }

    fn visit_export_namespace_specifier(&mut self, spec: &ExportNamespaceSpecifier) {
        self.with_mode(Mode::Ignore, |v| spec.visit_children_with(v));
    }

    fn visit_export_default_specifier(&mut self, spec: &ExportDefaultSpecifier) {
        self.with_mode(Mode::Ignore, |v| spec.visit_children_with(v));
    }

    // ---------- names that are not references ----------

    fn visit_labeled_stmt(&mut self, stmt: &LabeledStmt) {
        self.with_mode(Mode::Ignore, |v| stmt.label.visit_with(v));
        stmt.body.visit_with(self);
    }

    fn visit_break_stmt(&mut self, stmt: &BreakStmt) {
        self.with_mode(Mode::Ignore, |v| stmt.visit_children_with(v));
    }

    fn visit_continue_stmt(&mut self, stmt: &ContinueStmt) {
        self.with_mode(Mode::Ignore, |v| stmt.visit_children_with(v));
    }

    fn visit_jsx_element_name(&mut self, name: &JSXElementName) {
        self.with_mode(Mode::Ignore, |v| name.visit_children_with(v));
    }

    // ---------- TypeScript ----------

    fn visit_ts_type(&mut self, ty: &TsType) {
        self.with_mode(Mode::Ignore, |v| ty.visit_children_with(v));
    }

    fn visit_ts_type_ann(&mut self, ann: &TsTypeAnn) {
        self.with_mode(Mode::Ignore, |v| ann.visit_children_with(v));
    }

    fn visit_ts_type_param_decl(&mut self, decl: &TsTypeParamDecl) {
        self.with_mode(Mode::Ignore, |v| decl.visit_children_with(v));
    }

    fn visit_ts_type_param_instantiation(&mut self, inst: &TsTypeParamInstantiation) {
        self.with_mode(Mode::Ignore, |v| inst.visit_children_with(v));
    }

    fn visit_ts_expr_with_type_args(&mut self, expr: &TsExprWithTypeArgs) {
        self.with_mode(Mode::Ignore, |v| expr.visit_children_with(v));
    }

    fn visit_ts_interface_decl(&mut self, decl: &TsInterfaceDecl) {
        self.with_mode(Mode::Ignore, |v| decl.visit_children_with(v));
    }

    fn visit_ts_type_alias_decl(&mut self, decl: &TsTypeAliasDecl) {
        self.with_mode(Mode::Ignore, |v| decl.visit_children_with(v));
    }

    fn visit_ts_enum_decl(&mut self, decl: &TsEnumDecl) {
        let scope = self.current();
        self.with_mode(Mode::Declare(scope), |v| decl.id.visit_with(v));
        decl.members.visit_with(self);
    }

    fn visit_ts_enum_member_id(&mut self, id: &TsEnumMemberId) {
        self.with_mode(Mode::Ignore, |v| id.visit_children_with(v));
    }

    fn visit_ts_module_decl(&mut self, decl: &TsModuleDecl) {
        let scope = self.current();
        self.with_mode(Mode::Declare(scope), |v| decl.id.visit_with(v));
        self.in_scope(ScopeKind::Function, |v, _| decl.body.visit_with(v));
    }

    fn visit_ts_import_equals_decl(&mut self, decl: &TsImportEqualsDecl) {
        let scope = self.current();
        self.with_mode(Mode::Declare(scope), |v| decl.id.visit_with(v));
        self.with_mode(Mode::Ignore, |v| decl.module_ref.visit_with(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swc_core::common::{sync::Lrc, FileName, SourceMap};
    use swc_core::ecma::parser::{parse_file_as_program, Syntax, TsSyntax};

    fn parse(src: &str) -> Program {
        let cm: Lrc<SourceMap> = Default::default();
        let fm = cm.new_source_file(FileName::Anon.into(), src.to_string());
        let mut errors = vec![];
        parse_file_as_program(
            &fm,
            Syntax::Typescript(TsSyntax {
                tsx: true,
                ..Default::default()
            }),
            Default::default(),
            None,
            &mut errors,
        )
        .unwrap()
    }

    fn reads(src: &str, name: &str) -> Vec<Reference> {
        analyze(&parse(src))
            .references
            .into_iter()
            .filter(|r| &*r.sym == name)
            .collect()
    }

    fn free_reads(src: &str, name: &str) -> usize {
        let analysis = analyze(&parse(src));
        analysis
            .references
            .iter()
            .filter(|r| &*r.sym == name && !analysis.scopes.has_binding(r.scope, name))
            .count()
    }

    #[test]
    fn member_props_and_keys_are_not_reads() {
        let src = "a.Buffer; ({ Buffer: 1 }); class C { Buffer() {} }";
        assert!(reads(src, "Buffer").is_empty());
    }

    #[test]
    fn shorthand_and_computed_keys_are_reads() {
        assert_eq!(reads("({ Buffer }); ({ [Buffer]: 1 });", "Buffer").len(), 2);
    }

    #[test]
    fn hoisted_var_shadows_earlier_use() {
        assert_eq!(free_reads("Buffer.from(x); var Buffer = 1;", "Buffer"), 0);
        assert_eq!(
            free_reads("function f() { Buffer(); { var Buffer; } } Buffer();", "Buffer"),
            1
        );
    }

    #[test]
    fn let_is_block_scoped() {
        assert_eq!(free_reads("{ let process = 1; process; } process;", "process"), 1);
    }

    #[test]
    fn params_and_catch_bind_locally() {
        let src = "function f(Buffer) { Buffer; } (Buffer) => Buffer; \
                   try {} catch (Buffer) { Buffer; } Buffer;";
        assert_eq!(free_reads(src, "Buffer"), 1);
    }

    #[test]
    fn default_values_in_patterns_are_reads() {
        let src = "function f(a = Buffer, { b = Buffer, [Buffer]: c } = {}) {}";
        assert_eq!(free_reads(src, "Buffer"), 3);
    }

    #[test]
    fn function_expression_name_is_local() {
        assert_eq!(
            free_reads("(function process() { process; }); process;", "process"),
            1
        );
        assert_eq!(free_reads("function process() {} process;", "process"), 0);
    }

    #[test]
    fn imports_bind_at_unit_level() {
        let src = "import { Buffer } from 'buffer'; Buffer.from('x');";
        assert_eq!(free_reads(src, "Buffer"), 0);
        let src = "import { Buffer as B } from 'buffer'; Buffer.from('x');";
        assert_eq!(free_reads(src, "Buffer"), 1);
    }

    #[test]
    fn assignment_targets_are_writes() {
        let src = "Buffer = 1; [process] = xs; ({ setImmediate } = t); \
                   for (setTimeout of xs) {} for (clearTimeout in o) {}";
        for name in ["Buffer", "process", "setImmediate", "setTimeout", "clearTimeout"] {
            assert!(reads(src, name).is_empty(), "{name} was read");
        }
        // Writes bind nothing either.
        assert_eq!(free_reads("Buffer = 1; Buffer;", "Buffer"), 1);
    }

    #[test]
    fn reads_nested_in_assignment_targets_stay_reads() {
        let src = "Buffer.x = 1; a[Buffer] = 1; [a = Buffer] = xs; ({ [Buffer]: b } = o); \
                   ({ c = Buffer } = o); Buffer += 1; x = Buffer;";
        assert_eq!(reads(src, "Buffer").len(), 6);
    }

    #[test]
    fn labels_jsx_tags_and_types_are_ignored() {
        let src = "Buffer: for (;;) { break Buffer; } <Buffer.Thing />; \
                   let x: Buffer = y as Buffer; interface I extends Buffer {}";
        assert!(reads(src, "Buffer").is_empty());
    }

    #[test]
    fn export_aliases_are_not_reads() {
        let src = "export { a as Buffer }; export { Buffer } from 'buffer';";
        assert!(reads(src, "Buffer").is_empty());
        assert_eq!(reads("export { Buffer };", "Buffer").len(), 1);
    }

    #[test]
    fn resolve_reports_declaring_scope() {
        let analysis = analyze(&parse("var a; function f() { let a; a; }"));
        let r = analysis.references.iter().find(|r| &*r.sym == "a").unwrap();
        let declaring = analysis.scopes.resolve(r.scope, "a").unwrap();
        assert_ne!(declaring, analysis.scopes.root());
        assert_eq!(analysis.scopes.get(declaring).kind, ScopeKind::Block);
    }

    #[test]
    fn handles_count_every_ident() {
        let analysis = analyze(&parse("var a = b; label: c;"));
        assert_eq!(analysis.ident_count, 4);
        let handles: Vec<u32> = analysis.references.iter().map(|r| r.handle.0).collect();
        assert_eq!(handles, vec![1, 3]);
    }
}
