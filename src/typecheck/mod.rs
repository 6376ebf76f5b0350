//! Type checker (C4, spec.md §4.3).
//!
//! Grounded on `original_source/src/libscc/typechecker/TypeChecker.cpp`'s
//! visitor dispatch (`TypeChecker::visit*`), restated as ordinary `match`
//! dispatch over the closed `ExprKind`/`StmtKind`/`DeclKind` enums instead
//! of a virtual `TreeNode::accept` double-dispatch. Split the way the
//! original splits into `Expressions.cpp`/`Procedures.cpp`/`Templates.cpp`:
//! this file holds declaration/statement checking and the shared `fail*`
//! helpers, `expr.rs` holds expression checking, `overload.rs` holds
//! candidate ranking, `resolve_type.rs` holds syntactic-type resolution.

pub mod expr;
pub mod options;
pub mod overload;
pub mod resolve_type;

use std::collections::{HashMap, HashSet};

use crate::ast::{Ast, DeclKind, NodeId, OperatorName, StmtKind};
use crate::diagnostics::CompileLog;
use crate::error::{CompileError, SemanticError, Status, TemplateError};
use crate::instantiate::{Instantiator, PendingInstance};
use crate::symbol::{
    OperatorCapability, ProcedureSymbol, Quantifier, StructSymbol, Symbol, SymbolCategory, SymbolId, SymbolTable,
    TemplateKind, TemplateSymbol, VariableSymbol,
};
use crate::types::data::DataType;
use crate::types::Type;

pub use options::TypeCheckOptions;

/// Holds every piece of mutable state one type-checking run threads
/// through the AST explicitly (SPEC_FULL.md Design Notes: "global mutable
/// state becomes a `Context` value passed explicitly").
pub struct TypeChecker<'a> {
    pub ast: &'a mut Ast,
    pub symtab: &'a mut SymbolTable,
    pub log: &'a mut CompileLog,
    pub instantiator: &'a mut Instantiator,
    pub options: TypeCheckOptions,
    error_count: usize,
    /// Resolved callee for each `Call`/operator/cast expression node, so
    /// code generation knows which procedure symbol to invoke without
    /// redoing overload resolution (spec.md §4.5 needs the chosen
    /// candidate, not just its type).
    pub call_targets: HashMap<NodeId, SymbolId>,
    /// The `SymbolId` `declare_overload` assigned to each ordinary (non-
    /// template) `Proc`/`Operator`/`Cast` declaration node, keyed by that
    /// node's id. Code generation walks the same declaration tree and needs
    /// this to label each lowered procedure's `ProcBoundary` with the exact
    /// symbol `call_targets` resolves calls to; template instances don't
    /// need an entry here since `PendingInstance::proc_symbol` already
    /// carries it.
    pub proc_symbols: HashMap<NodeId, SymbolId>,
    /// The `SymbolId` each `DeclKind::Var` node declared, keyed by that
    /// node's id. Variable uses are already resolved to a `SymbolId` inside
    /// `ExprKind::Variable` by the time a body is checked, but the
    /// declaration site itself has nothing else linking the AST node back
    /// to the symbol it created; code generation needs that link to emit
    /// `DECLARE` at the right place without re-walking the scope chain.
    pub var_symbols: HashMap<NodeId, SymbolId>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(
        ast: &'a mut Ast,
        symtab: &'a mut SymbolTable,
        log: &'a mut CompileLog,
        instantiator: &'a mut Instantiator,
        options: TypeCheckOptions,
    ) -> Self {
        TypeChecker {
            ast,
            symtab,
            log,
            instantiator,
            options,
            error_count: 0,
            call_targets: HashMap::new(),
            proc_symbols: HashMap::new(),
            var_symbols: HashMap::new(),
        }
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    fn record_error(&mut self) -> Status {
        self.error_count += 1;
        match self.options.max_errors {
            Some(max) if self.error_count >= max => Status::ErrorFatal,
            _ => Status::ErrorContinue,
        }
    }

    /// Reports `err` at `id`'s location and returns a recovery type
    /// (`void`) so the caller can keep walking sibling subtrees (spec.md §7
    /// "sibling subtrees may still be processed").
    fn fail(&mut self, id: NodeId, err: SemanticError, _status: Status) -> Type {
        let loc = self.ast.get(id).location.clone();
        self.log.error(loc, err.to_string());
        self.record_error();
        Type::void()
    }

    fn fail_compile(&mut self, id: NodeId, err: CompileError) -> Type {
        let loc = self.ast.get(id).location.clone();
        self.log.error(loc, err.to_string());
        self.record_error();
        Type::void()
    }

    fn fail_stmt(&mut self, id: NodeId, err: SemanticError) -> Status {
        let loc = self.ast.get(id).location.clone();
        self.log.error(loc, err.to_string());
        self.record_error()
    }

    /// Checks every item of the module rooted at `root`, then drains the
    /// template instantiation worklist (spec.md §4.4: "the compiler
    /// repeatedly drains the worklist, checking and lowering each clone").
    /// Code generation is a separate pass (C6); this only type-checks the
    /// drained bodies so later lowering sees fully annotated ASTs.
    pub fn check_module(&mut self, root: NodeId) -> Status {
        let mut status = self.check_decl(root);
        status = status.join(self.drain_pending_instances());
        status
    }

    /// Type-checks every instance the instantiator has queued, including
    /// ones discovered transitively while checking earlier instances
    /// (spec.md §4.4 "new worklist items may be added transitively").
    pub fn drain_pending_instances(&mut self) -> Status {
        let mut status = Status::Ok;
        while let Some(pending) = self.instantiator.drain_next() {
            let ast = &mut *self.ast;
            let log = &mut *self.log;
            let instantiator = &mut *self.instantiator;
            let options = self.options;
            let mut call_targets = HashMap::new();
            let mut proc_symbols = HashMap::new();
            let mut var_symbols = HashMap::new();
            let guard_status = self.symtab.with_scope(pending.scope, |symtab| {
                let mut inner = TypeChecker {
                    ast,
                    symtab,
                    log,
                    instantiator,
                    options,
                    error_count: 0,
                    call_targets: HashMap::new(),
                    proc_symbols: HashMap::new(),
                    var_symbols: HashMap::new(),
                };
                let status = inner.check_instance_body(&pending);
                call_targets = inner.call_targets;
                proc_symbols = inner.proc_symbols;
                var_symbols = inner.var_symbols;
                status
            });
            self.call_targets.extend(call_targets);
            self.proc_symbols.extend(proc_symbols);
            self.var_symbols.extend(var_symbols);
            status = status.join(guard_status);
            if status.is_fatal() {
                break;
            }
        }
        status
    }

    /// Type-checks a template instance's cloned body in place, filling in
    /// the `proc_symbol` the instantiator already registered rather than
    /// declaring a second, disconnected overload the way `check_decl`
    /// would (`PendingInstance::param_types`/`ret_type` are already
    /// concrete, resolved at the call site, so no syntactic `TypeExpr`
    /// resolution is needed here).
    fn check_instance_body(&mut self, pending: &PendingInstance) -> Status {
        let inner_kind = self.ast.decl(pending.body).clone();
        let (params, stmt_body) = match inner_kind {
            DeclKind::Proc { params, body, .. } => (params, body),
            DeclKind::Operator { params, body, .. } => (params, body),
            DeclKind::Cast { from, param, body, .. } => (vec![crate::ast::Param { name: param, ty: from }], body),
            other => {
                return self.fail_compile_stmt(pending.body, CompileError::Ice(format!("instance body has unexpected shape: {other:?}")))
            }
        };

        let guard = self.symtab.enter_scope();
        let mut param_syms = Vec::with_capacity(params.len());
        for (p, ty) in params.iter().zip(pending.param_types.iter()) {
            let declared = self.symtab.declare(SymbolCategory::Variable, &p.name, |sym_id| {
                Symbol::Variable(VariableSymbol {
                    id: sym_id,
                    name: p.name.clone(),
                    ty: *ty,
                    storage: crate::symbol::Storage::Local,
                    parent: None,
                    dims: Vec::new(),
                    size: None,
                    fields: Vec::new(),
                })
            });
            match declared {
                Ok(pid) => param_syms.push(pid),
                Err(e) => {
                    guard.exit(self.symtab);
                    return self.fail_compile_stmt(pending.body, e);
                }
            }
        }

        let status = self.check_stmt(stmt_body);
        guard.exit(self.symtab);

        if let Symbol::Procedure(p) = self.symtab.get_mut(pending.proc_symbol) {
            p.params = param_syms;
        }
        status
    }

    pub fn check_decl(&mut self, id: NodeId) -> Status {
        let kind = self.ast.decl(id).clone();
        match kind {
            DeclKind::Module { items, .. } => {
                let mut status = Status::Ok;
                for item in items {
                    status = status.join(self.check_decl(item));
                    if status.is_fatal() {
                        break;
                    }
                }
                status
            }
            DeclKind::Kind { name, admitted } => self.check_kind(id, &name, &admitted),
            DeclKind::Domain { name, kind } => self.check_domain(id, &name, &kind),
            DeclKind::Struct { name, fields } => self.check_struct(id, &name, &fields),
            DeclKind::Var { name, ty, dims, init } => self.check_var_decl(id, &name, &ty, &dims, init),
            DeclKind::Proc { name, params, ret, body } => self.check_proc(id, &name, &params, &ret, body, None),
            DeclKind::Operator { op, params, ret, body } => self.check_operator(id, op, &params, &ret, body),
            DeclKind::Cast { from, to, param, body } => self.check_cast_decl(id, &from, &to, &param, body),
            DeclKind::Template { quantifiers, inner } => self.check_template(id, &quantifiers, inner),
        }
    }

    fn check_kind(&mut self, id: NodeId, name: &str, admitted: &[String]) -> Status {
        let mut admitted_types = Vec::with_capacity(admitted.len());
        for data_name in admitted {
            match resolve_type::resolve_data_name(self.symtab, data_name) {
                Some(d) => admitted_types.push(d),
                None => return self.fail_stmt(id, SemanticError::UndefinedName(data_name.clone())),
            }
        }
        let result = self.symtab.declare(SymbolCategory::Kind, name, |sym_id| {
            Symbol::Kind(crate::types::security::KindDef { id: sym_id, name: name.to_string(), admitted: admitted_types })
        });
        match result {
            Ok(_) => Status::Ok,
            Err(e) => self.fail_compile_stmt(id, e),
        }
    }

    fn check_domain(&mut self, id: NodeId, name: &str, kind: &str) -> Status {
        let Some(kind_id) = self.symtab.find(SymbolCategory::Kind, kind) else {
            return self.fail_stmt(id, SemanticError::UndefinedName(kind.to_string()));
        };
        let result = self.symtab.declare(SymbolCategory::Domain, name, |sym_id| {
            Symbol::Domain(crate::types::security::DomainDef { id: sym_id, name: name.to_string(), kind: kind_id })
        });
        match result {
            Ok(_) => Status::Ok,
            Err(e) => self.fail_compile_stmt(id, e),
        }
    }

    fn check_struct(&mut self, id: NodeId, name: &str, fields: &[crate::ast::Param]) -> Status {
        let field_scope = self.symtab.create_scope(self.symtab.current_scope());
        let mut field_syms = Vec::with_capacity(fields.len());
        let loc = self.ast.get(id).location.clone();
        for field in fields {
            let pattern = match resolve_type::resolve_type_expr(self.symtab, &field.ty, None, &loc) {
                Ok(p) => p,
                Err(e) => return self.fail_compile_stmt(id, e),
            };
            let Some(ty) = pattern.as_concrete() else {
                return self.fail_stmt(id, SemanticError::TypeMismatch { expected: "concrete field type".into(), found: field.name.clone() });
            };
            let field_id = self.symtab.declare_in(field_scope, SymbolCategory::Variable, &field.name, |sym_id| {
                Symbol::Variable(VariableSymbol {
                    id: sym_id,
                    name: field.name.clone(),
                    ty,
                    storage: crate::symbol::Storage::Local,
                    parent: None,
                    dims: Vec::new(),
                    size: None,
                    fields: Vec::new(),
                })
            });
            match field_id {
                Ok(fid) => field_syms.push((field.name.clone(), fid)),
                Err(e) => return self.fail_compile_stmt(id, e),
            }
        }
        let result = self.symtab.declare(SymbolCategory::Struct, name, |sym_id| {
            Symbol::Struct(StructSymbol { id: sym_id, name: name.to_string(), fields: field_syms })
        });
        match result {
            Ok(_) => Status::Ok,
            Err(e) => self.fail_compile_stmt(id, e),
        }
    }

    fn check_var_decl(
        &mut self,
        id: NodeId,
        name: &str,
        ty: &crate::ast::TypeExpr,
        dims: &[NodeId],
        init: Option<NodeId>,
    ) -> Status {
        let loc = self.ast.get(id).location.clone();
        let pattern = match resolve_type::resolve_type_expr(self.symtab, ty, None, &loc) {
            Ok(p) => p,
            Err(e) => return self.fail_compile_stmt(id, e),
        };
        let Some(declared) = pattern.as_concrete() else {
            return self.fail_stmt(id, SemanticError::TypeMismatch { expected: "concrete variable type".into(), found: name.to_string() });
        };
        for &d in dims {
            self.check_expr(d);
        }
        let full_ty = Type::new(declared.security(), declared.data().clone(), dims.len() as u32);
        self.ast.set_secrec_type(id, full_ty);

        let mut status = Status::Ok;
        if let Some(init_id) = init {
            let source = self.check_expr(init_id);
            let checked = self.check_assignable_public(id, full_ty, init_id, source);
            if checked.is_void() && !full_ty.is_void() {
                status = Status::ErrorContinue;
            }
        }

        let storage = if self.symtab.current_scope() == self.symtab.global_scope() {
            crate::symbol::Storage::Global
        } else {
            crate::symbol::Storage::Local
        };
        let declare_result = self.symtab.declare(SymbolCategory::Variable, name, |sym_id| {
            Symbol::Variable(VariableSymbol {
                id: sym_id,
                name: name.to_string(),
                ty: full_ty,
                storage,
                parent: None,
                dims: Vec::new(),
                size: None,
                fields: Vec::new(),
            })
        });
        match declare_result {
            Ok(sym_id) => {
                self.var_symbols.insert(id, sym_id);
            }
            Err(e) => {
                status = status.join(self.fail_compile_stmt(id, e));
            }
        }
        status
    }

    /// `expr.rs`'s `check_assignable` operates on two expression nodes;
    /// this variant is used where the target type comes from a
    /// declaration rather than an lvalue expression.
    fn check_assignable_public(&mut self, id: NodeId, target: Type, value: NodeId, source: Type) -> Type {
        self.check_assignable(id, value, target, value, source)
    }

    fn check_proc(
        &mut self,
        id: NodeId,
        name: &str,
        params: &[crate::ast::Param],
        ret: &crate::ast::TypeExpr,
        body: NodeId,
        operator: Option<OperatorCapability>,
    ) -> Status {
        let loc = self.ast.get(id).location.clone();
        let ret_pattern = match resolve_type::resolve_type_expr(self.symtab, ret, None, &loc) {
            Ok(p) => p,
            Err(e) => return self.fail_compile_stmt(id, e),
        };
        let Some(ret_ty) = ret_pattern.as_concrete() else {
            return self.fail_stmt(id, SemanticError::TypeMismatch { expected: "concrete return type".into(), found: name.to_string() });
        };

        let guard = self.symtab.enter_scope();
        let mut param_syms = Vec::with_capacity(params.len());
        for p in params {
            let pattern = match resolve_type::resolve_type_expr(self.symtab, &p.ty, None, &loc) {
                Ok(pat) => pat,
                Err(e) => {
                    guard.exit(self.symtab);
                    return self.fail_compile_stmt(id, e);
                }
            };
            let Some(pty) = pattern.as_concrete() else {
                guard.exit(self.symtab);
                return self.fail_stmt(id, SemanticError::TypeMismatch { expected: "concrete parameter type".into(), found: p.name.clone() });
            };
            let declared = self.symtab.declare(SymbolCategory::Variable, &p.name, |sym_id| {
                Symbol::Variable(VariableSymbol {
                    id: sym_id,
                    name: p.name.clone(),
                    ty: pty,
                    storage: crate::symbol::Storage::Local,
                    parent: None,
                    dims: Vec::new(),
                    size: None,
                    fields: Vec::new(),
                })
            });
            match declared {
                Ok(pid) => param_syms.push(pid),
                Err(e) => {
                    guard.exit(self.symtab);
                    return self.fail_compile_stmt(id, e);
                }
            }
        }

        let status = self.check_stmt(body);
        guard.exit(self.symtab);

        let proc_id = self.symtab.declare_overload(SymbolCategory::Procedure, name, |sym_id| {
            Symbol::Procedure(ProcedureSymbol { id: sym_id, name: name.to_string(), params: param_syms, ret: ret_ty, operator })
        });
        self.proc_symbols.insert(id, proc_id);
        status
    }

    fn check_operator(
        &mut self,
        id: NodeId,
        op: OperatorName,
        params: &[crate::ast::Param],
        ret: &crate::ast::TypeExpr,
        body: NodeId,
    ) -> Status {
        let capability = match op {
            OperatorName::Binary(b) => OperatorCapability::BinaryOperator(b),
            OperatorName::Unary(u) => OperatorCapability::UnaryOperator(u),
        };
        let synthetic_name = match op {
            OperatorName::Binary(b) => format!("operator{b:?}"),
            OperatorName::Unary(u) => format!("operator{u:?}"),
        };
        self.check_proc(id, &synthetic_name, params, ret, body, Some(capability))
    }

    fn check_cast_decl(
        &mut self,
        id: NodeId,
        from: &crate::ast::TypeExpr,
        to: &crate::ast::TypeExpr,
        param: &str,
        body: NodeId,
    ) -> Status {
        let params = [crate::ast::Param { name: param.to_string(), ty: from.clone() }];
        self.check_proc(id, "cast", &params, to, body, Some(OperatorCapability::Cast))
    }

    fn check_template(&mut self, id: NodeId, quantifiers: &[crate::ast::QuantifierDecl], inner: NodeId) -> Status {
        let mut seen = HashSet::new();
        for q in quantifiers {
            if !seen.insert(q.name.clone()) {
                return self.fail_compile_stmt(
                    id,
                    CompileError::template(TemplateError::ShadowedQuantifier(q.name.clone()), self.ast.get(id).location.clone()),
                );
            }
        }

        let inner_kind = self.ast.decl(inner).clone();
        let (name, used_names, template_kind) = match &inner_kind {
            DeclKind::Proc { name, params, ret, .. } => {
                (name.clone(), collect_type_names(params, ret), TemplateKind::Procedure)
            }
            DeclKind::Operator { op, params, ret, .. } => {
                if quantifiers.iter().any(|q| q.kind == crate::types::TypeArgKind::Dim) {
                    return self.fail_compile_stmt(
                        id,
                        CompileError::template(TemplateError::OperatorTemplateHasDimVariable, self.ast.get(id).location.clone()),
                    );
                }
                if params.len() == 2 {
                    if let (Some(l), Some(r)) = (resolve_type::primitive_type_name(&params[0].ty.data), resolve_type::primitive_type_name(&params[1].ty.data)) {
                        if l == r && ret.data != params[0].ty.data {
                            return self.fail_compile_stmt(
                                id,
                                CompileError::template(TemplateError::OperatorReturnTypeNotJoin, self.ast.get(id).location.clone()),
                            );
                        }
                    }
                }
                let name = match op {
                    OperatorName::Binary(b) => format!("operator{b:?}"),
                    OperatorName::Unary(u) => format!("operator{u:?}"),
                };
                (name, collect_type_names(params, ret), TemplateKind::Operator)
            }
            DeclKind::Cast { from, to, param, .. } => {
                if quantifiers.iter().any(|q| q.kind == crate::types::TypeArgKind::Dim) {
                    return self.fail_compile_stmt(
                        id,
                        CompileError::template(TemplateError::CastTemplateBadDimensionality, self.ast.get(id).location.clone()),
                    );
                }
                let params = [crate::ast::Param { name: param.clone(), ty: from.clone() }];
                (
                    "cast".to_string(),
                    collect_type_names(&params, to),
                    TemplateKind::Cast,
                )
            }
            other => {
                return self.fail_compile_stmt(id, CompileError::Ice(format!("template wraps unexpected node: {other:?}")));
            }
        };

        for q in quantifiers {
            if !used_names.contains(&q.name) {
                return self.fail_compile_stmt(
                    id,
                    CompileError::template(TemplateError::UnusedTypeVariable(q.name.clone()), self.ast.get(id).location.clone()),
                );
            }
        }

        let declaring_scope = self.symtab.current_scope();
        let mut quantifier_syms = Vec::with_capacity(quantifiers.len());
        for q in quantifiers {
            let sym = self.symtab.declare_overload(SymbolCategory::DimTypeVar, &q.name, |sym_id| match q.kind {
                crate::types::TypeArgKind::Dim => Symbol::DimTypeVar { id: sym_id, name: q.name.clone() },
                _ => Symbol::DimTypeVar { id: sym_id, name: q.name.clone() },
            });
            quantifier_syms.push(Quantifier { name_symbol: sym, kind: q.kind, constrained: q.constrained.is_some() });
        }

        let template_id = self.symtab.declare_overload(SymbolCategory::Template, &name, |sym_id| {
            Symbol::Template(TemplateSymbol {
                id: sym_id,
                name: name.clone(),
                kind: template_kind,
                quantifiers: quantifier_syms,
                declaring_scope,
                body: inner,
            })
        });
        let _ = template_id;
        Status::Ok
    }

    fn fail_compile_stmt(&mut self, id: NodeId, err: CompileError) -> Status {
        let loc = self.ast.get(id).location.clone();
        self.log.error(loc, err.to_string());
        self.record_error()
    }

    pub fn check_stmt(&mut self, id: NodeId) -> Status {
        let kind = self.ast.stmt(id).clone();
        match kind {
            StmtKind::If { cond, then_branch, else_branch } => {
                let c = self.check_expr(cond);
                let mut status = if c.data() == &DataType::Primitive(crate::types::data::PrimitiveType::Bool) && c.is_public() {
                    Status::Ok
                } else {
                    self.fail_stmt(id, SemanticError::NonScalarInScalarContext)
                };
                status = status.join(self.check_stmt(then_branch));
                if let Some(e) = else_branch {
                    status = status.join(self.check_stmt(e));
                }
                status
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                self.check_expr(cond);
                self.check_stmt(body)
            }
            StmtKind::For { init, cond, step, body } => {
                if let Some(i) = init {
                    self.check_stmt_or_decl(i);
                }
                if let Some(c) = cond {
                    self.check_expr(c);
                }
                if let Some(s) = step {
                    self.check_expr(s);
                }
                self.check_stmt(body)
            }
            StmtKind::Compound(stmts) => {
                let guard = self.symtab.enter_scope();
                let mut status = Status::Ok;
                for s in stmts {
                    status = status.join(self.check_stmt(s));
                    if status.is_fatal() {
                        break;
                    }
                }
                guard.exit(self.symtab);
                status
            }
            StmtKind::Break | StmtKind::Continue => Status::Ok,
            StmtKind::Return(value) => {
                if let Some(v) = value {
                    self.check_expr(v);
                }
                Status::Ok
            }
            StmtKind::Decl(decl_id) => self.check_decl(decl_id),
            StmtKind::Assert(e) => {
                let t = self.check_expr(e);
                if t.data() == &DataType::Primitive(crate::types::data::PrimitiveType::Bool) && t.is_public() {
                    Status::Ok
                } else {
                    self.fail_stmt(id, SemanticError::NonScalarInScalarContext)
                }
            }
            StmtKind::Expr(e) => {
                self.check_expr(e);
                Status::Ok
            }
            StmtKind::Print(args) => {
                for a in args {
                    self.check_expr(a);
                }
                Status::Ok
            }
            StmtKind::Syscall { args, .. } => {
                for a in args {
                    let e = match a {
                        crate::ast::SyscallArg::Return(e)
                        | crate::ast::SyscallArg::Push(e)
                        | crate::ast::SyscallArg::PushCRef(e) => e,
                        crate::ast::SyscallArg::PushRef { value, .. } => value,
                    };
                    self.check_expr(e);
                }
                Status::Ok
            }
        }
    }

    /// A `for`-init clause may be either an expression or a local
    /// declaration statement; both are valid `StmtKind` nodes, so this
    /// just dispatches to `check_stmt`.
    fn check_stmt_or_decl(&mut self, id: NodeId) -> Status {
        self.check_stmt(id)
    }
}

fn collect_type_names(params: &[crate::ast::Param], ret: &crate::ast::TypeExpr) -> HashSet<String> {
    let mut names = HashSet::new();
    for p in params {
        collect_one(&p.ty, &mut names);
    }
    collect_one(ret, &mut names);
    names
}

fn collect_one(ty: &crate::ast::TypeExpr, names: &mut HashSet<String>) {
    if let crate::ast::SecurityExpr::Named(n) = &ty.security {
        names.insert(n.clone());
    }
    names.insert(ty.data.clone());
    if let crate::ast::DimExpr::Variable(n) = &ty.dim {
        names.insert(n.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DimExpr, Literal as AstLiteral, NodeKind, Param, SecurityExpr, TypeExpr};
    use crate::location::SourceLocation;

    fn setup() -> (Ast, SymbolTable, CompileLog, Instantiator) {
        (Ast::new(), SymbolTable::new(), CompileLog::new(), Instantiator::new())
    }

    #[test]
    fn literal_declaration_checks_and_declares_variable() {
        let (mut ast, mut symtab, mut log, mut inst) = setup();
        let lit = ast.alloc(SourceLocation::synthetic(), NodeKind::Expr(crate::ast::ExprKind::Literal(AstLiteral::Int(3))));
        let decl = ast.alloc(
            SourceLocation::synthetic(),
            NodeKind::Decl(DeclKind::Var { name: "x".to_string(), ty: TypeExpr::scalar_public("int32"), dims: vec![], init: Some(lit) }),
        );
        let mut checker = TypeChecker::new(&mut ast, &mut symtab, &mut log, &mut inst, TypeCheckOptions::default());
        let status = checker.check_decl(decl);
        assert!(status.is_ok());
        assert!(symtab.find(SymbolCategory::Variable, "x").is_some());
        assert!(!log.has_errors());
    }

    #[test]
    fn undefined_domain_in_declaration_is_reported() {
        let (mut ast, mut symtab, mut log, mut inst) = setup();
        let ty = TypeExpr { security: SecurityExpr::Named("missing".into()), data: "int32".into(), dim: DimExpr::Scalar };
        let decl = ast.alloc(
            SourceLocation::synthetic(),
            NodeKind::Decl(DeclKind::Var { name: "x".to_string(), ty, dims: vec![], init: None }),
        );
        let mut checker = TypeChecker::new(&mut ast, &mut symtab, &mut log, &mut inst, TypeCheckOptions::default());
        let status = checker.check_decl(decl);
        assert!(!status.is_ok());
        assert!(log.has_errors());
    }

    #[test]
    fn classify_is_inserted_when_public_flows_into_private_declaration() {
        let (mut ast, mut symtab, mut log, mut inst) = setup();
        let kind_id = symtab
            .declare(SymbolCategory::Kind, "additive3pp", |id| {
                Symbol::Kind(crate::types::security::KindDef { id, name: "additive3pp".into(), admitted: vec![] })
            })
            .unwrap();
        symtab
            .declare(SymbolCategory::Domain, "priv", |id| {
                Symbol::Domain(crate::types::security::DomainDef { id, name: "priv".into(), kind: kind_id })
            })
            .unwrap();

        let lit = ast.alloc(SourceLocation::synthetic(), NodeKind::Expr(crate::ast::ExprKind::Literal(AstLiteral::Int(3))));
        let ty = TypeExpr { security: SecurityExpr::Named("priv".into()), data: "int32".into(), dim: DimExpr::Scalar };
        let decl = ast.alloc(
            SourceLocation::synthetic(),
            NodeKind::Decl(DeclKind::Var { name: "x".to_string(), ty, dims: vec![], init: Some(lit) }),
        );
        let mut checker = TypeChecker::new(&mut ast, &mut symtab, &mut log, &mut inst, TypeCheckOptions::default());
        let status = checker.check_decl(decl);
        assert!(status.is_ok());
        match ast.get(decl).kind.clone() {
            NodeKind::Decl(DeclKind::Var { init: Some(init_id), .. }) => {
                assert_ne!(init_id, lit, "insert_classify's node should have been spliced into the declaration's init slot");
                assert!(matches!(ast.expr(init_id), crate::ast::ExprKind::Classify(v) if *v == lit));
            }
            _ => panic!("expected a var decl"),
        }
    }
}
