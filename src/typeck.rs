//! Bitwidth-precise structural type checking. Scalar types are reduced to
//! `Ty` (a bitvector or float of known width); widths are threaded through
//! expressions as expectations so literals can be sized and range-checked.

use crate::ast::*;
use crate::cfg::Cfg;
use crate::diagnostics::DiagBag;
use crate::passes::{ModulePass, PassResult};
use crate::types::{self, StructTable};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Ty {
    Bv(u32),
    Fp(u32),
    Unknown,
}

impl Ty {
    pub fn is_bv(&self) -> bool {
        matches!(self, Ty::Bv(_))
    }
    pub fn is_fp(&self) -> bool {
        matches!(self, Ty::Fp(_))
    }
    pub fn bits(&self) -> Option<u32> {
        match self {
            Ty::Bv(w) | Ty::Fp(w) => Some(*w),
            Ty::Unknown => None,
        }
    }
}

/// Per-node scalar types, keyed by node id.
#[derive(Default)]
pub struct TypeAnnotations {
    map: HashMap<NodeId, Ty>,
}

impl TypeAnnotations {
    pub fn record(&mut self, id: NodeId, ty: Ty) {
        self.map.insert(id, ty);
    }
    pub fn get(&self, id: NodeId) -> Option<Ty> {
        self.map.get(&id).copied()
    }
}

struct VarInfo {
    ty:         TypeRef,
    mutable:    bool,
}

struct SymInfo {
    ty:         TypeRef,
}

#[derive(Default)]
pub struct TypeChecker;

impl TypeChecker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModulePass for TypeChecker {
    fn name(&self) -> &'static str {
        "typeck"
    }

    fn run(&mut self, prog: &Program, diags: &mut DiagBag) -> PassResult {
        let structs = StructTable::build(prog);
        for f in &prog.funs {
            let mut ck = FnChecker {
                structs:    &structs,
                vars:       HashMap::new(),
                syms:       HashMap::new(),
                ann:        TypeAnnotations::default(),
                diags:      &mut *diags,
            };
            ck.check_function(f);
        }
        if diags.has_errors() {
            PassResult::Error
        } else {
            PassResult::Success
        }
    }
}

struct FnChecker<'p, 'd> {
    structs:    &'d StructTable<'p>,
    vars:       HashMap<String, VarInfo>,
    syms:       HashMap<String, SymInfo>,
    ann:        TypeAnnotations,
    diags:      &'d mut DiagBag,
}

impl<'p, 'd> FnChecker<'p, 'd> {
    fn scalar_ty(&self, t: &Type) -> Ty {
        if let Some(w) = types::bit_width(t) {
            return Ty::Bv(w);
        }
        if let Some(k) = types::float_kind(t) {
            return Ty::Fp(types::float_bits(k));
        }
        Ty::Unknown
    }

    fn check_function(&mut self, f: &FunDecl) {
        for p in &f.params {
            self.vars.insert(
                p.name.name.clone(),
                VarInfo { ty: p.ty.clone(), mutable: false },
            );
        }
        for s in &f.syms {
            self.syms.insert(s.name.name.clone(), SymInfo { ty: s.ty.clone() });
        }
        for l in &f.lets {
            if self.vars.contains_key(&l.name.name) {
                self.diags.error(format!("Duplicate name: {}", l.name.name), l.span);
            }
            self.vars.insert(
                l.name.name.clone(),
                VarInfo { ty: l.ty.clone(), mutable: l.mutable },
            );
            if let Some(init) = &l.init {
                self.check_init(init, &l.ty);
            }
        }

        // rebuild for the diagnostic picture; label errors surface here
        Cfg::build(f, self.diags);

        let ret_ty = self.scalar_ty(&f.ret);
        if ret_ty == Ty::Unknown {
            self.diags.error("Return type must be a scalar type", f.span);
        }

        for b in &f.blocks {
            for ins in &b.instrs {
                match ins {
                    Instr::Assign(a)    => self.check_assign(a),
                    Instr::Assume(a)    => self.check_cond(&a.cond),
                    Instr::Require(r)   => self.check_cond(&r.cond),
                }
            }
            match &b.term {
                Terminator::CondBr { cond, .. } => self.check_cond(cond),
                Terminator::Ret { value, span } => match value {
                    Some(e) => {
                        if ret_ty != Ty::Unknown {
                            let rt = self.type_of_expr(e, ret_ty.bits());
                            self.require_match(ret_ty, rt, e.span, "return value");
                        }
                    }
                    None => self.diags.error("Missing return value", *span),
                },
                _ => {}
            }
        }
    }

    fn check_assign(&mut self, a: &AssignInstr) {
        if let Some(vi) = self.vars.get(&a.lhs.base.name) {
            if !vi.mutable {
                self.diags.error(
                    format!("Assignment to immutable local: {}", a.lhs.base.name),
                    a.lhs.span,
                );
            }
        }
        let lt = match self.type_of_lvalue(&a.lhs) {
            Some(t) => t,
            None => return,
        };
        let lty = self.scalar_ty(&lt);
        if lty == Ty::Unknown {
            self.diags.error("Assignment to an aggregate lvalue", a.lhs.span);
            return;
        }
        let rt = self.type_of_expr(&a.rhs, lty.bits());
        self.require_match(lty, rt, a.rhs.span, "assignment");
    }

    fn require_match(&mut self, want: Ty, got: Ty, span: SourceSpan, what: &str) {
        match (want, got) {
            (Ty::Bv(a), Ty::Bv(b)) | (Ty::Fp(a), Ty::Fp(b)) => {
                if a != b {
                    self.diags.error(format!("Bitwidth mismatch in {}", what), span);
                }
            }
            (Ty::Bv(_), Ty::Fp(_)) | (Ty::Fp(_), Ty::Bv(_)) => {
                self.diags.error(format!("Operand kind mismatch in {}", what), span);
            }
            _ => {}
        }
    }

    fn type_of_lvalue(&mut self, lv: &LValue) -> Option<TypeRef> {
        let mut cur = match self.vars.get(&lv.base.name) {
            Some(vi) => vi.ty.clone(),
            None => {
                self.diags
                    .error(format!("Undeclared local: {}", lv.base.name), lv.base.span);
                return None;
            }
        };
        for acc in &lv.accesses {
            match acc {
                Access::Index(ai) => {
                    let elem = match types::as_array(&cur) {
                        Some((_, elem)) => elem.clone(),
                        None => {
                            self.diags.error("Indexing non-array", ai.span);
                            return None;
                        }
                    };
                    self.check_index(&ai.index);
                    cur = elem;
                }
                Access::Field(af) => {
                    let sname = match types::as_struct(&cur) {
                        Some(n) => n.to_string(),
                        None => {
                            self.diags.error("Field access on non-struct", af.span);
                            return None;
                        }
                    };
                    if self.structs.get(&sname).is_none() {
                        self.diags
                            .error(format!("Unknown struct type: {}", sname), af.span);
                        return None;
                    }
                    match self.structs.field_type(&sname, &af.field) {
                        Some(ft) => cur = ft.clone(),
                        None => {
                            self.diags.error(
                                format!("Unknown field '{}' in struct {}", af.field, sname),
                                af.span,
                            );
                            return None;
                        }
                    }
                }
            }
        }
        Some(cur)
    }

    fn check_index(&mut self, idx: &Index) {
        match idx {
            Index::Int(_) => {}
            Index::Id(LocalOrSym::Local(lid)) => match self.vars.get(&lid.name) {
                None => self
                    .diags
                    .error(format!("Undeclared local index: {}", lid.name), lid.span),
                Some(vi) => {
                    if types::bit_width(&vi.ty).is_none() {
                        self.diags.error("Non-integer index", lid.span);
                    }
                }
            },
            Index::Id(LocalOrSym::Sym(sid)) => match self.syms.get(&sid.name) {
                None => self
                    .diags
                    .error(format!("Undeclared symbol index: {}", sid.name), sid.span),
                Some(si) => {
                    if types::bit_width(&si.ty).is_none() {
                        self.diags.error("Non-integer symbol index", sid.span);
                    }
                }
            },
        }
    }

    fn check_literal_range(&mut self, value: i64, bits: u32, display: &str, span: SourceSpan) {
        if bits == 0 || bits >= 64 {
            return;
        }
        let lo = -(1i128 << (bits - 1));
        let hi = (1i128 << bits) - 1;
        let v = value as i128;
        if v < lo || v > hi {
            self.diags
                .error(format!("Literal {} out of range for {}", value, display), span);
        }
    }

    fn type_of_coef(&mut self, c: &Coef, expected: Option<u32>) -> Ty {
        match c {
            Coef::Int(lit) => {
                let w = expected.unwrap_or(32);
                self.check_literal_range(lit.value, w, &format!("i{}", w), lit.span);
                Ty::Bv(w)
            }
            Coef::Float(_) => {
                let w = if expected == Some(32) { 32 } else { 64 };
                Ty::Fp(w)
            }
            Coef::Id(LocalOrSym::Local(lid)) => match self.vars.get(&lid.name) {
                None => {
                    self.diags
                        .error(format!("Undeclared local: {}", lid.name), lid.span);
                    Ty::Unknown
                }
                Some(vi) => {
                    let ty = vi.ty.clone();
                    let t = self.scalar_ty(&ty);
                    if t == Ty::Unknown {
                        self.diags
                            .error("Aggregate value used in scalar context", lid.span);
                    }
                    t
                }
            },
            Coef::Id(LocalOrSym::Sym(sid)) => match self.syms.get(&sid.name) {
                None => {
                    self.diags
                        .error(format!("Undeclared symbol: {}", sid.name), sid.span);
                    Ty::Unknown
                }
                Some(si) => {
                    let ty = si.ty.clone();
                    self.scalar_ty(&ty)
                }
            },
        }
    }

    fn scalar_of_lvalue(&mut self, rv: &RValue) -> Ty {
        match self.type_of_lvalue(rv) {
            Some(t) => {
                let ty = self.scalar_ty(&t);
                if ty == Ty::Unknown {
                    self.diags
                        .error("Aggregate value used in scalar context", rv.span);
                }
                ty
            }
            None => Ty::Unknown,
        }
    }

    fn type_of_select_val(&mut self, sv: &SelectVal, expected: Option<u32>) -> Ty {
        match sv {
            SelectVal::RVal(rv) => self.scalar_of_lvalue(rv),
            SelectVal::Coef(c)  => self.type_of_coef(c, expected),
        }
    }

    fn type_of_expr(&mut self, e: &Expr, expected: Option<u32>) -> Ty {
        let t = self.type_of_atom(&e.first, expected);
        for tail in &e.rest {
            let hint = t.bits().or(expected);
            let ti = self.type_of_atom(&tail.atom, hint);
            self.require_match(t, ti, tail.span, "expression");
        }
        self.ann.record(e.id, t);
        t
    }

    fn type_of_atom(&mut self, a: &Atom, expected: Option<u32>) -> Ty {
        let t = self.type_of_atom_inner(a, expected);
        self.ann.record(a.id, t);
        t
    }

    fn type_of_atom_inner(&mut self, a: &Atom, expected: Option<u32>) -> Ty {
        match &a.kind {
            AtomKind::Op(op) => self.type_of_op_atom(op, expected),
            AtomKind::Unary(u) => {
                let rt = self.scalar_of_lvalue(&u.rval);
                if rt.is_fp() {
                    self.diags
                        .error("Bitwise complement requires an integer operand", u.span);
                }
                if rt.is_bv() {
                    rt
                } else {
                    Ty::Bv(expected.unwrap_or(32))
                }
            }
            AtomKind::Select(sel) => {
                self.check_cond(&sel.cond);
                let t1 = self.type_of_select_val(&sel.vtrue, expected);
                let t2 = self.type_of_select_val(&sel.vfalse, t1.bits().or(expected));
                match (t1, t2) {
                    (Ty::Bv(x), Ty::Bv(y)) | (Ty::Fp(x), Ty::Fp(y)) => {
                        if x != y {
                            self.diags.error("Select width mismatch", sel.span);
                        }
                    }
                    (Ty::Bv(_), Ty::Fp(_)) | (Ty::Fp(_), Ty::Bv(_)) => {
                        self.diags.error("Select arm kind mismatch", sel.span);
                    }
                    _ => {}
                }
                t1
            }
            AtomKind::Coef(c) => self.type_of_coef(&c.coef, expected),
            AtomKind::RVal(rv) => self.scalar_of_lvalue(&rv.rval),
            AtomKind::Cast(cast) => {
                // source is evaluated for the diagnostic picture only
                match &cast.src {
                    CastSrc::LVal(lv) => {
                        self.scalar_of_lvalue(lv);
                    }
                    CastSrc::Sym(sid) => {
                        if self.syms.get(&sid.name).is_none() {
                            self.diags
                                .error(format!("Undeclared symbol: {}", sid.name), sid.span);
                        }
                    }
                    CastSrc::Int(_) | CastSrc::Float(_) => {}
                }
                let dst = self.scalar_ty(&cast.dst);
                if dst == Ty::Unknown {
                    self.diags.error("Cannot cast to an aggregate type", cast.span);
                }
                dst
            }
        }
    }

    fn type_of_op_atom(&mut self, op: &OpAtom, expected: Option<u32>) -> Ty {
        // the rvalue operand is authoritative when it carries a type
        let rhs_ty = match &op.rhs {
            OpOperand::RVal(rv)                 => self.scalar_of_lvalue(rv),
            OpOperand::Coef(c @ Coef::Id(_))    => self.type_of_coef(c, expected),
            OpOperand::Coef(_)                  => Ty::Unknown,
        };

        let float_op = matches!(op.op, AtomOp::Mul | AtomOp::Div | AtomOp::Mod);

        match rhs_ty {
            Ty::Fp(w) => {
                if !float_op {
                    self.diags.error(
                        format!("Operator {} is not defined on floats", op.op),
                        op.span,
                    );
                }
                let ct = self.type_of_coef(&op.coef, Some(w));
                match ct {
                    Ty::Bv(_) => self
                        .diags
                        .error("Float operation requires a float coefficient", op.span),
                    Ty::Fp(cw) if cw != w => {
                        self.diags.error("Bitwidth mismatch in operation", op.span)
                    }
                    _ => {}
                }
                Ty::Fp(w)
            }
            Ty::Bv(w) => {
                let ct = self.type_of_coef(&op.coef, Some(w));
                match ct {
                    Ty::Fp(_) => self
                        .diags
                        .error("Integer operation requires an integer coefficient", op.span),
                    Ty::Bv(cw) if cw != w => {
                        self.diags.error("Bitwidth mismatch in operation", op.span)
                    }
                    _ => {}
                }
                Ty::Bv(w)
            }
            Ty::Unknown => {
                // literal right operand: the coefficient leads instead
                let ct = self.type_of_coef(&op.coef, expected);
                if ct.is_fp() && !float_op {
                    self.diags.error(
                        format!("Operator {} is not defined on floats", op.op),
                        op.span,
                    );
                }
                if let OpOperand::Coef(c) = &op.rhs {
                    let rt = self.type_of_coef(c, ct.bits().or(expected));
                    self.require_match(ct, rt, op.span, "operation");
                }
                match ct {
                    Ty::Unknown => Ty::Bv(expected.unwrap_or(32)),
                    known => known,
                }
            }
        }
    }

    fn check_cond(&mut self, c: &Cond) {
        let t1 = self.type_of_expr(&c.lhs, None);
        let t2 = self.type_of_expr(&c.rhs, t1.bits());
        match (t1, t2) {
            (Ty::Bv(a), Ty::Bv(b)) | (Ty::Fp(a), Ty::Fp(b)) => {
                if a != b {
                    self.diags.error("Bitwidth mismatch in condition", c.span);
                }
            }
            (Ty::Bv(_), Ty::Fp(_)) | (Ty::Fp(_), Ty::Bv(_)) => {
                self.diags.error("Operand kind mismatch in condition", c.span);
            }
            _ => {}
        }
    }

    fn check_init(&mut self, iv: &InitVal, target: &TypeRef) {
        match iv {
            InitVal::Undef { .. } => {}
            InitVal::Aggregate { elements, span } => {
                if let Some((size, elem)) = types::as_array(target) {
                    if elements.len() as u64 != size {
                        self.diags.error(
                            format!(
                                "Array initializer length mismatch: expected {}, got {}",
                                size,
                                elements.len()
                            ),
                            *span,
                        );
                        return;
                    }
                    for e in elements {
                        self.check_init(e, elem);
                    }
                } else if let Some(sname) = types::as_struct(target) {
                    let sd = match self.structs.get(sname) {
                        Some(sd) => sd,
                        None => return,
                    };
                    if elements.len() != sd.fields.len() {
                        self.diags.error(
                            format!(
                                "Struct initializer field count mismatch: expected {}, got {}",
                                sd.fields.len(),
                                elements.len()
                            ),
                            *span,
                        );
                        return;
                    }
                    let field_types: Vec<TypeRef> =
                        sd.fields.iter().map(|f| f.ty.clone()).collect();
                    for (e, ft) in elements.iter().zip(field_types.iter()) {
                        self.check_init(e, ft);
                    }
                } else {
                    self.diags
                        .error("Aggregate initializer for non-aggregate type", *span);
                }
            }
            InitVal::Int(lit) => {
                let mut leaves = Vec::new();
                self.structs.collect_leaves_owned(target, &mut leaves);
                for leaf in &leaves {
                    match types::bit_width(leaf) {
                        Some(w) => {
                            let display = format!("{}", leaf);
                            self.check_literal_range(lit.value, w, &display, lit.span);
                        }
                        None => {
                            self.diags.error("Type mismatch in initializer", lit.span);
                            return;
                        }
                    }
                }
            }
            InitVal::Float(lit) => {
                let mut leaves = Vec::new();
                self.structs.collect_leaves_owned(target, &mut leaves);
                for leaf in &leaves {
                    if types::float_kind(leaf).is_none() {
                        self.diags.error("Type mismatch in initializer", lit.span);
                        return;
                    }
                }
            }
            InitVal::Sym(sid) => {
                let ty = match self.syms.get(&sid.name) {
                    Some(si) => si.ty.clone(),
                    None => {
                        self.diags.error(
                            format!("Unknown symbol in initializer: {}", sid.name),
                            sid.span,
                        );
                        return;
                    }
                };
                self.check_init_broadcast(&ty, target, iv.span());
            }
            InitVal::Local(lid) => {
                let ty = match self.vars.get(&lid.name) {
                    Some(vi) => vi.ty.clone(),
                    None => {
                        self.diags.error(
                            format!("Unknown local in initializer: {}", lid.name),
                            lid.span,
                        );
                        return;
                    }
                };
                self.check_init_broadcast(&ty, target, iv.span());
            }
        }
    }

    fn check_init_broadcast(&mut self, init_ty: &TypeRef, target: &TypeRef, span: SourceSpan) {
        let mut leaves = Vec::new();
        self.structs.collect_leaves_owned(target, &mut leaves);
        for leaf in &leaves {
            if !types::types_equal(leaf, init_ty) {
                self.diags.error("Type mismatch in initializer", span);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;
    use crate::semck::SemChecker;

    fn check(src: &str) -> (PassResult, Vec<String>) {
        let prog = parse_source(src).unwrap();
        let mut diags = DiagBag::new();
        assert_eq!(
            SemChecker::new().run(&prog, &mut diags),
            PassResult::Success,
            "semck should pass first: {:?}",
            diags.diags
        );
        let r = TypeChecker::new().run(&prog, &mut diags);
        (r, diags.diags.into_iter().map(|d| d.message).collect())
    }

    #[test]
    fn literal_width_check() {
        let (r, msgs) = check("fun @g(): i8 { let %x: i8 = 300; ^entry: ret %x; }");
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m == "Literal 300 out of range for i8"), "{:?}", msgs);
    }

    #[test]
    fn literal_range_hi_corner() {
        // a signed i8 slot still accepts the unsigned-looking 255
        let (r, _msgs) = check("fun @g(): i8 { let %x: i8 = 255; ^entry: ret %x; }");
        assert_eq!(r, PassResult::Success);
        let (r, _msgs) = check("fun @g(): i8 { let %x: i8 = -128; ^entry: ret %x; }");
        assert_eq!(r, PassResult::Success);
        let (r, _msgs) = check("fun @g(): i8 { let %x: i8 = -129; ^entry: ret %x; }");
        assert_eq!(r, PassResult::Error);
    }

    #[test]
    fn assignment_width_mismatch() {
        let (r, msgs) = check(
            "fun @g(%a: i64): i32 { let mut %x: i32; ^entry: %x = %a; ret %x; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m.contains("Bitwidth mismatch")), "{:?}", msgs);
    }

    #[test]
    fn assignment_to_immutable() {
        let (r, msgs) = check(
            "fun @g(%a: i32): i32 { ^entry: %a = 1; ret %a; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m == "Assignment to immutable local: %a"), "{:?}", msgs);
    }

    #[test]
    fn missing_return_value() {
        let (r, msgs) = check("fun @g(): i32 { ^entry: ret; }");
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m == "Missing return value"), "{:?}", msgs);
    }

    #[test]
    fn aggregate_return_type_rejected() {
        let (r, msgs) = check("fun @g(): [2] i32 { ^entry: ret 0; }");
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m.contains("scalar")), "{:?}", msgs);
    }

    #[test]
    fn float_ops_restricted() {
        let (r, msgs) = check(
            "fun @g(%a: f32, %b: f32): i32 { let mut %x: f32; ^entry: %x = %a & %b; ret 0; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m.contains("not defined on floats")), "{:?}", msgs);

        let (r, _msgs) = check(
            "fun @g(%a: f32, %b: f32): i32 { let mut %x: f32; ^entry: %x = %a * %b; ret 0; }",
        );
        assert_eq!(r, PassResult::Success);
    }

    #[test]
    fn complement_rejects_floats() {
        let (r, msgs) = check(
            "fun @g(%a: f64): i32 { let mut %x: f64; ^entry: %x = ~%a; ret 0; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m.contains("integer operand")), "{:?}", msgs);
    }

    #[test]
    fn select_arms_must_agree() {
        let (r, msgs) = check(
            "fun @g(%a: i32, %b: i64): i32 { let mut %x: i32; \
             ^entry: %x = select %a == 0, %a, %b; ret %x; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m.contains("Select width mismatch")), "{:?}", msgs);
    }

    #[test]
    fn cast_result_is_destination_type() {
        let (r, _msgs) = check(
            "fun @g(%a: i32): i64 { let mut %x: i64; ^entry: %x = %a as i64; ret %x; }",
        );
        assert_eq!(r, PassResult::Success);
    }

    #[test]
    fn condition_width_mismatch() {
        let (r, msgs) = check(
            "fun @g(%a: i32, %b: i64): i32 { ^entry: br %a == %b, ^t, ^t; ^t: ret 0; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m == "Bitwidth mismatch in condition"), "{:?}", msgs);
    }

    #[test]
    fn lvalue_projections() {
        let (r, msgs) = check(
            "struct @P { x: i32; ys: [2] i64; } \
             fun @g(%p: @P): i32 { ^entry: ret %p.nope; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m.contains("Unknown field 'nope'")), "{:?}", msgs);

        let (r, msgs) = check(
            "fun @g(%a: i32): i32 { ^entry: ret %a[0]; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m == "Indexing non-array"), "{:?}", msgs);
    }

    #[test]
    fn index_must_be_integer() {
        let (r, msgs) = check(
            "fun @g(%a: [2] i32, %f: f32): i32 { ^entry: ret %a[%f]; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m == "Non-integer index"), "{:?}", msgs);
    }

    #[test]
    fn broadcast_initializers() {
        let (r, _msgs) = check(
            "fun @g(): i32 { let %a: [3] i32 = 0; ^entry: ret %a[0]; }",
        );
        assert_eq!(r, PassResult::Success);

        let (r, msgs) = check(
            "fun @g(): i32 { let %a: [3] f32 = 7; ^entry: ret 0; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m == "Type mismatch in initializer"), "{:?}", msgs);

        let (r, msgs) = check(
            "fun @g(): i32 { let %a: [2] i32 = {1, 2, 3}; ^entry: ret 0; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(
            msgs.iter().any(|m| m.contains("Array initializer length mismatch")),
            "{:?}",
            msgs
        );
    }

    #[test]
    fn sym_initializer_broadcast_type_checked() {
        let (r, _msgs) = check(
            "fun @g(): i32 { sym %?s: value i32; let %a: [2] i32 = %?s; ^entry: ret %a[0]; }",
        );
        assert_eq!(r, PassResult::Success);

        let (r, msgs) = check(
            "fun @g(): i32 { sym %?s: value i64; let %a: [2] i32 = %?s; ^entry: ret %a[0]; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(msgs.iter().any(|m| m == "Type mismatch in initializer"), "{:?}", msgs);
    }

    #[test]
    fn op_with_literal_rhs_infers_from_coefficient() {
        let (r, _msgs) = check(
            "fun @g(): i32 { sym %?k: value i32; let mut %y: i32; \
             ^entry: %y = %?k * 2; ret %y; }",
        );
        assert_eq!(r, PassResult::Success);
    }
}
