//! Path-based symbolic execution. A chosen block path is lowered into
//! solver constraints: instruction effects thread symbolic values through
//! a store, branch decisions and numeric side conditions accumulate as
//! path constraints, and `require` conditions as requirements. A SAT
//! answer comes back with concrete symbol assignments.

use crate::ast::*;
use crate::cfg::Cfg;
use crate::diagnostics::DiagBag;
use crate::smt::{self, Kind, SatResult, SmtProcSolver, Solver, Sort, Term};
use crate::types::{self, StructTable};
use crate::Error;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

#[derive(Clone, Debug)]
pub struct Config {
    pub timeout_ms: u32,
    pub seed:       u32,
    /// Tee the solver session to this file for debugging.
    pub tee:        Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_ms: smt::TIMEOUT.load(Ordering::Relaxed) as u32,
            seed:       0,
            tee:        None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Status {
    Sat,
    Unsat,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ModelValue {
    Int(i64),
    Float(f64),
}

#[derive(Debug)]
pub struct Outcome {
    pub status: Status,
    pub model:  HashMap<String, ModelValue>,
}

/// Mirrors the source type shape. Scalars carry their solver term plus a
/// definedness term; `is_defined = false` marks an undef-derived value.
#[derive(Clone)]
enum SymbolicValue {
    Scalar {
        term:       Term,
        is_defined: Term,
    },
    Array {
        elements:   Vec<SymbolicValue>,
    },
    Struct {
        fields:     HashMap<String, SymbolicValue>,
    },
}

pub struct Executor<'p> {
    prog:       &'p Program,
    structs:    StructTable<'p>,
    config:     Config,
}

impl<'p> Executor<'p> {
    pub fn new(prog: &'p Program, config: Config) -> Self {
        let structs = StructTable::build(prog);
        Self { prog, structs, config }
    }

    /// Solve against a z3 process found on PATH.
    pub fn solve(
        &self,
        fun_name: &str,
        path: &[String],
        fixed_syms: &HashMap<String, i64>,
    ) -> Result<Outcome, Error> {
        let mut solver = SmtProcSolver::new(
            self.config.timeout_ms,
            self.config.seed,
            self.config.tee.as_deref(),
        )?;
        self.solve_with(&mut solver, fun_name, path, fixed_syms)
    }

    /// Solve against any backend. One frame per call; the solver instance
    /// is owned by this invocation.
    pub fn solve_with(
        &self,
        solver: &mut dyn Solver,
        fun_name: &str,
        path: &[String],
        fixed_syms: &HashMap<String, i64>,
    ) -> Result<Outcome, Error> {
        let fun = self
            .prog
            .funs
            .iter()
            .find(|f| f.name.name == fun_name)
            .ok_or_else(|| Error::new(format!("Function not found: {}", fun_name), vec![]))?;

        let mut frame = Frame {
            solver,
            structs:            &self.structs,
            store:              HashMap::new(),
            path_constraints:   Vec::new(),
            requirements:       Vec::new(),
        };
        frame.run(fun, path, fixed_syms)
    }
}

struct Frame<'p, 's> {
    solver:             &'s mut dyn Solver,
    structs:            &'s StructTable<'p>,
    store:              HashMap<String, SymbolicValue>,
    path_constraints:   Vec<Term>,
    requirements:       Vec<Term>,
}

impl<'p, 's> Frame<'p, 's> {
    fn scalar_sort(t: &Type) -> Option<Sort> {
        if let Some(w) = types::bit_width(t) {
            return Some(Sort::Bv(w));
        }
        match types::float_kind(t) {
            Some(FloatKind::F32) => Some(Sort::Fp(8, 24)),
            Some(FloatKind::F64) => Some(Sort::Fp(11, 53)),
            None => None,
        }
    }

    fn fresh_value(&mut self, t: &TypeRef, name: &str) -> SymbolicValue {
        match &t.kind {
            TypeKind::Array { size, elem } => {
                let mut elements = Vec::with_capacity(*size as usize);
                for i in 0..*size {
                    elements.push(self.fresh_value(elem, &format!("{}[{}]", name, i)));
                }
                SymbolicValue::Array { elements }
            }
            TypeKind::Struct { name: sname } => {
                let mut fields = HashMap::new();
                if let Some(sd) = self.structs.get(&sname.name) {
                    let field_decls: Vec<(String, TypeRef)> =
                        sd.fields.iter().map(|f| (f.name.clone(), f.ty.clone())).collect();
                    for (fname, fty) in field_decls {
                        let fv = self.fresh_value(&fty, &format!("{}.{}", name, fname));
                        fields.insert(fname, fv);
                    }
                }
                SymbolicValue::Struct { fields }
            }
            _ => {
                let sort = Self::scalar_sort(t).unwrap_or(Sort::Bv(32));
                SymbolicValue::Scalar {
                    term:       self.solver.const_(sort, name),
                    is_defined: self.solver.true_(),
                }
            }
        }
    }

    fn undef_value(&mut self, t: &TypeRef) -> SymbolicValue {
        match &t.kind {
            TypeKind::Array { size, elem } => {
                let mut elements = Vec::with_capacity(*size as usize);
                for _ in 0..*size {
                    elements.push(self.undef_value(elem));
                }
                SymbolicValue::Array { elements }
            }
            TypeKind::Struct { name: sname } => {
                let mut fields = HashMap::new();
                if let Some(sd) = self.structs.get(&sname.name) {
                    let field_decls: Vec<(String, TypeRef)> =
                        sd.fields.iter().map(|f| (f.name.clone(), f.ty.clone())).collect();
                    for (fname, fty) in field_decls {
                        let fv = self.undef_value(&fty);
                        fields.insert(fname, fv);
                    }
                }
                SymbolicValue::Struct { fields }
            }
            _ => {
                let sort = Self::scalar_sort(t).unwrap_or(Sort::Bv(32));
                SymbolicValue::Scalar {
                    term:       self.solver.const_(sort, "undef"),
                    is_defined: self.solver.false_(),
                }
            }
        }
    }

    /// Replicate one scalar across every leaf of `t`.
    fn broadcast(&mut self, t: &TypeRef, scalar: &SymbolicValue) -> SymbolicValue {
        match &t.kind {
            TypeKind::Array { size, elem } => {
                let mut elements = Vec::with_capacity(*size as usize);
                for _ in 0..*size {
                    elements.push(self.broadcast(elem, scalar));
                }
                SymbolicValue::Array { elements }
            }
            TypeKind::Struct { name: sname } => {
                let mut fields = HashMap::new();
                if let Some(sd) = self.structs.get(&sname.name) {
                    let field_decls: Vec<(String, TypeRef)> =
                        sd.fields.iter().map(|f| (f.name.clone(), f.ty.clone())).collect();
                    for (fname, fty) in field_decls {
                        let fv = self.broadcast(&fty, scalar);
                        fields.insert(fname, fv);
                    }
                }
                SymbolicValue::Struct { fields }
            }
            _ => scalar.clone(),
        }
    }

    /// Broadcast an integer literal, sized per leaf.
    fn broadcast_int(&mut self, t: &TypeRef, value: i64) -> SymbolicValue {
        match &t.kind {
            TypeKind::Array { size, elem } => {
                let mut elements = Vec::with_capacity(*size as usize);
                for _ in 0..*size {
                    elements.push(self.broadcast_int(elem, value));
                }
                SymbolicValue::Array { elements }
            }
            TypeKind::Struct { name: sname } => {
                let mut fields = HashMap::new();
                if let Some(sd) = self.structs.get(&sname.name) {
                    let field_decls: Vec<(String, TypeRef)> =
                        sd.fields.iter().map(|f| (f.name.clone(), f.ty.clone())).collect();
                    for (fname, fty) in field_decls {
                        let fv = self.broadcast_int(&fty, value);
                        fields.insert(fname, fv);
                    }
                }
                SymbolicValue::Struct { fields }
            }
            _ => {
                let sort = Self::scalar_sort(t).unwrap_or(Sort::Bv(32));
                let term = if sort.is_fp() {
                    self.solver.fp_value(sort, value as f64)
                } else {
                    self.solver.bv_value_i64(sort, value)
                };
                SymbolicValue::Scalar { term, is_defined: self.solver.true_() }
            }
        }
    }

    fn init_value(&mut self, iv: &InitVal, t: &TypeRef) -> Result<SymbolicValue, Error> {
        match iv {
            InitVal::Undef { .. } => Ok(self.undef_value(t)),
            InitVal::Aggregate { elements, span } => {
                if let Some((size, elem)) = types::as_array(t) {
                    if elements.len() as u64 != size {
                        return Err(Error::new(
                            "Aggregate initializer arity mismatch".to_string(),
                            vec![(*span, "here".to_string())],
                        ));
                    }
                    let mut out = Vec::with_capacity(elements.len());
                    for e in elements {
                        out.push(self.init_value(e, elem)?);
                    }
                    Ok(SymbolicValue::Array { elements: out })
                } else if let Some(sname) = types::as_struct(t) {
                    let sd = self.structs.get(sname).ok_or_else(|| {
                        Error::new(
                            format!("Unknown struct type: {}", sname),
                            vec![(*span, "here".to_string())],
                        )
                    })?;
                    let field_decls: Vec<(String, TypeRef)> =
                        sd.fields.iter().map(|f| (f.name.clone(), f.ty.clone())).collect();
                    if elements.len() != field_decls.len() {
                        return Err(Error::new(
                            "Aggregate initializer arity mismatch".to_string(),
                            vec![(*span, "here".to_string())],
                        ));
                    }
                    let mut fields = HashMap::new();
                    for (e, (fname, fty)) in elements.iter().zip(field_decls) {
                        fields.insert(fname, self.init_value(e, &fty)?);
                    }
                    Ok(SymbolicValue::Struct { fields })
                } else {
                    Err(Error::new(
                        "Aggregate initializer for non-aggregate type".to_string(),
                        vec![(*span, "here".to_string())],
                    ))
                }
            }
            InitVal::Int(lit) => Ok(self.broadcast_int(t, lit.value)),
            InitVal::Float(lit) => {
                let sort = Self::scalar_sort(t).unwrap_or(Sort::Fp(11, 53));
                let term = self.solver.fp_value(sort, lit.value);
                let scalar =
                    SymbolicValue::Scalar { term, is_defined: self.solver.true_() };
                Ok(self.broadcast(t, &scalar))
            }
            InitVal::Sym(sid) => {
                let v = self.store.get(&sid.name).cloned().ok_or_else(|| {
                    Error::new(
                        format!("Unknown symbol in initializer: {}", sid.name),
                        vec![(sid.span, "here".to_string())],
                    )
                })?;
                Ok(self.broadcast(t, &v))
            }
            InitVal::Local(lid) => {
                let v = self.store.get(&lid.name).cloned().ok_or_else(|| {
                    Error::new(
                        format!("Unknown local in initializer: {}", lid.name),
                        vec![(lid.span, "here".to_string())],
                    )
                })?;
                Ok(self.broadcast(t, &v))
            }
        }
    }

    fn scalar_term(v: &SymbolicValue, span: SourceSpan) -> Result<Term, Error> {
        match v {
            SymbolicValue::Scalar { term, .. } => Ok(term.clone()),
            _ => Err(Error::new(
                "Aggregate value used in scalar context".to_string(),
                vec![(span, "here".to_string())],
            )),
        }
    }

    fn index_term(&mut self, idx: &Index) -> Result<Term, Error> {
        match idx {
            Index::Int(lit) => Ok(self.solver.bv_value_i64(Sort::Bv(32), lit.value)),
            Index::Id(id) => {
                let v = self.store.get(id.name()).cloned().ok_or_else(|| {
                    Error::new(
                        format!("Unknown name in index: {}", id.name()),
                        vec![(id.span(), "here".to_string())],
                    )
                })?;
                Self::scalar_term(&v, id.span())
            }
        }
    }

    /// Fold an array into one value selected by `idx`: a nested ITE over
    /// the constant indices, defaulting to element 0. Recurses through
    /// aggregate elements so every leaf becomes an ITE tree.
    fn merge_elements(&self, elements: &[SymbolicValue], idx: &Term) -> SymbolicValue {
        match &elements[0] {
            SymbolicValue::Scalar { term, is_defined } => {
                let mut res = term.clone();
                let mut defined = is_defined.clone();
                for (i, e) in elements.iter().enumerate().skip(1) {
                    if let SymbolicValue::Scalar { term, is_defined } = e {
                        let it = self.solver.bv_value_i64(idx.sort, i as i64);
                        let cond = self.solver.make(Kind::Equal, &[idx.clone(), it], &[]);
                        res = self
                            .solver
                            .make(Kind::Ite, &[cond.clone(), term.clone(), res], &[]);
                        defined = self
                            .solver
                            .make(Kind::Ite, &[cond, is_defined.clone(), defined], &[]);
                    }
                }
                SymbolicValue::Scalar { term: res, is_defined: defined }
            }
            SymbolicValue::Array { elements: inner } => {
                let mut out = Vec::with_capacity(inner.len());
                for j in 0..inner.len() {
                    let slice: Vec<SymbolicValue> = elements
                        .iter()
                        .filter_map(|e| match e {
                            SymbolicValue::Array { elements } => elements.get(j).cloned(),
                            _ => None,
                        })
                        .collect();
                    out.push(self.merge_elements(&slice, idx));
                }
                SymbolicValue::Array { elements: out }
            }
            SymbolicValue::Struct { fields } => {
                let mut out = HashMap::new();
                for key in fields.keys() {
                    let slice: Vec<SymbolicValue> = elements
                        .iter()
                        .filter_map(|e| match e {
                            SymbolicValue::Struct { fields } => fields.get(key).cloned(),
                            _ => None,
                        })
                        .collect();
                    out.insert(key.clone(), self.merge_elements(&slice, idx));
                }
                SymbolicValue::Struct { fields: out }
            }
        }
    }

    fn read_lvalue(&mut self, lv: &LValue) -> Result<SymbolicValue, Error> {
        let mut cur = self.store.get(&lv.base.name).cloned().ok_or_else(|| {
            Error::new(
                format!("Unknown local in symbolic store: {}", lv.base.name),
                vec![(lv.base.span, "read here".to_string())],
            )
        })?;
        for acc in &lv.accesses {
            match acc {
                Access::Index(ai) => {
                    let elements = match cur {
                        SymbolicValue::Array { elements } => elements,
                        _ => {
                            return Err(Error::new(
                                "Indexing non-array".to_string(),
                                vec![(ai.span, "here".to_string())],
                            ))
                        }
                    };
                    let n = elements.len();
                    if n == 0 {
                        return Err(Error::new(
                            "Indexing empty array".to_string(),
                            vec![(ai.span, "here".to_string())],
                        ));
                    }
                    let idx = self.index_term(&ai.index)?;
                    cur = match &ai.index {
                        Index::Int(lit) => {
                            let k = lit.value;
                            if k >= 0 && (k as usize) < n {
                                elements[k as usize].clone()
                            } else {
                                // the bounds condition below is already
                                // unsatisfiable, any element will do
                                elements[0].clone()
                            }
                        }
                        Index::Id(_) => self.merge_elements(&elements, &idx),
                    };
                    self.push_bounds(&idx, n, None);
                }
                Access::Field(af) => {
                    cur = match cur {
                        SymbolicValue::Struct { fields } => {
                            fields.get(&af.field).cloned().ok_or_else(|| {
                                Error::new(
                                    format!("Field not found: {}", af.field),
                                    vec![(af.span, "here".to_string())],
                                )
                            })?
                        }
                        _ => {
                            return Err(Error::new(
                                "Field access on non-struct".to_string(),
                                vec![(af.span, "here".to_string())],
                            ))
                        }
                    };
                }
            }
        }
        Ok(cur)
    }

    /// In-bounds side condition for an index, optionally guarded by a
    /// path condition so speculative branches of an update don't
    /// over-constrain the others.
    fn push_bounds(&mut self, idx: &Term, n: usize, guard: Option<&Term>) {
        let zero = self.solver.bv_zero(idx.sort);
        let nterm = self.solver.bv_value_i64(idx.sort, n as i64);
        let lo = self.solver.make(Kind::BvSle, &[zero, idx.clone()], &[]);
        let hi = self.solver.make(Kind::BvSlt, &[idx.clone(), nterm], &[]);
        match guard {
            Some(g) => {
                let lo = self.solver.make(Kind::Implies, &[g.clone(), lo], &[]);
                let hi = self.solver.make(Kind::Implies, &[g.clone(), hi], &[]);
                self.path_constraints.push(lo);
                self.path_constraints.push(hi);
            }
            None => {
                self.path_constraints.push(lo);
                self.path_constraints.push(hi);
            }
        }
    }

    fn mux(
        &self,
        cond: &Term,
        vtrue: &SymbolicValue,
        vfalse: &SymbolicValue,
    ) -> Result<SymbolicValue, Error> {
        match (vtrue, vfalse) {
            (
                SymbolicValue::Scalar { term: t, is_defined: td },
                SymbolicValue::Scalar { term: f, is_defined: fd },
            ) => Ok(SymbolicValue::Scalar {
                term: self
                    .solver
                    .make(Kind::Ite, &[cond.clone(), t.clone(), f.clone()], &[]),
                is_defined: self
                    .solver
                    .make(Kind::Ite, &[cond.clone(), td.clone(), fd.clone()], &[]),
            }),
            (
                SymbolicValue::Array { elements: te },
                SymbolicValue::Array { elements: fe },
            ) => {
                if te.len() != fe.len() {
                    return Err(Error::new(
                        "Conditional merge of arrays with different lengths".to_string(),
                        vec![],
                    ));
                }
                let mut out = Vec::with_capacity(te.len());
                for (t, f) in te.iter().zip(fe.iter()) {
                    out.push(self.mux(cond, t, f)?);
                }
                Ok(SymbolicValue::Array { elements: out })
            }
            (
                SymbolicValue::Struct { fields: tf },
                SymbolicValue::Struct { fields: ff },
            ) => {
                let mut out = HashMap::new();
                for (key, t) in tf {
                    let f = ff.get(key).ok_or_else(|| {
                        Error::new(
                            format!("Conditional merge of structs with mismatching field: {}", key),
                            vec![],
                        )
                    })?;
                    out.insert(key.clone(), self.mux(cond, t, f)?);
                }
                Ok(SymbolicValue::Struct { fields: out })
            }
            _ => Err(Error::new(
                "Conditional merge of differently shaped values".to_string(),
                vec![],
            )),
        }
    }

    fn update_rec(
        &mut self,
        cur: &SymbolicValue,
        accesses: &[Access],
        val: &SymbolicValue,
        path_cond: &Term,
        depth: usize,
    ) -> Result<SymbolicValue, Error> {
        if depth > 100 {
            return Err(Error::new(
                "Recursion depth exceeded in aggregate update".to_string(),
                vec![],
            ));
        }
        let acc = match accesses.first() {
            None => return self.mux(path_cond, val, cur),
            Some(acc) => acc,
        };
        let rest = &accesses[1..];

        match acc {
            Access::Index(ai) => {
                let elements = match cur {
                    SymbolicValue::Array { elements } => elements,
                    _ => {
                        return Err(Error::new(
                            "Indexing non-array in assignment".to_string(),
                            vec![(ai.span, "here".to_string())],
                        ))
                    }
                };
                let n = elements.len();
                if n == 0 {
                    return Err(Error::new(
                        "Indexing empty array".to_string(),
                        vec![(ai.span, "here".to_string())],
                    ));
                }
                let idx = self.index_term(&ai.index)?;
                self.push_bounds(&idx, n, Some(path_cond));

                let mut out = elements.clone();
                match &ai.index {
                    Index::Int(lit) => {
                        let k = lit.value;
                        if k >= 0 && (k as usize) < n {
                            out[k as usize] = self.update_rec(
                                &elements[k as usize],
                                rest,
                                val,
                                path_cond,
                                depth + 1,
                            )?;
                        }
                    }
                    Index::Id(_) => {
                        for k in 0..n {
                            let kterm = self.solver.bv_value_i64(idx.sort, k as i64);
                            let matches =
                                self.solver.make(Kind::Equal, &[idx.clone(), kterm], &[]);
                            let cond = self
                                .solver
                                .make(Kind::And, &[path_cond.clone(), matches], &[]);
                            out[k] =
                                self.update_rec(&elements[k], rest, val, &cond, depth + 1)?;
                        }
                    }
                }
                Ok(SymbolicValue::Array { elements: out })
            }
            Access::Field(af) => {
                let fields = match cur {
                    SymbolicValue::Struct { fields } => fields,
                    _ => {
                        return Err(Error::new(
                            "Field access on non-struct in assignment".to_string(),
                            vec![(af.span, "here".to_string())],
                        ))
                    }
                };
                let old = fields.get(&af.field).ok_or_else(|| {
                    Error::new(
                        format!("Field not found: {}", af.field),
                        vec![(af.span, "here".to_string())],
                    )
                })?;
                let updated = self.update_rec(old, rest, val, path_cond, depth + 1)?;
                let mut out = fields.clone();
                out.insert(af.field.clone(), updated);
                Ok(SymbolicValue::Struct { fields: out })
            }
        }
    }

    fn write_lvalue(&mut self, lv: &LValue, val: &SymbolicValue) -> Result<(), Error> {
        let root = self.store.get(&lv.base.name).cloned().ok_or_else(|| {
            Error::new(
                format!("Unknown local in symbolic store: {}", lv.base.name),
                vec![(lv.base.span, "written here".to_string())],
            )
        })?;
        // the instruction itself is unconditional at this point of the
        // trace; reachability is carried by the path constraints
        let always = self.solver.true_();
        let new_root = self.update_rec(&root, &lv.accesses, val, &always, 0)?;
        self.store.insert(lv.base.name.clone(), new_root);
        Ok(())
    }

    fn eval_coef(&mut self, c: &Coef, expected: Option<Sort>) -> Result<Term, Error> {
        match c {
            Coef::Int(lit) => match expected {
                Some(s) if s.is_fp() => Ok(self.solver.fp_value(s, lit.value as f64)),
                Some(s) if s.is_bv() => Ok(self.solver.bv_value_i64(s, lit.value)),
                _ => Ok(self.solver.bv_value_i64(Sort::Bv(32), lit.value)),
            },
            Coef::Float(lit) => match expected {
                Some(s) if s.is_fp() => Ok(self.solver.fp_value(s, lit.value)),
                _ => Ok(self.solver.fp_value(Sort::Fp(8, 24), lit.value)),
            },
            Coef::Id(id) => {
                let v = self.store.get(id.name()).cloned().ok_or_else(|| {
                    Error::new(
                        format!("Unknown name: {}", id.name()),
                        vec![(id.span(), "here".to_string())],
                    )
                })?;
                Self::scalar_term(&v, id.span())
            }
        }
    }

    fn eval_select_val(
        &mut self,
        sv: &SelectVal,
        expected: Option<Sort>,
    ) -> Result<Term, Error> {
        match sv {
            SelectVal::RVal(rv) => {
                let v = self.read_lvalue(rv)?;
                Self::scalar_term(&v, rv.span)
            }
            SelectVal::Coef(c) => self.eval_coef(c, expected),
        }
    }

    fn eval_op_atom(&mut self, op: &OpAtom, expected: Option<Sort>) -> Result<Term, Error> {
        // when the right operand carries a type it is authoritative for
        // the coefficient; a literal right operand follows the coefficient
        let (c, r) = match &op.rhs {
            OpOperand::RVal(rv) => {
                let rv_val = self.read_lvalue(rv)?;
                let r = Self::scalar_term(&rv_val, rv.span)?;
                let c = self.eval_coef(&op.coef, Some(r.sort))?;
                (c, r)
            }
            OpOperand::Coef(rc @ Coef::Id(_)) => {
                let r = self.eval_coef(rc, expected)?;
                let c = self.eval_coef(&op.coef, Some(r.sort))?;
                (c, r)
            }
            OpOperand::Coef(rc) => {
                let c = self.eval_coef(&op.coef, expected)?;
                let r = self.eval_coef(rc, Some(c.sort))?;
                (c, r)
            }
        };

        if c.sort.is_fp() {
            let kind = match op.op {
                AtomOp::Mul => Kind::FpMul,
                AtomOp::Div => Kind::FpDiv,
                AtomOp::Mod => Kind::FpRem,
                _ => {
                    return Err(Error::new(
                        format!("Operator {} is not defined on floats", op.op),
                        vec![(op.span, "here".to_string())],
                    ))
                }
            };
            return Ok(self.solver.make(kind, &[c, r], &[]));
        }

        match op.op {
            AtomOp::Mul => {
                let overflow =
                    self.solver.make(Kind::SmulOverflow, &[c.clone(), r.clone()], &[]);
                let ok = self.solver.make(Kind::Not, &[overflow], &[]);
                self.path_constraints.push(ok);
                Ok(self.solver.make(Kind::BvMul, &[c, r], &[]))
            }
            AtomOp::Div | AtomOp::Mod => {
                let zero = self.solver.bv_zero(r.sort);
                let nonzero = self.solver.make(Kind::Distinct, &[r.clone(), zero], &[]);
                self.path_constraints.push(nonzero);

                let min_signed = self.solver.bv_min_signed(c.sort);
                let minus_one = self.solver.bv_value_i64(r.sort, -1);
                let is_min = self.solver.make(Kind::Equal, &[c.clone(), min_signed], &[]);
                let is_minus_one =
                    self.solver.make(Kind::Equal, &[r.clone(), minus_one], &[]);
                let wraps = self.solver.make(Kind::And, &[is_min, is_minus_one], &[]);
                let ok = self.solver.make(Kind::Not, &[wraps], &[]);
                self.path_constraints.push(ok);

                let kind = if op.op == AtomOp::Div { Kind::BvSdiv } else { Kind::BvSrem };
                Ok(self.solver.make(kind, &[c, r], &[]))
            }
            AtomOp::And => Ok(self.solver.make(Kind::BvAnd, &[c, r], &[])),
            AtomOp::Or => Ok(self.solver.make(Kind::BvOr, &[c, r], &[])),
            AtomOp::Xor => Ok(self.solver.make(Kind::BvXor, &[c, r], &[])),
            AtomOp::Shl | AtomOp::Shr | AtomOp::LShr => {
                let width = c.sort.bv_width().unwrap_or(64);
                let width_term = self.solver.bv_value_i64(r.sort, width as i64);
                let in_range =
                    self.solver.make(Kind::BvUlt, &[r.clone(), width_term], &[]);
                self.path_constraints.push(in_range);
                let kind = match op.op {
                    AtomOp::Shl => Kind::BvShl,
                    AtomOp::Shr => Kind::BvAshr,
                    _ => Kind::BvLshr,
                };
                Ok(self.solver.make(kind, &[c, r], &[]))
            }
        }
    }

    fn eval_atom(&mut self, a: &Atom, expected: Option<Sort>) -> Result<Term, Error> {
        match &a.kind {
            AtomKind::Op(op) => self.eval_op_atom(op, expected),
            AtomKind::Unary(u) => {
                let v = self.read_lvalue(&u.rval)?;
                let r = Self::scalar_term(&v, u.rval.span)?;
                Ok(self.solver.make(Kind::BvNot, &[r], &[]))
            }
            AtomKind::Select(sel) => {
                let cond = self.eval_cond(&sel.cond)?;
                let vt = self.eval_select_val(&sel.vtrue, expected)?;
                let vf = self.eval_select_val(&sel.vfalse, Some(vt.sort))?;
                Ok(self.solver.make(Kind::Ite, &[cond, vt, vf], &[]))
            }
            AtomKind::Coef(c) => self.eval_coef(&c.coef, expected),
            AtomKind::RVal(rv) => {
                let v = self.read_lvalue(&rv.rval)?;
                Self::scalar_term(&v, rv.rval.span)
            }
            AtomKind::Cast(cast) => self.eval_cast(cast),
        }
    }

    fn eval_cast(&mut self, cast: &CastAtom) -> Result<Term, Error> {
        let src = match &cast.src {
            CastSrc::Int(lit)   => self.solver.bv_value_i64(Sort::Bv(32), lit.value),
            CastSrc::Float(lit) => self.solver.fp_value(Sort::Fp(8, 24), lit.value),
            CastSrc::Sym(sid) => {
                let v = self.store.get(&sid.name).cloned().ok_or_else(|| {
                    Error::new(
                        format!("Unknown symbol: {}", sid.name),
                        vec![(sid.span, "here".to_string())],
                    )
                })?;
                Self::scalar_term(&v, sid.span)?
            }
            CastSrc::LVal(lv) => {
                let v = self.read_lvalue(lv)?;
                Self::scalar_term(&v, lv.span)?
            }
        };
        let dst = Self::scalar_sort(&cast.dst).ok_or_else(|| {
            Error::new(
                "Cannot cast to an aggregate type".to_string(),
                vec![(cast.span, "here".to_string())],
            )
        })?;

        match (src.sort, dst) {
            (Sort::Fp(_, _), Sort::Bv(w)) => {
                Ok(self.solver.make(Kind::FpToSbv, &[src], &[w]))
            }
            (Sort::Bv(_), Sort::Fp(e, s)) => {
                Ok(self.solver.make(Kind::FpToFpFromSbv, &[src], &[e, s]))
            }
            (Sort::Fp(_, _), Sort::Fp(e, s)) => {
                Ok(self.solver.make(Kind::FpToFpFromFp, &[src], &[e, s]))
            }
            (Sort::Bv(sw), Sort::Bv(dw)) => {
                if sw == dw {
                    Ok(src)
                } else if sw < dw {
                    Ok(self.solver.make(Kind::SignExtend, &[src], &[dw - sw]))
                } else {
                    Ok(self.solver.make(Kind::Extract, &[src], &[dw - 1, 0]))
                }
            }
            _ => Err(Error::new(
                "Unsupported cast".to_string(),
                vec![(cast.span, "here".to_string())],
            )),
        }
    }

    fn eval_expr(&mut self, e: &Expr, expected: Option<Sort>) -> Result<Term, Error> {
        let mut res = self.eval_atom(&e.first, expected)?;
        for tail in &e.rest {
            let right = self.eval_atom(&tail.atom, expected)?;
            if res.sort.is_fp() {
                let kind = if tail.op == AddOp::Plus { Kind::FpAdd } else { Kind::FpSub };
                res = self.solver.make(kind, &[res, right], &[]);
            } else {
                let ovf_kind = if tail.op == AddOp::Plus {
                    Kind::SaddOverflow
                } else {
                    Kind::SsubOverflow
                };
                let overflow =
                    self.solver.make(ovf_kind, &[res.clone(), right.clone()], &[]);
                let ok = self.solver.make(Kind::Not, &[overflow], &[]);
                self.path_constraints.push(ok);
                let kind = if tail.op == AddOp::Plus { Kind::BvAdd } else { Kind::BvSub };
                res = self.solver.make(kind, &[res, right], &[]);
            }
        }
        Ok(res)
    }

    fn eval_cond(&mut self, c: &Cond) -> Result<Term, Error> {
        let lhs = self.eval_expr(&c.lhs, None)?;
        let rhs = self.eval_expr(&c.rhs, Some(lhs.sort))?;

        if lhs.sort.is_fp() {
            // ordered comparisons; != is the negation of fp.eq, so NaN
            // makes it true
            let term = match c.op {
                RelOp::Eq => self.solver.make(Kind::FpEq, &[lhs, rhs], &[]),
                RelOp::Ne => {
                    let eq = self.solver.make(Kind::FpEq, &[lhs, rhs], &[]);
                    self.solver.make(Kind::Not, &[eq], &[])
                }
                RelOp::Lt => self.solver.make(Kind::FpLt, &[lhs, rhs], &[]),
                RelOp::Le => self.solver.make(Kind::FpLeq, &[lhs, rhs], &[]),
                RelOp::Gt => self.solver.make(Kind::FpGt, &[lhs, rhs], &[]),
                RelOp::Ge => self.solver.make(Kind::FpGeq, &[lhs, rhs], &[]),
            };
            return Ok(term);
        }

        let kind = match c.op {
            RelOp::Eq => Kind::Equal,
            RelOp::Ne => Kind::Distinct,
            RelOp::Lt => Kind::BvSlt,
            RelOp::Le => Kind::BvSle,
            RelOp::Gt => Kind::BvSgt,
            RelOp::Ge => Kind::BvSge,
        };
        Ok(self.solver.make(kind, &[lhs, rhs], &[]))
    }

    fn run(
        &mut self,
        fun: &FunDecl,
        path: &[String],
        fixed_syms: &HashMap<String, i64>,
    ) -> Result<Outcome, Error> {
        if path.is_empty() {
            return Err(Error::new("Execution path is empty".to_string(), vec![]));
        }

        // symbols first: fresh constants, domain constraints, fixings
        for s in &fun.syms {
            let sv = self.fresh_value(&s.ty, &s.name.name);
            let term = Self::scalar_term(&sv, s.name.span).map_err(|_| {
                Error::new(
                    format!("Symbol {} must have a scalar type", s.name.name),
                    vec![(s.span, "declared here".to_string())],
                )
            })?;
            self.store.insert(s.name.name.clone(), sv);

            if let Some(domain) = &s.domain {
                if !term.sort.is_bv() {
                    return Err(Error::new(
                        format!("Domains are only supported on integer symbols: {}", s.name.name),
                        vec![(s.span, "declared here".to_string())],
                    ));
                }
                match domain {
                    Domain::Interval(iv) => {
                        let lo = self.solver.bv_value_i64(term.sort, iv.lo);
                        let hi = self.solver.bv_value_i64(term.sort, iv.hi);
                        let above =
                            self.solver.make(Kind::BvSle, &[lo, term.clone()], &[]);
                        let below =
                            self.solver.make(Kind::BvSle, &[term.clone(), hi], &[]);
                        self.path_constraints.push(above);
                        self.path_constraints.push(below);
                    }
                    Domain::Set(ds) => {
                        let mut alts: Option<Term> = None;
                        for v in &ds.values {
                            let vt = self.solver.bv_value_i64(term.sort, *v);
                            let eq =
                                self.solver.make(Kind::Equal, &[term.clone(), vt], &[]);
                            alts = Some(match alts {
                                None => eq,
                                Some(prev) => {
                                    self.solver.make(Kind::Or, &[prev, eq], &[])
                                }
                            });
                        }
                        if let Some(alts) = alts {
                            self.path_constraints.push(alts);
                        }
                    }
                }
            }

            if let Some(v) = fixed_syms.get(&s.name.name) {
                let vt = self.solver.bv_value_i64(term.sort, *v);
                let eq = self.solver.make(Kind::Equal, &[term, vt], &[]);
                self.path_constraints.push(eq);
            }
        }

        for p in &fun.params {
            let v = self.fresh_value(&p.ty, &p.name.name);
            self.store.insert(p.name.name.clone(), v);
        }
        for l in &fun.lets {
            let v = match &l.init {
                Some(iv) => self.init_value(iv, &l.ty)?,
                None => self.undef_value(&l.ty),
            };
            self.store.insert(l.name.name.clone(), v);
        }

        let mut diags = DiagBag::new();
        let cfg = Cfg::build(fun, &mut diags);
        if diags.has_errors() {
            let details = diags
                .diags
                .iter()
                .map(|d| (d.span, d.message.clone()))
                .collect();
            return Err(Error::new(
                "Control-flow graph construction failed".to_string(),
                details,
            ));
        }

        for i in 0..path.len() {
            let label = &path[i];
            let idx = *cfg.index_of.get(label).ok_or_else(|| {
                Error::new(format!("Invalid block label in path: {}", label), vec![])
            })?;
            let block = &fun.blocks[idx];

            for ins in &block.instrs {
                match ins {
                    Instr::Assign(a) => {
                        let lhs_val = self.read_lvalue(&a.lhs)?;
                        let expected = match &lhs_val {
                            SymbolicValue::Scalar { term, .. } => Some(term.sort),
                            _ => None,
                        };
                        let rhs = self.eval_expr(&a.rhs, expected)?;
                        let defined = self.solver.true_();
                        let val = SymbolicValue::Scalar { term: rhs, is_defined: defined };
                        self.write_lvalue(&a.lhs, &val)?;
                    }
                    Instr::Assume(a) => {
                        let c = self.eval_cond(&a.cond)?;
                        self.path_constraints.push(c);
                    }
                    Instr::Require(r) => {
                        let c = self.eval_cond(&r.cond)?;
                        self.requirements.push(c);
                    }
                }
            }

            if i + 1 < path.len() {
                let next = &path[i + 1];
                match &block.term {
                    Terminator::Br { dest, .. } => {
                        if dest.name != *next {
                            return Err(Error::new(
                                format!("Path edge not in CFG: {} -> {}", label, next),
                                vec![],
                            ));
                        }
                    }
                    Terminator::CondBr { cond, then_label, else_label, .. } => {
                        let c = self.eval_cond(cond)?;
                        if then_label.name == *next {
                            self.path_constraints.push(c);
                        } else if else_label.name == *next {
                            let not = self.solver.make(Kind::Not, &[c], &[]);
                            self.path_constraints.push(not);
                        } else {
                            return Err(Error::new(
                                format!("Path edge not in CFG: {} -> {}", label, next),
                                vec![],
                            ));
                        }
                    }
                    _ => {
                        return Err(Error::new(
                            format!(
                                "Block {} ends with a non-branch terminator but the path has more blocks",
                                label
                            ),
                            vec![],
                        ));
                    }
                }
            }
        }

        for c in &self.path_constraints {
            self.solver.assert(c)?;
        }
        for r in &self.requirements {
            self.solver.assert(r)?;
        }

        match self.solver.check_sat() {
            SatResult::Unsat => {
                return Ok(Outcome { status: Status::Unsat, model: HashMap::new() })
            }
            SatResult::Unknown => {
                return Ok(Outcome { status: Status::Unknown, model: HashMap::new() })
            }
            SatResult::Sat => {}
        }

        let mut model = HashMap::new();
        for s in &fun.syms {
            let sv = self.store.get(&s.name.name).cloned();
            let term = match sv {
                Some(SymbolicValue::Scalar { term, .. }) => term,
                _ => continue,
            };
            let val_term = self.solver.get_value(&term)?;
            if term.sort.is_fp() {
                let bin = self.solver.fp_value_str(&val_term)?;
                let mut bits: u64 = 0;
                for ch in bin.chars() {
                    bits = (bits << 1) | (ch == '1') as u64;
                }
                let d = if bin.len() <= 32 {
                    f32::from_bits(bits as u32) as f64
                } else {
                    f64::from_bits(bits)
                };
                model.insert(s.name.name.clone(), ModelValue::Float(d));
            } else {
                let text = self.solver.bv_value_str(&val_term, 10)?;
                let v = text.parse::<i64>().map_err(|_| {
                    Error::new(format!("Malformed model value '{}'", text), vec![])
                })?;
                model.insert(s.name.name.clone(), ModelValue::Int(v));
            }
        }
        Ok(Outcome { status: Status::Sat, model })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    /// Offline backend: builds terms through the shared algebra, answers
    /// unknown. Enough to exercise path validation without a process.
    struct Offline {
        fresh: usize,
    }

    impl Solver for Offline {
        fn const_(&mut self, sort: Sort, name: &str) -> Term {
            let t = Term::new(sort, format!("k{}_{}", self.fresh, name.len()));
            self.fresh += 1;
            t
        }
        fn assert(&mut self, _t: &Term) -> Result<(), Error> {
            Ok(())
        }
        fn check_sat(&mut self) -> SatResult {
            SatResult::Unknown
        }
        fn get_value(&mut self, t: &Term) -> Result<Term, Error> {
            Ok(t.clone())
        }
    }

    fn run_path(src: &str, path: &[&str]) -> Result<Outcome, Error> {
        let prog = parse_source(src).unwrap();
        let exec = Executor::new(&prog, Config::default());
        let mut solver = Offline { fresh: 0 };
        let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        exec.solve_with(&mut solver, "@g", &path, &HashMap::new())
    }

    const DIAMOND: &str = "fun @g(%c: i32): i32 { let mut %x: i32 = 0; \
        ^entry: br %c == 0, ^t, ^f; \
        ^t: %x = 1; br ^join; \
        ^f: %x = 2; br ^join; \
        ^join: ret %x; }";

    #[test]
    fn well_formed_path_reaches_the_solver() {
        let out = run_path(DIAMOND, &["^entry", "^t", "^join"]).unwrap();
        assert_eq!(out.status, Status::Unknown);
        assert!(out.model.is_empty());
    }

    #[test]
    fn unknown_label_is_fatal() {
        let err = run_path(DIAMOND, &["^entry", "^nope"]).unwrap_err();
        assert!(err.message.contains("Invalid block label in path: ^nope"), "{}", err);
    }

    #[test]
    fn edge_not_in_cfg_is_fatal() {
        let err = run_path(DIAMOND, &["^t", "^f"]).unwrap_err();
        assert!(err.message.contains("Path edge not in CFG: ^t -> ^f"), "{}", err);
    }

    #[test]
    fn trailing_blocks_after_ret_are_fatal() {
        let err = run_path(DIAMOND, &["^entry", "^t", "^join", "^f"]).unwrap_err();
        assert!(err.message.contains("non-branch terminator"), "{}", err);
    }

    #[test]
    fn empty_path_is_fatal() {
        let err = run_path(DIAMOND, &[]).unwrap_err();
        assert!(err.message.contains("path is empty"), "{}", err);
    }

    #[test]
    fn unknown_function_is_fatal() {
        let prog = parse_source(DIAMOND).unwrap();
        let exec = Executor::new(&prog, Config::default());
        let mut solver = Offline { fresh: 0 };
        let err = exec
            .solve_with(&mut solver, "@h", &["^entry".to_string()], &HashMap::new())
            .unwrap_err();
        assert!(err.message.contains("Function not found: @h"), "{}", err);
    }

    #[test]
    fn symbolic_aggregates_walk_cleanly() {
        // symbolic index writes and reads go through merge trees with no
        // shape errors
        let out = run_path(
            "fun @g(): i32 { sym %?i: value i32 in [0,3]; \
             let mut %arr: [4] i32 = 0; \
             ^entry: %arr[%?i] = 7; require %arr[2] == 7; ret 0; }",
            &["^entry"],
        )
        .unwrap();
        assert_eq!(out.status, Status::Unknown);
    }

    #[test]
    fn struct_paths_walk_cleanly() {
        let prog = parse_source(
            "struct @P { a: i32; bs: [2] i64; } \
             fun @g(): i32 { sym %?k: value i64; let mut %p: @P = undef; \
             ^entry: %p.a = 1; %p.bs[1] = %?k; require %p.bs[1] == 5; ret %p.a; }",
        )
        .unwrap();
        let exec = Executor::new(&prog, Config::default());
        let mut solver = Offline { fresh: 0 };
        let out = exec
            .solve_with(&mut solver, "@g", &["^entry".to_string()], &HashMap::new())
            .unwrap();
        assert_eq!(out.status, Status::Unknown);
    }
}
