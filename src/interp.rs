//! Concrete interpreter. Mirrors the semantics the checker and the
//! symbolic executor encode: two's-complement arithmetic canonicalized to
//! the declared width, and every undefined behaviour aborts the run.

use crate::ast::*;
use crate::cfg::Cfg;
use crate::diagnostics::DiagBag;
use crate::types::{self, StructTable};
use crate::Error;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug)]
pub enum SymBinding {
    Int(i64),
    Float(f64),
}

#[derive(Clone, Debug)]
pub enum RuntimeValue {
    Int {
        value:  i64,
        bits:   u32,
    },
    Float {
        value:  f64,
        bits:   u32,
    },
    Undef {
        bits:   u32,
    },
    Array(Vec<RuntimeValue>),
    Struct(HashMap<String, RuntimeValue>),
}

impl RuntimeValue {
    pub fn is_undef(&self) -> bool {
        matches!(self, RuntimeValue::Undef { .. })
    }
}

impl std::fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RuntimeValue::Int { value, .. }     => write!(f, "{}", value),
            RuntimeValue::Float { value, .. }   => write!(f, "{}", value),
            RuntimeValue::Undef { .. }          => write!(f, "undef"),
            RuntimeValue::Array(_)              => write!(f, "[...]"),
            RuntimeValue::Struct(_)             => write!(f, "{{...}}"),
        }
    }
}

type Store = HashMap<String, RuntimeValue>;

fn canonicalize(val: i64, bits: u32) -> i64 {
    if bits >= 64 || bits == 0 {
        return val;
    }
    let mask = (1u64 << bits) - 1;
    let sign_bit = 1u64 << (bits - 1);
    let uval = (val as u64) & mask;
    if uval & sign_bit != 0 {
        (uval | !mask) as i64
    } else {
        uval as i64
    }
}

fn ub(message: &str, span: SourceSpan) -> Error {
    Error::new(format!("UB: {}", message), vec![(span, "here".to_string())])
}

pub struct Interpreter<'p> {
    prog:       &'p Program,
    structs:    StructTable<'p>,
    trace:      bool,
}

impl<'p> Interpreter<'p> {
    pub fn new(prog: &'p Program) -> Self {
        let structs = StructTable::build(prog);
        Self { prog, structs, trace: false }
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    fn float_bits_of(t: &Type) -> u32 {
        types::float_kind(t).map(types::float_bits).unwrap_or(64)
    }

    fn make_undef(&self, t: &TypeRef) -> RuntimeValue {
        if let Some((size, elem)) = types::as_array(t) {
            return RuntimeValue::Array((0..size).map(|_| self.make_undef(elem)).collect());
        }
        if let Some(sname) = types::as_struct(t) {
            let mut fields = HashMap::new();
            if let Some(sd) = self.structs.get(sname) {
                for f in &sd.fields {
                    fields.insert(f.name.clone(), self.make_undef(&f.ty));
                }
            }
            return RuntimeValue::Struct(fields);
        }
        let bits = types::bit_width(t).unwrap_or_else(|| Self::float_bits_of(t));
        RuntimeValue::Undef { bits }
    }

    fn broadcast(&self, t: &TypeRef, v: &RuntimeValue) -> RuntimeValue {
        if let Some((size, elem)) = types::as_array(t) {
            return RuntimeValue::Array((0..size).map(|_| self.broadcast(elem, v)).collect());
        }
        if let Some(sname) = types::as_struct(t) {
            let mut fields = HashMap::new();
            if let Some(sd) = self.structs.get(sname) {
                for f in &sd.fields {
                    fields.insert(f.name.clone(), self.broadcast(&f.ty, v));
                }
            }
            return RuntimeValue::Struct(fields);
        }
        match v {
            RuntimeValue::Int { value, .. } => {
                let bits = types::bit_width(t).unwrap_or(64);
                RuntimeValue::Int { value: canonicalize(*value, bits), bits }
            }
            RuntimeValue::Float { value, .. } => {
                RuntimeValue::Float { value: *value, bits: Self::float_bits_of(t) }
            }
            other => other.clone(),
        }
    }

    fn eval_init(&self, iv: &InitVal, t: &TypeRef, store: &Store) -> Result<RuntimeValue, Error> {
        match iv {
            InitVal::Undef { .. } => Ok(self.make_undef(t)),
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
                        out.push(self.eval_init(e, elem, store)?);
                    }
                    Ok(RuntimeValue::Array(out))
                } else if let Some(sname) = types::as_struct(t) {
                    let sd = self.structs.get(sname).ok_or_else(|| {
                        Error::new(
                            format!("Unknown struct type: {}", sname),
                            vec![(*span, "here".to_string())],
                        )
                    })?;
                    let mut fields = HashMap::new();
                    for (e, fd) in elements.iter().zip(sd.fields.iter()) {
                        fields.insert(fd.name.clone(), self.eval_init(e, &fd.ty, store)?);
                    }
                    Ok(RuntimeValue::Struct(fields))
                } else {
                    Err(Error::new(
                        "Aggregate initializer for non-aggregate type".to_string(),
                        vec![(*span, "here".to_string())],
                    ))
                }
            }
            InitVal::Int(lit) => {
                let scalar = RuntimeValue::Int { value: lit.value, bits: 64 };
                Ok(self.broadcast(t, &scalar))
            }
            InitVal::Float(lit) => {
                let scalar = RuntimeValue::Float { value: lit.value, bits: 64 };
                Ok(self.broadcast(t, &scalar))
            }
            InitVal::Sym(sid) => {
                let v = store.get(&sid.name).cloned().ok_or_else(|| {
                    Error::new(
                        format!("Unbound symbol: {}", sid.name),
                        vec![(sid.span, "here".to_string())],
                    )
                })?;
                Ok(self.broadcast(t, &v))
            }
            InitVal::Local(lid) => {
                let v = store.get(&lid.name).cloned().ok_or_else(|| {
                    Error::new(
                        format!("Unbound local: {}", lid.name),
                        vec![(lid.span, "here".to_string())],
                    )
                })?;
                Ok(self.broadcast(t, &v))
            }
        }
    }

    /// Run a function to its `ret`. All symbols must be bound; functions
    /// with parameters are not executable directly.
    pub fn run(
        &self,
        fun_name: &str,
        bindings: &HashMap<String, SymBinding>,
    ) -> Result<Option<RuntimeValue>, Error> {
        let fun = self
            .prog
            .funs
            .iter()
            .find(|f| f.name.name == fun_name)
            .ok_or_else(|| {
                Error::new(format!("Entry function not found: {}", fun_name), vec![])
            })?;

        if !fun.params.is_empty() {
            return Err(Error::new(
                format!("Entry function {} has parameters; it cannot be interpreted directly", fun_name),
                vec![(fun.span, "declared here".to_string())],
            ));
        }

        let mut store = Store::new();

        for s in &fun.syms {
            let binding = bindings.get(&s.name.name).ok_or_else(|| {
                Error::new(
                    format!("Unbound symbol: {}", s.name.name),
                    vec![(s.span, "declared here".to_string())],
                )
            })?;
            let v = match (binding, types::bit_width(&s.ty)) {
                (SymBinding::Int(i), Some(bits)) => {
                    RuntimeValue::Int { value: canonicalize(*i, bits), bits }
                }
                (SymBinding::Float(fv), None) => {
                    RuntimeValue::Float { value: *fv, bits: Self::float_bits_of(&s.ty) }
                }
                (SymBinding::Int(i), None) => {
                    RuntimeValue::Float { value: *i as f64, bits: Self::float_bits_of(&s.ty) }
                }
                (SymBinding::Float(fv), Some(bits)) => {
                    RuntimeValue::Int { value: canonicalize(*fv as i64, bits), bits }
                }
            };
            store.insert(s.name.name.clone(), v);
        }

        for l in &fun.lets {
            let v = match &l.init {
                Some(iv) => self.eval_init(iv, &l.ty, &store)?,
                None => self.make_undef(&l.ty),
            };
            store.insert(l.name.name.clone(), v);
        }

        let mut diags = DiagBag::new();
        let cfg = Cfg::build(fun, &mut diags);
        if diags.has_errors() {
            let details = diags.diags.iter().map(|d| (d.span, d.message.clone())).collect();
            return Err(Error::new(
                "Control-flow graph construction failed".to_string(),
                details,
            ));
        }

        let mut pc = cfg.entry;
        loop {
            let block = &fun.blocks[pc];
            if self.trace {
                debug!("{}:", block.label.name);
            }

            for ins in &block.instrs {
                match ins {
                    Instr::Assign(a) => {
                        let rhs = self.eval_expr(&a.rhs, &store)?;
                        if self.trace {
                            debug!("  {} = {}", a.lhs.base.name, rhs);
                        }
                        self.set_lvalue(&a.lhs, rhs, &mut store)?;
                    }
                    Instr::Assume(a) => {
                        if !self.eval_cond(&a.cond, &store)? {
                            return Err(Error::new(
                                "Assumption failed".to_string(),
                                vec![(a.span, "here".to_string())],
                            ));
                        }
                    }
                    Instr::Require(r) => {
                        if !self.eval_cond(&r.cond, &store)? {
                            let msg = r
                                .message
                                .clone()
                                .unwrap_or_else(|| "Requirement failed".to_string());
                            return Err(Error::new(
                                format!("Requirement failed: {}", msg),
                                vec![(r.span, "here".to_string())],
                            ));
                        }
                    }
                }
            }

            match &block.term {
                Terminator::Br { dest, span } => {
                    pc = *cfg.index_of.get(&dest.name).ok_or_else(|| {
                        Error::new(format!("Unknown block label: {}", dest.name), vec![(*span, "here".to_string())])
                    })?;
                }
                Terminator::CondBr { cond, then_label, else_label, span } => {
                    let taken = if self.eval_cond(cond, &store)? {
                        &then_label.name
                    } else {
                        &else_label.name
                    };
                    pc = *cfg.index_of.get(taken).ok_or_else(|| {
                        Error::new(format!("Unknown block label: {}", taken), vec![(*span, "here".to_string())])
                    })?;
                }
                Terminator::Ret { value, span } => {
                    return match value {
                        Some(e) => {
                            let v = self.eval_expr(e, &store)?;
                            if v.is_undef() {
                                return Err(ub("read of undef in ret", *span));
                            }
                            Ok(Some(v))
                        }
                        None => Ok(None),
                    };
                }
                Terminator::Unreachable { span } => {
                    return Err(ub("reached unreachable", *span));
                }
            }
        }
    }

    fn eval_expr(&self, e: &Expr, store: &Store) -> Result<RuntimeValue, Error> {
        let mut v = self.eval_atom(&e.first, store)?;
        for tail in &e.rest {
            let mut right = self.eval_atom(&tail.atom, store)?;
            if v.is_undef() || right.is_undef() {
                return Err(ub("read of undef in expression", tail.span));
            }
            promote(&mut v, &mut right);
            match (&mut v, &right) {
                (
                    RuntimeValue::Int { value, bits },
                    RuntimeValue::Int { value: rv, .. },
                ) => {
                    let (sum, overflow) = if tail.op == AddOp::Plus {
                        value.overflowing_add(*rv)
                    } else {
                        value.overflowing_sub(*rv)
                    };
                    if overflow {
                        return Err(ub("signed integer overflow", tail.span));
                    }
                    *value = canonicalize(sum, *bits);
                }
                (
                    RuntimeValue::Float { value, .. },
                    RuntimeValue::Float { value: rv, .. },
                ) => {
                    if tail.op == AddOp::Plus {
                        *value += rv;
                    } else {
                        *value -= rv;
                    }
                }
                _ => {
                    return Err(Error::new(
                        "Expression operands must share a scalar kind".to_string(),
                        vec![(tail.span, "here".to_string())],
                    ))
                }
            }
        }
        Ok(v)
    }

    fn eval_atom(&self, a: &Atom, store: &Store) -> Result<RuntimeValue, Error> {
        match &a.kind {
            AtomKind::Op(op) => self.eval_op_atom(op, store),
            AtomKind::Unary(u) => {
                let r = self.eval_lvalue(&u.rval, store)?;
                match r {
                    RuntimeValue::Int { value, bits } => {
                        Ok(RuntimeValue::Int { value: canonicalize(!value, bits), bits })
                    }
                    RuntimeValue::Undef { .. } => Err(ub("read of undef in unary op", u.span)),
                    _ => Err(Error::new(
                        "Bitwise complement requires an integer operand".to_string(),
                        vec![(u.span, "here".to_string())],
                    )),
                }
            }
            AtomKind::Select(sel) => {
                if self.eval_cond(&sel.cond, store)? {
                    self.eval_select_val(&sel.vtrue, store)
                } else {
                    self.eval_select_val(&sel.vfalse, store)
                }
            }
            AtomKind::Coef(c) => self.eval_coef(&c.coef, store),
            AtomKind::RVal(rv) => self.eval_lvalue(&rv.rval, store),
            AtomKind::Cast(cast) => self.eval_cast(cast, store),
        }
    }

    fn eval_op_atom(&self, op: &OpAtom, store: &Store) -> Result<RuntimeValue, Error> {
        let mut c = self.eval_coef(&op.coef, store)?;
        let mut r = match &op.rhs {
            OpOperand::RVal(rv) => self.eval_lvalue(rv, store)?,
            OpOperand::Coef(rc) => self.eval_coef(rc, store)?,
        };
        if c.is_undef() || r.is_undef() {
            return Err(ub("read of undef in operation", op.span));
        }
        promote(&mut c, &mut r);

        match (&c, &r) {
            (
                RuntimeValue::Int { value: cv, bits },
                RuntimeValue::Int { value: rv, .. },
            ) => {
                let bits = *bits;
                let cv = *cv;
                let rv = *rv;
                let value = match op.op {
                    AtomOp::Mul => {
                        let (m, overflow) = cv.overflowing_mul(rv);
                        if overflow {
                            return Err(ub("signed integer overflow in multiplication", op.span));
                        }
                        m
                    }
                    AtomOp::Div => {
                        if rv == 0 {
                            return Err(ub("division by zero", op.span));
                        }
                        if cv == i64::min_value() && rv == -1 {
                            return Err(ub("signed integer overflow in division", op.span));
                        }
                        cv / rv
                    }
                    AtomOp::Mod => {
                        if rv == 0 {
                            return Err(ub("modulo by zero", op.span));
                        }
                        if cv == i64::min_value() && rv == -1 {
                            return Err(ub("signed integer overflow in modulo", op.span));
                        }
                        cv % rv
                    }
                    AtomOp::And => cv & rv,
                    AtomOp::Or => cv | rv,
                    AtomOp::Xor => cv ^ rv,
                    AtomOp::Shl | AtomOp::Shr | AtomOp::LShr => {
                        if rv < 0 || rv as u64 >= u64::from(bits.max(1)) {
                            return Err(ub("overshift", op.span));
                        }
                        match op.op {
                            AtomOp::Shl => cv << rv,
                            AtomOp::Shr => cv >> rv,
                            _ => {
                                let mask = if bits >= 64 {
                                    u64::max_value()
                                } else {
                                    (1u64 << bits) - 1
                                };
                                (((cv as u64) & mask) >> rv) as i64
                            }
                        }
                    }
                };
                Ok(RuntimeValue::Int { value: canonicalize(value, bits), bits })
            }
            (
                RuntimeValue::Float { value: cv, bits },
                RuntimeValue::Float { value: rv, .. },
            ) => {
                let value = match op.op {
                    AtomOp::Mul => cv * rv,
                    AtomOp::Div => cv / rv,
                    AtomOp::Mod => cv % rv,
                    _ => {
                        return Err(Error::new(
                            format!("Operator {} is not defined on floats", op.op),
                            vec![(op.span, "here".to_string())],
                        ))
                    }
                };
                Ok(RuntimeValue::Float { value, bits: *bits })
            }
            _ => Err(Error::new(
                "Operation operands must share a scalar kind".to_string(),
                vec![(op.span, "here".to_string())],
            )),
        }
    }

    fn eval_cast(&self, cast: &CastAtom, store: &Store) -> Result<RuntimeValue, Error> {
        let v = match &cast.src {
            CastSrc::Int(lit)   => RuntimeValue::Int { value: lit.value, bits: 64 },
            CastSrc::Float(lit) => RuntimeValue::Float { value: lit.value, bits: 64 },
            CastSrc::Sym(sid) => store.get(&sid.name).cloned().ok_or_else(|| {
                Error::new(
                    format!("Unbound symbol: {}", sid.name),
                    vec![(sid.span, "here".to_string())],
                )
            })?,
            CastSrc::LVal(lv) => self.eval_lvalue(lv, store)?,
        };
        if v.is_undef() {
            return Err(ub("read of undef in cast", cast.span));
        }

        if let Some(bits) = types::bit_width(&cast.dst) {
            let value = match v {
                RuntimeValue::Int { value, .. }     => value,
                RuntimeValue::Float { value, .. }   => value as i64,
                _ => {
                    return Err(Error::new(
                        "Aggregate value used in scalar context".to_string(),
                        vec![(cast.span, "here".to_string())],
                    ))
                }
            };
            return Ok(RuntimeValue::Int { value: canonicalize(value, bits), bits });
        }
        if types::float_kind(&cast.dst).is_some() {
            let bits = Self::float_bits_of(&cast.dst);
            let value = match v {
                RuntimeValue::Int { value, .. }     => value as f64,
                RuntimeValue::Float { value, .. }   => value,
                _ => {
                    return Err(Error::new(
                        "Aggregate value used in scalar context".to_string(),
                        vec![(cast.span, "here".to_string())],
                    ))
                }
            };
            let value = if bits == 32 { value as f32 as f64 } else { value };
            return Ok(RuntimeValue::Float { value, bits });
        }
        Err(Error::new(
            "Cannot cast to an aggregate type".to_string(),
            vec![(cast.span, "here".to_string())],
        ))
    }

    fn eval_coef(&self, c: &Coef, store: &Store) -> Result<RuntimeValue, Error> {
        match c {
            Coef::Int(lit)      => Ok(RuntimeValue::Int { value: lit.value, bits: 64 }),
            Coef::Float(lit)    => Ok(RuntimeValue::Float { value: lit.value, bits: 64 }),
            Coef::Id(id) => store.get(id.name()).cloned().ok_or_else(|| {
                Error::new(
                    format!("Unbound name: {}", id.name()),
                    vec![(id.span(), "here".to_string())],
                )
            }),
        }
    }

    fn eval_select_val(&self, sv: &SelectVal, store: &Store) -> Result<RuntimeValue, Error> {
        match sv {
            SelectVal::RVal(rv) => self.eval_lvalue(rv, store),
            SelectVal::Coef(c)  => self.eval_coef(c, store),
        }
    }

    fn eval_index(&self, idx: &Index, store: &Store, span: SourceSpan) -> Result<i64, Error> {
        let v = match idx {
            Index::Int(lit) => return Ok(lit.value),
            Index::Id(id) => store.get(id.name()).cloned().ok_or_else(|| {
                Error::new(
                    format!("Unbound name: {}", id.name()),
                    vec![(id.span(), "here".to_string())],
                )
            })?,
        };
        match v {
            RuntimeValue::Int { value, .. } => Ok(value),
            RuntimeValue::Undef { .. } => Err(ub("undef index", span)),
            _ => Err(Error::new(
                "Index must be an integer".to_string(),
                vec![(span, "here".to_string())],
            )),
        }
    }

    fn eval_lvalue(&self, lv: &LValue, store: &Store) -> Result<RuntimeValue, Error> {
        let mut cur = store.get(&lv.base.name).cloned().ok_or_else(|| {
            Error::new(
                format!("Unbound local: {}", lv.base.name),
                vec![(lv.base.span, "here".to_string())],
            )
        })?;
        for acc in &lv.accesses {
            match acc {
                Access::Index(ai) => {
                    let elements = match cur {
                        RuntimeValue::Array(elements) => elements,
                        RuntimeValue::Undef { .. } => {
                            return Err(ub("read through undef", ai.span))
                        }
                        _ => {
                            return Err(Error::new(
                                "Indexing non-array".to_string(),
                                vec![(ai.span, "here".to_string())],
                            ))
                        }
                    };
                    let i = self.eval_index(&ai.index, store, ai.span)?;
                    if i < 0 || i as usize >= elements.len() {
                        return Err(ub("array index out of bounds", ai.span));
                    }
                    cur = elements[i as usize].clone();
                }
                Access::Field(af) => {
                    let fields = match cur {
                        RuntimeValue::Struct(fields) => fields,
                        RuntimeValue::Undef { .. } => {
                            return Err(ub("read through undef", af.span))
                        }
                        _ => {
                            return Err(Error::new(
                                "Field access on non-struct".to_string(),
                                vec![(af.span, "here".to_string())],
                            ))
                        }
                    };
                    cur = fields.get(&af.field).cloned().ok_or_else(|| {
                        Error::new(
                            format!("Field not found: {}", af.field),
                            vec![(af.span, "here".to_string())],
                        )
                    })?;
                }
            }
        }
        if cur.is_undef() {
            return Err(ub("read of undef value", lv.span));
        }
        Ok(cur)
    }

    fn set_lvalue(&self, lv: &LValue, mut val: RuntimeValue, store: &mut Store) -> Result<(), Error> {
        // resolve indices first; the store borrow below is exclusive
        let mut indices = Vec::new();
        for acc in &lv.accesses {
            if let Access::Index(ai) = acc {
                indices.push(self.eval_index(&ai.index, store, ai.span)?);
            }
        }

        let mut cur = store.get_mut(&lv.base.name).ok_or_else(|| {
            Error::new(
                format!("Unbound local: {}", lv.base.name),
                vec![(lv.base.span, "here".to_string())],
            )
        })?;
        let mut idx_iter = indices.into_iter();
        for acc in &lv.accesses {
            let here: &mut RuntimeValue = cur;
            cur = match acc {
                Access::Index(ai) => {
                    let i = idx_iter.next().expect("index resolved above");
                    match here {
                        RuntimeValue::Array(elements) => {
                            if i < 0 || i as usize >= elements.len() {
                                return Err(ub("array index out of bounds", ai.span));
                            }
                            &mut elements[i as usize]
                        }
                        _ => {
                            return Err(Error::new(
                                "Indexing non-array".to_string(),
                                vec![(ai.span, "here".to_string())],
                            ))
                        }
                    }
                }
                Access::Field(af) => match here {
                    RuntimeValue::Struct(fields) => {
                        match fields.get_mut(&af.field) {
                            Some(v) => v,
                            None => {
                                return Err(Error::new(
                                    format!("Field not found: {}", af.field),
                                    vec![(af.span, "here".to_string())],
                                ))
                            }
                        }
                    }
                    _ => {
                        return Err(Error::new(
                            "Field access on non-struct".to_string(),
                            vec![(af.span, "here".to_string())],
                        ))
                    }
                },
            };
        }

        // integer stores adopt the destination width
        let dst_bits = match &*cur {
            RuntimeValue::Int { bits, .. } | RuntimeValue::Undef { bits } => Some(*bits),
            _ => None,
        };
        if let RuntimeValue::Int { value, bits } = &mut val {
            if let Some(dst_bits) = dst_bits {
                *bits = dst_bits;
                *value = canonicalize(*value, dst_bits);
            }
        }
        *cur = val;
        Ok(())
    }

    fn eval_cond(&self, c: &Cond, store: &Store) -> Result<bool, Error> {
        let mut l = self.eval_expr(&c.lhs, store)?;
        let mut r = self.eval_expr(&c.rhs, store)?;
        if l.is_undef() || r.is_undef() {
            return Err(ub("read of undef in condition", c.span));
        }
        promote(&mut l, &mut r);
        match (&l, &r) {
            (
                RuntimeValue::Int { value: lv, .. },
                RuntimeValue::Int { value: rv, .. },
            ) => Ok(match c.op {
                RelOp::Eq => lv == rv,
                RelOp::Ne => lv != rv,
                RelOp::Lt => lv < rv,
                RelOp::Le => lv <= rv,
                RelOp::Gt => lv > rv,
                RelOp::Ge => lv >= rv,
            }),
            (
                RuntimeValue::Float { value: lv, .. },
                RuntimeValue::Float { value: rv, .. },
            ) => Ok(match c.op {
                RelOp::Eq => lv == rv,
                RelOp::Ne => lv != rv,
                RelOp::Lt => lv < rv,
                RelOp::Le => lv <= rv,
                RelOp::Gt => lv > rv,
                RelOp::Ge => lv >= rv,
            }),
            _ => Err(Error::new(
                "Condition operands must share a scalar kind".to_string(),
                vec![(c.span, "here".to_string())],
            )),
        }
    }
}

/// Integer literals may land in float contexts; widen in place.
fn promote(a: &mut RuntimeValue, b: &mut RuntimeValue) {
    match (&*a, &*b) {
        (RuntimeValue::Float { .. }, RuntimeValue::Int { value, .. }) => {
            *b = RuntimeValue::Float { value: *value as f64, bits: 64 };
        }
        (RuntimeValue::Int { value, .. }, RuntimeValue::Float { .. }) => {
            *a = RuntimeValue::Float { value: *value as f64, bits: 64 };
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    fn run(src: &str, bindings: &[(&str, SymBinding)]) -> Result<Option<RuntimeValue>, Error> {
        let prog = parse_source(src).unwrap();
        let interp = Interpreter::new(&prog);
        let map: HashMap<String, SymBinding> =
            bindings.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        interp.run("@main", &map)
    }

    fn int_result(r: Result<Option<RuntimeValue>, Error>) -> i64 {
        match r.unwrap() {
            Some(RuntimeValue::Int { value, .. }) => value,
            other => panic!("expected int result, got {:?}", other),
        }
    }

    #[test]
    fn straight_line_arithmetic() {
        let v = run(
            "fun @main(): i32 { let mut %x: i32 = 4; ^entry: %x = %x * %x + 2; ret %x; }",
            &[],
        );
        assert_eq!(int_result(v), 18);
    }

    #[test]
    fn branches_follow_conditions() {
        let src = "fun @main(): i32 { sym %?c: value i32; let mut %x: i32 = 0; \
                   ^entry: br %?c == 0, ^t, ^f; \
                   ^t: %x = 1; br ^join; \
                   ^f: %x = 2; br ^join; \
                   ^join: ret %x; }";
        assert_eq!(int_result(run(src, &[("%?c", SymBinding::Int(0))])), 1);
        assert_eq!(int_result(run(src, &[("%?c", SymBinding::Int(5))])), 2);
    }

    #[test]
    fn narrow_width_wraps_to_declared_bits() {
        let v = run(
            "fun @main(): i8 { let mut %x: i8 = 100; ^entry: %x = %x & 127; ret %x + 27; }",
            &[],
        );
        assert_eq!(int_result(v), 127);
    }

    #[test]
    fn division_by_zero_is_ub() {
        let err = run(
            "fun @main(): i32 { sym %?d: value i32; let mut %x: i32 = 10; \
             ^entry: %x = %x / %?d; ret %x; }",
            &[("%?d", SymBinding::Int(0))],
        )
        .unwrap_err();
        assert!(err.message.contains("division by zero"), "{}", err);
    }

    #[test]
    fn overshift_is_ub() {
        let err = run(
            "fun @main(): i32 { let mut %x: i32 = 1; let mut %s: i32 = 40; \
             ^entry: %x = %x << %s; ret %x; }",
            &[],
        )
        .unwrap_err();
        assert!(err.message.contains("overshift"), "{}", err);
    }

    #[test]
    fn uninitialized_read_is_ub() {
        let err = run(
            "fun @main(): i32 { let mut %x: i32; ^entry: ret %x; }",
            &[],
        )
        .unwrap_err();
        assert!(err.message.starts_with("UB:"), "{}", err);
    }

    #[test]
    fn out_of_bounds_index_is_ub() {
        let err = run(
            "fun @main(): i32 { sym %?i: value i32; let mut %a: [4] i32 = 0; \
             ^entry: %a[%?i] = 1; ret %a[0]; }",
            &[("%?i", SymBinding::Int(5))],
        )
        .unwrap_err();
        assert!(err.message.contains("out of bounds"), "{}", err);
    }

    #[test]
    fn aggregates_update_in_place() {
        let v = run(
            "struct @P { a: i32; bs: [2] i32; } \
             fun @main(): i32 { let mut %p: @P = 0; \
             ^entry: %p.a = 3; %p.bs[1] = 4; ret %p.a + %p.bs[1]; }",
            &[],
        );
        assert_eq!(int_result(v), 7);
    }

    #[test]
    fn require_failure_reports_message() {
        let err = run(
            "fun @main(): i32 { ^entry: require 1 == 2, \"math works\"; ret 0; }",
            &[],
        )
        .unwrap_err();
        assert!(err.message.contains("math works"), "{}", err);
    }

    #[test]
    fn unreachable_is_fatal() {
        let err = run("fun @main(): i32 { ^entry: unreachable; }", &[]).unwrap_err();
        assert!(err.message.contains("unreachable"), "{}", err);
    }

    #[test]
    fn casts_truncate_and_extend() {
        let v = run(
            "fun @main(): i32 { let mut %x: i8 = -1; let mut %y: i32 = 0; \
             ^entry: %y = %x as i32; ret %y; }",
            &[],
        );
        assert_eq!(int_result(v), -1);
        let v = run(
            "fun @main(): i8 { let mut %x: i32 = 300; let mut %y: i8 = 0; \
             ^entry: %y = %x as i8; ret %y; }",
            &[],
        );
        assert_eq!(int_result(v), 44);
    }
}
