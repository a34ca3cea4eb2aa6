//! C backend. One translation unit: structs become C structs, functions
//! become mangled C functions with labels and gotos, symbols become
//! external accessor functions the host links in.

use crate::ast::*;
use crate::types;
use std::fmt::Write;

pub struct Emitter {
    out:        String,
    indent:     usize,
    cur_fun:    String,
}

pub fn emit(prog: &Program) -> String {
    let mut em = Emitter { out: String::new(), indent: 0, cur_fun: String::new() };
    em.program(prog);
    em.out
}

fn strip_sigil(name: &str) -> &str {
    let name = name
        .strip_prefix("@?")
        .or_else(|| name.strip_prefix("%?"))
        .unwrap_or(name);
    name.trim_start_matches(|c| c == '@' || c == '%' || c == '^')
}

fn mangle(name: &str) -> String {
    format!("symir_{}", strip_sigil(name))
}

fn sym_accessor(fun: &str, sym: &str) -> String {
    format!("{}__{}", mangle(fun), mangle(sym))
}

impl Emitter {
    fn line(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn scalar_c_type(t: &Type) -> &'static str {
        if let Some(bits) = types::bit_width(t) {
            return match bits {
                0..=8 => "int8_t",
                9..=16 => "int16_t",
                17..=32 => "int32_t",
                _ => "int64_t",
            };
        }
        match types::float_kind(t) {
            Some(FloatKind::F32) => "float",
            Some(FloatKind::F64) => "double",
            None => "void",
        }
    }

    fn type_prefix(&mut self, t: &Type) {
        match &t.kind {
            TypeKind::Struct { name } => {
                let _ = write!(self.out, "struct {}", mangle(&name.name));
            }
            TypeKind::Array { elem, .. } => self.type_prefix(elem),
            _ => {
                let _ = write!(self.out, "{}", Self::scalar_c_type(t));
            }
        }
    }

    fn array_dims(t: &TypeRef) -> (Vec<u64>, TypeRef) {
        let mut dims = Vec::new();
        let mut cur = t.clone();
        while let Some((size, elem)) = types::as_array(&cur) {
            dims.push(size);
            cur = elem.clone();
        }
        (dims, cur)
    }

    fn declarator(&mut self, name: &str, t: &TypeRef) {
        let (dims, base) = Self::array_dims(t);
        self.type_prefix(&base);
        let _ = write!(self.out, " {}", name);
        for d in dims {
            let _ = write!(self.out, "[{}]", d);
        }
    }

    fn program(&mut self, prog: &Program) {
        self.out.push_str("#include <stdint.h>\n");
        self.out.push_str("#include <stdbool.h>\n");
        self.out.push_str("#include <assert.h>\n\n");

        for s in &prog.structs {
            let _ = writeln!(self.out, "struct {};", mangle(&s.name.name));
        }
        self.out.push('\n');

        for s in &prog.structs {
            let _ = writeln!(self.out, "struct {} {{", mangle(&s.name.name));
            self.indent += 1;
            for f in &s.fields {
                self.line();
                let fname = f.name.clone();
                self.declarator(&fname, &f.ty);
                self.out.push_str(";\n");
            }
            self.indent -= 1;
            self.out.push_str("};\n\n");
        }

        for f in &prog.funs {
            self.function(f);
        }
    }

    fn function(&mut self, f: &FunDecl) {
        self.cur_fun = f.name.name.clone();

        for s in &f.syms {
            self.out.push_str("extern ");
            self.type_prefix(&s.ty);
            let _ = writeln!(self.out, " {}(void);", sym_accessor(&f.name.name, &s.name.name));
        }
        if !f.syms.is_empty() {
            self.out.push('\n');
        }

        self.type_prefix(&f.ret);
        let _ = write!(self.out, " {}(", mangle(&f.name.name));
        if f.params.is_empty() {
            self.out.push_str("void");
        } else {
            for (i, p) in f.params.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                let pname = mangle(&p.name.name);
                self.declarator(&pname, &p.ty);
            }
        }
        self.out.push_str(") {\n");
        self.indent += 1;

        for l in &f.lets {
            self.line();
            let lname = mangle(&l.name.name);
            self.declarator(&lname, &l.ty);
            self.out.push_str(";\n");
            self.emit_let_init(l);
        }

        for b in &f.blocks {
            let _ = writeln!(self.out, "{}: ;", mangle(&b.label.name));
            for ins in &b.instrs {
                self.line();
                match ins {
                    Instr::Assign(a) => {
                        self.lvalue(&a.lhs);
                        self.out.push_str(" = ");
                        self.expr(&a.rhs);
                        self.out.push_str(";\n");
                    }
                    Instr::Assume(a) => {
                        self.out.push_str("/* assume ");
                        self.cond(&a.cond);
                        self.out.push_str(" */\n");
                    }
                    Instr::Require(r) => {
                        self.out.push_str("assert(");
                        self.cond(&r.cond);
                        if let Some(msg) = &r.message {
                            let _ = write!(self.out, " && \"{}\"", msg);
                        }
                        self.out.push_str(");\n");
                    }
                }
            }
            self.line();
            match &b.term {
                Terminator::Br { dest, .. } => {
                    let _ = writeln!(self.out, "goto {};", mangle(&dest.name));
                }
                Terminator::CondBr { cond, then_label, else_label, .. } => {
                    self.out.push_str("if (");
                    self.cond(cond);
                    let _ = writeln!(self.out, ") goto {};", mangle(&then_label.name));
                    self.line();
                    let _ = writeln!(self.out, "else goto {};", mangle(&else_label.name));
                }
                Terminator::Ret { value, .. } => {
                    self.out.push_str("return");
                    if let Some(e) = value {
                        self.out.push(' ');
                        self.expr(e);
                    }
                    self.out.push_str(";\n");
                }
                Terminator::Unreachable { .. } => {
                    self.out.push_str("/* unreachable */\n");
                }
            }
        }

        self.indent -= 1;
        self.out.push_str("}\n\n");
    }

    fn emit_let_init(&mut self, l: &LetDecl) {
        let (dims, _) = Self::array_dims(&l.ty);
        let scalar_init = match &l.init {
            Some(InitVal::Int(lit))     => Some(format!("{}", lit.value)),
            Some(InitVal::Float(lit))   => Some(format!("{}", lit.value)),
            Some(InitVal::Local(lid))   => Some(mangle(&lid.name)),
            Some(InitVal::Sym(sid)) => {
                Some(format!("{}()", sym_accessor(&self.cur_fun, &sid.name)))
            }
            Some(InitVal::Undef { .. }) | None => {
                if dims.is_empty() && types::as_struct(&l.ty).is_none() {
                    Some("0".to_string())
                } else {
                    None
                }
            }
            Some(InitVal::Aggregate { .. }) => None,
        };

        if let Some(init) = scalar_init {
            if dims.is_empty() {
                self.line();
                let _ = writeln!(self.out, "{} = {};", mangle(&l.name.name), init);
            } else {
                let total: u64 = dims.iter().product();
                self.line();
                let _ = writeln!(
                    self.out,
                    "for (int __i = 0; __i < {}; ++__i) ((int32_t*){})[__i] = {};",
                    total,
                    mangle(&l.name.name),
                    init
                );
            }
            return;
        }

        if let Some(InitVal::Aggregate { elements, .. }) = &l.init {
            for (i, e) in elements.iter().enumerate() {
                if let InitVal::Int(lit) = e {
                    self.line();
                    let _ = writeln!(
                        self.out,
                        "{}[{}] = {};",
                        mangle(&l.name.name),
                        i,
                        lit.value
                    );
                }
            }
        }
    }

    fn expr(&mut self, e: &Expr) {
        self.out.push('(');
        self.atom(&e.first);
        for t in &e.rest {
            self.out
                .push_str(if t.op == AddOp::Plus { " + " } else { " - " });
            self.atom(&t.atom);
        }
        self.out.push(')');
    }

    fn atom(&mut self, a: &Atom) {
        match &a.kind {
            AtomKind::Op(op) => {
                match op.op {
                    AtomOp::LShr => {
                        // logical shift through an unsigned detour
                        self.out.push_str("(int64_t)((uint64_t)");
                        self.coef(&op.coef);
                        self.out.push_str(" >> ");
                        self.op_rhs(&op.rhs);
                        self.out.push(')');
                    }
                    _ => {
                        self.coef(&op.coef);
                        let _ = write!(self.out, " {} ", op.op);
                        self.op_rhs(&op.rhs);
                    }
                }
            }
            AtomKind::Select(sel) => {
                self.out.push('(');
                self.cond(&sel.cond);
                self.out.push_str(" ? ");
                self.select_val(&sel.vtrue);
                self.out.push_str(" : ");
                self.select_val(&sel.vfalse);
                self.out.push(')');
            }
            AtomKind::Coef(c) => self.coef(&c.coef),
            AtomKind::RVal(rv) => self.lvalue(&rv.rval),
            AtomKind::Cast(cast) => {
                self.out.push('(');
                self.out.push('(');
                self.type_prefix(&cast.dst);
                self.out.push(')');
                match &cast.src {
                    CastSrc::Int(l)     => {
                        let _ = write!(self.out, "{}", l.value);
                    }
                    CastSrc::Float(l)   => {
                        let _ = write!(self.out, "{}", l.value);
                    }
                    CastSrc::Sym(s)     => {
                        let _ = write!(self.out, "{}()", sym_accessor(&self.cur_fun, &s.name));
                    }
                    CastSrc::LVal(lv)   => self.lvalue(lv),
                }
                self.out.push(')');
            }
            AtomKind::Unary(u) => {
                self.out.push('~');
                self.lvalue(&u.rval);
            }
        }
    }

    fn op_rhs(&mut self, rhs: &OpOperand) {
        match rhs {
            OpOperand::RVal(rv) => self.lvalue(rv),
            OpOperand::Coef(c)  => self.coef(c),
        }
    }

    fn select_val(&mut self, v: &SelectVal) {
        match v {
            SelectVal::RVal(rv) => self.lvalue(rv),
            SelectVal::Coef(c)  => self.coef(c),
        }
    }

    fn cond(&mut self, c: &Cond) {
        self.expr(&c.lhs);
        let _ = write!(self.out, " {} ", c.op);
        self.expr(&c.rhs);
    }

    fn lvalue(&mut self, lv: &LValue) {
        let _ = write!(self.out, "{}", mangle(&lv.base.name));
        for acc in &lv.accesses {
            match acc {
                Access::Index(ai) => {
                    self.out.push('[');
                    match &ai.index {
                        Index::Int(l) => {
                            let _ = write!(self.out, "{}", l.value);
                        }
                        Index::Id(LocalOrSym::Local(lid)) => {
                            let _ = write!(self.out, "{}", mangle(&lid.name));
                        }
                        Index::Id(LocalOrSym::Sym(sid)) => {
                            let _ = write!(
                                self.out,
                                "{}()",
                                sym_accessor(&self.cur_fun, &sid.name)
                            );
                        }
                    }
                    self.out.push(']');
                }
                Access::Field(af) => {
                    let _ = write!(self.out, ".{}", af.field);
                }
            }
        }
    }

    fn coef(&mut self, c: &Coef) {
        match c {
            Coef::Int(l)    => {
                let _ = write!(self.out, "{}", l.value);
            }
            Coef::Float(l)  => {
                let _ = write!(self.out, "{}", l.value);
            }
            Coef::Id(LocalOrSym::Local(lid)) => {
                let _ = write!(self.out, "{}", mangle(&lid.name));
            }
            Coef::Id(LocalOrSym::Sym(sid)) => {
                let _ = write!(self.out, "{}()", sym_accessor(&self.cur_fun, &sid.name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    #[test]
    fn emits_structs_functions_and_symbols() {
        let prog = parse_source(
            "struct @P { a: i32; bs: [2] i64; } \
             fun @f(%p: @P, %n: i32): i32 { sym %?k: value i32; \
             let mut %x: i32 = 0; \
             ^entry: %x = %?k * %n; require %x > 0, \"positive\"; \
             br %x == 0, ^z, ^nz; \
             ^z: ret 0; \
             ^nz: ret %x; }",
        )
        .unwrap();
        let c = emit(&prog);
        assert!(c.contains("struct symir_P {"), "{}", c);
        assert!(c.contains("int64_t bs[2];"), "{}", c);
        assert!(c.contains("extern int32_t symir_f__symir_k(void);"), "{}", c);
        assert!(c.contains("int32_t symir_f(struct symir_P symir_p, int32_t symir_n)"), "{}", c);
        assert!(c.contains("symir_x = (symir_f__symir_k() * symir_n);"), "{}", c);
        assert!(c.contains("assert((symir_x) > (0) && \"positive\");"), "{}", c);
        assert!(c.contains("goto symir_nz;"), "{}", c);
    }

    #[test]
    fn float_types_map_to_c_floats() {
        let prog = parse_source(
            "fun @f(%a: f32, %b: f64): i32 { ^entry: ret 0; }",
        )
        .unwrap();
        let c = emit(&prog);
        assert!(c.contains("float symir_a"), "{}", c);
        assert!(c.contains("double symir_b"), "{}", c);
    }
}
