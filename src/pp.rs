//! Prints a program back to source syntax. Given a model, symbol
//! declarations are concretized with singleton set domains.

use crate::ast::*;
use crate::symbolic::ModelValue;
use std::collections::HashMap;
use std::fmt::Write;

pub struct Printer<'m> {
    out:    String,
    model:  Option<&'m HashMap<String, ModelValue>>,
}

pub fn print_program(prog: &Program, model: Option<&HashMap<String, ModelValue>>) -> String {
    let mut p = Printer { out: String::new(), model };
    p.program(prog);
    p.out
}

impl<'m> Printer<'m> {
    fn program(&mut self, prog: &Program) {
        for s in &prog.structs {
            self.struct_decl(s);
            self.out.push('\n');
        }
        for f in &prog.funs {
            self.fun_decl(f);
            self.out.push('\n');
        }
    }

    fn struct_decl(&mut self, s: &StructDecl) {
        let _ = writeln!(self.out, "struct {} {{", s.name.name);
        for f in &s.fields {
            let _ = writeln!(self.out, "  {}: {};", f.name, f.ty);
        }
        let _ = writeln!(self.out, "}}");
    }

    fn fun_decl(&mut self, f: &FunDecl) {
        let params: Vec<String> = f
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name.name, p.ty))
            .collect();
        let _ = writeln!(
            self.out,
            "fun {}({}): {} {{",
            f.name.name,
            params.join(", "),
            f.ret
        );
        for s in &f.syms {
            self.sym_decl(s);
        }
        for l in &f.lets {
            self.let_decl(l);
        }
        for b in &f.blocks {
            self.block(b);
        }
        let _ = writeln!(self.out, "}}");
    }

    fn sym_decl(&mut self, s: &SymDecl) {
        let _ = write!(self.out, "  sym {}: {} {}", s.name.name, s.kind, s.ty);
        if let Some(model) = self.model {
            if let Some(v) = model.get(&s.name.name) {
                match v {
                    ModelValue::Int(i)      => {
                        let _ = write!(self.out, " in {{{}}}", i);
                    }
                    ModelValue::Float(fv)   => {
                        let _ = write!(self.out, " in {{{}}}", fv);
                    }
                }
                let _ = writeln!(self.out, ";");
                return;
            }
        }
        match &s.domain {
            Some(Domain::Interval(iv)) => {
                let _ = write!(self.out, " in [{},{}]", iv.lo, iv.hi);
            }
            Some(Domain::Set(ds)) => {
                let values: Vec<String> = ds.values.iter().map(|v| v.to_string()).collect();
                let _ = write!(self.out, " in {{{}}}", values.join(","));
            }
            None => {}
        }
        let _ = writeln!(self.out, ";");
    }

    fn let_decl(&mut self, l: &LetDecl) {
        let _ = write!(
            self.out,
            "  let {}{}: {}",
            if l.mutable { "mut " } else { "" },
            l.name.name,
            l.ty
        );
        if let Some(init) = &l.init {
            let _ = write!(self.out, " = ");
            self.init_val(init);
        }
        let _ = writeln!(self.out, ";");
    }

    fn init_val(&mut self, iv: &InitVal) {
        match iv {
            InitVal::Int(l)     => {
                let _ = write!(self.out, "{}", l.value);
            }
            InitVal::Float(l)   => {
                let _ = write!(self.out, "{:?}", l.value);
            }
            InitVal::Sym(s)     => {
                let _ = write!(self.out, "{}", s.name);
            }
            InitVal::Local(l)   => {
                let _ = write!(self.out, "{}", l.name);
            }
            InitVal::Undef { .. } => {
                let _ = write!(self.out, "undef");
            }
            InitVal::Aggregate { elements, .. } => {
                let _ = write!(self.out, "{{");
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(self.out, ", ");
                    }
                    self.init_val(e);
                }
                let _ = write!(self.out, "}}");
            }
        }
    }

    fn block(&mut self, b: &Block) {
        let _ = writeln!(self.out, "  {}:", b.label.name);
        for ins in &b.instrs {
            match ins {
                Instr::Assign(a) => {
                    let _ = write!(self.out, "    ");
                    self.lvalue(&a.lhs);
                    let _ = write!(self.out, " = ");
                    self.expr(&a.rhs);
                    let _ = writeln!(self.out, ";");
                }
                Instr::Assume(a) => {
                    let _ = write!(self.out, "    assume ");
                    self.cond(&a.cond);
                    let _ = writeln!(self.out, ";");
                }
                Instr::Require(r) => {
                    let _ = write!(self.out, "    require ");
                    self.cond(&r.cond);
                    if let Some(msg) = &r.message {
                        let _ = write!(self.out, ", \"{}\"", msg);
                    }
                    let _ = writeln!(self.out, ";");
                }
            }
        }
        match &b.term {
            Terminator::Br { dest, .. } => {
                let _ = writeln!(self.out, "    br {};", dest.name);
            }
            Terminator::CondBr { cond, then_label, else_label, .. } => {
                let _ = write!(self.out, "    br ");
                self.cond(cond);
                let _ = writeln!(self.out, ", {}, {};", then_label.name, else_label.name);
            }
            Terminator::Ret { value, .. } => match value {
                Some(e) => {
                    let _ = write!(self.out, "    ret ");
                    self.expr(e);
                    let _ = writeln!(self.out, ";");
                }
                None => {
                    let _ = writeln!(self.out, "    ret;");
                }
            },
            Terminator::Unreachable { .. } => {
                let _ = writeln!(self.out, "    unreachable;");
            }
        }
    }

    fn cond(&mut self, c: &Cond) {
        self.expr(&c.lhs);
        let _ = write!(self.out, " {} ", c.op);
        self.expr(&c.rhs);
    }

    fn expr(&mut self, e: &Expr) {
        self.atom(&e.first);
        for t in &e.rest {
            let _ = write!(self.out, " {} ", if t.op == AddOp::Plus { "+" } else { "-" });
            self.atom(&t.atom);
        }
    }

    fn atom(&mut self, a: &Atom) {
        match &a.kind {
            AtomKind::Op(op) => {
                self.coef(&op.coef);
                let _ = write!(self.out, " {} ", op.op);
                match &op.rhs {
                    OpOperand::RVal(rv) => self.lvalue(rv),
                    OpOperand::Coef(c)  => self.coef(c),
                }
            }
            AtomKind::Select(sel) => {
                let _ = write!(self.out, "select ");
                self.cond(&sel.cond);
                let _ = write!(self.out, ", ");
                self.select_val(&sel.vtrue);
                let _ = write!(self.out, ", ");
                self.select_val(&sel.vfalse);
            }
            AtomKind::Coef(c) => self.coef(&c.coef),
            AtomKind::RVal(rv) => self.lvalue(&rv.rval),
            AtomKind::Cast(cast) => {
                match &cast.src {
                    CastSrc::Int(l)     => {
                        let _ = write!(self.out, "{}", l.value);
                    }
                    CastSrc::Float(l)   => {
                        let _ = write!(self.out, "{:?}", l.value);
                    }
                    CastSrc::Sym(s)     => {
                        let _ = write!(self.out, "{}", s.name);
                    }
                    CastSrc::LVal(lv)   => self.lvalue(lv),
                }
                let _ = write!(self.out, " as {}", cast.dst);
            }
            AtomKind::Unary(u) => {
                let _ = write!(self.out, "~");
                self.lvalue(&u.rval);
            }
        }
    }

    fn select_val(&mut self, sv: &SelectVal) {
        match sv {
            SelectVal::RVal(rv) => self.lvalue(rv),
            SelectVal::Coef(c)  => self.coef(c),
        }
    }

    fn coef(&mut self, c: &Coef) {
        match c {
            Coef::Int(l)    => {
                let _ = write!(self.out, "{}", l.value);
            }
            Coef::Float(l)  => {
                let _ = write!(self.out, "{:?}", l.value);
            }
            Coef::Id(id)    => {
                let _ = write!(self.out, "{}", id.name());
            }
        }
    }

    fn lvalue(&mut self, lv: &LValue) {
        let _ = write!(self.out, "{}", lv.base.name);
        for acc in &lv.accesses {
            match acc {
                Access::Index(ai) => {
                    let _ = write!(self.out, "[");
                    match &ai.index {
                        Index::Int(l)   => {
                            let _ = write!(self.out, "{}", l.value);
                        }
                        Index::Id(id)   => {
                            let _ = write!(self.out, "{}", id.name());
                        }
                    }
                    let _ = write!(self.out, "]");
                }
                Access::Field(af) => {
                    let _ = write!(self.out, ".{}", af.field);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;
    use crate::symbolic::ModelValue;

    const SRC: &str = "struct @P { a: i32; b: [2] i64; } \
        fun @f(%p: @P, %i: i32): i32 { \
        sym %?k: value i32 in [0,10]; \
        let mut %x: i32 = 0; \
        ^entry: %x = %?k * 3 + select %i == 0, 1, 0; \
        require %x != 0, \"nonzero\"; \
        br %x > 5, ^hi, ^lo; \
        ^hi: ret %x; \
        ^lo: ret %p.b[%i] as i32; }";

    #[test]
    fn round_trips_through_the_parser() {
        let prog = parse_source(SRC).unwrap();
        let once = print_program(&prog, None);
        let reparsed = parse_source(&once).unwrap_or_else(|e| {
            panic!("printed program failed to reparse: {}\n{}", e, once)
        });
        let twice = print_program(&reparsed, None);
        assert_eq!(once, twice);
    }

    #[test]
    fn model_substitution_concretizes_domains() {
        let prog = parse_source(SRC).unwrap();
        let mut model = HashMap::new();
        model.insert("%?k".to_string(), ModelValue::Int(4));
        let text = print_program(&prog, Some(&model));
        assert!(text.contains("sym %?k: value i32 in {4};"), "{}", text);
    }
}
