//! WebAssembly text backend. Scalar locals become wasm locals, aggregates
//! live in linear memory below a module stack pointer, and control flow is
//! a `loop` + `br_table` dispatch over a `$pc` local. Sub-width integers
//! are masked and sign-extended at the boundaries.

use crate::ast::*;
use crate::types;
use std::collections::HashMap;
use std::fmt::Write;

struct FieldLayout {
    offset: u32,
    ty:     TypeRef,
}

struct StructLayout {
    fields:      HashMap<String, FieldLayout>,
    field_names: Vec<String>,
    total_size:  u32,
}

#[derive(Clone)]
struct LocalInfo {
    wasm_type:      &'static str,
    bitwidth:       u32,
    is_aggregate:   bool,
    offset:         u32,
    ty:             TypeRef,
}

pub struct Emitter {
    out:            String,
    indent:         usize,
    layouts:        HashMap<String, StructLayout>,
    locals:         HashMap<String, LocalInfo>,
    cur_fun:        String,
    stack_size:     u32,
    module_tags:    bool,
}

pub fn emit(prog: &Program) -> String {
    emit_with_options(prog, true)
}

pub fn emit_with_options(prog: &Program, module_tags: bool) -> String {
    let mut em = Emitter {
        out:            String::new(),
        indent:         0,
        layouts:        HashMap::new(),
        locals:         HashMap::new(),
        cur_fun:        String::new(),
        stack_size:     0,
        module_tags,
    };
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
    format!("${}", strip_sigil(name))
}

fn accessor(fun: &str, sym: &str) -> String {
    format!("{}__{}", strip_sigil(fun), strip_sigil(sym))
}

fn wasm_type(t: &Type) -> &'static str {
    if let Some(bits) = types::bit_width(t) {
        return if bits > 32 { "i64" } else { "i32" };
    }
    "i32"
}

fn int_width(t: &Type) -> u32 {
    types::bit_width(t).unwrap_or(32)
}

impl Emitter {
    fn line(&mut self, s: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(s);
        self.out.push('\n');
    }

    fn type_size(&self, t: &Type) -> u32 {
        if let Some(bits) = types::bit_width(t) {
            return match bits {
                0..=8 => 1,
                9..=16 => 2,
                17..=32 => 4,
                _ => 8,
            };
        }
        if let Some(sname) = types::as_struct(t) {
            return self.layouts.get(sname).map(|l| l.total_size).unwrap_or(0);
        }
        if let Some((size, elem)) = types::as_array(t) {
            return size as u32 * self.type_size(elem);
        }
        4
    }

    fn compute_layouts(&mut self, prog: &Program) {
        for s in &prog.structs {
            let mut fields = HashMap::new();
            let mut field_names = Vec::new();
            let mut offset = 0u32;
            for f in &s.fields {
                let size = self.type_size(&f.ty);
                if size >= 8 && offset % 8 != 0 {
                    offset += 8 - (offset % 8);
                } else if size >= 4 && offset % 4 != 0 {
                    offset += 4 - (offset % 4);
                }
                fields.insert(f.name.clone(), FieldLayout { offset, ty: f.ty.clone() });
                field_names.push(f.name.clone());
                offset += size;
            }
            if offset % 8 != 0 {
                offset += 8 - (offset % 8);
            }
            self.layouts.insert(
                s.name.name.clone(),
                StructLayout { fields, field_names, total_size: offset },
            );
        }
    }

    fn emit_mask(&mut self, bitwidth: u32) {
        if bitwidth == 32 || bitwidth == 64 {
            return;
        }
        if bitwidth < 32 {
            let mask = (1u64 << bitwidth) - 1;
            self.line(&format!("i32.const {}", mask));
            self.line("i32.and");
        } else {
            let mask = (1u64 << bitwidth) - 1;
            self.line(&format!("i64.const {}", mask));
            self.line("i64.and");
        }
    }

    fn emit_sign_extend(&mut self, from: u32, to: u32) {
        if from == to {
            return;
        }
        if to == 32 {
            self.line(&format!("i32.const {}", 32 - from));
            self.line("i32.shl");
            self.line(&format!("i32.const {}", 32 - from));
            self.line("i32.shr_s");
        } else if from < 32 {
            self.emit_sign_extend(from, 32);
            self.line("i64.extend_i32_s");
        } else if from == 32 {
            self.line("i64.extend_i32_s");
        } else {
            self.line(&format!("i64.const {}", 64 - from));
            self.line("i64.shl");
            self.line(&format!("i64.const {}", 64 - from));
            self.line("i64.shr_s");
        }
    }

    fn program(&mut self, prog: &Program) {
        self.compute_layouts(prog);
        if self.module_tags {
            self.out.push_str("(module\n");
            self.indent += 1;
        }

        for f in &prog.funs {
            for s in &f.syms {
                self.line(&format!(
                    "(import \"{}\" \"{}\" (func {} (result {})))",
                    strip_sigil(&f.name.name),
                    strip_sigil(&s.name.name),
                    mangle(&accessor(&f.name.name, &s.name.name)),
                    wasm_type(&s.ty)
                ));
            }
        }

        self.line("(memory 1)");
        self.line("(global $__stack_pointer (mut i32) (i32.const 65536))");

        for f in &prog.funs {
            self.function(f);
        }

        if self.module_tags {
            self.indent -= 1;
            self.out.push_str(")\n");
        }
    }

    fn function(&mut self, f: &FunDecl) {
        self.cur_fun = f.name.name.clone();
        self.locals.clear();
        self.stack_size = 0;

        for p in &f.params {
            self.locals.insert(
                p.name.name.clone(),
                LocalInfo {
                    wasm_type:      wasm_type(&p.ty),
                    bitwidth:       int_width(&p.ty),
                    is_aggregate:   false,
                    offset:         0,
                    ty:             p.ty.clone(),
                },
            );
        }
        for l in &f.lets {
            if types::is_aggregate(&l.ty) {
                let size = self.type_size(&l.ty);
                self.stack_size += size;
                self.locals.insert(
                    l.name.name.clone(),
                    LocalInfo {
                        wasm_type:      "i32",
                        bitwidth:       int_width(&l.ty),
                        is_aggregate:   true,
                        offset:         self.stack_size,
                        ty:             l.ty.clone(),
                    },
                );
            } else {
                self.locals.insert(
                    l.name.name.clone(),
                    LocalInfo {
                        wasm_type:      wasm_type(&l.ty),
                        bitwidth:       int_width(&l.ty),
                        is_aggregate:   false,
                        offset:         0,
                        ty:             l.ty.clone(),
                    },
                );
            }
        }

        let mut header = format!("(func {}", mangle(&f.name.name));
        for p in &f.params {
            let _ = write!(
                header,
                " (param {} {})",
                mangle(&p.name.name),
                wasm_type(&p.ty)
            );
        }
        let _ = write!(header, " (result {})", wasm_type(&f.ret));
        self.line(&header);
        self.indent += 1;

        self.line("(local $pc i32)");
        self.line("(local $__old_sp i32)");
        for l in &f.lets {
            if !self.locals[&l.name.name].is_aggregate {
                let wt = self.locals[&l.name.name].wasm_type;
                self.line(&format!("(local {} {})", mangle(&l.name.name), wt));
            }
        }

        if self.stack_size > 0 {
            self.line("global.get $__stack_pointer");
            self.line("local.set $__old_sp");
            self.line("global.get $__stack_pointer");
            self.line(&format!("i32.const {}", self.stack_size));
            self.line("i32.sub");
            self.line("global.set $__stack_pointer");
        }

        for l in &f.lets {
            if let Some(init) = &l.init {
                let info = self.locals[&l.name.name].clone();
                if info.is_aggregate {
                    self.init_val(init, &l.ty, info.offset, 0);
                } else if let InitVal::Int(lit) = init {
                    let prefix = if info.bitwidth <= 32 { "i32" } else { "i64" };
                    self.line(&format!("{}.const {}", prefix, lit.value));
                    self.line(&format!("local.set {}", mangle(&l.name.name)));
                }
            }
        }

        self.line("i32.const 0");
        self.line("local.set $pc");

        self.line("(loop $loop");
        self.indent += 1;

        for b in &f.blocks {
            self.line(&format!("(block {}", mangle(&b.label.name)));
            self.indent += 1;
        }

        self.line("local.get $pc");
        let mut table = String::from("br_table");
        for i in (0..f.blocks.len()).rev() {
            let _ = write!(table, " {}", i);
        }
        table.push_str(" 0");
        self.line(&table);

        for i in (0..f.blocks.len()).rev() {
            self.indent -= 1;
            self.line(&format!(") ;; {}", f.blocks[i].label.name));
            self.block_body(f, &f.blocks[i]);
        }

        self.indent -= 1;
        self.line(") ;; loop");

        // dispatch fell through; keep the validator satisfied
        let prefix = if int_width(&f.ret) <= 32 { "i32" } else { "i64" };
        self.line(&format!("{}.const 0", prefix));

        self.indent -= 1;
        self.line(")");
        self.line(&format!(
            "(export \"{}\" (func {}))",
            strip_sigil(&f.name.name),
            mangle(&f.name.name)
        ));
        self.out.push('\n');
    }

    fn block_body(&mut self, f: &FunDecl, b: &Block) {
        for ins in &b.instrs {
            match ins {
                Instr::Assign(a) => {
                    let info = self.locals[&a.lhs.base.name].clone();
                    if info.is_aggregate || !a.lhs.accesses.is_empty() {
                        self.address_of(&a.lhs);
                        self.expr(&a.rhs, info.bitwidth);
                        self.line(if info.bitwidth <= 32 { "i32.store" } else { "i64.store" });
                    } else {
                        self.expr(&a.rhs, info.bitwidth);
                        self.line(&format!("local.set {}", mangle(&a.lhs.base.name)));
                    }
                }
                Instr::Assume(_) => {}
                Instr::Require(r) => {
                    self.cond(&r.cond);
                    self.line("i32.eqz");
                    self.line("if");
                    self.indent += 1;
                    self.line("unreachable");
                    self.indent -= 1;
                    self.line("end");
                }
            }
        }

        let block_index = |label: &str| -> usize {
            f.blocks.iter().position(|b| b.label.name == label).unwrap_or(0)
        };

        match &b.term {
            Terminator::Br { dest, .. } => {
                self.line(&format!("i32.const {}", block_index(&dest.name)));
                self.line("local.set $pc");
                self.line("br $loop");
            }
            Terminator::CondBr { cond, then_label, else_label, .. } => {
                self.cond(cond);
                self.line("if");
                self.indent += 1;
                self.line(&format!("i32.const {}", block_index(&then_label.name)));
                self.line("local.set $pc");
                self.indent -= 1;
                self.line("else");
                self.indent += 1;
                self.line(&format!("i32.const {}", block_index(&else_label.name)));
                self.line("local.set $pc");
                self.indent -= 1;
                self.line("end");
                self.line("br $loop");
            }
            Terminator::Ret { value, .. } => {
                if let Some(e) = value {
                    self.expr(e, int_width(&f.ret));
                }
                if self.stack_size > 0 {
                    self.line("local.get $__old_sp");
                    self.line("global.set $__stack_pointer");
                }
                self.line("return");
            }
            Terminator::Unreachable { .. } => {
                self.line("unreachable");
            }
        }
    }

    fn expr(&mut self, e: &Expr, target_width: u32) {
        self.atom(&e.first, target_width);
        for t in &e.rest {
            self.atom(&t.atom, target_width);
            if target_width <= 32 {
                self.line(if t.op == AddOp::Plus { "i32.add" } else { "i32.sub" });
            } else {
                self.line(if t.op == AddOp::Plus { "i64.add" } else { "i64.sub" });
            }
            self.emit_mask(target_width);
        }
    }

    fn atom(&mut self, a: &Atom, target_width: u32) {
        match &a.kind {
            AtomKind::Coef(c) => self.coef(&c.coef, target_width),
            AtomKind::RVal(rv) => self.load_lvalue(&rv.rval),
            AtomKind::Op(op) => {
                self.coef(&op.coef, target_width);
                match &op.rhs {
                    OpOperand::RVal(rv) => self.load_lvalue(rv),
                    OpOperand::Coef(c)  => self.coef(c, target_width),
                }
                let prefix = if target_width <= 32 { "i32" } else { "i64" };
                let op_str = match op.op {
                    AtomOp::Mul  => "mul",
                    AtomOp::Div  => "div_s",
                    AtomOp::Mod  => "rem_s",
                    AtomOp::And  => "and",
                    AtomOp::Or   => "or",
                    AtomOp::Xor  => "xor",
                    AtomOp::Shl  => "shl",
                    AtomOp::Shr  => "shr_s",
                    AtomOp::LShr => "shr_u",
                };
                self.line(&format!("{}.{}", prefix, op_str));
                self.emit_mask(target_width);
            }
            AtomKind::Select(sel) => {
                self.cond(&sel.cond);
                let result = if target_width <= 32 { "i32" } else { "i64" };
                self.line(&format!("if (result {})", result));
                self.indent += 1;
                self.select_val(&sel.vtrue, target_width);
                self.indent -= 1;
                self.line("else");
                self.indent += 1;
                self.select_val(&sel.vfalse, target_width);
                self.indent -= 1;
                self.line("end");
            }
            AtomKind::Unary(u) => {
                self.load_lvalue(&u.rval);
                if target_width <= 32 {
                    self.line("i32.const -1");
                    self.line("i32.xor");
                } else {
                    self.line("i64.const -1");
                    self.line("i64.xor");
                }
                self.emit_mask(target_width);
            }
            AtomKind::Cast(cast) => {
                let src_width = match &cast.src {
                    CastSrc::Int(lit) => {
                        let w = if lit.value > i64::from(i32::max_value())
                            || lit.value < i64::from(i32::min_value())
                        {
                            64
                        } else {
                            32
                        };
                        self.line(&format!(
                            "{}.const {}",
                            if w <= 32 { "i32" } else { "i64" },
                            lit.value
                        ));
                        w
                    }
                    CastSrc::Float(lit) => {
                        self.line(&format!("i32.const {}", lit.value as i64));
                        32
                    }
                    CastSrc::Sym(sid) => {
                        self.line(&format!(
                            "call {}",
                            mangle(&accessor(&self.cur_fun.clone(), &sid.name))
                        ));
                        32
                    }
                    CastSrc::LVal(lv) => {
                        let w = self
                            .locals
                            .get(&lv.base.name)
                            .map(|i| i.bitwidth)
                            .unwrap_or(32);
                        self.load_lvalue(lv);
                        if w > 32 {
                            64
                        } else {
                            32
                        }
                    }
                };
                let dst_width = int_width(&cast.dst);
                if src_width <= 32 && dst_width > 32 {
                    self.line("i64.extend_i32_s");
                } else if src_width > 32 && dst_width <= 32 {
                    self.line("i32.wrap_i64");
                }
                self.emit_mask(dst_width);
            }
        }
    }

    fn cond(&mut self, c: &Cond) {
        let width = 32;
        self.expr(&c.lhs, width);
        self.expr(&c.rhs, width);
        let op_str = match c.op {
            RelOp::Eq => "eq",
            RelOp::Ne => "ne",
            RelOp::Lt => "lt_s",
            RelOp::Le => "le_s",
            RelOp::Gt => "gt_s",
            RelOp::Ge => "ge_s",
        };
        self.line(&format!("i32.{}", op_str));
    }

    fn address_of(&mut self, lv: &LValue) {
        let info = self.locals[&lv.base.name].clone();
        self.line("local.get $__old_sp");
        self.line(&format!("i32.const {}", info.offset));
        self.line("i32.sub");

        let mut cur = info.ty;
        for acc in &lv.accesses {
            match acc {
                Access::Index(ai) => {
                    let (_, elem) = match types::as_array(&cur) {
                        Some(v) => v,
                        None => return,
                    };
                    let elem = elem.clone();
                    let elem_size = self.type_size(&elem);
                    self.index(&ai.index);
                    self.line(&format!("i32.const {}", elem_size));
                    self.line("i32.mul");
                    self.line("i32.add");
                    cur = elem;
                }
                Access::Field(af) => {
                    let sname = match types::as_struct(&cur) {
                        Some(n) => n.to_string(),
                        None => return,
                    };
                    let (offset, fty) = match self
                        .layouts
                        .get(&sname)
                        .and_then(|l| l.fields.get(&af.field))
                    {
                        Some(fl) => (fl.offset, fl.ty.clone()),
                        None => return,
                    };
                    self.line(&format!("i32.const {}", offset));
                    self.line("i32.add");
                    cur = fty;
                }
            }
        }
    }

    fn load_lvalue(&mut self, lv: &LValue) {
        let info = match self.locals.get(&lv.base.name) {
            Some(info) => info.clone(),
            None => return,
        };
        if info.is_aggregate || !lv.accesses.is_empty() {
            self.address_of(lv);
            self.line(if info.bitwidth <= 32 { "i32.load" } else { "i64.load" });
        } else {
            self.line(&format!("local.get {}", mangle(&lv.base.name)));
        }
    }

    fn coef(&mut self, c: &Coef, target_width: u32) {
        match c {
            Coef::Int(lit) => {
                let prefix = if target_width <= 32 { "i32" } else { "i64" };
                self.line(&format!("{}.const {}", prefix, lit.value));
            }
            Coef::Float(lit) => {
                let prefix = if target_width <= 32 { "i32" } else { "i64" };
                self.line(&format!("{}.const {}", prefix, lit.value as i64));
            }
            Coef::Id(LocalOrSym::Local(lid)) => {
                self.line(&format!("local.get {}", mangle(&lid.name)));
            }
            Coef::Id(LocalOrSym::Sym(sid)) => {
                self.line(&format!(
                    "call {}",
                    mangle(&accessor(&self.cur_fun.clone(), &sid.name))
                ));
            }
        }
    }

    fn select_val(&mut self, sv: &SelectVal, target_width: u32) {
        match sv {
            SelectVal::RVal(rv) => self.load_lvalue(rv),
            SelectVal::Coef(c)  => self.coef(c, target_width),
        }
    }

    fn index(&mut self, idx: &Index) {
        match idx {
            Index::Int(lit) => self.line(&format!("i32.const {}", lit.value)),
            Index::Id(LocalOrSym::Local(lid)) => {
                self.line(&format!("local.get {}", mangle(&lid.name)));
            }
            Index::Id(LocalOrSym::Sym(sid)) => {
                self.line(&format!(
                    "call {}",
                    mangle(&accessor(&self.cur_fun.clone(), &sid.name))
                ));
            }
        }
    }

    fn init_val(&mut self, iv: &InitVal, ty: &TypeRef, base_offset: u32, inner: u32) {
        match iv {
            InitVal::Int(lit) => {
                if let Some((size, elem)) = types::as_array(ty) {
                    let elem = elem.clone();
                    let elem_size = self.type_size(&elem);
                    for i in 0..size {
                        self.init_val(iv, &elem, base_offset, inner + i as u32 * elem_size);
                    }
                } else if let Some(sname) = types::as_struct(ty) {
                    let layout: Vec<(u32, TypeRef)> = match self.layouts.get(sname) {
                        Some(l) => l
                            .field_names
                            .iter()
                            .map(|n| {
                                let fl = &l.fields[n];
                                (fl.offset, fl.ty.clone())
                            })
                            .collect(),
                        None => return,
                    };
                    for (off, fty) in layout {
                        self.init_val(iv, &fty, base_offset, inner + off);
                    }
                } else {
                    self.line("local.get $__old_sp");
                    self.line(&format!("i32.const {}", base_offset));
                    self.line("i32.sub");
                    if inner > 0 {
                        self.line(&format!("i32.const {}", inner));
                        self.line("i32.add");
                    }
                    let prefix = if int_width(ty) <= 32 { "i32" } else { "i64" };
                    self.line(&format!("{}.const {}", prefix, lit.value));
                    self.line(&format!("{}.store", prefix));
                }
            }
            InitVal::Aggregate { elements, .. } => {
                if let Some((_, elem)) = types::as_array(ty) {
                    let elem = elem.clone();
                    let elem_size = self.type_size(&elem);
                    for (i, e) in elements.iter().enumerate() {
                        self.init_val(e, &elem, base_offset, inner + i as u32 * elem_size);
                    }
                } else if let Some(sname) = types::as_struct(ty) {
                    let layout: Vec<(u32, TypeRef)> = match self.layouts.get(sname) {
                        Some(l) => l
                            .field_names
                            .iter()
                            .map(|n| {
                                let fl = &l.fields[n];
                                (fl.offset, fl.ty.clone())
                            })
                            .collect(),
                        None => return,
                    };
                    for (e, (off, fty)) in elements.iter().zip(layout) {
                        self.init_val(e, &fty, base_offset, inner + off);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    #[test]
    fn module_shape() {
        let prog = parse_source(
            "fun @f(%n: i32): i32 { sym %?k: value i32; \
             let mut %x: i32 = 0; \
             ^entry: %x = %?k * %n; br %x == 0, ^z, ^nz; \
             ^z: ret 0; \
             ^nz: ret %x; }",
        )
        .unwrap();
        let wat = emit(&prog);
        assert!(wat.starts_with("(module\n"), "{}", wat);
        assert!(wat.contains("(import \"f\" \"k\" (func $f__k (result i32)))"), "{}", wat);
        assert!(wat.contains("(global $__stack_pointer (mut i32) (i32.const 65536))"), "{}", wat);
        assert!(wat.contains("br_table 2 1 0 0"), "{}", wat);
        assert!(wat.contains("(export \"f\" (func $f))"), "{}", wat);
        assert!(wat.contains("call $f__k"), "{}", wat);
    }

    #[test]
    fn aggregates_go_through_linear_memory() {
        let prog = parse_source(
            "fun @f(): i32 { let mut %a: [4] i32 = 0; \
             ^entry: %a[1] = 7; ret %a[1]; }",
        )
        .unwrap();
        let wat = emit(&prog);
        assert!(wat.contains("global.get $__stack_pointer"), "{}", wat);
        assert!(wat.contains("i32.store"), "{}", wat);
        assert!(wat.contains("i32.load"), "{}", wat);
    }

    #[test]
    fn narrow_widths_are_masked() {
        let prog = parse_source(
            "fun @f(%a: i8): i8 { let mut %x: i8 = 1; ^entry: %x = %x & %a; ret %x; }",
        )
        .unwrap();
        let wat = emit(&prog);
        assert!(wat.contains("i32.const 255"), "{}", wat);
        assert!(wat.contains("i32.and"), "{}", wat);
    }

    #[test]
    fn no_module_tags_mode() {
        let prog = parse_source("fun @f(): i32 { ^entry: ret 0; }").unwrap();
        let wat = emit_with_options(&prog, false);
        assert!(!wat.contains("(module"), "{}", wat);
    }
}
