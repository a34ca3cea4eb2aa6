//! Recursive descent over the token stream. Fails fast on the first
//! syntax error; every node gets a span and expressions get node ids.

use crate::ast::*;
use crate::lexer::{Token, TokenKind};
use crate::Error;
use std::sync::Arc;

pub struct Parser {
    toks:       Vec<Token>,
    idx:        usize,
    next_id:    NodeId,
}

impl Parser {
    pub fn new(toks: Vec<Token>) -> Self {
        Self { toks, idx: 0, next_id: 0 }
    }

    fn peek(&self, k: usize) -> &Token {
        let i = self.idx + k;
        if i >= self.toks.len() {
            return self.toks.last().expect("token stream always ends with End");
        }
        &self.toks[i]
    }

    fn is(&self, kind: TokenKind) -> bool {
        self.peek(0).kind == kind
    }

    fn bump(&mut self) -> Token {
        let t = self.peek(0).clone();
        if self.idx + 1 < self.toks.len() {
            self.idx += 1;
        }
        t
    }

    fn consume(&mut self, kind: TokenKind, what: &str) -> Result<Token, Error> {
        if self.is(kind) {
            return Ok(self.bump());
        }
        Err(Error::new(
            format!("Expected {}, got '{}'", what, self.peek(0).lexeme),
            vec![(self.peek(0).span, "here".to_string())],
        ))
    }

    fn try_consume(&mut self, kind: TokenKind) -> bool {
        if self.is(kind) {
            self.bump();
            return true;
        }
        false
    }

    fn error_here<T>(&self, msg: &str) -> Result<T, Error> {
        Err(Error::new(msg.to_string(), vec![(self.peek(0).span, "here".to_string())]))
    }

    fn prev_end(&self) -> SourcePos {
        if self.idx == 0 {
            return self.toks[0].span.begin;
        }
        self.toks[self.idx - 1].span.end
    }

    fn span_from(&self, begin: SourcePos) -> SourceSpan {
        SourceSpan::new(begin, self.prev_end())
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn parse_program(mut self) -> Result<Program, Error> {
        let begin = self.peek(0).span.begin;
        let mut structs = Vec::new();
        let mut funs = Vec::new();
        while !self.is(TokenKind::End) {
            if self.is(TokenKind::KwStruct) {
                structs.push(self.parse_struct_decl()?);
            } else if self.is(TokenKind::KwFun) {
                funs.push(self.parse_fun_decl()?);
            } else {
                return self.error_here("Expected struct or function declaration");
            }
        }
        let span = self.span_from(begin);
        Ok(Program { structs, funs, span })
    }

    fn parse_global_id(&mut self) -> Result<GlobalId, Error> {
        let t = self.consume(TokenKind::GlobalId, "global identifier (@name)")?;
        Ok(GlobalId { name: t.lexeme, span: t.span })
    }

    fn parse_local_id(&mut self) -> Result<LocalId, Error> {
        let t = self.consume(TokenKind::LocalId, "local identifier (%name)")?;
        Ok(LocalId { name: t.lexeme, span: t.span })
    }

    fn parse_sym_id(&mut self) -> Result<SymId, Error> {
        let t = self.consume(TokenKind::SymId, "symbol identifier (%?name)")?;
        Ok(SymId { name: t.lexeme, span: t.span })
    }

    fn parse_block_label(&mut self) -> Result<BlockLabel, Error> {
        let t = self.consume(TokenKind::BlockLabel, "block label (^name)")?;
        Ok(BlockLabel { name: t.lexeme, span: t.span })
    }

    fn parse_int_token(&mut self, what: &str) -> Result<IntLit, Error> {
        let t = self.consume(TokenKind::IntLit, what)?;
        match parse_int_literal(&t.lexeme) {
            Some(value) => Ok(IntLit { value, span: t.span }),
            None => Err(Error::new(
                format!("Integer literal '{}' out of range", t.lexeme),
                vec![(t.span, "here".to_string())],
            )),
        }
    }

    fn parse_float_token(&mut self) -> Result<FloatLit, Error> {
        let t = self.consume(TokenKind::FloatLit, "float literal")?;
        match t.lexeme.parse::<f64>() {
            Ok(value) => Ok(FloatLit { value, span: t.span }),
            Err(_) => Err(Error::new(
                format!("Malformed float literal '{}'", t.lexeme),
                vec![(t.span, "here".to_string())],
            )),
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef, Error> {
        let begin = self.peek(0).span.begin;
        if self.is(TokenKind::IntType) {
            let t = self.bump();
            let bits: u32 = t.lexeme[1..].parse().unwrap_or(0);
            if bits < 1 || bits > 64 {
                return Err(Error::new(
                    format!("Integer type width must be between 1 and 64, got {}", bits),
                    vec![(t.span, "here".to_string())],
                ));
            }
            let kind = match bits {
                32 => TypeKind::Int { kind: IntKind::I32, bits: None },
                64 => TypeKind::Int { kind: IntKind::I64, bits: None },
                _ => TypeKind::Int { kind: IntKind::Custom, bits: Some(bits) },
            };
            return Ok(Arc::new(Type { kind, span: self.span_from(begin) }));
        }
        if self.is(TokenKind::Ident) && (self.peek(0).lexeme == "f32" || self.peek(0).lexeme == "f64")
        {
            let t = self.bump();
            let kind = if t.lexeme == "f32" { FloatKind::F32 } else { FloatKind::F64 };
            return Ok(Arc::new(Type {
                kind: TypeKind::Float { kind },
                span: self.span_from(begin),
            }));
        }
        if self.is(TokenKind::GlobalId) {
            let name = self.parse_global_id()?;
            return Ok(Arc::new(Type {
                kind: TypeKind::Struct { name },
                span: self.span_from(begin),
            }));
        }
        if self.try_consume(TokenKind::LBracket) {
            let size = self.parse_int_token("array size")?;
            if size.value < 0 {
                return Err(Error::new(
                    "Array size must be non-negative".to_string(),
                    vec![(size.span, "here".to_string())],
                ));
            }
            self.consume(TokenKind::RBracket, "']' after array size")?;
            let elem = self.parse_type()?;
            return Ok(Arc::new(Type {
                kind: TypeKind::Array { size: size.value as u64, elem },
                span: self.span_from(begin),
            }));
        }
        self.error_here("Expected a type (iN, f32/f64, array type, or struct type @Name)")
    }

    fn parse_struct_decl(&mut self) -> Result<StructDecl, Error> {
        let begin = self.peek(0).span.begin;
        self.consume(TokenKind::KwStruct, "'struct'")?;
        let name = self.parse_global_id()?;
        self.consume(TokenKind::LBrace, "'{'")?;
        let mut fields = Vec::new();
        while !self.is(TokenKind::RBrace) {
            let fname = self.consume(TokenKind::Ident, "field name")?;
            self.consume(TokenKind::Colon, "':'")?;
            let ty = self.parse_type()?;
            self.consume(TokenKind::Semicolon, "';'")?;
            let span = SourceSpan::new(fname.span.begin, self.prev_end());
            fields.push(FieldDecl { name: fname.lexeme, ty, span });
        }
        self.consume(TokenKind::RBrace, "'}'")?;
        Ok(StructDecl { name, fields, span: self.span_from(begin) })
    }

    fn parse_fun_decl(&mut self) -> Result<FunDecl, Error> {
        let begin = self.peek(0).span.begin;
        self.consume(TokenKind::KwFun, "'fun'")?;
        let name = self.parse_global_id()?;
        self.consume(TokenKind::LParen, "'('")?;
        let params = self.parse_param_list()?;
        self.consume(TokenKind::RParen, "')'")?;
        self.consume(TokenKind::Colon, "':'")?;
        let ret = self.parse_type()?;
        self.consume(TokenKind::LBrace, "'{'")?;

        let mut syms = Vec::new();
        while self.is(TokenKind::KwSym) {
            syms.push(self.parse_sym_decl()?);
        }
        let mut lets = Vec::new();
        while self.is(TokenKind::KwLet) {
            lets.push(self.parse_let_decl()?);
        }
        let mut blocks = Vec::new();
        while !self.is(TokenKind::RBrace) {
            blocks.push(self.parse_block()?);
        }
        self.consume(TokenKind::RBrace, "'}'")?;

        Ok(FunDecl { name, params, ret, syms, lets, blocks, span: self.span_from(begin) })
    }

    fn parse_param_list(&mut self) -> Result<Vec<ParamDecl>, Error> {
        let mut params = Vec::new();
        if self.is(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let begin = self.peek(0).span.begin;
            let name = self.parse_local_id()?;
            self.consume(TokenKind::Colon, "':'")?;
            let ty = self.parse_type()?;
            params.push(ParamDecl { name, ty, span: self.span_from(begin) });
            if !self.try_consume(TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_sym_kind(&mut self) -> Result<SymKind, Error> {
        let t = self.consume(TokenKind::Ident, "symbol kind (value/coef/index)")?;
        match t.lexeme.as_str() {
            "value" => Ok(SymKind::Value),
            "coef"  => Ok(SymKind::Coef),
            "index" => Ok(SymKind::Index),
            other => Err(Error::new(
                format!("Unknown symbol kind: {}", other),
                vec![(t.span, "here".to_string())],
            )),
        }
    }

    fn parse_optional_domain(&mut self) -> Result<Option<Domain>, Error> {
        if !self.is(TokenKind::KwIn) {
            return Ok(None);
        }
        let begin = self.peek(0).span.begin;
        self.consume(TokenKind::KwIn, "'in'")?;

        if self.try_consume(TokenKind::LBracket) {
            let lo = self.parse_int_token("domain interval lower bound")?;
            self.consume(TokenKind::Comma, "','")?;
            let hi = self.parse_int_token("domain interval upper bound")?;
            self.consume(TokenKind::RBracket, "']'")?;
            return Ok(Some(Domain::Interval(DomainInterval {
                lo:     lo.value,
                hi:     hi.value,
                span:   self.span_from(begin),
            })));
        }

        if self.try_consume(TokenKind::LBrace) {
            let mut values = Vec::new();
            if !self.is(TokenKind::RBrace) {
                loop {
                    values.push(self.parse_int_token("domain set element")?.value);
                    if !self.try_consume(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RBrace, "'}'")?;
            return Ok(Some(Domain::Set(DomainSet { values, span: self.span_from(begin) })));
        }

        self.error_here("Expected domain interval [lo,hi] or set {a,b,...} after 'in'")
    }

    fn parse_sym_decl(&mut self) -> Result<SymDecl, Error> {
        let begin = self.peek(0).span.begin;
        self.consume(TokenKind::KwSym, "'sym'")?;
        let name = self.parse_sym_id()?;
        self.consume(TokenKind::Colon, "':'")?;
        let kind = self.parse_sym_kind()?;
        let ty = self.parse_type()?;
        let domain = self.parse_optional_domain()?;
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(SymDecl { name, kind, ty, domain, span: self.span_from(begin) })
    }

    fn parse_let_decl(&mut self) -> Result<LetDecl, Error> {
        let begin = self.peek(0).span.begin;
        self.consume(TokenKind::KwLet, "'let'")?;
        let mutable = self.try_consume(TokenKind::KwMut);
        let name = self.parse_local_id()?;
        self.consume(TokenKind::Colon, "':'")?;
        let ty = self.parse_type()?;
        let init = if self.try_consume(TokenKind::Equal) {
            Some(self.parse_init_val()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(LetDecl { mutable, name, ty, init, span: self.span_from(begin) })
    }

    fn parse_init_val(&mut self) -> Result<InitVal, Error> {
        let begin = self.peek(0).span.begin;
        if self.try_consume(TokenKind::LBrace) {
            if self.is(TokenKind::RBrace) {
                return self.error_here("Empty brace initializers '{}' are disallowed");
            }
            let mut elements = Vec::new();
            loop {
                elements.push(self.parse_init_val()?);
                if !self.try_consume(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::RBrace, "'}'")?;
            return Ok(InitVal::Aggregate { elements, span: self.span_from(begin) });
        }
        if self.try_consume(TokenKind::KwUndef) {
            return Ok(InitVal::Undef { span: self.span_from(begin) });
        }
        if self.is(TokenKind::IntLit) {
            return Ok(InitVal::Int(self.parse_int_token("integer literal")?));
        }
        if self.is(TokenKind::FloatLit) {
            return Ok(InitVal::Float(self.parse_float_token()?));
        }
        if self.is(TokenKind::SymId) {
            return Ok(InitVal::Sym(self.parse_sym_id()?));
        }
        if self.is(TokenKind::LocalId) {
            return Ok(InitVal::Local(self.parse_local_id()?));
        }
        self.error_here("Expected initializer: literal, %?sym, %local, 'undef', or '{...}'")
    }

    fn parse_block(&mut self) -> Result<Block, Error> {
        let begin = self.peek(0).span.begin;
        let label = self.parse_block_label()?;
        self.consume(TokenKind::Colon, "':'")?;
        let mut instrs = Vec::new();
        while self.is_start_of_instr() {
            instrs.push(self.parse_instr()?);
        }
        let term = self.parse_terminator()?;
        Ok(Block { label, instrs, term, span: self.span_from(begin) })
    }

    fn is_start_of_instr(&self) -> bool {
        self.is(TokenKind::LocalId)
            || self.is(TokenKind::KwAssume)
            || self.is(TokenKind::KwRequire)
    }

    fn parse_instr(&mut self) -> Result<Instr, Error> {
        if self.is(TokenKind::KwAssume) {
            let begin = self.peek(0).span.begin;
            self.bump();
            let cond = self.parse_cond()?;
            self.consume(TokenKind::Semicolon, "';'")?;
            return Ok(Instr::Assume(AssumeInstr { cond, span: self.span_from(begin) }));
        }
        if self.is(TokenKind::KwRequire) {
            let begin = self.peek(0).span.begin;
            self.bump();
            let cond = self.parse_cond()?;
            let message = if self.try_consume(TokenKind::Comma) {
                Some(self.consume(TokenKind::StringLit, "string literal message")?.lexeme)
            } else {
                None
            };
            self.consume(TokenKind::Semicolon, "';'")?;
            return Ok(Instr::Require(RequireInstr { cond, message, span: self.span_from(begin) }));
        }
        let begin = self.peek(0).span.begin;
        let lhs = self.parse_lvalue()?;
        self.consume(TokenKind::Equal, "'='")?;
        let rhs = self.parse_expr()?;
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(Instr::Assign(AssignInstr { lhs, rhs, span: self.span_from(begin) }))
    }

    fn parse_terminator(&mut self) -> Result<Terminator, Error> {
        let begin = self.peek(0).span.begin;
        if self.try_consume(TokenKind::KwBr) {
            if self.is(TokenKind::BlockLabel) {
                let dest = self.parse_block_label()?;
                self.consume(TokenKind::Semicolon, "';'")?;
                return Ok(Terminator::Br { dest, span: self.span_from(begin) });
            }
            let cond = self.parse_cond()?;
            self.consume(TokenKind::Comma, "','")?;
            let then_label = self.parse_block_label()?;
            self.consume(TokenKind::Comma, "','")?;
            let else_label = self.parse_block_label()?;
            self.consume(TokenKind::Semicolon, "';'")?;
            return Ok(Terminator::CondBr {
                cond,
                then_label,
                else_label,
                span: self.span_from(begin),
            });
        }
        if self.try_consume(TokenKind::KwRet) {
            let value = if self.is(TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.consume(TokenKind::Semicolon, "';'")?;
            return Ok(Terminator::Ret { value, span: self.span_from(begin) });
        }
        if self.try_consume(TokenKind::KwUnreachable) {
            self.consume(TokenKind::Semicolon, "';'")?;
            return Ok(Terminator::Unreachable { span: self.span_from(begin) });
        }
        self.error_here("Expected terminator: br/ret/unreachable")
    }

    fn parse_lvalue(&mut self) -> Result<LValue, Error> {
        let begin = self.peek(0).span.begin;
        let base = self.parse_local_id()?;
        let mut accesses = Vec::new();
        loop {
            if self.try_consume(TokenKind::LBracket) {
                let ib = self.prev_end();
                let index = self.parse_index()?;
                self.consume(TokenKind::RBracket, "']'")?;
                accesses.push(Access::Index(AccessIndex {
                    index,
                    span: SourceSpan::new(ib, self.prev_end()),
                }));
                continue;
            }
            if self.try_consume(TokenKind::Dot) {
                let fld = self.consume(TokenKind::Ident, "field name after '.'")?;
                accesses.push(Access::Field(AccessField { field: fld.lexeme, span: fld.span }));
                continue;
            }
            break;
        }
        Ok(LValue { base, accesses, span: self.span_from(begin) })
    }

    fn parse_index(&mut self) -> Result<Index, Error> {
        if self.is(TokenKind::IntLit) {
            return Ok(Index::Int(self.parse_int_token("index")?));
        }
        if self.is(TokenKind::LocalId) {
            return Ok(Index::Id(LocalOrSym::Local(self.parse_local_id()?)));
        }
        if self.is(TokenKind::SymId) {
            return Ok(Index::Id(LocalOrSym::Sym(self.parse_sym_id()?)));
        }
        self.error_here("Expected index: integer literal, %local, or %?sym")
    }

    fn parse_coef(&mut self) -> Result<Coef, Error> {
        if self.is(TokenKind::IntLit) {
            return Ok(Coef::Int(self.parse_int_token("coefficient")?));
        }
        if self.is(TokenKind::FloatLit) {
            return Ok(Coef::Float(self.parse_float_token()?));
        }
        if self.is(TokenKind::LocalId) {
            return Ok(Coef::Id(LocalOrSym::Local(self.parse_local_id()?)));
        }
        if self.is(TokenKind::SymId) {
            return Ok(Coef::Id(LocalOrSym::Sym(self.parse_sym_id()?)));
        }
        self.error_here("Expected coefficient: literal, %local, or %?sym")
    }

    fn parse_cond(&mut self) -> Result<Cond, Error> {
        let begin = self.peek(0).span.begin;
        let lhs = self.parse_expr()?;
        let op = self.parse_rel_op()?;
        let rhs = self.parse_expr()?;
        Ok(Cond { lhs, op, rhs, span: self.span_from(begin) })
    }

    fn parse_rel_op(&mut self) -> Result<RelOp, Error> {
        if self.try_consume(TokenKind::EqEq) {
            return Ok(RelOp::Eq);
        }
        if self.try_consume(TokenKind::NotEq) {
            return Ok(RelOp::Ne);
        }
        if self.try_consume(TokenKind::Le) {
            return Ok(RelOp::Le);
        }
        if self.try_consume(TokenKind::Ge) {
            return Ok(RelOp::Ge);
        }
        if self.try_consume(TokenKind::Lt) {
            return Ok(RelOp::Lt);
        }
        if self.try_consume(TokenKind::Gt) {
            return Ok(RelOp::Gt);
        }
        self.error_here("Expected relational operator (==, !=, <, <=, >, >=)")
    }

    fn parse_expr(&mut self) -> Result<Expr, Error> {
        let begin = self.peek(0).span.begin;
        let first = self.parse_atom()?;
        let mut rest = Vec::new();
        while self.is(TokenKind::Plus) || self.is(TokenKind::Minus) {
            let tb = self.peek(0).span.begin;
            let op = if self.is(TokenKind::Plus) { AddOp::Plus } else { AddOp::Minus };
            self.bump();
            let atom = self.parse_atom()?;
            rest.push(ExprTail { op, atom, span: SourceSpan::new(tb, self.prev_end()) });
        }
        let id = self.fresh_id();
        Ok(Expr { id, first, rest, span: self.span_from(begin) })
    }

    fn peek_atom_op(&self) -> Option<AtomOp> {
        match self.peek(0).kind {
            TokenKind::Star     => Some(AtomOp::Mul),
            TokenKind::Slash    => Some(AtomOp::Div),
            TokenKind::Percent  => Some(AtomOp::Mod),
            TokenKind::Amp      => Some(AtomOp::And),
            TokenKind::Pipe     => Some(AtomOp::Or),
            TokenKind::Caret    => Some(AtomOp::Xor),
            TokenKind::Shl      => Some(AtomOp::Shl),
            TokenKind::Shr      => Some(AtomOp::Shr),
            TokenKind::LShr     => Some(AtomOp::LShr),
            _ => None,
        }
    }

    fn parse_op_operand(&mut self) -> Result<OpOperand, Error> {
        if self.is(TokenKind::LocalId) {
            return Ok(OpOperand::RVal(self.parse_lvalue()?));
        }
        if self.is(TokenKind::IntLit) || self.is(TokenKind::FloatLit) || self.is(TokenKind::SymId) {
            return Ok(OpOperand::Coef(self.parse_coef()?));
        }
        self.error_here("Expected operand: lvalue or coefficient")
    }

    fn parse_atom(&mut self) -> Result<Atom, Error> {
        let begin = self.peek(0).span.begin;

        if self.try_consume(TokenKind::KwSelect) {
            let cond = self.parse_cond()?;
            self.consume(TokenKind::Comma, "','")?;
            let vtrue = self.parse_select_val()?;
            self.consume(TokenKind::Comma, "','")?;
            let vfalse = self.parse_select_val()?;
            let span = self.span_from(begin);
            let id = self.fresh_id();
            return Ok(Atom {
                id,
                kind: AtomKind::Select(SelectAtom {
                    cond: Box::new(cond),
                    vtrue,
                    vfalse,
                    span,
                }),
                span,
            });
        }

        if self.try_consume(TokenKind::Tilde) {
            let rval = self.parse_lvalue()?;
            let span = self.span_from(begin);
            let id = self.fresh_id();
            return Ok(Atom {
                id,
                kind: AtomKind::Unary(UnaryAtom { op: UnaryOp::Not, rval, span }),
                span,
            });
        }

        if self.is(TokenKind::LocalId) {
            let lv = self.parse_lvalue()?;
            if let Some(op) = self.peek_atom_op() {
                if !lv.accesses.is_empty() {
                    return Err(Error::new(
                        "An accessed lvalue cannot be used as a coefficient for binary operators"
                            .to_string(),
                        vec![(lv.span, "accessed here".to_string())],
                    ));
                }
                self.bump();
                let rhs = self.parse_op_operand()?;
                let span = self.span_from(begin);
                let id = self.fresh_id();
                return Ok(Atom {
                    id,
                    kind: AtomKind::Op(OpAtom {
                        op,
                        coef: Coef::Id(LocalOrSym::Local(lv.base)),
                        rhs,
                        span,
                    }),
                    span,
                });
            }
            if self.try_consume(TokenKind::KwAs) {
                let dst = self.parse_type()?;
                let span = self.span_from(begin);
                let id = self.fresh_id();
                return Ok(Atom {
                    id,
                    kind: AtomKind::Cast(CastAtom { src: CastSrc::LVal(lv), dst, span }),
                    span,
                });
            }
            let span = self.span_from(begin);
            let id = self.fresh_id();
            return Ok(Atom { id, kind: AtomKind::RVal(RValueAtom { rval: lv, span }), span });
        }

        if self.is(TokenKind::IntLit) || self.is(TokenKind::FloatLit) || self.is(TokenKind::SymId) {
            let coef = self.parse_coef()?;
            if let Some(op) = self.peek_atom_op() {
                self.bump();
                let rhs = self.parse_op_operand()?;
                let span = self.span_from(begin);
                let id = self.fresh_id();
                return Ok(Atom { id, kind: AtomKind::Op(OpAtom { op, coef, rhs, span }), span });
            }
            if self.try_consume(TokenKind::KwAs) {
                let dst = self.parse_type()?;
                let src = match coef {
                    Coef::Int(l)                        => CastSrc::Int(l),
                    Coef::Float(l)                      => CastSrc::Float(l),
                    Coef::Id(LocalOrSym::Sym(s))        => CastSrc::Sym(s),
                    Coef::Id(LocalOrSym::Local(_))      => unreachable!("handled above"),
                };
                let span = self.span_from(begin);
                let id = self.fresh_id();
                return Ok(Atom { id, kind: AtomKind::Cast(CastAtom { src, dst, span }), span });
            }
            let span = self.span_from(begin);
            let id = self.fresh_id();
            return Ok(Atom { id, kind: AtomKind::Coef(CoefAtom { coef, span }), span });
        }

        self.error_here("Expected atom (select, cast, bitwise not, coefficient, or lvalue)")
    }

    fn parse_select_val(&mut self) -> Result<SelectVal, Error> {
        if self.is(TokenKind::LocalId) {
            return Ok(SelectVal::RVal(self.parse_lvalue()?));
        }
        if self.is(TokenKind::IntLit) || self.is(TokenKind::FloatLit) || self.is(TokenKind::SymId) {
            return Ok(SelectVal::Coef(self.parse_coef()?));
        }
        self.error_here("Expected select arm value: lvalue or coefficient")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    #[test]
    fn minimal_function() {
        let prog = parse_source("fun @f(): i32 { ^entry: ret 0; }").unwrap();
        assert_eq!(prog.funs.len(), 1);
        let f = &prog.funs[0];
        assert_eq!(f.name.name, "@f");
        assert_eq!(f.blocks.len(), 1);
        assert!(matches!(f.blocks[0].term, Terminator::Ret { value: Some(_), .. }));
    }

    #[test]
    fn struct_and_accesses() {
        let prog = parse_source(
            "struct @P { x: i32; y: [2] i64; } \
             fun @f(): i32 { let mut %p: @P; ^entry: %p.x = 1; %p.y[0] = 2; ret %p.x; }",
        )
        .unwrap();
        assert_eq!(prog.structs.len(), 1);
        assert_eq!(prog.structs[0].fields.len(), 2);
        let f = &prog.funs[0];
        assert_eq!(f.blocks[0].instrs.len(), 2);
        match &f.blocks[0].instrs[1] {
            Instr::Assign(a) => assert_eq!(a.lhs.accesses.len(), 2),
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn op_atom_with_literal_rhs() {
        // `%?k * 3` keeps the symbol as coefficient and the literal on the right
        let prog = parse_source(
            "fun @g(): i32 { sym %?k: value i32; ^entry: require %?k * 3 == 42; ret %?k; }",
        )
        .unwrap();
        let f = &prog.funs[0];
        match &f.blocks[0].instrs[0] {
            Instr::Require(r) => match &r.cond.lhs.first.kind {
                AtomKind::Op(op) => {
                    assert_eq!(op.op, AtomOp::Mul);
                    assert!(matches!(op.coef, Coef::Id(LocalOrSym::Sym(_))));
                    assert!(matches!(op.rhs, OpOperand::Coef(Coef::Int(_))));
                }
                other => panic!("expected op atom, got {:?}", other),
            },
            other => panic!("expected require, got {:?}", other),
        }
    }

    #[test]
    fn accessed_lvalue_coefficient_rejected() {
        let err = parse_source(
            "fun @f(%a: [2] i32, %b: i32): i32 { ^entry: ret %a[0] * %b; }",
        )
        .unwrap_err();
        assert!(err.message.contains("accessed lvalue"));
    }

    #[test]
    fn sym_domains() {
        let prog = parse_source(
            "fun @f(): i32 { sym %?a: value i32 in [0,10]; sym %?b: index i8 in {1,2,3}; \
             ^entry: ret 0; }",
        )
        .unwrap();
        let f = &prog.funs[0];
        assert!(matches!(f.syms[0].domain, Some(Domain::Interval(_))));
        match &f.syms[1].domain {
            Some(Domain::Set(s)) => assert_eq!(s.values, vec![1, 2, 3]),
            other => panic!("expected set domain, got {:?}", other),
        }
    }

    #[test]
    fn terminators() {
        let prog = parse_source(
            "fun @f(%c: i32): i32 { \
             ^entry: br %c == 0, ^a, ^b; \
             ^a: br ^b; \
             ^b: unreachable; }",
        )
        .unwrap();
        let f = &prog.funs[0];
        assert!(matches!(f.blocks[0].term, Terminator::CondBr { .. }));
        assert!(matches!(f.blocks[1].term, Terminator::Br { .. }));
        assert!(matches!(f.blocks[2].term, Terminator::Unreachable { .. }));
    }

    #[test]
    fn initializers() {
        let prog = parse_source(
            "fun @f(): i32 { \
             let %a: [2] i32 = {1, 2}; \
             let %b: i32 = undef; \
             let %c: f64 = 1.5; \
             ^entry: ret 0; }",
        )
        .unwrap();
        let f = &prog.funs[0];
        assert!(matches!(f.lets[0].init, Some(InitVal::Aggregate { .. })));
        assert!(matches!(f.lets[1].init, Some(InitVal::Undef { .. })));
        assert!(matches!(f.lets[2].init, Some(InitVal::Float(_))));
    }

    #[test]
    fn cast_and_select() {
        let prog = parse_source(
            "fun @f(%x: i32): i64 { ^entry: ret %x as i64 + select %x == 0, 1, 0; }",
        )
        .unwrap();
        let f = &prog.funs[0];
        match &f.blocks[0].term {
            Terminator::Ret { value: Some(e), .. } => {
                assert!(matches!(e.first.kind, AtomKind::Cast(_)));
                assert_eq!(e.rest.len(), 1);
                assert!(matches!(e.rest[0].atom.kind, AtomKind::Select(_)));
            }
            other => panic!("expected ret, got {:?}", other),
        }
    }

    #[test]
    fn missing_terminator_is_an_error() {
        assert!(parse_source("fun @f(): i32 { ^entry: %x = 1; }").is_err());
    }
}
