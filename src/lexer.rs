use crate::ast::{SourcePos, SourceSpan};
use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TokenKind {
    End,
    Ident,
    IntLit,
    FloatLit,
    StringLit,
    GlobalId,
    LocalId,
    SymId,
    BlockLabel,
    IntType,

    KwStruct,
    KwFun,
    KwSym,
    KwLet,
    KwMut,
    KwAssume,
    KwRequire,
    KwBr,
    KwRet,
    KwUnreachable,
    KwIn,
    KwSelect,
    KwUndef,
    KwAs,

    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Semicolon,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Equal,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    LShr,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind:   TokenKind,
    pub lexeme: String,
    pub span:   SourceSpan,
}

pub struct Lexer<'a> {
    src:    &'a [u8],
    i:      usize,
    line:   u32,
    col:    u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), i: 0, line: 1, col: 1 }
    }

    pub fn lex_all(mut self) -> Result<Vec<Token>, Error> {
        let mut out = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = t.kind == TokenKind::End;
            out.push(t);
            if done {
                return Ok(out);
            }
        }
    }

    fn peek(&self, k: usize) -> u8 {
        *self.src.get(self.i + k).unwrap_or(&0)
    }

    fn get(&mut self) -> u8 {
        let c = self.peek(0);
        if c == 0 {
            return c;
        }
        self.i += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn pos(&self) -> SourcePos {
        SourcePos { offset: self.i, line: self.line, col: self.col }
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.peek(0).is_ascii_whitespace() {
                self.get();
            }
            if self.peek(0) == b'/' && self.peek(1) == b'/' {
                while self.peek(0) != 0 && self.peek(0) != b'\n' {
                    self.get();
                }
                continue;
            }
            if self.peek(0) == b'/' && self.peek(1) == b'*' {
                self.get();
                self.get();
                while self.peek(0) != 0 {
                    if self.peek(0) == b'*' && self.peek(1) == b'/' {
                        self.get();
                        self.get();
                        break;
                    }
                    self.get();
                }
                continue;
            }
            break;
        }
    }

    fn is_ident_start(c: u8) -> bool {
        c.is_ascii_alphabetic() || c == b'_'
    }

    fn is_ident_cont(c: u8) -> bool {
        c.is_ascii_alphanumeric() || c == b'_'
    }

    fn make(&self, kind: TokenKind, lexeme: String, begin: SourcePos) -> Token {
        Token { kind, lexeme, span: SourceSpan::new(begin, self.pos()) }
    }

    fn lex_number(&mut self, begin: SourcePos) -> Token {
        let mut num = String::new();
        if self.peek(0) == b'-' {
            num.push(self.get() as char);
        }
        if self.peek(0) == b'0' && (self.peek(1) | 0x20) == b'x' {
            num.push(self.get() as char);
            num.push(self.get() as char);
            while self.peek(0).is_ascii_hexdigit() {
                num.push(self.get() as char);
            }
            return self.make(TokenKind::IntLit, num, begin);
        }
        if self.peek(0) == b'0' && ((self.peek(1) | 0x20) == b'o' || (self.peek(1) | 0x20) == b'b')
        {
            num.push(self.get() as char);
            num.push(self.get() as char);
            while self.peek(0).is_ascii_digit() {
                num.push(self.get() as char);
            }
            return self.make(TokenKind::IntLit, num, begin);
        }
        while self.peek(0).is_ascii_digit() {
            num.push(self.get() as char);
        }
        let mut is_float = false;
        if self.peek(0) == b'.' && self.peek(1).is_ascii_digit() {
            is_float = true;
            num.push(self.get() as char);
            while self.peek(0).is_ascii_digit() {
                num.push(self.get() as char);
            }
        }
        if (self.peek(0) | 0x20) == b'e'
            && (self.peek(1).is_ascii_digit()
                || ((self.peek(1) == b'+' || self.peek(1) == b'-') && self.peek(2).is_ascii_digit()))
        {
            is_float = true;
            num.push(self.get() as char);
            if self.peek(0) == b'+' || self.peek(0) == b'-' {
                num.push(self.get() as char);
            }
            while self.peek(0).is_ascii_digit() {
                num.push(self.get() as char);
            }
        }
        let kind = if is_float { TokenKind::FloatLit } else { TokenKind::IntLit };
        self.make(kind, num, begin)
    }

    fn next_token(&mut self) -> Result<Token, Error> {
        self.skip_trivia();
        let begin = self.pos();
        let c = self.peek(0);

        if c == 0 {
            return Ok(self.make(TokenKind::End, String::new(), begin));
        }

        if c == b'"' {
            self.get();
            let mut val = String::new();
            loop {
                let ch = self.get();
                if ch == 0 || ch == b'\n' {
                    return Err(Error::new(
                        "Unterminated string literal".to_string(),
                        vec![(SourceSpan::new(begin, self.pos()), "started here".to_string())],
                    ));
                }
                if ch == b'"' {
                    break;
                }
                if ch == b'\\' {
                    let esc = self.get();
                    match esc {
                        b'n'    => val.push('\n'),
                        b't'    => val.push('\t'),
                        b'r'    => val.push('\r'),
                        other   => val.push(other as char),
                    }
                } else {
                    val.push(ch as char);
                }
            }
            return Ok(self.make(TokenKind::StringLit, val, begin));
        }

        // sigiled identifiers: @g, %l, %?s, @?s
        if (c == b'@' || c == b'%') && (Self::is_ident_start(self.peek(1)) || self.peek(1) == b'?')
        {
            self.get();
            let is_sym = self.peek(0) == b'?';
            if is_sym {
                self.get();
            }
            if !Self::is_ident_start(self.peek(0)) {
                return Err(Error::new(
                    "Expected identifier after sigil".to_string(),
                    vec![(SourceSpan::new(begin, self.pos()), "here".to_string())],
                ));
            }
            let mut name = String::new();
            while Self::is_ident_cont(self.peek(0)) {
                name.push(self.get() as char);
            }
            let lexeme = format!("{}{}{}", c as char, if is_sym { "?" } else { "" }, name);
            let kind = if is_sym {
                TokenKind::SymId
            } else if c == b'@' {
                TokenKind::GlobalId
            } else {
                TokenKind::LocalId
            };
            return Ok(self.make(kind, lexeme, begin));
        }

        if c == b'^' {
            if Self::is_ident_start(self.peek(1)) {
                self.get();
                let mut name = String::from("^");
                while Self::is_ident_cont(self.peek(0)) {
                    name.push(self.get() as char);
                }
                return Ok(self.make(TokenKind::BlockLabel, name, begin));
            }
            self.get();
            return Ok(self.make(TokenKind::Caret, "^".to_string(), begin));
        }

        if c.is_ascii_digit() || (c == b'-' && self.peek(1).is_ascii_digit()) {
            return Ok(self.lex_number(begin));
        }

        // multi-char operators, longest first
        if c == b'>' && self.peek(1) == b'>' && self.peek(2) == b'>' {
            self.get();
            self.get();
            self.get();
            return Ok(self.make(TokenKind::LShr, ">>>".to_string(), begin));
        }
        let two: &[u8] = &[c, self.peek(1)];
        let two_kind = match two {
            b"==" => Some(TokenKind::EqEq),
            b"!=" => Some(TokenKind::NotEq),
            b"<=" => Some(TokenKind::Le),
            b">=" => Some(TokenKind::Ge),
            b"<<" => Some(TokenKind::Shl),
            b">>" => Some(TokenKind::Shr),
            _ => None,
        };
        if let Some(kind) = two_kind {
            self.get();
            self.get();
            return Ok(self.make(kind, String::from_utf8_lossy(two).into_owned(), begin));
        }

        let one_kind = match c {
            b'{' => Some(TokenKind::LBrace),
            b'}' => Some(TokenKind::RBrace),
            b'(' => Some(TokenKind::LParen),
            b')' => Some(TokenKind::RParen),
            b'[' => Some(TokenKind::LBracket),
            b']' => Some(TokenKind::RBracket),
            b':' => Some(TokenKind::Colon),
            b';' => Some(TokenKind::Semicolon),
            b',' => Some(TokenKind::Comma),
            b'.' => Some(TokenKind::Dot),
            b'+' => Some(TokenKind::Plus),
            b'-' => Some(TokenKind::Minus),
            b'*' => Some(TokenKind::Star),
            b'/' => Some(TokenKind::Slash),
            b'%' => Some(TokenKind::Percent),
            b'&' => Some(TokenKind::Amp),
            b'|' => Some(TokenKind::Pipe),
            b'~' => Some(TokenKind::Tilde),
            b'=' => Some(TokenKind::Equal),
            b'<' => Some(TokenKind::Lt),
            b'>' => Some(TokenKind::Gt),
            _ => None,
        };
        if let Some(kind) = one_kind {
            self.get();
            return Ok(self.make(kind, (c as char).to_string(), begin));
        }

        if Self::is_ident_start(c) {
            let mut name = String::new();
            while Self::is_ident_cont(self.peek(0)) {
                name.push(self.get() as char);
            }
            let kind = match name.as_str() {
                "struct"        => TokenKind::KwStruct,
                "fun"           => TokenKind::KwFun,
                "sym"           => TokenKind::KwSym,
                "let"           => TokenKind::KwLet,
                "mut"           => TokenKind::KwMut,
                "assume"        => TokenKind::KwAssume,
                "require"       => TokenKind::KwRequire,
                "br"            => TokenKind::KwBr,
                "ret"           => TokenKind::KwRet,
                "unreachable"   => TokenKind::KwUnreachable,
                "in"            => TokenKind::KwIn,
                "select"        => TokenKind::KwSelect,
                "undef"         => TokenKind::KwUndef,
                "as"            => TokenKind::KwAs,
                _ => {
                    if name.len() >= 2
                        && name.starts_with('i')
                        && name[1..].bytes().all(|b| b.is_ascii_digit())
                    {
                        TokenKind::IntType
                    } else {
                        TokenKind::Ident
                    }
                }
            };
            return Ok(self.make(kind, name, begin));
        }

        Err(Error::new(
            format!("Unexpected character: '{}'", c as char),
            vec![(SourceSpan::new(begin, self.pos()), "here".to_string())],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .lex_all()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn sigils() {
        let toks = Lexer::new("@main %x %?k ^entry").lex_all().unwrap();
        assert_eq!(toks[0].kind, TokenKind::GlobalId);
        assert_eq!(toks[0].lexeme, "@main");
        assert_eq!(toks[1].kind, TokenKind::LocalId);
        assert_eq!(toks[1].lexeme, "%x");
        assert_eq!(toks[2].kind, TokenKind::SymId);
        assert_eq!(toks[2].lexeme, "%?k");
        assert_eq!(toks[3].kind, TokenKind::BlockLabel);
        assert_eq!(toks[3].lexeme, "^entry");
    }

    #[test]
    fn numbers_and_floats() {
        let toks = Lexer::new("42 -7 0x1f 1.5 2e3 0b101").lex_all().unwrap();
        assert_eq!(toks[0].kind, TokenKind::IntLit);
        assert_eq!(toks[1].kind, TokenKind::IntLit);
        assert_eq!(toks[1].lexeme, "-7");
        assert_eq!(toks[2].kind, TokenKind::IntLit);
        assert_eq!(toks[3].kind, TokenKind::FloatLit);
        assert_eq!(toks[4].kind, TokenKind::FloatLit);
        assert_eq!(toks[5].kind, TokenKind::IntLit);
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("== != <= >= << >> >>> ^ ~"),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::LShr,
                TokenKind::Caret,
                TokenKind::Tilde,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn comments_and_spans() {
        let toks = Lexer::new("// line\n/* block */ fun").lex_all().unwrap();
        assert_eq!(toks[0].kind, TokenKind::KwFun);
        assert_eq!(toks[0].span.begin.line, 2);
    }

    #[test]
    fn int_types() {
        let toks = Lexer::new("i32 i7 f32 ident").lex_all().unwrap();
        assert_eq!(toks[0].kind, TokenKind::IntType);
        assert_eq!(toks[1].kind, TokenKind::IntType);
        assert_eq!(toks[2].kind, TokenKind::Ident);
        assert_eq!(toks[3].kind, TokenKind::Ident);
    }

    #[test]
    fn unterminated_string() {
        assert!(Lexer::new("\"abc").lex_all().is_err());
    }
}
