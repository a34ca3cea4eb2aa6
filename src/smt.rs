//! Abstract solver interface plus an SMT-LIB2 process backend. Terms are
//! carried as s-expressions tagged with their sort; the term algebra is
//! shared by every backend, only the transport differs.

use crate::Error;
use rsmt2::parse::{ExprParser, ValueParser};
use rsmt2::{SmtConf, SmtRes};
use std::path::Path;
use std::sync::atomic::AtomicUsize;

/// Process-wide default solve timeout in milliseconds.
pub static TIMEOUT: AtomicUsize = AtomicUsize::new(5000);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sort {
    Bool,
    Bv(u32),
    Fp(u32, u32),
}

impl Sort {
    pub fn is_bv(&self) -> bool {
        matches!(self, Sort::Bv(_))
    }
    pub fn is_fp(&self) -> bool {
        matches!(self, Sort::Fp(_, _))
    }
    pub fn is_bool(&self) -> bool {
        matches!(self, Sort::Bool)
    }
    pub fn bv_width(&self) -> Option<u32> {
        match self {
            Sort::Bv(w) => Some(*w),
            _ => None,
        }
    }
    pub fn fp_dims(&self) -> Option<(u32, u32)> {
        match self {
            Sort::Fp(e, s) => Some((*e, *s)),
            _ => None,
        }
    }

    pub fn smt(&self) -> String {
        match self {
            Sort::Bool      => "Bool".to_string(),
            Sort::Bv(w)     => format!("(_ BitVec {})", w),
            Sort::Fp(e, s)  => format!("(_ FloatingPoint {} {})", e, s),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Term {
    pub sort:   Sort,
    sexp:       String,
}

impl Term {
    pub fn new(sort: Sort, sexp: String) -> Self {
        Self { sort, sexp }
    }
    pub fn smt(&self) -> &str {
        &self.sexp
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kind {
    BvAdd,
    BvSub,
    BvMul,
    BvSdiv,
    BvUdiv,
    BvSrem,
    BvUrem,
    BvAnd,
    BvOr,
    BvXor,
    BvNot,
    BvShl,
    BvAshr,
    BvLshr,
    BvNeg,

    BvSlt,
    BvSle,
    BvSgt,
    BvSge,
    BvUlt,
    BvUle,
    BvUgt,
    BvUge,

    Equal,
    Distinct,
    Ite,
    And,
    Or,
    Not,
    Implies,

    FpAdd,
    FpSub,
    FpMul,
    FpDiv,
    FpRem,
    FpEq,
    FpLt,
    FpLeq,
    FpGt,
    FpGeq,

    FpToSbv,
    FpToFpFromSbv,
    FpToFpFromFp,
    SignExtend,
    ZeroExtend,
    Extract,
    Concat,

    SaddOverflow,
    SsubOverflow,
    SmulOverflow,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown,
}

/// The executor's dependency. Term construction is provided by the trait
/// itself (everything is SMT-LIB2 text); a backend supplies declarations,
/// assertions, satisfiability checks and model values.
pub trait Solver {
    fn const_(&mut self, sort: Sort, name: &str) -> Term;
    fn assert(&mut self, t: &Term) -> Result<(), Error>;
    fn check_sat(&mut self) -> SatResult;
    fn get_value(&mut self, t: &Term) -> Result<Term, Error>;

    fn true_(&self) -> Term {
        Term::new(Sort::Bool, "true".to_string())
    }

    fn false_(&self) -> Term {
        Term::new(Sort::Bool, "false".to_string())
    }

    fn bv_value_i64(&self, sort: Sort, val: i64) -> Term {
        let w = sort.bv_width().unwrap_or(64);
        let uval = if w >= 64 {
            val as u64
        } else {
            (val as u64) & ((1u64 << w) - 1)
        };
        Term::new(sort, format!("(_ bv{} {})", uval, w))
    }

    fn bv_value_dec(&self, sort: Sort, s: &str) -> Result<Term, Error> {
        match crate::ast::parse_int_literal(s) {
            Some(v) => Ok(self.bv_value_i64(sort, v)),
            None => Err(Error::new(format!("Malformed bitvector value '{}'", s), vec![])),
        }
    }

    fn bv_zero(&self, sort: Sort) -> Term {
        self.bv_value_i64(sort, 0)
    }

    fn bv_one(&self, sort: Sort) -> Term {
        self.bv_value_i64(sort, 1)
    }

    fn bv_min_signed(&self, sort: Sort) -> Term {
        let w = sort.bv_width().unwrap_or(64);
        let uval = 1u64 << (w - 1).min(63);
        Term::new(sort, format!("(_ bv{} {})", uval, w))
    }

    fn bv_max_signed(&self, sort: Sort) -> Term {
        let w = sort.bv_width().unwrap_or(64);
        let uval = (1u64 << (w - 1).min(63)) - 1;
        Term::new(sort, format!("(_ bv{} {})", uval, w))
    }

    /// Encode a float constant through its exact IEEE-754 bit pattern,
    /// rounding through f32 for the (8,24) sort. RNE throughout.
    fn fp_value(&self, sort: Sort, val: f64) -> Term {
        let (sign, exp_bits, man_bits, exp_w, man_w) = match sort {
            Sort::Fp(8, 24) => {
                let bits = (val as f32).to_bits() as u64;
                (bits >> 31, (bits >> 23) & 0xff, bits & 0x7f_ffff, 8usize, 23usize)
            }
            _ => {
                let bits = val.to_bits();
                (bits >> 63, (bits >> 52) & 0x7ff, bits & 0xf_ffff_ffff_ffff, 11usize, 52usize)
            }
        };
        Term::new(
            sort,
            format!(
                "(fp #b{:01b} #b{:0ew$b} #b{:0mw$b})",
                sign,
                exp_bits,
                man_bits,
                ew = exp_w,
                mw = man_w
            ),
        )
    }

    fn make(&self, kind: Kind, args: &[Term], indices: &[u32]) -> Term {
        let a = |i: usize| args[i].smt();
        let binary = |op: &str, sort: Sort| Term::new(sort, format!("({} {} {})", op, a(0), a(1)));
        let arg_sort = args.get(0).map(|t| t.sort).unwrap_or(Sort::Bool);

        match kind {
            Kind::BvAdd     => binary("bvadd", arg_sort),
            Kind::BvSub     => binary("bvsub", arg_sort),
            Kind::BvMul     => binary("bvmul", arg_sort),
            Kind::BvSdiv    => binary("bvsdiv", arg_sort),
            Kind::BvUdiv    => binary("bvudiv", arg_sort),
            Kind::BvSrem    => binary("bvsrem", arg_sort),
            Kind::BvUrem    => binary("bvurem", arg_sort),
            Kind::BvAnd     => binary("bvand", arg_sort),
            Kind::BvOr      => binary("bvor", arg_sort),
            Kind::BvXor     => binary("bvxor", arg_sort),
            Kind::BvShl     => binary("bvshl", arg_sort),
            Kind::BvAshr    => binary("bvashr", arg_sort),
            Kind::BvLshr    => binary("bvlshr", arg_sort),
            Kind::BvNot     => Term::new(arg_sort, format!("(bvnot {})", a(0))),
            Kind::BvNeg     => Term::new(arg_sort, format!("(bvneg {})", a(0))),

            Kind::BvSlt     => binary("bvslt", Sort::Bool),
            Kind::BvSle     => binary("bvsle", Sort::Bool),
            Kind::BvSgt     => binary("bvsgt", Sort::Bool),
            Kind::BvSge     => binary("bvsge", Sort::Bool),
            Kind::BvUlt     => binary("bvult", Sort::Bool),
            Kind::BvUle     => binary("bvule", Sort::Bool),
            Kind::BvUgt     => binary("bvugt", Sort::Bool),
            Kind::BvUge     => binary("bvuge", Sort::Bool),

            Kind::Equal     => binary("=", Sort::Bool),
            Kind::Distinct  => binary("distinct", Sort::Bool),
            Kind::Ite => Term::new(
                args[1].sort,
                format!("(ite {} {} {})", a(0), a(1), a(2)),
            ),
            Kind::And       => binary("and", Sort::Bool),
            Kind::Or        => binary("or", Sort::Bool),
            Kind::Not       => Term::new(Sort::Bool, format!("(not {})", a(0))),
            Kind::Implies   => binary("=>", Sort::Bool),

            Kind::FpAdd => Term::new(arg_sort, format!("(fp.add RNE {} {})", a(0), a(1))),
            Kind::FpSub => Term::new(arg_sort, format!("(fp.sub RNE {} {})", a(0), a(1))),
            Kind::FpMul => Term::new(arg_sort, format!("(fp.mul RNE {} {})", a(0), a(1))),
            Kind::FpDiv => Term::new(arg_sort, format!("(fp.div RNE {} {})", a(0), a(1))),
            Kind::FpRem => binary("fp.rem", arg_sort),
            Kind::FpEq  => binary("fp.eq", Sort::Bool),
            Kind::FpLt  => binary("fp.lt", Sort::Bool),
            Kind::FpLeq => binary("fp.leq", Sort::Bool),
            Kind::FpGt  => binary("fp.gt", Sort::Bool),
            Kind::FpGeq => binary("fp.geq", Sort::Bool),

            Kind::FpToSbv => {
                let w = indices[0];
                Term::new(Sort::Bv(w), format!("((_ fp.to_sbv {}) RNE {})", w, a(0)))
            }
            Kind::FpToFpFromSbv | Kind::FpToFpFromFp => {
                let (e, s) = (indices[0], indices[1]);
                Term::new(Sort::Fp(e, s), format!("((_ to_fp {} {}) RNE {})", e, s, a(0)))
            }
            Kind::SignExtend => {
                let n = indices[0];
                let w = arg_sort.bv_width().unwrap_or(0);
                Term::new(Sort::Bv(w + n), format!("((_ sign_extend {}) {})", n, a(0)))
            }
            Kind::ZeroExtend => {
                let n = indices[0];
                let w = arg_sort.bv_width().unwrap_or(0);
                Term::new(Sort::Bv(w + n), format!("((_ zero_extend {}) {})", n, a(0)))
            }
            Kind::Extract => {
                let (hi, lo) = (indices[0], indices[1]);
                Term::new(
                    Sort::Bv(hi - lo + 1),
                    format!("((_ extract {} {}) {})", hi, lo, a(0)),
                )
            }
            Kind::Concat => {
                let w = arg_sort.bv_width().unwrap_or(0)
                    + args[1].sort.bv_width().unwrap_or(0);
                Term::new(Sort::Bv(w), format!("(concat {} {})", a(0), a(1)))
            }

            // widened comparisons so only standard operators are needed
            Kind::SaddOverflow | Kind::SsubOverflow => {
                let op = if kind == Kind::SaddOverflow { "bvadd" } else { "bvsub" };
                Term::new(
                    Sort::Bool,
                    format!(
                        "(distinct ((_ sign_extend 1) ({op} {x} {y})) \
                         ({op} ((_ sign_extend 1) {x}) ((_ sign_extend 1) {y})))",
                        op = op,
                        x = a(0),
                        y = a(1)
                    ),
                )
            }
            Kind::SmulOverflow => {
                let w = arg_sort.bv_width().unwrap_or(64);
                Term::new(
                    Sort::Bool,
                    format!(
                        "(distinct ((_ sign_extend {w}) (bvmul {x} {y})) \
                         (bvmul ((_ sign_extend {w}) {x}) ((_ sign_extend {w}) {y})))",
                        w = w,
                        x = a(0),
                        y = a(1)
                    ),
                )
            }
        }
    }

    /// Render a constant bitvector term. Base 10 yields the signed
    /// decimal value for the term's width.
    fn bv_value_str(&self, t: &Term, base: u8) -> Result<String, Error> {
        let width = t.sort.bv_width().unwrap_or(64);
        let v = decode_bv(t.smt(), width).ok_or_else(|| {
            Error::new(format!("Malformed bitvector model value '{}'", t.smt()), vec![])
        })?;
        let uval = if width >= 64 {
            v as u64
        } else {
            (v as u64) & ((1u64 << width) - 1)
        };
        match base {
            2 => Ok(format!("{:b}", uval)),
            16 => Ok(format!("{:x}", uval)),
            _ => Ok(format!("{}", v)),
        }
    }

    /// Render a constant float term as its IEEE-754 bit pattern in
    /// binary, sign then exponent then significand.
    fn fp_value_str(&self, t: &Term) -> Result<String, Error> {
        let (e, s) = t.sort.fp_dims().ok_or_else(|| {
            Error::new(format!("Expected a float sort, got {:?}", t.sort), vec![])
        })?;
        decode_fp_binary(t.smt(), e, s).ok_or_else(|| {
            Error::new(format!("Malformed float model value '{}'", t.smt()), vec![])
        })
    }
}

fn sign_extend(uval: u64, width: u32) -> i64 {
    if width == 0 || width >= 64 {
        return uval as i64;
    }
    let mask = (1u64 << width) - 1;
    let v = uval & mask;
    if v & (1u64 << (width - 1)) != 0 {
        (v | !mask) as i64
    } else {
        v as i64
    }
}

/// Decode `#x…`, `#b…`, or `(_ bvN w)` into a signed value of `width`.
pub fn decode_bv(sexp: &str, width: u32) -> Option<i64> {
    let s = sexp.trim();
    let uval = if let Some(h) = s.strip_prefix("#x") {
        u64::from_str_radix(h, 16).ok()?
    } else if let Some(b) = s.strip_prefix("#b") {
        u64::from_str_radix(b, 2).ok()?
    } else if s.starts_with("(_") {
        let inner = s.trim_start_matches("(_").trim_end_matches(')').trim();
        let tok = inner.split_whitespace().next()?;
        tok.strip_prefix("bv")?.parse::<u64>().ok()?
    } else {
        return None;
    };
    Some(sign_extend(uval, width))
}

fn bits_of_token(tok: &str, width: usize) -> Option<String> {
    if let Some(b) = tok.strip_prefix("#b") {
        return Some(format!("{:0>w$}", b, w = width));
    }
    if let Some(h) = tok.strip_prefix("#x") {
        let v = u64::from_str_radix(h, 16).ok()?;
        return Some(format!("{:0w$b}", v, w = width));
    }
    None
}

/// Decode a solver float value (the `(fp s e m)` triple or one of the
/// `(_ ±zero/±oo/NaN e s)` specials) into `1 + exp + (sig-1)` bits.
pub fn decode_fp_binary(sexp: &str, exp: u32, sig: u32) -> Option<String> {
    let s = sexp.trim();
    let ew = exp as usize;
    let mw = (sig - 1) as usize;

    if let Some(body) = s.strip_prefix("(fp") {
        let body = body.trim_end_matches(')');
        let toks: Vec<&str> = body.split_whitespace().collect();
        if toks.len() != 3 {
            return None;
        }
        let sbit = bits_of_token(toks[0], 1)?;
        let ebits = bits_of_token(toks[1], ew)?;
        let mbits = bits_of_token(toks[2], mw)?;
        return Some(format!("{}{}{}", sbit, ebits, mbits));
    }

    if s.starts_with("(_") {
        let inner = s.trim_start_matches("(_").trim_end_matches(')').trim();
        let tok = inner.split_whitespace().next()?;
        let (sbit, ebits, mbits) = match tok {
            "+zero" => ("0".to_string(), "0".repeat(ew), "0".repeat(mw)),
            "-zero" => ("1".to_string(), "0".repeat(ew), "0".repeat(mw)),
            "+oo"   => ("0".to_string(), "1".repeat(ew), "0".repeat(mw)),
            "-oo"   => ("1".to_string(), "1".repeat(ew), "0".repeat(mw)),
            "NaN"   => ("0".to_string(), "1".repeat(ew), format!("1{}", "0".repeat(mw - 1))),
            _ => return None,
        };
        return Some(format!("{}{}{}", sbit, ebits, mbits));
    }

    None
}

#[derive(Clone, Copy)]
pub struct ModelParser;

impl<'a> ValueParser<String, &'a str> for ModelParser {
    fn parse_value(self, input: &'a str) -> SmtRes<String> {
        Ok(input.into())
    }
}

impl<'a> ExprParser<String, (), &'a str> for ModelParser {
    fn parse_expr(self, input: &'a str, _: ()) -> SmtRes<String> {
        Ok(input.into())
    }
}

fn smt_err<E: std::fmt::Display>(e: E) -> Error {
    Error::new(format!("smt solver failure: {}", e), vec![])
}

/// Backend speaking SMT-LIB2 to a z3 process on PATH.
pub struct SmtProcSolver {
    solver: rsmt2::Solver<ModelParser>,
    fresh:  usize,
}

impl SmtProcSolver {
    pub fn available() -> bool {
        which::which("z3").is_ok()
    }

    pub fn new(timeout_ms: u32, seed: u32, tee: Option<&Path>) -> Result<Self, Error> {
        if !Self::available() {
            return Err(Error::new(
                "no SMT solver found in PATH (z3 required)".to_string(),
                vec![],
            ));
        }
        let conf = SmtConf::default_z3();
        let mut solver = rsmt2::Solver::new(conf, ModelParser).map_err(smt_err)?;
        if let Some(tee) = tee {
            if let Err(e) = solver.path_tee(tee) {
                warn!("cannot tee smt session: {}", e);
            }
        }
        let _ = solver.set_option(":produce-models", "true");
        if timeout_ms > 0 {
            let _ = solver.set_option(":timeout", timeout_ms);
        }
        if seed > 0 {
            let _ = solver.set_option(":smt.random_seed", seed);
        }
        Ok(Self { solver, fresh: 0 })
    }
}

impl Solver for SmtProcSolver {
    fn const_(&mut self, sort: Sort, name: &str) -> Term {
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let smtname = format!("v{}_{}", self.fresh, sanitized);
        self.fresh += 1;
        if let Err(e) = self.solver.declare_const(&smtname, &sort.smt()) {
            warn!("declare-const {} failed: {}", smtname, e);
        }
        Term::new(sort, smtname)
    }

    fn assert(&mut self, t: &Term) -> Result<(), Error> {
        self.solver.assert(t.smt()).map_err(smt_err)
    }

    fn check_sat(&mut self) -> SatResult {
        match self.solver.check_sat_or_unk() {
            Ok(Some(true))  => SatResult::Sat,
            Ok(Some(false)) => SatResult::Unsat,
            Ok(None)        => SatResult::Unknown,
            Err(e) => {
                warn!("check-sat failed: {}", e);
                SatResult::Unknown
            }
        }
    }

    fn get_value(&mut self, t: &Term) -> Result<Term, Error> {
        let vals = self
            .solver
            .get_values(&[t.smt().to_string()])
            .map_err(smt_err)?;
        let (_, value) = vals
            .into_iter()
            .next()
            .ok_or_else(|| Error::new("solver returned no value".to_string(), vec![]))?;
        Ok(Term::new(t.sort, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A solver that records assertions and never answers; exercises the
    /// provided term algebra without a process.
    struct Scratch {
        fresh: usize,
        asserted: Vec<String>,
    }

    impl Scratch {
        fn new() -> Self {
            Self { fresh: 0, asserted: Vec::new() }
        }
    }

    impl Solver for Scratch {
        fn const_(&mut self, sort: Sort, name: &str) -> Term {
            let t = Term::new(sort, format!("c{}_{}", self.fresh, name.len()));
            self.fresh += 1;
            t
        }
        fn assert(&mut self, t: &Term) -> Result<(), Error> {
            self.asserted.push(t.smt().to_string());
            Ok(())
        }
        fn check_sat(&mut self) -> SatResult {
            SatResult::Unknown
        }
        fn get_value(&mut self, t: &Term) -> Result<Term, Error> {
            Ok(t.clone())
        }
    }

    #[test]
    fn bv_literals_are_twos_complement() {
        let s = Scratch::new();
        let t = s.bv_value_i64(Sort::Bv(8), -1);
        assert_eq!(t.smt(), "(_ bv255 8)");
        let t = s.bv_value_i64(Sort::Bv(32), -1);
        assert_eq!(t.smt(), "(_ bv4294967295 32)");
        let t = s.bv_value_i64(Sort::Bv(64), i64::min_value());
        assert_eq!(t.smt(), "(_ bv9223372036854775808 64)");
    }

    #[test]
    fn min_max_signed() {
        let s = Scratch::new();
        assert_eq!(s.bv_min_signed(Sort::Bv(8)).smt(), "(_ bv128 8)");
        assert_eq!(s.bv_max_signed(Sort::Bv(8)).smt(), "(_ bv127 8)");
    }

    #[test]
    fn term_sorts_follow_kinds() {
        let s = Scratch::new();
        let a = s.bv_value_i64(Sort::Bv(32), 1);
        let b = s.bv_value_i64(Sort::Bv(32), 2);
        assert_eq!(s.make(Kind::BvAdd, &[a.clone(), b.clone()], &[]).sort, Sort::Bv(32));
        assert_eq!(s.make(Kind::BvSlt, &[a.clone(), b.clone()], &[]).sort, Sort::Bool);
        assert_eq!(
            s.make(Kind::SignExtend, &[a.clone()], &[32]).sort,
            Sort::Bv(64)
        );
        assert_eq!(s.make(Kind::Extract, &[a.clone()], &[7, 0]).sort, Sort::Bv(8));
        let c = s.true_();
        assert_eq!(s.make(Kind::Ite, &[c, a.clone(), b], &[]).sort, Sort::Bv(32));
        assert_eq!(s.make(Kind::SmulOverflow, &[a.clone(), a], &[]).sort, Sort::Bool);
    }

    #[test]
    fn fp_value_bit_patterns() {
        let s = Scratch::new();
        // 1.0f32 = 0x3f800000
        let t = s.fp_value(Sort::Fp(8, 24), 1.0);
        assert_eq!(t.smt(), "(fp #b0 #b01111111 #b00000000000000000000000)");
        // -2.0f64: sign 1, exponent 0x400
        let t = s.fp_value(Sort::Fp(11, 53), -2.0);
        assert!(t.smt().starts_with("(fp #b1 #b10000000000 "));
    }

    #[test]
    fn decode_bv_forms() {
        assert_eq!(decode_bv("#x0e", 8), Some(14));
        assert_eq!(decode_bv("#xff", 8), Some(-1));
        assert_eq!(decode_bv("#b11111011", 8), Some(-5));
        assert_eq!(decode_bv("(_ bv14 32)", 32), Some(14));
        assert_eq!(decode_bv("(_ bv4294967295 32)", 32), Some(-1));
        assert_eq!(decode_bv("garbage", 8), None);
    }

    #[test]
    fn decode_fp_forms() {
        // 1.0f32
        let bits = decode_fp_binary("(fp #b0 #b01111111 #b00000000000000000000000)", 8, 24)
            .unwrap();
        assert_eq!(bits.len(), 32);
        assert_eq!(u32::from_str_radix(&bits, 2).unwrap(), 0x3f80_0000);

        let zero = decode_fp_binary("(_ +zero 8 24)", 8, 24).unwrap();
        assert_eq!(u32::from_str_radix(&zero, 2).unwrap(), 0);

        let ninf = decode_fp_binary("(_ -oo 8 24)", 8, 24).unwrap();
        assert_eq!(u32::from_str_radix(&ninf, 2).unwrap(), 0xff80_0000);

        let nan = decode_fp_binary("(_ NaN 8 24)", 8, 24).unwrap();
        let v = u32::from_str_radix(&nan, 2).unwrap();
        assert!(f32::from_bits(v).is_nan());
    }

    #[test]
    fn overflow_encodings_use_standard_operators() {
        let s = Scratch::new();
        let a = s.bv_value_i64(Sort::Bv(32), 3);
        let t = s.make(Kind::SaddOverflow, &[a.clone(), a.clone()], &[]);
        assert!(t.smt().contains("sign_extend 1"));
        let t = s.make(Kind::SmulOverflow, &[a.clone(), a], &[]);
        assert!(t.smt().contains("sign_extend 32"));
    }

    #[test]
    fn scratch_transport_records_assertions() {
        let mut s = Scratch::new();
        let c = s.const_(Sort::Bv(8), "%x");
        let zero = s.bv_zero(Sort::Bv(8));
        let eq = s.make(Kind::Equal, &[c, zero], &[]);
        s.assert(&eq).unwrap();
        assert_eq!(s.asserted.len(), 1);
        assert!(s.asserted[0].starts_with("(= c0_"));
    }

    #[test]
    fn signed_render() {
        let s = Scratch::new();
        let t = Term::new(Sort::Bv(8), "#xff".to_string());
        assert_eq!(s.bv_value_str(&t, 10).unwrap(), "-1");
        assert_eq!(s.bv_value_str(&t, 16).unwrap(), "ff");
    }
}
