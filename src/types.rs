//! Pure predicates and projections over AST types.

use crate::ast::{FloatKind, IntKind, Program, StructDecl, Type, TypeKind, TypeRef};
use std::collections::HashMap;

/// Bitwidth of an integer type, `None` for anything else.
pub fn bit_width(t: &Type) -> Option<u32> {
    match &t.kind {
        TypeKind::Int { kind: IntKind::I32, .. }    => Some(32),
        TypeKind::Int { kind: IntKind::I64, .. }    => Some(64),
        TypeKind::Int { kind: IntKind::Custom, bits } => Some(bits.unwrap_or(0)),
        _                                           => None,
    }
}

pub fn float_kind(t: &Type) -> Option<FloatKind> {
    match &t.kind {
        TypeKind::Float { kind }    => Some(*kind),
        _                           => None,
    }
}

pub fn float_bits(k: FloatKind) -> u32 {
    match k {
        FloatKind::F32  => 32,
        FloatKind::F64  => 64,
    }
}

pub fn as_array(t: &Type) -> Option<(u64, &TypeRef)> {
    match &t.kind {
        TypeKind::Array { size, elem }  => Some((*size, elem)),
        _                               => None,
    }
}

pub fn as_struct(t: &Type) -> Option<&str> {
    match &t.kind {
        TypeKind::Struct { name }   => Some(&name.name),
        _                           => None,
    }
}

pub fn is_aggregate(t: &Type) -> bool {
    matches!(t.kind, TypeKind::Array { .. } | TypeKind::Struct { .. })
}

/// Structural equality. Integer kinds must match exactly, arrays match on
/// size and element, structs match by declared name.
pub fn types_equal(a: &Type, b: &Type) -> bool {
    match (&a.kind, &b.kind) {
        (
            TypeKind::Int { kind: ka, bits: ba },
            TypeKind::Int { kind: kb, bits: bb },
        ) => {
            if ka != kb {
                return false;
            }
            if *ka == IntKind::Custom {
                return ba == bb;
            }
            true
        }
        (TypeKind::Float { kind: ka }, TypeKind::Float { kind: kb }) => ka == kb,
        (TypeKind::Struct { name: na }, TypeKind::Struct { name: nb }) => na.name == nb.name,
        (
            TypeKind::Array { size: sa, elem: ea },
            TypeKind::Array { size: sb, elem: eb },
        ) => sa == sb && types_equal(ea, eb),
        _ => false,
    }
}

/// Program-wide struct lookup, keyed by the declared `@Name`.
/// The first declaration wins; duplicates are reported elsewhere.
pub struct StructTable<'p> {
    map: HashMap<&'p str, &'p StructDecl>,
}

impl<'p> StructTable<'p> {
    pub fn build(prog: &'p Program) -> Self {
        let mut map = HashMap::new();
        for s in &prog.structs {
            map.entry(s.name.name.as_str()).or_insert(s);
        }
        Self { map }
    }

    pub fn get(&self, name: &str) -> Option<&'p StructDecl> {
        self.map.get(name).copied()
    }

    pub fn field_type(&self, struct_name: &str, field: &str) -> Option<&'p TypeRef> {
        self.get(struct_name)?
            .fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| &f.ty)
    }

    /// Collect the scalar leaf types of `t` in declaration order.
    /// Unknown struct names contribute nothing; they are reported elsewhere.
    pub fn collect_leaves_owned(&self, t: &TypeRef, out: &mut Vec<TypeRef>) {
        match &t.kind {
            TypeKind::Array { elem, .. } => self.collect_leaves_owned(elem, out),
            TypeKind::Struct { name } => {
                if let Some(sd) = self.get(&name.name) {
                    for f in &sd.fields {
                        self.collect_leaves_owned(&f.ty, out);
                    }
                }
            }
            _ => out.push(t.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{GlobalId, SourceSpan};
    use std::sync::Arc;

    fn int(kind: IntKind, bits: Option<u32>) -> Type {
        Type { kind: TypeKind::Int { kind, bits }, span: SourceSpan::default() }
    }

    #[test]
    fn widths() {
        assert_eq!(bit_width(&int(IntKind::I32, None)), Some(32));
        assert_eq!(bit_width(&int(IntKind::I64, None)), Some(64));
        assert_eq!(bit_width(&int(IntKind::Custom, Some(7))), Some(7));
        let f = Type { kind: TypeKind::Float { kind: FloatKind::F32 }, span: SourceSpan::default() };
        assert_eq!(bit_width(&f), None);
        assert_eq!(float_kind(&f), Some(FloatKind::F32));
    }

    #[test]
    fn structural_equality() {
        // i32 and i<32> spell the same width but are distinct kinds
        assert!(!types_equal(&int(IntKind::I32, None), &int(IntKind::Custom, Some(32))));
        assert!(types_equal(&int(IntKind::Custom, Some(8)), &int(IntKind::Custom, Some(8))));

        let a = Type {
            kind: TypeKind::Array { size: 2, elem: Arc::new(int(IntKind::I32, None)) },
            span: SourceSpan::default(),
        };
        let b = Type {
            kind: TypeKind::Array { size: 2, elem: Arc::new(int(IntKind::I32, None)) },
            span: SourceSpan::default(),
        };
        let c = Type {
            kind: TypeKind::Array { size: 3, elem: Arc::new(int(IntKind::I32, None)) },
            span: SourceSpan::default(),
        };
        assert!(types_equal(&a, &b));
        assert!(!types_equal(&a, &c));

        let s1 = Type {
            kind: TypeKind::Struct {
                name: GlobalId { name: "@P".into(), span: SourceSpan::default() },
            },
            span: SourceSpan::default(),
        };
        let s2 = Type {
            kind: TypeKind::Struct {
                name: GlobalId { name: "@Q".into(), span: SourceSpan::default() },
            },
            span: SourceSpan::default(),
        };
        assert!(!types_equal(&s1, &s2));
    }
}
