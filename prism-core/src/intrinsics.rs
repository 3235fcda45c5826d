//! Runtime print intrinsics.
//!
//! These are the functions the execution engine provides itself; a
//! fresh session pre-registers their prototypes so programs can call
//! them without an `extern` line. They all return 0.0.

use crate::ast::Prototype;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicKind {
    /// `print(x)`: write the number, no newline.
    PrintNumber,
    /// `println(x)`: write the number and a newline.
    PrintNumberLn,
    /// `putchard(c)`: write the character with code `c`.
    PutChar,
    /// `printstar()`: write `*`.
    PrintStar,
    /// `printspace()`: write a space.
    PrintSpace,
    /// `printnewline()`: write a newline.
    PrintNewline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrinsicDescriptor {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub kind: IntrinsicKind,
}

impl IntrinsicDescriptor {
    /// The prototype a session registers for this intrinsic.
    pub fn prototype(&self) -> Prototype {
        Prototype::new(self.name, self.params.iter().map(|p| p.to_string()).collect())
    }
}

pub const INTRINSICS: &[IntrinsicDescriptor] = &[
    IntrinsicDescriptor {
        name: "print",
        params: &["x"],
        kind: IntrinsicKind::PrintNumber,
    },
    IntrinsicDescriptor {
        name: "println",
        params: &["x"],
        kind: IntrinsicKind::PrintNumberLn,
    },
    IntrinsicDescriptor {
        name: "putchard",
        params: &["c"],
        kind: IntrinsicKind::PutChar,
    },
    IntrinsicDescriptor {
        name: "printstar",
        params: &[],
        kind: IntrinsicKind::PrintStar,
    },
    IntrinsicDescriptor {
        name: "printspace",
        params: &[],
        kind: IntrinsicKind::PrintSpace,
    },
    IntrinsicDescriptor {
        name: "printnewline",
        params: &[],
        kind: IntrinsicKind::PrintNewline,
    },
];

pub fn find_intrinsic(name: &str) -> Option<&'static IntrinsicDescriptor> {
    INTRINSICS.iter().find(|descriptor| descriptor.name == name)
}
