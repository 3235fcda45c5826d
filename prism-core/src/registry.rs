//! Cross-unit function registry.
//!
//! Generated units are independent, so calls into functions that live
//! in earlier units resolve against the prototype stored here rather
//! than against any IR. The registry also enforces the two definition
//! invariants: a body may be supplied at most once per name, and a
//! name's parameter count never changes once seen.

use crate::ast::Prototype;
use crate::error::CodegenError;
use std::collections::HashMap;

/// What the registry knows about one function name.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub proto: Prototype,
    /// True once a `def` for this name has been committed.
    pub has_body: bool,
}

#[derive(Debug, Default)]
pub struct Registry {
    functions: HashMap<String, Signature>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&Signature> {
        self.functions.get(name)
    }

    /// Record an `extern` or other bodiless declaration. Redeclaring a
    /// known name is allowed as long as the parameter count matches;
    /// the stored prototype is refreshed but a committed body stays
    /// committed.
    pub fn declare(&mut self, proto: &Prototype) -> Result<(), CodegenError> {
        match self.functions.get_mut(&proto.name) {
            Some(existing) => {
                if existing.proto.params.len() != proto.params.len() {
                    return Err(CodegenError::SignatureMismatch {
                        name: proto.name.clone(),
                        expected: existing.proto.params.len(),
                        found: proto.params.len(),
                    });
                }
                existing.proto = proto.clone();
                Ok(())
            }
            None => {
                self.functions.insert(
                    proto.name.clone(),
                    Signature {
                        proto: proto.clone(),
                        has_body: false,
                    },
                );
                Ok(())
            }
        }
    }

    /// Stage a definition. Validates the invariants, installs the
    /// prototype (so the body can call itself), and hands back the
    /// entry it replaced for use with [`Registry::roll_back`].
    pub fn begin_definition(
        &mut self,
        proto: &Prototype,
    ) -> Result<Option<Signature>, CodegenError> {
        if let Some(existing) = self.functions.get(&proto.name) {
            if existing.has_body {
                return Err(CodegenError::DuplicateDefinition(proto.name.clone()));
            }
            if existing.proto.params.len() != proto.params.len() {
                return Err(CodegenError::SignatureMismatch {
                    name: proto.name.clone(),
                    expected: existing.proto.params.len(),
                    found: proto.params.len(),
                });
            }
        }
        Ok(self.functions.insert(
            proto.name.clone(),
            Signature {
                proto: proto.clone(),
                has_body: false,
            },
        ))
    }

    /// Commit a staged definition: the name now owns a body.
    pub fn finish_definition(&mut self, name: &str) {
        if let Some(signature) = self.functions.get_mut(name) {
            signature.has_body = true;
        }
    }

    /// Undo [`Registry::begin_definition`], restoring whatever entry
    /// (possibly none) the name had before.
    pub fn roll_back(&mut self, name: &str, previous: Option<Signature>) {
        match previous {
            Some(signature) => {
                self.functions.insert(name.to_string(), signature);
            }
            None => {
                self.functions.remove(name);
            }
        }
    }
}
