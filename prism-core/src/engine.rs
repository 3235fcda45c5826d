//! Reference execution engine: a direct interpreter over the IR.
//!
//! Every value is an f64. Each call gets a frame with one cell per
//! value the function defines and one per slot. Phi instructions read
//! the predecessor block recorded by the last branch the frame took.
//!
//! Call targets resolve by name against the loaded units (newest
//! first), then against the print intrinsics, which write to the
//! engine's output sink.

use crate::backend::Backend;
use crate::error::EngineError;
use crate::intrinsics::{find_intrinsic, IntrinsicKind};
use crate::ir::{BlockId, Function, InstrKind, Module, SlotId, Terminator, ValueId};
use std::io::Write;

pub struct Interpreter<W: Write> {
    loaded: Vec<Module>,
    out: W,
}

impl<W: Write> Interpreter<W> {
    pub fn new(out: W) -> Self {
        Interpreter {
            loaded: Vec::new(),
            out,
        }
    }

    /// Take back the output sink, mainly so tests can inspect what the
    /// program printed.
    pub fn into_output(self) -> W {
        self.out
    }
}

impl<W: Write> Backend for Interpreter<W> {
    fn add_module(&mut self, module: Module) {
        self.loaded.push(module);
    }

    fn invoke(&mut self, name: &str) -> Result<f64, EngineError> {
        call_by_name(&self.loaded, &mut self.out, name, &[])
    }

    fn remove_unit(&mut self, name: &str) {
        self.loaded.retain(|module| module.name != name);
    }
}

fn call_by_name<W: Write>(
    loaded: &[Module],
    out: &mut W,
    name: &str,
    args: &[f64],
) -> Result<f64, EngineError> {
    if let Some(function) = find_function(loaded, name) {
        if function.params.len() != args.len() {
            return Err(EngineError::ArityMismatch {
                name: name.to_string(),
                expected: function.params.len(),
                found: args.len(),
            });
        }
        return run_function(loaded, out, function, args);
    }
    if let Some(descriptor) = find_intrinsic(name) {
        if descriptor.params.len() != args.len() {
            return Err(EngineError::ArityMismatch {
                name: name.to_string(),
                expected: descriptor.params.len(),
                found: args.len(),
            });
        }
        return run_intrinsic(out, descriptor.kind, args);
    }
    Err(EngineError::UnresolvedSymbol(name.to_string()))
}

fn find_function<'m>(loaded: &'m [Module], name: &str) -> Option<&'m Function> {
    loaded
        .iter()
        .rev()
        .flat_map(|module| module.functions.iter())
        .find(|function| function.name == name)
}

fn run_intrinsic<W: Write>(
    out: &mut W,
    kind: IntrinsicKind,
    args: &[f64],
) -> Result<f64, EngineError> {
    match kind {
        IntrinsicKind::PrintNumber => write!(out, "{}", args[0])?,
        IntrinsicKind::PrintNumberLn => writeln!(out, "{}", args[0])?,
        IntrinsicKind::PutChar => write!(out, "{}", args[0] as u8 as char)?,
        IntrinsicKind::PrintStar => write!(out, "*")?,
        IntrinsicKind::PrintSpace => write!(out, " ")?,
        IntrinsicKind::PrintNewline => writeln!(out)?,
    }
    Ok(0.0)
}

fn value(values: &[f64], id: ValueId) -> Result<f64, EngineError> {
    values
        .get(id.0 as usize)
        .copied()
        .ok_or(EngineError::MalformedUnit("value id out of range"))
}

fn slot(slots: &[f64], id: SlotId) -> Result<f64, EngineError> {
    slots
        .get(id.0 as usize)
        .copied()
        .ok_or(EngineError::MalformedUnit("slot id out of range"))
}

fn run_function<W: Write>(
    loaded: &[Module],
    out: &mut W,
    function: &Function,
    args: &[f64],
) -> Result<f64, EngineError> {
    let mut values = vec![0.0; function.value_count as usize];
    let mut slots = vec![0.0; function.slots.len()];
    let mut block = function.entry();
    let mut predecessor: Option<BlockId> = None;

    loop {
        let current = function
            .blocks
            .get(block.0 as usize)
            .ok_or(EngineError::MalformedUnit("branch to a missing block"))?;

        for instr in &current.instrs {
            let computed = match &instr.kind {
                InstrKind::Const(constant) => *constant,
                InstrKind::Arg(index) => *args
                    .get(*index as usize)
                    .ok_or(EngineError::MalformedUnit("argument index out of range"))?,
                InstrKind::Load(id) => slot(&slots, *id)?,
                InstrKind::Store(id, source) => {
                    let stored = value(&values, *source)?;
                    *slots
                        .get_mut(id.0 as usize)
                        .ok_or(EngineError::MalformedUnit("slot id out of range"))? = stored;
                    stored
                }
                InstrKind::FAdd(a, b) => value(&values, *a)? + value(&values, *b)?,
                InstrKind::FSub(a, b) => value(&values, *a)? - value(&values, *b)?,
                InstrKind::FMul(a, b) => value(&values, *a)? * value(&values, *b)?,
                InstrKind::FNeg(a) => -value(&values, *a)?,
                InstrKind::FCmpUlt(a, b) => {
                    // Unordered-or-less-than.
                    let (l, r) = (value(&values, *a)?, value(&values, *b)?);
                    if l.is_nan() || r.is_nan() || l < r {
                        1.0
                    } else {
                        0.0
                    }
                }
                InstrKind::FCmpOne(a, b) => {
                    // Ordered-and-unequal.
                    let (l, r) = (value(&values, *a)?, value(&values, *b)?);
                    if !l.is_nan() && !r.is_nan() && l != r {
                        1.0
                    } else {
                        0.0
                    }
                }
                InstrKind::Call(callee, arg_ids) => {
                    let mut call_args = Vec::with_capacity(arg_ids.len());
                    for id in arg_ids {
                        call_args.push(value(&values, *id)?);
                    }
                    call_by_name(loaded, out, callee, &call_args)?
                }
                InstrKind::Phi(incoming) => {
                    let from = predecessor
                        .ok_or(EngineError::MalformedUnit("phi in the entry block"))?;
                    let (_, source) = incoming
                        .iter()
                        .find(|(pred, _)| *pred == from)
                        .ok_or(EngineError::MalformedUnit("phi has no arm for the predecessor"))?;
                    value(&values, *source)?
                }
            };
            *values
                .get_mut(instr.dest.0 as usize)
                .ok_or(EngineError::MalformedUnit("value id out of range"))? = computed;
        }

        match &current.terminator {
            Terminator::Return(id) => return value(&values, *id),
            Terminator::Branch(target) => {
                predecessor = Some(block);
                block = *target;
            }
            Terminator::CondBranch {
                cond,
                then_block,
                else_block,
            } => {
                let flag = value(&values, *cond)?;
                predecessor = Some(block);
                block = if flag != 0.0 { *then_block } else { *else_block };
            }
            Terminator::Unterminated => {
                return Err(EngineError::MalformedUnit("unterminated block"));
            }
        }
    }
}
