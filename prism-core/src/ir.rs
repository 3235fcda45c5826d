//! Basic-block intermediate representation.
//!
//! Every top-level form compiles into its own small [`Module`]. All
//! values are f64. Mutable variables live in per-function slots with
//! explicit loads and stores; control flow is explicit branches
//! between blocks, and values that converge after a branch do so
//! through phi instructions at the join block.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// Identifies an instruction result within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

/// Identifies a basic block within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

/// Identifies a mutable storage slot within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// One instruction. Every instruction defines `dest`; a store's value
/// is the value it stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub dest: ValueId,
    pub kind: InstrKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    /// Materialize a constant.
    Const(f64),
    /// Read the n-th incoming argument.
    Arg(u32),
    /// Read a slot.
    Load(SlotId),
    /// Write a slot.
    Store(SlotId, ValueId),
    FAdd(ValueId, ValueId),
    FSub(ValueId, ValueId),
    FMul(ValueId, ValueId),
    FNeg(ValueId),
    /// Less-than where an unordered operand compares true, as 1.0/0.0.
    FCmpUlt(ValueId, ValueId),
    /// Ordered not-equal, as 1.0/0.0. Branch conditions are formed by
    /// comparing a value against a zero constant with this.
    FCmpOne(ValueId, ValueId),
    /// Call a function by name; names resolve at execution time.
    Call(String, Vec<ValueId>),
    /// Merge values flowing in from predecessor blocks.
    Phi(Vec<(BlockId, ValueId)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Return(ValueId),
    Branch(BlockId),
    CondBranch {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// Placeholder until the builder seals the block. Reaching one at
    /// execution time means the function was never finished.
    Unterminated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub label: String,
    pub instrs: Vec<Instr>,
    pub terminator: Terminator,
}

/// A mutable storage cell, one per variable a function introduces.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub slots: Vec<Slot>,
    pub blocks: Vec<BasicBlock>,
    /// How many values the function defines; execution sizes its
    /// value storage from this.
    pub value_count: u32,
}

impl Function {
    /// The entry block; the builder always creates it first.
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    fn label(&self, block: BlockId) -> &str {
        self.blocks
            .get(block.0 as usize)
            .map(|b| b.label.as_str())
            .unwrap_or("<missing>")
    }

    fn render_instr(&self, instr: &Instr) -> String {
        let rhs = match &instr.kind {
            InstrKind::Const(value) => format!("const {value}"),
            InstrKind::Arg(index) => format!("arg {index}"),
            InstrKind::Load(slot) => format!("load {slot}"),
            InstrKind::Store(slot, value) => format!("store {slot}, {value}"),
            InstrKind::FAdd(a, b) => format!("fadd {a}, {b}"),
            InstrKind::FSub(a, b) => format!("fsub {a}, {b}"),
            InstrKind::FMul(a, b) => format!("fmul {a}, {b}"),
            InstrKind::FNeg(a) => format!("fneg {a}"),
            InstrKind::FCmpUlt(a, b) => format!("fcmp ult {a}, {b}"),
            InstrKind::FCmpOne(a, b) => format!("fcmp one {a}, {b}"),
            InstrKind::Call(name, args) => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                format!("call {name}({})", args.join(", "))
            }
            InstrKind::Phi(incoming) => {
                let arms: Vec<String> = incoming
                    .iter()
                    .map(|(block, value)| format!("[{}: {value}]", self.label(*block)))
                    .collect();
                format!("phi {}", arms.join(", "))
            }
        };
        format!("{} = {rhs}", instr.dest)
    }

    fn render_terminator(&self, terminator: &Terminator) -> String {
        match terminator {
            Terminator::Return(value) => format!("ret {value}"),
            Terminator::Branch(target) => format!("br {}", self.label(*target)),
            Terminator::CondBranch {
                cond,
                then_block,
                else_block,
            } => format!(
                "cbr {cond}, {}, {}",
                self.label(*then_block),
                self.label(*else_block)
            ),
            Terminator::Unterminated => "<unterminated>".to_string(),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  fn {}(", self.name)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        writeln!(f, ") {{")?;
        if !self.slots.is_empty() {
            write!(f, "    slots {{")?;
            for (index, slot) in self.slots.iter().enumerate() {
                if index > 0 {
                    write!(f, ",")?;
                }
                write!(f, " s{index}: {}", slot.name)?;
            }
            writeln!(f, " }}")?;
        }
        for block in &self.blocks {
            writeln!(f, "  {}:", block.label)?;
            for instr in &block.instrs {
                writeln!(f, "    {}", self.render_instr(instr))?;
            }
            writeln!(f, "    {}", self.render_terminator(&block.terminator))?;
        }
        writeln!(f, "  }}")
    }
}

/// A function declaration without a body: externs, plus any call
/// target a unit references but does not define.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
}

/// One compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub declares: Vec<FunctionDecl>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Module {
            name: name.to_string(),
            declares: Vec::new(),
            functions: Vec::new(),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {} {{", self.name)?;
        for decl in &self.declares {
            writeln!(f, "  declare {}({})", decl.name, decl.params.join(", "))?;
        }
        for (index, function) in self.functions.iter().enumerate() {
            if index > 0 || !self.declares.is_empty() {
                writeln!(f)?;
            }
            write!(f, "{function}")?;
        }
        writeln!(f, "}}")
    }
}

/// Merge per-form units into one artifact module. Declarations
/// collapse by name and drop out entirely once some unit defines the
/// function.
pub fn link_units(name: &str, units: &[Module]) -> Module {
    let mut merged = Module::new(name);
    let mut declared = HashSet::new();
    for unit in units {
        for decl in &unit.declares {
            if declared.insert(decl.name.clone()) {
                merged.declares.push(decl.clone());
            }
        }
        merged.functions.extend(unit.functions.iter().cloned());
    }
    let defined: HashSet<&str> = merged.functions.iter().map(|f| f.name.as_str()).collect();
    merged.declares.retain(|d| !defined.contains(d.name.as_str()));
    merged
}

/// Incrementally builds one [`Function`]. The builder is also the unit
/// of rollback for code generation: dropping it without calling
/// [`FunctionBuilder::build`] discards everything it staged.
#[derive(Debug)]
pub struct FunctionBuilder {
    function: Function,
    current: BlockId,
    label_counts: HashMap<String, u32>,
}

impl FunctionBuilder {
    pub fn new(name: &str, params: &[String]) -> Self {
        let mut builder = FunctionBuilder {
            function: Function {
                name: name.to_string(),
                params: params.to_vec(),
                slots: Vec::new(),
                blocks: Vec::new(),
                value_count: 0,
            },
            current: BlockId(0),
            label_counts: HashMap::new(),
        };
        builder.create_block("entry");
        builder
    }

    /// Append a new, unterminated block. Repeated labels get a numeric
    /// suffix so nested constructs stay readable in dumps.
    pub fn create_block(&mut self, label: &str) -> BlockId {
        let count = self.label_counts.entry(label.to_string()).or_insert(0);
        let unique = if *count == 0 {
            label.to_string()
        } else {
            format!("{label}{count}")
        };
        *count += 1;
        let id = BlockId(self.function.blocks.len() as u32);
        self.function.blocks.push(BasicBlock {
            label: unique,
            instrs: Vec::new(),
            terminator: Terminator::Unterminated,
        });
        id
    }

    /// Point instruction insertion at `block`.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    /// Where instructions are being inserted right now. Constructs
    /// whose arms may themselves branch re-query this to learn which
    /// block an arm actually ended in.
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn alloc_slot(&mut self, name: &str) -> SlotId {
        let id = SlotId(self.function.slots.len() as u32);
        self.function.slots.push(Slot {
            name: name.to_string(),
        });
        id
    }

    /// Append an instruction to the current block and hand back the
    /// value it defines.
    pub fn push(&mut self, kind: InstrKind) -> ValueId {
        let dest = ValueId(self.function.value_count);
        self.function.value_count += 1;
        self.function.blocks[self.current.0 as usize]
            .instrs
            .push(Instr { dest, kind });
        dest
    }

    /// Seal the current block.
    pub fn terminate(&mut self, terminator: Terminator) {
        self.function.blocks[self.current.0 as usize].terminator = terminator;
    }

    pub fn build(self) -> Function {
        self.function
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_numbers_values_and_uniques_labels() {
        let mut builder = FunctionBuilder::new("f", &["x".to_string()]);
        let a = builder.push(InstrKind::Const(1.0));
        let b = builder.push(InstrKind::Const(2.0));
        assert_eq!(a, ValueId(0));
        assert_eq!(b, ValueId(1));

        let first = builder.create_block("then");
        let second = builder.create_block("then");
        let function = {
            builder.terminate(Terminator::Branch(first));
            builder.switch_to(first);
            builder.terminate(Terminator::Branch(second));
            builder.switch_to(second);
            let sum = builder.push(InstrKind::FAdd(a, b));
            builder.terminate(Terminator::Return(sum));
            builder.build()
        };
        assert_eq!(function.blocks.len(), 3);
        assert_eq!(function.blocks[0].label, "entry");
        assert_eq!(function.blocks[1].label, "then");
        assert_eq!(function.blocks[2].label, "then1");
        assert_eq!(function.value_count, 3);
    }

    #[test]
    fn display_renders_a_little_function() {
        let mut builder = FunctionBuilder::new("answer", &[]);
        let value = builder.push(InstrKind::Const(42.0));
        builder.terminate(Terminator::Return(value));
        let mut module = Module::new("unit0");
        module.functions.push(builder.build());

        let text = module.to_string();
        assert!(text.contains("module unit0 {"));
        assert!(text.contains("fn answer() {"));
        assert!(text.contains("%0 = const 42"));
        assert!(text.contains("ret %0"));
    }

    #[test]
    fn link_units_collapses_declarations() {
        let mut first = Module::new("unit0");
        first.declares.push(FunctionDecl {
            name: "print".into(),
            params: vec!["x".into()],
        });
        let mut builder = FunctionBuilder::new("f", &["x".to_string()]);
        let value = builder.push(InstrKind::Arg(0));
        builder.terminate(Terminator::Return(value));
        first.functions.push(builder.build());

        let mut second = Module::new("unit1");
        second.declares.push(FunctionDecl {
            name: "print".into(),
            params: vec!["x".into()],
        });
        second.declares.push(FunctionDecl {
            name: "f".into(),
            params: vec!["x".into()],
        });
        let mut builder = FunctionBuilder::new("main", &[]);
        let one = builder.push(InstrKind::Const(1.0));
        let call = builder.push(InstrKind::Call("f".into(), vec![one]));
        builder.terminate(Terminator::Return(call));
        second.functions.push(builder.build());

        let merged = link_units("prog", &[first, second]);
        // `print` is declared once; `f` has a body so its declaration
        // disappears.
        assert_eq!(merged.declares.len(), 1);
        assert_eq!(merged.declares[0].name, "print");
        assert_eq!(merged.functions.len(), 2);
    }
}
