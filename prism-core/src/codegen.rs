//! Lowering from syntax trees to IR units.
//!
//! Each top-level form is lowered into its own unit, and a failed form
//! must leave no trace: the staged IR goes down with its builder, the
//! registry entry reverts to whatever preceded the form, and a
//! precedence installed for an operator definition is taken back out.

use crate::ast::{self, Expr, Prototype};
use crate::error::CodegenError;
use crate::ir::{
    self, BlockId, FunctionBuilder, FunctionDecl, InstrKind, Module, SlotId, Terminator, ValueId,
};
use crate::precedence::PrecedenceTable;
use crate::registry::Registry;
use std::collections::HashMap;

/// Lowers the forms of one unit. Borrows the session's registry and
/// precedence table mutably because committing or rolling back a
/// definition touches both.
pub struct CodeGenerator<'a> {
    registry: &'a mut Registry,
    table: &'a mut PrecedenceTable,
    module: Module,
    /// Name -> slot for everything in scope inside the function being
    /// generated: parameters, loop variables and `var` bindings.
    vars: HashMap<String, SlotId>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(
        unit_name: &str,
        registry: &'a mut Registry,
        table: &'a mut PrecedenceTable,
    ) -> Self {
        CodeGenerator {
            registry,
            table,
            module: Module::new(unit_name),
            vars: HashMap::new(),
        }
    }

    /// Hand over the finished unit.
    pub fn finish(self) -> Module {
        self.module
    }

    /// Lower a `def`. On any failure the registry and the precedence
    /// table are exactly as they were before the call.
    pub fn gen_definition(&mut self, function: &ast::Function) -> Result<(), CodegenError> {
        let proto = &function.proto;
        let previous = self.registry.begin_definition(proto)?;

        // A binary operator becomes parseable the moment its
        // definition begins; a failed body takes it back out.
        let staged_op = match (proto.is_binary_op(), proto.operator_char()) {
            (true, Some(op)) => Some((op, self.table.install(op, proto.precedence))),
            _ => None,
        };

        match self.gen_function_ir(&proto.name, &proto.params, &function.body) {
            Ok(generated) => {
                self.module.functions.push(generated);
                self.registry.finish_definition(&proto.name);
                Ok(())
            }
            Err(error) => {
                if let Some((op, prior)) = staged_op {
                    match prior {
                        Some(precedence) => {
                            self.table.install(op, precedence);
                        }
                        None => {
                            self.table.remove(op);
                        }
                    }
                }
                self.registry.roll_back(&proto.name, previous);
                Err(error)
            }
        }
    }

    /// Lower an `extern`: a registry entry plus a declaration in the
    /// unit so the artifact names it.
    pub fn gen_extern(&mut self, proto: &Prototype) -> Result<(), CodegenError> {
        self.registry.declare(proto)?;
        self.module.declares.push(FunctionDecl {
            name: proto.name.clone(),
            params: proto.params.clone(),
        });
        Ok(())
    }

    /// Lower a bare top-level expression into a synthetic
    /// zero-parameter function without touching the registry:
    /// anonymous units are invoked once and thrown away, never called
    /// by name.
    pub fn gen_anonymous(&mut self, name: &str, body: &Expr) -> Result<(), CodegenError> {
        let generated = self.gen_function_ir(name, &[], body)?;
        self.module.functions.push(generated);
        Ok(())
    }

    fn gen_function_ir(
        &mut self,
        name: &str,
        params: &[String],
        body: &Expr,
    ) -> Result<ir::Function, CodegenError> {
        self.vars.clear();
        let mut builder = FunctionBuilder::new(name, params);
        // Arguments are spilled to slots immediately; `=` can then
        // treat parameters like any other mutable variable.
        for (index, param) in params.iter().enumerate() {
            let slot = builder.alloc_slot(param);
            let arg = builder.push(InstrKind::Arg(index as u32));
            builder.push(InstrKind::Store(slot, arg));
            self.vars.insert(param.clone(), slot);
        }
        let value = self.gen_expr(&mut builder, body)?;
        builder.terminate(Terminator::Return(value));
        Ok(builder.build())
    }

    fn gen_expr(&mut self, b: &mut FunctionBuilder, expr: &Expr) -> Result<ValueId, CodegenError> {
        match expr {
            Expr::Number(value) => Ok(b.push(InstrKind::Const(*value))),
            Expr::Variable(name) => {
                let slot = self
                    .vars
                    .get(name)
                    .copied()
                    .ok_or_else(|| CodegenError::UnknownVariable(name.clone()))?;
                Ok(b.push(InstrKind::Load(slot)))
            }
            Expr::Unary { op, operand } => self.gen_unary(b, *op, operand),
            Expr::Binary { op, lhs, rhs } => self.gen_binary(b, *op, lhs, rhs),
            Expr::Call { callee, args } => self.gen_call(b, callee, args),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => self.gen_if(b, cond, then_branch, else_branch),
            Expr::For {
                var,
                start,
                end,
                step,
                body,
            } => self.gen_for(b, var, start, end, step.as_deref(), body),
            Expr::Var { bindings, body } => self.gen_var(b, bindings, body),
        }
    }

    fn gen_unary(
        &mut self,
        b: &mut FunctionBuilder,
        op: char,
        operand: &Expr,
    ) -> Result<ValueId, CodegenError> {
        let value = self.gen_expr(b, operand)?;
        // '-' is the one builtin with a unary instruction; every other
        // prefix operator is a call to its `unary<c>` function.
        if op == '-' {
            return Ok(b.push(InstrKind::FNeg(value)));
        }
        let callee = format!("unary{op}");
        if self.callee_arity(&callee).is_none() {
            return Err(CodegenError::UnknownOperator(op));
        }
        Ok(self.emit_call(b, &callee, vec![value]))
    }

    fn gen_binary(
        &mut self,
        b: &mut FunctionBuilder,
        op: char,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<ValueId, CodegenError> {
        // Assignment is special: the left side is a name, not a value.
        if op == '=' {
            let Expr::Variable(name) = lhs else {
                return Err(CodegenError::InvalidAssignTarget);
            };
            let value = self.gen_expr(b, rhs)?;
            let slot = self
                .vars
                .get(name)
                .copied()
                .ok_or_else(|| CodegenError::UnknownVariable(name.clone()))?;
            b.push(InstrKind::Store(slot, value));
            return Ok(value);
        }

        let lhs = self.gen_expr(b, lhs)?;
        let rhs = self.gen_expr(b, rhs)?;
        match op {
            '+' => Ok(b.push(InstrKind::FAdd(lhs, rhs))),
            '-' => Ok(b.push(InstrKind::FSub(lhs, rhs))),
            '*' => Ok(b.push(InstrKind::FMul(lhs, rhs))),
            '<' => Ok(b.push(InstrKind::FCmpUlt(lhs, rhs))),
            _ => {
                let callee = format!("binary{op}");
                if self.callee_arity(&callee).is_none() {
                    return Err(CodegenError::UnknownOperator(op));
                }
                Ok(self.emit_call(b, &callee, vec![lhs, rhs]))
            }
        }
    }

    fn gen_call(
        &mut self,
        b: &mut FunctionBuilder,
        callee: &str,
        args: &[Expr],
    ) -> Result<ValueId, CodegenError> {
        let arity = self
            .callee_arity(callee)
            .ok_or_else(|| CodegenError::UnknownFunction(callee.to_string()))?;
        if arity != args.len() {
            return Err(CodegenError::ArityMismatch {
                name: callee.to_string(),
                expected: arity,
                found: args.len(),
            });
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.gen_expr(b, arg)?);
        }
        Ok(self.emit_call(b, callee, values))
    }

    fn gen_if(
        &mut self,
        b: &mut FunctionBuilder,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: &Expr,
    ) -> Result<ValueId, CodegenError> {
        let cond_value = self.gen_expr(b, cond)?;
        let zero = b.push(InstrKind::Const(0.0));
        let flag = b.push(InstrKind::FCmpOne(cond_value, zero));

        let then_block = b.create_block("then");
        let else_block = b.create_block("else");
        let merge_block = b.create_block("ifcont");
        b.terminate(Terminator::CondBranch {
            cond: flag,
            then_block,
            else_block,
        });

        b.switch_to(then_block);
        let then_value = self.gen_expr(b, then_branch)?;
        b.terminate(Terminator::Branch(merge_block));
        // An arm that itself branched ends in some nested block; the
        // phi must name the block the value actually arrives from.
        let then_tail = b.current_block();

        b.switch_to(else_block);
        let else_value = self.gen_expr(b, else_branch)?;
        b.terminate(Terminator::Branch(merge_block));
        let else_tail = b.current_block();

        b.switch_to(merge_block);
        Ok(b.push(InstrKind::Phi(vec![
            (then_tail, then_value),
            (else_tail, else_value),
        ])))
    }

    fn gen_for(
        &mut self,
        b: &mut FunctionBuilder,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &Expr,
    ) -> Result<ValueId, CodegenError> {
        let slot = b.alloc_slot(var);
        let start_value = self.gen_expr(b, start)?;
        b.push(InstrKind::Store(slot, start_value));

        let header = b.create_block("loop");
        b.terminate(Terminator::Branch(header));
        b.switch_to(header);

        // The loop variable shadows any same-named binding for the
        // body, the step and the end condition, and is restored right
        // after, whether or not generation succeeded.
        let shadowed = self.vars.insert(var.to_string(), slot);
        let circled = self.gen_for_tail(b, header, slot, end, step, body);
        match shadowed {
            Some(previous) => {
                self.vars.insert(var.to_string(), previous);
            }
            None => {
                self.vars.remove(var);
            }
        }
        circled?;

        // A loop always evaluates to 0.0.
        Ok(b.push(InstrKind::Const(0.0)))
    }

    /// Everything that runs once per iteration: body, increment, end
    /// condition. The condition is evaluated after the increment, so a
    /// loop body runs at least once.
    fn gen_for_tail(
        &mut self,
        b: &mut FunctionBuilder,
        header: BlockId,
        slot: SlotId,
        end: &Expr,
        step: Option<&Expr>,
        body: &Expr,
    ) -> Result<(), CodegenError> {
        self.gen_expr(b, body)?;

        let step_value = match step {
            Some(expr) => self.gen_expr(b, expr)?,
            None => b.push(InstrKind::Const(1.0)),
        };
        let current = b.push(InstrKind::Load(slot));
        let next = b.push(InstrKind::FAdd(current, step_value));
        b.push(InstrKind::Store(slot, next));

        let end_value = self.gen_expr(b, end)?;
        let zero = b.push(InstrKind::Const(0.0));
        let keep_going = b.push(InstrKind::FCmpOne(end_value, zero));

        let after = b.create_block("afterloop");
        b.terminate(Terminator::CondBranch {
            cond: keep_going,
            then_block: header,
            else_block: after,
        });
        b.switch_to(after);
        Ok(())
    }

    fn gen_var(
        &mut self,
        b: &mut FunctionBuilder,
        bindings: &[(String, Option<Expr>)],
        body: &Expr,
    ) -> Result<ValueId, CodegenError> {
        // Initializers run left to right, each seeing the bindings
        // introduced before it. Missing initializers default to 0.0.
        let mut shadowed: Vec<(String, Option<SlotId>)> = Vec::with_capacity(bindings.len());
        for (name, init) in bindings {
            let init_value = match init {
                Some(expr) => match self.gen_expr(b, expr) {
                    Ok(value) => value,
                    Err(error) => {
                        self.restore_bindings(shadowed);
                        return Err(error);
                    }
                },
                None => b.push(InstrKind::Const(0.0)),
            };
            let slot = b.alloc_slot(name);
            b.push(InstrKind::Store(slot, init_value));
            shadowed.push((name.clone(), self.vars.insert(name.clone(), slot)));
        }

        let result = self.gen_expr(b, body);
        self.restore_bindings(shadowed);
        result
    }

    /// Unwind a scope in reverse order, so duplicate names within one
    /// `var` list land back on the binding that preceded the list.
    fn restore_bindings(&mut self, mut shadowed: Vec<(String, Option<SlotId>)>) {
        while let Some((name, previous)) = shadowed.pop() {
            match previous {
                Some(slot) => {
                    self.vars.insert(name, slot);
                }
                None => {
                    self.vars.remove(&name);
                }
            }
        }
    }

    /// Arity of a callable name: a function this unit already holds,
    /// or one known to the registry (which includes the function under
    /// construction, staged there by `gen_definition`).
    fn callee_arity(&self, name: &str) -> Option<usize> {
        if let Some(function) = self.module.functions.iter().find(|f| f.name == name) {
            return Some(function.params.len());
        }
        self.registry
            .lookup(name)
            .map(|signature| signature.proto.params.len())
    }

    /// Emit a call, materializing a declaration in this unit for any
    /// callee the unit neither defines nor already declares.
    fn emit_call(&mut self, b: &mut FunctionBuilder, name: &str, args: Vec<ValueId>) -> ValueId {
        if b.name() != name
            && !self.module.functions.iter().any(|f| f.name == name)
            && !self.module.declares.iter().any(|d| d.name == name)
        {
            if let Some(signature) = self.registry.lookup(name) {
                self.module.declares.push(FunctionDecl {
                    name: name.to_string(),
                    params: signature.proto.params.clone(),
                });
            }
        }
        b.push(InstrKind::Call(name.to_string(), args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Item;
    use crate::parser::Parser;

    struct Harness {
        registry: Registry,
        table: PrecedenceTable,
    }

    impl Harness {
        fn new() -> Self {
            Harness {
                registry: Registry::new(),
                table: PrecedenceTable::new(),
            }
        }

        /// Parse and lower one form, returning the unit it produced.
        fn lower(&mut self, source: &str) -> Result<Module, CodegenError> {
            let mut parser = Parser::new(source);
            let item = parser
                .next_item(&self.table)
                .expect("a form")
                .expect("a parsable form");
            let mut generator =
                CodeGenerator::new("test_unit", &mut self.registry, &mut self.table);
            match item {
                Item::Definition(function) => generator.gen_definition(&function)?,
                Item::Extern(proto) => generator.gen_extern(&proto)?,
                Item::Expression(expr) => generator.gen_anonymous("__anon_expr", &expr)?,
            }
            Ok(generator.finish())
        }

        fn lower_ok(&mut self, source: &str) -> Module {
            self.lower(source).expect("generation succeeds")
        }
    }

    fn only_function(module: &Module) -> &ir::Function {
        assert_eq!(module.functions.len(), 1);
        &module.functions[0]
    }

    fn block<'m>(function: &'m ir::Function, label: &str) -> &'m ir::BasicBlock {
        function
            .blocks
            .iter()
            .find(|b| b.label == label)
            .unwrap_or_else(|| panic!("no block labelled {label}"))
    }

    #[test]
    fn number_literal_lowers_to_const_and_return() {
        let mut harness = Harness::new();
        let module = harness.lower_ok("42");
        let function = only_function(&module);
        assert_eq!(function.blocks.len(), 1);
        let entry = &function.blocks[0];
        assert_eq!(entry.instrs.len(), 1);
        assert_eq!(entry.instrs[0].kind, InstrKind::Const(42.0));
        assert_eq!(entry.terminator, Terminator::Return(entry.instrs[0].dest));
    }

    #[test]
    fn parameters_are_spilled_to_slots() {
        let mut harness = Harness::new();
        let module = harness.lower_ok("def id(x) x");
        let function = only_function(&module);
        assert_eq!(function.slots.len(), 1);
        assert_eq!(function.slots[0].name, "x");
        let kinds: Vec<_> = function.blocks[0]
            .instrs
            .iter()
            .map(|i| i.kind.clone())
            .collect();
        assert_eq!(
            kinds,
            vec![
                InstrKind::Arg(0),
                InstrKind::Store(SlotId(0), ValueId(0)),
                InstrKind::Load(SlotId(0)),
            ]
        );
    }

    #[test]
    fn unknown_variable_is_rejected() {
        let mut harness = Harness::new();
        let error = harness.lower("def f(x) y").unwrap_err();
        assert_eq!(error, CodegenError::UnknownVariable("y".into()));
    }

    #[test]
    fn assignment_requires_a_variable_target() {
        let mut harness = Harness::new();
        let error = harness.lower("def f(x) 1 = 2").unwrap_err();
        assert_eq!(error, CodegenError::InvalidAssignTarget);
    }

    #[test]
    fn assignment_value_is_the_stored_value() {
        let mut harness = Harness::new();
        let module = harness.lower_ok("def f(x) x = 5");
        let function = only_function(&module);
        let entry = &function.blocks[0];
        let const_five = entry
            .instrs
            .iter()
            .find(|i| i.kind == InstrKind::Const(5.0))
            .expect("the stored constant");
        assert!(entry
            .instrs
            .iter()
            .any(|i| i.kind == InstrKind::Store(SlotId(0), const_five.dest)));
        assert_eq!(entry.terminator, Terminator::Return(const_five.dest));
    }

    #[test]
    fn if_produces_three_blocks_and_a_phi() {
        let mut harness = Harness::new();
        let module = harness.lower_ok("def f(x) if x then 1 else 2");
        let function = only_function(&module);
        let labels: Vec<_> = function.blocks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["entry", "then", "else", "ifcont"]);

        let merge = block(function, "ifcont");
        let InstrKind::Phi(incoming) = &merge.instrs[0].kind else {
            panic!("merge block must start with a phi");
        };
        assert_eq!(incoming.len(), 2);
        assert_eq!(merge.terminator, Terminator::Return(merge.instrs[0].dest));
    }

    #[test]
    fn phi_names_the_block_each_arm_ended_in() {
        let mut harness = Harness::new();
        let module = harness.lower_ok("def f(x) if x then (if x then 1 else 2) else 3");
        let function = only_function(&module);

        let outer_merge = block(function, "ifcont");
        let InstrKind::Phi(incoming) = &outer_merge.instrs[0].kind else {
            panic!("merge block must start with a phi");
        };
        // The then arm is itself an if; its value arrives from the
        // inner merge block, not from the outer "then".
        let (then_tail, _) = incoming[0];
        assert_eq!(function.blocks[then_tail.0 as usize].label, "ifcont1");
        let (else_tail, _) = incoming[1];
        assert_eq!(function.blocks[else_tail.0 as usize].label, "else");
    }

    #[test]
    fn self_recursion_resolves_against_the_staged_prototype() {
        let mut harness = Harness::new();
        let module = harness.lower_ok("def spin(n) spin(n)");
        let function = only_function(&module);
        assert!(function.blocks[0]
            .instrs
            .iter()
            .any(|i| matches!(&i.kind, InstrKind::Call(name, _) if name == "spin")));
        // Self calls need no declaration in the same unit.
        assert!(module.declares.is_empty());
    }

    #[test]
    fn calls_check_arity_against_the_registry() {
        let mut harness = Harness::new();
        harness.lower_ok("extern sin(x)");
        let error = harness.lower("def f(x) sin(x, x)").unwrap_err();
        assert_eq!(
            error,
            CodegenError::ArityMismatch {
                name: "sin".into(),
                expected: 1,
                found: 2,
            }
        );
    }

    #[test]
    fn unknown_function_is_rejected() {
        let mut harness = Harness::new();
        let error = harness.lower("def f(x) missing(x)").unwrap_err();
        assert_eq!(error, CodegenError::UnknownFunction("missing".into()));
    }

    #[test]
    fn extern_arity_conflict_is_rejected() {
        let mut harness = Harness::new();
        harness.lower_ok("extern sin(x)");
        let error = harness.lower("extern sin(x y)").unwrap_err();
        assert_eq!(
            error,
            CodegenError::SignatureMismatch {
                name: "sin".into(),
                expected: 1,
                found: 2,
            }
        );
    }

    #[test]
    fn duplicate_definition_is_rejected_and_the_first_survives() {
        let mut harness = Harness::new();
        harness.lower_ok("def f(x) x");
        let error = harness.lower("def f(x) x + 1").unwrap_err();
        assert_eq!(error, CodegenError::DuplicateDefinition("f".into()));
        // The original is still callable.
        harness.lower_ok("def g(x) f(x)");
    }

    #[test]
    fn extern_then_matching_definition_is_allowed() {
        let mut harness = Harness::new();
        harness.lower_ok("extern area(w h)");
        harness.lower_ok("def area(w h) w * h");
        assert!(harness.registry.lookup("area").expect("registered").has_body);
    }

    #[test]
    fn failed_operator_definition_rolls_everything_back() {
        let mut harness = Harness::new();
        let error = harness.lower("def binary@ 42 (a b) missingvar").unwrap_err();
        assert_eq!(error, CodegenError::UnknownVariable("missingvar".into()));
        assert_eq!(harness.table.get('@'), None);
        assert!(harness.registry.lookup("binary@").is_none());

        // A corrected definition goes through cleanly afterwards.
        harness.lower_ok("def binary@ 42 (a b) a * b");
        assert_eq!(harness.table.get('@'), Some(42));
        assert!(harness.registry.lookup("binary@").expect("registered").has_body);
    }

    #[test]
    fn failed_builtin_override_restores_builtin_strength() {
        let mut harness = Harness::new();
        let error = harness.lower("def binary* 99 (a b) junk").unwrap_err();
        assert_eq!(error, CodegenError::UnknownVariable("junk".into()));
        assert_eq!(harness.table.get('*'), Some(40));
        assert!(harness.registry.lookup("binary*").is_none());
    }

    #[test]
    fn unary_minus_lowers_to_fneg() {
        let mut harness = Harness::new();
        let module = harness.lower_ok("def f(x) -x");
        let function = only_function(&module);
        assert!(function.blocks[0]
            .instrs
            .iter()
            .any(|i| matches!(i.kind, InstrKind::FNeg(_))));
    }

    #[test]
    fn custom_unary_operator_calls_its_function() {
        let mut harness = Harness::new();
        harness.lower_ok("def unary!(v) if v then 0 else 1");
        let module = harness.lower_ok("def f(x) !x");
        let function = only_function(&module);
        assert!(function.blocks[0]
            .instrs
            .iter()
            .any(|i| matches!(&i.kind, InstrKind::Call(name, args) if name == "unary!" && args.len() == 1)));
        assert_eq!(module.declares.len(), 1);
        assert_eq!(module.declares[0].name, "unary!");
    }

    #[test]
    fn unregistered_unary_operator_is_rejected() {
        let mut harness = Harness::new();
        let error = harness.lower("def f(x) $x").unwrap_err();
        assert_eq!(error, CodegenError::UnknownOperator('$'));
    }

    #[test]
    fn unregistered_binary_operator_is_rejected() {
        // The parser never folds an uninstalled binary operator, so
        // reach the check with a hand-built tree.
        let mut registry = Registry::new();
        let mut table = PrecedenceTable::new();
        let mut generator = CodeGenerator::new("test_unit", &mut registry, &mut table);
        let expr = Expr::Binary {
            op: '@',
            lhs: Box::new(Expr::Number(1.0)),
            rhs: Box::new(Expr::Number(2.0)),
        };
        let error = generator.gen_anonymous("__anon_expr", &expr).unwrap_err();
        assert_eq!(error, CodegenError::UnknownOperator('@'));
    }

    #[test]
    fn loop_checks_the_condition_after_the_increment() {
        let mut harness = Harness::new();
        let module = harness.lower_ok("def f(n) for i = 1, i < n in i");
        let function = only_function(&module);
        let labels: Vec<_> = function.blocks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["entry", "loop", "afterloop"]);

        let header = block(function, "loop");
        let increment = header
            .instrs
            .iter()
            .position(|i| matches!(i.kind, InstrKind::FAdd(_, _)))
            .expect("an increment");
        let condition = header
            .instrs
            .iter()
            .position(|i| matches!(i.kind, InstrKind::FCmpOne(_, _)))
            .expect("an end condition");
        assert!(increment < condition);

        let Terminator::CondBranch {
            then_block,
            else_block,
            ..
        } = header.terminator
        else {
            panic!("loop block must end in a conditional branch");
        };
        assert_eq!(function.blocks[then_block.0 as usize].label, "loop");
        assert_eq!(function.blocks[else_block.0 as usize].label, "afterloop");

        // The loop expression itself is 0.0.
        let after = block(function, "afterloop");
        assert_eq!(after.instrs[0].kind, InstrKind::Const(0.0));
        assert_eq!(after.terminator, Terminator::Return(after.instrs[0].dest));
    }

    #[test]
    fn loop_variable_shadowing_is_restored() {
        let mut harness = Harness::new();
        let module = harness.lower_ok("def f(i) (for i = 1, i < 3 in i) + i");
        let function = only_function(&module);
        // Slot 0 is the parameter, slot 1 the loop variable. The load
        // after the loop must see the parameter again.
        let after = block(function, "afterloop");
        assert!(after
            .instrs
            .iter()
            .any(|i| i.kind == InstrKind::Load(SlotId(0))));
    }

    #[test]
    fn var_initializers_see_earlier_bindings() {
        let mut harness = Harness::new();
        let module = harness.lower_ok("def f(x) var a = 3, b = a * 2 in b");
        let function = only_function(&module);
        let names: Vec<_> = function.slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["x", "a", "b"]);
        // b's initializer loads a.
        assert!(function.blocks[0]
            .instrs
            .iter()
            .any(|i| i.kind == InstrKind::Load(SlotId(1))));
    }

    #[test]
    fn var_scope_restores_previous_bindings() {
        let mut harness = Harness::new();
        let module = harness.lower_ok("def f(x) (var x = 2 in x) + x");
        let function = only_function(&module);
        let entry = &function.blocks[0];
        // The final load before the add must be the parameter slot.
        let last_load = entry
            .instrs
            .iter()
            .rev()
            .find_map(|i| match i.kind {
                InstrKind::Load(slot) => Some(slot),
                _ => None,
            })
            .expect("a load");
        assert_eq!(last_load, SlotId(0));
    }

    #[test]
    fn var_body_failure_still_restores_bindings() {
        let mut harness = Harness::new();
        harness.lower_ok("def ok(x) x");
        let error = harness.lower("def f(x) var a = 1 in nosuch").unwrap_err();
        assert_eq!(error, CodegenError::UnknownVariable("nosuch".into()));
        // The failed unit left nothing behind.
        assert!(harness.registry.lookup("f").is_none());
    }

    #[test]
    fn cross_unit_calls_declare_the_callee() {
        let mut harness = Harness::new();
        harness.lower_ok("def f(x) x");
        let module = harness.lower_ok("def g(y) f(y)");
        assert_eq!(module.declares.len(), 1);
        assert_eq!(module.declares[0].name, "f");
        assert_eq!(module.declares[0].params, vec!["x".to_string()]);
    }

    #[test]
    fn anonymous_units_skip_the_registry() {
        let mut harness = Harness::new();
        harness.lower_ok("1 + 2");
        assert!(harness.registry.lookup("__anon_expr").is_none());
    }
}
