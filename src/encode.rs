//! The symbolic program encoding.
//!
//! A program slot is four free solver variables (see
//! [`SymbolicInsn`](crate::SymbolicInsn)); this module turns k slots plus a
//! symbolic input into a single W-bit result expression. Operand and opcode
//! choice are nested conditionals over the slot variables rather than
//! disjunctive constraints: any integer the solver picks falls through to a
//! defined meaning, so no well-formedness assertions are needed and the
//! formula stays one expression tree per instruction.

use z3::ast::{Ast, Bool, Int, BV};

use crate::insn::{Opcode, Operand, Program, SymbolicInsn};

/// Declare `len` instruction slots along with their side constraints.
///
/// The only side constraint is the immediate bound, one `imm <u bound` per
/// slot; it must be asserted alongside any use of [`eval_symbolic`]'s
/// result. A bound of at least 2^W excludes nothing and emits no
/// constraint.
pub fn symbolic_program<'a>(
    context: &'a z3::Context,
    len: usize,
    bit_width: u32,
    imm_bound: u64,
) -> (Vec<SymbolicInsn<'a>>, Vec<Bool<'a>>) {
    let mut insns = Vec::with_capacity(len);
    let mut constraints = Vec::with_capacity(len);
    for i in 0..len {
        let insn = SymbolicInsn::new(context, &format!("insn{}", i), bit_width);
        if bound_prunes(imm_bound, bit_width) {
            constraints.push(insn.imm.bvult(&BV::from_u64(context, imm_bound, bit_width)));
        }
        insns.push(insn);
    }
    (insns, constraints)
}

fn bound_prunes(imm_bound: u64, bit_width: u32) -> bool {
    bit_width >= 64 || imm_bound < (1 << bit_width)
}

/// Fold `(condition, value)` cases over a default. The conditions are
/// mutually exclusive equalities, so nesting order does not matter.
fn select<'a>(
    default: BV<'a>,
    cases: impl Iterator<Item = (Bool<'a>, BV<'a>)>,
) -> BV<'a> {
    cases.fold(default, |otherwise, (cond, value)| cond.ite(&value, &otherwise))
}

/// The value of the final register after running the slots on `input`.
///
/// Registers grow as `regs[0] = input`, `regs[i + 1] = ` result of slot `i`.
/// The first operand of slot `i` selects among `regs[0..i]`, falling through
/// to `regs[i]`, the most recently defined value. The second operand selects
/// among `regs[0..=i]`, falling through to the slot's immediate; an
/// out-of-range `r2` is how the solver chooses immediate mode.
pub fn eval_symbolic<'a>(
    context: &'a z3::Context,
    input: &BV<'a>,
    insns: &[SymbolicInsn<'a>],
    bit_width: u32,
) -> BV<'a> {
    let mut regs = vec![input.clone()];
    for (i, insn) in insns.iter().enumerate() {
        let in1 = select(
            regs[i].clone(),
            (0..i).map(|j| (insn.r1._eq(&Int::from_u64(context, j as u64)), regs[j].clone())),
        );
        let in2 = select(
            insn.imm.clone(),
            (0..=i).map(|j| (insn.r2._eq(&Int::from_u64(context, j as u64)), regs[j].clone())),
        );
        regs.push(opcode_dispatch(context, insn, &in1, &in2, bit_width));
    }
    regs[insns.len()].clone()
}

/// Chain of conditionals keyed on the slot's opcode variable. `Sub` is the
/// default, so every integer outside the enumeration collapses onto it and
/// the solver can never pick an opcode with no semantics.
fn opcode_dispatch<'a>(
    context: &'a z3::Context,
    insn: &SymbolicInsn<'a>,
    in1: &BV<'a>,
    in2: &BV<'a>,
    bit_width: u32,
) -> BV<'a> {
    let mut result = Opcode::Sub.expression(context, in1, in2, bit_width);
    for op in Opcode::ALL {
        if op == Opcode::Sub {
            continue;
        }
        let chosen = insn.opcode._eq(&Int::from_u64(context, op.code()));
        result = chosen.ite(&op.expression(context, in1, in2, bit_width), &result);
    }
    result
}

/// Re-encode a concrete program over a symbolic input.
///
/// This is the verification side of the loop: a reconstructed candidate is
/// turned back into an expression so the solver can search for an input on
/// which it disagrees with the specification.
pub fn eval_program<'a>(
    context: &'a z3::Context,
    input: &BV<'a>,
    program: &Program,
    bit_width: u32,
) -> BV<'a> {
    let mut regs = vec![input.clone()];
    for insn in &program.instructions {
        let in1 = regs[insn.r1].clone();
        let in2 = match insn.r2 {
            Operand::Reg(r) => regs[r].clone(),
            Operand::Imm(imm) => BV::from_u64(context, imm, bit_width),
        };
        regs.push(insn.opcode.expression(context, &in1, &in2, bit_width));
    }
    regs[program.instructions.len()].clone()
}
