//! Extraction of a concrete program from a satisfying assignment.

use z3::ast::{Int, BV};
use z3::Model;

use crate::insn::{Insn, Opcode, Operand, Program, SymbolicInsn};

/// Materialize the program a model describes.
///
/// Total over models: the solver is free to leave any slot variable
/// unassigned, and every unassigned or out-of-range value maps onto the
/// encoder's fallthrough meaning (opcode to `Sub`, `r1` to the most recently
/// defined register, `r2` to the immediate). The result is therefore always
/// a well-formed SSA program.
pub fn reconstruct(insns: &[SymbolicInsn<'_>], model: &Model<'_>) -> Program {
    let instructions = insns
        .iter()
        .enumerate()
        .map(|(i, insn)| {
            let opcode = Opcode::from_code(int_or_default(model, &insn.opcode, 0));
            let r1 = match int_or_default(model, &insn.r1, 0) {
                r if (0..=i as i64).contains(&r) => r as usize,
                _ => i,
            };
            let r2 = match int_or_default(model, &insn.r2, 0) {
                r if (0..=i as i64).contains(&r) => Operand::Reg(r as usize),
                _ => Operand::Imm(bv_or_default(model, &insn.imm, 0)),
            };
            Insn { opcode, r1, r2 }
        })
        .collect();
    Program { instructions }
}

// With model completion off, a don't-care variable evaluates to itself, a
// non-numeral, and takes the default.
fn int_or_default(model: &Model<'_>, value: &Int<'_>, default: i64) -> i64 {
    model
        .eval(value, false)
        .and_then(|v| v.as_i64())
        .unwrap_or(default)
}

fn bv_or_default(model: &Model<'_>, value: &BV<'_>, default: u64) -> u64 {
    model
        .eval(value, false)
        .and_then(|v| v.as_u64())
        .unwrap_or(default)
}
