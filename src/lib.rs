#![deny(missing_debug_implementations)]

//! A superoptimizer for straight-line bit-vector programs.
//!
//! Given a target function over W-bit words, find the shortest register
//! program over `{sub, and, cmpeq}` whose behavior is provably equivalent on
//! all inputs. The search is counterexample-guided: a synthesis query asks
//! z3 for a program that fits the test cases seen so far, a verification
//! query asks for an input the candidate gets wrong, and the loop alternates
//! until verification comes back unsat.

pub mod encode;
mod insn;
pub mod oracle;
mod reconstruct;

pub use insn::{Insn, Opcode, Operand, Program, SymbolicInsn};
pub use reconstruct::reconstruct;

use log::{debug, info};
use z3::ast::{Ast, BV};
use z3::SatResult;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The solver returned neither sat nor unsat. Always fatal.
    #[error("solver returned unknown")]
    SolverUnknown,
    /// A satisfiable query came back without a model.
    #[error("solver produced no model for a satisfiable query")]
    MissingModel,
    /// The specification's expression did not fold to a numeral on a
    /// literal input.
    #[error("specification did not reduce to a constant on input {0:#x}")]
    NonConstantSpec(u64),
    /// The opt-in length cap was exhausted.
    #[error("no program of at most {0} instructions found")]
    LengthLimit(usize),
}

/// A synthesis target.
///
/// Usable in two modes: symbolically, over a free bit-vector, and concretely
/// on a literal input. The concrete mode has a blanket implementation that
/// constant-folds the symbolic form through the solver, so a target is
/// defined exactly once.
pub trait Specification {
    /// A W-bit expression for `f(input)`.
    fn make_expression<'a>(
        &self,
        context: &'a z3::Context,
        input: &BV<'a>,
        bit_width: u32,
    ) -> BV<'a>;

    /// `f` on a literal input.
    fn eval(&self, context: &z3::Context, input: u64, bit_width: u32) -> Result<u64, Error> {
        let x = BV::from_u64(context, input, bit_width);
        self.make_expression(context, &x, bit_width)
            .simplify()
            .as_u64()
            .ok_or(Error::NonConstantSpec(input))
    }
}

/// Search parameters. `Default` reproduces the reference configuration:
/// 32-bit registers, immediates below 0x100, unbounded program length.
#[derive(Clone, Debug)]
pub struct Options {
    /// Register width W in bits.
    pub bit_width: u32,
    /// Exclusive upper bound on immediate operands. Pure search-space
    /// pruning, not part of the instruction set's contract; ignored when it
    /// excludes nothing.
    pub imm_bound: u64,
    /// Stop with [`Error::LengthLimit`] once programs of this length have
    /// been ruled out, instead of searching forever.
    pub max_len: Option<usize>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            bit_width: 32,
            imm_bound: 0x100,
            max_len: None,
        }
    }
}

/// Find the shortest program equivalent to `spec` on all W-bit inputs.
///
/// Length is minimal in the sense of this search: a program of length k is
/// only emitted after synthesis at every shorter length came back unsat
/// against some test set. If the target is not expressible under the opcode
/// set and immediate bound, the search does not terminate unless
/// [`Options::max_len`] is set.
pub fn synthesize<S: Specification + ?Sized>(spec: &S, options: &Options) -> Result<Program, Error> {
    Synthesizer::new(spec, options).run()
}

enum Verification {
    WorksForAllInputs,
    FailsOnInput(u64),
}

struct Synthesizer<'s, S: ?Sized> {
    spec: &'s S,
    options: &'s Options,
    // Grows by one counterexample per failed verification; never shrinks.
    test_cases: Vec<u64>,
}

impl<'s, S: Specification + ?Sized> Synthesizer<'s, S> {
    fn new(spec: &'s S, options: &'s Options) -> Self {
        Synthesizer {
            spec,
            options,
            test_cases: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Program, Error> {
        for len in 1.. {
            if let Some(max) = self.options.max_len {
                if len > max {
                    return Err(Error::LengthLimit(max));
                }
            }
            info!("=== trying with {} instructions ===", len);
            loop {
                // Each round gets a fresh context; only plain data (the
                // candidate, counterexample inputs) outlives it.
                let mut config = z3::Config::new();
                config.set_model_generation(true);
                let context = z3::Context::new(&config);

                info!(
                    "finding a {}-instruction program correct on all {} test cases",
                    len,
                    self.test_cases.len()
                );
                let candidate = match self.finite_synthesis(&context, len)? {
                    Some(candidate) => candidate,
                    None => {
                        info!("no {}-instruction program fits the test cases", len);
                        break;
                    }
                };
                debug!("candidate:\n{}", candidate);

                match self.verification(&context, &candidate)? {
                    Verification::WorksForAllInputs => return Ok(candidate),
                    Verification::FailsOnInput(input) => self.test_cases.push(input),
                }
            }
        }
        unreachable!("the length loop only exits by returning")
    }

    /// Ask for any program of length `len` that agrees with the
    /// specification on every accumulated test case. `Ok(None)` means no
    /// such program exists and the caller should try a longer one.
    fn finite_synthesis(
        &self,
        context: &z3::Context,
        len: usize,
    ) -> Result<Option<Program>, Error> {
        let bit_width = self.options.bit_width;
        let (insns, constraints) =
            encode::symbolic_program(context, len, bit_width, self.options.imm_bound);

        let solver = z3::Solver::new(context);
        for constraint in &constraints {
            solver.assert(constraint);
        }
        for &test in &self.test_cases {
            let want = self.spec.eval(context, test, bit_width)?;
            let input = BV::from_u64(context, test, bit_width);
            let output = encode::eval_symbolic(context, &input, &insns, bit_width);
            solver.assert(&output._eq(&BV::from_u64(context, want, bit_width)));
        }

        match solver.check() {
            SatResult::Unknown => Err(Error::SolverUnknown),
            SatResult::Unsat => Ok(None),
            SatResult::Sat => {
                let model = solver.get_model().ok_or(Error::MissingModel)?;
                Ok(Some(reconstruct::reconstruct(&insns, &model)))
            }
        }
    }

    /// Ask for an input on which the candidate disagrees with the
    /// specification. Unsat means there is none and the candidate is
    /// equivalent to the target on all W-bit inputs.
    fn verification(
        &self,
        context: &z3::Context,
        candidate: &Program,
    ) -> Result<Verification, Error> {
        let bit_width = self.options.bit_width;
        let input = BV::new_const(context, "x", bit_width);
        let output = encode::eval_program(context, &input, candidate, bit_width);
        let spec = self.spec.make_expression(context, &input, bit_width);

        let solver = z3::Solver::new(context);
        solver.assert(&output._eq(&spec).not());

        match solver.check() {
            SatResult::Unknown => Err(Error::SolverUnknown),
            SatResult::Unsat => Ok(Verification::WorksForAllInputs),
            SatResult::Sat => {
                let model = solver.get_model().ok_or(Error::MissingModel)?;
                let counterexample = model
                    .eval(&input, true)
                    .and_then(|v| v.as_u64())
                    .ok_or(Error::MissingModel)?;
                let got = candidate.eval(counterexample, bit_width);
                let want = self.spec.eval(context, counterexample, bit_width)?;
                info!(
                    "found counterexample: {} evals to {} but should be {}",
                    counterexample, got, want
                );
                Ok(Verification::FailsOnInput(counterexample))
            }
        }
    }
}
