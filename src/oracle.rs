//! Built-in specification oracles.
//!
//! Each oracle defines the target function once, symbolically; the concrete
//! mode comes from the blanket constant-folding path on
//! [`Specification`](crate::Specification).

use z3::ast::{Ast, Bool, BV};

use crate::insn::width_mask;
use crate::Specification;

fn bool_to_bv<'a>(context: &'a z3::Context, condition: &Bool<'a>, bit_width: u32) -> BV<'a> {
    condition.ite(
        &BV::from_u64(context, 1, bit_width),
        &BV::from_u64(context, 0, bit_width),
    )
}

/// `f(x) = 1` iff `x` is zero or a power of two. The default target: the
/// shortest known program is `sub r0, 0x1, r1; and r0, r1, r2;
/// cmpeq r2, 0x0, r3`.
#[derive(Debug)]
pub struct PowerOfTwoOrZero;

impl Specification for PowerOfTwoOrZero {
    fn make_expression<'a>(
        &self,
        context: &'a z3::Context,
        input: &BV<'a>,
        bit_width: u32,
    ) -> BV<'a> {
        // A disjunction over the W + 1 matching constants.
        let matches: Vec<Bool> = std::iter::once(0)
            .chain((0..bit_width).map(|i| 1u64 << i))
            .map(|c| input._eq(&BV::from_u64(context, c, bit_width)))
            .collect();
        let matches: Vec<&Bool> = matches.iter().collect();
        bool_to_bv(context, &Bool::or(context, &matches), bit_width)
    }
}

/// `f(x) = x`.
#[derive(Debug)]
pub struct Identity;

impl Specification for Identity {
    fn make_expression<'a>(
        &self,
        _context: &'a z3::Context,
        input: &BV<'a>,
        _bit_width: u32,
    ) -> BV<'a> {
        input.clone()
    }
}

/// `f(x) = c`.
#[derive(Debug)]
pub struct Constant(pub u64);

impl Specification for Constant {
    fn make_expression<'a>(
        &self,
        context: &'a z3::Context,
        _input: &BV<'a>,
        bit_width: u32,
    ) -> BV<'a> {
        BV::from_u64(context, self.0 & width_mask(bit_width), bit_width)
    }
}

/// `f(x) = 1` iff `x == c`.
#[derive(Debug)]
pub struct EqualsConst(pub u64);

impl Specification for EqualsConst {
    fn make_expression<'a>(
        &self,
        context: &'a z3::Context,
        input: &BV<'a>,
        bit_width: u32,
    ) -> BV<'a> {
        let c = BV::from_u64(context, self.0 & width_mask(bit_width), bit_width);
        bool_to_bv(context, &input._eq(&c), bit_width)
    }
}

/// `f(x) = x & m`.
#[derive(Debug)]
pub struct Masked(pub u64);

impl Specification for Masked {
    fn make_expression<'a>(
        &self,
        context: &'a z3::Context,
        input: &BV<'a>,
        bit_width: u32,
    ) -> BV<'a> {
        input.bvand(&BV::from_u64(context, self.0 & width_mask(bit_width), bit_width))
    }
}

/// `f(x) = x - (x != 0)`: decrement, clamped at zero.
#[derive(Debug)]
pub struct SaturatingDecrement;

impl Specification for SaturatingDecrement {
    fn make_expression<'a>(
        &self,
        context: &'a z3::Context,
        input: &BV<'a>,
        bit_width: u32,
    ) -> BV<'a> {
        let zero = BV::from_u64(context, 0, bit_width);
        let one = BV::from_u64(context, 1, bit_width);
        input._eq(&zero).ite(&zero, &input.bvsub(&one))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn context() -> z3::Context {
        z3::Context::new(&z3::Config::new())
    }

    // The concrete mode goes through symbolic evaluation plus solver
    // constant folding, so agreement with a native implementation checks
    // both modes at once.
    fn assert_consistent(
        spec: &impl Specification,
        reference: impl Fn(u64) -> u64,
        bit_width: u32,
    ) {
        let context = context();
        let mask = width_mask(bit_width);
        let mut rng = rand::rngs::SmallRng::seed_from_u64(42);
        let mut inputs = vec![0, 1, 2, 3, 5, mask, mask - 1, 1 << (bit_width - 1)];
        inputs.extend((0..32).map(|_| rng.gen::<u64>() & mask));
        for input in inputs {
            assert_eq!(
                spec.eval(&context, input, bit_width).unwrap(),
                reference(input) & mask,
                "input {:#x}",
                input
            );
        }
    }

    #[test]
    fn power_of_two_or_zero_consistency() {
        assert_consistent(
            &PowerOfTwoOrZero,
            |x| (x == 0 || x.count_ones() == 1) as u64,
            32,
        );
    }

    #[test]
    fn power_of_two_or_zero_at_full_width() {
        assert_consistent(
            &PowerOfTwoOrZero,
            |x| (x == 0 || x.count_ones() == 1) as u64,
            64,
        );
    }

    #[test]
    fn identity_consistency() {
        assert_consistent(&Identity, |x| x, 32);
    }

    #[test]
    fn constant_consistency() {
        assert_consistent(&Constant(0), |_| 0, 32);
        assert_consistent(&Constant(0xdead_beef), |_| 0xdead_beef, 32);
    }

    #[test]
    fn equals_const_consistency() {
        assert_consistent(&EqualsConst(5), |x| (x == 5) as u64, 32);
    }

    #[test]
    fn masked_consistency() {
        assert_consistent(&Masked(0xff), |x| x & 0xff, 32);
    }

    #[test]
    fn saturating_decrement_consistency() {
        assert_consistent(&SaturatingDecrement, |x| x.saturating_sub(1), 8);
        assert_consistent(&SaturatingDecrement, |x| x.saturating_sub(1), 32);
    }
}
