use clap::{Parser, ValueEnum};
use log::error;

use synth_shortest_prog::{oracle, synthesize, Options, Specification};

/// Synthesize the shortest straight-line program computing a target
/// function, and print it to stdout.
#[derive(Debug, Parser)]
#[command(name = "synth-shortest-prog", version, about)]
struct Cli {
    /// Target function to superoptimize.
    #[arg(value_enum, default_value = "power-of-two-or-zero")]
    target: Target,

    /// Register width in bits.
    #[arg(long, default_value_t = 32)]
    bit_width: u32,

    /// Exclusive upper bound on immediate operands.
    #[arg(long, default_value_t = 0x100)]
    imm_bound: u64,

    /// Give up once programs of this length have been ruled out.
    #[arg(long)]
    max_len: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Target {
    /// 1 if the input is zero or a power of two, else 0.
    PowerOfTwoOrZero,
    /// The input, unchanged.
    Identity,
    /// Always 0.
    Zero,
    /// 1 if the input equals 5, else 0.
    EqualsFive,
    /// The low byte of the input.
    LowByte,
    /// Decrement, clamped at zero.
    SaturatingDecrement,
}

impl Target {
    fn spec(self) -> Box<dyn Specification> {
        match self {
            Target::PowerOfTwoOrZero => Box::new(oracle::PowerOfTwoOrZero),
            Target::Identity => Box::new(oracle::Identity),
            Target::Zero => Box::new(oracle::Constant(0)),
            Target::EqualsFive => Box::new(oracle::EqualsConst(5)),
            Target::LowByte => Box::new(oracle::Masked(0xff)),
            Target::SaturatingDecrement => Box::new(oracle::SaturatingDecrement),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let options = Options {
        bit_width: cli.bit_width,
        imm_bound: cli.imm_bound,
        max_len: cli.max_len,
    };

    match synthesize(cli.target.spec().as_ref(), &options) {
        Ok(program) => print!("{}", program),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
