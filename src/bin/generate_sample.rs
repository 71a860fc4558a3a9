//! Writes a synthetic jackknife ensemble in the PolSpice `clfile` text layout,
//! for trying `rusty-xcorr jackknife` without running PolSpice.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "generate_sample")]
#[command(about = "Write synthetic jackknife spectra {prefix}{i}{suffix}")]
struct Args {
    /// Number of realizations
    #[arg(short, long, default_value_t = 20)]
    n_jack: usize,

    /// Highest multipole written
    #[arg(long, default_value_t = 1024)]
    lmax: usize,

    #[arg(long, default_value = "sample_jack_")]
    prefix: String,

    #[arg(long, default_value = ".cl")]
    suffix: String,

    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Smooth cross spectrum with a bump around ℓ ~ 300.
fn fiducial_cl(ell: f64) -> f64 {
    let continuum = 2e-10 * (100.0 / (ell + 20.0)).powf(1.2);
    let bump = 5e-11 * (-(ell - 300.0).powi(2) / (2.0 * 80.0f64.powi(2))).exp();
    continuum + bump
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    // jackknife scatter is a small fraction of cosmic variance
    let jack_scatter = 1.0 / args.n_jack.max(1) as f64;

    for i in 0..args.n_jack {
        let path = args
            .output_dir
            .join(format!("{}{i}{}", args.prefix, args.suffix));
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);

        writeln!(out, "# l  TT")?;
        for ell in 0..=args.lmax {
            let l = ell as f64;
            let cl = fiducial_cl(l);
            let sigma = cl * (2.0 / (2.0 * l + 1.0)).sqrt() * jack_scatter;
            writeln!(out, "{ell:>6} {:.8e}", rng.gauss(cl, sigma))?;
        }
        out.flush()?;
    }

    println!(
        "Wrote {} spectra ({} multipoles each) to {}",
        args.n_jack,
        args.lmax + 1,
        args.output_dir.display()
    );
    Ok(())
}
