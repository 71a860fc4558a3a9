use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::info;

use rusty_xcorr::config::{load_measure_config, load_model_config};
use rusty_xcorr::data::binning::bin_spectrum;
use rusty_xcorr::data::jackknife::read_jackknife;
use rusty_xcorr::data::loader::read_spectrum;
use rusty_xcorr::data::model::BinEdges;
use rusty_xcorr::data::writer::{write_binned_csv, write_jackknife_csv, write_matrix_csv, write_theory_csv};
use rusty_xcorr::halo::{Cosmology, LimberHaloModel};
use rusty_xcorr::polspice::{PolSpice, PolSpiceEnv, DEFAULT_THREADS};
use rusty_xcorr::sky::{read_map, write_jackknife_masks, HealpixMap, Ordering};

/// Executable used when neither the command line nor the config names one.
const DEFAULT_POLSPICE: &str = "spice";

#[derive(Parser)]
#[command(name = "rusty-xcorr")]
#[command(about = "Angular cross-correlations: PolSpice runs, jackknife covariances, halo-model predictions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run PolSpice on the maps named in a JSON config
    Measure {
        /// JSON run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// PolSpice executable (overrides the config)
        #[arg(long)]
        polspice: Option<PathBuf>,

        /// OpenMP thread limit for PolSpice
        #[arg(long)]
        threads: Option<usize>,

        /// Do not echo PolSpice output
        #[arg(short, long)]
        quiet: bool,

        /// Copy PolSpice output into this file
        #[arg(long, value_name = "FILE")]
        log: Option<PathBuf>,
    },

    /// Bin one spectrum file
    Bin {
        /// Two-column (ell, C_ell) text file
        #[arg(short, long)]
        input: PathBuf,

        /// Bin edges, comma separated
        #[arg(short, long, value_delimiter = ',', num_args = 2.., required = true)]
        edges: Vec<f64>,

        /// Write a CSV table instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bin a jackknife ensemble and estimate its covariance
    Jackknife {
        /// Number of realizations, files {prefix}0{suffix} .. {prefix}{n-1}{suffix}
        #[arg(short, long)]
        n_jack: usize,

        #[arg(long)]
        prefix: String,

        #[arg(long, default_value = "")]
        suffix: String,

        /// Bin edges, comma separated
        #[arg(short, long, value_delimiter = ',', num_args = 2.., required = true)]
        edges: Vec<f64>,

        /// Directory for jackknife_cl.csv and jackknife_cov.csv
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Halo-model C_ell for the tracer pair in a JSON config
    Model {
        #[arg(short, long)]
        config: PathBuf,

        /// Write a CSV table instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write one jackknife mask per low-resolution superpixel
    Masks {
        /// Resolution of the full-sky mask used when --mask is not given
        #[arg(long, required_unless_present = "mask")]
        nside: Option<u32>,

        /// Resolution of the jackknife regions
        #[arg(long)]
        nside_low: u32,

        /// Base mask (HEALPix FITS)
        #[arg(short, long)]
        mask: Option<PathBuf>,

        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Measure {
            config,
            polspice,
            threads,
            quiet,
            log,
        } => measure(&config, polspice, threads, quiet, log),
        Command::Bin { input, edges, output } => bin(&input, edges, output.as_deref()),
        Command::Jackknife {
            n_jack,
            prefix,
            suffix,
            edges,
            output_dir,
        } => jackknife(n_jack, &prefix, &suffix, edges, &output_dir),
        Command::Model { config, output } => model(&config, output.as_deref()),
        Command::Masks {
            nside,
            nside_low,
            mask,
            output_dir,
        } => masks(nside, nside_low, mask.as_deref(), &output_dir),
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn measure(
    config: &Path,
    polspice: Option<PathBuf>,
    threads: Option<usize>,
    quiet: bool,
    log: Option<PathBuf>,
) -> Result<()> {
    let cfg = load_measure_config(config)?;
    let executable = polspice
        .or(cfg.executable)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_POLSPICE));
    let threads = threads.or(cfg.threads).unwrap_or(DEFAULT_THREADS);

    let env = PolSpiceEnv::from_process_env()?;
    let mut runner = PolSpice::new(executable, env)
        .with_threads(threads)
        .with_echo(!quiet);
    if let Some(path) = log {
        runner = runner.with_log_file(path);
    }
    runner.run(&cfg.options)?;
    Ok(())
}

fn bin(input: &Path, edges: Vec<f64>, output: Option<&Path>) -> Result<()> {
    let edges = BinEdges::new(edges)?;
    let spectrum = read_spectrum(input)?;
    let binned = bin_spectrum(&spectrum, &edges)
        .with_context(|| format!("binning {}", input.display()))?;

    match output {
        Some(path) => {
            write_binned_csv(path, &binned)?;
            info!("wrote {}", path.display());
        }
        None => {
            println!("{:>12} {:>12} {:>14} {:>14}", "ell_center", "ell_mean", "cl", "err");
            for i in 0..binned.n_bins() {
                println!(
                    "{:>12.2} {:>12.2} {:>14.6e} {:>14.6e}",
                    binned.centers[i], binned.ell_mean[i], binned.cl[i], binned.err[i]
                );
            }
        }
    }
    Ok(())
}

fn jackknife(n_jack: usize, prefix: &str, suffix: &str, edges: Vec<f64>, output_dir: &Path) -> Result<()> {
    let edges = BinEdges::new(edges)?;
    let estimate = read_jackknife(n_jack, prefix, suffix, &edges)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let cl_path = output_dir.join("jackknife_cl.csv");
    let cov_path = output_dir.join("jackknife_cov.csv");
    write_jackknife_csv(&cl_path, &estimate)?;
    write_matrix_csv(&cov_path, &estimate.covariance)?;
    info!("wrote {} and {}", cl_path.display(), cov_path.display());
    Ok(())
}

fn model(config: &Path, output: Option<&Path>) -> Result<()> {
    let cfg = load_model_config(config)?;
    let ells = cfg.ell.values()?;
    let cosmo = Cosmology::new(cfg.cosmology)?;
    let hm = LimberHaloModel::new(cosmo)?;
    let [first, second] = &cfg.tracers;
    let cls = hm.angular_power(&ells, first, second)?;

    match output {
        Some(path) => {
            write_theory_csv(path, &ells, &cls)?;
            info!("wrote {}", path.display());
        }
        None => {
            println!("{:>10} {:>16}", "ell", "cl");
            for (ell, cl) in ells.iter().zip(&cls) {
                println!("{ell:>10.1} {cl:>16.8e}");
            }
        }
    }
    Ok(())
}

fn masks(nside: Option<u32>, nside_low: u32, mask: Option<&Path>, output_dir: &Path) -> Result<()> {
    let base = match (mask, nside) {
        (Some(path), requested) => {
            let base = read_map(path)?;
            if let Some(n) = requested {
                if n != base.nside() {
                    bail!("{} has nside {}, not {n}", path.display(), base.nside());
                }
            }
            base
        }
        (None, Some(n)) => HealpixMap::full_sky(n, Ordering::Ring)?,
        (None, None) => bail!("either --mask or --nside is required"),
    };

    let written = write_jackknife_masks(&base, nside_low, output_dir)?;
    info!("wrote {} masks to {}", written.len(), output_dir.display());
    Ok(())
}
