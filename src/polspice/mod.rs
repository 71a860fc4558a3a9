//! Wrapper around the PolSpice angular power spectrum estimator.
//!
//! The estimator runs as a child process with a minimal environment:
//! `OMP_THREAD_LIMIT` plus the two variables its shared libraries need
//! (`HEALPIX`, `LD_LIBRARY_PATH`). Everything the child prints on stdout and
//! stderr is forwarded line by line to the console and/or a log file while the
//! caller blocks. Results are written by PolSpice itself to the files named in
//! [`PolSpiceOptions`].

mod options;

pub use options::PolSpiceOptions;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use log::{error, info, warn};
use thiserror::Error;

/// Default OpenMP thread limit handed to the child.
pub const DEFAULT_THREADS: usize = 20;

#[derive(Debug, Error)]
pub enum PolSpiceError {
    #[error("environment variable {var} is not set")]
    MissingEnv { var: &'static str },

    #[error("failed to launch {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("PolSpice failed with {status}")]
    Failed { status: ExitStatus },
}

impl PolSpiceError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        PolSpiceError::Io {
            context: context.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// PolSpiceEnv – the inherited part of the child environment
// ---------------------------------------------------------------------------

/// Environment PolSpice needs from the parent, validated up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolSpiceEnv {
    healpix: String,
    ld_library_path: String,
}

impl PolSpiceEnv {
    pub const HEALPIX: &'static str = "HEALPIX";
    pub const LD_LIBRARY_PATH: &'static str = "LD_LIBRARY_PATH";

    pub fn new(healpix: impl Into<String>, ld_library_path: impl Into<String>) -> Self {
        Self {
            healpix: healpix.into(),
            ld_library_path: ld_library_path.into(),
        }
    }

    /// Pick both variables up from this process's environment.
    pub fn from_process_env() -> Result<Self, PolSpiceError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve both variables through `lookup`; a `None` for either is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PolSpiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let healpix = lookup(Self::HEALPIX).ok_or(PolSpiceError::MissingEnv {
            var: Self::HEALPIX,
        })?;
        let ld_library_path = lookup(Self::LD_LIBRARY_PATH).ok_or(PolSpiceError::MissingEnv {
            var: Self::LD_LIBRARY_PATH,
        })?;
        Ok(Self::new(healpix, ld_library_path))
    }
}

// ---------------------------------------------------------------------------
// PolSpice – the runner
// ---------------------------------------------------------------------------

/// A configured PolSpice executable.
#[derive(Debug, Clone)]
pub struct PolSpice {
    executable: PathBuf,
    env: PolSpiceEnv,
    threads: usize,
    echo: bool,
    log_file: Option<PathBuf>,
}

impl PolSpice {
    pub fn new(executable: impl Into<PathBuf>, env: PolSpiceEnv) -> Self {
        Self {
            executable: executable.into(),
            env,
            threads: DEFAULT_THREADS,
            echo: true,
            log_file: None,
        }
    }

    /// OpenMP thread limit for the child.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Echo the child's output to stdout.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Copy the child's output into `path` (truncated first, flushed per line).
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// The exact child command: cleared environment, piped output.
    pub fn command(&self, options: &PolSpiceOptions) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(options.to_args())
            .env_clear()
            .env("OMP_THREAD_LIMIT", self.threads.to_string())
            .env(PolSpiceEnv::HEALPIX, &self.env.healpix)
            .env(PolSpiceEnv::LD_LIBRARY_PATH, &self.env.ld_library_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run PolSpice to completion.
    pub fn run(&self, options: &PolSpiceOptions) -> Result<(), PolSpiceError> {
        info!(
            "{} {}",
            self.executable.display(),
            options.to_args().join(" ")
        );

        let mut log_file = match &self.log_file {
            Some(path) => Some(
                File::create(path)
                    .map_err(|e| PolSpiceError::io(format!("creating {}", path.display()), e))?,
            ),
            None => None,
        };

        let mut child = self
            .command(options)
            .spawn()
            .map_err(|source| PolSpiceError::Spawn {
                path: self.executable.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel::<String>();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        // Drain past the first output failure; the child is always reaped.
        let stdout = io::stdout();
        let mut output_error: Option<PolSpiceError> = None;
        for line in rx {
            if output_error.is_none() {
                output_error = self.forward_line(&stdout, log_file.as_mut(), &line).err();
            }
        }

        for reader in readers {
            if reader.join().is_err() {
                warn!("PolSpice output reader thread panicked");
            }
        }

        let status = child
            .wait()
            .map_err(|e| PolSpiceError::io("waiting for PolSpice", e))?;
        if let Some(err) = output_error {
            error!("PolSpice output could not be forwarded: {err}");
            return Err(err);
        }
        if !status.success() {
            error!("Something went seriously wrong: PolSpice {status}");
            return Err(PolSpiceError::Failed { status });
        }
        info!("PolSpice finished");
        Ok(())
    }

    fn forward_line(
        &self,
        stdout: &io::Stdout,
        log_file: Option<&mut File>,
        line: &str,
    ) -> Result<(), PolSpiceError> {
        if self.echo {
            let mut out = stdout.lock();
            writeln!(out, "{line}").map_err(|e| PolSpiceError::io("echoing output", e))?;
        }
        if let Some(file) = log_file {
            writeln!(file, "{line}")
                .and_then(|_| file.flush())
                .map_err(|e| PolSpiceError::io("writing log file", e))?;
        }
        Ok(())
    }
}

/// Read `pipe` line by line until EOF, sending each line (without its
/// terminator) to `tx`. Non-UTF-8 bytes are replaced.
fn forward_lines<R: Read + Send + 'static>(pipe: R, tx: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_requires_healpix() {
        let err = PolSpiceEnv::from_lookup(lookup_from(&[("LD_LIBRARY_PATH", "/lib")])).unwrap_err();
        assert!(matches!(err, PolSpiceError::MissingEnv { var: "HEALPIX" }));
    }

    #[test]
    fn env_requires_ld_library_path() {
        let err = PolSpiceEnv::from_lookup(lookup_from(&[("HEALPIX", "/opt/healpix")])).unwrap_err();
        assert!(matches!(err, PolSpiceError::MissingEnv { var: "LD_LIBRARY_PATH" }));
    }

    #[test]
    fn command_has_only_the_three_variables() {
        let env = PolSpiceEnv::new("/opt/healpix", "/opt/lib");
        let runner = PolSpice::new("/usr/local/bin/spice", env).with_threads(4);
        let mut opts = PolSpiceOptions::default();
        opts.nlmax = Some(512);

        let cmd = runner.command(&opts);
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-nlmax", "512"]);

        let mut envs: Vec<(String, String)> = cmd
            .get_envs()
            .filter_map(|(k, v)| {
                Some((k.to_string_lossy().into_owned(), v?.to_string_lossy().into_owned()))
            })
            .collect();
        envs.sort();
        assert_eq!(
            envs,
            vec![
                ("HEALPIX".to_string(), "/opt/healpix".to_string()),
                ("LD_LIBRARY_PATH".to_string(), "/opt/lib".to_string()),
                ("OMP_THREAD_LIMIT".to_string(), "4".to_string()),
            ]
        );
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let runner = PolSpice::new(
            "/nonexistent/spice",
            PolSpiceEnv::new("/opt/healpix", "/opt/lib"),
        )
        .with_echo(false);
        let err = runner.run(&PolSpiceOptions::default()).unwrap_err();
        assert!(matches!(err, PolSpiceError::Spawn { .. }));
    }
}
