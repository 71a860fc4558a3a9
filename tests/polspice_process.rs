//! Runs a stand-in executable through the PolSpice wrapper.
//!
//! Kept as the only test in this binary: a script that was just written can
//! fail to exec with ETXTBSY while another test thread forks.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use rusty_xcorr::polspice::{PolSpice, PolSpiceEnv, PolSpiceError, PolSpiceOptions};

fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn child_sees_arguments_and_minimal_environment() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("spice.log");
    let env = PolSpiceEnv::new("/opt/healpix", "/opt/lib");

    let mut options = PolSpiceOptions::default();
    options.nlmax = Some(64);
    options.verbosity = Some(0);

    // failing run: output is still logged, exit code is reported
    let failing = dir.path().join("failing.sh");
    write_script(
        &failing,
        concat!(
            "echo \"args: $*\"\n",
            "echo \"threads=$OMP_THREAD_LIMIT healpix=$HEALPIX ld=$LD_LIBRARY_PATH home=${HOME:-unset}\"\n",
            "echo \"from stderr\" >&2\n",
            "exit 3\n",
        ),
    );
    let runner = PolSpice::new(&failing, env.clone())
        .with_threads(2)
        .with_echo(false)
        .with_log_file(&log);

    match runner.run(&options) {
        Err(PolSpiceError::Failed { status }) => assert_eq!(status.code(), Some(3)),
        other => panic!("expected a failed run, got {other:?}"),
    }
    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("args: -nlmax 64 -verbosity 0"), "{text}");
    assert!(
        text.contains("threads=2 healpix=/opt/healpix ld=/opt/lib home=unset"),
        "{text}"
    );
    assert!(text.contains("from stderr"), "{text}");

    // succeeding run truncates the log
    let succeeding = dir.path().join("succeeding.sh");
    write_script(&succeeding, "echo done\n");
    PolSpice::new(&succeeding, env.clone())
        .with_echo(false)
        .with_log_file(&log)
        .run(&options)
        .unwrap();
    assert_eq!(fs::read_to_string(&log).unwrap(), "done\n");

    // an unwritable log fails the run only after the child has exited
    let full = Path::new("/dev/full");
    if full.exists() {
        let marker = dir.path().join("finished");
        let slow = dir.path().join("slow.sh");
        write_script(
            &slow,
            &format!(
                "echo start\nsleep 1\necho tail\n: > \"{}\"\n",
                marker.display()
            ),
        );
        let result = PolSpice::new(&slow, env)
            .with_echo(false)
            .with_log_file(full)
            .run(&options);
        match result {
            Err(PolSpiceError::Io { context, .. }) => assert_eq!(context, "writing log file"),
            other => panic!("expected a log write error, got {other:?}"),
        }
        assert!(marker.exists(), "run returned before the child exited");
    }
}
