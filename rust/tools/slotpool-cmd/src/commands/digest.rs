//! Digest command implementation

use anyhow::{Context, Result};
use slotpool::common::error::Error;
use slotpool::workflow::{RunOptions, run_parallel_over};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use xxhash_rust::xxh3::Xxh3;

use crate::commands::{resolve_slots, run_options};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub path: PathBuf,
    pub xxh3: u64,
}

pub fn run(slots: Option<usize>, keep_going: bool, files: Vec<PathBuf>) -> Result<()> {
    let slots = resolve_slots(slots);
    log::info!("hashing {} file(s) on {slots} slot(s)", files.len());

    let digests = digest_files(slots, run_options(keep_going), files, |digest| {
        let mut stdout = std::io::stdout().lock();
        // A closed stdout is not worth failing the task over.
        let _ = writeln!(stdout, "{:016x}  {}", digest.xxh3, digest.path.display());
    })?;

    log::info!("hashed {} file(s)", digests.len());
    Ok(())
}

/// Hashes every file on its own pool task.
///
/// `report` is called for each finished file while the run's shared lock is
/// held, so reports never interleave. A file that cannot be read fails its
/// task, which aborts the process unless `options` turn that off; in that case
/// the file is simply missing from the result.
pub fn digest_files(
    slots: usize,
    options: RunOptions,
    files: Vec<PathBuf>,
    report: impl Fn(&FileDigest) + Send + Sync + 'static,
) -> Result<Vec<FileDigest>> {
    let report = Arc::new(report);
    let digests = Arc::new(Mutex::new(Vec::with_capacity(files.len())));

    run_parallel_over(slots, options, files, |path, lock| {
        let lock = lock.clone();
        let report = report.clone();
        let digests = digests.clone();
        Some(move || {
            let xxh3 = match hash_file(&path) {
                Ok(xxh3) => xxh3,
                Err(e) => panic!("{e}"),
            };
            let digest = FileDigest { path, xxh3 };
            lock.with(|| {
                (*report)(&digest);
                digests
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(digest);
            });
        })
    })
    .context("parallel digest run failed")?;

    let mut digests = std::mem::take(&mut *digests.lock().unwrap_or_else(|e| e.into_inner()));
    digests.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(digests)
}

pub fn hash_file(path: &Path) -> slotpool::common::Result<u64> {
    let file = File::open(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Xxh3::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.digest())
}
