//! Command-line interface.

use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::config::{SyncConfig, DEFAULT_REGION};

/// Publish a local directory to an S3 bucket as a static website.
#[derive(Parser, Debug, Clone)]
#[command(name = "sitesync", version, about)]
pub struct Cli {
    /// Local directory to sync.
    #[arg(long = "source-path", value_name = "DIR")]
    pub source_path: PathBuf,

    /// Destination bucket.
    #[arg(long = "bucket", value_name = "NAME")]
    pub bucket: String,

    /// Bucket region.
    #[arg(long = "region", default_value = DEFAULT_REGION)]
    pub region: String,

    /// S3-compatible endpoint URL (uses path-style addressing).
    #[arg(long = "endpoint", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Number of concurrent upload workers.
    #[arg(long = "workers", default_value = "4")]
    pub workers: NonZeroUsize,

    /// Files the walker may queue ahead of the workers.
    #[arg(long = "queue-capacity", default_value = "100")]
    pub queue_capacity: NonZeroUsize,

    /// Cache-Control max-age in seconds.
    #[arg(long = "max-age", default_value_t = 900)]
    pub max_age: u32,

    /// Compare with the bucket without uploading anything.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Enable debug logging.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    pub fn into_config(self) -> SyncConfig {
        SyncConfig {
            workers: self.workers.get(),
            queue_capacity: self.queue_capacity.get(),
            max_age_secs: self.max_age,
            dry_run: self.dry_run,
            ..SyncConfig::new(self.source_path)
        }
    }
}

/// Rewrite single-dash long flags (`-bucket`) into their `--bucket` form.
///
/// Only names [`Cli`] actually defines are rewritten, so a value such as
/// `-source-path -site` keeps its leading dash. The program name and
/// anything after a bare `--` pass through untouched.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command = Cli::command();
    let mut long_flags: Vec<&str> = command.get_arguments().filter_map(|arg| arg.get_long()).collect();
    long_flags.extend(["help", "version"]);

    let mut out = Vec::new();
    let mut passthrough = false;

    for (i, arg) in args.into_iter().enumerate() {
        let arg: OsString = arg.into();
        if i == 0 || passthrough {
            out.push(arg);
            continue;
        }
        match arg.to_str() {
            Some("--") => {
                passthrough = true;
                out.push(arg);
            }
            Some(s) if is_single_dash_long(s, &long_flags) => out.push(format!("-{}", s).into()),
            _ => out.push(arg),
        }
    }

    out
}

fn is_single_dash_long(arg: &str, long_flags: &[&str]) -> bool {
    match arg.strip_prefix('-') {
        Some(rest) if !rest.starts_with('-') => {
            let name = rest.split('=').next().unwrap_or_default();
            long_flags.contains(&name)
        }
        _ => false,
    }
}
