use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use staleguard::{
    FileConfig, FileFlagStore, HttpVersionProbe, NullHost, Reconciler, ReconcilerConfig, Result,
    VersionProbe,
};

fn print_usage() {
    eprintln!("Usage: staleguard [OPTIONS]");
    eprintln!();
    eprintln!("Checks a deployed application version against the local one and");
    eprintln!("maintains the persisted version-mismatch flag.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <PATH>      Load settings from a TOML file");
    eprintln!("  --local <VERSION>    Local version string (major.minor.patch)");
    eprintln!("  --api <URL>          Deployed-version query endpoint");
    eprintln!("  --state-dir <DIR>    Directory for the persisted mismatch flag");
    eprintln!("  --watch <SECS>       Poll repeatedly instead of checking once");
    eprintln!("  -h, --help           Show this help");
    eprintln!();
    eprintln!("Exit status: 0 when up to date, 2 when a mismatch flag is set.");
}

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    local: Option<String>,
    api: Option<String>,
    state_dir: Option<PathBuf>,
    watch: Option<u64>,
}

fn parse_args() -> Options {
    let mut opts = Options::default();
    let args: Vec<String> = env::args().skip(1).collect();

    let mut i = 0;
    while i < args.len() {
        let take_value = |i: &mut usize| -> String {
            *i += 1;
            args.get(*i).cloned().unwrap_or_else(|| {
                eprintln!("Error: {} requires a value", args[*i - 1]);
                process::exit(1);
            })
        };

        match args[i].as_str() {
            "--config" => opts.config = Some(PathBuf::from(take_value(&mut i))),
            "--local" => opts.local = Some(take_value(&mut i)),
            "--api" => opts.api = Some(take_value(&mut i)),
            "--state-dir" => opts.state_dir = Some(PathBuf::from(take_value(&mut i))),
            "--watch" => {
                let value = take_value(&mut i);
                match value.parse::<u64>() {
                    Ok(secs) if secs > 0 => opts.watch = Some(secs),
                    _ => {
                        eprintln!("Error: --watch requires a positive number of seconds");
                        process::exit(1);
                    }
                }
            }
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            other => {
                eprintln!("Error: unknown option {other}");
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    opts
}

/// Probes the endpoint once, feeds the result through reconciliation, and
/// reports whether a mismatch flag is now set.
async fn check_once(
    reconciler: &Reconciler<FileFlagStore, NullHost, HttpVersionProbe>,
    probe: &HttpVersionProbe,
) -> Result<bool> {
    match probe.deployed_version().await? {
        Some(deployed) => {
            reconciler.reconcile(&deployed)?;
            let flag = reconciler.flag();
            println!(
                "local={} deployed={} flag={}",
                reconciler.local_version(),
                deployed,
                flag.map_or("none", |f| f.as_str()),
            );
            Ok(flag.is_some())
        }
        None => {
            // Non-success response; per the protocol nothing is recorded.
            println!(
                "local={} deployed=unknown flag={}",
                reconciler.local_version(),
                reconciler.flag().map_or("none", |f| f.as_str()),
            );
            Ok(reconciler.flag().is_some())
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let opts = parse_args();

    let file_config = opts.config.as_deref().map(|path| {
        FileConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Error: can not load {}: {e}", path.display());
            process::exit(1);
        })
    });

    let local = opts
        .local
        .or_else(|| file_config.as_ref().map(|c| c.local_version.clone()))
        .unwrap_or_else(|| {
            eprintln!("Error: --local (or a config file) is required");
            process::exit(1);
        });
    let api = opts
        .api
        .or_else(|| file_config.as_ref().map(|c| c.version_api_url.clone()))
        .unwrap_or_else(|| {
            eprintln!("Error: --api (or a config file) is required");
            process::exit(1);
        });
    let latest_index_url = file_config
        .as_ref()
        .and_then(|c| c.latest_index_url.clone())
        .unwrap_or_else(|| "/assets/index.js".to_string());
    let state_dir = opts
        .state_dir
        .or_else(|| file_config.as_ref().and_then(|c| c.state_dir.clone()))
        .unwrap_or_else(FileFlagStore::default_dir);
    let watch = opts
        .watch
        .or_else(|| file_config.as_ref().and_then(|c| c.watch_secs));

    let config = ReconcilerConfig::new(&local, latest_index_url, &api);
    let probe = HttpVersionProbe::new(&api);
    let store = FileFlagStore::new(&state_dir);

    let reconciler = match Reconciler::new(config, store, NullHost, probe.clone()) {
        Ok(reconciler) => reconciler,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    log::info!("staleguard start local={local} api={api}");

    loop {
        let stale = match check_once(&reconciler, &probe).await {
            Ok(stale) => stale,
            Err(e) => {
                log::error!("check failed: {e}");
                if watch.is_none() {
                    process::exit(1);
                }
                true
            }
        };

        match watch {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => process::exit(if stale { 2 } else { 0 }),
        }
    }
}
