use std::env;
use std::error::Error;
use std::io::{self, IsTerminal};

use color_eyre::Result;
use pywrap_core::{launch, ProvisionError, SystemToolchain, WrapperConfig};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

mod cli;

use cli::PywrapCli;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = PywrapCli::from_argv(env::args_os());
    let filter = init_tracing();
    let code = match run(cli, &filter) {
        Ok(code) => code,
        Err(err) => {
            report(&err);
            1
        }
    };
    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn run(cli: PywrapCli, filter: &FilterHandle) -> Result<i32, ProvisionError> {
    let config = WrapperConfig::from_env()?;
    if config.verbose {
        if let Err(err) = filter.reload(env_filter(true)) {
            tracing::warn!(%err, "failed to raise log level");
        }
    }
    launch(&config, &SystemToolchain, cli.args)
}

/// Installs the stderr subscriber at `warn` before configuration is read so
/// that parse warnings are visible; `PYWRAP_VERBOSE` raises it afterwards.
fn init_tracing() -> FilterHandle {
    let (filter, handle) = reload::Layer::new(env_filter(false));
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .without_time()
        .with_target(false)
        .with_level(true);

    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
    handle
}

fn env_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "warn" };
    EnvFilter::new(format!(
        "pywrap={level},pywrap_core={level},pywrap_domain={level}"
    ))
}

fn report(err: &ProvisionError) {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    eprintln!("[pywrap] error ({}): {message}", err.stage());
}
