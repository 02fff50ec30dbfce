use binreg::cli::{self, Cli};
use binreg::ui::output;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    if let Err(err) = cli::run(cli) {
        output::error(format!("{:#}", err));
        std::process::exit(1);
    }
}

/// Log to stderr. `BINREG_LOG` wins over `--debug`; the default only shows
/// warnings.
fn init_tracing(debug: bool) {
    let default = if debug { "binreg=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("BINREG_LOG").unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}
