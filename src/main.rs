use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use asdemo::{
    demo::{self, DemoContext},
    driver, graph,
    params::{self, Backend, Configurables},
    vector,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(version, about = "Walks through the capabilities of a key-value store client")]
struct Cli {
    /// Seed node host
    #[arg(long, global = true, env = params::env::HOST, default_value = params::DEFAULT_HOST)]
    host: String,

    /// Seed node port
    #[arg(long, global = true, env = params::env::PORT, default_value_t = params::DEFAULT_PORT)]
    port: u16,

    /// Namespace holding the demo records
    #[arg(long, global = true, env = params::env::NAMESPACE, default_value = params::DEFAULT_NAMESPACE)]
    namespace: String,

    /// Set holding the demo records
    #[arg(long, global = true, env = params::env::SET, default_value = params::DEFAULT_SET)]
    set: String,

    /// Store backend
    #[arg(long, global = true, env = params::env::BACKEND, value_enum, default_value_t = Backend::Memory)]
    backend: Backend,

    /// Client timeout in milliseconds
    #[arg(long, global = true, env = params::env::TIMEOUT_MS, default_value_t = params::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Sleep between two index build status checks, in milliseconds
    #[arg(long, global = true, env = params::env::INDEX_POLL_MS, default_value_t = params::DEFAULT_INDEX_POLL_MS)]
    index_poll_ms: u64,

    /// Log level filter, overrides `RUST_LOG`
    #[arg(long, global = true)]
    log_level: Option<log::LevelFilter>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Write a record and read it back
    Basic,
    /// Batch reads, list operations and secondary index queries
    Features,
    /// Property graph stored as records
    Graph,
    /// Nearest neighbour search over stored vectors
    Vector,
    /// Run every demo in order
    All,
}

impl Cli {
    fn configurables(&self) -> Configurables {
        Configurables {
            host: self.host.clone(),
            port: self.port,
            namespace: self.namespace.clone(),
            set: self.set.clone(),
            backend: self.backend,
            timeout: Duration::from_millis(self.timeout_ms),
            index_poll_interval: Duration::from_millis(self.index_poll_ms),
        }
    }
}

fn init_logger(level: Option<log::LevelFilter>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing `.env` file is fine
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let cli = Cli::parse();
    init_logger(cli.log_level);

    if dotenv_loaded {
        info!("loaded environment from .env");
    }

    if let Err(e) = params::init(cli.configurables()) {
        error!("invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }
    let params = params::configurables();

    let driver = match driver::connect(params).await {
        Ok(driver) => driver,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let ctx = DemoContext::new(driver.clone(), params);
    let command = cli.command.unwrap_or(Command::All);
    let code = run(command, &ctx).await;

    if let Err(e) = driver.close().await {
        warn!("error closing client: {}", e);
    }

    code
}

async fn run(command: Command, ctx: &DemoContext) -> ExitCode {
    let all = command == Command::All;

    if all || command == Command::Basic {
        if let Err(e) = demo::basic::run(ctx).await {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    if all || command == Command::Features {
        let outcomes = demo::features::run_all(ctx).await;
        let failed = outcomes.iter().filter(|o| !o.is_completed()).count();
        if failed > 0 {
            warn!("{} feature showcase(s) stopped early", failed);
        }
    }

    if all || command == Command::Graph {
        if let Err(e) = graph::demo::run(ctx).await {
            error!("Error running graph demo: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if all || command == Command::Vector {
        if let Err(e) = vector::demo::run(ctx).await {
            error!("Error running vector demo: {}", e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_and_overrides() {
        let cli = Cli::try_parse_from(["asdemo", "--port", "4000", "graph"]).unwrap();
        assert_eq!(cli.command, Some(Command::Graph));

        let params = cli.configurables();
        assert_eq!(params.port, 4000);
        assert_eq!(params.backend, Backend::Memory);
        assert_eq!(params.index_poll_interval, Duration::from_millis(100));
    }
}
