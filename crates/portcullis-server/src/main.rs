//! Portcullis gateway entry point.

use std::path::PathBuf;

use portcullis_config::{ConfigLoader, Environment, GatewayConfig};
use portcullis_server::{telemetry_config, App, ServerError, ShutdownSignal};

const ENV_PREFIX: &str = "PORTCULLIS";

struct Args {
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("portcullis {}", portcullis_server::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Portcullis - HTTP gateway for the user and account services

USAGE:
    portcullis [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Extra configuration file (TOML or JSON), applied last
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    PORTCULLIS_ENV                          DEV, STAGING or LIVE (default: DEV)
    PORTCULLIS__SERVER__HTTP_ADDR           Listen address (default: 0.0.0.0:8080)
    PORTCULLIS__LOGGING__LEVEL              Log filter (e.g. info,portcullis_rpc=debug)
    PORTCULLIS__USER_API__BASE_URL          User service base URL
    PORTCULLIS__ACCOUNT_RPC__ADDRESS        Account service host:port
    PORTCULLIS__ACCOUNT_RPC__CA_CERT_PATH   CA certificate for the account service

Configuration is read from config/<env>.toml, then --config, then a .env
file, then PORTCULLIS__SECTION__KEY variables.
"
    );
}

fn load_config(args: &Args) -> Result<GatewayConfig, ServerError> {
    let environment = Environment::from_env()?;

    let mut loader = ConfigLoader::new()
        .with_environment(environment)
        .with_optional_file(environment.config_file())?;
    if let Some(path) = &args.config {
        loader = loader.with_file(path)?;
    }

    Ok(loader.with_dotenv()?.with_env_prefix(ENV_PREFIX).load()?)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = portcullis_telemetry::init_telemetry(&telemetry_config(&config)) {
        eprintln!("Failed to initialise telemetry: {e}");
        std::process::exit(1);
    }

    tracing::info!(
        version = portcullis_server::VERSION,
        http_addr = %config.server.http_addr,
        user_api = %config.user_api.base_url,
        account_rpc = %config.account_rpc.address,
        "starting portcullis"
    );

    let app = match App::build(config).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "failed to start gateway");
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run(ShutdownSignal::with_os_signals()).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
