use anyhow::Result;
use std::path::PathBuf;

use naturelog::{config::Config, logging, web};

struct Args {
    config_path: Option<PathBuf>,
    port: Option<u16>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config_path: None,
        port: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("naturelog {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--port" | "-p" => match args.get(i + 1).and_then(|v| v.parse().ok()) {
                Some(port) => {
                    parsed.port = Some(port);
                    i += 1;
                }
                None => {
                    eprintln!("Error: --port requires a port number");
                    std::process::exit(1);
                }
            },
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"naturelog - share and explore wildlife observations

USAGE:
    naturelog [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --port, -p PORT     Port to listen on (overrides config)
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    NATURELOG_CONFIG            Path to config file (overrides default location)
    NATURELOG_DATA_DIR          Directory holding the database
    NATURELOG_DB_NAME           Database name (file is <name>.db)
    NATURELOG_SESSION_SECRET    Key used to sign session cookies
    NATURELOG_PORT              Port to listen on
    NATURELOG_MAX_UPLOAD_BYTES  Largest accepted image
    NATURELOG_LOG_DIR           Write logs to a daily file in this directory
    NATURELOG_LOG               Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/naturelog/config.toml"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    let mut config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    logging::init(config.log_dir.clone())?;
    config.log_load_report();

    web::serve(config).await
}
