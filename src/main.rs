//! affinity-router - resolve packets against an affinity rule set
//!
//! Loads a JSON rule configuration, builds a rule snapshot and prints the
//! winning rule for each packet given on the command line or on stdin.

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

use affinity_router::config::{
    apply_env_overrides, create_default_config, load_config_with_env, Config,
};
use affinity_router::rules::{AffinityEngine, AttributePriority, Packet, RuleIdSequence};

/// Default configuration file path
const DEFAULT_CONFIG_PATH: &str = "/etc/affinity-router/config.json";

/// Command line arguments
struct Args {
    config_path: Option<PathBuf>,
    generate_config: bool,
    check_config: bool,
    packets: Vec<String>,
    priority: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config_path = None;
        let mut generate_config = false;
        let mut check_config = false;
        let mut packets = Vec::new();
        let mut priority = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    config_path = args.next().map(PathBuf::from);
                }
                "-g" | "--generate-config" => {
                    generate_config = true;
                }
                "--check" => {
                    check_config = true;
                }
                "-p" | "--packet" => {
                    if let Some(packet) = args.next() {
                        packets.push(packet);
                    }
                }
                "--priority" => {
                    priority = args.next();
                }
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-v" | "--version" => {
                    println!("affinity-router {}", affinity_router::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {arg}");
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        Self {
            config_path,
            generate_config,
            check_config,
            packets,
            priority,
        }
    }
}

fn print_help() {
    println!(
        r"affinity-router - packet-to-rule affinity resolver

USAGE:
    affinity-router [OPTIONS]

OPTIONS:
    -c, --config <PATH>       Configuration file path (default: {DEFAULT_CONFIG_PATH})
    -g, --generate-config     Generate default configuration file and exit
        --check               Validate configuration and exit
    -p, --packet <PACKET>     Packet to resolve as SRC,DST,PORT,PROTOCOL (repeatable)
        --priority <KEYS>     Attribute priority, e.g. dst,port,src,protocol
    -h, --help                Print help information
    -v, --version             Print version information

Packets are read from stdin, one per line, when no --packet is given.
Blank lines and lines starting with '#' are skipped.

ENVIRONMENT:
    AFFINITY_LOG_LEVEL        Override log level (trace, debug, info, warn, error)
    AFFINITY_LOG_FORMAT       Override log format (json, text)
    AFFINITY_PRIORITY         Override attribute priority
    RUST_LOG                  Tracing filter directives (takes precedence over log level)
"
    );
}

fn init_logging(config: &Config) {
    let level = match config.log.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    // Results go to stdout; keep logs on stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.log.target)
        .with_writer(io::stderr);

    match (config.log.format.as_str(), config.log.timestamps) {
        ("json", true) => builder.json().init(),
        ("json", false) => builder.json().without_time().init(),
        (_, true) => builder.init(),
        (_, false) => builder.without_time().init(),
    }
}

fn load(args: &Args) -> Result<Config> {
    let mut config = match &args.config_path {
        Some(path) => load_config_with_env(path)
            .map_err(|e| anyhow!("Failed to load configuration from {path:?}: {e}"))?,
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            load_config_with_env(DEFAULT_CONFIG_PATH)
                .map_err(|e| anyhow!("Failed to load configuration: {e}"))?
        }
        None => {
            let mut config = Config::default_config();
            apply_env_overrides(&mut config)
                .map_err(|e| anyhow!("Invalid environment override: {e}"))?;
            config
        }
    };

    if let Some(priority) = &args.priority {
        config.priority = AttributePriority::parse(priority)
            .with_context(|| format!("Invalid --priority {priority:?}"))?;
        config
            .validate()
            .map_err(|e| anyhow!("Invalid configuration: {e}"))?;
    }

    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.generate_config {
        let path = args
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        create_default_config(&path)
            .map_err(|e| anyhow!("Failed to write {path:?}: {e}"))?;
        println!("Generated default configuration at {}", path.display());
        return Ok(());
    }

    let config = load(&args)?;

    if args.check_config {
        println!("Configuration is valid");
        return Ok(());
    }

    init_logging(&config);

    info!("Starting affinity-router v{}", affinity_router::VERSION);

    let ids = RuleIdSequence::new();
    let snapshot = config
        .build_snapshot(&ids, 1)
        .map_err(|e| anyhow!("Failed to build rule snapshot: {e}"))?;
    let engine = AffinityEngine::new(snapshot);
    debug!("Engine ready: {:?}", engine);

    let lines: Vec<String> = if args.packets.is_empty() {
        io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<_>>()
            .context("Failed to read packets from stdin")?
    } else {
        args.packets
    };

    let mut failures = 0usize;
    for line in lines.iter().map(|line| line.trim()) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line.parse::<Packet>() {
            Ok(packet) => {
                let result = engine.resolve(&packet);
                println!("{packet} => {result}");
            }
            Err(e) => {
                warn!("Skipping packet {:?}: {}", line, e);
                eprintln!("invalid packet {line:?}: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!("{failures} packet(s) could not be parsed"));
    }

    Ok(())
}
