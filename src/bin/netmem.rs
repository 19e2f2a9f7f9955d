//! Command-line front end: a page server and a demonstration client.
//!
//! The client mode maps a region, touches one byte in every page (each first
//! touch demand-fetches that page), overwrites one page with a recognizable
//! pattern, syncs it back, and reports the session counters.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use netmem::config::{ClientConfig, NetmemConfig, DEFAULT_PORT};
use netmem::region::Session;
use netmem::service::PageServer;
use netmem::utils::logging;

#[derive(Parser)]
#[command(name = "netmem", version, about = "Network-backed virtual memory over TCP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the page server
    Server(ServerArgs),
    /// Run the demonstration client against a server
    Client(ClientArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Port to listen on / connect to
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Host to bind / connect to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ServerArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Page size clients must negotiate (bytes)
    #[arg(long)]
    page_size: Option<u64>,

    /// Largest backing store a session may request (bytes)
    #[arg(long)]
    max_memory: Option<u64>,

    /// Persist the store to this file on every accepted sync
    #[arg(long)]
    persist: Option<PathBuf>,
}

#[derive(Args)]
struct ClientArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Region size to negotiate (bytes)
    #[arg(long)]
    memory: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("netmem: {e}");
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> netmem::Result<()> {
    match cli.command {
        Command::Server(args) => {
            let mut config = load_config(&args.common)?;
            apply_addr(&mut config.server.address, &args.common.host, args.common.port);
            if let Some(page_size) = args.page_size {
                config.server.page_size = page_size;
            }
            if let Some(max_memory) = args.max_memory {
                config.server.max_memory_size = max_memory;
            }
            if let Some(persist) = args.persist {
                config.server.persist_path = Some(persist);
            }
            logging::init(&config.logging);
            config.validate_strict()?;

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let server = PageServer::bind(config.server).await?;
                server.run().await
            })
        }
        Command::Client(args) => {
            let mut config = load_config(&args.common)?;
            apply_addr(&mut config.client.address, &args.common.host, args.common.port);
            if let Some(memory) = args.memory {
                config.client.memory_size = memory;
            }
            logging::init(&config.logging);
            config.validate_strict()?;

            run_client(&config.client)
        }
    }
}

fn load_config(common: &CommonArgs) -> netmem::Result<NetmemConfig> {
    match &common.config {
        Some(path) => NetmemConfig::from_file(path),
        None => NetmemConfig::from_env(),
    }
}

/// Recompose an `host:port` address from the configured value and any
/// command-line overrides.
fn apply_addr(address: &mut String, host: &Option<String>, port: Option<u16>) {
    if host.is_none() && port.is_none() {
        return;
    }
    let (current_host, current_port) = match address.rsplit_once(':') {
        Some((h, p)) => (h.to_string(), p.parse::<u16>().unwrap_or(DEFAULT_PORT)),
        None => (address.clone(), DEFAULT_PORT),
    };
    let new_host = host.clone().unwrap_or(current_host);
    let new_port = port.unwrap_or(current_port);
    *address = format!("{new_host}:{new_port}");
}

fn run_client(config: &ClientConfig) -> netmem::Result<()> {
    info!(address = %config.address, memory_size = config.memory_size, "Connecting");
    let mut session = Session::connect(config.address.as_str(), config.memory_size)?;
    let page_size = session.page_size();
    let pages = session.memory_size() / page_size;

    // One byte per page; every first touch blocks on a demand fetch.
    for page in 0..pages {
        let offset = (page * page_size) as usize + 0x0A;
        let value = session.as_slice()[offset];
        println!("page {page:>3}  offset {offset:#08x}  value {value:#04x}");
    }

    // Overwrite one page with a repeating pattern and push it back.
    let target_page = pages.min(4).saturating_sub(1);
    let target = (target_page * page_size) as usize;
    let pattern = [0xDE, 0xAD, 0xBE, 0xEF];
    {
        let page = &mut session.as_mut_slice()[target..target + page_size as usize];
        for (i, byte) in page.iter_mut().enumerate() {
            *byte = pattern[i % pattern.len()];
        }
    }
    session.sync_page(target_page * page_size)?;
    println!("synced page {target_page} at offset {target:#x}");

    let stats = session.stats();
    println!(
        "pages fetched: {}, pages synced: {}",
        stats.pages_fetched, stats.pages_synced
    );
    session.disconnect()
}
