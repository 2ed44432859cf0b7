// SPDX-License-Identifier: MIT OR Apache-2.0

//! rfid-inventory
//!
//! Usage:
//!     rfid-inventory --host 192.168.1.100 --antenna 1 --antenna 2
//!     rfid-inventory --config reader.toml

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;

use clap::Parser;

use rfid_inventory::core::stream::output::sink::ConsoleSink;
use rfid_inventory::core::util::shutdown::ShutdownCoordinator;
use rfid_inventory::{AppConfig, ConfigOverrides, DriverRegistry, InventoryResult, InventoryRuntime};

const HOST_PROMPT: &str = "Enter RFID reader IP address (e.g., 192.168.1.100): ";

#[derive(Parser, Debug)]
#[command(name = "rfid-inventory", about = "Deduplicating RFID tag inventory console")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reader address; prompted for when not given here or in the config file
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Reader driver name
    #[arg(long)]
    driver: Option<String>,

    /// Enabled antenna (repeatable)
    #[arg(long = "antenna")]
    antennas: Vec<u16>,

    /// Dedup buffer capacity
    #[arg(long)]
    capacity: Option<usize>,

    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Only report this EPC
    #[arg(long)]
    epc_filter: Option<String>,

    /// Stamp tags with the local clock instead of the reader's
    #[arg(long)]
    local_timestamps: bool,

    #[arg(long)]
    report_every_n_tags: Option<u32>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            driver: self.driver.clone(),
            antennas: (!self.antennas.is_empty()).then(|| self.antennas.clone()),
            report_every_n_tags: self.report_every_n_tags,
            buffer_capacity: self.capacity,
            poll_interval_ms: self.poll_interval_ms,
            epc_filter: self.epc_filter.clone(),
            local_timestamps: self.local_timestamps,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("fatal: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> InventoryResult<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_overrides(&cli.overrides());

    let has_host = config
        .connection
        .host
        .as_deref()
        .is_some_and(|host| !host.trim().is_empty());
    if !has_host {
        let stdin = io::stdin();
        match prompt_host(stdin.lock(), io::stdout())? {
            Some(host) => config.connection.host = Some(host),
            None => {
                println!("No IP address entered. Exiting...");
                return Ok(());
            }
        }
    }
    config.validate()?;

    let registry = DriverRegistry::with_defaults();
    let driver = registry.get(&config.connection.driver)?;

    println!("Initializing RFID Reader...");
    let runtime = Arc::new(InventoryRuntime::new(config, Arc::new(ConsoleSink::stdout()))?);
    println!("{}", runtime.connect_or_notify(driver.as_ref())?);

    spawn_interrupt_listener(Arc::clone(&runtime))?;

    let stdin = io::stdin();
    runtime.dispatcher().run(stdin.lock(), io::stdout())?;
    runtime.shutdown();
    println!("Exiting...");
    Ok(())
}

/// `None` when the operator enters nothing
fn prompt_host<R: BufRead, W: Write>(mut input: R, mut output: W) -> InventoryResult<Option<String>> {
    write!(output, "{}", HOST_PROMPT)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let host = line.trim();
    Ok((!host.is_empty()).then(|| host.to_string()))
}

/// Ctrl-c shuts the pipeline down from a dedicated thread and exits the process
fn spawn_interrupt_listener(runtime: Arc<InventoryRuntime>) -> InventoryResult<()> {
    thread::Builder::new()
        .name("signal-listener".to_string())
        .spawn(move || {
            let signals = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(signals) => signals,
                Err(e) => {
                    log::warn!("[Main] Ctrl-c handling unavailable: {}", e);
                    return;
                }
            };
            let coordinator = ShutdownCoordinator::new();
            signals.block_on(coordinator.wait_for_shutdown_signal());
            if coordinator.is_shutdown() {
                runtime.shutdown();
                println!("\nReader disconnected. Exiting...");
                process::exit(130);
            }
        })?;
    Ok(())
}
