use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ble_explorer_lib::config::{AppConfig, CONFIG_FILE_NAME};
use ble_explorer_lib::core::bluetooth::{
    BluestRadio, BluetoothManager, ConnectionState, Service, SessionEvent,
};
use ble_explorer_lib::logging;
use ble_explorer_lib::utils::to_hex_string;
use clap::Parser;
use log::{info, warn};
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ble-explorer")]
#[command(about = "Scan for BLE peripherals and inspect one of them")]
struct Cli {
    /// JSON config file
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,
    /// Scan duration in seconds
    #[arg(short, long, default_value = "5")]
    scan_secs: u64,
    /// Address of the device to connect to after scanning
    #[arg(long)]
    connect: Option<String>,
    /// Characteristic to read once connected (repeatable)
    #[arg(long)]
    read: Vec<Uuid>,
    /// How long to wait for each connection step, in seconds
    #[arg(long, default_value = "15")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_config(&cli.config).await?;
    if logging::init(config.log_level_filter()).is_err() {
        eprintln!("A logger was already installed.");
    }

    let (radio, radio_events) = BluestRadio::new().await?;
    let mut manager = BluetoothManager::new(Arc::new(radio), radio_events, &config);
    let step = Duration::from_secs(cli.timeout_secs);

    let mut events = manager.events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Error(e)) => warn!("Bluetooth error: {}", e),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Missed {} session events", missed)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    manager.start_scan().await?;
    info!("Scanning for {} seconds...", cli.scan_secs);
    sleep(Duration::from_secs(cli.scan_secs)).await;
    manager.stop_scan().await?;

    let devices = manager.discovered_devices().borrow().clone();
    println!("Found {} device(s):", devices.len());
    for device in &devices {
        println!(
            "  {:<20} {:<24} {:>4} dBm  {}",
            device.address,
            device.display_name(),
            device.rssi,
            device.vendor.as_deref().unwrap_or("")
        );
    }

    if let Some(address) = &cli.connect {
        inspect(&manager, address, &cli.read, step).await?;
    }

    manager.shutdown().await;
    Ok(())
}

async fn inspect(
    manager: &BluetoothManager,
    address: &str,
    reads: &[Uuid],
    step: Duration,
) -> Result<()> {
    let mut state = manager.connection_state();
    let mut attributes = manager.device_attributes();

    manager.connect(address).await?;
    timeout(step, state.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .with_context(|| format!("timed out connecting to {address}"))??;
    let services = timeout(step, attributes.wait_for(|services| !services.is_empty()))
        .await
        .context("timed out discovering services")??
        .clone();
    print_services(&services);

    for &id in reads {
        let mut events = manager.events();
        manager.read_attribute(id).await?;
        timeout(step, wait_for_read(&mut events, id))
            .await
            .with_context(|| format!("timed out reading {id}"))??;

        let value = manager
            .device_attributes()
            .borrow()
            .iter()
            .flat_map(|service| &service.characteristics)
            .find(|characteristic| characteristic.id == id)
            .and_then(|characteristic| characteristic.last_read_value.clone());
        match value {
            Some(value) => println!("{id} = {}", to_hex_string(&value)),
            None => println!("{id} has no value"),
        }
    }

    manager.disconnect().await?;
    timeout(step, state.wait_for(|s| *s == ConnectionState::Disconnected))
        .await
        .context("timed out disconnecting")??;
    Ok(())
}

async fn wait_for_read(events: &mut broadcast::Receiver<SessionEvent>, id: Uuid) -> Result<()> {
    loop {
        match events.recv().await? {
            SessionEvent::ReadCompleted { id: done } if done == id => return Ok(()),
            SessionEvent::Error(e) => return Err(anyhow!("read of {id} failed: {e}")),
            _ => {}
        }
    }
}

fn print_services(services: &[Service]) {
    for service in services {
        println!("{}", service.name);
        for characteristic in &service.characteristics {
            let flags = characteristic
                .properties
                .iter()
                .map(|p| format!("{p:?}"))
                .collect::<Vec<_>>()
                .join(",");
            println!("  |--{} [{}]", characteristic.name, flags);
        }
    }
}
