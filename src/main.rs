use anyhow::{Context, Result};
use linux_embedded_hal::I2cdev;
use log::{error, info, warn};
use nunchuk_controller::config::Config;
use nunchuk_controller::events;
use nunchuk_controller::{Device, DeviceState, HalTransport, PeripheralHandle};
use std::fs;
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logger();

    // Parse command line arguments
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/nunchuk-controller/config.yaml".to_string());

    info!("Nunchuk Controller starting...");
    info!("Loading configuration from: {}", config_path);

    let config = load_config(&config_path)?;
    info!("Configuration loaded successfully");

    // Validate I2C device
    let i2c_device_path = &config.i2c.device;
    if !PathBuf::from(i2c_device_path).exists() {
        error!("I2C device not found: {}", i2c_device_path);
        return Err(anyhow::anyhow!("I2C device not found: {}", i2c_device_path));
    }

    let i2c = I2cdev::new(i2c_device_path)
        .context(format!("Failed to open I2C device: {}", i2c_device_path))?;
    info!(
        "I2C device opened: {} (address 0x{:02x})",
        i2c_device_path, config.i2c.address
    );

    let handle = PeripheralHandle::new(HalTransport::new(i2c), config.i2c.address);
    let mut device = Device::new(handle, config.polling);

    device.attach().await.context("Failed to attach nunchuk")?;
    device.start().await.context("Failed to start polling")?;

    let mut buttons = device.subscribe();
    let mut status = device.subscribe_state();
    let mut last = *buttons.borrow_and_update();

    // Setup signal handling via tokio
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to setup SIGHUP handler")?;

    info!("Daemon started successfully");

    loop {
        tokio::select! {
            changed = buttons.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *buttons.borrow_and_update();
                for event in events::diff(&last, &current) {
                    info!("{}", event);
                }
                last = current;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *status.borrow_and_update();
                if state == DeviceState::Failed {
                    error!("Nunchuk stopped responding, giving up");
                    device.detach().await?;
                    return Err(anyhow::anyhow!("Device failed after repeated read errors"));
                }
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully");
                break;
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, repeating handshake");
                if let Err(e) = device.reinitialize().await {
                    warn!("Handshake repeat failed: {}", e);
                }
            }
        }
    }

    if !device.state().is_terminal() {
        device.detach().await.context("Failed to detach nunchuk")?;
    }

    info!("Nunchuk Controller shutdown complete");
    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    let content = fs::read_to_string(path)
        .context(format!("Failed to read config file: {}", path))?;
    let config = Config::from_yaml(&content).context("Failed to parse configuration file")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_logger() {
    // Use `env_logger` for logging. Systemd/journald will capture stdout/stderr.
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
}
