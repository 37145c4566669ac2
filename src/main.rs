//! Status light daemon.
//!
//! Drives an APA102 LED strip and a character LCD from a single device
//! thread, and accepts commands over HTTP and the serial console.
//!
//! ## Architecture
//! - **Device thread** (std::thread): owns all state, ticks every 100 ms
//! - **HTTP server** (tokio/axum): queues requests to the device thread
//! - **Serial reader** (std::thread): forwards console bytes, survives restarts
//!
//! `RESTART` ends the device thread; the HTTP server is shut down gracefully
//! and everything boots again from the persisted files.
//!
//! ## Usage
//! ```sh
//! sudo ./target/release/status-light --data-dir /var/lib/status-light --spi-device /dev/spidev0.0
//! ```

use anyhow::Context;
use clap::Parser;
use status_light::device::{Device, Exit};
use status_light::lcd::LcdBuffer;
use status_light::led::{LedStrip, MemoryStrip, SpiDevice};
use status_light::network::{self, HostNetwork, MAX_CONNECT_RETRIES};
use status_light::runtime::{DeviceEvent, run_device_loop};
use status_light::server::{self, AppState};
use status_light::settings::Settings;
use status_light::store::FileStore;
use status_light::{DeviceConfig, serial, setup_signal_handler};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

/// Networked desk status light
#[derive(Parser)]
#[command(name = "status-light")]
#[command(about = "LED strip and LCD status light with an HTTP and serial command interface")]
#[command(version)]
struct Args {
    /// Directory holding settings.txt, userIds.txt and password.bin
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Port to listen on
    #[arg(long, default_value = "80")]
    port: u16,

    /// SPI device node for the LED strip; frames stay in memory without it
    #[arg(long)]
    spi_device: Option<PathBuf>,

    /// Serial device for the console; stdin/stdout without it
    #[arg(long)]
    serial: Option<PathBuf>,

    /// Number of LEDs on the strip
    #[arg(long, default_value = "24")]
    led_count: usize,

    /// APA102 global brightness (0-31)
    #[arg(long, default_value = "7")]
    brightness: u8,

    /// LCD columns
    #[arg(long, default_value = "20")]
    lcd_cols: usize,

    /// LCD rows
    #[arg(long, default_value = "4")]
    lcd_rows: usize,

    /// Association attempts before giving up, one second apart
    #[arg(long, default_value_t = MAX_CONNECT_RETRIES)]
    connect_retries: u32,
}

type LoopResult = (Exit, Receiver<u8>);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();
    let config = DeviceConfig {
        lcd_cols: args.lcd_cols,
        lcd_rows: args.lcd_rows,
        led_count: args.led_count,
        brightness: args.brightness,
    };

    tracing::info!("Status Light v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("LCD: {}x{}", config.lcd_cols, config.lcd_rows);
    tracing::info!("LEDs: {} at brightness {}", config.led_count, config.brightness_bits());
    tracing::info!("Data dir: {}", args.data_dir.display());

    let running = setup_signal_handler().context("failed to install Ctrl+C handler")?;

    let mut serial_rx = match &args.serial {
        Some(path) => serial::spawn_reader(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => serial::spawn_reader(std::io::stdin()),
    };

    loop {
        tracing::info!("Initializing. Please wait.");
        let device = Device::boot(
            config,
            open_strip(&args)?,
            LcdBuffer::new(config.lcd_cols, config.lcd_rows),
            FileStore::new(&args.data_dir),
            open_console(&args)?,
        );
        let settings = device.settings().cloned();

        let (events_tx, events_rx) = mpsc::channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let flag = running.clone();
        std::thread::spawn(move || {
            let stopped = run_device_loop(device, events_rx, serial_rx, flag);
            let _ = exit_tx.send((stopped.exit, stopped.serial));
        });

        let (exit, serial) = serve(&args, settings, events_tx, exit_rx).await?;
        serial_rx = serial;

        match exit {
            Exit::Restart => tracing::info!("Restarting."),
            Exit::Shutdown => break,
        }
    }

    tracing::info!("Shut down.");
    Ok(())
}

fn open_strip(args: &Args) -> anyhow::Result<Box<dyn LedStrip>> {
    Ok(match &args.spi_device {
        Some(path) => Box::new(
            SpiDevice::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => {
            tracing::info!("No SPI device given; LED frames stay in memory.");
            Box::new(MemoryStrip::new())
        }
    })
}

fn open_console(args: &Args) -> anyhow::Result<Box<dyn Write + Send>> {
    Ok(match &args.serial {
        Some(path) => Box::new(
            OpenOptions::new()
                .write(true)
                .open(path)
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    })
}

/// Associate, serve HTTP while the device loop runs, and return once it
/// stops. Without settings or a network, only the serial console is live.
async fn serve(
    args: &Args,
    settings: Option<Settings>,
    events: Sender<DeviceEvent>,
    mut exit_rx: oneshot::Receiver<LoopResult>,
) -> anyhow::Result<LoopResult> {
    let Some(settings) = settings else {
        tracing::warn!("Without network settings the HTTP server is not started.");
        return exit_rx.await.context("device loop ended unexpectedly");
    };

    let mut host = HostNetwork;
    let connected = tokio::select! {
        result = network::connect(&mut host, &settings, args.connect_retries, &events) => result,
        stopped = &mut exit_rx => return stopped.context("device loop ended unexpectedly"),
    };
    if let Err(err) = connected {
        tracing::warn!("{} HTTP server not started.", err);
        return exit_rx.await.context("device loop ended unexpectedly");
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!("HTTP Server listening on http://{}", addr);
    tracing::info!("API Documentation: http://localhost:{}/docs", args.port);

    let app = server::create_router(AppState { events });
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let http = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let stopped = exit_rx.await.context("device loop ended unexpectedly")?;
    let _ = stop_tx.send(());
    http.await
        .context("HTTP server task failed")?
        .context("HTTP server error")?;
    Ok(stopped)
}
