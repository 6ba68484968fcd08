//! Radarlink command-line tool
//!
//! Finds radar sensor boards on serial ports and streams frames from them.
//!
//! # Usage
//!
//! ```bash
//! # List serial ports
//! radarlink devices
//!
//! # Probe all ports (or the given ones) for a board
//! radarlink discover
//! radarlink discover /dev/ttyACM0 /dev/ttyACM1
//!
//! # Stream 100 frames from the first board found
//! radarlink stream --frames 100
//!
//! # Same, against a simulated board
//! radarlink stream --simulate --frames 100
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use radarlink_native::bridge::{Connector, Discovery, SimulatedBoard, SimulatedConnector};
use radarlink_native::{Acquisition, AcquisitionConfig, DiscoveryConfig, FrameLayout, FrameQueue, SampleFormat};

/// Radarlink
#[derive(Parser, Debug)]
#[command(name = "radarlink")]
#[command(author, version, about = "Radar sensor board discovery and streaming", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    Devices,

    /// Probe ports for a board and report what was found
    Discover {
        #[command(flatten)]
        link: LinkArgs,

        /// Probe all ports concurrently
        #[arg(long)]
        parallel: bool,
    },

    /// Stream frames from the first board found
    Stream {
        #[command(flatten)]
        link: LinkArgs,

        /// Number of frames to receive
        #[arg(short = 'n', long, default_value = "100")]
        frames: usize,

        /// Frame queue capacity (0 = unbounded)
        #[arg(long, default_value = "16")]
        queue_capacity: usize,

        /// Bitmask of enabled receive antennas
        #[arg(long, default_value = "7")]
        rx_mask: u32,

        /// Chirps per frame
        #[arg(long, default_value = "32")]
        chirps: usize,

        /// Samples per chirp
        #[arg(long, default_value = "64")]
        samples: usize,

        /// Samples are packed 12-bit
        #[arg(long)]
        packed: bool,
    },
}

#[derive(Args, Debug)]
struct LinkArgs {
    /// Ports to probe (default: all)
    ports: Vec<String>,

    /// Use a simulated board instead of serial ports
    #[arg(long)]
    simulate: bool,

    /// Probe reply timeout in milliseconds
    #[arg(long, default_value = "200")]
    probe_timeout_ms: u64,
}

impl LinkArgs {
    fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig { probe_timeout: Duration::from_millis(self.probe_timeout_ms), ..DiscoveryConfig::default() }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Radarlink v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Devices => list_devices(),
        Commands::Discover { link, parallel } => {
            let config = link.discovery_config();
            if link.simulate {
                let connector = simulated_connector(&link.ports, 0);
                let ports = candidates(&link.ports, connector.list_ports());
                discover(&Discovery::with_config(connector, config), &ports, parallel)
            } else {
                discover_serial(&link.ports, config, parallel)
            }
        }
        Commands::Stream { link, frames, queue_capacity, rx_mask, chirps, samples, packed } => {
            let layout = FrameLayout {
                rx_mask,
                num_chirps: chirps,
                num_samples_per_chirp: samples,
                sample_format: if packed { SampleFormat::Packed12 } else { SampleFormat::U16 },
                ..FrameLayout::default()
            };
            let acquisition = AcquisitionConfig { queue_capacity, ..AcquisitionConfig::default() };
            let config = link.discovery_config();

            if link.simulate {
                let connector = simulated_connector(&link.ports, layout.expected_payload_len()?);
                let ports = candidates(&link.ports, connector.list_ports());
                stream(&Discovery::with_config(connector, config), &ports, &layout, &acquisition, frames)
            } else {
                stream_serial(&link.ports, config, &layout, &acquisition, frames)
            }
        }
    }
}

/// One simulated board per requested port, or a single `sim0`.
fn simulated_connector(ports: &[String], payload_len: usize) -> SimulatedConnector {
    let board = SimulatedBoard::default().streaming(payload_len, Duration::from_millis(20));
    let mut names = ports.iter().cloned();
    let first = names.next().unwrap_or_else(|| "sim0".to_string());
    names.fold(SimulatedConnector::new(first, board.clone()), |connector, name| {
        connector.with_port(name, board.clone())
    })
}

fn candidates(requested: &[String], available: Vec<String>) -> Vec<String> {
    if requested.is_empty() {
        available
    } else {
        requested.to_vec()
    }
}

/// List available serial ports
fn list_devices() -> anyhow::Result<()> {
    info!("Scanning for serial ports...");

    #[cfg(feature = "serial")]
    {
        use radarlink_native::bridge::SerialConnector;

        match SerialConnector::list_ports() {
            Ok(ports) if ports.is_empty() => info!("  (none found)"),
            Ok(ports) => {
                for port in ports {
                    info!("  {}", port);
                }
            }
            Err(e) => warn!("  Error scanning ports: {}", e),
        }
    }

    #[cfg(not(feature = "serial"))]
    {
        warn!("Serial support not enabled. Rebuild with --features serial");
    }

    Ok(())
}

fn discover_serial(ports: &[String], config: DiscoveryConfig, parallel: bool) -> anyhow::Result<()> {
    #[cfg(feature = "serial")]
    {
        use radarlink_native::bridge::SerialConnector;

        let ports = candidates(ports, SerialConnector::list_ports()?);
        return discover(&Discovery::with_config(SerialConnector, config), &ports, parallel);
    }

    #[cfg(not(feature = "serial"))]
    {
        let _ = (ports, config, parallel);
        anyhow::bail!(
            "Serial support not enabled. Rebuild with --features serial, or use --simulate:\n\
             cargo run -p radarlink-app --features serial -- discover"
        );
    }
}

fn stream_serial(
    ports: &[String],
    config: DiscoveryConfig,
    layout: &FrameLayout,
    acquisition: &AcquisitionConfig,
    frames: usize,
) -> anyhow::Result<()> {
    #[cfg(feature = "serial")]
    {
        use radarlink_native::bridge::SerialConnector;

        let ports = candidates(ports, SerialConnector::list_ports()?);
        return stream(&Discovery::with_config(SerialConnector, config), &ports, layout, acquisition, frames);
    }

    #[cfg(not(feature = "serial"))]
    {
        let _ = (ports, config, layout, acquisition, frames);
        anyhow::bail!(
            "Serial support not enabled. Rebuild with --features serial, or use --simulate:\n\
             cargo run -p radarlink-app --features serial -- stream"
        );
    }
}

/// Probe candidates and print the board found
fn discover<C>(discovery: &Discovery<C>, ports: &[String], parallel: bool) -> anyhow::Result<()>
where
    C: Connector + Sync,
    C::Transport: Send,
{
    info!("Probing {} port(s)...", ports.len());

    let result = if parallel { discovery.discover_parallel(ports) } else { discovery.discover(ports) };
    let mut session = match result {
        Ok(session) => session,
        Err(err) => {
            for attempt in &err.attempts {
                warn!("  {}", attempt);
            }
            return Err(err.into());
        }
    };

    let info = session.board_info();
    println!("Board:    {}", session.descriptor().name);
    println!("Port:     {}", session.identifier());
    println!("Baud:     {}", session.baud_rate());
    println!("USB id:   {:04x}:{:04x}", info.vid, info.pid);
    println!("Protocol: {}", info.protocol_version);
    println!("Firmware: {}.{}.{}", info.firmware.0, info.firmware.1, info.firmware.2);

    session.close();
    Ok(())
}

/// Discover a board and stream `count` frames through the queue
fn stream<C>(
    discovery: &Discovery<C>,
    ports: &[String],
    layout: &FrameLayout,
    config: &AcquisitionConfig,
    count: usize,
) -> anyhow::Result<()>
where
    C: Connector,
    C::Transport: 'static,
{
    let payload_len = layout.expected_payload_len()?;
    let session = discovery.discover(ports)?;
    info!(
        "Streaming {} frames from {} ({} rx, {} bytes/frame)",
        count,
        session.descriptor().name,
        layout.num_rx(),
        payload_len
    );

    let queue = Arc::new(FrameQueue::new());
    let acquisition = Acquisition::start(session, Arc::clone(&queue), config)?;

    let consumer = {
        let queue = Arc::clone(&queue);
        let layout = layout.clone();
        thread::spawn(move || {
            let mut received = 0;
            while received < count {
                let Some(frame) = queue.blocking_dequeue(Duration::from_secs(2)) else {
                    warn!("No frame within 2 s, giving up");
                    break;
                };
                received += 1;

                match layout.decode_frame(&frame) {
                    Ok(samples) => {
                        let block = layout.antenna_block(&samples, 0).unwrap_or_default();
                        let min = block.iter().min().copied().unwrap_or_default();
                        let max = block.iter().max().copied().unwrap_or_default();
                        info!(
                            "frame {:>6}: {} bytes, rx0 range {}..={}, latency {:?}",
                            frame.sequence,
                            frame.len(),
                            min,
                            max,
                            frame.timestamp.elapsed()
                        );
                    }
                    Err(e) => warn!("frame {:>6}: cannot decode: {}", frame.sequence, e),
                }
            }
            received
        })
    };

    let received = consumer.join().map_err(|_| anyhow::anyhow!("consumer thread panicked"))?;
    let stats = acquisition.stats();
    let session = acquisition.stop();

    info!(
        "Consumed {} frames ({} received, {} rejected, {} corrupt, {} evicted)",
        received, stats.frames_received, stats.frames_rejected, stats.frames_corrupt, stats.frames_evicted
    );

    radarlink_native::bridge::close_session(session);
    Ok(())
}
