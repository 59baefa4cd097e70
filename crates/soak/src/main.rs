mod config;
mod loss;
mod simulation;

use anyhow::Result;
use clap::Parser;

use config::SoakConfig;
use packet_archive::{
    ArchiveConfig, DEFAULT_MAX_PACKET_SIZE, DEFAULT_RETENTION_COUNT, DEFAULT_TICK_RATE,
};

#[derive(Parser)]
#[command(name = "archive-soak")]
#[command(about = "Checks a packet archive sizing against simulated loss")]
struct Args {
    #[arg(long, default_value_t = DEFAULT_MAX_PACKET_SIZE)]
    max_packet_size: usize,

    #[arg(short, long, default_value_t = DEFAULT_RETENTION_COUNT)]
    retention: usize,

    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 100_000, help = "Reliable packets to send")]
    packets: u32,

    #[arg(long, default_value_t = 32, help = "Smallest generated payload in bytes")]
    min_size: usize,

    #[arg(long, help = "Largest generated payload in bytes (defaults to max packet size)")]
    max_size: Option<usize>,

    #[arg(long, default_value_t = 5.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 4, help = "Ticks between a loss and its resend request")]
    request_delay: u32,

    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let archive = ArchiveConfig {
        retention_count: args.retention,
        tick_rate: args.tick_rate,
        ..ArchiveConfig::with_max_packet_size(args.max_packet_size)
    };
    archive.validate()?;

    let config = SoakConfig {
        packets: args.packets,
        min_packet_size: args.min_size,
        max_packet_size: args.max_size.unwrap_or(archive.max_packet_size),
        loss_percent: args.loss_percent,
        request_delay_ticks: args.request_delay,
        seed: args.seed,
        archive,
    };

    log::info!(
        "archive region {} bytes ({} x {} slots)",
        config.archive.region_size(),
        config.archive.max_packet_size,
        config.archive.retention_count
    );

    let report = simulation::run(&config)?;
    log::info!("recovery rate {:.2}%", report.recovery_rate() * 100.0);

    if report.resyncs > 0 {
        log::warn!(
            "{} full updates needed; consider a larger max packet size or retention",
            report.resyncs
        );
    }

    Ok(())
}
