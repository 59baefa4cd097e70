use std::collections::VecDeque;
use std::net::SocketAddr;

use log::{debug, info};
use packet_archive::{ResendOutcome, Session, SessionError};

use crate::config::SoakConfig;
use crate::loss::{PacketLossSimulation, SoakRng};

#[derive(Debug, Clone, Copy)]
struct LostPacket {
    sequence: u32,
    request_tick: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoakReport {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub packets_dropped: u64,
    pub packets_recovered: u64,
    pub packets_unrecoverable: u64,
    pub requests_throttled: u64,
    pub resyncs: u64,
}

impl SoakReport {
    pub fn recovery_rate(&self) -> f64 {
        let resolved = self.packets_recovered + self.packets_unrecoverable;
        if resolved == 0 {
            return 1.0;
        }
        self.packets_recovered as f64 / resolved as f64
    }
}

/// Sends one reliable packet per tick through a session, drops some of them,
/// and asks for each drop back `request_delay_ticks` later.
pub fn run(config: &SoakConfig) -> Result<SoakReport, SessionError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let mut session = Session::new(addr, 1, &config.archive);
    let mut rng = config.seed.map_or_else(SoakRng::from_time, SoakRng::new);
    let loss = PacketLossSimulation::new(config.loss_percent);
    let max_size = config.max_packet_size.min(config.archive.max_packet_size);
    let min_size = config.min_packet_size.min(max_size);

    let mut report = SoakReport::default();
    let mut lost: VecDeque<LostPacket> = VecDeque::new();
    let mut body = vec![0u8; max_size];

    for tick in 0..config.packets {
        let len = rng.range(min_size, max_size);
        body[..len].fill(tick as u8);

        let sequence = session.store_reliable(&body[..len])?;
        report.packets_sent += 1;
        report.bytes_sent += len as u64;

        if loss.should_drop(&mut rng) {
            report.packets_dropped += 1;
            lost.push_back(LostPacket {
                sequence,
                request_tick: tick.saturating_add(config.request_delay_ticks),
            });
        }

        let due: Vec<u32> = lost
            .iter()
            .take_while(|p| p.request_tick <= tick)
            .map(|p| p.sequence)
            .collect();
        if due.is_empty() {
            continue;
        }

        match session.handle_missing_packets(&due, tick)? {
            ResendOutcome::Resend(resends) => {
                report.packets_recovered += resends.len() as u64;
                lost.drain(..due.len());
            }
            ResendOutcome::Throttled => {
                report.requests_throttled += 1;
            }
            ResendOutcome::ResyncRequired { sequence } => {
                debug!("tick {}: sequence {} unrecoverable", tick, sequence);
                report.resyncs += 1;
                report.packets_unrecoverable += lost.len() as u64;
                lost.clear();
            }
        }
    }

    info!(
        "sent {} packets ({} bytes), dropped {}, recovered {}, unrecoverable {}, resyncs {}",
        report.packets_sent,
        report.bytes_sent,
        report.packets_dropped,
        report.packets_recovered,
        report.packets_unrecoverable,
        report.resyncs
    );

    Ok(report)
}
