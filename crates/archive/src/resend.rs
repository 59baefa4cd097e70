use log::{debug, warn};

use crate::archive::PacketArchive;
use crate::config::ArchiveConfig;
use crate::protocol::{sequence_greater_than, Datagram};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResendError {
    #[error("missing packet request out of order: {sequence} after {previous}")]
    NotAscending { previous: u32, sequence: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendOutcome {
    /// Every requested packet was found, re-framed under its original sequence.
    Resend(Vec<Datagram>),
    /// Request arrived too soon after the previous one and was ignored.
    Throttled,
    /// `sequence` is no longer archived. The peer needs a full update.
    ResyncRequired { sequence: u32 },
}

/// Answers "please resend" requests from one peer against that peer's
/// archive.
#[derive(Debug)]
pub struct ResendService {
    throttle_ticks: u32,
    last_request_tick: Option<u32>,
}

impl ResendService {
    pub fn new(throttle_ticks: u32) -> Self {
        Self {
            throttle_ticks,
            last_request_tick: None,
        }
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(config.resend_throttle_ticks())
    }

    pub fn service(
        &mut self,
        archive: &PacketArchive,
        sequences: &[u32],
        tick: u32,
    ) -> Result<ResendOutcome, ResendError> {
        if self.is_throttled(tick) {
            debug!("ignoring missing packet request at tick {}", tick);
            return Ok(ResendOutcome::Throttled);
        }

        for pair in sequences.windows(2) {
            if !sequence_greater_than(pair[1], pair[0]) {
                return Err(ResendError::NotAscending {
                    previous: pair[0],
                    sequence: pair[1],
                });
            }
        }

        self.last_request_tick = Some(tick);

        let mut resends = Vec::with_capacity(sequences.len());
        for &sequence in sequences {
            let Some(body) = archive.find_packet(sequence) else {
                warn!("packet {} is no longer archived, full update required", sequence);
                return Ok(ResendOutcome::ResyncRequired { sequence });
            };

            resends.push(Datagram::Reliable {
                sequence,
                body: body.to_vec(),
            });
        }

        Ok(ResendOutcome::Resend(resends))
    }

    pub fn reset(&mut self) {
        self.last_request_tick = None;
    }

    fn is_throttled(&self, tick: u32) -> bool {
        self.last_request_tick
            .is_some_and(|last| tick.wrapping_sub(last) <= self.throttle_ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_archive(count: u8) -> PacketArchive {
        let mut archive = PacketArchive::with_retention(8);
        archive.initialize(16);
        for i in 0..count {
            archive.store_packet(&[i; 4]).unwrap();
        }
        archive
    }

    #[test]
    fn test_resends_requested_packets() {
        let archive = filled_archive(5);
        let mut service = ResendService::new(15);

        let outcome = service.service(&archive, &[1, 3], 100).unwrap();

        assert_eq!(
            outcome,
            ResendOutcome::Resend(vec![
                Datagram::Reliable {
                    sequence: 1,
                    body: vec![1; 4]
                },
                Datagram::Reliable {
                    sequence: 3,
                    body: vec![3; 4]
                },
            ])
        );
    }

    #[test]
    fn test_evicted_packet_requires_resync() {
        let archive = filled_archive(12);
        let mut service = ResendService::new(15);

        let outcome = service.service(&archive, &[2, 9], 100).unwrap();

        assert_eq!(outcome, ResendOutcome::ResyncRequired { sequence: 2 });
    }

    #[test]
    fn test_out_of_order_request_rejected() {
        let archive = filled_archive(5);
        let mut service = ResendService::new(15);

        let result = service.service(&archive, &[3, 1], 100);

        assert_eq!(
            result,
            Err(ResendError::NotAscending {
                previous: 3,
                sequence: 1
            })
        );
        // A rejected request does not start the throttle window.
        assert!(matches!(
            service.service(&archive, &[1], 101),
            Ok(ResendOutcome::Resend(_))
        ));
    }

    #[test]
    fn test_duplicate_sequence_rejected() {
        let archive = filled_archive(5);
        let mut service = ResendService::new(15);

        assert!(service.service(&archive, &[2, 2], 0).is_err());
    }

    #[test]
    fn test_requests_throttled_within_window() {
        let archive = filled_archive(5);
        let mut service = ResendService::new(15);

        assert!(matches!(
            service.service(&archive, &[0], 100),
            Ok(ResendOutcome::Resend(_))
        ));
        assert_eq!(
            service.service(&archive, &[1], 115),
            Ok(ResendOutcome::Throttled)
        );
        assert!(matches!(
            service.service(&archive, &[1], 116),
            Ok(ResendOutcome::Resend(_))
        ));

        service.reset();
        assert!(matches!(
            service.service(&archive, &[2], 117),
            Ok(ResendOutcome::Resend(_))
        ));
    }

    #[test]
    fn test_uninitialized_archive_requires_resync() {
        let archive = PacketArchive::new();
        let mut service = ResendService::new(0);

        assert_eq!(
            service.service(&archive, &[0], 0),
            Ok(ResendOutcome::ResyncRequired { sequence: 0 })
        );
    }
}
