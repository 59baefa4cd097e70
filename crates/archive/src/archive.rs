use log::{debug, warn};

pub const DEFAULT_RETENTION_COUNT: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketRecord {
    pub position: usize,
    pub size: usize,
    pub sequence: u32,
}

impl PacketRecord {
    fn end(&self) -> usize {
        self.position + self.size
    }

    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.size > 0 && self.position < end && start < self.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArchiveError {
    #[error("packet archive is not initialized")]
    Uninitialized,
    #[error("packet of {len} bytes exceeds the {max} byte ceiling")]
    PacketTooLarge { len: usize, max: usize },
}

/// Bounded store of recently sent reliable packets, addressed by sequence
/// number.
///
/// Packet bytes live in one circular region of `max_packet_size *
/// retention_count` bytes. Records are indexed by `sequence % retention_count`
/// and tagged with the full sequence, so a lookup only hits the packet that
/// was last stored under exactly that number. A record is also dropped once
/// the write cursor wraps around and overwrites its bytes.
#[derive(Debug)]
pub struct PacketArchive {
    data: Vec<u8>,
    records: Vec<Option<PacketRecord>>,
    max_packet_size: usize,
    sequence: u32,
    cursor: usize,
    initialized: bool,
}

impl Default for PacketArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketArchive {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION_COUNT)
    }

    /// `retention_count` is rounded up to a power of two so slot indexing
    /// stays continuous when the sequence counter wraps past `u32::MAX`.
    pub fn with_retention(retention_count: usize) -> Self {
        let retention_count = retention_count.max(1).next_power_of_two();
        Self {
            data: Vec::new(),
            records: vec![None; retention_count],
            max_packet_size: 0,
            sequence: 0,
            cursor: 0,
            initialized: false,
        }
    }

    /// Allocates the byte region. Does nothing if the archive is already
    /// initialized; call [`free`](Self::free) first to resize. If the region
    /// cannot be allocated the archive stays uninitialized.
    pub fn initialize(&mut self, max_packet_size: usize) {
        if self.initialized {
            return;
        }

        let Some(capacity) = max_packet_size.checked_mul(self.records.len()) else {
            warn!(
                "packet archive of {} x {} bytes overflows, not initializing",
                self.records.len(),
                max_packet_size
            );
            return;
        };

        let mut data = Vec::new();
        if let Err(e) = data.try_reserve_exact(capacity) {
            warn!("packet archive of {} bytes not allocated: {}", capacity, e);
            return;
        }
        data.resize(capacity, 0u8);

        self.data = data;
        self.max_packet_size = max_packet_size;
        self.clear();
        self.initialized = true;
    }

    pub fn free(&mut self) {
        if self.initialized {
            self.data = Vec::new();
            self.max_packet_size = 0;
            self.initialized = false;
            self.clear();
        }
    }

    /// Forgets every stored packet and restarts sequencing at 0. Memory is
    /// kept.
    pub fn clear(&mut self) {
        self.sequence = 0;
        self.cursor = 0;
        for slot in &mut self.records {
            *slot = None;
        }
    }

    /// Copies `packet` into the archive and returns the sequence number it was
    /// stored under.
    pub fn store_packet(&mut self, packet: &[u8]) -> Result<u32, ArchiveError> {
        if !self.initialized {
            return Err(ArchiveError::Uninitialized);
        }

        let len = packet.len();
        if len > self.max_packet_size {
            return Err(ArchiveError::PacketTooLarge {
                len,
                max: self.max_packet_size,
            });
        }

        if self.cursor + len >= self.data.len() {
            debug!(
                "packet archive wrapped at offset {} (sequence {})",
                self.cursor, self.sequence
            );
            self.cursor = 0;
        }

        let start = self.cursor;
        let end = start + len;
        self.evict_overlapping(start, end);

        let sequence = self.sequence;
        let slot = self.slot(sequence);
        self.records[slot] = Some(PacketRecord {
            position: start,
            size: len,
            sequence,
        });

        self.data[start..end].copy_from_slice(packet);
        self.cursor = end;
        self.sequence = self.sequence.wrapping_add(1);

        Ok(sequence)
    }

    /// Returns the bytes stored under `sequence`, or `None` if the archive is
    /// uninitialized or the packet was never stored or has been evicted.
    pub fn find_packet(&self, sequence: u32) -> Option<&[u8]> {
        if !self.initialized {
            return None;
        }

        let record = self.record(sequence)?;
        Some(&self.data[record.position..record.end()])
    }

    pub fn record(&self, sequence: u32) -> Option<PacketRecord> {
        if !self.initialized {
            return None;
        }
        self.records[self.slot(sequence)].filter(|r| r.sequence == sequence)
    }

    pub fn contains(&self, sequence: u32) -> bool {
        self.find_packet(sequence).is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    pub fn retention_count(&self) -> usize {
        self.records.len()
    }

    pub fn next_sequence(&self) -> u32 {
        self.sequence
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, sequence: u32) -> usize {
        sequence as usize % self.records.len()
    }

    fn evict_overlapping(&mut self, start: usize, end: usize) {
        for slot in &mut self.records {
            if slot.is_some_and(|r| r.overlaps(start, end)) {
                *slot = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(retention: usize, max_packet_size: usize) -> PacketArchive {
        let mut archive = PacketArchive::with_retention(retention);
        archive.initialize(max_packet_size);
        archive
    }

    #[test]
    fn test_store_then_find_returns_same_bytes() {
        let mut archive = archive(DEFAULT_RETENTION_COUNT, 1400);
        let packet: Vec<u8> = (0..200).map(|i| i as u8).collect();

        let sequence = archive.store_packet(&packet).unwrap();

        assert_eq!(archive.find_packet(sequence), Some(packet.as_slice()));
    }

    #[test]
    fn test_sequences_are_consecutive() {
        let mut archive = archive(16, 64);

        for expected in 0..100u32 {
            assert_eq!(archive.store_packet(&[expected as u8; 3]).unwrap(), expected);
        }
        assert_eq!(archive.next_sequence(), 100);
    }

    #[test]
    fn test_slot_reuse_evicts_oldest() {
        let mut archive = archive(4, 16);

        let sequences: Vec<u32> = [b"A", b"B", b"C", b"D", b"E"]
            .iter()
            .map(|p| archive.store_packet(*p).unwrap())
            .collect();

        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
        assert!(archive.find_packet(0).is_none());
        assert_eq!(archive.find_packet(1), Some(&b"B"[..]));
        assert_eq!(archive.find_packet(3), Some(&b"D"[..]));
        assert_eq!(archive.find_packet(4), Some(&b"E"[..]));
    }

    #[test]
    fn test_records_track_position_and_size() {
        let mut archive = archive(4, 16);
        archive.store_packet(b"abc").unwrap();
        archive.store_packet(b"defgh").unwrap();

        assert_eq!(
            archive.record(1),
            Some(PacketRecord {
                position: 3,
                size: 5,
                sequence: 1
            })
        );
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn test_unknown_sequence_not_found() {
        let mut archive = archive(4, 16);
        archive.store_packet(b"only").unwrap();

        assert!(archive.find_packet(1).is_none());
        assert!(archive.find_packet(4).is_none());
        assert!(archive.find_packet(u32::MAX).is_none());
    }

    #[test]
    fn test_wraparound_restarts_at_zero() {
        let mut archive = archive(4, 10);
        assert_eq!(archive.capacity(), 40);

        for i in 0..3u8 {
            archive.store_packet(&[i; 10]).unwrap();
        }
        assert_eq!(archive.cursor(), 30);

        let sequence = archive.store_packet(&[9; 10]).unwrap();

        assert_eq!(archive.cursor(), 10);
        assert_eq!(archive.find_packet(sequence), Some(&[9u8; 10][..]));
    }

    #[test]
    fn test_wraparound_invalidates_overwritten_records() {
        let mut archive = archive(4, 10);

        for i in 0..4u8 {
            archive.store_packet(&[i; 10]).unwrap();
        }

        // Sequence 3 landed on top of sequence 0's bytes.
        assert!(archive.find_packet(0).is_none());
        assert_eq!(archive.find_packet(1), Some(&[1u8; 10][..]));
        assert_eq!(archive.find_packet(2), Some(&[2u8; 10][..]));
        assert_eq!(archive.find_packet(3), Some(&[3u8; 10][..]));
    }

    #[test]
    fn test_partial_overlap_invalidates_record() {
        let mut archive = archive(4, 10);

        archive.store_packet(&[0; 2]).unwrap();
        for i in 1..4u8 {
            archive.store_packet(&[i; 10]).unwrap();
        }
        assert_eq!(archive.cursor(), 32);

        // Wraps to 0..10, clipping the front of sequence 1 at 2..12.
        archive.store_packet(&[4; 10]).unwrap();

        assert!(archive.find_packet(1).is_none());
        assert_eq!(archive.find_packet(2), Some(&[2u8; 10][..]));
        assert_eq!(archive.find_packet(3), Some(&[3u8; 10][..]));
        assert_eq!(archive.find_packet(4), Some(&[4u8; 10][..]));
    }

    #[test]
    fn test_empty_packet_round_trip() {
        let mut archive = archive(4, 16);

        let sequence = archive.store_packet(&[]).unwrap();

        assert_eq!(archive.find_packet(sequence), Some(&b""[..]));
        assert_eq!(archive.cursor(), 0);
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let mut archive = archive(4, 8);

        let result = archive.store_packet(&[0; 9]);

        assert_eq!(result, Err(ArchiveError::PacketTooLarge { len: 9, max: 8 }));
        assert_eq!(archive.next_sequence(), 0);
        assert!(archive.is_empty());
    }

    #[test]
    fn test_clear_resets_sequence_and_records() {
        let mut archive = archive(8, 32);
        for _ in 0..5 {
            archive.store_packet(b"payload").unwrap();
        }

        archive.clear();

        for sequence in 0..5 {
            assert!(archive.find_packet(sequence).is_none());
        }
        assert_eq!(archive.store_packet(b"fresh").unwrap(), 0);
        assert_eq!(archive.find_packet(0), Some(&b"fresh"[..]));
        assert_eq!(archive.capacity(), 8 * 32);
    }

    #[test]
    fn test_uninitialized_archive_is_inert() {
        let mut archive = PacketArchive::new();

        assert_eq!(archive.store_packet(b"x"), Err(ArchiveError::Uninitialized));
        assert!(archive.find_packet(0).is_none());
        archive.clear();
        archive.free();
        archive.free();
        assert!(!archive.is_initialized());
        assert_eq!(archive.capacity(), 0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut archive = archive(4, 16);
        archive.store_packet(b"kept").unwrap();

        archive.initialize(1024);

        assert_eq!(archive.max_packet_size(), 16);
        assert_eq!(archive.find_packet(0), Some(&b"kept"[..]));
    }

    #[test]
    fn test_free_then_reinitialize() {
        let mut archive = archive(4, 16);
        archive.store_packet(b"old").unwrap();

        archive.free();
        assert!(archive.find_packet(0).is_none());
        assert!(archive.record(0).is_none());
        assert!(archive.is_empty());
        assert_eq!(archive.next_sequence(), 0);
        assert_eq!(archive.store_packet(b"x"), Err(ArchiveError::Uninitialized));

        archive.initialize(32);
        assert_eq!(archive.capacity(), 128);
        assert!(archive.find_packet(0).is_none());
        assert_eq!(archive.store_packet(b"new").unwrap(), 0);
    }

    #[test]
    fn test_oversized_region_leaves_archive_uninitialized() {
        let mut archive = PacketArchive::with_retention(4);

        archive.initialize(usize::MAX / 2);
        assert!(!archive.is_initialized());

        archive.initialize(usize::MAX / 4);
        assert!(!archive.is_initialized());
        assert_eq!(archive.store_packet(b"x"), Err(ArchiveError::Uninitialized));

        archive.initialize(16);
        assert!(archive.is_initialized());
        assert_eq!(archive.capacity(), 64);
    }

    #[test]
    fn test_retention_rounded_to_power_of_two() {
        assert_eq!(PacketArchive::with_retention(3).retention_count(), 4);
        assert_eq!(PacketArchive::with_retention(0).retention_count(), 1);
        assert_eq!(PacketArchive::with_retention(256).retention_count(), 256);
    }

    #[test]
    fn test_sequence_counter_wraps() {
        let mut archive = archive(3, 16);
        archive.sequence = u32::MAX - 1;

        let sequences: Vec<u32> = (0..4u8)
            .map(|i| archive.store_packet(&[i; 4]).unwrap())
            .collect();

        assert_eq!(sequences, vec![u32::MAX - 1, u32::MAX, 0, 1]);
        for (i, &sequence) in sequences.iter().enumerate() {
            assert_eq!(archive.find_packet(sequence), Some(&[i as u8; 4][..]));
        }
    }
}
