use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::archive::{ArchiveError, PacketArchive};

/// A [`PacketArchive`] reachable from more than one thread, e.g. a simulation
/// thread that stores outgoing packets and an I/O thread that answers resend
/// requests. Every operation holds the same lock, so a store never interleaves
/// with a lookup.
#[derive(Debug, Clone, Default)]
pub struct SharedArchive {
    inner: Arc<Mutex<PacketArchive>>,
}

impl SharedArchive {
    pub fn new(archive: PacketArchive) -> Self {
        Self {
            inner: Arc::new(Mutex::new(archive)),
        }
    }

    pub fn initialize(&self, max_packet_size: usize) {
        self.lock().initialize(max_packet_size);
    }

    pub fn free(&self) {
        self.lock().free();
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn store_packet(&self, packet: &[u8]) -> Result<u32, ArchiveError> {
        self.lock().store_packet(packet)
    }

    /// Copies the packet out, since the bytes cannot outlive the lock.
    pub fn find_packet(&self, sequence: u32) -> Option<Vec<u8>> {
        self.with_packet(sequence, <[u8]>::to_vec)
    }

    /// Runs `f` on the archived bytes while the lock is held.
    pub fn with_packet<R>(&self, sequence: u32, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        self.lock().find_packet(sequence).map(f)
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().is_initialized()
    }

    // Poisoned locks are recovered; no archive operation panics midway.
    fn lock(&self) -> MutexGuard<'_, PacketArchive> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
