use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::archive::{ArchiveError, PacketArchive};
use crate::config::ArchiveConfig;
use crate::protocol::Datagram;
use crate::resend::{ResendError, ResendOutcome, ResendService};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("server full")]
    ServerFull,
    #[error("session is disconnected")]
    Disconnected,
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Resend(#[from] ResendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub reliable_sent: u64,
    pub unreliable_sent: u64,
    pub packets_resent: u64,
    pub resyncs: u64,
}

/// One peer's send side: its reliable packet archive and resend bookkeeping.
#[derive(Debug)]
pub struct Session {
    pub addr: SocketAddr,
    pub client_id: u32,
    pub state: SessionState,
    pub last_receive_time: Instant,
    archive: PacketArchive,
    resend: ResendService,
    stats: SessionStats,
}

impl Session {
    pub fn new(addr: SocketAddr, client_id: u32, config: &ArchiveConfig) -> Self {
        let mut archive = PacketArchive::with_retention(config.retention_count);
        archive.initialize(config.max_packet_size);

        Self {
            addr,
            client_id,
            state: SessionState::Connected,
            last_receive_time: Instant::now(),
            archive,
            resend: ResendService::from_config(config),
            stats: SessionStats::default(),
        }
    }

    /// Archives `body` and returns the sequence to put in its header.
    pub fn store_reliable(&mut self, body: &[u8]) -> Result<u32, SessionError> {
        let sequence = self.archive.store_packet(body).map_err(|e| match e {
            ArchiveError::Uninitialized => SessionError::Disconnected,
            other => SessionError::Archive(other),
        })?;
        self.stats.reliable_sent += 1;
        Ok(sequence)
    }

    pub fn send_reliable(&mut self, body: &[u8]) -> Result<Datagram, SessionError> {
        let sequence = self.store_reliable(body)?;
        Ok(Datagram::Reliable {
            sequence,
            body: body.to_vec(),
        })
    }

    pub fn send_unreliable(&mut self, body: &[u8]) -> Datagram {
        self.stats.unreliable_sent += 1;
        Datagram::Unreliable {
            body: body.to_vec(),
        }
    }

    /// Services a missing-packet request. When a packet can no longer be
    /// recovered the archive is reset; the caller must follow up with
    /// [`Datagram::FullUpdateRequired`] and a full state update.
    pub fn handle_missing_packets(
        &mut self,
        sequences: &[u32],
        tick: u32,
    ) -> Result<ResendOutcome, SessionError> {
        if self.state != SessionState::Connected {
            return Err(SessionError::Disconnected);
        }

        let outcome = self.resend.service(&self.archive, sequences, tick)?;
        match &outcome {
            ResendOutcome::Resend(datagrams) => {
                self.stats.packets_resent += datagrams.len() as u64;
            }
            ResendOutcome::ResyncRequired { sequence } => {
                warn!(
                    "client {} lost packet {}, resynchronizing",
                    self.client_id, sequence
                );
                self.resynchronize();
            }
            ResendOutcome::Throttled => {}
        }

        Ok(outcome)
    }

    pub fn resynchronize(&mut self) {
        self.archive.clear();
        self.resend.reset();
        self.stats.resyncs += 1;
    }

    pub fn disconnect(&mut self) {
        self.archive.free();
        self.state = SessionState::Disconnected;
    }

    pub fn archive(&self) -> &PacketArchive {
        &self.archive
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_receive_time.elapsed() > timeout
    }

    pub fn touch(&mut self) {
        self.last_receive_time = Instant::now();
    }
}

#[derive(Debug)]
pub struct SessionManager {
    clients_by_addr: HashMap<SocketAddr, u32>,
    sessions: HashMap<u32, Session>,
    next_client_id: u32,
    max_clients: usize,
    timeout: Duration,
    config: ArchiveConfig,
}

impl SessionManager {
    pub fn new(max_clients: usize, config: ArchiveConfig) -> Self {
        Self::with_timeout(max_clients, config, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(max_clients: usize, config: ArchiveConfig, timeout_secs: u64) -> Self {
        Self {
            clients_by_addr: HashMap::new(),
            sessions: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout: Duration::from_secs(timeout_secs),
            config,
        }
    }

    /// Returns the session for `addr`, creating one if there is room.
    pub fn connect(&mut self, addr: SocketAddr) -> Result<&mut Session, SessionError> {
        if let Some(&client_id) = self.clients_by_addr.get(&addr) {
            return self
                .sessions
                .get_mut(&client_id)
                .ok_or(SessionError::Disconnected);
        }

        if self.sessions.len() >= self.max_clients {
            return Err(SessionError::ServerFull);
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("client {} connected from {}", client_id, addr);
        self.clients_by_addr.insert(addr, client_id);
        Ok(self
            .sessions
            .entry(client_id)
            .or_insert_with(|| Session::new(addr, client_id, &self.config)))
    }

    pub fn get(&self, client_id: u32) -> Option<&Session> {
        self.sessions.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut Session> {
        self.sessions.get_mut(&client_id)
    }

    pub fn get_by_addr(&self, addr: &SocketAddr) -> Option<&Session> {
        self.clients_by_addr
            .get(addr)
            .and_then(|id| self.sessions.get(id))
    }

    pub fn get_by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut Session> {
        let id = self.clients_by_addr.get(addr)?;
        self.sessions.get_mut(id)
    }

    pub fn remove(&mut self, client_id: u32) -> Option<Session> {
        let mut session = self.sessions.remove(&client_id)?;
        self.clients_by_addr.remove(&session.addr);
        session.disconnect();
        Some(session)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn cleanup_timed_out(&mut self) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.is_timed_out(self.timeout))
            .map(|(&id, _)| id)
            .collect();

        for id in &timed_out {
            info!("client {} timed out", id);
            self.remove(*id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
