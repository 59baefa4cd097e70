pub mod archive;
pub mod config;
pub mod protocol;
pub mod resend;
pub mod session;
pub mod shared;

pub use archive::{ArchiveError, PacketArchive, PacketRecord, DEFAULT_RETENTION_COUNT};
pub use config::{
    ArchiveConfig, ConfigError, DEFAULT_MAX_PACKET_SIZE, DEFAULT_TICK_RATE, MAX_DATAGRAM_SIZE,
};
pub use protocol::{
    sequence_greater_than, Datagram, Frame, FrameHeader, PacketError, PROTOCOL_MAGIC,
    PROTOCOL_VERSION,
};
pub use resend::{ResendError, ResendOutcome, ResendService};
pub use session::{Session, SessionError, SessionManager, SessionState, SessionStats};
pub use shared::SharedArchive;
