use rkyv::{rancor, Archive, Deserialize, Serialize};

pub const PROTOCOL_MAGIC: u32 = 0x5041_524B;
pub const PROTOCOL_VERSION: u32 = 1;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct FrameHeader {
    pub magic: u32,
    pub version: u32,
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
        }
    }
}

impl FrameHeader {
    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

/// What travels in a single datagram between peers.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Datagram {
    /// Archived on the sender; may be requested again by `sequence`.
    Reliable { sequence: u32, body: Vec<u8> },
    Unreliable { body: Vec<u8> },
    /// Receiver asks for these reliable sequences, in ascending order.
    MissingPackets { sequences: Vec<u32> },
    /// Sender could not recover a requested packet; a full state update
    /// follows and reliable sequencing restarts at 0.
    FullUpdateRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Frame {
    pub header: FrameHeader,
    pub datagram: Datagram,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("bad frame header (magic {magic:#x}, version {version})")]
    InvalidHeader { magic: u32, version: u32 },
}

impl Frame {
    pub fn new(datagram: Datagram) -> Self {
        Self {
            header: FrameHeader::default(),
            datagram,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        let frame =
            rkyv::from_bytes::<Self, rancor::Error>(data).map_err(PacketError::Deserialize)?;

        if !frame.header.is_valid() {
            return Err(PacketError::InvalidHeader {
                magic: frame.header.magic,
                version: frame.header.version,
            });
        }

        Ok(frame)
    }
}

impl Datagram {
    pub fn encode(self) -> Result<Vec<u8>, PacketError> {
        Frame::new(self).serialize()
    }

    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        Frame::deserialize(data).map(|frame| frame.datagram)
    }

    pub fn is_reliable(&self) -> bool {
        matches!(self, Datagram::Reliable { .. })
    }
}
