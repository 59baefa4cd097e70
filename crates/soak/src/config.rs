use packet_archive::ArchiveConfig;

#[derive(Debug, Clone)]
pub struct SoakConfig {
    pub archive: ArchiveConfig,
    pub packets: u32,
    pub min_packet_size: usize,
    pub max_packet_size: usize,
    pub loss_percent: f32,
    pub request_delay_ticks: u32,
    pub seed: Option<u64>,
}
