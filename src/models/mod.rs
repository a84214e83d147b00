// Domain models shared by the sampler, pipeline and channel

mod host;
mod repair;
mod vitals;

pub use host::{LocalHostFacts, PcInfoSnapshot, SystemQuery, merge_pc_info};
pub use repair::{
    RepairStage, ScanReport, StageReport, StageState, SupportTicket, ThreatRecord, UpdateRecord,
};
pub use vitals::{CpuTicks, MemoryReading, RamUsage, VitalsSnapshot, bytes_to_gb};
