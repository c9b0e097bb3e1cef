pub mod config;
pub mod extract;
pub mod game_syncer;
pub mod pacer;
pub mod reference_sync;
pub mod sync_manager;

pub use config::SyncConfig;
pub use game_syncer::{BatchCounters, GameSyncer, StatsKind, SyncError, SyncOutcome};
pub use pacer::{Pacer, PacerConfig};
pub use reference_sync::{ReferenceSyncError, ReferenceSyncer};
pub use sync_manager::{PhaseReport, SegmentReport, SyncManager, SyncPassReport};
