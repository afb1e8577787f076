//! Shared sync state types.

use crate::models::Table;

/// Phase of the sync engine, published to observers through a watch channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Pulling(Table),
    Detecting(Table),
    Applying(Table),
    /// Pass finished with conflicts left open
    AwaitingResolution,
}

impl SyncPhase {
    /// Whether a pass is currently running
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Pulling(_) | Self::Detecting(_) | Self::Applying(_)
        )
    }
}
