use crate::error::{Error, Result};
use crate::pruning::PruningStrategy;
use crate::scores::Score;

/// Tunables shared by the manager and the reference backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignerConfig {
    /// Rows per block for uniform tiling.
    ///
    /// **Default**: `64`
    pub block_height: usize,

    /// Columns per block for uniform tiling.
    ///
    /// **Default**: `64`
    pub block_width: usize,

    /// Smallest block side produced when a partition is split into a
    /// requested number of blocks.
    ///
    /// **Default**: `16`
    pub min_block_size: usize,

    /// Capacity of the best score list.
    ///
    /// **Default**: `16`
    pub best_list_size: usize,

    /// Scores below this are never kept in the best score list.
    ///
    /// **Default**: `1`
    pub best_min_score: Score,

    /// How blocks are pruned.
    ///
    /// **Default**: [`PruningStrategy::Generic`]
    pub pruning: PruningStrategy,

    /// Dispatch every `n`-th interior row, e.g. to save rows for a later
    /// traceback stage.
    ///
    /// **Default**: `None`
    pub special_row_interval: Option<usize>,

    /// Chunks buffered by a streaming boundary before writers block.
    ///
    /// **Default**: `16`
    pub channel_capacity: usize
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            block_height: 64,
            block_width: 64,
            min_block_size: 16,
            best_list_size: 16,
            best_min_score: 1,
            pruning: PruningStrategy::Generic,
            special_row_interval: None,
            channel_capacity: 16
        }
    }
}

impl AlignerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_height == 0 || self.block_width == 0 {
            return Err(Error::InvalidConfig(format!(
                        "block size {}x{} must be non-zero", self.block_height, self.block_width)));
        }
        if self.min_block_size == 0 {
            return Err(Error::InvalidConfig("min_block_size must be non-zero".to_string()));
        }
        if self.best_list_size == 0 {
            return Err(Error::InvalidConfig("best_list_size must be non-zero".to_string()));
        }
        if self.special_row_interval == Some(0) {
            return Err(Error::InvalidConfig("special_row_interval must be non-zero".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::InvalidConfig("channel_capacity must be non-zero".to_string()));
        }
        Ok(())
    }
}
