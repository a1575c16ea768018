use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::ConfigError;

/// Readout settings of a single digitizer board as recorded by the DAQ at run
/// start. The buffer length is in samples; the post trigger fraction is the
/// portion of the buffer recorded after the trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    pub board_name: String,
    pub fragment_id: u32,
    pub buffer_length: u32,
    pub post_trigger_frac: f32,
}

impl BoardConfig {
    /// Duration of the pre trigger portion of the readout buffer in nanoseconds
    pub fn pre_trigger_ns(&self, sampling_tick_ns: f64) -> f64 {
        self.buffer_length as f64 * (1.0 - self.post_trigger_frac as f64) * sampling_tick_ns
    }
}

/// The DAQ configuration snapshot written alongside a run. May legitimately
/// not exist for a run; decoding then proceeds without pre trigger corrections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaqConfig {
    pub boards: Vec<BoardConfig>,
}

impl DaqConfig {
    /// Read a DAQ configuration snapshot from a YAML file
    pub fn read_snapshot_file(snapshot_path: &Path) -> Result<Self, ConfigError> {
        if !snapshot_path.exists() {
            return Err(ConfigError::BadFilePath(snapshot_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(snapshot_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }
}
