use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// A single digitizer board declared by the user. The name ties the entry to
/// the DAQ configuration; the fragment ID is only needed when the DAQ
/// configuration might not know this board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSetup {
    pub name: String,
    pub fragment_id: Option<u32>,
    #[serde(default)]
    pub trigger_delay_ns: f64,
}

/// Structure representing the application configuration. Contains pathing, run
/// information, the board setup list, and the decoding policy flags.
/// Configs are serializable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub fragment_path: PathBuf,
    pub output_path: PathBuf,
    pub board_config_path: Option<PathBuf>,
    pub channel_map_path: Option<PathBuf>,
    pub board_setup: Vec<BoardSetup>,
    pub diagnostic_output: bool,
    pub require_known_boards: bool,
    pub require_board_config: bool,
    pub trigger_time_ns: f64,
    pub sampling_tick_ns: f64,
    pub log_category: String,
    pub first_run_number: i32,
    pub last_run_number: i32,
    pub n_threads: i32,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            fragment_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            board_config_path: None,
            channel_map_path: None,
            board_setup: vec![BoardSetup {
                name: String::from("pmtboard01"),
                fragment_id: Some(0x2000),
                trigger_delay_ns: 0.0,
            }],
            diagnostic_output: false,
            require_known_boards: true,
            require_board_config: true,
            trigger_time_ns: 0.0,
            sampling_tick_ns: 2.0,
            log_category: String::from("PMTDecoder"),
            first_run_number: 0,
            last_run_number: 0,
            n_threads: 1,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check if a specific run exists by evaluating the existance of the raw fragment data
    pub fn does_run_exist(&self, run_number: i32) -> bool {
        let run_dir: PathBuf = self.fragment_path.join(self.get_run_str(run_number));
        run_dir.exists()
    }

    /// Get the path to the directory of raw fragment files for a run
    pub fn get_run_directory(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        let run_dir: PathBuf = self.fragment_path.join(self.get_run_str(run_number));
        if run_dir.exists() {
            Ok(run_dir)
        } else {
            Err(ConfigError::BadFilePath(run_dir))
        }
    }

    /// Get the path to the DAQ board configuration snapshot for a run.
    /// Returns None when no snapshot directory is configured; a configured
    /// directory with no snapshot for the run is an error, not a silent
    /// fallback to uncorrected timestamps.
    pub fn get_board_config_file(&self, run_number: i32) -> Result<Option<PathBuf>, ConfigError> {
        let Some(config_dir) = self.board_config_path.as_ref() else {
            return Ok(None);
        };
        let config_file: PathBuf = config_dir.join(format!("{}.yml", self.get_run_str(run_number)));
        if config_file.exists() {
            Ok(Some(config_file))
        } else {
            Err(ConfigError::BadFilePath(config_file))
        }
    }

    /// Get the path to the output waveform file for a run
    pub fn get_output_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        let output_file_path: PathBuf = self
            .output_path
            .join(format!("{}.pwf", self.get_run_str(run_number)));
        if self.output_path.exists() {
            Ok(output_file_path)
        } else {
            Err(ConfigError::BadFilePath(self.output_path.clone()))
        }
    }

    /// Construct the run string using the DAQ directory format
    fn get_run_str(&self, run_number: i32) -> String {
        format!("run_{run_number:0>4}")
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }
}
