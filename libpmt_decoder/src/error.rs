use std::path::PathBuf;
use thiserror::Error;

use super::constants::*;
use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum BoardDatabaseError {
    #[error("Conflicting fragment IDs for board {0}; setup declares {1} but DAQ configuration declares {2}")]
    ConfigConflict(String, u32, u32),
    #[error("Board {0} has no entry in the DAQ configuration and board configuration is required")]
    MissingBoardConfig(String),
    #[error("Boards {0} and {1} resolved to the same fragment ID {2}")]
    DuplicateFragmentId(String, String, u32),
}

#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("Failed to parse buffer into PmtFragment: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Incorrect header marker {0:#x} found for PmtFragment; expected {exp:#x}", exp=EXPECTED_HEADER_MARKER)]
    IncorrectMarker(u32),
    #[error("Incorrect event size {0} words found for PmtFragment; header alone is {size} words", size=HEADER_SIZE_WORDS)]
    IncorrectEventSize(u32),
    #[error("Incorrect buffer size {0} found for PmtFragment; expected {1}")]
    IncorrectFragmentSize(usize, usize),
    #[error("PmtFragment declares zero channels")]
    NoChannels,
    #[error("PmtFragment payload of {0} samples does not divide evenly across {1} channels")]
    UnevenSampleDivision(u32, u16),
}

#[derive(Debug, Error)]
pub enum ChannelMapError {
    #[error("ChannelMap failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("ChannelMap failed to parse an integer: {0}")]
    ParsingError(#[from] std::num::ParseIntError),
    #[error("ChannelMap was given a file with the incorrect format; most likely the number of columns is incorrect")]
    BadFileFormat,
}

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("PmtDecoder failed to parse a fragment: {0}")]
    BadFragment(#[from] FragmentError),
    #[error("PmtDecoder received fragment ID {0} which matches no known board")]
    UnknownBoard(u32),
    #[error("PmtDecoder failed due a fragment that was out of order -- fragment event ID: {0} current event ID: {1}")]
    EventOutOfOrder(u32, u32),
}

#[derive(Debug, Error)]
pub enum FragmentFileError {
    #[error("Error when parsing record from FragmentFile: {0}")]
    BadRecord(#[from] FragmentError),
    #[error("Could not open FragmentFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Reached end of FragmentFile")]
    EndOfFile,
    #[error("FragmentFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum FragmentStackError {
    #[error("FragmentStack failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("FragmentStack did not find any matching files in the fragment directory")]
    NoMatchingFiles,
    #[error("FragmentStack failed due to FragmentFile error: {0}")]
    FileError(#[from] FragmentFileError),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("WaveformWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("WaveformWriter failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Waveform file magic does not match; file is not a waveform file")]
    BadMagic,
    #[error("Waveform file footer magic does not match; file is truncated or corrupted")]
    BadFooterMagic,
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to BoardDatabase error: {0}")]
    DatabaseError(#[from] BoardDatabaseError),
    #[error("Processor failed due to ChannelMap error: {0}")]
    MapError(#[from] ChannelMapError),
    #[error("Processor failed due to PmtDecoder error: {0}")]
    DecoderError(#[from] DecoderError),
    #[error("Processor failed due to FragmentStack error: {0}")]
    StackError(#[from] FragmentStackError),
    #[error("Processor failed due to WaveformWriter error: {0}")]
    WriterError(#[from] WriterError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
