use std::fs::File;
use std::io::Read;
use std::path::Path;

use fxhash::FxHashMap;

use super::error::ChannelMapError;

const ENTRIES_PER_LINE: usize = 3; //Number of elements in a single row in the CSV file

/// Load the default map for windows
#[cfg(target_family = "windows")]
fn load_default_map() -> String {
    String::from(include_str!("data\\default_channel_map.csv"))
}

/// Load the default map for macos and linux
#[cfg(target_family = "unix")]
fn load_default_map() -> String {
    String::from(include_str!("data/default_channel_map.csv"))
}

/// The lookup the decoding engine needs from a channel map: which PMT channel
/// IDs a board serves, keyed by effective fragment ID. A board missing from
/// the map is reported as None, not an error; the caller decides the policy.
pub trait ChannelLookup {
    /// The (digitizer channel, PMT channel ID) pairs for a board
    fn board_channels(&self, effective_fragment_id: u32) -> Option<&[(usize, u32)]>;
}

/// ChannelMap contains the mapping of digitizer board channels to the PMT channel
/// numbering used downstream.
///
/// This can change from experiment to experiment, so ChannelMap reads in a CSV file
/// where each row contains 3 elements: the effective fragment ID of the board, the
/// board channel index, and the PMT channel ID. Pairs keep the file order per board,
/// which fixes the emission order within a fragment.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    map: FxHashMap<u32, Vec<(usize, u32)>>,
}

impl ChannelMap {
    /// Create a new ChannelMap
    /// If the path is None, we load the default that is bundled with the decoder
    pub fn new(path: Option<&Path>) -> Result<Self, ChannelMapError> {
        let mut contents = String::new();
        if let Some(p) = path {
            let mut file = File::open(p)?;
            file.read_to_string(&mut contents)?;
        } else {
            contents = load_default_map();
        }
        Self::from_csv(&contents)
    }

    fn from_csv(contents: &str) -> Result<Self, ChannelMapError> {
        let mut cm = ChannelMap::default();

        let mut lines = contents.lines();
        lines.next(); // Skip the header
        for line in lines {
            let entries: Vec<&str> = line.split_terminator(",").collect();
            if entries.len() != ENTRIES_PER_LINE {
                return Err(ChannelMapError::BadFileFormat);
            }

            let fragment_id: u32 = entries[0].parse()?;
            let digitizer_channel: usize = entries[1].parse()?;
            let pmt_channel: u32 = entries[2].parse()?;

            cm.map
                .entry(fragment_id)
                .or_default()
                .push((digitizer_channel, pmt_channel));
        }

        Ok(cm)
    }

    /// Number of boards in the map
    pub fn n_boards(&self) -> usize {
        self.map.len()
    }
}

impl ChannelLookup for ChannelMap {
    fn board_channels(&self, effective_fragment_id: u32) -> Option<&[(usize, u32)]> {
        self.map
            .get(&effective_fragment_id)
            .map(|pairs| pairs.as_slice())
    }
}
