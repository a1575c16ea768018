use super::error::WriterError;

/// One decoded optical waveform: the contiguous samples one PMT produced for
/// one event, stamped with the absolute start time of the first sample on the
/// electronics time scale. Start times can be negative.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub start_time_ns: f64,
    pub channel: u32,
    pub samples: Vec<u16>,
}

impl Waveform {
    pub fn new(start_time_ns: f64, channel: u32, samples: Vec<u16>) -> Self {
        Self {
            start_time_ns,
            channel,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Destination for completed events. Each finalized event is handed over
/// exactly once, with its waveforms sorted by channel.
pub trait WaveformStore {
    fn publish(&mut self, event_id: u32, waveforms: Vec<Waveform>) -> Result<(), WriterError>;
}
