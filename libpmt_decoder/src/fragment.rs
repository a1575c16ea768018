use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

use super::constants::*;
use super::error::FragmentError;

/// The preamble and digitizer header words at the front of a raw record
#[derive(Debug, Clone)]
pub struct FragmentHeader {
    pub fragment_id: u32,
    pub n_channels: u16,
    pub event_size_words: u32,
    pub board_id: u8,
    pub event_counter: u32,
    pub trigger_time_tag: u32,
}

impl FragmentHeader {
    /// Parse the header from the front of a record buffer
    pub fn from_buffer(buf: &[u8]) -> Result<Self, FragmentError> {
        let mut cursor = Cursor::new(buf);
        let fragment_id = cursor.read_u16::<LittleEndian>()? as u32;
        let n_channels = cursor.read_u16::<LittleEndian>()?;
        let word0 = cursor.read_u32::<LittleEndian>()?;
        let word1 = cursor.read_u32::<LittleEndian>()?;
        let word2 = cursor.read_u32::<LittleEndian>()?;
        let trigger_time_tag = cursor.read_u32::<LittleEndian>()?;

        let marker = word0 >> HEADER_MARKER_SHIFT;
        if marker != EXPECTED_HEADER_MARKER {
            return Err(FragmentError::IncorrectMarker(marker));
        }

        Ok(Self {
            fragment_id,
            n_channels,
            event_size_words: word0 & EVENT_SIZE_MASK,
            board_id: ((word1 >> BOARD_ID_SHIFT) & BOARD_ID_MASK) as u8,
            event_counter: word2 & EVENT_COUNTER_MASK,
            trigger_time_tag,
        })
    }

    /// Total size in bytes of the record this header begins
    pub fn record_size_bytes(&self) -> usize {
        PREAMBLE_SIZE_BYTES + self.event_size_words as usize * WORD_SIZE_BYTES
    }
}

/// Determine the total record size from the first eight bytes of a record
/// (preamble plus the first header word). Used to frame records in a stream.
pub fn record_size_from_prefix(prefix: &[u8]) -> Result<usize, FragmentError> {
    let mut cursor = Cursor::new(prefix);
    let _fragment_id = cursor.read_u16::<LittleEndian>()?;
    let _n_channels = cursor.read_u16::<LittleEndian>()?;
    let word0 = cursor.read_u32::<LittleEndian>()?;

    let marker = word0 >> HEADER_MARKER_SHIFT;
    if marker != EXPECTED_HEADER_MARKER {
        return Err(FragmentError::IncorrectMarker(marker));
    }
    let event_size_words = word0 & EVENT_SIZE_MASK;
    if event_size_words < HEADER_SIZE_WORDS {
        return Err(FragmentError::IncorrectEventSize(event_size_words));
    }
    Ok(PREAMBLE_SIZE_BYTES + event_size_words as usize * WORD_SIZE_BYTES)
}

/// A parsed view of one raw record. The payload is borrowed from the record
/// buffer for the duration of one decode call; samples are only copied out
/// per mapped channel.
#[derive(Debug)]
pub struct PmtFragment<'a> {
    pub header: FragmentHeader,
    pub samples_per_channel: u32,
    payload: &'a [u8],
}

impl<'a> PmtFragment<'a> {
    /// Parse a complete raw record. The event size field must describe the
    /// buffer exactly and the payload must divide evenly across the channels
    /// the board digitized; anything else is a malformed record.
    pub fn parse(buf: &'a [u8]) -> Result<Self, FragmentError> {
        let header = FragmentHeader::from_buffer(buf)?;

        if header.event_size_words < HEADER_SIZE_WORDS {
            return Err(FragmentError::IncorrectEventSize(header.event_size_words));
        }
        let expected_bytes = header.record_size_bytes();
        if buf.len() != expected_bytes {
            return Err(FragmentError::IncorrectFragmentSize(buf.len(), expected_bytes));
        }
        if header.n_channels == 0 {
            return Err(FragmentError::NoChannels);
        }

        let data_words = header.event_size_words - HEADER_SIZE_WORDS;
        let total_samples = data_words * (WORD_SIZE_BYTES / SAMPLE_SIZE_BYTES) as u32;
        if total_samples % header.n_channels as u32 != 0 {
            return Err(FragmentError::UnevenSampleDivision(
                total_samples,
                header.n_channels,
            ));
        }
        let samples_per_channel = total_samples / header.n_channels as u32;
        let payload = &buf[PREAMBLE_SIZE_BYTES + HEADER_SIZE_BYTES..];

        Ok(Self {
            header,
            samples_per_channel,
            payload,
        })
    }

    /// The fragment ID reduced to the value used for channel map lookup
    pub fn effective_fragment_id(&self) -> u32 {
        self.header.fragment_id & EFFECTIVE_ID_MASK
    }

    /// Copy out the sample sequence digitized by one board channel. Returns
    /// None when the channel index falls outside the payload.
    pub fn channel_samples(&self, digitizer_channel: usize) -> Option<Vec<u16>> {
        let channel_bytes = self.samples_per_channel as usize * SAMPLE_SIZE_BYTES;
        let start = digitizer_channel * channel_bytes;
        let bytes = self.payload.get(start..start + channel_bytes)?;
        let mut samples = vec![0u16; self.samples_per_channel as usize];
        LittleEndian::read_u16_into(bytes, &mut samples);
        Some(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u32(buf: &mut Vec<u8>, value: u32) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    fn push_u16(buf: &mut Vec<u8>, value: u16) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Build a complete raw record; the sample count must fill whole words
    fn make_fragment(
        fragment_id: u16,
        n_channels: u16,
        event_counter: u32,
        trigger_time_tag: u32,
        samples: &[u16],
    ) -> Vec<u8> {
        assert!(samples.len() % 2 == 0);
        let event_size = HEADER_SIZE_WORDS + (samples.len() / 2) as u32;

        let mut buf = Vec::new();
        push_u16(&mut buf, fragment_id);
        push_u16(&mut buf, n_channels);
        push_u32(&mut buf, (EXPECTED_HEADER_MARKER << HEADER_MARKER_SHIFT) | event_size);
        push_u32(&mut buf, 3 << BOARD_ID_SHIFT);
        push_u32(&mut buf, event_counter & EVENT_COUNTER_MASK);
        push_u32(&mut buf, trigger_time_tag);
        for sample in samples {
            push_u16(&mut buf, *sample);
        }
        buf
    }

    #[test]
    fn test_parse_fields() {
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 2, 42, 0xDEAD_BEEF, &samples);
        let fragment = PmtFragment::parse(&buf).expect("Fragment should parse");

        assert_eq!(fragment.header.fragment_id, 0x2001);
        assert_eq!(fragment.effective_fragment_id(), 0x001);
        assert_eq!(fragment.header.n_channels, 2);
        assert_eq!(fragment.header.event_size_words, 8);
        assert_eq!(fragment.header.board_id, 3);
        assert_eq!(fragment.header.event_counter, 42);
        assert_eq!(fragment.header.trigger_time_tag, 0xDEAD_BEEF);
        assert_eq!(fragment.samples_per_channel, 4);
    }

    #[test]
    fn test_channel_samples() {
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 2, 0, 0, &samples);
        let fragment = PmtFragment::parse(&buf).expect("Fragment should parse");

        assert_eq!(fragment.channel_samples(0), Some(vec![1, 2, 3, 4]));
        assert_eq!(fragment.channel_samples(1), Some(vec![5, 6, 7, 8]));
        assert_eq!(fragment.channel_samples(2), None);
    }

    #[test]
    fn test_parse_incorrect_marker() {
        let samples: Vec<u16> = (1..=8).collect();
        let mut buf = make_fragment(0x2001, 2, 0, 0, &samples);
        // Stamp a bad marker nibble over word 0
        let bad_word0 = (0xB_u32 << HEADER_MARKER_SHIFT) | 8;
        buf[4..8].copy_from_slice(&bad_word0.to_le_bytes());

        let result = PmtFragment::parse(&buf);
        assert!(matches!(result, Err(FragmentError::IncorrectMarker(0xB))));
    }

    #[test]
    fn test_parse_short_buffer() {
        let buf = vec![0u8; 10];
        let result = PmtFragment::parse(&buf);
        assert!(matches!(result, Err(FragmentError::IOError(_))));
    }

    #[test]
    fn test_parse_size_mismatch() {
        let samples: Vec<u16> = (1..=8).collect();
        let mut buf = make_fragment(0x2001, 2, 0, 0, &samples);
        buf.pop();
        let result = PmtFragment::parse(&buf);
        assert!(matches!(
            result,
            Err(FragmentError::IncorrectFragmentSize(35, 36))
        ));
    }

    #[test]
    fn test_parse_event_size_too_small() {
        let mut buf = Vec::new();
        push_u16(&mut buf, 0x2001);
        push_u16(&mut buf, 2);
        push_u32(&mut buf, (EXPECTED_HEADER_MARKER << HEADER_MARKER_SHIFT) | 2);
        push_u32(&mut buf, 0);
        push_u32(&mut buf, 0);
        push_u32(&mut buf, 0);
        let result = PmtFragment::parse(&buf);
        assert!(matches!(result, Err(FragmentError::IncorrectEventSize(2))));
    }

    #[test]
    fn test_parse_uneven_division() {
        // 8 samples cannot be divided across 3 channels
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 3, 0, 0, &samples);
        let result = PmtFragment::parse(&buf);
        assert!(matches!(
            result,
            Err(FragmentError::UnevenSampleDivision(8, 3))
        ));
    }

    #[test]
    fn test_parse_zero_channels() {
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 0, 0, 0, &samples);
        let result = PmtFragment::parse(&buf);
        assert!(matches!(result, Err(FragmentError::NoChannels)));
    }

    #[test]
    fn test_record_size_from_prefix() {
        let samples: Vec<u16> = (1..=8).collect();
        let buf = make_fragment(0x2001, 2, 0, 0, &samples);
        let size = record_size_from_prefix(&buf[..8]).expect("Prefix should parse");
        assert_eq!(size, buf.len());
    }

    #[test]
    fn test_record_size_bad_prefix() {
        let prefix = vec![0u8; 8];
        let result = record_size_from_prefix(&prefix);
        assert!(matches!(result, Err(FragmentError::IncorrectMarker(0))));
    }
}
