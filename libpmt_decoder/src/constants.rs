//! Constants describing the raw PMT fragment record format.
//!
//! A record is a little-endian byte stream: a 4 byte preamble (fragment ID,
//! channel count) followed by a 4 word digitizer event header and the packed
//! 16-bit sample payload. The event size field counts 32-bit words and
//! includes the header words themselves.

/// Size of the record preamble (fragment ID + channel count) in bytes
pub const PREAMBLE_SIZE_BYTES: usize = 4;
/// Size of the digitizer event header in 32-bit words
pub const HEADER_SIZE_WORDS: u32 = 4;
/// Size of the digitizer event header in bytes
pub const HEADER_SIZE_BYTES: usize = 16;
/// Number of bytes in a 32-bit word
pub const WORD_SIZE_BYTES: usize = 4;
/// Number of bytes in a single ADC sample
pub const SAMPLE_SIZE_BYTES: usize = 2;

/// Expected marker nibble in the first header word
pub const EXPECTED_HEADER_MARKER: u32 = 0xA;
/// Shift to the marker nibble of the first header word
pub const HEADER_MARKER_SHIFT: u32 = 28;
/// Mask for the event size field of the first header word
pub const EVENT_SIZE_MASK: u32 = 0x0FFF_FFFF;
/// Shift to the board ID field of the second header word
pub const BOARD_ID_SHIFT: u32 = 27;
/// Mask for the board ID field of the second header word (after shift)
pub const BOARD_ID_MASK: u32 = 0x1F;
/// Mask for the event counter field of the third header word
pub const EVENT_COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Mask reducing a full fragment ID to the effective ID used for channel lookup
pub const EFFECTIVE_ID_MASK: u32 = 0x0FFF;
