//! Binary sink for decoded PMT waveforms.
//!
//! A run is written as one .pwf file: a fixed header, one block per event in
//! counter order, and a fixed footer whose totals and completion flag make
//! truncated files detectable. All integers are little endian. A YAML sidecar
//! beside the data file records which fragment files produced it.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::error::WriterError;
use super::fragment_file::FragmentStack;
use super::waveform::{Waveform, WaveformStore};

/// Magic bytes opening a waveform file
pub const FILE_MAGIC: [u8; 8] = *b"PMTDEC01";

/// Current file format version
pub const FORMAT_VERSION: u32 = 1;

/// Footer magic bytes (different from header to detect truncation)
pub const FOOTER_MAGIC: [u8; 8] = *b"PMTEND01";

/// Fixed footer size in bytes
pub const FOOTER_SIZE: usize = 32;

/// Leading block of a waveform file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileHeader {
    pub version: u32,
    pub run_number: i32,
}

impl FileHeader {
    pub fn new(run_number: i32) -> Self {
        Self {
            version: FORMAT_VERSION,
            run_number,
        }
    }

    /// Write the header to a writer, magic first
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WriterError> {
        writer.write_all(&FILE_MAGIC)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_i32::<LittleEndian>(self.run_number)?;
        Ok(())
    }

    /// Read the header from a reader, validating the magic
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, WriterError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if magic != FILE_MAGIC {
            return Err(WriterError::BadMagic);
        }
        Ok(Self {
            version: reader.read_u32::<LittleEndian>()?,
            run_number: reader.read_i32::<LittleEndian>()?,
        })
    }
}

/// Trailing block of a waveform file.
///
/// Fixed size so readers can seek to it directly. A file missing the footer
/// or carrying a zero completion flag did not survive its run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileFooter {
    pub total_events: u64,
    pub total_waveforms: u64,
    pub write_complete: u8,
}

impl Default for FileFooter {
    fn default() -> Self {
        Self::new()
    }
}

impl FileFooter {
    pub fn new() -> Self {
        Self {
            total_events: 0,
            total_waveforms: 0,
            write_complete: 0,
        }
    }

    /// Mark the file as completely written
    pub fn finalize(&mut self) {
        self.write_complete = 1;
    }

    pub fn is_complete(&self) -> bool {
        self.write_complete == 1
    }

    /// Serialize the footer to its fixed byte array
    pub fn to_bytes(&self) -> [u8; FOOTER_SIZE] {
        let mut buf = [0u8; FOOTER_SIZE];
        buf[0..8].copy_from_slice(&FOOTER_MAGIC);
        buf[8..16].copy_from_slice(&self.total_events.to_le_bytes());
        buf[16..24].copy_from_slice(&self.total_waveforms.to_le_bytes());
        buf[24] = self.write_complete;
        // Remaining bytes reserved, already zeroed
        buf
    }

    /// Deserialize the footer from its fixed byte array
    pub fn from_bytes(data: &[u8; FOOTER_SIZE]) -> Result<Self, WriterError> {
        if data[0..8] != FOOTER_MAGIC {
            return Err(WriterError::BadFooterMagic);
        }
        let mut cursor = Cursor::new(&data[8..]);
        Ok(Self {
            total_events: cursor.read_u64::<LittleEndian>()?,
            total_waveforms: cursor.read_u64::<LittleEndian>()?,
            write_complete: cursor.read_u8()?,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WriterError> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, WriterError> {
        let mut buf = [0u8; FOOTER_SIZE];
        reader.read_exact(&mut buf)?;
        Self::from_bytes(&buf)
    }
}

/// Append one event block: event id, waveform count, then each waveform as
/// start time, PMT channel, sample count, raw samples
pub fn write_event<W: Write>(
    writer: &mut W,
    event_id: u32,
    waveforms: &[Waveform],
) -> Result<(), WriterError> {
    writer.write_u32::<LittleEndian>(event_id)?;
    writer.write_u32::<LittleEndian>(waveforms.len() as u32)?;
    for wave in waveforms {
        writer.write_f64::<LittleEndian>(wave.start_time_ns)?;
        writer.write_u32::<LittleEndian>(wave.channel)?;
        writer.write_u32::<LittleEndian>(wave.samples.len() as u32)?;
        for sample in wave.samples.iter() {
            writer.write_u16::<LittleEndian>(*sample)?;
        }
    }
    Ok(())
}

/// Read back one event block
pub fn read_event<R: Read>(reader: &mut R) -> Result<(u32, Vec<Waveform>), WriterError> {
    let event_id = reader.read_u32::<LittleEndian>()?;
    let n_waveforms = reader.read_u32::<LittleEndian>()?;
    let mut waveforms = Vec::with_capacity(n_waveforms as usize);
    for _ in 0..n_waveforms {
        let start_time_ns = reader.read_f64::<LittleEndian>()?;
        let channel = reader.read_u32::<LittleEndian>()?;
        let n_samples = reader.read_u32::<LittleEndian>()? as usize;
        let mut samples = vec![0u16; n_samples];
        reader.read_u16_into::<LittleEndian>(&mut samples)?;
        waveforms.push(Waveform::new(start_time_ns, channel, samples));
    }
    Ok((event_id, waveforms))
}

/// Writes the decoded events of one run to its .pwf file, tracking the totals
/// that land in the footer
#[derive(Debug)]
pub struct WaveformWriter {
    writer: BufWriter<File>,
    sidecar_path: PathBuf,
    footer: FileFooter,
}

impl WaveformWriter {
    /// Create the writer, opening a file at path and writing the header
    pub fn new(path: &Path, run_number: i32) -> Result<Self, WriterError> {
        let sidecar_path = path.with_extension("yml");
        let mut writer = BufWriter::new(File::create(path)?);
        FileHeader::new(run_number).write_to(&mut writer)?;
        Ok(Self {
            writer,
            sidecar_path,
            footer: FileFooter::new(),
        })
    }

    /// Write fragment file information in a separate yaml file
    pub fn write_fileinfo(&self, stack: &FragmentStack) -> Result<(), WriterError> {
        let files = stack.get_file_list();
        let mut file_map = BTreeMap::<String, Vec<String>>::new();
        let mut file_list = Vec::<String>::new();
        file_list.resize(files.len(), String::from(""));
        let mut size_list = file_list.clone();
        for (row, path) in files.iter().enumerate() {
            size_list[row] = human_bytes::human_bytes(path.metadata()?.len() as f64);
            file_list[row] = String::from(path.to_string_lossy());
        }
        file_map.insert(String::from("fragment_file_names"), file_list);
        file_map.insert(String::from("fragment_file_sizes"), size_list);

        let mut parent_file = std::fs::File::create(&self.sidecar_path)?;
        parent_file.write_all(serde_yaml::to_string(&file_map)?.as_bytes())?;

        Ok(())
    }

    /// Write the footer and flush, consume the writer
    pub fn close(mut self) -> Result<(), WriterError> {
        self.footer.finalize();
        self.footer.write_to(&mut self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl WaveformStore for WaveformWriter {
    fn publish(&mut self, event_id: u32, waveforms: Vec<Waveform>) -> Result<(), WriterError> {
        write_event(&mut self.writer, event_id, &waveforms)?;
        self.footer.total_events += 1;
        self.footer.total_waveforms += waveforms.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pmt_decoder_{}_{}", tag, std::process::id()));
        if dir.exists() {
            std::fs::remove_dir_all(&dir).unwrap();
        }
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_header_round_trip() {
        let header = FileHeader::new(42);
        let mut buffer = Vec::new();
        header.write_to(&mut buffer).expect("Write should succeed");
        assert_eq!(buffer.len(), 16);

        let read_back =
            FileHeader::read_from(&mut Cursor::new(&buffer)).expect("Read should succeed");
        assert_eq!(read_back, header);
    }

    #[test]
    fn test_header_bad_magic() {
        let buffer = b"NOTPMTWF\x01\x00\x00\x00\x2a\x00\x00\x00";
        let result = FileHeader::read_from(&mut Cursor::new(&buffer[..]));
        assert!(matches!(result, Err(WriterError::BadMagic)));
    }

    #[test]
    fn test_footer_round_trip() {
        let mut footer = FileFooter::new();
        footer.total_events = 128;
        footer.total_waveforms = 4096;
        footer.finalize();

        let bytes = footer.to_bytes();
        let read_back = FileFooter::from_bytes(&bytes).expect("Footer should parse");
        assert_eq!(read_back, footer);
        assert!(read_back.is_complete());
    }

    #[test]
    fn test_footer_bad_magic() {
        let mut bytes = FileFooter::new().to_bytes();
        bytes[0] = b'X';
        let result = FileFooter::from_bytes(&bytes);
        assert!(matches!(result, Err(WriterError::BadFooterMagic)));
    }

    #[test]
    fn test_event_block_round_trip() {
        let waveforms = vec![
            Waveform::new(-1043.0, 101, vec![1, 2, 3, 4]),
            Waveform::new(-1043.0, 102, vec![5, 6, 7, 8]),
        ];
        let mut buffer = Vec::new();
        write_event(&mut buffer, 42, &waveforms).expect("Write should succeed");
        // 8 bytes of block header plus two waveforms of 16 + 8 bytes
        assert_eq!(buffer.len(), 56);

        let (event_id, read_back) =
            read_event(&mut Cursor::new(&buffer)).expect("Read should succeed");
        assert_eq!(event_id, 42);
        assert_eq!(read_back, waveforms);
    }

    #[test]
    fn test_file_write_and_read_back() {
        let dir = make_test_dir("writer_file");
        let path = dir.join("run_0001.pwf");

        let mut writer = WaveformWriter::new(&path, 1).expect("File should open");
        writer
            .publish(0, vec![Waveform::new(-1043.0, 101, vec![1, 2, 3, 4])])
            .expect("Publish should succeed");
        writer
            .publish(
                1,
                vec![
                    Waveform::new(-1043.0, 101, vec![5, 6]),
                    Waveform::new(-1000.0, 102, vec![7, 8]),
                ],
            )
            .expect("Publish should succeed");
        writer.close().expect("Close should succeed");

        let mut file = File::open(&path).unwrap();
        let header = FileHeader::read_from(&mut file).expect("Header should parse");
        assert_eq!(header.run_number, 1);
        assert_eq!(header.version, FORMAT_VERSION);

        let (event_id, waveforms) = read_event(&mut file).expect("First event should read");
        assert_eq!(event_id, 0);
        assert_eq!(waveforms, vec![Waveform::new(-1043.0, 101, vec![1, 2, 3, 4])]);
        let (event_id, waveforms) = read_event(&mut file).expect("Second event should read");
        assert_eq!(event_id, 1);
        assert_eq!(waveforms.len(), 2);

        let footer = FileFooter::read_from(&mut file).expect("Footer should parse");
        assert_eq!(footer.total_events, 2);
        assert_eq!(footer.total_waveforms, 3);
        assert!(footer.is_complete());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_fileinfo_sidecar() {
        let dir = make_test_dir("writer_sidecar");
        // Stack construction only stats the files, content is not read here
        std::fs::write(dir.join("pmt_run_0001_f000.frag"), vec![0u8; 36]).unwrap();

        let stack = FragmentStack::new(&dir).expect("Stack should build");
        let writer = WaveformWriter::new(&dir.join("run_0001.pwf"), 1).expect("File should open");
        writer
            .write_fileinfo(&stack)
            .expect("Sidecar should be written");

        let sidecar = std::fs::read_to_string(dir.join("run_0001.yml")).unwrap();
        assert!(sidecar.contains("fragment_file_names"));
        assert!(sidecar.contains("pmt_run_0001_f000.frag"));
        assert!(sidecar.contains("36 B"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
