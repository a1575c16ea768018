use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::constants::{PREAMBLE_SIZE_BYTES, WORD_SIZE_BYTES};
use super::error::{FragmentFileError, FragmentStackError};
use super::fragment::record_size_from_prefix;

/// Size of the leading chunk needed to frame a record in a byte stream
const RECORD_PREFIX_BYTES: usize = PREAMBLE_SIZE_BYTES + WORD_SIZE_BYTES;

/// A single .frag file of concatenated raw records. Records carry their own
/// length in the first header word, so reading is framing the record from its
/// first eight bytes and then pulling the remainder.
#[derive(Debug)]
pub struct FragmentFile {
    reader: BufReader<File>,
    size_bytes: u64,
    read_bytes: u64,
}

impl FragmentFile {
    pub fn new(path: &Path) -> Result<Self, FragmentFileError> {
        if !path.exists() {
            return Err(FragmentFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            size_bytes,
            read_bytes: 0,
        })
    }

    pub fn is_eof(&self) -> bool {
        self.read_bytes >= self.size_bytes
    }

    /// Read the next raw record out of the file
    pub fn get_next_record(&mut self) -> Result<Vec<u8>, FragmentFileError> {
        if self.is_eof() {
            return Err(FragmentFileError::EndOfFile);
        }

        let mut record = vec![0u8; RECORD_PREFIX_BYTES];
        self.reader.read_exact(&mut record)?;
        let record_size = record_size_from_prefix(&record)?;
        record.resize(record_size, 0);
        self.reader.read_exact(&mut record[RECORD_PREFIX_BYTES..])?;
        self.read_bytes += record_size as u64;
        Ok(record)
    }
}

/// The collection of all .frag files associated with a given run. The DAQ
/// splits the fragment stream over multiple files, so the stack walks them in
/// name order as one continuous record sequence.
#[derive(Debug)]
pub struct FragmentStack {
    file_stack: VecDeque<PathBuf>,
    all_files: Vec<PathBuf>,
    active_file: FragmentFile,
    total_stack_size_bytes: u64,
    is_ended: bool,
}

impl FragmentStack {
    /// Create a new FragmentStack for a given run directory
    pub fn new(path: &Path) -> Result<Self, FragmentStackError> {
        let (mut stack, bytes) = Self::get_file_stack(path)?;
        let all_files: Vec<PathBuf> = stack.iter().cloned().collect();
        if let Some(file_path) = stack.pop_front() {
            Ok(FragmentStack {
                file_stack: stack,
                all_files,
                active_file: FragmentFile::new(&file_path)?,
                total_stack_size_bytes: bytes,
                is_ended: false,
            })
        } else {
            Err(FragmentStackError::NoMatchingFiles)
        }
    }

    /// Every file of the run in read order, kept for bookkeeping
    pub fn get_file_list(&self) -> &[PathBuf] {
        &self.all_files
    }

    pub fn get_total_stack_size(&self) -> &u64 {
        &self.total_stack_size_bytes
    }

    /// Get the next raw record in the file stack
    ///
    /// Returns a `Result<Option<Vec<u8>>>`. The Option is None if the stack
    /// has no more data.
    pub fn get_next_fragment(&mut self) -> Result<Option<Vec<u8>>, FragmentStackError> {
        loop {
            if self.is_ended {
                return Ok(None);
            }

            match self.active_file.get_next_record() {
                Ok(record) => return Ok(Some(record)),
                Err(FragmentFileError::EndOfFile) => {
                    self.move_to_next_file()?;
                }
                Err(e) => return Err(FragmentStackError::FileError(e)),
            };
        }
    }

    /// Get all of the associated .frag files and put them in the stack
    fn get_file_stack(parent_path: &Path) -> Result<(VecDeque<PathBuf>, u64), FragmentStackError> {
        let mut file_list: Vec<PathBuf> = Vec::new();
        let start_pattern = "pmt";
        let end_pattern = ".frag";
        for item in parent_path.read_dir()? {
            let item_path = item?.path();
            let item_path_str = item_path.to_string_lossy();
            if item_path_str.contains(start_pattern) && item_path_str.contains(end_pattern) {
                file_list.push(item_path);
            }
        }

        if file_list.is_empty() {
            return Err(FragmentStackError::NoMatchingFiles);
        }

        let mut total_stack_size_bytes = 0;
        for path in file_list.iter() {
            total_stack_size_bytes += path.metadata()?.len();
        }

        file_list.sort(); // Can sort standard. The only change should be the number at the tail.
        let stack = file_list.into();

        Ok((stack, total_stack_size_bytes))
    }

    ///Move to the next file in the stack
    fn move_to_next_file(&mut self) -> Result<(), FragmentStackError> {
        loop {
            if let Some(next_file_path) = self.file_stack.pop_front() {
                let next_file = FragmentFile::new(&next_file_path)?;
                if !next_file.is_eof() {
                    self.active_file = next_file;
                    return Ok(());
                }
            } else {
                self.is_ended = true;
                return Ok(());
            }
        }
    }
}
