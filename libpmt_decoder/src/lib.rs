//! # pmt_decoder
//!
//! pmt_decoder is a PMT waveform decoder, written in Rust. It takes data produced by
//! the PMT data acquisition in the form of .frag fragment files from CAEN V1730
//! digitizer boards, reconstructs the absolute start time of each readout window, and
//! writes the per-channel optical waveforms of every event to a compact binary
//! waveform format.
//!
//! ## Installation
//!
//! In the future we may depoly to crates.io, but currently the only method of install is
//! from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Platform Support
//!
//! pmt_decoder aims to support Linux, MacOS, and Windows. No system libraries are
//! required; everything is pulled in through cargo.
//!
//! ### Building & Install
//!
//! To build and install the CLI decoder use `cargo install --path ./pmt_decoder_cli` from
//! the top level pmt_decoder repository.
//!
//! The binary will be installed to your cargo install location (typically something
//! like `~/.cargo/bin/`). It can be uninstalled by running
//! `cargo uninstall pmt_decoder_cli`. Once it is installed, it will be in your
//! path, so you can simply invoke it from the command line.
//!
//! ## Configuration
//!
//! The decoder is driven by a YAML configuration file. A template can be generated with
//! `pmt_decoder_cli --path my_config.yml new`. The format is as follows:
//!
//! ```yml
//! fragment_path: None
//! output_path: None
//! board_config_path: null
//! channel_map_path: null
//! board_setup:
//! - name: pmtboard01
//!   fragment_id: 8192
//!   trigger_delay_ns: 0.0
//! diagnostic_output: false
//! require_known_boards: true
//! require_board_config: true
//! trigger_time_ns: 0.0
//! sampling_tick_ns: 2.0
//! log_category: PMTDecoder
//! first_run_number: 0
//! last_run_number: 0
//! n_threads: 1
//! ```
//!
//! - `fragment_path`: full path to a directory which contains the DAQ .frag structure
//! (i.e. contains subdirectories of the run_# format)
//! - `output_path`: full path to a directory to which decoded waveform (.pwf) files
//! will be written
//! - `board_config_path`: full path to a directory of per-run DAQ board configuration
//! snapshots (`run_#.yml`). If set to `null`, no pre trigger correction is applied.
//! - `channel_map_path`: full path to a CSV file mapping digitizer channels to PMT
//! channels. If set to `null`, the bundled default map is used.
//! - `board_setup`: one entry per digitizer board. The `name` ties the entry to the
//! DAQ board configuration, `fragment_id` is the ID the board stamps on its fragments
//! (only needed when the DAQ configuration might not know the board), and
//! `trigger_delay_ns` is the cable delay of the board's trigger input.
//! - `diagnostic_output`: when true, every fragment header is dumped to the log
//! - `require_known_boards`: when true, a fragment from a board with no setup entry
//! aborts the run; when false such fragments are decoded without corrections
//! - `require_board_config`: when true, a setup board missing from the DAQ board
//! configuration snapshot aborts the run
//! - `trigger_time_ns`: the reference trigger time of an event on the electronics
//! time scale
//! - `sampling_tick_ns`: duration of one digitizer sample
//! - First/Last Run Number: The run range to decode (inclusive)
//! - `n_threads`: The number of parallel worker threads to divide the runs amongst.
//! Each worker will get a subset of the run range. Must be at least 1.
//!
//! ### Channel Map Format
//!
//! The channel map is a CSV file with *no* whitespaces. The columns are as follows:
//!
//! ```csv
//! fragment,channel,pmt
//! ```
//!
//! The `fragment` column is the effective fragment ID of a board (the low twelve bits
//! of the full ID), `channel` is the digitizer channel on that board, and `pmt` is the
//! PMT channel the electronics are connected to.
//!
//! ## Output
//!
//! pmt_decoder will output three files per run: the decoded .pwf data file, a .yml
//! sidecar recording which fragment files went in, and a log file. Log files contain
//! valuable information about the status of the application while decoding the data.
//! If an error occurs, typically a warning will be printed to the terminal indicating
//! that the user should check the log file. It is not advised to delete the log files.
//!
//! ### Waveform Data Format
//!
//! The layout of a .pwf file is as follows, with all integers little endian:
//!
//! ```text
//! run_0001.pwf
//! header - magic PMTDEC01, format version (u32), run number (i32)
//! |---- event block (repeated, in counter order)
//! |    |---- event id (u32), waveform count (u32)
//! |    |---- waveform - start time ns (f64), PMT channel (u32), sample count (u32)
//! |    |    |---- samples (u16 * sample count)
//! footer - magic PMTEND01, total events (u64), total waveforms (u64), completion flag
//! ```
pub mod board_config;
pub mod board_db;
pub mod channel_map;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod error;
pub mod fragment;
pub mod fragment_file;
pub mod process;
pub mod waveform;
pub mod worker_status;
pub mod writer;
