use std::sync::mpsc::Sender;

use super::board_config::DaqConfig;
use super::board_db::BoardDatabase;
use super::channel_map::ChannelMap;
use super::config::Config;
use super::decoder::PmtDecoder;
use super::error::ProcessorError;
use super::fragment_file::FragmentStack;
use super::waveform::WaveformStore;
use super::worker_status::{BarColor, WorkerStatus};
use super::writer::WaveformWriter;

/// The final event of the PmtDecoder will need a manual flush
fn flush_final_event(
    mut decoder: PmtDecoder,
    mut writer: WaveformWriter,
) -> Result<(), ProcessorError> {
    if let Some((event_id, waveforms)) = decoder.flush_final_event() {
        writer.publish(event_id, waveforms)?;
    } else {
        spdlog::warn!("There was no final event to flush; the run held no decodable fragments");
    }
    writer.close()?;
    Ok(())
}

/// The main loop of pmt_decoder.
///
/// This takes in a config (and progress monitor) and preforms the decoding logic on the recieved data.
pub fn process_run(
    config: &Config,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    let output_path = config.get_output_file_name(run_number)?;
    let channel_map = ChannelMap::new(config.channel_map_path.as_deref())?;
    spdlog::info!("Channel map covers {} boards", channel_map.n_boards());
    let daq_config = match config.get_board_config_file(run_number)? {
        Some(snapshot_path) => {
            spdlog::info!(
                "Using board configuration snapshot {}",
                snapshot_path.to_string_lossy()
            );
            Some(DaqConfig::read_snapshot_file(&snapshot_path)?)
        }
        None => {
            spdlog::info!("No board configuration snapshot; pre trigger corrections are zero");
            None
        }
    };
    let board_db = BoardDatabase::resolve(
        &config.board_setup,
        daq_config.as_ref().map(|daq| daq.boards.as_slice()),
        config.require_board_config,
        config.sampling_tick_ns,
    )?;
    let mut decoder = PmtDecoder::new(board_db, config);
    let mut writer = WaveformWriter::new(&output_path, run_number)?;

    let fragment_dir = config.get_run_directory(run_number)?;
    let mut stack = FragmentStack::new(&fragment_dir)?;
    let total_data_size = *stack.get_total_stack_size();
    spdlog::info!(
        "Total run size: {}",
        human_bytes::human_bytes(total_data_size as f64)
    );
    let flush_frac: f32 = 0.01;
    let mut count = 0;
    let mut progress: f32 = 0.0;
    let flush_val = (total_data_size as f64 * flush_frac as f64) as u64;

    //Handle the fragment data
    spdlog::info!("Processing fragment data...");
    writer.write_fileinfo(&stack)?;
    tx.send(WorkerStatus::new(
        0.0,
        run_number,
        *worker_id,
        BarColor::CYAN,
    ))?;
    loop {
        if let Some(buffer) = stack.get_next_fragment()? {
            count += buffer.len() as u64;
            if count > flush_val {
                count = 0;
                progress += flush_frac;
                tx.send(WorkerStatus::new(
                    progress,
                    run_number,
                    *worker_id,
                    BarColor::CYAN,
                ))?;
            }

            if let Some((event_id, waveforms)) = decoder.process_fragment(&buffer, &channel_map)? {
                writer.publish(event_id, waveforms)?;
            } else {
                continue;
            }
        } else {
            //If the stack returns none, there is no more data to be read
            flush_final_event(decoder, writer)?;
            break;
        }
    }

    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        *worker_id,
        BarColor::GREEN,
    ))?;
    spdlog::info!("Done with fragment data.");

    Ok(())
}

/// The function to be called by a separate thread (typically the UI).
/// This particular flavor is unused by the default tool (pmt_decoder_cli)
/// but could be useful to someone else
/// Allows multiple runs to be processed
pub fn process(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<(), ProcessorError> {
    for run in config.first_run_number..(config.last_run_number + 1) {
        if config.does_run_exist(run) {
            spdlog::info!("Processing run {}...", run);
            process_run(&config, run, &tx, &worker_id)?;
            spdlog::info!("Finished processing run {}.", run);
        } else {
            spdlog::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(())
}

/// Process a subset of runs
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<(), ProcessorError> {
    for run in subset {
        if config.does_run_exist(run) {
            spdlog::info!("Processing run {}...", run);
            process_run(&config, run, &tx, &worker_id)?;
            spdlog::info!("Finished processing run {}.", run);
        } else {
            spdlog::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(())
}

/// Divide a run range in to a set of subranges (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<i32>> {
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); config.n_threads as usize];
    let n_subsets = subsets.len();

    for (idx, run) in (config.first_run_number..(config.last_run_number + 1)).enumerate() {
        subsets[idx % n_subsets].push(run)
    }

    subsets
}
