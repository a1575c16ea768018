use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use libpmt_decoder::config::Config;
use libpmt_decoder::error::ProcessorError;
use libpmt_decoder::process::{create_subsets, process_subset};
use libpmt_decoder::worker_status::{BarColor, WorkerStatus};

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

/// Route logging to a file, with the logger named after the configured category
fn setup_logging(category: &str) {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./pmt_decoder.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [{logger}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()
            .unwrap(),
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .name(category)
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()
            .unwrap(),
    );
    spdlog::set_default_logger(logger);
}

fn make_cli_command() -> Command {
    Command::new("pmt_decoder_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the configuration file"),
        )
}

fn bar_style(color: &BarColor) -> ProgressStyle {
    let template = match color {
        BarColor::CYAN => "{prefix} [{bar:40.cyan}] {pos}%",
        BarColor::GREEN => "{prefix} [{bar:40.green}] {pos}%",
        BarColor::RED => "{prefix} [{bar:40.red}] {pos}%",
    };
    ProgressStyle::with_template(template)
        .expect("Progress template should be valid")
        .progress_chars("=> ")
}

fn main() {
    // Create a cli
    let matches = make_cli_command().get_matches();

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        spdlog::info!("Done.");
        return;
    }

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };

    setup_logging(&config.log_category);
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Fragment Path: {}", config.fragment_path.to_string_lossy());
    spdlog::info!("Output Path: {}", config.output_path.to_string_lossy());
    match &config.board_config_path {
        Some(path) => spdlog::info!("Board Config Path: {}", path.to_string_lossy()),
        None => spdlog::info!("Board Config Path: not set, pre trigger corrections are zero"),
    }
    match &config.channel_map_path {
        Some(path) => spdlog::info!("Channel Map: {}", path.to_string_lossy()),
        None => spdlog::info!("Channel Map: Default"),
    }
    spdlog::info!(
        "First Run: {} Last Run: {}",
        config.first_run_number,
        config.last_run_number
    );
    spdlog::info!("Number of Workers: {}", config.n_threads);

    if !config.is_n_threads_valid() {
        spdlog::error!("The number of worker threads must be at least 1!");
        return;
    }

    // Setup one progress bar per worker and spawn the workers
    let pb_manager = MultiProgress::new();
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let mut workers: Vec<(usize, JoinHandle<Result<(), ProcessorError>>)> = vec![];
    let mut bars: Vec<ProgressBar> = vec![];

    let subsets = create_subsets(&config);
    for (idx, subset) in subsets.into_iter().enumerate() {
        // Dont make empty workers
        if subset.is_empty() {
            continue;
        }
        let conf = config.clone();
        let worker_tx = tx.clone();
        let bar = pb_manager.add(ProgressBar::new(100));
        bar.set_style(bar_style(&BarColor::CYAN));
        bar.set_prefix(format!("Worker {idx}"));
        bars.push(bar);
        workers.push((
            idx,
            std::thread::spawn(move || process_subset(conf, worker_tx, idx, subset)),
        ));
    }
    drop(tx);

    // Poll worker messages until every worker has finished
    loop {
        loop {
            match rx.try_recv() {
                Ok(status) => {
                    let bar = &bars[status.worker_id];
                    bar.set_style(bar_style(&status.color));
                    bar.set_prefix(format!(
                        "Worker {} run {}",
                        status.worker_id, status.run_number
                    ));
                    bar.set_position((status.progress * 100.0) as u64);
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => break,
            }
        }

        if !workers.iter().any(|(_, worker)| !worker.is_finished()) {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    // Catch any messages sent after the last poll
    for status in rx.try_iter() {
        let bar = &bars[status.worker_id];
        bar.set_style(bar_style(&status.color));
        bar.set_position((status.progress * 100.0) as u64);
    }

    let mut any_failed = false;
    for (idx, worker) in workers.into_iter() {
        match worker.join() {
            Ok(Ok(_)) => spdlog::info!("Worker {idx} complete"),
            Ok(Err(e)) => {
                any_failed = true;
                bars[idx].set_style(bar_style(&BarColor::RED));
                spdlog::error!("Processor error: {e}");
            }
            Err(_) => {
                any_failed = true;
                spdlog::error!("An error occured joining one of the workers!");
            }
        }
    }

    for bar in bars.iter() {
        bar.finish();
    }

    if any_failed {
        println!("There was an error! Check the log file pmt_decoder.log for more information.");
    }
    spdlog::info!("Done.");
}
