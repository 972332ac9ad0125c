use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use tape_sort::{CostModel, FileSink, FileSource, RamWindow, Tape, TapeSorterBuilder};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let action: Action = arg_parser.value_of_t_or_exit("action");
    let chunk_dir: Option<&str> = arg_parser.value_of("chunk_dir");
    let ram_budget = arg_parser.value_of("ram_budget").expect("value is required");
    let ram_budget = ram_budget.parse::<ByteSize>().expect("value is pre-validated").as_u64();

    let config = arg_parser.value_of("config").expect("value is required");
    let costs = match CostModel::load(path::Path::new(config)) {
        Ok(costs) => costs,
        Err(err) => {
            log::error!("configuration loading error: {}", err);
            process::exit(1);
        }
    };

    let input = arg_parser.value_of("input").expect("value is required");
    let source = match FileSource::open(path::Path::new(input)) {
        Ok(source) => source,
        Err(err) => {
            log::error!("input file opening error: {}", err);
            process::exit(1);
        }
    };

    let mut sorter_builder = TapeSorterBuilder::new().with_costs(costs);
    if let Some(chunk_dir) = chunk_dir {
        sorter_builder = sorter_builder.with_chunk_dir(path::Path::new(chunk_dir));
    }
    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let mut ram = RamWindow::new(ram_budget as usize);
    let mut source = Tape::new(source, costs);

    match action {
        Action::Prepare => {
            let partition = match sorter.partition(&mut source, &mut ram) {
                Ok(partition) => partition,
                Err(err) => {
                    log::error!("partitioning error: {}", err);
                    process::exit(1);
                }
            };
            log::info!(
                "prepared {} sorted chunks ({} records) in {} simulated time units",
                partition.chunks.len(),
                partition.records,
                partition.elapsed_time
            );
        }
        Action::Sort => {
            let output = arg_parser.value_of("output").expect("value is required");
            let output_sink = match FileSink::create(path::Path::new(output)) {
                Ok(sink) => sink,
                Err(err) => {
                    log::error!("output file creation error: {}", err);
                    process::exit(1);
                }
            };

            let summary = match sorter.sort(&mut source, &mut ram, Box::new(output_sink)) {
                Ok(summary) => summary,
                Err(err) => {
                    log::error!("data sorting error: {}", err);
                    process::exit(1);
                }
            };
            log::info!(
                "sorted {} records through {} chunks in {} simulated time units",
                summary.records,
                summary.chunks,
                summary.elapsed_time
            );
        }
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Action {
    /// Run the partition phase only, materializing sorted chunks.
    Prepare,
    /// Run the full partition + merge.
    Sort,
}

impl Action {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Action as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("tape-sort")
        .about("tape-based external sort simulator")
        .arg(
            clap::Arg::new("action")
                .help("prepare sorted chunks only, or run the full sort")
                .required(true)
                .takes_value(true)
                .possible_values(Action::possible_values()),
        )
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted, one unsigned integer per line")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required_if_eq("action", "sort")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("config")
                .short('c')
                .long("config")
                .help("device cost configuration file: read, write, shift, rewind")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("ram_budget")
                .short('m')
                .long("ram-budget")
                .help("RAM budget for the sort window")
                .required(true)
                .takes_value(true)
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("RAM budget format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("chunk_dir")
                .short('d')
                .long("chunk-dir")
                .help("directory to be used to store chunk files")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
