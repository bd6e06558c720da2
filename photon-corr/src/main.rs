use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{App, Arg, ArgMatches};
use log::{error, info};

use photon_corr::fcs_tools::multi_tau::{correlate, CorrParams, CorrResult};
use photon_corr::fcs_tools::validate::validate;
use photon_corr::headers::FileFormat;
use photon_corr::parsers::{read_timestamps_with, ReadOptions};

struct Config {
    params: CorrParams,
    read: ReadOptions,
    gap_factor: f64,
    npy: bool,
}

fn parse_arg<T>(matches: &ArgMatches, name: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = matches.value_of(name).unwrap();
    raw.parse()
        .with_context(|| format!("invalid --{}: {}", name, raw))
}

fn main() {
    let matches = App::new("fcs-corr")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compute correlation functions of photon timestamp files")
        .arg(
            Arg::with_name("FILES")
                .help("Input files in PT2, FPGA timetagger or raw timestamp format")
                .required(true)
                .multiple(true),
        )
        .arg(
            Arg::with_name("short-grain")
                .long("short-grain")
                .takes_value(true)
                .default_value("1e-7")
                .help("Finest lag bin width in seconds"),
        )
        .arg(
            Arg::with_name("max-lag")
                .long("max-lag")
                .takes_value(true)
                .help("Largest lag in seconds (default: the stream duration)"),
        )
        .arg(
            Arg::with_name("coarsening-factor")
                .long("coarsening-factor")
                .takes_value(true)
                .default_value("2")
                .help("Bin width growth factor per scale change"),
        )
        .arg(
            Arg::with_name("bins-per-octave")
                .long("bins-per-octave")
                .takes_value(true)
                .default_value("8")
                .help("Lags evaluated per scale before coarsening"),
        )
        .arg(
            Arg::with_name("gap-factor")
                .long("gap-factor")
                .takes_value(true)
                .default_value("1000")
                .help("Continuity check sensitivity, in mean inter-arrival intervals"),
        )
        .arg(
            Arg::with_name("clockrate")
                .long("clockrate")
                .takes_value(true)
                .default_value("128e6")
                .help("Timetagger clock frequency in Hz (.timetag files)"),
        )
        .arg(
            Arg::with_name("raw-jiffy")
                .long("raw-jiffy")
                .takes_value(true)
                .default_value("1e-9")
                .help("Seconds per tick for headerless .times files"),
        )
        .arg(
            Arg::with_name("npy")
                .long("npy")
                .help("Also write each correlation table as a NumPy .npy array"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable diagnostic logging"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();

    if let Err(err) = run(&matches) {
        eprintln!("fcs-corr: {:#}", err);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let config = Config {
        params: CorrParams {
            short_grain: parse_arg(matches, "short-grain")?,
            max_lag: match matches.value_of("max-lag") {
                Some(raw) => Some(
                    raw.parse()
                        .with_context(|| format!("invalid --max-lag: {}", raw))?,
                ),
                None => None,
            },
            coarsening_factor: parse_arg(matches, "coarsening-factor")?,
            bins_per_octave: parse_arg(matches, "bins-per-octave")?,
        },
        read: ReadOptions {
            clockrate: parse_arg(matches, "clockrate")?,
            raw_jiffy: parse_arg(matches, "raw-jiffy")?,
        },
        gap_factor: parse_arg(matches, "gap-factor")?,
        npy: matches.is_present("npy"),
    };

    // One failing file must not take down the rest of the batch.
    let files: Vec<&str> = matches.values_of("FILES").unwrap().collect();
    let mut failures = 0;
    for file in &files {
        if let Err(err) = process_file(Path::new(file), &config) {
            error!("{}: {:#}", file, err);
            failures += 1;
        }
    }
    if failures > 0 {
        anyhow::bail!("{} of {} files failed", failures, files.len());
    }
    Ok(())
}

/// Correlate one input file and write its tables next to the current
/// directory: donor and acceptor autocorrelations plus their
/// cross-correlation for two-channel formats, a single autocorrelation
/// for single-channel raw files.
fn process_file(path: &Path, config: &Config) -> anyhow::Result<()> {
    let format = FileFormat::from_path(path)?;
    let base = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("output")
        .to_string();

    match format {
        FileFormat::Raw => {
            let stream = read_timestamps_with(path, 0, &config.read)?;
            validate(&stream, config.gap_factor)?;
            let corr = correlate(&stream, &stream, &config.params)?;
            write_output(&corr, &base, "corr", config.npy)?;
        }
        FileFormat::Pt2 | FileFormat::Timetag => {
            let donor = read_timestamps_with(path, 0, &config.read)?;
            let acceptor = read_timestamps_with(path, 1, &config.read)?;
            validate(&donor, config.gap_factor).context("donor stream")?;
            validate(&acceptor, config.gap_factor).context("acceptor stream")?;
            info!(
                "{}: {} donor events, {} acceptor events",
                base,
                donor.len(),
                acceptor.len()
            );

            let dcorr = correlate(&donor, &donor, &config.params)?;
            write_output(&dcorr, &base, "dcorr", config.npy)?;
            let acorr = correlate(&acceptor, &acceptor, &config.params)?;
            write_output(&acorr, &base, "acorr", config.npy)?;
            let xcorr = correlate(&donor, &acceptor, &config.params)?;
            write_output(&xcorr, &base, "xcorr", config.npy)?;
        }
    }
    Ok(())
}

fn write_output(corr: &CorrResult, base: &str, suffix: &str, npy: bool) -> anyhow::Result<()> {
    let out = PathBuf::from(format!("{}.{}", base, suffix));
    let file =
        fs::File::create(&out).with_context(|| format!("creating {}", out.display()))?;
    let mut writer = BufWriter::new(file);
    corr.write_table(&mut writer)?;
    writer.flush()?;
    info!(
        "wrote {}: {} lags up to {:.3e} s",
        out.display(),
        corr.points.len(),
        corr.effective_max_lag
    );

    if npy {
        let out = PathBuf::from(format!("{}.{}.npy", base, suffix));
        ndarray_npy::write_npy(&out, &corr.to_array())
            .with_context(|| format!("writing {}", out.display()))?;
    }
    Ok(())
}
