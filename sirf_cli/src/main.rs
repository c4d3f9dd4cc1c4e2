use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use chrono::prelude::*;
use clap::{value_parser, Arg, ArgMatches, Command};
use serde::Deserialize;
use sirf::{
    CommMode, Device, DeviceConfig, FileStorage, FixField, InitConfig, LoadOutcome, NoPowerPin,
    SaveOutcome, StatusFlags, StdClock,
};

mod serial;

use serial::SerialTransport;

type Gps = Device<SerialTransport, StdClock, NoPowerPin>;

/// Contents of the `--config` file, every key optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    device: DeviceConfig,
    init: InitConfig,
}

fn command() -> Command {
    Command::new("SiRF CLI")
        .author(clap::crate_authors!())
        .about("Drives a SiRF GPS receiver on a serial port")
        .arg_required_else_help(true)
        .arg(
            Arg::new("port")
                .value_name("port")
                .short('p')
                .long("port")
                .required(true)
                .help("Serial port the receiver is wired to"),
        )
        .arg(
            Arg::new("baud")
                .value_name("baud")
                .short('s')
                .long("baud")
                .required(false)
                .value_parser(value_parser!(u32))
                .help("Baud rate of the link, overrides the config file"),
        )
        .arg(
            Arg::new("config")
                .value_name("file")
                .short('c')
                .long("config")
                .required(false)
                .help("JSON file with `device` and `init` settings"),
        )
        .subcommand(Command::new("init").about("Power up and silence the receiver"))
        .subcommand(
            Command::new("mode")
                .about("Switch the communication mode")
                .arg(
                    Arg::new("mode")
                        .required(true)
                        .value_parser(value_parser!(CommMode))
                        .help("binary, binary-off, nmea, gga, gll, gsa, gsv, rmc or vtg"),
                ),
        )
        .subcommand(Command::new("fix").about("Read a complete fix and print it as JSON"))
        .subcommand(
            Command::new("field").about("Read one fix field").arg(
                Arg::new("field")
                    .required(true)
                    .value_parser(value_parser!(FixField))
                    .help("time, date, latitude, longitude, altitude, speed or course"),
            ),
        )
        .subcommand(
            Command::new("lock")
                .about("Wait until the receiver reports a fix")
                .arg(
                    Arg::new("tries")
                        .long("tries")
                        .default_value("60")
                        .value_parser(value_parser!(u32)),
                ),
        )
        .subcommand(
            Command::new("raw").about("Print NMEA lines as received").arg(
                Arg::new("max")
                    .default_value("0")
                    .value_parser(value_parser!(usize))
                    .help("Longest line to read, 0 for the line buffer size"),
            ),
        )
        .subcommand(
            Command::new("save-almanac")
                .about("Poll every ephemeris and store it")
                .arg(Arg::new("file").required(true)),
        )
        .subcommand(
            Command::new("load-almanac")
                .about("Upload a stored almanac")
                .arg(Arg::new("file").required(true)),
        )
}

fn settings(matches: &ArgMatches) -> Result<Settings> {
    let mut settings = match matches.get_one::<String>("config") {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path))?
        }
        None => Settings::default(),
    };
    if let Some(baud) = matches.get_one::<u32>("baud") {
        settings.device.baud_rate = *baud;
    }
    Ok(settings)
}

/// Splits `path` into the storage directory and the file name.
fn storage_for(path: &str) -> Result<(FileStorage, String)> {
    let path = Path::new(path);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => ".".into(),
    };
    Ok((FileStorage::new(dir), name.to_string()))
}

fn report(gps: &Gps) {
    let flags = gps.flags();
    if !flags.is_empty() {
        log::warn!("status: {:?}", flags);
    }
}

fn power_on(gps: &mut Gps) -> Result<()> {
    if !gps.power_on()? {
        log::warn!("receiver did not acknowledge the silence command");
    }
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<()> {
    let port = matches
        .get_one::<String>("port")
        .context("no serial port given")?;
    let settings = settings(matches)?;
    let mut gps = Device::new(
        SerialTransport::new(port.as_str()),
        StdClock::new(),
        NoPowerPin,
        settings.device,
    )
    .with_init_config(settings.init);

    match matches.subcommand() {
        Some(("init", _)) => {
            power_on(&mut gps)?;
            println!("receiver ready in {} mode", gps.comm_mode());
        }
        Some(("mode", sub)) => {
            let mode = *sub.get_one::<CommMode>("mode").context("no mode given")?;
            power_on(&mut gps)?;
            if !gps.set_comm_mode(mode)? {
                bail!("receiver did not enter {} mode", mode);
            }
            println!("mode {}", gps.comm_mode());
        }
        Some(("fix", _)) => {
            power_on(&mut gps)?;
            let complete = gps.position()?;
            println!("{}", serde_json::to_string_pretty(gps.fix())?);
            if let Some(at) = gps.fix().utc_datetime() {
                let at = Utc.from_utc_datetime(&at);
                println!("fix taken {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            if !complete {
                log::warn!("fix is incomplete");
            }
        }
        Some(("field", sub)) => {
            let field = *sub.get_one::<FixField>("field").context("no field given")?;
            power_on(&mut gps)?;
            let value = gps.read_field(field)?.to_string();
            println!("{}: {}", field, value);
        }
        Some(("lock", sub)) => {
            let tries = *sub.get_one::<u32>("tries").unwrap_or(&60);
            power_on(&mut gps)?;
            let started = Local::now();
            for _ in 0..tries {
                if gps.has_fix()? {
                    let waited = Local::now() - started;
                    println!("fix after {} s", waited.num_seconds());
                    return Ok(());
                }
            }
            bail!("no fix after {} tries", tries);
        }
        Some(("raw", sub)) => {
            let max = *sub.get_one::<usize>("max").unwrap_or(&0);
            power_on(&mut gps)?;
            if !gps.set_comm_mode(CommMode::NmeaAll)? {
                bail!("receiver did not enter NMEA mode");
            }
            // only the first read drops stale input
            let mut line = gps.read_raw(max)?.to_string();
            loop {
                if gps.flags().contains(StatusFlags::TIMEOUT) {
                    log::warn!("no data");
                } else {
                    println!("{}", line);
                }
                line = gps.read_next_raw(max)?.to_string();
            }
        }
        Some(("save-almanac", sub)) => {
            let file = sub.get_one::<String>("file").context("no file given")?;
            let (mut storage, name) = storage_for(file)?;
            power_on(&mut gps)?;
            match gps.save_almanac(&mut storage, &name)? {
                SaveOutcome::Saved(n) => println!("saved {} records to {}", n, file),
                SaveOutcome::NoAlmanac => println!("receiver has no almanac yet"),
                SaveOutcome::NoReceiver => bail!("receiver does not answer"),
                SaveOutcome::StorageFailure(e) => bail!("{}: {}", file, e),
            }
        }
        Some(("load-almanac", sub)) => {
            let file = sub.get_one::<String>("file").context("no file given")?;
            let (mut storage, name) = storage_for(file)?;
            power_on(&mut gps)?;
            match gps.load_almanac(&mut storage, &name)? {
                LoadOutcome::Loaded(n) => println!("uploaded {} records", n),
                LoadOutcome::Rejected { loaded, rejected } => {
                    println!("uploaded {} records, {} rejected", loaded, rejected)
                }
                LoadOutcome::Empty => println!("{} holds no records", file),
                LoadOutcome::NoReceiver => bail!("receiver does not answer"),
                LoadOutcome::StorageFailure(e) => bail!("{}: {}", file, e),
            }
        }
        _ => {
            command().print_help()?;
        }
    }
    report(&gps);
    gps.power_off()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let matches = command().get_matches();
    run(&matches)
}
