/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! A headless NASCOM-2 runner.
//!
//! Loads memory images, optionally types a scripted text through the keyboard matrix, runs
//! a number of paced batches and prints the screen.
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::ops::RangeInclusive;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use clap::clap_app;

use nascom::z80emu::{Cpu, Z80NMOS};
use nascom::bus::{BusDevice, NullDevice};
use nascom::chip::{CadenceController, Nascom};
use nascom::clock::FTs;
use nascom::config::NascomConfig;
use nascom::formats::nas::write_nas;
use nascom::peripherals::bus::debug::DebugBusDevice;
use nascom::peripherals::tape::TapeFile;
use nascom_utils::keyboard::KeyEventHandler;
use nascom_utils::screen::TextScreen;

type Result<T> = core::result::Result<T, Box<dyn Error>>;

/// The number of batches each scripted key is held down and then released for.
const KEY_HOLD_BATCHES: u32 = 3;

/// Types a text one key at a time, driven by the emulation loop.
struct KeyScript {
    chars: std::vec::IntoIter<char>,
    current: Option<char>,
    countdown: u32,
    hold: u32,
}

impl KeyScript {
    fn new(text: &str, hold: u32) -> Self {
        let chars: Vec<char> = text.replace("\\n", "\n").chars().collect();
        KeyScript { chars: chars.into_iter(), current: None, countdown: 0, hold }
    }

    fn is_finished(&self) -> bool {
        self.current.is_none() && self.countdown == 0 && self.chars.len() == 0
    }

    fn tick(&mut self, handler: &KeyEventHandler) {
        if self.countdown > 0 {
            self.countdown -= 1;
            return
        }
        if let Some(ch) = self.current.take() {
            handler.char_event(ch, false);
            self.countdown = self.hold;
        }
        else if let Some(ch) = self.chars.next() {
            if handler.char_event(ch, true) {
                self.current = Some(ch);
            }
            else {
                warn!("can't type {:?}", ch);
            }
            self.countdown = self.hold;
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let matches = clap_app!(NascomHeadless =>
        (version: "0.1")
        (author: "Rafal Michalski")
        (about: "NASCOM library example headless emulator")
        (@arg config: -c --config +takes_value "Reads the configuration from a JSON file")
        (@arg batches: -b --batches +takes_value "The number of batches to run (default: 250)")
        (@arg start: -s --start +takes_value "The hexadecimal start address")
        (@arg tape_in: -i --("tape-in") +takes_value "A file played back by the tape")
        (@arg tape_out: -o --("tape-out") +takes_value "A file the tape records to")
        (@arg text: -t --("type") +takes_value "Types the given text, \\n is ENTER")
        (@arg dump: -d --dump +takes_value "Writes memory to a .nas file after the run")
        (@arg range: -r --range +takes_value "The hexadecimal memory range to dump (default: 0C80-0FFF)")
        (@arg trace_io: --("trace-io") "Logs all port access at the debug level")
        (@arg print_config: --("print-config") "Prints the effective configuration as JSON")
        (@arg FILES: ... "Memory images to load at startup")
    ).get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => NascomConfig::default()
    };
    if let Some(files) = matches.values_of("FILES") {
        config.images.extend(files.map(Into::into));
    }
    if let Some(start) = matches.value_of("start") {
        config.start_address = Some(u16::from_str_radix(start, 16)?);
    }
    if let Some(path) = matches.value_of("tape_in") {
        config.tape_input = Some(path.into());
    }
    if let Some(path) = matches.value_of("tape_out") {
        config.tape_output = Some(path.into());
    }
    if matches.is_present("print_config") {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }

    let batches: u64 = matches.value_of("batches").map(str::parse).transpose()?.unwrap_or(250);
    let dump = match matches.value_of("dump") {
        Some(path) => Some((path, parse_range(matches.value_of("range").unwrap_or("0C80-0FFF"))?)),
        None => None
    };
    let text = matches.value_of("text").unwrap_or("");

    let mut cpu = Z80NMOS::default();
    let (screen, memory) = if matches.is_present("trace_io") {
        let mut nascom: Nascom<TapeFile, TapeFile, DebugBusDevice<NullDevice<FTs>>> =
                        Nascom::from_config(&config, &mut cpu);
        nascom.bus.set_trace_io(true);
        let screen = run(&mut nascom, &mut cpu, &config, batches, text)?;
        (screen, nascom.memory)
    }
    else {
        let mut nascom: Nascom = Nascom::from_config(&config, &mut cpu);
        let screen = run(&mut nascom, &mut cpu, &config, batches, text)?;
        (screen, nascom.memory)
    };

    print!("{}", screen);

    if let Some((path, range)) = dump {
        let mut file = BufWriter::new(File::create(path)?);
        let records = write_nas(&mut file, &memory, range)?;
        file.flush()?;
        info!("{} records written to {}", records, path);
    }
    Ok(())
}

fn run<C: Cpu, D: BusDevice<Timestamp=FTs>>(
        nascom: &mut Nascom<TapeFile, TapeFile, D>,
        cpu: &mut C,
        config: &NascomConfig,
        batches: u64,
        text: &str
    ) -> Result<TextScreen>
{
    let mut screen = TextScreen::new();
    let mut cadence: CadenceController = config.cadence();
    let handler = KeyEventHandler::new(nascom.keyboard_handle());
    let mut script = KeyScript::new(text, KEY_HOLD_BATCHES);

    nascom.redraw_all(&mut screen);
    cadence.restart();
    let mut executed = 0;
    while executed < batches && !script.is_finished() {
        script.tick(&handler);
        if nascom.run_batch(cpu, &mut screen, &mut cadence).is_yielded() {
            break
        }
        executed += 1;
    }
    if !script.is_finished() {
        warn!("the batch limit was reached before typing finished");
    }
    executed += nascom.run_until_yield(cpu, &mut screen, &mut cadence, Some(batches - executed));
    handler.release_all();

    let stats = cadence.stats();
    info!("{} batches, {}", executed, stats);
    if let Some(rate) = stats.batch_rate(cadence.target_batches_per_second()) {
        info!("measured rate: {:.1} batches/s", rate);
    }
    info!("pc: {:04x}, tape: {:?}", cpu.get_pc(), nascom.tape_ref().state());
    Ok(screen)
}

fn parse_range(range: &str) -> Result<RangeInclusive<u16>> {
    let mut parts = range.splitn(2, '-');
    let start = parts.next().ok_or("missing range start")?;
    let end = parts.next().ok_or("a range must be given as START-END")?;
    let start = u16::from_str_radix(start.trim(), 16)?;
    let end = u16::from_str_radix(end.trim(), 16)?;
    if start > end {
        return Err("the range start must not exceed its end".into())
    }
    Ok(start..=end)
}
