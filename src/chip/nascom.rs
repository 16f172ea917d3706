/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The NASCOM-2 machine.
use core::fmt;
use core::num::NonZeroU16;
use std::fs::File;
use std::io;
use std::path::Path;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use crate::z80emu::{
    Cpu, Clock, Io, Memory, CpuDebug, CpuDebugFn, BreakCause,
    host::{TsCounter, Result}
};
use crate::bus::{BusDevice, NullDevice};
use crate::clock::FTs;
use crate::config::NascomConfig;
use crate::memory::{NascomMemory, Memory64k};
use crate::peripherals::{
    bus::scan::ScanProtocolController,
    keyboard::KeyboardHandle,
    tape::{TapeDevice, TapeFile, TapeInput, TapeOutput}
};
use crate::video::{CharCellDisplay, DisplayRenderer};
use super::{BatchOutcome, ModeRequest};
#[cfg(not(target_arch = "wasm32"))]
use super::CadenceController;

/// The NASCOM-2 computer without its CPU.
///
/// The CPU is provided by the host to the methods executing code. The machine implements
/// [Io] and [Memory] so it can be given to any [Cpu] implementation.
///
/// `D` is the device chain attached past the keyboard and tape ports.
pub struct Nascom<I: TapeInput = TapeFile, O: TapeOutput = TapeFile, D = NullDevice<FTs>> {
    /// Provides a direct access to the guest memory.
    pub memory: Memory64k,
    /// Provides a direct access to the port devices.
    pub bus: ScanProtocolController<I, O, D>,
    tsc: TsCounter<FTs>,
    renderer: DisplayRenderer,
    mode: ModeRequest,
}

impl<I: TapeInput, O: TapeOutput, D: Default> Default for Nascom<I, O, D> {
    fn default() -> Self {
        Nascom::new(ScanProtocolController::default())
    }
}

impl<I: TapeInput, O: TapeOutput, D: fmt::Debug> fmt::Debug for Nascom<I, O, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nascom")
         .field("memory", &self.memory)
         .field("bus", &self.bus)
         .field("tsc", &self.tsc)
         .field("renderer", &self.renderer)
         .field("mode", &self.mode)
         .finish()
    }
}

impl<D: Default> Nascom<TapeFile, TapeFile, D> {
    /// Creates a machine from the given configuration.
    ///
    /// Resets `cpu`, loads the configured memory images and sets the program counter to the
    /// configured start address. Images that fail to load are logged as warnings and skipped.
    pub fn from_config<C: Cpu>(config: &NascomConfig, cpu: &mut C) -> Self {
        let mut nascom = Nascom::new(ScanProtocolController::new(config.tape_device(), D::default()));
        for path in config.images.iter() {
            if let Err(err) = nascom.load_image(path) {
                warn!("failed to load {}: {}", path.display(), err);
            }
        }
        cpu.reset();
        if let Some(pc) = config.start_address {
            cpu.set_pc(pc);
        }
        nascom
    }
}

impl<I: TapeInput, O: TapeOutput, D> Nascom<I, O, D> {
    pub fn new(bus: ScanProtocolController<I, O, D>) -> Self {
        Nascom {
            memory: Memory64k::default(),
            bus,
            tsc: TsCounter::default(),
            renderer: DisplayRenderer::default(),
            mode: ModeRequest::default()
        }
    }
    /// Returns a new handle to the live keyboard state. The handle can be sent to another thread.
    pub fn keyboard_handle(&self) -> KeyboardHandle {
        self.bus.keyboard_handle()
    }
    /// Returns a clone of the flag that makes [Nascom::execute_batch] yield.
    ///
    /// The flag stays raised after a yield until the host clears it.
    pub fn mode_request(&self) -> ModeRequest {
        self.mode.clone()
    }
    pub fn tape_ref(&self) -> &TapeDevice<I, O> {
        &self.bus.tape
    }
    pub fn tape_mut(&mut self) -> &mut TapeDevice<I, O> {
        &mut self.bus.tape
    }
    /// Returns the number of T-states elapsed since the last reset, wrapping around.
    pub fn current_tstate(&self) -> FTs {
        self.tsc.as_timestamp()
    }
    /// Loads a memory image file.
    ///
    /// Files with the `nas` extension are parsed as `.nas` images, any other file is loaded
    /// raw at address `0`.
    pub fn load_image<P: AsRef<Path>>(&mut self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        let is_nas = path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("nas"));
        if is_nas {
            return self.load_nas_image(path)
        }
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len == 0 || len > 0x1_0000 {
            return Err(io::Error::new(io::ErrorKind::InvalidData,
                                      "a raw image must fit in the address space"))
        }
        self.memory.load_into_mem(0..=(len - 1) as u16, file)?;
        info!("loaded {}: {} bytes at 0000", path.display(), len);
        Ok(())
    }

    #[cfg(feature = "formats")]
    fn load_nas_image(&mut self, path: &Path) -> io::Result<()> {
        crate::formats::nas::read_nas_file(path, &mut self.memory)?;
        Ok(())
    }

    #[cfg(not(feature = "formats"))]
    fn load_nas_image(&mut self, _path: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "the formats feature is disabled"))
    }
    /// Renders the video window to `display`, drawing only the changed cells.
    ///
    /// Returns the number of cells drawn. See [DisplayRenderer::render_frame].
    pub fn render<V: CharCellDisplay + ?Sized>(&mut self, display: &mut V) -> usize {
        self.renderer.render_frame(&self.memory, display)
    }
    /// Draws the whole video window to `display`.
    pub fn redraw_all<V: CharCellDisplay + ?Sized>(&mut self, display: &mut V) -> usize {
        self.renderer.redraw_all(&self.memory, display)
    }
    /// Makes the next [Nascom::render] re-prime its cache. Call it when something other than
    /// the emulator has drawn over the display.
    pub fn invalidate_display(&mut self) {
        self.renderer.invalidate_cache();
    }
}

impl<I, O, D> Nascom<I, O, D>
    where I: TapeInput,
          O: TapeOutput,
          D: BusDevice<Timestamp=FTs>
{
    /// Performs a hard reset of `cpu` and the port devices. The memory content is preserved.
    pub fn reset<C: Cpu>(&mut self, cpu: &mut C) {
        cpu.reset();
        self.bus.reset(self.tsc.as_timestamp());
        self.tsc = TsCounter::default();
    }
    /// Executes up to `instructions` instructions.
    ///
    /// The mode request is checked before each instruction. If it is raised the batch ends
    /// early without touching the CPU state. Otherwise the port devices are notified at the end
    /// of the batch.
    pub fn execute_batch<C: Cpu>(&mut self, cpu: &mut C, instructions: u32) -> BatchOutcome {
        const DEBUG: Option<CpuDebugFn> = None;
        let mut tsc = self.tsc;
        let mut executed = 0;
        while executed < instructions {
            if self.mode.is_requested() {
                self.tsc = tsc;
                return BatchOutcome::Yielded { executed }
            }
            if let Err(BreakCause::Halt) = cpu.execute_next(self, &mut tsc, DEBUG) {
                trace!("cpu halted at {:04x}", cpu.get_pc());
            }
            executed += 1;
        }
        self.tsc = tsc;
        self.bus.next_batch(tsc.as_timestamp());
        BatchOutcome::Completed { executed }
    }
    /// Executes a single instruction, optionally passing the debug information to `debug`.
    pub fn execute_single_step<C: Cpu, F: FnOnce(CpuDebug)>(
            &mut self,
            cpu: &mut C,
            debug: Option<F>
        ) -> Result<(), ()>
    {
        let mut tsc = self.tsc;
        let res = cpu.execute_next(self, &mut tsc, debug);
        self.tsc = tsc;
        res
    }
    /// Runs a single paced batch: executes the batch, renders the display, records the batch
    /// with `cadence` and sleeps its current delay.
    ///
    /// A yielded batch is neither rendered nor paced.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn run_batch<C, V>(
            &mut self,
            cpu: &mut C,
            display: &mut V,
            cadence: &mut CadenceController
        ) -> BatchOutcome
        where C: Cpu, V: CharCellDisplay + ?Sized
    {
        let outcome = self.execute_batch(cpu, cadence.instructions_per_batch());
        if outcome.is_yielded() {
            debug!("yielded after {} instructions at {:04x}", outcome.executed(), cpu.get_pc());
            return outcome
        }
        self.render(display);
        cadence.record_batch();
        cadence.pace();
        outcome
    }
    /// Runs paced batches until the mode request is raised or `max_batches` batches complete.
    ///
    /// The cadence measurement window is restarted first, so the time spent outside of this
    /// loop is not measured. Returns the number of completed batches.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn run_until_yield<C, V>(
            &mut self,
            cpu: &mut C,
            display: &mut V,
            cadence: &mut CadenceController,
            max_batches: Option<u64>
        ) -> u64
        where C: Cpu, V: CharCellDisplay + ?Sized
    {
        cadence.restart();
        let mut batches = 0;
        while max_batches.map_or(true, |max| batches < max) {
            if self.run_batch(cpu, display, cadence).is_yielded() {
                break
            }
            batches += 1;
        }
        batches
    }
}

impl<I, O, D> Io for Nascom<I, O, D>
    where I: TapeInput,
          O: TapeOutput,
          D: BusDevice<Timestamp=FTs>
{
    type Timestamp = FTs;
    type WrIoBreak = ();
    type RetiBreak = ();

    #[inline(always)]
    fn is_irq(&mut self, _ts: FTs) -> bool {
        false
    }

    fn read_io(&mut self, port: u16, ts: FTs) -> (u8, Option<NonZeroU16>) {
        self.bus.read_io(port, ts).unwrap_or((0, None))
    }

    fn write_io(&mut self, port: u16, data: u8, ts: FTs) -> (Option<()>, Option<NonZeroU16>) {
        (None, self.bus.write_io(port, data, ts).and_then(NonZeroU16::new))
    }
}

impl<I: TapeInput, O: TapeOutput, D> Memory for Nascom<I, O, D> {
    type Timestamp = FTs;

    #[inline]
    fn read_debug(&self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    #[inline]
    fn read_mem(&self, addr: u16, _ts: FTs) -> u8 {
        self.memory.read(addr)
    }

    #[inline]
    fn read_mem16(&self, addr: u16, _ts: FTs) -> u16 {
        self.memory.read16(addr)
    }

    #[inline]
    fn read_opcode(&mut self, pc: u16, _ir: u16, _ts: FTs) -> u8 {
        self.memory.read(pc)
    }

    #[inline]
    fn write_mem(&mut self, addr: u16, val: u8, _ts: FTs) {
        self.memory.write(addr, val);
    }
}
