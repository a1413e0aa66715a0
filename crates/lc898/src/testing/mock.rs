extern crate std;

use std::collections::BTreeMap;
use std::vec;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;

use crate::checksum::{byte_sum16, byte_sum_checksum16};
use crate::error::Error;
use crate::flash::FlashMat;
use crate::interface::Interface;
use crate::register::{
    flaint, flash, flash_cmd, flawp, layout, meas, ram, remap, rominfo, sys, unlock,
};

const USER_MAT_WORDS: usize = 10 * 0x400;
const INFO_MAT_WORDS: usize = layout::INFO_MAT_WORDS;
const TRIM_MAT_WORDS: usize = 64;
const BLOCK_WORDS: usize = 0x400;

/// Register-level simulator of the LC898 flash controller, program RAM,
/// checksum unit, measurement block and oscillator counter.
#[derive(Clone, Debug)]
pub(crate) struct MockInterface {
    regs: BTreeMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    bursts: Vec<(u32, Vec<u8>)>,
    bus_error_addr: Option<u32>,

    mats: BTreeMap<u32, Vec<u32>>,
    unlocked: bool,
    unlock_code1_seen: bool,
    add_codes: Vec<u32>,
    add_done: Vec<u32>,
    stuck_busy: bool,
    page_addr: u32,
    page_buffer: Vec<u32>,
    read_addr: u32,
    program_buffers: [Vec<u8>; 2],
    erases: Vec<(u32, u32)>,
    programs: Vec<(u32, u32)>,

    pmem: Vec<u8>,
    pmem_checksum_offset: u16,

    rominfo: u32,
    rominfo_override: Option<u32>,
    core_resets: usize,
    remaps: usize,

    integrals: BTreeMap<u32, i64>,
    measure_stuck: bool,
    measure_remaining: Option<u32>,
    measurements: usize,

    osc_base: u32,
    osc_step: u32,
    osc_measurements: usize,
    osc_timer_stuck: bool,
}

impl Default for MockInterface {
    fn default() -> Self {
        let mut mats = BTreeMap::new();
        mats.insert(FlashMat::UserMat.selector(), vec![layout::ERASED; USER_MAT_WORDS]);
        mats.insert(FlashMat::InfoMat0.selector(), vec![layout::ERASED; INFO_MAT_WORDS]);
        mats.insert(FlashMat::InfoMat1.selector(), vec![layout::ERASED; INFO_MAT_WORDS]);
        mats.insert(FlashMat::InfoMat2.selector(), vec![layout::ERASED; INFO_MAT_WORDS]);
        mats.insert(FlashMat::TrimMat.selector(), vec![layout::ERASED; TRIM_MAT_WORDS]);
        Self {
            regs: BTreeMap::new(),
            writes: Vec::new(),
            bursts: Vec::new(),
            bus_error_addr: None,
            mats,
            unlocked: false,
            unlock_code1_seen: false,
            add_codes: Vec::new(),
            add_done: Vec::new(),
            stuck_busy: false,
            page_addr: 0,
            page_buffer: Vec::new(),
            read_addr: 0,
            program_buffers: [Vec::new(), Vec::new()],
            erases: Vec::new(),
            programs: Vec::new(),
            pmem: Vec::new(),
            pmem_checksum_offset: 0,
            rominfo: rominfo::NORMAL,
            rominfo_override: None,
            core_resets: 0,
            remaps: 0,
            integrals: BTreeMap::new(),
            measure_stuck: false,
            measure_remaining: None,
            measurements: 0,
            osc_base: 0,
            osc_step: 0,
            osc_measurements: 0,
            osc_timer_stuck: false,
        }
    }
}

impl MockInterface {
    pub(crate) fn with_reg(mut self, addr: u32, value: u32) -> Self {
        self.regs.insert(addr, value);
        self
    }

    pub(crate) fn with_mat(mut self, mat: FlashMat, words: &[u32]) -> Self {
        let storage = self.mat_mut(mat.selector());
        storage[..words.len()].copy_from_slice(words);
        self
    }

    pub(crate) fn with_stuck_busy(mut self) -> Self {
        self.stuck_busy = true;
        self
    }

    pub(crate) fn with_rominfo_override(mut self, value: u32) -> Self {
        self.rominfo_override = Some(value);
        self
    }

    pub(crate) fn with_bus_error_on(mut self, addr: u32) -> Self {
        self.bus_error_addr = Some(addr);
        self
    }

    /// Skews the program RAM checksum reported by the device.
    pub(crate) fn with_pmem_checksum_offset(mut self, offset: u16) -> Self {
        self.pmem_checksum_offset = offset;
        self
    }

    /// Sets the accumulator total produced for a measurement source.
    pub(crate) fn with_integral(mut self, source: u32, total: i64) -> Self {
        self.integrals.insert(source, total);
        self
    }

    pub(crate) fn with_measure_stuck(mut self) -> Self {
        self.measure_stuck = true;
        self
    }

    /// Stops the sample counter at `remaining` after each start.
    pub(crate) fn with_measure_stalled(mut self, remaining: u32) -> Self {
        self.measure_stuck = true;
        self.measure_remaining = Some(remaining);
        self
    }

    /// Oscillator model: `count = base + trim * step`.
    pub(crate) fn with_osc_model(mut self, base: u32, step: u32) -> Self {
        self.osc_base = base;
        self.osc_step = step;
        self
    }

    pub(crate) fn with_osc_timer_stuck(mut self) -> Self {
        self.osc_timer_stuck = true;
        self
    }

    pub(crate) fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    pub(crate) fn writes(&self) -> &[(u32, u32)] {
        &self.writes
    }

    pub(crate) fn clear_log(&mut self) {
        self.writes.clear();
        self.bursts.clear();
        self.erases.clear();
        self.programs.clear();
    }

    pub(crate) fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    pub(crate) fn reg(&self, addr: u32) -> u32 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    pub(crate) fn bursts(&self) -> &[(u32, Vec<u8>)] {
        &self.bursts
    }

    pub(crate) fn mat(&self, mat: FlashMat) -> &[u32] {
        &self.mats[&mat.selector()]
    }

    pub(crate) fn erases(&self) -> &[(u32, u32)] {
        &self.erases
    }

    pub(crate) fn programs(&self) -> &[(u32, u32)] {
        &self.programs
    }

    pub(crate) fn pmem(&self) -> &[u8] {
        &self.pmem
    }

    pub(crate) fn core_resets(&self) -> usize {
        self.core_resets
    }

    pub(crate) fn remaps(&self) -> usize {
        self.remaps
    }

    pub(crate) fn measurements(&self) -> usize {
        self.measurements
    }

    pub(crate) fn osc_measurements(&self) -> usize {
        self.osc_measurements
    }

    pub(crate) fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    fn mat_mut(&mut self, selector: u32) -> &mut Vec<u32> {
        self.mats.get_mut(&selector).expect("unknown mat selector")
    }

    fn osc_count(&self) -> u32 {
        let trim = self.reg(sys::OSC_TRIM) & 0x1FF;
        self.osc_base + trim * self.osc_step
    }

    fn additional_allows(&self, selector: u32) -> bool {
        if selector == FlashMat::UserMat.selector() {
            return true;
        }
        let codes = self.add_done.as_slice();
        if selector == FlashMat::TrimMat.selector() {
            codes == [unlock::INFO_MAT, unlock::TRIM_MAT]
        } else if selector == FlashMat::InfoMat2.selector() {
            codes == [unlock::INFO_MAT] || codes == [unlock::INFO_MAT2_128]
        } else {
            codes == [unlock::INFO_MAT]
        }
    }

    fn writable(&self, selector: u32) -> bool {
        self.unlocked && self.additional_allows(selector)
    }

    fn split(addr: u32) -> (u32, usize) {
        (addr >> 16, (addr & 0xFFFF) as usize)
    }

    fn program_words(&mut self, addr: u32, words: &[u32]) {
        let (selector, offset) = Self::split(addr);
        self.programs.push((selector, offset as u32));
        if !self.writable(selector) {
            return;
        }
        let storage = self.mat_mut(selector);
        for (index, word) in words.iter().enumerate() {
            if let Some(slot) = storage.get_mut(offset + index) {
                *slot = *word;
            }
        }
    }

    fn flash_command(&mut self, cmd: u32) {
        let addr = self.reg(flash::FLA_ADR);
        let count = self.reg(flash::ACSCNT) as usize + 1;
        match cmd {
            flash_cmd::READ => self.read_addr = addr,
            flash_cmd::PAGE_LOAD => {
                self.page_addr = addr;
                self.page_buffer.clear();
            }
            flash_cmd::PAGE_PROGRAM => {
                let words = core::mem::take(&mut self.page_buffer);
                self.program_words(self.page_addr, &words);
            }
            flash_cmd::PROGRAM_BUFFER_A | flash_cmd::PROGRAM_BUFFER_B => {
                let index = (cmd - flash_cmd::PROGRAM_BUFFER_A) as usize;
                let words: Vec<u32> = self.program_buffers[index]
                    .chunks(4)
                    .map(|chunk| {
                        let mut bytes = [0xFFu8; 4];
                        bytes[..chunk.len()].copy_from_slice(chunk);
                        u32::from_be_bytes(bytes)
                    })
                    .collect();
                self.program_words(addr, &words);
            }
            flash_cmd::BLOCK_ERASE | flash_cmd::ABS_BLOCK_ERASE => {
                let (selector, offset) = Self::split(addr);
                let block = offset / BLOCK_WORDS;
                self.erases.push((selector, block as u32));
                if self.writable(selector) {
                    let storage = self.mat_mut(selector);
                    let start = (block * BLOCK_WORDS).min(storage.len());
                    let end = (start + BLOCK_WORDS).min(storage.len());
                    storage[start..end].fill(layout::ERASED);
                }
            }
            flash_cmd::CHECKSUM => {
                let (selector, offset) = Self::split(addr);
                let storage = &self.mats[&selector];
                let end = (offset + count).min(storage.len());
                let sum = byte_sum_checksum16(&storage[offset..end]);
                self.regs.insert(flash::FLA_SUM, u32::from(sum));
            }
            _ => {}
        }
    }

    fn on_write(&mut self, addr: u32, value: u32) {
        match addr {
            flash::UNLK_CODE1 => self.unlock_code1_seen = value == unlock::CODE1,
            flash::UNLK_CODE2 => {
                if self.unlock_code1_seen && value == unlock::CODE2 {
                    self.unlocked = true;
                    self.add_codes.clear();
                    self.add_done.clear();
                }
            }
            flash::UNLK_CODE3 => match value {
                unlock::COMMON => self.add_done = core::mem::take(&mut self.add_codes),
                unlock::INFO_MAT | unlock::TRIM_MAT | unlock::INFO_MAT2_128 => {
                    self.add_codes.push(value);
                }
                _ => self.unlocked = false,
            },
            flash::FLAWP if value & flawp::PROTECT != 0 => {
                self.unlocked = false;
                self.add_codes.clear();
                self.add_done.clear();
            }
            flash::CMD => self.flash_command(value),
            flash::FLA_WDAT => self.page_buffer.push(value),
            sys::SYSDSP_REMAP => match value {
                remap::CORE_RESET_NO_MCU => {
                    self.core_resets += 1;
                    self.rominfo = rominfo::HALTED;
                }
                remap::REMAP => {
                    self.remaps += 1;
                    self.rominfo = rominfo::NORMAL;
                }
                _ => {}
            },
            ram::PMEM_CHECKSUM_CMD => {
                let len = (value as usize).min(self.pmem.len());
                let sum = byte_sum16(&self.pmem[..len]).wrapping_add(self.pmem_checksum_offset);
                self.regs.insert(ram::PMEM_CHECKSUM_VALUE, u32::from(sum));
                self.regs.insert(ram::PMEM_CHECKSUM_STATUS, 0);
            }
            meas::SAMPLE_NUM => {
                self.measurements += 1;
                let a = self.integrals.get(&self.reg(meas::INPUT_A)).copied();
                let b = self.integrals.get(&self.reg(meas::INPUT_B)).copied();
                for (target, total) in [(meas::INTEGRAL_A, a), (meas::INTEGRAL_B, b)] {
                    let total = total.unwrap_or(0) as u64;
                    self.regs.insert(target, total as u32);
                    self.regs.insert(target + 4, (total >> 32) as u32);
                }
                if !self.measure_stuck {
                    self.regs.insert(meas::SAMPLE_NUM, 0);
                } else if let Some(remaining) = self.measure_remaining {
                    self.regs.insert(meas::SAMPLE_NUM, remaining);
                }
            }
            sys::OSC_I2C_CNT_CTRL if value != 0 => {
                self.osc_measurements += 1;
                let count = self.osc_count();
                self.regs.insert(sys::OSC_I2C_CNT, count);
            }
            sys::OSC_TIMER_CTRL if value != 0 => {
                self.osc_measurements += 1;
                let count = self.osc_count();
                self.regs.insert(sys::OSC_TIMER_CNT, count);
                let done = u32::from(!self.osc_timer_stuck);
                self.regs.insert(sys::OSC_TIMER_STATUS, done);
            }
            _ => {}
        }
    }
}

impl Interface for MockInterface {
    async fn read_reg32(&mut self, addr: u32) -> Result<u32, Error> {
        if self.bus_error_addr == Some(addr) {
            return Err(Error::Bus);
        }
        let value = match addr {
            flash::FLAINT => {
                if self.stuck_busy {
                    flaint::BUSY
                } else {
                    0
                }
            }
            flash::FLAWP => {
                if self.unlocked {
                    flawp::UNLOCKED
                } else {
                    0
                }
            }
            flash::FLA_RDAT => {
                let (selector, offset) = Self::split(self.read_addr);
                self.read_addr += 1;
                self.mats
                    .get(&selector)
                    .and_then(|storage| storage.get(offset).copied())
                    .unwrap_or(layout::ERASED)
            }
            sys::ROMINFO => self.rominfo_override.unwrap_or(self.rominfo),
            _ => self.reg(addr),
        };
        Ok(value)
    }

    async fn write_reg32(&mut self, addr: u32, value: u32) -> Result<(), Error> {
        if self.bus_error_addr == Some(addr) {
            return Err(Error::Bus);
        }
        self.regs.insert(addr, value);
        self.writes.push((addr, value));
        self.on_write(addr, value);
        Ok(())
    }

    async fn burst_write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        if self.bus_error_addr == Some(addr) {
            return Err(Error::Bus);
        }
        self.bursts.push((addr, data.to_vec()));
        if addr == ram::PMEM_WRITE {
            self.pmem.extend_from_slice(data);
        } else {
            for (index, base) in [ram::FLASH_BUFFER_A, ram::FLASH_BUFFER_B]
                .into_iter()
                .enumerate()
            {
                if (base..base + 0x100).contains(&addr) {
                    let offset = ((addr - base) * 4) as usize;
                    let buffer = &mut self.program_buffers[index];
                    if offset == 0 {
                        buffer.clear();
                    }
                    buffer.truncate(offset);
                    buffer.extend_from_slice(data);
                }
            }
        }
        Ok(())
    }

    async fn burst_read(&mut self, addr: u32, buffer: &mut [u8]) -> Result<(), Error> {
        if self.bus_error_addr == Some(addr) {
            return Err(Error::Bus);
        }
        for (index, chunk) in buffer.chunks_mut(4).enumerate() {
            let word = self.reg(addr + index as u32 * 4).to_be_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
        Ok(())
    }
}

#[derive(Default, Debug)]
pub(crate) struct MockDelay {
    pub(crate) calls: u32,
    pub(crate) total_us: u64,
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_us += u64::from(ns / 1_000);
    }
}
