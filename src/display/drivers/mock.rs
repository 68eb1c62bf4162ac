/*
 *  display/drivers/mock.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock bus, pins, delay and allocator for running without hardware
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use display_interface::{DataFormat, DisplayError as InterfaceError, WriteOnlyDataCommand};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};

use crate::display::buffers::Allocator;

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One call on the mock bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Command(Vec<u8>),
    Data(Vec<u8>),
}

/// Shared state behind a [`MockInterface`], inspectable from tests
#[derive(Debug)]
pub struct MockBusState {
    /// Every successful call in order; only filled while `keep_history` is set
    pub transactions: Vec<Transaction>,
    pub keep_history: bool,

    /// Successful call counters, kept regardless of history
    pub command_writes: usize,
    pub data_writes: usize,
    pub data_bytes: usize,

    /// Last value written to each register in the 0x90 bank
    pub registers: HashMap<u8, u8>,
    bank: u8,

    /// Simulate failures (for error testing)
    pub simulate_command_failure: bool,
    pub simulate_data_failure: bool,
    /// Fail every data write once this many have succeeded
    pub fail_data_after: Option<usize>,
}

impl Default for MockBusState {
    fn default() -> Self {
        Self {
            transactions: Vec::new(),
            keep_history: true,
            command_writes: 0,
            data_writes: 0,
            data_bytes: 0,
            registers: HashMap::new(),
            bank: 0,
            simulate_command_failure: false,
            simulate_data_failure: false,
            fail_data_after: None,
        }
    }
}

impl MockBusState {
    /// Total successful calls on either channel
    pub fn bus_writes(&self) -> usize {
        self.command_writes + self.data_writes
    }

    /// Command bytes across the recorded history, flattened
    pub fn command_stream(&self) -> Vec<u8> {
        self.transactions
            .iter()
            .filter_map(|t| match t {
                Transaction::Command(bytes) => Some(bytes.as_slice()),
                Transaction::Data(_) => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Data bytes across the recorded history, flattened
    pub fn data_stream(&self) -> Vec<u8> {
        self.transactions
            .iter()
            .filter_map(|t| match t {
                Transaction::Data(bytes) => Some(bytes.as_slice()),
                Transaction::Command(_) => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Value of a 0x90-bank register as last programmed
    pub fn register(&self, reg: u8) -> Option<u8> {
        self.registers.get(&reg).copied()
    }

    /// Forget history and counters, keep failure switches and registers
    pub fn clear_history(&mut self) {
        self.transactions.clear();
        self.command_writes = 0;
        self.data_writes = 0;
        self.data_bytes = 0;
    }

    /// Commands travel as (register, value) pairs; 0xEF selects the bank
    fn track_registers(&mut self, bytes: &[u8]) {
        for pair in bytes.chunks_exact(2) {
            match pair[0] {
                0xEF => self.bank = pair[1],
                reg if self.bank == 0x90 => {
                    self.registers.insert(reg, pair[1]);
                }
                _ => {}
            }
        }
    }
}

/// Command/data transport that records instead of clocking bytes out
#[derive(Debug, Clone, Default)]
pub struct MockInterface {
    state: Arc<Mutex<MockBusState>>,
}

impl MockInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters only, for long emulated runs
    pub fn without_history() -> Self {
        let bus = Self::default();
        lock(&bus.state).keep_history = false;
        bus
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockBusState>> {
        Arc::clone(&self.state)
    }
}

fn collect_bytes(format: DataFormat<'_>) -> Result<Vec<u8>, InterfaceError> {
    let bytes = match format {
        DataFormat::U8(slice) => slice.to_vec(),
        DataFormat::U16(words) => words.iter().flat_map(|w| w.to_ne_bytes()).collect(),
        DataFormat::U16BE(words) => words.iter().flat_map(|w| w.to_be_bytes()).collect(),
        DataFormat::U16LE(words) => words.iter().flat_map(|w| w.to_le_bytes()).collect(),
        DataFormat::U8Iter(iter) => iter.collect(),
        DataFormat::U16BEIter(iter) => iter.flat_map(|w| w.to_be_bytes()).collect(),
        DataFormat::U16LEIter(iter) => iter.flat_map(|w| w.to_le_bytes()).collect(),
        _ => return Err(InterfaceError::DataFormatNotImplemented),
    };
    Ok(bytes)
}

impl WriteOnlyDataCommand for MockInterface {
    fn send_commands(&mut self, cmd: DataFormat<'_>) -> Result<(), InterfaceError> {
        let mut state = lock(&self.state);
        if state.simulate_command_failure {
            return Err(InterfaceError::BusWriteError);
        }

        let bytes = collect_bytes(cmd)?;
        state.track_registers(&bytes);
        state.command_writes += 1;
        if state.keep_history {
            state.transactions.push(Transaction::Command(bytes));
        }
        Ok(())
    }

    fn send_data(&mut self, buf: DataFormat<'_>) -> Result<(), InterfaceError> {
        let mut state = lock(&self.state);
        let over_budget = state.fail_data_after.is_some_and(|n| state.data_writes >= n);
        if state.simulate_data_failure || over_budget {
            return Err(InterfaceError::BusWriteError);
        }

        let bytes = collect_bytes(buf)?;
        state.data_writes += 1;
        state.data_bytes += bytes.len();
        if state.keep_history {
            state.transactions.push(Transaction::Data(bytes));
        }
        Ok(())
    }
}

/// Error raised by a [`MockPin`] with failure simulation on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl fmt::Display for MockPinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("simulated GPIO failure")
    }
}

impl digital::Error for MockPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Default)]
pub struct MockPinState {
    /// Every level driven, `true` for high
    pub levels: Vec<bool>,
    pub simulate_failure: bool,
}

/// Output line recording the levels it is driven to
#[derive(Debug, Clone, Default)]
pub struct MockPin {
    state: Arc<Mutex<MockPinState>>,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Arc<Mutex<MockPinState>> {
        Arc::clone(&self.state)
    }

    fn drive(&mut self, level: bool) -> Result<(), MockPinError> {
        let mut state = lock(&self.state);
        if state.simulate_failure {
            return Err(MockPinError);
        }
        state.levels.push(level);
        Ok(())
    }
}

impl ErrorType for MockPin {
    type Error = MockPinError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true)
    }
}

/// Delay that records requested waits in nanoseconds without sleeping
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    waits: Arc<Mutex<Vec<u64>>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Arc<Mutex<Vec<u64>>> {
        Arc::clone(&self.waits)
    }

    /// Recorded waits rounded down to whole milliseconds
    pub fn waits_ms(&self) -> Vec<u64> {
        lock(&self.waits).iter().map(|ns| ns / 1_000_000).collect()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        lock(&self.waits).push(ns as u64);
    }

    fn delay_us(&mut self, us: u32) {
        lock(&self.waits).push(us as u64 * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        lock(&self.waits).push(ms as u64 * 1_000_000);
    }
}

/// Switches and request log for a [`FlakyAllocator`]
#[derive(Debug, Default)]
pub struct AllocStats {
    pub fail_coherent: bool,
    pub fail_regular: bool,
    pub fail_transient: bool,

    pub coherent_requests: Vec<usize>,
    pub regular_requests: Vec<usize>,
    pub transient_requests: Vec<usize>,
}

/// Allocator whose tiers can be made to fail, before or after attach
#[derive(Debug, Clone, Default)]
pub struct FlakyAllocator {
    stats: Arc<Mutex<AllocStats>>,
}

impl FlakyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_coherent(self) -> Self {
        lock(&self.stats).fail_coherent = true;
        self
    }

    pub fn fail_regular(self) -> Self {
        lock(&self.stats).fail_regular = true;
        self
    }

    pub fn fail_transient(self) -> Self {
        lock(&self.stats).fail_transient = true;
        self
    }

    pub fn stats(&self) -> Arc<Mutex<AllocStats>> {
        Arc::clone(&self.stats)
    }
}

impl Allocator for FlakyAllocator {
    fn coherent(&mut self, len: usize) -> Option<Vec<u8>> {
        let mut stats = lock(&self.stats);
        stats.coherent_requests.push(len);
        (!stats.fail_coherent).then(|| vec![0; len])
    }

    fn regular(&mut self, len: usize) -> Option<Vec<u8>> {
        let mut stats = lock(&self.stats);
        stats.regular_requests.push(len);
        (!stats.fail_regular).then(|| vec![0; len])
    }

    fn transient(&mut self, len: usize) -> Option<Vec<u8>> {
        let mut stats = lock(&self.stats);
        stats.transient_requests.push(len);
        (!stats.fail_transient).then(|| vec![0; len])
    }
}
