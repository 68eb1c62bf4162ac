/*
 *  display/sequencer.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Controller command sequences: reset, init tables, scan direction,
 *  addressing window and pixel data
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

use display_interface::{DataFormat, WriteOnlyDataCommand};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, error, info};

use crate::display::error::DisplayError;
use crate::display::framebuffer::pack_pixel;
use crate::display::orientation::{Orientation, Window};

/// Register bank select; the value picks the bank for the pairs that follow
const BANK_SELECT: u8 = 0xEF;

/// Bank holding the scan-direction and window registers
const BANK_90: u8 = 0x90;

/// First init table, sent right after reset
pub const INIT_TABLE_0: [u8; 20] = [
    0xEF, 0x00, 0xEE, 0x04, 0x1B, 0x04, 0xFE, 0xFE,
    0xFE, 0xFE, 0xEF, 0x90, 0x4A, 0x04, 0x7F, 0x3F,
    0xEE, 0x04, 0x43, 0x06,
];

/// Second init table, sent after the settle delay
pub const INIT_TABLE_1: [u8; 46] = [
    0xEF, 0x90, 0x09, 0x83, 0x08, 0x00, 0x0B, 0xAF,
    0x0A, 0x00, 0x05, 0x00, 0x06, 0x00, 0x07, 0x00,
    0xEF, 0x00, 0xEE, 0x0C, 0xEF, 0x90, 0x00, 0x80,
    0xEF, 0xB0, 0x49, 0x02, 0xEF, 0x00, 0x7F, 0x01,
    0xE1, 0x81, 0xE2, 0x02, 0xE2, 0x76, 0xE1, 0x83,
    0x80, 0x01, 0xEF, 0x90, 0x00, 0x00,
];

pub const RESET_PULSE_MS: u32 = 50;
pub const INIT_SETTLE_MS: u32 = 7;

/// Pulse the reset line: low, hold, high, hold
pub fn hard_reset<RST, D>(rst: &mut RST, delay: &mut D) -> Result<(), DisplayError>
where
    RST: OutputPin,
    D: DelayNs,
{
    debug!("Resetting display...");
    rst.set_low()
        .map_err(|e| DisplayError::GpioError(format!("reset low: {:?}", e)))?;
    delay.delay_ms(RESET_PULSE_MS);
    rst.set_high()
        .map_err(|e| DisplayError::GpioError(format!("reset high: {:?}", e)))?;
    delay.delay_ms(RESET_PULSE_MS);
    debug!("Reset complete");
    Ok(())
}

/// Send both init tables on the command channel.
///
/// A failed write aborts the sequence; the panel is left half configured
/// and the caller must reset before trying again.
pub fn initialize<DI, D>(di: &mut DI, delay: &mut D) -> Result<(), DisplayError>
where
    DI: WriteOnlyDataCommand,
    D: DelayNs,
{
    info!("Initializing display...");

    di.send_commands(DataFormat::U8(&INIT_TABLE_0)).map_err(|e| {
        error!("Init table 0 failed: {:?}", e);
        DisplayError::from(e)
    })?;

    delay.delay_ms(INIT_SETTLE_MS);

    di.send_commands(DataFormat::U8(&INIT_TABLE_1)).map_err(|e| {
        error!("Init table 1 failed: {:?}", e);
        DisplayError::from(e)
    })?;

    info!("Display initialization complete");
    Ok(())
}

/// Program the scan-direction registers for `orientation`
pub fn configure_rotation<DI>(di: &mut DI, orientation: Orientation) -> Result<(), DisplayError>
where
    DI: WriteOnlyDataCommand,
{
    let (val01, val05) = orientation.scan_registers();
    di.send_commands(DataFormat::U8(&[BANK_SELECT, BANK_90, 0x01, val01, 0x05, val05]))?;
    info!("Display rotation set to {} degrees", orientation.degrees());
    Ok(())
}

/// Bank select followed by the six window register pairs
pub fn window_commands(window: &Window) -> [u8; 14] {
    let mut cmds = [0u8; 14];
    cmds[0] = BANK_SELECT;
    cmds[1] = BANK_90;
    for (i, (reg, val)) in window.registers().into_iter().enumerate() {
        cmds[2 + i * 2] = reg;
        cmds[3 + i * 2] = val;
    }
    cmds
}

pub fn program_window<DI>(di: &mut DI, window: &Window) -> Result<(), DisplayError>
where
    DI: WriteOnlyDataCommand,
{
    di.send_commands(DataFormat::U8(&window_commands(window)))?;
    Ok(())
}

/// Packed pixel bytes in one data-channel write
pub fn write_pixels<DI>(di: &mut DI, bytes: &[u8]) -> Result<(), DisplayError>
where
    DI: WriteOnlyDataCommand,
{
    di.send_data(DataFormat::U8(bytes))?;
    Ok(())
}

/// Slow path: a single pixel as its own 2-byte data write
pub fn write_pixel<DI>(di: &mut DI, pixel: u16) -> Result<(), DisplayError>
where
    DI: WriteOnlyDataCommand,
{
    di.send_data(DataFormat::U8(&pack_pixel(pixel)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::mock::{MockDelay, MockInterface, MockPin, Transaction};
    use crate::display::geometry::Rect;

    #[test]
    fn test_init_tables_on_command_channel_with_settle() {
        let mut bus = MockInterface::new();
        let mut delay = MockDelay::new();
        initialize(&mut bus, &mut delay).unwrap();

        let state = bus.state();
        let state = state.lock().unwrap();
        assert_eq!(state.transactions, vec![
            Transaction::Command(INIT_TABLE_0.to_vec()),
            Transaction::Command(INIT_TABLE_1.to_vec()),
        ]);
        assert_eq!(state.data_writes, 0);
        assert_eq!(delay.waits_ms(), vec![7]);
    }

    #[test]
    fn test_init_aborts_on_first_failure() {
        let mut bus = MockInterface::new();
        bus.state().lock().unwrap().simulate_command_failure = true;
        let mut delay = MockDelay::new();

        let err = initialize(&mut bus, &mut delay).unwrap_err();
        assert!(err.is_transport());
        assert!(delay.waits_ms().is_empty());
    }

    #[test]
    fn test_reset_pulse() {
        let mut rst = MockPin::new();
        let mut delay = MockDelay::new();
        hard_reset(&mut rst, &mut delay).unwrap();
        assert_eq!(rst.state().lock().unwrap().levels, vec![false, true]);
        assert_eq!(delay.waits_ms(), vec![50, 50]);
    }

    #[test]
    fn test_reset_gpio_failure() {
        let mut rst = MockPin::new();
        rst.state().lock().unwrap().simulate_failure = true;
        let mut delay = MockDelay::new();
        assert!(matches!(hard_reset(&mut rst, &mut delay), Err(DisplayError::GpioError(_))));
    }

    #[test]
    fn test_rotation_registers() {
        let mut bus = MockInterface::new();
        configure_rotation(&mut bus, Orientation::Deg180).unwrap();
        let state = bus.state();
        let state = state.lock().unwrap();
        assert_eq!(state.command_stream(), vec![0xEF, 0x90, 0x01, 0x80, 0x05, 0x04]);
        assert_eq!(state.register(0x01), Some(0x80));
    }

    #[test]
    fn test_full_frame_window_sequence() {
        let window = Orientation::Deg0.window(Rect::new(0, 0, 175, 131)).unwrap();
        assert_eq!(
            window_commands(&window),
            [0xEF, 0x90, 0x08, 0x00, 0x09, 0x83, 0x0A, 0xAF, 0x0B, 0x00, 0x06, 0x00, 0x07, 0xAF]
        );
    }

    #[test]
    fn test_pixel_data_on_data_channel() {
        let mut bus = MockInterface::new();
        write_pixels(&mut bus, &[1, 2, 3, 4]).unwrap();
        write_pixel(&mut bus, 0xF800).unwrap();
        let state = bus.state();
        let state = state.lock().unwrap();
        assert_eq!(state.command_writes, 0);
        assert_eq!(state.data_stream(), vec![1, 2, 3, 4, 0xF8, 0x00]);
    }
}
