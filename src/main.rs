/*
 *  main.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
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

use anyhow::Context;
use display_interface::WriteOnlyDataCommand;
use display_interface_spi::SPIInterface;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use env_logger::Env;
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::sysfs_gpio::Direction;
use linux_embedded_hal::{Delay, SpidevDevice, SysfsPin};
use log::{debug, error, info, warn};
use tokio::signal::unix::{signal, SignalKind};

use ls020::config::{self, BusConfig, Config, DEFAULT_SPI_SPEED_HZ};
use ls020::display::drivers::mock::{MockDelay, MockInterface, MockPin};
use ls020::display::{Canvas, DisplayError, EngineSettings, Ls020, SystemAllocator, UpdateOutcome};
use ls020::pacer::Pacer;
use ls020::patterns::{Program, Scene};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for a SIGINT, SIGTERM, or SIGHUP signal.
async fn signal_handler() -> Result<(), std::io::Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

/// Export a sysfs GPIO as a low output
fn output_pin(number: u64, label: &str) -> Result<SysfsPin, DisplayError> {
    let pin = SysfsPin::new(number);
    pin.export()
        .map_err(|e| DisplayError::GpioError(format!("exporting {label} GPIO {number}: {e}")))?;
    pin.set_direction(Direction::Low)
        .map_err(|e| DisplayError::GpioError(format!("setting {label} GPIO {number} as output: {e}")))?;
    Ok(pin)
}

/// Open spidev and the DC/RST lines
fn open_bus(bus: &BusConfig) -> Result<(SPIInterface<SpidevDevice, SysfsPin>, SysfsPin), DisplayError> {
    let BusConfig::Spi { bus, speed_hz, dc_pin, rst_pin } = bus;

    let mut spi = SpidevDevice::open(bus)
        .map_err(|e| DisplayError::SpiError(format!("Failed to open SPI {bus}: {e:?}")))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(speed_hz.unwrap_or(DEFAULT_SPI_SPEED_HZ))
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.configure(&options)
        .map_err(|e| DisplayError::SpiError(format!("Failed to configure SPI {bus}: {e}")))?;

    let dc = output_pin(u64::from(*dc_pin), "DC")?;
    let rst = output_pin(u64::from(*rst_pin), "RST")?;

    info!("SPI {} at {} Hz, DC GPIO {}, RST GPIO {}",
          bus, speed_hz.unwrap_or(DEFAULT_SPI_SPEED_HZ), dc_pin, rst_pin);

    Ok((SPIInterface::new(spi, dc), rst))
}

/// Cycle the diagnostic program on a canvas until cancelled
async fn run_program(program: Program, mut canvas: Canvas) {
    let steps = program.steps();
    loop {
        for step in &steps {
            debug!("Pattern: {}", step.name);
            // canvas drawing cannot fail
            let _ = step.scene.draw(&mut canvas);
            tokio::time::sleep(step.hold).await;
        }
    }
}

/// Boot bars, then the paced update loop until a signal arrives
async fn drive<DI, RST, D>(mut panel: Ls020<DI, RST, D>, program: Program) -> anyhow::Result<()>
where
    DI: WriteOnlyDataCommand,
    RST: OutputPin,
    D: DelayNs,
{
    let mut canvas = panel.canvas();
    let _ = Scene::BootBars.draw(&mut canvas);
    panel.update(None).context("drawing boot bars")?;

    let patterns = tokio::spawn(run_program(program, canvas));
    let mut pacer = Pacer::new(panel.fps());
    let mut failures = 0u64;

    let shutdown = signal_handler();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                if let Err(e) = res {
                    error!("Signal handler failed: {}", e);
                }
                break;
            }
            _ = tokio::time::sleep(pacer.until_next()) => {
                if !pacer.should_flush() {
                    continue;
                }
                match panel.update(None) {
                    Ok(UpdateOutcome::Sent { region, tier, .. }) => {
                        debug!("Sent {}x{} via {}", region.width(), region.height(), tier);
                    }
                    Ok(UpdateOutcome::Unchanged) => {}
                    Err(e) => {
                        failures += 1;
                        // the region stays pending, next tick retries it
                        warn!("Update failed ({} so far): {}", failures, e);
                    }
                }
            }
        }
    }

    patterns.abort();
    drop(panel.release());
    info!("Panel released");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg: Config = config::load()?;

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_filter()))
        .format_timestamp_secs()
        .init();

    info!("{} - Siemens S65 LS020 panel", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let display = cfg.display();
    let settings: EngineSettings = display.engine_settings()?;
    let program = cfg.program();

    if cfg.is_emulated() {
        info!("Emulation mode enabled - using mock bus");
        let panel = Ls020::attach(
            MockInterface::without_history(),
            MockPin::new(),
            MockDelay::new(),
            settings,
            Box::new(SystemAllocator),
        )?;
        return drive(panel, program).await;
    }

    let (interface, rst) = open_bus(&display.bus())
        .inspect_err(|e| error!("Bus setup failed: {}", e))?;
    let panel = Ls020::attach(interface, rst, Delay, settings, Box::new(SystemAllocator))
        .inspect_err(|e| error!("Panel attach failed: {}", e))?;
    drive(panel, program).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_spidev_is_spi_error() {
        let bus = BusConfig::Spi {
            bus: "/dev/spidev-none.0".into(),
            speed_hz: None,
            dc_pin: 24,
            rst_pin: 25,
        };
        assert!(matches!(open_bus(&bus), Err(DisplayError::SpiError(msg)) if msg.contains("/dev/spidev-none.0")));
    }
}
