/*
 *  tests/engine_integration.rs
 *
 *  Integration tests for the LS020 update engine
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 */

use std::sync::{Arc, Mutex, MutexGuard};

use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

use ls020::config;
use ls020::display::drivers::mock::{MockBusState, MockDelay, MockInterface, MockPin, Transaction};
use ls020::display::sequencer::window_commands;
use ls020::display::{
    DamageStrategy, DisplayDriver, DisplayError, EngineSettings, Ls020, Orientation, Rect,
    SystemAllocator, Tier, UpdateOutcome, Window, FRAME_BYTES, FRAME_PIXELS, WIDTH,
};
use ls020::patterns::{Program, Scene, COLOR_CYCLE};

type Panel = Ls020<MockInterface, MockPin, MockDelay>;

struct Rig {
    panel: Panel,
    bus: Arc<Mutex<MockBusState>>,
}

impl Rig {
    fn bus(&self) -> MutexGuard<'_, MockBusState> {
        self.bus.lock().unwrap()
    }
}

fn attach(settings: EngineSettings) -> Rig {
    let interface = MockInterface::new();
    let bus = interface.state();
    let panel = Ls020::attach(interface, MockPin::new(), MockDelay::new(), settings, Box::new(SystemAllocator))
        .unwrap();
    Rig { panel, bus }
}

/// Attached, first full frame sent, history cleared
fn synced() -> Rig {
    let mut rig = attach(EngineSettings::default());
    rig.panel.update(None).unwrap();
    rig.bus().clear_history();
    rig
}

#[test]
fn test_canvas_rectangle_sent_as_partial_update() {
    let mut rig = synced();
    let mut canvas = rig.panel.canvas();
    Rectangle::new(Point::new(20, 30), Size::new(4, 3))
        .into_styled(PrimitiveStyle::with_fill(Rgb565::RED))
        .draw(&mut canvas)
        .unwrap();

    let outcome = rig.panel.update(None).unwrap();
    let region = Rect::new(20, 30, 23, 32);
    assert_eq!(outcome, UpdateOutcome::Sent {
        region,
        tier: Tier::Dma,
        window_programmed: true,
        bytes: 24,
    });

    let bus = rig.bus();
    let window = Orientation::Deg0.window(region).unwrap();
    assert_eq!(bus.command_stream(), window_commands(&window).to_vec());
    assert_eq!(bus.data_stream(), [0xF8, 0x00].repeat(12));
}

#[test]
fn test_nothing_drawn_nothing_sent() {
    let mut rig = synced();
    for _ in 0..5 {
        assert_eq!(rig.panel.update(None).unwrap(), UpdateOutcome::Unchanged);
    }
    assert_eq!(rig.bus().bus_writes(), 0);
}

#[test]
fn test_drawing_from_another_thread() {
    let mut rig = synced();
    let mut canvas = rig.panel.canvas();

    let painter = std::thread::spawn(move || {
        for i in 0..200i32 {
            Pixel(Point::new(i * 7 % 176, i % 132), Rgb565::GREEN)
                .draw(&mut canvas)
                .unwrap();
        }
    });
    for _ in 0..20 {
        rig.panel.update(None).unwrap();
    }
    painter.join().unwrap();

    // whatever landed behind the last scan goes now
    rig.panel.update(None).unwrap();
    assert_eq!(rig.panel.shadow().unwrap(), rig.panel.frame().snapshot().as_slice());
    assert_eq!(rig.panel.update(None).unwrap(), UpdateOutcome::Unchanged);
}

/// What the panel glass holds, rebuilt from the bus traffic (landscape only)
struct PanelModel {
    pixels: Vec<u16>,
    window: Option<Rect>,
}

impl PanelModel {
    fn new() -> Self {
        Self { pixels: vec![0; FRAME_PIXELS], window: None }
    }

    /// Apply and forget everything recorded on the bus so far
    fn replay(&mut self, bus: &mut MockBusState) {
        for t in std::mem::take(&mut bus.transactions) {
            match t {
                Transaction::Command(bytes) if bytes.len() == 14 && bytes[..2] == [0xEF, 0x90] => {
                    let value = |i: usize| bytes[3 + i * 2];
                    let window = Window {
                        a_start: value(0),
                        a_end: value(1),
                        b_start: value(2),
                        b_end: value(3),
                        cursor_a: value(4),
                        cursor_b: value(5),
                    };
                    self.window = Some(Orientation::Deg0.logical(&window));
                }
                Transaction::Command(_) => {}
                Transaction::Data(bytes) => {
                    let rect = self.window.expect("pixels sent before any window");
                    let mut pairs = bytes.chunks_exact(2);
                    for y in rect.y0..=rect.y1 {
                        for x in rect.x0..=rect.x1 {
                            let pair = pairs.next().expect("short pixel write");
                            self.pixels[y as usize * WIDTH as usize + x as usize] =
                                u16::from_be_bytes([pair[0], pair[1]]);
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn test_marks_not_lost_while_updating() {
    let settings = EngineSettings { damage: DamageStrategy::Marks, ..Default::default() };
    let mut rig = attach(settings);
    rig.bus().clear_history();
    let mut model = PanelModel::new();

    let frame = Arc::clone(rig.panel.frame());
    let mut canvas = rig.panel.canvas();
    let painter = std::thread::spawn(move || {
        for i in 0..3000i32 {
            let color = Rgb565::from(RawU16::new((i as u16).wrapping_mul(31) | 1));
            Rectangle::new(Point::new(i * 13 % 170, i * 7 % 128), Size::new(1 + (i % 5) as u32, 2))
                .into_styled(PrimitiveStyle::with_fill(color))
                .draw(&mut canvas)
                .unwrap();
        }
    });

    while !painter.is_finished() {
        rig.panel.update(None).unwrap();
        model.replay(&mut rig.bus());
    }
    painter.join().unwrap();

    // anything the glass is missing must still be reported as pending
    let pending = rig.panel.dirty().pending();
    for (i, (&shown, wanted)) in model.pixels.iter().zip(frame.snapshot()).enumerate() {
        if shown != wanted {
            let (x, y) = ((i % WIDTH as usize) as u16, (i / WIDTH as usize) as u16);
            assert!(
                pending.is_some_and(|r| r.contains(x, y)),
                "({}, {}) shows {:#06x}, frame has {:#06x}, pending {:?}", x, y, shown, wanted, pending
            );
        }
    }

    rig.panel.update(None).unwrap();
    model.replay(&mut rig.bus());
    assert_eq!(model.pixels, frame.snapshot());
}

#[test]
fn test_colour_program_full_frames_share_one_window() {
    let mut rig = synced();
    let mut canvas = rig.panel.canvas();
    let steps = Program::Colors.steps();

    for step in &steps {
        step.scene.draw(&mut canvas).unwrap();
        match rig.panel.update(None).unwrap() {
            UpdateOutcome::Sent { region, window_programmed, bytes, .. } => {
                assert_eq!(region, Rect::new(0, 0, 175, 131), "step {}", step.name);
                assert!(!window_programmed, "step {}", step.name);
                assert_eq!(bytes, FRAME_BYTES);
            }
            UpdateOutcome::Unchanged => panic!("step {} sent nothing", step.name),
        }
    }

    let bus = rig.bus();
    assert_eq!(bus.command_writes, 0);
    assert_eq!(bus.data_bytes, steps.len() * FRAME_BYTES);
}

#[test]
fn test_rotation_round_trip() {
    let mut rig = synced();

    let turns = [Orientation::Deg90, Orientation::Deg180, Orientation::Deg270, Orientation::Deg0];
    for (orientation, (_, color)) in turns.into_iter().zip(COLOR_CYCLE) {
        rig.panel.set_orientation(orientation).unwrap();
        let (mode, entry) = orientation.scan_registers();
        assert_eq!(rig.bus().register(0x01), Some(mode));
        assert_eq!(rig.bus().register(0x05), Some(entry));

        // content is unknown after a rotation, so the whole frame goes first
        match rig.panel.update(None).unwrap() {
            UpdateOutcome::Sent { region, .. } => {
                assert!(region.is_full(orientation.logical_size()))
            }
            UpdateOutcome::Unchanged => panic!("rotation to {:?} sent nothing", orientation),
        }

        let mut canvas = rig.panel.canvas();
        // the frame is reinterpreted, not cleared, so each turn needs a new colour
        Pixel(Point::new(1, 2), color).draw(&mut canvas).unwrap();
        rig.panel.update(None).unwrap();

        let window = orientation.window(Rect::new(1, 2, 1, 2)).unwrap();
        let bus = rig.bus();
        for (reg, value) in window.registers() {
            assert_eq!(bus.register(reg), Some(value), "{:?} register {:#04x}", orientation, reg);
        }
    }

    assert_eq!(rig.panel.orientation(), Orientation::Deg0);
}

#[test]
fn test_portrait_rejects_landscape_rectangle() {
    let mut rig = synced();
    rig.panel.set_orientation(Orientation::Deg90).unwrap();
    let result = rig.panel.update(Some(Rect::new(150, 0, 175, 10)));
    // marks are clamped to the portrait frame, the diff still finds the full frame
    assert!(result.is_ok());
    assert!(matches!(
        Orientation::Deg90.window(Rect::new(150, 0, 175, 10)),
        Err(DisplayError::OutOfBounds { width: 132, height: 176, .. })
    ));
}

#[test]
fn test_failed_update_recovers_on_next_tick() {
    let mut rig = synced();
    let mut canvas = rig.panel.canvas();
    Rectangle::new(Point::new(100, 100), Size::new(2, 2))
        .into_styled(PrimitiveStyle::with_fill(Rgb565::BLUE))
        .draw(&mut canvas)
        .unwrap();

    rig.bus().simulate_data_failure = true;
    assert!(rig.panel.update(None).is_err());
    assert!(!rig.panel.window_cached());

    rig.bus().simulate_data_failure = false;
    rig.bus().clear_history();
    match rig.panel.update(None).unwrap() {
        UpdateOutcome::Sent { region, window_programmed, .. } => {
            assert_eq!(region, Rect::new(100, 100, 101, 101));
            assert!(window_programmed);
        }
        UpdateOutcome::Unchanged => panic!("failed region was lost"),
    }
    assert_eq!(rig.bus().data_stream(), [0x00, 0x1F].repeat(4));
}

#[test]
fn test_yaml_marks_strategy() {
    let cfg = config::parse_yaml("display:\n  damage: marks\n  fps: 0\n").unwrap();
    let settings = cfg.display().engine_settings().unwrap();
    let mut rig = attach(settings);

    assert_eq!(rig.panel.fps(), 40);
    assert!(rig.panel.shadow().is_none());
    assert!(rig.panel.partial_update());

    // nothing marked: the full frame goes
    match rig.panel.update(None).unwrap() {
        UpdateOutcome::Sent { region, .. } => assert_eq!(region, Rect::new(0, 0, 175, 131)),
        UpdateOutcome::Unchanged => panic!("first update sent nothing"),
    }

    let mut canvas = rig.panel.canvas();
    Pixel(Point::new(5, 6), Rgb565::YELLOW).draw(&mut canvas).unwrap();
    match rig.panel.update(None).unwrap() {
        UpdateOutcome::Sent { region, .. } => assert_eq!(region, Rect::new(5, 6, 5, 6)),
        UpdateOutcome::Unchanged => panic!("marked pixel sent nothing"),
    }
}

#[test]
fn test_driver_trait_object() {
    let rig = synced();
    let mut driver: Box<dyn DisplayDriver> = Box::new(rig.panel);

    assert_eq!(driver.dimensions(), (176, 132));
    assert!(driver.capabilities().supports_partial_update);
    assert_eq!(driver.capabilities().bits_per_pixel, 16);

    driver.set_rotation(270).unwrap();
    assert_eq!(driver.dimensions(), (132, 176));
    assert!(matches!(driver.set_rotation(45), Err(DisplayError::InvalidRotation(45))));
    assert!(matches!(driver.set_brightness(10), Err(DisplayError::UnsupportedOperation)));
    assert!(matches!(
        driver.write_buffer(&[0u8; 10]),
        Err(DisplayError::BufferSizeMismatch { expected: FRAME_BYTES, actual: 10 })
    ));

    driver.write_buffer(&vec![0xFFu8; FRAME_BYTES]).unwrap();
    driver.clear().unwrap();
    driver.flush().unwrap();
}

#[test]
fn test_boot_bars_on_attach() {
    let mut rig = attach(EngineSettings::default());
    let mut canvas = rig.panel.canvas();
    Scene::BootBars.draw(&mut canvas).unwrap();
    rig.bus().clear_history();
    rig.panel.update(None).unwrap();

    let data = rig.bus().data_stream();
    assert_eq!(data.len(), FRAME_BYTES);
    assert_eq!(&data[..2], &[0xF8, 0x00]);
    assert_eq!(&data[FRAME_BYTES - 2..], &[0x00, 0x1F]);
}
