/*
 *  patterns.rs
 *
 *  LS020 - S65 panel driver
 *  (c) 2020-26 Stuart Hunter
 *
 *  Boot bars and the panel diagnostic programs
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

use std::time::Duration;

use clap::ValueEnum;
use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment};
use serde::{Deserialize, Serialize};

use crate::display::framebuffer::rgb_to_rgb565;

/// Checkerboard cell edge in pixels
pub const CHECKER_CELL: u32 = 8;

/// Colours shown by the colour cycle, in order
pub const COLOR_CYCLE: [(&str, Rgb565); 7] = [
    ("red", Rgb565::RED),
    ("green", Rgb565::GREEN),
    ("blue", Rgb565::BLUE),
    ("yellow", Rgb565::YELLOW),
    ("cyan", Rgb565::CYAN),
    ("magenta", Rgb565::MAGENTA),
    ("white", Rgb565::WHITE),
];

/// Which diagnostic sequence the binary runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Program {
    Colors,
    Patterns,
    Graphics,
    #[default]
    All,
}

/// One full-screen picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    Fill(Rgb565),
    BootBars,
    Checkerboard,
    Gradient,
    Graphics,
}

/// A scene and how long it stays up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub name: &'static str,
    pub scene: Scene,
    pub hold: Duration,
}

const fn step(name: &'static str, scene: Scene, secs: u64) -> Step {
    Step { name, scene, hold: Duration::from_secs(secs) }
}

impl Program {
    pub fn steps(self) -> Vec<Step> {
        let blank = step("black", Scene::Fill(Rgb565::BLACK), 0);
        let colors: Vec<Step> = COLOR_CYCLE
            .iter()
            .map(|&(name, color)| step(name, Scene::Fill(color), 1))
            .chain(std::iter::once(blank))
            .collect();
        let patterns = [
            step("checkerboard", Scene::Checkerboard, 2),
            step("gradient", Scene::Gradient, 2),
            blank,
        ];
        let graphics = [step("graphics", Scene::Graphics, 3), blank];

        match self {
            Program::Colors => colors,
            Program::Patterns => patterns.to_vec(),
            Program::Graphics => graphics.to_vec(),
            Program::All => colors.iter().chain(&patterns).chain(&graphics).copied().collect(),
        }
    }
}

impl Scene {
    pub fn draw<D>(&self, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        match *self {
            Scene::Fill(color) => target.clear(color),
            Scene::BootBars => boot_bars(target),
            Scene::Checkerboard => checkerboard(target, CHECKER_CELL),
            Scene::Gradient => grey_gradient(target),
            Scene::Graphics => graphics(target),
        }
    }
}

/// Red, green and blue thirds of the frame, split by pixel index
pub fn boot_bars<D>(target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let area = target.bounding_box();
    let total = area.size.width * area.size.height;
    let colors = (0..total).map(|i| {
        if i < total / 3 {
            Rgb565::RED
        } else if i < 2 * total / 3 {
            Rgb565::GREEN
        } else {
            Rgb565::BLUE
        }
    });
    target.fill_contiguous(&area, colors)
}

pub fn checkerboard<D>(target: &mut D, cell: u32) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let area = target.bounding_box();
    let cell = cell.max(1) as i32;
    let colors = area.points().map(|p| {
        if ((p.x / cell) + (p.y / cell)) % 2 == 1 {
            Rgb565::WHITE
        } else {
            Rgb565::BLACK
        }
    });
    target.fill_contiguous(&area, colors)
}

/// Left-to-right black to white ramp
pub fn grey_gradient<D>(target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let area = target.bounding_box();
    let width = area.size.width.max(1);
    let colors = area.points().map(|p| {
        let intensity = (p.x as u32 * 255 / width) as u8;
        Rgb565::from(RawU16::new(rgb_to_rgb565(intensity, intensity, intensity)))
    });
    target.fill_contiguous(&area, colors)
}

/// Filled and outlined rectangles, centre axis lines and both diagonals
pub fn graphics<D>(target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let size = target.bounding_box().size;
    let (right, bottom) = (size.width as i32 - 1, size.height as i32 - 1);

    target.clear(Rgb565::BLACK)?;

    let fill = |color| PrimitiveStyle::with_fill(color);
    let outline = PrimitiveStyleBuilder::new()
        .stroke_color(Rgb565::GREEN)
        .stroke_width(1)
        .stroke_alignment(StrokeAlignment::Inside)
        .build();

    Rectangle::new(Point::new(10, 10), Size::new(50, 30))
        .into_styled(fill(Rgb565::RED))
        .draw(target)?;
    Rectangle::new(Point::new(70, 10), Size::new(50, 30))
        .into_styled(outline)
        .draw(target)?;
    Rectangle::new(Point::new(130, 10), Size::new(40, 30))
        .into_styled(fill(Rgb565::BLUE))
        .draw(target)?;

    let stroke = |color| PrimitiveStyle::with_stroke(color, 1);
    Line::new(Point::new(0, 50), Point::new(right, 50))
        .into_styled(stroke(Rgb565::YELLOW))
        .draw(target)?;
    Line::new(Point::new(size.width as i32 / 2, 0), Point::new(size.width as i32 / 2, bottom))
        .into_styled(stroke(Rgb565::CYAN))
        .draw(target)?;

    Line::new(Point::new(0, 0), Point::new(right, bottom))
        .into_styled(stroke(Rgb565::WHITE))
        .draw(target)?;
    Line::new(Point::new(0, bottom), Point::new(right, 0))
        .into_styled(stroke(Rgb565::MAGENTA))
        .draw(target)
}
