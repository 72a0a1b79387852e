use std::fmt;

use thiserror::Error;

use crate::constants::{FRAME_BYTES, MARKERS, PANEL_HEIGHT, PANEL_WIDTH};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    #[error("Frame must be {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },
}

/// 24-bit color of lit pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Self = Self { r: 255, g: 255, b: 255 };
    pub const RED: Self = Self { r: 255, g: 0, b: 0 };

    /// Accepts `#RRGGBB`, `RRGGBB` and `rgb(r, g, b)`; anything else is white
    pub fn parse(text: &str) -> Self {
        Self::try_parse(text).unwrap_or(Self::WHITE)
    }

    pub fn try_parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(inner) = text.strip_prefix("rgb(").and_then(|rest| rest.strip_suffix(')')) {
            let mut channels = inner.split(',').map(|part| part.trim().parse::<u8>());
            let color = Self {
                r: channels.next()?.ok()?,
                g: channels.next()?.ok()?,
                b: channels.next()?.ok()?,
            };
            return channels.next().is_none().then_some(color);
        }

        let hex = text.strip_prefix('#').unwrap_or(text);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// `0x00RRGGBB`
    pub fn to_u32(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone)]
pub struct Display {
    // Пиксели панели: true = горит
    pixels: [[bool; PANEL_WIDTH]; PANEL_HEIGHT],
    // Текущий цвет для следующих кадров
    color: Rgb,
    // Цвет того, что сейчас на экране
    ink: Rgb,
    pub needs_redraw: bool,
}

impl Display {
    pub fn new() -> Self {
        Display {
            pixels: [[false; PANEL_WIDTH]; PANEL_HEIGHT],
            color: Rgb::WHITE,
            ink: Rgb::WHITE,
            needs_redraw: true,
        }
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Changes the color of the next drawing; what is on screen keeps its color
    pub fn set_color(&mut self, color: Rgb) {
        self.color = color;
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels.get(y).and_then(|row| row.get(x)).copied().unwrap_or(false)
    }

    pub fn lit_pixels(&self) -> usize {
        self.pixels.iter().flatten().filter(|&&on| on).count()
    }

    /// Очистка экрана
    pub fn clear(&mut self) {
        self.pixels = [[false; PANEL_WIDTH]; PANEL_HEIGHT];
        self.needs_redraw = true;
    }

    /// Decodes a 96-byte frame, MSB-first, row-major, in the current color
    pub fn draw_frame(&mut self, frame: &[u8]) -> Result<(), DisplayError> {
        if frame.len() != FRAME_BYTES {
            return Err(DisplayError::FrameSize {
                expected: FRAME_BYTES,
                actual: frame.len(),
            });
        }

        for (index, pixel) in self.pixels.iter_mut().flatten().enumerate() {
            *pixel = frame[index / 8] & (0x80 >> (index % 8)) != 0;
        }
        self.ink = self.color;
        self.needs_redraw = true;
        Ok(())
    }

    /// Red frame with a cross: shown for missing or broken images
    pub fn show_error(&mut self) {
        for y in 0..PANEL_HEIGHT {
            for x in 0..PANEL_WIDTH {
                let border = x == 0 || y == 0 || x == PANEL_WIDTH - 1 || y == PANEL_HEIGHT - 1;
                // Диагонали растянуты на прямоугольник 32x24
                let diagonal = x * (PANEL_HEIGHT - 1) / (PANEL_WIDTH - 1) == y
                    || (PANEL_WIDTH - 1 - x) * (PANEL_HEIGHT - 1) / (PANEL_WIDTH - 1) == y;
                self.pixels[y][x] = border || diagonal;
            }
        }
        self.ink = Rgb::RED;
        self.needs_redraw = true;
    }

    /// Idle screen: corners and center lit in the current color
    pub fn show_markers(&mut self) {
        self.clear();
        for (x, y) in MARKERS {
            self.pixels[y][x] = true;
        }
        self.ink = self.color;
    }

    /// 0xRRGGBB per pixel, row-major
    pub fn to_buffer(&self) -> Vec<u32> {
        let mut buffer = vec![0; PANEL_WIDTH * PANEL_HEIGHT];
        let ink = self.ink.to_u32();

        for y in 0..PANEL_HEIGHT {
            for x in 0..PANEL_WIDTH {
                let index = y * PANEL_WIDTH + x;
                buffer[index] = if self.pixels[y][x] { ink } else { 0x000000 };
            }
        }

        buffer
    }

    /// Кадр обратно в 96 байт
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = vec![0u8; FRAME_BYTES];
        for (index, &on) in self.pixels.iter().flatten().enumerate() {
            if on {
                frame[index / 8] |= 0x80 >> (index % 8);
            }
        }
        frame
    }

    /// Framed text rendering for the terminal
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((PANEL_WIDTH + 3) * (PANEL_HEIGHT + 2) * 3);
        out.push_str(&format!("┌{}┐ {}\n", "─".repeat(PANEL_WIDTH), self.ink));

        for row in &self.pixels {
            out.push('│');
            for &on in row {
                out.push(if on { '█' } else { ' ' });
            }
            out.push_str("│\n");
        }

        out.push_str(&format!("└{}┘\n", "─".repeat(PANEL_WIDTH)));
        out
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
