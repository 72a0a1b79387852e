use std::sync::atomic::{AtomicBool, Ordering};

use crate::ir::MAX_PIN;

/// Output side of a preview run: the panel the program draws on.
///
/// Methods take `&self`; implementations keep their own interior mutability
/// since the run task and the UI share the sink.
pub trait PanelSink: Send + Sync {
    fn clear(&self);

    fn display_image(&self, filename: &str);

    /// Number of frames in an animation folder, 0 when it is unknown
    fn animation_frames(&self, folder: &str) -> usize;

    fn show_animation_frame(&self, folder: &str, index: usize);

    /// `#rrggbb`, `rgb(r, g, b)` or whatever text the program produced
    fn set_color(&self, color: &str);

    fn set_gpio_indicator(&self, pin: u8, high: bool);
}

/// Состояние пинов GPIO, общее для запусков и панели
#[derive(Debug)]
pub struct GpioBank {
    pins: [AtomicBool; MAX_PIN as usize + 1],
}

impl GpioBank {
    pub fn new() -> Self {
        Self {
            pins: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Pins outside the bank read low
    pub fn read(&self, pin: u8) -> bool {
        self.pins
            .get(usize::from(pin))
            .is_some_and(|state| state.load(Ordering::SeqCst))
    }

    /// Returns false when the pin does not exist
    pub fn set(&self, pin: u8, high: bool) -> bool {
        match self.pins.get(usize::from(pin)) {
            Some(state) => {
                state.store(high, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Flips a pin and returns its new state
    pub fn toggle(&self, pin: u8) -> Option<bool> {
        let state = self.pins.get(usize::from(pin))?;
        Some(!state.fetch_xor(true, Ordering::SeqCst))
    }

    pub fn snapshot(&self) -> Vec<bool> {
        self.pins.iter().map(|state| state.load(Ordering::SeqCst)).collect()
    }
}

impl Default for GpioBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_default_low_and_toggle() {
        let bank = GpioBank::new();
        assert_eq!(bank.len(), 41);
        assert!(!bank.read(7));
        assert_eq!(bank.toggle(7), Some(true));
        assert!(bank.read(7));
        assert_eq!(bank.toggle(7), Some(false));
    }

    #[test]
    fn out_of_range_pins_are_ignored() {
        let bank = GpioBank::new();
        assert!(!bank.set(41, true));
        assert!(!bank.read(41));
        assert_eq!(bank.toggle(200), None);
        assert!(bank.set(40, true));
        assert!(bank.read(40));
    }
}
