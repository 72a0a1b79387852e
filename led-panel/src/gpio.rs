use std::sync::Arc;

use led_blocks::interpreter::GpioBank;
use tracing::info;

use crate::constants::INDICATOR_PINS;

/// Индикаторы GPIO на панели (пины 0-9) с ручным переключением
#[derive(Debug, Clone)]
pub struct GpioIndicators {
    bank: Arc<GpioBank>,
}

impl GpioIndicators {
    pub fn new(bank: Arc<GpioBank>) -> Self {
        GpioIndicators { bank }
    }

    pub fn bank(&self) -> &Arc<GpioBank> {
        &self.bank
    }

    /// Горит ли индикатор?
    pub fn is_high(&self, pin: u8) -> bool {
        pin < INDICATOR_PINS && self.bank.read(pin)
    }

    /// Manual toggle from the panel; only pins with an indicator can be flipped
    pub fn toggle(&self, pin: u8) -> Option<bool> {
        if pin >= INDICATOR_PINS {
            return None;
        }
        let high = self.bank.toggle(pin)?;
        info!("GPIO {pin} set to {}", if high { "HIGH" } else { "LOW" });
        Some(high)
    }

    /// One line per panel: `0:L 1:H ...`
    pub fn render(&self) -> String {
        (0..INDICATOR_PINS)
            .map(|pin| format!("{pin}:{}", if self.is_high(pin) { 'H' } else { 'L' }))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_are_shared_with_the_bank() {
        let bank = Arc::new(GpioBank::new());
        let indicators = GpioIndicators::new(bank.clone());
        assert_eq!(indicators.toggle(2), Some(true));
        assert!(bank.read(2));
        assert_eq!(indicators.render(), "0:L 1:L 2:H 3:L 4:L 5:L 6:L 7:L 8:L 9:L");
    }

    #[test]
    fn pins_without_indicator_cannot_be_toggled() {
        let bank = Arc::new(GpioBank::new());
        let indicators = GpioIndicators::new(bank.clone());
        assert_eq!(indicators.toggle(10), None);
        bank.set(10, true);
        assert!(!indicators.is_high(10));
    }
}
