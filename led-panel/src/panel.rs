use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use led_blocks::interpreter::{GpioBank, PanelSink};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::assets::FrameLibrary;
use crate::display::{Display, Rgb};
use crate::gpio::GpioIndicators;

/// Something the running program did to the panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    Cleared,
    Image { filename: String, found: bool },
    Frame { animation: String, index: usize },
    Color { text: String, rgb: Rgb },
    Gpio { pin: u8, high: bool },
}

#[derive(Debug, Default)]
struct PanelState {
    display: Display,
    events: Vec<PanelEvent>,
}

/// Terminal stand-in for the LED panel: a display, GPIO indicators and a
/// log of everything drawn.
#[derive(Debug)]
pub struct SimulatedPanel {
    library: FrameLibrary,
    indicators: GpioIndicators,
    state: Mutex<PanelState>,
    redraws: watch::Sender<u64>,
}

impl SimulatedPanel {
    pub fn new(library: FrameLibrary, gpio: Arc<GpioBank>) -> Self {
        let mut state = PanelState::default();
        state.display.show_markers();
        let (redraws, _) = watch::channel(0);
        Self {
            library,
            indicators: GpioIndicators::new(gpio),
            state: Mutex::new(state),
            redraws,
        }
    }

    pub fn library(&self) -> &FrameLibrary {
        &self.library
    }

    pub fn indicators(&self) -> &GpioIndicators {
        &self.indicators
    }

    /// Counter bumped on every redraw
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.redraws.subscribe()
    }

    pub fn display(&self) -> Display {
        self.lock().display.clone()
    }

    pub fn events(&self) -> Vec<PanelEvent> {
        self.lock().events.clone()
    }

    /// Display plus the indicator line, ready for the terminal
    pub fn render(&self) -> String {
        format!("{}GPIO {}\n", self.lock().display.to_ascii(), self.indicators.render())
    }

    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn draw(&self, event: PanelEvent, draw: impl FnOnce(&mut Display)) {
        {
            let mut state = self.lock();
            draw(&mut state.display);
            state.display.needs_redraw = false;
            state.events.push(event);
        }
        self.redraws.send_modify(|count| *count += 1);
    }

    fn draw_data(display: &mut Display, data: Option<&[u8]>, name: &str) {
        let Some(data) = data else {
            warn!("Image not found: {name}");
            display.show_error();
            return;
        };
        if let Err(err) = display.draw_frame(data) {
            warn!("Invalid image data in {name}: {err}");
            display.show_error();
        }
    }
}

impl PanelSink for SimulatedPanel {
    fn clear(&self) {
        self.draw(PanelEvent::Cleared, Display::clear);
    }

    fn display_image(&self, filename: &str) {
        let data = self.library.image(filename);
        debug!(filename, found = data.is_some(), "display image");
        let event = PanelEvent::Image {
            filename: filename.to_string(),
            found: data.is_some(),
        };
        self.draw(event, |display| Self::draw_data(display, data, filename));
    }

    fn animation_frames(&self, folder: &str) -> usize {
        self.library.frame_count(folder)
    }

    fn show_animation_frame(&self, folder: &str, index: usize) {
        let data = self.library.frame(folder, index);
        let event = PanelEvent::Frame {
            animation: folder.to_string(),
            index,
        };
        let name = format!("{folder}[{index}]");
        self.draw(event, |display| Self::draw_data(display, data, &name));
    }

    fn set_color(&self, color: &str) {
        let rgb = Rgb::parse(color);
        let mut state = self.lock();
        state.display.set_color(rgb);
        state.events.push(PanelEvent::Color {
            text: color.to_string(),
            rgb,
        });
    }

    fn set_gpio_indicator(&self, pin: u8, high: bool) {
        // Сам пин уже выставлен в GpioBank, индикаторы читают его оттуда
        self.draw(PanelEvent::Gpio { pin, high }, |_| {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FRAME_BYTES;

    fn panel() -> SimulatedPanel {
        let mut library = FrameLibrary::new();
        library.insert_image("full.raw", vec![0xFF; FRAME_BYTES]);
        library.insert_image("short.raw", vec![0xFF; 12]);
        SimulatedPanel::new(library, Arc::new(GpioBank::new()))
    }

    #[test]
    fn starts_on_the_marker_screen() {
        assert_eq!(panel().display().lit_pixels(), 5);
    }

    #[test]
    fn images_use_the_current_color() {
        let panel = panel();
        panel.set_color("rgb(0, 0, 255)");
        panel.display_image("full.raw");
        assert!(panel.display().to_buffer().iter().all(|&pixel| pixel == 0x0000FF));
        assert_eq!(
            panel.events(),
            [
                PanelEvent::Color { text: "rgb(0, 0, 255)".to_string(), rgb: Rgb { r: 0, g: 0, b: 255 } },
                PanelEvent::Image { filename: "full.raw".to_string(), found: true },
            ]
        );
    }

    #[test]
    fn missing_and_broken_images_show_the_error_pattern() {
        let panel = panel();
        panel.display_image("nope.raw");
        assert!(panel.display().to_buffer().contains(&0xFF0000));

        panel.clear();
        panel.display_image("short.raw");
        assert!(panel.display().to_buffer().contains(&0xFF0000));
        assert_eq!(
            panel.events()[2],
            PanelEvent::Image { filename: "short.raw".to_string(), found: true }
        );
    }

    #[test]
    fn redraws_are_announced() {
        let panel = panel();
        let receiver = panel.subscribe();
        panel.clear();
        panel.set_gpio_indicator(1, true);
        assert_eq!(*receiver.borrow(), 2);
    }
}
