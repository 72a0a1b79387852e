//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use led_blocks::interpreter::{GpioBank, PanelSink, PreviewConfig, Previewer};
use led_blocks::{Document, Program};

/// Panel that writes every call down as a line of text
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<String>>,
    frames: usize,
}

impl Recorder {
    pub fn with_frames(frames: usize) -> Self {
        Self { frames, ..Self::default() }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|call| call.starts_with(prefix)).count()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PanelSink for Recorder {
    fn clear(&self) {
        self.push("clear".to_string());
    }

    fn display_image(&self, filename: &str) {
        self.push(format!("image {filename}"));
    }

    fn animation_frames(&self, _folder: &str) -> usize {
        self.frames
    }

    fn show_animation_frame(&self, folder: &str, index: usize) {
        self.push(format!("frame {folder} {index}"));
    }

    fn set_color(&self, color: &str) {
        self.push(format!("color {color}"));
    }

    fn set_gpio_indicator(&self, pin: u8, high: bool) {
        self.push(format!("gpio {pin} {high}"));
    }
}

pub fn program(value: serde_json::Value) -> Program {
    Document::from_value(value).unwrap().into_program().unwrap()
}

pub fn previewer(recorder: &Arc<Recorder>) -> Previewer {
    let config = PreviewConfig { seed: Some(42), ..PreviewConfig::default() };
    Previewer::new(recorder.clone(), Arc::new(GpioBank::new()), config)
}
