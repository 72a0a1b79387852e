//! Simulated 32x24 LED panel for previewing block programs in a terminal.

pub mod assets;
pub mod constants;
pub mod display;
pub mod gpio;
pub mod panel;

pub use assets::{AssetError, FrameLibrary};
pub use display::{Display, DisplayError, Rgb};
pub use gpio::GpioIndicators;
pub use panel::{PanelEvent, SimulatedPanel};
