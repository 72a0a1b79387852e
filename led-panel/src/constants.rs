// Панель 32x24, один бит на пиксель
pub const PANEL_WIDTH: usize = 32;
pub const PANEL_HEIGHT: usize = 24;
pub const PANEL_PIXELS: usize = PANEL_WIDTH * PANEL_HEIGHT;

/// Size of one `.raw` frame: MSB-first, row-major
pub const FRAME_BYTES: usize = PANEL_PIXELS / 8;

/// Pins with an indicator (and a manual toggle) on the panel
pub const INDICATOR_PINS: u8 = 10;

/// Extensions loaded as frames from an asset directory
pub const FRAME_EXTENSIONS: [&str; 2] = ["raw", "bmp"];

// Маркеры пустой панели: углы и центр
pub const MARKERS: [(usize, usize); 5] = [
    (0, 0),
    (PANEL_WIDTH - 1, 0),
    (0, PANEL_HEIGHT - 1),
    (PANEL_WIDTH - 1, PANEL_HEIGHT - 1),
    (PANEL_WIDTH / 2, PANEL_HEIGHT / 2),
];
