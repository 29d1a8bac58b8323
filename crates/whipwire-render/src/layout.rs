use whipwire_command::Rgb;

/// Default number of channels (whips).
pub const DEFAULT_CHANNELS: usize = 24;

/// Default number of LEDs per channel.
pub const DEFAULT_LEDS: usize = 120;

/// Fixed dimensions of the installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    pub channels: usize,
    pub leds: usize,
}

impl Layout {
    pub const fn new(channels: usize, leds: usize) -> Self {
        Self { channels, leds }
    }

    /// Total pixel count.
    pub fn pixels(&self) -> usize {
        self.channels * self.leds
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNELS, DEFAULT_LEDS)
    }
}

/// A channel × LED grid of colours, row-major by channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGrid {
    layout: Layout,
    pixels: Vec<Rgb>,
}

impl FrameGrid {
    /// An all-black grid.
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            pixels: vec![Rgb::BLACK; layout.pixels()],
        }
    }

    /// Build a grid by sampling `pixel(channel, led)` for every cell.
    pub fn from_fn(layout: Layout, mut pixel: impl FnMut(usize, usize) -> Rgb) -> Self {
        let mut pixels = Vec::with_capacity(layout.pixels());
        for channel in 0..layout.channels {
            for led in 0..layout.leds {
                pixels.push(pixel(channel, led));
            }
        }
        Self { layout, pixels }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// One channel's row. Out-of-range channels yield an empty slice.
    pub fn row(&self, channel: usize) -> &[Rgb] {
        if channel >= self.layout.channels {
            return &[];
        }
        let start = channel * self.layout.leds;
        &self.pixels[start..start + self.layout.leds]
    }

    pub fn set(&mut self, channel: usize, led: usize, rgb: Rgb) {
        if channel < self.layout.channels && led < self.layout.leds {
            self.pixels[channel * self.layout.leds + led] = rgb;
        }
    }
}
