use tracing::{debug, trace};
use whipwire_command::{Command, FlappyFrame, Rgb, Target};

use crate::flappy::GameRenderer;
use crate::gif_cache::GifFrameCache;
use crate::layout::Layout;

/// LEDs at the end of each identify segment that are always red.
const IDENTIFY_SEPARATOR: usize = 3;

/// Bits shown by the identify pattern.
const IDENTIFY_BITS: usize = 5;

/// Initial brightness of every channel.
pub const FULL_BRIGHTNESS: u8 = 255;

/// One LED strip: stored colours plus a brightness applied when drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pixels: Vec<Rgb>,
    brightness: u8,
}

impl Channel {
    fn new(leds: usize) -> Self {
        Self {
            pixels: vec![Rgb::BLACK; leds],
            brightness: FULL_BRIGHTNESS,
        }
    }

    /// Stored colours, unaffected by brightness.
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Colours as drawn: each component scaled by `brightness / 255`.
    pub fn displayed(&self) -> impl Iterator<Item = Rgb> + '_ {
        let level = self.brightness;
        self.pixels.iter().map(move |rgb| rgb.scaled(level))
    }

    fn fill(&mut self, rgb: Rgb) {
        self.pixels.fill(rgb);
    }

    /// Copy `row` in, padding with black when it is shorter.
    fn copy_row(&mut self, row: &[Rgb]) {
        for (i, px) in self.pixels.iter_mut().enumerate() {
            *px = row.get(i).copied().unwrap_or(Rgb::BLACK);
        }
    }
}

/// The renderer's model of every channel, mutated only by [`apply`].
///
/// [`apply`]: RenderState::apply
pub struct RenderState {
    layout: Layout,
    channels: Vec<Channel>,
    gifs: GifFrameCache,
    game: Option<Box<dyn GameRenderer>>,
    game_buffer: Vec<u8>,
}

impl RenderState {
    /// All channels black at full brightness.
    pub fn new(layout: Layout, gifs: GifFrameCache) -> Self {
        Self {
            layout,
            channels: (0..layout.channels).map(|_| Channel::new(layout.leds)).collect(),
            gifs,
            game: None,
            game_buffer: Vec::new(),
        }
    }

    /// Attach a game renderer for flappy state commands.
    pub fn with_game_renderer(mut self, renderer: Box<dyn GameRenderer>) -> Self {
        self.game_buffer = vec![0; renderer.layout().pixels() * 3];
        self.game = Some(renderer);
        self
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Read-only snapshot for drawing, ordered by channel index.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn gif_cache(&self) -> &GifFrameCache {
        &self.gifs
    }

    pub fn has_game_renderer(&self) -> bool {
        self.game.is_some()
    }

    /// Apply one command. Returns true when any channel was touched.
    pub fn apply(&mut self, cmd: &Command) -> bool {
        match *cmd {
            Command::SetColor { target, rgb } => {
                self.for_each_target(target, |_, channel| channel.fill(rgb))
            }
            Command::SetBrightness { target, level } => {
                self.for_each_target(target, |_, channel| channel.brightness = level)
            }
            Command::SelfIdentify { target } => {
                let leds = self.layout.leds;
                self.for_each_target(target, |index, channel| {
                    channel.pixels = identify_pattern(index, leds);
                })
            }
            Command::ShowGifFrame {
                target,
                frame,
                source_id,
            } => {
                if !(0..self.layout.channels).any(|index| target.selects(index)) {
                    return false;
                }
                let Some(grid) = self.gifs.get_frame(source_id, frame) else {
                    trace!(source_id, frame, "gif frame unavailable");
                    return false;
                };
                let mut touched = false;
                for (index, channel) in self.channels.iter_mut().enumerate() {
                    if target.selects(index) {
                        channel.copy_row(grid.row(index));
                        touched = true;
                    }
                }
                touched
            }
            Command::FlappyState { state, .. } => self.render_game(&state),
            Command::Unknown { .. } | Command::Diagnostic(_) => {
                debug!(command = %cmd, "ignored");
                false
            }
        }
    }

    fn for_each_target(
        &mut self,
        target: Target,
        mut f: impl FnMut(usize, &mut Channel),
    ) -> bool {
        let mut touched = false;
        for (index, channel) in self.channels.iter_mut().enumerate() {
            if target.selects(index) {
                f(index, channel);
                touched = true;
            }
        }
        if !touched {
            trace!(%target, channels = self.layout.channels, "target out of range");
        }
        touched
    }

    /// Overwrite every channel from the game renderer's output.
    fn render_game(&mut self, state: &FlappyFrame) -> bool {
        let Some(game) = self.game.as_mut() else {
            return false;
        };
        let grid = game.layout();
        game.render(state, &mut self.game_buffer);

        for (index, channel) in self.channels.iter_mut().enumerate() {
            for (led, px) in channel.pixels.iter_mut().enumerate() {
                *px = if index < grid.channels && led < grid.leds {
                    let at = (index * grid.leds + led) * 3;
                    Rgb::new(
                        self.game_buffer[at],
                        self.game_buffer[at + 1],
                        self.game_buffer[at + 2],
                    )
                } else {
                    Rgb::BLACK
                };
            }
        }
        true
    }
}

impl std::fmt::Debug for RenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderState")
            .field("layout", &self.layout)
            .field("gifs", &self.gifs)
            .field("game_renderer", &self.game.is_some())
            .finish()
    }
}

/// The identify pattern for channel `index`: its low five bits, LSB first.
///
/// The strip is split into five segments of `leds / 5`. Each segment is white
/// when its bit is set and black otherwise, except its last three LEDs, which
/// are always red. LEDs past the fifth segment stay black.
pub fn identify_pattern(index: usize, leds: usize) -> Vec<Rgb> {
    let mut pixels = vec![Rgb::BLACK; leds];
    let segment = leds / IDENTIFY_BITS;

    for bit in 0..IDENTIFY_BITS {
        let start = bit * segment;
        let end = (start + segment).min(leds);
        let separator = end.saturating_sub(IDENTIFY_SEPARATOR).max(start);

        if (index >> bit) & 1 == 1 {
            pixels[start..separator].fill(Rgb::WHITE);
        }
        pixels[separator..end].fill(Rgb::RED);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;
    use whipwire_command::{Diagnostic, Pipe};

    use super::*;
    use crate::gif_cache::tests::SolidFrames;

    fn state() -> RenderState {
        let layout = Layout::default();
        RenderState::new(layout, GifFrameCache::disabled(layout))
    }

    fn set_color(target: Target, rgb: Rgb) -> Command {
        Command::SetColor { target, rgb }
    }

    #[test]
    fn starts_black_at_full_brightness() {
        let state = state();
        assert_eq!(state.channels().len(), 24);
        for channel in state.channels() {
            assert_eq!(channel.pixels().len(), 120);
            assert!(channel.pixels().iter().all(|px| *px == Rgb::BLACK));
            assert_eq!(channel.brightness(), 255);
        }
    }

    #[test]
    fn set_color_touches_only_its_channel() {
        let mut state = state();
        let before = state.channels().to_vec();

        assert!(state.apply(&set_color(Target::Channel(3), Rgb::new(255, 0, 128))));

        for (index, channel) in state.channels().iter().enumerate() {
            if index == 3 {
                assert!(channel
                    .pixels()
                    .iter()
                    .all(|px| *px == Rgb::new(255, 0, 128)));
            } else {
                assert_eq!(channel, &before[index]);
            }
        }
    }

    #[test]
    fn all_target_touches_every_channel() {
        let mut state = state();
        assert!(state.apply(&set_color(Target::All, Rgb::WHITE)));
        assert!(state
            .channels()
            .iter()
            .all(|c| c.pixels().iter().all(|px| *px == Rgb::WHITE)));
    }

    #[test]
    fn out_of_range_channel_is_ignored() {
        let mut state = state();
        let before = state.channels().to_vec();
        assert!(!state.apply(&set_color(Target::Channel(24), Rgb::WHITE)));
        assert!(!state.apply(&Command::SetBrightness {
            target: Target::Channel(200),
            level: 0,
        }));
        assert_eq!(state.channels(), before.as_slice());
    }

    #[test]
    fn brightness_is_applied_only_when_drawn() {
        let mut state = state();
        state.apply(&set_color(Target::Channel(0), Rgb::new(200, 100, 50)));
        state.apply(&Command::SetBrightness {
            target: Target::Channel(0),
            level: 128,
        });

        let channel = &state.channels()[0];
        assert_eq!(channel.pixels()[0], Rgb::new(200, 100, 50));
        assert_eq!(channel.brightness(), 128);
        assert_eq!(
            channel.displayed().next(),
            Some(Rgb::new(100, 50, 25))
        );

        state.apply(&Command::SetBrightness {
            target: Target::Channel(0),
            level: 255,
        });
        assert_eq!(
            state.channels()[0].displayed().next(),
            Some(Rgb::new(200, 100, 50))
        );
    }

    #[test]
    fn brightness_survives_color_changes() {
        let mut state = state();
        state.apply(&Command::SetBrightness {
            target: Target::All,
            level: 10,
        });
        state.apply(&set_color(Target::All, Rgb::WHITE));
        assert!(state.channels().iter().all(|c| c.brightness() == 10));
    }

    #[test]
    fn displayed_output_ignores_command_order() {
        let mut state = state();
        let rgb = Rgb::new(200, 100, 50);
        let dim = |target| Command::SetBrightness { target, level: 77 };

        state.apply(&set_color(Target::Channel(0), rgb));
        state.apply(&dim(Target::Channel(0)));
        state.apply(&dim(Target::Channel(1)));
        state.apply(&set_color(Target::Channel(1), rgb));

        let first: Vec<Rgb> = state.channels()[0].displayed().collect();
        let second: Vec<Rgb> = state.channels()[1].displayed().collect();
        assert_eq!(first, second);
        assert_ne!(first[0], rgb);
    }

    #[test]
    fn identify_channel_zero_is_only_separators() {
        let pixels = identify_pattern(0, 120);
        for (led, px) in pixels.iter().enumerate() {
            let in_separator = led % 24 >= 21;
            let expected = if in_separator { Rgb::RED } else { Rgb::BLACK };
            assert_eq!(*px, expected, "led {led}");
        }
    }

    #[test]
    fn identify_shows_bits_lsb_first() {
        // 5 = 0b00101: segments 0 and 2 lit.
        let pixels = identify_pattern(5, 120);
        for segment in 0..5 {
            let lit = segment == 0 || segment == 2;
            let body = &pixels[segment * 24..segment * 24 + 21];
            let expected = if lit { Rgb::WHITE } else { Rgb::BLACK };
            assert!(body.iter().all(|px| *px == expected), "segment {segment}");
            assert!(pixels[segment * 24 + 21..(segment + 1) * 24]
                .iter()
                .all(|px| *px == Rgb::RED));
        }
    }

    #[test]
    fn identify_uses_five_bits_only() {
        for index in 0..32 {
            assert_eq!(identify_pattern(index, 120), identify_pattern(index + 32, 120));
        }
        assert_ne!(identify_pattern(1, 120), identify_pattern(2, 120));
    }

    #[test]
    fn identify_handles_uneven_and_tiny_strips() {
        let pixels = identify_pattern(31, 12);
        assert_eq!(pixels.len(), 12);
        // Segments of 2 LEDs are all separator; the last 2 LEDs are past the segments.
        assert!(pixels[..10].iter().all(|px| *px == Rgb::RED));
        assert!(pixels[10..].iter().all(|px| *px == Rgb::BLACK));
        assert!(identify_pattern(3, 0).is_empty());
    }

    #[test]
    fn self_identify_applies_per_channel_index() {
        let mut state = state();
        assert!(state.apply(&Command::SelfIdentify {
            target: Target::All
        }));
        for (index, channel) in state.channels().iter().enumerate() {
            assert_eq!(channel.pixels(), identify_pattern(index, 120).as_slice());
        }
    }

    #[test]
    fn gif_frames_copy_rows() {
        let layout = Layout::new(2, 4);
        let loads = Arc::new(AtomicU32::new(0));
        let source = SolidFrames {
            frames: 3,
            loads: loads.clone(),
        };
        let mut state = RenderState::new(layout, GifFrameCache::new(source, layout));

        assert!(state.apply(&Command::ShowGifFrame {
            target: Target::Channel(1),
            frame: 5,
            source_id: 1,
        }));
        assert_eq!(state.channels()[1].pixels(), &[Rgb::new(2, 0, 0); 4]);
        assert_eq!(state.channels()[0].pixels(), &[Rgb::BLACK; 4]);
    }

    #[test]
    fn gif_frame_for_absent_channel_loads_nothing() {
        let layout = Layout::new(2, 4);
        let loads = Arc::new(AtomicU32::new(0));
        let source = SolidFrames {
            frames: 3,
            loads: loads.clone(),
        };
        let mut state = RenderState::new(layout, GifFrameCache::new(source, layout));

        assert!(!state.apply(&Command::ShowGifFrame {
            target: Target::Channel(200),
            frame: 0,
            source_id: 1,
        }));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert_eq!(state.gif_cache().load_attempts(1), 0);
    }

    #[test]
    fn missing_gif_is_a_noop_and_loaded_once() {
        let layout = Layout::new(2, 4);
        let loads = Arc::new(AtomicU32::new(0));
        let source = SolidFrames {
            frames: 3,
            loads: loads.clone(),
        };
        let mut state = RenderState::new(layout, GifFrameCache::new(source, layout));
        let before = state.channels().to_vec();

        for frame in 0..10 {
            assert!(!state.apply(&Command::ShowGifFrame {
                target: Target::All,
                frame,
                source_id: 9,
            }));
        }
        assert_eq!(state.channels(), before.as_slice());
        assert_eq!(state.gif_cache().load_attempts(9), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    struct Gradient;

    impl GameRenderer for Gradient {
        fn layout(&self) -> Layout {
            Layout::new(2, 3)
        }

        fn render(&mut self, state: &FlappyFrame, out: &mut [u8]) {
            for (i, px) in out.chunks_exact_mut(3).enumerate() {
                px.copy_from_slice(&[i as u8, state.game_state, 0]);
            }
        }
    }

    fn flappy() -> Command {
        Command::FlappyState {
            target: Target::Channel(0),
            state: FlappyFrame {
                game_state: 7,
                pipes: [Pipe { x: -1, gap_y: 0 }; 3],
                ..FlappyFrame::default()
            },
        }
    }

    #[test]
    fn flappy_without_renderer_is_ignored() {
        let mut state = state();
        assert!(!state.has_game_renderer());
        assert!(!state.apply(&flappy()));
        assert!(state
            .channels()
            .iter()
            .all(|c| c.pixels().iter().all(|px| *px == Rgb::BLACK)));
    }

    #[test]
    fn flappy_overwrites_every_channel() {
        let layout = Layout::new(3, 4);
        let mut state = RenderState::new(layout, GifFrameCache::disabled(layout))
            .with_game_renderer(Box::new(Gradient));
        state.apply(&set_color(Target::All, Rgb::WHITE));

        assert!(state.apply(&flappy()));
        assert_eq!(
            state.channels()[0].pixels(),
            &[
                Rgb::new(0, 7, 0),
                Rgb::new(1, 7, 0),
                Rgb::new(2, 7, 0),
                Rgb::BLACK
            ]
        );
        assert_eq!(state.channels()[1].pixels()[2], Rgb::new(5, 7, 0));
        // Channel 2 is outside the renderer's grid.
        assert_eq!(state.channels()[2].pixels(), &[Rgb::BLACK; 4]);
    }

    #[test]
    fn diagnostics_never_mutate() {
        let mut state = state();
        let before = state.channels().to_vec();
        let commands = [
            Command::Diagnostic(Diagnostic::TooShort { raw: Bytes::new() }),
            Command::Diagnostic(Diagnostic::Incomplete {
                tag: b'c',
                target: Target::All,
                needed: 3,
                got: 0,
            }),
            Command::Unknown {
                tag: b'z',
                target: Target::All,
                raw: Bytes::from_static(&[0, 0, b'z', 255]),
            },
        ];
        for cmd in &commands {
            assert!(!state.apply(cmd));
        }
        assert_eq!(state.channels(), before.as_slice());
    }
}
