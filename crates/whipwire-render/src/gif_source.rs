use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use gif::{ColorOutput, DecodeOptions, DisposalMethod};
use whipwire_command::Rgb;

use crate::error::{RenderError, Result};
use crate::gif_cache::FrameSource;
use crate::layout::{FrameGrid, Layout};

/// GIF files in a directory, named by zero-padded source id (`007.gif`).
///
/// Image rows map to channels and columns map to LEDs; anything outside the
/// image is black.
#[derive(Debug, Clone)]
pub struct GifDirectory {
    dir: PathBuf,
}

impl GifDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `source_id`.
    pub fn path_for(&self, source_id: u16) -> PathBuf {
        self.dir.join(format!("{source_id:03}.gif"))
    }
}

impl FrameSource for GifDirectory {
    fn load(&self, source_id: u16, layout: Layout) -> Result<Vec<FrameGrid>> {
        let path = self.path_for(source_id);
        let file = File::open(&path).map_err(|source| RenderError::GifOpen {
            path: path.clone(),
            source,
        })?;
        decode_frames(BufReader::new(file), layout)
            .map_err(|source| RenderError::GifDecode { path, source })
    }
}

/// Decode every frame of a GIF stream onto `layout`.
///
/// Frames are composited onto the logical screen in order, honouring each
/// frame's disposal method, so partial-update animations come out whole.
///
/// The canvas only covers the part of the screen that `layout` can show; a
/// header claiming a 65535x65535 screen costs no more than the layout does.
pub fn decode_frames<R: Read>(
    reader: R,
    layout: Layout,
) -> std::result::Result<Vec<FrameGrid>, gif::DecodingError> {
    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::RGBA);
    let mut decoder = options.read_info(reader)?;

    let mut canvas = Canvas::new(
        usize::from(decoder.width()).min(layout.leds),
        usize::from(decoder.height()).min(layout.channels),
    );
    let mut frames = Vec::new();

    while let Some(frame) = decoder.read_next_frame()? {
        let rect = Rect {
            left: usize::from(frame.left),
            top: usize::from(frame.top),
            width: usize::from(frame.width),
            height: usize::from(frame.height),
        };
        let saved = (frame.dispose == DisposalMethod::Previous).then(|| canvas.clone());

        canvas.draw(rect, &frame.buffer);
        frames.push(FrameGrid::from_fn(layout, |channel, led| {
            canvas.rgb(led, channel)
        }));

        match frame.dispose {
            DisposalMethod::Background => canvas.clear(rect),
            DisposalMethod::Previous => {
                if let Some(saved) = saved {
                    canvas = saved;
                }
            }
            DisposalMethod::Any | DisposalMethod::Keep => {}
        }
    }

    Ok(frames)
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    left: usize,
    top: usize,
    width: usize,
    height: usize,
}

/// RGBA logical screen.
#[derive(Debug, Clone)]
struct Canvas {
    width: usize,
    height: usize,
    rgba: Vec<u8>,
}

impl Canvas {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; width * height * 4],
        }
    }

    /// Copy opaque pixels of a frame's RGBA buffer into `rect`.
    fn draw(&mut self, rect: Rect, buffer: &[u8]) {
        for (i, px) in buffer.chunks_exact(4).enumerate() {
            if px[3] == 0 {
                continue;
            }
            let x = rect.left + i % rect.width.max(1);
            let y = rect.top + i / rect.width.max(1);
            if x < self.width && y < self.height {
                let at = (y * self.width + x) * 4;
                self.rgba[at..at + 4].copy_from_slice(px);
            }
        }
    }

    fn clear(&mut self, rect: Rect) {
        for y in rect.top..(rect.top + rect.height).min(self.height) {
            for x in rect.left..(rect.left + rect.width).min(self.width) {
                let at = (y * self.width + x) * 4;
                self.rgba[at..at + 4].fill(0);
            }
        }
    }

    fn rgb(&self, x: usize, y: usize) -> Rgb {
        if x >= self.width || y >= self.height {
            return Rgb::BLACK;
        }
        let at = (y * self.width + x) * 4;
        if self.rgba[at + 3] == 0 {
            return Rgb::BLACK;
        }
        Rgb::new(self.rgba[at], self.rgba[at + 1], self.rgba[at + 2])
    }
}
