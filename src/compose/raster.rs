//! Overlay rasterization.
//!
//! Turns a list of text overlays into pixel content the filter-graph stage
//! can composite onto the base video: either one transparent PNG (all
//! overlays static) or a numbered frame sequence at the output frame rate,
//! each frame painting only the overlays active at that instant.
//!
//! Frames are painted independently; nothing is diffed or deduplicated.
//! Downstream re-encoding dominates cost, so the simple path wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use fontdue::layout::{CoordinateSystem, GlyphPosition, GlyphRasterConfig, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use futures::stream::{FuturesUnordered, StreamExt};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::compose::overlay::TextOverlay;
use crate::compose::subtitle::{anchor_pixels, parse_hex_rgb};
use crate::error::{Error, Result};

/// Progress callback for frame-sequence rendering: `(done, total, percent)`.
pub type ProgressFn = dyn Fn(usize, usize, f32) + Send + Sync;

/// Frames between progress reports (one second of output at 30 fps).
const PROGRESS_STRIDE: usize = 30;

/// Concurrent frame writes in flight.
const MAX_PENDING_WRITES: usize = 4;

/// Underline offset below the text bottom, as a fraction of font size.
const UNDERLINE_OFFSET: f32 = 0.08;

/// Underline thickness as a fraction of font size.
const UNDERLINE_THICKNESS: f32 = 0.05;

/// Well-known system font locations tried when no registered font matches.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

struct RegisteredFont {
    path: PathBuf,
    font: Arc<Font>,
}

/// Injectable font registry with idempotent registration.
///
/// Owned by the caller for the process lifetime and shared read-only across
/// concurrent renders; re-registering the same `(name, path)` pair is a
/// no-op, not an error.
#[derive(Default)]
pub struct FontRegistry {
    fonts: RwLock<HashMap<String, RegisteredFont>>,
}

impl FontRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a font file under a logical name.
    pub fn register(&self, name: &str, path: &Path) -> Result<()> {
        {
            let fonts = self.fonts.read().expect("font registry lock poisoned");
            if let Some(existing) = fonts.get(name) {
                if existing.path == path {
                    return Ok(());
                }
            }
        }

        let bytes = std::fs::read(path)?;
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| Error::Font(format!("failed to parse {}: {e}", path.display())))?;

        let mut fonts = self.fonts.write().expect("font registry lock poisoned");
        fonts.insert(
            name.to_string(),
            RegisteredFont {
                path: path.to_path_buf(),
                font: Arc::new(font),
            },
        );
        debug!("registered font {name:?} from {}", path.display());
        Ok(())
    }

    /// Look up a registered font by logical name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Arc<Font>> {
        let fonts = self.fonts.read().expect("font registry lock poisoned");
        fonts.get(name).map(|f| Arc::clone(&f.font))
    }
}

/// The default rendering face, loaded once from well-known system paths.
pub fn default_font() -> Result<Arc<Font>> {
    static DEFAULT: OnceCell<Option<Arc<Font>>> = OnceCell::new();
    let font = DEFAULT.get_or_init(|| {
        for candidate in SYSTEM_FONT_CANDIDATES {
            let Ok(bytes) = std::fs::read(candidate) else {
                continue;
            };
            match Font::from_bytes(bytes, FontSettings::default()) {
                Ok(font) => {
                    debug!("system default font: {candidate}");
                    return Some(Arc::new(font));
                }
                Err(e) => warn!("unusable system font {candidate}: {e}"),
            }
        }
        None
    });
    font.clone()
        .ok_or_else(|| Error::Font("no usable system font found".to_string()))
}

/// Overlays visible at instant `t`, in paint order.
pub(crate) fn active_overlays<'a>(
    overlays: &'a [TextOverlay],
    duration: f64,
    t: f64,
) -> Vec<&'a TextOverlay> {
    overlays
        .iter()
        .filter(|o| o.window().is_active_at(duration, t))
        .collect()
}

/// Number of frames for a duration at a frame rate: `ceil(duration * fps)`.
#[must_use]
pub fn frame_count(duration: f64, fps: u32) -> usize {
    (duration.max(0.0) * f64::from(fps)).ceil() as usize
}

/// Zero-padded frame file name for index `i`.
#[must_use]
pub fn frame_name(index: usize) -> String {
    format!("frame_{index:06}.png")
}

/// ffmpeg input pattern addressing a whole frame sequence in `dir`.
#[must_use]
pub fn frame_pattern(dir: &Path) -> String {
    dir.join("frame_%06d.png").to_string_lossy().into_owned()
}

struct GlyphBitmap {
    width: usize,
    height: usize,
    coverage: Vec<u8>,
}

/// Paints text overlays onto transparent RGBA canvases.
pub struct OverlayRasterizer<'a> {
    registry: &'a FontRegistry,
    width: u32,
    height: u32,
    glyph_cache: HashMap<GlyphRasterConfig, GlyphBitmap>,
}

impl<'a> OverlayRasterizer<'a> {
    #[must_use]
    pub fn new(registry: &'a FontRegistry, width: u32, height: u32) -> Self {
        Self {
            registry,
            width,
            height,
            glyph_cache: HashMap::new(),
        }
    }

    /// Render all overlays once onto a single static image.
    pub async fn render_static(&mut self, overlays: &[TextOverlay], out: &Path) -> Result<()> {
        let selected: Vec<&TextOverlay> = overlays.iter().collect();
        let image = self.paint(&selected)?;
        let bytes = encode_png(&image)?;
        tokio::fs::write(out, bytes).await?;
        debug!("wrote static overlay image {}", out.display());
        Ok(())
    }

    /// Render a numbered frame sequence covering `duration` at `fps`.
    ///
    /// Frame `i` samples instant `i / fps` and paints only the overlays whose
    /// window is active then. PNG writes run a few frames ahead of painting;
    /// naming stays deterministic regardless of write completion order.
    /// Returns the number of frames produced.
    pub async fn render_sequence(
        &mut self,
        overlays: &[TextOverlay],
        duration: f64,
        fps: u32,
        dir: &Path,
        progress: Option<&ProgressFn>,
    ) -> Result<usize> {
        let total = frame_count(duration, fps);
        let mut writes = FuturesUnordered::new();

        for index in 0..total {
            let t = index as f64 / f64::from(fps);
            let selected = active_overlays(overlays, duration, t);
            let image = self.paint(&selected)?;
            let bytes = encode_png(&image)?;
            let path = dir.join(frame_name(index));
            writes.push(async move { tokio::fs::write(path, bytes).await });

            if writes.len() >= MAX_PENDING_WRITES {
                if let Some(res) = writes.next().await {
                    res?;
                }
            }

            let done = index + 1;
            if done % PROGRESS_STRIDE == 0 || done == total {
                if let Some(report) = progress {
                    report(done, total, done as f32 / total as f32 * 100.0);
                }
            }
        }

        while let Some(res) = writes.next().await {
            res?;
        }

        debug!("rasterized {total} overlay frames into {}", dir.display());
        Ok(total)
    }

    /// Paint the given overlays, in order, onto a fresh transparent canvas.
    fn paint(&mut self, overlays: &[&TextOverlay]) -> Result<RgbaImage> {
        let mut canvas = RgbaImage::new(self.width, self.height);
        for overlay in overlays {
            self.paint_overlay(&mut canvas, overlay)?;
        }
        Ok(canvas)
    }

    /// Paint one overlay: stroke first, then fill, then underline.
    ///
    /// The overlay's opacity scales every paint operation for this overlay
    /// and nothing else; each overlay carries its own factor, so there is no
    /// state to restore between overlays.
    fn paint_overlay(&mut self, canvas: &mut RgbaImage, overlay: &TextOverlay) -> Result<()> {
        if overlay.text.is_empty() {
            return Ok(());
        }

        let style = &overlay.style;
        let font = self.font_for(&style.font_family)?;
        let size = style.font_size as f32;

        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[font.as_ref()], &TextStyle::new(&overlay.text, size, 0));
        let glyphs: Vec<GlyphPosition> = layout.glyphs().clone();

        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for glyph in glyphs.iter().filter(|g| g.width > 0 && g.height > 0) {
            min_x = min_x.min(glyph.x);
            min_y = min_y.min(glyph.y);
            max_x = max_x.max(glyph.x + glyph.width as f32);
            max_y = max_y.max(glyph.y + glyph.height as f32);
        }
        if min_x > max_x {
            return Ok(()); // nothing visible (whitespace-only text)
        }

        // Center the measured text block on its pixel anchor.
        let (ax, ay) = anchor_pixels(overlay.position, self.width, self.height);
        let dx = ax as f32 - (min_x + max_x) / 2.0;
        let dy = ay as f32 - (min_y + max_y) / 2.0;

        let alpha_scale = f32::from(style.opacity.min(100)) / 100.0;
        let fill = rgb_or_white(&style.color);

        if style.stroke_width > 0.0 {
            let stroke = style
                .stroke_color
                .as_deref()
                .map_or((0, 0, 0), rgb_or_white);
            let radius = style.stroke_width.ceil() as i32;
            for oy in -radius..=radius {
                for ox in -radius..=radius {
                    if ox == 0 && oy == 0 {
                        continue;
                    }
                    if ox * ox + oy * oy > radius * radius {
                        continue;
                    }
                    self.draw_glyphs(
                        canvas,
                        &font,
                        &glyphs,
                        dx + ox as f32,
                        dy + oy as f32,
                        stroke,
                        alpha_scale,
                    );
                }
            }
        }

        self.draw_glyphs(canvas, &font, &glyphs, dx, dy, fill, alpha_scale);

        if style.underline {
            let rule_y = dy + max_y + size * UNDERLINE_OFFSET;
            let thickness = (size * UNDERLINE_THICKNESS).max(1.0);
            fill_rect(
                canvas,
                dx + min_x,
                rule_y,
                max_x - min_x,
                thickness,
                fill,
                alpha_scale,
            );
        }

        Ok(())
    }

    fn draw_glyphs(
        &mut self,
        canvas: &mut RgbaImage,
        font: &Arc<Font>,
        glyphs: &[GlyphPosition],
        dx: f32,
        dy: f32,
        color: (u8, u8, u8),
        alpha_scale: f32,
    ) {
        for glyph in glyphs {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let bitmap = self.glyph_cache.entry(glyph.key).or_insert_with(|| {
                let (metrics, coverage) = font.rasterize_config(glyph.key);
                GlyphBitmap {
                    width: metrics.width,
                    height: metrics.height,
                    coverage,
                }
            });
            blend_bitmap(
                canvas,
                (glyph.x + dx).round() as i32,
                (glyph.y + dy).round() as i32,
                bitmap,
                color,
                alpha_scale,
            );
        }
    }

    /// Registered font for the family, or the system default with a warning.
    ///
    /// A missing custom font degrades the render rather than aborting it;
    /// only the complete absence of any usable face is an error.
    fn font_for(&self, family: &str) -> Result<Arc<Font>> {
        if let Some(font) = self.registry.resolve(family) {
            return Ok(font);
        }
        warn!("font {family:?} not registered, falling back to system default");
        default_font()
    }
}

/// Color parse with the pipeline's standard fallback: warn and use white.
fn rgb_or_white(hex: &str) -> (u8, u8, u8) {
    parse_hex_rgb(hex).unwrap_or_else(|_| {
        warn!("malformed overlay color {hex:?}, falling back to white");
        (255, 255, 255)
    })
}

/// Source-over blend of a coverage bitmap in `color` onto the canvas.
fn blend_bitmap(
    canvas: &mut RgbaImage,
    x0: i32,
    y0: i32,
    bitmap: &GlyphBitmap,
    color: (u8, u8, u8),
    alpha_scale: f32,
) {
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);
    for row in 0..bitmap.height {
        let y = y0 + row as i32;
        if y < 0 || y >= height {
            continue;
        }
        for col in 0..bitmap.width {
            let x = x0 + col as i32;
            if x < 0 || x >= width {
                continue;
            }
            let coverage = bitmap.coverage[row * bitmap.width + col];
            if coverage == 0 {
                continue;
            }
            let alpha = f32::from(coverage) / 255.0 * alpha_scale;
            blend_pixel(canvas.get_pixel_mut(x as u32, y as u32), color, alpha);
        }
    }
}

/// Axis-aligned filled rectangle, same blend as glyph coverage.
fn fill_rect(
    canvas: &mut RgbaImage,
    x0: f32,
    y0: f32,
    w: f32,
    h: f32,
    color: (u8, u8, u8),
    alpha_scale: f32,
) {
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);
    let x_start = x0.round() as i32;
    let y_start = y0.round() as i32;
    let x_end = (x0 + w).round() as i32;
    let y_end = (y0 + h).round() as i32;
    for y in y_start.max(0)..y_end.min(height) {
        for x in x_start.max(0)..x_end.min(width) {
            blend_pixel(canvas.get_pixel_mut(x as u32, y as u32), color, alpha_scale);
        }
    }
}

fn blend_pixel(dst: &mut Rgba<u8>, color: (u8, u8, u8), alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let dst_a = f32::from(dst.0[3]) / 255.0;
    let out_a = alpha + dst_a * (1.0 - alpha);
    if out_a <= 0.0 {
        return;
    }
    let src = [f32::from(color.0), f32::from(color.1), f32::from(color.2)];
    for i in 0..3 {
        let dst_c = f32::from(dst.0[i]);
        let out = (src[i] * alpha + dst_c * dst_a * (1.0 - alpha)) / out_a;
        dst.0[i] = out.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Encode an RGBA canvas as PNG bytes.
fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}
