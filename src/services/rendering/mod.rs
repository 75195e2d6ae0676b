// Text rendering with cosmic-text.
//
// The renderer owns a FontSystem loaded from the configured fonts directory
// (no system font scan) and draws each region's translation at the region's
// top-left anchor, honoring per-region alignment, line spacing and color
// hints. Layout decisions come from the fit search in `layout`; this module
// provides the measurement backend and the outline-then-fill compositing.

pub mod layout;

use cosmic_text::{
    Align, Attrs, Buffer, Color as CosmicColor, Family, FontSystem, Metrics, Shaping, SwashCache,
    Wrap,
};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::core::config::RenderingConfig;
use crate::core::errors::RenderResult;
use crate::core::types::{TextAlignment, TextRegion};
use layout::{fit_text, FitParams, TextLayout, TextMeasurer};

/// Fixed light halo drawn beneath the fill pass
const OUTLINE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Offsets of the outline passes: every delta in {-2..2}² except the center
const OUTLINE_RADIUS: i32 = 2;

pub struct TextRenderer {
    font_system: Mutex<FontSystem>,
    swash_cache: Mutex<SwashCache>,
    config: RenderingConfig,
}

impl TextRenderer {
    /// Create the renderer with fonts from `config.font_dir` only; system
    /// fonts are deliberately not scanned.
    pub fn new(config: RenderingConfig) -> Self {
        let mut db = cosmic_text::fontdb::Database::new();

        match std::fs::read_dir(&config.font_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let is_font = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"))
                        .unwrap_or(false);
                    if !is_font {
                        continue;
                    }
                    match std::fs::read(&path) {
                        Ok(data) => {
                            db.load_font_data(data);
                            debug!("loaded font {}", path.display());
                        }
                        Err(e) => warn!("could not read font {}: {e}", path.display()),
                    }
                }
            }
            Err(e) => warn!("font directory {} unavailable: {e}", config.font_dir),
        }

        if db.is_empty() {
            warn!("no fonts loaded from {}; text will not render", config.font_dir);
        } else {
            info!("renderer ready with {} font faces", db.len());
        }

        let font_system = FontSystem::new_with_locale_and_db("en-US".to_string(), db);

        Self {
            font_system: Mutex::new(font_system),
            swash_cache: Mutex::new(SwashCache::new()),
            config,
        }
    }

    /// Render every region's translation onto the image. Regions whose
    /// translation is empty or a single character are skipped entirely —
    /// nothing meaningful to draw.
    pub fn render_regions(&self, image: &mut RgbaImage, regions: &[TextRegion]) -> RenderResult<()> {
        for region in regions {
            let text = region.translation.trim();
            if text.chars().count() <= 1 {
                continue;
            }

            let params = FitParams {
                min_font_size: sentinel(region.min_font_size, self.config.min_font_size),
                max_font_size: sentinel(region.max_font_size, self.config.max_font_size),
                step: self.config.font_size_step,
                line_spacing: sentinel(region.line_spacing, self.config.line_spacing),
            };

            let fitted = fit_text(self, text, region.width(), region.height(), &params);
            debug!(
                "region at {:?}: size {:.2}, {} lines",
                region.xyxy,
                fitted.font_size,
                fitted.text.split('\n').count()
            );

            let color = parse_hex_color(&region.font_color)
                .or_else(|| parse_hex_color(&self.config.font_color))
                .unwrap_or(Rgba([0, 0, 0, 255]));
            let anchor_x = region.xyxy[0] as i32;
            let anchor_y = region.xyxy[1] as i32;

            if self.config.outline {
                for dy in -OUTLINE_RADIUS..=OUTLINE_RADIUS {
                    for dx in -OUTLINE_RADIUS..=OUTLINE_RADIUS {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        self.draw_layout(
                            image,
                            &fitted,
                            region,
                            params.line_spacing,
                            anchor_x + dx,
                            anchor_y + dy,
                            OUTLINE_COLOR,
                        );
                    }
                }
            }

            self.draw_layout(
                image,
                &fitted,
                region,
                params.line_spacing,
                anchor_x,
                anchor_y,
                color,
            );
        }
        Ok(())
    }

    fn draw_layout(
        &self,
        image: &mut RgbaImage,
        fitted: &TextLayout,
        region: &TextRegion,
        line_spacing: f32,
        x: i32,
        y: i32,
        color: Rgba<u8>,
    ) {
        let align = match region.alignment {
            TextAlignment::Left => Align::Left,
            TextAlignment::Center => Align::Center,
            TextAlignment::Right => Align::Right,
        };

        let mut font_system = self.font_system.lock();
        let metrics = Metrics::new(fitted.font_size, fitted.font_size * line_spacing);
        let mut buffer = Buffer::new(&mut font_system, metrics);

        // Alignment is relative to the buffer width, so pin it to the region;
        // the text is already wrapped, nothing may re-wrap here
        buffer.set_size(&mut font_system, Some(region.width()), None);
        buffer.set_wrap(&mut font_system, Wrap::None);

        let attrs = Attrs::new().family(Family::Name(&self.config.font_family));
        buffer.set_text(&mut font_system, &fitted.text, attrs, Shaping::Advanced);
        for line in buffer.lines.iter_mut() {
            line.set_align(Some(align));
        }
        buffer.shape_until_scroll(&mut font_system, false);

        let cosmic_color = CosmicColor::rgba(color[0], color[1], color[2], color[3]);
        let mut swash_cache = self.swash_cache.lock();

        buffer.draw(
            &mut font_system,
            &mut swash_cache,
            cosmic_color,
            |px_x, px_y, _w, _h, pixel_color| {
                if pixel_color.a() == 0 {
                    return;
                }
                let img_x = x + px_x;
                let img_y = y + px_y;
                if img_x < 0
                    || img_y < 0
                    || img_x >= image.width() as i32
                    || img_y >= image.height() as i32
                {
                    return;
                }

                let existing = image.get_pixel(img_x as u32, img_y as u32);
                let alpha = pixel_color.a() as f32 / 255.0;
                let inv_alpha = 1.0 - alpha;

                let blended = Rgba([
                    (pixel_color.r() as f32 * alpha + existing[0] as f32 * inv_alpha) as u8,
                    (pixel_color.g() as f32 * alpha + existing[1] as f32 * inv_alpha) as u8,
                    (pixel_color.b() as f32 * alpha + existing[2] as f32 * inv_alpha) as u8,
                    existing[3].max(pixel_color.a()),
                ]);
                image.put_pixel(img_x as u32, img_y as u32, blended);
            },
        );
    }
}

impl TextMeasurer for TextRenderer {
    /// Visual bounds of the text including glyph overhangs, measured for the
    /// exact font, size and spacing that will be drawn.
    fn measure(&self, text: &str, font_size: f32, line_spacing: f32) -> (f32, f32) {
        if text.trim().is_empty() {
            return (0.0, 0.0);
        }

        let mut font_system = self.font_system.lock();
        let metrics = Metrics::new(font_size, font_size * line_spacing);
        let mut buffer = Buffer::new(&mut font_system, metrics);

        // The fit search supplies explicit line breaks; no re-wrapping
        buffer.set_size(&mut font_system, None, None);
        buffer.set_wrap(&mut font_system, Wrap::None);

        let attrs = Attrs::new().family(Family::Name(&self.config.font_family));
        buffer.set_text(&mut font_system, text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut font_system, false);

        let mut max_width = 0.0f32;
        let mut total_lines = 0usize;

        for run in buffer.layout_runs() {
            total_lines += 1;
            let (run_min_x, run_max_x) = run
                .glyphs
                .iter()
                .map(|g| (g.x, g.x + g.w))
                .fold((f32::MAX, f32::MIN), |(min, max), (x1, x2)| {
                    (min.min(x1), max.max(x2))
                });

            let run_width = if run_min_x == f32::MAX {
                run.line_w
            } else {
                // Small padding for glyph overhangs on each side
                let visual = run_max_x - run_min_x;
                visual * 1.05
            };
            max_width = max_width.max(run_width);
        }

        (max_width, total_lines as f32 * metrics.line_height)
    }
}

fn sentinel(value: f32, default: f32) -> f32 {
    if value > 0.0 {
        value
    } else {
        default
    }
}

/// Parse "#RRGGBB" (or "#RGB") into an opaque RGBA pixel
fn parse_hex_color(hex: &str) -> Option<Rgba<u8>> {
    let hex = hex.strip_prefix('#')?;
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Rgba([r, g, b, 255]))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
            Some(Rgba([r, g, b, 255]))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_renderer() -> TextRenderer {
        // Nonexistent font dir: measurement and drawing degrade to no-ops,
        // which is all the boundary tests need
        TextRenderer::new(RenderingConfig {
            font_dir: "/nonexistent-fonts".to_string(),
            font_family: "Anime Ace".to_string(),
            font_color: "#000000".to_string(),
            min_font_size: 10.0,
            max_font_size: 40.0,
            font_size_step: 0.75,
            line_spacing: 1.2,
            outline: true,
        })
    }

    #[test]
    fn test_empty_and_single_char_translations_draw_nothing() {
        let renderer = test_renderer();
        let mut image = RgbaImage::from_pixel(64, 64, Rgba([200, 200, 200, 255]));
        let before = image.clone();

        let mut empty = TextRegion::new([0.0, 0.0, 50.0, 30.0], 0.0);
        empty.translation = String::new();
        let mut single = TextRegion::new([0.0, 32.0, 50.0, 62.0], 0.0);
        single.translation = "H".to_string();

        renderer.render_regions(&mut image, &[empty, single]).unwrap();
        assert_eq!(image.as_raw(), before.as_raw());
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF8000"), Some(Rgba([255, 128, 0, 255])));
        assert_eq!(parse_hex_color("#fff"), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(parse_hex_color("red"), None);
        assert_eq!(parse_hex_color(""), None);
    }

    #[test]
    fn test_sentinel_defaults() {
        assert_eq!(sentinel(0.0, 12.0), 12.0);
        assert_eq!(sentinel(18.0, 12.0), 18.0);
    }
}
