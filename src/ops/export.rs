// ============================================================================
// PNG EXPORT: flatten the quilt into one image
// ============================================================================

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};

use crate::color::Color;
use crate::error::{QuiltError, Result};
use crate::grid::Quilt;

/// Largest `scale` accepted by `render_quilt`.
pub const MAX_EXPORT_SCALE: u32 = 64;

/// Render every square side by side, `scale` image pixels per quilt pixel.
/// Cells of a ragged last row are painted with `background`.
pub fn render_quilt(quilt: &Quilt, scale: u32, background: Color) -> Result<RgbaImage> {
    if !(1..=MAX_EXPORT_SCALE).contains(&scale) {
        return Err(QuiltError::invalid(format!(
            "export scale must be between 1 and {}, got {}",
            MAX_EXPORT_SCALE, scale
        )));
    }
    let layout = quilt.layout();
    let n = quilt.grid_size() as u32;
    let side = |count: usize| -> Result<u32> {
        u32::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(n))
            .and_then(|c| c.checked_mul(scale))
            .ok_or_else(|| QuiltError::invalid(format!("export at scale {} is too large", scale)))
    };
    let width = side(layout.columns)?;
    let height = side(layout.rows())?;

    let mut img = RgbaImage::from_pixel(width, height, background.to_rgba());
    for (index, square) in quilt.squares().iter().enumerate() {
        let origin_x = (index % layout.columns) as u32 * n * scale;
        let origin_y = (index / layout.columns) as u32 * n * scale;
        for (row, pixels) in square.rows().enumerate() {
            for (col, color) in pixels.iter().enumerate() {
                let rgba = color.to_rgba();
                let x0 = origin_x + col as u32 * scale;
                let y0 = origin_y + row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        img.put_pixel(x0 + dx, y0 + dy, rgba);
                    }
                }
            }
        }
    }
    Ok(img)
}

/// Encode `image` as PNG at `path`.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let encoder = PngEncoder::new(&mut writer);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(())
}

pub fn export_png(quilt: &Quilt, path: &Path, scale: u32) -> Result<()> {
    let img = render_quilt(quilt, scale, Color::BACKGROUND)?;
    write_png(&img, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{PixelGrid, QuiltLayout};

    #[test]
    fn image_size_follows_layout_and_scale() {
        let quilt = Quilt::blank(QuiltLayout::classic());
        let img = render_quilt(&quilt, 2, Color::BACKGROUND).unwrap();
        assert_eq!(img.width(), 5 * 15 * 2);
        assert_eq!(img.height(), 6 * 15 * 2);
    }

    #[test]
    fn pixels_land_in_their_square() {
        let layout = QuiltLayout::builder().squares(3).columns(2).grid_size(2).build().unwrap();
        let mut quilt = Quilt::blank(layout);
        let mut sq = PixelGrid::filled(2, Color::BACKGROUND);
        sq.set(1, 0, Color::BLACK).unwrap();
        quilt.replace(1, sq).unwrap();

        let img = render_quilt(&quilt, 3, Color::HALO_FILL).unwrap();
        // square 1 is column 1 of row 0; its (1, 0) pixel starts at (6, 3)
        assert_eq!(*img.get_pixel(6, 3), Color::BLACK.to_rgba());
        assert_eq!(*img.get_pixel(8, 5), Color::BLACK.to_rgba());
        // ragged second row, column 1 is empty
        assert_eq!(*img.get_pixel(11, 11), Color::HALO_FILL.to_rgba());
    }

    #[test]
    fn zero_scale_is_rejected() {
        let quilt = Quilt::blank(QuiltLayout::classic());
        assert!(render_quilt(&quilt, 0, Color::BACKGROUND).is_err());
    }

    #[test]
    fn oversized_scale_is_rejected_without_allocating() {
        let quilt = Quilt::blank(QuiltLayout::classic());
        for scale in [MAX_EXPORT_SCALE + 1, 60_000_000, u32::MAX] {
            assert!(matches!(
                render_quilt(&quilt, scale, Color::BACKGROUND),
                Err(QuiltError::InvalidArgument { .. })
            ));
        }
        let img = render_quilt(&quilt, MAX_EXPORT_SCALE, Color::BACKGROUND).unwrap();
        assert_eq!(img.width(), 5 * 15 * MAX_EXPORT_SCALE);
    }

    #[test]
    fn writes_a_decodable_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quilt.png");
        let quilt = Quilt::blank(QuiltLayout::classic());
        export_png(&quilt, &path, 1).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
