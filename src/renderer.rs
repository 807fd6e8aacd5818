use eframe::egui::{Color32, ColorImage};
use image::imageops::FilterType;
use image::DynamicImage;

/// Converts a decoded image into an egui image no larger than `max_dim` on
/// either side.
pub fn render_texture_image(image: &DynamicImage, max_dim: u32) -> ColorImage {
    let max_dim = max_dim.max(1);
    let rgba = if image.width() > max_dim || image.height() > max_dim {
        image.resize(max_dim, max_dim, FilterType::Triangle).to_rgba8()
    } else {
        image.to_rgba8()
    };

    let size = [rgba.width() as usize, rgba.height() as usize];
    ColorImage::from_rgba_unmultiplied(size, rgba.as_raw())
}

/// Flat card-colored tile shown while an image is loading or after it failed.
pub fn render_placeholder(width_px: usize, height_px: usize, failed: bool) -> ColorImage {
    let base = if failed {
        Color32::from_rgb(236, 222, 222)
    } else {
        Color32::from_gray(226)
    };
    let stripe = if failed {
        Color32::from_rgb(226, 206, 206)
    } else {
        Color32::from_gray(214)
    };

    let mut pixels = Vec::with_capacity(width_px.saturating_mul(height_px));
    for y in 0..height_px {
        for x in 0..width_px {
            let on_stripe = ((x + y) / 8) % 2 == 0;
            pixels.push(if on_stripe { stripe } else { base });
        }
    }

    ColorImage {
        size: [width_px, height_px],
        pixels,
    }
}

pub fn aspect_ratio(size: [usize; 2]) -> Option<f32> {
    let [width, height] = size;
    (width > 0 && height > 0).then(|| width as f32 / height as f32)
}
