//! Frame preprocessing ahead of classification
//!
//! Histogram equalisation is applied to the luma channel only, in YCrCb space,
//! and then blended with the untouched frame.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram;

/// Equalise the luma of `image` and blend the result with the original.
///
/// `weight` is the share of the equalised frame: 0 returns the original,
/// 1 returns the fully equalised frame.
pub fn equalize_blend(image: &RgbImage, weight: f32) -> RgbImage {
    let weight = weight.clamp(0.0, 1.0);
    if weight == 0.0 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let mut luma = GrayImage::new(width, height);
    let mut chroma = Vec::with_capacity((width * height) as usize);

    for (x, y, pixel) in image.enumerate_pixels() {
        let (y_value, cr, cb) = rgb_to_ycrcb(pixel);
        luma.put_pixel(x, y, Luma([clamp_u8(y_value)]));
        chroma.push((cr, cb));
    }

    let equalized = equalize_histogram(&luma);

    let mut output = RgbImage::new(width, height);
    for ((x, y, original), (cr, cb)) in image.enumerate_pixels().zip(chroma) {
        let y_value = equalized.get_pixel(x, y)[0] as f32;
        let eq = ycrcb_to_rgb(y_value, cr, cb);
        let blended = Rgb([
            blend(original[0], eq[0], weight),
            blend(original[1], eq[1], weight),
            blend(original[2], eq[2], weight),
        ]);
        output.put_pixel(x, y, blended);
    }
    output
}

fn rgb_to_ycrcb(pixel: &Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = pixel.0.map(f32::from);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cr = (r - y) * 0.713 + 128.0;
    let cb = (b - y) * 0.564 + 128.0;
    (y, cr, cb)
}

fn ycrcb_to_rgb(y: f32, cr: f32, cb: f32) -> [u8; 3] {
    let r = y + 1.403 * (cr - 128.0);
    let g = y - 0.714 * (cr - 128.0) - 0.344 * (cb - 128.0);
    let b = y + 1.773 * (cb - 128.0);
    [clamp_u8(r), clamp_u8(g), clamp_u8(b)]
}

fn blend(original: u8, equalized: u8, weight: f32) -> u8 {
    clamp_u8(original as f32 * (1.0 - weight) + equalized as f32 * weight)
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
