use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::filter::laplacian_filter;

/// Convert image to luminance
pub fn to_luminance(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Mean and population standard deviation of luminance on the 0..255 scale
pub fn luminance_stats(gray: &GrayImage) -> (f64, f64) {
    let n = gray.as_raw().len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = gray.as_raw().iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let var = gray
        .as_raw()
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;
    (mean, var.sqrt())
}

/// Variance of the 4-neighbour Laplacian response
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    if gray.width() < 3 || gray.height() < 3 {
        return 0.0;
    }
    let response = laplacian_filter(gray);
    let values = response.as_raw();
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

/// Mean HSV saturation in [0, 1]
pub fn mean_saturation(rgb: &RgbImage) -> f64 {
    let count = (rgb.width() as u64) * (rgb.height() as u64);
    if count == 0 {
        return 0.0;
    }
    let total: f64 = rgb
        .pixels()
        .map(|p| {
            let max = p[0].max(p[1]).max(p[2]);
            let min = p[0].min(p[1]).min(p[2]);
            if max == 0 {
                0.0
            } else {
                (max - min) as f64 / max as f64
            }
        })
        .sum();
    total / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn flat_image_has_no_laplacian_energy() {
        let gray = GrayImage::from_pixel(16, 16, Luma([90u8]));
        assert_eq!(laplacian_variance(&gray), 0.0);
        let (mean, std) = luminance_stats(&gray);
        assert_eq!(mean, 90.0);
        assert_eq!(std, 0.0);
    }

    #[test]
    fn checkerboard_is_sharp() {
        let gray = GrayImage::from_fn(16, 16, |x, y| {
            if (x + y) % 2 == 0 { Luma([0u8]) } else { Luma([255u8]) }
        });
        assert!(laplacian_variance(&gray) > 1000.0);
    }

    #[test]
    fn saturation_of_primaries_and_greys() {
        let red = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
        assert_eq!(mean_saturation(&red), 1.0);
        let grey = RgbImage::from_pixel(4, 4, Rgb([128, 128, 128]));
        assert_eq!(mean_saturation(&grey), 0.0);
        let black = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        assert_eq!(mean_saturation(&black), 0.0);
    }

    #[test]
    fn tiny_images_do_not_panic() {
        let gray = GrayImage::new(2, 2);
        assert_eq!(laplacian_variance(&gray), 0.0);
        assert_eq!(mean_saturation(&RgbImage::new(0, 0)), 0.0);
    }
}
