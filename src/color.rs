use std::fmt;

use anyhow::Result;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 默认采样尺寸，宽高分别不超过该值
pub const DEFAULT_SAMPLE_SIZE: u32 = 64;

/// 颜色特征：图片 RGB 三通道的平均值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub struct ColorFeature {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ColorFeature {
    /// 中性特征，无法读取像素时使用
    pub const NEUTRAL: Self = Self { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 计算图片的平均颜色
    ///
    /// 宽高分别截断到 `max_side` 后再采样，空图片返回中性特征
    pub fn from_image(image: &DynamicImage, max_side: u32) -> Self {
        let (width, height) = image.dimensions();
        let (w, h) = (width.min(max_side), height.min(max_side));
        if w == 0 || h == 0 {
            return Self::NEUTRAL;
        }

        let sampled = image.resize_exact(w, h, FilterType::Triangle).to_rgb8();

        let mut sum = [0u64; 3];
        let mut n = 0u64;
        for pixel in sampled.pixels() {
            sum[0] += pixel[0] as u64;
            sum[1] += pixel[1] as u64;
            sum[2] += pixel[2] as u64;
            n += 1;
        }
        if n == 0 {
            return Self::NEUTRAL;
        }

        let mean = |s: u64| (s as f64 / n as f64).round().clamp(0., 255.) as u8;
        Self::new(mean(sum[0]), mean(sum[1]), mean(sum[2]))
    }

    /// 与另一个特征在 RGB 空间中的欧氏距离，范围 0 ~ 441.67
    pub fn distance(&self, other: &Self) -> f32 {
        let dr = self.r as f32 - other.r as f32;
        let dg = self.g as f32 - other.g as f32;
        let db = self.b as f32 - other.b as f32;
        (dr * dr + dg * dg + db * db).sqrt()
    }
}

impl fmt::Display for ColorFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// 解码图片，格式由内容自动推断
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// 从图片字节中提取颜色特征，解码失败时返回中性特征
pub fn extract_bytes(bytes: &[u8], max_side: u32) -> ColorFeature {
    match decode(bytes) {
        Ok(image) => ColorFeature::from_image(&image, max_side),
        Err(e) => {
            log::debug!("图片解码失败，使用中性特征: {e}");
            ColorFeature::NEUTRAL
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};
    use rstest::*;

    use super::*;

    fn encode_png(image: RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[rstest]
    #[case::small(8, 8)]
    #[case::wide(300, 20)]
    #[case::large(640, 480)]
    fn test_solid_color(#[case] width: u32, #[case] height: u32) {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 100, 50])));
        assert_eq!(ColorFeature::from_image(&image, DEFAULT_SAMPLE_SIZE), ColorFeature::new(200, 100, 50));
    }

    #[test]
    fn test_mean_is_rounded() {
        // 左半边 (0,0,0)，右半边 (255,255,1)
        let image = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 1]) });
        let feature = ColorFeature::from_image(&DynamicImage::ImageRgb8(image), DEFAULT_SAMPLE_SIZE);
        assert_eq!(feature, ColorFeature::new(128, 128, 1));
    }

    #[test]
    fn test_zero_size_is_neutral() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert_eq!(ColorFeature::from_image(&image, DEFAULT_SAMPLE_SIZE), ColorFeature::NEUTRAL);
    }

    #[test]
    fn test_corrupt_bytes_are_neutral() {
        assert!(decode(b"definitely not an image").is_err());
        assert_eq!(extract_bytes(b"definitely not an image", DEFAULT_SAMPLE_SIZE), ColorFeature::NEUTRAL);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let image = RgbImage::from_fn(97, 131, |x, y| Rgb([(x * 2) as u8, (y % 256) as u8, ((x + y) % 256) as u8]));
        let bytes = encode_png(image);
        let a = extract_bytes(&bytes, DEFAULT_SAMPLE_SIZE);
        let b = extract_bytes(&bytes, DEFAULT_SAMPLE_SIZE);
        assert_eq!(a, b);
    }

    #[test]
    fn test_distance() {
        let a = ColorFeature::new(0, 0, 0);
        let b = ColorFeature::new(255, 255, 255);
        assert_eq!(a.distance(&a), 0.);
        assert!((a.distance(&b) - 441.673).abs() < 0.01);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn test_display() {
        assert_eq!(ColorFeature::new(255, 16, 0).to_string(), "#ff1000");
    }
}
