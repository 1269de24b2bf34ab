use crate::config::{Normalization, TensorLayout};
use crate::error::{IdentifyError, Result};
use image::{DynamicImage, ImageFormat};
use ndarray::Array4;

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Turns uploaded bytes into the fixed-shape tensor the classifier expects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocessor {
    pub input_size: u32,
    pub normalization: Normalization,
    pub layout: TensorLayout,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            input_size: 224,
            normalization: Normalization::default(),
            layout: TensorLayout::default(),
        }
    }
}

/// Decodes JPEG or PNG bytes. Anything else is rejected before the pixel
/// data is touched.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(IdentifyError::Decode("empty upload".into()));
    }
    let format = image::guess_format(bytes)
        .map_err(|e| IdentifyError::Decode(format!("unrecognized image data: {}", e)))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(IdentifyError::Decode(format!(
            "unsupported format {:?}, expected JPEG or PNG",
            format
        )));
    }
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| IdentifyError::Decode(e.to_string()))
}

impl Preprocessor {
    pub fn input_shape(&self) -> [usize; 4] {
        let size = self.input_size as usize;
        match self.layout {
            TensorLayout::Nhwc => [1, size, size, 3],
            TensorLayout::Nchw => [1, 3, size, size],
        }
    }

    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<Array4<f32>> {
        let img = decode_image(bytes)?;
        self.preprocess_image(&img)
    }

    pub fn preprocess_image(&self, img: &DynamicImage) -> Result<Array4<f32>> {
        let size = self.input_size;
        let resized = img.resize_exact(size, size, image::imageops::FilterType::CatmullRom);
        // Drops any alpha channel and expands grayscale.
        let rgb = resized.to_rgb8();

        let raw = rgb.into_raw();
        let hw = size as usize * size as usize;
        let mut interleaved = vec![0f32; 3 * hw];
        for (i, pixel) in raw.chunks_exact(3).enumerate() {
            let off = i * 3;
            for c in 0..3 {
                interleaved[off + c] = self.normalize(pixel[c], c);
            }
        }

        let data = match self.layout {
            TensorLayout::Nhwc => interleaved,
            TensorLayout::Nchw => {
                // Transpose HWC -> CHW in tiles so source and all three
                // destination planes stay in cache.
                let mut data = vec![0f32; 3 * hw];
                const TILE: usize = 1024;
                for base in (0..hw).step_by(TILE) {
                    let end = (base + TILE).min(hw);
                    for i in base..end {
                        let src = i * 3;
                        data[i] = interleaved[src];
                        data[hw + i] = interleaved[src + 1];
                        data[2 * hw + i] = interleaved[src + 2];
                    }
                }
                data
            }
        };

        let [n, d1, d2, d3] = self.input_shape();
        Array4::from_shape_vec((n, d1, d2, d3), data)
            .map_err(|e| IdentifyError::Inference(format!("Failed to create tensor: {}", e)))
    }

    /// Zero-valued input, used to probe the classifier's output width.
    pub fn blank_tensor(&self) -> Array4<f32> {
        let [n, d1, d2, d3] = self.input_shape();
        Array4::zeros((n, d1, d2, d3))
    }

    fn normalize(&self, value: u8, channel: usize) -> f32 {
        let v = value as f32;
        match self.normalization {
            Normalization::Rescale => v / 255.0,
            Normalization::Imagenet => (v / 255.0 - MEAN[channel]) / STD[channel],
            Normalization::Symmetric => v / 127.5 - 1.0,
            Normalization::Raw => v,
        }
    }
}
