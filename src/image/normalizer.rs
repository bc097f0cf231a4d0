use crate::config::{PixelScale, INPUT_SIZE};
use crate::utils::error::DiagnosisError;
use crate::Result;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::{Array4, ArrayView4};

/// 模型输入张量，NHWC 布局，形状固定为 (1, 128, 128, 3)
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Array4<f32>,
}

impl NormalizedTensor {
    pub const SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3];

    pub fn from_array(data: Array4<f32>) -> Result<Self> {
        if data.shape() != Self::SHAPE {
            return Err(DiagnosisError::ImageConversion(format!(
                "Expected tensor shape {:?}, got {:?}",
                Self::SHAPE,
                data.shape()
            )));
        }
        Ok(Self { data })
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

pub struct ImageNormalizer {
    size: u32,
    scale: PixelScale,
}

impl ImageNormalizer {
    pub fn new(scale: PixelScale) -> Self {
        Self {
            size: INPUT_SIZE,
            scale,
        }
    }

    /// RGB转换 + 双线性缩放到 128x128 (拉伸，不做letterbox) + 增加batch维度
    pub fn normalize(&self, image: &DynamicImage) -> Result<NormalizedTensor> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DiagnosisError::ImageConversion(format!(
                "Cannot convert an empty image ({}x{})",
                width, height
            )));
        }

        // to_rgb8 会丢弃alpha通道，灰度图复制到三个通道
        let rgb = image.to_rgb8();
        let resized = image::imageops::resize(&rgb, self.size, self.size, FilterType::Triangle);

        let side = self.size as usize;
        let factor = self.scale.factor();
        let data = Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 * factor
        });

        tracing::debug!(
            "Normalized image {}x{} -> tensor shape {:?}",
            width,
            height,
            data.shape()
        );

        NormalizedTensor::from_array(data)
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(PixelScale::default())
    }
}
