use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::DynamicImage;
use ndarray::Array4;

use crate::error::{Error, Result};

/// Spatial size used when the model leaves height/width dynamic.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Channel placement the model expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// `[batch, height, width, channels]`, the Keras default.
    Nhwc,
    /// `[batch, channels, height, width]`
    Nchw,
}

/// Input tensor geometry, read from the model at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub layout: InputLayout,
}

impl Default for InputSpec {
    fn default() -> Self {
        Self {
            width: DEFAULT_INPUT_SIZE,
            height: DEFAULT_INPUT_SIZE,
            layout: InputLayout::Nhwc,
        }
    }
}

impl InputSpec {
    /// Infers geometry from a declared rank-4 shape. Non-positive entries are
    /// dynamic and take `fallback_size`.
    pub fn from_dims(dims: &[i64], fallback_size: u32) -> Option<Self> {
        let [_, d1, d2, d3] = dims else {
            return None;
        };
        let (layout, h, w) = match (*d1, *d3) {
            (_, 3) => (InputLayout::Nhwc, *d1, *d2),
            (3, _) => (InputLayout::Nchw, *d2, *d3),
            _ => return None,
        };
        let side = |d: i64| if d > 0 { u32::try_from(d).ok() } else { Some(fallback_size) };
        Some(Self {
            width: side(w)?,
            height: side(h)?,
            layout,
        })
    }

    pub fn shape(&self) -> [usize; 4] {
        let (h, w) = (self.height as usize, self.width as usize);
        match self.layout {
            InputLayout::Nhwc => [1, h, w, 3],
            InputLayout::Nchw => [1, 3, h, w],
        }
    }
}

#[derive(Debug)]
pub struct Processor {
    pub spec: InputSpec,
    resize_options: ResizeOptions,
}

impl Processor {
    pub fn new(spec: InputSpec) -> Self {
        Self {
            spec,
            resize_options: ResizeOptions::new()
                .resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        }
    }

    /// Resizes to the model resolution, scales pixels into [0, 1] and adds the
    /// batch axis.
    pub fn preprocess(&self, image: &DynamicImage) -> Result<Array4<f32>> {
        let (orig_width, orig_height) = (image.width(), image.height());
        if orig_width == 0 || orig_height == 0 {
            return Err(Error::InvalidInput(format!(
                "image must be at least 1x1, got {orig_width}x{orig_height}"
            )));
        }

        let src = DynamicImage::ImageRgb8(image.to_rgb8());
        let mut dst = Image::new(self.spec.width, self.spec.height, PixelType::U8x3);
        // Resizer holds scratch buffers only, a fresh one keeps this &self.
        Resizer::new()
            .resize(&src, &mut dst, &self.resize_options)
            .map_err(|e| Error::InvalidInput(format!("resize failed: {e}")))?;

        let (h, w) = (self.spec.height as usize, self.spec.width as usize);
        let pixels: Vec<f32> = dst.buffer().iter().map(|&v| v as f32 / 255.0).collect();
        let nhwc = Array4::from_shape_vec((1, h, w, 3), pixels)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        let batch = match self.spec.layout {
            InputLayout::Nhwc => nhwc,
            InputLayout::Nchw => nhwc.permuted_axes([0, 3, 1, 2]),
        };
        Ok(batch.as_standard_layout().into_owned())
    }
}
