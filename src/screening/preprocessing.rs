use image::{DynamicImage, RgbImage};
use ndarray::{Array4, ArrayView4};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::{ModelInput, Normalization};
use crate::error::CascadeError;

/// Convert the caller's raster to 8-bit RGB, rejecting empty images
pub fn to_rgb(img: &DynamicImage) -> Result<RgbImage, CascadeError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(CascadeError::EmptyInput);
    }
    Ok(img.to_rgb8())
}

/// Resize to the model's square input using the model's resampling filter
pub fn resize_for(img: &RgbImage, input: &ModelInput) -> RgbImage {
    image::imageops::resize(img, input.size, input.size, input.resize.filter_type())
}

/// Lay out a raster as a `[1, H, W, 3]` tensor with the given value mapping
pub fn to_tensor(img: &RgbImage, normalization: Normalization) -> Array4<f32> {
    let (width, height) = img.dimensions();
    Array4::from_shape_fn(
        (1, height as usize, width as usize, 3),
        |(_, y, x, c)| normalization.apply(img.get_pixel(x as u32, y as u32)[c]),
    )
}

/// Counts tensors handed out by the normalizer and tensors dropped again.
#[derive(Debug, Default)]
pub struct TensorLedger {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl TensorLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Tensors currently alive
    pub fn live(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }
}

/// A model input tensor whose lifetime is tracked by a [`TensorLedger`].
///
/// The buffer is freed and the release recorded when this value is dropped,
/// on success and error paths alike.
pub struct ScopedTensor {
    data: Array4<f32>,
    ledger: Arc<TensorLedger>,
}

impl ScopedTensor {
    pub fn new(data: Array4<f32>, ledger: &Arc<TensorLedger>) -> Self {
        ledger.acquired.fetch_add(1, Ordering::SeqCst);
        Self {
            data,
            ledger: Arc::clone(ledger),
        }
    }

    /// Lay out an already resized raster and track the result
    pub fn from_raster(
        img: &RgbImage,
        normalization: Normalization,
        ledger: &Arc<TensorLedger>,
    ) -> Self {
        Self::new(to_tensor(img, normalization), ledger)
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn shape(&self) -> [usize; 4] {
        let dim = self.data.dim();
        [dim.0, dim.1, dim.2, dim.3]
    }
}

impl Drop for ScopedTensor {
    fn drop(&mut self) {
        self.ledger.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelInput;
    use image::Rgb;

    fn prepared(img: &RgbImage, input: &ModelInput, ledger: &Arc<TensorLedger>) -> ScopedTensor {
        ScopedTensor::from_raster(&resize_for(img, input), input.normalization, ledger)
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 255])
        })
    }

    #[test]
    fn test_tensor_shape_and_ranges() {
        let ledger = TensorLedger::new();
        let img = gradient(40, 30);

        for input in [ModelInput::guard(16), ModelInput::disease(24)] {
            let tensor = prepared(&img, &input, &ledger);
            let size = input.size as usize;
            assert_eq!(tensor.shape(), [1, size, size, 3]);

            let (lo, hi) = input.normalization.range();
            assert!(tensor.view().iter().all(|v| (lo..=hi).contains(v)));
        }
    }

    #[test]
    fn test_ledger_tracks_drop() {
        let ledger = TensorLedger::new();
        {
            let _a = prepared(&gradient(8, 8), &ModelInput::guard(4), &ledger);
            let _b = prepared(&gradient(8, 8), &ModelInput::disease(4), &ledger);
            assert_eq!(ledger.live(), 2);
        }
        assert_eq!(ledger.acquired(), 2);
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn test_channel_order_is_preserved() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 51]));
        let tensor = to_tensor(&img, Normalization::Unit);
        assert_eq!(tensor[[0, 1, 1, 0]], 1.0);
        assert_eq!(tensor[[0, 1, 1, 1]], 0.0);
        assert!((tensor[[0, 1, 1, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let img = DynamicImage::new_rgb8(0, 10);
        assert_eq!(to_rgb(&img).unwrap_err(), CascadeError::EmptyInput);
    }
}
