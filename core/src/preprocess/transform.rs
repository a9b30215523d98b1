use crate::error::{MammoprepError, Result};
use crate::types::{Laterality, PreprocessConfig};
use image::imageops;
use image::{ImageBuffer, Luma};
use ndarray::{s, Array2, Array3, ArrayView2};

/// Crops to the smallest rectangle containing every non-zero pixel
///
/// # Errors
///
/// Returns [`MammoprepError::EmptyImage`] if every pixel is zero.
pub fn crop_nonzero(pixels: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for ((r, c), &v) in pixels.indexed_iter() {
        if v != 0.0 {
            bounds = Some(match bounds {
                None => (r, r, c, c),
                Some((r0, r1, c0, c1)) => (r0.min(r), r1.max(r), c0.min(c), c1.max(c)),
            });
        }
    }

    let (r0, r1, c0, c1) = bounds.ok_or(MammoprepError::EmptyImage)?;
    Ok(pixels.slice(s![r0..=r1, c0..=c1]).to_owned())
}

/// Takes the centered square of side `min(rows, columns)`
///
/// The offset along the long axis is `long / 2 - short / 2` using integer
/// halves, so odd leftovers fall on the far edge.
pub fn center_square(pixels: ArrayView2<'_, f32>) -> ArrayView2<'_, f32> {
    let (rows, columns) = pixels.dim();
    if rows >= columns {
        let start = rows / 2 - columns / 2;
        pixels.slice_move(s![start..start + columns, ..])
    } else {
        let start = columns / 2 - rows / 2;
        pixels.slice_move(s![.., start..start + rows])
    }
}

/// Bilinear resample to `size x size` on the 16-bit sample grid
///
/// Output pixel `d` reads source coordinate `(d + 0.5) * scale - 0.5`,
/// clamped to the image, from its four nearest neighbours. There is no
/// antialiasing when downscaling. Samples are held as `u16`, so inputs
/// saturate to `0..=65535` and resampled values are rounded.
pub fn resize(pixels: ArrayView2<'_, f32>, size: usize) -> Result<Array2<f32>> {
    let (rows, columns) = pixels.dim();
    if rows == 0 || columns == 0 {
        return Err(MammoprepError::EmptyImage);
    }

    let samples: Vec<u16> = pixels.iter().map(|&v| v.round() as u16).collect();
    let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(columns as u32, rows as u32, samples).ok_or_else(|| {
            MammoprepError::PixelDataError(format!(
                "cannot build {}x{} resample buffer",
                rows, columns
            ))
        })?;

    let xs = source_coordinates(columns, size);
    let ys = source_coordinates(rows, size);
    let mut resized = Array2::<f32>::zeros((size, size));
    for ((r, c), value) in resized.indexed_iter_mut() {
        let Luma([sample]) = imageops::interpolate_bilinear(&buffer, xs[c], ys[r])
            .ok_or_else(|| {
                MammoprepError::PixelDataError(format!(
                    "sample ({}, {}) outside {}x{} image",
                    ys[r], xs[c], rows, columns
                ))
            })?;
        *value = f32::from(sample);
    }

    Ok(resized)
}

/// Half-pixel-centred source positions for each of `size` outputs
fn source_coordinates(len: usize, size: usize) -> Vec<f32> {
    let scale = len as f64 / size as f64;
    let last = (len - 1) as f64;
    (0..size)
        .map(|d| ((d as f64 + 0.5) * scale - 0.5).clamp(0.0, last) as f32)
        .collect()
}

/// Maps `median` to 0 and `2 * median` to `expected_max`
pub fn normalize_intensity(pixels: &mut Array2<f32>, median: f32, expected_max: f32) {
    pixels.mapv_inplace(|x| (x - median) / median * expected_max);
}

/// Flips an image left to right
pub fn mirror(pixels: &Array2<f32>) -> Array2<f32> {
    pixels.slice(s![.., ..;-1]).to_owned()
}

/// Replaces every value below `threshold` with `floor`
pub fn floor_below(pixels: &mut Array2<f32>, threshold: f32, floor: f32) {
    pixels.mapv_inplace(|x| if x < threshold { floor } else { x });
}

/// Runs the full single-channel normalization
///
/// crop non-zero → center square → resize → intensity normalize →
/// mirror right breasts → floor values under the filter threshold.
pub fn center_crop_resize_filter(
    pixels: ArrayView2<'_, f32>,
    laterality: Laterality,
    config: &PreprocessConfig,
) -> Result<Array2<f32>> {
    let cropped = crop_nonzero(pixels)?;
    let mut res = resize(center_square(cropped.view()), config.size)?;

    normalize_intensity(&mut res, config.median(), config.expected_max);
    if laterality.is_mirrored() {
        res = mirror(&res);
    }
    floor_below(&mut res, config.filter_threshold, config.expected_min());

    Ok(res)
}

/// Stacks `channels` copies of a 2D image into a (channels, rows, columns) array
pub fn replicate_channels(pixels: &Array2<f32>, channels: usize) -> Array3<f32> {
    let (rows, columns) = pixels.dim();
    Array3::from_shape_fn((channels, rows, columns), |(_, r, c)| pixels[[r, c]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn test_crop_nonzero_bounds() {
        let pixels = array![
            [0.0_f32, 0.0, 0.0, 0.0],
            [0.0, 5.0, 0.0, 0.0],
            [0.0, 0.0, 7.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
        ];

        let cropped = crop_nonzero(pixels.view()).unwrap();
        assert_eq!(cropped, array![[5.0_f32, 0.0], [0.0, 7.0]]);
    }

    #[test]
    fn test_crop_nonzero_single_pixel() {
        let mut pixels = Array2::<f32>::zeros((5, 5));
        pixels[[4, 0]] = 1.0;

        let cropped = crop_nonzero(pixels.view()).unwrap();
        assert_eq!(cropped, array![[1.0_f32]]);
    }

    #[test]
    fn test_crop_nonzero_all_zero() {
        let pixels = Array2::<f32>::zeros((3, 3));
        assert!(matches!(
            crop_nonzero(pixels.view()),
            Err(MammoprepError::EmptyImage)
        ));
    }

    #[rstest]
    #[case((6, 2), (2, 2), 2)]
    #[case((5, 2), (2, 2), 1)]
    #[case((4, 3), (3, 3), 1)]
    #[case((3, 3), (3, 3), 0)]
    fn test_center_square_portrait(
        #[case] dim: (usize, usize),
        #[case] expected_dim: (usize, usize),
        #[case] first_row: usize,
    ) {
        let pixels = Array2::from_shape_fn(dim, |(r, _)| r as f32);
        let square = center_square(pixels.view());

        assert_eq!(square.dim(), expected_dim);
        assert_eq!(square[[0, 0]], first_row as f32);
    }

    #[test]
    fn test_center_square_landscape() {
        let pixels = Array2::from_shape_fn((2, 6), |(_, c)| c as f32);
        let square = center_square(pixels.view());

        assert_eq!(square.dim(), (2, 2));
        assert_eq!(square.row(0).to_vec(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_resize_constant_image() {
        let pixels = Array2::from_elem((10, 10), 1234.0_f32);
        let resized = resize(pixels.view(), 4).unwrap();

        assert_eq!(resized.dim(), (4, 4));
        assert!(resized.iter().all(|&v| v == 1234.0));
    }

    #[test]
    fn test_resize_samples_two_nearest_columns() {
        // 8x8 ramp, (col + 1) * 100, halved twice
        let pixels = Array2::from_shape_fn((8, 8), |(_, c)| ((c + 1) * 100) as f32);
        let resized = resize(pixels.view(), 2).unwrap();

        // Output columns sit at source x = 1.5 and 5.5
        assert_eq!(resized, array![[250.0_f32, 650.0], [250.0, 650.0]]);
    }

    #[test]
    fn test_resize_rounds_to_sample_grid() {
        let pixels = array![[0.0_f32, 1.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0]];
        let resized = resize(pixels.view(), 2).unwrap();

        // x = 0.5 and 2.5 both blend 0 and 1 evenly; 0.5 rounds away from zero
        assert_eq!(resized, array![[1.0_f32, 1.0], [1.0, 1.0]]);
    }

    #[test]
    fn test_resize_upscale_clamps_edges() {
        let pixels = array![[100.0_f32, 300.0]];
        let resized = resize(pixels.view(), 4).unwrap();

        // x = -0.25, 0.25, 0.75, 1.25 clamped into [0, 1]
        assert_eq!(resized.row(0).to_vec(), vec![100.0, 150.0, 250.0, 300.0]);
        assert_eq!(resized.row(3), resized.row(0));
    }

    #[test]
    fn test_resize_preserves_range() {
        let pixels = Array2::from_shape_fn((40, 40), |(r, c)| (r * 40 + c) as f32 * 2.0);
        let resized = resize(pixels.view(), 8).unwrap();

        assert_eq!(resized.dim(), (8, 8));
        let max = pixels.iter().cloned().fold(f32::MIN, f32::max);
        for &v in resized.iter() {
            assert!(v >= -1e-2 && v <= max + 1e-2, "value {} out of range", v);
        }
        // Rows increase top to bottom after resampling
        assert!(resized[[7, 0]] > resized[[0, 0]]);
    }

    #[test]
    fn test_normalize_intensity() {
        let mut pixels = array![[0.0_f32, 2047.5, 4095.0]];
        normalize_intensity(&mut pixels, 2047.5, 100.0);
        assert_eq!(pixels, array![[-100.0_f32, 0.0, 100.0]]);
    }

    #[test]
    fn test_mirror() {
        let pixels = array![[1.0_f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(mirror(&pixels), array![[3.0_f32, 2.0, 1.0], [6.0, 5.0, 4.0]]);
    }

    #[test]
    fn test_floor_below() {
        let mut pixels = array![[-95.0_f32, -90.0, 10.0]];
        floor_below(&mut pixels, -90.0, -100.0);
        assert_eq!(pixels, array![[-100.0_f32, -90.0, 10.0]]);
    }

    #[test]
    fn test_replicate_channels() {
        let pixels = array![[1.0_f32, 2.0], [3.0, 4.0]];
        let stacked = replicate_channels(&pixels, 3);

        assert_eq!(stacked.dim(), (3, 2, 2));
        for channel in stacked.outer_iter() {
            assert_eq!(channel, pixels);
        }
    }

    fn left_bright_image() -> Array2<f32> {
        // Breast tissue on the left half, zero background on the right
        Array2::from_shape_fn((16, 16), |(_, c)| if c < 8 { 4095.0 } else { 0.0 })
    }

    #[test]
    fn test_pipeline_output_shape_and_range() {
        let config = PreprocessConfig::default().with_size(8);
        let mut pixels = Array2::<f32>::zeros((20, 12));
        pixels
            .slice_mut(s![2..18, 2..10])
            .assign(&Array2::from_shape_fn((16, 8), |(r, c)| ((r + c) * 200) as f32));

        let out = center_crop_resize_filter(pixels.view(), Laterality::Left, &config).unwrap();

        assert_eq!(out.dim(), (8, 8));
        for &v in out.iter() {
            assert!(v >= config.filter_threshold || v == config.expected_min());
        }
    }

    #[test]
    fn test_pipeline_mirrors_right_breast() {
        let config = PreprocessConfig::default().with_size(4);
        let mut pixels = left_bright_image();
        // Keep the crop from trimming the zero half
        pixels[[0, 15]] = 1.0;

        let left = center_crop_resize_filter(pixels.view(), Laterality::Left, &config).unwrap();
        let right = center_crop_resize_filter(pixels.view(), Laterality::Right, &config).unwrap();

        assert_eq!(mirror(&left), right);
        assert!(left[[2, 0]] > left[[2, 3]]);
        assert!(right[[2, 3]] > right[[2, 0]]);
    }

    #[test]
    fn test_pipeline_floors_background() {
        let config = PreprocessConfig::default().with_size(4);
        let mut pixels = left_bright_image();
        pixels[[0, 15]] = 1.0;

        let out = center_crop_resize_filter(pixels.view(), Laterality::Left, &config).unwrap();

        // Near-zero background normalizes to about -100 and is floored exactly
        assert_eq!(out[[2, 3]], -100.0);
        assert!((out[[2, 0]] - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_pipeline_rejects_blank_image() {
        let config = PreprocessConfig::default();
        let pixels = Array2::<f32>::zeros((10, 10));
        assert!(center_crop_resize_filter(pixels.view(), Laterality::Left, &config).is_err());
    }
}
