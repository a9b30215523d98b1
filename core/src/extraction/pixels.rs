use crate::error::{MammoprepError, Result};
use dicom_object::DefaultDicomObject;
use dicom_pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use log::debug;
use ndarray::Array2;

use super::tags::{get_string_value, get_u16_value, BITS_STORED, PHOTOMETRIC_INTERPRETATION};

/// Decodes the first frame of a grayscale image as a `rows x columns` array
///
/// Values are the raw stored pixel values: no rescale slope/intercept and
/// no windowing is applied.
///
/// # Errors
///
/// Returns an error if the pixel data cannot be decoded or the image has
/// more than one sample per pixel.
pub fn read_pixel_array(dcm: &DefaultDicomObject) -> Result<Array2<f32>> {
    let decoded = dcm.decode_pixel_data()?;

    let rows = decoded.rows() as usize;
    let columns = decoded.columns() as usize;
    let samples = decoded.samples_per_pixel() as usize;
    if samples != 1 {
        return Err(MammoprepError::PixelDataError(format!(
            "expected a single-sample grayscale image, found {} samples per pixel",
            samples
        )));
    }

    debug!(
        "Decoding {}x{} image ({} frames, {} bits stored, {})",
        rows,
        columns,
        decoded.number_of_frames(),
        get_u16_value(dcm, BITS_STORED).unwrap_or(0),
        get_string_value(dcm, PHOTOMETRIC_INTERPRETATION).unwrap_or_default()
    );

    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let mut values: Vec<f32> = decoded.to_vec_with_options(&options)?;

    let frame_len = rows * columns;
    if values.len() < frame_len {
        return Err(MammoprepError::PixelDataError(format!(
            "pixel data holds {} values, expected at least {}",
            values.len(),
            frame_len
        )));
    }
    values.truncate(frame_len);

    Ok(Array2::from_shape_vec((rows, columns), values)?)
}
