use image::{imageops::FilterType, GenericImageView};
use ndarray::{Array, Ix4};
use std::io::Cursor;
use thiserror::Error;

pub const INPUT_WIDTH: u32 = 224;
pub const INPUT_HEIGHT: u32 = 224;

// Triangle is the `image` crate's bilinear filter, the same interpolation
// (OpenCV INTER_LINEAR) the model was trained with. Changing it silently
// changes predictions without any error.
const RESIZE_FILTER: FilterType = FilterType::Triangle;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to read image container: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Decodes an uploaded image into the model input tensor: RGB, resized to
/// 224x224, values scaled to [0, 1], shape (1, 224, 224, 3).
pub fn preprocess(image_data: &[u8]) -> Result<Array<f32, Ix4>, DecodeError> {
    let image_reader = image::ImageReader::new(Cursor::new(image_data)).with_guessed_format()?;

    let img = image_reader.decode()?;
    let img = img.resize_exact(INPUT_WIDTH, INPUT_HEIGHT, RESIZE_FILTER);

    let mut input = Array::zeros((1, INPUT_HEIGHT as usize, INPUT_WIDTH as usize, 3));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, y, x, 0]] = (r as f32) / 255.;
        input[[0, y, x, 1]] = (g as f32) / 255.;
        input[[0, y, x, 2]] = (b as f32) / 255.;
    }

    Ok(input)
}
