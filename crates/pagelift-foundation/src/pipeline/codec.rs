//! Raster decode, PNG encode and base64 framing.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, ImageResult};

/// Decode any supported raster format (format is sniffed from the bytes).
pub fn decode_image(bytes: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory(bytes)
}

/// Encode as PNG. Float images are converted to 8-bit RGBA first, since PNG
/// has no float sample type.
pub fn encode_png(image: &DynamicImage) -> ImageResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    match image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut out, ImageFormat::Png)?
        }
        _ => image.write_to(&mut out, ImageFormat::Png)?,
    }
    Ok(out.into_inner())
}

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage};

    #[test]
    fn png_encoding_is_decodable() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(7, 5, image::Rgb([1, 2, 3])));
        let png = encode_png(&img).unwrap();

        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let back = decode_image(&png).unwrap();
        assert_eq!(back.dimensions(), (7, 5));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(decode_image(b"definitely not an image").is_err());
        assert!(decode_image(&[]).is_err());
    }

    #[test]
    fn base64_uses_standard_alphabet_with_padding() {
        assert_eq!(to_base64(b"\xfb\xff"), "+/8=");
    }
}
