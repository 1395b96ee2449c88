//! Pixel dimensions read from image headers (PNG, GIF, JPEG, WebP).

use std::fs;
use std::path::Path;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

pub fn image_size_of_file(path: &Path) -> Option<(u32, u32)> {
    let data = fs::read(path).ok()?;
    image_size(&data)
}

pub fn image_size(data: &[u8]) -> Option<(u32, u32)> {
    if data.starts_with(PNG_SIGNATURE) {
        return png_size(data);
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some((le16(data, 6)?, le16(data, 8)?));
    }
    if data.starts_with(&[0xFF, 0xD8]) {
        return jpeg_size(data);
    }
    if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP".as_slice()) {
        return webp_size(data);
    }
    None
}

fn be16(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 2)?;
    Some(u32::from(u16::from_be_bytes([bytes[0], bytes[1]])))
}

fn le16(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 2)?;
    Some(u32::from(u16::from_le_bytes([bytes[0], bytes[1]])))
}

fn le24(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 3)?;
    Some(u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16))
}

fn png_size(data: &[u8]) -> Option<(u32, u32)> {
    let width = data.get(16..20)?;
    let height = data.get(20..24)?;
    Some((
        u32::from_be_bytes(width.try_into().ok()?),
        u32::from_be_bytes(height.try_into().ok()?),
    ))
}

/// Walks the marker segments up to the first baseline or progressive frame.
fn jpeg_size(data: &[u8]) -> Option<(u32, u32)> {
    let mut idx = 2;
    while idx + 1 < data.len() {
        if data[idx] != 0xFF {
            idx += 1;
            continue;
        }
        let marker = data[idx + 1];
        if marker == 0xC0 || marker == 0xC2 {
            let height = be16(data, idx + 5)?;
            let width = be16(data, idx + 7)?;
            return Some((width, height));
        }
        let length = be16(data, idx + 2)? as usize;
        idx += 2 + length;
    }
    None
}

fn webp_size(data: &[u8]) -> Option<(u32, u32)> {
    match data.get(12..16)? {
        b"VP8X" => Some((1 + le24(data, 24)?, 1 + le24(data, 27)?)),
        b"VP8 " => Some((le16(data, 26)? & 0x3FFF, le16(data, 28)? & 0x3FFF)),
        b"VP8L" => {
            let bits = u32::from_le_bytes(data.get(21..25)?.try_into().ok()?);
            Some(((bits & 0x3FFF) + 1, ((bits >> 14) & 0x3FFF) + 1))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&[0, 0, 0, 13]);
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data
    }

    #[test]
    fn reads_png_header() {
        assert_eq!(image_size(&png(640, 480)), Some((640, 480)));
    }

    #[test]
    fn reads_jpeg_frame_after_app_segment() {
        let mut data = vec![0xFF, 0xD8];
        // APP0 with a 16 byte payload length
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        data.extend_from_slice(&[0u8; 14]);
        // SOF0: length, precision, height, width
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08, 0x01, 0x2C, 0x01, 0x90]);
        assert_eq!(image_size(&data), Some((400, 300)));
    }

    #[test]
    fn reads_gif_logical_screen() {
        let mut data = b"GIF89a".to_vec();
        data.extend_from_slice(&[0x40, 0x01, 0xC8, 0x00]); // 320 x 200
        data.extend_from_slice(&[0xF7, 0x00, 0x00]);
        assert_eq!(image_size(&data), Some((320, 200)));
        data[..6].copy_from_slice(b"GIF87a");
        assert_eq!(image_size(&data), Some((320, 200)));
    }

    #[test]
    fn reads_webp_extended_header() {
        let mut data = b"RIFF\0\0\0\0WEBPVP8X".to_vec();
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&[0x1F, 0x03, 0x00]); // 800 - 1
        data.extend_from_slice(&[0x57, 0x02, 0x00]); // 600 - 1
        assert_eq!(image_size(&data), Some((800, 600)));
    }

    #[test]
    fn unknown_or_truncated_data_has_no_size() {
        assert_eq!(image_size(b"GIF89a"), None);
        assert_eq!(image_size(b"BM\0\0\0\0\0\0\0\0"), None);
        assert_eq!(image_size(&PNG_SIGNATURE[..]), None);
        assert_eq!(image_size(&[0xFF, 0xD8, 0xFF]), None);
    }
}
