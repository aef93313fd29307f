//! QR decoding over RGBA frames (rqrr)

use super::{Candidate, DecodeOptions, Decoder};
use crate::capture::luma;

/// QR code decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_plane(luma: &[u8], width: usize, height: usize, invert: bool) -> Option<Candidate> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            let v = luma[y * width + x];
            if invert {
                255 - v
            } else {
                v
            }
        });

        prepared
            .detect_grids()
            .into_iter()
            .find_map(|grid| match grid.decode() {
                Ok((_, data)) => Some(data),
                Err(e) => {
                    tracing::trace!(error = ?e, "QR grid found but not decodable");
                    None
                }
            })
            .map(|data| Candidate { data })
    }
}

impl Decoder for QrDecoder {
    fn decode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        options: &DecodeOptions,
    ) -> Option<Candidate> {
        let (w, h) = (width as usize, height as usize);
        if w == 0 || h == 0 || pixels.len() != w * h * 4 {
            tracing::warn!(width, height, len = pixels.len(), "Frame size mismatch, skipping decode");
            return None;
        }

        let plane: Vec<u8> = pixels
            .chunks_exact(4)
            .map(|px| luma(px[0], px[1], px[2]))
            .collect();

        options
            .inversion_attempts
            .passes()
            .iter()
            .find_map(|&invert| Self::decode_plane(&plane, w, h, invert))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureBackend, FrameBuffer, StillImageBackend, VideoStream};
    use crate::decoder::InversionAttempts;
    use crate::testing::SARA_ID;
    use qrcode::{Color, QrCode};

    const MODULE_PX: usize = 4;
    const QUIET_MODULES: usize = 4;

    /// Render `data` as a QR code; `inverted` draws light modules on dark
    fn render(data: &str, inverted: bool) -> FrameBuffer {
        let code = QrCode::new(data.as_bytes()).unwrap();
        let modules = code.width();
        let colors = code.to_colors();
        let side = (modules + 2 * QUIET_MODULES) * MODULE_PX;

        let mut rgba = Vec::with_capacity(side * side * 4);
        for y in 0..side {
            for x in 0..side {
                let (mx, my) = (x / MODULE_PX, y / MODULE_PX);
                let dark = mx >= QUIET_MODULES
                    && my >= QUIET_MODULES
                    && mx < modules + QUIET_MODULES
                    && my < modules + QUIET_MODULES
                    && colors[(my - QUIET_MODULES) * modules + (mx - QUIET_MODULES)] == Color::Dark;
                let v = if dark != inverted { 0 } else { 255 };
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        FrameBuffer::from_rgba(side as u32, side as u32, rgba).unwrap()
    }

    fn decode(frame: &FrameBuffer, attempts: InversionAttempts) -> Option<String> {
        let options = DecodeOptions {
            inversion_attempts: attempts,
        };
        QrDecoder::new()
            .decode(frame.pixels(), frame.width(), frame.height(), &options)
            .map(|c| c.data)
    }

    #[test]
    fn test_decodes_dark_on_light_code() {
        let frame = render(SARA_ID, false);
        assert_eq!(decode(&frame, InversionAttempts::DontInvert).as_deref(), Some(SARA_ID));
        assert_eq!(decode(&frame, InversionAttempts::AttemptBoth).as_deref(), Some(SARA_ID));
    }

    #[test]
    fn test_light_on_dark_code_needs_inversion() {
        let frame = render(SARA_ID, true);
        assert_eq!(decode(&frame, InversionAttempts::OnlyInvert).as_deref(), Some(SARA_ID));
        assert_eq!(decode(&frame, InversionAttempts::AttemptBoth).as_deref(), Some(SARA_ID));
        assert_eq!(decode(&frame, InversionAttempts::InvertFirst).as_deref(), Some(SARA_ID));
    }

    #[tokio::test]
    async fn test_decodes_png_through_still_source() {
        let frame = render(SARA_ID, false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticket.png");
        image::RgbaImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
            .unwrap()
            .save(&path)
            .unwrap();

        let backend = StillImageBackend::from_paths(&[&path], 100).unwrap();
        let mut stream = backend.acquire(&Default::default()).await.unwrap();
        assert!(stream.presented().await);

        let mut buf = FrameBuffer::new();
        stream.read_frame(&mut buf);
        assert_eq!(decode(&buf, InversionAttempts::DontInvert).as_deref(), Some(SARA_ID));
    }

    #[test]
    fn test_blank_frame_has_no_candidate() {
        let frame = FrameBuffer::filled(64, 64, [255, 255, 255, 255]);
        let options = DecodeOptions {
            inversion_attempts: InversionAttempts::AttemptBoth,
        };
        assert!(QrDecoder::new()
            .decode(frame.pixels(), frame.width(), frame.height(), &options)
            .is_none());
    }

    #[test]
    fn test_mismatched_buffer_is_skipped() {
        let pixels = vec![0u8; 10];
        assert!(QrDecoder::new()
            .decode(&pixels, 64, 64, &DecodeOptions::default())
            .is_none());
    }
}
