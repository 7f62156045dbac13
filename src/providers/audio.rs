/*!
 * WAV payload helpers shared by the synthesizers and the assembler.
 */

use bytes::Bytes;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;

/// Format and length of a WAV payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    pub spec: WavSpec,
    /// Samples per channel
    pub frames: u32,
    pub duration_seconds: f64,
}

/// Read the header of a WAV payload and compute its duration
pub fn inspect_wav(bytes: &[u8]) -> Result<WavInfo, hound::Error> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let frames = reader.duration();
    if spec.sample_rate == 0 {
        return Err(hound::Error::FormatError("sample rate of zero"));
    }
    Ok(WavInfo {
        spec,
        frames,
        duration_seconds: f64::from(frames) / f64::from(spec.sample_rate),
    })
}

/// Fix the size fields of a WAV produced by a streaming encoder.
///
/// Streaming endpoints often write `0xFFFFFFFF` (or 0) as the RIFF and data
/// chunk sizes because the length is unknown when the header goes out. The
/// sizes are rewritten from the actual payload length.
pub fn repair_streamed_header(bytes: &mut [u8]) {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return;
    }

    let riff_size = u32::try_from(bytes.len() - 8).unwrap_or(u32::MAX);
    bytes[4..8].copy_from_slice(&riff_size.to_le_bytes());

    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = [bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]];
        let size = u32::from_le_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]]) as usize;
        let body = pos + 8;

        if &id == b"data" {
            let available = bytes.len() - body;
            if size > available || size == 0 {
                let fixed = u32::try_from(available).unwrap_or(u32::MAX);
                bytes[pos + 4..pos + 8].copy_from_slice(&fixed.to_le_bytes());
            }
            return;
        }

        // chunks are padded to even sizes
        pos = body.saturating_add(size).saturating_add(size & 1);
    }
}

/// 16-bit mono silence of the given length
pub fn silent_wav(duration_seconds: f64, sample_rate: u32) -> Result<Bytes, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let frames = (duration_seconds.max(0.0) * f64::from(sample_rate)).round() as u64;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for _ in 0..frames {
            writer.write_sample(0i16)?;
        }
        writer.finalize()?;
    }
    Ok(Bytes::from(cursor.into_inner()))
}
