//! Minimal audio metadata probing for usage attribution.

/// Read the duration of a PCM WAV file from its RIFF header, rounded to the
/// nearest second. Returns `None` for anything that is not a well-formed WAV;
/// attribution then falls back to zero seconds rather than failing the
/// transcription.
pub fn wav_duration_seconds(data: &[u8]) -> Option<u32> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return None;
    }

    let mut byte_rate: Option<u32> = None;
    let mut data_len: Option<u32> = None;

    // Walk the chunk list. Chunks are word-aligned.
    let mut pos = 12usize;
    while pos + 8 <= data.len() {
        let id = &data[pos..pos + 4];
        let size = u32::from_le_bytes([
            data[pos + 4],
            data[pos + 5],
            data[pos + 6],
            data[pos + 7],
        ]) as usize;
        let body = pos + 8;

        match id {
            b"fmt " if body + 12 <= data.len() => {
                byte_rate = Some(u32::from_le_bytes([
                    data[body + 8],
                    data[body + 9],
                    data[body + 10],
                    data[body + 11],
                ]));
            }
            b"data" => {
                data_len = Some(size as u32);
            }
            _ => {}
        }

        pos = body.checked_add(size)?;
        if size % 2 == 1 {
            pos = pos.checked_add(1)?;
        }
    }

    let byte_rate = byte_rate?;
    let data_len = data_len?;
    if byte_rate == 0 {
        return None;
    }
    let seconds = (data_len as f64 / byte_rate as f64).round() as u32;
    Some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_with(byte_rate: u32, data_len: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(b"WAVE");
        // fmt chunk, 16 bytes of PCM header
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // channels
        out.extend_from_slice(&16_000u32.to_le_bytes()); // sample rate
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes()); // block align
        out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
        // data chunk header only; the probe never reads the samples
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out
    }

    #[test]
    fn test_duration_from_header() {
        let wav = wav_with(32_000, 96_000);
        assert_eq!(wav_duration_seconds(&wav), Some(3));
    }

    #[test]
    fn test_duration_rounds() {
        let wav = wav_with(32_000, 48_500);
        assert_eq!(wav_duration_seconds(&wav), Some(2));
    }

    #[test]
    fn test_rejects_non_wav() {
        assert_eq!(wav_duration_seconds(b"not audio at all"), None);
        assert_eq!(wav_duration_seconds(b""), None);
    }

    #[test]
    fn test_rejects_zero_byte_rate() {
        let wav = wav_with(0, 96_000);
        assert_eq!(wav_duration_seconds(&wav), None);
    }
}
