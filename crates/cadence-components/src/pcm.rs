//! Sample-level helpers shared by the processing drivers.

use cadence_core::SampleFormat;

const S24_MAX: i64 = (1 << 23) - 1;
const S24_MIN: i64 = -(1 << 23);

/// Scales every sample in `data` by `gain_pct` percent, saturating at the
/// format's range. Any `gain_pct` is accepted; the product never wraps.
pub fn scale(format: SampleFormat, data: &mut [u8], gain_pct: i64) {
    match format {
        SampleFormat::S16Le => {
            for s in data.chunks_exact_mut(2) {
                let v = i64::from(i16::from_le_bytes([s[0], s[1]]));
                let out = (v.saturating_mul(gain_pct) / 100).clamp(i64::from(i16::MIN), i64::from(i16::MAX));
                s.copy_from_slice(&(out as i16).to_le_bytes());
            }
        }
        SampleFormat::S24In32Le | SampleFormat::S32Le => {
            let (min, max) = int_range(format);
            for s in data.chunks_exact_mut(4) {
                let v = i64::from(i32::from_le_bytes([s[0], s[1], s[2], s[3]]));
                let out = (v.saturating_mul(gain_pct) / 100).clamp(min, max);
                s.copy_from_slice(&(out as i32).to_le_bytes());
            }
        }
        SampleFormat::F32Le => {
            let gain = gain_pct as f32 / 100.0;
            for s in data.chunks_exact_mut(4) {
                let v = f32::from_le_bytes([s[0], s[1], s[2], s[3]]);
                s.copy_from_slice(&(v * gain).to_le_bytes());
            }
        }
    }
}

/// Adds `src` into `dst` sample by sample, saturating at the format's range.
pub fn mix_into(format: SampleFormat, dst: &mut [u8], src: &[u8]) {
    match format {
        SampleFormat::S16Le => {
            for (d, s) in dst.chunks_exact_mut(2).zip(src.chunks_exact(2)) {
                let a = i16::from_le_bytes([d[0], d[1]]);
                let b = i16::from_le_bytes([s[0], s[1]]);
                d.copy_from_slice(&a.saturating_add(b).to_le_bytes());
            }
        }
        SampleFormat::S24In32Le | SampleFormat::S32Le => {
            let (min, max) = int_range(format);
            for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                let a = i64::from(i32::from_le_bytes([d[0], d[1], d[2], d[3]]));
                let b = i64::from(i32::from_le_bytes([s[0], s[1], s[2], s[3]]));
                d.copy_from_slice(&((a + b).clamp(min, max) as i32).to_le_bytes());
            }
        }
        SampleFormat::F32Le => {
            for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                let a = f32::from_le_bytes([d[0], d[1], d[2], d[3]]);
                let b = f32::from_le_bytes([s[0], s[1], s[2], s[3]]);
                d.copy_from_slice(&(a + b).to_le_bytes());
            }
        }
    }
}

fn int_range(format: SampleFormat) -> (i64, i64) {
    match format {
        SampleFormat::S24In32Le => (S24_MIN, S24_MAX),
        _ => (i64::from(i32::MIN), i64::from(i32::MAX)),
    }
}

/// Grows `scratch` to at least `len` bytes without panicking on allocation
/// failure.
pub fn ensure_len(scratch: &mut Vec<u8>, len: usize) -> bool {
    if scratch.len() >= len {
        return true;
    }
    if scratch.try_reserve(len - scratch.len()).is_err() {
        return false;
    }
    scratch.resize(len, 0);
    true
}
