//! Integer-based geohash encoding.
//!
//! Each coordinate is mapped to a 32-bit fixed-point fraction of its range, the two words are
//! interleaved into 64 bits (longitude on odd bits, so it owns the most significant bit) and the
//! top `5 * chars` bits are written out with the geohash base32 alphabet.

use thiserror::Error;

/// Standard geohash base32 alphabet
const ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest hash representable with a 64-bit integer
pub const MAX_PRECISION: usize = 12;

const EXP_2_32: f64 = 4_294_967_296.0;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GeohashError {
    #[error("geohash must contain between 1 and {MAX_PRECISION} characters, got {0}")]
    Length(usize),
    #[error(r#"character {0:?} is not part of the geohash alphabet"#)]
    InvalidCharacter(char),
}

/// Position of `x` within `-r..r` as a 32-bit fixed-point fraction
fn encode_range(x: f64, r: f64) -> u32 {
    let p = (x + r) / (2.0 * r);
    (p * EXP_2_32) as u32
}

fn decode_range(x: u32, r: f64) -> f64 {
    let p = f64::from(x) / EXP_2_32;
    2.0 * r * p - r
}

/// Spread the 32 bits of `x` over the even bit positions of a 64-bit word
fn spread(x: u32) -> u64 {
    let mut x = u64::from(x);
    x = (x | (x << 16)) & 0x0000_ffff_0000_ffff;
    x = (x | (x << 8)) & 0x00ff_00ff_00ff_00ff;
    x = (x | (x << 4)) & 0x0f0f_0f0f_0f0f_0f0f;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    x = (x | (x << 1)) & 0x5555_5555_5555_5555;
    x
}

/// Inverse of [spread]: gather the even bits of `x`
fn squash(x: u64) -> u32 {
    let mut x = x & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0f0f_0f0f_0f0f_0f0f;
    x = (x | (x >> 4)) & 0x00ff_00ff_00ff_00ff;
    x = (x | (x >> 8)) & 0x0000_ffff_0000_ffff;
    x = (x | (x >> 16)) & 0x0000_0000_ffff_ffff;
    x as u32
}

fn interleave(lat: u32, lng: u32) -> u64 {
    spread(lat) | (spread(lng) << 1)
}

fn deinterleave(hash: u64) -> (u32, u32) {
    (squash(hash), squash(hash >> 1))
}

fn encode_int(lat: f64, lng: f64) -> u64 {
    interleave(encode_range(lat, 90.0), encode_range(lng, 180.0))
}

/// Encode a point with the standard 12 characters of precision.
///
/// Coordinates are not validated, values outside of ±90° / ±180° produce meaningless hashes.
pub fn encode(lat: f64, lng: f64) -> String {
    encode_with_precision(lat, lng, MAX_PRECISION)
}

/// Encode a point with `chars` characters, `chars` is clamped to `1..=12`.
pub fn encode_with_precision(lat: f64, lng: f64, chars: usize) -> String {
    let chars = chars.clamp(1, MAX_PRECISION);
    let mut hash = encode_int(lat, lng) >> (64 - 5 * chars);
    let mut buf = [0u8; MAX_PRECISION];
    for byte in buf[..chars].iter_mut().rev() {
        *byte = ALPHABET[(hash & 0x1f) as usize];
        hash >>= 5;
    }
    buf[..chars].iter().map(|&b| char::from(b)).collect()
}

fn alphabet_index(c: char) -> Option<u64> {
    let byte = u8::try_from(c).ok()?;
    ALPHABET
        .iter()
        .position(|&a| a == byte)
        .map(|index| index as u64)
}

/// Decode a hash into the center of its cell as `(lat, lng)`
pub fn decode(hash: &str) -> Result<(f64, f64), GeohashError> {
    let chars = hash.chars().count();
    if !(1..=MAX_PRECISION).contains(&chars) {
        return Err(GeohashError::Length(chars));
    }
    let int_hash = hash.chars().try_fold(0u64, |acc, c| {
        let index = alphabet_index(c).ok_or(GeohashError::InvalidCharacter(c))?;
        Ok((acc << 5) | index)
    })?;

    let bits = 5 * chars as u32;
    let (lat_int, lng_int) = deinterleave(int_hash << (64 - bits));
    let lat_bits = bits / 2;
    let lng_bits = bits - lat_bits;
    let lat_err = 180.0 * 0.5f64.powi(lat_bits as i32);
    let lng_err = 360.0 * 0.5f64.powi(lng_bits as i32);

    let lat = decode_range(lat_int, 90.0) + lat_err / 2.0;
    let lng = decode_range(lng_int, 180.0) + lng_err / 2.0;
    Ok((lat, lng))
}
