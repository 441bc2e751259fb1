//! Adler-32 checksum.
//!
//! Used by zlib framing and as the stream trailer of LZHAM-style streams.

/// Largest prime smaller than 65536.
const ADLER_MOD: u32 = 65521;

/// Number of bytes that can be summed before `b` may overflow a `u32`.
const NMAX: usize = 5552;

/// Adler-32 checksum calculator.
///
/// The running state starts at 1, so the checksum of the empty input is 1.
///
/// # Example
///
/// ```
/// use oxiarc_core::Adler32;
///
/// assert_eq!(Adler32::checksum(b"Hello, world!"), 0x205E_048A);
/// ```
#[derive(Clone, Debug)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    /// Create a new Adler-32 calculator.
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Resume from a previously returned checksum value.
    pub fn from_value(value: u32) -> Self {
        Self {
            a: value & 0xFFFF,
            b: value >> 16,
        }
    }

    /// Update the checksum with more data.
    pub fn update(&mut self, data: &[u8]) {
        let mut a = self.a;
        let mut b = self.b;

        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                a += byte as u32;
                b += a;
            }
            a %= ADLER_MOD;
            b %= ADLER_MOD;
        }

        self.a = a;
        self.b = b;
    }

    /// Current checksum value.
    pub fn finish(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Compute the Adler-32 checksum of data in one shot.
    pub fn checksum(data: &[u8]) -> u32 {
        let mut adler = Self::new();
        adler.update(data);
        adler.finish()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Update a running Adler-32 value with `data`.
///
/// `adler32_update(1, data)` equals [`Adler32::checksum`].
pub fn adler32_update(value: u32, data: &[u8]) -> u32 {
    let mut adler = Adler32::from_value(value);
    adler.update(data);
    adler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adler32_empty() {
        assert_eq!(Adler32::checksum(&[]), 1);
    }

    #[test]
    fn test_adler32_known_values() {
        assert_eq!(Adler32::checksum(b"Hello, world!"), 0x205E_048A);
        assert_eq!(Adler32::checksum(b"Goodbye"), 0x0ACA_02CA);
    }

    #[test]
    fn test_adler32_incremental() {
        let mut adler = Adler32::new();
        adler.update(b"Hello, ");
        adler.update(b"world!");
        assert_eq!(adler.finish(), 0x205E_048A);

        let resumed = adler32_update(adler32_update(1, b"Good"), b"bye");
        assert_eq!(resumed, 0x0ACA_02CA);
    }

    #[test]
    fn test_adler32_large() {
        // Spans several NMAX chunks of maximal bytes.
        let data = vec![0xFFu8; NMAX * 3 + 17];
        let mut a: u64 = 1;
        let mut b: u64 = 0;
        for &byte in &data {
            a = (a + byte as u64) % ADLER_MOD as u64;
            b = (b + a) % ADLER_MOD as u64;
        }
        assert_eq!(Adler32::checksum(&data), ((b << 16) | a) as u32);
    }
}
