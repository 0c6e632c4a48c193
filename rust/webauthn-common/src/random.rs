use rand::RngCore;

/// A source of cryptographically secure random bytes.
///
/// Challenges and user handles are drawn from a `RandomSource`. The default
/// [`OsRandom`] reads from the operating system; tests substitute a seeded
/// source to get reproducible options.
pub trait RandomSource {
    /// Fill `buffer` with random bytes.
    fn fill(&self, buffer: &mut [u8]);

    /// Produce `length` random bytes.
    fn bytes(&self, length: usize) -> Vec<u8> {
        let mut buffer = vec![0u8; length];
        self.fill(&mut buffer);
        buffer
    }
}

/// Random bytes from the operating system's CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buffer: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(buffer);
    }
}

impl<T: RandomSource + ?Sized> RandomSource for &T {
    fn fill(&self, buffer: &mut [u8]) {
        (**self).fill(buffer);
    }
}
