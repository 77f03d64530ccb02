use crc::{Crc, Digest, CRC_64_REDIS};

/// CRC-64 with the Jones polynomial, reflected, zero init and xorout.
static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

/// Running checksum over every byte the cursor consumes, footer excluded.
#[derive(Clone)]
pub struct Crc64 {
    digest: Digest<'static, u64>,
}

impl Crc64 {
    pub fn new() -> Self {
        Self {
            digest: CRC64.digest(),
        }
    }

    pub fn update(
        &mut self,
        bytes: &[u8],
    ) {
        self.digest.update(bytes);
    }

    /// Current value; the accumulator keeps running.
    pub fn value(&self) -> u64 {
        self.digest.clone().finalize()
    }

    /// One-shot checksum of a whole buffer.
    pub fn checksum(bytes: &[u8]) -> u64 {
        CRC64.checksum(bytes)
    }
}

impl Default for Crc64 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Crc64 {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "Crc64({:#018x})", self.value())
    }
}
