//! Fixed-width binary fingerprints.
//!
//! Every input family is reduced to exactly `bits` bits regardless of its
//! size: hashed families (text, tabular) iterate SHA-256 to fill the
//! width and are one-way; raw bytes are padded or truncated; tensors are
//! clamped and quantized, which is the one reversible path (`decode`).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq)]
pub enum EncodeInput<'a> {
    Text(&'a str),
    Raw(&'a [u8]),
    Tensor(&'a [f64]),
    Tabular(&'a [Vec<String>]),
}

/// A bit string of exact, explicit width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binary {
    pub bits: usize,
    bytes: Vec<u8>,
}

impl Binary {
    pub fn from_bytes(bytes: Vec<u8>, bits: usize) -> Self {
        let mut binary = Self { bits, bytes };
        binary.resize_to_width();
        binary
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bit(&self, idx: usize) -> bool {
        if idx >= self.bits {
            return false;
        }
        (self.bytes[idx / 8] >> (7 - idx % 8)) & 1 == 1
    }

    pub fn count_ones(&self) -> usize {
        (0..self.bits).filter(|&i| self.bit(i)).count()
    }

    fn resize_to_width(&mut self) {
        let byte_len = self.bits.div_ceil(8);
        self.bytes.resize(byte_len, 0);
        // Zero the slack bits in the final byte so width is unambiguous.
        let slack = byte_len * 8 - self.bits;
        if slack > 0 {
            if let Some(last) = self.bytes.last_mut() {
                *last &= 0xFFu8 << slack;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodingStats {
    /// Fraction of set bits.
    pub density: f64,
    /// Shannon entropy of the bit distribution, in bits per bit.
    pub entropy: f64,
    pub bits: usize,
}

/// Encodes `input` into exactly `bits` bits.
pub fn encode(input: EncodeInput<'_>, bits: usize) -> anyhow::Result<Binary> {
    anyhow::ensure!(bits > 0, "encoding width must be positive");
    match input {
        EncodeInput::Text(text) => Ok(hash_fill(text.as_bytes(), bits)),
        EncodeInput::Raw(bytes) => Ok(Binary::from_bytes(bytes.to_vec(), bits)),
        EncodeInput::Tensor(values) => encode_tensor(values, bits),
        EncodeInput::Tabular(rows) => {
            let mut buf = Vec::new();
            for row in rows {
                for field in row {
                    buf.extend_from_slice(field.as_bytes());
                    buf.push(0x1F); // unit separator keeps fields unambiguous
                }
                buf.push(0x1E); // record separator
            }
            Ok(hash_fill(&buf, bits))
        }
    }
}

/// Reverses tensor quantization: each `chunk_size`-bit chunk becomes one
/// float in [0, 1]. Hashed encodings are not recoverable by design.
pub fn decode(binary: &Binary, chunk_size: usize) -> anyhow::Result<Vec<f64>> {
    anyhow::ensure!(
        chunk_size > 0 && chunk_size <= 32,
        "chunk size must be in 1..=32, got {chunk_size}"
    );
    let max = ((1u64 << chunk_size) - 1) as f64;
    let count = binary.bits / chunk_size;
    let mut out = Vec::with_capacity(count);
    for chunk in 0..count {
        let mut acc: u64 = 0;
        for bit in 0..chunk_size {
            acc = (acc << 1) | binary.bit(chunk * chunk_size + bit) as u64;
        }
        out.push(acc as f64 / max);
    }
    Ok(out)
}

/// Cheap pre-filter before full lattice analysis: bit density plus the
/// binary Shannon entropy implied by that density.
pub fn encoding_stats(binary: &Binary) -> EncodingStats {
    let ones = binary.count_ones();
    let density = if binary.bits == 0 {
        0.0
    } else {
        ones as f64 / binary.bits as f64
    };
    EncodingStats {
        density,
        entropy: binary_entropy(density),
        bits: binary.bits,
    }
}

fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

/// Iterates SHA-256 over its own output until `bits` bits are available.
fn hash_fill(seed: &[u8], bits: usize) -> Binary {
    let byte_len = bits.div_ceil(8);
    let mut out = Vec::with_capacity(byte_len);
    let mut block: [u8; 32] = Sha256::digest(seed).into();
    while out.len() < byte_len {
        out.extend_from_slice(&block);
        block = Sha256::digest(block).into();
    }
    out.truncate(byte_len);
    Binary::from_bytes(out, bits)
}

fn encode_tensor(values: &[f64], bits: usize) -> anyhow::Result<Binary> {
    anyhow::ensure!(!values.is_empty(), "tensor input must be non-empty");
    let chunk_size = (bits / values.len()).clamp(1, 32);
    let max = ((1u64 << chunk_size) - 1) as f64;
    let mut bit_buf = Vec::with_capacity(bits);
    for &v in values {
        let q = (v.clamp(0.0, 1.0) * max).round() as u64;
        for bit in (0..chunk_size).rev() {
            bit_buf.push((q >> bit) & 1 == 1);
        }
        if bit_buf.len() >= bits {
            break;
        }
    }
    let mut bytes = vec![0u8; bits.div_ceil(8)];
    for (idx, &set) in bit_buf.iter().take(bits).enumerate() {
        if set {
            bytes[idx / 8] |= 1 << (7 - idx % 8);
        }
    }
    Ok(Binary::from_bytes(bytes, bits))
}
