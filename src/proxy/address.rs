//! Client address synthesis.
//!
//! When a caller does not name the client address to present upstream, the
//! proxy invents one inside a configured IPv4 pool (`70.0.0.0/4` by default).
//!
//! Addresses are handled as big-endian `u32` values:
//!
//! ```text
//! "70.1.2.3"  ──ip2lon──▶  0x4601_0203  ──lon2ip──▶  "70.1.2.3"
//! ```
//!
//! A synthesized address is `base | offset`, where the offset is drawn from
//! `[1, 2^(32-mask)]` and then confined to the host bits of the mask. Host
//! bits already set in the base stay set; the network bits always equal the
//! base's network bits.

use std::fmt;

use rand::Rng;

use crate::error::{ProxyError, ProxyResult};

/// Default base address for synthesized client addresses.
pub const DEFAULT_BASE_ADDRESS: &str = "70.0.0.0";

/// Default mask length for synthesized client addresses.
pub const DEFAULT_MASK_BITS: u8 = 4;

/// Parse a dotted quad into its big-endian integer form.
///
/// Each part is accumulated as `result * 256 + part` with 32-bit wrapping.
/// Parts are base-10 integers and are not range-checked, so `"1.2.3.256"`
/// carries into the third octet exactly like the accumulation implies.
///
/// # Errors
///
/// Returns `ProxyError::InvalidAddress` if the input does not have four
/// dot-separated decimal parts.
pub fn ip2lon(address: &str) -> ProxyResult<u32> {
    let parts: Vec<&str> = address.split('.').collect();
    if parts.len() != 4 {
        return Err(ProxyError::InvalidAddress(format!(
            "'{address}' is not a dotted quad"
        )));
    }

    parts.iter().try_fold(0u32, |acc, part| {
        let octet: u32 = part.trim().parse().map_err(|_| {
            ProxyError::InvalidAddress(format!("'{part}' in '{address}' is not a decimal octet"))
        })?;
        Ok(acc.wrapping_mul(256).wrapping_add(octet))
    })
}

/// Render a big-endian integer address as a dotted quad.
pub fn lon2ip(value: u32) -> String {
    let [a, b, c, d] = value.to_be_bytes();
    format!("{a}.{b}.{c}.{d}")
}

/// Network mask with the top `mask_bits` bits set.
fn network_mask(mask_bits: u8) -> u32 {
    match mask_bits {
        0 => 0,
        bits if bits >= 32 => u32::MAX,
        bits => u32::MAX << (32 - u32::from(bits)),
    }
}

/// Address pool used when the caller supplies no client address.
///
/// Built once from configuration; the base is parsed up front so that
/// synthesis itself cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPool {
    base: u32,
    mask_bits: u8,
}

impl AddressPool {
    /// Create a pool from a dotted-quad base and a mask length.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::InvalidAddress` if the base is not a dotted quad
    /// or the mask is longer than 32 bits.
    pub fn new(base_address: &str, mask_bits: u8) -> ProxyResult<Self> {
        if mask_bits > 32 {
            return Err(ProxyError::InvalidAddress(format!(
                "mask /{mask_bits} is longer than 32 bits"
            )));
        }
        Ok(Self {
            base: ip2lon(base_address)?,
            mask_bits,
        })
    }

    /// Base address in integer form.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Mask length in bits.
    pub fn mask_bits(&self) -> u8 {
        self.mask_bits
    }

    /// Draw a random address from the pool using the thread-local RNG.
    pub fn synthesize(&self) -> String {
        self.synthesize_with(&mut rand::rng())
    }

    /// Draw a random address from the pool using the given RNG.
    pub fn synthesize_with<R: Rng>(&self, rng: &mut R) -> String {
        lon2ip(self.synthesize_lon(rng))
    }

    fn synthesize_lon<R: Rng>(&self, rng: &mut R) -> u32 {
        let host_bits = 32 - u32::from(self.mask_bits);
        let span = 1u64 << host_bits;
        let offset = rng.random_range(1..=span);
        // The top draw (2^host_bits) would land on the lowest network bit.
        let host_offset = (offset as u32) & !network_mask(self.mask_bits);
        self.base | host_offset
    }
}

impl Default for AddressPool {
    fn default() -> Self {
        Self {
            base: 0x4600_0000,
            mask_bits: DEFAULT_MASK_BITS,
        }
    }
}

impl fmt::Display for AddressPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", lon2ip(self.base), self.mask_bits)
    }
}

/// Convenience wrapper: synthesize one address from a base and mask.
///
/// # Errors
///
/// Returns `ProxyError::InvalidAddress` for a malformed base or mask.
pub fn random(base_address: &str, mask_bits: u8) -> ProxyResult<String> {
    Ok(AddressPool::new(base_address, mask_bits)?.synthesize())
}
