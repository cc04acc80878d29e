use blake2::Blake2b;
use digest::Digest;
use num_bigint::{BigInt, BigUint, Sign};
use sha3::Sha3_256;

use crate::error::Result;
use crate::group::{GqElement, GqGroup, ZqElement, ZqGroup};
use crate::math::byte_length;

/// Length in bytes of a [`recursive_hash`] digest.
pub const HASH_LENGTH: usize = 32;

/// Length of a Base64-encoded [`recursive_hash`] digest (`l_HB64`).
pub const HASH_BASE64_LENGTH: usize = 44;

/// Extra bytes drawn when reducing a hash into `Zq`.
const REDUCTION_MARGIN: usize = 16;

/// A value that can be fed to [`recursive_hash`]. Each kind is domain separated
/// by a one byte prefix, lists hash the concatenation of their children's digests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Hashable {
    Bytes(Vec<u8>),
    Integer(BigUint),
    Text(String),
    List(Vec<Hashable>),
}

impl Hashable {
    fn digest(&self) -> [u8; HASH_LENGTH] {
        let mut hasher = Sha3_256::new();
        match self {
            Hashable::Bytes(bytes) => {
                hasher.update([0x00]);
                hasher.update(bytes);
            }
            Hashable::Integer(value) => {
                hasher.update([0x01]);
                hasher.update(value.to_bytes_be());
            }
            Hashable::Text(text) => {
                hasher.update([0x02]);
                hasher.update(text.as_bytes());
            }
            Hashable::List(values) => {
                hasher.update([0x03]);
                for value in values.iter() {
                    hasher.update(value.digest());
                }
            }
        }
        let mut out = [0u8; HASH_LENGTH];
        out.copy_from_slice(&hasher.finalize());
        out
    }
}

impl From<&str> for Hashable {
    fn from(value: &str) -> Self {
        Hashable::Text(value.to_owned())
    }
}

impl From<String> for Hashable {
    fn from(value: String) -> Self {
        Hashable::Text(value)
    }
}

impl From<&String> for Hashable {
    fn from(value: &String) -> Self {
        Hashable::Text(value.clone())
    }
}

impl From<&[u8]> for Hashable {
    fn from(value: &[u8]) -> Self {
        Hashable::Bytes(value.to_vec())
    }
}

impl From<usize> for Hashable {
    fn from(value: usize) -> Self {
        Hashable::Integer(BigUint::from(value))
    }
}

impl From<BigUint> for Hashable {
    fn from(value: BigUint) -> Self {
        Hashable::Integer(value)
    }
}

impl From<&GqElement> for Hashable {
    fn from(value: &GqElement) -> Self {
        Hashable::Integer(value.value().magnitude().clone())
    }
}

impl From<&ZqElement> for Hashable {
    fn from(value: &ZqElement) -> Self {
        Hashable::Integer(value.value().magnitude().clone())
    }
}

impl From<Vec<Hashable>> for Hashable {
    fn from(values: Vec<Hashable>) -> Self {
        Hashable::List(values)
    }
}

/// SHA3-256 based recursive hash. A single value is hashed as itself, several as a list.
pub fn recursive_hash(values: &[Hashable]) -> [u8; HASH_LENGTH] {
    match values {
        [single] => single.digest(),
        _ => Hashable::List(values.to_vec()).digest(),
    }
}

/// Base64 of [`recursive_hash`], always [`HASH_BASE64_LENGTH`] characters.
pub fn recursive_hash_base64(values: &[Hashable]) -> String {
    base64::encode(recursive_hash(values))
}

/// Stretches `seed` to `length` bytes with counter-prefixed Blake2b blocks.
pub fn expand_hash(seed: &[u8], length: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(length + 64);
    let mut counter: u32 = 0;
    while out.len() < length {
        let mut hasher = Blake2b::new();
        hasher.update(counter.to_be_bytes());
        hasher.update(seed);
        out.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    out.truncate(length);
    out
}

/// Hashes the values into `Zq`, drawing enough extra bytes that the reduction bias is negligible.
pub fn recursive_hash_to_zq(group: &ZqGroup, values: &[Hashable]) -> ZqElement {
    let digest = recursive_hash(values);
    let expanded = expand_hash(&digest, byte_length(group.q()) + REDUCTION_MARGIN);
    ZqElement::reduce(&BigInt::from_bytes_be(Sign::Plus, &expanded), group)
}

/// Maps a value into `Gq` as `(h + 1)^2 mod p`, `h` being its hash in `Zq`.
pub fn hash_and_square(value: Hashable, group: &GqGroup) -> Result<GqElement> {
    let hashed = recursive_hash_to_zq(&group.exponent_group(), &[value]);
    let root: BigInt = hashed.value() + 1;
    GqElement::from_square_root(&root, group)
}
