//! Long and short return codes, and the sealed short-code values stored in the codes mapping table.

use rand::Rng;
use rand_core::{CryptoRng, RngCore};

use crate::error::{Error, Result};
use crate::group::GqElement;
use crate::hash::{recursive_hash, recursive_hash_base64, Hashable, HASH_LENGTH};
use crate::symmetric;

pub const SHORT_CHOICE_RETURN_CODE_LENGTH: usize = 4;
pub const SHORT_VOTE_CAST_RETURN_CODE_LENGTH: usize = 8;
pub const BALLOT_CASTING_KEY_LENGTH: usize = 9;

/// Every short code is padded to this many bytes before sealing.
const SEALED_CODE_LENGTH: usize = 8;

/// Base64 length of a sealed short code: nonce, padded code and tag.
pub const SEALED_SHORT_CODE_LENGTH: usize = 48;

const SHORT_CODE_KEY_INFO: &[u8] = b"ReturnCodesMappingTable";

pub type LongReturnCode = [u8; HASH_LENGTH];

/// `lCC = RecursiveHash(pC, vc_id, ee, correctness_information)`.
pub fn long_choice_return_code(
    pre_choice_return_code: &GqElement,
    verification_card_id: &str,
    election_event_id: &str,
    correctness_information: &str,
) -> LongReturnCode {
    recursive_hash(&[
        pre_choice_return_code.into(),
        verification_card_id.into(),
        election_event_id.into(),
        correctness_information.into(),
    ])
}

/// `lVCC = RecursiveHash(pVCC, vc_id, ee)`.
pub fn long_vote_cast_return_code(
    pre_vote_cast_return_code: &GqElement,
    verification_card_id: &str,
    election_event_id: &str,
) -> LongReturnCode {
    recursive_hash(&[
        pre_vote_cast_return_code.into(),
        verification_card_id.into(),
        election_event_id.into(),
    ])
}

/// The codes mapping table key and allow-list entry of a long return code.
pub fn hash_long_return_code(long_return_code: &LongReturnCode) -> String {
    recursive_hash_base64(&[Hashable::Bytes(long_return_code.to_vec())])
}

/// A uniformly random string of `length` decimal digits.
pub fn random_decimal_code<R: RngCore>(length: usize, rng: &mut R) -> String {
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// `count` distinct random codes of `length` digits.
pub fn random_distinct_codes<R: RngCore>(count: usize, length: usize, rng: &mut R) -> Vec<String> {
    let mut codes: Vec<String> = Vec::with_capacity(count);
    while codes.len() < count {
        let code = random_decimal_code(length, rng);
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

/// Encrypts a short code under a key only the holder of the long code can derive.
pub fn seal_short_code<R: RngCore + CryptoRng>(
    long_return_code: &LongReturnCode,
    short_code: &str,
    rng: &mut R,
) -> Result<String> {
    if short_code.len() > SEALED_CODE_LENGTH {
        return Err(Error::SymmetricEncryption);
    }
    let key = symmetric::derive_key(long_return_code, SHORT_CODE_KEY_INFO)?;
    let padded = format!("{:<width$}", short_code, width = SEALED_CODE_LENGTH);
    let sealed = symmetric::encrypt(&key, padded.as_bytes(), &[], rng)?;
    Ok(base64::encode(sealed))
}

pub fn open_short_code(long_return_code: &LongReturnCode, sealed: &str) -> Result<String> {
    let key = symmetric::derive_key(long_return_code, SHORT_CODE_KEY_INFO)?;
    let sealed = base64::decode(sealed).map_err(|_| Error::SymmetricEncryption)?;
    let padded = symmetric::decrypt(&key, &sealed, &[])?;
    let code = String::from_utf8(padded).map_err(|_| Error::SymmetricEncryption)?;
    Ok(code.trim_end().to_owned())
}
