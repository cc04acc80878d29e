//! Verification card keystores: each voter's secret key, encrypted under a key stretched from
//! the start voting key.

use log::{debug, info};
use num_bigint::BigInt;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::Argon2Profile;
use crate::derivation::{argon2id, salt};
use crate::elgamal::ElGamalPublicKey;
use crate::error::{ensure_non_empty, ensure_range, ensure_size, Error, Result, StructuralError};
use crate::group::{ensure_group, ensure_order, GqGroup, ZqElement, ZqGroup};
use crate::math::byte_length;
use crate::setup::PrimesMappingTable;
use crate::symmetric;
use crate::validation::{
    validate_base64, validate_distinct, validate_start_voting_key, validate_uuid, validate_uuids,
    MAX_NUMBER_OF_SELECTIONS,
};

/// Base64 length of the smallest possible keystore, a key of one byte.
///
/// Keystores are the JSON payload sealed with AES-GCM, nonce and tag included, so their length
/// grows with the group. [`keystore_length`] gives it exactly; from 1024-bit groups up it is at
/// least 571 characters.
pub const KEYSTORE_MIN_LENGTH: usize = 308;

/// Payload bytes besides the secret key: the three ids and the JSON field names.
const KEYSTORE_PAYLOAD_OVERHEAD: usize = 200;

const KEYSTORE_SALT_LABEL: &str = "VerificationCardKeystore";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeystorePayload {
    verification_card_id: String,
    verification_card_set_id: String,
    election_event_id: String,
    verification_card_secret_key: String,
}

#[derive(Clone, Debug)]
pub struct CredentialDataContext {
    group: GqGroup,
    election_event_id: String,
    verification_card_set_id: String,
    verification_card_ids: Vec<String>,
    primes_mapping_table: PrimesMappingTable,
    election_public_key: ElGamalPublicKey,
    choice_return_codes_encryption_public_key: ElGamalPublicKey,
}

impl CredentialDataContext {
    pub fn new(
        group: GqGroup,
        election_event_id: String,
        verification_card_set_id: String,
        verification_card_ids: Vec<String>,
        primes_mapping_table: PrimesMappingTable,
        election_public_key: ElGamalPublicKey,
        choice_return_codes_encryption_public_key: ElGamalPublicKey,
    ) -> Result<Self> {
        validate_uuid(&election_event_id)?;
        validate_uuid(&verification_card_set_id)?;
        ensure_non_empty("verification card ids", &verification_card_ids)?;
        validate_uuids(&verification_card_ids)?;
        validate_distinct("verification card ids", &verification_card_ids)?;
        ensure_group("primes mapping table", &group, primes_mapping_table.group())?;
        ensure_group("election public key", &group, election_public_key.group())?;
        ensure_group(
            "choice return codes encryption public key",
            &group,
            choice_return_codes_encryption_public_key.group(),
        )?;
        ensure_range(
            "choice return codes encryption public key size",
            1,
            MAX_NUMBER_OF_SELECTIONS,
            choice_return_codes_encryption_public_key.size(),
        )?;

        Ok(CredentialDataContext {
            group,
            election_event_id,
            verification_card_set_id,
            verification_card_ids,
            primes_mapping_table,
            election_public_key,
            choice_return_codes_encryption_public_key,
        })
    }

    pub fn group(&self) -> &GqGroup {
        &self.group
    }

    pub fn primes_mapping_table(&self) -> &PrimesMappingTable {
        &self.primes_mapping_table
    }

    pub fn election_public_key(&self) -> &ElGamalPublicKey {
        &self.election_public_key
    }

    pub fn choice_return_codes_encryption_public_key(&self) -> &ElGamalPublicKey {
        &self.choice_return_codes_encryption_public_key
    }
}

#[derive(Clone, Debug)]
pub struct CredentialDataInput {
    verification_card_secret_keys: Vec<ZqElement>,
    start_voting_keys: Vec<String>,
}

impl CredentialDataInput {
    pub fn new(verification_card_secret_keys: Vec<ZqElement>, start_voting_keys: Vec<String>) -> Result<Self> {
        ensure_non_empty("verification card secret keys", &verification_card_secret_keys)?;
        ensure_size(
            "start voting keys",
            verification_card_secret_keys.len(),
            start_voting_keys.len(),
        )?;
        let group = verification_card_secret_keys[0].group();
        for key in verification_card_secret_keys.iter() {
            if key.group() != group {
                return Err(StructuralError::GroupOrderMismatch {
                    what: "verification card secret keys",
                }
                .into());
            }
        }
        for svk in start_voting_keys.iter() {
            validate_start_voting_key(svk)?;
        }
        Ok(CredentialDataInput {
            verification_card_secret_keys,
            start_voting_keys,
        })
    }
}

/// One keystore per voter, in voter order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialDataOutput {
    verification_card_keystores: Vec<String>,
}

impl CredentialDataOutput {
    pub fn new(verification_card_keystores: Vec<String>) -> Result<Self> {
        ensure_non_empty("verification card keystores", &verification_card_keystores)?;
        for keystore in verification_card_keystores.iter() {
            validate_base64(keystore)?;
            if keystore.len() < KEYSTORE_MIN_LENGTH {
                return Err(StructuralError::InvalidFormat {
                    what: "verification card keystore",
                    value: keystore.clone(),
                }
                .into());
            }
        }
        Ok(CredentialDataOutput {
            verification_card_keystores,
        })
    }

    pub fn verification_card_keystores(&self) -> &[String] {
        &self.verification_card_keystores
    }
}

/// Exact Base64 length of the keystores of verification card secret keys in `group`.
pub fn keystore_length(group: &ZqGroup) -> usize {
    let sealed = KEYSTORE_PAYLOAD_OVERHEAD
        + 2 * byte_length(group.q())
        + symmetric::NONCE_LENGTH
        + symmetric::TAG_LENGTH;
    4 * ((sealed + 2) / 3)
}

fn keystore_salt(ee: &str, vcs: &str, vc: &str) -> [u8; 16] {
    salt(&[ee.into(), vcs.into(), vc.into(), KEYSTORE_SALT_LABEL.into()])
}

fn keystore_aad(ee: &str, vcs: &str, vc: &str) -> Vec<u8> {
    [ee, vcs, vc].concat().into_bytes()
}

fn keystore(
    election_event_id: &str,
    verification_card_set_id: &str,
    verification_card_id: &str,
    secret_key: &ZqElement,
    start_voting_key: &str,
    profile: Argon2Profile,
    rng: &mut ChaCha20Rng,
) -> Result<String> {
    let key = argon2id(
        start_voting_key.as_bytes(),
        &keystore_salt(election_event_id, verification_card_set_id, verification_card_id),
        profile,
    )?;

    let width = 2 * byte_length(secret_key.group().q());
    let payload = KeystorePayload {
        verification_card_id: verification_card_id.to_owned(),
        verification_card_set_id: verification_card_set_id.to_owned(),
        election_event_id: election_event_id.to_owned(),
        verification_card_secret_key: format!(
            "{:0>width$}",
            secret_key.value().to_str_radix(16).to_uppercase(),
            width = width
        ),
    };
    let plaintext = serde_json::to_vec(&payload)
        .map_err(|e| StructuralError::Configuration(e.to_string()))?;

    let sealed = symmetric::encrypt(
        &key,
        &plaintext,
        &keystore_aad(election_event_id, verification_card_set_id, verification_card_id),
        rng,
    )?;
    Ok(base64::encode(sealed))
}

/// Seals every voter's verification card secret key into a keystore only the start voting key opens.
pub fn gen_cred_dat<R: RngCore + CryptoRng>(
    context: &CredentialDataContext,
    input: &CredentialDataInput,
    profile: Argon2Profile,
    rng: &mut R,
) -> Result<CredentialDataOutput> {
    ensure_size(
        "verification card secret keys",
        context.verification_card_ids.len(),
        input.verification_card_secret_keys.len(),
    )?;
    ensure_order(
        "verification card secret keys",
        &context.group,
        input.verification_card_secret_keys[0].group(),
    )?;
    info!(
        "generating {} keystores for verification card set {}",
        context.verification_card_ids.len(),
        context.verification_card_set_id
    );

    let seeds: Vec<[u8; 32]> = (0..context.verification_card_ids.len())
        .map(|_| {
            let mut seed = [0u8; 32];
            rng.fill_bytes(&mut seed);
            seed
        })
        .collect();
    let keystores = seeds
        .into_par_iter()
        .enumerate()
        .map(|(i, seed)| {
            keystore(
                &context.election_event_id,
                &context.verification_card_set_id,
                &context.verification_card_ids[i],
                &input.verification_card_secret_keys[i],
                &input.start_voting_keys[i],
                profile,
                &mut ChaCha20Rng::from_seed(seed),
            )
        })
        .collect::<Result<Vec<_>>>()?;
    debug!("sealed {} keystores", keystores.len());

    CredentialDataOutput::new(keystores)
}

/// Opens a keystore with the voter's start voting key and returns the verification card secret key.
///
/// A wrong start voting key, a tampered keystore, or a keystore of another card all yield
/// [`Error::Keystore`].
pub fn open_keystore(
    keystore: &str,
    start_voting_key: &str,
    election_event_id: &str,
    verification_card_set_id: &str,
    verification_card_id: &str,
    group: &ZqGroup,
    profile: Argon2Profile,
) -> Result<ZqElement> {
    validate_start_voting_key(start_voting_key)?;
    let sealed = base64::decode(keystore).map_err(|_| Error::Keystore)?;
    let key = argon2id(
        start_voting_key.as_bytes(),
        &keystore_salt(election_event_id, verification_card_set_id, verification_card_id),
        profile,
    )?;
    let plaintext = symmetric::decrypt(
        &key,
        &sealed,
        &keystore_aad(election_event_id, verification_card_set_id, verification_card_id),
    )
    .map_err(|_| Error::Keystore)?;

    let payload: KeystorePayload = serde_json::from_slice(&plaintext).map_err(|_| Error::Keystore)?;
    if payload.verification_card_id != verification_card_id
        || payload.verification_card_set_id != verification_card_set_id
        || payload.election_event_id != election_event_id
    {
        return Err(Error::Keystore);
    }
    let value = BigInt::parse_bytes(payload.verification_card_secret_key.as_bytes(), 16)
        .ok_or(Error::Keystore)?;
    ZqElement::new(value, group).map_err(|_| Error::Keystore)
}
