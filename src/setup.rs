//! Election setup: the encryption group and primes mapping tables derived from the seed,
//! the setup key pair, the combined choice return codes encryption key, and the per-voter
//! verification data the control components exponentiate.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, info, warn};
use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::One;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::codes::{random_decimal_code, BALLOT_CASTING_KEY_LENGTH};
use crate::config::SetupConfig;
use crate::elgamal::{Cipher, ElGamal, ElGamalKeyPair, ElGamalPublicKey};
use crate::error::{
    ensure_non_empty, ensure_range, ensure_size, ProofKind, Result, StructuralError,
    VerificationFailure,
};
use crate::group::{ensure_group, GqElement, GqGroup, ZqElement};
use crate::hash::{expand_hash, hash_and_square, recursive_hash, Hashable};
use crate::math::{is_probable_prime, next_safe_prime};
use crate::proof::SchnorrProof;
use crate::validation::{
    validate_distinct, validate_uuid, validate_uuids, MAX_NUMBER_OF_SELECTIONS,
    MAX_NUMBER_OF_VOTING_OPTIONS, NUMBER_OF_CONTROL_COMPONENTS,
};

pub const SEED_LENGTH: usize = 16;
pub const GEN_KEYS_CCR: &str = "GenKeysCCR";

/// Smallest bit length a seed-derived group may have.
pub const MIN_GROUP_BIT_LENGTH: usize = 16;

/// Checks the `XX_YYYYMMDD_XXNN` seed format: canton, event date, event type and number.
pub fn validate_seed(seed: &str) -> Result<&str> {
    let bytes = seed.as_bytes();
    let well_formed = bytes.len() == SEED_LENGTH
        && bytes[..2].iter().all(u8::is_ascii_uppercase)
        && bytes[2] == b'_'
        && bytes[3..11].iter().all(u8::is_ascii_digit)
        && bytes[11] == b'_'
        && bytes[12..14].iter().all(u8::is_ascii_uppercase)
        && bytes[14..].iter().all(u8::is_ascii_digit);
    if !well_formed {
        return Err(StructuralError::InvalidFormat {
            what: "seed",
            value: seed.to_owned(),
        }
        .into());
    }
    Ok(seed)
}

/// Derives the encryption group of an election from its seed.
///
/// The seed is hashed and stretched to a `bit_length - 1` bit odd starting point, from which
/// the first `q` with `q` and `2q + 1` both prime is taken. The generator is the smallest
/// integer from 2 up that is a quadratic residue.
pub fn group_from_seed(seed: &str, bit_length: usize) -> Result<GqGroup> {
    validate_seed(seed)?;
    if bit_length < MIN_GROUP_BIT_LENGTH {
        return Err(StructuralError::Configuration(format!(
            "group bit length must be at least {}, found {}",
            MIN_GROUP_BIT_LENGTH, bit_length
        ))
        .into());
    }

    let q_bits = bit_length - 1;
    let expanded = expand_hash(&recursive_hash(&[seed.into()]), (q_bits + 7) / 8);
    let mut q = BigInt::from_bytes_be(Sign::Plus, &expanded) >> (expanded.len() * 8 - q_bits);
    q = q | (BigInt::one() << (q_bits - 1));
    if q.is_even() {
        q += 1;
    }

    debug!("searching safe prime of {} bits", bit_length);
    let (q, p) = next_safe_prime(&q).ok_or_else(|| {
        StructuralError::Configuration(format!("no safe prime of {} bits above the seed", bit_length))
    })?;

    let mut g = BigInt::from(2);
    while !g.modpow(&q, &p).is_one() {
        g += 1;
    }
    GqGroup::new(p, q, g)
}

/// The `count` smallest primes from 5 up that are group members other than the generator.
pub fn small_prime_group_members(group: &GqGroup, count: usize) -> Result<Vec<GqElement>> {
    let mut primes = Vec::with_capacity(count);
    let mut candidate = BigInt::from(5);
    while primes.len() < count {
        if &candidate >= group.p() {
            return Err(StructuralError::Configuration(format!(
                "group too small to encode {} voting options",
                count
            ))
            .into());
        }
        if &candidate != group.g() && is_probable_prime(&candidate) && group.is_member(&candidate) {
            primes.push(GqElement::new(candidate.clone(), group)?);
        }
        candidate += 2;
    }
    Ok(primes)
}

/// A voting option before it is assigned its prime encoding.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialPrimesMappingEntry {
    pub actual_voting_option: String,
    pub semantic_information: String,
    pub correctness_information: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrimesMappingTableEntry {
    pub actual_voting_option: String,
    pub encoded_voting_option: GqElement,
    pub semantic_information: String,
    pub correctness_information: String,
}

/// The voting options of a verification card set with their prime encodings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrimesMappingTable {
    entries: Vec<PrimesMappingTableEntry>,
}

impl PrimesMappingTable {
    pub fn new(entries: Vec<PrimesMappingTableEntry>) -> Result<Self> {
        ensure_non_empty("primes mapping table", &entries)?;
        ensure_range(
            "primes mapping table size",
            1,
            MAX_NUMBER_OF_VOTING_OPTIONS,
            entries.len(),
        )?;
        let group = entries[0].encoded_voting_option.group();
        for entry in entries.iter() {
            ensure_group("encoded voting option", group, entry.encoded_voting_option.group())?;
        }

        let options: Vec<&str> = entries.iter().map(|e| e.actual_voting_option.as_str()).collect();
        validate_distinct("actual voting options", &options)?;
        let mut encodings = HashSet::with_capacity(entries.len());
        for entry in entries.iter() {
            if !encodings.insert(entry.encoded_voting_option.value()) {
                return Err(StructuralError::Duplicate {
                    what: "encoded voting options",
                    value: entry.encoded_voting_option.to_string(),
                }
                .into());
            }
        }

        Ok(PrimesMappingTable { entries })
    }

    pub fn entries(&self) -> &[PrimesMappingTableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn group(&self) -> &GqGroup {
        self.entries[0].encoded_voting_option.group()
    }

    pub fn encodings(&self) -> Vec<GqElement> {
        self.entries
            .iter()
            .map(|e| e.encoded_voting_option.clone())
            .collect()
    }

    pub fn correctness_information(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.correctness_information.clone())
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct SetupDataContext {
    seed: String,
    group_bit_length: usize,
}

impl SetupDataContext {
    pub fn new(seed: String, group_bit_length: usize) -> Result<Self> {
        validate_seed(&seed)?;
        if group_bit_length < MIN_GROUP_BIT_LENGTH {
            return Err(StructuralError::Configuration(format!(
                "group bit length must be at least {}, found {}",
                MIN_GROUP_BIT_LENGTH, group_bit_length
            ))
            .into());
        }
        Ok(SetupDataContext {
            seed,
            group_bit_length,
        })
    }

    pub fn from_config(seed: String, config: &SetupConfig) -> Result<Self> {
        Self::new(seed, config.group_bit_length)
    }
}

/// The partial primes mapping tables of every verification card set, keyed by set id.
#[derive(Clone, Debug)]
pub struct SetupDataInput {
    partial_primes_mapping_tables: BTreeMap<String, Vec<PartialPrimesMappingEntry>>,
}

impl SetupDataInput {
    pub fn new(
        partial_primes_mapping_tables: BTreeMap<String, Vec<PartialPrimesMappingEntry>>,
    ) -> Result<Self> {
        if partial_primes_mapping_tables.is_empty() {
            return Err(StructuralError::Empty {
                what: "partial primes mapping tables",
            }
            .into());
        }
        for (verification_card_set_id, entries) in partial_primes_mapping_tables.iter() {
            validate_uuid(verification_card_set_id)?;
            ensure_range(
                "partial primes mapping table size",
                1,
                MAX_NUMBER_OF_VOTING_OPTIONS,
                entries.len(),
            )?;
            let options: Vec<&str> = entries.iter().map(|e| e.actual_voting_option.as_str()).collect();
            validate_distinct("actual voting options", &options)?;
        }
        Ok(SetupDataInput {
            partial_primes_mapping_tables,
        })
    }
}

#[derive(Clone, Debug)]
pub struct SetupDataOutput {
    pub group: GqGroup,
    pub primes_mapping_tables: BTreeMap<String, PrimesMappingTable>,
    pub setup_key_pair: ElGamalKeyPair,
}

impl SetupDataOutput {
    /// Size of the setup key, the largest number of voting options of any set.
    pub fn maximum_number_of_voting_options(&self) -> usize {
        self.setup_key_pair.public_key.size()
    }
}

/// Derives the group and encodes every set's voting options, then draws the setup key pair.
///
/// Each distinct actual voting option gets one encoding across all sets, assigned in order of
/// first appearance when the sets are walked by id.
pub fn gen_setup_data<R: RngCore + CryptoRng>(
    context: &SetupDataContext,
    input: &SetupDataInput,
    rng: &mut R,
) -> Result<SetupDataOutput> {
    info!(
        "generating setup data for {} verification card sets",
        input.partial_primes_mapping_tables.len()
    );
    let group = group_from_seed(&context.seed, context.group_bit_length)?;

    let mut options: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();
    for entries in input.partial_primes_mapping_tables.values() {
        for entry in entries.iter() {
            if seen.insert(entry.actual_voting_option.as_str()) {
                options.push(&entry.actual_voting_option);
            }
        }
    }
    let primes = small_prime_group_members(&group, options.len())?;
    let encoding: HashMap<&str, &GqElement> = options.into_iter().zip(primes.iter()).collect();

    let mut primes_mapping_tables = BTreeMap::new();
    for (verification_card_set_id, entries) in input.partial_primes_mapping_tables.iter() {
        let mut table = Vec::with_capacity(entries.len());
        for entry in entries.iter() {
            let encoded_voting_option = encoding
                .get(entry.actual_voting_option.as_str())
                .map(|&e| e.clone())
                .ok_or(StructuralError::InvalidValue {
                    what: "actual voting option without encoding",
                })?;
            table.push(PrimesMappingTableEntry {
                actual_voting_option: entry.actual_voting_option.clone(),
                encoded_voting_option,
                semantic_information: entry.semantic_information.clone(),
                correctness_information: entry.correctness_information.clone(),
            });
        }
        primes_mapping_tables.insert(verification_card_set_id.clone(), PrimesMappingTable::new(table)?);
    }

    let maximum_number_of_voting_options = primes_mapping_tables
        .values()
        .map(PrimesMappingTable::len)
        .max()
        .unwrap_or(1);
    debug!(
        "encoded {} voting options, setup key of size {}",
        primes.len(),
        maximum_number_of_voting_options
    );
    let setup_key_pair = ElGamalKeyPair::generate(&group, maximum_number_of_voting_options, rng)?;

    Ok(SetupDataOutput {
        group,
        primes_mapping_tables,
        setup_key_pair,
    })
}

fn ccr_key_aux(election_event_id: &str, node_id: usize) -> Vec<Hashable> {
    vec![election_event_id.into(), GEN_KEYS_CCR.into(), node_id.into()]
}

/// A control component's choice return codes encryption key pair, with a Schnorr proof of
/// knowledge per key element.
pub fn gen_keys_ccr<R: RngCore + CryptoRng>(
    group: &GqGroup,
    election_event_id: &str,
    node_id: usize,
    size: usize,
    rng: &mut R,
) -> Result<(ElGamalKeyPair, Vec<SchnorrProof>)> {
    validate_uuid(election_event_id)?;
    ensure_range("node id", 1, NUMBER_OF_CONTROL_COMPONENTS, node_id)?;
    ensure_range("ccr key size", 1, MAX_NUMBER_OF_SELECTIONS, size)?;

    let key_pair = ElGamalKeyPair::generate(group, size, rng)?;
    let aux = ccr_key_aux(election_event_id, node_id);
    let proofs = key_pair
        .private_key
        .elements()
        .iter()
        .zip(key_pair.public_key.elements().iter())
        .map(|(sk, pk)| SchnorrProof::generate(sk, pk, &aux, rng))
        .collect::<Result<Vec<_>>>()?;
    Ok((key_pair, proofs))
}

#[derive(Clone, Debug)]
pub struct VerificationCardSetKeysContext {
    group: GqGroup,
    election_event_id: String,
}

impl VerificationCardSetKeysContext {
    pub fn new(group: GqGroup, election_event_id: String) -> Result<Self> {
        validate_uuid(&election_event_id)?;
        Ok(VerificationCardSetKeysContext {
            group,
            election_event_id,
        })
    }
}

/// The control components' public keys and proofs, ordered by node id.
#[derive(Clone, Debug)]
pub struct VerificationCardSetKeysInput {
    ccr_public_keys: Vec<ElGamalPublicKey>,
    proofs: Vec<Vec<SchnorrProof>>,
}

impl VerificationCardSetKeysInput {
    pub fn new(ccr_public_keys: Vec<ElGamalPublicKey>, proofs: Vec<Vec<SchnorrProof>>) -> Result<Self> {
        ensure_size("ccr public keys", NUMBER_OF_CONTROL_COMPONENTS, ccr_public_keys.len())?;
        ensure_size("ccr key proofs", NUMBER_OF_CONTROL_COMPONENTS, proofs.len())?;
        let size = ccr_public_keys[0].size();
        ensure_range("ccr public key size", 1, MAX_NUMBER_OF_SELECTIONS, size)?;
        let group = ccr_public_keys[0].group();
        for (key, key_proofs) in ccr_public_keys.iter().zip(proofs.iter()) {
            ensure_size("ccr public key size", size, key.size())?;
            ensure_size("ccr key proofs", size, key_proofs.len())?;
            ensure_group("ccr public keys", group, key.group())?;
        }
        Ok(VerificationCardSetKeysInput {
            ccr_public_keys,
            proofs,
        })
    }
}

/// Verifies every control component's Schnorr proofs and combines their keys into the choice
/// return codes encryption public key.
pub fn gen_verification_card_set_keys(
    context: &VerificationCardSetKeysContext,
    input: &VerificationCardSetKeysInput,
) -> Result<ElGamalPublicKey> {
    ensure_group("ccr public keys", &context.group, input.ccr_public_keys[0].group())?;
    info!(
        "combining {} ccr public keys for election event {}",
        input.ccr_public_keys.len(),
        context.election_event_id
    );

    for (j, (key, proofs)) in input.ccr_public_keys.iter().zip(input.proofs.iter()).enumerate() {
        let node_id = j + 1;
        let aux = ccr_key_aux(&context.election_event_id, node_id);
        if !SchnorrProof::verify_all(proofs, key.elements(), &context.group, &aux)? {
            warn!(
                "ccr key proofs of control component {} do not verify in election event {}",
                node_id, context.election_event_id
            );
            return Err(VerificationFailure {
                proof: ProofKind::ChoiceReturnCodesPublicKeySchnorr,
                election_event_id: context.election_event_id.clone(),
                verification_card_set_id: None,
                voter: None,
                node_id,
            }
            .into());
        }
    }

    ElGamalPublicKey::combine_multiple_vec(&input.ccr_public_keys)
}

#[derive(Clone, Debug)]
pub struct VerificationDataContext {
    group: GqGroup,
    election_event_id: String,
    verification_card_set_id: String,
    number_of_eligible_voters: usize,
    primes_mapping_table: PrimesMappingTable,
    maximum_number_of_voting_options: usize,
}

impl VerificationDataContext {
    pub fn new(
        group: GqGroup,
        election_event_id: String,
        verification_card_set_id: String,
        number_of_eligible_voters: usize,
        primes_mapping_table: PrimesMappingTable,
        maximum_number_of_voting_options: usize,
    ) -> Result<Self> {
        validate_uuid(&election_event_id)?;
        validate_uuid(&verification_card_set_id)?;
        if number_of_eligible_voters == 0 {
            return Err(StructuralError::Empty {
                what: "eligible voters",
            }
            .into());
        }
        ensure_group("primes mapping table", &group, primes_mapping_table.group())?;
        ensure_range(
            "maximum number of voting options",
            1,
            MAX_NUMBER_OF_VOTING_OPTIONS,
            maximum_number_of_voting_options,
        )?;
        ensure_range(
            "number of voting options",
            1,
            maximum_number_of_voting_options,
            primes_mapping_table.len(),
        )?;
        Ok(VerificationDataContext {
            group,
            election_event_id,
            verification_card_set_id,
            number_of_eligible_voters,
            primes_mapping_table,
            maximum_number_of_voting_options,
        })
    }
}

#[derive(Clone, Debug)]
pub struct VerificationDataInput {
    setup_public_key: ElGamalPublicKey,
}

impl VerificationDataInput {
    pub fn new(setup_public_key: ElGamalPublicKey) -> Self {
        VerificationDataInput { setup_public_key }
    }
}

/// Per voter, in voter order.
#[derive(Clone, Debug)]
pub struct VerificationDataOutput {
    pub verification_card_ids: Vec<String>,
    pub verification_card_key_pairs: Vec<ElGamalKeyPair>,
    pub ballot_casting_keys: Vec<String>,
    pub encrypted_hashed_partial_choice_return_codes: Vec<Cipher>,
    pub encrypted_hashed_confirmation_keys: Vec<Cipher>,
}

impl VerificationDataOutput {
    pub fn verification_card_secret_keys(&self) -> Vec<ZqElement> {
        self.verification_card_key_pairs
            .iter()
            .map(|key_pair| key_pair.private_key.get(0).clone())
            .collect()
    }
}

struct VoterVerificationData {
    verification_card_id: String,
    key_pair: ElGamalKeyPair,
    ballot_casting_key: String,
    encrypted_hashed_partial_choice_return_codes: Cipher,
    encrypted_hashed_confirmation_key: Cipher,
}

fn voter_verification_data(
    context: &VerificationDataContext,
    setup_public_key: &ElGamalPublicKey,
    rng: &mut ChaCha20Rng,
) -> Result<VoterVerificationData> {
    let group = &context.group;
    let zq = group.exponent_group();

    let mut id = [0u8; 16];
    rng.fill_bytes(&mut id);
    let key_pair = ElGamalKeyPair::generate(group, 1, rng)?;
    let secret_key = key_pair.private_key.get(0);
    let ballot_casting_key = random_decimal_code(BALLOT_CASTING_KEY_LENGTH, rng);

    let hashed_partial_choice_return_codes = context
        .primes_mapping_table
        .entries()
        .iter()
        .map(|entry| {
            hash_and_square(
                Hashable::from(&entry.encoded_voting_option.exponentiate(secret_key)),
                group,
            )
        })
        .collect::<Result<Vec<_>>>()?;
    let encrypted_hashed_partial_choice_return_codes = ElGamal::encrypt(
        &hashed_partial_choice_return_codes,
        &ZqElement::random(&zq, rng),
        setup_public_key,
    )?;

    let hashed_ballot_casting_key = hash_and_square(Hashable::from(ballot_casting_key.as_str()), group)?;
    let hashed_confirmation_key = hash_and_square(
        Hashable::from(&hashed_ballot_casting_key.exponentiate(secret_key)),
        group,
    )?;
    let encrypted_hashed_confirmation_key = ElGamal::encrypt(
        &[hashed_confirmation_key],
        &ZqElement::random(&zq, rng),
        setup_public_key,
    )?;

    Ok(VoterVerificationData {
        verification_card_id: hex::encode_upper(id),
        key_pair,
        ballot_casting_key,
        encrypted_hashed_partial_choice_return_codes,
        encrypted_hashed_confirmation_key,
    })
}

/// Creates the verification cards of a set: ids, key pairs, ballot casting keys, and the
/// encrypted hashed partial choice return codes and confirmation keys sent to the control
/// components.
pub fn gen_verification_data<R: RngCore + CryptoRng>(
    context: &VerificationDataContext,
    input: &VerificationDataInput,
    rng: &mut R,
) -> Result<VerificationDataOutput> {
    ensure_group("setup public key", &context.group, input.setup_public_key.group())?;
    ensure_size(
        "setup public key",
        context.maximum_number_of_voting_options,
        input.setup_public_key.size(),
    )?;
    info!(
        "generating verification data for {} voters of verification card set {}",
        context.number_of_eligible_voters, context.verification_card_set_id
    );

    let seeds: Vec<[u8; 32]> = (0..context.number_of_eligible_voters)
        .map(|_| {
            let mut seed = [0u8; 32];
            rng.fill_bytes(&mut seed);
            seed
        })
        .collect();
    let voters = seeds
        .into_par_iter()
        .map(|seed| {
            voter_verification_data(context, &input.setup_public_key, &mut ChaCha20Rng::from_seed(seed))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut output = VerificationDataOutput {
        verification_card_ids: Vec::with_capacity(voters.len()),
        verification_card_key_pairs: Vec::with_capacity(voters.len()),
        ballot_casting_keys: Vec::with_capacity(voters.len()),
        encrypted_hashed_partial_choice_return_codes: Vec::with_capacity(voters.len()),
        encrypted_hashed_confirmation_keys: Vec::with_capacity(voters.len()),
    };
    for voter in voters {
        output.verification_card_ids.push(voter.verification_card_id);
        output.verification_card_key_pairs.push(voter.key_pair);
        output.ballot_casting_keys.push(voter.ballot_casting_key);
        output
            .encrypted_hashed_partial_choice_return_codes
            .push(voter.encrypted_hashed_partial_choice_return_codes);
        output
            .encrypted_hashed_confirmation_keys
            .push(voter.encrypted_hashed_confirmation_key);
    }
    validate_uuids(&output.verification_card_ids)?;
    validate_distinct("verification card ids", &output.verification_card_ids)?;

    Ok(output)
}
