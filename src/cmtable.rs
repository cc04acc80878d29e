use std::collections::BTreeMap;

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore};
use rayon::prelude::*;

use crate::codes::{
    hash_long_return_code, long_choice_return_code, long_vote_cast_return_code, open_short_code,
    random_decimal_code, random_distinct_codes, seal_short_code, LongReturnCode,
    SHORT_CHOICE_RETURN_CODE_LENGTH, SHORT_VOTE_CAST_RETURN_CODE_LENGTH,
};
use crate::elgamal::{Cipher, ElGamal, ElGamalPrivateKey};
use crate::error::{ensure_non_empty, ensure_range, ensure_size, Result, StructuralError};
use crate::group::{ensure_group, ensure_order, GqElement, GqGroup};
use crate::validation::{
    validate_distinct, validate_uuid, validate_uuids, MAX_NUMBER_OF_VOTING_OPTIONS,
};

/// Hashed long return code to sealed short code, in key order.
pub type CodesMappingTable = BTreeMap<String, String>;

#[derive(Clone, Debug)]
pub struct CmTableContext {
    group: GqGroup,
    election_event_id: String,
    verification_card_ids: Vec<String>,
    /// One entry per voting option, bound into its long choice return code.
    correctness_information: Vec<String>,
    maximum_number_of_voting_options: usize,
}

impl CmTableContext {
    pub fn new(
        group: GqGroup,
        election_event_id: String,
        verification_card_ids: Vec<String>,
        correctness_information: Vec<String>,
        maximum_number_of_voting_options: usize,
    ) -> Result<Self> {
        validate_uuid(&election_event_id)?;
        ensure_non_empty("verification card ids", &verification_card_ids)?;
        validate_uuids(&verification_card_ids)?;
        validate_distinct("verification card ids", &verification_card_ids)?;
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
            correctness_information.len(),
        )?;

        Ok(CmTableContext {
            group,
            election_event_id,
            verification_card_ids,
            correctness_information,
            maximum_number_of_voting_options,
        })
    }

    pub fn group(&self) -> &GqGroup {
        &self.group
    }

    pub fn number_of_voting_options(&self) -> usize {
        self.correctness_information.len()
    }
}

#[derive(Clone, Debug)]
pub struct CmTableInput {
    setup_secret_key: ElGamalPrivateKey,
    encrypted_pre_choice_return_codes: Vec<Cipher>,
    pre_vote_cast_return_codes: Vec<GqElement>,
}

impl CmTableInput {
    pub fn new(
        setup_secret_key: ElGamalPrivateKey,
        encrypted_pre_choice_return_codes: Vec<Cipher>,
        pre_vote_cast_return_codes: Vec<GqElement>,
    ) -> Result<Self> {
        ensure_non_empty("encrypted pre choice return codes", &encrypted_pre_choice_return_codes)?;
        ensure_size(
            "pre vote cast return codes",
            encrypted_pre_choice_return_codes.len(),
            pre_vote_cast_return_codes.len(),
        )?;
        let group = encrypted_pre_choice_return_codes[0].group().clone();
        let element_size = encrypted_pre_choice_return_codes[0].element_size();
        for c in encrypted_pre_choice_return_codes.iter() {
            ensure_group("encrypted pre choice return codes", &group, c.group())?;
            ensure_size("encrypted pre choice return codes element size", element_size, c.element_size())?;
        }
        for element in pre_vote_cast_return_codes.iter() {
            ensure_group("pre vote cast return codes", &group, element.group())?;
        }
        ensure_order("setup secret key", &group, setup_secret_key.group())?;

        Ok(CmTableInput {
            setup_secret_key,
            encrypted_pre_choice_return_codes,
            pre_vote_cast_return_codes,
        })
    }

    fn group(&self) -> &GqGroup {
        self.encrypted_pre_choice_return_codes[0].group()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CmTableOutput {
    cm_table: CodesMappingTable,
    short_choice_return_codes: Vec<Vec<String>>,
    short_vote_cast_return_codes: Vec<String>,
}

impl CmTableOutput {
    pub fn new(
        cm_table: CodesMappingTable,
        short_choice_return_codes: Vec<Vec<String>>,
        short_vote_cast_return_codes: Vec<String>,
    ) -> Result<Self> {
        ensure_non_empty("short choice return codes", &short_choice_return_codes)?;
        ensure_size(
            "short vote cast return codes",
            short_choice_return_codes.len(),
            short_vote_cast_return_codes.len(),
        )?;
        let options = short_choice_return_codes[0].len();
        for codes in short_choice_return_codes.iter() {
            ensure_non_empty("short choice return codes of a voter", codes)?;
            ensure_size("short choice return codes of a voter", options, codes.len())?;
        }
        ensure_size(
            "codes mapping table",
            short_choice_return_codes.len() * (options + 1),
            cm_table.len(),
        )?;

        let mut entries = cm_table.iter();
        if let Some((key, value)) = entries.next() {
            let (key_length, value_length) = (key.len(), value.len());
            for (key, value) in entries {
                ensure_size("codes mapping table key length", key_length, key.len())?;
                ensure_size("codes mapping table value length", value_length, value.len())?;
            }
        }

        Ok(CmTableOutput {
            cm_table,
            short_choice_return_codes,
            short_vote_cast_return_codes,
        })
    }

    pub fn cm_table(&self) -> &CodesMappingTable {
        &self.cm_table
    }

    pub fn short_choice_return_codes(&self) -> &[Vec<String>] {
        &self.short_choice_return_codes
    }

    pub fn short_vote_cast_return_codes(&self) -> &[String] {
        &self.short_vote_cast_return_codes
    }
}

struct VoterCodes {
    entries: Vec<(String, String)>,
    short_choice_return_codes: Vec<String>,
    short_vote_cast_return_code: String,
}

fn voter_codes(
    context: &CmTableContext,
    input: &CmTableInput,
    i: usize,
    rng: &mut ChaCha20Rng,
) -> Result<VoterCodes> {
    let verification_card_id = &context.verification_card_ids[i];
    let election_event_id = &context.election_event_id;
    let n = context.number_of_voting_options();

    let pre_choice_return_codes =
        ElGamal::decrypt(&input.encrypted_pre_choice_return_codes[i], &input.setup_secret_key)?;
    let short_choice_return_codes =
        random_distinct_codes(n, SHORT_CHOICE_RETURN_CODE_LENGTH, rng);

    let mut entries = Vec::with_capacity(n + 1);
    for k in 0..n {
        let long_code = long_choice_return_code(
            &pre_choice_return_codes[k],
            verification_card_id,
            election_event_id,
            &context.correctness_information[k],
        );
        entries.push((
            hash_long_return_code(&long_code),
            seal_short_code(&long_code, &short_choice_return_codes[k], rng)?,
        ));
    }

    let short_vote_cast_return_code = random_decimal_code(SHORT_VOTE_CAST_RETURN_CODE_LENGTH, rng);
    let long_code = long_vote_cast_return_code(
        &input.pre_vote_cast_return_codes[i],
        verification_card_id,
        election_event_id,
    );
    entries.push((
        hash_long_return_code(&long_code),
        seal_short_code(&long_code, &short_vote_cast_return_code, rng)?,
    ));

    Ok(VoterCodes {
        entries,
        short_choice_return_codes,
        short_vote_cast_return_code,
    })
}

/// Derives the voters' short codes and the codes mapping table of a chunk.
///
/// Short codes are drawn at random and only reachable through the hash of their long code.
/// One seed per voter is drawn from `rng` up front, so the output does not depend on scheduling.
pub fn gen_cm_table<R: RngCore + CryptoRng>(
    context: &CmTableContext,
    input: &CmTableInput,
    rng: &mut R,
) -> Result<CmTableOutput> {
    let voters = context.verification_card_ids.len();
    ensure_group("codes mapping table input", &context.group, input.group())?;
    ensure_size(
        "encrypted pre choice return codes",
        voters,
        input.encrypted_pre_choice_return_codes.len(),
    )?;
    ensure_size(
        "encrypted pre choice return codes element size",
        context.number_of_voting_options(),
        input.encrypted_pre_choice_return_codes[0].element_size(),
    )?;
    ensure_range(
        "setup secret key size",
        context.number_of_voting_options(),
        context.maximum_number_of_voting_options,
        input.setup_secret_key.size(),
    )?;

    info!(
        "generating codes mapping table for {} voters with {} voting options",
        voters,
        context.number_of_voting_options()
    );

    let seeds: Vec<[u8; 32]> = (0..voters)
        .map(|_| {
            let mut seed = [0u8; 32];
            rng.fill_bytes(&mut seed);
            seed
        })
        .collect();

    let per_voter = seeds
        .into_par_iter()
        .enumerate()
        .map(|(i, seed)| voter_codes(context, input, i, &mut ChaCha20Rng::from_seed(seed)))
        .collect::<Result<Vec<_>>>()?;
    debug!("derived codes of {} voters, building table", per_voter.len());

    let mut cm_table = CodesMappingTable::new();
    let mut short_choice_return_codes = Vec::with_capacity(voters);
    let mut short_vote_cast_return_codes = Vec::with_capacity(voters);
    for codes in per_voter {
        for (key, value) in codes.entries {
            if cm_table.contains_key(&key) {
                return Err(StructuralError::Duplicate {
                    what: "codes mapping table",
                    value: key,
                }
                .into());
            }
            cm_table.insert(key, value);
        }
        short_choice_return_codes.push(codes.short_choice_return_codes);
        short_vote_cast_return_codes.push(codes.short_vote_cast_return_code);
    }

    CmTableOutput::new(cm_table, short_choice_return_codes, short_vote_cast_return_codes)
}

/// Looks up and opens the short code of a long return code; `None` when the code is not in the table.
pub fn decrypt_short_code(
    cm_table: &CodesMappingTable,
    long_return_code: &LongReturnCode,
) -> Result<Option<String>> {
    match cm_table.get(&hash_long_return_code(long_return_code)) {
        None => Ok(None),
        Some(sealed) => open_short_code(long_return_code, sealed).map(Some),
    }
}
