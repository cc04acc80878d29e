//! Verification of the control components' exponentiation proofs over the voters of one chunk.

use log::{debug, warn};
use rayon::prelude::*;

use crate::elgamal::{Cipher, ElGamalPublicKey};
use crate::error::{ensure_non_empty, ensure_range, ensure_size, ProofKind, Result};
use crate::group::{ensure_group, ensure_order, GqElement, GqGroup};
use crate::hash::Hashable;
use crate::proof::ExponentiationProof;
use crate::validation::{
    validate_distinct, validate_uuid, validate_uuids, MAX_NUMBER_OF_VOTING_OPTIONS,
    NUMBER_OF_CONTROL_COMPONENTS,
};

/// Algorithm name bound into the auxiliary information of every code share proof.
pub const GEN_ENC_LONG_CODE_SHARES: &str = "GenEncLongCodeShares";

/// Which of the two exponentiated ciphertexts a proof covers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExponentiationKind {
    PartialChoiceReturnCodes,
    ConfirmationKey,
}

impl ExponentiationKind {
    pub fn label(self) -> &'static str {
        match self {
            ExponentiationKind::PartialChoiceReturnCodes => "PartialChoiceReturnCodes",
            ExponentiationKind::ConfirmationKey => "ConfirmationKey",
        }
    }

    pub fn proof_kind(self) -> ProofKind {
        match self {
            ExponentiationKind::PartialChoiceReturnCodes => {
                ProofKind::PartialChoiceReturnCodesExponentiation
            }
            ExponentiationKind::ConfirmationKey => ProofKind::ConfirmationKeyExponentiation,
        }
    }

    fn element_size(self, number_of_voting_options: usize) -> usize {
        match self {
            ExponentiationKind::PartialChoiceReturnCodes => number_of_voting_options,
            ExponentiationKind::ConfirmationKey => 1,
        }
    }
}

/// Auxiliary information of the exponentiation proof of voter `verification_card_id` by node `node_id`.
pub fn code_share_aux(
    election_event_id: &str,
    verification_card_set_id: &str,
    verification_card_id: &str,
    node_id: usize,
    kind: ExponentiationKind,
) -> Vec<Hashable> {
    vec![
        election_event_id.into(),
        verification_card_set_id.into(),
        verification_card_id.into(),
        GEN_ENC_LONG_CODE_SHARES.into(),
        node_id.into(),
        kind.label().into(),
    ]
}

/// `(g, gamma, phi_0, ..)` and `(K, gamma', phi'_0, ..)`: the statement of one code share proof.
pub fn code_share_statement(
    public_key: &GqElement,
    base: &Cipher,
    exponentiated: &Cipher,
) -> (Vec<GqElement>, Vec<GqElement>) {
    let mut bases = vec![base.group().generator()];
    bases.extend(base.to_elements());
    let mut exponentiations = vec![public_key.clone()];
    exponentiations.extend(exponentiated.to_elements());
    (bases, exponentiations)
}

#[derive(Clone, Debug)]
pub struct ExponentiationProofsContext {
    group: GqGroup,
    node_id: usize,
    election_event_id: String,
    verification_card_set_id: String,
    verification_card_ids: Vec<String>,
    number_of_voting_options: usize,
}

impl ExponentiationProofsContext {
    pub fn new(
        group: GqGroup,
        node_id: usize,
        election_event_id: String,
        verification_card_set_id: String,
        verification_card_ids: Vec<String>,
        number_of_voting_options: usize,
    ) -> Result<Self> {
        ensure_range("node id", 1, NUMBER_OF_CONTROL_COMPONENTS, node_id)?;
        validate_uuid(&election_event_id)?;
        validate_uuid(&verification_card_set_id)?;
        ensure_non_empty("verification card ids", &verification_card_ids)?;
        validate_uuids(&verification_card_ids)?;
        validate_distinct("verification card ids", &verification_card_ids)?;
        ensure_range(
            "number of voting options",
            1,
            MAX_NUMBER_OF_VOTING_OPTIONS,
            number_of_voting_options,
        )?;

        Ok(ExponentiationProofsContext {
            group,
            node_id,
            election_event_id,
            verification_card_set_id,
            verification_card_ids,
            number_of_voting_options,
        })
    }

    pub fn group(&self) -> &GqGroup {
        &self.group
    }

    pub fn node_id(&self) -> usize {
        self.node_id
    }

    pub fn election_event_id(&self) -> &str {
        &self.election_event_id
    }

    pub fn verification_card_set_id(&self) -> &str {
        &self.verification_card_set_id
    }

    pub fn verification_card_ids(&self) -> &[String] {
        &self.verification_card_ids
    }

    pub fn number_of_voting_options(&self) -> usize {
        self.number_of_voting_options
    }
}

/// One node's column of a chunk, borrowed from wherever the caller keeps it.
#[derive(Clone, Copy, Debug)]
pub struct ExponentiationProofsInput<'a> {
    pub base_ciphertexts: &'a [Cipher],
    pub public_keys: &'a [ElGamalPublicKey],
    pub exponentiated_ciphertexts: &'a [Cipher],
    pub proofs: &'a [ExponentiationProof],
}

impl<'a> ExponentiationProofsInput<'a> {
    fn check(&self, context: &ExponentiationProofsContext, kind: ExponentiationKind) -> Result<()> {
        let voters = context.verification_card_ids.len();
        ensure_size("base ciphertexts", voters, self.base_ciphertexts.len())?;
        ensure_size("public keys", voters, self.public_keys.len())?;
        ensure_size("exponentiated ciphertexts", voters, self.exponentiated_ciphertexts.len())?;
        ensure_size("exponentiation proofs", voters, self.proofs.len())?;

        let element_size = kind.element_size(context.number_of_voting_options);
        let group = &context.group;
        for i in 0..voters {
            let base = &self.base_ciphertexts[i];
            let exponentiated = &self.exponentiated_ciphertexts[i];
            ensure_group("base ciphertext", group, base.group())?;
            ensure_group("exponentiated ciphertext", group, exponentiated.group())?;
            ensure_size("base ciphertext element size", element_size, base.element_size())?;
            ensure_size(
                "exponentiated ciphertext element size",
                element_size,
                exponentiated.element_size(),
            )?;
            ensure_size("public key size", 1, self.public_keys[i].size())?;
            ensure_group("public key", group, self.public_keys[i].group())?;
            ensure_order("exponentiation proof challenge", group, self.proofs[i].e.group())?;
            ensure_order("exponentiation proof response", group, self.proofs[i].z.group())?;
        }
        Ok(())
    }
}

fn verify_voter(
    context: &ExponentiationProofsContext,
    kind: ExponentiationKind,
    input: &ExponentiationProofsInput<'_>,
    i: usize,
) -> Result<bool> {
    let (bases, exponentiations) = code_share_statement(
        input.public_keys[i].get(0),
        &input.base_ciphertexts[i],
        &input.exponentiated_ciphertexts[i],
    );
    let aux = code_share_aux(
        &context.election_event_id,
        &context.verification_card_set_id,
        &context.verification_card_ids[i],
        context.node_id,
        kind,
    );
    input.proofs[i].verify(&bases, &exponentiations, &aux)
}

/// Index of the first voter whose proof does not verify, `None` when all verify.
///
/// Preconditions are checked for every voter before any proof is looked at.
pub fn first_failing_voter(
    context: &ExponentiationProofsContext,
    kind: ExponentiationKind,
    input: &ExponentiationProofsInput<'_>,
) -> Result<Option<usize>> {
    input.check(context, kind)?;
    debug!(
        "verifying {} {} proofs of node {}",
        context.verification_card_ids.len(),
        kind.label(),
        context.node_id
    );

    let results = (0..context.verification_card_ids.len())
        .into_par_iter()
        .map(|i| verify_voter(context, kind, input, i))
        .collect::<Result<Vec<bool>>>()?;

    let failing = results.iter().position(|valid| !valid);
    if let Some(i) = failing {
        warn!(
            "{} of voter {} does not verify for node {}",
            kind.proof_kind(),
            context.verification_card_ids[i],
            context.node_id
        );
    }
    Ok(failing)
}

/// True only if every voter's partial choice return codes exponentiation proof verifies.
pub fn verify_encrypted_pcc_exponentiation_proofs(
    context: &ExponentiationProofsContext,
    input: &ExponentiationProofsInput<'_>,
) -> Result<bool> {
    Ok(first_failing_voter(context, ExponentiationKind::PartialChoiceReturnCodes, input)?.is_none())
}

/// True only if every voter's confirmation key exponentiation proof verifies.
pub fn verify_encrypted_ck_exponentiation_proofs(
    context: &ExponentiationProofsContext,
    input: &ExponentiationProofsInput<'_>,
) -> Result<bool> {
    Ok(first_failing_voter(context, ExponentiationKind::ConfirmationKey, input)?.is_none())
}
