use log::{debug, info, warn};
use rand_core::{CryptoRng, RngCore};
use rayon::prelude::*;

use crate::codes::{hash_long_return_code, long_vote_cast_return_code};
use crate::elgamal::{Cipher, ElGamal, ElGamalPrivateKey, ElGamalPublicKey};
use crate::error::{
    ensure_non_empty, ensure_range, ensure_size, Result, StructuralError, VerificationFailure,
};
use crate::group::{ensure_group, ensure_order, GqElement, GqGroup, ZqElement};
use crate::hash::HASH_BASE64_LENGTH;
use crate::proof::ExponentiationProof;
use crate::validation::{
    validate_base64, validate_distinct, validate_uuid, validate_uuids,
    MAX_NUMBER_OF_VOTING_OPTIONS, NUMBER_OF_CONTROL_COMPONENTS,
};
use crate::verification::{
    code_share_aux, code_share_statement, first_failing_voter, ExponentiationKind,
    ExponentiationProofsContext, ExponentiationProofsInput,
};

/// What one control component returns for one voter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControlComponentCodeShare {
    pub verification_card_id: String,
    pub voter_choice_return_code_generation_public_key: ElGamalPublicKey,
    pub voter_vote_cast_return_code_generation_public_key: ElGamalPublicKey,
    pub exponentiated_encrypted_partial_choice_return_codes: Cipher,
    pub exponentiated_encrypted_confirmation_key: Cipher,
    pub partial_choice_return_codes_proof: ExponentiationProof,
    pub confirmation_key_proof: ExponentiationProof,
}

impl ControlComponentCodeShare {
    /// Exponentiates the voter's two ciphertexts with the node's voter-specific secrets
    /// and proves both exponentiations.
    #[allow(clippy::too_many_arguments)]
    pub fn generate<R: RngCore + CryptoRng>(
        node_id: usize,
        election_event_id: &str,
        verification_card_set_id: &str,
        verification_card_id: &str,
        encrypted_hashed_partial_choice_return_codes: &Cipher,
        encrypted_hashed_confirmation_key: &Cipher,
        choice_return_code_generation_secret_key: &ZqElement,
        vote_cast_return_code_generation_secret_key: &ZqElement,
        rng: &mut R,
    ) -> Result<Self> {
        let group = encrypted_hashed_partial_choice_return_codes.group();
        ensure_group(
            "encrypted hashed confirmation key",
            group,
            encrypted_hashed_confirmation_key.group(),
        )?;

        let k = choice_return_code_generation_secret_key;
        let kc = vote_cast_return_code_generation_secret_key;
        let choice_public_key = ElGamalPublicKey::new(vec![group.generator().exponentiate(k)])?;
        let vote_cast_public_key = ElGamalPublicKey::new(vec![group.generator().exponentiate(kc)])?;

        let exponentiated_pcc = ElGamal::exponentiate(encrypted_hashed_partial_choice_return_codes, k)?;
        let exponentiated_ck = ElGamal::exponentiate(encrypted_hashed_confirmation_key, kc)?;

        let (bases, exponentiations) = code_share_statement(
            choice_public_key.get(0),
            encrypted_hashed_partial_choice_return_codes,
            &exponentiated_pcc,
        );
        let aux = code_share_aux(
            election_event_id,
            verification_card_set_id,
            verification_card_id,
            node_id,
            ExponentiationKind::PartialChoiceReturnCodes,
        );
        let pcc_proof = ExponentiationProof::generate(&bases, k, &exponentiations, &aux, rng)?;

        let (bases, exponentiations) = code_share_statement(
            vote_cast_public_key.get(0),
            encrypted_hashed_confirmation_key,
            &exponentiated_ck,
        );
        let aux = code_share_aux(
            election_event_id,
            verification_card_set_id,
            verification_card_id,
            node_id,
            ExponentiationKind::ConfirmationKey,
        );
        let ck_proof = ExponentiationProof::generate(&bases, kc, &exponentiations, &aux, rng)?;

        Ok(ControlComponentCodeShare {
            verification_card_id: verification_card_id.to_owned(),
            voter_choice_return_code_generation_public_key: choice_public_key,
            voter_vote_cast_return_code_generation_public_key: vote_cast_public_key,
            exponentiated_encrypted_partial_choice_return_codes: exponentiated_pcc,
            exponentiated_encrypted_confirmation_key: exponentiated_ck,
            partial_choice_return_codes_proof: pcc_proof,
            confirmation_key_proof: ck_proof,
        })
    }
}

/// One control component's shares for a chunk, one entry per voter in voter order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeContribution {
    pub node_id: usize,
    pub voter_choice_return_code_generation_public_keys: Vec<ElGamalPublicKey>,
    pub voter_vote_cast_return_code_generation_public_keys: Vec<ElGamalPublicKey>,
    pub exponentiated_encrypted_partial_choice_return_codes: Vec<Cipher>,
    pub exponentiated_encrypted_confirmation_keys: Vec<Cipher>,
    pub partial_choice_return_codes_proofs: Vec<ExponentiationProof>,
    pub confirmation_key_proofs: Vec<ExponentiationProof>,
}

impl NodeContribution {
    /// Lays the shares out by voter; they must follow `verification_card_ids` exactly.
    pub fn from_shares(
        node_id: usize,
        shares: Vec<ControlComponentCodeShare>,
        verification_card_ids: &[String],
    ) -> Result<Self> {
        ensure_size("code shares", verification_card_ids.len(), shares.len())?;
        let mut contribution = NodeContribution {
            node_id,
            voter_choice_return_code_generation_public_keys: Vec::with_capacity(shares.len()),
            voter_vote_cast_return_code_generation_public_keys: Vec::with_capacity(shares.len()),
            exponentiated_encrypted_partial_choice_return_codes: Vec::with_capacity(shares.len()),
            exponentiated_encrypted_confirmation_keys: Vec::with_capacity(shares.len()),
            partial_choice_return_codes_proofs: Vec::with_capacity(shares.len()),
            confirmation_key_proofs: Vec::with_capacity(shares.len()),
        };
        for (share, id) in shares.into_iter().zip(verification_card_ids.iter()) {
            if &share.verification_card_id != id {
                return Err(StructuralError::InvalidFormat {
                    what: "code share out of voter order",
                    value: share.verification_card_id,
                }
                .into());
            }
            contribution
                .voter_choice_return_code_generation_public_keys
                .push(share.voter_choice_return_code_generation_public_key);
            contribution
                .voter_vote_cast_return_code_generation_public_keys
                .push(share.voter_vote_cast_return_code_generation_public_key);
            contribution
                .exponentiated_encrypted_partial_choice_return_codes
                .push(share.exponentiated_encrypted_partial_choice_return_codes);
            contribution
                .exponentiated_encrypted_confirmation_keys
                .push(share.exponentiated_encrypted_confirmation_key);
            contribution
                .partial_choice_return_codes_proofs
                .push(share.partial_choice_return_codes_proof);
            contribution.confirmation_key_proofs.push(share.confirmation_key_proof);
        }
        Ok(contribution)
    }

    pub fn proofs_input<'a>(
        &'a self,
        kind: ExponentiationKind,
        base_ciphertexts: &'a [Cipher],
    ) -> ExponentiationProofsInput<'a> {
        match kind {
            ExponentiationKind::PartialChoiceReturnCodes => ExponentiationProofsInput {
                base_ciphertexts,
                public_keys: &self.voter_choice_return_code_generation_public_keys,
                exponentiated_ciphertexts: &self.exponentiated_encrypted_partial_choice_return_codes,
                proofs: &self.partial_choice_return_codes_proofs,
            },
            ExponentiationKind::ConfirmationKey => ExponentiationProofsInput {
                base_ciphertexts,
                public_keys: &self.voter_vote_cast_return_code_generation_public_keys,
                exponentiated_ciphertexts: &self.exponentiated_encrypted_confirmation_keys,
                proofs: &self.confirmation_key_proofs,
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct CombineContext {
    group: GqGroup,
    election_event_id: String,
    verification_card_set_id: String,
    verification_card_ids: Vec<String>,
    number_of_voting_options: usize,
    maximum_number_of_voting_options: usize,
}

impl CombineContext {
    pub fn new(
        group: GqGroup,
        election_event_id: String,
        verification_card_set_id: String,
        verification_card_ids: Vec<String>,
        number_of_voting_options: usize,
        maximum_number_of_voting_options: usize,
    ) -> Result<Self> {
        validate_uuid(&election_event_id)?;
        validate_uuid(&verification_card_set_id)?;
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
            number_of_voting_options,
        )?;

        Ok(CombineContext {
            group,
            election_event_id,
            verification_card_set_id,
            verification_card_ids,
            number_of_voting_options,
            maximum_number_of_voting_options,
        })
    }

    pub fn group(&self) -> &GqGroup {
        &self.group
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

    pub fn maximum_number_of_voting_options(&self) -> usize {
        self.maximum_number_of_voting_options
    }

    fn proofs_context(&self, node_id: usize) -> Result<ExponentiationProofsContext> {
        ExponentiationProofsContext::new(
            self.group.clone(),
            node_id,
            self.election_event_id.clone(),
            self.verification_card_set_id.clone(),
            self.verification_card_ids.clone(),
            self.number_of_voting_options,
        )
    }
}

#[derive(Clone, Debug)]
pub struct CombineInput {
    nodes: Vec<NodeContribution>,
    setup_secret_key: ElGamalPrivateKey,
    encrypted_hashed_partial_choice_return_codes: Vec<Cipher>,
    encrypted_hashed_confirmation_keys: Vec<Cipher>,
}

impl CombineInput {
    /// Nodes may arrive in any order; they are kept sorted by node id.
    pub fn new(
        mut nodes: Vec<NodeContribution>,
        setup_secret_key: ElGamalPrivateKey,
        encrypted_hashed_partial_choice_return_codes: Vec<Cipher>,
        encrypted_hashed_confirmation_keys: Vec<Cipher>,
    ) -> Result<Self> {
        ensure_size("control components", NUMBER_OF_CONTROL_COMPONENTS, nodes.len())?;
        nodes.sort_by_key(|node| node.node_id);
        for (expected, node) in (1..=NUMBER_OF_CONTROL_COMPONENTS).zip(nodes.iter()) {
            if node.node_id != expected {
                return Err(StructuralError::Configuration(format!(
                    "control component ids must be 1..={}, found {}",
                    NUMBER_OF_CONTROL_COMPONENTS, node.node_id
                ))
                .into());
            }
        }

        ensure_non_empty(
            "encrypted hashed partial choice return codes",
            &encrypted_hashed_partial_choice_return_codes,
        )?;
        let voters = encrypted_hashed_partial_choice_return_codes.len();
        ensure_size(
            "encrypted hashed confirmation keys",
            voters,
            encrypted_hashed_confirmation_keys.len(),
        )?;
        for node in nodes.iter() {
            ensure_size(
                "voter choice return code generation public keys",
                voters,
                node.voter_choice_return_code_generation_public_keys.len(),
            )?;
            ensure_size(
                "voter vote cast return code generation public keys",
                voters,
                node.voter_vote_cast_return_code_generation_public_keys.len(),
            )?;
            ensure_size(
                "exponentiated encrypted partial choice return codes",
                voters,
                node.exponentiated_encrypted_partial_choice_return_codes.len(),
            )?;
            ensure_size(
                "exponentiated encrypted confirmation keys",
                voters,
                node.exponentiated_encrypted_confirmation_keys.len(),
            )?;
            ensure_size(
                "partial choice return codes proofs",
                voters,
                node.partial_choice_return_codes_proofs.len(),
            )?;
            ensure_size("confirmation key proofs", voters, node.confirmation_key_proofs.len())?;
        }

        let group = encrypted_hashed_partial_choice_return_codes[0].group().clone();
        let element_size = encrypted_hashed_partial_choice_return_codes[0].element_size();
        for c in encrypted_hashed_partial_choice_return_codes.iter() {
            ensure_group("encrypted hashed partial choice return codes", &group, c.group())?;
            ensure_size("partial choice return codes element size", element_size, c.element_size())?;
        }
        for c in encrypted_hashed_confirmation_keys.iter() {
            ensure_group("encrypted hashed confirmation keys", &group, c.group())?;
            ensure_size("confirmation key element size", 1, c.element_size())?;
        }
        for node in nodes.iter() {
            for c in node.exponentiated_encrypted_partial_choice_return_codes.iter() {
                ensure_group("exponentiated partial choice return codes", &group, c.group())?;
                ensure_size("partial choice return codes element size", element_size, c.element_size())?;
            }
            for c in node.exponentiated_encrypted_confirmation_keys.iter() {
                ensure_group("exponentiated confirmation keys", &group, c.group())?;
                ensure_size("confirmation key element size", 1, c.element_size())?;
            }
        }
        ensure_order("setup secret key", &group, setup_secret_key.group())?;

        Ok(CombineInput {
            nodes,
            setup_secret_key,
            encrypted_hashed_partial_choice_return_codes,
            encrypted_hashed_confirmation_keys,
        })
    }

    pub fn nodes(&self) -> &[NodeContribution] {
        &self.nodes
    }

    pub fn setup_secret_key(&self) -> &ElGamalPrivateKey {
        &self.setup_secret_key
    }

    fn group(&self) -> &GqGroup {
        self.encrypted_hashed_partial_choice_return_codes[0].group()
    }

    fn base_ciphertexts(&self, kind: ExponentiationKind) -> &[Cipher] {
        match kind {
            ExponentiationKind::PartialChoiceReturnCodes => {
                &self.encrypted_hashed_partial_choice_return_codes
            }
            ExponentiationKind::ConfirmationKey => &self.encrypted_hashed_confirmation_keys,
        }
    }
}

/// The system-wide codes of one chunk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CombineOutput {
    encrypted_pre_choice_return_codes: Vec<Cipher>,
    pre_vote_cast_return_codes: Vec<GqElement>,
    long_vote_cast_return_codes_allow_list: Vec<String>,
}

impl CombineOutput {
    pub fn new(
        encrypted_pre_choice_return_codes: Vec<Cipher>,
        pre_vote_cast_return_codes: Vec<GqElement>,
        long_vote_cast_return_codes_allow_list: Vec<String>,
    ) -> Result<Self> {
        ensure_non_empty("encrypted pre choice return codes", &encrypted_pre_choice_return_codes)?;
        let voters = encrypted_pre_choice_return_codes.len();
        ensure_size("pre vote cast return codes", voters, pre_vote_cast_return_codes.len())?;
        ensure_size(
            "long vote cast return codes allow list",
            voters,
            long_vote_cast_return_codes_allow_list.len(),
        )?;

        let group = encrypted_pre_choice_return_codes[0].group();
        for c in encrypted_pre_choice_return_codes.iter() {
            ensure_group("encrypted pre choice return codes", group, c.group())?;
        }
        for element in pre_vote_cast_return_codes.iter() {
            ensure_group("pre vote cast return codes", group, element.group())?;
        }
        for entry in long_vote_cast_return_codes_allow_list.iter() {
            ensure_size("allow list entry length", HASH_BASE64_LENGTH, entry.len())?;
            validate_base64(entry)?;
        }

        Ok(CombineOutput {
            encrypted_pre_choice_return_codes,
            pre_vote_cast_return_codes,
            long_vote_cast_return_codes_allow_list,
        })
    }

    pub fn encrypted_pre_choice_return_codes(&self) -> &[Cipher] {
        &self.encrypted_pre_choice_return_codes
    }

    pub fn pre_vote_cast_return_codes(&self) -> &[GqElement] {
        &self.pre_vote_cast_return_codes
    }

    pub fn long_vote_cast_return_codes_allow_list(&self) -> &[String] {
        &self.long_vote_cast_return_codes_allow_list
    }

    pub fn len(&self) -> usize {
        self.encrypted_pre_choice_return_codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encrypted_pre_choice_return_codes.is_empty()
    }
}

fn check(context: &CombineContext, input: &CombineInput) -> Result<()> {
    ensure_group("combine input", context.group(), input.group())?;
    ensure_size(
        "encrypted hashed partial choice return codes",
        context.verification_card_ids.len(),
        input.encrypted_hashed_partial_choice_return_codes.len(),
    )?;
    ensure_size(
        "partial choice return codes element size",
        context.number_of_voting_options,
        input.encrypted_hashed_partial_choice_return_codes[0].element_size(),
    )?;
    ensure_range(
        "setup secret key size",
        context.number_of_voting_options,
        context.maximum_number_of_voting_options,
        input.setup_secret_key.size(),
    )?;
    Ok(())
}

/// Verifies every node's proofs, in node order, and fails on the lowest failing voter.
fn verify_all(context: &CombineContext, input: &CombineInput) -> Result<()> {
    let mut first_failure: Option<(usize, usize, ExponentiationKind)> = None;
    for node in input.nodes.iter() {
        let proofs_context = context.proofs_context(node.node_id)?;
        for kind in [
            ExponentiationKind::PartialChoiceReturnCodes,
            ExponentiationKind::ConfirmationKey,
        ]
        .iter()
        {
            let proofs_input = node.proofs_input(*kind, input.base_ciphertexts(*kind));
            if let Some(voter) = first_failing_voter(&proofs_context, *kind, &proofs_input)? {
                let earlier = first_failure.map_or(true, |(v, _, _)| voter < v);
                if earlier {
                    first_failure = Some((voter, node.node_id, *kind));
                }
            }
        }
    }

    match first_failure {
        None => Ok(()),
        Some((voter, node_id, kind)) => {
            let failure = VerificationFailure {
                proof: kind.proof_kind(),
                election_event_id: context.election_event_id.clone(),
                verification_card_set_id: Some(context.verification_card_set_id.clone()),
                voter: Some((voter, context.verification_card_ids[voter].clone())),
                node_id,
            };
            warn!("combining long code shares aborted: {}", failure);
            Err(failure.into())
        }
    }
}

/// Combines the control components' code shares of one chunk into the system-wide
/// encrypted pre-choice return codes, pre-vote-cast return codes and allow list.
///
/// All proofs of all nodes are verified before anything is combined; one invalid
/// proof fails the whole chunk.
pub fn combine_enc_long_code_shares(
    context: &CombineContext,
    input: &CombineInput,
) -> Result<CombineOutput> {
    check(context, input)?;
    info!(
        "combining long code shares of {} voters, verification card set {}",
        context.verification_card_ids.len(),
        context.verification_card_set_id
    );

    verify_all(context, input)?;
    debug!("all exponentiation proofs verified, folding shares");

    let per_voter = (0..context.verification_card_ids.len())
        .into_par_iter()
        .map(|i| {
            let pcc_shares: Vec<Cipher> = input
                .nodes
                .iter()
                .map(|node| node.exponentiated_encrypted_partial_choice_return_codes[i].clone())
                .collect();
            let ck_shares: Vec<Cipher> = input
                .nodes
                .iter()
                .map(|node| node.exponentiated_encrypted_confirmation_keys[i].clone())
                .collect();

            let encrypted_pre_choice_return_codes = ElGamal::multiply_many(&pcc_shares)?;
            let encrypted_confirmation_key = ElGamal::multiply_many(&ck_shares)?;

            let pre_vote_cast_return_code =
                ElGamal::decrypt(&encrypted_confirmation_key, &input.setup_secret_key)?
                    .remove(0);
            let long_vote_cast_return_code = long_vote_cast_return_code(
                &pre_vote_cast_return_code,
                &context.verification_card_ids[i],
                &context.election_event_id,
            );

            Ok((
                encrypted_pre_choice_return_codes,
                pre_vote_cast_return_code,
                hash_long_return_code(&long_vote_cast_return_code),
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut encrypted_pre_choice_return_codes = Vec::with_capacity(per_voter.len());
    let mut pre_vote_cast_return_codes = Vec::with_capacity(per_voter.len());
    let mut allow_list = Vec::with_capacity(per_voter.len());
    for (c, p, l) in per_voter {
        encrypted_pre_choice_return_codes.push(c);
        pre_vote_cast_return_codes.push(p);
        allow_list.push(l);
    }

    CombineOutput::new(encrypted_pre_choice_return_codes, pre_vote_cast_return_codes, allow_list)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use crate::error::{Error, ProofKind};
    use crate::test_utils::{honest_chunk, large_group, small_group, EE, VCS};

    use super::*;

    #[test]
    fn output_has_one_entry_per_voter() {
        for voters in [1usize, 2, 5].iter() {
            let mut rng = ChaCha20Rng::seed_from_u64(60 + *voters as u64);
            let chunk = honest_chunk(&large_group(), *voters, 2, &mut rng);

            let output = combine_enc_long_code_shares(&chunk.combine_context(), &chunk.combine_input()).unwrap();
            assert_eq!(output.len(), *voters);
            assert_eq!(output.pre_vote_cast_return_codes().len(), *voters);
            assert_eq!(output.long_vote_cast_return_codes_allow_list().len(), *voters);
            for entry in output.long_vote_cast_return_codes_allow_list() {
                assert_eq!(entry.len(), HASH_BASE64_LENGTH);
            }
        }
    }

    #[test]
    fn combined_values_match_secrets() {
        let group = large_group();
        let mut rng = ChaCha20Rng::seed_from_u64(66);
        let chunk = honest_chunk(&group, 2, 3, &mut rng);

        let output = combine_enc_long_code_shares(&chunk.combine_context(), &chunk.combine_input()).unwrap();
        for i in 0..2 {
            // pVCC = hck^(kc_1 + .. + kc_4)
            let expected = chunk.hashed_confirmation_keys[i].exponentiate(&chunk.vote_cast_secret_sum(i));
            assert_eq!(output.pre_vote_cast_return_codes()[i], expected);

            let decrypted =
                ElGamal::decrypt(&output.encrypted_pre_choice_return_codes()[i], &chunk.setup_key_pair.private_key)
                    .unwrap();
            let k = chunk.choice_secret_sum(i);
            for (pc, hpcc) in decrypted.iter().zip(chunk.hashed_partial_choice_return_codes[i].iter()) {
                assert_eq!(pc, &hpcc.exponentiate(&k));
            }

            let lvcc = long_vote_cast_return_code(&expected, &chunk.verification_card_ids[i], EE);
            assert_eq!(output.long_vote_cast_return_codes_allow_list()[i], hash_long_return_code(&lvcc));
        }
    }

    #[test]
    fn one_invalid_proof_fails_the_chunk() {
        for node_index in 0..NUMBER_OF_CONTROL_COMPONENTS {
            let mut rng = ChaCha20Rng::seed_from_u64(70 + node_index as u64);
            let mut chunk = honest_chunk(&large_group(), 3, 1, &mut rng);
            let proof = &mut chunk.nodes[node_index].confirmation_key_proofs[2];
            proof.z = proof.z.add(&proof.e);

            let err = combine_enc_long_code_shares(&chunk.combine_context(), &chunk.combine_input()).unwrap_err();
            match err {
                Error::Verification(failure) => {
                    assert_eq!(failure.proof, ProofKind::ConfirmationKeyExponentiation);
                    assert_eq!(failure.node_id, node_index + 1);
                    assert_eq!(failure.voter, Some((2, chunk.verification_card_ids[2].clone())));
                    assert_eq!(failure.verification_card_set_id.as_deref(), Some(VCS));
                }
                other => panic!("unexpected error {}", other),
            }
        }
    }

    #[test]
    fn lowest_failing_voter_is_reported() {
        let mut rng = ChaCha20Rng::seed_from_u64(75);
        let mut chunk = honest_chunk(&large_group(), 3, 2, &mut rng);
        chunk.nodes[3].partial_choice_return_codes_proofs.swap(0, 1);
        chunk.nodes[0].confirmation_key_proofs.swap(1, 2);

        let err = combine_enc_long_code_shares(&chunk.combine_context(), &chunk.combine_input()).unwrap_err();
        match err {
            Error::Verification(failure) => {
                assert_eq!(failure.voter.map(|(i, _)| i), Some(0));
                assert_eq!(failure.node_id, 4);
                assert_eq!(failure.proof, ProofKind::PartialChoiceReturnCodesExponentiation);
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn input_requires_every_node_once() {
        let mut rng = ChaCha20Rng::seed_from_u64(76);
        let chunk = honest_chunk(&large_group(), 1, 1, &mut rng);

        let mut three = chunk.nodes.clone();
        three.pop();
        assert!(CombineInput::new(
            three,
            chunk.setup_key_pair.private_key.clone(),
            chunk.encrypted_hashed_partial_choice_return_codes.clone(),
            chunk.encrypted_hashed_confirmation_keys.clone(),
        )
        .unwrap_err()
        .is_structural());

        let mut duplicated = chunk.nodes.clone();
        duplicated[3].node_id = 1;
        assert!(CombineInput::new(
            duplicated,
            chunk.setup_key_pair.private_key.clone(),
            chunk.encrypted_hashed_partial_choice_return_codes.clone(),
            chunk.encrypted_hashed_confirmation_keys.clone(),
        )
        .is_err());

        let mut shuffled = chunk.nodes.clone();
        shuffled.reverse();
        let input = CombineInput::new(
            shuffled,
            chunk.setup_key_pair.private_key.clone(),
            chunk.encrypted_hashed_partial_choice_return_codes.clone(),
            chunk.encrypted_hashed_confirmation_keys.clone(),
        )
        .unwrap();
        assert_eq!(input.nodes()[0].node_id, 1);
    }

    #[test]
    fn mismatches_are_structural() {
        let mut rng = ChaCha20Rng::seed_from_u64(77);
        let chunk = honest_chunk(&large_group(), 2, 2, &mut rng);

        // context in another group
        let context = CombineContext::new(
            small_group(),
            EE.to_owned(),
            VCS.to_owned(),
            chunk.verification_card_ids.clone(),
            2,
            3,
        )
        .unwrap();
        assert!(combine_enc_long_code_shares(&context, &chunk.combine_input())
            .unwrap_err()
            .is_structural());

        // one voter more in the context than in the input
        let mut ids = chunk.verification_card_ids.clone();
        ids.push("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF".to_owned());
        let context = CombineContext::new(large_group(), EE.to_owned(), VCS.to_owned(), ids, 2, 3).unwrap();
        assert!(combine_enc_long_code_shares(&context, &chunk.combine_input())
            .unwrap_err()
            .is_structural());

        // a node with a missing voter
        let mut nodes = chunk.nodes.clone();
        nodes[2].exponentiated_encrypted_confirmation_keys.pop();
        assert!(CombineInput::new(
            nodes,
            chunk.setup_key_pair.private_key.clone(),
            chunk.encrypted_hashed_partial_choice_return_codes.clone(),
            chunk.encrypted_hashed_confirmation_keys.clone(),
        )
        .unwrap_err()
        .is_structural());

        assert!(CombineContext::new(large_group(), EE.to_owned(), VCS.to_owned(), vec![], 1, 1).is_err());
        assert!(CombineContext::new(large_group(), EE.to_owned(), VCS.to_owned(), chunk.verification_card_ids.clone(), 4, 3).is_err());
    }

    #[test]
    fn output_rejects_malformed_allow_list() {
        let mut rng = ChaCha20Rng::seed_from_u64(78);
        let chunk = honest_chunk(&large_group(), 1, 1, &mut rng);
        let output = combine_enc_long_code_shares(&chunk.combine_context(), &chunk.combine_input()).unwrap();

        let truncated = output.long_vote_cast_return_codes_allow_list()[0][..40].to_owned();
        assert!(CombineOutput::new(
            output.encrypted_pre_choice_return_codes().to_vec(),
            output.pre_vote_cast_return_codes().to_vec(),
            vec![truncated],
        )
        .is_err());
        assert!(CombineOutput::new(
            output.encrypted_pre_choice_return_codes().to_vec(),
            vec![],
            output.long_vote_cast_return_codes_allow_list().to_vec(),
        )
        .is_err());
    }
}
