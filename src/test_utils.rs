//! Fixed groups and honestly generated chunks shared by the unit tests.

use num_bigint::BigInt;
use num_traits::Num;
use rand_core::{CryptoRng, RngCore};

use crate::combine::{CombineContext, CombineInput, ControlComponentCodeShare, NodeContribution};
use crate::elgamal::{Cipher, ElGamal, ElGamalKeyPair};
use crate::group::{GqElement, GqGroup, ZqElement};
use crate::validation::NUMBER_OF_CONTROL_COMPONENTS;
use crate::verification::{ExponentiationKind, ExponentiationProofsContext, ExponentiationProofsInput};

pub(crate) const EE: &str = "0AD226BDFBE84A32BC8808234D83E7B4";
pub(crate) const VCS: &str = "5E8F7B3D4B1C4C07A2BB0D2A2C6F3E11";

/// 128-bit safe prime group, generator 2.
pub(crate) fn large_group() -> GqGroup {
    let p = BigInt::from_str_radix("d09a3afe53fb2d654a2edb41e864a607", 16).unwrap();
    GqGroup::from_safe_prime(p, BigInt::from(2)).unwrap()
}

/// 64-bit safe prime group, generator 2.
pub(crate) fn small_group() -> GqGroup {
    let p = BigInt::from_str_radix("f953a6f2a5cd7217", 16).unwrap();
    GqGroup::from_safe_prime(p, BigInt::from(2)).unwrap()
}

pub(crate) fn verification_card_ids(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{:032X}", 0xA1B2_C3D4_u128 + (i as u128) * 0x1_0000_0001))
        .collect()
}

pub(crate) fn random_element<R: RngCore + CryptoRng>(group: &GqGroup, rng: &mut R) -> GqElement {
    group
        .generator()
        .exponentiate(&ZqElement::random(&group.exponent_group(), rng))
}

/// A chunk whose four nodes all behave honestly, with every secret kept for checking.
pub(crate) struct HonestChunk {
    pub group: GqGroup,
    pub verification_card_ids: Vec<String>,
    pub number_of_voting_options: usize,
    pub setup_key_pair: ElGamalKeyPair,
    pub hashed_partial_choice_return_codes: Vec<Vec<GqElement>>,
    pub hashed_confirmation_keys: Vec<GqElement>,
    pub encrypted_hashed_partial_choice_return_codes: Vec<Cipher>,
    pub encrypted_hashed_confirmation_keys: Vec<Cipher>,
    /// `[node][voter]`
    pub choice_secrets: Vec<Vec<ZqElement>>,
    pub vote_cast_secrets: Vec<Vec<ZqElement>>,
    pub nodes: Vec<NodeContribution>,
}

pub(crate) fn honest_chunk<R: RngCore + CryptoRng>(
    group: &GqGroup,
    voters: usize,
    number_of_voting_options: usize,
    rng: &mut R,
) -> HonestChunk {
    let zq = group.exponent_group();
    let ids = verification_card_ids(voters);
    let setup_key_pair = ElGamalKeyPair::generate(group, number_of_voting_options + 1, rng).unwrap();

    let mut hashed_pcc = Vec::with_capacity(voters);
    let mut hashed_ck = Vec::with_capacity(voters);
    let mut encrypted_pcc = Vec::with_capacity(voters);
    let mut encrypted_ck = Vec::with_capacity(voters);
    for _ in 0..voters {
        let pcc: Vec<GqElement> = (0..number_of_voting_options)
            .map(|_| random_element(group, rng))
            .collect();
        let ck = random_element(group, rng);
        encrypted_pcc.push(
            ElGamal::encrypt(&pcc, &ZqElement::random(&zq, rng), &setup_key_pair.public_key).unwrap(),
        );
        encrypted_ck.push(
            ElGamal::encrypt(&[ck.clone()], &ZqElement::random(&zq, rng), &setup_key_pair.public_key)
                .unwrap(),
        );
        hashed_pcc.push(pcc);
        hashed_ck.push(ck);
    }

    let mut choice_secrets = Vec::with_capacity(NUMBER_OF_CONTROL_COMPONENTS);
    let mut vote_cast_secrets = Vec::with_capacity(NUMBER_OF_CONTROL_COMPONENTS);
    let mut nodes = Vec::with_capacity(NUMBER_OF_CONTROL_COMPONENTS);
    for node_id in 1..=NUMBER_OF_CONTROL_COMPONENTS {
        let k: Vec<ZqElement> = (0..voters).map(|_| ZqElement::random(&zq, rng)).collect();
        let kc: Vec<ZqElement> = (0..voters).map(|_| ZqElement::random(&zq, rng)).collect();
        let shares = (0..voters)
            .map(|i| {
                ControlComponentCodeShare::generate(
                    node_id,
                    EE,
                    VCS,
                    &ids[i],
                    &encrypted_pcc[i],
                    &encrypted_ck[i],
                    &k[i],
                    &kc[i],
                    rng,
                )
                .unwrap()
            })
            .collect();
        nodes.push(NodeContribution::from_shares(node_id, shares, &ids).unwrap());
        choice_secrets.push(k);
        vote_cast_secrets.push(kc);
    }

    HonestChunk {
        group: group.clone(),
        verification_card_ids: ids,
        number_of_voting_options,
        setup_key_pair,
        hashed_partial_choice_return_codes: hashed_pcc,
        hashed_confirmation_keys: hashed_ck,
        encrypted_hashed_partial_choice_return_codes: encrypted_pcc,
        encrypted_hashed_confirmation_keys: encrypted_ck,
        choice_secrets,
        vote_cast_secrets,
        nodes,
    }
}

impl HonestChunk {
    pub fn combine_context(&self) -> CombineContext {
        CombineContext::new(
            self.group.clone(),
            EE.to_owned(),
            VCS.to_owned(),
            self.verification_card_ids.clone(),
            self.number_of_voting_options,
            self.number_of_voting_options + 1,
        )
        .unwrap()
    }

    pub fn combine_input(&self) -> CombineInput {
        CombineInput::new(
            self.nodes.clone(),
            self.setup_key_pair.private_key.clone(),
            self.encrypted_hashed_partial_choice_return_codes.clone(),
            self.encrypted_hashed_confirmation_keys.clone(),
        )
        .unwrap()
    }

    pub fn proofs_context(&self, node_id: usize) -> ExponentiationProofsContext {
        ExponentiationProofsContext::new(
            self.group.clone(),
            node_id,
            EE.to_owned(),
            VCS.to_owned(),
            self.verification_card_ids.clone(),
            self.number_of_voting_options,
        )
        .unwrap()
    }

    pub fn pcc_input(&self, node_index: usize) -> ExponentiationProofsInput<'_> {
        self.nodes[node_index].proofs_input(
            ExponentiationKind::PartialChoiceReturnCodes,
            &self.encrypted_hashed_partial_choice_return_codes,
        )
    }

    pub fn ck_input(&self, node_index: usize) -> ExponentiationProofsInput<'_> {
        self.nodes[node_index].proofs_input(
            ExponentiationKind::ConfirmationKey,
            &self.encrypted_hashed_confirmation_keys,
        )
    }

    /// `k_1 + .. + k_4` of voter `i`.
    pub fn choice_secret_sum(&self, i: usize) -> ZqElement {
        sum(self.choice_secrets.iter().map(|secrets| &secrets[i]), &self.group)
    }

    pub fn vote_cast_secret_sum(&self, i: usize) -> ZqElement {
        sum(self.vote_cast_secrets.iter().map(|secrets| &secrets[i]), &self.group)
    }
}

fn sum<'a>(values: impl Iterator<Item = &'a ZqElement>, group: &GqGroup) -> ZqElement {
    values.fold(ZqElement::zero(&group.exponent_group()), |acc, value| acc.add(value))
}
