//! Return-code generation for the setup phase of a verifiable e-voting system.
//!
//! The control components' encrypted code shares are verified and combined ([`combine`]), turned
//! into the voters' short codes and the codes mapping table ([`cmtable`]), and every voter's
//! verification card secret key is sealed into a keystore ([`credentials`]). [`setup`] produces
//! the group, the encodings and the verification data these algorithms start from.

pub mod cmtable;
pub mod codes;
pub mod combine;
pub mod config;
pub mod credentials;
pub mod derivation;
#[allow(clippy::many_single_char_names)]
pub mod elgamal;
pub mod error;
#[allow(clippy::many_single_char_names)]
pub mod group;
pub mod hash;
#[allow(clippy::many_single_char_names)]
mod math;
#[allow(clippy::many_single_char_names)]
pub mod proof;
pub mod setup;
pub mod store;
pub mod symmetric;
pub mod validation;
pub mod verification;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use crate::cmtable::{decrypt_short_code, gen_cm_table, CmTableContext, CmTableInput};
    use crate::codes::{hash_long_return_code, long_choice_return_code, long_vote_cast_return_code};
    use crate::combine::{
        combine_enc_long_code_shares, CombineContext, CombineInput, ControlComponentCodeShare,
        NodeContribution,
    };
    use crate::config::{Argon2Profile, SetupConfig};
    use crate::credentials::{gen_cred_dat, open_keystore, CredentialDataContext, CredentialDataInput};
    use crate::group::ZqElement;
    use crate::hash::{hash_and_square, Hashable};
    use crate::setup::{
        gen_keys_ccr, gen_setup_data, gen_verification_card_set_keys, gen_verification_data,
        PartialPrimesMappingEntry, SetupDataContext, SetupDataInput, VerificationCardSetKeysContext,
        VerificationCardSetKeysInput, VerificationDataContext, VerificationDataInput,
    };
    use crate::store::{BatchedWriter, MemStore, ReturnCodesStore};
    use crate::test_utils::{EE, VCS};
    use crate::validation::NUMBER_OF_CONTROL_COMPONENTS;

    const SVKS: [&str; 2] = ["fsfkkn4x7js5xbzeyfyd3qpu", "k7m3n9p2q4r6s8t2u4v6w8x3"];

    #[test]
    fn setup_to_short_codes() {
        let config = SetupConfig::from_json(
            r#"{"argon2_profile": "test", "group_bit_length": 96, "worker_threads": 2, "persistence_batch_size": 3}"#,
        )
        .unwrap();
        let pool = config.thread_pool().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(2024);

        let partial = |option: &str| PartialPrimesMappingEntry {
            actual_voting_option: option.to_owned(),
            semantic_information: option.to_uppercase(),
            correctness_information: "question-1".to_owned(),
        };
        let mut tables = BTreeMap::new();
        tables.insert(VCS.to_owned(), vec![partial("yes"), partial("no")]);
        let setup = gen_setup_data(
            &SetupDataContext::from_config("SG_20240609_VV01".to_owned(), &config).unwrap(),
            &SetupDataInput::new(tables).unwrap(),
            &mut rng,
        )
        .unwrap();
        let group = setup.group.clone();
        let zq = group.exponent_group();
        let table = setup.primes_mapping_tables[VCS].clone();

        let verification_data = pool
            .install(|| {
                gen_verification_data(
                    &VerificationDataContext::new(
                        group.clone(),
                        EE.to_owned(),
                        VCS.to_owned(),
                        2,
                        table.clone(),
                        setup.maximum_number_of_voting_options(),
                    )?,
                    &VerificationDataInput::new(setup.setup_key_pair.public_key.clone()),
                    &mut rng,
                )
            })
            .unwrap();
        let ids = verification_data.verification_card_ids.clone();

        // the control components
        let ccr_keys: Vec<_> = (1..=NUMBER_OF_CONTROL_COMPONENTS)
            .map(|j| gen_keys_ccr(&group, EE, j, 1, &mut rng).unwrap())
            .collect();
        let choice_return_codes_key = gen_verification_card_set_keys(
            &VerificationCardSetKeysContext::new(group.clone(), EE.to_owned()).unwrap(),
            &VerificationCardSetKeysInput::new(
                ccr_keys.iter().map(|(kp, _)| kp.public_key.clone()).collect(),
                ccr_keys.iter().map(|(_, proofs)| proofs.clone()).collect(),
            )
            .unwrap(),
        )
        .unwrap();

        let mut choice_secrets = vec![ZqElement::zero(&zq); 2];
        let mut vote_cast_secrets = vec![ZqElement::zero(&zq); 2];
        let mut nodes = Vec::new();
        for node_id in 1..=NUMBER_OF_CONTROL_COMPONENTS {
            let mut shares = Vec::new();
            for i in 0..2 {
                let k = ZqElement::random(&zq, &mut rng);
                let kc = ZqElement::random(&zq, &mut rng);
                shares.push(
                    ControlComponentCodeShare::generate(
                        node_id,
                        EE,
                        VCS,
                        &ids[i],
                        &verification_data.encrypted_hashed_partial_choice_return_codes[i],
                        &verification_data.encrypted_hashed_confirmation_keys[i],
                        &k,
                        &kc,
                        &mut rng,
                    )
                    .unwrap(),
                );
                choice_secrets[i] = choice_secrets[i].add(&k);
                vote_cast_secrets[i] = vote_cast_secrets[i].add(&kc);
            }
            nodes.push(NodeContribution::from_shares(node_id, shares, &ids).unwrap());
        }

        let combined = pool
            .install(|| {
                combine_enc_long_code_shares(
                    &CombineContext::new(
                        group.clone(),
                        EE.to_owned(),
                        VCS.to_owned(),
                        ids.clone(),
                        table.len(),
                        setup.maximum_number_of_voting_options(),
                    )?,
                    &CombineInput::new(
                        nodes,
                        setup.setup_key_pair.private_key.clone(),
                        verification_data.encrypted_hashed_partial_choice_return_codes.clone(),
                        verification_data.encrypted_hashed_confirmation_keys.clone(),
                    )?,
                )
            })
            .unwrap();

        let cm_table = gen_cm_table(
            &CmTableContext::new(
                group.clone(),
                EE.to_owned(),
                ids.clone(),
                table.correctness_information(),
                setup.maximum_number_of_voting_options(),
            )
            .unwrap(),
            &CmTableInput::new(
                setup.setup_key_pair.private_key.clone(),
                combined.encrypted_pre_choice_return_codes().to_vec(),
                combined.pre_vote_cast_return_codes().to_vec(),
            )
            .unwrap(),
            &mut rng,
        )
        .unwrap();

        let mut store = MemStore::default();
        let mut writer = BatchedWriter::from_config(&mut store, EE, VCS, &config).unwrap();
        writer.write_cm_table(&cm_table).unwrap();
        writer.write_allow_list(&combined).unwrap();
        assert_eq!(writer.finish().unwrap(), 2 * 3 + 2);
        let stored_table = store.load_cm_table(EE, VCS);
        assert_eq!(&stored_table, cm_table.cm_table());

        // what the voting server does once the control components return the pre codes
        for i in 0..2 {
            let secret_key = verification_data.verification_card_key_pairs[i].private_key.get(0);
            for (k, entry) in table.entries().iter().enumerate() {
                let hashed = hash_and_square(
                    Hashable::from(&entry.encoded_voting_option.exponentiate(secret_key)),
                    &group,
                )
                .unwrap();
                let pre_choice = hashed.exponentiate(&choice_secrets[i]);
                let long_code =
                    long_choice_return_code(&pre_choice, &ids[i], EE, &entry.correctness_information);
                assert_eq!(
                    decrypt_short_code(&stored_table, &long_code).unwrap(),
                    Some(cm_table.short_choice_return_codes()[i][k].clone())
                );
            }

            let hashed_bck = hash_and_square(
                Hashable::from(verification_data.ballot_casting_keys[i].as_str()),
                &group,
            )
            .unwrap();
            let hashed_ck =
                hash_and_square(Hashable::from(&hashed_bck.exponentiate(secret_key)), &group).unwrap();
            let pre_vote_cast = hashed_ck.exponentiate(&vote_cast_secrets[i]);
            let long_code = long_vote_cast_return_code(&pre_vote_cast, &ids[i], EE);
            assert!(store
                .load_allow_list(EE, VCS)
                .contains(&hash_long_return_code(&long_code)));
            assert_eq!(
                decrypt_short_code(&stored_table, &long_code).unwrap(),
                Some(cm_table.short_vote_cast_return_codes()[i].clone())
            );
        }

        let credentials = gen_cred_dat(
            &CredentialDataContext::new(
                group.clone(),
                EE.to_owned(),
                VCS.to_owned(),
                ids.clone(),
                table.clone(),
                setup.setup_key_pair.public_key.clone(),
                choice_return_codes_key,
            )
            .unwrap(),
            &CredentialDataInput::new(
                verification_data.verification_card_secret_keys(),
                SVKS.iter().map(|s| s.to_string()).collect(),
            )
            .unwrap(),
            config.argon2_profile,
            &mut rng,
        )
        .unwrap();
        let keystores: Vec<(String, String)> = ids
            .iter()
            .cloned()
            .zip(credentials.verification_card_keystores().iter().cloned())
            .collect();
        store.save_keystores(EE, VCS, &keystores).unwrap();

        let keystore = store.get_keystore(EE, VCS, &ids[1]).unwrap();
        let opened = open_keystore(&keystore, SVKS[1], EE, VCS, &ids[1], &zq, Argon2Profile::Test).unwrap();
        assert_eq!(&opened, verification_data.verification_card_key_pairs[1].private_key.get(0));
    }
}
