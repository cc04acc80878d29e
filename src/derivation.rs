use argon2::{Algorithm, Argon2, Params, Version};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::Argon2Profile;
use crate::error::{ensure_non_empty, ensure_size, Error, Result};
use crate::hash::{recursive_hash, Hashable};
use crate::validation::{
    validate_extended_authentication_factor, validate_extended_authentication_factor_length,
    validate_start_voting_key, validate_uuid,
};

pub const ARGON2_OUTPUT_LENGTH: usize = 32;
pub const ARGON2_SALT_LENGTH: usize = 16;

/// Credential ids are 32 upper-case hex characters.
pub const CREDENTIAL_ID_LENGTH: usize = 32;

pub const BASE_AUTHENTICATION_CHALLENGE_LENGTH: usize = 44;

/// Argon2id (v1.3) of `password` under `salt` with the cost of `profile`.
pub fn argon2id(
    password: &[u8],
    salt: &[u8],
    profile: Argon2Profile,
) -> Result<[u8; ARGON2_OUTPUT_LENGTH]> {
    let params = Params::new(
        profile.memory_cost(),
        profile.iterations(),
        profile.parallelism(),
        Some(ARGON2_OUTPUT_LENGTH),
    )
    .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = [0u8; ARGON2_OUTPUT_LENGTH];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    Ok(out)
}

/// First [`ARGON2_SALT_LENGTH`] bytes of the recursive hash of `values`.
pub(crate) fn salt(values: &[Hashable]) -> [u8; ARGON2_SALT_LENGTH] {
    let mut out = [0u8; ARGON2_SALT_LENGTH];
    out.copy_from_slice(&recursive_hash(values)[..ARGON2_SALT_LENGTH]);
    out
}

/// Derives the voter's public credential id from the start voting key.
pub fn derive_credential_id(
    election_event_id: &str,
    start_voting_key: &str,
    profile: Argon2Profile,
) -> Result<String> {
    validate_uuid(election_event_id)?;
    validate_start_voting_key(start_voting_key)?;

    let salt = salt(&[election_event_id.into(), "credentialId".into()]);
    let derived = argon2id(start_voting_key.as_bytes(), &salt, profile)?;

    Ok(hex::encode_upper(&derived[..CREDENTIAL_ID_LENGTH / 2]))
}

/// Derives the challenge the voting server checks when the voter authenticates with
/// the start voting key and the extended authentication factor.
pub fn derive_base_authentication_challenge(
    election_event_id: &str,
    extended_authentication_factor_length: usize,
    start_voting_key: &str,
    extended_authentication_factor: &str,
    profile: Argon2Profile,
) -> Result<String> {
    validate_uuid(election_event_id)?;
    validate_start_voting_key(start_voting_key)?;
    validate_extended_authentication_factor(
        extended_authentication_factor,
        extended_authentication_factor_length,
    )?;

    let salt = salt(&[
        election_event_id.into(),
        "dAuth".into(),
        extended_authentication_factor_length.into(),
    ]);
    let password = [start_voting_key, extended_authentication_factor].concat();
    let derived = argon2id(password.as_bytes(), &salt, profile)?;

    Ok(base64::encode(derived))
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterAuthenticationData {
    pub credential_id: String,
    pub base_authentication_challenge: String,
}

/// Derives credential ids and base challenges for a cohort, in input order.
pub fn get_voter_authentication_data<S: AsRef<str> + Sync>(
    election_event_id: &str,
    extended_authentication_factor_length: usize,
    start_voting_keys: &[S],
    extended_authentication_factors: &[S],
    profile: Argon2Profile,
) -> Result<Vec<VoterAuthenticationData>> {
    validate_uuid(election_event_id)?;
    validate_extended_authentication_factor_length(extended_authentication_factor_length)?;
    ensure_non_empty("start voting keys", start_voting_keys)?;
    ensure_size(
        "extended authentication factors",
        start_voting_keys.len(),
        extended_authentication_factors.len(),
    )?;
    for (svk, ea) in start_voting_keys
        .iter()
        .zip(extended_authentication_factors.iter())
    {
        validate_start_voting_key(svk.as_ref())?;
        validate_extended_authentication_factor(ea.as_ref(), extended_authentication_factor_length)?;
    }

    info!(
        "deriving authentication data for {} voters of election event {}",
        start_voting_keys.len(),
        election_event_id
    );

    let data = start_voting_keys
        .par_iter()
        .zip(extended_authentication_factors.par_iter())
        .map(|(svk, ea)| {
            Ok(VoterAuthenticationData {
                credential_id: derive_credential_id(election_event_id, svk.as_ref(), profile)?,
                base_authentication_challenge: derive_base_authentication_challenge(
                    election_event_id,
                    extended_authentication_factor_length,
                    svk.as_ref(),
                    ea.as_ref(),
                    profile,
                )?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("derived {} authentication data entries", data.len());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EE: &str = "0AD226BDFBE84A32BC8808234D83E7B4";
    const SVK: &str = "fsfkkn4x7js5xbzeyfyd3qpu";

    #[test]
    fn credential_id_is_deterministic() {
        let id = derive_credential_id(EE, SVK, Argon2Profile::Test).unwrap();
        assert_eq!(id.len(), CREDENTIAL_ID_LENGTH);
        assert!(validate_uuid(&id).is_ok());
        assert_eq!(id, derive_credential_id(EE, SVK, Argon2Profile::Test).unwrap());

        let other_key = derive_credential_id(EE, "abcdefghijkmnpqrstuvwxyz", Argon2Profile::Test).unwrap();
        assert_ne!(id, other_key);
        let other_event =
            derive_credential_id("1AD226BDFBE84A32BC8808234D83E7B4", SVK, Argon2Profile::Test).unwrap();
        assert_ne!(id, other_event);
    }

    #[test]
    fn credential_id_known_answer() {
        // SHA3-256 recursive hash salt, Argon2id v1.3 with 16 MiB, 1 lane, 1 pass
        assert_eq!(
            derive_credential_id(EE, SVK, Argon2Profile::Test).unwrap(),
            "703FADBE3BBFBD82369C12596DA56F8F"
        );
    }

    #[test]
    fn credential_id_rejects_malformed_inputs() {
        assert!(derive_credential_id("0ad226", SVK, Argon2Profile::Test)
            .unwrap_err()
            .is_structural());
        assert!(derive_credential_id(EE, "short", Argon2Profile::Test)
            .unwrap_err()
            .is_structural());
    }

    #[test]
    fn base_authentication_challenge() {
        let challenge =
            derive_base_authentication_challenge(EE, 4, SVK, "1990", Argon2Profile::Test).unwrap();
        assert_eq!(challenge.len(), BASE_AUTHENTICATION_CHALLENGE_LENGTH);
        assert!(crate::validation::validate_base64(&challenge).is_ok());

        let other_year =
            derive_base_authentication_challenge(EE, 4, SVK, "1991", Argon2Profile::Test).unwrap();
        assert_ne!(challenge, other_year);

        assert!(derive_base_authentication_challenge(EE, 8, SVK, "1990", Argon2Profile::Test).is_err());
        assert!(derive_base_authentication_challenge(EE, 4, SVK, "199O", Argon2Profile::Test).is_err());
    }

    #[test]
    fn voter_authentication_data_in_input_order() {
        let svks = vec![SVK, "abcdefghijkmnpqrstuvwxyz"];
        let eas = vec!["01061990", "31121985"];

        let data = get_voter_authentication_data(EE, 8, &svks, &eas, Argon2Profile::Test).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(
            data[1].credential_id,
            derive_credential_id(EE, svks[1], Argon2Profile::Test).unwrap()
        );
        assert_eq!(
            data[0].base_authentication_challenge,
            derive_base_authentication_challenge(EE, 8, svks[0], eas[0], Argon2Profile::Test)
                .unwrap()
        );
    }

    #[test]
    fn voter_authentication_data_preconditions() {
        let empty: Vec<&str> = vec![];
        assert!(get_voter_authentication_data(EE, 4, &empty, &empty, Argon2Profile::Test).is_err());
        assert!(
            get_voter_authentication_data(EE, 4, &[SVK, SVK], &["1990"], Argon2Profile::Test)
                .unwrap_err()
                .is_structural()
        );
        assert!(get_voter_authentication_data(EE, 6, &[SVK], &["199000"], Argon2Profile::Test).is_err());
    }
}
