use rand_core::{CryptoRng, RngCore};

use crate::error::{ensure_size, Result, StructuralError};
use crate::group::{ensure_group, ensure_order, GqElement, GqGroup, ZqElement};
use crate::hash::{recursive_hash_to_zq, Hashable};
use crate::proof::{aux_hashable, group_hashable};

/// Schnorr Proof - Key Generation
/// Proves knowledge of a secret key `x` that belongs to a public key element `y = g^x`
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SchnorrProof {
    pub e: ZqElement,
    pub z: ZqElement,
}

impl SchnorrProof {
    pub fn new(e: ZqElement, z: ZqElement) -> Result<Self> {
        if e.group() != z.group() {
            return Err(StructuralError::GroupOrderMismatch {
                what: "schnorr proof components",
            }
            .into());
        }
        Ok(SchnorrProof { e, z })
    }

    pub fn generate<R: RngCore + CryptoRng>(
        secret_key: &ZqElement,
        public_key: &GqElement,
        aux: &[Hashable],
        rng: &mut R,
    ) -> Result<Self> {
        let group = public_key.group();
        ensure_order("schnorr secret key", group, secret_key.group())?;

        let b = ZqElement::random(secret_key.group(), rng);
        let commitment = group.generator().exponentiate(&b);
        let e = Self::challenge(group, public_key, &commitment, aux);
        let z = b.add(&e.multiply(secret_key));

        Ok(SchnorrProof { e, z })
    }

    /// Fails only on group mismatches, a proof that does not hold yields `Ok(false)`.
    pub fn verify(&self, public_key: &GqElement, aux: &[Hashable]) -> Result<bool> {
        let group = public_key.group();
        ensure_order("schnorr proof challenge", group, self.e.group())?;
        ensure_order("schnorr proof response", group, self.z.group())?;

        // c' = g^z * y^-e
        let commitment = group
            .generator()
            .exponentiate(&self.z)
            .multiply(&public_key.exponentiate(&self.e.negate()));
        let e = Self::challenge(group, public_key, &commitment, aux);

        Ok(e == self.e)
    }

    /// Verifies one proof per public key element.
    pub fn verify_all(
        proofs: &[SchnorrProof],
        public_keys: &[GqElement],
        group: &GqGroup,
        aux: &[Hashable],
    ) -> Result<bool> {
        ensure_size("schnorr proofs", public_keys.len(), proofs.len())?;
        for key in public_keys.iter() {
            ensure_group("schnorr public key", group, key.group())?;
        }
        for (proof, key) in proofs.iter().zip(public_keys.iter()) {
            if !proof.verify(key, aux)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn challenge(
        group: &GqGroup,
        public_key: &GqElement,
        commitment: &GqElement,
        aux: &[Hashable],
    ) -> ZqElement {
        recursive_hash_to_zq(
            &group.exponent_group(),
            &[
                group_hashable(group),
                public_key.into(),
                commitment.into(),
                aux_hashable(aux),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use crate::test_utils::{large_group, small_group};

    use super::*;

    #[test]
    fn generate_and_verify_proof() {
        let group = large_group();
        let zq = group.exponent_group();
        let mut rng = ChaCha20Rng::seed_from_u64(11);

        let secret_key = ZqElement::random(&zq, &mut rng);
        let public_key = group.generator().exponentiate(&secret_key);
        let other_public_key = group
            .generator()
            .exponentiate(&ZqElement::random(&zq, &mut rng));
        let aux = vec![Hashable::from("0AD226BDFBE84A32BC8808234D83E7B4"), Hashable::from("GenKeysCCR")];

        let proof = SchnorrProof::generate(&secret_key, &public_key, &aux, &mut rng).unwrap();
        assert!(proof.verify(&public_key, &aux).unwrap());
        assert!(!proof.verify(&other_public_key, &aux).unwrap());
        assert!(!proof.verify(&public_key, &aux[..1]).unwrap());
    }

    #[test]
    fn tampered_response_fails() {
        let group = large_group();
        let zq = group.exponent_group();
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let secret_key = ZqElement::random(&zq, &mut rng);
        let public_key = group.generator().exponentiate(&secret_key);

        let mut proof = SchnorrProof::generate(&secret_key, &public_key, &[], &mut rng).unwrap();
        proof.z = proof.z.add(&ZqElement::reduce(&BigInt::from(1), &zq));
        assert!(!proof.verify(&public_key, &[]).unwrap());
    }

    #[test]
    fn wrong_group_is_structural() {
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let large = large_group();
        let small = small_group();
        let secret_key = ZqElement::random(&large.exponent_group(), &mut rng);
        let public_key = large.generator().exponentiate(&secret_key);
        let proof = SchnorrProof::generate(&secret_key, &public_key, &[], &mut rng).unwrap();

        let err = proof.verify(&small.generator(), &[]).unwrap_err();
        assert!(err.is_structural());
        assert!(SchnorrProof::verify_all(&[proof.clone()], &[], &large, &[]).is_err());

        let mut mixed = proof;
        mixed.z = ZqElement::random(&small.exponent_group(), &mut rng);
        assert!(mixed.verify(&public_key, &[]).unwrap_err().is_structural());
    }
}
