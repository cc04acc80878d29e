use rand_core::{CryptoRng, RngCore};

use crate::error::{ensure_non_empty, ensure_size, Result, StructuralError};
use crate::group::{ensure_group, ensure_order, GqElement, GqGroup, ZqElement};
use crate::hash::{recursive_hash_to_zq, Hashable};
use crate::proof::{aux_hashable, group_hashable};

/// Proves that `y_i = g_i^x` for every base `g_i`, with a single secret exponent `x`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ExponentiationProof {
    pub e: ZqElement,
    pub z: ZqElement,
}

impl ExponentiationProof {
    pub fn new(e: ZqElement, z: ZqElement) -> Result<Self> {
        if e.group() != z.group() {
            return Err(StructuralError::GroupOrderMismatch {
                what: "exponentiation proof components",
            }
            .into());
        }
        Ok(ExponentiationProof { e, z })
    }

    pub fn generate<R: RngCore + CryptoRng>(
        bases: &[GqElement],
        exponent: &ZqElement,
        exponentiations: &[GqElement],
        aux: &[Hashable],
        rng: &mut R,
    ) -> Result<Self> {
        let group = check_statement(bases, exponentiations)?;
        ensure_order("exponent", &group, exponent.group())?;

        let b = ZqElement::random(exponent.group(), rng);
        let commitments: Vec<GqElement> = bases.iter().map(|base| base.exponentiate(&b)).collect();
        let e = challenge(&group, bases, exponentiations, &commitments, aux);
        let z = b.add(&e.multiply(exponent));

        Ok(ExponentiationProof { e, z })
    }

    /// Structural problems are errors, a proof that does not hold is `Ok(false)`.
    pub fn verify(
        &self,
        bases: &[GqElement],
        exponentiations: &[GqElement],
        aux: &[Hashable],
    ) -> Result<bool> {
        let group = check_statement(bases, exponentiations)?;
        ensure_order("exponentiation proof challenge", &group, self.e.group())?;
        ensure_order("exponentiation proof response", &group, self.z.group())?;

        let minus_e = self.e.negate();
        let commitments: Vec<GqElement> = bases
            .iter()
            .zip(exponentiations.iter())
            .map(|(base, y)| base.exponentiate(&self.z).multiply(&y.exponentiate(&minus_e)))
            .collect();
        let e = challenge(&group, bases, exponentiations, &commitments, aux);

        Ok(e == self.e)
    }
}

fn check_statement(bases: &[GqElement], exponentiations: &[GqElement]) -> Result<GqGroup> {
    ensure_non_empty("exponentiation bases", bases)?;
    ensure_size("exponentiations", bases.len(), exponentiations.len())?;
    let group = bases[0].group().clone();
    for element in bases.iter().chain(exponentiations.iter()) {
        ensure_group("exponentiation statement", &group, element.group())?;
    }
    Ok(group)
}

fn challenge(
    group: &GqGroup,
    bases: &[GqElement],
    exponentiations: &[GqElement],
    commitments: &[GqElement],
    aux: &[Hashable],
) -> ZqElement {
    let list = |elements: &[GqElement]| Hashable::List(elements.iter().map(Hashable::from).collect());
    recursive_hash_to_zq(
        &group.exponent_group(),
        &[
            group_hashable(group),
            list(bases),
            list(exponentiations),
            list(commitments),
            aux_hashable(aux),
        ],
    )
}
