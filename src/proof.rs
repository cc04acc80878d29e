//! Non-interactive (Fiat-Shamir) zero-knowledge proofs over `Gq`.
//!
//! Challenges are [`crate::hash::recursive_hash_to_zq`] of the group parameters, the statement,
//! the commitment and caller supplied auxiliary information which binds the proof
//! to its election and algorithm.

use crate::group::GqGroup;
use crate::hash::Hashable;

pub mod exponentiation;
pub mod schnorr;

pub use exponentiation::ExponentiationProof;
pub use schnorr::SchnorrProof;

/// `(p, q, g)` as hash input.
pub(crate) fn group_hashable(group: &GqGroup) -> Hashable {
    Hashable::List(vec![
        Hashable::Integer(group.p().magnitude().clone()),
        Hashable::Integer(group.q().magnitude().clone()),
        Hashable::Integer(group.g().magnitude().clone()),
    ])
}

/// Auxiliary information as a hashable list; an empty list when none is given.
pub(crate) fn aux_hashable(aux: &[Hashable]) -> Hashable {
    Hashable::List(aux.to_vec())
}
