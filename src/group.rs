use core::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use rand_core::{CryptoRng, RngCore};

use crate::error::{Result, StructuralError};
use crate::math::{is_probable_prime, random_below};

#[derive(Eq, PartialEq, Debug, Hash)]
struct GroupParameters {
    /// Modulus
    p: BigInt,

    /// Order of the subgroup, `p = 2q + 1`
    q: BigInt,

    /// Generator
    g: BigInt,
}

/// The subgroup of quadratic residues modulo a safe prime `p = 2q + 1`.
///
/// Cloning is cheap; the parameters are shared.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct GqGroup(Arc<GroupParameters>);

/// The exponent group of a [`GqGroup`], integers modulo `q`.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct ZqGroup(Arc<BigInt>);

impl GqGroup {
    pub fn new(p: BigInt, q: BigInt, g: BigInt) -> Result<Self> {
        if p != &q * 2 + 1 {
            return Err(StructuralError::InvalidValue {
                what: "group modulus p must equal 2q + 1",
            }
            .into());
        }
        if !is_probable_prime(&q) || !is_probable_prime(&p) {
            return Err(StructuralError::InvalidValue {
                what: "group modulus p and order q must be prime",
            }
            .into());
        }
        let group = GqGroup(Arc::new(GroupParameters { p, q, g }));
        if group.0.g.is_one() || !group.is_member(&group.0.g) {
            return Err(StructuralError::InvalidValue {
                what: "group generator must be a non-identity quadratic residue",
            }
            .into());
        }
        Ok(group)
    }

    /// Builds the group from a safe prime, deriving `q = (p - 1) / 2`.
    pub fn from_safe_prime(p: BigInt, g: BigInt) -> Result<Self> {
        let q: BigInt = (&p - 1) / 2;
        Self::new(p, q, g)
    }

    pub fn p(&self) -> &BigInt {
        &self.0.p
    }

    pub fn q(&self) -> &BigInt {
        &self.0.q
    }

    pub fn g(&self) -> &BigInt {
        &self.0.g
    }

    pub fn generator(&self) -> GqElement {
        GqElement {
            value: self.0.g.clone(),
            group: self.clone(),
        }
    }

    pub fn identity(&self) -> GqElement {
        GqElement {
            value: BigInt::one(),
            group: self.clone(),
        }
    }

    /// Determines whether the given value belongs to the group, i.e. `0 < x < p` and `x^q = 1 mod p`
    pub fn is_member(&self, value: &BigInt) -> bool {
        value.is_positive() && value < &self.0.p && value.modpow(&self.0.q, &self.0.p).is_one()
    }

    pub fn exponent_group(&self) -> ZqGroup {
        ZqGroup(Arc::new(self.0.q.clone()))
    }

    pub fn has_same_order_as(&self, other: &ZqGroup) -> bool {
        self.q() == other.q()
    }
}

impl ZqGroup {
    pub fn new(q: BigInt) -> Result<Self> {
        if !q.is_positive() {
            return Err(StructuralError::InvalidValue {
                what: "group order must be positive",
            }
            .into());
        }
        Ok(ZqGroup(Arc::new(q)))
    }

    pub fn q(&self) -> &BigInt {
        &self.0
    }

    pub fn is_member(&self, value: &BigInt) -> bool {
        !value.is_negative() && value < self.q()
    }
}

/// An element of `Gq`.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct GqElement {
    value: BigInt,
    group: GqGroup,
}

impl GqElement {
    pub fn new(value: BigInt, group: &GqGroup) -> Result<Self> {
        if !group.is_member(&value) {
            return Err(StructuralError::InvalidValue {
                what: "value is not a member of Gq",
            }
            .into());
        }
        Ok(GqElement {
            value,
            group: group.clone(),
        })
    }

    /// Squares `value` modulo `p`, which always lands in `Gq` for `0 < value < p`.
    pub fn from_square_root(value: &BigInt, group: &GqGroup) -> Result<Self> {
        if !value.is_positive() || value >= group.p() {
            return Err(StructuralError::InvalidValue {
                what: "square root must be in (0, p)",
            }
            .into());
        }
        Ok(GqElement {
            value: value.modpow(&BigInt::from(2), group.p()),
            group: group.clone(),
        })
    }

    pub fn value(&self) -> &BigInt {
        &self.value
    }

    pub fn group(&self) -> &GqGroup {
        &self.group
    }

    pub fn multiply(&self, other: &GqElement) -> GqElement {
        debug_assert_eq!(self.group, other.group);
        GqElement {
            value: &self.value * &other.value % self.group.p(),
            group: self.group.clone(),
        }
    }

    pub fn exponentiate(&self, exponent: &ZqElement) -> GqElement {
        debug_assert!(self.group.has_same_order_as(exponent.group()));
        GqElement {
            value: self.value.modpow(exponent.value(), self.group.p()),
            group: self.group.clone(),
        }
    }

    pub fn invert(&self) -> GqElement {
        // x^(p - 2) = x^-1 mod p
        let p = self.group.p();
        let value = self.value.modpow(&(p - 2), p);
        GqElement {
            value,
            group: self.group.clone(),
        }
    }

    /// Product of all elements; the identity for an empty slice.
    pub fn product(elements: &[GqElement], group: &GqGroup) -> GqElement {
        let mut value = BigInt::one();
        for element in elements.iter() {
            value = value * &element.value % group.p();
        }
        GqElement {
            value,
            group: group.clone(),
        }
    }
}

impl fmt::Display for GqElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value.to_str_radix(16))
    }
}

/// An element of `Zq`.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct ZqElement {
    value: BigInt,
    group: ZqGroup,
}

impl ZqElement {
    pub fn new(value: BigInt, group: &ZqGroup) -> Result<Self> {
        if !group.is_member(&value) {
            return Err(StructuralError::InvalidValue {
                what: "value is not a member of Zq",
            }
            .into());
        }
        Ok(ZqElement {
            value,
            group: group.clone(),
        })
    }

    /// Reduces an arbitrary integer modulo `q`.
    pub fn reduce(value: &BigInt, group: &ZqGroup) -> Self {
        let q = group.q();
        let mut value = value % q;
        if value.is_negative() {
            value += q;
        }
        ZqElement {
            value,
            group: group.clone(),
        }
    }

    pub fn random<R: RngCore + CryptoRng>(group: &ZqGroup, rng: &mut R) -> Self {
        ZqElement {
            value: random_below(group, rng),
            group: group.clone(),
        }
    }

    pub fn zero(group: &ZqGroup) -> Self {
        ZqElement {
            value: BigInt::zero(),
            group: group.clone(),
        }
    }

    pub fn value(&self) -> &BigInt {
        &self.value
    }

    pub fn group(&self) -> &ZqGroup {
        &self.group
    }

    pub fn add(&self, other: &ZqElement) -> ZqElement {
        debug_assert_eq!(self.group, other.group);
        ZqElement {
            value: (&self.value + &other.value) % self.group.q(),
            group: self.group.clone(),
        }
    }

    pub fn multiply(&self, other: &ZqElement) -> ZqElement {
        debug_assert_eq!(self.group, other.group);
        ZqElement {
            value: &self.value * &other.value % self.group.q(),
            group: self.group.clone(),
        }
    }

    pub fn negate(&self) -> ZqElement {
        Self::reduce(&(-&self.value), &self.group)
    }
}

impl fmt::Display for ZqElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value.to_str_radix(16))
    }
}

/// Fails with a group mismatch unless `actual` is `expected`.
pub(crate) fn ensure_group(what: &'static str, expected: &GqGroup, actual: &GqGroup) -> Result<()> {
    if expected != actual {
        return Err(StructuralError::GroupMismatch { what }.into());
    }
    Ok(())
}

/// Fails with an order mismatch unless the exponent group has the order of `expected`.
pub(crate) fn ensure_order(what: &'static str, expected: &GqGroup, actual: &ZqGroup) -> Result<()> {
    if !expected.has_same_order_as(actual) {
        return Err(StructuralError::GroupOrderMismatch { what }.into());
    }
    Ok(())
}
