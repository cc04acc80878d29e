use rand_core::{CryptoRng, RngCore};

use crate::error::{ensure_non_empty, ensure_size, Result, StructuralError};
use crate::group::{ensure_group, ensure_order, GqElement, GqGroup, ZqElement, ZqGroup};

/// Multi-recipient ciphertext: one `gamma = g^r` shared by all `phi_i = pk_i^r * m_i`.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Cipher {
    gamma: GqElement,
    phis: Vec<GqElement>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ElGamalPublicKey {
    elements: Vec<GqElement>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ElGamalPrivateKey {
    elements: Vec<ZqElement>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ElGamalKeyPair {
    pub public_key: ElGamalPublicKey,
    pub private_key: ElGamalPrivateKey,
}

impl Cipher {
    pub fn new(gamma: GqElement, phis: Vec<GqElement>) -> Result<Self> {
        ensure_non_empty("ciphertext phis", &phis)?;
        for phi in phis.iter() {
            ensure_group("ciphertext phi", gamma.group(), phi.group())?;
        }
        Ok(Cipher { gamma, phis })
    }

    pub fn gamma(&self) -> &GqElement {
        &self.gamma
    }

    pub fn phis(&self) -> &[GqElement] {
        &self.phis
    }

    pub fn element_size(&self) -> usize {
        self.phis.len()
    }

    pub fn group(&self) -> &GqGroup {
        self.gamma.group()
    }

    /// `(gamma, phi_0, .., phi_l-1)`, the order used by the exponentiation proofs.
    pub fn to_elements(&self) -> Vec<GqElement> {
        let mut elements = Vec::with_capacity(self.phis.len() + 1);
        elements.push(self.gamma.clone());
        elements.extend(self.phis.iter().cloned());
        elements
    }
}

impl ElGamalPublicKey {
    pub fn new(elements: Vec<GqElement>) -> Result<Self> {
        ensure_non_empty("public key", &elements)?;
        let group = elements[0].group().clone();
        for element in elements.iter() {
            ensure_group("public key element", &group, element.group())?;
        }
        Ok(ElGamalPublicKey { elements })
    }

    pub fn elements(&self) -> &[GqElement] {
        &self.elements
    }

    pub fn get(&self, index: usize) -> &GqElement {
        &self.elements[index]
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }

    pub fn group(&self) -> &GqGroup {
        self.elements[0].group()
    }

    /// Componentwise product of the given keys.
    pub fn combine_multiple_vec(keys: &[ElGamalPublicKey]) -> Result<Self> {
        ensure_non_empty("public keys to combine", keys)?;
        let group = keys[0].group().clone();
        let size = keys[0].size();
        for key in keys.iter() {
            ensure_group("public keys to combine", &group, key.group())?;
            ensure_size("public keys to combine", size, key.size())?;
        }

        let elements = (0..size)
            .map(|i| {
                let column: Vec<GqElement> = keys.iter().map(|key| key.get(i).clone()).collect();
                GqElement::product(&column, &group)
            })
            .collect();

        Ok(ElGamalPublicKey { elements })
    }
}

impl ElGamalPrivateKey {
    pub fn new(elements: Vec<ZqElement>) -> Result<Self> {
        ensure_non_empty("private key", &elements)?;
        let group = elements[0].group().clone();
        for element in elements.iter() {
            if element.group() != &group {
                return Err(StructuralError::GroupOrderMismatch {
                    what: "private key element",
                }
                .into());
            }
        }
        Ok(ElGamalPrivateKey { elements })
    }

    pub fn elements(&self) -> &[ZqElement] {
        &self.elements
    }

    pub fn get(&self, index: usize) -> &ZqElement {
        &self.elements[index]
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }

    pub fn group(&self) -> &ZqGroup {
        self.elements[0].group()
    }

    pub fn extract_public_key(&self, group: &GqGroup) -> Result<ElGamalPublicKey> {
        ensure_order("private key", group, self.group())?;
        let generator = group.generator();
        Ok(ElGamalPublicKey {
            elements: self
                .elements
                .iter()
                .map(|x| generator.exponentiate(x))
                .collect(),
        })
    }
}

impl ElGamalKeyPair {
    pub fn generate<R: RngCore + CryptoRng>(group: &GqGroup, size: usize, rng: &mut R) -> Result<Self> {
        if size == 0 {
            return Err(StructuralError::Empty { what: "key pair" }.into());
        }
        let zq = group.exponent_group();
        let private_key = ElGamalPrivateKey {
            elements: (0..size).map(|_| ZqElement::random(&zq, rng)).collect(),
        };
        let public_key = private_key.extract_public_key(group)?;
        Ok(ElGamalKeyPair {
            public_key,
            private_key,
        })
    }

    pub fn from_private_key(private_key: ElGamalPrivateKey, group: &GqGroup) -> Result<Self> {
        let public_key = private_key.extract_public_key(group)?;
        Ok(ElGamalKeyPair {
            public_key,
            private_key,
        })
    }
}

pub struct ElGamal;

/// Multi-recipient ElGamal encryption scheme
impl ElGamal {
    /// The randomness is injected so encryption stays a pure function of its arguments.
    pub fn encrypt(
        messages: &[GqElement],
        randomness: &ZqElement,
        public_key: &ElGamalPublicKey,
    ) -> Result<Cipher> {
        ensure_non_empty("messages", messages)?;
        let group = public_key.group();
        if messages.len() > public_key.size() {
            return Err(StructuralError::OutOfRange {
                what: "number of messages",
                min: 1,
                max: public_key.size(),
                actual: messages.len(),
            }
            .into());
        }
        for message in messages.iter() {
            ensure_group("message", group, message.group())?;
        }
        ensure_order("encryption randomness", group, randomness.group())?;

        let gamma = group.generator().exponentiate(randomness);
        let phis = messages
            .iter()
            .zip(public_key.elements())
            .map(|(message, pk)| pk.exponentiate(randomness).multiply(message))
            .collect();

        Ok(Cipher { gamma, phis })
    }

    /// Decrypts with the first `l` keys of the private key, `l` being the ciphertext's element size.
    pub fn decrypt(cipher: &Cipher, private_key: &ElGamalPrivateKey) -> Result<Vec<GqElement>> {
        ensure_order("private key", cipher.group(), private_key.group())?;
        if cipher.element_size() > private_key.size() {
            return Err(StructuralError::OutOfRange {
                what: "ciphertext element size",
                min: 1,
                max: private_key.size(),
                actual: cipher.element_size(),
            }
            .into());
        }

        Ok(cipher
            .phis
            .iter()
            .zip(private_key.elements())
            .map(|(phi, sk)| phi.multiply(&cipher.gamma.exponentiate(&sk.negate())))
            .collect())
    }

    pub fn multiply(cipher1: &Cipher, cipher2: &Cipher) -> Result<Cipher> {
        ensure_group("ciphertexts to multiply", cipher1.group(), cipher2.group())?;
        ensure_size(
            "ciphertext element size",
            cipher1.element_size(),
            cipher2.element_size(),
        )?;
        Ok(Cipher {
            gamma: cipher1.gamma.multiply(&cipher2.gamma),
            phis: cipher1
                .phis
                .iter()
                .zip(cipher2.phis.iter())
                .map(|(a, b)| a.multiply(b))
                .collect(),
        })
    }

    /// Componentwise product of all ciphertexts.
    pub fn multiply_many(ciphers: &[Cipher]) -> Result<Cipher> {
        ensure_non_empty("ciphertexts to multiply", ciphers)?;
        let mut product = ciphers[0].clone();
        for cipher in ciphers.iter().skip(1) {
            product = Self::multiply(&product, cipher)?;
        }
        Ok(product)
    }

    pub fn exponentiate(cipher: &Cipher, exponent: &ZqElement) -> Result<Cipher> {
        ensure_order("exponent", cipher.group(), exponent.group())?;
        Ok(Cipher {
            gamma: cipher.gamma.exponentiate(exponent),
            phis: cipher.phis.iter().map(|phi| phi.exponentiate(exponent)).collect(),
        })
    }
}
