use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand_core::RngCore;

use crate::group::ZqGroup;

/// Small primes used for trial division and as Miller-Rabin witnesses.
const SMALL_PRIMES: [u32; 25] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Odd primes below this bound sieve safe-prime candidates.
const SIEVE_BOUND: u32 = 1 << 14;

/// Number of bytes needed to represent `value`.
pub fn byte_length(value: &BigInt) -> usize {
    ((value.bits() as usize) + 7) / 8
}

/// One Miller-Rabin round of `n` (odd, greater than `witness`) to base `witness`.
fn passes_round(n: &BigInt, witness: u32) -> bool {
    let two = BigInt::from(2);
    let n_minus_one: BigInt = n - 1;
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while d.is_even() {
        d >>= 1;
        s += 1;
    }

    let mut x = BigInt::from(witness).modpow(&d, n);
    if x.is_one() || x == n_minus_one {
        return true;
    }
    for _ in 1..s {
        x = x.modpow(&two, n);
        if x == n_minus_one {
            return true;
        }
    }
    false
}

/// Miller-Rabin with the first 25 primes as witnesses.
///
/// Deterministic below 3.3 * 10^24, probabilistic with error below 4^-25 above.
pub fn is_probable_prime(n: &BigInt) -> bool {
    if n < &BigInt::from(2) {
        return false;
    }
    for &small in SMALL_PRIMES.iter() {
        let small = BigInt::from(small);
        if n == &small {
            return true;
        }
        if (n % &small).is_zero() {
            return false;
        }
    }
    SMALL_PRIMES.iter().all(|&witness| passes_round(n, witness))
}

/// Odd primes below `bound`, sieve of Eratosthenes.
fn odd_primes_below(bound: u32) -> Vec<u32> {
    let bound = bound as usize;
    let mut composite = vec![false; bound];
    let mut primes = Vec::new();
    for i in 3..bound {
        if composite[i] || i % 2 == 0 {
            continue;
        }
        primes.push(i as u32);
        let mut multiple = i * i;
        while multiple < bound {
            composite[multiple] = true;
            multiple += i;
        }
    }
    primes
}

fn residue(n: &BigInt, modulus: u32) -> u32 {
    let modulus = u64::from(modulus);
    let (_, bytes) = n.to_bytes_be();
    bytes
        .iter()
        .fold(0u64, |r, &b| (r * 256 + u64::from(b)) % modulus) as u32
}

/// The first `q` from the odd `start` up, stepping by 2, with `q` and `p = 2q + 1` both prime.
/// Returns `(q, p)`, or `None` once `q` outgrows the bit length of `start`.
///
/// Candidates are sieved on `q` and `p` with residues kept up to date per step, then screened
/// with one Miller-Rabin round each before the full test.
pub fn next_safe_prime(start: &BigInt) -> Option<(BigInt, BigInt)> {
    let bits = start.bits();
    let sieve: Vec<u32> = odd_primes_below(SIEVE_BOUND)
        .into_iter()
        .filter(|&prime| &BigInt::from(prime) < start)
        .collect();
    let mut residues: Vec<u32> = sieve.iter().map(|&prime| residue(start, prime)).collect();

    let mut q = start.clone();
    while q.bits() == bits {
        let sieved = sieve
            .iter()
            .zip(residues.iter())
            .any(|(&prime, &r)| r == 0 || (2 * r + 1) % prime == 0);
        if !sieved {
            let p: BigInt = &q * 2 + 1;
            if passes_round(&q, 2)
                && passes_round(&p, 2)
                && is_probable_prime(&q)
                && is_probable_prime(&p)
            {
                return Some((q, p));
            }
        }
        q += 2;
        for (r, &prime) in residues.iter_mut().zip(sieve.iter()) {
            *r = (*r + 2) % prime;
        }
    }
    None
}

/// Draws a value uniformly-enough from `[0, q)` of `group`.
///
/// 64 extra bits are sampled before reduction so the bias is negligible.
pub fn random_below<R: RngCore>(group: &ZqGroup, rng: &mut R) -> BigInt {
    let bound = group.q();
    let mut bytes = vec![0u8; byte_length(bound) + 8];
    rng.fill_bytes(&mut bytes);
    BigInt::from_bytes_be(Sign::Plus, &bytes) % bound
}

#[cfg(test)]
mod tests {
    use num_traits::Num;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn primality() {
        let primes = [2u32, 3, 5, 97, 101, 2753, 7919];
        for p in primes.iter() {
            assert!(is_probable_prime(&BigInt::from(*p)), "{}", p);
        }
        let composites = [0u32, 1, 4, 9, 561, 2047, 1_373_653, 25_326_001];
        for c in composites.iter() {
            assert!(!is_probable_prime(&BigInt::from(*c)), "{}", c);
        }

        let safe_prime =
            BigInt::from_str_radix("d09a3afe53fb2d654a2edb41e864a607", 16).unwrap();
        assert!(is_probable_prime(&safe_prime));
        assert!(is_probable_prime(&((safe_prime.clone() - 1) / 2)));
        assert!(!is_probable_prime(&(safe_prime + 2)));
    }

    #[test]
    fn random_below_bound() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let group = ZqGroup::new(BigInt::from(1000)).unwrap();
        for _ in 0..200 {
            let value = random_below(&group, &mut rng);
            assert!(group.is_member(&value));
        }
    }

    #[test]
    fn safe_prime_search() {
        // 101..111 all fail on q or 2q + 1
        assert_eq!(
            next_safe_prime(&BigInt::from(101)),
            Some((BigInt::from(113), BigInt::from(227)))
        );
        // nothing left below 128
        assert_eq!(next_safe_prime(&BigInt::from(115)), None);

        let start = BigInt::from_str_radix("d09a3afe53fb2d654a2edb41e864a5", 16).unwrap();
        let (q, p) = next_safe_prime(&start).unwrap();
        assert!(q >= start);
        assert_eq!(q.bits(), start.bits());
        assert!(is_probable_prime(&q));
        assert_eq!(p, &q * 2 + 1);
        assert!(is_probable_prime(&p));
    }

    #[test]
    fn sieve() {
        let primes = odd_primes_below(50);
        assert_eq!(primes, vec![3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47]);
        assert_eq!(residue(&BigInt::from(1_000_003u32), 97), 1_000_003 % 97);
    }

    #[test]
    fn byte_lengths() {
        assert_eq!(byte_length(&BigInt::from(255)), 1);
        assert_eq!(byte_length(&BigInt::from(256)), 2);
    }
}
