//! Finite-field Diffie-Hellman group parameters.
//!
//! Groups are safe-prime groups: `p = 2q + 1` with `q` prime, and the
//! generator `g` generates the subgroup of order `q`. Parameters are plain
//! values handed to the handshake engine, so tests can run against small
//! groups and deployments can pin a different well-known group.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::error::{CryptoError, Result};

/// RFC 3526, 2048-bit MODP group 14.
const MODP14_PRIME_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

/// RFC 2409, 1024-bit Oakley group 2.
const OAKLEY2_PRIME_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381",
    "FFFFFFFFFFFFFFFF",
);

/// Witness bases for the Miller-Rabin check on custom groups.
const SMALL_PRIMES: [u32; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Immutable DH group: prime modulus, generator and subgroup order.
#[derive(Clone, PartialEq, Eq)]
pub struct GroupParams {
    name: &'static str,
    p: BigUint,
    g: BigUint,
    q: BigUint,
    byte_len: usize,
}

impl GroupParams {
    /// The 2048-bit MODP group 14 with generator 2. This is the default group.
    pub fn modp14() -> Self {
        Self::well_known("modp14", MODP14_PRIME_HEX)
    }

    /// The 1024-bit Oakley group 2 with generator 2.
    ///
    /// Only for talking to peers that were deployed with this prime.
    pub fn oakley2() -> Self {
        Self::well_known("oakley2", OAKLEY2_PRIME_HEX)
    }

    /// Build a custom group, validating that `p` is a safe prime and that
    /// `g` generates its prime-order subgroup.
    pub fn new(p: BigUint, g: BigUint) -> Result<Self> {
        let one = BigUint::one();
        let two = BigUint::from(2u32);

        if p < BigUint::from(5u32) || (&p % &two).is_zero() {
            return Err(CryptoError::parameter("modulus must be an odd prime >= 5"));
        }
        if g < two || g > &p - &two {
            return Err(CryptoError::parameter("generator out of range"));
        }
        if !is_probable_prime(&p) {
            return Err(CryptoError::parameter("modulus is composite"));
        }

        let q = (&p - &one) >> 1usize;
        if !is_probable_prime(&q) {
            return Err(CryptoError::parameter("modulus is not a safe prime"));
        }
        if g.modpow(&q, &p) != one {
            return Err(CryptoError::parameter(
                "generator does not generate the prime-order subgroup",
            ));
        }

        Ok(Self::assemble("custom", p, g))
    }

    fn well_known(name: &'static str, prime_hex: &str) -> Self {
        let p = BigUint::parse_bytes(prime_hex.as_bytes(), 16)
            .expect("well-known group prime is valid hex");
        Self::assemble(name, p, BigUint::from(2u32))
    }

    fn assemble(name: &'static str, p: BigUint, g: BigUint) -> Self {
        let q = (&p - BigUint::one()) >> 1usize;
        let byte_len = ((p.bits() + 7) / 8) as usize;
        Self {
            name,
            p,
            g,
            q,
            byte_len,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Prime modulus `p`.
    pub fn prime(&self) -> &BigUint {
        &self.p
    }

    /// Generator `g`.
    pub fn generator(&self) -> &BigUint {
        &self.g
    }

    /// Subgroup order `q = (p - 1) / 2`.
    pub fn order(&self) -> &BigUint {
        &self.q
    }

    /// Size of the modulus in bits.
    pub fn bits(&self) -> u64 {
        self.p.bits()
    }

    /// Width of `p` in bytes; shared secrets are padded to this length.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Whether `y` is an element of the order-`q` subgroup other than the
    /// identity. Rejects 0, 1, p-1 and anything >= p.
    pub fn is_valid_public(&self, y: &BigUint) -> bool {
        let one = BigUint::one();
        if *y <= one || *y >= &self.p - &one {
            return false;
        }
        y.modpow(&self.q, &self.p) == one
    }
}

impl Default for GroupParams {
    fn default() -> Self {
        Self::modp14()
    }
}

impl FromStr for GroupParams {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modp14" | "modp-14" | "modp2048" => Ok(Self::modp14()),
            "oakley2" | "oakley-2" | "modp1024" => Ok(Self::oakley2()),
            other => Err(CryptoError::parameter(format!("unknown group: {other}"))),
        }
    }
}

impl fmt::Debug for GroupParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupParams")
            .field("name", &self.name)
            .field("bits", &self.bits())
            .field("g", &self.g)
            .finish()
    }
}

/// Miller-Rabin with fixed small-prime witnesses, after trial division.
fn is_probable_prime(n: &BigUint) -> bool {
    let one = BigUint::one();
    let two = BigUint::from(2u32);

    if *n < two {
        return false;
    }
    for &sp in SMALL_PRIMES.iter() {
        let sp = BigUint::from(sp);
        if *n == sp {
            return true;
        }
        if (n % &sp).is_zero() {
            return false;
        }
    }

    let n_minus_one = n - &one;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    'witness: for &a in SMALL_PRIMES.iter() {
        let mut x = BigUint::from(a).modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sizes() {
        let modp14 = GroupParams::modp14();
        assert_eq!(modp14.bits(), 2048);
        assert_eq!(modp14.byte_len(), 256);
        assert_eq!(modp14.generator(), &BigUint::from(2u32));

        let oakley2 = GroupParams::oakley2();
        assert_eq!(oakley2.bits(), 1024);
        assert_eq!(oakley2.byte_len(), 128);
    }

    #[test]
    fn test_builtin_groups_validate() {
        for group in [GroupParams::oakley2(), GroupParams::modp14()] {
            let checked =
                GroupParams::new(group.prime().clone(), group.generator().clone()).unwrap();
            assert_eq!(checked.order(), group.order());
        }
    }

    #[test]
    fn test_small_safe_prime_group() {
        let group = GroupParams::new(BigUint::from(2039u32), BigUint::from(2u32)).unwrap();
        assert_eq!(group.order(), &BigUint::from(1019u32));
        assert_eq!(group.name(), "custom");
    }

    #[test]
    fn test_rejects_composite_modulus() {
        // 2047 = 23 * 89
        let err = GroupParams::new(BigUint::from(2047u32), BigUint::from(2u32)).unwrap_err();
        assert!(matches!(err, CryptoError::Parameter(_)));

        // Carmichael number 561 = 3 * 11 * 17
        assert!(GroupParams::new(BigUint::from(561u32), BigUint::from(2u32)).is_err());
    }

    #[test]
    fn test_rejects_non_safe_prime() {
        // 2371 is prime but 1185 is not.
        assert!(GroupParams::new(BigUint::from(2371u32), BigUint::from(2u32)).is_err());
    }

    #[test]
    fn test_rejects_generator_out_of_range() {
        let p = BigUint::from(2039u32);
        assert!(GroupParams::new(p.clone(), BigUint::from(1u32)).is_err());
        assert!(GroupParams::new(p.clone(), BigUint::from(2038u32)).is_err());
        assert!(GroupParams::new(p, BigUint::from(5000u32)).is_err());
    }

    #[test]
    fn test_rejects_generator_of_full_group() {
        // 7 is a primitive root mod 23, so it has order 22, not 11.
        assert!(GroupParams::new(BigUint::from(23u32), BigUint::from(7u32)).is_err());
        assert!(GroupParams::new(BigUint::from(23u32), BigUint::from(2u32)).is_ok());
    }

    #[test]
    fn test_rejects_even_modulus() {
        assert!(GroupParams::new(BigUint::from(24u32), BigUint::from(2u32)).is_err());
    }

    #[test]
    fn test_public_value_validation() {
        let group = GroupParams::modp14();
        let p = group.prime().clone();
        let one = BigUint::one();

        assert!(!group.is_valid_public(&BigUint::zero()));
        assert!(!group.is_valid_public(&one));
        assert!(!group.is_valid_public(&(&p - &one)));
        assert!(!group.is_valid_public(&p));
        assert!(!group.is_valid_public(&(&p + &one)));

        assert!(group.is_valid_public(&BigUint::from(2u32)));
        assert!(group.is_valid_public(&BigUint::from(4u32)));
    }

    #[test]
    fn test_rejects_element_outside_subgroup() {
        let group = GroupParams::new(BigUint::from(23u32), BigUint::from(2u32)).unwrap();
        // 5 is a quadratic non-residue mod 23: order 22.
        assert!(!group.is_valid_public(&BigUint::from(5u32)));
        // 4 = 2^2 is in the order-11 subgroup.
        assert!(group.is_valid_public(&BigUint::from(4u32)));
    }

    #[test]
    fn test_group_from_str() {
        assert_eq!("modp14".parse::<GroupParams>().unwrap(), GroupParams::modp14());
        assert_eq!("OAKLEY2".parse::<GroupParams>().unwrap(), GroupParams::oakley2());
        assert!("ffdhe2048".parse::<GroupParams>().is_err());
    }

    #[test]
    fn test_miller_rabin() {
        for prime in [2u32, 3, 5, 37, 41, 1019, 2039, 7919] {
            assert!(is_probable_prime(&BigUint::from(prime)), "{prime}");
        }
        for composite in [0u32, 1, 4, 561, 1105, 2047, 7917] {
            assert!(!is_probable_prime(&BigUint::from(composite)), "{composite}");
        }
    }
}
