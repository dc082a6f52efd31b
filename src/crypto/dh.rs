//! Diffie-Hellman key agreement for the DH-SHA1 association session type.
//!
//! The default modulus/generator pair is the 1024-bit MODP group from
//! RFC 2631, section 2.1, with generator 2, the same default used by
//! essentially every OpenID 1.1 consumer implementation.

use num_bigint::BigUint;
use num_traits::One;

use super::random_bytes;

/// The default 1024-bit DH modulus (RFC 2631, section 2.1).
pub fn default_modulus() -> BigUint {
    BigUint::parse_bytes(
        b"155172898181473697471232257763715539915724801966915404479707795314057629378541917580651227423698188993727816152646631438561595825688188889951272158842675419950341258706556549803580104870537681476726513255747040765857479291291572334510643245094715007229621094194349783925984760375594985848253359305585439638443",
        10,
    )
    .expect("default DH modulus is a valid decimal integer")
}

/// The default DH generator (`2`).
pub fn default_generator() -> BigUint {
    BigUint::from(2u32)
}

/// One side of a Diffie-Hellman key exchange: a private exponent and the
/// corresponding public value, over a chosen modulus/generator pair.
#[derive(Clone)]
pub struct DiffieHellman {
    modulus: BigUint,
    generator: BigUint,
    private: BigUint,
    public: BigUint,
}

impl DiffieHellman {
    /// Generates a fresh key pair over the given modulus and generator,
    /// choosing a private exponent `x` uniformly from `[1, p-2]`.
    pub fn new(modulus: BigUint, generator: BigUint) -> Self {
        let upper = &modulus - BigUint::one() - BigUint::one(); // p - 2
        let private = random_below(&upper) + BigUint::one();
        let public = generator.modpow(&private, &modulus);
        Self {
            modulus,
            generator,
            private,
            public,
        }
    }

    /// Generates a fresh key pair over the default RFC 2631 modulus/generator.
    pub fn with_defaults() -> Self {
        Self::new(default_modulus(), default_generator())
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    /// This side's public value, `g^x mod p`.
    pub fn public(&self) -> &BigUint {
        &self.public
    }

    /// Derives the shared secret `Y^x mod p` from the other party's public value.
    pub fn shared_secret(&self, other_public: &BigUint) -> BigUint {
        other_public.modpow(&self.private, &self.modulus)
    }
}

/// Draws a value uniformly in `[0, bound)` from this crate's own random byte
/// source, rather than pulling in `num-bigint`'s `rand` feature (which pins
/// its own `rand` version independent of the one this crate depends on).
/// Eight extra bytes of entropy beyond `bound`'s byte length keep the modular
/// reduction's bias negligible.
fn random_below(bound: &BigUint) -> BigUint {
    let byte_len = bound.to_bytes_be().len() + 8;
    let candidate = BigUint::from_bytes_be(&random_bytes(byte_len));
    candidate % bound
}
