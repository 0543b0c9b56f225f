//! Pointcheval-Sanders signatures over BN254.
//!
//! A key for `n` messages is `(x, y_1, .., y_n, y_h)`; its public part is
//! `[X, Y_1, .., Y_n, Y_h]` in G2 with `X = Q·x`, `Y_i = Q·y_i`. The last
//! component signs `h = H(m_1, .., m_n)`. A signature is `(R, S)` with
//! `S = R·(x + Σ y_i m_i + y_h h)` and is re-randomized by raising both
//! components to a fresh scalar.

use ark_bn254::{Bn254, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, Group, VariableBaseMSM};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{UniformRand, Zero};
use rand::{CryptoRng, RngCore};
use zeroize::ZeroizeOnDrop;

use crate::errors::ProofError;
use crate::util;

#[derive(Clone, Copy, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Signature {
    pub r: G1Affine,
    pub s: G1Affine,
}

impl Signature {
    /// Returns an unlinkable signature on the same messages.
    pub fn randomize<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Signature {
        let t = Fr::rand(rng);
        Signature {
            r: (self.r * t).into_affine(),
            s: (self.s * t).into_affine(),
        }
    }
}

/// Public key `[X, Y_1, .., Y_n, Y_h]`.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct PublicKey {
    pub elements: Vec<G2Affine>,
}

impl PublicKey {
    /// Number of messages this key signs, excluding the hash.
    pub fn message_len(&self) -> usize {
        self.elements.len().saturating_sub(2)
    }

    pub fn x(&self) -> &G2Affine {
        &self.elements[0]
    }

    /// `Y_{i+1}` for message `i`.
    pub fn y(&self, i: usize) -> &G2Affine {
        &self.elements[i + 1]
    }

    pub fn y_hash(&self) -> &G2Affine {
        &self.elements[self.elements.len() - 1]
    }

    fn check(&self) -> Result<(), ProofError> {
        if self.elements.len() < 2 {
            return Err(ProofError::format("public key needs at least two elements"));
        }
        Ok(())
    }
}

#[derive(ZeroizeOnDrop)]
struct SecretKey {
    x: Fr,
    y: Vec<Fr>,
}

pub struct Signer {
    sk: SecretKey,
    pub pk: PublicKey,
    pub q: G2Affine,
}

impl Signer {
    pub fn keygen<R: RngCore + CryptoRng>(message_len: usize, q: &G2Affine, rng: &mut R) -> Self {
        let x = Fr::rand(rng);
        let y: Vec<Fr> = (0..=message_len).map(|_| Fr::rand(rng)).collect();

        let mut elements = Vec::with_capacity(message_len + 2);
        elements.push(*q * x);
        elements.extend(y.iter().map(|y_i| *q * y_i));

        Signer {
            sk: SecretKey { x, y },
            pk: PublicKey {
                elements: G2Projective::normalize_batch(&elements),
            },
            q: *q,
        }
    }

    pub fn sign<R: RngCore + CryptoRng>(
        &self,
        messages: &[Fr],
        rng: &mut R,
    ) -> Result<Signature, ProofError> {
        if messages.len() + 1 != self.sk.y.len() {
            return Err(ProofError::Format(format!(
                "key signs {} messages, got {}",
                self.sk.y.len() - 1,
                messages.len()
            )));
        }
        let h = message_hash(messages);
        let exponent = messages
            .iter()
            .chain(Some(&h))
            .zip(&self.sk.y)
            .fold(self.sk.x, |acc, (m, y)| acc + *m * y);

        let mut r = G1Projective::rand(rng);
        while r.is_zero() {
            r = G1Projective::rand(rng);
        }
        Ok(Signature {
            r: r.into_affine(),
            s: (r * exponent).into_affine(),
        })
    }

    pub fn verifier(&self) -> Verifier {
        Verifier {
            pk: self.pk.clone(),
            q: self.q,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Verifier {
    pub pk: PublicKey,
    pub q: G2Affine,
}

impl Verifier {
    pub fn verify(&self, messages: &[Fr], signature: &Signature) -> Result<(), ProofError> {
        self.pk.check()?;
        if messages.len() != self.pk.message_len() {
            return Err(ProofError::format("message count does not match public key"));
        }
        if signature.r.is_zero() {
            return Err(ProofError::VerificationError("degenerate signature"));
        }
        let mut exponents = messages.to_vec();
        exponents.push(message_hash(messages));

        let t = self.pk.x().into_group()
            + G2Projective::msm_unchecked(&self.pk.elements[1..], &exponents);
        if Bn254::pairing(signature.r, t.into_affine()) != Bn254::pairing(signature.s, self.q) {
            return Err(ProofError::VerificationError("invalid PS signature"));
        }
        Ok(())
    }
}

/// The scalar signed under `Y_h`.
pub fn message_hash(messages: &[Fr]) -> Fr {
    util::hash_serializable(messages)
}

/// The default second pairing base.
pub fn default_q() -> G2Affine {
    G2Projective::generator().into_affine()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let mut rng = rand::thread_rng();
        let signer = Signer::keygen(3, &default_q(), &mut rng);
        let messages = vec![Fr::from(1u64), Fr::from(2u64), Fr::from(3u64)];
        let signature = signer.sign(&messages, &mut rng).unwrap();

        let verifier = signer.verifier();
        assert!(verifier.verify(&messages, &signature).is_ok());
        assert!(verifier
            .verify(&messages, &signature.randomize(&mut rng))
            .is_ok());

        let forged = vec![Fr::from(1u64), Fr::from(2u64), Fr::from(4u64)];
        assert!(verifier.verify(&forged, &signature).is_err());
    }

    #[test]
    fn randomized_signatures_are_unlinkable_values() {
        let mut rng = rand::thread_rng();
        let signer = Signer::keygen(1, &default_q(), &mut rng);
        let signature = signer.sign(&[Fr::from(5u64)], &mut rng).unwrap();
        let randomized = signature.randomize(&mut rng);
        assert_ne!(signature.r, randomized.r);
        assert_ne!(signature.s, randomized.s);
    }

    #[test]
    fn rejects_wrong_lengths_and_identity() {
        let mut rng = rand::thread_rng();
        let signer = Signer::keygen(2, &default_q(), &mut rng);
        assert!(matches!(
            signer.sign(&[Fr::from(1u64)], &mut rng),
            Err(ProofError::Format(_))
        ));

        let degenerate = Signature {
            r: G1Affine::zero(),
            s: G1Affine::zero(),
        };
        assert!(signer
            .verifier()
            .verify(&[Fr::from(1u64), Fr::from(2u64)], &degenerate)
            .is_err());
    }
}
