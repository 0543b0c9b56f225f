//! Signing capability consumed by the action assemblers and the validator.

use ark_bn254::{Fr, G1Affine};
use ark_ec::{AffineRepr, CurveGroup};
use ark_serialize::CanonicalSerialize;
use ark_std::UniformRand;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use zeroize::ZeroizeOnDrop;
use zkat_proofs::sigma::SchnorrProof;

use crate::errors::{Error, Result};
use crate::util;

/// Opaque serialized identity.
pub type Identity = Vec<u8>;

pub trait Signer {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

pub trait Verifier {
    /// Fails with `AuthorizationDenied` when `signature` is not valid for `message`.
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()>;
}

/// Turns owner and issuer identities into signature verifiers.
pub trait IdentityDeserializer: Send + Sync {
    fn verifier(&self, identity: &[u8]) -> Result<Box<dyn Verifier>>;
}

/// Identities that are compressed Schnorr public keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchnorrIdentities;

impl IdentityDeserializer for SchnorrIdentities {
    fn verifier(&self, identity: &[u8]) -> Result<Box<dyn Verifier>> {
        Ok(Box::new(SchnorrVerifier::from_identity(identity)?))
    }
}

fn transcript(message: &[u8]) -> Transcript {
    let mut transcript = Transcript::new(b"zkat-schnorr-signature");
    transcript.append_message(b"msg", message);
    transcript
}

/// Schnorr signatures over BN254 G1; the identity is the compressed public key.
#[derive(ZeroizeOnDrop)]
pub struct SchnorrSigner {
    sk: Fr,
    #[zeroize(skip)]
    pk: G1Affine,
}

impl SchnorrSigner {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let sk = Fr::rand(rng);
        SchnorrSigner {
            sk,
            pk: (G1Affine::generator() * sk).into_affine(),
        }
    }

    pub fn identity(&self) -> Identity {
        let mut bytes = Vec::new();
        if let Err(e) = self.pk.serialize_compressed(&mut bytes) {
            panic!("{}", e)
        }
        bytes
    }

    pub fn verifier(&self) -> SchnorrVerifier {
        SchnorrVerifier { pk: self.pk }
    }
}

impl Signer for SchnorrSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let proof = SchnorrProof::prove(
            &mut transcript(message),
            &[G1Affine::generator()],
            &self.pk,
            &[self.sk],
            &mut rand::thread_rng(),
        )?;
        util::to_bytes(&proof)
    }
}

#[derive(Clone, Debug)]
pub struct SchnorrVerifier {
    pk: G1Affine,
}

impl SchnorrVerifier {
    pub fn from_identity(identity: &[u8]) -> Result<Self> {
        let pk: G1Affine = util::from_bytes(identity)
            .map_err(|e| Error::AuthorizationDenied(format!("invalid identity: {}", e)))?;
        if pk.is_zero() {
            return Err(Error::AuthorizationDenied("identity is the identity point".into()));
        }
        Ok(SchnorrVerifier { pk })
    }
}

impl Verifier for SchnorrVerifier {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let proof: SchnorrProof<G1Affine> = util::from_bytes(signature)
            .map_err(|e| Error::AuthorizationDenied(format!("malformed signature: {}", e)))?;
        proof
            .verify(&mut transcript(message), &[G1Affine::generator()], &self.pk)
            .map_err(|_| Error::AuthorizationDenied("invalid signature".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let mut rng = rand::thread_rng();
        let signer = SchnorrSigner::generate(&mut rng);
        let signature = signer.sign(b"message").unwrap();

        let verifier = SchnorrVerifier::from_identity(&signer.identity()).unwrap();
        assert!(verifier.verify(b"message", &signature).is_ok());
        assert!(matches!(
            verifier.verify(b"other", &signature),
            Err(Error::AuthorizationDenied(_))
        ));

        let other = SchnorrSigner::generate(&mut rng);
        assert!(other.verifier().verify(b"message", &signature).is_err());
    }

    #[test]
    fn malformed_inputs_are_denied() {
        assert!(matches!(
            SchnorrVerifier::from_identity(b"garbage"),
            Err(Error::AuthorizationDenied(_))
        ));
        let signer = SchnorrSigner::generate(&mut rand::thread_rng());
        assert!(matches!(
            signer.verifier().verify(b"message", b"garbage"),
            Err(Error::AuthorizationDenied(_))
        ));
    }
}
