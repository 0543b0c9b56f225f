//! Public parameters shared by every prover and verifier.

use ark_bn254::G1Affine;
use ark_ec::AffineRepr;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{CryptoRng, RngCore};
use zkat_proofs::pssign;
use zkat_proofs::range_proof::RangeParams;
use zkat_proofs::{GeneratorsChain, PedersenGens};

use crate::errors::{Error, Result};
use crate::util;

/// Identifier of the serialized parameters.
pub const DLOG_PUBLIC_PARAMETERS: &str = "zkatdlog";

const PEDERSEN_LABEL: &[u8] = b"zkat token pedersen generators";
const PAIRING_BASE_LABEL: &[u8] = b"zkat range proof pairing base";

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct PublicParams {
    /// Type, value and blinding generators.
    pub pedersen: PedersenGens<G1Affine>,
    /// Membership key, digit signatures, pairing bases, base and exponent.
    pub range: RangeParams,
    /// Public keys of the issuers allowed to issue anonymously.
    pub issuers: Vec<G1Affine>,
    /// Identity of the auditor whose endorsement every request needs.
    pub auditor: Option<Vec<u8>>,
    /// Whether transfers spend through nullifiers instead of deleting inputs.
    pub graph_hiding: bool,
}

/// Self-identifying envelope of the parameters.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct SerializedPublicParams {
    pub identifier: Vec<u8>,
    pub raw: Vec<u8>,
}

impl PublicParams {
    /// Generates parameters for values in `[0, base^exponent)`.
    pub fn setup<R: RngCore + CryptoRng>(base: u64, exponent: u32, rng: &mut R) -> Result<Self> {
        let pedersen = PedersenGens::<G1Affine>::new(PEDERSEN_LABEL, 3);
        let p = GeneratorsChain::<G1Affine>::new(PAIRING_BASE_LABEL)
            .next()
            .ok_or_else(|| Error::Format("empty generators chain".into()))?;
        let range = RangeParams::generate(base, exponent, p, pssign::default_q(), rng)?;

        Ok(PublicParams {
            pedersen,
            range,
            issuers: vec![],
            auditor: None,
            graph_hiding: false,
        })
    }

    pub fn with_graph_hiding(mut self, graph_hiding: bool) -> Self {
        self.graph_hiding = graph_hiding;
        self
    }

    pub fn add_issuer(&mut self, public_key: G1Affine) {
        self.issuers.push(public_key);
    }

    pub fn set_auditor(&mut self, identity: Vec<u8>) {
        self.auditor = Some(identity);
    }

    /// The first value that cannot be issued.
    pub fn max_token_value(&self) -> Result<u64> {
        Ok(self.range.max_value()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pedersen.len() != 3 {
            return Err(Error::Format(format!(
                "expected 3 pedersen generators, got {}",
                self.pedersen.len()
            )));
        }
        self.range.check()?;
        if self.issuers.iter().any(|pk| pk.is_zero()) {
            return Err(Error::Format("issuer public key is the identity".into()));
        }
        if matches!(&self.auditor, Some(a) if a.is_empty()) {
            return Err(Error::Format("empty auditor identity".into()));
        }
        Ok(())
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        util::to_bytes(&SerializedPublicParams {
            identifier: DLOG_PUBLIC_PARAMETERS.as_bytes().to_vec(),
            raw: util::to_bytes(self)?,
        })
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let envelope: SerializedPublicParams = util::from_bytes(bytes)?;
        if envelope.identifier != DLOG_PUBLIC_PARAMETERS.as_bytes() {
            return Err(Error::Format(format!(
                "invalid identifier, expected {}, got {}",
                DLOG_PUBLIC_PARAMETERS,
                String::from_utf8_lossy(&envelope.identifier)
            )));
        }
        let pp: PublicParams = util::from_bytes(&envelope.raw)?;
        pp.validate()?;
        pp.range.verify_signatures()?;
        Ok(pp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_validates_base_and_exponent() {
        let mut rng = rand::thread_rng();
        assert!(matches!(PublicParams::setup(1, 2, &mut rng), Err(Error::Format(_))));
        assert!(matches!(PublicParams::setup(16, 0, &mut rng), Err(Error::Format(_))));
        assert!(matches!(PublicParams::setup(16, 17, &mut rng), Err(Error::Format(_))));

        let pp = PublicParams::setup(16, 2, &mut rng).unwrap();
        assert_eq!(pp.max_token_value().unwrap(), 256);
        assert_eq!(pp.range.signatures.len(), 16);
        assert!(pp.validate().is_ok());
    }

    #[test]
    fn serialized_form_is_self_identifying() {
        let mut rng = rand::thread_rng();
        let mut pp = PublicParams::setup(4, 3, &mut rng).unwrap();
        pp.add_issuer(G1Affine::generator());
        pp.set_auditor(b"auditor".to_vec());

        let bytes = pp.serialize().unwrap();
        assert_eq!(PublicParams::deserialize(&bytes).unwrap(), pp);

        let wrong = util::to_bytes(&SerializedPublicParams {
            identifier: b"other".to_vec(),
            raw: util::to_bytes(&pp).unwrap(),
        })
        .unwrap();
        assert!(matches!(PublicParams::deserialize(&wrong), Err(Error::Format(_))));

        let mut forged = pp.clone();
        forged.range.signatures.swap(0, 1);
        assert!(matches!(
            PublicParams::deserialize(&forged.serialize().unwrap()),
            Err(Error::ProofInvalid(_))
        ));
    }

    #[test]
    fn generators_are_shared_across_setups() {
        let mut rng = rand::thread_rng();
        let a = PublicParams::setup(4, 2, &mut rng).unwrap();
        let b = PublicParams::setup(4, 2, &mut rng).unwrap();
        assert_eq!(a.pedersen, b.pedersen);
        assert_ne!(a.range.pk, b.range.pk);
    }
}
