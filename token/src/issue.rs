//! Issue actions: new tokens of one type with a proof that every value is in range.

use ark_bn254::{Fr, G1Affine};
use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
    Write,
};
use log::debug;
use rand::{CryptoRng, RngCore};
use zkat_proofs::range_proof::{RangeProof, RangeStatement, RangeWitness};

use crate::anonym::{AuthorizationSigner, AuthorizationVerifier, AuthorizationWitness, IssuerKey};
use crate::errors::{Error, Result};
use crate::params::PublicParams;
use crate::request::IssueMetadata;
use crate::signing::{Identity, IdentityDeserializer, SchnorrSigner, Signer, Verifier};
use crate::token::{type_scalar, OutputSpec, Token, TokenDataWitness};
use crate::util;

const PLAIN_ISSUER: u8 = 0;
const ANONYMOUS_ISSUER: u8 = 1;

/// Who signs an issue action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssuerIdentity {
    Plain(Identity),
    /// Type pseudonym of an authorized anonymous issuer.
    Anonymous(G1Affine),
}

impl IssuerIdentity {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            IssuerIdentity::Plain(identity) => Ok(identity.clone()),
            IssuerIdentity::Anonymous(nym) => util::to_bytes(nym),
        }
    }
}

impl CanonicalSerialize for IssuerIdentity {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> std::result::Result<(), SerializationError> {
        match self {
            IssuerIdentity::Plain(identity) => {
                PLAIN_ISSUER.serialize_with_mode(&mut writer, compress)?;
                identity.serialize_with_mode(&mut writer, compress)
            }
            IssuerIdentity::Anonymous(nym) => {
                ANONYMOUS_ISSUER.serialize_with_mode(&mut writer, compress)?;
                nym.serialize_with_mode(&mut writer, compress)
            }
        }
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        1 + match self {
            IssuerIdentity::Plain(identity) => identity.serialized_size(compress),
            IssuerIdentity::Anonymous(nym) => nym.serialized_size(compress),
        }
    }
}

impl Valid for IssuerIdentity {
    fn check(&self) -> std::result::Result<(), SerializationError> {
        match self {
            IssuerIdentity::Plain(_) => Ok(()),
            IssuerIdentity::Anonymous(nym) => nym.check(),
        }
    }
}

impl CanonicalDeserialize for IssuerIdentity {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> std::result::Result<Self, SerializationError> {
        match u8::deserialize_with_mode(&mut reader, compress, validate)? {
            PLAIN_ISSUER => Ok(IssuerIdentity::Plain(Vec::<u8>::deserialize_with_mode(
                &mut reader,
                compress,
                validate,
            )?)),
            ANONYMOUS_ISSUER => Ok(IssuerIdentity::Anonymous(G1Affine::deserialize_with_mode(
                &mut reader,
                compress,
                validate,
            )?)),
            _ => Err(SerializationError::InvalidData),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct IssueAction {
    pub issuer: IssuerIdentity,
    pub outputs: Vec<Token>,
    pub proof: RangeProof,
}

impl IssueAction {
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn output_commitments(&self) -> Vec<G1Affine> {
        self.outputs.iter().map(|t| t.data).collect()
    }

    /// Checks the outputs and their range proof. Signatures are checked separately.
    pub fn verify_proof(&self, pp: &PublicParams) -> Result<()> {
        if self.outputs.is_empty() {
            return Err(Error::Format("issue action without outputs".into()));
        }
        if self.outputs.iter().any(|t| t.is_redeemed()) {
            return Err(Error::Format("issued token without owner".into()));
        }
        if let IssuerIdentity::Plain(identity) = &self.issuer {
            if identity.is_empty() {
                return Err(Error::Format("empty issuer identity".into()));
            }
        }
        let tokens = self.output_commitments();
        self.proof
            .verify(&RangeStatement {
                tokens: &tokens,
                pedersen: &pp.pedersen,
                params: &pp.range,
            })
            .map_err(|e| Error::from(e).context("issue range proof"))
    }

    /// The verifier of the signature this action must carry.
    pub fn verifier<'a>(
        &self,
        pp: &'a PublicParams,
        identities: &dyn IdentityDeserializer,
    ) -> Result<Box<dyn Verifier + 'a>> {
        match &self.issuer {
            IssuerIdentity::Plain(identity) => Ok(identities.verifier(identity)?),
            IssuerIdentity::Anonymous(nym) => {
                let first = self
                    .outputs
                    .first()
                    .ok_or_else(|| Error::Format("issue action without outputs".into()))?;
                Ok(Box::new(AuthorizationVerifier {
                    pp,
                    type_nym: *nym,
                    token: first.data,
                }))
            }
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        util::to_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        util::from_bytes(bytes)
    }
}

/// Key material of an issuer.
pub enum Issuer {
    Plain(SchnorrSigner),
    Anonymous(IssuerKey),
}

/// Signs the request carrying a freshly generated issue action.
pub enum IssueSigner<'a> {
    Plain(&'a SchnorrSigner),
    Anonymous(AuthorizationSigner),
}

impl Signer for IssueSigner<'_> {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            IssueSigner::Plain(signer) => signer.sign(message),
            IssueSigner::Anonymous(signer) => signer.sign(message),
        }
    }
}

impl Issuer {
    /// Creates one token per output. All outputs must share a type.
    pub fn generate_issue<R: RngCore + CryptoRng>(
        &self,
        outputs: &[OutputSpec],
        pp: &PublicParams,
        rng: &mut R,
    ) -> Result<(IssueAction, IssueMetadata, IssueSigner<'_>)> {
        let first = outputs
            .first()
            .ok_or_else(|| Error::Format("issue without outputs".into()))?;
        let token_type = first.token_type.as_str();
        if outputs.iter().any(|o| o.token_type != token_type) {
            return Err(Error::Format("issued tokens must share a type".into()));
        }
        if outputs.iter().any(|o| o.owner.is_empty()) {
            return Err(Error::Format("issued token without owner".into()));
        }
        if let Issuer::Anonymous(key) = self {
            if key.token_type != token_type {
                return Err(Error::Format(format!(
                    "issuer of {} cannot issue {}",
                    key.token_type, token_type
                )));
            }
        }
        let max = pp.max_token_value()?;
        if let Some(o) = outputs.iter().find(|o| o.value >= max) {
            return Err(Error::RangeViolation(format!("{} is not below {}", o.value, max)));
        }

        let openings: Vec<TokenDataWitness> = outputs
            .iter()
            .map(|o| TokenDataWitness::new(token_type, o.value, rng))
            .collect();
        let tokens = outputs
            .iter()
            .zip(&openings)
            .map(|(o, w)| {
                Ok(Token {
                    owner: o.owner.clone(),
                    data: w.commit(&pp.pedersen)?,
                })
            })
            .collect::<Result<Vec<Token>>>()?;
        let commitments: Vec<G1Affine> = tokens.iter().map(|t| t.data).collect();
        let proof = RangeProof::prove(
            &RangeWitness {
                token_type: type_scalar(token_type),
                values: openings.iter().map(|w| w.value).collect(),
                blindings: openings.iter().map(|w| w.blinding_factor).collect(),
            },
            &RangeStatement {
                tokens: &commitments,
                pedersen: &pp.pedersen,
                params: &pp.range,
            },
            rng,
        )?;

        let (issuer, signer) = match self {
            Issuer::Plain(signer) => (
                IssuerIdentity::Plain(signer.identity()),
                IssueSigner::Plain(signer),
            ),
            Issuer::Anonymous(key) => {
                let index = key.index_in(pp)?;
                let (type_nym, nym_blinding) = key.pseudonym(pp, rng)?;
                let witness = AuthorizationWitness {
                    sk: key.secret(),
                    token_type: type_scalar(token_type),
                    nym_blinding,
                    index,
                    value: Fr::from(openings[0].value),
                    token_blinding: openings[0].blinding_factor,
                };
                (
                    IssuerIdentity::Anonymous(type_nym),
                    IssueSigner::Anonymous(AuthorizationSigner::new(
                        witness,
                        pp,
                        type_nym,
                        commitments[0],
                    )),
                )
            }
        };

        let action = IssueAction {
            issuer,
            outputs: tokens,
            proof,
        };
        action.verify_proof(pp)?;
        debug!("generated issue action with {} outputs", action.num_outputs());

        let metadata = IssueMetadata {
            issuer: action.issuer.to_bytes()?,
            outputs: openings,
            receivers: outputs.iter().map(|o| o.owner.clone()).collect(),
            receivers_audit_info: vec![vec![]; outputs.len()],
        };
        Ok((action, metadata, signer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::SchnorrIdentities;

    fn setup() -> PublicParams {
        PublicParams::setup(16, 2, &mut rand::thread_rng()).unwrap()
    }

    #[test]
    fn plain_issue_verifies() {
        let mut rng = rand::thread_rng();
        let pp = setup();
        let issuer = Issuer::Plain(SchnorrSigner::generate(&mut rng));
        let outputs = [OutputSpec::new("ABC", 40, b"alice"), OutputSpec::new("ABC", 70, b"bob")];
        let (action, metadata, signer) = issuer.generate_issue(&outputs, &pp, &mut rng).unwrap();
        assert_eq!(action.num_outputs(), 2);
        for (token, opening) in action.outputs.iter().zip(&metadata.outputs) {
            assert!(opening.opens(token, &pp.pedersen).unwrap());
        }

        let decoded = IssueAction::from_bytes(&action.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, action);
        assert!(decoded.verify_proof(&pp).is_ok());

        let signature = signer.sign(b"request").unwrap();
        let verifier = action.verifier(&pp, &SchnorrIdentities).unwrap();
        assert!(verifier.verify(b"request", &signature).is_ok());
    }

    #[test]
    fn anonymous_issue_hides_the_issuer() {
        let mut rng = rand::thread_rng();
        let mut pp = setup();
        let key = IssuerKey::generate("ABC", &pp, &mut rng).unwrap();
        pp.add_issuer(key.public_key);
        pp.add_issuer(IssuerKey::generate("XYZ", &pp, &mut rng).unwrap().public_key);
        let issuer = Issuer::Anonymous(key);

        let outputs = [OutputSpec::new("ABC", 5, b"alice")];
        let (action, _, signer) = issuer.generate_issue(&outputs, &pp, &mut rng).unwrap();
        assert!(matches!(action.issuer, IssuerIdentity::Anonymous(_)));
        let signature = signer.sign(b"request").unwrap();
        let verifier = action.verifier(&pp, &SchnorrIdentities).unwrap();
        assert!(verifier.verify(b"request", &signature).is_ok());

        let wrong_type = [OutputSpec::new("XYZ", 5, b"alice")];
        assert!(matches!(
            issuer.generate_issue(&wrong_type, &pp, &mut rng),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn malformed_issues_are_refused() {
        let mut rng = rand::thread_rng();
        let pp = setup();
        let issuer = Issuer::Plain(SchnorrSigner::generate(&mut rng));
        assert!(matches!(issuer.generate_issue(&[], &pp, &mut rng), Err(Error::Format(_))));
        let mixed = [OutputSpec::new("ABC", 1, b"a"), OutputSpec::new("XYZ", 1, b"a")];
        assert!(matches!(issuer.generate_issue(&mixed, &pp, &mut rng), Err(Error::Format(_))));
        let too_large = [OutputSpec::new("ABC", 256, b"a")];
        assert!(matches!(
            issuer.generate_issue(&too_large, &pp, &mut rng),
            Err(Error::RangeViolation(_))
        ));
        let ownerless = [OutputSpec::redeem("ABC", 1)];
        assert!(matches!(issuer.generate_issue(&ownerless, &pp, &mut rng), Err(Error::Format(_))));
    }

    #[test]
    fn tampered_outputs_fail_the_range_proof() {
        let mut rng = rand::thread_rng();
        let pp = setup();
        let issuer = Issuer::Plain(SchnorrSigner::generate(&mut rng));
        let outputs = [OutputSpec::new("ABC", 40, b"alice"), OutputSpec::new("ABC", 70, b"bob")];
        let (mut action, _, _) = issuer.generate_issue(&outputs, &pp, &mut rng).unwrap();
        action.outputs.swap(0, 1);
        assert!(matches!(action.verify_proof(&pp), Err(Error::ProofInvalid(_))));
    }
}
