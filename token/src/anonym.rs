//! Anonymous issuer authorization.
//!
//! An issuer key is `I = G0·sk + G1·H(type)`. When issuing, the issuer
//! publishes a type pseudonym `N = I + G2·r` and signs the request with
//! a one-out-of-many proof that `N − I_j = G2·r` for some authorized `I_j`,
//! plus a proof that the `(sk, type)` inside `N` is consistent with the type of
//! the first issued token.

use ark_bn254::{Fr, G1Affine, G1Projective};
use ark_ec::{AffineRepr, CurveGroup};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::UniformRand;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use zeroize::ZeroizeOnDrop;
use zkat_proofs::o2omp::{OneOutOfManyProof, OneOutOfManyStatement, OneOutOfManyWitness};
use zkat_proofs::{sigma, PedersenGens, TranscriptProtocol};

use crate::errors::{Error, Result};
use crate::params::PublicParams;
use crate::signing::{Signer, Verifier};
use crate::token::type_scalar;
use crate::util;

/// Secret key of an issuer allowed to issue one token type.
#[derive(ZeroizeOnDrop)]
pub struct IssuerKey {
    sk: Fr,
    pub token_type: String,
    #[zeroize(skip)]
    pub public_key: G1Affine,
}

impl IssuerKey {
    pub fn generate<R: RngCore + CryptoRng>(
        token_type: &str,
        pp: &PublicParams,
        rng: &mut R,
    ) -> Result<Self> {
        let sk = Fr::rand(rng);
        let public_key = pp.pedersen.prefix(2)?.commit(&[sk, type_scalar(token_type)])?;
        Ok(IssuerKey {
            sk,
            token_type: token_type.to_string(),
            public_key,
        })
    }

    /// Position of this issuer in the authorized set.
    pub fn index_in(&self, pp: &PublicParams) -> Result<usize> {
        pp.issuers
            .iter()
            .position(|pk| *pk == self.public_key)
            .ok_or_else(|| Error::AuthorizationDenied("issuer is not authorized".into()))
    }

    pub(crate) fn secret(&self) -> Fr {
        self.sk
    }

    /// A fresh pseudonym for the type and the authorization data it opens with.
    pub(crate) fn pseudonym<R: RngCore + CryptoRng>(
        &self,
        pp: &PublicParams,
        rng: &mut R,
    ) -> Result<(G1Affine, Fr)> {
        let r = Fr::rand(rng);
        let nym = pp
            .pedersen
            .commit(&[self.sk, type_scalar(&self.token_type), r])?;
        Ok((nym, r))
    }
}

/// Proof that the type pseudonym and the token carry the same type.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct TypeCorrectnessProof {
    pub challenge: Fr,
    pub sk: Fr,
    pub token_type: Fr,
    pub nym_blinding: Fr,
    pub value: Fr,
    pub token_blinding: Fr,
}

/// The anonymous issuer's signature on a request.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct AuthorizationSignature {
    pub membership: OneOutOfManyProof,
    pub type_correctness: TypeCorrectnessProof,
}

#[derive(ZeroizeOnDrop)]
pub(crate) struct AuthorizationWitness {
    pub sk: Fr,
    pub token_type: Fr,
    pub nym_blinding: Fr,
    pub index: usize,
    pub value: Fr,
    pub token_blinding: Fr,
}

fn type_correctness_transcript(
    pedersen: &PedersenGens<G1Affine>,
    type_nym: &G1Affine,
    token: &G1Affine,
    message: &[u8],
    first_messages: [&G1Affine; 2],
) -> Fr {
    let mut transcript = Transcript::new(b"zkat-type-correctness");
    transcript.append_points(b"pedersen", &pedersen.gens);
    transcript.append_point(b"N", type_nym);
    transcript.append_point(b"T", token);
    transcript.append_message(b"msg", message);
    transcript.append_point(b"A_N", first_messages[0]);
    transcript.append_point(b"A_T", first_messages[1]);
    transcript.challenge_scalar(b"c")
}

impl TypeCorrectnessProof {
    fn prove<R: RngCore + CryptoRng>(
        witness: &AuthorizationWitness,
        pedersen: &PedersenGens<G1Affine>,
        type_nym: &G1Affine,
        token: &G1Affine,
        message: &[u8],
        rng: &mut R,
    ) -> Result<Self> {
        let rho: Vec<Fr> = sigma::sample_randomness(5, rng);
        let a_nym = sigma::commit(&[rho[0], rho[1], rho[2]], &pedersen.gens)?.into_affine();
        let a_token = sigma::commit(&[rho[1], rho[3], rho[4]], &pedersen.gens)?.into_affine();

        let challenge =
            type_correctness_transcript(pedersen, type_nym, token, message, [&a_nym, &a_token]);
        let z = sigma::respond(
            &[
                witness.sk,
                witness.token_type,
                witness.nym_blinding,
                witness.value,
                witness.token_blinding,
            ],
            &rho,
            &challenge,
        )?;
        Ok(TypeCorrectnessProof {
            challenge,
            sk: z[0],
            token_type: z[1],
            nym_blinding: z[2],
            value: z[3],
            token_blinding: z[4],
        })
    }

    fn verify(
        &self,
        pedersen: &PedersenGens<G1Affine>,
        type_nym: &G1Affine,
        token: &G1Affine,
        message: &[u8],
    ) -> Result<()> {
        let a_nym = sigma::recompute_commitment(
            type_nym,
            &[self.sk, self.token_type, self.nym_blinding],
            &self.challenge,
            &pedersen.gens,
        )?
        .into_affine();
        let a_token = sigma::recompute_commitment(
            token,
            &[self.token_type, self.value, self.token_blinding],
            &self.challenge,
            &pedersen.gens,
        )?
        .into_affine();

        let challenge =
            type_correctness_transcript(pedersen, type_nym, token, message, [&a_nym, &a_token]);
        if challenge != self.challenge {
            return Err(Error::AuthorizationDenied("type correctness proof does not verify".into()));
        }
        Ok(())
    }
}

/// `N − I_i` for every authorized issuer.
fn differences(type_nym: &G1Affine, issuers: &[G1Affine]) -> Vec<G1Affine> {
    let diffs: Vec<G1Projective> = issuers.iter().map(|pk| type_nym.into_group() - pk).collect();
    G1Projective::normalize_batch(&diffs)
}

/// Signs requests on behalf of an anonymous issuer for one issue action.
pub struct AuthorizationSigner {
    witness: AuthorizationWitness,
    pedersen: PedersenGens<G1Affine>,
    issuers: Vec<G1Affine>,
    type_nym: G1Affine,
    token: G1Affine,
}

impl AuthorizationSigner {
    pub(crate) fn new(
        witness: AuthorizationWitness,
        pp: &PublicParams,
        type_nym: G1Affine,
        token: G1Affine,
    ) -> Self {
        AuthorizationSigner {
            witness,
            pedersen: pp.pedersen.clone(),
            issuers: pp.issuers.clone(),
            type_nym,
            token,
        }
    }
}

impl Signer for AuthorizationSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();
        let commitments = differences(&self.type_nym, &self.issuers);
        let statement = OneOutOfManyStatement {
            commitments: &commitments,
            base: self.pedersen.gens[2],
            message,
        };
        let membership = OneOutOfManyProof::prove(
            &OneOutOfManyWitness {
                index: self.witness.index,
                randomness: self.witness.nym_blinding,
            },
            &statement,
            &mut rng,
        )?;
        let type_correctness = TypeCorrectnessProof::prove(
            &self.witness,
            &self.pedersen,
            &self.type_nym,
            &self.token,
            message,
            &mut rng,
        )?;
        util::to_bytes(&AuthorizationSignature {
            membership,
            type_correctness,
        })
    }
}

/// Checks an anonymous issuer's signature against the authorized set.
pub struct AuthorizationVerifier<'a> {
    pub pp: &'a PublicParams,
    pub type_nym: G1Affine,
    /// Commitment of the first issued token.
    pub token: G1Affine,
}

impl<'a> Verifier for AuthorizationVerifier<'a> {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        if self.pp.issuers.is_empty() {
            return Err(Error::AuthorizationDenied("no authorized issuers".into()));
        }
        if self.type_nym.is_zero() {
            return Err(Error::AuthorizationDenied("degenerate type pseudonym".into()));
        }
        let signature: AuthorizationSignature = util::from_bytes(signature)
            .map_err(|e| Error::AuthorizationDenied(format!("malformed signature: {}", e)))?;

        let commitments = differences(&self.type_nym, &self.pp.issuers);
        let statement = OneOutOfManyStatement {
            commitments: &commitments,
            base: self.pp.pedersen.gens[2],
            message,
        };
        signature
            .membership
            .verify(&statement)
            .map_err(|e| Error::from(e).into_denied().context("issuer membership"))?;
        signature
            .type_correctness
            .verify(&self.pp.pedersen, &self.type_nym, &self.token, message)
            .map_err(|e| e.into_denied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenDataWitness;

    struct Fixture {
        pp: PublicParams,
        issuers: Vec<IssuerKey>,
    }

    fn fixture() -> Fixture {
        let mut rng = rand::thread_rng();
        let mut pp = PublicParams::setup(16, 2, &mut rng).unwrap();
        let issuers: Vec<IssuerKey> = ["ABC", "XYZ"]
            .iter()
            .map(|t| IssuerKey::generate(t, &pp, &mut rng).unwrap())
            .collect();
        for issuer in &issuers {
            pp.add_issuer(issuer.public_key);
        }
        Fixture { pp, issuers }
    }

    fn signer(
        f: &Fixture,
        issuer: &IssuerKey,
        token_type: &str,
    ) -> (AuthorizationSigner, G1Affine) {
        let mut rng = rand::thread_rng();
        let (type_nym, nym_blinding) = issuer.pseudonym(&f.pp, &mut rng).unwrap();
        let opening = TokenDataWitness::new(token_type, 10, &mut rng);
        let token = opening.commit(&f.pp.pedersen).unwrap();
        let witness = AuthorizationWitness {
            sk: issuer.sk,
            token_type: type_scalar(&issuer.token_type),
            nym_blinding,
            index: issuer.index_in(&f.pp).unwrap(),
            value: Fr::from(opening.value),
            token_blinding: opening.blinding_factor,
        };
        (AuthorizationSigner::new(witness, &f.pp, type_nym, token), token)
    }

    #[test]
    fn authorized_issuer_signs_anonymously() {
        let f = fixture();
        for issuer in &f.issuers {
            let (signer, token) = signer(&f, issuer, &issuer.token_type);
            let signature = signer.sign(b"request").unwrap();
            let verifier = AuthorizationVerifier {
                pp: &f.pp,
                type_nym: signer.type_nym,
                token,
            };
            assert!(verifier.verify(b"request", &signature).is_ok());
            assert!(matches!(
                verifier.verify(b"another request", &signature),
                Err(Error::AuthorizationDenied(_))
            ));
        }
    }

    #[test]
    fn wrong_token_type_is_denied() {
        let f = fixture();
        let (signer, token) = signer(&f, &f.issuers[0], "XYZ");
        let signature = signer.sign(b"request").unwrap();
        let verifier = AuthorizationVerifier {
            pp: &f.pp,
            type_nym: signer.type_nym,
            token,
        };
        assert!(matches!(
            verifier.verify(b"request", &signature),
            Err(Error::AuthorizationDenied(_))
        ));
    }

    #[test]
    fn unregistered_issuer_is_denied() {
        let mut rng = rand::thread_rng();
        let f = fixture();
        let outsider = IssuerKey::generate("ABC", &f.pp, &mut rng).unwrap();
        assert!(outsider.index_in(&f.pp).is_err());

        let mut registered = f.pp.clone();
        registered.add_issuer(outsider.public_key);
        let g = Fixture {
            pp: registered,
            issuers: vec![],
        };
        let (signer, token) = signer(&g, &outsider, "ABC");
        let signature = signer.sign(b"request").unwrap();
        let verifier = AuthorizationVerifier {
            pp: &f.pp,
            type_nym: signer.type_nym,
            token,
        };
        assert!(verifier.verify(b"request", &signature).is_err());
    }

    #[test]
    fn tampered_disjunction_is_denied() {
        let f = fixture();
        let (signer, token) = signer(&f, &f.issuers[1], "XYZ");
        let mut signature: AuthorizationSignature =
            util::from_bytes(&signer.sign(b"request").unwrap()).unwrap();
        signature.membership.challenges.swap(0, 1);
        let verifier = AuthorizationVerifier {
            pp: &f.pp,
            type_nym: signer.type_nym,
            token,
        };
        assert!(verifier
            .verify(b"request", &util::to_bytes(&signature).unwrap())
            .is_err());
    }
}
