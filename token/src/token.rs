//! Ledger-visible tokens and their secret openings.

use ark_bn254::{Fr, G1Affine};
use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
    Write,
};
use ark_std::UniformRand;
use rand::{CryptoRng, RngCore};
use zeroize::ZeroizeOnDrop;
use zkat_proofs::{util as proof_util, PedersenGens};

use crate::errors::Result;
use crate::util;

/// Maps a token type to the scalar committed under the type generator.
pub fn type_scalar(token_type: &str) -> Fr {
    proof_util::hash_to_scalar(token_type.as_bytes())
}

/// A token as stored on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Token {
    /// Owner identity, empty for redeemed tokens.
    pub owner: Vec<u8>,
    /// `G0·H(type) + G1·value + G2·blinding_factor`
    pub data: G1Affine,
}

impl Token {
    pub fn is_redeemed(&self) -> bool {
        self.owner.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        util::to_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        util::from_bytes(bytes)
    }
}

/// A token to be created: its type, value and owner. An empty owner redeems.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputSpec {
    pub token_type: String,
    pub value: u64,
    pub owner: Vec<u8>,
}

impl OutputSpec {
    pub fn new(token_type: &str, value: u64, owner: &[u8]) -> Self {
        OutputSpec {
            token_type: token_type.to_string(),
            value,
            owner: owner.to_vec(),
        }
    }

    pub fn redeem(token_type: &str, value: u64) -> Self {
        Self::new(token_type, value, &[])
    }
}

/// Opening of a token commitment.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct TokenDataWitness {
    pub token_type: String,
    pub value: u64,
    pub blinding_factor: Fr,
}

impl TokenDataWitness {
    /// A fresh opening with a random blinding factor.
    pub fn new<R: RngCore + CryptoRng>(token_type: &str, value: u64, rng: &mut R) -> Self {
        TokenDataWitness {
            token_type: token_type.to_string(),
            value,
            blinding_factor: Fr::rand(rng),
        }
    }

    pub fn commit(&self, pedersen: &PedersenGens<G1Affine>) -> Result<G1Affine> {
        Ok(pedersen.commit(&[
            type_scalar(&self.token_type),
            Fr::from(self.value),
            self.blinding_factor,
        ])?)
    }

    /// Whether this opens `token`.
    pub fn opens(&self, token: &Token, pedersen: &PedersenGens<G1Affine>) -> Result<bool> {
        Ok(self.commit(pedersen)? == token.data)
    }
}

impl std::fmt::Debug for TokenDataWitness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDataWitness")
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

impl CanonicalSerialize for TokenDataWitness {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> std::result::Result<(), SerializationError> {
        util::serialize_str(&self.token_type, &mut writer, compress)?;
        self.value.serialize_with_mode(&mut writer, compress)?;
        self.blinding_factor.serialize_with_mode(&mut writer, compress)
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        util::str_size(&self.token_type, compress)
            + self.value.serialized_size(compress)
            + self.blinding_factor.serialized_size(compress)
    }
}

impl Valid for TokenDataWitness {
    fn check(&self) -> std::result::Result<(), SerializationError> {
        Ok(())
    }
}

impl CanonicalDeserialize for TokenDataWitness {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> std::result::Result<Self, SerializationError> {
        Ok(TokenDataWitness {
            token_type: util::deserialize_string(&mut reader, compress, validate)?,
            value: u64::deserialize_with_mode(&mut reader, compress, validate)?,
            blinding_factor: Fr::deserialize_with_mode(&mut reader, compress, validate)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_matches_commitment() {
        let mut rng = rand::thread_rng();
        let pedersen = PedersenGens::<G1Affine>::new(b"token-test", 3);
        let witness = TokenDataWitness::new("ABC", 40, &mut rng);
        let token = Token {
            owner: b"alice".to_vec(),
            data: witness.commit(&pedersen).unwrap(),
        };
        assert!(witness.opens(&token, &pedersen).unwrap());

        let mut other = witness.clone();
        other.value = 41;
        assert!(!other.opens(&token, &pedersen).unwrap());
        let mut other = witness.clone();
        other.token_type = "ABD".to_string();
        assert!(!other.opens(&token, &pedersen).unwrap());
    }

    #[test]
    fn witness_encoding_round_trips() {
        let mut rng = rand::thread_rng();
        let witness = TokenDataWitness::new("ABC", 40, &mut rng);
        let bytes = util::to_bytes(&witness).unwrap();
        let decoded: TokenDataWitness = util::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, witness);
        assert!(!format!("{:?}", witness).contains("40"));
    }
}
