//! The `generators` module contains API for producing the
//! Pedersen generators used by every commitment in the system.

#![allow(non_snake_case)]
#![deny(missing_docs)]

use ark_ec::{AffineRepr, VariableBaseMSM};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use std::marker::PhantomData;

use crate::errors::ProofError;
use crate::util;
use digest::{ExtendableOutput, Update, XofReader};
use sha3::{Shake256, Shake256Reader};

/// Represents a vector of base points for Pedersen commitments.
///
/// Token commitments use three bases: the token type, the value
/// and the blinding factor, in that order.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct PedersenGens<C: AffineRepr> {
    /// Bases, one per committed scalar.
    pub gens: Vec<C>,
}

impl<C: AffineRepr> PedersenGens<C> {
    /// Derives `n` independent generators from `label`.
    pub fn new(label: &[u8], n: usize) -> Self {
        PedersenGens {
            gens: GeneratorsChain::<C>::new(label).take(n).collect(),
        }
    }

    /// Number of bases.
    pub fn len(&self) -> usize {
        self.gens.len()
    }

    /// Whether there are no bases.
    pub fn is_empty(&self) -> bool {
        self.gens.is_empty()
    }

    /// Creates a Pedersen commitment to `scalars`.
    pub fn commit(&self, scalars: &[C::ScalarField]) -> Result<C, ProofError> {
        if scalars.len() != self.gens.len() {
            return Err(ProofError::Format(format!(
                "{} scalars for {} generators",
                scalars.len(),
                self.gens.len()
            )));
        }
        Ok(C::Group::msm_unchecked(&self.gens, scalars).into())
    }

    /// Returns the first `n` bases as their own set of generators.
    pub fn prefix(&self, n: usize) -> Result<Self, ProofError> {
        if n > self.gens.len() {
            return Err(ProofError::format("prefix longer than generators"));
        }
        Ok(PedersenGens {
            gens: self.gens[..n].to_vec(),
        })
    }
}

/// The `GeneratorsChain` creates an arbitrary-long sequence of
/// orthogonal generators.  The sequence can be deterministically
/// produced starting with an arbitrary label.
pub struct GeneratorsChain<C: AffineRepr> {
    curve: PhantomData<C>,
    reader: Shake256Reader,
}

impl<C: AffineRepr> GeneratorsChain<C> {
    /// Creates a chain of generators, determined by the hash of `label`.
    pub fn new(label: &[u8]) -> Self {
        let mut shake = Shake256::default();
        shake.update(b"GeneratorsChain");
        shake.update(label);

        GeneratorsChain {
            curve: PhantomData,
            reader: shake.finalize_xof(),
        }
    }
}

impl<C: AffineRepr> Iterator for GeneratorsChain<C> {
    type Item = C;

    fn next(&mut self) -> Option<Self::Item> {
        let mut uniform_bytes = [0u8; 64];
        self.reader.read(&mut uniform_bytes);

        Some(util::affine_from_bytes_tai(&uniform_bytes))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::max_value(), None)
    }
}
