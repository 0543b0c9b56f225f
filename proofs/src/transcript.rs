//! Defines a `TranscriptProtocol` trait for using a Merlin transcript.

use ark_ec::AffineRepr;
use ark_ff::{Field, PrimeField};
use ark_serialize::CanonicalSerialize;
use merlin::Transcript;

use crate::errors::ProofError;
use crate::util;

pub trait TranscriptProtocol {
    /// Append a domain separator for a single sigma protocol.
    fn sigma_domain_sep(&mut self, n: u64);

    /// Append a domain separator for a signature proof of knowledge with
    /// `hidden` hidden and `disclosed` disclosed messages.
    fn sigproof_domain_sep(&mut self, hidden: u64, disclosed: u64);

    /// Append a domain separator for a range proof over `m` commitments,
    /// each decomposed in `exponent` digits of base `base`.
    fn rangeproof_domain_sep(&mut self, base: u64, exponent: u64, m: u64);

    /// Append a domain separator for a one-out-of-many proof over `n` commitments.
    fn o2omp_domain_sep(&mut self, n: u64);

    /// Append a `scalar` with the given `label`.
    fn append_scalar<F: Field>(&mut self, label: &'static [u8], scalar: &F);

    /// Append any serializable group element with the given `label`.
    fn append_element<T: CanonicalSerialize>(&mut self, label: &'static [u8], element: &T);

    /// Append a `point` with the given `label`.
    fn append_point<C: AffineRepr>(&mut self, label: &'static [u8], point: &C);

    /// Append every point of `points` under the same `label`.
    fn append_points<C: AffineRepr>(&mut self, label: &'static [u8], points: &[C]);

    /// Check that a point is not the identity, then append it to the
    /// transcript.  Otherwise, return an error.
    fn validate_and_append_point<C: AffineRepr>(
        &mut self,
        label: &'static [u8],
        point: &C,
    ) -> Result<(), ProofError>;

    /// Compute a `label`ed challenge variable.
    fn challenge_scalar<F: PrimeField>(&mut self, label: &'static [u8]) -> F;
}

impl TranscriptProtocol for Transcript {
    fn sigma_domain_sep(&mut self, n: u64) {
        self.append_message(b"dom-sep", b"sigma v1");
        self.append_u64(b"n", n);
    }

    fn sigproof_domain_sep(&mut self, hidden: u64, disclosed: u64) {
        self.append_message(b"dom-sep", b"ps-sigproof v1");
        self.append_u64(b"hidden", hidden);
        self.append_u64(b"disclosed", disclosed);
    }

    fn rangeproof_domain_sep(&mut self, base: u64, exponent: u64, m: u64) {
        self.append_message(b"dom-sep", b"digit-rangeproof v1");
        self.append_u64(b"base", base);
        self.append_u64(b"exponent", exponent);
        self.append_u64(b"m", m);
    }

    fn o2omp_domain_sep(&mut self, n: u64) {
        self.append_message(b"dom-sep", b"o2omp v1");
        self.append_u64(b"n", n);
    }

    fn append_scalar<F: Field>(&mut self, label: &'static [u8], scalar: &F) {
        self.append_message(label, &util::field_as_bytes(scalar));
    }

    fn append_element<T: CanonicalSerialize>(&mut self, label: &'static [u8], element: &T) {
        let mut bytes = Vec::new();
        if let Err(e) = element.serialize_compressed(&mut bytes) {
            panic!("{}", e)
        }
        self.append_message(label, &bytes);
    }

    fn append_point<C: AffineRepr>(&mut self, label: &'static [u8], point: &C) {
        self.append_element(label, point);
    }

    fn append_points<C: AffineRepr>(&mut self, label: &'static [u8], points: &[C]) {
        self.append_u64(b"len", points.len() as u64);
        for point in points {
            self.append_element(label, point);
        }
    }

    fn validate_and_append_point<C: AffineRepr>(
        &mut self,
        label: &'static [u8],
        point: &C,
    ) -> Result<(), ProofError> {
        if point.is_zero() {
            Err(ProofError::VerificationError("identity point in transcript"))
        } else {
            self.append_element(label, point);
            Ok(())
        }
    }

    fn challenge_scalar<F: PrimeField>(&mut self, label: &'static [u8]) -> F {
        let mut bytes = [0u8; 64];
        self.challenge_bytes(label, &mut bytes);
        F::from_le_bytes_mod_order(&bytes)
    }
}
