//! Transfer actions: spend inputs of one type into outputs of the same type and total value.
//!
//! The well-formedness proof shows that every input and output opens to
//! `G0·t + G1·v + G2·r` with the same `t`, and that the input values sum to
//! the output values. Output values are additionally range proven.

use ark_bn254::{Fr, G1Affine};
use ark_ec::CurveGroup;
use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
    Write,
};
use ark_std::UniformRand;
use log::debug;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use zeroize::ZeroizeOnDrop;
use zkat_proofs::range_proof::{RangeProof, RangeStatement, RangeWitness};
use zkat_proofs::{sigma, PedersenGens, TranscriptProtocol};

use crate::errors::{Error, Result};
use crate::keys;
use crate::params::PublicParams;
use crate::request::TransferMetadata;
use crate::signing::Signer;
use crate::token::{type_scalar, OutputSpec, Token, TokenDataWitness};
use crate::util;

/// A spent input: the token key it is stored under and the token it claims.
///
/// With graph hiding the token stays on the ledger and the spend is recorded
/// under the nullifier of `key`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferInput {
    pub key: String,
    pub token: Token,
}

impl CanonicalSerialize for TransferInput {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> std::result::Result<(), SerializationError> {
        util::serialize_str(&self.key, &mut writer, compress)?;
        self.token.serialize_with_mode(&mut writer, compress)
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        util::str_size(&self.key, compress) + self.token.serialized_size(compress)
    }
}

impl Valid for TransferInput {
    fn check(&self) -> std::result::Result<(), SerializationError> {
        self.token.check()
    }
}

impl CanonicalDeserialize for TransferInput {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> std::result::Result<Self, SerializationError> {
        Ok(TransferInput {
            key: util::deserialize_string(&mut reader, compress, validate)?,
            token: Token::deserialize_with_mode(&mut reader, compress, validate)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct WellFormednessProof {
    pub challenge: Fr,
    pub token_type: Fr,
    pub input_values: Vec<Fr>,
    pub input_blindings: Vec<Fr>,
    pub output_values: Vec<Fr>,
    pub output_blindings: Vec<Fr>,
}

#[derive(ZeroizeOnDrop)]
struct WellFormednessWitness {
    token_type: Fr,
    input_values: Vec<Fr>,
    input_blindings: Vec<Fr>,
    output_values: Vec<Fr>,
    output_blindings: Vec<Fr>,
}

fn wellformedness_challenge(
    pedersen: &PedersenGens<G1Affine>,
    inputs: &[G1Affine],
    outputs: &[G1Affine],
    input_commitments: &[G1Affine],
    output_commitments: &[G1Affine],
) -> Fr {
    let mut transcript = Transcript::new(b"zkat-transfer-wellformedness");
    transcript.append_points(b"pedersen", &pedersen.gens);
    transcript.append_points(b"in", inputs);
    transcript.append_points(b"out", outputs);
    transcript.append_points(b"A_in", input_commitments);
    transcript.append_points(b"A_out", output_commitments);
    transcript.challenge_scalar(b"c")
}

fn first_messages(
    token_type: Fr,
    values: &[Fr],
    blindings: &[Fr],
    pedersen: &PedersenGens<G1Affine>,
) -> Result<Vec<G1Affine>> {
    values
        .iter()
        .zip(blindings)
        .map(|(v, r)| Ok(sigma::commit(&[token_type, *v, *r], &pedersen.gens)?.into_affine()))
        .collect()
}

fn recompute(
    tokens: &[G1Affine],
    token_type: Fr,
    values: &[Fr],
    blindings: &[Fr],
    challenge: &Fr,
    pedersen: &PedersenGens<G1Affine>,
) -> Result<Vec<G1Affine>> {
    tokens
        .iter()
        .zip(values.iter().zip(blindings))
        .map(|(t, (v, r))| {
            Ok(sigma::recompute_commitment(t, &[token_type, *v, *r], challenge, &pedersen.gens)?
                .into_affine())
        })
        .collect()
}

impl WellFormednessProof {
    fn prove<R: RngCore + CryptoRng>(
        witness: &WellFormednessWitness,
        inputs: &[G1Affine],
        outputs: &[G1Affine],
        pedersen: &PedersenGens<G1Affine>,
        rng: &mut R,
    ) -> Result<Self> {
        let rho_type = Fr::rand(rng);
        let rho_in_values: Vec<Fr> = sigma::sample_randomness(inputs.len(), rng);
        let rho_in_blindings: Vec<Fr> = sigma::sample_randomness(inputs.len(), rng);
        // output value randomness sums to the input value randomness
        let mut rho_out_values: Vec<Fr> = sigma::sample_randomness(outputs.len() - 1, rng);
        let rest = rho_in_values.iter().sum::<Fr>() - rho_out_values.iter().sum::<Fr>();
        rho_out_values.push(rest);
        let rho_out_blindings: Vec<Fr> = sigma::sample_randomness(outputs.len(), rng);

        let a_in = first_messages(rho_type, &rho_in_values, &rho_in_blindings, pedersen)?;
        let a_out = first_messages(rho_type, &rho_out_values, &rho_out_blindings, pedersen)?;
        let challenge = wellformedness_challenge(pedersen, inputs, outputs, &a_in, &a_out);

        Ok(WellFormednessProof {
            challenge,
            token_type: rho_type + challenge * witness.token_type,
            input_values: sigma::respond(&witness.input_values, &rho_in_values, &challenge)?,
            input_blindings: sigma::respond(
                &witness.input_blindings,
                &rho_in_blindings,
                &challenge,
            )?,
            output_values: sigma::respond(&witness.output_values, &rho_out_values, &challenge)?,
            output_blindings: sigma::respond(
                &witness.output_blindings,
                &rho_out_blindings,
                &challenge,
            )?,
        })
    }

    fn verify(
        &self,
        inputs: &[G1Affine],
        outputs: &[G1Affine],
        pedersen: &PedersenGens<G1Affine>,
    ) -> Result<()> {
        if self.input_values.len() != inputs.len()
            || self.input_blindings.len() != inputs.len()
            || self.output_values.len() != outputs.len()
            || self.output_blindings.len() != outputs.len()
        {
            return Err(Error::Format("well-formedness proof does not match the action".into()));
        }
        if self.input_values.iter().sum::<Fr>() != self.output_values.iter().sum::<Fr>() {
            return Err(Error::ProofInvalid("inputs and outputs differ in value".into()));
        }
        let a_in = recompute(
            inputs,
            self.token_type,
            &self.input_values,
            &self.input_blindings,
            &self.challenge,
            pedersen,
        )?;
        let a_out = recompute(
            outputs,
            self.token_type,
            &self.output_values,
            &self.output_blindings,
            &self.challenge,
            pedersen,
        )?;
        if wellformedness_challenge(pedersen, inputs, outputs, &a_in, &a_out) != self.challenge {
            return Err(Error::ProofInvalid("well-formedness challenge mismatch".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct TransferAction {
    pub inputs: Vec<TransferInput>,
    pub outputs: Vec<Token>,
    pub graph_hiding: bool,
    pub well_formedness: WellFormednessProof,
    pub range_proof: RangeProof,
}

impl TransferAction {
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_redeem_at(&self, index: usize) -> bool {
        self.outputs.get(index).map_or(false, |t| t.is_redeemed())
    }

    pub fn is_graph_hiding(&self) -> bool {
        self.graph_hiding
    }

    /// Keys written when the inputs are spent: the token keys, or their
    /// nullifiers with graph hiding.
    pub fn spent_keys(&self) -> Result<Vec<String>> {
        self.inputs
            .iter()
            .map(|i| {
                if self.graph_hiding {
                    keys::nullifier_key(&i.key)
                } else {
                    Ok(i.key.clone())
                }
            })
            .collect()
    }

    pub fn serialize_output_at(&self, index: usize) -> Result<Vec<u8>> {
        self.outputs
            .get(index)
            .ok_or_else(|| Error::Format(format!("no output at index {}", index)))?
            .to_bytes()
    }

    /// Checks the structure and both proofs. Signatures and ledger state are checked separately.
    pub fn verify_proofs(&self, pp: &PublicParams) -> Result<()> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(Error::Format("transfer needs inputs and outputs".into()));
        }
        if self.graph_hiding != pp.graph_hiding {
            return Err(Error::Format("graph hiding does not match the public parameters".into()));
        }
        for input in &self.inputs {
            keys::split_token_key(&input.key)?;
            if input.token.is_redeemed() {
                return Err(Error::Format("input without owner".into()));
            }
        }
        let inputs: Vec<G1Affine> = self.inputs.iter().map(|i| i.token.data).collect();
        let outputs: Vec<G1Affine> = self.outputs.iter().map(|t| t.data).collect();
        self.well_formedness
            .verify(&inputs, &outputs, &pp.pedersen)
            .map_err(|e| e.context("transfer well-formedness"))?;
        self.range_proof
            .verify(&RangeStatement {
                tokens: &outputs,
                pedersen: &pp.pedersen,
                params: &pp.range,
            })
            .map_err(|e| Error::from(e).context("transfer range proof"))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        util::to_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        util::from_bytes(bytes)
    }
}

/// A token owned by the sender, with its opening and the owner's signer.
pub struct SenderInput<'a> {
    /// Ledger key the token is stored under.
    pub key: String,
    pub token: Token,
    pub opening: TokenDataWitness,
    pub signer: &'a dyn Signer,
}

pub struct Sender<'a> {
    inputs: Vec<SenderInput<'a>>,
}

impl<'a> Sender<'a> {
    pub fn new(inputs: Vec<SenderInput<'a>>) -> Self {
        Sender { inputs }
    }

    /// Spends every input into `outputs`. Owners of empty identity redeem.
    pub fn generate_transfer<R: RngCore + CryptoRng>(
        &self,
        outputs: &[OutputSpec],
        pp: &PublicParams,
        rng: &mut R,
    ) -> Result<(TransferAction, TransferMetadata)> {
        let first = self
            .inputs
            .first()
            .ok_or_else(|| Error::Format("transfer without inputs".into()))?;
        if outputs.is_empty() {
            return Err(Error::Format("transfer without outputs".into()));
        }
        let token_type = first.opening.token_type.as_str();
        if self.inputs.iter().any(|i| i.opening.token_type != token_type)
            || outputs.iter().any(|o| o.token_type != token_type)
        {
            return Err(Error::Format("inputs and outputs must share a type".into()));
        }
        for input in &self.inputs {
            if !input.opening.opens(&input.token, &pp.pedersen)? {
                return Err(Error::Format(format!("opening does not match input {}", input.key)));
            }
        }
        let input_sum = checked_sum(self.inputs.iter().map(|i| i.opening.value))?;
        let output_sum = checked_sum(outputs.iter().map(|o| o.value))?;
        if input_sum != output_sum {
            return Err(Error::Format(format!(
                "inputs sum to {} but outputs sum to {}",
                input_sum, output_sum
            )));
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
        let input_commitments: Vec<G1Affine> = self.inputs.iter().map(|i| i.token.data).collect();
        let output_commitments: Vec<G1Affine> = tokens.iter().map(|t| t.data).collect();

        let witness = WellFormednessWitness {
            token_type: type_scalar(token_type),
            input_values: self.inputs.iter().map(|i| Fr::from(i.opening.value)).collect(),
            input_blindings: self.inputs.iter().map(|i| i.opening.blinding_factor).collect(),
            output_values: openings.iter().map(|w| Fr::from(w.value)).collect(),
            output_blindings: openings.iter().map(|w| w.blinding_factor).collect(),
        };
        let well_formedness = WellFormednessProof::prove(
            &witness,
            &input_commitments,
            &output_commitments,
            &pp.pedersen,
            rng,
        )?;
        let range_proof = RangeProof::prove(
            &RangeWitness {
                token_type: witness.token_type,
                values: openings.iter().map(|w| w.value).collect(),
                blindings: witness.output_blindings.clone(),
            },
            &RangeStatement {
                tokens: &output_commitments,
                pedersen: &pp.pedersen,
                params: &pp.range,
            },
            rng,
        )?;

        let inputs = self
            .inputs
            .iter()
            .map(|i| TransferInput {
                key: i.key.clone(),
                token: i.token.clone(),
            })
            .collect();

        let action = TransferAction {
            inputs,
            outputs: tokens,
            graph_hiding: pp.graph_hiding,
            well_formedness,
            range_proof,
        };
        action.verify_proofs(pp)?;
        debug!(
            "generated transfer action with {} inputs and {} outputs",
            action.num_inputs(),
            action.num_outputs()
        );

        let metadata = TransferMetadata {
            senders: self.inputs.iter().map(|i| i.token.owner.clone()).collect(),
            senders_audit_info: vec![vec![]; self.inputs.len()],
            inputs: self.inputs.iter().map(|i| i.opening.clone()).collect(),
            outputs: openings,
            receivers: outputs.iter().map(|o| o.owner.clone()).collect(),
            receivers_audit_info: vec![vec![]; outputs.len()],
        };
        Ok((action, metadata))
    }

    /// One signature per input, in input order.
    pub fn sign_token_actions(&self, message: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.inputs.iter().map(|i| i.signer.sign(message)).collect()
    }
}

fn checked_sum(values: impl Iterator<Item = u64>) -> Result<u64> {
    let mut sum = 0u64;
    for v in values {
        sum = sum
            .checked_add(v)
            .ok_or_else(|| Error::Format("value sum overflows".into()))?;
    }
    Ok(sum)
}
