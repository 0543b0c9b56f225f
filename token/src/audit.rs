//! The auditor opens every token of a request and endorses it with a signature.

use ark_bn254::G1Affine;
use log::debug;
use zkat_proofs::PedersenGens;

use crate::errors::{Error, Result};
use crate::params::PublicParams;
use crate::request::{TokenRequest, TokenRequestMetadata};
use crate::signing::{Identity, SchnorrSigner, Signer};
use crate::token::{Token, TokenDataWitness};

pub struct Auditor {
    pp: PublicParams,
    signer: SchnorrSigner,
}

fn check_openings(
    what: &str,
    tokens: &[&Token],
    openings: &[&TokenDataWitness],
    owners: &[&[u8]],
    pedersen: &PedersenGens<G1Affine>,
) -> Result<()> {
    if tokens.len() != openings.len() || tokens.len() != owners.len() {
        return Err(Error::Format(format!(
            "{} tokens for {} openings and {} owners",
            tokens.len(),
            openings.len(),
            owners.len()
        )));
    }
    for (i, ((token, opening), owner)) in tokens.iter().zip(openings).zip(owners).enumerate() {
        if !opening.opens(token, pedersen)? {
            return Err(Error::ProofInvalid(format!("{} {} does not match its opening", what, i)));
        }
        if token.owner != *owner {
            return Err(Error::Format(format!("{} {} has an unexpected owner", what, i)));
        }
    }
    Ok(())
}

impl Auditor {
    pub fn new(pp: PublicParams, signer: SchnorrSigner) -> Self {
        Auditor { pp, signer }
    }

    /// The identity to register with `PublicParams::set_auditor`.
    pub fn identity(&self) -> Identity {
        self.signer.identity()
    }

    /// Checks that `metadata` opens every token of `request`.
    pub fn check(&self, request: &TokenRequest, metadata: &TokenRequestMetadata) -> Result<()> {
        let issues = request.issue_actions()?;
        let transfers = request.transfer_actions()?;
        if issues.len() != metadata.issues.len() || transfers.len() != metadata.transfers.len() {
            return Err(Error::Format("metadata does not match the request".into()));
        }
        for (i, (action, issuer)) in issues.iter().zip(metadata.issuers()).enumerate() {
            if action.issuer.to_bytes()? != issuer {
                return Err(Error::Format(format!("issue {} has an unexpected issuer", i)));
            }
        }
        let inputs: Vec<&Token> = transfers
            .iter()
            .flat_map(|t| t.inputs.iter().map(|input| &input.token))
            .collect();
        check_openings(
            "input",
            &inputs,
            &metadata.inputs(),
            &metadata.senders(),
            &self.pp.pedersen,
        )?;
        let outputs: Vec<&Token> = issues
            .iter()
            .flat_map(|a| a.outputs.iter())
            .chain(transfers.iter().flat_map(|t| t.outputs.iter()))
            .collect();
        let openings = (0..outputs.len())
            .map(|i| metadata.output_opening(i))
            .collect::<Result<Vec<_>>>()?;
        check_openings(
            "output",
            &outputs,
            &openings,
            &metadata.receivers(),
            &self.pp.pedersen,
        )?;
        debug!(
            "audited request with {} issues and {} transfers",
            issues.len(),
            transfers.len()
        );
        Ok(())
    }

    /// Audits `request` and signs it for `anchor`.
    pub fn endorse(
        &self,
        request: &mut TokenRequest,
        metadata: &TokenRequestMetadata,
        anchor: &str,
    ) -> Result<()> {
        self.check(request, metadata)?;
        request.auditor_signature = self.signer.sign(&request.message_to_sign(anchor)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Issuer;
    use crate::token::OutputSpec;

    #[test]
    fn audit_catches_wrong_openings() {
        let mut rng = rand::thread_rng();
        let pp = PublicParams::setup(16, 2, &mut rng).unwrap();
        let auditor = Auditor::new(pp.clone(), SchnorrSigner::generate(&mut rng));
        let issuer = Issuer::Plain(SchnorrSigner::generate(&mut rng));
        let (action, issue_metadata, _) = issuer
            .generate_issue(&[OutputSpec::new("ABC", 7, b"alice")], &pp, &mut rng)
            .unwrap();
        let mut request = TokenRequest::new();
        request.add_issue(&action).unwrap();
        let mut metadata = TokenRequestMetadata {
            issues: vec![issue_metadata],
            transfers: vec![],
        };
        auditor.endorse(&mut request, &metadata, "tx1").unwrap();
        assert!(!request.auditor_signature.is_empty());

        metadata.issues[0].outputs[0].value = 8;
        assert!(matches!(
            auditor.check(&request, &metadata),
            Err(Error::ProofInvalid(_))
        ));
        metadata.issues.clear();
        assert!(matches!(auditor.check(&request, &metadata), Err(Error::Format(_))));
    }
}
