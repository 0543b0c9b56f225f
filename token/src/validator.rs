//! Verification of token requests against public parameters and ledger state.

use log::{debug, info, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::errors::{Error, Result};
use crate::issue::IssueAction;
use crate::keys;
use crate::ledger::Ledger;
use crate::params::PublicParams;
use crate::request::{Action, TokenRequest};
use crate::signing::{IdentityDeserializer, SchnorrIdentities, SchnorrVerifier, Verifier};
use crate::transfer::TransferAction;
use crate::translator::LedgerRules;

pub struct Validator {
    pp: PublicParams,
    namespace: String,
    identities: Box<dyn IdentityDeserializer>,
}

impl Validator {
    /// A validator for identities that are Schnorr public keys.
    pub fn new(pp: PublicParams, namespace: &str) -> Result<Self> {
        Self::with_identities(pp, namespace, Box::new(SchnorrIdentities))
    }

    pub fn with_identities(
        pp: PublicParams,
        namespace: &str,
        identities: Box<dyn IdentityDeserializer>,
    ) -> Result<Self> {
        pp.validate()?;
        if namespace.is_empty() {
            return Err(Error::Format("empty namespace".into()));
        }
        Ok(Validator {
            pp,
            namespace: namespace.to_string(),
            identities,
        })
    }

    pub fn public_params(&self) -> &PublicParams {
        &self.pp
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn verify_token_request_from_raw<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
        anchor: &str,
        raw: &[u8],
    ) -> Result<Vec<Action>> {
        let request = TokenRequest::from_bytes(raw)?;
        self.verify_token_request(ledger, anchor, &request)
    }

    /// Returns the actions of `request`, issues first, if it can be committed under `anchor`.
    pub fn verify_token_request<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
        anchor: &str,
        request: &TokenRequest,
    ) -> Result<Vec<Action>> {
        keys::validate_anchor(anchor)?;
        debug!("verifying token request with anchor {:?}", anchor);
        let result = self.verify_request(ledger, anchor, request);
        match &result {
            Ok(actions) => info!(
                "token request with anchor {:?} is valid ({} actions)",
                anchor,
                actions.len()
            ),
            Err(e) => warn!("token request with anchor {:?} is invalid: {}", anchor, e),
        }
        result
    }

    fn verify_request<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
        anchor: &str,
        request: &TokenRequest,
    ) -> Result<Vec<Action>> {
        if request.issues.is_empty() && request.transfers.is_empty() {
            return Err(Error::Format("token request without actions".into()));
        }
        let issues = request.issue_actions()?;
        let transfers = request.transfer_actions()?;

        let expected = issues.len() + transfers.iter().map(|t| t.num_inputs()).sum::<usize>();
        if request.signatures.len() != expected {
            return Err(Error::Format(format!(
                "expected {} signatures, got {}",
                expected,
                request.signatures.len()
            )));
        }

        let message = request.message_to_sign(anchor)?;
        self.verify_auditor_signature(&message, &request.auditor_signature)?;
        self.verify_actions(&issues, &transfers, &message, &request.signatures)?;

        let actions: Vec<Action> = issues
            .into_iter()
            .map(Action::Issue)
            .chain(transfers.into_iter().map(Action::Transfer))
            .collect();
        let mut rules = LedgerRules::new(ledger, &self.namespace, anchor, 0);
        rules.check_request()?;
        for (i, action) in actions.iter().enumerate() {
            rules.check(action).map_err(|e| e.context(format!("action {}", i)))?;
        }
        Ok(actions)
    }

    fn verify_auditor_signature(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        match &self.pp.auditor {
            None => Ok(()),
            Some(auditor) => {
                if signature.is_empty() {
                    return Err(Error::AuthorizationDenied("missing auditor signature".into()));
                }
                SchnorrVerifier::from_identity(auditor)?
                    .verify(message, signature)
                    .map_err(|e| e.context("auditor"))
            }
        }
    }

    /// Stateless checks: proofs and signatures of every action.
    fn verify_actions(
        &self,
        issues: &[IssueAction],
        transfers: &[TransferAction],
        message: &[u8],
        signatures: &[Vec<u8>],
    ) -> Result<()> {
        let (issue_signatures, transfer_signatures) = signatures.split_at(issues.len());
        let mut offsets = Vec::with_capacity(transfers.len());
        let mut offset = 0;
        for transfer in transfers {
            offsets.push(offset);
            offset += transfer.num_inputs();
        }

        #[cfg(feature = "parallel")]
        {
            issues
                .par_iter()
                .zip(issue_signatures)
                .enumerate()
                .try_for_each(|(i, (issue, signature))| {
                    self.verify_issue(i, issue, message, signature)
                })?;
            transfers
                .par_iter()
                .zip(&offsets)
                .enumerate()
                .try_for_each(|(i, (transfer, offset))| {
                    let signatures = &transfer_signatures[*offset..*offset + transfer.num_inputs()];
                    self.verify_transfer(i, transfer, message, signatures)
                })?;
        }
        #[cfg(not(feature = "parallel"))]
        {
            issues
                .iter()
                .zip(issue_signatures)
                .enumerate()
                .try_for_each(|(i, (issue, signature))| {
                    self.verify_issue(i, issue, message, signature)
                })?;
            transfers
                .iter()
                .zip(&offsets)
                .enumerate()
                .try_for_each(|(i, (transfer, offset))| {
                    let signatures = &transfer_signatures[*offset..*offset + transfer.num_inputs()];
                    self.verify_transfer(i, transfer, message, signatures)
                })?;
        }
        Ok(())
    }

    fn verify_issue(
        &self,
        i: usize,
        issue: &IssueAction,
        message: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let ctx = || format!("issue action {}", i);
        issue.verify_proof(&self.pp).map_err(|e| e.context(ctx()))?;
        issue
            .verifier(&self.pp, self.identities.as_ref())
            .and_then(|v| v.verify(message, signature))
            .map_err(|e| e.into_denied().context(ctx()))
    }

    fn verify_transfer(
        &self,
        i: usize,
        transfer: &TransferAction,
        message: &[u8],
        signatures: &[Vec<u8>],
    ) -> Result<()> {
        let ctx = || format!("transfer action {}", i);
        transfer.verify_proofs(&self.pp).map_err(|e| e.context(ctx()))?;
        for (j, (input, signature)) in transfer.inputs.iter().zip(signatures).enumerate() {
            self.identities
                .verifier(&input.token.owner)
                .and_then(|v| v.verify(message, signature))
                .map_err(|e| e.into_denied().context(format!("{} input {}", ctx(), j)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;

    #[test]
    fn empty_requests_are_malformed() {
        let pp = PublicParams::setup(4, 2, &mut rand::thread_rng()).unwrap();
        let validator = Validator::new(pp.clone(), "zkat").unwrap();
        assert_eq!(validator.public_params(), &pp);
        assert_eq!(validator.namespace(), "zkat");
        let ledger = MemoryLedger::new();
        assert!(matches!(
            validator.verify_token_request(&ledger, "tx1", &TokenRequest::new()),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            validator.verify_token_request_from_raw(&ledger, "tx1", b"garbage"),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            validator.verify_token_request(&ledger, "", &TokenRequest::new()),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn namespace_is_required() {
        let pp = PublicParams::setup(4, 2, &mut rand::thread_rng()).unwrap();
        assert!(Validator::new(pp, "").is_err());
    }
}
