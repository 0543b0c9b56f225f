//! Token requests, the actions they carry and the metadata exchanged with them.

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use crate::errors::{Error, Result};
use crate::issue::IssueAction;
use crate::params::PublicParams;
use crate::token::TokenDataWitness;
use crate::transfer::TransferAction;
use crate::util;

/// A verified action, in the order it is committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Setup(SetupAction),
    Issue(IssueAction),
    Transfer(TransferAction),
}

impl Action {
    pub fn num_outputs(&self) -> usize {
        match self {
            Action::Setup(_) => 0,
            Action::Issue(issue) => issue.num_outputs(),
            Action::Transfer(transfer) => transfer.num_outputs(),
        }
    }
}

/// Installs new public parameters.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct SetupAction {
    /// Serialized `PublicParams`.
    pub params: Vec<u8>,
}

impl SetupAction {
    pub fn new(pp: &PublicParams) -> Result<Self> {
        Ok(SetupAction {
            params: pp.serialize()?,
        })
    }
}

/// Serialized actions sharing one anchor, with the signatures over them.
#[derive(Clone, Debug, Default, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct TokenRequest {
    pub issues: Vec<Vec<u8>>,
    pub transfers: Vec<Vec<u8>>,
    /// One per issue action, then one per transfer input, in order.
    pub signatures: Vec<Vec<u8>>,
    pub auditor_signature: Vec<u8>,
}

impl TokenRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, action: &IssueAction) -> Result<()> {
        self.issues.push(action.to_bytes()?);
        Ok(())
    }

    pub fn add_transfer(&mut self, action: &TransferAction) -> Result<()> {
        self.transfers.push(action.to_bytes()?);
        Ok(())
    }

    /// The bytes every party signs: the actions bound to `anchor`.
    pub fn message_to_sign(&self, anchor: &str) -> Result<Vec<u8>> {
        let mut message = util::to_bytes(&self.issues)?;
        message.extend(util::to_bytes(&self.transfers)?);
        message.extend(util::to_bytes(&anchor.as_bytes().to_vec())?);
        Ok(message)
    }

    pub fn issue_actions(&self) -> Result<Vec<IssueAction>> {
        self.issues
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                IssueAction::from_bytes(raw).map_err(|e| e.context(format!("issue action {}", i)))
            })
            .collect()
    }

    pub fn transfer_actions(&self) -> Result<Vec<TransferAction>> {
        self.transfers
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                TransferAction::from_bytes(raw)
                    .map_err(|e| e.context(format!("transfer action {}", i)))
            })
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        util::to_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        util::from_bytes(bytes).map_err(|e| e.context("token request"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct IssueMetadata {
    /// Plain issuer identity, or the serialized type pseudonym.
    pub issuer: Vec<u8>,
    pub outputs: Vec<TokenDataWitness>,
    pub receivers: Vec<Vec<u8>>,
    pub receivers_audit_info: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct TransferMetadata {
    pub senders: Vec<Vec<u8>>,
    pub senders_audit_info: Vec<Vec<u8>>,
    pub inputs: Vec<TokenDataWitness>,
    pub outputs: Vec<TokenDataWitness>,
    pub receivers: Vec<Vec<u8>>,
    pub receivers_audit_info: Vec<Vec<u8>>,
}

/// Openings of a request, exchanged out of band and never stored on the ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct TokenRequestMetadata {
    pub issues: Vec<IssueMetadata>,
    pub transfers: Vec<TransferMetadata>,
}

impl TokenRequestMetadata {
    pub fn issuers(&self) -> Vec<&[u8]> {
        self.issues.iter().map(|m| m.issuer.as_slice()).collect()
    }

    /// Receivers of every output, redeemed outputs included as empty identities.
    pub fn receivers(&self) -> Vec<&[u8]> {
        self.issues
            .iter()
            .flat_map(|m| m.receivers.iter())
            .chain(self.transfers.iter().flat_map(|m| m.receivers.iter()))
            .map(|r| r.as_slice())
            .collect()
    }

    pub fn senders(&self) -> Vec<&[u8]> {
        self.transfers
            .iter()
            .flat_map(|m| m.senders.iter())
            .map(|s| s.as_slice())
            .collect()
    }

    /// Openings of every transfer input, in request order.
    pub fn inputs(&self) -> Vec<&TokenDataWitness> {
        self.transfers.iter().flat_map(|m| m.inputs.iter()).collect()
    }

    /// Opening of the `index`-th output of the request, issues first.
    pub fn output_opening(&self, index: usize) -> Result<&TokenDataWitness> {
        self.issues
            .iter()
            .flat_map(|m| m.outputs.iter())
            .chain(self.transfers.iter().flat_map(|m| m.outputs.iter()))
            .nth(index)
            .ok_or_else(|| Error::Format(format!("no output at index {}", index)))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        util::to_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        util::from_bytes(bytes)
    }
}
