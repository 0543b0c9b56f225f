//! Turns verified actions into ledger writes.

use std::collections::{BTreeMap, HashSet};

use log::{debug, error};

use crate::errors::{Error, Result};
use crate::issue::IssueAction;
use crate::keys;
use crate::ledger::{Ledger, RwSet};
use crate::params::PublicParams;
use crate::request::{Action, SetupAction};
use crate::token::Token;
use crate::transfer::TransferAction;
use crate::validator::Validator;

/// Sequential ledger checks over the actions of one request.
///
/// The output counter and the set of spent keys run across actions, so
/// actions must be checked in the order they are committed.
pub(crate) struct LedgerRules<'l, L: Ledger + ?Sized> {
    ledger: &'l L,
    namespace: &'l str,
    anchor: &'l str,
    counter: u64,
    spent: HashSet<String>,
}

impl<'l, L: Ledger + ?Sized> LedgerRules<'l, L> {
    pub(crate) fn new(ledger: &'l L, namespace: &'l str, anchor: &'l str, counter: u64) -> Self {
        LedgerRules {
            ledger,
            namespace,
            anchor,
            counter,
            spent: HashSet::new(),
        }
    }

    pub(crate) fn check_request(&self) -> Result<()> {
        let key = keys::token_request_key(self.anchor)?;
        if self.ledger.exists(self.namespace, &key)? {
            return Err(Error::LedgerConflict(format!(
                "token request {} already exists",
                self.anchor
            )));
        }
        Ok(())
    }

    pub(crate) fn check(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Setup(_) => {}
            Action::Issue(issue) => self.check_issue(issue)?,
            Action::Transfer(transfer) => self.check_transfer(transfer)?,
        }
        self.counter += action.num_outputs() as u64;
        Ok(())
    }

    fn check_issue(&self, issue: &IssueAction) -> Result<()> {
        for i in 0..issue.num_outputs() {
            self.check_token_does_not_exist(self.counter + i as u64)?;
        }
        Ok(())
    }

    fn check_transfer(&mut self, transfer: &TransferAction) -> Result<()> {
        for input in &transfer.inputs {
            if !self.spent.insert(input.key.clone()) {
                return Err(Error::LedgerConflict(format!(
                    "input {:?} is spent twice",
                    input.key
                )));
            }
            match self.ledger.get_state(self.namespace, &input.key)? {
                Some(bytes) if !bytes.is_empty() => {
                    if Token::from_bytes(&bytes)? != input.token {
                        return Err(Error::LedgerConflict(format!(
                            "input {:?} does not match the ledger",
                            input.key
                        )));
                    }
                }
                _ => {
                    return Err(Error::LedgerConflict(format!(
                        "input does not exist [{:?}]",
                        input.key
                    )))
                }
            }
            if transfer.is_graph_hiding()
                && self
                    .ledger
                    .exists(self.namespace, &keys::nullifier_key(&input.key)?)?
            {
                return Err(Error::LedgerConflict(format!(
                    "input is already spent [{:?}]",
                    input.key
                )));
            }
        }
        for i in 0..transfer.num_outputs() {
            if !transfer.is_redeem_at(i) {
                self.check_token_does_not_exist(self.counter + i as u64)?;
            }
        }
        Ok(())
    }

    fn check_token_does_not_exist(&self, index: u64) -> Result<()> {
        let key = keys::token_key(self.anchor, index)?;
        if self.ledger.exists(self.namespace, &key)? {
            return Err(Error::LedgerConflict(format!("token already exists: {:?}", key)));
        }
        Ok(())
    }
}

/// Writes the actions of one request under its anchor.
pub struct Translator<'a, R: RwSet + ?Sized> {
    rwset: &'a mut R,
    namespace: String,
    anchor: String,
    counter: u64,
}

fn action_tag(action: &str) -> Option<BTreeMap<String, Vec<u8>>> {
    let mut tags = BTreeMap::new();
    tags.insert(keys::ACTION.to_string(), action.as_bytes().to_vec());
    Some(tags)
}

impl<'a, R: RwSet + ?Sized> Translator<'a, R> {
    pub fn new(rwset: &'a mut R, namespace: &str, anchor: &str) -> Result<Self> {
        keys::validate_anchor(anchor)?;
        Ok(Translator {
            rwset,
            namespace: namespace.to_string(),
            anchor: anchor.to_string(),
            counter: 0,
        })
    }

    /// Checks `action` against the current state, then commits it.
    pub fn write(&mut self, action: &Action) -> Result<()> {
        debug!("checking action with anchor {:?}", self.anchor);
        LedgerRules::new(&*self.rwset, &self.namespace, &self.anchor, self.counter).check(action)?;
        self.commit_action(action).map_err(|e| {
            error!("error committing action with anchor {:?}: {}", self.anchor, e);
            e
        })
    }

    /// Checks every action before committing any of them.
    pub fn write_all(&mut self, actions: &[Action]) -> Result<()> {
        {
            let mut rules =
                LedgerRules::new(&*self.rwset, &self.namespace, &self.anchor, self.counter);
            for action in actions {
                rules.check(action)?;
            }
        }
        for action in actions {
            self.commit_action(action)?;
        }
        debug!("committed {} actions with anchor {:?}", actions.len(), self.anchor);
        Ok(())
    }

    /// Records the raw request under its anchor.
    pub fn commit_token_request(&mut self, raw: &[u8]) -> Result<()> {
        let key = keys::token_request_key(&self.anchor)?;
        if self.rwset.exists(&self.namespace, &key)? {
            return Err(Error::LedgerConflict(format!(
                "token request with anchor {:?} already exists",
                self.anchor
            )));
        }
        self.rwset
            .set_state(&self.namespace, &key, raw.to_vec())
            .map_err(|e| e.context(format!("failed to write token request {:?}", self.anchor)))
    }

    fn commit_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Setup(setup) => self.commit_setup_action(setup)?,
            Action::Issue(issue) => self.commit_issue_action(issue)?,
            Action::Transfer(transfer) => self.commit_transfer_action(transfer)?,
        }
        self.counter += action.num_outputs() as u64;
        Ok(())
    }

    fn commit_setup_action(&mut self, setup: &SetupAction) -> Result<()> {
        PublicParams::deserialize(&setup.params)?;
        let key = keys::setup_key()?;
        self.rwset.set_state(&self.namespace, &key, setup.params.clone())
    }

    fn commit_issue_action(&mut self, issue: &IssueAction) -> Result<()> {
        for (i, output) in issue.outputs.iter().enumerate() {
            let key = keys::token_key(&self.anchor, self.counter + i as u64)?;
            self.rwset.set_state(&self.namespace, &key, output.to_bytes()?)?;
            self.rwset
                .set_state_metadata(&self.namespace, &key, action_tag(keys::ACTION_ISSUE))?;
        }
        Ok(())
    }

    /// Redeemed outputs are not stored but still take up an index.
    fn commit_transfer_action(&mut self, transfer: &TransferAction) -> Result<()> {
        for i in 0..transfer.num_outputs() {
            if transfer.is_redeem_at(i) {
                continue;
            }
            let key = keys::token_key(&self.anchor, self.counter + i as u64)?;
            self.rwset
                .set_state(&self.namespace, &key, transfer.serialize_output_at(i)?)?;
            self.rwset
                .set_state_metadata(&self.namespace, &key, action_tag(keys::ACTION_TRANSFER))?;
        }
        self.spend_tokens(&transfer.spent_keys()?, transfer.is_graph_hiding())
    }

    fn spend_tokens(&mut self, keys: &[String], graph_hiding: bool) -> Result<()> {
        for key in keys {
            if graph_hiding {
                debug!("add nullifier {:?}", key);
                self.rwset
                    .set_state(&self.namespace, key, b"true".to_vec())
                    .map_err(|e| e.context(format!("failed to add nullifier {:?}", key)))?;
            } else {
                debug!("delete state {:?}", key);
                self.rwset.delete_state(&self.namespace, key)?;
                self.rwset.set_state_metadata(&self.namespace, key, None)?;
            }
        }
        Ok(())
    }

    pub fn read_setup_parameters(&self) -> Result<Option<Vec<u8>>> {
        let key = keys::setup_key()?;
        self.rwset
            .get_state(&self.namespace, &key)
            .map_err(|e| e.context("failed to get setup parameters"))
    }

    /// Serialized tokens stored under `(anchor, index)`. Fails if any is missing.
    pub fn query_tokens(&self, ids: &[(&str, u64)]) -> Result<Vec<Vec<u8>>> {
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for (anchor, index) in ids {
            let key = keys::token_key(anchor, *index)?;
            debug!("query state [{}:{}]", anchor, index);
            match self.rwset.get_state(&self.namespace, &key)? {
                Some(bytes) if !bytes.is_empty() => found.push(bytes),
                _ => missing.push(format!("{}:{}", anchor, index)),
            }
        }
        if !missing.is_empty() {
            return Err(Error::LedgerConflict(format!(
                "tokens do not exist [{}]",
                missing.join(", ")
            )));
        }
        Ok(found)
    }
}

/// Validates `raw` against `rwset` and commits it. Nothing is written if any check fails.
pub fn apply_token_request<R: RwSet + ?Sized>(
    validator: &Validator,
    rwset: &mut R,
    anchor: &str,
    raw: &[u8],
) -> Result<Vec<Action>> {
    let actions = validator.verify_token_request_from_raw(&*rwset, anchor, raw)?;
    let mut translator = Translator::new(rwset, validator.namespace(), anchor)?;
    translator.write_all(&actions)?;
    translator.commit_token_request(raw)?;
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;

    #[test]
    fn setup_parameters_are_stored() {
        let mut rng = rand::thread_rng();
        let pp = PublicParams::setup(4, 2, &mut rng).unwrap();
        let mut ledger = MemoryLedger::new();
        let mut translator = Translator::new(&mut ledger, "zkat", "init").unwrap();
        assert_eq!(translator.read_setup_parameters().unwrap(), None);
        translator
            .write(&Action::Setup(SetupAction::new(&pp).unwrap()))
            .unwrap();
        let raw = translator.read_setup_parameters().unwrap().unwrap();
        assert_eq!(PublicParams::deserialize(&raw).unwrap(), pp);

        let bogus = Action::Setup(SetupAction { params: vec![1, 2] });
        assert!(matches!(translator.write(&bogus), Err(Error::Format(_))));
    }

    #[test]
    fn request_is_recorded_once() {
        let mut ledger = MemoryLedger::new();
        let mut translator = Translator::new(&mut ledger, "zkat", "tx1").unwrap();
        translator.commit_token_request(b"raw").unwrap();
        assert!(matches!(
            translator.commit_token_request(b"raw"),
            Err(Error::LedgerConflict(_))
        ));
        assert!(LedgerRules::new(&ledger, "zkat", "tx1", 0).check_request().is_err());
        assert!(LedgerRules::new(&ledger, "zkat", "tx2", 0).check_request().is_ok());
    }

    #[test]
    fn queries_report_missing_tokens() {
        let mut ledger = MemoryLedger::new();
        let key = keys::token_key("tx1", 0).unwrap();
        ledger.set_state("zkat", &key, vec![7]).unwrap();
        let translator = Translator::new(&mut ledger, "zkat", "tx2").unwrap();
        assert_eq!(translator.query_tokens(&[("tx1", 0)]).unwrap(), vec![vec![7]]);
        assert!(matches!(
            translator.query_tokens(&[("tx1", 0), ("tx1", 1)]),
            Err(Error::LedgerConflict(_))
        ));
    }

    #[test]
    fn anchors_are_validated() {
        let mut ledger = MemoryLedger::new();
        assert!(matches!(Translator::new(&mut ledger, "zkat", ""), Err(Error::Format(_))));
        assert!(matches!(
            Translator::new(&mut ledger, "zkat", "a\u{0}b"),
            Err(Error::Format(_))
        ));
    }
}
