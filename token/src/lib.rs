pub mod util;

mod errors;

pub mod anonym;
pub mod audit;
pub mod issue;
pub mod keys;
pub mod ledger;
pub mod params;
pub mod request;
pub mod signing;
pub mod token;
pub mod transfer;
pub mod translator;
pub mod validator;

pub use crate::errors::{Error, Result};
pub use crate::params::PublicParams;
pub use crate::request::{Action, TokenRequest, TokenRequestMetadata};
pub use crate::token::{OutputSpec, Token, TokenDataWitness};
pub use crate::translator::{apply_token_request, Translator};
pub use crate::validator::Validator;
