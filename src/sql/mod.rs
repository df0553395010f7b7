//! SQL extraction and read-only validation of model output.

pub mod extract;
pub mod validator;

pub use validator::{
    Rejection, RejectionKind, SqlValidator, StatementKind, ValidatedQuery, Verdict,
};
