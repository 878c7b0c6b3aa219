//! TFHE-rs implementation
//!
//! Production ciphertext backend using the TFHE-rs high-level API.

mod backend;
mod ciphertext;
mod keys;
mod operations;

pub use backend::TfheBackend;
pub use ciphertext::FHEValue;
pub use keys::{ClientKey, KeySet, PublicKey, ServerKey};
pub use operations::FHEOps;
