#![allow(clippy::must_use_candidate)]

pub mod args;
pub mod vectors;

pub use vectors::{
    DEFAULT_INPUTS,
    TestVector,
    default_vectors,
    reference_hash,
};
