#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_field_names)]

pub mod artifacts;
pub mod config;
pub mod deploy;
pub mod error;
pub mod node;
pub mod pipeline;
pub mod raw_invoke;
pub mod results;
pub mod wrapper_invoke;

pub use error::{
    ParityError,
    Result,
};
