//! Perforce client layer.
//!
//! [`P4Client`] is the blocking workhorse: it shells out to the `p4`
//! binary with tagged output, chunks long argument lists, and turns
//! `fstat` records into [`P4File`]s. [`AsyncP4Client`] runs the same
//! commands through the operation engine so callers never block.

mod async_client;
mod call;
mod error;
mod file;
mod p4;
mod util;
pub mod ztag;

pub use async_client::AsyncP4Client;
pub use call::{Changelist, P4Call, P4Output};
pub use error::{ClientError, Result};
pub use file::{FileStatus, P4File};
pub use p4::{ClientOptions, P4Client};
pub use ztag::TagGroup;
