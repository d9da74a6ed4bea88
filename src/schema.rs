//! Schema registry for siftr logs.
//!
//! This module owns the versioned field maps and the decoders for the two
//! framing records of a log:
//! - `registry`: [`SchemaVersion`] tables, [`index_of`], header and footer decoding.
//! - `types`: decoded [`HeaderInfo`], [`FooterInfo`] and the assembled [`LogSession`].
//! - `flags`: symbolic decoding of the `t_flags` / `t_flags2` bit words.

pub mod flags;
pub mod registry;
pub mod types;

pub use flags::{decode_flags, FlagSpace};
pub use registry::{decode_footer, decode_header, index_of, SchemaVersion};
pub use types::{FooterCounters, FooterInfo, HeaderInfo, LogSession};
