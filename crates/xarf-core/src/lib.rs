//! # xarf-core: Foundational Types for XARF v4
//!
//! The leaf of the workspace: the typed report model, contact and evidence
//! records, timestamps, evidence digests, and the single [`XarfError`]
//! type every other crate returns.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `xarf-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - Nothing here knows about the schema bundle. Vocabulary checks
//!   (categories, types, evidence sources) belong to `xarf-schema`.

pub mod digest;
pub mod error;
pub mod report;
pub mod temporal;

pub use digest::{evidence_hash, hash_hex, is_evidence_hash, HashAlgorithm, HASH_PATTERN};
pub use error::XarfError;
pub use report::{
    is_v4_version, BaseReport, ConnectionReport, ContactInfo, ContentReport, EvidenceItem,
    MessagingReport, Report, ReportBase, VERSION_PATTERN, XARF_VERSION,
};
pub use temporal::Timestamp;
