//! Domain types and pure logic for the pokegen image-generation client.
//!
//! Nothing in this crate performs I/O. The REST client lives in
//! `pokegen-client`; the job state machine and poll scheduling live in
//! `pokegen-session`.

pub mod address;
pub mod artifact;
pub mod error;
pub mod job;
pub mod progress;
pub mod types;
