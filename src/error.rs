//! Fatal, startup-only errors.
//!
//! Grounded on
//! `rayhunter::analysis::information_element::InformationElementError`: a
//! small `thiserror` enum for the one kind of failure this crate considers
//! worth a `Result` instead of silent absorption. Per-message conditions
//! (missing fields, unknown causes, out-of-window observations, sink write
//! failures) never produce an error value anywhere in this crate — they are
//! handled in place.

use thiserror::Error;

/// Errors that can only occur while an embedding program is assembling its
/// [`crate::dispatcher::Dispatcher`], never while messages are flowing.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// `Dispatcher::register` was called twice with an analyzer reporting
    /// the same name. A
    /// programmer error; the embedding program should treat this as fatal
    /// at startup rather than attempt recovery.
    #[error("analyzer {0:?} is already registered")]
    DuplicateAnalyzer(String),
}
