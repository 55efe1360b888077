//! Persistent caches
//!
//! - [`ResponseCache`] remembers API responses by request key, so repeated runs
//!   over an unchanged tree issue no listing calls.
//! - [`CompletionCache`] remembers which bundles were fully assembled, which is
//!   what decides whether a bundle may be skipped. File existence alone is not
//!   enough: a file can exist and still be incomplete.
//!
//! Both load their store fully into memory when opened and write through on
//! every mutation while holding their lock, so concurrent callers never lose
//! an update.

mod completion;
mod response;

pub use completion::CompletionCache;
pub use response::ResponseCache;
