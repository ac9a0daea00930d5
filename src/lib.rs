//! Tieba thread archiver library.
//!
//! Fetches a thread's posts and replies from a HibiAPI daemon and renders
//! them into one self-contained HTML document, resolving embedded media by
//! leaving it remote, inlining it, or downloading it next to the document.

pub mod archiver;
pub mod config;
pub mod constants;
pub mod media;
pub mod output;
pub mod render;
pub mod tieba;
pub mod transport;
