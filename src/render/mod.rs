//! HTML rendering of threads.

pub mod author;
pub mod blocks;
pub mod document;
pub mod emoticon;

pub use author::{Author, AuthorResolver};
pub use blocks::{needs_break, BlockRenderer};
pub use document::{render_document, RenderedPost, RenderedReply};
