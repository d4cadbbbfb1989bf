//! Story graph preparation library.
//!
//! Turns an interactive-fiction interchange export into a canonical story graph:
//! load source -> repair -> pre-validate -> convert -> schema check -> post-validate.

pub mod convert;
pub mod diagnostics;
pub mod document;
pub mod errors;
pub mod keys;
pub mod links;
pub mod payload;
pub mod pipeline;
pub mod postvalidate;
pub mod prevalidate;
pub mod repair;
pub mod schema;
pub mod source;

pub use convert::*;
pub use diagnostics::*;
pub use document::*;
pub use errors::*;
pub use keys::*;
pub use links::*;
pub use payload::*;
pub use pipeline::*;
pub use postvalidate::*;
pub use prevalidate::*;
pub use repair::*;
pub use schema::*;
pub use source::*;
