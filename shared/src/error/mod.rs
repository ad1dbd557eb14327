//! Unified error system for the edge node
//!
//! - [`AppError`]: closed enum of every failure the core can raise
//! - [`ErrorKind`]: classification used at the boundary (status codes, retry policy)
//! - [`ErrorBody`]: wire format of an error response
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorKind};
//!
//! let err = AppError::not_found("order", "o-1");
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! assert_eq!(err.kind().http_status().as_u16(), 404);
//! ```

mod category;
mod http;
mod types;

pub use category::ErrorKind;
pub use http::ErrorBody;
pub use types::{AppError, AppResult};
