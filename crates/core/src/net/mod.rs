//! Request and response model shared by the cache, the network client and the router.

pub mod request;
pub mod response;
pub mod url;

pub use request::Request;
pub use response::{Response, ResponseType};
pub use self::url::{UrlError, canonicalize, resolve};
