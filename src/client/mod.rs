//! Client side of the API: the persisted session cache and an HTTP client that uses it.

pub mod connectivity;
pub mod session_cache;

pub use connectivity::{ApiClient, ClientError, ClientResult};
pub use session_cache::{
    ClientSession, FileStorage, LoginRedirect, MemoryStorage, SessionCache, SessionStorage, LOGIN_PATH,
};
