pub mod storage;
pub mod store;

pub use storage::{CredentialStore, ACCESS_TOKEN_KEY, USER_DATA_KEY};
pub use store::{AuthSession, Principal};
