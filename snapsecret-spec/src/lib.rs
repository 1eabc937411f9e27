//! Shared contract for SnapSecret: the immutable [`Secret`] entity, the
//! [`SecretsStore`] capability implemented by backends, and the error
//! taxonomy surfaced to transport adapters.

pub mod error;
pub mod id;
pub mod result_ext;
pub mod secret;
pub mod store;

pub use error::{ErrorKind, ErrorResponse, Result, SnapSecretError};
pub use id::{InvalidSecretId, MAX_ID_LEN, SecretId, validate_id};
pub use result_ext::ResultExt;
pub use secret::{InvalidSecret, MAX_EXPIRE_IN, Secret, SecretBuilder};
pub use store::{DEFAULT_EXPIRE_IN, DeleteOutcome, SecretsStore};

pub type DynSecretsStore = std::sync::Arc<dyn SecretsStore>;
