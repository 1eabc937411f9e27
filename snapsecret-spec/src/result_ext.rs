use crate::error::{ErrorKind, Result, SnapSecretError};

/// Translate foreign failures into the shared taxonomy, keeping the cause.
pub trait ResultExt<T> {
    fn or_kind(self, kind: ErrorKind, message: &str) -> Result<T>;

    fn or_provider_request(self, message: &str) -> Result<T>
    where
        Self: Sized,
    {
        self.or_kind(ErrorKind::ProviderRequestError, message)
    }

    fn or_unknown(self, message: &str) -> Result<T>
    where
        Self: Sized,
    {
        self.or_kind(ErrorKind::Unknown, message)
    }
}

impl<T, E> ResultExt<T> for core::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn or_kind(self, kind: ErrorKind, message: &str) -> Result<T> {
        self.map_err(|err| {
            SnapSecretError::new(kind)
                .with_user_message(message)
                .with_cause(err)
        })
    }
}
