use rand::Rng;
use rand::distr::Alphanumeric;
use snapsecret_spec::Secret;
use std::time::Duration;

pub fn random_text(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Anonymous secret with a random payload and the store's default expiry.
pub fn small_secret() -> anyhow::Result<Secret> {
    Ok(Secret::builder(random_text(24)).build()?)
}

pub fn secret_with_id(id: &str) -> anyhow::Result<Secret> {
    Ok(Secret::builder(random_text(24))
        .id(id)
        .build()?)
}

pub fn secret_with_metadata() -> anyhow::Result<Secret> {
    Ok(Secret::builder(random_text(256))
        .prompt("what is the colour of the door?")
        .answer(random_text(8))
        .expire_in(Duration::from_secs(15 * 60))
        .build()?)
}

pub fn short_lived_secret(expire_in: Duration) -> anyhow::Result<Secret> {
    Ok(Secret::builder(random_text(24))
        .expire_in(expire_in)
        .build()?)
}
