use snapsecret_core::{MemoryStore, Secret, SnapSecretEngine};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let engine = SnapSecretEngine::new(MemoryStore::new());

    let secret = Secret::builder("db-password: correct-horse-battery-staple")
        .prompt("which office did we meet in?")
        .answer("lisbon")
        .expire_in(Duration::from_secs(15 * 60))
        .build()?;
    let id = engine.submit(secret).await?;
    println!("share this id: {id}");

    let first = engine.access(&id).await?;
    println!("first access returned {} chars", first.text().len());

    match engine.access(&id).await {
        Ok(_) => println!("second access unexpectedly succeeded"),
        Err(err) => println!("second access: {err}"),
    }
    Ok(())
}
