use std::sync::Arc;

use tka_portal_client::{MemorySessionStore, PortalClient, SchoolCredentials};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let npsn = std::env::var("TKA_NPSN")?;
    let password = std::env::var("TKA_PASSWORD")?;

    let portal = PortalClient::from_env(Arc::new(MemorySessionStore::new()))?;

    let health = portal.health().await?;
    println!("health: {:?}", health.payload);

    match portal
        .login_school(&SchoolCredentials::new(npsn, password))
        .await
    {
        Ok(session) => println!("signed in, profile: {:?}", session.profile),
        Err(err) => match err.classified() {
            Some(classified) => println!("login failed ({}): {}", classified.kind, classified.message),
            None => return Err(err.into()),
        },
    }

    Ok(())
}
