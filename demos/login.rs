//! Logs in and fetches one of the user's boxes.
//!
//! Run with:
//! `ATLAS_USER=alice ATLAS_PASSWORD=... cargo run --example login -- alice/precise64`
//!
//! Set `ATLAS_URL` to talk to a server other than the production endpoint.

use atlas_client::{Client, Error, RequestOptions};

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("atlas_client=debug,login=info")
        .init();

    let mut builder = Client::builder().debug(true);
    if let Ok(url) = std::env::var("ATLAS_URL") {
        builder = builder.base_url(url)?;
    }
    let client = builder.build()?;

    if client.token().is_empty() {
        let user = std::env::var("ATLAS_USER").unwrap_or_default();
        let password = std::env::var("ATLAS_PASSWORD").unwrap_or_default();
        client.login(&user, &password)?;
        println!("Logged in as {}", user);
    }

    let tag = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "hashicorp/precise64".to_string());

    match client.request_json::<serde_json::Value>(
        "GET",
        &format!("/api/v1/box/{}", tag),
        RequestOptions::new(),
    ) {
        Ok(info) => println!("{}", serde_json::to_string_pretty(&info).unwrap_or_default()),
        Err(Error::NotFound) => println!("Box {} does not exist", tag),
        Err(e) => return Err(e),
    }

    Ok(())
}
