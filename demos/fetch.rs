#![deny(elided_lifetimes_in_paths)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result};
use mercury::{Client, FetchOptions};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let user_id = std::env::var("FB_USER_ID")?;
    let cookies = std::env::var("FB_COOKIES")?;
    let url = std::env::args().nth(1).context("usage: fetch URL")?;

    let client = Client::new();
    client.add_cookies(&cookies);
    let session = client.session(user_id);

    let response = session.fetch(&url, &FetchOptions::default()).await?;
    println!("{}", response.status());
    println!("{}", response.text().await?);

    Ok(())
}
