#![deny(elided_lifetimes_in_paths)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result};
use mercury::{Client, PostId};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let user_id = std::env::var("FB_USER_ID")?;
    let cookies = std::env::var("FB_COOKIES")?;
    let fb_dtsg = std::env::var("FB_DTSG")?;
    let post_id = PostId(
        std::env::args()
            .nth(1)
            .context("usage: comment POST_ID TEXT")?,
    );
    let text = std::env::args()
        .nth(2)
        .context("usage: comment POST_ID TEXT")?;

    let client = Client::new();
    client.add_cookies(&cookies);
    let session = client.session(user_id).with_dtsg(fb_dtsg);

    match session.send_comment(&post_id, &text).await {
        Ok(comment) => println!("{comment:#?}"),
        Err(err) if err.is_partial_success() => println!("posted, but: {err}"),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
