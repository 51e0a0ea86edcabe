#![deny(elided_lifetimes_in_paths)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result};
use mercury::{Attachment, Client, Message};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let user_id = std::env::var("FB_USER_ID")?;
    let cookies = std::env::var("FB_COOKIES")?;
    let fb_dtsg = std::env::var("FB_DTSG")?;
    let mut args = std::env::args().skip(1);
    let thread = args.next().context("usage: send THREAD_OR_USER_ID [FILE]")?;

    let client = Client::new();
    client.add_cookies(&cookies);
    let mut session = client.session(user_id).with_dtsg(fb_dtsg);
    if let Ok(page_id) = std::env::var("FB_PAGE_ID") {
        session = session.with_page(page_id);
    }

    let mut message = Message::new("test from mercury");
    if let Some(path) = args.next() {
        message
            .attachments
            .push(Attachment::new_from_file(path, "application/octet-stream".into()).await?);
    }

    let info = session.send_message(&mut message, thread.as_str()).await?;
    println!("{info:#?}");

    Ok(())
}
