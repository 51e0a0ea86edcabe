//! mercury is a client for facebook.com's web chat ("mercury") endpoints: sending messages with
//! attachments, stickers and link previews, commenting on posts, and fetching pages through a
//! logged-in session.
//!
//! ```no_run
//! use mercury::{Attachment, Client, Destination, Message, UserId};
//!
//! # async fn f() -> Result<(), Box<dyn std::error::Error>> {
//! // Resume a browser session
//! let client = Client::new();
//! client.add_cookies("c_user=100009549611907; xs=...; datr=...");
//! let session = client.session("100009549611907").with_dtsg("AQHoUyTk1-oW:AQF2L9LimP2Z");
//!
//! // Say hello, with a picture
//! let mut message = Message {
//!     body: "hello from mercury!".into(),
//!     attachments: vec![Attachment::new(
//!         std::fs::read("uh-oh.png")?,
//!         "uh-oh.png".into(),
//!         "image/png".into(),
//!     )],
//!     ..Default::default()
//! };
//! let info = session.send_message(&mut message, "1561274830867489").await?;
//!
//! // Start a group thread
//! let group = Destination::NewGroup(vec![UserId::from("4"), UserId::from("5")]);
//! session.send_message(&mut Message::new("hi all"), group).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Requests have no timeout and are never retried. Wrap calls in `tokio::time::timeout` if a hung
//! connection must not hang the caller.

#![deny(elided_lifetimes_in_paths)]
#![warn(clippy::pedantic, missing_docs)]
#![allow(clippy::missing_errors_doc)]

mod attachment;
mod client;
mod comment;
mod error;
mod form;
mod id;
mod link;
mod message;
mod response;
mod session;

pub use crate::attachment::{Attachment, FileKind, UploadedFile};
pub use crate::client::Client;
pub use crate::comment::CommentInfo;
pub use crate::error::{Error, ServiceError};
pub use crate::id::{CommentId, MessageId, PostId, StickerId, ThreadId, UserId};
pub use crate::link::ShareParams;
pub use crate::message::{Destination, Message, MessageInfo};
pub use crate::session::{FetchOptions, Session, UserInfo};
