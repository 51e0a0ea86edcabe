use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Deserializer, Serialize};

/// The service is inconsistent about whether ids are JSON strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    String(String),
    Unsigned(u64),
    Signed(i64),
}

impl IdRepr {
    fn into_string(self) -> String {
        match self {
            IdRepr::String(s) => s,
            IdRepr::Unsigned(n) => n.to_string(),
            IdRepr::Signed(n) => n.to_string(),
        }
    }
}

macro_rules! id_type {
    ($($(#[$meta:meta])* $name:ident),* $(,)*) => {
        $(
            $(#[$meta])*
            #[derive(
                Clone,
                Debug,
                Default,
                Display,
                Eq,
                From,
                FromStr,
                Hash,
                Into,
                Ord,
                PartialEq,
                PartialOrd,
                Serialize,
            )]
            pub struct $name(pub String);

            impl $name {
                /// Returns the id as a string slice.
                #[must_use]
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl From<&str> for $name {
                fn from(id: &str) -> $name {
                    $name(id.to_owned())
                }
            }

            impl<'de> Deserialize<'de> for $name {
                fn deserialize<D>(deserializer: D) -> Result<$name, D::Error>
                where
                    D: Deserializer<'de>,
                {
                    IdRepr::deserialize(deserializer).map(|id| $name(id.into_string()))
                }
            }
        )*
    };
}

id_type! {
    /// A user (or page) id.
    UserId,
    /// A thread id. One-to-one threads share their id with the other participant.
    ThreadId,
    /// A message id, assigned from the offline threading id of the sent message.
    MessageId,
    /// A sticker id.
    StickerId,
    /// The id of a post (a feed story) that can be commented on.
    PostId,
    /// A comment id, in the service's `post_comment` form.
    CommentId,
}
