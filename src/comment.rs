use crate::form::FormFields;
use crate::{CommentId, Error, PostId, ServiceError, Session, UserId};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

/// `error` code the service answers with when the post can't be seen by the commenter.
pub(crate) const POST_NOT_VISIBLE: i64 = 1_357_006;

/// Where the created comment sits in the response. The outer layers are a generic module-loader
/// call, so this changes whenever the web client does.
const COMMENT_POINTER: &str = "/jsmods/require/1/3/1/comments/0";

/// A comment as reported back by the service after posting it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentInfo {
    /// Comment id, in `postid_commentid` form.
    pub id: CommentId,
    /// Numeric id of the comment object.
    pub fbid: CommentId,
    /// The comment text as stored.
    pub text: String,
    /// Who wrote the comment.
    pub author: UserId,
    /// When the comment was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Comment on a post.
    ///
    /// If this returns [`Error::ResultParse`] the comment was posted but couldn't be read back.
    #[tracing::instrument(skip(self, text))]
    pub async fn send_comment(&self, post_id: &PostId, text: &str) -> Result<CommentInfo, Error> {
        if text.is_empty() {
            return Err(Error::EmptyComment);
        }

        let form = comment_form(&self.user_id, post_id, text, Utc::now().timestamp_millis());
        let request = self
            .client
            .post("ufi/add/comment/")
            .query(&[("__pc", "PHASED:DEFAULT"), ("dpr", "1")]);
        let value = self
            .post_form(request, form)
            .await
            .inspect_err(|error| tracing::error!(%error, "send_comment failed"))?;

        if value.is_null() {
            return Err(Error::SendFailed);
        }
        if let Some(error) = ServiceError::from_payload(&value) {
            if error.code == Some(POST_NOT_VISIBLE) {
                tracing::warn!(
                    %post_id,
                    "got error {POST_NOT_VISIBLE}; this might mean you're not allowed to view the post",
                );
            }
            return Err(Error::Service(error));
        }

        let comment = extract_comment(&value).ok_or(Error::ResultParse)?;
        tracing::info!(comment_id = %comment.id);
        Ok(comment)
    }
}

fn comment_form(user_id: &UserId, post_id: &PostId, text: &str, unix_ms: i64) -> FormFields {
    let feed_context = json!({
        "is_viewer_page_admin": false,
        "is_notification_preview": false,
        "autoplay_with_channelview_or_snowlift": false,
        "fbfeed_context": true,
        "location_type": 5,
        "outer_object_element_id": "u_0_v",
        "object_element_id": "u_0_v",
        "is_ad_preview": false,
        "is_editable": false,
        "shimparams": {
            "page_type": 16,
            "actor_id": user_id,
            "story_id": post_id,
            "ad_id": 0,
            "_ft_": "",
            "location": "permalink",
        },
        "story_id": "u_0_w",
        "caret_id": "u_0_x",
        "__IS_INSIDE_UI_FEEDBACK_FORM__": true,
    });

    let mut form = FormFields::new();
    form.set("ft_ent_identifier", post_id)
        .set("comment_text", text)
        .set("source", 2)
        .set("client_id", format!("{unix_ms}:3232759813"))
        .set("feed_context", feed_context)
        .set("av", user_id);
    form
}

#[derive(Deserialize)]
struct RawComment {
    id: CommentId,
    fbid: CommentId,
    body: RawBody,
    author: UserId,
    timestamp: RawTimestamp,
}

#[derive(Deserialize)]
struct RawBody {
    text: String,
}

#[derive(Deserialize)]
struct RawTimestamp {
    time: i64,
}

/// Finds the created comment in an `add/comment` response.
fn extract_comment(value: &Value) -> Option<CommentInfo> {
    let raw = RawComment::deserialize(value.pointer(COMMENT_POINTER)?).ok()?;
    Some(CommentInfo {
        id: raw.id,
        fbid: raw.fbid,
        text: raw.body.text,
        author: raw.author,
        created_at: Utc.timestamp_opt(raw.timestamp.time, 0).single()?,
    })
}
