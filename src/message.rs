use crate::attachment::batch_file_ids;
use crate::form::{batch, Field, FormFields};
use crate::{
    Attachment, Error, MessageId, ServiceError, Session, ShareParams, StickerId, ThreadId,
    UploadedFile, UserId,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::{self, Display};

/// `error` code the service answers with when the sender is not part of the thread.
pub(crate) const NOT_PART_OF_CONVERSATION: i64 = 1_545_012;

const PROFILE_URI: &str = "https://www.facebook.com/profile.php?id=";

/// Describes a message's contents.
///
/// When you send a message with [`Session::send_message`], the `Message` must be mutable. This is
/// because the [`attachments`][`Message::attachments`] will be marked as uploaded, so sending the
/// same message again doesn't upload them twice.
#[derive(Debug, Default)]
#[must_use]
pub struct Message {
    /// Text of the message.
    pub body: String,
    /// Files sent along with the text.
    pub attachments: Vec<Attachment>,
    /// A sticker sent along with the text.
    pub sticker: Option<StickerId>,
    /// A URL to attach a preview of.
    pub url: Option<String>,
}

impl Message {
    /// A text-only message.
    pub fn new(body: impl Into<String>) -> Message {
        Message {
            body: body.into(),
            ..Message::default()
        }
    }

    /// Returns true if the message has no content (no body, attachments, sticker, or url).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
            && self.attachments.is_empty()
            && self.sticker.is_none()
            && self.url.is_none()
    }
}

/// Where a message goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// A user or an existing thread. Which one is looked up before sending: users get the message
    /// in their one-to-one thread, anything else is treated as a thread id.
    Single(ThreadId),
    /// Starts a new group thread with these users and the sender.
    NewGroup(Vec<UserId>),
}

impl From<ThreadId> for Destination {
    fn from(id: ThreadId) -> Destination {
        Destination::Single(id)
    }
}

impl From<UserId> for Destination {
    fn from(id: UserId) -> Destination {
        Destination::Single(ThreadId(id.0))
    }
}

impl From<&str> for Destination {
    fn from(id: &str) -> Destination {
        Destination::Single(id.into())
    }
}

impl From<Vec<UserId>> for Destination {
    fn from(ids: Vec<UserId>) -> Destination {
        Destination::NewGroup(ids)
    }
}

/// A destination after the user-or-thread lookup. Each variant has its own set of addressing
/// fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Addressing {
    NewGroup(Vec<UserId>),
    User(UserId),
    Thread(ThreadId),
}

impl Display for Addressing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Addressing::NewGroup(ids) => {
                let ids = ids.iter().map(UserId::as_str).collect::<Vec<_>>();
                write!(f, "new group [{}]", ids.join(", "))
            }
            Addressing::User(id) => write!(f, "user {id}"),
            Addressing::Thread(id) => write!(f, "thread {id}"),
        }
    }
}

/// What the service reported about a sent message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageInfo {
    /// The thread the message landed in, if reported.
    pub thread_id: Option<ThreadId>,
    /// The id of the new message.
    pub message_id: MessageId,
    /// When the service recorded the message.
    pub timestamp: DateTime<Utc>,
}

impl Session {
    /// Send a message.
    ///
    /// A link preview is resolved and attachments are uploaded first; if either fails nothing is
    /// sent. The request has no timeout.
    #[tracing::instrument(skip(self, message, destination), fields(to = tracing::field::Empty))]
    pub async fn send_message(
        &self,
        message: &mut Message,
        destination: impl Into<Destination>,
    ) -> Result<MessageInfo, Error> {
        let destination = destination.into();
        tracing::Span::current().record("to", tracing::field::debug(&destination));
        if message.is_empty() {
            return Err(Error::EmptyMessage);
        }
        if message.attachments.iter().any(Attachment::is_failed) {
            return Err(Error::FailedAttachment);
        }
        if matches!(&destination, Destination::NewGroup(ids) if ids.is_empty()) {
            return Err(Error::EmptyGroup);
        }

        let share = match &message.url {
            Some(url) => Some(self.resolve_link(url).await?),
            None => None,
        };
        let files = if message.attachments.is_empty() {
            Vec::new()
        } else {
            self.upload_attachments(&mut message.attachments).await?
        };
        let addressing = self.resolve_addressing(destination).await?;

        let now = Utc::now();
        let offline_threading_id = offline_threading_id(
            now.timestamp_millis(),
            u64::from(uuid::Uuid::new_v4().as_fields().0),
        );
        let outgoing = Outgoing {
            body: &message.body,
            sticker: message.sticker.as_ref(),
            share: share.as_ref(),
            files: &files,
            offline_threading_id,
            timestamp: now,
        };
        let form = compose(self, &outgoing, &addressing);

        let value = self
            .post_form(self.client.post("ajax/mercury/send_messages.php"), form)
            .await
            .inspect_err(|error| tracing::error!(%error, "send_message failed"))?;
        let info = message_info(&value).inspect_err(|error| {
            if error.service_code() == Some(NOT_PART_OF_CONVERSATION) {
                tracing::warn!(
                    %addressing,
                    "got error {NOT_PART_OF_CONVERSATION}; this might mean you're not part of the conversation",
                );
            }
        })?;
        tracing::info!(message_id = %info.message_id);
        Ok(info)
    }

    /// Decides how a destination is addressed, looking up whether a single id is a user.
    pub(crate) async fn resolve_addressing(
        &self,
        destination: Destination,
    ) -> Result<Addressing, Error> {
        match destination {
            Destination::NewGroup(ids) => Ok(Addressing::NewGroup(ids)),
            Destination::Single(id) => {
                let user_id = UserId(id.0.clone());
                let profiles = self.profiles(std::slice::from_ref(&user_id)).await?;
                let is_user = profiles.as_object().is_some_and(|ids| !ids.is_empty());
                Ok(if is_user {
                    Addressing::User(user_id)
                } else {
                    Addressing::Thread(id)
                })
            }
        }
    }
}

/// Everything about an outgoing message that is known once the asynchronous steps are done.
struct Outgoing<'a> {
    body: &'a str,
    sticker: Option<&'a StickerId>,
    share: Option<&'a ShareParams>,
    files: &'a [UploadedFile],
    offline_threading_id: u64,
    timestamp: DateTime<Utc>,
}

/// Builds the whole `send_messages.php` form.
fn compose(session: &Session, outgoing: &Outgoing<'_>, addressing: &Addressing) -> FormFields {
    let mut form = FormFields::new();
    base_fields(&mut form, session, outgoing);
    content_fields(&mut form, outgoing);
    address_fields(&mut form, session, outgoing, addressing);
    if let Some(page_id) = &session.page_id {
        page_fields(&mut form, &session.user_id, page_id);
    }
    form
}

fn base_fields(form: &mut FormFields, session: &Session, outgoing: &Outgoing<'_>) {
    let has_attachment =
        !outgoing.files.is_empty() || outgoing.sticker.is_some() || outgoing.share.is_some();
    form.set("client", "mercury")
        .set(batch("action_type"), "ma-type:user-generated-message")
        .set(batch("author"), format!("fbid:{}", session.user_id))
        .set(batch("timestamp"), outgoing.timestamp.timestamp_millis())
        .set(batch("timestamp_absolute"), "Today")
        .set(batch("source"), "source:chat:web")
        .set(batch("body"), outgoing.body)
        .set(batch("html_body"), false)
        .set(batch("ui_push_phase"), "V3")
        .set(batch("status"), 0)
        .set(batch("offline_threading_id"), outgoing.offline_threading_id)
        .set(batch("message_id"), outgoing.offline_threading_id)
        .set(batch("manual_retry_cnt"), 0)
        .set(batch("has_attachment"), has_attachment);
}

/// Link, sticker and attachment fields. Each is independent of the others.
fn content_fields(form: &mut FormFields, outgoing: &Outgoing<'_>) {
    if let Some(share) = outgoing.share {
        let field = batch("shareable_attachment");
        form.set(field.clone().key("share_type"), 100);
        form.set_json(field.key("share_params"), &share.0);
    }
    if let Some(sticker) = outgoing.sticker {
        form.set(batch("sticker_id"), sticker);
    }
    for (field, id) in batch_file_ids(outgoing.files) {
        form.set(field, id);
    }
}

fn address_fields(
    form: &mut FormFields,
    session: &Session,
    outgoing: &Outgoing<'_>,
    addressing: &Addressing,
) {
    let to_list = batch("specific_to_list");
    let me = format!("fbid:{}", session.user_id);
    match addressing {
        Addressing::NewGroup(ids) => {
            let recipients = ids
                .iter()
                .map(|id| format!("fbid:{id}"))
                .chain(std::iter::once(me));
            form.set_list(&to_list, recipients);
            form.set(
                batch("client_thread_id"),
                format!("root:{}", outgoing.offline_threading_id),
            );
        }
        Addressing::User(id) => {
            form.set_list(&to_list, [format!("fbid:{id}"), me]);
            form.set(batch("other_user_fbid"), id);
        }
        Addressing::Thread(id) => {
            form.set(batch("thread_fbid"), id);
        }
    }
}

/// Rewrites authorship so the message comes from `page_id`, which `user_id` administers.
fn page_fields(form: &mut FormFields, user_id: &UserId, page_id: &UserId) {
    let creator = batch("creator_info");
    form.set(batch("author"), format!("fbid:{page_id}"))
        .set(
            batch("specific_to_list").index(1),
            format!("fbid:{page_id}"),
        )
        .set(creator.clone().key("creatorID"), user_id)
        .set(creator.clone().key("creatorType"), "direct_admin")
        .set(creator.clone().key("labelType"), "sent_message")
        .set(creator.clone().key("pageID"), page_id)
        .set(creator.key("profileURI"), format!("{PROFILE_URI}{user_id}"))
        .set(Field::new("request_user_id"), page_id);
}

/// `(unix_ms << 22) | random22`, the client-side unique id of an outgoing message.
fn offline_threading_id(unix_ms: i64, random: u64) -> u64 {
    (u64::try_from(unix_ms).unwrap_or_default() << 22) | (random & 0x3F_FFFF)
}

#[derive(Deserialize)]
struct Action {
    thread_fbid: Option<ThreadId>,
    other_user_fbid: Option<ThreadId>,
    message_id: Option<MessageId>,
    timestamp: Option<i64>,
}

impl Action {
    fn info(self) -> Option<MessageInfo> {
        Some(MessageInfo {
            thread_id: self.thread_fbid.or(self.other_user_fbid),
            message_id: self.message_id?,
            timestamp: Utc.timestamp_millis_opt(self.timestamp?).single()?,
        })
    }
}

/// Reads the response to `send_messages.php`.
///
/// Only the first action describing a message is used; the service may list more and they are
/// ignored.
fn message_info(value: &Value) -> Result<MessageInfo, Error> {
    if value.is_null() {
        return Err(Error::SendFailed);
    }
    if let Some(error) = ServiceError::from_payload(value) {
        return Err(Error::Service(error));
    }

    let actions = value
        .pointer("/payload/actions")
        .and_then(Value::as_array)
        .ok_or(Error::ResultParse)?;
    if actions.len() > 1 {
        tracing::debug!(count = actions.len(), "using the first of several actions");
    }
    actions
        .iter()
        .find_map(|action| Action::deserialize(action).ok().and_then(Action::info))
        .ok_or(Error::ResultParse)
}

#[cfg(test)]
mod tests {
    use super::{
        compose, message_info, offline_threading_id, Addressing, Destination, Message, Outgoing,
    };
    use crate::{
        Attachment, Client, Error, FileKind, Session, ShareParams, StickerId, ThreadId,
        UploadedFile, UserId,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    const OTID: u64 = 6_979_792_946_938_151_654;

    fn session() -> Session {
        Client::new().session("100")
    }

    fn outgoing<'a>(files: &'a [UploadedFile]) -> Outgoing<'a> {
        Outgoing {
            body: "hello",
            sticker: None,
            share: None,
            files,
            offline_threading_id: OTID,
            timestamp: Utc.timestamp_millis_opt(1_664_000_000_000).unwrap(),
        }
    }

    #[test]
    fn new_group_lists_members_and_self() {
        let form = compose(
            &session(),
            &outgoing(&[]),
            &Addressing::NewGroup(vec![UserId::from("1"), UserId::from("2")]),
        );
        assert_eq!(form.get("message_batch[0][specific_to_list][0]"), Some("fbid:1"));
        assert_eq!(form.get("message_batch[0][specific_to_list][1]"), Some("fbid:2"));
        assert_eq!(form.get("message_batch[0][specific_to_list][2]"), Some("fbid:100"));
        assert_eq!(form.get("message_batch[0][specific_to_list][3]"), None);
        assert_eq!(
            form.get("message_batch[0][client_thread_id]"),
            Some(format!("root:{OTID}").as_str())
        );
        assert!(!form.contains("message_batch[0][thread_fbid]"));
        assert!(!form.contains("message_batch[0][other_user_fbid]"));
    }

    #[test]
    fn single_user_lists_user_and_self() {
        let form = compose(
            &session(),
            &outgoing(&[]),
            &Addressing::User(UserId::from("7")),
        );
        assert_eq!(form.get("message_batch[0][specific_to_list][0]"), Some("fbid:7"));
        assert_eq!(form.get("message_batch[0][specific_to_list][1]"), Some("fbid:100"));
        assert_eq!(form.get("message_batch[0][specific_to_list][2]"), None);
        assert_eq!(form.get("message_batch[0][other_user_fbid]"), Some("7"));
        assert!(!form.contains("message_batch[0][thread_fbid]"));
        assert!(!form.contains("message_batch[0][client_thread_id]"));
    }

    #[test]
    fn existing_thread_has_no_recipient_list() {
        let form = compose(
            &session(),
            &outgoing(&[]),
            &Addressing::Thread(ThreadId::from("1561274830867489")),
        );
        assert_eq!(
            form.get("message_batch[0][thread_fbid]"),
            Some("1561274830867489")
        );
        assert!(!form.contains("message_batch[0][specific_to_list]"));
        assert!(!form.contains("message_batch[0][other_user_fbid]"));
        assert!(!form.contains("request_user_id"));
    }

    #[test]
    fn page_identity_overrides_authorship_in_every_case() {
        let session = session().with_page("555");
        for addressing in [
            Addressing::NewGroup(vec![UserId::from("1"), UserId::from("2")]),
            Addressing::User(UserId::from("7")),
            Addressing::Thread(ThreadId::from("9")),
        ] {
            let form = compose(&session, &outgoing(&[]), &addressing);
            assert_eq!(form.get("message_batch[0][author]"), Some("fbid:555"), "{addressing}");
            assert_eq!(
                form.get("message_batch[0][specific_to_list][1]"),
                Some("fbid:555"),
                "{addressing}"
            );
            assert_eq!(form.get("message_batch[0][creator_info][creatorID]"), Some("100"));
            assert_eq!(form.get("message_batch[0][creator_info][pageID]"), Some("555"));
            assert_eq!(
                form.get("message_batch[0][creator_info][creatorType]"),
                Some("direct_admin")
            );
            assert_eq!(
                form.get("message_batch[0][creator_info][profileURI]"),
                Some("https://www.facebook.com/profile.php?id=100")
            );
            assert_eq!(form.get("request_user_id"), Some("555"));
        }
    }

    #[test]
    fn personal_sessions_author_as_themselves() {
        let form = compose(&session(), &outgoing(&[]), &Addressing::User(UserId::from("7")));
        assert_eq!(form.get("message_batch[0][author]"), Some("fbid:100"));
        assert!(!form.contains("message_batch[0][creator_info]"));
    }

    #[test]
    fn content_handlers_are_independent() {
        let files = [
            UploadedFile {
                kind: FileKind::Image,
                id: "11".into(),
            },
            UploadedFile {
                kind: FileKind::AnimatedImage,
                id: "12".into(),
            },
        ];
        let sticker = StickerId::from("369239263222822");
        let share = ShareParams(json!({"urlInfo": {"canonical": "https://example.com/"}}));
        let mut outgoing = outgoing(&files);
        outgoing.sticker = Some(&sticker);
        outgoing.share = Some(&share);

        let form = compose(&session(), &outgoing, &Addressing::Thread("9".into()));
        assert_eq!(form.get("message_batch[0][sticker_id]"), Some("369239263222822"));
        assert_eq!(
            form.get("message_batch[0][shareable_attachment][share_type]"),
            Some("100")
        );
        assert_eq!(
            form.get("message_batch[0][shareable_attachment][share_params][urlInfo][canonical]"),
            Some("https://example.com/")
        );
        assert_eq!(form.get("message_batch[0][image_ids][0]"), Some("11"));
        assert_eq!(form.get("message_batch[0][gif_ids][0]"), Some("12"));
        assert_eq!(form.get("message_batch[0][has_attachment]"), Some("true"));
        assert_eq!(form.get("message_batch[0][body]"), Some("hello"));
    }

    #[test]
    fn plain_messages_have_no_content_fields() {
        let form = compose(&session(), &outgoing(&[]), &Addressing::Thread("9".into()));
        assert_eq!(form.get("message_batch[0][has_attachment]"), Some("false"));
        assert!(!form.contains("message_batch[0][sticker_id]"));
        assert!(!form.contains("message_batch[0][shareable_attachment]"));
        assert!(!form.contains("message_batch[0][image_ids]"));
    }

    #[test]
    fn offline_threading_id_packs_time_and_randomness() {
        let id = offline_threading_id(1_664_000_000_000, u64::MAX);
        assert_eq!(id >> 22, 1_664_000_000_000);
        assert_eq!(id & 0x3F_FFFF, 0x3F_FFFF);
    }

    #[test]
    fn first_action_wins() {
        let info = message_info(&json!({
            "payload": {"actions": [
                {"thread_fbid": null, "other_user_fbid": 7, "message_id": "mid.1", "timestamp": 1_664_000_000_000_i64},
                {"thread_fbid": "9", "message_id": "mid.2", "timestamp": 1_664_000_000_999_i64},
            ]},
        }))
        .unwrap();
        assert_eq!(info.thread_id, Some(ThreadId::from("7")));
        assert_eq!(info.message_id.as_str(), "mid.1");
        assert_eq!(info.timestamp.timestamp_millis(), 1_664_000_000_000);
    }

    #[test]
    fn actions_without_message_are_skipped() {
        let info = message_info(&json!({
            "payload": {"actions": [
                {"thread_fbid": "9"},
                {"thread_fbid": "9", "message_id": "mid.2", "timestamp": 1},
            ]},
        }))
        .unwrap();
        assert_eq!(info.message_id.as_str(), "mid.2");
    }

    #[test]
    fn response_failures() {
        assert!(matches!(message_info(&json!(null)), Err(Error::SendFailed)));
        assert_eq!(
            message_info(&json!({"error": 1545012, "payload": null}))
                .unwrap_err()
                .service_code(),
            Some(1545012)
        );
        let error = message_info(&json!({"payload": {}})).unwrap_err();
        assert!(error.is_partial_success());
        let error = message_info(&json!({"payload": {"actions": []}})).unwrap_err();
        assert!(error.is_partial_success());
    }

    #[test]
    fn empty_messages() {
        assert!(Message::default().is_empty());
        assert!(!Message::new("hi").is_empty());
        let message = Message {
            attachments: vec![Attachment::new(&b"x"[..], "x".into(), "text/plain".into())],
            ..Message::default()
        };
        assert!(!message.is_empty());
    }

    #[test]
    fn destinations_from_ids() {
        assert_eq!(
            Destination::from("9"),
            Destination::Single(ThreadId::from("9"))
        );
        assert_eq!(
            Destination::from(UserId::from("7")),
            Destination::Single(ThreadId::from("7"))
        );
        assert_eq!(
            Destination::from(vec![UserId::from("1")]),
            Destination::NewGroup(vec![UserId::from("1")])
        );
    }
}
