use crate::form::{Field, FormFields};
use crate::{response, Client, Error, ServiceError, UserId};
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

/// Logged-in session.
///
/// Login itself is not handled here: build a [`Client`], import the cookies of an existing
/// browser session with [`Client::add_cookies`], and call [`Client::session`].
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) client: Client,
    pub(crate) user_id: UserId,
    pub(crate) page_id: Option<UserId>,
    pub(crate) fb_dtsg: Option<String>,
}

/// Extra request parameters for [`Session::fetch`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Query string pairs appended to the URL.
    pub query: Vec<(String, String)>,
    /// Additional request headers.
    pub headers: HeaderMap,
}

/// Profile summary returned by [`Session::user_info`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInfo {
    /// Full display name.
    pub name: String,
    /// First name.
    pub first_name: String,
    /// Username used in the profile URL, if the user picked one.
    pub vanity: Option<String>,
    /// Profile picture thumbnail URL.
    pub thumb_src: Option<String>,
    /// Link to the profile.
    #[serde(rename = "uri")]
    pub profile_url: Option<String>,
    /// Gender code as returned by the service.
    pub gender: Option<i64>,
    /// Profile type, usually `user`, `page` or `friend`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Whether the profile is a friend of the logged-in user.
    #[serde(rename = "is_friend", deserialize_with = "null_as_false")]
    pub is_friend: bool,
    /// Whether it is the user's birthday today.
    #[serde(rename = "is_birthday", deserialize_with = "null_as_false")]
    pub is_birthday: bool,
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

impl Session {
    pub(crate) fn new(client: Client, user_id: UserId) -> Session {
        Session {
            client,
            user_id,
            page_id: None,
            fb_dtsg: None,
        }
    }

    /// Acts as the page `page_id` (which the user must administer) when sending messages.
    #[must_use]
    pub fn with_page(mut self, page_id: impl Into<UserId>) -> Session {
        self.page_id = Some(page_id.into());
        self
    }

    /// Sets the anti-CSRF token sent with every form POST.
    #[must_use]
    pub fn with_dtsg(mut self, fb_dtsg: impl Into<String>) -> Session {
        self.fb_dtsg = Some(fb_dtsg.into());
        self
    }

    /// The id of the logged-in user.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The page this session acts as, if any.
    #[must_use]
    pub fn page_id(&self) -> Option<&UserId> {
        self.page_id.as_ref()
    }

    /// The underlying client, which holds the cookie store.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetches an arbitrary URL with the session's cookies and returns the response unmodified.
    ///
    /// Cookies set by the response are kept. The status is not checked and the body is not read.
    #[tracing::instrument(skip(self, options))]
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<Response, Error> {
        self.client
            .client
            .get(url)
            .query(&options.query)
            .headers(options.headers.clone())
            .send()
            .await
            .map_err(|error| {
                tracing::error!(%error, "fetch failed");
                Error::from(error)
            })
    }

    /// Fetches a URL that answers with JSON, validating the response like every other request.
    #[tracing::instrument(skip(self, options))]
    pub async fn fetch_json(&self, url: &str, options: &FetchOptions) -> Result<Value, Error> {
        let response = self.fetch(url, options).await?;
        let value = response::check(&self.client, &Method::GET, response)
            .await
            .inspect_err(|error| tracing::error!(%error, "fetch_json failed"))?;
        match ServiceError::from_payload(&value) {
            Some(error) => Err(Error::Service(error)),
            None => Ok(value),
        }
    }

    /// Looks up profiles by id. Ids that are not users (threads, unknown ids) are absent from the
    /// returned map.
    #[tracing::instrument(skip(self))]
    pub async fn user_info(&self, ids: &[UserId]) -> Result<HashMap<UserId, UserInfo>, Error> {
        let profiles = match self.profiles(ids).await? {
            Value::Object(profiles) => profiles,
            _ => return Ok(HashMap::new()),
        };
        profiles
            .into_iter()
            .map(|(id, info)| Ok((UserId(id), UserInfo::deserialize(info)?)))
            .collect()
    }

    /// The raw `payload.profiles` object of a `user_info` lookup, or `null`.
    pub(crate) async fn profiles(&self, ids: &[UserId]) -> Result<Value, Error> {
        let mut form = FormFields::new();
        form.set_list(&Field::new("ids"), ids);

        let mut value = self.post_form(self.client.post("chat/user_info/"), form).await?;
        if let Some(error) = ServiceError::from_payload(&value) {
            return Err(Error::Service(error));
        }
        Ok(value
            .pointer_mut("/payload/profiles")
            .map(Value::take)
            .unwrap_or_default())
    }

    /// Fields sent with every form POST.
    pub(crate) fn default_fields(&self) -> FormFields {
        let mut form = FormFields::new();
        form.set("__user", &self.user_id).set("__a", 1);
        if let Some(fb_dtsg) = &self.fb_dtsg {
            form.set("fb_dtsg", fb_dtsg).set("jazoest", jazoest(fb_dtsg));
        }
        form
    }

    /// Sends `form` (plus the default fields) as a urlencoded body and validates the response.
    pub(crate) async fn post_form(
        &self,
        request: RequestBuilder,
        form: FormFields,
    ) -> Result<Value, Error> {
        let mut fields = self.default_fields();
        fields.merge(form);
        tracing::debug!(?fields);

        let response = request.form(&fields).send().await?;
        response::check(&self.client, &Method::POST, response).await
    }
}

/// Checksum of the anti-CSRF token the web client sends alongside it.
fn jazoest(fb_dtsg: &str) -> String {
    let sum: u32 = fb_dtsg.chars().map(u32::from).sum();
    format!("2{sum}")
}
