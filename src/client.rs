use crate::{Error, Session, UserId};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::RequestBuilder;
use std::sync::Arc;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.facebook.com/";
const DEFAULT_UPLOAD_URL: &str = "https://upload.facebook.com/";

macro_rules! request_impl {
    ($($f:ident),* $(,)*) => {
        $(
            #[inline]
            pub(crate) fn $f(&self, path: &str) -> RequestBuilder {
                tracing::info!(path, concat!("Client::", stringify!($f)));
                self.client.$f(format!("{}{}", self.base_url, path))
            }
        )*
    };
}

/// HTTP client bound to a shared cookie store.
///
/// Every response's `Set-Cookie` headers are added to the store; nothing is ever removed from it.
/// Clones share the store.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) base_url: Url,
    pub(crate) upload_url: Url,
    pub(crate) client: reqwest::Client,
    pub(crate) jar: Arc<Jar>,
}

impl Client {
    /// Creates a new `Client` with the default base URL, `https://www.facebook.com/`, and upload
    /// URL, `https://upload.facebook.com/`. Use [`Client::with_base_url`] and
    /// [`Client::with_upload_url`] to change them.
    #[must_use]
    #[allow(clippy::missing_panics_doc)] // tested to not panic
    pub fn new() -> Client {
        const USER_AGENT: &str = concat!(
            "Mozilla/5.0 (X11; Linux x86_64) mercury-rs/",
            env!("CARGO_PKG_VERSION"),
        );

        let jar = Arc::new(Jar::default());
        Client {
            base_url: Url::parse(DEFAULT_BASE_URL).unwrap(),
            upload_url: Url::parse(DEFAULT_UPLOAD_URL).unwrap(),
            client: reqwest::Client::builder()
                .cookie_provider(Arc::clone(&jar))
                .user_agent(USER_AGENT)
                .build()
                .unwrap(),
            jar,
        }
    }

    /// Replaces the base URL used for every request except attachment uploads.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Client, Error> {
        self.base_url = parse_base(base_url)?;
        Ok(self)
    }

    /// Replaces the base URL used for attachment uploads.
    pub fn with_upload_url(mut self, upload_url: &str) -> Result<Client, Error> {
        self.upload_url = parse_base(upload_url)?;
        Ok(self)
    }

    /// Imports cookies from an existing browser session, in `Cookie` header form
    /// (`c_user=...; xs=...; datr=...`).
    pub fn add_cookies(&self, cookies: &str) {
        for pair in cookies.split(';').map(str::trim).filter(|p| p.contains('=')) {
            self.set_cookie(&format!("{pair}; Path=/"));
        }
    }

    /// Returns the `Cookie` header that would be sent with a request to the base URL.
    #[must_use]
    pub fn cookies(&self) -> Option<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|value| value.to_str().ok().map(str::to_owned))
    }

    /// Creates a [`Session`] acting as `user_id`. The cookie store must already hold that user's
    /// login cookies.
    #[must_use]
    pub fn session(self, user_id: impl Into<UserId>) -> Session {
        Session::new(self, user_id.into())
    }

    /// Adds a `Set-Cookie` style string for both the base and the upload host.
    pub(crate) fn set_cookie(&self, cookie: &str) {
        tracing::debug!(cookie = cookie.split('=').next(), "Client::set_cookie");
        self.jar.add_cookie_str(cookie, &self.base_url);
        self.jar.add_cookie_str(cookie, &self.upload_url);
    }

    #[inline]
    pub(crate) fn upload(&self, path: &str) -> RequestBuilder {
        tracing::info!(path, "Client::upload");
        self.client.post(format!("{}{}", self.upload_url, path))
    }

    request_impl!(get, post);
}

impl Default for Client {
    fn default() -> Client {
        Client::new()
    }
}

fn parse_base(base_url: &str) -> Result<Url, Error> {
    let mut base_url = base_url.to_owned();
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    Ok(Url::parse(&base_url)?)
}
