use crate::form::FormFields;
use crate::{Error, ServiceError, Session};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Preview parameters the service produced for a URL. They are opaque: a message carries them back
/// unmodified so the thread can render the preview.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ShareParams(pub Value);

const PREVIEW_SIZE: u32 = 960;

impl Session {
    /// Asks the service to build a shareable preview of `url`.
    ///
    /// Returns [`Error::InvalidUrl`] if the service could not produce one.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_link(&self, url: &str) -> Result<ShareParams, Error> {
        let mut form = FormFields::new();
        form.set("image_height", PREVIEW_SIZE)
            .set("image_width", PREVIEW_SIZE)
            .set("uri", url);

        let value = self
            .post_form(self.client.post("message_share_attachment/fromURI/"), form)
            .await
            .inspect_err(|error| tracing::error!(%error, "resolve_link failed"))?;
        share_params(&value)
    }
}

fn share_params(value: &Value) -> Result<ShareParams, Error> {
    if let Some(error) = ServiceError::from_payload(value) {
        return Err(Error::Service(error));
    }
    match value.pointer("/payload/share_data/share_params") {
        Some(params) if !params.is_null() => Ok(ShareParams(params.clone())),
        _ => Err(Error::InvalidUrl),
    }
}
