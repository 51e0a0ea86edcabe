use crate::form::{batch, Field};
use crate::{response, Error, ServiceError, Session};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Display};

/// The kind of file the service made of an upload. It decides which id list of the message the
/// upload is sent in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FileKind {
    /// A still image.
    Image,
    /// An animated GIF.
    AnimatedImage,
    /// A video.
    Video,
    /// Anything else.
    File,
}

impl FileKind {
    const ALL: [FileKind; 4] = [
        FileKind::Image,
        FileKind::AnimatedImage,
        FileKind::Video,
        FileKind::File,
    ];

    /// Key of the id in upload metadata, such as `image_id`.
    fn metadata_key(self) -> &'static str {
        match self {
            FileKind::Image => "image_id",
            FileKind::AnimatedImage => "gif_id",
            FileKind::Video => "video_id",
            FileKind::File => "file_id",
        }
    }

    /// Message batch field listing ids of this kind, such as `image_ids`.
    pub(crate) fn batch_key(self) -> &'static str {
        match self {
            FileKind::Image => "image_ids",
            FileKind::AnimatedImage => "gif_ids",
            FileKind::Video => "video_ids",
            FileKind::File => "file_ids",
        }
    }
}

/// An uploaded attachment, as identified by the service.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct UploadedFile {
    /// What the service made of the file.
    pub kind: FileKind,
    /// Service-assigned id.
    pub id: String,
}

impl UploadedFile {
    /// Reads upload metadata such as `{"image_id": 1234, "filename": "a.png", ...}`.
    fn from_metadata(metadata: &Value) -> Option<UploadedFile> {
        FileKind::ALL.into_iter().find_map(|kind| {
            let id = match metadata.get(kind.metadata_key())? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some(UploadedFile { kind, id })
        })
    }
}

impl Display for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.metadata_key(), self.id)
    }
}

/// A file to send with a [`Message`][`crate::Message`].
///
/// An attachment holds a stream until it is uploaded. The first upload records the service's
/// [`UploadedFile`] and later sends reuse it. If an upload fails the stream is gone and the
/// attachment can't be sent again.
#[derive(Debug)]
pub struct Attachment(Inner);

#[derive(Debug)]
enum Inner {
    New {
        stream: Body,
        filename: String,
        content_type: String,
        content_length: u64,
    },
    Uploaded(UploadedFile),
    Failed,
}

impl Attachment {
    /// Create an `Attachment` from a buffer.
    ///
    /// # Panics
    ///
    /// Panics if the length of `content` overflows a [`u64`].
    pub fn new(content: impl Into<Bytes>, filename: String, content_type: String) -> Attachment {
        let content: Bytes = content.into();
        Attachment(Inner::New {
            content_length: content.len().try_into().unwrap(),
            stream: content.into(),
            filename,
            content_type,
        })
    }

    /// Create an `Attachment` from any stream of known length.
    pub fn from_stream(
        stream: impl Into<Body>,
        content_length: u64,
        filename: String,
        content_type: String,
    ) -> Attachment {
        Attachment(Inner::New {
            stream: stream.into(),
            filename,
            content_type,
            content_length,
        })
    }

    /// Create an `Attachment` from a file on disk.
    #[cfg(feature = "fs")]
    pub async fn new_from_file(
        path: impl AsRef<std::path::Path>,
        content_type: String,
    ) -> Result<Attachment, std::io::Error> {
        use tokio::fs::File;
        use tokio_util::codec::{BytesCodec, FramedRead};

        let filename = path
            .as_ref()
            .file_name()
            .and_then(std::ffi::OsStr::to_str)
            .unwrap_or("file")
            .to_owned();

        let file = File::open(path).await?;
        let content_length = file.metadata().await?.len();
        let stream = Body::wrap_stream(FramedRead::new(file, BytesCodec::new()));

        Ok(Attachment(Inner::New {
            stream,
            filename,
            content_type,
            content_length,
        }))
    }

    /// Returns true if the attachment has not been uploaded yet.
    pub fn is_new(&self) -> bool {
        matches!(self.0, Inner::New { .. })
    }

    /// Returns true if the attachment has been uploaded.
    pub fn is_uploaded(&self) -> bool {
        matches!(self.0, Inner::Uploaded { .. })
    }

    /// Returns true if an upload of this attachment failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.0, Inner::Failed)
    }

    /// The service's description of the uploaded file, once uploaded.
    pub fn uploaded(&self) -> Option<&UploadedFile> {
        match &self.0 {
            Inner::Uploaded(file) => Some(file),
            _ => None,
        }
    }

    #[tracing::instrument(skip(session))]
    pub(crate) async fn upload(&mut self, session: &Session) -> Result<UploadedFile, Error> {
        let (stream, filename, content_type, content_length) =
            match std::mem::replace(&mut self.0, Inner::Failed) {
                Inner::New {
                    stream,
                    filename,
                    content_type,
                    content_length,
                } => (stream, filename, content_type, content_length),
                Inner::Uploaded(file) => {
                    self.0 = Inner::Uploaded(file.clone());
                    return Ok(file);
                }
                Inner::Failed => return Err(Error::FailedAttachment),
            };

        let mut form = Form::new();
        for (name, value) in session.default_fields().iter() {
            form = form.text(name.to_owned(), value.to_owned());
        }
        form = form.part(
            "upload_1024",
            Part::stream_with_length(stream, content_length)
                .file_name(filename)
                .mime_str(&content_type)?,
        );

        let response = session
            .client
            .upload("ajax/mercury/upload.php")
            .multipart(form)
            .send()
            .await?;
        let value = response::check(&session.client, &Method::POST, response).await?;
        if let Some(error) = ServiceError::from_payload(&value) {
            return Err(Error::Service(error));
        }

        let file = value
            .pointer("/payload/metadata/0")
            .and_then(UploadedFile::from_metadata)
            .ok_or(Error::UnexpectedResponse(
                "upload metadata has no image, gif, video or file id",
            ))?;
        tracing::info!(%file);

        self.0 = Inner::Uploaded(file.clone());
        Ok(file)
    }
}

impl Session {
    /// Uploads every attachment that hasn't been uploaded yet, concurrently.
    ///
    /// Returns one [`UploadedFile`] per attachment, in order, or the first error. Nothing is sent if
    /// any attachment is [failed][`Attachment::is_failed`].
    ///
    /// On the first error the uploads still in flight are cancelled. Those attachments lose their
    /// stream and are failed as well; only uploads that had already finished stay uploaded.
    #[tracing::instrument(skip(self, attachments), fields(count = attachments.len()))]
    pub async fn upload_attachments(
        &self,
        attachments: &mut [Attachment],
    ) -> Result<Vec<UploadedFile>, Error> {
        if attachments.iter().any(Attachment::is_failed) {
            return Err(Error::FailedAttachment);
        }

        join_uploads(
            attachments
                .iter_mut()
                .map(|attachment| attachment.upload(self)),
        )
        .await
        .inspect_err(|error| tracing::error!(%error, "attachment upload failed"))
    }
}

/// Waits for every upload. The result is all of them, in order, or the first error.
async fn join_uploads<I>(uploads: I) -> Result<Vec<UploadedFile>, Error>
where
    I: IntoIterator,
    I::Item: std::future::Future<Output = Result<UploadedFile, Error>>,
{
    futures::future::try_join_all(uploads).await
}

/// Message batch fields for the ids of `files`, each kind in its own list.
pub(crate) fn batch_file_ids(files: &[UploadedFile]) -> Vec<(Field, String)> {
    let mut counts = HashMap::new();
    files
        .iter()
        .map(|file| {
            let count = counts.entry(file.kind).or_insert(0);
            let field = batch(file.kind.batch_key()).index(*count);
            *count += 1;
            (field, file.id.clone())
        })
        .collect()
}
