//! Backend endpoint catalogue.

use std::fmt;

/// HTTP method used by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// How many files an upload endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadShape {
    /// Exactly one file, sent under the `audio` field.
    Single,
    /// One or more files, all sent under the `files` field.
    Batch,
}

impl UploadShape {
    /// Multipart field name the files are sent under.
    pub fn file_field(&self) -> &'static str {
        match self {
            UploadShape::Single => "audio",
            UploadShape::Batch => "files",
        }
    }
}

/// Every backend endpoint the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    /// Search or fetch a song by name/URL; returns a locator.
    DownloadYoutube,
    /// Upload a song for vocal/instrument separation.
    Separate,
    /// Separation status and result locators.
    Download,
    /// Upload training data for a voice model.
    VcTraining,
    /// Training status string.
    VcTrainCheck,
    /// Upload a song for voice conversion.
    VcInference,
    /// Converted vocal locator.
    VcInferenceCheck,
    /// Mix converted vocal with accompaniment.
    CombineInferencedAudio,
}

impl Endpoint {
    pub const ALL: [Endpoint; 8] = [
        Endpoint::DownloadYoutube,
        Endpoint::Separate,
        Endpoint::Download,
        Endpoint::VcTraining,
        Endpoint::VcTrainCheck,
        Endpoint::VcInference,
        Endpoint::VcInferenceCheck,
        Endpoint::CombineInferencedAudio,
    ];

    /// Path relative to the backend base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::DownloadYoutube => "download_youtube",
            Endpoint::Separate => "separate",
            Endpoint::Download => "download",
            Endpoint::VcTraining => "vc_training",
            Endpoint::VcTrainCheck => "vc_train_check",
            Endpoint::VcInference => "vc_inference",
            Endpoint::VcInferenceCheck => "vc_inference_check",
            Endpoint::CombineInferencedAudio => "combine_inferencedAudio",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Endpoint::DownloadYoutube => Method::Get,
            _ => Method::Post,
        }
    }

    /// Upload shape for multipart endpoints, `None` for the rest.
    pub fn upload_shape(&self) -> Option<UploadShape> {
        match self {
            Endpoint::Separate | Endpoint::VcInference => Some(UploadShape::Single),
            Endpoint::VcTraining => Some(UploadShape::Batch),
            _ => None,
        }
    }

    pub fn is_upload(&self) -> bool {
        self.upload_shape().is_some()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_youtube_search_is_get() {
        for endpoint in Endpoint::ALL {
            let expected = if endpoint == Endpoint::DownloadYoutube {
                Method::Get
            } else {
                Method::Post
            };
            assert_eq!(endpoint.method(), expected, "{}", endpoint);
        }
    }

    #[test]
    fn upload_shapes() {
        assert_eq!(Endpoint::Separate.upload_shape(), Some(UploadShape::Single));
        assert_eq!(Endpoint::VcTraining.upload_shape(), Some(UploadShape::Batch));
        assert!(!Endpoint::Download.is_upload());
        assert_eq!(UploadShape::Batch.file_field(), "files");
    }
}
