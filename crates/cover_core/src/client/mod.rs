//! Backend client: endpoint catalogue, transport seam and typed calls.
//!
//! ```text
//! BackendClient / UploadSubmitter
//!     └── Arc<dyn Transport>
//!             ├── HttpTransport (reqwest)
//!             └── scripted transport (tests)
//! ```

mod backend;
mod download;
mod endpoints;
mod error;
mod transport;

pub use backend::{combine_body, BackendClient};
pub use download::{download_path, fetch_artifact};
pub use endpoints::{Endpoint, Method, UploadShape};
pub use error::{TransportError, TransportResult};
pub use transport::{BackendRequest, HttpTransport, MultipartForm, RequestBody, Transport};
