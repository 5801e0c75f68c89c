//! CSV export and import over the API.
//!
//! Export fetches the blob and hands the bytes to the caller, which owns the
//! sink (file, download, pipe). Import uploads the bytes as
//! `multipart/form-data` with a single `file` field and decodes the server's
//! envelope for the outcome message.

use tracing::info;

use crate::client::ApiTransport;
use crate::envelope;
use crate::errors::ApiError;

/// Fetch a CSV export blob.
pub async fn export_csv(transport: &dyn ApiTransport, path: &str) -> Result<Vec<u8>, ApiError> {
    let bytes = transport.fetch_blob(path).await?;
    info!(path, bytes = bytes.len(), "exported CSV");
    Ok(bytes)
}

/// Upload a CSV file to an import endpoint. Returns the server's outcome
/// message when it provides one.
pub async fn import_csv(
    transport: &dyn ApiTransport,
    path: &str,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<Option<String>, ApiError> {
    let (status, body) = transport.upload_file(path, "file", filename, bytes).await?;
    let message = envelope::server_message(&body);
    envelope::decode_ack(status, body)?;
    info!(path, filename, "imported CSV");
    Ok(message)
}
