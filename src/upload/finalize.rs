use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-assigned reference to the assembled file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub file_path: String,
    pub file_url: String,
    pub file_name: String,
}

/// Parses the last chunk's response body into an [`UploadResult`].
///
/// # Errors
///
/// Returns [`Error::Finalization`] if the body is not JSON or if any of
/// `filePath`, `fileUrl`, `fileName` is missing or not a string.
pub fn finalize(body: &str) -> Result<UploadResult> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::Finalization(format!("response is not JSON: {e}. Body was: {body}")))?;

    let field = |name: &str| -> Result<String> {
        match value.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(Error::Finalization(format!(
                "field '{name}' must be a string, got {other}"
            ))),
            None => Err(Error::Finalization(format!("missing field '{name}'"))),
        }
    };

    Ok(UploadResult {
        file_path: field("filePath")?,
        file_url: field("fileUrl")?,
        file_name: field("fileName")?,
    })
}
