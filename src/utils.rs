use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use log::debug;
use tokio::io::AsyncWriteExt;

use crate::errors::Error;

/// Name of the VM running `version` of the appliance called `name`.
pub fn vm_name(name: &str, version: &str) -> String {
    format!("{}-{}", name, version)
}

/// Replace every occurrence of each secret with asterisks.
pub fn mask_secrets(text: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .filter(|secret| !secret.is_empty())
        .fold(text.to_owned(), |masked, secret| masked.replace(secret, "******"))
}

/// File name with a millisecond timestamp inserted before the extension.
pub fn timestamped_file_name(stem: &str, extension: &str) -> String {
    format!("{}-{}.{}", stem, chrono::Utc::now().timestamp_millis(), extension)
}

/// `name` inside `dir`, refusing anything but a single plain file name.
pub fn file_in_dir(dir: &Path, name: &str) -> Result<PathBuf, Error> {
    match Path::new(name).file_name() {
        Some(file_name) if file_name == OsStr::new(name) => Ok(dir.join(name)),
        _ => Err(Error::InvalidFileName(name.to_owned())),
    }
}

pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Stream a response body into `destination`, returning the written path.
pub async fn write_response_to_file(response: reqwest::Response, destination: &Path) -> Result<PathBuf, Error> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(destination).await?;
    let mut written: u64 = 0;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    debug!("Wrote {} bytes to {}", written, destination.display());
    Ok(destination.to_path_buf())
}
