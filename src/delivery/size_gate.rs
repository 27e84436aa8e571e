//! First decision point: how big is the input.

use super::DeliveryError;
use crate::config::DeliveryPolicy;
use std::path::Path;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    /// Above the absolute input ceiling.
    TooLarge,
    /// Between the two ceilings.
    NeedsCompression,
    /// At or below the no-compression ceiling.
    Passthrough,
}

/// File size in MB, measured from storage.
pub async fn file_size_mb(path: &Path) -> Result<f64, DeliveryError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| DeliveryError::io(path, e))?;
    Ok(metadata.len() as f64 / BYTES_PER_MB)
}

pub fn classify_size(size_mb: f64, policy: &DeliveryPolicy) -> SizeClass {
    if size_mb > policy.max_input_size_mb {
        SizeClass::TooLarge
    } else if size_mb <= policy.no_compression_limit_mb {
        SizeClass::Passthrough
    } else {
        SizeClass::NeedsCompression
    }
}

/// Measure and classify `path`, returning the size alongside the class.
pub async fn classify(
    path: &Path,
    policy: &DeliveryPolicy,
) -> Result<(SizeClass, f64), DeliveryError> {
    let size_mb = file_size_mb(path).await?;
    Ok((classify_size(size_mb, policy), size_mb))
}
