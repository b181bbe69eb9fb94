//! Upload ingestor
//!
//! Boundary of the pairing engine: validates an upload, stores the artifact
//! bytes, then hands the artifact to the report aggregator.

use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregator::{AggregateOutcome, ReportAggregator};
use crate::error::IngestError;
use crate::models::{check_path_component, ArtifactName, ArtifactPath, ArtifactRecord, SessionKey};
use crate::pairing::Arrival;
use crate::store::ArtifactStore;

/// Upload request body
///
/// Every field is optional at the wire level so a missing field yields a
/// validation error instead of a deserialization rejection. Unknown fields
/// (producers also send `gameId`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub image: Option<String>,
    pub filename: Option<String>,
    pub child_name: Option<String>,
    pub session_id: Option<String>,
}

/// Successful ingest result
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
    pub artifact: ArtifactRecord,
    pub outcome: AggregateOutcome,
}

impl IngestReceipt {
    /// Human-readable acknowledgment for the producer
    pub fn message(&self) -> &'static str {
        match self.outcome {
            AggregateOutcome::PairNotFound => {
                "Screenshot uploaded first, not added to the database."
            }
            AggregateOutcome::AlreadyRecorded => "File saved, database already up to date",
            _ => "File saved and database updated successfully",
        }
    }
}

pub struct UploadIngestor {
    store: Arc<dyn ArtifactStore>,
    aggregator: ReportAggregator,
}

/// A request that passed validation
struct ValidUpload {
    key: SessionKey,
    filename: String,
    bytes: Vec<u8>,
}

impl UploadIngestor {
    pub fn new(store: Arc<dyn ArtifactStore>, aggregator: ReportAggregator) -> Self {
        Self { store, aggregator }
    }

    /// Store one artifact and reconcile it into its session report
    ///
    /// Validation failures have no side effects. Re-uploading the same
    /// filename overwrites the stored bytes and leaves the report unchanged.
    pub async fn ingest(&self, request: UploadRequest) -> Result<IngestReceipt, IngestError> {
        let upload = validate(request)?;
        let path = ArtifactPath::new(&upload.key, &upload.filename);

        self.store.put(&path, &upload.bytes).await?;

        let name = match ArtifactName::parse(&upload.filename) {
            Some(name) => name,
            None => {
                warn!(artifact = %path, "Filename has no artifact kind marker, stored without pairing");
                return Err(IngestError::UnrecognizedArtifactKind {
                    artifact: ArtifactRecord {
                        kind: None,
                        storage_path: path.relative(),
                        exists_on_disk: true,
                    },
                });
            }
        };

        let companion = ArtifactPath::new(&upload.key, &name.companion_filename());
        let arrival = Arrival {
            kind: name.kind,
            tick: name.tick,
            storage_path: path.relative(),
        };

        let outcome = self
            .aggregator
            .apply(&upload.key, arrival, Some(companion))
            .await?;

        info!(
            artifact = %path,
            kind = %name.kind,
            bytes = upload.bytes.len(),
            outcome = ?outcome,
            "Artifact ingested"
        );

        Ok(IngestReceipt {
            artifact: ArtifactRecord {
                kind: Some(name.kind),
                storage_path: path.relative(),
                exists_on_disk: true,
            },
            outcome,
        })
    }
}

fn validate(request: UploadRequest) -> Result<ValidUpload, IngestError> {
    let (image, filename, child_name, session_id) = match request {
        UploadRequest {
            image: Some(image),
            filename: Some(filename),
            child_name: Some(child_name),
            session_id: Some(session_id),
        } if !image.is_empty()
            && !filename.is_empty()
            && !child_name.is_empty()
            && !session_id.is_empty() =>
        {
            (image, filename, child_name, session_id)
        }
        _ => {
            return Err(IngestError::Validation(
                "Missing required fields: image, filename, childName, or sessionId".to_string(),
            ))
        }
    };

    let key = SessionKey::new(&child_name, &session_id).map_err(IngestError::Validation)?;
    check_path_component("filename", &filename).map_err(IngestError::Validation)?;
    let bytes = decode_image(&image)?;

    Ok(ValidUpload {
        key,
        filename,
        bytes,
    })
}

/// Decode base64 image data, accepting an optional `data:<mime>;base64,` prefix
pub fn decode_image(image: &str) -> Result<Vec<u8>, IngestError> {
    let payload = match image.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .ok_or_else(|| IngestError::Validation("image data URI is not base64 encoded".to_string()))?,
        None => image,
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| IngestError::Validation(format!("image is not valid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(IngestError::Validation("image decodes to zero bytes".to_string()));
    }
    Ok(bytes)
}
