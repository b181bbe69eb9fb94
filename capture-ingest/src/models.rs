//! Domain types: session keys, artifact names, pairs and reports

use capture_common::config::PHOTOS_DIR;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Filename substring marking a camera frame
pub const FRAME_MARKER: &str = "img";

/// Filename substring marking a screen snapshot
pub const SNAPSHOT_MARKER: &str = "screenshot";

/// Identifies exactly one monitored session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub child_name: String,
    pub session_id: String,
}

impl SessionKey {
    /// Build a key, rejecting values that are not a single safe path component
    pub fn new(child_name: &str, session_id: &str) -> Result<Self, String> {
        check_path_component("childName", child_name)?;
        check_path_component("sessionId", session_id)?;
        Ok(Self {
            child_name: child_name.to_string(),
            session_id: session_id.to_string(),
        })
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.child_name, self.session_id)
    }
}

/// Reject empty values and anything that could escape its directory
pub fn check_path_component(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} must not be empty", field));
    }
    if value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
        return Err(format!("{} is not a valid path component: {:?}", field, value));
    }
    Ok(())
}

/// The two halves of a capture tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Camera frame; the authoritative side that creates pairs
    Frame,
    /// Screen snapshot; only ever completes a pair its frame created
    Snapshot,
}

impl ArtifactKind {
    pub fn marker(self) -> &'static str {
        match self {
            ArtifactKind::Frame => FRAME_MARKER,
            ArtifactKind::Snapshot => SNAPSHOT_MARKER,
        }
    }

    pub fn companion(self) -> Self {
        match self {
            ArtifactKind::Frame => ArtifactKind::Snapshot,
            ArtifactKind::Snapshot => ArtifactKind::Frame,
        }
    }

    /// Classify by marker substring; the frame marker wins when both appear
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.contains(FRAME_MARKER) {
            Some(ArtifactKind::Frame)
        } else if filename.contains(SNAPSHOT_MARKER) {
            Some(ArtifactKind::Snapshot)
        } else {
            None
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Frame => f.write_str("frame"),
            ArtifactKind::Snapshot => f.write_str("snapshot"),
        }
    }
}

/// Correlates a frame with its snapshot
///
/// Producers name artifacts `{kind}-{runId}-{elapsedSeconds}.{ext}`; the tick
/// is the filename with its kind marker replaced by `*`, so both halves of a
/// tick map to the same value (`*-{runId}-{elapsedSeconds}.{ext}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickId(String);

impl TickId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TickId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recognized artifact filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub filename: String,
    pub kind: ArtifactKind,
    pub tick: TickId,
}

impl ArtifactName {
    /// Returns `None` when the filename carries neither kind marker
    pub fn parse(filename: &str) -> Option<Self> {
        let kind = ArtifactKind::from_filename(filename)?;
        Some(Self {
            filename: filename.to_string(),
            kind,
            tick: TickId(filename.replacen(kind.marker(), "*", 1)),
        })
    }

    /// Filename the other half of this tick is uploaded under
    pub fn companion_filename(&self) -> String {
        self.filename
            .replacen(self.kind.marker(), self.kind.companion().marker(), 1)
    }
}

/// Location of one artifact inside the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactPath {
    pub key: SessionKey,
    pub filename: String,
}

impl ArtifactPath {
    pub fn new(key: &SessionKey, filename: &str) -> Self {
        Self {
            key: key.clone(),
            filename: filename.to_string(),
        }
    }

    /// `photos/{childName}/{sessionId}/{filename}`, as recorded in reports
    pub fn relative(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            PHOTOS_DIR, self.key.child_name, self.key.session_id, self.filename
        )
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative())
    }
}

/// A stored artifact as seen by the ingest path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    pub kind: Option<ArtifactKind>,
    pub storage_path: String,
    pub exists_on_disk: bool,
}

/// One frame/snapshot pair within a report
///
/// Never empty: at least one of the two paths is always set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pair {
    pub tick: TickId,
    #[serde(rename = "imgpath")]
    pub img_path: Option<String>,
    #[serde(rename = "screenshotpath")]
    pub screenshot_path: Option<String>,
    /// Externally computed annotation, stored as given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotions: Option<serde_json::Value>,
}

impl Pair {
    /// A pair with exactly one side populated
    pub fn with_side(tick: TickId, kind: ArtifactKind, path: String) -> Self {
        let mut pair = Self {
            tick,
            img_path: None,
            screenshot_path: None,
            emotions: None,
        };
        pair.set_side(kind, path);
        pair
    }

    pub fn side(&self, kind: ArtifactKind) -> Option<&str> {
        match kind {
            ArtifactKind::Frame => self.img_path.as_deref(),
            ArtifactKind::Snapshot => self.screenshot_path.as_deref(),
        }
    }

    pub fn set_side(&mut self, kind: ArtifactKind, path: String) {
        match kind {
            ArtifactKind::Frame => self.img_path = Some(path),
            ArtifactKind::Snapshot => self.screenshot_path = Some(path),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.img_path.is_some() && self.screenshot_path.is_some()
    }
}

/// Externally supplied game score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub game_type: String,
    pub score: f64,
}

/// Per-session aggregate of pairs and scores
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub child_name: String,
    pub session_id: String,
    pub scores: Vec<Score>,
    /// Pairs in arrival order
    #[serde(rename = "images")]
    pub pairs: Vec<Pair>,
}

impl Report {
    pub fn empty(key: &SessionKey) -> Self {
        Self {
            child_name: key.child_name.clone(),
            session_id: key.session_id.clone(),
            scores: Vec::new(),
            pairs: Vec::new(),
        }
    }

    pub fn pair(&self, tick: &TickId) -> Option<&Pair> {
        self.pairs.iter().find(|pair| &pair.tick == tick)
    }
}
