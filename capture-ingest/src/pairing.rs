//! Pairing resolver
//!
//! Classifies an arriving artifact against the current report. Pure: the
//! caller supplies the report and the result of the companion existence
//! check, and applies the returned decision.
//!
//! Frames are authoritative. A frame creates or extends a pair and, when the
//! matching snapshot file is already stored, records it immediately (eager
//! completion). A snapshot only ever fills the pair its frame created; a
//! snapshot with no such pair is left out of the report, although its bytes
//! remain stored and a later frame will pick it up through eager completion.

use crate::models::{ArtifactKind, Pair, Report, TickId};

/// An artifact that has been durably stored and now needs aggregating
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrival {
    pub kind: ArtifactKind,
    pub tick: TickId,
    /// Report-relative storage path (`photos/...`)
    pub storage_path: String,
}

/// What to do with the report for one arrival
#[derive(Debug, Clone, PartialEq)]
pub enum PairingDecision {
    /// No report exists yet: create it holding this pair
    CreateReportWithPair(Pair),
    /// Report exists without a pair for this tick: append this pair
    AppendNewPair(Pair),
    /// A pair for this tick exists: set the listed sides
    AttachToExistingPair {
        tick: TickId,
        sides: Vec<(ArtifactKind, String)>,
    },
    /// A pair for this tick already records everything this arrival carries
    AlreadyRecorded { tick: TickId },
    /// Snapshot with no frame-created pair; not aggregated
    DiscardSnapshot { tick: TickId },
}

/// Decide how `arrival` changes `report`
///
/// `companion_path` is the stored path of the other half of the tick when the
/// caller found it present; it is only consulted for frames.
pub fn resolve(
    arrival: &Arrival,
    report: Option<&Report>,
    companion_path: Option<&str>,
) -> PairingDecision {
    let existing = report.and_then(|r| r.pair(&arrival.tick));

    match (arrival.kind, existing) {
        (ArtifactKind::Snapshot, None) => PairingDecision::DiscardSnapshot {
            tick: arrival.tick.clone(),
        },
        (ArtifactKind::Snapshot, Some(pair)) => attach(pair, arrival, None),
        (ArtifactKind::Frame, Some(pair)) => attach(pair, arrival, companion_path),
        (ArtifactKind::Frame, None) => {
            let mut pair = Pair::with_side(
                arrival.tick.clone(),
                ArtifactKind::Frame,
                arrival.storage_path.clone(),
            );
            if let Some(path) = companion_path {
                pair.set_side(ArtifactKind::Snapshot, path.to_string());
            }

            if report.is_some() {
                PairingDecision::AppendNewPair(pair)
            } else {
                PairingDecision::CreateReportWithPair(pair)
            }
        }
    }
}

fn attach(pair: &Pair, arrival: &Arrival, companion_path: Option<&str>) -> PairingDecision {
    let mut sides = Vec::new();

    if pair.side(arrival.kind) != Some(arrival.storage_path.as_str()) {
        sides.push((arrival.kind, arrival.storage_path.clone()));
    }

    let companion = arrival.kind.companion();
    if let Some(path) = companion_path {
        if pair.side(companion).is_none() {
            sides.push((companion, path.to_string()));
        }
    }

    if sides.is_empty() {
        PairingDecision::AlreadyRecorded {
            tick: pair.tick.clone(),
        }
    } else {
        PairingDecision::AttachToExistingPair {
            tick: pair.tick.clone(),
            sides,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtifactName, SessionKey};

    const FRAME: &str = "photos/amy/s1/img-g1-4.png";
    const SNAPSHOT: &str = "photos/amy/s1/screenshot-g1-4.png";

    fn arrival(filename: &str) -> Arrival {
        let name = ArtifactName::parse(filename).unwrap();
        Arrival {
            kind: name.kind,
            tick: name.tick,
            storage_path: format!("photos/amy/s1/{}", filename),
        }
    }

    fn report_with(pairs: Vec<Pair>) -> Report {
        let mut report = Report::empty(&SessionKey::new("amy", "s1").unwrap());
        report.pairs = pairs;
        report
    }

    #[test]
    fn test_first_frame_creates_report() {
        let decision = resolve(&arrival("img-g1-4.png"), None, None);

        match decision {
            PairingDecision::CreateReportWithPair(pair) => {
                assert_eq!(pair.img_path.as_deref(), Some(FRAME));
                assert!(pair.screenshot_path.is_none());
            }
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_frame_with_stored_snapshot_completes_eagerly() {
        let decision = resolve(&arrival("img-g1-4.png"), None, Some(SNAPSHOT));

        match decision {
            PairingDecision::CreateReportWithPair(pair) => assert!(pair.is_complete()),
            other => panic!("unexpected decision: {:?}", other),
        }
    }

    #[test]
    fn test_frame_for_new_tick_appends() {
        let earlier = arrival("img-g1-0.png");
        let report = report_with(vec![Pair::with_side(
            earlier.tick,
            ArtifactKind::Frame,
            earlier.storage_path,
        )]);

        let decision = resolve(&arrival("img-g1-4.png"), Some(&report), None);
        assert!(matches!(decision, PairingDecision::AppendNewPair(_)));
    }

    #[test]
    fn test_snapshot_attaches_to_frame_pair() {
        let frame = arrival("img-g1-4.png");
        let report = report_with(vec![Pair::with_side(
            frame.tick.clone(),
            ArtifactKind::Frame,
            frame.storage_path,
        )]);

        let decision = resolve(&arrival("screenshot-g1-4.png"), Some(&report), None);
        assert_eq!(
            decision,
            PairingDecision::AttachToExistingPair {
                tick: frame.tick,
                sides: vec![(ArtifactKind::Snapshot, SNAPSHOT.to_string())],
            }
        );
    }

    #[test]
    fn test_snapshot_without_frame_is_discarded() {
        let snapshot = arrival("screenshot-g1-4.png");
        assert_eq!(
            resolve(&snapshot, None, None),
            PairingDecision::DiscardSnapshot { tick: snapshot.tick.clone() }
        );

        let report = report_with(Vec::new());
        assert!(matches!(
            resolve(&snapshot, Some(&report), None),
            PairingDecision::DiscardSnapshot { .. }
        ));
    }

    #[test]
    fn test_snapshot_ignores_companion_hint() {
        let frame = arrival("img-g1-4.png");
        let mut pair = Pair::with_side(frame.tick.clone(), ArtifactKind::Frame, frame.storage_path);
        pair.set_side(ArtifactKind::Snapshot, SNAPSHOT.to_string());
        let report = report_with(vec![pair]);

        let decision = resolve(&arrival("screenshot-g1-4.png"), Some(&report), Some("ignored"));
        assert!(matches!(decision, PairingDecision::AlreadyRecorded { .. }));
    }

    #[test]
    fn test_retried_frame_is_already_recorded() {
        let frame = arrival("img-g1-4.png");
        let report = report_with(vec![Pair::with_side(
            frame.tick.clone(),
            ArtifactKind::Frame,
            frame.storage_path.clone(),
        )]);

        let decision = resolve(&frame, Some(&report), None);
        assert_eq!(decision, PairingDecision::AlreadyRecorded { tick: frame.tick });
    }

    #[test]
    fn test_retried_frame_picks_up_late_snapshot() {
        let frame = arrival("img-g1-4.png");
        let report = report_with(vec![Pair::with_side(
            frame.tick.clone(),
            ArtifactKind::Frame,
            frame.storage_path.clone(),
        )]);

        let decision = resolve(&frame, Some(&report), Some(SNAPSHOT));
        assert_eq!(
            decision,
            PairingDecision::AttachToExistingPair {
                tick: frame.tick,
                sides: vec![(ArtifactKind::Snapshot, SNAPSHOT.to_string())],
            }
        );
    }
}
