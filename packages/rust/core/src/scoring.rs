//! Reliability grading of findings.
//!
//! Grades depend only on the finding and the kind of source that produced it:
//! - web search hits are unverified → C
//! - sanctions records flagged as non-matches → C
//! - sanctions matches: confidence > 0.8 → A, > 0.5 → B, otherwise C

use dossier_shared::{Finding, GradeBasis, ReliabilityGrade, SourceKind};

const STRONG_MATCH_THRESHOLD: f64 = 0.8;
const GOOD_MATCH_THRESHOLD: f64 = 0.5;

/// A grade together with the reason it was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub grade: ReliabilityGrade,
    pub basis: GradeBasis,
}

/// Grade a finding produced by a source of `kind`.
pub fn grade(finding: &Finding, kind: SourceKind) -> ReliabilityGrade {
    assess(finding, kind).grade
}

/// Grade a finding and report which rule applied.
///
/// Weak matches and non-matches both end up at C; the basis keeps them apart.
pub fn assess(finding: &Finding, kind: SourceKind) -> Assessment {
    let (grade, basis) = match kind {
        SourceKind::WebSearch => (ReliabilityGrade::C, GradeBasis::Unverified),
        SourceKind::Sanctions if !finding.is_match => (ReliabilityGrade::C, GradeBasis::NoMatch),
        SourceKind::Sanctions => {
            let confidence = finding.match_confidence;
            if confidence > STRONG_MATCH_THRESHOLD {
                (ReliabilityGrade::A, GradeBasis::StrongMatch)
            } else if confidence > GOOD_MATCH_THRESHOLD {
                (ReliabilityGrade::B, GradeBasis::GoodMatch)
            } else {
                (ReliabilityGrade::C, GradeBasis::WeakMatch)
            }
        }
    };
    Assessment { grade, basis }
}
