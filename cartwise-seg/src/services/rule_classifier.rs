//! Rule-based segment classification
//!
//! Deterministic, total mapping from a feature summary to a catalogue
//! segment. Rules form an ordered cascade; the first match wins, and
//! the order is load-bearing (recency-based exclusions take precedence
//! over value-based promotions).

use crate::catalog::SegmentId;
use crate::models::CustomerFeatures;

/// Rule-based classifier service
#[derive(Debug, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a feature summary into a segment.
    ///
    /// Total function: always returns a valid catalogue segment, with
    /// `PotentialLoyalists` as the default when no rule matches.
    pub fn classify(&self, features: &CustomerFeatures) -> SegmentId {
        let days = features.days_since_last_purchase;
        let ltv = features.lifetime_value;
        let frequency = features.purchase_frequency;

        if days > 365 {
            return SegmentId::Lost;
        }
        if days > 180 {
            return SegmentId::Hibernating;
        }
        if ltv >= 800.0 && days > 120 {
            return SegmentId::CantLose;
        }
        if ltv >= 300.0 && days > 90 {
            return SegmentId::AtRisk;
        }
        if frequency >= 4.0 && ltv >= 1000.0 && days <= 30 {
            return SegmentId::Champions;
        }
        if frequency >= 2.0 && ltv >= 500.0 {
            return SegmentId::Loyal;
        }
        if features.total_purchases <= 2 && days <= 30 {
            return SegmentId::New;
        }
        if frequency >= 1.0 && days <= 60 {
            return SegmentId::PotentialLoyalists;
        }

        SegmentId::PotentialLoyalists
    }
}
