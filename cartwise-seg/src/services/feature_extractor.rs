//! Customer feature extraction
//!
//! Converts a customer's purchase records into a fixed-shape behavioral
//! feature summary. Pure function of the input records and the supplied
//! "now" timestamp; no side effects, no I/O.

use crate::models::{ChurnRisk, CustomerFeatures};
use cartwise_common::models::PurchaseRecord;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

const DAYS_PER_MONTH: f64 = 30.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Feature extractor service
#[derive(Debug, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Derive a feature summary from a purchase history.
    ///
    /// An empty history yields all-zero numeric fields, `Low` churn
    /// risk, and empty category/day/time rankings. Purchase frequency
    /// requires at least two purchases; with exactly one it is zero.
    pub fn extract(
        &self,
        purchases: &[PurchaseRecord],
        now: DateTime<Utc>,
    ) -> CustomerFeatures {
        let total_purchases = purchases.len() as u64;
        let total_spent: f64 = purchases.iter().map(|p| p.line_total()).sum();
        let average_order_value = if total_purchases > 0 {
            total_spent / total_purchases as f64
        } else {
            0.0
        };

        let purchase_frequency = Self::purchase_frequency(purchases);
        let days_since_last_purchase = Self::days_since_last_purchase(purchases, now);

        let favorite_categories =
            most_frequent(purchases.iter().map(|p| p.category.as_str()), 3)
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>();

        let churn_risk = ChurnRisk::from_days_since_last_purchase(days_since_last_purchase);

        // Engagement blends frequency, recency, and category diversity,
        // capped at 100.
        let engagement_raw = purchase_frequency * 10.0
            + (100.0 - days_since_last_purchase as f64).max(0.0) / 2.0
            + favorite_categories.len() as f64 * 5.0;
        let engagement_level = engagement_raw.round().min(100.0).max(0.0) as u8;

        let preferred_shopping_days =
            most_frequent(purchases.iter().map(|p| p.purchased_at.weekday()), 2)
                .into_iter()
                .map(|d| weekday_name(d).to_string())
                .collect::<Vec<_>>();

        let preferred_shopping_times =
            most_frequent(purchases.iter().map(|p| p.purchased_at.hour()), 2)
                .into_iter()
                .map(|h| time_of_day_bucket(h).to_string())
                .collect::<Vec<_>>();

        CustomerFeatures {
            total_purchases,
            total_spent,
            average_order_value,
            purchase_frequency,
            days_since_last_purchase,
            favorite_categories,
            lifetime_value: total_spent,
            churn_risk,
            engagement_level,
            preferred_shopping_days,
            preferred_shopping_times,
        }
    }

    /// Purchases per month over the first-to-last purchase span, with a
    /// minimum denominator of one month. Zero below two purchases.
    fn purchase_frequency(purchases: &[PurchaseRecord]) -> f64 {
        if purchases.len() < 2 {
            return 0.0;
        }
        let first = purchases
            .iter()
            .map(|p| p.purchased_at)
            .min()
            .unwrap_or_default();
        let last = purchases
            .iter()
            .map(|p| p.purchased_at)
            .max()
            .unwrap_or_default();
        let span_days = (last - first).num_seconds() as f64 / SECONDS_PER_DAY;
        let span_months = (span_days / DAYS_PER_MONTH).max(1.0);
        purchases.len() as f64 / span_months
    }

    /// Whole days since the most recent purchase; zero for an empty
    /// history (no disconfirming evidence).
    fn days_since_last_purchase(purchases: &[PurchaseRecord], now: DateTime<Utc>) -> i64 {
        match purchases.iter().map(|p| p.purchased_at).max() {
            Some(last) => (now - last).num_days().max(0),
            None => 0,
        }
    }
}

/// Top `count` items by occurrence, ties broken by first-encountered
/// order (stable sort over insertion-ordered counts).
fn most_frequent<T, I>(items: I, count: usize) -> Vec<T>
where
    T: PartialEq,
    I: Iterator<Item = T>,
{
    let mut counts: Vec<(T, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(existing, _)| *existing == item) {
            Some((_, n)) => *n += 1,
            None => counts.push((item, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(count).map(|(item, _)| item).collect()
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sun",
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
    }
}

fn time_of_day_bucket(hour: u32) -> &'static str {
    if hour < 6 {
        "Early Morning"
    } else if hour < 12 {
        "Morning"
    } else if hour < 17 {
        "Afternoon"
    } else if hour < 21 {
        "Evening"
    } else {
        "Night"
    }
}
