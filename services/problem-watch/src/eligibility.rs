//! Eligibility filtering, in-run deduplication and batching decision

use std::collections::HashMap;

use crate::alert::AlertRecord;
use crate::cache::NotifiedKeys;
use crate::config::EligibilityConfig;
use crate::duration::parse_minutes;

/// Why a record was not forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyNotified,
    Informational,
    OutsideWindow,
}

/// A deduplicated alert that qualifies for notification
#[derive(Debug, Clone, PartialEq)]
pub struct EligibleAlert {
    pub record: AlertRecord,
    pub key: String,
    /// Occurrences of this key in the current poll
    pub count: usize,
}

/// How the eligible alerts are delivered
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// One notice per alert; each key is cached as it is dispatched
    Individual(Vec<EligibleAlert>),
    /// A single notice carrying only the count; nothing is cached
    Massive { count: usize },
}

/// Outcome of evaluating one poll
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Records extracted from the table
    pub total: usize,
    /// Records passing the filters, before deduplication
    pub new_eligible: usize,
    pub has_duplicates: bool,
    pub decision: Decision,
}

impl Evaluation {
    /// Keys the decision dispatches individually
    pub fn individual_keys(&self) -> Vec<&str> {
        match &self.decision {
            Decision::Individual(alerts) => alerts.iter().map(|a| a.key.as_str()).collect(),
            Decision::Massive { .. } => Vec::new(),
        }
    }
}

/// Check one record against the notified set and the rules
pub fn check(
    record: &AlertRecord,
    notified: &NotifiedKeys,
    rules: &EligibilityConfig,
) -> Result<(), Rejection> {
    if notified.contains(&record.identity_key()) {
        return Err(Rejection::AlreadyNotified);
    }
    if record.severity.trim() == rules.informational_severity {
        return Err(Rejection::Informational);
    }
    let minutes = parse_minutes(&record.duration);
    if minutes <= rules.min_duration_minutes || minutes > rules.max_duration_minutes {
        return Err(Rejection::OutsideWindow);
    }
    Ok(())
}

/// Group eligible records by identity key, keeping first-seen order
pub fn dedup(records: Vec<AlertRecord>) -> (Vec<EligibleAlert>, bool) {
    let mut unique: Vec<EligibleAlert> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut has_duplicates = false;

    for record in records {
        let key = record.identity_key();
        match index.get(&key) {
            Some(&i) => {
                unique[i].count += 1;
                has_duplicates = true;
            }
            None => {
                index.insert(key.clone(), unique.len());
                unique.push(EligibleAlert {
                    record,
                    key,
                    count: 1,
                });
            }
        }
    }

    (unique, has_duplicates)
}

/// Filter, deduplicate and decide how to deliver one poll's records
pub fn evaluate(
    records: Vec<AlertRecord>,
    notified: &NotifiedKeys,
    rules: &EligibilityConfig,
) -> Evaluation {
    let total = records.len();

    let eligible: Vec<AlertRecord> = records
        .into_iter()
        .filter(|record| match check(record, notified, rules) {
            Ok(()) => {
                tracing::debug!(
                    "Eligible: {} - {} ({})",
                    record.host,
                    record.problem,
                    record.duration
                );
                true
            }
            Err(reason) => {
                tracing::debug!(
                    "Skipped ({:?}): {} - {} ({})",
                    reason,
                    record.host,
                    record.problem,
                    record.duration
                );
                false
            }
        })
        .collect();
    let new_eligible = eligible.len();

    let (unique, has_duplicates) = dedup(eligible);
    if has_duplicates {
        tracing::warn!(
            "Duplicate alerts in this poll: {} records for {} keys",
            new_eligible,
            unique.len()
        );
    }

    let decision = if unique.len() > rules.massive_threshold {
        Decision::Massive {
            count: unique.len(),
        }
    } else {
        Decision::Individual(unique)
    };

    tracing::info!(
        "Evaluated {} alerts: {} new eligible, decision {}",
        total,
        new_eligible,
        match &decision {
            Decision::Individual(alerts) => format!("individual ({})", alerts.len()),
            Decision::Massive { count } => format!("massive ({})", count),
        }
    );

    Evaluation {
        total,
        new_eligible,
        has_duplicates,
        decision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(host: &str, problem: &str, start: &str, duration: &str) -> AlertRecord {
        AlertRecord {
            host: host.to_string(),
            problem: problem.to_string(),
            severity: "High".to_string(),
            start_time: start.to_string(),
            duration: duration.to_string(),
        }
    }

    fn rules() -> EligibilityConfig {
        EligibilityConfig::default()
    }

    #[test]
    fn window_lower_bound_is_exclusive() {
        let r = record("h", "p", "t", "2m");
        assert_eq!(
            check(&r, &NotifiedKeys::new(), &rules()),
            Err(Rejection::OutsideWindow)
        );
    }

    #[test]
    fn window_upper_bound_is_inclusive() {
        let r = record("h", "p", "t", "7m");
        assert_eq!(check(&r, &NotifiedKeys::new(), &rules()), Ok(()));

        let r = record("h", "p", "t", "7m 1s");
        assert_eq!(
            check(&r, &NotifiedKeys::new(), &rules()),
            Err(Rejection::OutsideWindow)
        );
    }

    #[test]
    fn unknown_duration_is_rejected() {
        let r = record("h", "p", "t", "");
        assert_eq!(
            check(&r, &NotifiedKeys::new(), &rules()),
            Err(Rejection::OutsideWindow)
        );
    }

    #[test]
    fn informational_severity_is_rejected_after_trim() {
        let mut r = record("h", "p", "t", "4m");
        r.severity = "  Information ".to_string();
        assert_eq!(
            check(&r, &NotifiedKeys::new(), &rules()),
            Err(Rejection::Informational)
        );
    }

    #[test]
    fn raw_duration_text_is_parsed_for_the_window() {
        let rules = rules();
        let notified = NotifiedKeys::new();

        assert_eq!(check(&record("h", "p", "t", "4m 39s"), &notified, &rules), Ok(()));
        assert_eq!(
            check(&record("h", "p", "t", "1h 4m 39s"), &notified, &rules),
            Err(Rejection::OutsideWindow)
        );
        assert_eq!(
            check(&record("h", "p", "t", "about 3 minutes"), &notified, &rules),
            Err(Rejection::OutsideWindow)
        );
    }

    #[test]
    fn notified_key_is_rejected_first() {
        let mut r = record("h", "p", "t", "");
        r.severity = "Information".to_string();
        let mut notified = NotifiedKeys::new();
        notified.insert(r.identity_key());
        assert_eq!(
            check(&r, &notified, &rules()),
            Err(Rejection::AlreadyNotified)
        );
    }

    #[test]
    fn duplicates_collapse_in_first_seen_order() {
        let records = vec![
            record("b", "p", "t", "4m"),
            record("a", "p", "t", "4m"),
            record("b", "p", "t", "4m"),
        ];
        let evaluation = evaluate(records, &NotifiedKeys::new(), &rules());

        assert!(evaluation.has_duplicates);
        assert_eq!(evaluation.new_eligible, 3);
        let Decision::Individual(alerts) = &evaluation.decision else {
            panic!("expected individual decision");
        };
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].key, "b|p|t");
        assert_eq!(alerts[0].count, 2);
        assert_eq!(alerts[1].key, "a|p|t");
        assert_eq!(alerts[1].count, 1);
    }

    #[test]
    fn threshold_count_stays_individual() {
        let records: Vec<_> = (0..10)
            .map(|i| record(&format!("host-{i}"), "p", "t", "4m"))
            .collect();
        let evaluation = evaluate(records, &NotifiedKeys::new(), &rules());

        assert!(matches!(evaluation.decision, Decision::Individual(ref a) if a.len() == 10));
        assert_eq!(evaluation.individual_keys().len(), 10);
    }

    #[test]
    fn above_threshold_goes_massive() {
        let records: Vec<_> = (0..11)
            .map(|i| record(&format!("host-{i}"), "p", "t", "4m"))
            .collect();
        let evaluation = evaluate(records, &NotifiedKeys::new(), &rules());

        assert_eq!(evaluation.decision, Decision::Massive { count: 11 });
        assert!(evaluation.individual_keys().is_empty());
    }

    #[test]
    fn threshold_counts_unique_keys() {
        // 12 records but only 6 distinct keys
        let records: Vec<_> = (0..12)
            .map(|i| record(&format!("host-{}", i % 6), "p", "t", "4m"))
            .collect();
        let evaluation = evaluate(records, &NotifiedKeys::new(), &rules());

        assert!(evaluation.has_duplicates);
        assert!(matches!(evaluation.decision, Decision::Individual(ref a) if a.len() == 6));
    }

    #[test]
    fn already_notified_poll_sends_nothing() {
        let records = vec![record("h", "p", "t", "4m")];
        let mut notified = NotifiedKeys::new();
        notified.insert("h|p|t");

        let evaluation = evaluate(records, &notified, &rules());
        assert_eq!(evaluation.total, 1);
        assert_eq!(evaluation.new_eligible, 0);
        assert!(evaluation.individual_keys().is_empty());
        assert!(!evaluation.has_duplicates);
    }
}
