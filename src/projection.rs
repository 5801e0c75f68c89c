//! Pure filter/sort projection over a cached collection.
//!
//! [`project`] derives the rendered view from a collection snapshot and the
//! user-controlled filter and sort state. It is a pure function: no side
//! effects, identical inputs give identical output, and the input slice is
//! never mutated.
//!
//! Filtering is a conjunction of independent predicates — case-insensitive
//! substring search, categorical equality, and date-range containment.
//! Sorting is a single-key comparator; equal keys are ordered by entity id
//! ascending so the projection is deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: String,
    pub direction: SortDirection,
}

impl SortState {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// User-controlled filter state. Every populated field is one predicate of
/// the conjunction; empty/`None` fields do not constrain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterState {
    pub search: String,
    pub category: Option<String>,
    pub status: Option<String>,
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl FilterState {
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_date_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.date_range = Some((from, to));
        self
    }

    pub fn matches<T: Projectable>(&self, entity: &T) -> bool {
        let search = self.search.trim();
        if !search.is_empty() {
            let haystack = entity.search_text().to_lowercase();
            if !haystack.contains(&search.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if entity.category() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if entity.status() != Some(status.as_str()) {
                return false;
            }
        }
        if let Some((from, to)) = &self.date_range {
            match entity.timestamp() {
                Some(ts) => {
                    if ts < *from || ts > *to {
                        return false;
                    }
                }
                // No timestamp cannot satisfy a date-range predicate.
                None => return false,
            }
        }
        true
    }
}

/// A typed sort key value. Values only order against the same variant;
/// mismatched variants fall back to variant rank so the sort stays total.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Text(String),
    Number(f64),
    Time(DateTime<Utc>),
}

impl SortValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Text(_) => 0,
            Self::Number(_) => 1,
            Self::Time(_) => 2,
        }
    }

    fn compare(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

/// What an entity exposes to the projection.
pub trait Projectable: Entity {
    /// The text the search predicate matches against, typically the
    /// entity's searchable string fields joined together.
    fn search_text(&self) -> String;

    fn category(&self) -> Option<&str> {
        None
    }

    fn status(&self) -> Option<&str> {
        None
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// The value for a sort key, or `None` when the entity has no such
    /// field. Absent values sort after present ones.
    fn sort_value(&self, key: &str) -> Option<SortValue>;
}

/// Derive the filtered, sorted view of a collection snapshot.
pub fn project<T: Projectable>(items: &[T], filter: &FilterState, sort: &SortState) -> Vec<T> {
    let mut view: Vec<T> = items
        .iter()
        .filter(|item| filter.matches(*item))
        .cloned()
        .collect();

    view.sort_by(|a, b| {
        let ordering = match (a.sort_value(&sort.key), b.sort_value(&sort.key)) {
            (Some(va), Some(vb)) => {
                let ord = va.compare(&vb);
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
            // Absent sort values go last in either direction.
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        ordering.then_with(|| a.id().cmp(b.id()))
    });

    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Case {
        id: String,
        name: String,
        category: String,
        status: String,
        filed_at: Option<DateTime<Utc>>,
        workload: f64,
    }

    impl Entity for Case {
        fn id(&self) -> &str {
            &self.id
        }
    }

    impl Projectable for Case {
        fn search_text(&self) -> String {
            format!("{} {}", self.name, self.category)
        }

        fn category(&self) -> Option<&str> {
            Some(&self.category)
        }

        fn status(&self) -> Option<&str> {
            Some(&self.status)
        }

        fn timestamp(&self) -> Option<DateTime<Utc>> {
            self.filed_at
        }

        fn sort_value(&self, key: &str) -> Option<SortValue> {
            match key {
                "name" => Some(SortValue::Text(self.name.clone())),
                "workload" => Some(SortValue::Number(self.workload)),
                "filed_at" => self.filed_at.map(SortValue::Time),
                _ => None,
            }
        }
    }

    fn case(id: &str, name: &str, category: &str) -> Case {
        Case {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            status: "OPEN".to_string(),
            filed_at: None,
            workload: 0.0,
        }
    }

    #[test]
    fn empty_filter_sorts_by_name_ascending() {
        // The concrete scenario from the dashboards: Zeta/CIVIL before
        // Alpha/TAX in cache order, Alpha first after projection.
        let cache = vec![case("a", "Zeta", "CIVIL"), case("b", "Alpha", "TAX")];
        let view = project(&cache, &FilterState::default(), &SortState::asc("name"));
        assert_eq!(view[0].id, "b");
        assert_eq!(view[1].id, "a");
    }

    #[test]
    fn projection_is_idempotent() {
        let cache = vec![
            case("a", "Zeta", "CIVIL"),
            case("b", "Alpha", "TAX"),
            case("c", "Mid", "CIVIL"),
        ];
        let filter = FilterState::default().with_category("CIVIL");
        let sort = SortState::desc("name");
        let first = project(&cache, &filter, &sort);
        let second = project(&cache, &filter, &sort);
        assert_eq!(first, second);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let cache = vec![case("a", "Estate Planning", "CIVIL"), case("b", "Tax Audit", "TAX")];
        let filter = FilterState::default().with_search("eSTATE");
        let view = project(&cache, &filter, &SortState::asc("name"));
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, "a");
    }

    #[test]
    fn filters_combine_as_conjunction() {
        let mut open_civil = case("a", "Estate", "CIVIL");
        open_civil.status = "OPEN".to_string();
        let mut closed_civil = case("b", "Estate Dispute", "CIVIL");
        closed_civil.status = "CLOSED".to_string();
        let mut open_tax = case("c", "Estate Tax", "TAX");
        open_tax.status = "OPEN".to_string();

        let cache = vec![open_civil, closed_civil, open_tax];
        let filter = FilterState::default()
            .with_search("estate")
            .with_category("CIVIL")
            .with_status("OPEN");
        let view = project(&cache, &filter, &SortState::asc("name"));
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, "a");
    }

    #[test]
    fn date_range_is_inclusive_and_excludes_missing_timestamps() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();

        let mut inside = case("a", "Inside", "CIVIL");
        inside.filed_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let mut boundary = case("b", "Boundary", "CIVIL");
        boundary.filed_at = Some(from);
        let mut outside = case("c", "Outside", "CIVIL");
        outside.filed_at = Some(Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap());
        let missing = case("d", "Missing", "CIVIL");

        let cache = vec![inside, boundary, outside, missing];
        let filter = FilterState::default().with_date_range(from, to);
        let view = project(&cache, &filter, &SortState::asc("name"));
        let ids: Vec<&str> = view.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn descending_sort_reverses_key_order_not_tie_break() {
        let mut a = case("a", "Same", "CIVIL");
        a.workload = 0.5;
        let mut b = case("b", "Same", "CIVIL");
        b.workload = 0.5;
        let mut c = case("c", "Other", "CIVIL");
        c.workload = 0.9;

        let cache = vec![b.clone(), c.clone(), a.clone()];
        let view = project(&cache, &FilterState::default(), &SortState::desc("workload"));
        // Highest workload first; the tied pair orders by id ascending.
        let ids: Vec<&str> = view.iter().map(|x| x.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn numeric_sort_respects_direction() {
        let mut low = case("a", "Low", "CIVIL");
        low.workload = 0.1;
        let mut high = case("b", "High", "CIVIL");
        high.workload = 0.9;

        let cache = vec![low, high];
        let asc = project(&cache, &FilterState::default(), &SortState::asc("workload"));
        assert_eq!(asc[0].id, "a");
        let desc = project(&cache, &FilterState::default(), &SortState::desc("workload"));
        assert_eq!(desc[0].id, "b");
    }

    #[test]
    fn missing_sort_values_go_last() {
        let mut dated = case("a", "Dated", "CIVIL");
        dated.filed_at = Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        let undated = case("b", "Undated", "CIVIL");

        let cache = vec![undated.clone(), dated.clone()];
        let asc = project(&cache, &FilterState::default(), &SortState::asc("filed_at"));
        assert_eq!(asc.last().unwrap().id, "b");
        let desc = project(&cache, &FilterState::default(), &SortState::desc("filed_at"));
        assert_eq!(desc.last().unwrap().id, "b");
    }

    #[test]
    fn unknown_sort_key_falls_back_to_id_order() {
        let cache = vec![case("b", "B", "CIVIL"), case("a", "A", "CIVIL")];
        let view = project(&cache, &FilterState::default(), &SortState::asc("nonsense"));
        assert_eq!(view[0].id, "a");
        assert_eq!(view[1].id, "b");
    }

    #[test]
    fn projection_does_not_mutate_input() {
        let cache = vec![case("a", "Zeta", "CIVIL"), case("b", "Alpha", "TAX")];
        let before = cache.clone();
        let _ = project(&cache, &FilterState::default(), &SortState::asc("name"));
        assert_eq!(cache, before);
    }

    #[test]
    fn every_projected_entity_satisfies_all_predicates() {
        let cache = vec![
            case("a", "Estate", "CIVIL"),
            case("b", "Tax Audit", "TAX"),
            case("c", "Estate Tax", "TAX"),
        ];
        let filter = FilterState::default().with_search("tax").with_category("TAX");
        let view = project(&cache, &filter, &SortState::asc("name"));
        assert!(!view.is_empty());
        for entity in &view {
            assert!(filter.matches(entity));
        }
    }
}
