//! The view engine: filtered and sorted projection of the collection
//!
//! Filtering and sorting are pure functions. [`ViewCache`] memoizes their
//! result keyed on the store revision, the filter criteria and the sort
//! configuration, so rendering many rows per frame derives the view once.
//!
//! A [`View`] holds the store snapshot it was derived from plus, when a filter
//! or sort is active, the ordered positions into that snapshot. Rows are never
//! copied to build a view.

use crate::cache::collection::{CollectionStore, Snapshot};
use crate::core::filter::FilterCriteria;
use crate::core::sort::SortConfig;
use crate::core::user::User;
use std::sync::Arc;

/// Keep the records matching `criteria`, in their original order
pub fn filter_users(users: &[User], criteria: &FilterCriteria) -> Vec<User> {
    let compiled = criteria.compile();
    users
        .iter()
        .filter(|user| compiled.matches(user))
        .cloned()
        .collect()
}

/// Order records by `config`; equal keys keep their relative order
pub fn sort_users(mut users: Vec<User>, config: &SortConfig) -> Vec<User> {
    users.sort_by(|a, b| config.compare(a, b));
    users
}

/// Filter then sort
pub fn derive_users(users: &[User], criteria: &FilterCriteria, sort: Option<&SortConfig>) -> Vec<User> {
    let filtered = filter_users(users, criteria);
    match sort {
        Some(config) => sort_users(filtered, config),
        None => filtered,
    }
}

/// The ordered subset of the collection to display
#[derive(Debug, Clone, Default)]
pub struct View {
    records: Snapshot,
    order: Option<Arc<[usize]>>,
}

impl View {
    /// Derive a view from a snapshot
    pub fn derive(records: Snapshot, criteria: &FilterCriteria, sort: Option<&SortConfig>) -> Self {
        let compiled = criteria.compile();
        if compiled.is_empty() && sort.is_none() {
            return Self {
                records,
                order: None,
            };
        }

        let mut rows: Vec<(usize, &User)> = records
            .iter()
            .enumerate()
            .filter(|(_, user)| compiled.matches(user))
            .collect();

        if let Some(config) = sort {
            // sort_by is stable, ties keep collection order
            rows.sort_by(|(_, left), (_, right)| config.compare(left, right));
        }

        let order: Arc<[usize]> = rows.into_iter().map(|(position, _)| position).collect();
        Self {
            records,
            order: Some(order),
        }
    }

    pub fn len(&self) -> usize {
        match &self.order {
            Some(order) => order.len(),
            None => self.records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The row at display position `index`
    pub fn get(&self, index: usize) -> Option<&User> {
        let position = match &self.order {
            Some(order) => *order.get(index)?,
            None => index,
        };
        self.records.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    /// Up to `len` rows starting at display position `start`
    pub fn slice(&self, start: usize, len: usize) -> Vec<User> {
        let end = start.saturating_add(len).min(self.len());
        (start..end)
            .filter_map(|index| self.get(index))
            .cloned()
            .collect()
    }

    pub fn to_vec(&self) -> Vec<User> {
        self.iter().cloned().collect()
    }

    /// True when the view is the unfiltered, unsorted collection itself
    pub fn is_passthrough(&self) -> bool {
        self.order.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ViewKey {
    revision: u64,
    criteria: FilterCriteria,
    sort: Option<SortConfig>,
}

/// Memoized [`View`] over a [`CollectionStore`]
#[derive(Debug, Default)]
pub struct ViewCache {
    cached: Option<(ViewKey, View)>,
    derivations: u64,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The view for the given inputs, derived only if they changed
    pub fn get(
        &mut self,
        store: &CollectionStore,
        criteria: &FilterCriteria,
        sort: Option<&SortConfig>,
    ) -> View {
        let key = ViewKey {
            revision: store.revision(),
            criteria: criteria.clone(),
            sort: sort.copied(),
        };

        match &self.cached {
            Some((cached_key, view)) if *cached_key == key => return view.clone(),
            _ => {}
        }

        let view = View::derive(store.snapshot(), criteria, sort);
        self.derivations += 1;
        tracing::trace!(
            revision = key.revision,
            rows = view.len(),
            "view derived"
        );
        self.cached = Some((key, view.clone()));
        view
    }

    /// Drop the memoized view
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// How many times a view was actually computed
    pub fn derivations(&self) -> u64 {
        self.derivations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sort::SortDirection;
    use crate::core::user::UserField;
    use crate::storage::generator::generate;

    fn named(id: u64, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
            surname: "Doe".to_string(),
            age: 20 + id as u32,
            email: format!("{}@test.com", name.to_lowercase()),
            department: "IT".to_string(),
            company: "Company A".to_string(),
            job_title: "Developer".to_string(),
        }
    }

    fn bob_ann_cid() -> Vec<User> {
        vec![named(1, "Bob"), named(2, "Ann"), named(3, "Cid")]
    }

    fn names(users: &[User]) -> Vec<&str> {
        users.iter().map(|u| u.name.as_str()).collect()
    }

    fn store_with(users: Vec<User>) -> CollectionStore {
        let mut store = CollectionStore::new();
        store.set_total(users.len());
        store.merge(users, 0);
        store
    }

    #[test]
    fn test_sort_by_name_ascending() {
        let sorted = sort_users(bob_ann_cid(), &SortConfig::asc(UserField::Name));
        assert_eq!(names(&sorted), vec!["Ann", "Bob", "Cid"]);
    }

    #[test]
    fn test_sort_places_accented_names_by_base_letter() {
        let users = vec![
            named(1, "Zoe"),
            named(2, "Émile"),
            named(3, "Adam"),
            named(4, "Eve"),
        ];
        let sorted = sort_users(users, &SortConfig::asc(UserField::Name));
        assert_eq!(names(&sorted), vec!["Adam", "Émile", "Eve", "Zoe"]);
    }

    #[test]
    fn test_filter_by_name_substring() {
        let criteria = FilterCriteria::new().with(UserField::Name, "an").unwrap();
        let filtered = filter_users(&bob_ann_cid(), &criteria);
        assert_eq!(names(&filtered), vec!["Ann"]);
    }

    #[test]
    fn test_empty_filter_is_identity() {
        let users = generate(200);
        assert_eq!(filter_users(&users, &FilterCriteria::new()), users);
    }

    #[test]
    fn test_filter_never_grows() {
        let users = generate(200);
        for department in ["IT", "hr", "x", "a"] {
            let criteria = FilterCriteria::new()
                .with(UserField::Department, department)
                .unwrap();
            assert!(filter_users(&users, &criteria).len() <= users.len());
        }
    }

    #[test]
    fn test_sort_is_idempotent() {
        let users = generate(300);
        for field in UserField::ALL {
            for direction in [SortDirection::Asc, SortDirection::Desc] {
                let config = SortConfig::new(field, direction);
                let once = sort_users(users.clone(), &config);
                let twice = sort_users(once.clone(), &config);
                assert_eq!(once, twice, "{} {}", field, direction);
            }
        }
    }

    #[test]
    fn test_sort_is_stable() {
        // Generated departments cycle, so many rows share a key
        let users = generate(40);
        let sorted = sort_users(users, &SortConfig::asc(UserField::Department));
        for pair in sorted.windows(2) {
            if pair[0].department == pair[1].department {
                assert!(pair[0].id < pair[1].id);
            }
        }
    }

    #[test]
    fn test_sort_age_numeric_descending() {
        let mut users = bob_ann_cid();
        users[0].age = 9;
        users[1].age = 100;
        users[2].age = 30;
        let sorted = sort_users(users, &SortConfig::desc(UserField::Age));
        let ages: Vec<u32> = sorted.iter().map(|u| u.age).collect();
        assert_eq!(ages, vec![100, 30, 9]);
    }

    #[test]
    fn test_view_matches_pure_functions() {
        let users = generate(120);
        let criteria = FilterCriteria::new().with(UserField::Company, "b").unwrap();
        let sort = SortConfig::desc(UserField::Surname);

        let store = store_with(users.clone());
        let view = View::derive(store.snapshot(), &criteria, Some(&sort));

        assert_eq!(view.to_vec(), derive_users(&users, &criteria, Some(&sort)));
    }

    #[test]
    fn test_view_without_criteria_is_passthrough() {
        let store = store_with(bob_ann_cid());
        let view = View::derive(store.snapshot(), &FilterCriteria::new(), None);
        assert!(view.is_passthrough());
        assert_eq!(view.len(), 3);
        assert_eq!(view.get(1).unwrap().name, "Ann");
    }

    #[test]
    fn test_view_slice_is_clamped() {
        let store = store_with(generate(5));
        let view = View::derive(store.snapshot(), &FilterCriteria::new(), None);
        assert_eq!(view.slice(4, 2).len(), 1);
        assert!(view.slice(9, 2).is_empty());
    }

    #[test]
    fn test_delivered_view_survives_merge() {
        let mut store = store_with(generate(3));
        let view = View::derive(store.snapshot(), &FilterCriteria::new(), None);

        store.merge(generate(6).split_off(3), 1);
        assert_eq!(view.len(), 3);
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_cache_memoizes_on_inputs() {
        let mut store = store_with(generate(50));
        let mut cache = ViewCache::new();
        let criteria = FilterCriteria::new().with(UserField::Department, "IT").unwrap();
        let sort = SortConfig::asc(UserField::Name);

        let first = cache.get(&store, &criteria, Some(&sort));
        let again = cache.get(&store, &criteria, Some(&sort));
        assert_eq!(cache.derivations(), 1);
        assert_eq!(first.to_vec(), again.to_vec());

        cache.get(&store, &criteria, None);
        assert_eq!(cache.derivations(), 2);

        store.merge(generate(60).split_off(50), 1);
        cache.get(&store, &criteria, None);
        assert_eq!(cache.derivations(), 3);
    }
}
