// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Car, CarCounts, CarId};

/// Sequence number handed out when a fetch is issued. Only the newest ticket
/// may replace the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Client-side snapshot of the last applied fetch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CarStore {
    records: Vec<Car>,
    focus: Option<usize>,
    counts: CarCounts,
    issued: u64,
    generation: u64,
}

impl CarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Car] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts(&self) -> CarCounts {
        self.counts
    }

    /// Bumped on every applied replace; views compare it to drop derived state.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued = self.issued.saturating_add(1);
        FetchTicket(self.issued)
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.0 == self.issued
    }

    /// Applies a fetch result when its ticket is still the newest one issued.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, records: Vec<Car>) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(
                ticket = ticket.get(),
                latest = self.issued,
                "dropping stale car list"
            );
            return false;
        }
        self.replace(records);
        true
    }

    pub fn replace(&mut self, records: Vec<Car>) {
        self.counts = CarCounts {
            total: records.len(),
            unknown: records.iter().filter(|car| car.is_unknown()).count(),
        };
        self.records = records;
        self.generation = self.generation.saturating_add(1);
        if self.focus.is_some_and(|index| index >= self.records.len()) {
            self.focus = None;
        }
    }

    pub fn record_at(&self, index: usize) -> Option<&Car> {
        self.records.get(index)
    }

    pub fn position_of(&self, id: CarId) -> Option<usize> {
        self.records.iter().position(|car| car.id == id)
    }

    pub fn find(&self, id: CarId) -> Option<&Car> {
        self.records.iter().find(|car| car.id == id)
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn set_focus(&mut self, index: usize) -> bool {
        if index < self.records.len() {
            self.focus = Some(index);
            true
        } else {
            false
        }
    }

    pub fn clear_focus(&mut self) {
        self.focus = None;
    }
}

#[cfg(test)]
mod tests {
    use super::CarStore;
    use crate::{Car, CarCounts, CarId};

    fn car(id: i64, make: Option<&str>) -> Car {
        let mut car = Car::blank(CarId::new(id));
        car.make = make.map(str::to_owned);
        car
    }

    #[test]
    fn unknown_count_covers_empty_and_missing_make() {
        let mut store = CarStore::new();
        store.replace(vec![car(1, Some("Ford")), car(2, Some("")), car(3, None)]);
        assert_eq!(
            store.counts(),
            CarCounts {
                total: 3,
                unknown: 2,
            }
        );
    }

    #[test]
    fn stale_ticket_is_ignored() {
        let mut store = CarStore::new();
        let first = store.begin_fetch();
        let second = store.begin_fetch();

        assert!(store.apply_fetch(second, vec![car(2, Some("Kia"))]));
        assert!(!store.apply_fetch(first, vec![car(1, None), car(3, None)]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].id, CarId::new(2));
    }

    #[test]
    fn older_ticket_cannot_apply_even_before_newer_resolves() {
        let mut store = CarStore::new();
        let first = store.begin_fetch();
        let _second = store.begin_fetch();
        assert!(!store.apply_fetch(first, vec![car(1, None)]));
        assert!(store.is_empty());
    }

    #[test]
    fn replace_keeps_focus_in_range_and_drops_it_otherwise() {
        let mut store = CarStore::new();
        store.replace(vec![car(1, None), car(2, None), car(3, None)]);
        assert!(store.set_focus(2));
        let generation = store.generation();

        store.replace(vec![car(1, None), car(2, None), car(3, None), car(4, None)]);
        assert_eq!(store.focus(), Some(2));
        assert!(store.generation() > generation);

        store.replace(vec![car(1, None)]);
        assert_eq!(store.focus(), None);
    }

    #[test]
    fn record_at_is_bounds_checked() {
        let mut store = CarStore::new();
        store.replace(vec![car(1, None)]);
        assert!(store.record_at(0).is_some());
        assert!(store.record_at(1).is_none());
        assert!(!store.set_focus(5));
    }

    #[test]
    fn lookups_by_id_follow_store_order() {
        let mut store = CarStore::new();
        store.replace(vec![car(4, None), car(2, Some("Kia")), car(9, None)]);
        assert_eq!(store.position_of(CarId::new(9)), Some(2));
        assert_eq!(
            store.find(CarId::new(2)).and_then(|car| car.make.as_deref()),
            Some("Kia")
        );
        assert_eq!(store.position_of(CarId::new(5)), None);
    }
}
