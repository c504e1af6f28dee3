// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;
use time::UtcOffset;

use crate::{Car, CarStore, SortDirection, format_local_time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarColumn {
    DateTime,
    LicensePlate,
    State,
    Year,
    Make,
    Model,
    Color,
    Vin,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    Numeric,
    Chronological,
    Text,
}

impl CarColumn {
    pub const ALL: [Self; 9] = [
        Self::DateTime,
        Self::LicensePlate,
        Self::State,
        Self::Year,
        Self::Make,
        Self::Model,
        Self::Color,
        Self::Vin,
        Self::Video,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::DateTime => "seen",
            Self::LicensePlate => "plate",
            Self::State => "state",
            Self::Year => "year",
            Self::Make => "make",
            Self::Model => "model",
            Self::Color => "color",
            Self::Vin => "vin",
            Self::Video => "video",
        }
    }

    /// `None` for columns that do not sort.
    pub const fn sort_kind(self) -> Option<SortKind> {
        match self {
            Self::Year => Some(SortKind::Numeric),
            Self::DateTime => Some(SortKind::Chronological),
            Self::Video => None,
            Self::LicensePlate
            | Self::State
            | Self::Make
            | Self::Model
            | Self::Color
            | Self::Vin => Some(SortKind::Text),
        }
    }

    pub fn cell_text(self, car: &Car, offset: UtcOffset) -> String {
        match self {
            Self::DateTime => car
                .date_time
                .as_deref()
                .map(|raw| format_local_time(raw, offset))
                .unwrap_or_default(),
            Self::LicensePlate => car.license_plate.clone().unwrap_or_default(),
            Self::State => car.state.clone().unwrap_or_default(),
            Self::Year => car.year.map(|year| year.to_string()).unwrap_or_default(),
            Self::Make => car.make.clone().unwrap_or_default(),
            Self::Model => car.model.clone().unwrap_or_default(),
            Self::Color => car.color.clone().unwrap_or_default(),
            Self::Vin => car.vin.clone().unwrap_or_default(),
            Self::Video => (if car.has_video() { "▶" } else { "" }).to_owned(),
        }
    }

    fn text_of(self, car: &Car) -> Option<&str> {
        let value = match self {
            Self::LicensePlate => car.license_plate.as_deref(),
            Self::State => car.state.as_deref(),
            Self::Make => car.make.as_deref(),
            Self::Model => car.model.as_deref(),
            Self::Color => car.color.as_deref(),
            Self::Vin => car.vin.as_deref(),
            Self::DateTime => car.date_time.as_deref(),
            Self::Year | Self::Video => None,
        };
        value.filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: CarColumn,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableNotice {
    Empty,
    NoVideo(String),
}

impl TableNotice {
    pub fn message(&self) -> String {
        match self {
            Self::Empty => "no cars to review".to_owned(),
            Self::NoVideo(plate) => format!("no video for {plate}"),
        }
    }
}

/// Rendered-row state for the car table. Sorting never touches the store; a
/// new store generation discards the sort.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableView {
    sort: Option<SortSpec>,
    selected_row: usize,
    selected_col: usize,
    generation: u64,
}

impl TableView {
    pub fn sort(&self) -> Option<SortSpec> {
        self.sort
    }

    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    pub fn selected_column(&self) -> CarColumn {
        CarColumn::ALL[self.selected_col.min(CarColumn::ALL.len() - 1)]
    }

    /// Drops the sort when the store was replaced and keeps the cursor in range.
    pub fn sync(&mut self, store: &CarStore) {
        if self.generation != store.generation() {
            self.generation = store.generation();
            self.sort = None;
        }
        self.clamp(store.len());
    }

    /// Header click: same column flips direction, another column starts
    /// ascending.
    pub fn click_column(&mut self, column: CarColumn) -> Option<SortSpec> {
        column.sort_kind()?;
        let direction = match self.sort {
            Some(current) if current.column == column => current.direction.flipped(),
            _ => SortDirection::Asc,
        };
        let spec = SortSpec { column, direction };
        self.sort = Some(spec);
        Some(spec)
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
    }

    /// Store indices in rendered order.
    pub fn rows(&self, records: &[Car]) -> Vec<usize> {
        let mut order = (0..records.len()).collect::<Vec<_>>();
        if let Some(spec) = self.sort {
            order.sort_by(|left, right| compare_cars(&records[*left], &records[*right], spec));
        }
        order
    }

    pub fn selected_index(&self, store: &CarStore) -> Option<usize> {
        self.rows(store.records()).get(self.selected_row).copied()
    }

    pub fn move_row(&mut self, delta: isize, row_count: usize) {
        if row_count == 0 {
            self.selected_row = 0;
            return;
        }
        let max = row_count as isize - 1;
        self.selected_row = (self.selected_row as isize + delta).clamp(0, max) as usize;
    }

    pub fn jump_first_row(&mut self) {
        self.selected_row = 0;
    }

    pub fn jump_last_row(&mut self, row_count: usize) {
        self.selected_row = row_count.saturating_sub(1);
    }

    pub fn move_column(&mut self, delta: isize) {
        let max = CarColumn::ALL.len() as isize - 1;
        self.selected_col = (self.selected_col as isize + delta).clamp(0, max) as usize;
    }

    /// Puts the cursor on the rendered row showing `index`.
    pub fn select_store_index(&mut self, store: &CarStore, index: usize) {
        if let Some(row) = self
            .rows(store.records())
            .iter()
            .position(|candidate| *candidate == index)
        {
            self.selected_row = row;
        }
    }

    /// Store index to open in the review modal for the selected row.
    pub fn review_target(&self, store: &CarStore) -> Result<usize, TableNotice> {
        let index = self.selected_index(store).ok_or(TableNotice::Empty)?;
        let car = store.record_at(index).ok_or(TableNotice::Empty)?;
        if car.has_video() {
            Ok(index)
        } else {
            let plate = car
                .license_plate
                .clone()
                .filter(|plate| !plate.trim().is_empty())
                .unwrap_or_else(|| format!("car #{}", car.id));
            Err(TableNotice::NoVideo(plate))
        }
    }

    fn clamp(&mut self, row_count: usize) {
        self.selected_row = self.selected_row.min(row_count.saturating_sub(1));
    }
}

/// Missing values sort after present ones in either direction.
pub fn compare_cars(left: &Car, right: &Car, spec: SortSpec) -> Ordering {
    let Some(kind) = spec.column.sort_kind() else {
        return Ordering::Equal;
    };
    let ordered = |order: Ordering| match spec.direction {
        SortDirection::Asc => order,
        SortDirection::Desc => order.reverse(),
    };
    match kind {
        SortKind::Numeric => match (left.year, right.year) {
            (Some(left), Some(right)) => ordered(left.cmp(&right)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKind::Chronological => {
            match (
                spec.column.text_of(left),
                spec.column.text_of(right),
            ) {
                (Some(left_raw), Some(right_raw)) => {
                    match (left.captured_at(), right.captured_at()) {
                        (Some(left), Some(right)) => ordered(left.cmp(&right)),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => ordered(left_raw.cmp(right_raw)),
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }
        SortKind::Text => match (spec.column.text_of(left), spec.column.text_of(right)) {
            (Some(left), Some(right)) => ordered(compare_text(left, right)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

fn compare_text(left: &str, right: &str) -> Ordering {
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| left.cmp(right))
}

#[cfg(test)]
mod tests {
    use super::{CarColumn, SortSpec, TableNotice, TableView};
    use crate::{Car, CarId, CarStore, SortDirection};
    use time::UtcOffset;

    fn car_with_year(id: i64, year: Option<i32>) -> Car {
        let mut car = Car::blank(CarId::new(id));
        car.year = year;
        car
    }

    fn store_of(cars: Vec<Car>) -> CarStore {
        let mut store = CarStore::new();
        store.replace(cars);
        store
    }

    fn years(view: &TableView, store: &CarStore) -> Vec<Option<i32>> {
        view.rows(store.records())
            .into_iter()
            .map(|index| store.records()[index].year)
            .collect()
    }

    #[test]
    fn year_sorts_numerically() {
        let store = store_of(vec![
            car_with_year(1, Some(9)),
            car_with_year(2, Some(10)),
            car_with_year(3, Some(2)),
        ]);
        let mut view = TableView::default();
        view.sync(&store);
        view.click_column(CarColumn::Year);
        assert_eq!(years(&view, &store), vec![Some(2), Some(9), Some(10)]);
    }

    #[test]
    fn same_column_toggles_and_returns_to_identical_ascending_order() {
        let store = store_of(vec![
            car_with_year(1, Some(2001)),
            car_with_year(2, Some(1999)),
            car_with_year(3, Some(2001)),
            car_with_year(4, None),
        ]);
        let mut view = TableView::default();
        view.sync(&store);

        let first = view.click_column(CarColumn::Year);
        let ascending = view.rows(store.records());
        assert_eq!(
            first,
            Some(SortSpec {
                column: CarColumn::Year,
                direction: SortDirection::Asc,
            })
        );

        let second = view.click_column(CarColumn::Year);
        assert_eq!(second.map(|spec| spec.direction), Some(SortDirection::Desc));
        assert_eq!(years(&view, &store), vec![Some(2001), Some(2001), Some(1999), None]);

        view.click_column(CarColumn::Year);
        assert_eq!(view.rows(store.records()), ascending);
        assert_eq!(ascending, vec![1, 0, 2, 3]);
    }

    #[test]
    fn different_column_resets_to_ascending() {
        let store = store_of(vec![car_with_year(1, Some(1))]);
        let mut view = TableView::default();
        view.click_column(CarColumn::Year);
        view.click_column(CarColumn::Year);
        let spec = view.click_column(CarColumn::Make);
        assert_eq!(spec.map(|spec| spec.direction), Some(SortDirection::Asc));
        assert_eq!(view.sort().map(|spec| spec.column), Some(CarColumn::Make));
        assert_eq!(view.rows(store.records()), vec![0]);
    }

    #[test]
    fn video_column_is_not_sortable() {
        let mut view = TableView::default();
        assert!(view.click_column(CarColumn::Video).is_none());
        assert!(view.sort().is_none());
    }

    #[test]
    fn date_time_sorts_chronologically() {
        let mut early = Car::blank(CarId::new(1));
        early.date_time = Some("2024-01-02 09:00:00".to_owned());
        let mut late = Car::blank(CarId::new(2));
        late.date_time = Some("2024-01-10 08:00:00".to_owned());
        let mut mixed_format = Car::blank(CarId::new(3));
        mixed_format.date_time = Some("2024-01-05T12:00:00".to_owned());
        let store = store_of(vec![late, early, mixed_format]);

        let mut view = TableView::default();
        view.sync(&store);
        view.click_column(CarColumn::DateTime);
        let ids = view
            .rows(store.records())
            .into_iter()
            .map(|index| store.records()[index].id.get())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[test]
    fn text_sort_ignores_case() {
        let makes = ["toyota", "Audi", "BMW"];
        let cars = makes
            .iter()
            .enumerate()
            .map(|(index, make)| {
                let mut car = Car::blank(CarId::new(index as i64));
                car.make = Some((*make).to_owned());
                car
            })
            .collect();
        let store = store_of(cars);
        let mut view = TableView::default();
        view.sync(&store);
        view.click_column(CarColumn::Make);
        let sorted = view
            .rows(store.records())
            .into_iter()
            .map(|index| CarColumn::Make.cell_text(&store.records()[index], UtcOffset::UTC))
            .collect::<Vec<_>>();
        assert_eq!(sorted, vec!["Audi", "BMW", "toyota"]);
    }

    #[test]
    fn store_replace_discards_sort() {
        let mut store = store_of(vec![car_with_year(1, Some(5)), car_with_year(2, Some(1))]);
        let mut view = TableView::default();
        view.sync(&store);
        view.click_column(CarColumn::Year);
        assert_eq!(view.rows(store.records()), vec![1, 0]);

        store.replace(vec![car_with_year(1, Some(5)), car_with_year(2, Some(1))]);
        view.sync(&store);
        assert!(view.sort().is_none());
        assert_eq!(view.rows(store.records()), vec![0, 1]);
    }

    #[test]
    fn review_target_requires_video() {
        let mut plain = Car::blank(CarId::new(1));
        plain.license_plate = Some("8XYZ123".to_owned());
        let mut clip = Car::blank(CarId::new(2));
        clip.video_path = Some("clip.mov".to_owned());
        let store = store_of(vec![plain, clip]);

        let mut view = TableView::default();
        view.sync(&store);
        assert_eq!(
            view.review_target(&store),
            Err(TableNotice::NoVideo("8XYZ123".to_owned()))
        );
        view.move_row(1, store.len());
        assert_eq!(view.review_target(&store), Ok(1));
    }

    #[test]
    fn cursor_maps_rendered_rows_to_store_indices() {
        let store = store_of(vec![car_with_year(1, Some(3)), car_with_year(2, Some(1))]);
        let mut view = TableView::default();
        view.sync(&store);
        view.click_column(CarColumn::Year);
        assert_eq!(view.selected_index(&store), Some(1));
        view.select_store_index(&store, 0);
        assert_eq!(view.selected_row(), 1);
    }
}
