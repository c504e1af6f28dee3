// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::forms::{EditForm, OVERLAY_FIELDS};
use crate::{Car, CarId, CarStore, Coordinates, DeleteRequest};

/// Opaque token a surface hands back for a placed marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(u64);

impl MarkerHandle {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }
}

/// Rendering capability behind the map view.
pub trait MapSurface {
    fn place_marker(&mut self, id: CarId, at: Coordinates, title: &str) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    fn open_overlay(&mut self, handle: MarkerHandle);
    fn close_overlay(&mut self);
    fn set_center(&mut self, center: Coordinates);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub id: CarId,
    pub handle: MarkerHandle,
    pub at: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapNotice {
    NoMarkers,
    MissingRecord(CarId),
    NoOverlay,
}

impl MapNotice {
    pub fn message(&self) -> String {
        match self {
            Self::NoMarkers => "no cars with a location to show".to_owned(),
            Self::MissingRecord(id) => {
                format!("car #{id} is no longer in the list -- refresh and retry")
            }
            Self::NoOverlay => "no marker is open".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct OpenOverlay {
    handle: MarkerHandle,
    form: EditForm,
}

/// Keeps one marker per plottable record in sync with the store.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    markers: Vec<Marker>,
    selected: Option<usize>,
    overlay: Option<OpenOverlay>,
    center: Coordinates,
    generation: Option<u64>,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            markers: Vec::new(),
            selected: None,
            overlay: None,
            center: Coordinates::ORIGIN,
            generation: None,
        }
    }
}

impl MapView {
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn center(&self) -> Coordinates {
        self.center
    }

    pub fn is_synced(&self, store: &CarStore) -> bool {
        self.generation == Some(store.generation())
    }

    /// Rebuilds every marker from the store, in store order.
    pub fn sync(&mut self, store: &CarStore, surface: &mut dyn MapSurface) {
        let selected_id = self.selected_marker().map(|marker| marker.id);
        self.close_overlay(surface);
        for marker in self.markers.drain(..) {
            surface.remove_marker(marker.handle);
        }
        self.markers = store
            .records()
            .iter()
            .filter_map(|car| {
                car.coordinates().map(|at| Marker {
                    id: car.id,
                    handle: surface.place_marker(car.id, at, &car.title()),
                    at,
                })
            })
            .collect();
        self.selected = match selected_id {
            Some(id) => self.markers.iter().position(|marker| marker.id == id),
            None => None,
        }
        .or_else(|| (!self.markers.is_empty()).then_some(0));
        self.generation = Some(store.generation());
        if let Some(center) = self.bounds_center() {
            self.center = center;
            surface.set_center(center);
        }
    }

    /// Needed when nothing in the store can be plotted.
    pub fn needs_fallback_center(&self) -> bool {
        self.markers.is_empty()
    }

    /// Centers on a backend-provided location, or the origin when there is none.
    pub fn apply_fallback_center(
        &mut self,
        location: Option<Coordinates>,
        surface: &mut dyn MapSurface,
    ) {
        let center = location
            .filter(|location| location.is_valid())
            .unwrap_or(Coordinates::ORIGIN);
        self.center = center;
        surface.set_center(center);
    }

    /// South-west and north-east corners of every marker.
    pub fn bounds(&self) -> Option<(Coordinates, Coordinates)> {
        let first = self.markers.first()?.at;
        let (south_west, north_east) = self.markers.iter().fold(
            (first, first),
            |(mut south_west, mut north_east), marker| {
                south_west.latitude = south_west.latitude.min(marker.at.latitude);
                south_west.longitude = south_west.longitude.min(marker.at.longitude);
                north_east.latitude = north_east.latitude.max(marker.at.latitude);
                north_east.longitude = north_east.longitude.max(marker.at.longitude);
                (south_west, north_east)
            },
        );
        Some((south_west, north_east))
    }

    fn bounds_center(&self) -> Option<Coordinates> {
        let (south_west, north_east) = self.bounds()?;
        Some(Coordinates {
            latitude: (south_west.latitude + north_east.latitude) / 2.0,
            longitude: (south_west.longitude + north_east.longitude) / 2.0,
        })
    }

    pub fn selected_marker(&self) -> Option<&Marker> {
        self.selected.and_then(|index| self.markers.get(index))
    }

    pub fn cycle(&mut self, delta: isize) -> Option<&Marker> {
        if self.markers.is_empty() {
            self.selected = None;
            return None;
        }
        let len = self.markers.len() as isize;
        let current = self.selected.unwrap_or(0) as isize;
        let next = if self.selected.is_none() {
            0
        } else {
            (current + delta).rem_euclid(len) as usize
        };
        self.selected = Some(next);
        self.markers.get(next)
    }

    pub fn select_car(&mut self, id: CarId) -> bool {
        match self.markers.iter().position(|marker| marker.id == id) {
            Some(index) => {
                self.selected = Some(index);
                true
            }
            None => false,
        }
    }

    /// Opens the overlay for the selected marker with a form built fresh from
    /// the current record.
    pub fn open_overlay(
        &mut self,
        store: &CarStore,
        surface: &mut dyn MapSurface,
    ) -> Result<CarId, MapNotice> {
        let marker = *self.selected_marker().ok_or(MapNotice::NoMarkers)?;
        let car = store
            .find(marker.id)
            .ok_or(MapNotice::MissingRecord(marker.id))?;
        self.overlay = Some(OpenOverlay {
            handle: marker.handle,
            form: EditForm::from_car(car, OVERLAY_FIELDS),
        });
        surface.open_overlay(marker.handle);
        Ok(marker.id)
    }

    pub fn close_overlay(&mut self, surface: &mut dyn MapSurface) {
        if self.overlay.take().is_some() {
            surface.close_overlay();
        }
    }

    pub fn overlay_open(&self) -> bool {
        self.overlay.is_some()
    }

    pub fn overlay_form(&self) -> Option<&EditForm> {
        self.overlay.as_ref().map(|overlay| &overlay.form)
    }

    pub fn overlay_form_mut(&mut self) -> Option<&mut EditForm> {
        self.overlay.as_mut().map(|overlay| &mut overlay.form)
    }

    pub fn overlay_car<'a>(&self, store: &'a CarStore) -> Option<&'a Car> {
        self.overlay
            .as_ref()
            .and_then(|overlay| store.find(overlay.form.id()))
    }

    pub fn delete_request(&self, store: &CarStore) -> Result<DeleteRequest, MapNotice> {
        let overlay = self.overlay.as_ref().ok_or(MapNotice::NoOverlay)?;
        let id = overlay.form.id();
        let car = store.find(id).ok_or(MapNotice::MissingRecord(id))?;
        Ok(DeleteRequest {
            id,
            video_path: car.video().map(str::to_owned),
        })
    }

    /// Removes a marker ahead of the refresh that follows a delete.
    pub fn remove_marker_for(&mut self, id: CarId, surface: &mut dyn MapSurface) -> bool {
        let Some(index) = self.markers.iter().position(|marker| marker.id == id) else {
            return false;
        };
        let marker = self.markers.remove(index);
        if self
            .overlay
            .as_ref()
            .is_some_and(|overlay| overlay.handle == marker.handle)
        {
            self.close_overlay(surface);
        }
        surface.remove_marker(marker.handle);
        self.selected = if self.markers.is_empty() {
            None
        } else {
            self.selected.map(|selected| selected.min(self.markers.len() - 1))
        };
        true
    }
}
