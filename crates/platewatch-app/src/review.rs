// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;

use crate::forms::{EditForm, REVIEW_FIELDS};
use crate::{Car, CarId, CarStore, CarUpdate, DeleteRequest, LookupRequest, LookupResult};

/// Player-facing state of the clip under review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playback {
    source: String,
    playing: bool,
}

impl Playback {
    pub fn new(source: impl Into<String>, autoplay: bool) -> Self {
        Self {
            source: source.into(),
            playing: autoplay,
        }
    }

    /// Relative video path as stored on the record.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn toggle(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Previous,
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewNotice {
    NotOpen,
    NoVideo(String),
    MissingRecord(usize),
    NoPrevious,
    NoNext,
}

impl ReviewNotice {
    pub fn message(&self) -> String {
        match self {
            Self::NotOpen => "no record under review".to_owned(),
            Self::NoVideo(title) => format!("{title} has no video to review"),
            Self::MissingRecord(index) => {
                format!("record {index} is not in the current list -- refresh and retry")
            }
            Self::NoPrevious => "no previous car with a video".to_owned(),
            Self::NoNext => "no next car with a video".to_owned(),
        }
    }
}

/// Where the modal landed after the current record was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterDelete {
    MovedTo(CarId),
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSession {
    snapshot: Vec<Car>,
    current: CarId,
    form: EditForm,
    playback: Playback,
    autoplay: bool,
}

impl ReviewSession {
    fn start(snapshot: Vec<Car>, position: usize, autoplay: bool) -> Option<Self> {
        let car = snapshot.get(position)?;
        let source = car.video()?.to_owned();
        Some(Self {
            current: car.id,
            form: EditForm::from_car(car, REVIEW_FIELDS),
            playback: Playback::new(source, autoplay),
            snapshot,
            autoplay,
        })
    }

    pub fn current_id(&self) -> CarId {
        self.current
    }

    pub fn current(&self) -> Option<&Car> {
        self.snapshot.iter().find(|car| car.id == self.current)
    }

    /// Position of the current record inside the snapshot.
    pub fn position(&self) -> Option<usize> {
        self.snapshot.iter().position(|car| car.id == self.current)
    }

    pub fn form(&self) -> &EditForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut EditForm {
        &mut self.form
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut Playback {
        &mut self.playback
    }

    fn load(&mut self, position: usize) {
        if let Some(car) = self.snapshot.get(position)
            && let Some(source) = car.video()
        {
            self.current = car.id;
            self.form = EditForm::from_car(car, REVIEW_FIELDS);
            self.playback = Playback::new(source, self.autoplay);
        }
    }

    fn neighbor(&self, from: usize, step: Step) -> Option<usize> {
        match step {
            Step::Previous => (0..from).rev().find(|index| self.snapshot[*index].has_video()),
            Step::Next => {
                (from + 1..self.snapshot.len()).find(|index| self.snapshot[*index].has_video())
            }
        }
    }
}

/// Single-record reviewer over the video-bearing records of a store snapshot.
/// The current record is tracked by id so a refresh landing mid-review cannot
/// shift it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReviewModal {
    #[default]
    Closed,
    Open(Box<ReviewSession>),
}

impl ReviewModal {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    pub fn session(&self) -> Option<&ReviewSession> {
        match self {
            Self::Open(session) => Some(session),
            Self::Closed => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut ReviewSession> {
        match self {
            Self::Open(session) => Some(session),
            Self::Closed => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.session().and_then(ReviewSession::position)
    }

    pub fn open(
        &mut self,
        store: &CarStore,
        index: usize,
        autoplay: bool,
    ) -> Result<CarId, ReviewNotice> {
        let car = store
            .record_at(index)
            .ok_or(ReviewNotice::MissingRecord(index))?;
        if !car.has_video() {
            return Err(ReviewNotice::NoVideo(car.title()));
        }
        let session = ReviewSession::start(store.records().to_vec(), index, autoplay)
            .ok_or_else(|| ReviewNotice::NoVideo(car.title()))?;
        let id = session.current_id();
        *self = Self::Open(Box::new(session));
        Ok(id)
    }

    pub fn close(&mut self) {
        *self = Self::Closed;
    }

    /// Moves to the nearest video-bearing record in the given direction.
    /// Staying put is reported as a notice.
    pub fn step(&mut self, step: Step) -> Result<CarId, ReviewNotice> {
        let session = self.session_mut().ok_or(ReviewNotice::NotOpen)?;
        let from = session.position().ok_or(ReviewNotice::NotOpen)?;
        let Some(target) = session.neighbor(from, step) else {
            return Err(match step {
                Step::Previous => ReviewNotice::NoPrevious,
                Step::Next => ReviewNotice::NoNext,
            });
        };
        session.load(target);
        Ok(session.current_id())
    }

    pub fn save_payload(&self) -> Result<CarUpdate> {
        let session = self.require_session()?;
        session.form.to_update()
    }

    pub fn lookup_request(&self) -> Result<LookupRequest> {
        let session = self.require_session()?;
        session.form.lookup_request()
    }

    pub fn apply_lookup(&mut self, result: &LookupResult) {
        if let Some(session) = self.session_mut() {
            session.form.apply_lookup(result);
        }
    }

    pub fn delete_request(&self) -> Result<DeleteRequest> {
        let session = self.require_session()?;
        Ok(DeleteRequest {
            id: session.current,
            video_path: session.current().and_then(Car::video).map(str::to_owned),
        })
    }

    /// Drops the current record from the snapshot and lands on the next
    /// video-bearing record after it, else the previous one, else closes.
    pub fn remove_current(&mut self) -> AfterDelete {
        let Some(session) = self.session_mut() else {
            return AfterDelete::Closed;
        };
        let Some(position) = session.position() else {
            self.close();
            return AfterDelete::Closed;
        };
        session.snapshot.remove(position);

        let after = (position..session.snapshot.len())
            .find(|index| session.snapshot[*index].has_video());
        let before = || (0..position).rev().find(|index| session.snapshot[*index].has_video());
        match after.or_else(before) {
            Some(target) => {
                session.load(target);
                AfterDelete::MovedTo(session.current)
            }
            None => {
                self.close();
                AfterDelete::Closed
            }
        }
    }

    /// Swaps in the records of a freshly applied fetch so navigation reads
    /// what the backend holds now. The form is left alone. A store that no
    /// longer holds the current record leaves the old snapshot in place.
    pub fn refresh_snapshot(&mut self, store: &CarStore) -> bool {
        let Some(session) = self.session_mut() else {
            return false;
        };
        if store.find(session.current).is_none() {
            return false;
        }
        session.snapshot = store.records().to_vec();
        true
    }

    /// Refreshes the snapshot after a save of `saved`. The form is rebuilt
    /// from the stored record only while that record is still under review
    /// and no field is being edited.
    pub fn resync(&mut self, store: &CarStore, saved: CarId) -> bool {
        if !self.refresh_snapshot(store) {
            return false;
        }
        let Some(session) = self.session_mut() else {
            return false;
        };
        if session.current != saved || session.form.is_editing() {
            return true;
        }
        let Some(car) = store.find(saved) else {
            return true;
        };
        let cursor = session.form.cursor();
        session.form = EditForm::from_car(car, REVIEW_FIELDS);
        session.form.move_cursor(cursor as isize);
        if let Some(source) = car.video()
            && source != session.playback.source()
        {
            session.playback = Playback::new(source, session.autoplay);
        }
        true
    }

    fn require_session(&self) -> Result<&ReviewSession> {
        self.session()
            .ok_or_else(|| anyhow::anyhow!(ReviewNotice::NotOpen.message()))
    }
}

#[cfg(test)]
mod tests {
    use super::{AfterDelete, ReviewModal, ReviewNotice, Step};
    use crate::{Car, CarField, CarId, CarStore};
    use anyhow::Result;

    fn car(id: i64, video: Option<&str>) -> Car {
        let mut car = Car::blank(CarId::new(id));
        car.video_path = video.map(str::to_owned);
        car.make = Some(format!("make-{id}"));
        car.license_plate = Some(format!("PLATE{id}"));
        car.state = Some("CA".to_owned());
        car
    }

    fn store(cars: Vec<Car>) -> CarStore {
        let mut store = CarStore::new();
        store.replace(cars);
        store
    }

    #[test]
    fn open_requires_a_video() {
        let store = store(vec![car(1, None), car(2, Some(""))]);
        let mut modal = ReviewModal::default();
        assert!(matches!(
            modal.open(&store, 0, true),
            Err(ReviewNotice::NoVideo(_))
        ));
        assert!(matches!(
            modal.open(&store, 1, true),
            Err(ReviewNotice::NoVideo(_))
        ));
        assert_eq!(
            modal.open(&store, 5, true),
            Err(ReviewNotice::MissingRecord(5))
        );
        assert!(!modal.is_open());
    }

    #[test]
    fn open_populates_form_and_autoplays() -> Result<()> {
        let store = store(vec![car(1, Some("clips/1.mov"))]);
        let mut modal = ReviewModal::default();
        modal
            .open(&store, 0, true)
            .map_err(|notice| anyhow::anyhow!(notice.message()))?;
        let session = modal.session().expect("open session");
        assert_eq!(session.playback().source(), "clips/1.mov");
        assert!(session.playback().is_playing());
        assert_eq!(session.form().value(CarField::Make), Some("make-1"));
        assert_eq!(modal.index(), Some(0));
        Ok(())
    }

    #[test]
    fn navigation_skips_records_without_video() {
        let store = store(vec![
            car(1, Some("a.mov")),
            car(2, None),
            car(3, Some("c.mov")),
        ]);
        let mut modal = ReviewModal::default();
        assert_eq!(modal.open(&store, 0, false), Ok(CarId::new(1)));

        assert_eq!(modal.step(Step::Next), Ok(CarId::new(3)));
        assert_eq!(modal.index(), Some(2));
        assert_eq!(modal.step(Step::Next), Err(ReviewNotice::NoNext));
        assert_eq!(modal.index(), Some(2));
        assert_eq!(modal.step(Step::Previous), Ok(CarId::new(1)));
    }

    #[test]
    fn previous_at_first_is_a_noop_with_notice() {
        let store = store(vec![car(1, None), car(2, Some("b.mov"))]);
        let mut modal = ReviewModal::default();
        assert_eq!(modal.open(&store, 1, true), Ok(CarId::new(2)));
        assert_eq!(modal.step(Step::Previous), Err(ReviewNotice::NoPrevious));
        assert_eq!(modal.index(), Some(1));
        assert!(modal.is_open());
    }

    #[test]
    fn delete_moves_forward_then_backward_then_closes() {
        let store = store(vec![
            car(1, Some("a.mov")),
            car(2, Some("b.mov")),
            car(3, None),
            car(4, Some("d.mov")),
        ]);
        let mut modal = ReviewModal::default();
        assert_eq!(modal.open(&store, 1, true), Ok(CarId::new(2)));

        assert_eq!(modal.remove_current(), AfterDelete::MovedTo(CarId::new(4)));
        assert_eq!(modal.remove_current(), AfterDelete::MovedTo(CarId::new(1)));
        assert_eq!(modal.remove_current(), AfterDelete::Closed);
        assert!(!modal.is_open());
    }

    #[test]
    fn deleting_the_only_video_record_closes() {
        let store = store(vec![car(1, None), car(2, Some("b.mov"))]);
        let mut modal = ReviewModal::default();
        assert_eq!(modal.open(&store, 1, true), Ok(CarId::new(2)));
        assert_eq!(modal.remove_current(), AfterDelete::Closed);
        assert_eq!(modal.index(), None);
    }

    #[test]
    fn refresh_landing_mid_review_keeps_current_record() {
        let mut store = store(vec![car(1, Some("a.mov")), car(2, Some("b.mov"))]);
        let mut modal = ReviewModal::default();
        assert_eq!(modal.open(&store, 1, true), Ok(CarId::new(2)));

        store.replace(vec![car(2, Some("b.mov"))]);
        assert!(modal.resync(&store, CarId::new(2)));
        assert_eq!(
            modal.session().map(|session| session.current_id()),
            Some(CarId::new(2))
        );
        assert_eq!(modal.index(), Some(0));

        store.replace(vec![car(9, Some("z.mov"))]);
        assert!(!modal.resync(&store, CarId::new(2)));
        assert_eq!(modal.index(), Some(0));
    }

    #[test]
    fn refreshed_snapshot_feeds_navigation_without_touching_the_form() {
        let mut store = store(vec![car(1, Some("a.mov")), car(2, Some("b.mov"))]);
        let mut modal = ReviewModal::default();
        assert_eq!(modal.open(&store, 0, true), Ok(CarId::new(1)));
        modal
            .session_mut()
            .expect("open session")
            .form_mut()
            .set_value(CarField::Make, "typed");

        let mut enriched = car(1, Some("a.mov"));
        enriched.make = Some("Nissan".to_owned());
        store.replace(vec![enriched, car(2, Some("b.mov"))]);
        assert!(modal.refresh_snapshot(&store));
        let session = modal.session().expect("open session");
        assert_eq!(session.form().value(CarField::Make), Some("typed"));

        assert_eq!(modal.step(Step::Next), Ok(CarId::new(2)));
        assert_eq!(modal.step(Step::Previous), Ok(CarId::new(1)));
        let session = modal.session().expect("open session");
        assert_eq!(session.form().value(CarField::Make), Some("Nissan"));
    }

    #[test]
    fn save_resync_leaves_another_record_form_alone() {
        let mut store = store(vec![car(1, Some("a.mov")), car(2, Some("b.mov"))]);
        let mut modal = ReviewModal::default();
        assert_eq!(modal.open(&store, 0, true), Ok(CarId::new(1)));
        assert_eq!(modal.step(Step::Next), Ok(CarId::new(2)));
        modal
            .session_mut()
            .expect("open session")
            .form_mut()
            .set_value(CarField::Make, "edited");

        let mut saved = car(1, Some("a.mov"));
        saved.make = Some("Saved".to_owned());
        store.replace(vec![saved, car(2, Some("b.mov"))]);
        assert!(modal.resync(&store, CarId::new(1)));
        let session = modal.session().expect("open session");
        assert_eq!(session.current_id(), CarId::new(2));
        assert_eq!(session.form().value(CarField::Make), Some("edited"));
    }

    #[test]
    fn delete_request_carries_video_path() -> Result<()> {
        let store = store(vec![car(7, Some("clips/7.mov"))]);
        let mut modal = ReviewModal::default();
        assert_eq!(modal.open(&store, 0, true), Ok(CarId::new(7)));
        let request = modal.delete_request()?;
        assert_eq!(request.id, CarId::new(7));
        assert_eq!(request.video_path.as_deref(), Some("clips/7.mov"));
        Ok(())
    }

    #[test]
    fn lookup_without_state_never_builds_a_request() {
        let mut with_blank_state = car(1, Some("a.mov"));
        with_blank_state.state = None;
        let store = store(vec![with_blank_state]);
        let mut modal = ReviewModal::default();
        assert_eq!(modal.open(&store, 0, true), Ok(CarId::new(1)));
        assert!(modal.lookup_request().is_err());
    }

    #[test]
    fn playback_toggles() {
        let store = store(vec![car(1, Some("a.mov"))]);
        let mut modal = ReviewModal::default();
        assert_eq!(modal.open(&store, 0, true), Ok(CarId::new(1)));
        let session = modal.session_mut().expect("open session");
        assert!(!session.playback_mut().toggle());
        assert!(session.playback_mut().toggle());
    }
}
