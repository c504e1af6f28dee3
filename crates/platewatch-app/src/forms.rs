// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::{Car, CarField, CarId, CarUpdate, LookupRequest, LookupResult, parse_captured_at};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Integer,
    Decimal,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: CarField,
    pub label: &'static str,
    pub input: InputKind,
    pub editable: bool,
}

const fn editable(field: CarField, input: InputKind) -> FieldSpec {
    FieldSpec {
        field,
        label: field.label(),
        input,
        editable: true,
    }
}

const fn read_only(field: CarField) -> FieldSpec {
    FieldSpec {
        field,
        label: field.label(),
        input: InputKind::Text,
        editable: false,
    }
}

pub const REVIEW_FIELDS: &[FieldSpec] = &[
    editable(CarField::LicensePlate, InputKind::Text),
    editable(CarField::State, InputKind::Text),
    editable(CarField::Year, InputKind::Integer),
    editable(CarField::Make, InputKind::Text),
    editable(CarField::Model, InputKind::Text),
];

pub const OVERLAY_FIELDS: &[FieldSpec] = &[
    editable(CarField::DateTime, InputKind::Timestamp),
    editable(CarField::Year, InputKind::Integer),
    editable(CarField::Make, InputKind::Text),
    editable(CarField::Model, InputKind::Text),
    editable(CarField::LicensePlate, InputKind::Text),
    editable(CarField::State, InputKind::Text),
    editable(CarField::Color, InputKind::Text),
    editable(CarField::Vin, InputKind::Text),
    editable(CarField::Latitude, InputKind::Decimal),
    editable(CarField::Longitude, InputKind::Decimal),
    read_only(CarField::VideoPath),
];

/// Edit buffer for one car, generated from a field list. Values stay as typed
/// text until a payload is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    id: CarId,
    specs: &'static [FieldSpec],
    values: Vec<String>,
    cursor: usize,
    editing: bool,
}

impl EditForm {
    pub fn from_car(car: &Car, specs: &'static [FieldSpec]) -> Self {
        Self {
            id: car.id,
            specs,
            values: specs.iter().map(|spec| car.field_text(spec.field)).collect(),
            cursor: 0,
            editing: false,
        }
    }

    pub fn id(&self) -> CarId {
        self.id
    }

    pub fn fields(&self) -> impl Iterator<Item = (&FieldSpec, &str)> {
        self.specs
            .iter()
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn value(&self, field: CarField) -> Option<&str> {
        self.position(field).map(|index| self.values[index].as_str())
    }

    /// Overwrites a field when the form carries it.
    pub fn set_value(&mut self, field: CarField, value: impl Into<String>) -> bool {
        match self.position(field) {
            Some(index) => {
                self.values[index] = value.into();
                true
            }
            None => false,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_spec(&self) -> Option<&FieldSpec> {
        self.specs.get(self.cursor)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        if self.specs.is_empty() {
            return;
        }
        let len = self.specs.len() as isize;
        self.cursor = (self.cursor as isize + delta).rem_euclid(len) as usize;
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Puts the cursor field into text-entry mode; read-only fields refuse.
    pub fn focus(&mut self) -> bool {
        let can_edit = self.current_spec().is_some_and(|spec| spec.editable);
        self.editing = can_edit;
        can_edit
    }

    pub fn blur(&mut self) {
        self.editing = false;
    }

    pub fn push_char(&mut self, ch: char) {
        if self.editing
            && let Some(value) = self.values.get_mut(self.cursor)
        {
            value.push(ch);
        }
    }

    pub fn pop_char(&mut self) {
        if self.editing
            && let Some(value) = self.values.get_mut(self.cursor)
        {
            value.pop();
        }
    }

    /// Builds the update for every editable field. Empty text clears a field;
    /// `0` is a value like any other.
    pub fn to_update(&self) -> Result<CarUpdate> {
        let mut update = CarUpdate::new(self.id);
        for (spec, raw) in self.fields() {
            if !spec.editable {
                continue;
            }
            let trimmed = raw.trim();
            match spec.input {
                InputKind::Integer => {
                    let value = parse_number::<i32>(spec, trimmed)?;
                    if spec.field == CarField::Year {
                        update.year = Some(value);
                    }
                }
                InputKind::Decimal => {
                    let value = parse_number::<f64>(spec, trimmed)?;
                    if let Some(number) = value
                        && !number.is_finite()
                    {
                        bail!("{} must be a finite number", spec.label);
                    }
                    match spec.field {
                        CarField::Latitude => update.latitude = Some(value),
                        CarField::Longitude => update.longitude = Some(value),
                        _ => {}
                    }
                }
                InputKind::Timestamp => {
                    if !trimmed.is_empty() && parse_captured_at(trimmed).is_none() {
                        bail!(
                            "{} must look like YYYY-MM-DD HH:MM:SS -- fix it and retry",
                            spec.label
                        );
                    }
                    if spec.field == CarField::DateTime {
                        update.date_time = Some(text_value(trimmed));
                    }
                }
                InputKind::Text => {
                    let value = Some(text_value(trimmed));
                    match spec.field {
                        CarField::Make => update.make = value,
                        CarField::Model => update.model = value,
                        CarField::LicensePlate => update.license_plate = value,
                        CarField::State => update.state = value,
                        CarField::Color => update.color = value,
                        CarField::Vin => update.vin = value,
                        _ => {}
                    }
                }
            }
        }
        Ok(update)
    }

    /// Plate lookup needs both plate and state; nothing is sent otherwise.
    pub fn lookup_request(&self) -> Result<LookupRequest> {
        let plate = normalize_plate(self.value(CarField::LicensePlate).unwrap_or_default());
        let state = self
            .value(CarField::State)
            .unwrap_or_default()
            .trim()
            .to_ascii_uppercase();
        if plate.is_empty() || state.is_empty() {
            bail!("license plate and state are required for a lookup -- fill both and retry");
        }
        Ok(LookupRequest {
            id: self.id,
            license_plate: plate,
            state,
        })
    }

    pub fn apply_lookup(&mut self, result: &LookupResult) {
        if let Some(year) = result.year {
            self.set_value(CarField::Year, year.to_string());
        }
        if let Some(make) = &result.make {
            self.set_value(CarField::Make, make.clone());
        }
        if let Some(model) = &result.model {
            self.set_value(CarField::Model, model.clone());
        }
        if let Some(vin) = &result.vin {
            self.set_value(CarField::Vin, vin.clone());
        }
        if let Some(state) = &result.state {
            self.set_value(CarField::State, state.clone());
        }
    }

    fn position(&self, field: CarField) -> Option<usize> {
        self.specs.iter().position(|spec| spec.field == field)
    }
}

/// Keeps only ASCII letters and digits, uppercased, the way plates are read
/// off camera frames.
pub fn normalize_plate(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

fn text_value(trimmed: &str) -> Option<String> {
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn parse_number<T: std::str::FromStr>(spec: &FieldSpec, trimmed: &str) -> Result<Option<T>> {
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<T>() {
        Ok(value) => Ok(Some(value)),
        Err(_) => bail!(
            "{} must be a number, got {trimmed:?} -- fix it and retry",
            spec.label
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{EditForm, OVERLAY_FIELDS, REVIEW_FIELDS, normalize_plate};
    use crate::{Car, CarField, CarId, LookupResult};
    use anyhow::Result;

    fn sample_car() -> Car {
        let mut car = Car::blank(CarId::new(11));
        car.license_plate = Some("7abc123".to_owned());
        car.state = Some("ca".to_owned());
        car.year = Some(2015);
        car.make = Some("Honda".to_owned());
        car.model = Some("Fit".to_owned());
        car.vin = Some("0".to_owned());
        car.video_path = Some("clips/a.mov".to_owned());
        car
    }

    #[test]
    fn review_form_is_generated_from_field_list() {
        let form = EditForm::from_car(&sample_car(), REVIEW_FIELDS);
        let labels = form.fields().map(|(spec, _)| spec.label).collect::<Vec<_>>();
        assert_eq!(labels, vec!["plate", "state", "year", "make", "model"]);
        assert_eq!(form.value(CarField::Year), Some("2015"));
        assert_eq!(form.value(CarField::Vin), None);
    }

    #[test]
    fn update_clears_empty_fields_and_keeps_zero() -> Result<()> {
        let mut form = EditForm::from_car(&sample_car(), REVIEW_FIELDS);
        form.set_value(CarField::Model, "");
        form.set_value(CarField::Year, "0");

        let update = form.to_update()?;
        assert_eq!(update.model, Some(None));
        assert_eq!(update.year, Some(Some(0)));
        assert_eq!(update.make, Some(Some("Honda".to_owned())));
        assert_eq!(update.vin, None);
        Ok(())
    }

    #[test]
    fn overlay_form_keeps_zero_text_and_skips_read_only_video() -> Result<()> {
        let form = EditForm::from_car(&sample_car(), OVERLAY_FIELDS);
        let update = form.to_update()?;
        assert_eq!(update.vin, Some(Some("0".to_owned())));
        assert_eq!(update.latitude, Some(None));
        let json = serde_json::to_value(&update)?;
        assert!(json.get("video_path").is_none());
        Ok(())
    }

    #[test]
    fn bad_number_is_rejected_before_sending() {
        let mut form = EditForm::from_car(&sample_car(), REVIEW_FIELDS);
        form.set_value(CarField::Year, "twenty");
        let error = form.to_update().expect_err("non-numeric year should fail");
        assert!(error.to_string().contains("year must be a number"));
    }

    #[test]
    fn lookup_requires_plate_and_state() {
        let mut form = EditForm::from_car(&sample_car(), REVIEW_FIELDS);
        form.set_value(CarField::State, "  ");
        let error = form
            .lookup_request()
            .expect_err("empty state should block lookup");
        assert!(error.to_string().contains("required"));
        assert_eq!(form.value(CarField::Make), Some("Honda"));
    }

    #[test]
    fn lookup_request_normalizes_plate_and_state() -> Result<()> {
        let mut form = EditForm::from_car(&sample_car(), REVIEW_FIELDS);
        form.set_value(CarField::LicensePlate, "7 abc-123");
        let request = form.lookup_request()?;
        assert_eq!(request.license_plate, "7ABC123");
        assert_eq!(request.state, "CA");
        assert_eq!(request.id, CarId::new(11));
        Ok(())
    }

    #[test]
    fn lookup_result_overwrites_only_present_fields() {
        let mut form = EditForm::from_car(&sample_car(), REVIEW_FIELDS);
        form.apply_lookup(&LookupResult {
            year: Some(2016),
            make: Some("Toyota".to_owned()),
            model: None,
            vin: Some("JT123".to_owned()),
            state: None,
        });
        assert_eq!(form.value(CarField::Year), Some("2016"));
        assert_eq!(form.value(CarField::Make), Some("Toyota"));
        assert_eq!(form.value(CarField::Model), Some("Fit"));
        assert_eq!(form.value(CarField::State), Some("ca"));
    }

    #[test]
    fn typing_only_lands_in_focused_field() {
        let mut form = EditForm::from_car(&sample_car(), OVERLAY_FIELDS);
        form.push_char('x');
        assert_eq!(form.value(CarField::DateTime), Some(""));

        form.move_cursor(-1);
        assert!(!form.focus(), "video path is read-only");

        form.move_cursor(-1);
        assert!(form.focus());
        form.pop_char();
        form.push_char('9');
        assert!(form.is_editing());
        form.blur();
        assert!(!form.is_editing());
        assert_eq!(form.value(CarField::Longitude), Some("9"));
    }

    #[test]
    fn plate_normalization_strips_noise() {
        assert_eq!(normalize_plate(" 4gh-j 88! "), "4GHJ88");
    }
}
