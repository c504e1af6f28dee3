// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{PrimitiveDateTime, UtcOffset};

use crate::ids::CarId;

const CAPTURED_AT_FORMATS: [&[BorrowedFormatItem<'static>]; 5] = [
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
];

const LOCAL_DISPLAY_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// One vehicle sighting as served by `GET /api/cars`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub year: Option<i32>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub license_plate: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub video_path: Option<String>,
}

impl Car {
    pub fn blank(id: CarId) -> Self {
        Self {
            id,
            date_time: None,
            year: None,
            make: None,
            model: None,
            license_plate: None,
            state: None,
            color: None,
            vin: None,
            latitude: None,
            longitude: None,
            video_path: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        !has_text(self.make.as_deref())
    }

    pub fn has_video(&self) -> bool {
        has_text(self.video_path.as_deref())
    }

    pub fn video(&self) -> Option<&str> {
        self.video_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
    }

    /// Both coordinates present, finite and in range.
    pub fn coordinates(&self) -> Option<Coordinates> {
        let (latitude, longitude) = (self.latitude?, self.longitude?);
        let coordinates = Coordinates {
            latitude,
            longitude,
        };
        coordinates.is_valid().then_some(coordinates)
    }

    pub fn title(&self) -> String {
        let parts = [
            self.year.map(|year| year.to_string()),
            self.make.clone(),
            self.model.clone(),
        ];
        let title = parts
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if title.is_empty() {
            format!("car #{}", self.id)
        } else {
            title
        }
    }

    pub fn captured_at(&self) -> Option<PrimitiveDateTime> {
        self.date_time.as_deref().and_then(parse_captured_at)
    }

    pub fn field_text(&self, field: CarField) -> String {
        match field {
            CarField::DateTime => self.date_time.clone().unwrap_or_default(),
            CarField::Year => self.year.map(|year| year.to_string()).unwrap_or_default(),
            CarField::Make => self.make.clone().unwrap_or_default(),
            CarField::Model => self.model.clone().unwrap_or_default(),
            CarField::LicensePlate => self.license_plate.clone().unwrap_or_default(),
            CarField::State => self.state.clone().unwrap_or_default(),
            CarField::Color => self.color.clone().unwrap_or_default(),
            CarField::Vin => self.vin.clone().unwrap_or_default(),
            CarField::Latitude => self
                .latitude
                .map(|value| value.to_string())
                .unwrap_or_default(),
            CarField::Longitude => self
                .longitude
                .map(|value| value.to_string())
                .unwrap_or_default(),
            CarField::VideoPath => self.video_path.clone().unwrap_or_default(),
        }
    }
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|text| !text.trim().is_empty())
}

/// Parses the backend's naive timestamp. The backend stores UTC without an
/// offset.
pub fn parse_captured_at(raw: &str) -> Option<PrimitiveDateTime> {
    let trimmed = raw.trim();
    CAPTURED_AT_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(trimmed, format).ok())
}

/// Renders a backend timestamp in the viewer's offset, falling back to the raw
/// text when it does not parse.
pub fn format_local_time(raw: &str, offset: UtcOffset) -> String {
    match parse_captured_at(raw) {
        Some(naive) => naive
            .assume_utc()
            .to_offset(offset)
            .format(LOCAL_DISPLAY_FORMAT)
            .unwrap_or_else(|_| raw.to_owned()),
        None => raw.to_owned(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CarField {
    DateTime,
    Year,
    Make,
    Model,
    LicensePlate,
    State,
    Color,
    Vin,
    Latitude,
    Longitude,
    VideoPath,
}

impl CarField {
    pub const fn key(self) -> &'static str {
        match self {
            Self::DateTime => "date_time",
            Self::Year => "year",
            Self::Make => "make",
            Self::Model => "model",
            Self::LicensePlate => "license_plate",
            Self::State => "state",
            Self::Color => "color",
            Self::Vin => "vin",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::VideoPath => "video_path",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::DateTime => "date/time",
            Self::Year => "year",
            Self::Make => "make",
            Self::Model => "model",
            Self::LicensePlate => "plate",
            Self::State => "state",
            Self::Color => "color",
            Self::Vin => "vin",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::VideoPath => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(deserialize_with = "lenient_required")]
    pub latitude: f64,
    #[serde(deserialize_with = "lenient_required")]
    pub longitude: f64,
}

impl Coordinates {
    pub const ORIGIN: Self = Self {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn is_valid(self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Partial update keyed by id. `None` leaves a field untouched, `Some(None)`
/// clears it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarUpdate {
    pub id: CarId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<Option<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<Option<f64>>,
}

impl CarUpdate {
    pub fn new(id: CarId) -> Self {
        Self {
            id,
            date_time: None,
            year: None,
            make: None,
            model: None,
            license_plate: None,
            state: None,
            color: None,
            vin: None,
            latitude: None,
            longitude: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteRequest {
    pub id: CarId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupRequest {
    pub id: CarId,
    pub license_plate: String,
    pub state: String,
}

/// Enrichment fields returned by a successful plate lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookupResult {
    pub year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub vin: Option<String>,
    pub state: Option<String>,
}

/// Reply envelope shared by the mutating endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusReply {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub year: Option<i32>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl StatusReply {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn lookup_result(&self) -> LookupResult {
        LookupResult {
            year: self.year,
            make: self.make.clone().filter(|value| !value.trim().is_empty()),
            model: self.model.clone().filter(|value| !value.trim().is_empty()),
            vin: self.vin.clone().filter(|value| !value.trim().is_empty()),
            state: self.state.clone().filter(|value| !value.trim().is_empty()),
        }
    }
}

/// One entry of `GET /api/makes`. Older servers send bare strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "MakeEntry")]
pub struct MakeCount {
    pub make: String,
    pub count: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MakeEntry {
    Counted {
        make: String,
        #[serde(default)]
        count: Option<u64>,
    },
    Bare(String),
}

impl From<MakeEntry> for MakeCount {
    fn from(entry: MakeEntry) -> Self {
        match entry {
            MakeEntry::Counted { make, count } => Self { make, count },
            MakeEntry::Bare(make) => Self { make, count: None },
        }
    }
}

/// Lookup lists offered by the filter panel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterOptions {
    pub makes: Vec<MakeCount>,
    pub models: Vec<String>,
    pub years: Vec<i32>,
    pub states: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewKind {
    Cars,
    Map,
    Unknown,
}

impl ViewKind {
    pub const ALL: [Self; 3] = [Self::Cars, Self::Map, Self::Unknown];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Cars => "cars",
            Self::Map => "map",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cars" => Some(Self::Cars),
            "map" => Some(Self::Map),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Which backend list feeds the store for this view.
    pub const fn source(self) -> CarSource {
        match self {
            Self::Cars | Self::Map => CarSource::Filtered,
            Self::Unknown => CarSource::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarSource {
    Filtered,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CarCounts {
    pub total: usize,
    pub unknown: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText<T> {
    Number(T),
    Text(String),
}

fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
{
    let raw = Option::<NumberOrText<T>>::deserialize(deserializer)?;
    Ok(match raw {
        None => None,
        Some(NumberOrText::Number(value)) => Some(value),
        Some(NumberOrText::Text(text)) => text.trim().parse().ok(),
    })
}

fn lenient_required<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
{
    match NumberOrText::<T>::deserialize(deserializer)? {
        NumberOrText::Number(value) => Ok(value),
        NumberOrText::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got {text:?}"))),
    }
}
