// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use url::form_urlencoded;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Make,
    Model,
    StartYear,
    EndYear,
    State,
    LicensePlate,
    Color,
    StartDate,
    EndDate,
}

impl FilterField {
    /// Canonical parameter order.
    pub const ALL: [Self; 9] = [
        Self::Make,
        Self::Model,
        Self::StartYear,
        Self::EndYear,
        Self::State,
        Self::LicensePlate,
        Self::Color,
        Self::StartDate,
        Self::EndDate,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::Make => "make",
            Self::Model => "model",
            Self::StartYear => "start_year",
            Self::EndYear => "end_year",
            Self::State => "state",
            Self::LicensePlate => "license_plate",
            Self::Color => "color",
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Make => "make",
            Self::Model => "model",
            Self::StartYear => "from year",
            Self::EndYear => "to year",
            Self::State => "state",
            Self::LicensePlate => "plate",
            Self::Color => "color",
            Self::StartDate => "from date",
            Self::EndDate => "to date",
        }
    }
}

/// Sparse filter for `GET /api/cars`. Values are forwarded untouched; range
/// and match policy belong to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterCriteria {
    pub make: Option<String>,
    pub model: Option<String>,
    pub start_year: Option<String>,
    pub end_year: Option<String>,
    pub state: Option<String>,
    pub license_plate: Option<String>,
    pub color: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl FilterCriteria {
    pub fn get(&self, field: FilterField) -> Option<&str> {
        let value = match field {
            FilterField::Make => &self.make,
            FilterField::Model => &self.model,
            FilterField::StartYear => &self.start_year,
            FilterField::EndYear => &self.end_year,
            FilterField::State => &self.state,
            FilterField::LicensePlate => &self.license_plate,
            FilterField::Color => &self.color,
            FilterField::StartDate => &self.start_date,
            FilterField::EndDate => &self.end_date,
        };
        value.as_deref().filter(|text| !text.is_empty())
    }

    pub fn set(&mut self, field: FilterField, value: impl Into<String>) {
        let value = value.into();
        let value = (!value.is_empty()).then_some(value);
        match field {
            FilterField::Make => self.make = value,
            FilterField::Model => self.model = value,
            FilterField::StartYear => self.start_year = value,
            FilterField::EndYear => self.end_year = value,
            FilterField::State => self.state = value,
            FilterField::LicensePlate => self.license_plate = value,
            FilterField::Color => self.color = value,
            FilterField::StartDate => self.start_date = value,
            FilterField::EndDate => self.end_date = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        FilterField::ALL
            .iter()
            .all(|field| self.get(*field).is_none())
    }

    pub fn active_count(&self) -> usize {
        FilterField::ALL
            .iter()
            .filter(|field| self.get(**field).is_some())
            .count()
    }

    /// Only the empty string counts as unset; `"0"` is a real value.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for field in FilterField::ALL {
            if let Some(value) = self.get(field) {
                serializer.append_pair(field.key(), value);
            }
        }
        serializer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterCriteria, FilterField};

    #[test]
    fn empty_fields_are_omitted() {
        let criteria = FilterCriteria {
            make: Some("Honda".to_owned()),
            start_year: Some(String::new()),
            ..FilterCriteria::default()
        };
        let query = criteria.to_query_string();
        assert_eq!(query, "make=Honda");
        assert!(!query.contains("start_year"));
    }

    #[test]
    fn empty_criteria_yield_empty_query() {
        assert_eq!(FilterCriteria::default().to_query_string(), "");
        assert!(FilterCriteria::default().is_empty());
    }

    #[test]
    fn keys_follow_canonical_order_and_values_are_encoded() {
        let mut criteria = FilterCriteria::default();
        criteria.set(FilterField::EndDate, "2024-05-01 12:00");
        criteria.set(FilterField::LicensePlate, "7ABC&12");
        criteria.set(FilterField::Make, "Land Rover");

        assert_eq!(
            criteria.to_query_string(),
            "make=Land+Rover&license_plate=7ABC%2612&end_date=2024-05-01+12%3A00"
        );
        assert_eq!(criteria.active_count(), 3);
    }

    #[test]
    fn zero_is_forwarded_not_dropped() {
        let mut criteria = FilterCriteria::default();
        criteria.set(FilterField::StartYear, "0");
        assert_eq!(criteria.to_query_string(), "start_year=0");
    }

    #[test]
    fn setting_empty_clears_field() {
        let mut criteria = FilterCriteria::default();
        criteria.set(FilterField::Color, "red");
        criteria.set(FilterField::Color, "");
        assert!(criteria.color.is_none());
        assert!(criteria.is_empty());
    }

    #[test]
    fn no_key_is_emitted_without_value() {
        let criteria = FilterCriteria {
            model: Some(String::new()),
            state: Some("CA".to_owned()),
            ..FilterCriteria::default()
        };
        let query = criteria.to_query_string();
        assert_eq!(query, "state=CA");
        assert!(!query.contains("=&") && !query.starts_with('='));
    }
}
