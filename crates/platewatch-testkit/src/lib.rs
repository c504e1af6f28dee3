// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use platewatch_app::{
    Car, CarId, CarUpdate, Coordinates, DeleteRequest, FilterCriteria, LookupRequest,
    LookupResult, MakeCount, normalize_plate,
};
use std::collections::BTreeMap;
use time::macros::{datetime, format_description};
use time::{Duration, PrimitiveDateTime};

const MAKES: [(&str, &[&str]); 8] = [
    ("Chevrolet", &["Silverado", "Malibu", "Equinox"]),
    ("Ford", &["F-150", "Escape", "Focus", "Mustang"]),
    ("Honda", &["Civic", "Accord", "CR-V", "Fit"]),
    ("Kia", &["Soul", "Sorento"]),
    ("Nissan", &["Altima", "Leaf"]),
    ("Subaru", &["Outback", "Forester", "Impreza"]),
    ("Tesla", &["Model 3", "Model Y"]),
    ("Toyota", &["Camry", "Corolla", "RAV4", "Tacoma"]),
];

const COLORS: [&str; 7] = ["white", "black", "silver", "gray", "red", "blue", "green"];
const STATES: [&str; 7] = ["AZ", "CA", "CO", "NV", "OR", "TX", "WA"];
const PLATE_LETTERS: &[u8; 23] = b"ABCDEFGHJKLMNPRSTUVWXYZ";
const VIN_CHARS: &[u8; 33] = b"ABCDEFGHJKLMNPRSTUVWXYZ0123456789";

const CAMERA: Coordinates = Coordinates {
    latitude: 37.7749,
    longitude: -122.4194,
};
const REFERENCE_CAPTURE: PrimitiveDateTime = datetime!(2026-01-01 00:00:00);
const CAPTURE_WINDOW_MINUTES: usize = 30 * 24 * 60;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1_u64 << 53) as f64
    }
}

/// Seeded generator of plausible camera sightings.
#[derive(Debug, Clone)]
pub struct FleetFaker {
    rng: DeterministicRng,
}

impl FleetFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn car(&mut self, id: i64) -> Car {
        let mut car = Car::blank(CarId::new(id));
        let minutes = self.rng.int_n(CAPTURE_WINDOW_MINUTES) as i64;
        let captured = REFERENCE_CAPTURE + Duration::minutes(minutes);
        car.date_time = captured
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .ok();
        car.license_plate = Some(self.plate());
        car.state = Some(self.pick(&STATES).to_owned());
        car.color = Some(self.pick(&COLORS).to_owned());

        // roughly one in six sightings never got a lookup
        if self.rng.int_n(6) != 0 {
            let lookup = self.lookup();
            car.year = lookup.year;
            car.make = lookup.make;
            car.model = lookup.model;
            car.vin = lookup.vin;
        } else if self.rng.int_n(2) == 0 {
            car.make = Some(String::new());
        }

        if self.rng.int_n(5) != 0 {
            car.latitude = Some(CAMERA.latitude + (self.rng.unit() - 0.5) * 0.08);
            car.longitude = Some(CAMERA.longitude + (self.rng.unit() - 0.5) * 0.08);
        }
        if self.rng.int_n(4) != 0 {
            car.video_path = Some(format!("clips/{id:05}.mp4"));
        }
        car
    }

    /// Cars with ids `1..=count`, in id order.
    pub fn fleet(&mut self, count: usize) -> Vec<Car> {
        (1..=count as i64).map(|id| self.car(id)).collect()
    }

    pub fn lookup(&mut self) -> LookupResult {
        let (make, models) = MAKES[self.rng.int_n(MAKES.len())];
        let model = self.pick(models);
        LookupResult {
            year: Some(2004 + self.rng.int_n(22) as i32),
            make: Some(make.to_owned()),
            model: Some(model.to_owned()),
            vin: Some(self.vin()),
            state: None,
        }
    }

    fn plate(&mut self) -> String {
        let digit = 1 + self.rng.int_n(9);
        let letters = (0..3)
            .map(|_| PLATE_LETTERS[self.rng.int_n(PLATE_LETTERS.len())] as char)
            .collect::<String>();
        format!("{digit}{letters}{:03}", self.rng.int_n(1000))
    }

    fn vin(&mut self) -> String {
        (0..17)
            .map(|_| VIN_CHARS[self.rng.int_n(VIN_CHARS.len())] as char)
            .collect()
    }

    fn pick<'a>(&mut self, values: &'a [&'a str]) -> &'a str {
        values[self.rng.int_n(values.len())]
    }
}

/// Six hand-picked cars covering every display edge: unknown makes, missing
/// video, missing or out-of-range coordinates, an unparseable timestamp.
pub fn fixture_cars() -> Vec<Car> {
    let base = [
        (1, "2024-05-01 08:15:00", Some(2018), Some("Toyota"), Some("Camry"), "7ABC123", Some("clips/1.mp4"), Some((37.77, -122.41))),
        (2, "2024-05-01 09:00:00", None, Some(""), None, "4XYZ900", None, Some((37.78, -122.40))),
        (3, "2024-04-30 23:59:59", Some(2009), Some("honda"), Some("Fit"), "8LMN456", Some("clips/3.mp4"), None),
        (4, "not a time", Some(2021), None, None, "5QRS777", Some("clips/4.mp4"), Some((95.0, 10.0))),
        (5, "2024-05-02 12:00:00", Some(2015), Some("Ford"), Some("Focus"), "6TUV321", Some(""), Some((37.76, -122.43))),
        (6, "2024-05-02 12:30:00", Some(2012), Some("Subaru"), Some("Outback"), "3JKL654", Some("clips/6.mp4"), Some((37.75, -122.44))),
    ];
    base.into_iter()
        .map(|(id, when, year, make, model, plate, video, at)| {
            let mut car = Car::blank(CarId::new(id));
            car.date_time = Some(when.to_owned());
            car.year = year;
            car.make = make.map(str::to_owned);
            car.model = model.map(str::to_owned);
            car.license_plate = Some(plate.to_owned());
            car.state = Some("CA".to_owned());
            car.color = Some("silver".to_owned());
            car.video_path = video.map(str::to_owned);
            if let Some((latitude, longitude)) = at {
                car.latitude = Some(latitude);
                car.longitude = Some(longitude);
            }
            car
        })
        .collect()
}

/// In-memory stand-in for the REST backend, applying the same filter rules.
#[derive(Debug, Clone, Default)]
pub struct MemoryFleet {
    cars: Vec<Car>,
}

impl MemoryFleet {
    pub fn new(cars: Vec<Car>) -> Self {
        Self { cars }
    }

    pub fn demo(seed: u64, count: usize) -> Self {
        Self::new(FleetFaker::new(seed).fleet(count))
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    /// Exact make/model/state/color, year bounds, plate substring and
    /// timestamp bounds compared as text.
    pub fn list(&self, criteria: &FilterCriteria) -> Vec<Car> {
        let start_year = criteria.start_year.as_deref().and_then(parse_year);
        let end_year = criteria.end_year.as_deref().and_then(parse_year);
        self.cars
            .iter()
            .filter(|car| equals(criteria.make.as_deref(), car.make.as_deref()))
            .filter(|car| equals(criteria.model.as_deref(), car.model.as_deref()))
            .filter(|car| equals(criteria.state.as_deref(), car.state.as_deref()))
            .filter(|car| equals(criteria.color.as_deref(), car.color.as_deref()))
            .filter(|car| start_year.is_none_or(|start| car.year.is_some_and(|y| y >= start)))
            .filter(|car| end_year.is_none_or(|end| car.year.is_some_and(|y| y <= end)))
            .filter(|car| match non_empty(criteria.license_plate.as_deref()) {
                Some(needle) => car
                    .license_plate
                    .as_deref()
                    .is_some_and(|plate| plate.contains(needle)),
                None => true,
            })
            .filter(|car| match non_empty(criteria.start_date.as_deref()) {
                Some(start) => car.date_time.as_deref().is_some_and(|at| at >= start),
                None => true,
            })
            .filter(|car| match non_empty(criteria.end_date.as_deref()) {
                Some(end) => car.date_time.as_deref().is_some_and(|at| at <= end),
                None => true,
            })
            .cloned()
            .collect()
    }

    pub fn unknown(&self) -> Vec<Car> {
        self.cars
            .iter()
            .filter(|car| car.is_unknown())
            .cloned()
            .collect()
    }

    pub fn first_location(&self) -> Coordinates {
        self.cars
            .iter()
            .find_map(Car::coordinates)
            .unwrap_or(Coordinates::ORIGIN)
    }

    pub fn makes(&self) -> Vec<MakeCount> {
        let mut counts = BTreeMap::<String, u64>::new();
        for make in self.cars.iter().filter_map(|car| non_empty(car.make.as_deref())) {
            *counts.entry(make.to_owned()).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(make, count)| MakeCount {
                make,
                count: Some(count),
            })
            .collect()
    }

    pub fn models(&self, make: Option<&str>) -> Vec<String> {
        let make = make.and_then(|make| non_empty(Some(make)));
        let mut models = self
            .cars
            .iter()
            .filter(|car| make.is_none() || car.make.as_deref() == make)
            .filter_map(|car| non_empty(car.model.as_deref()).map(str::to_owned))
            .collect::<Vec<_>>();
        models.sort();
        models.dedup();
        models
    }

    pub fn years(&self) -> Vec<i32> {
        let mut years = self.cars.iter().filter_map(|car| car.year).collect::<Vec<_>>();
        years.sort_unstable();
        years.dedup();
        years
    }

    pub fn states(&self) -> Vec<String> {
        let mut states = self
            .cars
            .iter()
            .filter_map(|car| non_empty(car.state.as_deref()).map(str::to_owned))
            .collect::<Vec<_>>();
        states.sort();
        states.dedup();
        states
    }

    pub fn update(&mut self, update: &CarUpdate) -> Result<()> {
        let car = self.car_mut(update.id)?;
        if let Some(value) = &update.date_time {
            car.date_time = value.clone();
        }
        if let Some(value) = update.year {
            car.year = value;
        }
        if let Some(value) = &update.make {
            car.make = value.clone();
        }
        if let Some(value) = &update.model {
            car.model = value.clone();
        }
        if let Some(value) = &update.license_plate {
            car.license_plate = value.clone();
        }
        if let Some(value) = &update.state {
            car.state = value.clone();
        }
        if let Some(value) = &update.color {
            car.color = value.clone();
        }
        if let Some(value) = &update.vin {
            car.vin = value.clone();
        }
        if let Some(value) = update.latitude {
            car.latitude = value;
        }
        if let Some(value) = update.longitude {
            car.longitude = value;
        }
        Ok(())
    }

    pub fn delete(&mut self, request: &DeleteRequest) -> Result<()> {
        let index = self
            .cars
            .iter()
            .position(|car| car.id == request.id)
            .with_context(|| format!("car #{} not found", request.id))?;
        self.cars.remove(index);
        Ok(())
    }

    /// Answers from a generator seeded by the plate, so the same plate always
    /// resolves to the same vehicle. The result is written back to the car.
    pub fn lookup(&mut self, request: &LookupRequest) -> Result<LookupResult> {
        let plate = normalize_plate(&request.license_plate);
        if plate.is_empty() || request.state.trim().is_empty() {
            bail!("license plate and state are required");
        }
        let seed = plate
            .bytes()
            .chain(request.state.bytes())
            .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
            });
        let mut result = FleetFaker::new(seed).lookup();
        result.state = Some(request.state.trim().to_ascii_uppercase());

        let car = self.car_mut(request.id)?;
        car.license_plate = Some(plate);
        car.year = result.year;
        car.make = result.make.clone();
        car.model = result.model.clone();
        car.vin = result.vin.clone();
        car.state = result.state.clone();
        Ok(result)
    }

    fn car_mut(&mut self, id: CarId) -> Result<&mut Car> {
        self.cars
            .iter_mut()
            .find(|car| car.id == id)
            .with_context(|| format!("car #{id} not found"))
    }
}

fn equals(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match non_empty(wanted) {
        Some(wanted) => actual == Some(wanted),
        None => true,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

fn parse_year(raw: &str) -> Option<i32> {
    raw.trim().parse().ok()
}
