// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use platewatch_api::Client;
use platewatch_app::{
    Car, CarSource, CarUpdate, Coordinates, DeleteRequest, FetchTicket, FilterCriteria,
    FilterOptions, LookupRequest, LookupResult,
};
use platewatch_testkit::MemoryFleet;
use platewatch_tui::{AppRuntime, InternalEvent};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::Sender;
use std::thread;

pub trait VideoPlayer {
    fn play(&mut self, url: &str) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
}

/// Playback without an external player: the UI still tracks play/pause.
#[derive(Debug, Default)]
pub struct SilentPlayer;

impl VideoPlayer for SilentPlayer {
    fn play(&mut self, url: &str) -> Result<()> {
        tracing::debug!(%url, "no video player configured");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Runs `[video].player` with the clip URL as its last argument.
#[derive(Debug)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl CommandPlayer {
    pub fn new(program: &str, args: &[String]) -> Self {
        Self {
            program: program.to_owned(),
            args: args.to_vec(),
            child: None,
        }
    }
}

impl VideoPlayer for CommandPlayer {
    fn play(&mut self, url: &str) -> Result<()> {
        self.stop()?;
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| {
                format!(
                    "start video player {:?} -- check [video].player or remove it",
                    self.program
                )
            })?;
        tracing::info!(program = %self.program, %url, pid = child.id(), "video player started");
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if child.try_wait().context("poll video player")?.is_none() {
            child.kill().context("stop video player")?;
        }
        child.wait().context("reap video player")?;
        Ok(())
    }
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            tracing::warn!(error = %format!("{error:#}"), "stop video player on exit");
        }
    }
}

pub fn player_from_config(program: Option<&str>, args: &[String]) -> Box<dyn VideoPlayer> {
    match program {
        Some(program) => Box::new(CommandPlayer::new(program, args)),
        None => Box::new(SilentPlayer),
    }
}

/// Talks to the REST backend; list fetches run on a worker thread.
pub struct ApiRuntime {
    client: Client,
    player: Box<dyn VideoPlayer>,
}

impl ApiRuntime {
    pub fn new(client: Client, player: Box<dyn VideoPlayer>) -> Self {
        Self { client, player }
    }
}

fn fetch_cars(client: &Client, source: CarSource, criteria: &FilterCriteria) -> Result<Vec<Car>> {
    match source {
        CarSource::Filtered => client.list_cars(criteria),
        CarSource::Unknown => client.list_unknown_cars(),
    }
}

impl AppRuntime for ApiRuntime {
    fn load_cars(&mut self, source: CarSource, criteria: &FilterCriteria) -> Result<Vec<Car>> {
        fetch_cars(&self.client, source, criteria)
    }

    fn spawn_fetch(
        &mut self,
        ticket: FetchTicket,
        source: CarSource,
        criteria: FilterCriteria,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name(format!("fetch-{}", ticket.get()))
            .spawn(move || {
                let result =
                    fetch_cars(&client, source, &criteria).map_err(|error| format!("{error:#}"));
                if tx.send(InternalEvent::CarsLoaded { ticket, result }).is_err() {
                    tracing::debug!(ticket = ticket.get(), "ui gone before fetch finished");
                }
            })
            .context("spawn fetch worker")?;
        Ok(())
    }

    fn load_filter_options(&mut self) -> Result<FilterOptions> {
        Ok(FilterOptions {
            makes: self.client.list_makes()?,
            models: self.client.list_models(None)?,
            years: self.client.list_years()?,
            states: self.client.list_states()?,
        })
    }

    fn load_models(&mut self, make: Option<&str>) -> Result<Vec<String>> {
        self.client.list_models(make)
    }

    fn first_car_location(&mut self) -> Result<Coordinates> {
        self.client.first_car_location()
    }

    fn update_car(&mut self, update: &CarUpdate) -> Result<()> {
        self.client.update_car(update)
    }

    fn delete_car(&mut self, request: &DeleteRequest) -> Result<()> {
        if let Err(error) = self.player.stop() {
            tracing::warn!(
                id = %request.id,
                error = %format!("{error:#}"),
                "stop video before delete"
            );
        }
        self.client.delete_car(request)
    }

    fn refresh_car(&mut self, request: &LookupRequest) -> Result<LookupResult> {
        self.client.refresh_car(request)
    }

    fn play_video(&mut self, video_path: &str) -> Result<()> {
        let url = self.client.video_url(video_path)?;
        self.player.play(&url)
    }

    fn pause_video(&mut self) -> Result<()> {
        self.player.stop()
    }
}

/// `--demo`: a generated fleet held in memory, no server involved.
#[derive(Debug, Clone)]
pub struct DemoRuntime {
    fleet: MemoryFleet,
}

impl DemoRuntime {
    pub fn new(fleet: MemoryFleet) -> Self {
        Self { fleet }
    }
}

impl AppRuntime for DemoRuntime {
    fn load_cars(&mut self, source: CarSource, criteria: &FilterCriteria) -> Result<Vec<Car>> {
        Ok(match source {
            CarSource::Filtered => self.fleet.list(criteria),
            CarSource::Unknown => self.fleet.unknown(),
        })
    }

    fn load_filter_options(&mut self) -> Result<FilterOptions> {
        Ok(FilterOptions {
            makes: self.fleet.makes(),
            models: self.fleet.models(None),
            years: self.fleet.years(),
            states: self.fleet.states(),
        })
    }

    fn load_models(&mut self, make: Option<&str>) -> Result<Vec<String>> {
        Ok(self.fleet.models(make))
    }

    fn first_car_location(&mut self) -> Result<Coordinates> {
        if self.fleet.cars().is_empty() {
            return Err(anyhow!("demo fleet is empty"));
        }
        Ok(self.fleet.first_location())
    }

    fn update_car(&mut self, update: &CarUpdate) -> Result<()> {
        self.fleet.update(update)
    }

    fn delete_car(&mut self, request: &DeleteRequest) -> Result<()> {
        self.fleet.delete(request)
    }

    fn refresh_car(&mut self, request: &LookupRequest) -> Result<LookupResult> {
        self.fleet.lookup(request)
    }
}
