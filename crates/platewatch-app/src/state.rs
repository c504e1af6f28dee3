// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::ViewKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Nav,
    Filter,
    Review,
    Overlay,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_view: ViewKind,
    pub notice: Option<String>,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            active_view: ViewKind::Cars,
            notice: None,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextView,
    PrevView,
    SelectView(ViewKind),
    Enter(AppMode),
    ExitToNav,
    ShowNotice(String),
    DismissNotice,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    ViewChanged(ViewKind),
    NoticeShown(String),
    NoticeDismissed,
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextView => self.rotate_view(1),
            AppCommand::PrevView => self.rotate_view(-1),
            AppCommand::SelectView(view) => {
                if self.active_view == view {
                    return Vec::new();
                }
                self.active_view = view;
                vec![AppEvent::ViewChanged(view)]
            }
            AppCommand::Enter(mode) => {
                self.mode = mode;
                vec![AppEvent::ModeChanged(mode)]
            }
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ShowNotice(message) => {
                self.notice = Some(message.clone());
                vec![AppEvent::NoticeShown(message)]
            }
            AppCommand::DismissNotice => match self.notice.take() {
                Some(_) => vec![AppEvent::NoticeDismissed],
                None => Vec::new(),
            },
            AppCommand::SetStatus(message) => {
                self.status_line = Some(message.clone());
                vec![AppEvent::StatusUpdated(message)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    /// A pending notice blocks every other key until dismissed.
    pub fn has_notice(&self) -> bool {
        self.notice.is_some()
    }

    fn rotate_view(&mut self, delta: isize) -> Vec<AppEvent> {
        let views = ViewKind::ALL;
        let current = views
            .iter()
            .position(|view| *view == self.active_view)
            .unwrap_or(0) as isize;
        let len = views.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_view = views[next];
        vec![
            AppEvent::ViewChanged(self.active_view),
            self.set_status(self.active_view.label()),
        ]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppMode, AppState};
    use crate::ViewKind;

    #[test]
    fn view_rotation_wraps() {
        let mut state = AppState {
            active_view: ViewKind::Unknown,
            ..AppState::default()
        };

        let events = state.dispatch(AppCommand::NextView);
        assert_eq!(state.active_view, ViewKind::Cars);
        assert_eq!(
            events,
            vec![
                AppEvent::ViewChanged(ViewKind::Cars),
                AppEvent::StatusUpdated("cars".to_owned()),
            ]
        );

        state.dispatch(AppCommand::PrevView);
        assert_eq!(state.active_view, ViewKind::Unknown);
    }

    #[test]
    fn selecting_the_active_view_is_quiet() {
        let mut state = AppState::default();
        assert!(state.dispatch(AppCommand::SelectView(ViewKind::Cars)).is_empty());
        assert_eq!(
            state.dispatch(AppCommand::SelectView(ViewKind::Map)),
            vec![AppEvent::ViewChanged(ViewKind::Map)]
        );
    }

    #[test]
    fn notice_show_and_dismiss() {
        let mut state = AppState::default();
        let shown = state.dispatch(AppCommand::ShowNotice("backend down".to_owned()));
        assert!(state.has_notice());
        assert_eq!(shown, vec![AppEvent::NoticeShown("backend down".to_owned())]);

        assert_eq!(
            state.dispatch(AppCommand::DismissNotice),
            vec![AppEvent::NoticeDismissed]
        );
        assert!(state.dispatch(AppCommand::DismissNotice).is_empty());
    }

    #[test]
    fn mode_transitions() {
        let mut state = AppState::default();

        state.dispatch(AppCommand::Enter(AppMode::Review));
        assert_eq!(state.mode, AppMode::Review);

        state.dispatch(AppCommand::Enter(AppMode::Filter));
        assert_eq!(state.mode, AppMode::Filter);

        state.dispatch(AppCommand::ExitToNav);
        assert_eq!(state.mode, AppMode::Nav);
    }

    #[test]
    fn status_set_and_clear() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::SetStatus("saved".to_owned()));
        assert_eq!(state.status_line.as_deref(), Some("saved"));
        assert_eq!(
            state.dispatch(AppCommand::ClearStatus),
            vec![AppEvent::StatusCleared]
        );
        assert_eq!(state.status_line, None);
    }
}
