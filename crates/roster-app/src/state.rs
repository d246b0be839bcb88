// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AppMode, FormKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpVisibility {
    Hidden,
    Visible,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub help: HelpVisibility,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            help: HelpVisibility::Hidden,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    StartSearch,
    EditCell,
    OpenForm(FormKind),
    ExitToNav,
    ToggleHelp,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    HelpVisibilityChanged(HelpVisibility),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::StartSearch => self.enter(AppMode::Search),
            AppCommand::EditCell => self.enter(AppMode::CellEdit),
            AppCommand::OpenForm(kind) => {
                let mut events = self.enter(AppMode::Form(kind));
                events.push(self.set_status(kind.title()));
                events
            }
            AppCommand::ExitToNav => self.enter(AppMode::Nav),
            AppCommand::ToggleHelp => {
                self.help = match self.help {
                    HelpVisibility::Hidden => HelpVisibility::Visible,
                    HelpVisibility::Visible => HelpVisibility::Hidden,
                };
                vec![AppEvent::HelpVisibilityChanged(self.help)]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }

    fn enter(&mut self, mode: AppMode) -> Vec<AppEvent> {
        if self.mode == mode {
            return Vec::new();
        }
        self.mode = mode;
        vec![AppEvent::ModeChanged(mode)]
    }
}
