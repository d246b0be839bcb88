// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use roster_api::Client;
use roster_app::UserDirectory;
use roster_tui::{AppRuntime, BackgroundRequest, InternalEvent, UiTiming, execute_request};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::debug;

/// Talks to the user API. Each request runs on its own short-lived thread so
/// the terminal keeps redrawing while the server answers.
pub struct ApiRuntime {
    client: Client,
    timing: UiTiming,
}

impl ApiRuntime {
    pub fn new(client: Client, timing: UiTiming) -> Self {
        Self { client, timing }
    }
}

impl AppRuntime for ApiRuntime {
    fn directory(&self) -> &dyn UserDirectory {
        &self.client
    }

    fn timing(&self) -> UiTiming {
        self.timing
    }

    fn dispatch_request(
        &mut self,
        request: BackgroundRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name("roster-request".to_owned())
            .spawn(move || {
                let event = execute_request(&client, request);
                if tx.send(event).is_err() {
                    debug!("event loop exited before the request finished");
                }
            })
            .context("spawn request thread")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ApiRuntime;
    use anyhow::Result;
    use roster_api::Client;
    use roster_app::FetchRequest;
    use roster_tui::{AppRuntime, BackgroundRequest, InternalEvent, UiTiming};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn background_request_reports_on_channel() -> Result<()> {
        let client = Client::new("http://127.0.0.1:1/api", "k", Duration::from_millis(50))?;
        let mut runtime = ApiRuntime::new(client, UiTiming::default());
        let (tx, rx) = mpsc::channel();

        runtime.dispatch_request(
            BackgroundRequest::Search(FetchRequest { seq: 4, name: None }),
            tx,
        )?;

        match rx.recv_timeout(Duration::from_secs(5))? {
            InternalEvent::SearchFinished { seq, result } => {
                assert_eq!(seq, 4);
                let error = result.expect_err("unreachable API should fail");
                assert!(error.message.starts_with("Network error."));
            }
            other => panic!("unexpected event {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn timing_comes_from_config() -> Result<()> {
        let client = Client::new("http://127.0.0.1:1/api", "k", Duration::from_secs(1))?;
        let timing = UiTiming {
            refresh_delay: Duration::ZERO,
            status_ttl: Duration::from_secs(9),
        };
        let runtime = ApiRuntime::new(client, timing);
        assert_eq!(runtime.timing(), timing);
        assert!(runtime.directory().search_users(None).is_err());
        Ok(())
    }
}
