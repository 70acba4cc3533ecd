use std::path::PathBuf;
use std::time::Duration;

use dustroute_core::{
    model::Bin,
    render::MapDocument,
    scheduler::TriggerDecision,
    service::{RefreshError, RefreshReport},
};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Bins,
    Route,
}

pub(crate) struct App {
    pub source_name: String,
    pub refresh_interval: Duration,

    pub screen: Screen,
    pub report: Option<RefreshReport>,
    pub bin_list_index: usize,

    pub map_path: PathBuf,
    pub written_path: Option<PathBuf>,

    pub is_loading: bool,
    pub notice: Option<String>,
    pub error_message: Option<String>,
}

impl App {
    pub(crate) fn new(source_name: String, map_path: PathBuf, refresh_interval: Duration) -> Self {
        Self {
            source_name,
            refresh_interval,
            screen: Screen::Bins,
            report: None,
            bin_list_index: 0,
            map_path,
            written_path: None,
            is_loading: false,
            notice: None,
            error_message: None,
        }
    }

    /// Take the result of an accepted cycle and publish the map.
    pub(crate) fn apply(&mut self, result: Result<RefreshReport, RefreshError>) {
        let report = match result {
            Ok(report) => report,
            Err(err) => {
                error!(%err, "refresh failed");
                self.error_message = Some(format!("Refresh failed: {err}"));
                return;
            }
        };

        match MapDocument::from_report(&report).write_to(&self.map_path) {
            Ok(path) => {
                info!(path = %path.display(), "map written");
                self.written_path = Some(path);
                self.error_message = None;
            }
            Err(err) => {
                error!(%err, path = %self.map_path.display(), "map write failed");
                self.error_message = Some(format!("Failed to write map: {err}"));
            }
        }

        self.notice = match report.rejected.len() {
            0 => None,
            count => Some(format!("{count} malformed reading(s) ignored")),
        };
        if self.bin_list_index >= report.bins.len() {
            self.bin_list_index = report.bins.len().saturating_sub(1);
        }
        self.report = Some(report);
    }

    pub(crate) fn note_trigger(&mut self, decision: TriggerDecision) {
        if let TriggerDecision::Superseded { .. } = decision {
            self.notice = Some("Restarted refresh".to_owned());
        }
    }

    pub(crate) fn toggle_screen(&mut self) {
        self.screen = match self.screen {
            Screen::Bins => Screen::Route,
            Screen::Route => Screen::Bins,
        };
    }

    pub(crate) fn bins(&self) -> &[Bin] {
        self.report
            .as_ref()
            .map(|report| report.bins.as_slice())
            .unwrap_or_default()
    }

    pub(crate) fn select_previous(&mut self) {
        self.bin_list_index = self.bin_list_index.saturating_sub(1);
    }

    pub(crate) fn select_next(&mut self) {
        if self.bin_list_index + 1 < self.bins().len() {
            self.bin_list_index += 1;
        }
    }
}
