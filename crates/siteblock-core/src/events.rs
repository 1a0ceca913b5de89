use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::Result;
use crate::gate::CheckBlockResponse;
use crate::host::{TabId, WindowId};

/// Tab, window and navigation notifications delivered by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BrowserEvent {
    TabActivated {
        tab_id: TabId,
    },
    TabUpdated {
        tab_id: TabId,
        /// Present only when the URL changed.
        #[serde(default)]
        url: Option<String>,
    },
    /// `None` means no browser window has focus.
    WindowFocusChanged {
        #[serde(default)]
        window_id: Option<WindowId>,
    },
    TabRemoved {
        tab_id: TabId,
    },
    BeforeNavigate {
        tab_id: TabId,
        #[serde(default)]
        frame_id: u32,
        url: String,
    },
    /// Periodic flush timer.
    Tick,
}

/// Cross-context request from a loaded page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    CheckBlock { url: String },
}

/// Everything the background loop consumes.
#[derive(Debug)]
pub enum Inbound {
    Event(BrowserEvent),
    Request {
        request: Request,
        reply: oneshot::Sender<Result<CheckBlockResponse>>,
    },
}

impl From<BrowserEvent> for Inbound {
    fn from(event: BrowserEvent) -> Self {
        Inbound::Event(event)
    }
}
