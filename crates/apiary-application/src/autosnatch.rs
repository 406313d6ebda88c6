// SPDX-License-Identifier: GPL-3.0-or-later
use tokio::sync::watch;
use tracing::info;

/// Control channel for automatic snatching. The supervising side keeps the
/// switch; listeners hold a [`AutosnatchState`] and read the latest value
/// before each announce.
#[derive(Debug, Clone)]
pub struct AutosnatchSwitch {
    sender: watch::Sender<bool>,
}

impl AutosnatchSwitch {
    pub fn new(enabled: bool) -> Self {
        let (sender, _) = watch::channel(enabled);
        Self { sender }
    }

    pub fn enable(&self) {
        self.set(true);
    }

    pub fn disable(&self) {
        self.set(false);
    }

    pub fn set(&self, enabled: bool) {
        let changed = self.sender.send_if_modified(|current| {
            let changed = *current != enabled;
            *current = enabled;
            changed
        });
        if changed {
            info!(target: "coordinator", enabled, "autosnatching toggled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn state(&self) -> AutosnatchState {
        AutosnatchState {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for AutosnatchSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Read side of the switch.
#[derive(Debug, Clone)]
pub struct AutosnatchState {
    receiver: watch::Receiver<bool>,
}

impl AutosnatchState {
    pub fn is_enabled(&self) -> bool {
        *self.receiver.borrow()
    }
}
