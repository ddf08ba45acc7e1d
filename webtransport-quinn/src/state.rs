/// The handshake state of a WebTransport session, tracked independently on
/// each side of the connection.
///
/// Both peers start at `Idle` and drive forward by sending/receiving
/// SETTINGS and the Extended CONNECT request/response. `Established` is only
/// reached once *both* sides have advertised `SETTINGS_ENABLE_WEBTRANSPORT=1`
/// and the CONNECT exchange has completed with a 2xx status; the two
/// conditions can be observed in either order. Any error moves the session
/// straight to `Closed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SettingsSent,
    SettingsExchanged,
    ConnectSent,
    Established,
    Closed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    pub fn is_established(&self) -> bool {
        matches!(self, SessionState::Established)
    }
}

/// Tracks the two independent preconditions for `Established` so they can be
/// satisfied in either order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionProgress {
    settings_exchanged: bool,
    connect_accepted: bool,
    closed: bool,
}

impl SessionProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings_exchanged(&mut self) {
        self.settings_exchanged = true;
    }

    pub fn connect_accepted(&mut self) {
        self.connect_accepted = true;
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn state(&self) -> SessionState {
        if self.closed {
            SessionState::Closed
        } else if self.settings_exchanged && self.connect_accepted {
            SessionState::Established
        } else if self.connect_accepted {
            SessionState::ConnectSent
        } else if self.settings_exchanged {
            SessionState::SettingsExchanged
        } else {
            SessionState::SettingsSent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_then_connect() {
        let mut progress = SessionProgress::new();
        assert_eq!(progress.state(), SessionState::SettingsSent);

        progress.settings_exchanged();
        assert_eq!(progress.state(), SessionState::SettingsExchanged);

        progress.connect_accepted();
        assert_eq!(progress.state(), SessionState::Established);
    }

    #[test]
    fn connect_then_settings() {
        let mut progress = SessionProgress::new();
        progress.connect_accepted();
        assert_eq!(progress.state(), SessionState::ConnectSent);

        progress.settings_exchanged();
        assert_eq!(progress.state(), SessionState::Established);
    }

    #[test]
    fn close_is_terminal_from_any_state() {
        let mut progress = SessionProgress::new();
        progress.settings_exchanged();
        progress.connect_accepted();
        assert!(progress.state().is_established());

        progress.close();
        assert_eq!(progress.state(), SessionState::Closed);
        assert!(progress.state().is_terminal());
    }
}
