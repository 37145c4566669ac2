//! Shows the acquired network address on the LCD for a few seconds after
//! connecting, then erases it.

use crate::IP_DISPLAY_TICKS;
use serde::Serialize;
use std::net::Ipv4Addr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncePhase {
    #[default]
    Idle,
    Announcing,
    Clearing,
}

/// What the LCD row reserved for the address should do after a tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnnounceOutput {
    Show(String),
    Clear,
}

#[derive(Clone, Debug, Default)]
pub struct IpAnnouncer {
    phase: AnnouncePhase,
    elapsed: u32,
    address: Option<Ipv4Addr>,
}

impl IpAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> AnnouncePhase {
        self.phase
    }

    /// Called once per successful association.
    pub fn begin(&mut self, address: Ipv4Addr) {
        self.phase = AnnouncePhase::Announcing;
        self.elapsed = 0;
        self.address = Some(address);
    }

    pub fn advance(&mut self) -> Option<AnnounceOutput> {
        match self.phase {
            AnnouncePhase::Announcing => {
                let output = match self.address {
                    Some(addr) if self.elapsed == 0 => {
                        Some(AnnounceOutput::Show(format!("IP: {addr}")))
                    }
                    _ => None,
                };
                self.elapsed += 1;
                if self.elapsed >= IP_DISPLAY_TICKS {
                    self.phase = AnnouncePhase::Clearing;
                }
                output
            }
            AnnouncePhase::Clearing => {
                self.phase = AnnouncePhase::Idle;
                Some(AnnounceOutput::Clear)
            }
            AnnouncePhase::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn idle_until_connected() {
        let mut announcer = IpAnnouncer::new();
        assert_eq!(announcer.advance(), None);
        assert_eq!(announcer.phase(), AnnouncePhase::Idle);
    }

    #[test]
    fn shows_address_then_clears_after_window() {
        let mut announcer = IpAnnouncer::new();
        announcer.begin(Ipv4Addr::new(10, 0, 0, 2));

        assert_eq!(
            announcer.advance(),
            Some(AnnounceOutput::Show("IP: 10.0.0.2".to_string()))
        );
        for _ in 1..IP_DISPLAY_TICKS {
            assert_eq!(announcer.phase(), AnnouncePhase::Announcing);
            assert_eq!(announcer.advance(), None);
        }
        assert_eq!(announcer.phase(), AnnouncePhase::Clearing);
        assert_eq!(announcer.advance(), Some(AnnounceOutput::Clear));
        assert_eq!(announcer.phase(), AnnouncePhase::Idle);
        assert_eq!(announcer.advance(), None);
    }

    #[test]
    fn reassociation_restarts_the_window() {
        let mut announcer = IpAnnouncer::new();
        announcer.begin(Ipv4Addr::new(10, 0, 0, 2));
        for _ in 0..10 {
            announcer.advance();
        }
        announcer.begin(Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(
            announcer.advance(),
            Some(AnnounceOutput::Show("IP: 10.0.0.3".to_string()))
        );
    }
}
