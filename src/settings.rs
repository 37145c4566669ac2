//! Network settings and the user-id table.

use crate::{USER_ID_COUNT, USER_ID_MAX_LEN, message::truncate_chars};
use std::net::Ipv4Addr;

/// Fallback id loaded when no user-id file exists yet.
pub const DEFAULT_USER_ID: &str = "18096604-508b-422b-b58c-fe22f43c89d0";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Addressing {
    Dhcp,
    Static {
        ip: Ipv4Addr,
        subnet: Ipv4Addr,
        gateway: Ipv4Addr,
    },
}

/// WiFi settings. Replaced as a whole, never edited field by field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub ssid: String,
    pub password: String,
    pub addressing: Addressing,
}

impl Settings {
    pub fn uses_dhcp(&self) -> bool {
        matches!(self.addressing, Addressing::Dhcp)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            addressing: Addressing::Dhcp,
        }
    }
}

/// Sixteen opaque ids; an HTTP request must carry one of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdTable {
    ids: [String; USER_ID_COUNT],
}

impl UserIdTable {
    /// A table where every slot holds [`DEFAULT_USER_ID`].
    pub fn with_defaults() -> Self {
        Self {
            ids: std::array::from_fn(|_| DEFAULT_USER_ID.to_string()),
        }
    }

    /// Build from loaded lines; missing lines become empty slots.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lines = lines.into_iter();
        Self {
            ids: std::array::from_fn(|_| lines.next().map(Into::into).unwrap_or_default()),
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Replace the id at the 1-based `index`, truncating it to
    /// [`USER_ID_MAX_LEN`]. Returns `false` (and changes nothing) when the
    /// index is out of range or the id is empty.
    pub fn set(&mut self, index: usize, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }
        let Some(slot) = index.checked_sub(1).and_then(|i| self.ids.get_mut(i)) else {
            return false;
        };
        *slot = truncate_chars(id, USER_ID_MAX_LEN).to_string();
        true
    }

    pub fn is_authorized(&self, user_id: &str) -> bool {
        !user_id.is_empty() && self.ids.iter().any(|id| id == user_id)
    }
}

impl Default for UserIdTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn default_table_authorizes_default_id() {
        let table = UserIdTable::with_defaults();
        assert_eq!(table.ids().len(), USER_ID_COUNT);
        assert!(table.is_authorized(DEFAULT_USER_ID));
        assert!(!table.is_authorized("someone-else"));
    }

    #[test]
    fn empty_id_is_never_authorized() {
        let table = UserIdTable::from_lines(["a", "", "c"]);
        assert!(!table.is_authorized(""));
        assert!(table.is_authorized("c"));
    }

    #[test]
    fn from_lines_pads_missing_slots() {
        let table = UserIdTable::from_lines(["only-one"]);
        assert_eq!(table.ids()[0], "only-one");
        assert!(table.ids()[1..].iter().all(String::is_empty));
    }

    #[rstest]
    #[case(1, true)]
    #[case(16, true)]
    #[case(0, false)]
    #[case(17, false)]
    fn set_checks_one_based_range(#[case] index: usize, #[case] accepted: bool) {
        let mut table = UserIdTable::with_defaults();
        let before = table.clone();
        assert_eq!(table.set(index, "new-id"), accepted);
        if accepted {
            assert_eq!(table.ids()[index - 1], "new-id");
        } else {
            assert_eq!(table, before);
        }
    }

    #[test]
    fn set_rejects_empty_and_truncates_long_ids() {
        let mut table = UserIdTable::with_defaults();
        assert!(!table.set(3, ""));
        assert!(table.set(3, &"z".repeat(50)));
        assert_eq!(table.ids()[2].len(), USER_ID_MAX_LEN);
    }

    #[test]
    fn dhcp_flag_follows_addressing() {
        let mut settings = Settings::default();
        assert!(settings.uses_dhcp());
        settings.addressing = Addressing::Static {
            ip: Ipv4Addr::new(10, 0, 0, 2),
            subnet: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(10, 0, 0, 1),
        };
        assert!(!settings.uses_dhcp());
    }
}
