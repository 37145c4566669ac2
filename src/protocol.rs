//! The `VERB KEY=value;KEY=value;` command protocol.
//!
//! The same grammar arrives over the serial console and, key by key, as HTTP
//! query parameters. Parsing a command validates all of its keys up front,
//! so a [`Command`] value is always complete and safe to apply: bad input is
//! rejected before any state changes.

use crate::settings::{Addressing, Settings};
use crate::{Color, Error, Result, USER_ID_COUNT};
use std::net::Ipv4Addr;

/// Return the text between `KEY=` and the next `;`.
///
/// The key matches case-insensitively and only at the start of a pair (line
/// start, after whitespace, or after `;`), so `ID` does not match inside
/// `SSID=`. Returns `None` when the line is empty, the key is absent, no `;`
/// follows, or the value is empty.
pub fn value_for<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("{key}=");
    let bytes = line.as_bytes();
    let start = (0..bytes.len().checked_sub(pattern.len())? + 1).find(|&i| {
        let at_boundary = i == 0 || matches!(bytes[i - 1], b';' | b' ' | b'\t');
        at_boundary && bytes[i..i + pattern.len()].eq_ignore_ascii_case(pattern.as_bytes())
    })? + pattern.len();

    let end = start + line[start..].find(';')?;
    (end > start).then(|| &line[start..end])
}

/// Parsed `SETDISPLAY` (or HTTP color route) request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayRequest {
    pub color: Color,
    pub flash_ticks: i32,
    pub hold_ticks: i32,
}

impl DisplayRequest {
    /// When neither time is set the color is held indefinitely, so it is
    /// visible at all.
    pub fn new(color: Color, flash_ticks: i32, hold_ticks: i32) -> Self {
        let hold_ticks = if flash_ticks == 0 && hold_ticks == 0 {
            -1
        } else {
            hold_ticks
        };
        Self {
            color,
            flash_ticks,
            hold_ticks,
        }
    }

    /// Build from named fields; omitted fields read as 0.
    ///
    /// # Errors
    ///
    /// `MalformedCommand` if a field is present but not a number in range.
    pub fn from_fields<'a>(field: impl Fn(&str) -> Option<&'a str>) -> Result<Self> {
        let color = Color::new(
            channel(field("RED"), "RED")?,
            channel(field("GREEN"), "GREEN")?,
            channel(field("BLUE"), "BLUE")?,
        );
        Self::with_timing(color, field)
    }

    /// Fixed color, timing read from `FLASHTIME` and `DISPLAYTIME`.
    ///
    /// # Errors
    ///
    /// `MalformedCommand` if a time is present but not an integer.
    pub fn with_timing<'a>(color: Color, field: impl Fn(&str) -> Option<&'a str>) -> Result<Self> {
        let flash = number(field("FLASHTIME"), "FLASHTIME")?;
        let hold = number(field("DISPLAYTIME"), "DISPLAYTIME")?;
        Ok(Self::new(color, flash, hold))
    }
}

fn number(value: Option<&str>, key: &str) -> Result<i32> {
    value.map_or(Ok(0), |v| {
        v.trim().parse().map_err(|_| {
            Error::malformed(format!("{key} was not a whole number. Display not updated."))
        })
    })
}

fn channel(value: Option<&str>, key: &str) -> Result<u8> {
    value.map_or(Ok(0), |v| {
        v.trim().parse().map_err(|_| {
            Error::malformed(format!("{key} was not a number between 0 and 255. Display not updated."))
        })
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Restart,
    SetSettings(Settings),
    Help,
    GetStatus,
    GetUserIds,
    SetUserId { index: usize, id: String },
    SetDisplay(DisplayRequest),
    SetMessage(String),
}

type Builder = fn(&str) -> Result<Command>;

/// Verb prefixes, matched case-insensitively in order.
const VERBS: &[(&str, Builder)] = &[
    ("RESTART", |_| Ok(Command::Restart)),
    ("SETSETTINGS", parse_settings),
    ("HELP", |_| Ok(Command::Help)),
    ("GETSTATUS", |_| Ok(Command::GetStatus)),
    ("GETUSERIDS", |_| Ok(Command::GetUserIds)),
    ("SETUSERID", parse_user_id),
    ("SETDISPLAY", parse_display),
    ("SETMESSAGE", parse_message),
];

impl Command {
    /// Parse one input line. A blank line is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// `UnknownCommand` for an unrecognized verb, `MalformedCommand` when the
    /// verb's keys are missing or invalid.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (_, build) = VERBS
            .iter()
            .find(|(verb, _)| {
                line.get(..verb.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(verb))
            })
            .ok_or(Error::UnknownCommand)?;

        build(line).map(Some)
    }
}

fn required<'a>(line: &'a str, key: &str, what: &str) -> Result<&'a str> {
    value_for(line, key)
        .ok_or_else(|| Error::malformed(format!("{key} not found in input. {what} not updated.")))
}

fn ipv4(line: &str, key: &str) -> Result<Ipv4Addr> {
    required(line, key, "Settings")?.trim().parse().map_err(|_| {
        Error::malformed(format!(
            "{key} was not in a valid v4 format (aaa.bbb.ccc.ddd). Settings not updated."
        ))
    })
}

fn parse_settings(line: &str) -> Result<Command> {
    let ssid = required(line, "SSID", "Settings")?;
    let password = required(line, "PW", "Settings")?;
    let use_dhcp = required(line, "USEDHCP", "Settings")?;

    let addressing = if use_dhcp.eq_ignore_ascii_case("TRUE") {
        Addressing::Dhcp
    } else if use_dhcp.eq_ignore_ascii_case("FALSE") {
        Addressing::Static {
            ip: ipv4(line, "IP")?,
            subnet: ipv4(line, "SUBNET")?,
            gateway: ipv4(line, "GATEWAY")?,
        }
    } else {
        return Err(Error::malformed(
            "USEDHCP was not set to either TRUE or FALSE. Settings not updated.",
        ));
    };

    Ok(Command::SetSettings(Settings {
        ssid: ssid.to_string(),
        password: password.to_string(),
        addressing,
    }))
}

fn parse_display(line: &str) -> Result<Command> {
    DisplayRequest::from_fields(|key| value_for(line, key)).map(Command::SetDisplay)
}

fn parse_message(line: &str) -> Result<Command> {
    let message = value_for(line, "MESSAGE").unwrap_or_default();
    Ok(Command::SetMessage(message.to_string()))
}

fn parse_user_id(line: &str) -> Result<Command> {
    let out_of_range = || {
        Error::malformed(format!(
            "INDEX was not a number between 1 and {USER_ID_COUNT}. User Id not updated."
        ))
    };

    let index: usize = required(line, "INDEX", "User Id")?
        .trim()
        .parse()
        .map_err(|_| out_of_range())?;
    if !(1..=USER_ID_COUNT).contains(&index) {
        return Err(out_of_range());
    }

    let id = required(line, "ID", "User Id")?;
    Ok(Command::SetUserId {
        index,
        id: id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    // ── value_for ──────────────────────────────────────────────────

    #[rstest]
    #[case("RED=10;GREEN=20;", "RED", Some("10"))]
    #[case("RED=10;GREEN=20;", "GREEN", Some("20"))]
    #[case("RED=10", "RED", None)]
    #[case("", "RED", None)]
    #[case("red=5;", "RED", Some("5"))]
    #[case("SETDISPLAY Blue=7;", "BLUE", Some("7"))]
    #[case("RED=;", "RED", None)]
    #[case("GREEN=1;", "RED", None)]
    fn value_extraction(#[case] line: &str, #[case] key: &str, #[case] expected: Option<&str>) {
        assert_eq!(value_for(line, key), expected);
    }

    #[test]
    fn key_only_matches_at_pair_start() {
        let line = "SETSETTINGS SSID=Home;PW=x;";
        assert_eq!(value_for(line, "ID"), None);
        assert_eq!(value_for(line, "SSID"), Some("Home"));
    }

    #[test]
    fn pairs_may_come_in_any_order() {
        let line = "DISPLAYTIME=4;BLUE=3;FLASHTIME=2;";
        assert_eq!(value_for(line, "FLASHTIME"), Some("2"));
        assert_eq!(value_for(line, "DISPLAYTIME"), Some("4"));
    }

    #[test]
    fn value_may_hold_non_ascii_text() {
        assert_eq!(value_for("MESSAGE=Größe ok;", "MESSAGE"), Some("Größe ok"));
    }

    // ── Command::parse ─────────────────────────────────────────────

    #[rstest]
    #[case("restart", Command::Restart)]
    #[case("HELP", Command::Help)]
    #[case("GetStatus", Command::GetStatus)]
    #[case("GETUSERIDS", Command::GetUserIds)]
    fn bare_verbs(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(Command::parse(line).unwrap(), Some(expected));
    }

    #[test]
    fn blank_line_is_not_a_command() {
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn unknown_verb_is_rejected() {
        assert!(matches!(Command::parse("DANCE"), Err(Error::UnknownCommand)));
    }

    #[test]
    fn static_settings_parse() {
        let cmd = Command::parse(
            "SETSETTINGS SSID=Home;PW=secret;USEDHCP=FALSE;IP=10.0.0.2;SUBNET=255.255.255.0;GATEWAY=10.0.0.1;",
        )
        .unwrap();
        assert_eq!(
            cmd,
            Some(Command::SetSettings(Settings {
                ssid: "Home".to_string(),
                password: "secret".to_string(),
                addressing: Addressing::Static {
                    ip: Ipv4Addr::new(10, 0, 0, 2),
                    subnet: Ipv4Addr::new(255, 255, 255, 0),
                    gateway: Ipv4Addr::new(10, 0, 0, 1),
                },
            }))
        );
    }

    #[test]
    fn dhcp_settings_ignore_address_keys() {
        let cmd = Command::parse("SETSETTINGS SSID=Home;PW=secret;USEDHCP=true;IP=bad;").unwrap();
        let Some(Command::SetSettings(settings)) = cmd else {
            panic!("expected settings");
        };
        assert!(settings.uses_dhcp());
    }

    #[rstest]
    #[case("SETSETTINGS PW=secret;USEDHCP=TRUE;", "SSID not found")]
    #[case("SETSETTINGS SSID=Home;USEDHCP=TRUE;", "PW not found")]
    #[case("SETSETTINGS SSID=Home;PW=secret;USEDHCP=MAYBE;", "USEDHCP was not set")]
    #[case(
        "SETSETTINGS SSID=Home;PW=secret;USEDHCP=FALSE;IP=bad;SUBNET=255.255.255.0;GATEWAY=10.0.0.1;",
        "IP was not in a valid v4 format"
    )]
    #[case(
        "SETSETTINGS SSID=Home;PW=secret;USEDHCP=FALSE;IP=10.0.0.2;GATEWAY=10.0.0.1;",
        "SUBNET not found"
    )]
    fn malformed_settings(#[case] line: &str, #[case] diagnostic: &str) {
        let err = Command::parse(line).unwrap_err();
        assert!(matches!(err, Error::MalformedCommand(_)));
        assert!(err.to_string().starts_with(diagnostic), "got: {err}");
    }

    #[test]
    fn display_defaults_missing_fields_to_zero() {
        let cmd = Command::parse("SETDISPLAY RED=10;FLASHTIME=3;").unwrap();
        assert_eq!(
            cmd,
            Some(Command::SetDisplay(DisplayRequest {
                color: Color::new(10, 0, 0),
                flash_ticks: 3,
                hold_ticks: 0,
            }))
        );
    }

    #[test]
    fn display_without_times_holds_forever() {
        let Some(Command::SetDisplay(req)) = Command::parse("SETDISPLAY GREEN=64;").unwrap() else {
            panic!("expected display");
        };
        assert_eq!(req.flash_ticks, 0);
        assert_eq!(req.hold_ticks, -1);
    }

    #[rstest]
    #[case("SETDISPLAY RED=256;")]
    #[case("SETDISPLAY GREEN=-1;")]
    #[case("SETDISPLAY FLASHTIME=soon;")]
    fn display_rejects_bad_numbers(#[case] line: &str) {
        assert!(matches!(Command::parse(line), Err(Error::MalformedCommand(_))));
    }

    #[test]
    fn message_may_be_empty() {
        assert_eq!(
            Command::parse("SETMESSAGE MESSAGE=;").unwrap(),
            Some(Command::SetMessage(String::new()))
        );
        assert_eq!(
            Command::parse("setmessage message=Build #42 green;").unwrap(),
            Some(Command::SetMessage("Build #42 green".to_string()))
        );
    }

    #[rstest]
    #[case("SETUSERID INDEX=17;ID=x;")]
    #[case("SETUSERID INDEX=0;ID=x;")]
    #[case("SETUSERID INDEX=one;ID=x;")]
    #[case("SETUSERID INDEX=3;")]
    #[case("SETUSERID ID=x;")]
    fn user_id_rejects_bad_input(#[case] line: &str) {
        assert!(matches!(Command::parse(line), Err(Error::MalformedCommand(_))));
    }

    #[test]
    fn user_id_parses() {
        assert_eq!(
            Command::parse("SETUSERID INDEX=16;ID=abc;").unwrap(),
            Some(Command::SetUserId {
                index: 16,
                id: "abc".to_string()
            })
        );
    }
}
