//! File-backed persistence for settings and user ids.
//!
//! Each record is one line ending in `\n` (never `\r\n`):
//! - `settings.txt`: ssid, then `1`/`0` for DHCP, then ip, subnet, gateway
//!   when static
//! - `userIds.txt`: exactly sixteen lines
//! - `password.bin`: the password XOR-ed against a fixed key. This only
//!   keeps it from being readable at a glance, it is not encryption.

use crate::settings::{Addressing, Settings, UserIdTable};
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.txt";
pub const USER_ID_FILE: &str = "userIds.txt";
pub const PASSWORD_FILE: &str = "password.bin";

const OBFUSCATION_KEY: &[u8] = b"f72de5a6-2195-4e4b-9e35-76e21c6a4ddb";

/// XOR `data` against the key, cycling the key. Applying it twice restores
/// the input.
pub fn obfuscate(data: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(OBFUSCATION_KEY.iter().cycle())
        .map(|(byte, key)| byte ^ key)
        .collect()
}

#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read(&self, name: &'static str) -> Result<Vec<u8>> {
        fs::read(self.dir.join(name)).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::PersistenceUnavailable(name),
            _ => Error::Io(err),
        })
    }

    /// Load the settings and the password file.
    ///
    /// # Errors
    ///
    /// `PersistenceUnavailable` if the settings file does not exist.
    pub fn load_settings(&self) -> Result<Settings> {
        let raw = String::from_utf8_lossy(&self.read(SETTINGS_FILE)?).into_owned();
        let mut lines = raw.lines();
        let mut next = || lines.next().unwrap_or_default().trim().to_string();

        let ssid = next();
        let addressing = if next() == "0" {
            let mut addr = || next().parse().unwrap_or(std::net::Ipv4Addr::UNSPECIFIED);
            Addressing::Static {
                ip: addr(),
                subnet: addr(),
                gateway: addr(),
            }
        } else {
            Addressing::Dhcp
        };

        let password = match self.read(PASSWORD_FILE) {
            Ok(bytes) => String::from_utf8_lossy(&obfuscate(&bytes)).into_owned(),
            Err(Error::PersistenceUnavailable(_)) => String::new(),
            Err(err) => return Err(err),
        };

        Ok(Settings {
            ssid,
            password,
            addressing,
        })
    }

    /// # Errors
    ///
    /// Returns the I/O error if either file cannot be written.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let mut out = format!("{}\n", settings.ssid);
        match settings.addressing {
            Addressing::Dhcp => out.push_str("1\n"),
            Addressing::Static {
                ip,
                subnet,
                gateway,
            } => out.push_str(&format!("0\n{ip}\n{subnet}\n{gateway}\n")),
        }

        fs::write(self.dir.join(SETTINGS_FILE), out)?;
        fs::write(
            self.dir.join(PASSWORD_FILE),
            obfuscate(settings.password.as_bytes()),
        )?;
        tracing::info!("Settings saved.");
        Ok(())
    }

    /// # Errors
    ///
    /// `PersistenceUnavailable` if the user-id file does not exist.
    pub fn load_user_ids(&self) -> Result<UserIdTable> {
        let raw = String::from_utf8_lossy(&self.read(USER_ID_FILE)?).into_owned();
        Ok(UserIdTable::from_lines(raw.lines()))
    }

    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be written.
    pub fn save_user_ids(&self, table: &UserIdTable) -> Result<()> {
        let out: String = table.ids().iter().map(|id| format!("{id}\n")).collect();
        fs::write(self.dir.join(USER_ID_FILE), out)?;
        tracing::info!("User Ids saved.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::USER_ID_COUNT;
    use crate::settings::DEFAULT_USER_ID;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;
    use tempfile::TempDir;

    fn static_settings() -> Settings {
        Settings {
            ssid: "Home".to_string(),
            password: "secret".to_string(),
            addressing: Addressing::Static {
                ip: Ipv4Addr::new(10, 0, 0, 2),
                subnet: Ipv4Addr::new(255, 255, 255, 0),
                gateway: Ipv4Addr::new(10, 0, 0, 1),
            },
        }
    }

    #[test]
    fn obfuscation_is_its_own_inverse() {
        let hidden = obfuscate(b"correct horse battery staple, and then some more");
        assert_ne!(hidden, b"correct horse battery staple, and then some more");
        assert_eq!(obfuscate(&hidden), b"correct horse battery staple, and then some more");
    }

    #[test]
    fn settings_file_layout() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        store.save_settings(&static_settings()).unwrap();

        let written = fs::read_to_string(tmp.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(written, "Home\n0\n10.0.0.2\n255.255.255.0\n10.0.0.1\n");
        let password = fs::read(tmp.path().join(PASSWORD_FILE)).unwrap();
        assert_eq!(password.len(), "secret".len());
        assert_ne!(password, b"secret");
    }

    #[test]
    fn dhcp_settings_have_two_lines() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        let settings = Settings {
            addressing: Addressing::Dhcp,
            ..static_settings()
        };
        store.save_settings(&settings).unwrap();

        let written = fs::read_to_string(tmp.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(written, "Home\n1\n");
        assert_eq!(store.load_settings().unwrap(), settings);
    }

    #[test]
    fn settings_survive_a_reload() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        store.save_settings(&static_settings()).unwrap();
        assert_eq!(store.load_settings().unwrap(), static_settings());
    }

    #[test]
    fn missing_files_are_unavailable() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        assert!(matches!(
            store.load_settings(),
            Err(Error::PersistenceUnavailable(SETTINGS_FILE))
        ));
        assert!(matches!(
            store.load_user_ids(),
            Err(Error::PersistenceUnavailable(USER_ID_FILE))
        ));
    }

    #[test]
    fn user_ids_are_sixteen_lines() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        let mut table = UserIdTable::with_defaults();
        table.set(2, "second");
        store.save_user_ids(&table).unwrap();

        let written = fs::read_to_string(tmp.path().join(USER_ID_FILE)).unwrap();
        assert_eq!(written.matches('\n').count(), USER_ID_COUNT);
        assert!(!written.contains('\r'));
        assert!(written.starts_with(&format!("{DEFAULT_USER_ID}\nsecond\n")));
        assert_eq!(store.load_user_ids().unwrap(), table);
    }

    #[test]
    fn save_into_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("not-mounted"));
        assert!(matches!(
            store.save_user_ids(&UserIdTable::with_defaults()),
            Err(Error::Io(_))
        ));
    }
}
