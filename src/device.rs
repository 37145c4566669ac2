//! The device context: every piece of runtime state and what one tick does
//! with it.
//!
//! Nothing here is shared. [`runtime::run_device_loop`](crate::runtime) owns
//! the [`Device`] on a single thread and feeds it ticks, HTTP requests and
//! network events one at a time, so no state needs a lock.

use crate::announcer::{AnnounceOutput, IpAnnouncer};
use crate::lcd::CharDisplay;
use crate::led::{self, LedStrip};
use crate::message::DisplayMessage;
use crate::protocol::{Command, DisplayRequest};
use crate::runtime::{DeviceEvent, NetworkEvent};
use crate::scroll::ScrollEngine;
use crate::sequencer::{ColorSequencer, Phase, StripOutput};
use crate::serial::LineAssembler;
use crate::settings::{Addressing, Settings, UserIdTable};
use crate::store::FileStore;
use crate::{DeviceConfig, Error, MAX_MESSAGE_LEN, Result, SCROLL_PERIOD, USER_ID_COUNT, USER_ID_MAX_LEN};
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;
use std::io::Write;
use std::net::Ipv4Addr;

/// LCD row the acquired address is announced on.
const ANNOUNCE_ROW: usize = 1;
/// LCD row that collects one dot per connection retry.
const RETRY_ROW: usize = 2;

/// Why the device loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exit {
    /// Reload persisted state and boot again.
    Restart,
    Shutdown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NetworkStatus {
    /// No settings were loaded, so no association is attempted.
    #[default]
    Unconfigured,
    Connecting,
    Connected(Ipv4Addr),
    Failed,
}

/// What an HTTP route asks the device to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HttpAction {
    Status,
    Display(DisplayRequest),
    Off,
    Message(String),
}

/// Display state returned by every authorized HTTP route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct StatusReport {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// Flash ticks left; negative flashes forever.
    pub flash_time_left: i32,
    /// Hold ticks left; negative holds forever.
    pub display_time_left: i32,
    pub phase: Phase,
    pub message: String,
    /// Acquired IPv4 address, once connected.
    pub ip: Option<String>,
    /// Settings were changed and only take effect after a restart.
    pub restart_required: bool,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Red: {} Green: {} Blue: {} FlashTime left: {} DisplayTime left: {} Message: {}",
            self.red,
            self.green,
            self.blue,
            self.flash_time_left,
            self.display_time_left,
            self.message
        )
    }
}

pub struct Device<S: LedStrip, D: CharDisplay> {
    config: DeviceConfig,
    strip: S,
    lcd: D,
    store: FileStore,
    console: Box<dyn Write + Send>,

    sequencer: ColorSequencer,
    announcer: IpAnnouncer,
    message: DisplayMessage,
    scroll: ScrollEngine,
    scroll_timer: u32,

    settings: Option<Settings>,
    user_ids: UserIdTable,
    network: NetworkStatus,
    restart_pending: bool,
    retry_dots: usize,

    input: LineAssembler,
    exit: Option<Exit>,
}

impl<S: LedStrip, D: CharDisplay> Device<S, D> {
    /// Load persisted state and put the hardware in a known state.
    ///
    /// Missing files are not fatal: user ids fall back to the default id,
    /// and without settings the LCD says so and the network stays down.
    pub fn boot(
        config: DeviceConfig,
        strip: S,
        lcd: D,
        store: FileStore,
        console: Box<dyn Write + Send>,
    ) -> Self {
        let user_ids = match store.load_user_ids() {
            Ok(ids) => {
                tracing::info!("User Ids loaded.");
                ids
            }
            Err(err) => {
                tracing::warn!("{} Using default Id.", err);
                UserIdTable::with_defaults()
            }
        };

        let settings = match store.load_settings() {
            Ok(settings) => {
                tracing::info!("Settings loaded.");
                Some(settings)
            }
            Err(err) => {
                tracing::warn!("{}", err);
                None
            }
        };

        let mut device = Self {
            config,
            strip,
            lcd,
            store,
            console,
            sequencer: ColorSequencer::new(),
            announcer: IpAnnouncer::new(),
            message: DisplayMessage::default(),
            scroll: ScrollEngine::new(),
            scroll_timer: 0,
            settings,
            user_ids,
            network: NetworkStatus::Unconfigured,
            restart_pending: false,
            retry_dots: 0,
            input: LineAssembler::new(),
            exit: None,
        };

        device.lcd.clear();
        if device.settings.is_none() {
            device.lcd.write_at(0, 0, "No Network Settings");
        }
        device.emit(StripOutput::Off);
        device
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn strip(&self) -> &S {
        &self.strip
    }

    pub fn lcd(&self) -> &D {
        &self.lcd
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn user_ids(&self) -> &UserIdTable {
        &self.user_ids
    }

    pub fn sequencer(&self) -> &ColorSequencer {
        &self.sequencer
    }

    pub fn message(&self) -> &DisplayMessage {
        &self.message
    }

    pub fn network(&self) -> NetworkStatus {
        self.network
    }

    pub fn restart_pending(&self) -> bool {
        self.restart_pending
    }

    /// Set once a command asked the loop to stop.
    pub fn exit_requested(&self) -> Option<Exit> {
        self.exit
    }

    // ── Tick ───────────────────────────────────────────────────────

    /// One 100 ms step: announcer, sequencer, scroll, then any serial
    /// input that arrived since the last tick.
    pub fn tick(&mut self, serial: impl IntoIterator<Item = u8>) {
        match self.announcer.advance() {
            Some(AnnounceOutput::Show(text)) => self.lcd.write_at(ANNOUNCE_ROW, 0, &text),
            Some(AnnounceOutput::Clear) => self.lcd.clear_row(ANNOUNCE_ROW),
            None => {}
        }

        if let Some(output) = self.sequencer.advance() {
            self.emit(output);
        }

        if self.message.is_enabled() {
            if self.scroll_timer == 0 {
                self.draw_message();
            }
            self.scroll_timer = (self.scroll_timer + 1) % SCROLL_PERIOD;
        }

        for byte in serial {
            if let Some(line) = self.input.push(byte) {
                self.run_line(&line);
            }
        }
    }

    fn emit(&mut self, output: StripOutput) {
        let frame = match output {
            StripOutput::Color(color) => {
                led::encode_frame(color, self.config.brightness_bits(), self.config.led_count)
            }
            StripOutput::Off => led::off_frame(self.config.led_count),
        };
        if let Err(err) = self.strip.write_frame(&frame) {
            tracing::warn!("LED strip write failed: {}", err);
        }
    }

    fn draw_message(&mut self) {
        let window = self.scroll.step(self.message.lines(), self.config.lcd_rows);
        self.lcd.clear();
        for (row, line) in window.into_iter().enumerate() {
            self.lcd.write_at(row, 0, line);
        }
    }

    fn set_message(&mut self, text: &str) {
        self.message = DisplayMessage::new(text, self.config.lcd_cols);
        self.scroll.reset();
        self.scroll_timer = 0;
        if !self.message.is_enabled() {
            self.lcd.clear();
        }
    }

    fn start_display(&mut self, request: DisplayRequest) {
        self.sequencer
            .start(request.color, request.flash_ticks, request.hold_ticks);
    }

    // ── Serial console ─────────────────────────────────────────────

    fn say(&mut self, text: &str) {
        if let Err(err) = writeln!(self.console, "{text}").and_then(|()| self.console.flush()) {
            tracing::warn!("Console write failed: {}", err);
        }
    }

    fn run_line(&mut self, line: &str) {
        self.say(&format!("Cmd: {line}"));
        let reply = match Command::parse(line) {
            Ok(None) => return,
            Ok(Some(command)) => self.execute(command),
            Err(err) => Err(err),
        };
        match reply {
            Ok(text) if text.is_empty() => {}
            Ok(text) => self.say(&text),
            Err(err) => {
                tracing::warn!("Rejected '{}': {}", line, err);
                self.say(&err.to_string());
            }
        }
    }

    /// Apply a parsed command and return the text to print.
    ///
    /// # Errors
    ///
    /// Returns the store's error when a settings or user-id change could
    /// not be saved. The in-memory state is left unchanged in that case.
    pub fn execute(&mut self, command: Command) -> Result<String> {
        match command {
            Command::Restart => {
                self.exit = Some(Exit::Restart);
                Ok("Restarting.".to_string())
            }
            Command::SetSettings(settings) => {
                self.store.save_settings(&settings)?;
                self.settings = Some(settings);
                self.restart_pending = true;
                Ok("Settings saved. RESTART to apply them.".to_string())
            }
            Command::Help => Ok(help_text()),
            Command::GetStatus => Ok(self.status_text()),
            Command::GetUserIds => Ok(self.user_ids_text()),
            Command::SetUserId { index, id } => {
                let mut user_ids = self.user_ids.clone();
                if !user_ids.set(index, &id) {
                    return Err(Error::malformed("ID not found in input. User Id not updated."));
                }
                self.store.save_user_ids(&user_ids)?;
                self.user_ids = user_ids;
                Ok(format!(
                    "Updated User Id {index} with value '{}'.",
                    self.user_ids.ids()[index - 1]
                ))
            }
            Command::SetDisplay(request) => {
                self.start_display(request);
                Ok(String::new())
            }
            Command::SetMessage(text) => {
                self.set_message(&text);
                Ok(String::new())
            }
        }
    }

    fn status_text(&self) -> String {
        let mut out = String::new();
        if self.restart_pending {
            out.push_str("NOTE: Current settings have not been implemented. RESTART required.\n");
        }

        out.push_str("Settings:\n");
        match &self.settings {
            Some(settings) => {
                let _ = writeln!(out, "\tSSID: {}", settings.ssid);
                match settings.addressing {
                    Addressing::Dhcp => out.push_str("\tUse DHCP: TRUE\n"),
                    Addressing::Static {
                        ip,
                        subnet,
                        gateway,
                    } => {
                        let _ = write!(
                            out,
                            "\tUse DHCP: FALSE\n\tIP Address: {ip}\n\tSubnet Mask: {subnet}\n\tGateway: {gateway}\n"
                        );
                    }
                }
            }
            None => out.push_str("\tNo Network Settings\n"),
        }

        match self.network {
            NetworkStatus::Connected(addr) => {
                out.push_str("WiFi Status: Connected\n");
                if self.settings.as_ref().is_some_and(Settings::uses_dhcp) {
                    let _ = writeln!(out, "\tAcquired IP Address: {addr}");
                }
            }
            _ => out.push_str("WiFi Status: Not Connected\n"),
        }

        let state = self.sequencer.state();
        let _ = write!(
            out,
            "Display Status: red={}, green={}, blue={}, flashTime left={}, displayTime left={}\nCurrent Message: {}",
            state.color.r,
            state.color.g,
            state.color.b,
            state.flash_ticks,
            state.hold_ticks,
            self.message.text()
        );
        out
    }

    fn user_ids_text(&self) -> String {
        let mut out = "User Ids:".to_string();
        for (i, id) in self.user_ids.ids().iter().enumerate() {
            let _ = write!(out, "\n{:2}: '{}'", i + 1, id);
        }
        out
    }

    // ── HTTP and network events ────────────────────────────────────

    pub fn handle_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Request(request) => {
                let result = self.handle_request(request.user_id.as_deref(), request.action);
                // The handler may have given up waiting.
                let _ = request.reply.send(result);
            }
            DeviceEvent::Network(event) => self.handle_network(event),
        }
    }

    /// Serve one HTTP route on behalf of `user_id`.
    ///
    /// # Errors
    ///
    /// `UnauthorizedCommand` if `user_id` is missing or not in the table.
    pub fn handle_request(&mut self, user_id: Option<&str>, action: HttpAction) -> Result<StatusReport> {
        if !user_id.is_some_and(|id| self.user_ids.is_authorized(id)) {
            return Err(Error::UnauthorizedCommand);
        }

        match action {
            HttpAction::Status => {}
            HttpAction::Display(request) => self.start_display(request),
            HttpAction::Off => self.sequencer.stop(),
            HttpAction::Message(text) => self.set_message(&text),
        }
        Ok(self.status_report())
    }

    pub fn status_report(&self) -> StatusReport {
        let state = self.sequencer.state();
        StatusReport {
            red: state.color.r,
            green: state.color.g,
            blue: state.color.b,
            flash_time_left: state.flash_ticks,
            display_time_left: state.hold_ticks,
            phase: state.phase,
            message: self.message.text().to_string(),
            ip: match self.network {
                NetworkStatus::Connected(addr) => Some(addr.to_string()),
                _ => None,
            },
            restart_required: self.restart_pending,
        }
    }

    fn handle_network(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Connecting { ssid } => {
                self.network = NetworkStatus::Connecting;
                self.retry_dots = 0;
                self.lcd.clear();
                self.lcd.write_at(0, 0, "Connecting to ");
                self.lcd.write_at(1, 0, &ssid);
            }
            NetworkEvent::Retry => {
                self.lcd.write_at(RETRY_ROW, self.retry_dots, ".");
                self.retry_dots += 1;
            }
            NetworkEvent::Connected { addr, dhcp } => {
                self.network = NetworkStatus::Connected(addr);
                self.lcd.clear();
                self.lcd.write_at(0, 0, "Connected.");
                if dhcp {
                    self.lcd.write_at(RETRY_ROW, 0, "Using DHCP.");
                }
                self.announcer.begin(addr);
            }
            NetworkEvent::Failed => {
                self.network = NetworkStatus::Failed;
                self.lcd.clear();
                self.lcd.write_at(0, 0, "Could not connect");
            }
        }
    }
}

fn help_text() -> String {
    format!(
        "Help: commands are case-insensitive.
RESTART - soft reset.
HELP - display help.
SETSETTINGS - sets the network settings and requires additional params:
\tSSID=<value>;PW=<password>;USEDHCP=<TRUE/FALSE>;IP=<v4ipaddress>;GATEWAY=<v4gateway>;SUBNET=<v4subnetmask>;
\tIP, SUBNET and GATEWAY are only required if USEDHCP is FALSE. RESTART should be called after using this command.
GETSTATUS - returns current network settings and status, display status, and message.
GETUSERIDS - returns the list of User Ids.
SETUSERID - sets a specific user id. IDs are numbered 1 through {USER_ID_COUNT} and can be up to {USER_ID_MAX_LEN} characters long. Requires additional params:
\tINDEX=<1-{USER_ID_COUNT}>;ID=<value>;
\tThe ID cannot be blank and if it is longer than {USER_ID_MAX_LEN} it will be truncated.
SETDISPLAY - sets the light display and takes optional params (missing params are read as 0):
\tRED=<0-255>;GREEN=<0-255>;BLUE=<0-255>;FLASHTIME=<number>;DISPLAYTIME=<number>;
\tIf FLASHTIME is < 0 it flashes indefinitely, if it is 0 it does not flash, if it is > 0 it flashes for that many tenths of a second.
\tWhen flashing is done the display may turn on solid. If DISPLAYTIME is < 0 it stays solid indefinitely, if it is 0 it does not turn on.
\tIf it is > 0 it stays solid for that many tenths of a second.
SETMESSAGE - sets the message to display on the LCD and takes optional params (a blank message clears the LCD):
\tMESSAGE=<message>; MESSAGE is capped at {MAX_MESSAGE_LEN} characters."
    )
}
