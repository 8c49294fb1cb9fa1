//! This crate provides low-level packet types for dealing with Sunset Light
//! BLE lamps.
//!
//! These cheap RGB "sunset projection" lamps expose a single GATT service
//! ([SERVICE_UUID]).  Commands are written to the [WRITE_CHAR_UUID]
//! characteristic as short binary frames, and the lamp reports status on
//! [NOTIFY_CHAR_UUID].  Since this is a low-level library, it does not deal
//! with issues like connecting to a lamp, retrying writes, or subscribing to
//! notifications.  This should be done at a higher-level library.
//!
//! # Frame format
//!
//! Every command is a single frame:
//!
//! ```text
//! [0x55] [command] [0xFF] [length] [payload ...] [checksum]
//! ```
//!
//! `length` is 5 plus the payload length, and `checksum` is the one's
//! complement of the folded sum of every preceding byte (see [checksum]).
//! The third byte looks like a sequence counter, but the firmware ignores
//! ordering, so it is always 0xFF.
//!
//! # Unknown values
//!
//! The lamps accept frames with command bytes beyond the ones in [Command].
//! Their effects are undocumented, so this library does not construct them.
//!
//! # Scene ids
//!
//! Two incompatible scene-id tables have been recovered from these lamps,
//! and neither has been fully verified against hardware.  Both are kept
//! selectable via [SceneTable] rather than silently picking one.

use byteorder::WriteBytesExt;
use std::io;
use thiserror::Error;
use uuid::Uuid;

/// GATT service exposed by the lamp.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000fff0_0000_1000_8000_00805f9b34fb);

/// Characteristic that command frames are written to.
pub const WRITE_CHAR_UUID: Uuid = Uuid::from_u128(0x0000fff3_0000_1000_8000_00805f9b34fb);

/// Characteristic the lamp sends status notifications on.
pub const NOTIFY_CHAR_UUID: Uuid = Uuid::from_u128(0x0000fff4_0000_1000_8000_00805f9b34fb);

/// First byte of every frame.
pub const SYNC_BYTE: u8 = 0x55;

/// Third byte of every frame.  The protocol has no multi-packet ordering, so
/// this never increments.
pub const SEQUENCE_BYTE: u8 = 0xFF;

/// Largest payload representable in the single-byte length field.
pub const MAX_PAYLOAD: usize = 250;

/// Various packet encoding errors
#[derive(Error, Debug)]
pub enum Error {
    /// The payload does not fit the frame's single-byte length field.
    ///
    /// No command the lamp understands comes anywhere near this limit, so
    /// hitting it means the caller assembled the payload incorrectly.
    #[error("payload of {0} bytes does not fit the length field")]
    PayloadTooLarge(usize),

    /// A scene name that the selected scene table does not know about.
    ///
    /// No frame is built for an unknown scene; the lamp must never receive a
    /// guessed scene id.
    #[error("unknown scene name: {0:?}")]
    UnknownScene(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Compute the checksum over the preceding bytes of a frame.
///
/// The arithmetic sum of the input is folded until it fits in one byte (any
/// high-byte overflow is added back into the low byte), and the result is
/// complemented.  An empty input therefore checksums to 0xFF.
pub fn checksum(data: &[u8]) -> u8 {
    let mut sum: u32 = data.iter().map(|&b| u32::from(b)).sum();
    while sum > 0xFF {
        sum = (sum >> 8) + (sum & 0xFF);
    }
    !(sum as u8)
}

/// Command bytes known to be understood by the lamp.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Command {
    /// Power the lamp on or off.  One-byte payload: 0x01 on, 0x00 off.
    Power = 0x01,
    /// Set a static color.  Three-byte RGB payload, full 0-255 range.
    SetColor = 0x03,
    /// Set brightness.  One-byte payload in the lamp's native 0-100 range.
    SetBrightness = 0x05,
    /// Select a preset scene.  One-byte payload, see [SceneTable].
    SetScene = 0x06,
}

/// The raw packet structure
///
/// This is what gets packed into bytes and written to [WRITE_CHAR_UUID].
///
/// To construct one for a specific capability, use the [Profile] methods
/// rather than building payloads by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPacket {
    pub command: Command,
    pub payload: Vec<u8>,
}

impl RawPacket {
    /// Build a RawPacket from a command byte and its payload.
    ///
    /// Fails if the payload cannot be represented in the length field.
    pub fn build(command: Command, payload: &[u8]) -> Result<RawPacket, Error> {
        if payload.len() > MAX_PAYLOAD {
            return Err(Error::PayloadTooLarge(payload.len()));
        }
        Ok(RawPacket {
            command,
            payload: payload.to_vec(),
        })
    }

    /// The total size (in bytes) of the packed version of this packet.
    pub fn packed_size(&self) -> usize {
        6 + self.payload.len()
    }

    /// Packs this RawPacket into some bytes that can be written to the lamp.
    ///
    /// The length of the returned data will be [RawPacket::packed_size] in
    /// size, with the checksum as the final byte.
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut v = Vec::with_capacity(self.packed_size());
        v.write_u8(SYNC_BYTE)?;
        v.write_u8(self.command as u8)?;
        v.write_u8(SEQUENCE_BYTE)?;
        v.write_u8((5 + self.payload.len()) as u8)?;
        v.extend(&self.payload);
        v.write_u8(checksum(&v))?;
        Ok(v)
    }
}

/// Scene display names, in the order the vendor app lists them.
pub const SCENE_NAMES: [&str; 20] = [
    "Fantasy",
    "Sunset",
    "Forest",
    "Ghost",
    "Sunrise",
    "Midsummer",
    "Tropicaltwilight",
    "Green Prairie",
    "Rubyglow",
    "Aurora",
    "Savanah",
    "Alarm",
    "Lake Placid",
    "Neon",
    "Sundowner",
    "Bluestar",
    "Redrose",
    "Rating",
    "Disco",
    "Autumn",
];

/// Scene id assigned to the first entry of [SCENE_NAMES].
pub const SCENE_ID_BASE: u8 = 0x80;

/// How scene names map to the one-byte scene id.
///
/// Two tables exist because two rounds of reverse engineering disagreed.
/// [SceneTable::Sequential] matches the id layout of the vendor firmware and
/// is the default; [SceneTable::Legacy] reproduces the map collected from
/// early packet captures, duplicate ids included.  Until someone re-verifies
/// every scene against a physical lamp, callers can switch tables instead of
/// patching this crate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SceneTable {
    /// Ids assigned sequentially from [SCENE_ID_BASE] in [SCENE_NAMES] order
    /// (0x80 through 0x93).
    Sequential,
    /// The hand-collected map from early packet captures.
    Legacy,
}

impl SceneTable {
    /// Look up the scene id for a display name.
    ///
    /// Matching is ASCII case-insensitive and exact otherwise; whitespace is
    /// not trimmed.  Returns None for unknown names so that no frame is ever
    /// built from a guess.
    pub fn resolve(&self, name: &str) -> Option<u8> {
        match self {
            SceneTable::Sequential => SCENE_NAMES
                .iter()
                .position(|n| n.eq_ignore_ascii_case(name))
                .map(|idx| SCENE_ID_BASE + idx as u8),
            SceneTable::Legacy => legacy_scene_id(name),
        }
    }
}

/// The scene map as originally captured.  0x8A and 0x92 never showed up in
/// the captures, while sunset/forest and rubyglow/aurora each came back with
/// a shared id (possibly swapped with their neighbours).
#[rustfmt::skip]
fn legacy_scene_id(name: &str) -> Option<u8> {
    match name.to_ascii_lowercase().as_str() {
        "fantasy" => Some(0x80),
        "green prairie" => Some(0x81),
        "sunset" => Some(0x82),
        "forest" => Some(0x82),
        "sunrise" => Some(0x83),
        "ghost" => Some(0x84),
        "midsummer" => Some(0x85),
        "tropicaltwilight" => Some(0x86),
        "disco" => Some(0x87),
        "alarm" => Some(0x88),
        "rubyglow" => Some(0x89),
        "aurora" => Some(0x89),
        "savanah" => Some(0x8B),
        "lake placid" => Some(0x8C),
        "neon" => Some(0x8D),
        "sundowner" => Some(0x8E),
        "bluestar" => Some(0x8F),
        "redrose" => Some(0x90),
        "rating" => Some(0x91),
        "autumn" => Some(0x93),
        _ => None,
    }
}

/// Scale a 0-255 brightness value to the lamp's native 0-100 range.
///
/// The result is rounded, then clamped.
pub fn scale_brightness(value: u8) -> u8 {
    let scaled = (u32::from(value) * 100 + 127) / 255;
    scaled.min(100) as u8
}

/// The capability surface of one lamp family.
///
/// Every `build_*` method returns the ordered list of packets that performs
/// the operation on that family.  All known families answer each capability
/// with a single frame, but the contract allows multi-frame sequences.
///
/// Implementations must be immutable once constructed; a profile is shared
/// read-only between whatever tasks drive the lamp.
pub trait Profile: Send + Sync {
    /// Human-readable family label.
    fn name(&self) -> &str;

    fn service_uuid(&self) -> Uuid {
        SERVICE_UUID
    }

    fn write_char_uuid(&self) -> Uuid {
        WRITE_CHAR_UUID
    }

    fn notify_char_uuid(&self) -> Uuid {
        NOTIFY_CHAR_UUID
    }

    /// Scene display names this profile can resolve, in presentation order.
    fn scenes(&self) -> &[&str] {
        &SCENE_NAMES
    }

    fn build_power(&self, on: bool) -> Result<Vec<RawPacket>, Error>;

    fn build_color(&self, r: u8, g: u8, b: u8) -> Result<Vec<RawPacket>, Error>;

    /// Takes a 0-255 brightness value; the profile owns the scaling to
    /// whatever the device natively understands.
    fn build_brightness(&self, brightness: u8) -> Result<Vec<RawPacket>, Error>;

    /// Returns an empty Vec when the scene name does not resolve.  Callers
    /// must treat that as a failure to surface, not send a default.
    fn build_scene(&self, name: &str) -> Result<Vec<RawPacket>, Error>;

    fn build_white(&self) -> Result<Vec<RawPacket>, Error> {
        self.build_color(255, 255, 255)
    }
}

fn power_packet(on: bool) -> Result<RawPacket, Error> {
    RawPacket::build(Command::Power, &[if on { 0x01 } else { 0x00 }])
}

fn color_packet(r: u8, g: u8, b: u8) -> Result<RawPacket, Error> {
    RawPacket::build(Command::SetColor, &[r, g, b])
}

fn brightness_packet(brightness: u8) -> Result<RawPacket, Error> {
    RawPacket::build(Command::SetBrightness, &[scale_brightness(brightness)])
}

fn scene_packet(table: SceneTable, name: &str) -> Result<Vec<RawPacket>, Error> {
    match table.resolve(name) {
        Some(id) => Ok(vec![RawPacket::build(Command::SetScene, &[id])?]),
        None => Ok(Vec::new()),
    }
}

/// The stock Sunset Light lamp.
#[derive(Debug, Clone)]
pub struct SunsetProfile {
    scene_table: SceneTable,
}

impl SunsetProfile {
    pub fn new() -> SunsetProfile {
        SunsetProfile {
            scene_table: SceneTable::Sequential,
        }
    }

    /// Same wire protocol, but scene names resolved through the given table.
    pub fn with_scene_table(scene_table: SceneTable) -> SunsetProfile {
        SunsetProfile { scene_table }
    }

    pub fn scene_table(&self) -> SceneTable {
        self.scene_table
    }
}

impl Default for SunsetProfile {
    fn default() -> SunsetProfile {
        SunsetProfile::new()
    }
}

impl Profile for SunsetProfile {
    fn name(&self) -> &str {
        "Sunset Light"
    }

    fn build_power(&self, on: bool) -> Result<Vec<RawPacket>, Error> {
        Ok(vec![power_packet(on)?])
    }

    fn build_color(&self, r: u8, g: u8, b: u8) -> Result<Vec<RawPacket>, Error> {
        Ok(vec![color_packet(r, g, b)?])
    }

    fn build_brightness(&self, brightness: u8) -> Result<Vec<RawPacket>, Error> {
        Ok(vec![brightness_packet(brightness)?])
    }

    fn build_scene(&self, name: &str) -> Result<Vec<RawPacket>, Error> {
        scene_packet(self.scene_table, name)
    }
}

/// The "Hexagon" wall-panel variant.
///
/// It advertises the same GATT service and, as far as testing has shown,
/// speaks the same command set as the stock lamp.  It stays a separate
/// profile so that any protocol divergence found later lands here instead of
/// forking [SunsetProfile].
#[derive(Debug, Clone, Default)]
pub struct HexagonProfile;

impl Profile for HexagonProfile {
    fn name(&self) -> &str {
        "Hexagon"
    }

    fn build_power(&self, on: bool) -> Result<Vec<RawPacket>, Error> {
        Ok(vec![power_packet(on)?])
    }

    fn build_color(&self, r: u8, g: u8, b: u8) -> Result<Vec<RawPacket>, Error> {
        Ok(vec![color_packet(r, g, b)?])
    }

    fn build_brightness(&self, brightness: u8) -> Result<Vec<RawPacket>, Error> {
        Ok(vec![brightness_packet(brightness)?])
    }

    fn build_scene(&self, name: &str) -> Result<Vec<RawPacket>, Error> {
        scene_packet(SceneTable::Sequential, name)
    }
}

/// Profile key for the stock lamp.
pub const PROFILE_SUNSET: &str = "sunset_light";
/// Profile key for the stock lamp with the legacy scene table.
pub const PROFILE_SUNSET_LEGACY: &str = "sunset_light_legacy";
/// Profile key for the Hexagon variant.
pub const PROFILE_HEXAGON: &str = "hexagon";

/// The profiles offered at device-setup time, as (key, label) pairs.
pub fn list_profiles() -> &'static [(&'static str, &'static str)] {
    &[
        (PROFILE_SUNSET, "Sunset Light"),
        (PROFILE_SUNSET_LEGACY, "Sunset Light (legacy scene ids)"),
        (PROFILE_HEXAGON, "Hexagon"),
    ]
}

/// Look up a profile by its configuration key.
///
/// Returns None for unknown keys; there is deliberately no fallback profile,
/// since driving a lamp with the wrong table is worse than failing setup.
pub fn profile_for_key(key: &str) -> Option<Box<dyn Profile>> {
    match key {
        PROFILE_SUNSET => Some(Box::new(SunsetProfile::new())),
        PROFILE_SUNSET_LEGACY => Some(Box::new(SunsetProfile::with_scene_table(
            SceneTable::Legacy,
        ))),
        PROFILE_HEXAGON => Some(Box::new(HexagonProfile)),
        _ => None,
    }
}
