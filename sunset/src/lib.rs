//! Higher-level control of Sunset Light BLE lamps.
//!
//! A [Controller] pairs a device [Profile] with a [Transport] and turns
//! intents like "set the color" into ordered characteristic writes.  This
//! crate does not talk BLE itself; implement [Transport] on top of whatever
//! GATT stack the platform provides and hand it to the controller.
//!
//! Packets for one intent are written strictly in order, each write awaited
//! before the next is issued.  The lamp firmware does not queue commands
//! reliably, so concurrent writes to the same lamp are never issued from a
//! single controller.  Controllers for different lamps are independent and
//! can run concurrently.

use async_trait::async_trait;
use log::{debug, warn};
use sunset_core::{Error as ProtocolError, Profile, RawPacket};
use thiserror::Error;
use uuid::Uuid;

/// Error produced by a [Transport] write.
///
/// Transports report whatever their platform hands them; this crate
/// propagates it upward unmodified.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced when dispatching an intent to a lamp.
#[derive(Error, Debug)]
pub enum SendError {
    /// Packet construction failed, or the scene name was unknown.  Nothing
    /// was written to the lamp.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The underlying characteristic write failed.  Retry policy belongs to
    /// the transport, not here.
    #[error("characteristic write failed")]
    Transport(#[source] TransportError),
}

/// Write access to a connected lamp.
///
/// One operation: write some bytes to a characteristic.  Implementations
/// must preserve write order for sequential calls on the same connection;
/// connection management, pairing, and retries all live behind this trait.
#[async_trait]
pub trait Transport {
    async fn write(&self, characteristic: &Uuid, data: &[u8]) -> Result<(), TransportError>;
}

/// Drives one lamp: builds packets through the profile and writes them via
/// the transport.
///
/// The profile is immutable after construction, so a controller can be
/// shared behind a reference by concurrent readers.
pub struct Controller<T> {
    profile: Box<dyn Profile>,
    transport: T,
}

impl<T: Transport> Controller<T> {
    pub fn new(profile: Box<dyn Profile>, transport: T) -> Controller<T> {
        Controller { profile, transport }
    }

    pub fn profile(&self) -> &dyn Profile {
        self.profile.as_ref()
    }

    pub async fn turn_on(&self) -> Result<(), SendError> {
        self.send(self.profile.build_power(true)?).await
    }

    pub async fn turn_off(&self) -> Result<(), SendError> {
        self.send(self.profile.build_power(false)?).await
    }

    pub async fn set_color(&self, r: u8, g: u8, b: u8) -> Result<(), SendError> {
        self.send(self.profile.build_color(r, g, b)?).await
    }

    /// Brightness is taken in the host 0-255 convention; the profile scales
    /// it to the lamp's native range.
    pub async fn set_brightness(&self, brightness: u8) -> Result<(), SendError> {
        self.send(self.profile.build_brightness(brightness)?).await
    }

    pub async fn set_white(&self) -> Result<(), SendError> {
        self.send(self.profile.build_white()?).await
    }

    /// Select a preset scene by display name (case-insensitive).
    ///
    /// An unknown name writes nothing and returns the scene error; the lamp
    /// never receives a guessed scene id.
    pub async fn set_scene(&self, name: &str) -> Result<(), SendError> {
        let packets = self.profile.build_scene(name)?;
        if packets.is_empty() {
            warn!(
                "profile {:?} has no scene named {:?}",
                self.profile.name(),
                name
            );
            return Err(ProtocolError::UnknownScene(name.to_owned()).into());
        }
        self.send(packets).await
    }

    async fn send(&self, packets: Vec<RawPacket>) -> Result<(), SendError> {
        let characteristic = self.profile.write_char_uuid();
        for packet in packets {
            let data = packet.pack()?;
            debug!("write {} <- {:02x?}", characteristic, data);
            self.transport
                .write(&characteristic, &data)
                .await
                .map_err(SendError::Transport)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use sunset_core::{SunsetProfile, WRITE_CHAR_UUID};

    #[derive(Clone, Default)]
    struct RecordingTransport {
        writes: Arc<Mutex<Vec<(Uuid, Vec<u8>)>>>,
    }

    impl RecordingTransport {
        fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn write(&self, characteristic: &Uuid, data: &[u8]) -> Result<(), TransportError> {
            self.writes
                .lock()
                .unwrap()
                .push((*characteristic, data.to_vec()));
            Ok(())
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn write(&self, _characteristic: &Uuid, _data: &[u8]) -> Result<(), TransportError> {
            Err("gatt write rejected".into())
        }
    }

    fn controller(transport: RecordingTransport) -> Controller<RecordingTransport> {
        Controller::new(Box::new(SunsetProfile::new()), transport)
    }

    #[tokio::test]
    async fn turn_on_writes_one_frame() {
        let transport = RecordingTransport::default();
        let ctrl = controller(transport.clone());

        ctrl.turn_on().await.unwrap();

        let writes = transport.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, WRITE_CHAR_UUID);
        assert_eq!(writes[0].1, vec![0x55, 0x01, 0xFF, 0x06, 0x01, 0xA2]);
    }

    #[tokio::test]
    async fn intents_write_in_call_order() {
        let transport = RecordingTransport::default();
        let ctrl = controller(transport.clone());

        ctrl.turn_on().await.unwrap();
        ctrl.set_brightness(255).await.unwrap();
        ctrl.set_scene("ghost").await.unwrap();

        let commands: Vec<u8> = transport.writes().iter().map(|(_, data)| data[1]).collect();
        assert_eq!(commands, vec![0x01, 0x05, 0x06]);
    }

    #[tokio::test]
    async fn set_white_matches_full_color() {
        let transport = RecordingTransport::default();
        let ctrl = controller(transport.clone());

        ctrl.set_white().await.unwrap();
        ctrl.set_color(255, 255, 255).await.unwrap();

        let writes = transport.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], writes[1]);
    }

    #[tokio::test]
    async fn unknown_scene_writes_nothing() {
        let transport = RecordingTransport::default();
        let ctrl = controller(transport.clone());

        let err = ctrl.set_scene("not-a-scene").await.unwrap_err();
        match err {
            SendError::Protocol(ProtocolError::UnknownScene(name)) => {
                assert_eq!(name, "not-a-scene");
            }
            other => panic!("expected UnknownScene, got {:?}", other),
        }
        assert!(transport.writes().is_empty());
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let ctrl = Controller::new(Box::new(SunsetProfile::new()), FailingTransport);

        let err = ctrl.turn_off().await.unwrap_err();
        match err {
            SendError::Transport(inner) => {
                assert_eq!(inner.to_string(), "gatt write rejected");
            }
            other => panic!("expected Transport, got {:?}", other),
        }
    }
}
