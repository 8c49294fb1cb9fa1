//! Encode one lamp command and print the frames it would write, without
//! touching any BLE hardware.  Handy for eyeballing packets next to a
//! sniffer capture.

use async_trait::async_trait;
use std::process::exit;
use sunset::{Controller, Transport, TransportError};
use sunset_core::{list_profiles, profile_for_key, PROFILE_SUNSET};
use uuid::Uuid;

/// Prints every write as `characteristic <- hex` instead of sending it.
struct HexDumpTransport;

#[async_trait]
impl Transport for HexDumpTransport {
    async fn write(&self, characteristic: &Uuid, data: &[u8]) -> Result<(), TransportError> {
        let hex: Vec<String> = data.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{} <- {}", characteristic, hex.join(" "));
        Ok(())
    }
}

fn usage() -> ! {
    eprintln!("usage: send_command [--profile KEY] COMMAND");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  power on|off");
    eprintln!("  color R G B");
    eprintln!("  brightness N      (0-255)");
    eprintln!("  scene NAME");
    eprintln!("  white");
    eprintln!();
    eprintln!("profiles:");
    for (key, label) in list_profiles() {
        eprintln!("  {:<22} {}", key, label);
    }
    exit(2);
}

fn parse_byte(arg: Option<String>) -> u8 {
    match arg.and_then(|s| s.parse().ok()) {
        Some(v) => v,
        None => usage(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1).peekable();

    let mut profile_key = PROFILE_SUNSET.to_string();
    if args.peek().map(|a| a == "--profile").unwrap_or(false) {
        args.next();
        profile_key = match args.next() {
            Some(key) => key,
            None => usage(),
        };
    }

    let profile = match profile_for_key(&profile_key) {
        Some(profile) => profile,
        None => {
            eprintln!("unknown profile key: {}", profile_key);
            exit(1);
        }
    };

    let ctrl = Controller::new(profile, HexDumpTransport);

    let result = match args.next().as_deref() {
        Some("power") => match args.next().as_deref() {
            Some("on") => ctrl.turn_on().await,
            Some("off") => ctrl.turn_off().await,
            _ => usage(),
        },
        Some("color") => {
            let r = parse_byte(args.next());
            let g = parse_byte(args.next());
            let b = parse_byte(args.next());
            ctrl.set_color(r, g, b).await
        }
        Some("brightness") => ctrl.set_brightness(parse_byte(args.next())).await,
        Some("scene") => {
            let name: Vec<String> = args.collect();
            if name.is_empty() {
                usage();
            }
            ctrl.set_scene(&name.join(" ")).await
        }
        Some("white") => ctrl.set_white().await,
        _ => usage(),
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        exit(1);
    }
}
