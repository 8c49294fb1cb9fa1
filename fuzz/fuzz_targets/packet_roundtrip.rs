#![no_main]
use libfuzzer_sys::fuzz_target;

use sunset_core::checksum;
use sunset_core::Command;
use sunset_core::RawPacket;

fn folded_sum(data: &[u8]) -> u32 {
    let mut sum: u32 = data.iter().map(|&b| u32::from(b)).sum();
    while sum > 0xFF {
        sum = (sum >> 8) + (sum & 0xFF);
    }
    sum
}

fuzz_target!(|input: (Command, Vec<u8>)| {
    let (command, payload) = input;

    match RawPacket::build(command, &payload) {
        Ok(packet) => {
            let data = packet.pack().unwrap();

            assert_eq!(data.len(), 6 + payload.len());
            assert_eq!(data[0], 0x55);
            assert_eq!(data[1], command as u8);
            assert_eq!(data[2], 0xFF);
            assert_eq!(data[3], (5 + payload.len()) as u8);
            assert_eq!(&data[4..4 + payload.len()], &payload[..]);

            // the checksum must self-cancel over the whole frame
            assert_eq!(data[data.len() - 1], checksum(&data[..data.len() - 1]));
            assert_eq!(folded_sum(&data), 0xFF);
        }
        // oversized payloads must be rejected, never truncated
        Err(_) => assert!(payload.len() > 250),
    }
});
