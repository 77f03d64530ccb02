#![no_main]

use std::io::Cursor;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rdbstream::{Decoder, DecoderOptions, Lzf, RdbError};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Version written into an otherwise valid header.
    version: u8,
    verify_checksum: bool,
    body: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let mut bytes = format!("REDIS{:04}", input.version % 12).into_bytes();
    bytes.extend_from_slice(&input.body);

    let options = DecoderOptions::default()
        .verify_checksum(input.verify_checksum)
        .max_string_len(1 << 20);
    let Ok(mut decoder) = Decoder::with_options(Cursor::new(&bytes), options, Lzf) else {
        return;
    };

    // Every input ends in EndOfStream or an error, within the input bounds.
    loop {
        let done = !matches!(decoder.next_entry(), Ok(entry) if !entry.is_end());
        assert!(decoder.offset() <= bytes.len() as u64);
        if done {
            break;
        }
    }
    assert!(matches!(
        decoder.next_entry(),
        Err(RdbError::AlreadyFinished)
    ));
});
