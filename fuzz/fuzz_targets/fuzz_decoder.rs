#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ordered_stream::{CancellationToken, Codec, DecodedReader, Pipeline};
use std::io::Cursor;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    data: Vec<u8>,
    codec: u8,
}

fuzz_target!(|input: FuzzInput| {
    // Don't fuzz extremely large inputs
    if input.data.len() > 1_000_000 {
        return;
    }

    let codec = Codec::ALL[input.codec as usize % Codec::ALL.len()];
    let Ok(decoder) = DecodedReader::new(codec, Cursor::new(&input.data[..])) else {
        return;
    };

    // Arbitrary bytes must either decode or fail cleanly; the pool must
    // always join
    let _ = Pipeline::new(CancellationToken::new())
        .with_workers(4)
        .with_block_size(4096)
        .run(decoder, std::io::sink());
});
