#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ordered_stream::{CancellationToken, Pipeline};
use std::io::Cursor;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    data: Vec<u8>,
    block_size: u16,
    workers: u8,
}

fuzz_target!(|input: FuzzInput| {
    if input.data.len() > 1_000_000 {
        return;
    }

    // Keep the pool small; the fuzzer runs many iterations per second
    let workers = (input.workers % 8) as usize + 1;
    let block_size = input.block_size as usize + 1;

    let output = Pipeline::new(CancellationToken::new())
        .with_workers(workers)
        .with_block_size(block_size)
        .run(Cursor::new(&input.data[..]), Vec::new())
        .expect("in-memory copy cannot fail");

    // Output must be the input, byte for byte, whatever the interleaving
    assert_eq!(output.writer, input.data);
    assert_eq!(output.stats.blocks_read, output.stats.blocks_written);
    assert_eq!(
        output.stats.blocks_written,
        input.data.len().div_ceil(block_size) as u64
    );
});
