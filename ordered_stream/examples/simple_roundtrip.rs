use anyhow::{bail, Result};
use ordered_stream::{CompressionService, ServiceConfig};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <input> [workers]", args[0]);
        return Ok(());
    }

    let input = &args[1];
    let workers = match args.get(2) {
        Some(n) => n.parse()?,
        None => ordered_stream::pipeline::default_workers(),
    };

    let archive = format!("{}.gz", input);
    let restored = format!("{}.restored", input);
    let mut service = CompressionService::new(ServiceConfig::default().with_workers(workers));

    if !service.compress(input, &archive).is_finished() {
        bail!("compression of {} failed", input);
    }
    println!("{} -> {} ({:?})", input, archive, service.last_stats());

    if !service.decompress(&archive, &restored).is_finished() {
        bail!("decompression of {} failed", archive);
    }
    println!("{} -> {} ({:?})", archive, restored, service.last_stats());

    Ok(())
}
