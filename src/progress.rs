//! Terminal progress display for a single run.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use ordered_stream::ProgressFn;
use std::sync::Arc;

/// Byte bar when the total is known (compress), spinner otherwise (decompress).
pub fn progress_bar(total: Option<u64>, visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }

    let pb = match total {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?);
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bytes} written ({bytes_per_sec})",
            )?);
            pb
        }
    };
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
    Ok(pb)
}

/// Adapts a progress bar to the pipeline's per-block callback.
pub fn progress_callback(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Arc::new(move |bytes| pb.inc(bytes))
}
