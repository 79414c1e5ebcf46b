//! Line-oriented front end for the worker pool: one URL per input line,
//! one JSON record per output line, in completion order.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use canonical_engine::{Reply, WorkerPool};
use engine_logging::engine_info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub submitted: u64,
    pub canonical: u64,
}

pub fn run_batch<R: BufRead, W: Write>(
    mut pool: WorkerPool,
    input: R,
    output: &mut W,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();

    for line in input.split(b'\n') {
        let line = line.context("Failed to read input")?;
        let url = line.trim_ascii();
        if url.is_empty() {
            continue;
        }
        pool.submit(summary.submitted, url)?;
        summary.submitted += 1;
        while let Some(reply) = pool.try_recv() {
            write_reply(output, &reply, &mut summary)?;
        }
    }

    pool.close();
    while let Some(reply) = pool.recv() {
        write_reply(output, &reply, &mut summary)?;
    }
    output.flush().context("Failed to flush output")?;

    engine_info!(
        "Batch done: {} submitted, {} canonical",
        summary.submitted,
        summary.canonical
    );
    Ok(summary)
}

fn write_reply<W: Write>(output: &mut W, reply: &Reply, summary: &mut BatchSummary) -> Result<()> {
    if reply.resolution.is_canonical() {
        summary.canonical += 1;
    }
    serde_json::to_writer(&mut *output, &reply.resolution).context("Failed to write record")?;
    output.write_all(b"\n").context("Failed to write record")?;
    Ok(())
}
