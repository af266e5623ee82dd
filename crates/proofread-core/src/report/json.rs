use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One JSON object per line.
pub fn write_jsonl<T: Serialize>(rows: &[T], out: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(out)?;
    let mut w = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut w, row)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}
