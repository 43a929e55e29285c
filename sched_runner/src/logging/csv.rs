// CSV sinks for dispatch timing and interrupt activity.
// Writers are shared by the dispatch thread and the tokio workers, so they sit
// behind a blocking mutex rather than an async one.
use crate::errors::RunnerError;
use chrono::Utc;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

type Sink = Mutex<BufWriter<File>>;

static DISPATCH: OnceCell<Sink> = OnceCell::new();
static IRQ: OnceCell<Sink> = OnceCell::new();

const DISPATCH_HEADER: &str = "ts,task,seq,scheduled_us,actual_us,lateness_us,period_error_us\n";
const IRQ_HEADER: &str = "ts,event,handle,detail\n";

fn open(dir: &Path, name: &str, header: &str) -> Result<Sink, RunnerError> {
    let path = dir.join(name);
    let fresh = !path.exists();
    let f = OpenOptions::new().create(true).append(true).open(&path)?;
    let mut w = BufWriter::new(f);
    if fresh {
        w.write_all(header.as_bytes())?;
        w.flush()?;
    }
    Ok(Mutex::new(w))
}

/// Create `dir` and open both CSV files. Later calls are no-ops.
pub fn init(dir: &Path) -> Result<(), RunnerError> {
    fs::create_dir_all(dir)?;
    DISPATCH.get_or_try_init(|| open(dir, "dispatch.csv", DISPATCH_HEADER))?;
    IRQ.get_or_try_init(|| open(dir, "irq.csv", IRQ_HEADER))?;
    Ok(())
}

fn append(cell: &OnceCell<Sink>, line: &str) {
    // Not initialised (tests, --dump-config): drop the row.
    if let Some(sink) = cell.get() {
        let _ = sink.lock().write_all(line.as_bytes());
    }
}

/// dispatch.csv: ts,task,seq,scheduled_us,actual_us,lateness_us,period_error_us
pub fn log_dispatch(task: &str, seq: u64, scheduled_us: u64, actual_us: u64, lateness_us: i64, period_error_us: i64) {
    let ts = Utc::now().to_rfc3339();
    append(
        &DISPATCH,
        &format!("{ts},{task},{seq},{scheduled_us},{actual_us},{lateness_us},{period_error_us}\n"),
    );
}

/// irq.csv: ts,event,handle,detail
pub fn log_irq(event: &str, handle: &str, detail: &str) {
    let ts = Utc::now().to_rfc3339();
    append(&IRQ, &format!("{ts},{event},{handle},{detail}\n"));
}

pub fn flush() {
    for cell in [&DISPATCH, &IRQ] {
        if let Some(sink) = cell.get() {
            let _ = sink.lock().flush();
        }
    }
}
