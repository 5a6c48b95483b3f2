//! Summary export: one `metric,value,description` CSV per run.

use std::{
    fs::{create_dir_all, write},
    path::Path,
};
use log::{error, info};

use crate::utils::metrics::StatsSnapshot;

pub fn summary_csv(snap: &StatsSnapshot, buffered: usize, capacity: usize) -> String {
    let mut csv_content = String::from("metric,value,description\n");

    csv_content.push_str(&format!("generated,{},Generator invocations\n", snap.generated));
    csv_content.push_str(&format!("enqueued,{},Samples accepted into the buffer\n", snap.enqueued));
    csv_content.push_str(&format!("dropped,{},Samples discarded on a full buffer\n", snap.dropped));
    csv_content.push_str(&format!("delivered,{},Samples confirmed by the transport\n", snap.delivered));
    csv_content.push_str(&format!("failed_attempts,{},Delivery attempts that were retried\n", snap.failed_attempts));
    csv_content.push_str(&format!("idle_polls,{},Publisher wake-ups with an empty buffer\n", snap.idle_polls));
    csv_content.push_str(&format!("buffered,{},Samples still awaiting delivery\n", buffered));
    csv_content.push_str(&format!("capacity,{},Buffer slots\n", capacity));

    let drop_rate = if snap.enqueued + snap.dropped > 0 {
        snap.dropped as f64 / (snap.enqueued + snap.dropped) as f64 * 100.0
    } else {
        0.0
    };
    csv_content.push_str(&format!("drop_rate_pct,{:.2},Share of produced samples dropped\n", drop_rate));

    csv_content
}

pub fn export_summary(path: &Path, snap: &StatsSnapshot, buffered: usize, capacity: usize) {
    if let Some(dir) = path.parent() {
        if let Err(e) = create_dir_all(dir) {
            error!("Failed to create export directory {:?}: {}", dir, e);
            return;
        }
    }

    match write(path, summary_csv(snap, buffered, capacity)) {
        Ok(_) => info!("Summary exported to: {:?}", path),
        Err(e) => error!("Failed to export summary: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_rate_uses_produced_total() {
        let snap = StatsSnapshot { enqueued: 3, dropped: 1, ..Default::default() };
        let csv = summary_csv(&snap, 2, 60);
        assert!(csv.starts_with("metric,value,description\n"));
        assert!(csv.contains("dropped,1,"));
        assert!(csv.contains("buffered,2,"));
        assert!(csv.contains("drop_rate_pct,25.00,"));
    }

    #[test]
    fn export_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/summary.csv");
        export_summary(&path, &StatsSnapshot::default(), 0, 60);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("capacity,60,"));
        assert!(written.contains("drop_rate_pct,0.00,"));
    }
}
