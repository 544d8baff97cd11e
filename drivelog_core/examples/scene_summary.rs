//! Scene Summary Demo
//! ==================
//!
//! Opens a dataset, prints its scenes and category statistics, and
//! resolves the front-camera boxes of every scene's first sample.
//!
//! Run:
//! ```bash
//! cargo run --example scene_summary -- /data/lyft/train /data/lyft/train/data
//! ```

use drivelog_core::{BoxVisibility, CaptureQuery, Dataset, DatasetConfig, VelocityConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut args = std::env::args().skip(1);
    let data_root = args.next().unwrap_or_else(|| ".".to_string());
    let mut config = DatasetConfig::new(&data_root);
    if let Some(table_root) = args.next() {
        config = config.with_table_root(table_root);
    }

    let dataset = Dataset::open(config)?;

    for scene in dataset.scene_summaries()? {
        info!(
            "{:20} [{:.0}s] {:5.1}s, {}, #anns: {}",
            scene.name, scene.start_time, scene.duration, scene.location, scene.nbr_annotations
        );
    }

    for stats in dataset.category_stats() {
        info!(
            "{:27} n={:5}, width={:5.2}\u{b1}{:.2}, len={:5.2}\u{b1}{:.2}, height={:5.2}\u{b1}{:.2}",
            stats.name,
            stats.count,
            stats.width.mean,
            stats.width.std,
            stats.length.mean,
            stats.length.std,
            stats.height.mean,
            stats.height.std
        );
    }

    let velocity = VelocityConfig::default();
    for scene in dataset.store().scene.iter() {
        let Some(cam) = dataset
            .sample_keyframes(&scene.first_sample_token)?
            .get("CAM_FRONT")
            .cloned()
        else {
            warn!("Scene {} has no CAM_FRONT keyframe", scene.name);
            continue;
        };

        let query = CaptureQuery::new(cam).with_visibility(BoxVisibility::Any);
        let result = dataset.resolve_boxes_for_capture(&query)?;
        info!("{}: {} boxes visible in {}", scene.name, result.boxes.len(), result.data_path.display());
        for b in &result.boxes {
            let v = dataset.box_velocity(&b.token, &velocity)?;
            info!("  {:20} depth {:6.1} m, speed {:5.1} m/s", b.name, b.center.z, v.norm());
        }
    }

    Ok(())
}
