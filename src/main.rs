use std::rc::Rc;

use anyhow::{Result, anyhow, bail};

use rust_monotrack::io::{AppConfig, DepthLog, PoseLog, ReplayTracker, ReplayVideo};
use rust_monotrack::mapping::MappingOutcome;
use rust_monotrack::system::ArSession;
use rust_monotrack::tracking::TrackingController;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(pose_path) = args.next() else {
        bail!("usage: monotrack-replay <poses.csv> [config.yaml] [depth.csv]");
    };
    let config = match args.next() {
        Some(path) => {
            println!("Loading config from: {}", path);
            AppConfig::load(&path)?
        }
        None => AppConfig::default(),
    };
    let depth_log = match args.next() {
        Some(path) => {
            let log = DepthLog::load(&path)?;
            println!("Loaded {} depth samples from {}", log.entries.len(), path);
            Some(log)
        }
        None => None,
    };

    println!("Loading pose log from: {}", pose_path);
    let log = Rc::new(PoseLog::load(&pose_path)?);
    let tracked = log.entries.iter().filter(|e| e.matrix.is_some()).count();
    println!(
        "Loaded {} frames ({} with a pose) spanning {:.2} s",
        log.len(),
        tracked,
        log.duration_s()
    );

    let tracker = ReplayTracker::new(log.clone());
    let cursor = tracker.cursor();
    let controller = TrackingController::new(config.tracking.clone())
        .with_frame_source(Box::new(ReplayVideo {
            width: 640,
            height: 480,
        }))
        .with_tracker(Box::new(tracker));
    let mut session = ArSession::new(controller, config.mapping.clone(), config.session.clone());

    let status = session.start();
    println!("Session status: {} ({})", status, session.status_reason());

    let mut mapped = 0usize;
    for (i, entry) in log.entries.iter().enumerate() {
        cursor.set(i);
        if let Some(request) = session.tick(log.dt(i)) {
            let depth = match depth_log.as_ref() {
                Some(depth_log) => depth_log
                    .at_or_before(entry.timestamp_ns)
                    .cloned()
                    .ok_or_else(|| anyhow!("no depth recorded before {}", entry.timestamp_ns)),
                None => Err(anyhow!("no depth log")),
            };
            if let Some(outcome) = session.apply_depth(&request, depth) {
                mapped += 1;
                if let MappingOutcome::Inserted(id) = outcome {
                    println!("Frame {}: new surface {}", i, id);
                }
            }
        }

        if i % 100 == 0 {
            let pose = session.pose();
            println!(
                "Frame {}/{}: status={}, pos=[{:.2}, {:.2}, {:.2}], surfaces={}",
                i,
                log.len(),
                session.status(),
                pose.position.x,
                pose.position.y,
                pose.position.z,
                session.surfaces().len()
            );
        }
    }

    let stats = session.stats();
    println!(
        "Done! Processed {} frames: {} tracked, {} lost ({:.1}% tracked)",
        stats.frames_processed,
        stats.tracked_count,
        stats.lost_count,
        stats.tracked_ratio() * 100.0
    );
    println!(
        "Jitter: {:.4} m/s, {:.4} rad/s; last pose age {:.0} ms",
        stats.position_jitter_rate, stats.angular_jitter_rate, stats.last_pose_age_ms
    );
    println!("Mapped {} depth samples, {} surfaces remain", mapped, session.surfaces().len());
    for surface in session.surfaces() {
        println!(
            "  {}: normal=[{:.2}, {:.2}, {:.2}], d={:.2}, confidence={:.2}",
            surface.id,
            surface.normal.x,
            surface.normal.y,
            surface.normal.z,
            surface.plane_constant,
            surface.confidence
        );
    }

    session.stop();
    Ok(())
}
