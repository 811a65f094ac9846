//! Background sampler: periodically nudges the telemetry metadata of online
//! devices and publishes each change, so polling views and the subscription
//! both have something to show.

use devicedash::types::{Device, DeviceStatus, MetadataEntry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::trace;

use crate::state::{now_unix, AppState};
use crate::store::Store;

pub fn spawn_sampler(state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick fires immediately; skip it so seeded values show first.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let changed = {
                let mut store = state.store.write().await;
                sample(&mut store, &mut rng, now_unix())
            };
            trace!(count = changed.len(), "sampled devices");
            for device in changed {
                state.publish(device);
            }
        }
    })
}

/// One sampling pass. Returns the devices that changed.
pub fn sample(store: &mut Store, rng: &mut impl Rng, now: i64) -> Vec<Device> {
    let mut changed = Vec::new();
    for device in store.devices_mut() {
        match device.status {
            DeviceStatus::Online => {
                jitter(device, "cpu_percent", rng.gen_range(-8.0..8.0), 0.0, 100.0);
                jitter(device, "memory_used_gb", rng.gen_range(-0.2..0.2), 0.0, f64::MAX);
                // counters only grow
                jitter(device, "network_up_mb", rng.gen_range(0.0..4.0), 0.0, f64::MAX);
                jitter(device, "network_down_mb", rng.gen_range(0.0..12.0), 0.0, f64::MAX);
                jitter(device, "battery_level", rng.gen_range(-0.5..0.0), 0.0, 100.0);
                if rng.gen_bool(0.02) {
                    device.status = DeviceStatus::Error;
                }
                device.last_seen = now;
            }
            DeviceStatus::Error if rng.gen_bool(0.2) => {
                device.status = DeviceStatus::Online;
                device.last_seen = now;
            }
            _ => continue,
        }
        changed.push(device.clone());
    }
    changed
}

/// Add `delta` to a numeric metadata value, clamped. Keys the device does not
/// report, or values that do not parse, are left alone.
fn jitter(device: &mut Device, key: &str, delta: f64, min: f64, max: f64) {
    let Some(entry) = device.metadata.iter_mut().rev().find(|m| m.key == key) else {
        return;
    };
    let Ok(current) = entry.value.trim().parse::<f64>() else {
        return;
    };
    let next = (current + delta).clamp(min, max);
    *entry = MetadataEntry::new(key, format!("{next:.1}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use devicedash::parse_metadata;

    const NOW: i64 = 1_800_000_000;

    #[test]
    fn only_online_or_recovering_devices_change() {
        let mut store = Store::seeded(NOW - 1_000);
        let mut rng = StdRng::seed_from_u64(7);
        let changed = sample(&mut store, &mut rng, NOW);
        assert!(!changed.is_empty());
        for d in &changed {
            assert_eq!(d.last_seen, NOW);
        }
        // offline and maintenance devices are never touched
        assert!(changed.iter().all(|d| d.id != "dev-4" && d.id != "dev-7"));
        assert_eq!(store.device("dev-4").map(|d| d.last_seen), Some(NOW - 1_000 - 3_600 * 5));
    }

    #[test]
    fn cpu_stays_within_percent_bounds() {
        let mut store = Store::seeded(NOW);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            sample(&mut store, &mut rng, NOW);
        }
        for id in ["dev-1", "dev-2", "dev-5", "dev-6", "dev-8"] {
            let Some(d) = store.device(id) else { continue };
            let m = parse_metadata(&d.metadata);
            if let Some(cpu) = m.cpu_percent {
                assert!((0.0..=100.0).contains(&cpu), "{id}: {cpu}");
            }
        }
    }

    #[test]
    fn jitter_ignores_missing_and_unparsable_values() {
        let mut d = Device {
            id: "x".into(),
            name: "x".into(),
            kind: "sensor".into(),
            status: DeviceStatus::Online,
            created_at: 0,
            last_seen: 0,
            metadata: vec![MetadataEntry::new("cpu_percent", "n/a")],
        };
        jitter(&mut d, "cpu_percent", 5.0, 0.0, 100.0);
        jitter(&mut d, "memory_used_gb", 5.0, 0.0, 10.0);
        assert_eq!(d.metadata, vec![MetadataEntry::new("cpu_percent", "n/a")]);

        d.metadata[0].value = "98".into();
        jitter(&mut d, "cpu_percent", 5.0, 0.0, 100.0);
        assert_eq!(d.metadata[0].value, "100.0");
    }
}
