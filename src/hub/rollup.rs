//! Rollup engine (`spec.md` §4.8, component C10): continuous downsampling
//! from finer to coarser buckets. `spec.md` §9's redesign note turns
//! "dynamic numeric-field averaging via reflection" into an explicit
//! per-field aggregation table (`AGGREGATE_TABLE`-equivalent: the
//! `aggregate_mean`/`aggregate_max` split below), so mean- and max-variant
//! fields are distinguished at the schema level, not by name heuristics.

use crate::hub::store::{Store, StoreError, TimeSeriesRow};
use crate::wire::{Bucket, CoreTimes, ExtraFs, Gpu, Stats};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

/// Runs the full cascade starting at `source` for `system_id`, stopping as
/// soon as a level's preconditions aren't met (`spec.md` §4.8 conditions
/// (a)/(b)). Called synchronously right after the writer's 1m insert
/// (`spec.md` §9 "record-store hook chains become explicit post-insert
/// handlers"), and is naturally idempotent per level since it re-checks
/// "no target row already exists" before writing.
pub async fn cascade(store: &dyn Store, system_id: &str, source: Bucket, at: DateTime<Utc>) -> Result<(), StoreError> {
    let mut current = source;
    loop {
        let Some(target) = current.rollup_target() else { break };
        let Some(expected) = target.expected_source_count() else { break };

        let window_start = at - chrono::Duration::minutes(target.minutes());

        if store.has_row_in_window(system_id, target, window_start, at).await? {
            debug!(system_id, bucket = target.as_str(), "rollup target already present, stopping cascade");
            break;
        }

        let sources = store.system_stats_range(system_id, current, window_start, at).await?;
        if sources.len() as i64 != expected {
            debug!(
                system_id,
                bucket = current.as_str(),
                have = sources.len(),
                expected,
                "not enough source rows yet, stopping cascade"
            );
            break;
        }

        let aggregated = aggregate(&sources);
        store.insert_system_stats(system_id, target, at, &aggregated).await?;
        info!(system_id, from = current.as_str(), to = target.as_str(), "rolled up");

        current = target;
    }
    Ok(())
}

/// Mean- vs max-aggregated field split (`spec.md` §4.8): every numeric
/// scalar/map field is mean-aggregated except the "max variant" fields
/// (`bm`, `diom`), which take the elementwise maximum across sources.
fn aggregate(rows: &[TimeSeriesRow<Stats>]) -> Stats {
    let stats: Vec<&Stats> = rows.iter().map(|r| &r.payload).collect();

    Stats {
        cpu: mean(stats.iter().map(|s| s.cpu)),
        cpuu: mean(stats.iter().map(|s| s.cpuu)),
        cpus: mean(stats.iter().map(|s| s.cpus)),
        cpui: mean(stats.iter().map(|s| s.cpui)),
        cpust: mean(stats.iter().map(|s| s.cpust)),
        cpuc: mean_core_map(&stats),

        mem_total: mean_u64(stats.iter().map(|s| s.mem_total)),
        mem_used: mean_u64(stats.iter().map(|s| s.mem_used)),
        mem_used_pct: mean(stats.iter().map(|s| s.mem_used_pct)),
        buff_cache: mean_u64(stats.iter().map(|s| s.buff_cache)),
        swap_total: mean_u64(stats.iter().map(|s| s.swap_total)),
        swap_used: mean_u64(stats.iter().map(|s| s.swap_used)),

        disk_total: mean_u64(stats.iter().map(|s| s.disk_total)),
        disk_used: mean_u64(stats.iter().map(|s| s.disk_used)),
        disk_used_pct: mean(stats.iter().map(|s| s.disk_used_pct)),
        dr: mean(stats.iter().map(|s| s.dr)),
        dw: mean(stats.iter().map(|s| s.dw)),
        dio: [mean_u64(stats.iter().map(|s| s.dio[0])), mean_u64(stats.iter().map(|s| s.dio[1]))],
        diom: max_pair_option(stats.iter().map(|s| s.diom)),

        efs: mean_efs_map(&stats),

        ns: mean(stats.iter().map(|s| s.ns)),
        nr: mean(stats.iter().map(|s| s.nr)),
        b: [mean_u64(stats.iter().map(|s| s.b[0])), mean_u64(stats.iter().map(|s| s.b[1]))],
        bm: max_pair_option(stats.iter().map(|s| s.bm)),

        t: mean_scalar_map(stats.iter().map(|s| &s.t)),
        g: mean_gpu_map(&stats),
        la: [
            mean(stats.iter().map(|s| s.la[0])),
            mean(stats.iter().map(|s| s.la[1])),
            mean(stats.iter().map(|s| s.la[2])),
        ],
        bat: stats.last().and_then(|s| s.bat),
        thread_count: stats.last().map(|s| s.thread_count).unwrap_or(0),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { round2(sum / count as f64) }
}

fn mean_u64(values: impl Iterator<Item = u64>) -> u64 {
    let (sum, count) = values.fold((0u128, 0usize), |(s, c), v| (s + v as u128, c + 1));
    if count == 0 { 0 } else { (sum / count as u128) as u64 }
}

/// Absent max-variant values are treated as missing, never coerced to zero
/// (`spec.md` §9: old-agent payloads must not corrupt max rollups).
fn max_pair_option(values: impl Iterator<Item = Option<[u64; 2]>>) -> Option<[u64; 2]> {
    values.flatten().reduce(|a, b| [a[0].max(b[0]), a[1].max(b[1])])
}

fn mean_core_map(stats: &[&Stats]) -> HashMap<String, CoreTimes> {
    let mut sums: HashMap<String, (f64, f64, f64, f64, usize)> = HashMap::new();
    for s in stats {
        for (key, core) in &s.cpuc {
            let entry = sums.entry(key.clone()).or_insert((0.0, 0.0, 0.0, 0.0, 0));
            entry.0 += core.user;
            entry.1 += core.system;
            entry.2 += core.iowait;
            entry.3 += core.steal;
            entry.4 += 1;
        }
    }
    sums.into_iter()
        .map(|(key, (u, s, i, st, n))| {
            let n = n as f64;
            (
                key,
                CoreTimes {
                    user: round2(u / n),
                    system: round2(s / n),
                    iowait: round2(i / n),
                    steal: round2(st / n),
                },
            )
        })
        .collect()
}

fn mean_scalar_map<'a>(maps: impl Iterator<Item = &'a HashMap<String, f64>>) -> HashMap<String, f64> {
    let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
    for m in maps {
        for (key, value) in m {
            let entry = sums.entry(key.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter().map(|(k, (sum, n))| (k, round2(sum / n as f64))).collect()
}

fn mean_efs_map(stats: &[&Stats]) -> HashMap<String, ExtraFs> {
    let mut sums: HashMap<String, (u64, u64, f64, f64, f64, u64, u64, usize)> = HashMap::new();
    for s in stats {
        for (key, fs) in &s.efs {
            let e = sums.entry(key.clone()).or_insert((0, 0, 0.0, 0.0, 0.0, 0, 0, 0));
            e.0 += fs.total;
            e.1 += fs.used;
            e.2 += fs.used_pct;
            e.3 += fs.read;
            e.4 += fs.write;
            e.5 += fs.inodes_total;
            e.6 += fs.inodes_used;
            e.7 += 1;
        }
    }
    sums.into_iter()
        .map(|(key, (total, used, used_pct, read, write, it, iu, n))| {
            let nu = n as u64;
            (
                key,
                ExtraFs {
                    total: total / nu.max(1),
                    used: used / nu.max(1),
                    used_pct: round2(used_pct / n as f64),
                    read: round2(read / n as f64),
                    write: round2(write / n as f64),
                    inodes_total: it / nu.max(1),
                    inodes_used: iu / nu.max(1),
                },
            )
        })
        .collect()
}

fn mean_gpu_map(stats: &[&Stats]) -> HashMap<String, Gpu> {
    let mut groups: HashMap<String, Vec<&Gpu>> = HashMap::new();
    for s in stats {
        for (key, gpu) in &s.g {
            groups.entry(key.clone()).or_default().push(gpu);
        }
    }
    groups
        .into_iter()
        .map(|(key, gpus)| {
            let n = gpus.len() as f64;
            let name = gpus.last().map(|g| g.name.clone()).unwrap_or_default();
            let util = round2(gpus.iter().map(|g| g.util).sum::<f64>() / n);
            let mem_used = mean_u64_option(gpus.iter().map(|g| g.mem_used));
            let mem_total = mean_u64_option(gpus.iter().map(|g| g.mem_total));
            let power_draw = mean_f64_option(gpus.iter().map(|g| g.power_draw));
            let engines = mean_scalar_map(gpus.iter().map(|g| &g.engines));
            (key, Gpu { name, util, mem_used, mem_total, power_draw, engines })
        })
        .collect()
}

fn mean_u64_option(values: impl Iterator<Item = Option<u64>>) -> Option<u64> {
    let present: Vec<u64> = values.flatten().collect();
    if present.is_empty() { None } else { Some(present.iter().sum::<u64>() / present.len() as u64) }
}

fn mean_f64_option(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() { None } else { Some(round2(present.iter().sum::<f64>() / present.len() as f64)) }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::store::sqlite::SqliteStore;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn ten_one_minute_rows_produce_one_ten_minute_row_averaged() {
        let store = memory_store().await;
        let system = store.create_system("box1", "10.0.0.1", None).await.unwrap();
        let base = Utc::now();
        let cpu_values = [10.0, 10.0, 20.0, 20.0, 30.0, 30.0, 40.0, 40.0, 50.0, 50.0];

        for (i, &cpu) in cpu_values.iter().enumerate() {
            let at = base + chrono::Duration::minutes(i as i64 + 1);
            let mut stats = Stats::default();
            stats.cpu = cpu;
            store.insert_system_stats(&system.id, Bucket::OneMin, at, &stats).await.unwrap();
            cascade(&store, &system.id, Bucket::OneMin, at).await.unwrap();
        }

        let ten_min_rows = store
            .system_stats_range(&system.id, Bucket::TenMin, base, base + chrono::Duration::minutes(11))
            .await
            .unwrap();
        assert_eq!(ten_min_rows.len(), 1);
        assert_eq!(ten_min_rows[0].payload.cpu, 30.0);
    }

    #[tokio::test]
    async fn max_variant_field_takes_elementwise_maximum() {
        let store = memory_store().await;
        let system = store.create_system("box1", "10.0.0.1", None).await.unwrap();
        let base = Utc::now();

        for i in 0..10 {
            let at = base + chrono::Duration::minutes(i + 1);
            let mut stats = Stats::default();
            stats.bm = Some([(i as u64 + 1) * 100, (i as u64 + 1) * 50]);
            store.insert_system_stats(&system.id, Bucket::OneMin, at, &stats).await.unwrap();
        }
        cascade(&store, &system.id, Bucket::OneMin, base + chrono::Duration::minutes(10)).await.unwrap();

        let ten_min_rows = store
            .system_stats_range(&system.id, Bucket::TenMin, base, base + chrono::Duration::minutes(11))
            .await
            .unwrap();
        assert_eq!(ten_min_rows[0].payload.bm, Some([1000, 500]));
    }

    #[tokio::test]
    async fn absent_max_variant_is_never_coerced_to_zero() {
        assert_eq!(max_pair_option(vec![None, None].into_iter()), None);
        assert_eq!(max_pair_option(vec![None, Some([5, 5])].into_iter()), Some([5, 5]));
    }
}
