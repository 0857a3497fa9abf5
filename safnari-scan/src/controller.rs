//! Adaptive controller (spec §4.7, §9): a PID loop on CPU, augmented by
//! queue-pressure, run-queue, scheduler-latency, and heap signals.
//!
//! `compute_control` is a pure function of signals plus previous state;
//! the projection onto concurrency/IOPS deltas is computed here too, but
//! applying those deltas to the live `IoLimiter`/worker pool is the only
//! impure step (spec §9, "Isolate the controller as a pure function").

use safnari_core::{AutoTuneState, NiceLevel};

use crate::collaborators::DiskType;

const CPU_TARGET: f64 = 50.0;
const TARGET_QUEUE_RATIO: f64 = 0.5;
const TARGET_WAIT_SECS: f64 = 1.0;
const TARGET_RUNQ: f64 = 1.0;
const TARGET_LATENCY: f64 = 0.05;

#[derive(Debug, Clone, Copy, Default)]
pub struct Signals {
    pub cpu_percent: f64,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub run_queue_ratio: f64,
    pub sched_latency_sec: f64,
    pub heap_live_bytes: u64,
    pub prior_heap_live_bytes: u64,
    pub processed_delta: u64,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Copy)]
struct NiceParams {
    kp: f64,
    ki: f64,
    kd: f64,
    concurrency_scale: f64,
    io_scale: f64,
}

fn nice_params(nice: NiceLevel) -> NiceParams {
    match nice {
        NiceLevel::Low => NiceParams {
            kp: 0.04,
            ki: 0.01,
            kd: 0.01,
            concurrency_scale: 0.3,
            io_scale: 40.0,
        },
        NiceLevel::Medium => NiceParams {
            kp: 0.06,
            ki: 0.02,
            kd: 0.015,
            concurrency_scale: 0.5,
            io_scale: 70.0,
        },
        NiceLevel::High => NiceParams {
            kp: 0.09,
            ki: 0.03,
            kd: 0.02,
            concurrency_scale: 0.8,
            io_scale: 100.0,
        },
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ControlOutput {
    pub combined: f64,
    pub concurrency_delta: i32,
    pub io_delta: i32,
}

/// Advances EWMAs and the PID integral/derivative in `state`, and returns
/// the scalar control plus the bounded projection onto (worker, IOPS)
/// deltas. Pure: the same `(state, signals, nice)` always yields the same
/// `(AutoTuneState, ControlOutput)`.
pub fn compute_control(
    state: &AutoTuneState,
    signals: &Signals,
    nice: NiceLevel,
) -> (AutoTuneState, ControlOutput) {
    let mut next = state.clone();

    let prior_cpu_ewma = state.cpu_ewma;
    next.cpu_ewma = ewma(0.30, signals.cpu_percent, state.cpu_ewma);
    next.run_queue_ratio_ewma = ewma(0.30, signals.run_queue_ratio, state.run_queue_ratio_ewma);
    next.sched_latency_ewma = ewma(0.30, signals.sched_latency_sec, state.sched_latency_ewma);
    next.heap_live_ewma = ewma(0.20, signals.heap_live_bytes as f64, state.heap_live_ewma);

    let throughput = if signals.elapsed_secs > 0.0 {
        signals.processed_delta as f64 / signals.elapsed_secs
    } else {
        0.0
    };
    next.throughput_ewma = ewma(0.35, throughput, state.throughput_ewma);

    let queue_ratio = if signals.queue_capacity > 0 {
        signals.queue_depth as f64 / signals.queue_capacity as f64
    } else {
        0.0
    };
    let queue_wait = signals.queue_depth as f64 / next.throughput_ewma.max(1e-6);
    next.queue_wait_ewma = ewma(0.35, queue_wait, state.queue_wait_ewma);

    let params = nice_params(nice);

    let cpu_error = CPU_TARGET - next.cpu_ewma;
    next.pid_integral = (state.pid_integral + cpu_error).clamp(-100.0, 100.0);
    let derivative = cpu_error - state.pid_previous_error;
    next.pid_previous_error = cpu_error;

    let cpu_pid = (params.kp * cpu_error + params.ki * next.pid_integral + params.kd * derivative)
        .clamp(-3.5, 3.5);

    let queue_ratio_error = queue_ratio - TARGET_QUEUE_RATIO;
    let queue_wait_error = (next.queue_wait_ewma - TARGET_WAIT_SECS) / TARGET_WAIT_SECS;
    let queue_control = 2.2 * queue_ratio_error + 1.4 * queue_wait_error;

    let runq_error = next.run_queue_ratio_ewma - TARGET_RUNQ;
    let latency_error = (next.sched_latency_ewma - TARGET_LATENCY) / TARGET_LATENCY;
    let heap_delta = if signals.prior_heap_live_bytes > 0 {
        (signals.heap_live_bytes as f64 - signals.prior_heap_live_bytes as f64)
            / signals.prior_heap_live_bytes as f64
    } else {
        0.0
    };
    let runtime_control = 1.8 * runq_error + 1.6 * latency_error - 0.8 * heap_delta;

    let mut combined = cpu_pid + queue_control + runtime_control;

    let in_deadband = cpu_error.abs() <= 2.0
        && queue_ratio_error.abs() <= 0.05
        && queue_wait_error.abs() <= 0.20
        && runq_error.abs() <= 0.05
        && latency_error.abs() <= 0.20
        && heap_delta.abs() <= 0.15;

    if in_deadband {
        next.pid_integral *= 0.85;
        return (
            next,
            ControlOutput {
                combined: 0.0,
                concurrency_delta: 0,
                io_delta: 0,
            },
        );
    }

    let cpu_noise = (signals.cpu_percent - prior_cpu_ewma).abs();
    if cpu_noise > 35.0 {
        combined *= 0.25;
    } else if cpu_noise > 20.0 {
        combined *= 0.5;
    }

    let concurrency_delta = (combined * params.concurrency_scale).round().clamp(-2.0, 2.0) as i32;
    let io_delta = (combined * params.io_scale).round().clamp(-250.0, 250.0) as i32;

    (
        next,
        ControlOutput {
            combined,
            concurrency_delta,
            io_delta,
        },
    )
}

fn ewma(alpha: f64, sample: f64, prev: f64) -> f64 {
    alpha * sample + (1.0 - alpha) * prev
}

/// Initial concurrency per nice level, capped on low-memory hosts
/// (spec §4.7).
pub fn initial_concurrency(nice: NiceLevel, num_cpus: usize, total_memory_bytes: u64) -> usize {
    let base = match nice {
        NiceLevel::Low => 1,
        NiceLevel::Medium => num_cpus.div_ceil(2).max(1),
        NiceLevel::High => num_cpus.max(1),
    };
    let gib = 1024u64 * 1024 * 1024;
    let capped = if total_memory_bytes <= 4 * gib {
        base.min(2)
    } else if total_memory_bytes <= 8 * gib {
        base.min(4)
    } else {
        base
    };
    capped.max(1)
}

/// Ceiling on IOPS the controller may grow to, keyed by nice level and
/// detected disk type (spec §4.7).
pub fn max_io_limit(nice: NiceLevel, disk_type: DiskType) -> u32 {
    let base = match disk_type {
        DiskType::Ssd => 5000,
        DiskType::Hdd => 800,
        DiskType::Unknown => 2000,
    };
    let scale = match nice {
        NiceLevel::Low => 0.5,
        NiceLevel::Medium => 1.0,
        NiceLevel::High => 1.5,
    };
    ((base as f64) * scale) as u32
}

/// Applies a computed delta to concurrency, respecting the explicit-set
/// guard and the `[1, num_cpus]` clamp (spec §3, §4.7, §5).
pub fn apply_concurrency_delta(
    current: usize,
    delta: i32,
    explicitly_set: bool,
    num_cpus: usize,
) -> usize {
    if explicitly_set || delta == 0 {
        return current;
    }
    let proposed = current as i64 + delta as i64;
    proposed.clamp(1, num_cpus.max(1) as i64) as usize
}

/// Applies a computed delta to the I/O limit, respecting the
/// explicit-set guard and the `[100, max_io_limit]` clamp.
pub fn apply_io_delta(
    current: u32,
    delta: i32,
    explicitly_set: bool,
    max_io_limit: u32,
) -> u32 {
    if explicitly_set || delta == 0 {
        return current;
    }
    let proposed = current as i64 + delta as i64;
    proposed.clamp(100, max_io_limit.max(100) as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady_state_signals() -> Signals {
        Signals {
            cpu_percent: CPU_TARGET,
            queue_depth: 5,
            queue_capacity: 10,
            run_queue_ratio: TARGET_RUNQ,
            sched_latency_sec: TARGET_LATENCY,
            heap_live_bytes: 1000,
            prior_heap_live_bytes: 1000,
            processed_delta: 10,
            elapsed_secs: 1.0,
        }
    }

    #[test]
    fn deadband_emits_zero_delta() {
        let mut state = AutoTuneState::new(4, 1000, 5000);
        state.cpu_ewma = CPU_TARGET;
        state.run_queue_ratio_ewma = TARGET_RUNQ;
        state.sched_latency_ewma = TARGET_LATENCY;
        state.throughput_ewma = 10.0;
        state.queue_wait_ewma = TARGET_WAIT_SECS;

        let (_, output) = compute_control(&state, &steady_state_signals(), NiceLevel::Medium);
        assert_eq!(output.concurrency_delta, 0);
        assert_eq!(output.io_delta, 0);
    }

    #[test]
    fn high_cpu_pushes_concurrency_down() {
        let mut state = AutoTuneState::new(4, 1000, 5000);
        state.cpu_ewma = 90.0;
        state.throughput_ewma = 10.0;

        let mut signals = steady_state_signals();
        signals.cpu_percent = 90.0;

        let (_, output) = compute_control(&state, &signals, NiceLevel::Medium);
        assert!(output.combined < 0.0);
    }

    #[test]
    fn explicit_set_blocks_concurrency_mutation() {
        let adjusted = apply_concurrency_delta(4, 2, true, 8);
        assert_eq!(adjusted, 4);
        let adjusted = apply_concurrency_delta(4, 2, false, 8);
        assert_eq!(adjusted, 6);
    }

    #[test]
    fn initial_sizing_caps_on_low_memory_hosts() {
        assert_eq!(initial_concurrency(NiceLevel::High, 16, 3 * 1024 * 1024 * 1024), 2);
        assert_eq!(initial_concurrency(NiceLevel::High, 16, 6 * 1024 * 1024 * 1024), 4);
        assert_eq!(initial_concurrency(NiceLevel::Low, 16, 64 * 1024 * 1024 * 1024), 1);
    }
}
