use keyhole_wire::CLOCK_UNAVAILABLE;

/// Capability supplying the two clock readings attached to each event.
///
/// Both readings are in nanoseconds and both may be
/// [`CLOCK_UNAVAILABLE`] when the platform cannot provide them.
pub trait Clock {
    /// Wall clock reading, in nanoseconds.
    fn wall_clock_ns(&self) -> f64;

    /// CPU clock reading of the calling process, in nanoseconds.
    fn cpu_clock_ns(&self) -> f64;
}

/// Clock backed by the operating system.
///
/// Wall time is read from the monotonic clock, CPU time from the
/// process CPU-time clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn wall_clock_ns(&self) -> f64 {
        read_ns(nix::time::ClockId::CLOCK_MONOTONIC)
    }

    fn cpu_clock_ns(&self) -> f64 {
        read_ns(nix::time::ClockId::CLOCK_PROCESS_CPUTIME_ID)
    }
}

fn read_ns(id: nix::time::ClockId) -> f64 {
    match nix::time::clock_gettime(id) {
        Ok(ts) => ts.tv_sec() as f64 * 1_000_000_000.0 + ts.tv_nsec() as f64,
        Err(_) => CLOCK_UNAVAILABLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_are_positive_or_sentinel() {
        let clock = SystemClock;

        for value in [clock.wall_clock_ns(), clock.cpu_clock_ns()] {
            assert!(value > 0.0 || value == CLOCK_UNAVAILABLE);
        }
    }

    #[test]
    fn wall_clock_does_not_go_backwards() {
        let clock = SystemClock;

        let first = clock.wall_clock_ns();
        let second = clock.wall_clock_ns();

        if first != CLOCK_UNAVAILABLE && second != CLOCK_UNAVAILABLE {
            assert!(second >= first);
        }
    }
}
