/// Bounded idle budget: spin, then yield, then report exhaustion so the caller
/// can park. Never parks on its own.
#[derive(Copy, Clone, Debug)]
pub(crate) struct WaitBudget {
    spins: u32,
    yields: u32,
    spin_cap: u32,
    yield_cap: u32,
}

impl WaitBudget {
    /// Budget with explicit spin and yield caps.
    #[inline]
    pub(crate) const fn with_caps(spin_cap: u32, yield_cap: u32) -> Self {
        Self {
            spins: 0,
            yields: 0,
            spin_cap,
            yield_cap,
        }
    }

    /// True once both the spin and the yield allowance are used up.
    #[inline]
    pub(crate) fn exhausted(&self) -> bool {
        self.spins >= self.spin_cap && self.yields >= self.yield_cap
    }

    /// Perform one step of the idle strategy.
    #[inline]
    pub(crate) fn step(&mut self) {
        if self.spins < self.spin_cap {
            core::hint::spin_loop();
            self.spins += 1;
        } else if self.yields < self.yield_cap {
            std::thread::yield_now();
            self.yields += 1;
        }
    }
}
