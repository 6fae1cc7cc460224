use crate::util::WaitBudget;

const STACK_SIZE_VAR: &str = "FIBER_AWAIT_STACK_SIZE";
const SPIN_VAR: &str = "FIBER_AWAIT_SPIN";

/// Tuning knobs for an [`EventLoop`](super::EventLoop) and its fiber manager.
#[derive(Copy, Clone, Debug)]
pub struct Options {
    stack_size: usize,
    idle_spins: u32,
    idle_yields: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            stack_size: 1024 * 1024,
            idle_spins: 64,
            idle_yields: 4,
        }
    }
}

impl Options {
    /// Defaults overridden by `FIBER_AWAIT_STACK_SIZE` (bytes) and
    /// `FIBER_AWAIT_SPIN` (idle spins before parking) when set and parseable.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(size) = read_env(STACK_SIZE_VAR) {
            options.stack_size = size;
        }
        if let Some(spins) = read_env(SPIN_VAR) {
            options.idle_spins = spins;
        }
        options
    }

    /// Stack size of every fiber, in bytes.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Spins and yields the loop performs before parking its thread.
    pub fn idle(mut self, spins: u32, yields: u32) -> Self {
        self.idle_spins = spins;
        self.idle_yields = yields;
        self
    }

    /// Configured fiber stack size.
    pub fn fiber_stack_size(&self) -> usize {
        self.stack_size
    }

    pub(crate) fn wait_budget(&self) -> WaitBudget {
        WaitBudget::with_caps(self.idle_spins, self.idle_yields)
    }
}

fn read_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable option");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let options = Options::default().stack_size(64 * 1024).idle(0, 0);
        assert_eq!(options.fiber_stack_size(), 64 * 1024);
        assert!(options.wait_budget().exhausted());
    }
}
