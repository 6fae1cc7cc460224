/// Idle budget used by the event loop before it parks.
pub(crate) mod wait;

pub(crate) use wait::WaitBudget;
