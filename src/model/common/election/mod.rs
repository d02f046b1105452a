mod countdown;
mod state;

pub use countdown::Countdown;
pub use state::ElectionStatus;
