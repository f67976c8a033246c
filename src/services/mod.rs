pub mod notifier;
pub mod signal_handler;

pub use signal_handler::SignalHandler;
