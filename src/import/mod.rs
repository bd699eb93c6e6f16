pub mod cancel;
pub mod poller;
