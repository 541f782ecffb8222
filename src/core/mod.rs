pub mod dispatcher;
pub mod events;
pub mod progress;
pub mod scanner;
