mod commands;

pub use commands::{is_comment, parse, parse_location, Command, InfoTopic, Location};
