pub extern crate serde;
pub extern crate serde_json;

mod message;

pub use message::*;
