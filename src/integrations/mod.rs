//! External service integrations.

pub mod callrail {
    pub use crate::callrail_client::*;
}

pub mod rate_limit {
    pub use crate::rate_limit::*;
}
