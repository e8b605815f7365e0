// Domain-layer modules and shared errors/models
pub mod aggregation {
    pub use crate::aggregation::*;
}

pub mod models {
    pub use crate::callrail_models::*;
}

pub mod query {
    pub use crate::query::*;
}

pub mod errors {
    pub use crate::errors::*;
}
