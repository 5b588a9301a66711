pub mod model;
pub mod spec;
pub mod state_dict;
pub mod crowd_counter;

pub use crowd_counter::CrowdCounter;
pub use model::Model;
pub use spec::ModelSpec;
pub use state_dict::{Checkpoint, StateDict};
