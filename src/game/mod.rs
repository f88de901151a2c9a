pub mod agent;
pub mod constants;
pub mod containment;
pub mod map;
pub mod nav;
pub mod snapshot;
pub mod systems;
