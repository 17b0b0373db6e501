#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::op_ref
)]

//! Turns a city-builder save into a layered, labelled transit map scene.

pub mod color;
pub mod config;
pub mod errors;
pub mod geometry;
pub mod label_placement;
pub mod organizer;
pub mod pipeline;
pub mod route_registry;
pub mod save_file;
pub mod scene;
pub mod segments;
pub mod stop_clustering;
pub mod terrain;


pub use config::MapConfig;
pub use errors::{MapError, Result};
pub use pipeline::{MapBuilder, Stage, StepOutcome, build_map};
pub use save_file::SaveFile;
pub use scene::Scene;
