pub mod badges;
pub mod catalog;
pub mod levels;
pub mod missions;
pub mod rules;
pub mod stats;
pub mod transition;
