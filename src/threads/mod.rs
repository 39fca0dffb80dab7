pub mod chord;
pub mod maintenance;
pub mod setup;
pub mod web;
