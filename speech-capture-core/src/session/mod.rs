mod capture;
pub mod controller;
mod tasks;
