//! Student productivity tracker: subjects, timetable, attendance with
//! target projections, tasks, study resources and coding practice logs.

pub mod attendance;
pub mod auth;
pub mod db;
pub mod models;
pub mod report;
pub mod web;
