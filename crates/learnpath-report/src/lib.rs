//! learnpath-report: HTML dashboards and CSV exports of progress reports.

pub mod csv;
pub mod html;
