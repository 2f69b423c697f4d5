mod core_modules;
mod date_range;
mod gathering;
mod key_metrics;
mod report;
