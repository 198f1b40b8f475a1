//! Integration tests for the Syncspace import pipeline

mod support;

mod atomic_initialization;
mod cancellation_and_conflicts;
mod import_scenarios;
mod source_retries;
