//! Shared database repository test infrastructure
//!
//! Each repository has a test module containing shared test functions that
//! take `&dyn XxxRepo`, plus a `sqlite_tests` module that runs them against a
//! fresh in-memory SQLite database with the real migrations applied.

mod scan_records;
