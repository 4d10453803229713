//! Core business logic, independent of any user interface.

/// Payment amount calculation and validation
pub mod amount;
/// Before/after snapshots of ledger status changes
pub mod audit;
/// Batch CRUD and per-batch counts
pub mod batch;
/// Batch items, bulk updates and batch population
pub mod batch_item;
/// Finance categories
pub mod category;
/// User-entered income and expense rows
pub mod finance;
/// Batch ledger sync
pub mod ledger;
/// Recipient notification text
pub mod notify;
/// Transfer proof image storage
pub mod proof;
/// Recipients, payee resolution and family groups
pub mod recipient;
/// Plain-text rendering of reports
pub mod render;
/// Cashflow, allocation and monthly reports
pub mod report;
/// Schema, seed and migration tasks run at startup
pub mod startup;
