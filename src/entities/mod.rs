//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod audit_log;
pub mod batch;
pub mod batch_item;
pub mod category;
pub mod finance_transaction;
pub mod party;
pub mod recipient;
pub mod sea_orm_active_enums;
pub mod system_state;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use audit_log::{Column as AuditLogColumn, Entity as AuditLog, Model as AuditLogModel};
pub use batch::{Column as BatchColumn, Entity as Batch, Model as BatchModel};
pub use batch_item::{Column as BatchItemColumn, Entity as BatchItem, Model as BatchItemModel};
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use finance_transaction::{
    Column as FinanceTransactionColumn, Entity as FinanceTransaction,
    Model as FinanceTransactionModel,
};
pub use party::{Column as PartyColumn, Entity as Party, Model as PartyModel};
pub use recipient::{Column as RecipientColumn, Entity as Recipient, Model as RecipientModel};
pub use system_state::{Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel};
pub use sea_orm_active_enums::{
    AccountType, BatchKind, BatchStatus, NotifyStatus, PartyType, PaymentMethod, TransferStatus,
    TxnStatus, TxnSubType, TxnType, ZoomType,
};
