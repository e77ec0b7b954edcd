//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables backing the record store.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod expense;
pub mod resource_request;

// Re-export specific types to avoid conflicts
pub use expense::{Column as ExpenseColumn, Entity as Expense, Model as ExpenseModel};
pub use resource_request::{
    Column as ResourceRequestColumn, Entity as ResourceRequest, Model as ResourceRequestModel,
};
