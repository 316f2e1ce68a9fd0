pub mod evaluate;
pub mod inventory;
pub mod invoice;
pub mod report;
pub mod templates;
