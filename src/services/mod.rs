pub mod inventory;
pub mod report;
pub mod seed;

pub use inventory::InventoryService;
