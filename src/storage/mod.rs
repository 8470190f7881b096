pub mod bar_store;

pub use bar_store::BarStore;
