pub mod adapter;
pub mod inference;
pub mod model_manager;
