pub mod errors;
pub mod export;
pub mod models;
pub mod repository;
pub mod storage;
pub mod task_edit;
pub mod task_list;
pub mod ui;
