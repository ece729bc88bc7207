pub mod bootstrap;
pub mod config;
pub mod db;
pub mod embedders;
pub mod storage;
pub mod workbook;
