pub mod forms;
pub mod forum_service;
