pub mod chat_service;
pub mod llm;
pub mod session_manager;
pub mod tts;
